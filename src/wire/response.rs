// Permission is hereby granted, free of charge, to any person obtaining a
// copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS
// OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

//! Response line builder and serializer (spec §3, §4.1).

use crate::error::Category;

/// A line the bridge sends back to a client.
///
/// `RESULT` is always serialized first when present; remaining fields keep
/// insertion order. `extra_lines` are written verbatim after the primary
/// line (used by `STREAM ACCEPT` to emit the remote-destination line).
#[derive(Debug, Clone)]
pub struct Response {
    verb: String,
    action: Option<String>,
    fields: Vec<(String, String)>,
    extra_lines: Vec<String>,
}

impl Response {
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            action: None,
            fields: Vec::new(),
            extra_lines: Vec::new(),
        }
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    /// Shorthand for `.field("RESULT", code)`.
    pub fn result(self, code: &str) -> Self {
        self.field("RESULT", code)
    }

    /// Populate `RESULT` (and `MESSAGE`, if any) from an error category.
    pub fn error(self, category: &Category) -> Self {
        let response = self.result(category.result_code());
        match category.message() {
            Some(message) => response.field("MESSAGE", message),
            None => response,
        }
    }

    /// Append a line written verbatim (no key=value quoting) after the
    /// primary response line.
    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.extra_lines.push(line.into());
        self
    }

    /// Serialize to the wire form: `VERB [ACTION] KEY=VALUE...\n`, followed
    /// by any extra lines, each `\n`-terminated.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.verb);

        if let Some(action) = &self.action {
            out.push(' ');
            out.push_str(action);
        }

        let mut fields = self.fields.clone();
        if let Some(pos) = fields.iter().position(|(k, _)| k == "RESULT") {
            let result = fields.remove(pos);
            fields.insert(0, result);
        }

        for (key, value) in &fields {
            out.push(' ');
            out.push_str(key);
            out.push('=');
            out.push_str(&format_value(value));
        }
        out.push('\n');

        for line in &self.extra_lines {
            out.push_str(line);
            out.push('\n');
        }

        out
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.serialize().into_bytes()
    }
}

/// Quote and escape a value iff it contains whitespace, a quote, an equals
/// sign, or a backslash (spec §3 "Serialized form").
fn format_value(value: &str) -> String {
    let needs_quoting = value
        .chars()
        .any(|c| c.is_whitespace() || c == '"' || c == '=' || c == '\\');

    if !needs_quoting {
        return value.to_string();
    }

    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('"');
    for c in value.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            other => escaped.push(other),
        }
    }
    escaped.push('"');
    escaped
}
