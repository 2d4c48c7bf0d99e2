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

//! Command-line tokenizer.
//!
//! The token grammar is the one `yosemite::proto::parser` uses to split a
//! `KEY=VALUE` response line, generalized to a full command line: a verb,
//! an optional action, and an ordered set of `KEY`, `KEY=` or `KEY=VALUE`
//! options (spec §4.1).

use std::collections::HashMap;

/// Logging target for the file.
const LOG_TARGET: &str = "samv3_bridge::wire::parser";

/// A fully tokenized SAM command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Uppercased verb, e.g. `SESSION`.
    pub verb: String,

    /// Uppercased action, e.g. `CREATE`, or empty if the line carries none.
    pub action: String,

    /// Options in the order they appeared on the line. Key case is
    /// preserved; handlers that compare case-insensitively do so explicitly.
    pub options: Vec<(String, String)>,

    /// The line as received, CR/LF stripped.
    pub raw: String,

    /// Payload bytes following the command line, filled in by the caller
    /// for send commands once `SIZE` has been read from `options`.
    pub payload: Vec<u8>,
}

/// Tokenizer failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unterminated quote")]
    UnterminatedQuote,

    #[error("invalid utf-8")]
    InvalidUtf8,

    #[error("empty command line")]
    Empty,
}

/// Verbs that never carry an action; any second token is left as an
/// (ignored) option rather than promoted (spec §4.1 "Action detection").
const NO_ACTION_VERBS: &[&str] = &["PING", "PONG", "QUIT", "STOP", "EXIT", "HELP"];

/// Known verb -> recognized-action table. A verb absent from this table is
/// "unknown" and always promotes its second non-`=` token to an action.
fn known_action(verb: &str, candidate: &str) -> bool {
    let actions: &[&str] = match verb {
        "HELLO" => &["VERSION"],
        "SESSION" => &["CREATE", "ADD", "REMOVE"],
        "STREAM" => &["CONNECT", "ACCEPT", "FORWARD"],
        "DATAGRAM" => &["SEND"],
        "RAW" => &["SEND"],
        "NAMING" => &["LOOKUP"],
        "DEST" => &["GENERATE"],
        "AUTH" => &["ENABLE", "DISABLE", "ADD", "REMOVE", "LIST"],
        _ => return true,
    };
    actions.contains(&candidate)
}

impl Command {
    /// Parse one line of bytes (without the terminating `\n`/`\r\n`) into a
    /// [`Command`]. The payload field is always empty; the caller fills it
    /// in after inspecting `SIZE` for send-style commands.
    pub fn parse(line: &[u8]) -> Result<Self, ParseError> {
        let text = std::str::from_utf8(line).map_err(|_| ParseError::InvalidUtf8)?;
        let tokens = tokenize(text)?;

        let mut iter = tokens.into_iter();
        let verb = iter.next().ok_or(ParseError::Empty)?.to_uppercase();

        let mut action = String::new();
        let mut options = Vec::new();
        let mut rest: Vec<String> = iter.collect();

        if !NO_ACTION_VERBS.contains(&verb.as_str()) {
            if let Some(first) = rest.first() {
                if !first.contains('=') {
                    let candidate = first.to_uppercase();
                    if known_action(&verb, &candidate) {
                        action = candidate;
                        rest.remove(0);
                    }
                }
            }
        }

        for token in rest {
            let (key, value) = split_key_value(&token);
            options.push((key, value));
        }

        tracing::trace!(target: LOG_TARGET, %verb, %action, "parsed command");

        Ok(Command {
            verb,
            action,
            options,
            raw: text.to_string(),
            payload: Vec::new(),
        })
    }

    /// Look up an option by case-insensitive key. Returns the first match
    /// in insertion order.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// `true` iff an option with this key (any value) is present.
    pub fn has_option(&self, key: &str) -> bool {
        self.options.iter().any(|(k, _)| k.eq_ignore_ascii_case(key))
    }
}

/// Split a single token into `(KEY, VALUE)`. `KEY`, `KEY=` and `KEY=VALUE`
/// all parse; the first two yield an empty value (spec §4.1 "Key/value
/// parsing").
fn split_key_value(token: &str) -> (String, String) {
    match token.split_once('=') {
        Some((key, value)) => (key.to_string(), value.to_string()),
        None => (token.to_string(), String::new()),
    }
}

/// Split a line into whitespace-delimited tokens, honoring `"…"` quoting.
///
/// Inside quotes, `\"` is a literal quote and `\\` a literal backslash; any
/// other `\x` is preserved as the two characters `\` and `x` (spec §4.1
/// "Tokenizer"). A `=` inside quotes is part of the value, so the quoted
/// span is kept intact and only split into key/value afterwards.
fn tokenize(line: &str) -> Result<Vec<String>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut token = String::new();
        // A token may begin with `KEY=` followed by a quoted value; track
        // whether we're currently inside quotes so unquoted `=` before the
        // quote is copied verbatim and whitespace inside the quote doesn't
        // end the token.
        let mut in_quotes = false;
        loop {
            match chars.peek() {
                None => {
                    if in_quotes {
                        return Err(ParseError::UnterminatedQuote);
                    }
                    break;
                }
                Some(&c) if c.is_whitespace() && !in_quotes => break,
                Some(&'"') => {
                    chars.next();
                    if !in_quotes {
                        in_quotes = true;
                    } else {
                        in_quotes = false;
                    }
                }
                Some(&'\\') if in_quotes => {
                    chars.next();
                    match chars.next() {
                        Some('"') => token.push('"'),
                        Some('\\') => token.push('\\'),
                        Some(other) => {
                            token.push('\\');
                            token.push(other);
                        }
                        None => return Err(ParseError::UnterminatedQuote),
                    }
                }
                Some(&c) => {
                    chars.next();
                    token.push(c);
                }
            }
        }

        if in_quotes {
            return Err(ParseError::UnterminatedQuote);
        }

        tokens.push(token);
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_verb_only() {
        let cmd = Command::parse(b"PING").unwrap();
        assert_eq!(cmd.verb, "PING");
        assert_eq!(cmd.action, "");
        assert!(cmd.options.is_empty());
    }

    #[test]
    fn promotes_known_action() {
        let cmd = Command::parse(b"SESSION CREATE STYLE=STREAM ID=foo DESTINATION=TRANSIENT")
            .unwrap();
        assert_eq!(cmd.verb, "SESSION");
        assert_eq!(cmd.action, "CREATE");
        assert_eq!(cmd.option("STYLE"), Some("STREAM"));
        assert_eq!(cmd.option("ID"), Some("foo"));
        assert_eq!(cmd.option("style"), Some("STREAM"));
    }

    #[test]
    fn unknown_action_is_not_promoted() {
        // `FOO` is not in STREAM's action table, so it's an option token.
        let cmd = Command::parse(b"STREAM FOO ID=bar").unwrap();
        assert_eq!(cmd.action, "");
        assert_eq!(cmd.option("FOO"), Some(""));
    }

    #[test]
    fn no_action_verbs_never_promote() {
        let cmd = Command::parse(b"PING hello-world").unwrap();
        assert_eq!(cmd.action, "");
    }

    #[test]
    fn unknown_verb_promotes_second_token() {
        let cmd = Command::parse(b"WOMBAT TICKLE KEY=VALUE").unwrap();
        assert_eq!(cmd.verb, "WOMBAT");
        assert_eq!(cmd.action, "TICKLE");
    }

    #[test]
    fn quoted_value_with_spaces_and_equals() {
        let cmd = Command::parse(br#"SESSION STATUS RESULT=OK MESSAGE="closing now = bye""#)
            .unwrap();
        assert_eq!(cmd.option("MESSAGE"), Some("closing now = bye"));
    }

    #[test]
    fn quoted_value_with_escaped_quote_and_backslash() {
        let cmd = Command::parse(br#"DEST REPLY MESSAGE="a \"quoted\" \\ word""#).unwrap();
        assert_eq!(cmd.option("MESSAGE"), Some(r#"a "quoted" \ word"#));
    }

    #[test]
    fn unterminated_quote_errors() {
        let err = Command::parse(br#"SESSION CREATE MESSAGE="oops"#).unwrap_err();
        assert_eq!(err, ParseError::UnterminatedQuote);
    }

    #[test]
    fn bare_key_and_key_equals_are_empty_value() {
        let cmd = Command::parse(b"STREAM ACCEPT ID=foo SILENT SILENT2=").unwrap();
        assert_eq!(cmd.option("SILENT"), Some(""));
        assert_eq!(cmd.option("SILENT2"), Some(""));
    }

    #[test]
    fn invalid_utf8_errors() {
        let err = Command::parse(&[0xff, 0xfe]).unwrap_err();
        assert_eq!(err, ParseError::InvalidUtf8);
    }
}
