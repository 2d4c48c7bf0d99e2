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

//! Pure validators, spec §4.1 "Validators".

use crate::{destination::sig_type, error::Category, session::Style};

/// Disallowed RAW protocol numbers: TCP, UDP, DCCP and an internal I2P
/// protocol (glossary "Disallowed RAW protocols").
const DISALLOWED_RAW_PROTOCOLS: [u16; 4] = [6, 17, 19, 20];

/// `validatePort`: empty -> 0, otherwise an integer in `0..=65535`.
pub fn port(value: Option<&str>) -> Result<u16, Category> {
    match value.unwrap_or("") {
        "" => Ok(0),
        s => s
            .parse::<u32>()
            .ok()
            .filter(|&v| v <= 65535)
            .map(|v| v as u16)
            .ok_or_else(|| Category::InvalidKey(format!("invalid port: {s}"))),
    }
}

/// `validateRawProtocol`: empty -> 18, otherwise `0..=255` excluding the
/// disallowed set.
pub fn raw_protocol(value: Option<&str>) -> Result<u8, Category> {
    let raw = match value.unwrap_or("") {
        "" => return Ok(18),
        s => s
            .parse::<u32>()
            .map_err(|_| Category::InvalidKey(format!("invalid PROTOCOL: {s}")))?,
    };

    if raw > 255 {
        return Err(Category::InvalidKey(format!("invalid PROTOCOL: {raw}")));
    }
    if DISALLOWED_RAW_PROTOCOLS.contains(&(raw as u16)) {
        return Err(Category::InvalidKey(format!(
            "invalid PROTOCOL: {raw} is reserved"
        )));
    }
    Ok(raw as u8)
}

/// `validateSignatureType`: empty -> 7 (Ed25519); accepts either a numeric
/// code or a case-insensitive alias from the glossary's signature-type
/// table.
pub fn signature_type(value: Option<&str>) -> Result<u16, Category> {
    match value.unwrap_or("") {
        "" => Ok(7),
        s => sig_type::parse(s).ok_or_else(|| Category::InvalidKey(format!("invalid SIGNATURE_TYPE: {s}"))),
    }
}

/// `validateStyle`: one of the enumerated styles; `MASTER` silently
/// normalizes to `PRIMARY`.
pub fn style(value: Option<&str>) -> Result<Style, Category> {
    let s = value.unwrap_or("").to_uppercase();
    match s.as_str() {
        "STREAM" => Ok(Style::Stream),
        "DATAGRAM" => Ok(Style::Datagram),
        "DATAGRAM2" => Ok(Style::Datagram2),
        "DATAGRAM3" => Ok(Style::Datagram3),
        "RAW" => Ok(Style::Raw),
        "PRIMARY" | "MASTER" => Ok(Style::Primary),
        other => Err(Category::InvalidKey(format!("invalid STYLE: {other}"))),
    }
}

/// `validateSessionId`: non-empty, no whitespace.
pub fn session_id(value: Option<&str>) -> Result<String, Category> {
    let s = value.unwrap_or("");
    if s.is_empty() || s.chars().any(char::is_whitespace) {
        return Err(Category::InvalidKey("invalid ID".to_string()));
    }
    Ok(s.to_string())
}

/// `validateBool`: empty -> `default`; recognizes the case variants spec
/// §4.1 lists explicitly, case-insensitively beyond that.
pub fn boolean(value: Option<&str>, default: bool) -> Result<bool, Category> {
    match value.unwrap_or("") {
        "" => Ok(default),
        s if s.eq_ignore_ascii_case("true") || s == "1" || s.eq_ignore_ascii_case("yes") => {
            Ok(true)
        }
        s if s.eq_ignore_ascii_case("false") || s == "0" || s.eq_ignore_ascii_case("no") => {
            Ok(false)
        }
        other => Err(Category::InvalidKey(format!("invalid boolean: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_boundaries() {
        assert_eq!(port(Some("0")), Ok(0));
        assert_eq!(port(Some("65535")), Ok(65535));
        assert!(port(Some("65536")).is_err());
        assert!(port(Some("-1")).is_err());
        assert_eq!(port(Some("")), Ok(0));
        assert_eq!(port(None), Ok(0));
    }

    #[test]
    fn raw_protocol_rejects_disallowed_and_out_of_range() {
        for bad in [6, 17, 19, 20] {
            assert!(raw_protocol(Some(&bad.to_string())).is_err());
        }
        assert!(raw_protocol(Some("256")).is_err());
        assert_eq!(raw_protocol(Some("")), Ok(18));
        assert_eq!(raw_protocol(Some("0")), Ok(0));
        assert_eq!(raw_protocol(Some("255")), Ok(255));
    }

    #[test]
    fn signature_type_alias_and_default() {
        assert_eq!(signature_type(Some("")), Ok(7));
        assert_eq!(signature_type(Some("ED25519")), Ok(7));
        assert_eq!(signature_type(Some("ed25519")), Ok(7));
        assert_eq!(signature_type(Some("7")), Ok(7));
        assert_eq!(signature_type(Some("DSA_SHA1")), Ok(0));
    }

    #[test]
    fn style_master_aliases_primary() {
        assert_eq!(style(Some("MASTER")), Ok(Style::Primary));
        assert_eq!(style(Some("PRIMARY")), Ok(Style::Primary));
        assert!(style(Some("BOGUS")).is_err());
    }

    #[test]
    fn session_id_rejects_whitespace_and_empty() {
        assert!(session_id(Some("")).is_err());
        assert!(session_id(Some("has space")).is_err());
        assert_eq!(session_id(Some("ok-id")), Ok("ok-id".to_string()));
    }

    #[test]
    fn boolean_variants() {
        assert_eq!(boolean(Some(""), true), Ok(true));
        assert_eq!(boolean(Some("TRUE"), false), Ok(true));
        assert_eq!(boolean(Some("1"), false), Ok(true));
        assert_eq!(boolean(Some("False"), true), Ok(false));
        assert_eq!(boolean(Some("no"), true), Ok(false));
        assert!(boolean(Some("maybe"), true).is_err());
    }
}
