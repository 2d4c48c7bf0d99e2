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

//! Destination handles, the modified-Base64 codec, and the offline-signature
//! envelope (spec §3, §6, GLOSSARY "Signature-type table").
//!
//! The bridge treats destination bytes as opaque (spec §3: "The bridge never
//! inspects destination bytes beyond passing them to collaborators and
//! comparing them for equality"). The exact I2P destination/certificate
//! binary layout belongs to the external I2CP client (spec §1 Non-goals);
//! this module owns only what the core protocol itself must interpret: the
//! modified-Base64 codec, the signature-type length table, and the
//! offline-signature envelope that `SESSION CREATE` must detect.

use crate::error::Category;
use data_encoding::Encoding;
use lazy_static::lazy_static;

lazy_static! {
    /// SAM's modified Base64: standard alphabet with `+` -> `-`, `/` -> `~`,
    /// padding `=` retained (spec §6 "Modified Base64").
    pub static ref BASE64_I2P: Encoding = {
        let mut spec = data_encoding::Specification::new();
        spec.symbols
            .push_str("ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-~");
        spec.padding = Some('=');
        spec.encoding().unwrap()
    };
}

/// An opaque I2P destination: a public-key bundle identified, for every
/// purpose the bridge cares about, by its canonical Base64 string.
#[derive(Debug, Clone)]
pub struct Destination {
    raw: Vec<u8>,
    canonical: String,
}

impl Destination {
    /// Wrap raw destination bytes, computing the canonical form once.
    pub fn from_bytes(raw: Vec<u8>) -> Self {
        let canonical = BASE64_I2P.encode(&raw);
        Self { raw, canonical }
    }

    /// Decode a canonical Base64 destination string (spec §6 `ParsePublic`).
    pub fn parse(b64: &str) -> Result<Self, Category> {
        let raw = BASE64_I2P
            .decode(b64.as_bytes())
            .map_err(|_| Category::InvalidKey("malformed destination".to_string()))?;
        Ok(Self::from_bytes(raw))
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The canonical Base64 form; this is what the registry's destination
    /// index keys on (spec §4.2 "Uniqueness contract").
    pub fn canonical(&self) -> &str {
        &self.canonical
    }
}

impl PartialEq for Destination {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}
impl Eq for Destination {}

impl std::hash::Hash for Destination {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// The concatenation of a destination and its private key material (spec
/// §3 "PrivateKeyBundle"), optionally carrying an offline-signature
/// envelope in place of the signing private key.
#[derive(Debug, Clone)]
pub struct PrivateKeyBundle {
    pub destination: Destination,
    pub private_key: Vec<u8>,
    pub signing_private_key: Vec<u8>,
    pub offline: Option<OfflineSignature>,
}

impl PrivateKeyBundle {
    /// Re-encode to the canonical Base64 private-key string, in the same
    /// layout it was decoded from.
    pub fn encode(&self) -> String {
        let mut raw = Vec::with_capacity(
            self.destination.raw().len() + self.private_key.len() + self.signing_private_key.len(),
        );
        raw.extend_from_slice(self.destination.raw());
        raw.extend_from_slice(&self.private_key);
        raw.extend_from_slice(&self.signing_private_key);
        if let Some(offline) = &self.offline {
            raw.extend_from_slice(&offline.encode());
        }
        BASE64_I2P.encode(&raw)
    }
}

/// Offline-signature envelope (spec §6 "Offline-signature wire format").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineSignature {
    pub expires: u32,
    pub transient_sig_type: u16,
    pub transient_public_key: Vec<u8>,
    pub offline_signature: Vec<u8>,
    pub transient_private_key: Vec<u8>,
}

impl OfflineSignature {
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.expires.to_be_bytes());
        out.extend_from_slice(&self.transient_sig_type.to_be_bytes());
        out.extend_from_slice(&self.transient_public_key);
        out.extend_from_slice(&self.offline_signature);
        out.extend_from_slice(&self.transient_private_key);
        out
    }
}

/// `true` iff every byte in `slice` is zero — the sentinel that marks a
/// `SESSION CREATE` private key as carrying an offline-signature envelope
/// instead of a normal signing private key (spec §3).
pub fn is_all_zero(slice: &[u8]) -> bool {
    slice.iter().all(|&b| b == 0)
}

/// Parse an offline-signature envelope out of `tail`, given the signature
/// type of the *primary* (long-term) destination key, whose length governs
/// the embedded offline signature (design note §9 "Offline signatures": one
/// authoritative table, not duplicated at call sites).
pub fn parse_offline_envelope(
    primary_sig_type: u16,
    tail: &[u8],
) -> Result<OfflineSignature, Category> {
    use nom::{bytes::complete::take, number::complete::{be_u16, be_u32}};

    let primary = sig_type::lookup(primary_sig_type)
        .ok_or_else(|| Category::InvalidKey("unknown signature type".to_string()))?;

    let parse = || -> nom::IResult<&[u8], OfflineSignature> {
        let (tail, expires) = be_u32(tail)?;
        let (tail, transient_sig_type) = be_u16(tail)?;
        let transient = sig_type::lookup(transient_sig_type).ok_or(nom::Err::Failure(
            nom::error::Error::new(tail, nom::error::ErrorKind::Fail),
        ))?;
        let (tail, transient_public_key) = take(transient.pub_len)(tail)?;
        let (tail, offline_signature) = take(primary.sig_len)(tail)?;
        let (tail, transient_private_key) = take(transient.priv_len)(tail)?;

        Ok((
            tail,
            OfflineSignature {
                expires,
                transient_sig_type,
                transient_public_key: transient_public_key.to_vec(),
                offline_signature: offline_signature.to_vec(),
                transient_private_key: transient_private_key.to_vec(),
            },
        ))
    };

    parse()
        .map(|(_, envelope)| envelope)
        .map_err(|_| Category::InvalidKey("malformed offline signature envelope".to_string()))
}

/// The glossary's per-signature-type length table.
pub mod sig_type {
    /// `(public-key bytes, private-key bytes, signature bytes)` for one
    /// signature type, plus its canonical name and aliases.
    pub struct SigTypeInfo {
        pub code: u16,
        pub names: &'static [&'static str],
        pub pub_len: usize,
        pub priv_len: usize,
        pub sig_len: usize,
    }

    pub const TABLE: &[SigTypeInfo] = &[
        SigTypeInfo {
            code: 0,
            names: &["DSA_SHA1"],
            pub_len: 128,
            priv_len: 20,
            sig_len: 40,
        },
        SigTypeInfo {
            code: 1,
            names: &["ECDSA_SHA256_P256"],
            pub_len: 64,
            priv_len: 32,
            sig_len: 64,
        },
        SigTypeInfo {
            code: 2,
            names: &["ECDSA_SHA384_P384"],
            pub_len: 96,
            priv_len: 48,
            sig_len: 96,
        },
        SigTypeInfo {
            code: 3,
            names: &["ECDSA_SHA512_P521"],
            pub_len: 132,
            priv_len: 66,
            sig_len: 132,
        },
        SigTypeInfo {
            code: 7,
            names: &["ED25519", "EDDSA_SHA512_ED25519"],
            pub_len: 32,
            priv_len: 64,
            sig_len: 64,
        },
        SigTypeInfo {
            code: 8,
            names: &["ED25519PH", "EDDSA_SHA512_ED25519PH"],
            pub_len: 32,
            priv_len: 64,
            sig_len: 64,
        },
        SigTypeInfo {
            code: 11,
            names: &["REDDSA_SHA512_ED25519", "REDDSA"],
            pub_len: 32,
            priv_len: 32,
            sig_len: 64,
        },
    ];

    pub fn lookup(code: u16) -> Option<&'static SigTypeInfo> {
        TABLE.iter().find(|info| info.code == code)
    }

    /// Parse a numeric code or a case-insensitive alias name.
    pub fn parse(s: &str) -> Option<u16> {
        if let Ok(code) = s.parse::<u16>() {
            if lookup(code).is_some() {
                return Some(code);
            }
        }
        let upper = s.to_uppercase();
        TABLE
            .iter()
            .find(|info| info.names.iter().any(|name| *name == upper))
            .map(|info| info.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modified_base64_swaps_alphabet() {
        // Standard base64 of three 0xfb bytes is "+7v7", which under the
        // modified alphabet is "-7v7" (and '/' never appears here, but the
        // round trip below exercises both directions).
        let raw = vec![0xfbu8, 0xfb, 0xfb, 0xff, 0xff, 0xff];
        let encoded = BASE64_I2P.encode(&raw);
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        let decoded = BASE64_I2P.decode(encoded.as_bytes()).unwrap();
        assert_eq!(decoded, raw);
    }

    #[test]
    fn destination_equality_is_by_canonical_form() {
        let a = Destination::from_bytes(vec![1, 2, 3]);
        let b = Destination::from_bytes(vec![1, 2, 3]);
        let c = Destination::from_bytes(vec![1, 2, 4]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn all_zero_detects_sentinel() {
        assert!(is_all_zero(&[0, 0, 0, 0]));
        assert!(!is_all_zero(&[0, 0, 1, 0]));
        assert!(is_all_zero(&[]));
    }

    #[test]
    fn offline_envelope_round_trips() {
        let envelope = OfflineSignature {
            expires: 1_700_000_000,
            transient_sig_type: 7,
            transient_public_key: vec![9u8; 32],
            offline_signature: vec![8u8; 64], // primary sig type 7 -> sig_len 64
            transient_private_key: vec![7u8; 64],
        };
        let encoded = envelope.encode();
        let parsed = parse_offline_envelope(7, &encoded).unwrap();
        assert_eq!(parsed, envelope);
    }

    #[test]
    fn sig_type_aliases_resolve() {
        assert_eq!(sig_type::parse("ed25519"), Some(7));
        assert_eq!(sig_type::parse("7"), Some(7));
        assert_eq!(sig_type::parse("DSA_SHA1"), Some(0));
        assert_eq!(sig_type::parse("bogus"), None);
    }
}
