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

//! Session types: styles, configuration, and the registered record a
//! session leaves behind in the [`registry`] (spec §3, §4.6).

pub mod primary;
pub mod registry;

pub use primary::{PrimarySession, PrimaryTable};

use crate::destination::Destination;
use std::fmt;

/// The five session styles a client can request, plus `PRIMARY`, the only
/// style that may own subsessions (spec GLOSSARY "Session style").
///
/// `MASTER` is accepted on input as an alias for `PRIMARY` but this type
/// never represents it separately; normalization happens once, in
/// [`crate::wire::validate::style`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Style {
    Stream,
    Datagram,
    Datagram2,
    Datagram3,
    Raw,
    Primary,
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stream => "STREAM",
            Self::Datagram => "DATAGRAM",
            Self::Datagram2 => "DATAGRAM2",
            Self::Datagram3 => "DATAGRAM3",
            Self::Raw => "RAW",
            Self::Primary => "PRIMARY",
        };
        f.write_str(name)
    }
}

/// A validated session id: non-empty, no whitespace (spec §3 "SessionID").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Build from an already-validated string. Callers that haven't
    /// validated should go through [`crate::wire::validate::session_id`]
    /// first.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-session options captured at `SESSION CREATE`/`ADD` time (spec §3
/// "SessionConfig"). Fields not meaningful to a style are simply unused by
/// that style's handler.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub tunnels_in: u32,
    pub tunnels_out: u32,
    pub tunnel_length_in: u32,
    pub tunnel_length_out: u32,
    pub from_port: u16,
    pub to_port: u16,
    pub raw_protocol: u8,
    pub raw_header: bool,
    pub encryption_types: Vec<u8>,
    pub signature_type: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tunnels_in: 3,
            tunnels_out: 3,
            tunnel_length_in: 3,
            tunnel_length_out: 3,
            from_port: 0,
            to_port: 0,
            raw_protocol: 18,
            raw_header: false,
            encryption_types: vec![4, 0],
            signature_type: 7,
        }
    }
}

/// Lifecycle state of a registered session (spec §3 "Session").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pending,
    Active,
    Closed,
}

/// A registered session: the common header every style shares, independent
/// of what lives behind it (spec §3 "Session").
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: SessionId,
    pub style: Style,
    pub destination: Destination,
    pub status: Status,
    pub config: SessionConfig,
}

impl SessionRecord {
    pub fn new(id: SessionId, style: Style, destination: Destination, config: SessionConfig) -> Self {
        Self {
            id,
            style,
            destination,
            status: Status::Pending,
            config,
        }
    }
}
