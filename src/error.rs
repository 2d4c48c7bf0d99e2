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

//! Crate-wide error types.
//!
//! [`Category`] is the single authoritative mapping from an internal failure
//! reason to a SAM `RESULT=` code (spec §7). Handlers never hand-pick a
//! result code string themselves; they return or propagate a [`Category`]
//! and the dispatcher asks it for the wire value.

use std::fmt;

/// Top-level crate error.
///
/// Distinguishes transport failures (which usually mean the connection is
/// dead and should be torn down) from protocol-level failures (which
/// produce a SAM response and leave the connection open).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error on the control or data socket.
    #[error("i/o error: `{0}`")]
    Io(#[from] std::io::Error),

    /// A SAM command failed in a way that maps to a result code.
    #[error("sam error: `{0}`")]
    Sam(#[from] Category),

    /// The command line could not be parsed at all.
    #[error("malformed command: `{0}`")]
    Malformed(String),
}

/// Internal failure categories, mapped to SAM v3 result codes at the
/// response-formatting boundary (spec §7).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Category {
    /// `ID` already registered.
    #[error("duplicate session id")]
    DuplicateId,

    /// Destination already registered.
    #[error("duplicate destination")]
    DuplicateDest,

    /// `ID` lookup missed.
    #[error("session not found")]
    SessionNotFound,

    /// Malformed destination or option value.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A bounded operation exceeded its deadline.
    #[error("timeout")]
    Timeout,

    /// The peer exists but could not be reached.
    #[error("cannot reach peer")]
    CantReachPeer,

    /// The peer could not be located on the network.
    #[error("peer not found")]
    PeerNotFound,

    /// No leaseset could be found for the destination.
    #[error("leaseset not found")]
    LeasesetNotFound,

    /// Naming lookup missed.
    #[error("key not found")]
    KeyNotFound,

    /// No SAM version in common between client and server.
    #[error("no compatible version")]
    NoVersion,

    /// Authentication is required but was not supplied or was rejected.
    #[error("authentication required")]
    AuthRequired,

    /// Authentication credentials were rejected.
    #[error("authentication failed")]
    AuthFailed,

    /// A second concurrent `STREAM ACCEPT` arrived on a pre-3.2 session.
    #[error("already accepting")]
    AlreadyAccepting,

    /// `SILENT=true` failure: suppress the response, close the socket.
    #[error("silent close")]
    SilentClose,

    /// Catch-all: anything else, reported as `I2P_ERROR`.
    #[error("i2p error: {0}")]
    I2pError(String),
}

impl Category {
    /// The `RESULT=` token this category serializes to on the wire.
    ///
    /// `SilentClose` has no wire representation; callers must intercept it
    /// before reaching response formatting (see
    /// [`crate::connection::router::HandlerOutcome`]).
    pub fn result_code(&self) -> &'static str {
        match self {
            Self::DuplicateId => "DUPLICATED_ID",
            Self::DuplicateDest => "DUPLICATED_DEST",
            Self::SessionNotFound => "INVALID_ID",
            Self::InvalidKey(_) => "INVALID_KEY",
            Self::Timeout => "TIMEOUT",
            Self::CantReachPeer => "CANT_REACH_PEER",
            Self::PeerNotFound => "PEER_NOT_FOUND",
            Self::LeasesetNotFound => "LEASESET_NOT_FOUND",
            Self::KeyNotFound => "KEY_NOT_FOUND",
            Self::NoVersion => "NOVERSION",
            Self::AuthRequired | Self::AuthFailed => "I2P_ERROR",
            Self::AlreadyAccepting => "ALREADY_ACCEPTING",
            Self::SilentClose => "",
            Self::I2pError(_) => "I2P_ERROR",
        }
    }

    /// Human-readable `MESSAGE=` value, if any, beyond the result code.
    pub fn message(&self) -> Option<String> {
        match self {
            Self::InvalidKey(reason) => Some(reason.clone()),
            Self::AuthRequired => Some("authentication required".to_string()),
            Self::AuthFailed => Some("authentication failed".to_string()),
            Self::I2pError(reason) if !reason.is_empty() => Some(reason.clone()),
            _ => None,
        }
    }
}

/// Reachability-class error returned by the
/// [`StreamConnector`](crate::collaborators::StreamConnector) and
/// [`StreamAcceptor`](crate::collaborators::StreamAcceptor) collaborators,
/// mapped to [`Category`] per spec §4.4 step 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialError {
    Timeout,
    PeerNotFound,
    LeasesetNotFound,
    InvalidKey,
    CantReachPeer,
    Other(String),
}

impl fmt::Display for DialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::PeerNotFound => write!(f, "peer not found"),
            Self::LeasesetNotFound => write!(f, "leaseset not found"),
            Self::InvalidKey => write!(f, "invalid key"),
            Self::CantReachPeer => write!(f, "cannot reach peer"),
            Self::Other(reason) => write!(f, "{reason}"),
        }
    }
}

impl From<DialError> for Category {
    fn from(error: DialError) -> Self {
        match error {
            DialError::Timeout => Category::Timeout,
            DialError::PeerNotFound => Category::PeerNotFound,
            DialError::LeasesetNotFound => Category::LeasesetNotFound,
            DialError::InvalidKey => Category::InvalidKey("bad destination".to_string()),
            DialError::CantReachPeer | DialError::Other(_) => Category::CantReachPeer,
        }
    }
}