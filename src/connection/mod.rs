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

//! Per-connection state machine (spec §4.3).
//!
//! Mirrors `yosemite::proto::session::SessionController`'s
//! `mem::replace(&mut self.state, State::Poisoned)` idiom, but drives the
//! server side: `Opened` (pre-`HELLO`) -> `Handshaked` (version agreed) ->
//! `Bound` (a `SESSION CREATE`/`ADD` attached this socket to a session).

pub mod router;

use crate::collaborators::Collaborators;
use crate::error::Category;
use crate::session::{registry::Registry, PrimaryTable, SessionId};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

/// `HELLO VERSION`'s negotiated window (spec §4.3 "Version negotiation").
pub const MIN_VERSION: Version = Version(3, 0);
pub const MAX_VERSION: Version = Version(3, 3);

/// A SAM protocol version, `major.minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version(pub u8, pub u8);

impl Version {
    pub fn parse(s: &str) -> Option<Self> {
        let (major, minor) = s.split_once('.')?;
        Some(Self(major.parse().ok()?, minor.parse().ok()?))
    }

    /// `true` from 3.2 onward, where a session may have more than one
    /// outstanding `STREAM ACCEPT` at a time (spec §4.4 "Concurrent
    /// ACCEPT").
    pub fn supports_concurrent_accept(&self) -> bool {
        *self >= Version(3, 2)
    }

    /// `true` from 3.2 onward, where `DATAGRAM`/`RAW RECEIVED` headers
    /// always carry `FROM_PORT`/`TO_PORT` (spec §4.5 "RECEIVED header").
    pub fn has_port_headers(&self) -> bool {
        *self >= Version(3, 2)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0, self.1)
    }
}

/// Connection lifecycle state.
#[derive(Debug, Clone)]
enum ConnectionState {
    /// No `HELLO` yet; nothing but `HELLO VERSION` is accepted.
    Opened,
    /// Version agreed; any non-binding verb is accepted.
    Handshaked { version: Version },
    /// `SESSION CREATE`/`ADD` bound this socket to a session.
    Bound { version: Version, session: SessionId },
    /// Transitioning; observing this state outside a transition method is
    /// a bug.
    Poisoned,
}

/// Guards the pre-3.2 rule that a session may have at most one outstanding
/// `STREAM ACCEPT` (spec §4.4 "Concurrent ACCEPT"). Shared across every
/// connection bound to the bridge, since the second `ACCEPT` for a session
/// id is normally issued from a different connection than the first.
#[derive(Default)]
pub struct AcceptGuards {
    active: DashMap<SessionId, ()>,
}

impl AcceptGuards {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the accept slot for `id`. `false` if already held.
    pub fn try_acquire(&self, id: &SessionId) -> bool {
        self.active.insert(id.clone(), ()).is_none()
    }

    pub fn release(&self, id: &SessionId) {
        self.active.remove(id);
    }
}

/// Process-wide state every connection shares: the session registry, the
/// `PRIMARY` subsession tables, the accept guards, and the collaborator
/// bundle that does the actual router/network work.
pub struct Shared {
    pub registry: Registry,
    pub primaries: PrimaryTable,
    pub accept_guards: AcceptGuards,
    pub collaborators: Arc<Collaborators>,
}

/// Per-connection context: where this socket is in the handshake/bind
/// state machine, plus a handle to the process-wide [`Shared`] state.
pub struct ConnectionContext {
    state: ConnectionState,
    authenticated: bool,
    pub shared: Arc<Shared>,
    /// Channel back to this connection's writer task, used by handlers
    /// that push asynchronous lines (`DATAGRAM`/`RAW RECEIVED`) onto the
    /// same socket the synchronous request/response loop is using (spec
    /// §4.5, §5 "One writer per socket").
    pub out_of_band: Option<tokio::sync::mpsc::UnboundedSender<Vec<u8>>>,
    /// This control connection's source address, used by `STREAM FORWARD`
    /// to default `HOST` to the client's own address (spec §4.4 step 2).
    pub peer_addr: Option<std::net::SocketAddr>,
}

impl ConnectionContext {
    pub fn new(shared: Arc<Shared>) -> Self {
        Self {
            state: ConnectionState::Opened,
            authenticated: !shared.collaborators.auth.enabled(),
            shared,
            out_of_band: None,
            peer_addr: None,
        }
    }

    pub fn set_peer_addr(&mut self, addr: std::net::SocketAddr) {
        self.peer_addr = Some(addr);
    }

    /// `HELLO VERSION`: negotiate the highest version in `[MIN_VERSION,
    /// MAX_VERSION]` that also falls in the client's requested
    /// `[client_min, client_max]` window (spec §4.3).
    pub fn negotiate(&mut self, client_min: Version, client_max: Version) -> Result<Version, Category> {
        match std::mem::replace(&mut self.state, ConnectionState::Poisoned) {
            ConnectionState::Opened => {
                let upper = client_max.min(MAX_VERSION);
                let lower = client_min.max(MIN_VERSION);
                if upper < lower {
                    return Err(Category::NoVersion);
                }
                self.state = ConnectionState::Handshaked { version: upper };
                Ok(upper)
            }
            other => {
                self.state = other;
                Err(Category::InvalidKey("HELLO already sent".to_string()))
            }
        }
    }

    /// `SESSION CREATE`/`ADD`: bind this socket to `session`.
    pub fn bind(&mut self, session: SessionId) -> Result<Version, Category> {
        match std::mem::replace(&mut self.state, ConnectionState::Poisoned) {
            ConnectionState::Handshaked { version } => {
                self.state = ConnectionState::Bound {
                    version,
                    session,
                };
                Ok(version)
            }
            other @ ConnectionState::Bound { .. } => {
                self.state = other;
                Err(Category::InvalidKey(
                    "connection already bound to a session".to_string(),
                ))
            }
            other => {
                self.state = other;
                Err(Category::NoVersion)
            }
        }
    }

    pub fn version(&self) -> Option<Version> {
        match &self.state {
            ConnectionState::Handshaked { version } => Some(*version),
            ConnectionState::Bound { version, .. } => Some(*version),
            _ => None,
        }
    }

    pub fn bound_session(&self) -> Option<&SessionId> {
        match &self.state {
            ConnectionState::Bound { session, .. } => Some(session),
            _ => None,
        }
    }

    pub fn is_handshaked(&self) -> bool {
        self.version().is_some()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn set_authenticated(&mut self, authenticated: bool) {
        self.authenticated = authenticated;
    }

    /// `Err(AuthRequired)` iff auth is enabled and this connection hasn't
    /// passed it (spec §4.7 "AUTH gating").
    pub fn require_auth(&self) -> Result<(), Category> {
        if self.shared.collaborators.auth.enabled() && !self.authenticated {
            return Err(Category::AuthRequired);
        }
        Ok(())
    }
}
