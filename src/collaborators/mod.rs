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

//! External-collaborator traits (spec §6).
//!
//! The bridge never talks I2CP itself; everything that needs real router
//! access goes through one of these traits. [`local`] bundles a dev/test
//! stand-in that never touches a router, useful for exercising the
//! protocol state machine in isolation.

pub mod local;

use crate::destination::{Destination, PrivateKeyBundle};
use crate::error::{Category, DialError};
use crate::session::SessionId;
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};

/// A duplex byte stream the router dispatcher can splice a control/data
/// socket into without caring whether it came from a real I2CP stream or a
/// local loopback pair.
pub trait AsyncDuplex: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncDuplex for T {}

/// Generates and parses destination key material (spec §6 "Destination
/// manager").
#[async_trait]
pub trait DestinationManager: Send + Sync {
    async fn generate(&self, signature_type: u16) -> Result<PrivateKeyBundle, Category>;
    async fn parse(&self, private_key_b64: &str) -> Result<PrivateKeyBundle, Category>;
}

/// Opens outbound virtual streams (`STREAM CONNECT`).
#[async_trait]
pub trait StreamConnector: Send + Sync {
    async fn connect(
        &self,
        from: &Destination,
        to: &Destination,
        from_port: u16,
        to_port: u16,
    ) -> Result<Box<dyn AsyncDuplex>, DialError>;
}

/// An inbound virtual stream handed to `STREAM ACCEPT`.
pub struct InboundStream {
    pub socket: Box<dyn AsyncDuplex>,
    pub remote: Destination,
    pub from_port: u16,
    pub to_port: u16,
}

/// Accepts inbound virtual streams (`STREAM ACCEPT`).
#[async_trait]
pub trait StreamAcceptor: Send + Sync {
    /// Wait for (and consume) the next inbound stream addressed to `on`.
    async fn accept(&self, on: &Destination) -> Result<InboundStream, DialError>;
}

/// Forwards inbound virtual streams to a local TCP listener (`STREAM
/// FORWARD`).
#[async_trait]
pub trait StreamForwarder: Send + Sync {
    async fn forward(&self, on: &Destination, target: SocketAddr, ssl: bool) -> Result<(), Category>;
    fn cancel(&self, on: &Destination);
}

/// Resolves a hostname to a destination (`NAMING LOOKUP`).
#[async_trait]
pub trait DestinationResolver: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<Destination, Category>;
}

/// Answers `NAMING LOOKUP NAME=ME OPTIONS=true`-style leaseset queries.
#[async_trait]
pub trait LeasesetLookupProvider: Send + Sync {
    async fn has_leaseset(&self, destination: &Destination) -> bool;
}

/// Backs `AUTH ENABLE/DISABLE/ADD/REMOVE/LIST`. Implementations must never
/// let a password reach a response line (spec §4.7 "AUTH").
#[async_trait]
pub trait AuthManager: Send + Sync {
    fn enabled(&self) -> bool;
    async fn set_enabled(&self, enabled: bool);
    async fn check(&self, user: &str, password: &str) -> bool;
    async fn add(&self, user: &str, password: &str) -> Result<(), Category>;
    async fn remove(&self, user: &str) -> Result<(), Category>;
    async fn list(&self) -> Vec<String>;
}

/// A datagram delivered to a `DATAGRAM`/`DATAGRAM2`/`DATAGRAM3` session.
pub struct IncomingDatagram {
    pub from: Destination,
    pub from_port: u16,
    pub to_port: u16,
    pub payload: Vec<u8>,
}

/// Sends and receives repliable/anonymous datagrams (`DATAGRAM SEND`).
#[async_trait]
pub trait DatagramTransport: Send + Sync {
    async fn send(
        &self,
        session: &SessionId,
        from: &Destination,
        to: &Destination,
        from_port: u16,
        to_port: u16,
        payload: Vec<u8>,
    ) -> Result<(), Category>;

    /// Subscribe to datagrams arriving for `session`, bound to
    /// `destination`. Each session subscribes at most once; re-subscribing
    /// drops the previous receiver.
    fn subscribe(
        &self,
        session: &SessionId,
        destination: &Destination,
    ) -> tokio::sync::mpsc::UnboundedReceiver<IncomingDatagram>;
}

/// A raw packet delivered to a `RAW` session. `from` is absent unless the
/// session asked for headers and the packet had a sender (spec §4.5 "RAW
/// RECEIVED").
pub struct IncomingRaw {
    pub from: Option<Destination>,
    pub protocol: u8,
    pub from_port: u16,
    pub to_port: u16,
    pub payload: Vec<u8>,
}

/// Sends and receives raw (non-repliable, header-optional) datagrams (`RAW
/// SEND`).
#[async_trait]
pub trait RawTransport: Send + Sync {
    async fn send(
        &self,
        session: &SessionId,
        from: &Destination,
        to: &Destination,
        protocol: u8,
        from_port: u16,
        to_port: u16,
        payload: Vec<u8>,
    ) -> Result<(), Category>;

    fn subscribe(
        &self,
        session: &SessionId,
        destination: &Destination,
    ) -> tokio::sync::mpsc::UnboundedReceiver<IncomingRaw>;
}

/// The full set of collaborators a running bridge needs. Built once at
/// startup and shared (via `Arc`) by every connection.
pub struct Collaborators {
    pub destinations: std::sync::Arc<dyn DestinationManager>,
    pub connector: std::sync::Arc<dyn StreamConnector>,
    pub acceptor: std::sync::Arc<dyn StreamAcceptor>,
    pub forwarder: std::sync::Arc<dyn StreamForwarder>,
    pub resolver: std::sync::Arc<dyn DestinationResolver>,
    pub leasesets: std::sync::Arc<dyn LeasesetLookupProvider>,
    pub auth: std::sync::Arc<dyn AuthManager>,
    pub datagrams: std::sync::Arc<dyn DatagramTransport>,
    pub raw: std::sync::Arc<dyn RawTransport>,
}
