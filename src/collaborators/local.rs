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

//! An in-process stand-in for every collaborator trait, wired to nothing
//! but itself. This never touches a real I2P router: `connect`/`accept`
//! pair up sessions registered in the same process, destinations are
//! generated with [`rand`] instead of being derived from real I2CP keys,
//! and naming lookups only know about entries registered ahead of time.
//!
//! Useful for exercising the bridge's own state machine end to end (spec
//! §8's scenarios) without a router; not meant for production use.

use crate::collaborators::{
    AsyncDuplex, AuthManager, Collaborators, DatagramTransport, DestinationManager,
    DestinationResolver, IncomingDatagram, IncomingRaw, InboundStream, LeasesetLookupProvider,
    RawTransport, StreamAcceptor, StreamConnector, StreamForwarder,
};
use crate::destination::{is_all_zero, parse_offline_envelope, sig_type, Destination, PrivateKeyBundle, BASE64_I2P};
use crate::error::{Category, DialError};
use crate::session::SessionId;
use async_trait::async_trait;
use dashmap::DashMap;
use rand::RngCore;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

/// Fixed encryption-key length used by the local layout's opaque "enc
/// public/private key" field. Unrelated to any real I2P key size; this
/// stand-in never performs real encryption.
const ENC_KEY_LEN: usize = 32;

fn cert_for(signature_type: u16) -> Vec<u8> {
    if signature_type == 0 {
        vec![0, 0, 0]
    } else {
        let mut cert = vec![5, 0, 2];
        cert.extend_from_slice(&signature_type.to_be_bytes());
        cert
    }
}

/// Read the certificate at the front of a local destination blob, returning
/// `(signature_type, certificate_length)`.
fn parse_cert(bytes: &[u8]) -> Result<(u16, usize), Category> {
    if bytes.len() < 3 {
        return Err(Category::InvalidKey("truncated certificate".to_string()));
    }
    let cert_type = bytes[0];
    let len = u16::from_be_bytes([bytes[1], bytes[2]]) as usize;
    match cert_type {
        0 => Ok((0, 3)),
        5 if len == 2 && bytes.len() >= 5 => {
            Ok((u16::from_be_bytes([bytes[3], bytes[4]]), 5))
        }
        _ => Err(Category::InvalidKey("unsupported certificate".to_string())),
    }
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut buf);
    buf
}

/// Destination generation/parsing for the local layout:
/// `cert ++ signing_pubkey ++ enc_pubkey` for the public half, and
/// `destination ++ enc_privkey ++ signing_privkey [++ offline envelope]`
/// for the private bundle.
#[derive(Default)]
pub struct LocalDestinations;

impl LocalDestinations {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DestinationManager for LocalDestinations {
    async fn generate(&self, signature_type: u16) -> Result<PrivateKeyBundle, Category> {
        let info = sig_type::lookup(signature_type)
            .ok_or_else(|| Category::InvalidKey(format!("invalid SIGNATURE_TYPE: {signature_type}")))?;

        let mut dest_bytes = cert_for(signature_type);
        dest_bytes.extend_from_slice(&random_bytes(info.pub_len));
        dest_bytes.extend_from_slice(&random_bytes(ENC_KEY_LEN));

        Ok(PrivateKeyBundle {
            destination: Destination::from_bytes(dest_bytes),
            private_key: random_bytes(ENC_KEY_LEN),
            signing_private_key: random_bytes(info.priv_len),
            offline: None,
        })
    }

    async fn parse(&self, private_key_b64: &str) -> Result<PrivateKeyBundle, Category> {
        let raw = BASE64_I2P
            .decode(private_key_b64.as_bytes())
            .map_err(|_| Category::InvalidKey("malformed private key".to_string()))?;

        let (signature_type, cert_len) = parse_cert(&raw)?;
        let info = sig_type::lookup(signature_type)
            .ok_or_else(|| Category::InvalidKey("invalid embedded signature type".to_string()))?;

        let dest_len = cert_len + info.pub_len + ENC_KEY_LEN;
        if raw.len() < dest_len + ENC_KEY_LEN + info.priv_len {
            return Err(Category::InvalidKey("truncated private key".to_string()));
        }

        let destination = Destination::from_bytes(raw[..dest_len].to_vec());
        let private_key = raw[dest_len..dest_len + ENC_KEY_LEN].to_vec();
        let signing_start = dest_len + ENC_KEY_LEN;
        let signing_private_key = raw[signing_start..signing_start + info.priv_len].to_vec();
        let tail = &raw[signing_start + info.priv_len..];

        let offline = if is_all_zero(&signing_private_key) && !tail.is_empty() {
            Some(parse_offline_envelope(signature_type, tail)?)
        } else {
            None
        };

        Ok(PrivateKeyBundle {
            destination,
            private_key,
            signing_private_key,
            offline,
        })
    }
}

struct PendingConnect {
    socket: tokio::io::DuplexStream,
    remote: Destination,
    from_port: u16,
    to_port: u16,
}

/// Pairs `STREAM CONNECT` with `STREAM ACCEPT`/`STREAM FORWARD` for
/// destinations registered in this same process.
#[derive(Default)]
pub struct LocalStreams {
    acceptors: DashMap<String, mpsc::UnboundedSender<PendingConnect>>,
    receivers: DashMap<String, Arc<AsyncMutex<mpsc::UnboundedReceiver<PendingConnect>>>>,
    forwards: DashMap<String, (SocketAddr, bool)>,
}

impl LocalStreams {
    pub fn new() -> Self {
        Self::default()
    }

    fn channel_for(&self, key: &str) -> Arc<AsyncMutex<mpsc::UnboundedReceiver<PendingConnect>>> {
        if let Some(existing) = self.receivers.get(key) {
            return existing.clone();
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.acceptors.insert(key.to_string(), tx);
        let rx = Arc::new(AsyncMutex::new(rx));
        self.receivers.insert(key.to_string(), rx.clone());
        rx
    }
}

#[async_trait]
impl StreamConnector for LocalStreams {
    async fn connect(
        &self,
        from: &Destination,
        to: &Destination,
        from_port: u16,
        to_port: u16,
    ) -> Result<Box<dyn AsyncDuplex>, DialError> {
        if let Some(sender) = self.acceptors.get(to.canonical()) {
            let (local, remote) = tokio::io::duplex(8192);
            sender
                .send(PendingConnect {
                    socket: remote,
                    remote: from.clone(),
                    from_port,
                    to_port,
                })
                .map_err(|_| DialError::PeerNotFound)?;
            return Ok(Box::new(local));
        }

        if let Some(entry) = self.forwards.get(to.canonical()) {
            let (target, _ssl) = *entry;
            // This stand-in dials plain TCP regardless of `ssl`; a real
            // deployment would wrap the connection in TLS when it's set.
            let stream = tokio::net::TcpStream::connect(target)
                .await
                .map_err(|e| DialError::Other(e.to_string()))?;
            return Ok(Box::new(stream));
        }

        Err(DialError::PeerNotFound)
    }
}

#[async_trait]
impl StreamAcceptor for LocalStreams {
    async fn accept(&self, on: &Destination) -> Result<InboundStream, DialError> {
        let channel = self.channel_for(on.canonical());
        let mut receiver = channel.lock().await;
        let pending = receiver
            .recv()
            .await
            .ok_or_else(|| DialError::Other("acceptor channel closed".to_string()))?;
        Ok(InboundStream {
            socket: Box::new(pending.socket),
            remote: pending.remote,
            from_port: pending.from_port,
            to_port: pending.to_port,
        })
    }
}

#[async_trait]
impl StreamForwarder for LocalStreams {
    async fn forward(&self, on: &Destination, target: SocketAddr, ssl: bool) -> Result<(), Category> {
        self.forwards.insert(on.canonical().to_string(), (target, ssl));
        Ok(())
    }

    fn cancel(&self, on: &Destination) {
        self.forwards.remove(on.canonical());
    }
}

/// `NAMING LOOKUP` against a fixed table registered ahead of time; nothing
/// is resolved against the real network.
#[derive(Default)]
pub struct LocalNaming {
    table: DashMap<String, Destination>,
}

impl LocalNaming {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, destination: Destination) {
        self.table.insert(name.into(), destination);
    }
}

#[async_trait]
impl DestinationResolver for LocalNaming {
    async fn resolve(&self, name: &str) -> Result<Destination, Category> {
        self.table
            .get(name)
            .map(|entry| entry.clone())
            .ok_or(Category::KeyNotFound)
    }
}

/// Reports every destination as having a leaseset; a real deployment wires
/// this to actual network-database state.
#[derive(Default)]
pub struct LocalLeasesets;

impl LocalLeasesets {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LeasesetLookupProvider for LocalLeasesets {
    async fn has_leaseset(&self, _destination: &Destination) -> bool {
        true
    }
}

/// In-memory username/password table for `AUTH`. Never serializes a
/// password into a response (spec §4.7 "AUTH").
#[derive(Default)]
pub struct LocalAuth {
    enabled: std::sync::atomic::AtomicBool,
    users: DashMap<String, String>,
}

impl LocalAuth {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthManager for LocalAuth {
    fn enabled(&self) -> bool {
        self.enabled.load(std::sync::atomic::Ordering::SeqCst)
    }

    async fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, std::sync::atomic::Ordering::SeqCst);
    }

    async fn check(&self, user: &str, password: &str) -> bool {
        self.users
            .get(user)
            .map(|entry| entry.value() == password)
            .unwrap_or(false)
    }

    async fn add(&self, user: &str, password: &str) -> Result<(), Category> {
        self.users.insert(user.to_string(), password.to_string());
        Ok(())
    }

    async fn remove(&self, user: &str) -> Result<(), Category> {
        self.users.remove(user);
        Ok(())
    }

    async fn list(&self) -> Vec<String> {
        self.users.iter().map(|entry| entry.key().clone()).collect()
    }
}

/// Shared plumbing for the datagram and raw transports: route by
/// destination, deliver by session id.
#[derive(Default)]
struct LocalTransportCore<T: Send + 'static> {
    routes: DashMap<String, SessionId>,
    channels: DashMap<SessionId, mpsc::UnboundedSender<T>>,
}

impl<T: Send + 'static> LocalTransportCore<T> {
    fn subscribe(
        &self,
        session: &SessionId,
        destination: &Destination,
    ) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes
            .insert(destination.canonical().to_string(), session.clone());
        self.channels.insert(session.clone(), tx);
        rx
    }

    fn deliver(&self, to: &Destination, message: T) -> Result<(), Category> {
        let session = self
            .routes
            .get(to.canonical())
            .ok_or(Category::PeerNotFound)?
            .clone();
        let sender = self
            .channels
            .get(&session)
            .ok_or(Category::PeerNotFound)?;
        sender.send(message).map_err(|_| Category::PeerNotFound)
    }
}

#[derive(Default)]
pub struct LocalDatagrams {
    core: LocalTransportCore<IncomingDatagram>,
}

impl LocalDatagrams {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DatagramTransport for LocalDatagrams {
    async fn send(
        &self,
        _session: &SessionId,
        from: &Destination,
        to: &Destination,
        from_port: u16,
        to_port: u16,
        payload: Vec<u8>,
    ) -> Result<(), Category> {
        self.core.deliver(
            to,
            IncomingDatagram {
                from: from.clone(),
                from_port,
                to_port,
                payload,
            },
        )
    }

    fn subscribe(
        &self,
        session: &SessionId,
        destination: &Destination,
    ) -> mpsc::UnboundedReceiver<IncomingDatagram> {
        self.core.subscribe(session, destination)
    }
}

#[derive(Default)]
pub struct LocalRaw {
    core: LocalTransportCore<IncomingRaw>,
}

impl LocalRaw {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RawTransport for LocalRaw {
    async fn send(
        &self,
        _session: &SessionId,
        from: &Destination,
        to: &Destination,
        protocol: u8,
        from_port: u16,
        to_port: u16,
        payload: Vec<u8>,
    ) -> Result<(), Category> {
        self.core.deliver(
            to,
            IncomingRaw {
                from: Some(from.clone()),
                protocol,
                from_port,
                to_port,
                payload,
            },
        )
    }

    fn subscribe(&self, session: &SessionId, destination: &Destination) -> mpsc::UnboundedReceiver<IncomingRaw> {
        self.core.subscribe(session, destination)
    }
}

/// Build a full [`Collaborators`] bundle out of the local stand-ins.
pub fn collaborators() -> Collaborators {
    let streams = Arc::new(LocalStreams::new());
    Collaborators {
        destinations: Arc::new(LocalDestinations::new()),
        connector: streams.clone(),
        acceptor: streams.clone(),
        forwarder: streams,
        resolver: Arc::new(LocalNaming::new()),
        leasesets: Arc::new(LocalLeasesets::new()),
        auth: Arc::new(LocalAuth::new()),
        datagrams: Arc::new(LocalDatagrams::new()),
        raw: Arc::new(LocalRaw::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn generate_then_parse_round_trips() {
        let destinations = LocalDestinations::new();
        let bundle = destinations.generate(7).await.unwrap();
        let encoded = bundle.encode();
        let parsed = destinations.parse(&encoded).await.unwrap();
        assert_eq!(parsed.destination, bundle.destination);
        assert_eq!(parsed.signing_private_key, bundle.signing_private_key);
    }

    #[tokio::test]
    async fn connect_and_accept_pair_up() {
        let streams = LocalStreams::new();
        let server = Destination::from_bytes(vec![1, 2, 3]);
        let client = Destination::from_bytes(vec![4, 5, 6]);

        // Register an acceptor before connecting.
        let _ = streams.channel_for(server.canonical());

        let accept_fut = streams.accept(&server);
        let connect_fut = streams.connect(&client, &server, 10, 20);
        let (accepted, connected) = tokio::join!(accept_fut, connect_fut);

        let accepted = accepted.unwrap();
        assert!(connected.is_ok());
        assert_eq!(accepted.remote, client);
        assert_eq!(accepted.from_port, 10);
        assert_eq!(accepted.to_port, 20);
    }

    #[tokio::test]
    async fn connect_without_listener_is_peer_not_found() {
        let streams = LocalStreams::new();
        let a = Destination::from_bytes(vec![9]);
        let b = Destination::from_bytes(vec![8]);
        let err = streams.connect(&a, &b, 0, 0).await.unwrap_err();
        assert_eq!(err, DialError::PeerNotFound);
    }

    #[tokio::test]
    async fn datagram_delivery_routes_by_destination() {
        let datagrams = LocalDatagrams::new();
        let session = SessionId::new("dg1");
        let dest = Destination::from_bytes(vec![7, 7]);
        let mut rx = datagrams.subscribe(&session, &dest);

        let sender = Destination::from_bytes(vec![1]);
        datagrams
            .send(&session, &sender, &dest, 1, 2, b"hi".to_vec())
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.payload, b"hi");
        assert_eq!(received.from, sender);
    }

    #[tokio::test]
    async fn naming_lookup_misses_are_key_not_found() {
        let naming = LocalNaming::new();
        let err = naming.resolve("missing.i2p").await.unwrap_err();
        assert_eq!(err, Category::KeyNotFound);
    }

    #[tokio::test]
    async fn auth_round_trips_without_exposing_password_type() {
        let auth = LocalAuth::new();
        auth.set_enabled(true).await;
        auth.add("alice", "hunter2").await.unwrap();
        assert!(auth.check("alice", "hunter2").await);
        assert!(!auth.check("alice", "wrong").await);
        assert_eq!(auth.list().await, vec!["alice".to_string()]);
        auth.remove("alice").await.unwrap();
        assert!(auth.list().await.is_empty());
    }
}
