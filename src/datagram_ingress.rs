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

//! UDP datagram ingress (spec §6 "UDP datagram ingress"): a second, simpler
//! path into `DATAGRAM`/`RAW SEND` for clients that would rather fire a UDP
//! packet than hold a TCP control connection open.
//!
//! One packet is one datagram: a header line, `\n`, then the payload
//! verbatim (no `SIZE` field — whatever's left in the packet after the
//! header line is the payload). The header names the sending session and
//! the target destination and may carry the same per-send options as the
//! TCP-side `DATAGRAM SEND`/`RAW SEND`.

use crate::connection::Shared;
use crate::error::Category;
use crate::handlers::datagram::MAX_DATAGRAM_SIZE;
use crate::handlers::raw::MAX_RAW_DATAGRAM_SIZE;
use crate::session::{SessionId, Style};
use crate::wire::{validate, Command};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;

const LOG_TARGET: &str = "samv3_bridge::datagram_ingress";

/// Datagrams arrive with no reply channel; malformed or failed packets are
/// logged and dropped rather than answered (spec §6 "UDP is fire-and-forget").
pub struct DatagramIngress {
    shared: Arc<Shared>,
    bind: String,
}

impl DatagramIngress {
    pub fn new(shared: Arc<Shared>, bind: String) -> Self {
        Self { shared, bind }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> std::io::Result<()> {
        let socket = UdpSocket::bind(&self.bind).await?;
        tracing::info!(target: LOG_TARGET, addr = %self.bind, "listening for UDP datagram ingress");

        let mut buf = vec![0u8; 64 * 1024];
        loop {
            tokio::select! {
                received = socket.recv_from(&mut buf) => {
                    match received {
                        Ok((len, peer)) => self.handle_packet(&buf[..len], peer).await,
                        Err(error) => tracing::warn!(target: LOG_TARGET, %error, "recv failed"),
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!(target: LOG_TARGET, "shutdown signal received, stopping UDP ingress");
                    return Ok(());
                }
            }
        }
    }

    async fn handle_packet(&self, packet: &[u8], peer: SocketAddr) {
        if let Err(error) = self.dispatch_packet(packet).await {
            tracing::warn!(target: LOG_TARGET, %peer, %error, "dropping malformed or failed datagram");
        }
    }

    async fn dispatch_packet(&self, packet: &[u8]) -> Result<(), Category> {
        let split = packet
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| Category::InvalidKey("missing header line".to_string()))?;
        let header = std::str::from_utf8(&packet[..split])
            .map_err(|_| Category::InvalidKey("header is not valid utf-8".to_string()))?;
        let payload = packet[split + 1..].to_vec();

        // Header shape: `<version> <sessionId> <destination> [options...]`
        // (spec §6). Reuse the line tokenizer rather than hand-rolling a
        // second one: splice it into a synthetic DATAGRAM SEND line so
        // `Command::parse` and the existing validators do the work.
        let mut tokens = header.split_whitespace();
        let _version = tokens.next().ok_or_else(|| Category::InvalidKey("empty header".to_string()))?;
        let session_token = tokens.next().ok_or_else(|| Category::InvalidKey("missing session id".to_string()))?;
        let destination_token = tokens.next().ok_or_else(|| Category::InvalidKey("missing destination".to_string()))?;
        let rest: Vec<&str> = tokens.collect();

        let synthetic = format!("DATAGRAM SEND ID={session_token} DESTINATION={destination_token} {}", rest.join(" "));
        let command = Command::parse(synthetic.as_bytes())
            .map_err(|error| Category::InvalidKey(format!("malformed options: {error}")))?;

        let id = SessionId::new(validate::session_id(command.option("ID"))?);
        let session = self.shared.registry.get(&id).ok_or(Category::SessionNotFound)?;
        if session.style == Style::Primary {
            return Err(Category::InvalidKey("PRIMARY cannot send datagrams directly".to_string()));
        }

        let to = match crate::destination::Destination::parse(destination_token) {
            Ok(destination) => destination,
            Err(_) => self.shared.collaborators.resolver.resolve(destination_token).await?,
        };

        let from_port = validate::port(command.option("FROM_PORT"))?;
        let to_port = validate::port(command.option("TO_PORT"))?;

        match session.style {
            Style::Datagram | Style::Datagram2 | Style::Datagram3 => {
                if payload.len() > MAX_DATAGRAM_SIZE {
                    return Err(Category::I2pError(format!("datagram payload too large: {} bytes", payload.len())));
                }
                self.shared
                    .collaborators
                    .datagrams
                    .send(&id, &session.destination, &to, from_port, to_port, payload)
                    .await
            }
            Style::Raw => {
                if payload.len() > MAX_RAW_DATAGRAM_SIZE {
                    return Err(Category::I2pError(format!("raw payload too large: {} bytes", payload.len())));
                }
                let protocol = validate::raw_protocol(command.option("PROTOCOL"))?;
                self.shared
                    .collaborators
                    .raw
                    .send(&id, &session.destination, &to, protocol, from_port, to_port, payload)
                    .await
            }
            Style::Stream | Style::Primary => {
                Err(Category::InvalidKey("session style does not accept datagrams".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::local;
    use crate::connection::AcceptGuards;
    use crate::session::{registry::Registry, PrimaryTable, SessionConfig, SessionRecord, Status};

    fn ingress() -> (DatagramIngress, Arc<Shared>) {
        let shared = Arc::new(Shared {
            registry: Registry::new(),
            primaries: PrimaryTable::new(),
            accept_guards: AcceptGuards::new(),
            collaborators: Arc::new(local::collaborators()),
        });
        (DatagramIngress::new(shared.clone(), "127.0.0.1:0".to_string()), shared)
    }

    #[tokio::test]
    async fn rejects_packet_without_header_terminator() {
        let (ingress, _shared) = ingress();
        let error = ingress.dispatch_packet(b"no newline here").await.unwrap_err();
        assert!(matches!(error, Category::InvalidKey(_)));
    }

    #[tokio::test]
    async fn rejects_unknown_session() {
        let (ingress, _shared) = ingress();
        let packet = b"3.0 missing-session AAAA\nhello";
        let error = ingress.dispatch_packet(packet).await.unwrap_err();
        assert_eq!(error, Category::SessionNotFound);
    }

    #[tokio::test]
    async fn delivers_to_subscribed_datagram_session() {
        let (ingress, shared) = ingress();
        let bundle = local::collaborators().destinations.generate(7).await.unwrap();
        let id = SessionId::new("d1");
        let record = SessionRecord {
            status: Status::Active,
            ..SessionRecord::new(id.clone(), Style::Datagram, bundle.destination.clone(), SessionConfig::default())
        };
        shared.registry.register(record).unwrap();
        let mut inbound = shared.collaborators.datagrams.subscribe(&id, &bundle.destination);

        let packet = format!("3.0 d1 {}\nhello world", bundle.destination.canonical());
        ingress.dispatch_packet(packet.as_bytes()).await.unwrap();

        let delivered = inbound.recv().await.unwrap();
        assert_eq!(delivered.payload, b"hello world");
    }
}
