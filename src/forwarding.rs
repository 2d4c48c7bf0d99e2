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

//! `DATAGRAM`/`RAW RECEIVED` forwarding (spec §4.5 "RECEIVED forwarding").
//!
//! A session's connection holds the subscription only as a non-owning
//! handle: the forwarder task exits as soon as the connection's
//! `out_of_band` sender is closed, without the session needing to know
//! anything about the socket it's writing to (spec §9 "Cyclic ownership").

use crate::collaborators::{DatagramTransport, IncomingDatagram, IncomingRaw, RawTransport};
use crate::connection::Version;
use crate::destination::Destination;
use crate::session::SessionId;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

const LOG_TARGET: &str = "samv3_bridge::forwarding";

/// Spawn the task that turns `DatagramTransport` deliveries for `session`
/// into `DATAGRAM RECEIVED` lines on `out_of_band` (spec §4.5).
pub fn spawn_datagram_forwarder(
    transport: Arc<dyn DatagramTransport>,
    session: SessionId,
    destination: Destination,
    version: Version,
    out_of_band: UnboundedSender<Vec<u8>>,
) {
    let mut inbound = transport.subscribe(&session, &destination);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = out_of_band.closed() => {
                    tracing::trace!(target: LOG_TARGET, session = %session, "connection gone, stopping datagram forwarder");
                    return;
                }
                delivered = inbound.recv() => {
                    let Some(datagram) = delivered else { return };
                    if out_of_band.send(format_datagram_received(&datagram, version)).is_err() {
                        return;
                    }
                }
            }
        }
    });
}

/// Spawn the equivalent forwarder for `RawTransport` deliveries (spec §4.5).
pub fn spawn_raw_forwarder(
    transport: Arc<dyn RawTransport>,
    session: SessionId,
    destination: Destination,
    version: Version,
    out_of_band: UnboundedSender<Vec<u8>>,
) {
    let mut inbound = transport.subscribe(&session, &destination);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = out_of_band.closed() => {
                    tracing::trace!(target: LOG_TARGET, session = %session, "connection gone, stopping raw forwarder");
                    return;
                }
                delivered = inbound.recv() => {
                    let Some(raw) = delivered else { return };
                    if out_of_band.send(format_raw_received(&raw, version)).is_err() {
                        return;
                    }
                }
            }
        }
    });
}

fn format_datagram_received(datagram: &IncomingDatagram, version: Version) -> Vec<u8> {
    let mut line = format!(
        "DATAGRAM RECEIVED DESTINATION={} SIZE={}",
        datagram.from.canonical(),
        datagram.payload.len()
    );
    if version.has_port_headers() {
        line.push_str(&format!(" FROM_PORT={} TO_PORT={}", datagram.from_port, datagram.to_port));
    }
    line.push('\n');
    let mut bytes = line.into_bytes();
    bytes.extend_from_slice(&datagram.payload);
    bytes
}

fn format_raw_received(raw: &IncomingRaw, version: Version) -> Vec<u8> {
    let mut line = format!("RAW RECEIVED SIZE={}", raw.payload.len());
    if version.has_port_headers() {
        line.push_str(&format!(" FROM_PORT={} TO_PORT={} PROTOCOL={}", raw.from_port, raw.to_port, raw.protocol));
    }
    line.push('\n');
    let mut bytes = line.into_bytes();
    bytes.extend_from_slice(&raw.payload);
    bytes
}
