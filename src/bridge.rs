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

//! The TCP control-socket accept loop and per-connection driver (spec §5,
//! §9 "Splicing").
//!
//! One task per connection. Each connection owns a writer task fed by an
//! unbounded channel: ordinary replies and asynchronous `DATAGRAM`/`RAW
//! RECEIVED` pushes both funnel through it, so nothing ever interleaves two
//! writes on the same socket. When a `STREAM CONNECT`/`ACCEPT` succeeds, the
//! writer task gives its write half back so it can be reunited with the
//! read half and spliced whole into the peer stream.

use crate::config::BridgeConfig;
use crate::connection::router::{dispatch, HandlerOutcome, SpliceTarget};
use crate::connection::{ConnectionContext, Shared};
use crate::wire::Command;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, oneshot};

const LOG_TARGET: &str = "samv3_bridge::bridge";

/// A running bridge: the TCP accept loop plus the process-wide [`Shared`]
/// state every connection operates on.
pub struct Bridge {
    config: BridgeConfig,
    shared: Arc<Shared>,
}

impl Bridge {
    pub fn new(config: BridgeConfig, shared: Arc<Shared>) -> Self {
        Self { config, shared }
    }

    /// Accept connections until `shutdown` fires, then return once every
    /// in-flight connection has drained (spec §5 "graceful-shutdown cancels
    /// all connection contexts").
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> std::io::Result<()> {
        let listener = TcpListener::bind(&self.config.tcp_bind).await?;
        tracing::info!(target: LOG_TARGET, addr = %self.config.tcp_bind, "listening for SAM control connections");

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(error) => {
                            tracing::warn!(target: LOG_TARGET, %error, "accept failed");
                            continue;
                        }
                    };
                    tracing::debug!(target: LOG_TARGET, %peer, "accepted control connection");

                    let shared = self.shared.clone();
                    let max_line_length = self.config.max_line_length;
                    let connection_shutdown = shutdown.resubscribe();
                    tokio::spawn(async move {
                        if let Err(error) = handle_connection(stream, shared, max_line_length, connection_shutdown).await {
                            tracing::debug!(target: LOG_TARGET, %peer, %error, "connection closed with error");
                        }
                    });
                }
                _ = shutdown.recv() => {
                    tracing::info!(target: LOG_TARGET, "shutdown signal received, stopping accept loop");
                    return Ok(());
                }
            }
        }
    }
}

/// Message sent to a connection's writer task.
enum WriterCommand {
    /// Write these bytes to the socket.
    Write(Vec<u8>),
    /// Stop writing and hand the write half back over the oneshot.
    Reclaim(oneshot::Sender<OwnedWriteHalf>),
}

/// Owns the write half of a connection's socket for its whole lifetime
/// unless reclaimed for splicing (spec §5 "one writer per socket").
async fn writer_task(mut write_half: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<WriterCommand>) {
    while let Some(command) = rx.recv().await {
        match command {
            WriterCommand::Write(bytes) => {
                if let Err(error) = write_half.write_all(&bytes).await {
                    tracing::debug!(target: LOG_TARGET, %error, "write failed, stopping writer task");
                    return;
                }
            }
            WriterCommand::Reclaim(reply) => {
                let _ = reply.send(write_half);
                return;
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    shared: Arc<Shared>,
    max_line_length: usize,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    stream.set_nodelay(true).ok();
    let peer_addr = stream.peer_addr().ok();
    let (read_half, write_half) = stream.into_split();

    let (writer_tx, writer_rx) = mpsc::unbounded_channel::<WriterCommand>();
    let mut writer_handle = Some(tokio::spawn(writer_task(write_half, writer_rx)));

    // `ConnectionContext::out_of_band` is a plain byte channel (handlers
    // don't know about splicing/reclaiming); forward everything onto the
    // writer task's richer channel.
    let (out_of_band_tx, mut out_of_band_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let forward_writer_tx = writer_tx.clone();
    let out_of_band_forwarder = tokio::spawn(async move {
        while let Some(bytes) = out_of_band_rx.recv().await {
            if forward_writer_tx.send(WriterCommand::Write(bytes)).is_err() {
                break;
            }
        }
    });

    let mut ctx = ConnectionContext::new(shared);
    ctx.out_of_band = Some(out_of_band_tx);
    if let Some(addr) = peer_addr {
        ctx.set_peer_addr(addr);
    }

    let mut reader = LineReader::new(read_half, max_line_length);

    let result = loop {
        tokio::select! {
            line = reader.read_line() => {
                match line {
                    Ok(Some(raw)) => {
                        match run_one_command(&mut ctx, &mut reader, raw, &writer_tx).await {
                            Ok(Loop::Continue) => continue,
                            Ok(Loop::Close) => break Ok(()),
                            Ok(Loop::Splice(target)) => {
                                let handle = writer_handle.take().expect("writer task handle consumed twice");
                                break splice(reader, writer_tx.clone(), handle, target).await;
                            }
                            Err(error) => break Err(error),
                        }
                    }
                    Ok(None) => break Ok(()),
                    Err(error) => break Err(error),
                }
            }
            _ = shutdown.recv() => {
                break Ok(());
            }
        }
    };

    // The session this connection bound (if any) is this connection's to
    // close: unregister it exactly once here, whether the loop ended
    // cleanly, from an error, or after a splice finished (spec §4.3
    // "Bound-connection lifecycle", §8 "closed exactly once").
    if let Some(id) = ctx.bound_session() {
        let id = id.clone();
        ctx.shared.registry.unregister(&id);
        ctx.shared.primaries.remove(&id);
    }

    drop(ctx);
    out_of_band_forwarder.abort();
    drop(writer_tx);
    if let Some(handle) = writer_handle {
        let _ = handle.await;
    }
    result
}

enum Loop {
    Continue,
    Close,
    Splice(SpliceTarget),
}

async fn run_one_command(
    ctx: &mut ConnectionContext,
    reader: &mut LineReader<OwnedReadHalf>,
    raw: Vec<u8>,
    writer_tx: &mpsc::UnboundedSender<WriterCommand>,
) -> std::io::Result<Loop> {
    let mut command = match Command::parse(&raw) {
        Ok(command) => command,
        Err(error) => {
            let line = format!("I2P_ERROR MESSAGE=\"malformed command: {error}\"\n");
            let _ = writer_tx.send(WriterCommand::Write(line.into_bytes()));
            return Ok(Loop::Continue);
        }
    };

    // `DATAGRAM SEND`/`RAW SEND` carry a binary payload of exactly `SIZE`
    // bytes immediately after the command line (spec §4.5).
    if matches!((command.verb.as_str(), command.action.as_str()), ("DATAGRAM", "SEND") | ("RAW", "SEND")) {
        if let Some(size) = command.option("SIZE").and_then(|v| v.parse::<usize>().ok()) {
            command.payload = reader.read_exact_payload(size).await?;
        }
    }

    match dispatch(ctx, command).await {
        HandlerOutcome::Reply(response) => {
            let _ = writer_tx.send(WriterCommand::Write(response.into_bytes()));
            Ok(Loop::Continue)
        }
        HandlerOutcome::NoReply => Ok(Loop::Continue),
        HandlerOutcome::SilentClose => Ok(Loop::Close),
        HandlerOutcome::Splice(target) => Ok(Loop::Splice(target)),
        HandlerOutcome::ReplyThenClose(response) => {
            let _ = writer_tx.send(WriterCommand::Write(response.into_bytes()));
            Ok(Loop::Close)
        }
    }
}

/// Reunite the connection's read and write halves, write the splice
/// preamble, then bidirectionally copy bytes against `target.peer` until
/// either side closes (spec §9 "Splicing").
async fn splice(
    reader: LineReader<OwnedReadHalf>,
    writer_tx: mpsc::UnboundedSender<WriterCommand>,
    writer_handle: tokio::task::JoinHandle<()>,
    target: SpliceTarget,
) -> std::io::Result<()> {
    let (reply_tx, reply_rx) = oneshot::channel();
    if writer_tx.send(WriterCommand::Reclaim(reply_tx)).is_err() {
        return Ok(());
    }
    let write_half = match reply_rx.await {
        Ok(half) => half,
        Err(_) => return Ok(()),
    };
    let _ = writer_handle.await;

    let (read_half, leftover) = reader.into_parts();
    let mut client = read_half.reunite(write_half).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::Other, "failed to reunite split socket halves")
    })?;

    if !target.preamble.is_empty() {
        client.write_all(&target.preamble).await?;
    }
    if !leftover.is_empty() {
        client.write_all(&leftover).await?;
    }

    let mut peer = target.peer;
    match tokio::io::copy_bidirectional(&mut client, &mut peer).await {
        Ok((to_peer, to_client)) => {
            tracing::debug!(target: LOG_TARGET, to_peer, to_client, "splice finished");
            Ok(())
        }
        Err(error) => {
            tracing::debug!(target: LOG_TARGET, %error, "splice ended with error");
            Ok(())
        }
    }
}

/// Buffered line reader over a half-duplex socket that can hand back
/// leftover bytes (read past the last newline) when the connection is
/// spliced, and can switch to reading a fixed-size binary payload for
/// `DATAGRAM`/`RAW SEND` (spec §4.1 "Tokenizer", §4.5 "Payload framing").
struct LineReader<R> {
    reader: R,
    buffer: Vec<u8>,
    max_line_length: usize,
}

impl<R: AsyncReadExt + Unpin> LineReader<R> {
    fn new(reader: R, max_line_length: usize) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
            max_line_length,
        }
    }

    /// Read one line, CR/LF stripped. `Ok(None)` at clean EOF.
    async fn read_line(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(Some(line));
            }
            if self.buffer.len() > self.max_line_length {
                return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "command line too long"));
            }

            let mut chunk = [0u8; 4096];
            let read = self.reader.read(&mut chunk).await?;
            if read == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                let line = std::mem::take(&mut self.buffer);
                return Ok(Some(line));
            }
            self.buffer.extend_from_slice(&chunk[..read]);
        }
    }

    /// Read exactly `len` bytes, draining already-buffered bytes first.
    async fn read_exact_payload(&mut self, len: usize) -> std::io::Result<Vec<u8>> {
        while self.buffer.len() < len {
            let mut chunk = [0u8; 4096];
            let read = self.reader.read(&mut chunk).await?;
            if read == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "payload truncated"));
            }
            self.buffer.extend_from_slice(&chunk[..read]);
        }
        Ok(self.buffer.drain(..len).collect())
    }

    /// Consume the reader, returning the underlying half and any bytes
    /// already read past the last parsed line (spec §9 "Splicing must not
    /// drop bytes the client already sent").
    fn into_parts(self) -> (R, Vec<u8>) {
        (self.reader, self.buffer)
    }
}
