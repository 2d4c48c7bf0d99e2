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

//! `STREAM CONNECT`/`ACCEPT`/`FORWARD` (spec §4.4).

use crate::connection::router::{HandlerOutcome, SpliceTarget};
use crate::connection::ConnectionContext;
use crate::error::Category;
use crate::handlers::resolve_destination;
use crate::session::{SessionId, Style};
use crate::wire::{validate, Command, Response};
use std::net::SocketAddr;

/// Step 2 of spec §4.4: map a dial failure to a result code, honoring
/// `SILENT=true` by swallowing it into a closed socket instead.
fn dial_failure(category: Category, silent: bool) -> Result<HandlerOutcome, Category> {
    if silent {
        Ok(HandlerOutcome::SilentClose)
    } else {
        Err(category)
    }
}

pub async fn connect(ctx: &mut ConnectionContext, command: &Command) -> HandlerOutcome {
    match connect_inner(ctx, command).await {
        Ok(outcome) => outcome,
        Err(category) => HandlerOutcome::error("STREAM", "STATUS", category),
    }
}

async fn connect_inner(ctx: &mut ConnectionContext, command: &Command) -> Result<HandlerOutcome, Category> {
    ctx.require_auth()?;

    let id = SessionId::new(validate::session_id(command.option("ID"))?);
    let session = ctx.shared.registry.get(&id).ok_or(Category::SessionNotFound)?;
    if session.style != Style::Stream {
        return Err(Category::InvalidKey("session is not a STREAM session".to_string()));
    }

    let destination_value = command
        .option("DESTINATION")
        .ok_or_else(|| Category::InvalidKey("missing DESTINATION".to_string()))?;
    let to = resolve_destination(ctx, destination_value).await?;

    let from_port = validate::port(command.option("FROM_PORT"))?;
    let to_port = validate::port(command.option("TO_PORT"))?;
    let silent = validate::boolean(command.option("SILENT"), false)?;

    match ctx
        .shared
        .collaborators
        .connector
        .connect(&session.destination, &to, from_port, to_port)
        .await
    {
        Ok(socket) => {
            let preamble = if silent {
                Vec::new()
            } else {
                Response::new("STREAM").action("STATUS").result("OK").into_bytes()
            };
            Ok(HandlerOutcome::Splice(SpliceTarget { peer: socket, preamble }))
        }
        Err(error) => dial_failure(error.into(), silent),
    }
}

pub async fn accept(ctx: &mut ConnectionContext, command: &Command) -> HandlerOutcome {
    match accept_inner(ctx, command).await {
        Ok(outcome) => outcome,
        Err(category) => HandlerOutcome::error("STREAM", "STATUS", category),
    }
}

async fn accept_inner(ctx: &mut ConnectionContext, command: &Command) -> Result<HandlerOutcome, Category> {
    ctx.require_auth()?;

    let id = SessionId::new(validate::session_id(command.option("ID"))?);
    let session = ctx.shared.registry.get(&id).ok_or(Category::SessionNotFound)?;
    if session.style != Style::Stream {
        return Err(Category::InvalidKey("session is not a STREAM session".to_string()));
    }

    let silent = validate::boolean(command.option("SILENT"), false)?;
    let version = ctx.version().ok_or(Category::NoVersion)?;

    let serialize_concurrently = version.supports_concurrent_accept();
    if !serialize_concurrently && !ctx.shared.accept_guards.try_acquire(&id) {
        return Err(Category::AlreadyAccepting);
    }

    let result = ctx.shared.collaborators.acceptor.accept(&session.destination).await;

    if !serialize_concurrently {
        ctx.shared.accept_guards.release(&id);
    }

    match result {
        Ok(inbound) => {
            let preamble = if silent {
                Vec::new()
            } else {
                Response::new("STREAM")
                    .action("STATUS")
                    .result("OK")
                    .line(format!(
                        "{} FROM_PORT={} TO_PORT={}",
                        inbound.remote.canonical(),
                        inbound.from_port,
                        inbound.to_port
                    ))
                    .into_bytes()
            };
            Ok(HandlerOutcome::Splice(SpliceTarget {
                peer: inbound.socket,
                preamble,
            }))
        }
        Err(error) => dial_failure(error.into(), silent),
    }
}

pub async fn forward(ctx: &mut ConnectionContext, command: &Command) -> HandlerOutcome {
    match forward_inner(ctx, command).await {
        Ok(response) => HandlerOutcome::Reply(response),
        Err(category) => HandlerOutcome::error("STREAM", "STATUS", category),
    }
}

/// HOST defaults to the control connection's own source address when
/// omitted (spec §4.4 step 2), IPv6 brackets unwrapped and any zone id
/// preserved.
fn default_forward_host(ctx: &ConnectionContext) -> Result<String, Category> {
    match ctx.peer_addr {
        Some(SocketAddr::V4(v4)) => Ok(v4.ip().to_string()),
        Some(SocketAddr::V6(v6)) => {
            let ip = v6.ip().to_string();
            Ok(if v6.scope_id() != 0 {
                format!("{ip}%{}", v6.scope_id())
            } else {
                ip
            })
        }
        None => Err(Category::InvalidKey(
            "missing HOST and no client source address available".to_string(),
        )),
    }
}

async fn forward_inner(ctx: &mut ConnectionContext, command: &Command) -> Result<Response, Category> {
    ctx.require_auth()?;

    let id = SessionId::new(validate::session_id(command.option("ID"))?);
    let session = ctx.shared.registry.get(&id).ok_or(Category::SessionNotFound)?;
    if session.style != Style::Stream {
        return Err(Category::InvalidKey("session is not a STREAM session".to_string()));
    }

    let host = match command.option("HOST") {
        Some(value) => value.to_string(),
        None => default_forward_host(ctx)?,
    };
    let port = validate::port(command.option("PORT"))?;
    let ssl = validate::boolean(command.option("SSL"), false)?;
    // Bracket a bare IPv6 literal (zone included) so `SocketAddr`'s parser
    // accepts it; an already-bracketed HOST or an IPv4/hostname passes
    // through untouched.
    let literal = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    };
    let addr: SocketAddr = literal
        .parse()
        .map_err(|_| Category::InvalidKey("invalid HOST/PORT".to_string()))?;

    ctx.shared
        .collaborators
        .forwarder
        .forward(&session.destination, addr, ssl)
        .await?;

    Ok(Response::new("STREAM").action("STATUS").result("OK"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::local;
    use crate::connection::{AcceptGuards, Shared, Version};
    use crate::session::registry::Registry;
    use crate::session::PrimaryTable;
    use std::sync::Arc;

    fn shared() -> Arc<Shared> {
        Arc::new(Shared {
            registry: Registry::new(),
            primaries: PrimaryTable::new(),
            accept_guards: AcceptGuards::new(),
            collaborators: Arc::new(local::collaborators()),
        })
    }

    fn handshaked(shared: Arc<Shared>) -> ConnectionContext {
        let mut context = ConnectionContext::new(shared);
        context.negotiate(Version(3, 0), Version(3, 3)).unwrap();
        context
    }

    async fn create_stream_session(ctx: &mut ConnectionContext, id: &str) {
        let command = Command::parse(
            format!("SESSION CREATE STYLE=STREAM ID={id} DESTINATION=TRANSIENT").as_bytes(),
        )
        .unwrap();
        crate::handlers::session::create(ctx, &command).await;
    }

    #[tokio::test]
    async fn connect_without_listener_is_peer_not_found() {
        let shared = shared();
        let mut ctx = handshaked(shared.clone());
        create_stream_session(&mut ctx, "client").await;

        let other = unreachable_destination();
        let command = Command::parse(
            format!("STREAM CONNECT ID=client DESTINATION={other}").as_bytes(),
        )
        .unwrap();
        match connect(&mut ctx, &command).await {
            HandlerOutcome::Reply(response) => {
                assert_eq!(response.serialize(), "STREAM STATUS RESULT=PEER_NOT_FOUND\n");
            }
            _ => panic!("expected a reply"),
        }
    }

    #[tokio::test]
    async fn connect_then_accept_splices_both_ends() {
        let shared = shared();
        let mut server = handshaked(shared.clone());
        create_stream_session(&mut server, "server").await;
        let mut client = handshaked(shared.clone());
        create_stream_session(&mut client, "client").await;

        let server_destination = server.shared.registry.get(&SessionId::new("server")).unwrap().destination.canonical().to_string();

        // `accept` must reach its `recv().await` (registering the acceptor
        // channel) before `connect` looks it up, so start it first and hand
        // control back to the scheduler before connecting.
        let accept_command = Command::parse(b"STREAM ACCEPT ID=server").unwrap();
        let accept_task = tokio::spawn(async move { accept(&mut server, &accept_command).await });
        tokio::task::yield_now().await;

        let connect_command = Command::parse(
            format!("STREAM CONNECT ID=client DESTINATION={server_destination}").as_bytes(),
        )
        .unwrap();
        let connect_outcome = connect(&mut client, &connect_command).await;
        let accept_outcome = accept_task.await.unwrap();

        assert!(matches!(accept_outcome, HandlerOutcome::Splice(_)));
        assert!(matches!(connect_outcome, HandlerOutcome::Splice(_)));
    }

    #[tokio::test]
    async fn second_concurrent_accept_pre_32_is_already_accepting() {
        let shared = shared();
        let mut ctx = ConnectionContext::new(shared.clone());
        ctx.negotiate(Version(3, 0), Version(3, 1)).unwrap();
        create_stream_session(&mut ctx, "server").await;

        assert!(shared.accept_guards.try_acquire(&SessionId::new("server")));
        let command = Command::parse(b"STREAM ACCEPT ID=server").unwrap();
        let err = accept_inner(&mut ctx, &command).await.unwrap_err();
        assert_eq!(err, Category::AlreadyAccepting);
    }

    #[tokio::test]
    async fn forward_registers_target() {
        let shared = shared();
        let mut ctx = handshaked(shared);
        create_stream_session(&mut ctx, "server").await;
        let command = Command::parse(b"STREAM FORWARD ID=server HOST=127.0.0.1 PORT=9999").unwrap();
        match forward(&mut ctx, &command).await {
            HandlerOutcome::Reply(response) => {
                assert_eq!(response.serialize(), "STREAM STATUS RESULT=OK\n");
            }
            _ => panic!("expected a reply"),
        }
    }

    fn unreachable_destination() -> String {
        crate::destination::Destination::from_bytes(vec![99, 98, 97]).canonical().to_string()
    }
}
