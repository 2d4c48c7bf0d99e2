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

//! Command dispatch: `VERB [ACTION]` -> handler (spec §4.3 "Router").

use crate::collaborators::AsyncDuplex;
use crate::connection::ConnectionContext;
use crate::error::Category;
use crate::wire::{Command, Response};

/// Where a `STREAM CONNECT`/`ACCEPT` splices this socket to once the
/// control-protocol exchange for it is done (spec §9 "Splicing").
pub struct SpliceTarget {
    pub peer: Box<dyn AsyncDuplex>,
    /// Bytes already produced for the client (e.g. the `STREAM STATUS`
    /// line, and for pre-3.2 `ACCEPT`, nothing) that must be written to the
    /// control socket before the byte-for-byte splice begins.
    pub preamble: Vec<u8>,
}

/// What the dispatcher should do with a connection after handling one
/// command.
pub enum HandlerOutcome {
    /// Write this response and keep reading commands.
    Reply(Response),
    /// A `SILENT=true` failure, or `QUIT`/`STOP`/`EXIT`: close the socket
    /// without writing anything.
    SilentClose,
    /// Splice the control socket into `target` and stop parsing SAM
    /// commands on it.
    Splice(SpliceTarget),
    /// One-way commands (`DATAGRAM SEND`, `RAW SEND`) succeed silently;
    /// nothing is written and the connection stays in the command loop.
    NoReply,
    /// Write this response, then close the socket: a failed `HELLO`, or any
    /// command arriving before a successful `HELLO` (spec §4.3 "terminal
    /// transition", §4.8 "HELLO failure", §8 "commands before HELLO").
    ReplyThenClose(Response),
}

impl HandlerOutcome {
    /// Build a `Reply` from a [`Category`], using `verb`/`action` for the
    /// response line (spec §7: one authoritative error-to-result mapping).
    pub fn error(verb: &str, action: &str, category: Category) -> Self {
        if category == Category::SilentClose {
            return HandlerOutcome::SilentClose;
        }
        Self::Reply(Response::new(verb).action(action).error(&category))
    }
}

/// Dispatch one parsed command. Unknown verb/action combinations, and
/// commands invalid for the connection's current state, come back as an
/// `I2P_ERROR` reply rather than a panic (spec §4.8 "Unknown command").
pub async fn dispatch(ctx: &mut ConnectionContext, command: Command) -> HandlerOutcome {
    let is_hello = matches!((command.verb.as_str(), command.action.as_str()), ("HELLO", "VERSION"));
    if !is_hello && !ctx.is_handshaked() {
        return HandlerOutcome::ReplyThenClose(
            Response::new("HELLO").action("REPLY").error(&Category::NoVersion),
        );
    }

    match (command.verb.as_str(), command.action.as_str()) {
        ("HELLO", "VERSION") => crate::handlers::hello::version(ctx, &command),

        ("SESSION", "CREATE") => crate::handlers::session::create(ctx, &command).await,
        ("SESSION", "ADD") => crate::handlers::session::add(ctx, &command).await,
        ("SESSION", "REMOVE") => crate::handlers::session::remove(ctx, &command),

        ("STREAM", "CONNECT") => crate::handlers::stream::connect(ctx, &command).await,
        ("STREAM", "ACCEPT") => crate::handlers::stream::accept(ctx, &command).await,
        ("STREAM", "FORWARD") => crate::handlers::stream::forward(ctx, &command).await,

        ("DATAGRAM", "SEND") => crate::handlers::datagram::send(ctx, &command).await,
        ("RAW", "SEND") => crate::handlers::raw::send(ctx, &command).await,

        ("NAMING", "LOOKUP") => crate::handlers::naming::lookup(ctx, &command).await,
        ("DEST", "GENERATE") => crate::handlers::dest::generate(ctx, &command).await,

        ("AUTH", "ENABLE") => crate::handlers::auth::enable(ctx, &command).await,
        ("AUTH", "DISABLE") => crate::handlers::auth::disable(ctx, &command).await,
        ("AUTH", "ADD") => crate::handlers::auth::add(ctx, &command).await,
        ("AUTH", "REMOVE") => crate::handlers::auth::remove(ctx, &command).await,
        ("AUTH", "LIST") => crate::handlers::auth::list(ctx, &command).await,

        ("PING", _) => crate::handlers::util::pong(&command),
        ("QUIT", _) | ("STOP", _) | ("EXIT", _) => HandlerOutcome::SilentClose,
        ("HELP", _) => crate::handlers::util::help(),

        (verb, action) => {
            let mut response = Response::new(verb);
            if !action.is_empty() {
                response = response.action(action);
            }
            HandlerOutcome::Reply(
                response.error(&Category::I2pError(format!("unrecognized command: {verb} {action}"))),
            )
        }
    }
}
