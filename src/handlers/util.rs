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

//! `PING`/`HELP` (spec §4.7).

use crate::connection::router::HandlerOutcome;
use crate::wire::{Command, Response};

/// `PING [arg]` -> `PONG [arg]`, echoing whatever followed `PING` verbatim.
pub fn pong(command: &Command) -> HandlerOutcome {
    let arg = command.raw.strip_prefix("PING").unwrap_or("").trim();
    let response = if arg.is_empty() {
        Response::new("PONG")
    } else {
        Response::new("PONG").action(arg.to_string())
    };
    HandlerOutcome::Reply(response)
}

/// `HELP`: a fixed textual enumeration of supported verbs.
pub fn help() -> HandlerOutcome {
    let response = Response::new("HELP")
        .action("REPLY")
        .result("OK")
        .line("HELLO VERSION")
        .line("SESSION CREATE|ADD|REMOVE")
        .line("STREAM CONNECT|ACCEPT|FORWARD")
        .line("DATAGRAM SEND")
        .line("RAW SEND")
        .line("NAMING LOOKUP")
        .line("DEST GENERATE")
        .line("AUTH ENABLE|DISABLE|ADD|REMOVE|LIST")
        .line("PING|QUIT|STOP|EXIT");
    HandlerOutcome::Reply(response)
}
