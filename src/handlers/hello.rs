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

//! `HELLO VERSION` (spec §4.3 "Version negotiation").

use crate::connection::{router::HandlerOutcome, ConnectionContext, Version, MAX_VERSION, MIN_VERSION};
use crate::error::Category;
use crate::wire::{Command, Response};

pub fn version(ctx: &mut ConnectionContext, command: &Command) -> HandlerOutcome {
    let min = command
        .option("MIN")
        .and_then(Version::parse)
        .unwrap_or(MIN_VERSION);
    let max = command
        .option("MAX")
        .and_then(Version::parse)
        .unwrap_or(MAX_VERSION);

    match ctx.negotiate(min, max) {
        Ok(version) => HandlerOutcome::Reply(
            Response::new("HELLO")
                .action("REPLY")
                .result("OK")
                .field("VERSION", version.to_string()),
        ),
        // No common version: this is the terminal handshake failure spec
        // §4.3/§4.8 close the socket after (as opposed to e.g. a second
        // HELLO on an already-handshaked connection, which just errors).
        Err(Category::NoVersion) => HandlerOutcome::ReplyThenClose(
            Response::new("HELLO").action("REPLY").error(&Category::NoVersion),
        ),
        Err(category) => HandlerOutcome::error("HELLO", "REPLY", category),
    }
}
