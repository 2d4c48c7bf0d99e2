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

//! One module per SAM verb family (spec §4.4-§4.7).

pub mod auth;
pub mod datagram;
pub mod dest;
pub mod hello;
pub mod naming;
pub mod raw;
pub mod session;
pub mod stream;
pub mod util;

use crate::destination::Destination;
use crate::error::Category;

/// Resolve a `DESTINATION=`-style value that may be either a canonical
/// destination key or a hostname to look up via the naming collaborator
/// (spec §4.4 "DESTINATION resolution").
pub(crate) async fn resolve_destination(
    ctx: &crate::connection::ConnectionContext,
    value: &str,
) -> Result<Destination, Category> {
    match Destination::parse(value) {
        Ok(destination) => Ok(destination),
        Err(_) => ctx.shared.collaborators.resolver.resolve(value).await,
    }
}
