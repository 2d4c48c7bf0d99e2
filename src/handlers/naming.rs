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

//! `NAMING LOOKUP` (spec §4.7).

use crate::connection::router::HandlerOutcome;
use crate::connection::ConnectionContext;
use crate::destination::Destination;
use crate::error::Category;
use crate::wire::{validate, Command, Response};

pub async fn lookup(ctx: &mut ConnectionContext, command: &Command) -> HandlerOutcome {
    match lookup_inner(ctx, command).await {
        Ok(response) => HandlerOutcome::Reply(response),
        Err(category) => HandlerOutcome::error("NAMING", "REPLY", category),
    }
}

async fn lookup_inner(ctx: &mut ConnectionContext, command: &Command) -> Result<Response, Category> {
    let name = command
        .option("NAME")
        .ok_or_else(|| Category::InvalidKey("missing NAME".to_string()))?;

    let destination = if name.eq_ignore_ascii_case("ME") {
        let id = ctx.bound_session().ok_or(Category::InvalidKey("not bound to a session".to_string()))?;
        ctx.shared
            .registry
            .get(id)
            .ok_or(Category::InvalidKey("not bound to a session".to_string()))?
            .destination
            .clone()
    } else if let Ok(destination) = Destination::parse(name) {
        destination
    } else {
        ctx.shared.collaborators.resolver.resolve(name).await?
    };

    let mut response = Response::new("NAMING")
        .action("REPLY")
        .field("NAME", name.to_string());

    if validate::boolean(command.option("OPTIONS"), false)? {
        if !ctx.shared.collaborators.leasesets.has_leaseset(&destination).await {
            return Err(Category::LeasesetNotFound);
        }
        // A real deployment would enumerate actual leaseset option records
        // here; filter out anything that can't round-trip through the
        // `OPTION:<key>=<value>` line format (spec §4.7 "Option filtering").
    }

    response = response.result("OK").field("VALUE", destination.canonical().to_string());
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::local;
    use crate::connection::{AcceptGuards, Shared, Version};
    use crate::session::registry::Registry;
    use crate::session::PrimaryTable;
    use std::sync::Arc;

    fn ctx() -> ConnectionContext {
        let mut context = ConnectionContext::new(Arc::new(Shared {
            registry: Registry::new(),
            primaries: PrimaryTable::new(),
            accept_guards: AcceptGuards::new(),
            collaborators: Arc::new(local::collaborators()),
        }));
        context.negotiate(Version(3, 0), Version(3, 3)).unwrap();
        context
    }

    #[tokio::test]
    async fn me_without_bound_session_is_invalid_key() {
        let mut ctx = ctx();
        let command = Command::parse(b"NAMING LOOKUP NAME=ME").unwrap();
        match lookup(&mut ctx, &command).await {
            HandlerOutcome::Reply(response) => {
                assert!(response.serialize().contains("RESULT=INVALID_KEY"));
            }
            _ => panic!("expected a reply"),
        }
    }

    #[tokio::test]
    async fn me_with_bound_session_returns_destination() {
        let mut ctx = ctx();
        let create =
            Command::parse(b"SESSION CREATE STYLE=STREAM ID=s1 DESTINATION=TRANSIENT").unwrap();
        crate::handlers::session::create(&mut ctx, &create).await;

        let command = Command::parse(b"NAMING LOOKUP NAME=ME").unwrap();
        match lookup(&mut ctx, &command).await {
            HandlerOutcome::Reply(response) => {
                assert!(response.serialize().starts_with("NAMING REPLY RESULT=OK NAME=ME VALUE="));
            }
            _ => panic!("expected a reply"),
        }
    }

    #[tokio::test]
    async fn unregistered_hostname_is_key_not_found() {
        let mut ctx = ctx();
        let command = Command::parse(b"NAMING LOOKUP NAME=unknown.i2p").unwrap();
        match lookup(&mut ctx, &command).await {
            HandlerOutcome::Reply(response) => {
                assert!(response.serialize().contains("RESULT=KEY_NOT_FOUND"));
            }
            _ => panic!("expected a reply"),
        }
    }
}
