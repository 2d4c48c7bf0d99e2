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

//! `DEST GENERATE` (spec §4.7).

use crate::connection::router::HandlerOutcome;
use crate::connection::ConnectionContext;
use crate::error::Category;
use crate::wire::{validate, Command, Response};

/// Options that only make sense for an offline-signature destination; none
/// of them are meaningful for a freshly generated keypair.
const OFFLINE_OPTIONS: &[&str] = &["OFFLINE_EXPIRATION", "OFFLINE_SIGNATURE", "TRANSIENT_SIG_TYPE"];

pub async fn generate(ctx: &mut ConnectionContext, command: &Command) -> HandlerOutcome {
    match generate_inner(ctx, command).await {
        Ok(response) => HandlerOutcome::Reply(response),
        Err(category) => HandlerOutcome::error("DEST", "REPLY", category),
    }
}

async fn generate_inner(ctx: &mut ConnectionContext, command: &Command) -> Result<Response, Category> {
    for option in OFFLINE_OPTIONS {
        if command.has_option(option) {
            return Err(Category::InvalidKey(format!("{option} is not valid for DEST GENERATE")));
        }
    }

    let signature_type = validate::signature_type(command.option("SIGNATURE_TYPE"))?;
    let bundle = ctx.shared.collaborators.destinations.generate(signature_type).await?;

    Ok(Response::new("DEST")
        .action("REPLY")
        .field("PUB", bundle.destination.canonical().to_string())
        .field("PRIV", bundle.encode()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::local;
    use crate::connection::{AcceptGuards, Shared};
    use crate::session::{registry::Registry, PrimaryTable};
    use std::sync::Arc;

    fn ctx() -> ConnectionContext {
        ConnectionContext::new(Arc::new(Shared {
            registry: Registry::new(),
            primaries: PrimaryTable::new(),
            accept_guards: AcceptGuards::new(),
            collaborators: Arc::new(local::collaborators()),
        }))
    }

    #[tokio::test]
    async fn generate_defaults_to_ed25519() {
        let mut ctx = ctx();
        let command = Command::parse(b"DEST GENERATE").unwrap();
        match generate(&mut ctx, &command).await {
            HandlerOutcome::Reply(response) => {
                assert!(response.serialize().starts_with("DEST REPLY PUB="));
                assert!(response.serialize().contains(" PRIV="));
            }
            _ => panic!("expected a reply"),
        }
    }

    #[tokio::test]
    async fn rejects_offline_options() {
        let mut ctx = ctx();
        let command = Command::parse(b"DEST GENERATE OFFLINE_EXPIRATION=1").unwrap();
        match generate(&mut ctx, &command).await {
            HandlerOutcome::Reply(response) => {
                assert!(response.serialize().contains("RESULT=INVALID_KEY"));
            }
            _ => panic!("expected a reply"),
        }
    }
}
