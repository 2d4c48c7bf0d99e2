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

//! `RAW SEND` (spec §4.5).

use crate::connection::router::HandlerOutcome;
use crate::connection::ConnectionContext;
use crate::error::Category;
use crate::handlers::resolve_destination;
use crate::session::Style;
use crate::wire::{validate, Command};

/// Anonymous raw datagrams carry no signature, so the router allows a
/// slightly larger plaintext payload than DATAGRAM's 31744.
pub(crate) const MAX_RAW_DATAGRAM_SIZE: usize = 32_768;

pub async fn send(ctx: &mut ConnectionContext, command: &Command) -> HandlerOutcome {
    match send_inner(ctx, command).await {
        Ok(()) => HandlerOutcome::NoReply,
        Err(category) => HandlerOutcome::error("RAW", "STATUS", category),
    }
}

async fn send_inner(ctx: &mut ConnectionContext, command: &Command) -> Result<(), Category> {
    let session = ctx
        .shared
        .registry
        .most_recent_by_style(Style::Raw)
        .ok_or(Category::SessionNotFound)?;

    let destination_value = command
        .option("DESTINATION")
        .ok_or_else(|| Category::InvalidKey("missing DESTINATION".to_string()))?;
    let to = resolve_destination(ctx, destination_value).await?;

    let size: usize = command
        .option("SIZE")
        .ok_or_else(|| Category::InvalidKey("missing SIZE".to_string()))?
        .parse()
        .map_err(|_| Category::InvalidKey("invalid SIZE".to_string()))?;
    if size == 0 || size > MAX_RAW_DATAGRAM_SIZE {
        return Err(Category::InvalidKey(format!("SIZE out of range: {size}")));
    }
    if command.payload.len() != size {
        return Err(Category::I2pError("payload size mismatch".to_string()));
    }

    let protocol = match command.option("PROTOCOL") {
        Some(value) => validate::raw_protocol(Some(value))?,
        None => session.config.raw_protocol,
    };
    let from_port = validate::port(command.option("FROM_PORT"))?;
    let to_port = validate::port(command.option("TO_PORT"))?;

    ctx.shared
        .collaborators
        .raw
        .send(
            &session.id,
            &session.destination,
            &to,
            protocol,
            from_port,
            to_port,
            command.payload.clone(),
        )
        .await
        .map_err(|_| Category::I2pError("raw send failed".to_string()))
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

    async fn create_raw_session(ctx: &mut ConnectionContext, id: &str) {
        let command = Command::parse(
            format!("SESSION CREATE STYLE=RAW ID={id} DESTINATION=TRANSIENT").as_bytes(),
        )
        .unwrap();
        crate::handlers::session::create(ctx, &command).await;
    }

    #[tokio::test]
    async fn send_to_subscribed_destination_succeeds() {
        let mut ctx = ctx();
        create_raw_session(&mut ctx, "r1").await;
        let record = ctx.shared.registry.most_recent_by_style(Style::Raw).unwrap();
        let mut receiver = ctx
            .shared
            .collaborators
            .raw
            .subscribe(&record.id, &record.destination);

        let target = record.destination.canonical().to_string();
        let mut command =
            Command::parse(format!("RAW SEND DESTINATION={target} SIZE=2").as_bytes()).unwrap();
        command.payload = vec![4, 4];

        assert!(matches!(send(&mut ctx, &command).await, HandlerOutcome::NoReply));
        let received = receiver.recv().await.unwrap();
        assert_eq!(received.payload, vec![4, 4]);
        assert_eq!(received.protocol, 18);
    }

    #[tokio::test]
    async fn rejects_disallowed_protocol() {
        let mut ctx = ctx();
        create_raw_session(&mut ctx, "r1").await;
        let target = crate::destination::Destination::from_bytes(vec![1]).canonical().to_string();
        let mut command = Command::parse(
            format!("RAW SEND DESTINATION={target} SIZE=1 PROTOCOL=6").as_bytes(),
        )
        .unwrap();
        command.payload = vec![0];
        match send(&mut ctx, &command).await {
            HandlerOutcome::Reply(response) => {
                assert!(response.serialize().contains("RESULT=INVALID_KEY"));
            }
            _ => panic!("expected a reply"),
        }
    }

    #[tokio::test]
    async fn rejects_without_session() {
        let mut ctx = ctx();
        let target = crate::destination::Destination::from_bytes(vec![1]).canonical().to_string();
        let mut command =
            Command::parse(format!("RAW SEND DESTINATION={target} SIZE=1").as_bytes()).unwrap();
        command.payload = vec![0];
        match send(&mut ctx, &command).await {
            HandlerOutcome::Reply(response) => {
                assert!(response.serialize().contains("RESULT=INVALID_ID"));
            }
            _ => panic!("expected a reply"),
        }
    }
}
