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

//! `DATAGRAM SEND` (spec §4.5).

use crate::connection::router::HandlerOutcome;
use crate::connection::ConnectionContext;
use crate::error::Category;
use crate::handlers::resolve_destination;
use crate::session::Style;
use crate::wire::{validate, Command, Response};

/// Repliable datagrams carry a signature; the I2P router caps their
/// plaintext payload at 31744 bytes.
pub(crate) const MAX_DATAGRAM_SIZE: usize = 31_744;

pub async fn send(ctx: &mut ConnectionContext, command: &Command) -> HandlerOutcome {
    match send_inner(ctx, command).await {
        Ok(()) => HandlerOutcome::NoReply,
        Err(category) => HandlerOutcome::error("DATAGRAM", "STATUS", category),
    }
}

async fn send_inner(ctx: &mut ConnectionContext, command: &Command) -> Result<(), Category> {
    let datagram_styles = [Style::Datagram, Style::Datagram2, Style::Datagram3];
    let session = datagram_styles
        .iter()
        .find_map(|style| ctx.shared.registry.most_recent_by_style(*style))
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
    if size == 0 || size > MAX_DATAGRAM_SIZE {
        return Err(Category::InvalidKey(format!("SIZE out of range: {size}")));
    }
    if command.payload.len() != size {
        return Err(Category::I2pError("payload size mismatch".to_string()));
    }

    let from_port = validate::port(command.option("FROM_PORT"))?;
    let to_port = validate::port(command.option("TO_PORT"))?;

    // SAM 3.3 send-time options; accepted for protocol compatibility but a
    // local-only transport has no tag pool or leaseset to apply them to.
    let _ = validate_send_options(command)?;

    ctx.shared
        .collaborators
        .datagrams
        .send(&session.id, &session.destination, &to, from_port, to_port, command.payload.clone())
        .await
        .map_err(|_| Category::I2pError("datagram send failed".to_string()))
}

struct SendOptions {
    #[allow(dead_code)]
    tag_threshold: Option<u8>,
    #[allow(dead_code)]
    expires: Option<u32>,
    #[allow(dead_code)]
    send_leaseset: bool,
}

fn validate_send_options(command: &Command) -> Result<SendOptions, Category> {
    let tag_threshold = match command.option("TAG_THRESHOLD") {
        None => None,
        Some(value) => {
            let parsed: u8 = value
                .parse()
                .map_err(|_| Category::InvalidKey("invalid TAG_THRESHOLD".to_string()))?;
            if parsed > 15 {
                return Err(Category::InvalidKey("TAG_THRESHOLD out of range".to_string()));
            }
            Some(parsed)
        }
    };

    let expires = match command.option("EXPIRES") {
        None => None,
        Some(value) => {
            let parsed: u32 = value
                .parse()
                .map_err(|_| Category::InvalidKey("invalid EXPIRES".to_string()))?;
            if parsed > 86_400 {
                return Err(Category::InvalidKey("EXPIRES out of range".to_string()));
            }
            Some(parsed)
        }
    };

    let send_leaseset = validate::boolean(command.option("SEND_LEASESET"), true)?;

    Ok(SendOptions {
        tag_threshold,
        expires,
        send_leaseset,
    })
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

    async fn create_datagram_session(ctx: &mut ConnectionContext, id: &str) {
        let command = Command::parse(
            format!("SESSION CREATE STYLE=DATAGRAM ID={id} DESTINATION=TRANSIENT").as_bytes(),
        )
        .unwrap();
        crate::handlers::session::create(ctx, &command).await;
    }

    #[tokio::test]
    async fn send_without_subscriber_is_i2p_error() {
        let mut ctx = ctx();
        create_datagram_session(&mut ctx, "d1").await;

        let target = crate::destination::Destination::from_bytes(vec![7, 7, 7]).canonical().to_string();
        let mut command = Command::parse(
            format!("DATAGRAM SEND DESTINATION={target} SIZE=3").as_bytes(),
        )
        .unwrap();
        command.payload = vec![1, 2, 3];

        match send(&mut ctx, &command).await {
            HandlerOutcome::Reply(response) => {
                assert_eq!(response.serialize(), "DATAGRAM STATUS RESULT=I2P_ERROR MESSAGE=\"datagram send failed\"\n");
            }
            _ => panic!("expected a reply"),
        }
    }

    #[tokio::test]
    async fn send_to_subscribed_destination_succeeds() {
        let mut ctx = ctx();
        create_datagram_session(&mut ctx, "d1").await;
        let record = ctx.shared.registry.most_recent_by_style(Style::Datagram).unwrap();
        let mut receiver = ctx
            .shared
            .collaborators
            .datagrams
            .subscribe(&record.id, &record.destination);

        let target = record.destination.canonical().to_string();
        let mut command =
            Command::parse(format!("DATAGRAM SEND DESTINATION={target} SIZE=3").as_bytes())
                .unwrap();
        command.payload = vec![9, 9, 9];

        assert!(matches!(send(&mut ctx, &command).await, HandlerOutcome::NoReply));
        let received = receiver.recv().await.unwrap();
        assert_eq!(received.payload, vec![9, 9, 9]);
    }

    #[tokio::test]
    async fn rejects_size_mismatch() {
        let mut ctx = ctx();
        create_datagram_session(&mut ctx, "d1").await;
        let target = crate::destination::Destination::from_bytes(vec![7]).canonical().to_string();
        let mut command =
            Command::parse(format!("DATAGRAM SEND DESTINATION={target} SIZE=5").as_bytes())
                .unwrap();
        command.payload = vec![1, 2, 3];
        match send(&mut ctx, &command).await {
            HandlerOutcome::Reply(response) => {
                assert!(response.serialize().contains("RESULT=I2P_ERROR"));
            }
            _ => panic!("expected a reply"),
        }
    }
}
