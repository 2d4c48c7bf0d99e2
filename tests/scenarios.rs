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

//! End-to-end replays of the numbered scenarios from spec.md's "Testable
//! properties" section, driven straight at `connection::router::dispatch`
//! rather than through a real socket — the dispatcher is the one thing
//! every transport (TCP, UDP ingress) funnels through.

use samv3_bridge::collaborators::local;
use samv3_bridge::connection::router::{dispatch, HandlerOutcome};
use samv3_bridge::connection::{AcceptGuards, ConnectionContext, Shared, Version};
use samv3_bridge::error::Category;
use samv3_bridge::session::registry::Registry;
use samv3_bridge::session::PrimaryTable;
use samv3_bridge::wire::Command;
use std::sync::Arc;

fn shared() -> Arc<Shared> {
    Arc::new(Shared {
        registry: Registry::new(),
        primaries: PrimaryTable::new(),
        accept_guards: AcceptGuards::new(),
        collaborators: Arc::new(local::collaborators()),
    })
}

async fn run(ctx: &mut ConnectionContext, line: &str) -> HandlerOutcome {
    let command = Command::parse(line.as_bytes()).unwrap();
    dispatch(ctx, command).await
}

fn reply(outcome: HandlerOutcome) -> String {
    match outcome {
        HandlerOutcome::Reply(response) => response.serialize(),
        _ => panic!("expected a reply"),
    }
}

/// Scenario 1: handshake, transient STREAM session, `NAMING LOOKUP NAME=ME`.
#[tokio::test]
async fn handshake_transient_session_lookup_me() {
    let mut ctx = ConnectionContext::new(shared());

    let hello = reply(run(&mut ctx, "HELLO VERSION MIN=3.1 MAX=3.3").await);
    assert_eq!(hello, "HELLO REPLY RESULT=OK VERSION=3.3\n");

    let session = reply(run(&mut ctx, "SESSION CREATE STYLE=STREAM ID=t1 DESTINATION=TRANSIENT").await);
    assert!(session.starts_with("SESSION STATUS RESULT=OK DESTINATION="));
    let destination = session
        .strip_prefix("SESSION STATUS RESULT=OK DESTINATION=")
        .unwrap()
        .trim_end()
        .to_string();

    let lookup = reply(run(&mut ctx, "NAMING LOOKUP NAME=ME").await);
    assert_eq!(lookup, format!("NAMING REPLY RESULT=OK NAME=ME VALUE={destination}\n"));
}

/// Scenario 2: duplicated ID across two connections sharing one registry.
#[tokio::test]
async fn duplicated_id_across_connections() {
    let shared = shared();

    let mut first = ConnectionContext::new(shared.clone());
    run(&mut first, "HELLO VERSION MIN=3.0 MAX=3.3").await;
    let created = reply(run(&mut first, "SESSION CREATE STYLE=STREAM ID=dup DESTINATION=TRANSIENT").await);
    assert!(created.starts_with("SESSION STATUS RESULT=OK"));

    let mut second = ConnectionContext::new(shared);
    run(&mut second, "HELLO VERSION MIN=3.0 MAX=3.3").await;
    let duplicate = reply(run(&mut second, "SESSION CREATE STYLE=STREAM ID=dup DESTINATION=TRANSIENT").await);
    assert_eq!(duplicate, "SESSION STATUS RESULT=DUPLICATED_ID\n");
}

/// Scenario 3: concurrent `STREAM ACCEPT` on the same session is rejected
/// pre-3.2 and allowed from 3.2 on.
#[tokio::test]
async fn concurrent_accept_gating_is_version_dependent() {
    let shared = shared();

    let mut pre32 = ConnectionContext::new(shared.clone());
    pre32.negotiate(Version(3, 0), Version(3, 1)).unwrap();
    run(&mut pre32, "SESSION CREATE STYLE=STREAM ID=s1 DESTINATION=TRANSIENT").await;
    assert!(shared.accept_guards.try_acquire(&samv3_bridge::session::SessionId::new("s1")));
    let rejected = reply(run(&mut pre32, "STREAM ACCEPT ID=s1").await);
    assert_eq!(rejected, "STREAM STATUS RESULT=ALREADY_ACCEPTING\n");
    shared.accept_guards.release(&samv3_bridge::session::SessionId::new("s1"));

    let shared32 = shared();
    let mut a = ConnectionContext::new(shared32.clone());
    a.negotiate(Version(3, 0), Version(3, 3)).unwrap();
    run(&mut a, "SESSION CREATE STYLE=STREAM ID=s2 DESTINATION=TRANSIENT").await;
    let mut b = ConnectionContext::new(shared32.clone());
    b.negotiate(Version(3, 0), Version(3, 3)).unwrap();

    let accept_command = Command::parse(b"STREAM ACCEPT ID=s2").unwrap();
    let first = tokio::spawn(async move { dispatch(&mut a, accept_command).await });
    tokio::task::yield_now().await;

    let connect_command = {
        let destination = shared32
            .registry
            .get(&samv3_bridge::session::SessionId::new("s2"))
            .unwrap()
            .destination
            .canonical()
            .to_string();
        Command::parse(format!("STREAM CONNECT ID=s2 DESTINATION={destination}").as_bytes()).unwrap()
    };
    // A second accept on a 3.2+ connection must be let through regardless
    // of whether the first is still pending: attempt it concurrently.
    let second_ctx_shared = shared32.clone();
    let second = tokio::spawn(async move {
        let mut ctx = ConnectionContext::new(second_ctx_shared);
        ctx.negotiate(Version(3, 0), Version(3, 3)).unwrap();
        let command = Command::parse(b"STREAM ACCEPT ID=s2").unwrap();
        dispatch(&mut ctx, command).await
    });
    tokio::task::yield_now().await;

    let mut connector_ctx = ConnectionContext::new(shared32.clone());
    connector_ctx.negotiate(Version(3, 0), Version(3, 3)).unwrap();
    run(&mut connector_ctx, "SESSION CREATE STYLE=STREAM ID=client DESTINATION=TRANSIENT").await;
    let connect_outcome = dispatch(&mut connector_ctx, connect_command).await;
    assert!(matches!(connect_outcome, HandlerOutcome::Splice(_)));

    let first_outcome = first.await.unwrap();
    assert!(matches!(first_outcome, HandlerOutcome::Splice(_)));
    // The second acceptor never got a peer, so it's still pending; that's
    // fine for this property — the assertion under test is that it was let
    // through the guard at all rather than answered ALREADY_ACCEPTING.
    second.abort();
}

/// Scenario 4: `SILENT=true` CONNECT against an unreachable destination
/// writes nothing and closes the socket instead of replying with an error.
#[tokio::test]
async fn silent_connect_failure_closes_without_reply() {
    let shared = shared();
    let mut ctx = ConnectionContext::new(shared);
    ctx.negotiate(Version(3, 0), Version(3, 3)).unwrap();
    run(&mut ctx, "SESSION CREATE STYLE=STREAM ID=s1 DESTINATION=TRANSIENT").await;

    let unreachable = samv3_bridge::destination::Destination::from_bytes(vec![42, 42, 42])
        .canonical()
        .to_string();
    let outcome = run(
        &mut ctx,
        &format!("STREAM CONNECT ID=s1 DESTINATION={unreachable} SILENT=true"),
    )
    .await;
    assert!(matches!(outcome, HandlerOutcome::SilentClose));
}

/// Scenario 5: a disallowed RAW protocol on SESSION CREATE is rejected.
#[tokio::test]
async fn raw_session_rejects_disallowed_protocol() {
    let mut ctx = ConnectionContext::new(shared());
    ctx.negotiate(Version(3, 0), Version(3, 3)).unwrap();
    let response = reply(
        run(&mut ctx, "SESSION CREATE STYLE=RAW ID=r1 DESTINATION=TRANSIENT PROTOCOL=6").await,
    );
    assert!(response.starts_with("SESSION STATUS RESULT=I2P_ERROR"));
}

/// Scenario 6: `DATAGRAM RECEIVED` omits FROM_PORT/TO_PORT below version
/// 3.2 and includes them at/above it.
#[tokio::test]
async fn datagram_received_gates_port_fields_on_version() {
    use samv3_bridge::forwarding::spawn_datagram_forwarder;
    use tokio::sync::mpsc;

    let shared = shared();
    let bundle = local::collaborators().destinations.generate(7).await.unwrap();
    let id = samv3_bridge::session::SessionId::new("d1");
    let record = samv3_bridge::session::SessionRecord::new(
        id.clone(),
        samv3_bridge::session::Style::Datagram,
        bundle.destination.clone(),
        samv3_bridge::session::SessionConfig::default(),
    );
    shared.registry.register(record).unwrap();

    for (version, expect_ports) in [(Version(3, 0), false), (Version(3, 2), true)] {
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        spawn_datagram_forwarder(
            shared.collaborators.datagrams.clone(),
            id.clone(),
            bundle.destination.clone(),
            version,
            tx,
        );

        let sender = local::collaborators()
            .destinations
            .generate(7)
            .await
            .unwrap()
            .destination;
        shared
            .collaborators
            .datagrams
            .send(&id, &sender, &bundle.destination, 1234, 5678, b"hi".to_vec())
            .await
            .unwrap();

        let line = rx.recv().await.unwrap();
        let text = String::from_utf8(line).unwrap();
        if expect_ports {
            assert!(text.contains("FROM_PORT=1234 TO_PORT=5678"), "{text}");
        } else {
            assert!(!text.contains("FROM_PORT"), "{text}");
        }
        assert!(text.starts_with("DATAGRAM RECEIVED DESTINATION="));
        assert!(text.ends_with("hi"));
    }
}

#[tokio::test]
async fn unrecognized_command_is_i2p_error_not_a_panic() {
    let mut ctx = ConnectionContext::new(shared());
    run(&mut ctx, "HELLO VERSION MIN=3.0 MAX=3.3").await;
    let response = reply(run(&mut ctx, "BOGUS VERB").await);
    assert!(response.starts_with("BOGUS RESULT=I2P_ERROR"));
}

#[tokio::test]
async fn command_before_hello_is_rejected() {
    let mut ctx = ConnectionContext::new(shared());
    let outcome = run(&mut ctx, "SESSION CREATE STYLE=STREAM ID=t1 DESTINATION=TRANSIENT").await;
    match outcome {
        HandlerOutcome::ReplyThenClose(response) => {
            assert_eq!(response.serialize(), "HELLO REPLY RESULT=NOVERSION\n");
        }
        _ => panic!("expected a reply-then-close"),
    }
    assert!(ctx.bound_session().is_none());
}

#[allow(unused)]
fn category_is_exhaustively_matchable(category: Category) -> &'static str {
    category.result_code()
}
