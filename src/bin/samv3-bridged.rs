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

use samv3_bridge::collaborators::local;
use samv3_bridge::connection::{AcceptGuards, Shared};
use samv3_bridge::datagram_ingress::DatagramIngress;
use samv3_bridge::session::{registry::Registry, PrimaryTable};
use samv3_bridge::{Bridge, BridgeConfig};
use std::sync::Arc;
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .unwrap();

    let config = BridgeConfig::from_env();

    // `local` never touches a real I2P router; swap this for a collaborator
    // bundle backed by an I2CP client once one exists (spec §6 "External
    // interfaces" deliberately leaves I2CP out of scope).
    let shared = Arc::new(Shared {
        registry: Registry::new(),
        primaries: PrimaryTable::new(),
        accept_guards: AcceptGuards::new(),
        collaborators: Arc::new(local::collaborators()),
    });

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);

    let bridge = Bridge::new(config.clone(), shared.clone());
    let bridge_shutdown = shutdown_tx.subscribe();
    let bridge_task = tokio::spawn(async move { bridge.run(bridge_shutdown).await });

    let udp_task = if config.udp_enabled {
        let ingress = DatagramIngress::new(shared.clone(), config.udp_bind.clone());
        let udp_shutdown = shutdown_tx.subscribe();
        Some(tokio::spawn(async move { ingress.run(udp_shutdown).await }))
    } else {
        None
    };

    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to install ctrl-c handler: {error}");
    }
    tracing::info!("shutting down");
    let _ = shutdown_tx.send(());

    if let Err(error) = bridge_task.await {
        tracing::warn!("control-socket task panicked: {error}");
    }
    if let Some(task) = udp_task {
        if let Err(error) = task.await {
            tracing::warn!("datagram-ingress task panicked: {error}");
        }
    }
}
