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

//! Runtime configuration, read from the environment (spec §6 "Listener
//! endpoints"). Not a general CLI/config-file parser: the bridge is meant to
//! be launched by a process supervisor that sets a handful of env vars.

use std::time::Duration;

const DEFAULT_TCP_BIND: &str = "127.0.0.1:7656";
const DEFAULT_UDP_BIND: &str = "127.0.0.1:7655";

/// Bridge-wide configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Where the SAM control socket listens.
    pub tcp_bind: String,
    /// Where the datagram-ingress UDP socket listens.
    pub udp_bind: String,
    /// Whether to start the UDP ingress listener at all (spec §6 "UDP is
    /// optional: a bridge may support only TCP-side DATAGRAM SEND").
    pub udp_enabled: bool,
    /// `NAMING LOOKUP` / destination-resolution deadline.
    pub resolve_timeout: Duration,
    /// `STREAM CONNECT` dial deadline.
    pub dial_timeout: Duration,
    /// Maximum bytes accepted in one command line before the connection is
    /// dropped (spec §6 "max line length enforced, implementation-defined,
    /// >= 16 KiB").
    pub max_line_length: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            tcp_bind: DEFAULT_TCP_BIND.to_string(),
            udp_bind: DEFAULT_UDP_BIND.to_string(),
            udp_enabled: true,
            resolve_timeout: Duration::from_secs(30),
            dial_timeout: Duration::from_secs(60),
            max_line_length: 16 * 1024,
        }
    }
}

impl BridgeConfig {
    /// Load overrides from environment variables, falling back to the
    /// defaults above for anything unset or unparsable.
    ///
    /// - `SAMV3_BRIDGE_TCP_BIND` (default `127.0.0.1:7656`)
    /// - `SAMV3_BRIDGE_UDP_BIND` (default `127.0.0.1:7655`)
    /// - `SAMV3_BRIDGE_UDP_ENABLED` (`true`/`false`, default `true`)
    /// - `SAMV3_BRIDGE_RESOLVE_TIMEOUT_SECS` (default `30`)
    /// - `SAMV3_BRIDGE_DIAL_TIMEOUT_SECS` (default `60`)
    /// - `SAMV3_BRIDGE_MAX_LINE_LENGTH` (default `16384`)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            tcp_bind: std::env::var("SAMV3_BRIDGE_TCP_BIND").unwrap_or(defaults.tcp_bind),
            udp_bind: std::env::var("SAMV3_BRIDGE_UDP_BIND").unwrap_or(defaults.udp_bind),
            udp_enabled: std::env::var("SAMV3_BRIDGE_UDP_ENABLED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.udp_enabled),
            resolve_timeout: std::env::var("SAMV3_BRIDGE_RESOLVE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.resolve_timeout),
            dial_timeout: std::env::var("SAMV3_BRIDGE_DIAL_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.dial_timeout),
            max_line_length: std::env::var("SAMV3_BRIDGE_MAX_LINE_LENGTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_line_length),
        }
    }
}
