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

//! `SESSION CREATE`/`ADD`/`REMOVE` (spec §4.6).

use crate::connection::{router::HandlerOutcome, ConnectionContext};
use crate::error::Category;
use crate::forwarding::{spawn_datagram_forwarder, spawn_raw_forwarder};
use crate::session::{SessionConfig, SessionId, SessionRecord, Status, Style};
use crate::wire::{validate, Command, Response};

/// If `record` is a style that delivers inbound traffic (`DATAGRAM*`/`RAW`)
/// and this connection has somewhere to push `RECEIVED` lines, start the
/// forwarder task for it (spec §4.5, §4.6 step 5).
fn start_forwarder_if_applicable(ctx: &ConnectionContext, record: &SessionRecord) {
    let (Some(out_of_band), Some(version)) = (ctx.out_of_band.clone(), ctx.version()) else {
        return;
    };
    match record.style {
        Style::Datagram | Style::Datagram2 | Style::Datagram3 => spawn_datagram_forwarder(
            ctx.shared.collaborators.datagrams.clone(),
            record.id.clone(),
            record.destination.clone(),
            version,
            out_of_band,
        ),
        Style::Raw => spawn_raw_forwarder(
            ctx.shared.collaborators.raw.clone(),
            record.id.clone(),
            record.destination.clone(),
            version,
            out_of_band,
        ),
        Style::Stream | Style::Primary => {}
    }
}

pub async fn create(ctx: &mut ConnectionContext, command: &Command) -> HandlerOutcome {
    match create_inner(ctx, command).await {
        Ok(response) => HandlerOutcome::Reply(response),
        Err(category) => HandlerOutcome::error("SESSION", "STATUS", category),
    }
}

async fn create_inner(ctx: &mut ConnectionContext, command: &Command) -> Result<Response, Category> {
    ctx.require_auth()?;

    let style = validate::style(command.option("STYLE"))?;
    let id = SessionId::new(validate::session_id(command.option("ID"))?);
    let config = config_from_options(style, command)?;

    let destination_value = command.option("DESTINATION").unwrap_or("TRANSIENT");
    let bundle = if destination_value.eq_ignore_ascii_case("TRANSIENT") {
        ctx.shared.collaborators.destinations.generate(config.signature_type).await?
    } else {
        ctx.shared.collaborators.destinations.parse(destination_value).await?
    };

    let mut record = SessionRecord::new(id.clone(), style, bundle.destination.clone(), config);
    record.status = Status::Active;
    let forwarder_record = record.clone();

    ctx.shared.registry.register(record)?;
    if style == Style::Primary {
        ctx.shared.primaries.get_or_insert(id.clone());
    }

    if let Err(category) = ctx.bind(id.clone()) {
        ctx.shared.registry.unregister(&id);
        return Err(category);
    }
    start_forwarder_if_applicable(ctx, &forwarder_record);

    Ok(Response::new("SESSION")
        .action("STATUS")
        .result("OK")
        .field("DESTINATION", bundle.encode()))
}

pub async fn add(ctx: &mut ConnectionContext, command: &Command) -> HandlerOutcome {
    match add_inner(ctx, command).await {
        Ok(response) => HandlerOutcome::Reply(response),
        Err(category) => HandlerOutcome::error("SESSION", "STATUS", category),
    }
}

async fn add_inner(ctx: &mut ConnectionContext, command: &Command) -> Result<Response, Category> {
    ctx.require_auth()?;

    let style = validate::style(command.option("STYLE"))?;
    if style == Style::Primary {
        return Err(Category::InvalidKey(
            "PRIMARY cannot be added as a subsession".to_string(),
        ));
    }
    if command.option("DESTINATION").is_some() {
        return Err(Category::InvalidKey(
            "SESSION ADD does not accept DESTINATION (subsessions inherit the PRIMARY's)".to_string(),
        ));
    }
    let sub_id = SessionId::new(validate::session_id(command.option("ID"))?);

    let primary_id = ctx.bound_session().ok_or(Category::SessionNotFound)?.clone();
    let primary_record = ctx
        .shared
        .registry
        .get(&primary_id)
        .ok_or(Category::SessionNotFound)?;
    if primary_record.style != Style::Primary {
        return Err(Category::InvalidKey(
            "connection is not bound to a PRIMARY session".to_string(),
        ));
    }

    let subsessions = ctx.shared.primaries.get_or_insert(primary_id.clone());
    subsessions.add(sub_id.clone(), style)?;

    let mut config = match config_from_options(style, command) {
        Ok(config) => config,
        Err(category) => {
            subsessions.remove(&sub_id);
            return Err(category);
        }
    };
    config.signature_type = primary_record.config.signature_type;

    if style == Style::Stream {
        let listen_port = validate::port(command.option("LISTEN_PORT"))?;
        if listen_port != 0 && listen_port != config.from_port {
            subsessions.remove(&sub_id);
            return Err(Category::InvalidKey(
                "LISTEN_PORT must be 0 or equal to FROM_PORT".to_string(),
            ));
        }
    }

    let mut record = SessionRecord::new(sub_id.clone(), style, primary_record.destination.clone(), config);
    record.status = Status::Active;
    let forwarder_record = record.clone();

    if let Err(category) = ctx.shared.registry.register_subsession(record) {
        subsessions.remove(&sub_id);
        return Err(category);
    }
    // Subsessions deliver RECEIVED lines on the PRIMARY's own control
    // socket; there is no separate connection bound to the subsession id.
    start_forwarder_if_applicable(ctx, &forwarder_record);

    Ok(Response::new("SESSION").action("STATUS").result("OK"))
}

pub fn remove(ctx: &mut ConnectionContext, command: &Command) -> HandlerOutcome {
    match remove_inner(ctx, command) {
        Ok(response) => HandlerOutcome::Reply(response),
        Err(category) => HandlerOutcome::error("SESSION", "STATUS", category),
    }
}

fn remove_inner(ctx: &mut ConnectionContext, command: &Command) -> Result<Response, Category> {
    ctx.require_auth()?;
    let id = SessionId::new(validate::session_id(command.option("ID"))?);
    ctx.shared.registry.unregister(&id);
    ctx.shared.primaries.remove(&id);
    Ok(Response::new("SESSION").action("STATUS").result("OK"))
}

/// §4.6 step 4: an option only makes sense for certain `STYLE`s; reject it
/// for the rest instead of silently ignoring it.
fn validate_style_options(style: Style, command: &Command) -> Result<(), Category> {
    let has = |key: &str| command.option(key).is_some();

    if style != Style::Raw && (has("PROTOCOL") || has("HEADER")) {
        return Err(Category::InvalidKey(
            "PROTOCOL/HEADER are only valid for STYLE=RAW".to_string(),
        ));
    }
    let datagram_like = matches!(
        style,
        Style::Datagram | Style::Datagram2 | Style::Datagram3 | Style::Raw
    );
    if !datagram_like && (has("PORT") || has("HOST")) {
        return Err(Category::InvalidKey(
            "PORT/HOST are only valid for DATAGRAM*/RAW".to_string(),
        ));
    }
    if style == Style::Primary && (has("FROM_PORT") || has("TO_PORT")) {
        return Err(Category::InvalidKey(
            "FROM_PORT/TO_PORT are not valid for STYLE=PRIMARY".to_string(),
        ));
    }
    Ok(())
}

fn config_from_options(style: Style, command: &Command) -> Result<SessionConfig, Category> {
    validate_style_options(style, command)?;

    let raw_protocol = match validate::raw_protocol(command.option("PROTOCOL")) {
        Ok(protocol) => protocol,
        // A disallowed PROTOCOL on SESSION CREATE/ADD is a protocol-level
        // rejection (I2P_ERROR), not a malformed-option one (spec §8
        // scenario 5) — unlike RAW SEND, which keeps INVALID_KEY.
        Err(Category::InvalidKey(reason)) => return Err(Category::I2pError(reason)),
        Err(other) => return Err(other),
    };

    let mut config = SessionConfig {
        signature_type: validate::signature_type(command.option("SIGNATURE_TYPE"))?,
        raw_protocol,
        raw_header: validate::boolean(command.option("HEADER"), false)?,
        from_port: validate::port(command.option("FROM_PORT"))?,
        to_port: validate::port(command.option("TO_PORT"))?,
        ..SessionConfig::default()
    };

    if let Some(value) = command.option("inbound.length") {
        config.tunnel_length_in = value
            .parse()
            .map_err(|_| Category::InvalidKey("invalid inbound.length".to_string()))?;
    }
    if let Some(value) = command.option("outbound.length") {
        config.tunnel_length_out = value
            .parse()
            .map_err(|_| Category::InvalidKey("invalid outbound.length".to_string()))?;
    }
    if let Some(value) = command.option("inbound.quantity") {
        config.tunnels_in = value
            .parse()
            .map_err(|_| Category::InvalidKey("invalid inbound.quantity".to_string()))?;
    }
    if let Some(value) = command.option("outbound.quantity") {
        config.tunnels_out = value
            .parse()
            .map_err(|_| Category::InvalidKey("invalid outbound.quantity".to_string()))?;
    }

    Ok(config)
}
