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

//! `AUTH ENABLE`/`DISABLE`/`ADD`/`REMOVE`/`LIST` (spec §4.7).
//!
//! None of these require a bound session; they configure the process-wide
//! [`AuthManager`](crate::collaborators::AuthManager) collaborator.

use crate::connection::router::HandlerOutcome;
use crate::connection::ConnectionContext;
use crate::error::Category;
use crate::wire::{Command, Response};

pub async fn enable(ctx: &mut ConnectionContext, command: &Command) -> HandlerOutcome {
    match enable_inner(ctx, command, true).await {
        Ok(response) => HandlerOutcome::Reply(response),
        Err(category) => HandlerOutcome::error("AUTH", "REPLY", category),
    }
}

pub async fn disable(ctx: &mut ConnectionContext, command: &Command) -> HandlerOutcome {
    match enable_inner(ctx, command, false).await {
        Ok(response) => HandlerOutcome::Reply(response),
        Err(category) => HandlerOutcome::error("AUTH", "REPLY", category),
    }
}

async fn enable_inner(ctx: &mut ConnectionContext, _command: &Command, enabled: bool) -> Result<Response, Category> {
    ctx.shared.collaborators.auth.set_enabled(enabled).await;
    Ok(Response::new("AUTH").action("REPLY").result("OK"))
}

pub async fn add(ctx: &mut ConnectionContext, command: &Command) -> HandlerOutcome {
    match add_inner(ctx, command).await {
        Ok(response) => HandlerOutcome::Reply(response),
        Err(category) => HandlerOutcome::error("AUTH", "REPLY", category),
    }
}

async fn add_inner(ctx: &mut ConnectionContext, command: &Command) -> Result<Response, Category> {
    let user = command
        .option("USER")
        .ok_or_else(|| Category::InvalidKey("missing USER".to_string()))?;
    let password = command
        .option("PASSWORD")
        .ok_or_else(|| Category::InvalidKey("missing PASSWORD".to_string()))?;
    ctx.shared.collaborators.auth.add(user, password).await?;
    Ok(Response::new("AUTH").action("REPLY").result("OK"))
}

pub async fn remove(ctx: &mut ConnectionContext, command: &Command) -> HandlerOutcome {
    match remove_inner(ctx, command).await {
        Ok(response) => HandlerOutcome::Reply(response),
        Err(category) => HandlerOutcome::error("AUTH", "REPLY", category),
    }
}

async fn remove_inner(ctx: &mut ConnectionContext, command: &Command) -> Result<Response, Category> {
    let user = command
        .option("USER")
        .ok_or_else(|| Category::InvalidKey("missing USER".to_string()))?;
    ctx.shared.collaborators.auth.remove(user).await?;
    Ok(Response::new("AUTH").action("REPLY").result("OK"))
}

pub async fn list(ctx: &mut ConnectionContext, _command: &Command) -> HandlerOutcome {
    let users = ctx.shared.collaborators.auth.list().await;
    let mut response = Response::new("AUTH").action("REPLY").result("OK");
    for user in users {
        response = response.line(format!("USER={user}"));
    }
    HandlerOutcome::Reply(response)
}
