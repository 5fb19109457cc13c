mod account;
mod browse;
mod upload;

use std::sync::Arc;

use crate::dashboard::render::chunk_message;
use crate::error::ApiError;
use crate::state::{Context, UserEntry};

/// DocKeeper - upload, browse and search your documents
#[poise::command(
    slash_command,
    subcommands(
        "account::login",
        "account::signup",
        "account::logout",
        "account::whoami",
        "upload::upload",
        "browse::documents",
        "browse::fields",
        "browse::categories",
        "browse::health"
    )
)]
pub async fn dockeeper(_ctx: Context<'_>) -> Result<(), anyhow::Error> {
    Ok(())
}

/// Send an ephemeral reply in Discord-safe chunks (max 1990 bytes).
async fn reply(ctx: &Context<'_>, text: &str) -> Result<(), anyhow::Error> {
    for chunk in chunk_message(text, 1990) {
        ctx.send(poise::CreateReply::default().content(chunk).ephemeral(true))
            .await?;
    }
    Ok(())
}

/// The banner shown when a call fails.
fn banner(message: &str) -> String {
    format!("**Error:** {}", message)
}

/// The caller's session entry and verified token, or a login prompt.
async fn require_login(ctx: &Context<'_>) -> Result<Option<(Arc<UserEntry>, String)>, anyhow::Error> {
    let entry = ctx.data().sessions.get(ctx.author().id.get()).await;
    match entry.session.token().await {
        Some(token) => Ok(Some((entry, token))),
        None => {
            reply(ctx, "Please log in first. Use `/dockeeper login`.").await?;
            Ok(None)
        }
    }
}

/// Show a failed document call, logging the user out if the backend
/// rejected their token.
async fn report_api_error(
    ctx: &Context<'_>,
    entry: &UserEntry,
    err: &ApiError,
) -> Result<(), anyhow::Error> {
    if entry.session.invalidate_on_auth_failure(err).await {
        entry.dashboard.invalidate().await;
        return reply(
            ctx,
            &banner(&format!(
                "{}. Your session has expired, please log in again.",
                err.user_message()
            )),
        )
        .await;
    }
    tracing::warn!(user = %ctx.author().name, status = ?err.status(), error = %err, "document call failed");
    reply(ctx, &banner(&err.user_message())).await
}
