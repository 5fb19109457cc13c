use tracing::info;

use super::{banner, reply};
use crate::dashboard::render::render_session;
use crate::state::Context;

/// Log in to DocKeeper
#[poise::command(slash_command)]
pub async fn login(
    ctx: Context<'_>,
    #[description = "Email"] email: String,
    #[description = "Password"] password: String,
) -> Result<(), anyhow::Error> {
    ctx.defer_ephemeral().await?;
    let entry = ctx.data().sessions.get(ctx.author().id.get()).await;

    match entry.session.login(&email, &password).await {
        Ok(user) => {
            entry.dashboard.invalidate().await;
            info!(user = %ctx.author().name, user_id = %user.id, "DocKeeper login");
            reply(&ctx, &format!("Successfully logged in as **{}**!", user.email)).await
        }
        Err(e) => reply(&ctx, &banner(&e.user_message())).await,
    }
}

/// Create a DocKeeper account and log in
#[poise::command(slash_command)]
pub async fn signup(
    ctx: Context<'_>,
    #[description = "Email"] email: String,
    #[description = "Password"] password: String,
    #[description = "Confirm password"] confirm_password: String,
) -> Result<(), anyhow::Error> {
    if password != confirm_password {
        return reply(&ctx, &banner("Passwords do not match!")).await;
    }

    ctx.defer_ephemeral().await?;
    let entry = ctx.data().sessions.get(ctx.author().id.get()).await;

    match entry.session.signup(&email, &password).await {
        Ok(user) => {
            entry.dashboard.invalidate().await;
            info!(user = %ctx.author().name, user_id = %user.id, "DocKeeper signup");
            reply(
                &ctx,
                &format!("Account created successfully! Logged in as **{}**.", user.email),
            )
            .await
        }
        Err(e) => reply(&ctx, &banner(&e.user_message())).await,
    }
}

/// Log out of DocKeeper
#[poise::command(slash_command)]
pub async fn logout(ctx: Context<'_>) -> Result<(), anyhow::Error> {
    let entry = ctx.data().sessions.get(ctx.author().id.get()).await;
    match entry.logout().await {
        Ok(()) => reply(&ctx, "Successfully logged out!").await,
        Err(e) => reply(&ctx, &banner(&e.user_message())).await,
    }
}

/// Show who you are logged in as
#[poise::command(slash_command)]
pub async fn whoami(ctx: Context<'_>) -> Result<(), anyhow::Error> {
    let entry = ctx.data().sessions.get(ctx.author().id.get()).await;
    let session = entry.session.snapshot().await;
    reply(&ctx, &render_session(&session)).await
}
