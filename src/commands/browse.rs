use tracing::info;

use super::{banner, report_api_error, reply, require_login};
use crate::dashboard::render::{render_categories, render_documents, render_field_rows};
use crate::state::Context;

/// List your processed documents
#[poise::command(slash_command)]
pub async fn documents(ctx: Context<'_>) -> Result<(), anyhow::Error> {
    let Some((entry, token)) = require_login(&ctx).await? else {
        return Ok(());
    };
    ctx.defer_ephemeral().await?;

    match entry.dashboard.reload(&token).await {
        Ok(docs) => reply(&ctx, &render_documents(&docs)).await,
        Err(e) => report_api_error(&ctx, &entry, &e).await,
    }
}

/// Show all extracted fields, or search them
#[poise::command(slash_command)]
pub async fn fields(
    ctx: Context<'_>,
    #[description = "Search term (leave empty to list every field)"] search: Option<String>,
    #[description = "Minimum match score, 0-100"]
    #[min = 0]
    #[max = 100]
    min_score: Option<u8>,
) -> Result<(), anyhow::Error> {
    let Some((entry, token)) = require_login(&ctx).await? else {
        return Ok(());
    };
    ctx.defer_ephemeral().await?;

    let search = search.unwrap_or_default();
    let min_score = min_score.or(ctx.data().default_min_score);
    if !search.is_empty() {
        info!(user = %ctx.author().name, search = %search, "searching documents");
    }

    match entry.dashboard.field_rows(&token, &search, min_score).await {
        Ok(rows) => reply(&ctx, &render_field_rows(&rows, &search)).await,
        Err(e) => report_api_error(&ctx, &entry, &e).await,
    }
}

/// Show your fields grouped into categories
#[poise::command(slash_command)]
pub async fn categories(ctx: Context<'_>) -> Result<(), anyhow::Error> {
    let Some((entry, token)) = require_login(&ctx).await? else {
        return Ok(());
    };
    ctx.defer_ephemeral().await?;

    match entry.dashboard.categories(&token).await {
        Ok(data) => reply(&ctx, &render_categories(&data)).await,
        Err(e) => report_api_error(&ctx, &entry, &e).await,
    }
}

/// Check that the DocKeeper backend is reachable
#[poise::command(slash_command)]
pub async fn health(ctx: Context<'_>) -> Result<(), anyhow::Error> {
    match ctx.data().documents.health().await {
        Ok(status) => reply(&ctx, &format!("Backend status: `{}`", status)).await,
        Err(e) => reply(&ctx, &banner(&e.user_message())).await,
    }
}
