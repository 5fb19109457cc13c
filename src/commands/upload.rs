use poise::serenity_prelude as serenity;
use tracing::info;

use super::{banner, report_api_error, reply, require_login};
use crate::dashboard::render::{fields_export, render_processed};
use crate::state::Context;

fn is_pdf(attachment: &serenity::Attachment) -> bool {
    let by_type = attachment
        .content_type
        .as_deref()
        .map(|t| t.starts_with("application/pdf"))
        .unwrap_or(false);
    by_type || attachment.filename.to_lowercase().ends_with(".pdf")
}

/// Upload a PDF document for AI-powered field extraction
#[poise::command(slash_command)]
pub async fn upload(
    ctx: Context<'_>,
    #[description = "PDF file"] file: serenity::Attachment,
) -> Result<(), anyhow::Error> {
    if !is_pdf(&file) {
        return reply(&ctx, &banner("Please attach a PDF file.")).await;
    }
    let Some((entry, token)) = require_login(&ctx).await? else {
        return Ok(());
    };

    ctx.defer_ephemeral().await?;

    let pdf = file.download().await?;
    info!(
        user = %ctx.author().name,
        file = %file.filename,
        size = pdf.len(),
        "processing document"
    );

    match entry.dashboard.upload(&token, &file.filename, pdf).await {
        Ok(processed) => {
            reply(&ctx, &render_processed(&file.filename, &processed)).await?;
            if processed.fields.is_empty() {
                return Ok(());
            }
            let (name, json) = fields_export(&file.filename, &processed.fields)?;
            ctx.send(
                poise::CreateReply::default()
                    .attachment(serenity::CreateAttachment::bytes(json.into_bytes(), name))
                    .ephemeral(true),
            )
            .await?;
            Ok(())
        }
        Err(e) => report_api_error(&ctx, &entry, &e).await,
    }
}
