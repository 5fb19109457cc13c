mod api;
mod commands;
mod config;
mod dashboard;
mod error;
mod session;
mod state;
mod storage;

use std::sync::Arc;

use poise::serenity_prelude as serenity;
use poise::{Framework, FrameworkOptions};
use tracing::{error, info, warn};

use api::{AuthClient, DocumentClient, HttpApi};
use config::Settings;
use session::SessionRegistry;
use state::AppState;
use storage::CnidariumTokenStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;

    tracing_subscriber::fmt()
        .with_max_level(settings.log_level)
        .init();

    // Init token storage
    let tokens = Arc::new(CnidariumTokenStore::new(&settings.data_dir).await?);
    info!("Token store initialized at {:?}", settings.data_dir);

    // Init backend clients
    let http = HttpApi::from_settings(&settings)?;
    info!(api_url = %http.base_url(), "Backend clients initialized");
    let auth = Arc::new(AuthClient::new(http.clone()));
    let documents = Arc::new(DocumentClient::new(http));

    match documents.health().await {
        Ok(status) => info!(status = %status, "Backend reachable"),
        Err(e) => warn!("Backend health check failed: {}", e),
    }

    // Restore sessions from stored tokens
    let sessions = Arc::new(SessionRegistry::new(auth, tokens, documents.clone()));
    let restored = sessions.hydrate_all().await?;
    let known = sessions.len().await;
    info!(restored, known, "Sessions restored");

    let app_state = AppState {
        sessions,
        documents,
        default_min_score: settings.default_min_score,
    };

    let guild_id = settings.guild_id.map(serenity::GuildId::new);
    let intents = serenity::GatewayIntents::non_privileged();

    let framework = Framework::builder()
        .options(FrameworkOptions {
            commands: vec![commands::dockeeper()],
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Bot connected as: {} ({})", ready.user.name, ready.user.id);

                let commands = &framework.options().commands;
                info!("Registering {} top-level command(s):", commands.len());
                for cmd in commands {
                    info!("  /{} ({} subcommands)", cmd.name, cmd.subcommands.len());
                    for sub in &cmd.subcommands {
                        info!("    /{} {}", cmd.name, sub.name);
                    }
                }

                if let Some(gid) = guild_id {
                    info!("Registering to guild {} (instant)", gid);
                    poise::builtins::register_in_guild(
                        ctx,
                        &framework.options().commands,
                        gid,
                    )
                    .await?;
                } else {
                    info!("Registering globally (up to 1 hour delay)");
                    poise::builtins::register_globally(
                        ctx,
                        &framework.options().commands,
                    )
                    .await?;
                }

                Ok(app_state)
            })
        })
        .build();

    info!("Starting DocKeeper Discord bot...");

    let mut client = serenity::ClientBuilder::new(&settings.discord_token, intents)
        .framework(framework)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    if let Err(e) = client.start().await {
        error!("Client error: {}", e);
    }

    Ok(())
}
