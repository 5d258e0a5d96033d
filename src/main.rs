use elder::commands::{chat, memory, notify};
use elder::memory::{InMemoryChartMemory, InMemoryNotifications, RecentMessages};
use elder::{config::Config, mention, pipeline::Assistant, Data};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,serenity=warn")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration: {:?}", config);
    let discord_token = config.discord_token.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                chat::ask(),
                memory::memories(),
                memory::forget_charts(),
                notify::notify(),
            ],
            event_handler: |ctx, event, _framework, data| {
                Box::pin(async move {
                    if let serenity::FullEvent::Message { new_message } = event {
                        if let Err(e) = mention::handle_message(ctx, new_message, data).await {
                            error!("Error handling message {}: {}", new_message.id, e);
                            if let Err(e) = new_message
                                .reply(&ctx.http, elder::replies::LLM_FAILED)
                                .await
                            {
                                warn!("Failed to send error reply for {}: {}", new_message.id, e);
                            }
                        }
                    }
                    Ok(())
                })
            },
            ..Default::default()
        })
        .setup(|ctx, ready, framework| {
            Box::pin(async move {
                info!("Bot is ready as {}!", ready.user.name);
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                ctx.set_activity(Some(serenity::ActivityData::custom(&config.status_message)));

                let db = elder::db::Database::open(&config.database_url)?;
                db.execute_init()?;

                let http_client = reqwest::Client::new();
                let charts = Arc::new(InMemoryChartMemory::new(config.chart_memory_capacity));
                let notifications = Arc::new(InMemoryNotifications::new(config.notification_ttl));
                let assistant = Assistant::from_config(
                    &config,
                    db.clone(),
                    http_client.clone(),
                    charts.clone(),
                    notifications.clone(),
                )?;

                Ok(Data {
                    gate: Arc::new(RecentMessages::new(config.dedupe_capacity)),
                    config,
                    http_client,
                    assistant,
                    db,
                    charts,
                    notifications,
                    bot_id: ready.user.id.get(),
                })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::DIRECT_MESSAGES;

    let mut client = serenity::ClientBuilder::new(&discord_token, intents)
        .framework(framework)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    info!("Starting bot...");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}
