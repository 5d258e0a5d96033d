pub mod commands;
pub mod config;
pub mod db;
pub mod discord_text;
pub mod fetch;
pub mod intent;
pub mod llm;
pub mod memory;
pub mod mention;
pub mod models;
pub mod pipeline;
pub mod replies;
pub mod reply;
pub mod resolver;
pub mod store;
pub mod synthesis;
pub mod system_prompt;
pub mod upload;

use std::sync::Arc;

/// Custom data passed to all commands
pub struct Data {
    pub config: config::Config,
    pub http_client: reqwest::Client,
    pub assistant: pipeline::Assistant,
    pub db: db::Database,
    pub charts: Arc<dyn memory::ChartMemory>,
    pub gate: Arc<dyn memory::MessageGate>,
    pub notifications: Arc<dyn memory::NotificationBoard>,
    /// Bot's own user ID for mention stripping
    pub bot_id: u64,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
