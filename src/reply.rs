use crate::config::{DISCORD_EMBED_LIMIT, DISCORD_MESSAGE_LIMIT};
use crate::discord_text::split_message;
use crate::pipeline::Reply;
use crate::Error;
use poise::serenity_prelude as serenity;
use tracing::info;

const EMBED_TITLE: &str = "🥷 Elder";
const EMBED_COLOR: u32 = 0x0099ff;

/// One Discord message worth of reply.
#[derive(Debug, Clone)]
pub enum Outgoing {
    Text(String),
    Embed(serenity::CreateEmbed),
}

/// `Asked by <name> • using <label>`
pub fn footer_text(author: &str, label: Option<&str>) -> String {
    match label {
        Some(label) => format!("Asked by {} • using {}", author, label),
        None => format!("Asked by {}", author),
    }
}

/// Splits a reply into messages that fit Discord's limits. Predictions are sent
/// as plain text; everything else goes out as embeds.
pub fn render(reply: &Reply, footer: &str) -> Vec<Outgoing> {
    if reply.is_plain() {
        return split_message(&reply.text, DISCORD_MESSAGE_LIMIT)
            .into_iter()
            .map(Outgoing::Text)
            .collect();
    }

    let chunks = split_message(&reply.text, DISCORD_EMBED_LIMIT);
    let total = chunks.len();
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            let title = if total > 1 {
                format!("{} ({}/{})", EMBED_TITLE, i + 1, total)
            } else {
                EMBED_TITLE.to_string()
            };
            let mut embed = serenity::CreateEmbed::new()
                .title(title)
                .description(chunk)
                .color(EMBED_COLOR);
            if i + 1 == total {
                embed = embed
                    .footer(serenity::CreateEmbedFooter::new(footer))
                    .timestamp(serenity::Timestamp::now());
            }
            Outgoing::Embed(embed)
        })
        .collect()
}

/// Sends the reply into a channel, threading the first message onto `reference`.
pub async fn send_reply(
    http: &serenity::Http,
    channel_id: serenity::ChannelId,
    reply: &Reply,
    footer: &str,
    reference: Option<serenity::MessageId>,
) -> Result<Vec<serenity::MessageId>, Error> {
    let mut sent = Vec::new();
    for (i, part) in render(reply, footer).into_iter().enumerate() {
        let mut message = match part {
            Outgoing::Text(text) => serenity::CreateMessage::new().content(text),
            Outgoing::Embed(embed) => serenity::CreateMessage::new().embed(embed),
        };
        if let (0, Some(reference)) = (i, reference) {
            message = message.reference_message((channel_id, reference));
        }
        let msg = channel_id.send_message(http, message).await?;
        sent.push(msg.id);
    }

    info!(
        "Reply: sent {} message(s) to channel {} ({}, {})",
        sent.len(),
        channel_id,
        reply.intent,
        reply.grounding
    );
    Ok(sent)
}

/// Same as [`send_reply`] but through a slash command interaction.
pub async fn send_command_reply(
    ctx: &crate::Context<'_>,
    reply: &Reply,
    footer: &str,
) -> Result<(), Error> {
    for part in render(reply, footer) {
        let message = match part {
            Outgoing::Text(text) => poise::CreateReply::default().content(text),
            Outgoing::Embed(embed) => poise::CreateReply::default().embed(embed),
        };
        ctx.send(message).await?;
    }
    Ok(())
}
