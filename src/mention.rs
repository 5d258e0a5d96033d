use crate::discord_text::{clean_question, parse_label, wants_remember};
use crate::models::{Attachment, Inbound};
use crate::replies;
use crate::reply::{footer_text, send_reply};
use crate::upload::ingest_attachments;
use crate::{Data, Error};
use poise::serenity_prelude as serenity;
use tracing::{debug, info, warn};

/// Whether a message is addressed to the bot: a DM, or a guild message that mentions it.
pub fn is_addressed(message: &serenity::Message, bot_id: u64) -> bool {
    if message.author.bot {
        return false;
    }
    message.guild_id.is_none() || message.mentions.iter().any(|u| u.id.get() == bot_id)
}

/// Channel id for guild messages; DM channels are per-user so they scope naturally.
pub fn scope_key(message: &serenity::Message) -> String {
    message.channel_id.get().to_string()
}

pub fn to_attachments(message: &serenity::Message) -> Vec<Attachment> {
    message
        .attachments
        .iter()
        .map(|a| Attachment {
            filename: a.filename.clone(),
            url: a.url.clone(),
            content_type: a.content_type.clone(),
            size: u64::from(a.size),
        })
        .collect()
}

/// Handle a DM or a message where the bot is mentioned.
pub async fn handle_message(
    ctx: &serenity::Context,
    message: &serenity::Message,
    data: &Data,
) -> Result<(), Error> {
    if !is_addressed(message, data.bot_id) {
        return Ok(());
    }
    if !data.gate.first_sighting(&message.id.to_string()) {
        debug!("Mention: ignoring duplicate delivery of {}", message.id);
        return Ok(());
    }

    info!(
        "Handling message from {} in channel {}",
        message.author.name, message.channel_id
    );

    let scope = scope_key(message);
    let label = parse_label(&message.content);
    let attachments = to_attachments(message);

    if !attachments.is_empty() && wants_remember(&message.content) {
        return handle_upload(ctx, message, data, &scope, label.as_deref(), &attachments).await;
    }

    // Text files sent with a question are stored first so the answer can use them.
    if attachments.iter().any(|a| !a.is_image()) {
        let report = ingest_attachments(
            &data.http_client,
            &data.db,
            &scope,
            label.as_deref(),
            &attachments,
            data.config.max_upload_bytes,
        )
        .await;
        if !report.too_large.is_empty() || !report.unsupported.is_empty() || !report.failed.is_empty() {
            warn!("Mention: some attachments were not stored: {:?}", report);
        }
    }

    let inbound = Inbound {
        scope_key: scope,
        user_id: message.author.id.get().to_string(),
        question: clean_question(&message.content, data.bot_id),
        label,
        attachments,
    };

    let typing = message.channel_id.start_typing(&ctx.http);
    let reply = data.assistant.respond(&inbound).await;
    drop(typing);

    let footer = footer_text(&message.author.name, inbound.label.as_deref());
    send_reply(&ctx.http, message.channel_id, &reply, &footer, Some(message.id)).await?;
    Ok(())
}

async fn handle_upload(
    ctx: &serenity::Context,
    message: &serenity::Message,
    data: &Data,
    scope: &str,
    label: Option<&str>,
    attachments: &[Attachment],
) -> Result<(), Error> {
    let Some(label) = label else {
        message.reply(&ctx.http, replies::UPLOAD_NEEDS_LABEL).await?;
        return Ok(());
    };

    let report = ingest_attachments(
        &data.http_client,
        &data.db,
        scope,
        Some(label),
        attachments,
        data.config.max_upload_bytes,
    )
    .await;

    if report.saved.is_empty() {
        let text = match report.summary(Some(label), data.config.max_upload_bytes) {
            summary if summary.is_empty() => replies::UPLOAD_FAILED.to_string(),
            summary => format!("{}\n{}", replies::UPLOAD_FAILED, summary),
        };
        message.reply(&ctx.http, text).await?;
        return Ok(());
    }

    let embed = serenity::CreateEmbed::new()
        .title("📄 Document Added")
        .description(report.summary(Some(label), data.config.max_upload_bytes))
        .color(0x00ff00)
        .footer(serenity::CreateEmbedFooter::new(format!(
            "Uploaded by {}",
            message.author.name
        )))
        .timestamp(serenity::Timestamp::now());

    message
        .channel_id
        .send_message(
            &ctx.http,
            serenity::CreateMessage::new()
                .embed(embed)
                .reference_message(message),
        )
        .await?;
    Ok(())
}
