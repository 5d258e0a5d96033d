use crate::memory::Notification;
use crate::{Context, Error};
use chrono::Utc;
use poise::serenity_prelude as serenity;
use tracing::{info, warn};

async fn is_owner(ctx: Context<'_>) -> Result<bool, Error> {
    if let Some(owner_id) = ctx.data().config.owner_id {
        if ctx.author().id == serenity::UserId::new(owner_id) {
            return Ok(true);
        }
    }

    ctx.say("❌ Only the bot owner can send notifications.").await?;
    Ok(false)
}

/// DM an update to a user. Their questions in the next hour can refer back to it.
#[poise::command(slash_command, check = "is_owner", hide_in_help)]
pub async fn notify(
    ctx: Context<'_>,
    #[description = "Who to notify"] user: serenity::User,
    #[description = "The update to send"] message: String,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;

    let dm = serenity::CreateMessage::new().content(&message);
    if let Err(e) = user.direct_message(ctx.http(), dm).await {
        warn!("Notify: could not DM {}: {}", user.name, e);
        ctx.say(format!("❌ Could not DM {}: {}", user.name, e)).await?;
        return Ok(());
    }

    ctx.data().notifications.record(Notification {
        user_id: user.id.get().to_string(),
        message,
        sent_at: Utc::now(),
    });
    info!("Notify: sent update to {}", user.name);
    ctx.say(format!("✅ Sent to {}.", user.name)).await?;
    Ok(())
}
