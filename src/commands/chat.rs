use crate::models::Inbound;
use crate::reply::{footer_text, send_command_reply};
use crate::{Context, Error};
use tracing::info;

/// Ask Elder a question
#[poise::command(slash_command)]
pub async fn ask(
    ctx: Context<'_>,
    #[description = "Your question"] question: String,
    #[description = "Answer from the documents remembered under this label"] label: Option<String>,
) -> Result<(), Error> {
    ctx.defer().await?;
    info!("Ask command received from {}", ctx.author().name);

    let label = label
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());
    let inbound = Inbound {
        scope_key: ctx.channel_id().get().to_string(),
        user_id: ctx.author().id.get().to_string(),
        question: question.split_whitespace().collect::<Vec<_>>().join(" "),
        label,
        attachments: Vec::new(),
    };

    let reply = ctx.data().assistant.respond(&inbound).await;
    let footer = footer_text(&ctx.author().name, inbound.label.as_deref());
    send_command_reply(&ctx, &reply, &footer).await
}
