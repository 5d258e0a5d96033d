use crate::{Context, Error};
use poise::serenity_prelude as serenity;
use tracing::info;

/// List the document memories stored for this channel
#[poise::command(slash_command)]
pub async fn memories(ctx: Context<'_>) -> Result<(), Error> {
    let scope = ctx.channel_id().get().to_string();
    let db = ctx.data().db.clone();
    let labels = {
        let scope = scope.clone();
        db.run_blocking(move |db| db.list_labels(&scope)).await?
    };
    let charts = ctx.data().charts.recent(&scope).len();
    let chart_capacity = ctx.data().charts.capacity();

    let mut description = String::new();
    if labels.is_empty() {
        description.push_str("📭 No documents stored here yet. Upload a text or PDF file with `remember as <label>`.\n");
    } else {
        for summary in &labels {
            let name = summary
                .label
                .as_deref()
                .map(|l| format!("`{}`", l))
                .unwrap_or_else(|| "_unlabeled_".to_string());
            description.push_str(&format!("• {}: {} document(s)\n", name, summary.documents));
        }
    }
    description.push_str(&format!(
        "\n📈 Charts in memory: {}/{}",
        charts, chart_capacity
    ));

    let embed = serenity::CreateEmbed::new()
        .title("🧠 Channel Memories")
        .description(description)
        .footer(serenity::CreateEmbedFooter::new(
            "Ask with `using <label>` to answer from one memory",
        ))
        .color(0x0099ff);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Forget the charts remembered for this channel
#[poise::command(slash_command)]
pub async fn forget_charts(ctx: Context<'_>) -> Result<(), Error> {
    let scope = ctx.channel_id().get().to_string();
    let removed = ctx.data().charts.clear(&scope);
    info!(
        "Cleared {} chart(s) for channel {} at request of {}",
        removed,
        scope,
        ctx.author().name
    );
    ctx.say(format!("🧹 Forgot {} chart(s) for this channel.", removed))
        .await?;
    Ok(())
}
