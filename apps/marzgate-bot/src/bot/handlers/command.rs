use crate::bot::keyboards::admin_menu;
use crate::state::AppState;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::info;

pub const ADMIN_GREETING: &str = "🔐 <b>Admin panel</b>\n\nPick a section:";

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let tg_id = msg.chat.id.0;

    if text.starts_with("/admin") {
        if !state.is_admin(tg_id) {
            info!("Rejected /admin from {}", tg_id);
            bot.send_message(msg.chat.id, "⛔ Access denied").await?;
            return Ok(());
        }

        bot.send_message(msg.chat.id, ADMIN_GREETING)
            .parse_mode(ParseMode::Html)
            .reply_markup(admin_menu())
            .await?;
    }

    Ok(())
}
