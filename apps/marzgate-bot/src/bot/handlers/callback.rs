use crate::bot::handlers::command::ADMIN_GREETING;
use crate::bot::keyboards;
use crate::bot::utils::{
    display_name, expire_text, gb, online_text, percent_bar, status_emoji, traffic_bar,
};
use crate::state::AppState;
use chrono::Utc;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, ChatId, MessageId, ParseMode};
use tracing::{error, info};

pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    info!("Received callback: {:?}", q.data);
    let callback_id = q.id.clone();
    let tg_id = q.from.id.0 as i64;

    let Some(data) = q.data else {
        bot.answer_callback_query(callback_id).await?;
        return Ok(());
    };

    if !state.is_admin(tg_id) {
        bot.answer_callback_query(callback_id)
            .text("⛔ Access denied")
            .show_alert(true)
            .await?;
        return Ok(());
    }

    let Some(message) = q.message else {
        bot.answer_callback_query(callback_id).await?;
        return Ok(());
    };
    let chat_id = message.chat().id;
    let message_id = message.id();

    match data.as_str() {
        "noop" => {
            bot.answer_callback_query(callback_id).await?;
        }

        "admin:menu" => {
            bot.answer_callback_query(callback_id).await?;
            bot.edit_message_text(chat_id, message_id, ADMIN_GREETING)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboards::admin_menu())
                .await?;
        }

        "admin:close" => {
            bot.answer_callback_query(callback_id).await?;
            bot.delete_message(chat_id, message_id).await?;
        }

        "admin:stats" => {
            bot.answer_callback_query(callback_id).await?;
            show_stats(&bot, chat_id, message_id, &state).await?;
        }

        "admin:server" => {
            bot.answer_callback_query(callback_id).await?;
            show_server(&bot, chat_id, message_id, &state).await?;
        }

        users if users.starts_with("admin:users:") => {
            bot.answer_callback_query(callback_id).await?;
            let page = users
                .rsplit(':')
                .next()
                .and_then(|p| p.parse::<usize>().ok())
                .unwrap_or(0);
            show_users(&bot, chat_id, message_id, &state, page).await?;
        }

        action if action.starts_with("user:action:") => {
            let mut parts = action.splitn(4, ':');
            let verb = parts.nth(2).unwrap_or_default().to_string();
            let username = parts.next().unwrap_or_default().to_string();

            match verb.as_str() {
                "block" => {
                    let result = state.admin_service.disable_user(&username).await;
                    bot.answer_callback_query(callback_id)
                        .text(action_alert(result, "✅ User blocked"))
                        .show_alert(true)
                        .await?;
                    show_user(&bot, chat_id, message_id, &state, &username).await?;
                }
                "unblock" => {
                    let result = state.admin_service.enable_user(&username).await;
                    bot.answer_callback_query(callback_id)
                        .text(action_alert(result, "✅ User unblocked"))
                        .show_alert(true)
                        .await?;
                    show_user(&bot, chat_id, message_id, &state, &username).await?;
                }
                "reset" => {
                    let result = state.admin_service.reset_traffic(&username).await;
                    bot.answer_callback_query(callback_id)
                        .text(action_alert(result, "✅ Traffic reset"))
                        .show_alert(true)
                        .await?;
                    show_user(&bot, chat_id, message_id, &state, &username).await?;
                }
                "adddays" => {
                    bot.answer_callback_query(callback_id).await?;
                    bot.edit_message_text(
                        chat_id,
                        message_id,
                        format!(
                            "📅 <b>Add days</b>\n\nUser: <code>{}</code>\n\nPick how many:",
                            username
                        ),
                    )
                    .parse_mode(ParseMode::Html)
                    .reply_markup(keyboards::add_days_keyboard(&username))
                    .await?;
                }
                "addtraffic" => {
                    bot.answer_callback_query(callback_id).await?;
                    bot.edit_message_text(
                        chat_id,
                        message_id,
                        format!(
                            "📊 <b>Add traffic</b>\n\nUser: <code>{}</code>\n\nPick how much:",
                            username
                        ),
                    )
                    .parse_mode(ParseMode::Html)
                    .reply_markup(keyboards::add_traffic_keyboard(&username))
                    .await?;
                }
                _ => {
                    bot.answer_callback_query(callback_id).await?;
                }
            }
        }

        add if add.starts_with("add:days:") => {
            let mut parts = add.splitn(4, ':');
            let days = parts
                .nth(2)
                .and_then(|d| d.parse::<i64>().ok())
                .unwrap_or(0);
            let username = parts.next().unwrap_or_default().to_string();

            let result = state.admin_service.extend_user(&username, days).await;
            bot.answer_callback_query(callback_id)
                .text(action_alert(
                    result.map(|_| ()),
                    &format!("✅ Added {} days", days),
                ))
                .show_alert(true)
                .await?;
            show_user(&bot, chat_id, message_id, &state, &username).await?;
        }

        add if add.starts_with("add:traffic:") => {
            let mut parts = add.splitn(4, ':');
            let amount = parts
                .nth(2)
                .and_then(|g| g.parse::<i64>().ok())
                .unwrap_or(0);
            let username = parts.next().unwrap_or_default().to_string();

            let result = state.admin_service.add_traffic(&username, amount).await;
            bot.answer_callback_query(callback_id)
                .text(action_alert(
                    result.map(|_| ()),
                    &format!("✅ Added {} GB", amount),
                ))
                .show_alert(true)
                .await?;
            show_user(&bot, chat_id, message_id, &state, &username).await?;
        }

        detail if detail.starts_with("user:") => {
            bot.answer_callback_query(callback_id).await?;
            let username = detail.trim_start_matches("user:").to_string();
            show_user(&bot, chat_id, message_id, &state, &username).await?;
        }

        _ => {
            bot.answer_callback_query(callback_id).await?;
        }
    }

    Ok(())
}

fn action_alert(result: anyhow::Result<()>, success_text: &str) -> String {
    match result {
        Ok(()) => success_text.to_string(),
        Err(e) => {
            error!("Admin action failed: {:#}", e);
            format!("❌ {}", e)
        }
    }
}

async fn show_stats(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    state: &AppState,
) -> Result<(), teloxide::RequestError> {
    let text = match state.admin_service.get_all_users().await {
        Ok(users) => {
            let summary = crate::services::admin_service::summarize_users(&users);
            let server = state.admin_service.server_status().await;
            let (server_line, online) = match &server {
                Some(s) => ("🟢 Online", s.online_users.unwrap_or(0)),
                None => ("🔴 Offline", 0),
            };
            format!(
                "📊 <b>Statistics</b>\n\n\
                 👥 <b>Users</b>\n\
                 ├ Total: <b>{}</b>\n\
                 ├ Active: <b>{}</b>\n\
                 ├ Disabled: <b>{}</b>\n\
                 └ Online now: <b>{}</b>\n\n\
                 📈 <b>Traffic</b>\n\
                 └ Used: <b>{:.2} GB</b>\n\n\
                 🖥 <b>Server:</b> {}",
                summary.total,
                summary.active,
                summary.disabled,
                online,
                gb(summary.used_traffic),
                server_line
            )
        }
        Err(e) => format!("❌ Failed to load statistics: {}", e),
    };

    bot.edit_message_text(chat_id, message_id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboards::refresh_keyboard("admin:stats"))
        .await?;
    Ok(())
}

async fn show_server(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    state: &AppState,
) -> Result<(), teloxide::RequestError> {
    let text = match state.admin_service.server_status().await {
        Some(stats) => {
            let cpu = stats.cpu_usage.round() as u32;
            let mem = if stats.mem_total > 0 {
                (stats.mem_used as f64 / stats.mem_total as f64 * 100.0).round() as u32
            } else {
                0
            };
            format!(
                "🖥 <b>Server status</b>\n\n\
                 ├ Status: 🟢 Online\n\
                 ├ Online: <b>{}</b> users\n\
                 │\n\
                 ├ 💻 CPU: {} {}%\n\
                 └ 🧠 RAM: {} {}%",
                stats.online_users.unwrap_or(0),
                percent_bar(cpu),
                cpu,
                percent_bar(mem),
                mem
            )
        }
        None => "🖥 <b>Server</b>\n\n🔴 Unreachable".to_string(),
    };

    bot.edit_message_text(chat_id, message_id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboards::refresh_keyboard("admin:server"))
        .await?;
    Ok(())
}

async fn show_users(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    state: &AppState,
    page: usize,
) -> Result<(), teloxide::RequestError> {
    match state.admin_service.get_all_users().await {
        Ok(users) if users.is_empty() => {
            bot.edit_message_text(chat_id, message_id, "👥 No users yet")
                .reply_markup(keyboards::refresh_keyboard("admin:users:0"))
                .await?;
        }
        Ok(users) => {
            let total_pages = users.len().div_ceil(keyboards::USERS_PER_PAGE);
            let text = format!(
                "👥 <b>Users</b> ({}/{})\n\nTap a user to manage:",
                page.min(total_pages - 1) + 1,
                total_pages
            );
            bot.edit_message_text(chat_id, message_id, text)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboards::users_page(&users, page))
                .await?;
        }
        Err(e) => {
            bot.edit_message_text(chat_id, message_id, format!("❌ Failed to load users: {}", e))
                .reply_markup(keyboards::refresh_keyboard("admin:users:0"))
                .await?;
        }
    }
    Ok(())
}

async fn show_user(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    state: &AppState,
    username: &str,
) -> Result<(), teloxide::RequestError> {
    match state.admin_service.get_user(username).await {
        Ok(user) => {
            let (bar, percent) = traffic_bar(user.used_traffic, user.data_limit);
            let limit_text = match user.data_limit {
                Some(limit) if limit > 0 => format!("{:.0} GB", gb(limit)),
                _ => "∞".to_string(),
            };
            let text = format!(
                "👤 <b>{}</b>\n\n\
                 🔗 <b>Internal ID:</b> <code>{}</code>\n\
                 {} <b>Status:</b> {}\n\n\
                 📊 <b>Traffic</b>\n\
                 {} {}%\n\
                 {:.2} GB / {}\n\n\
                 📅 <b>Expires:</b> {}\n\
                 🕐 <b>Last online:</b> {}\n\n\
                 <i>Pick an action:</i>",
                display_name(&user),
                user.username,
                status_emoji(&user.status),
                user.status,
                bar,
                percent,
                gb(user.used_traffic),
                limit_text,
                expire_text(user.expire, Utc::now().timestamp()),
                online_text(user.online_at.as_deref()),
            );
            bot.edit_message_text(chat_id, message_id, text)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboards::user_actions(&user))
                .await?;
        }
        Err(e) => {
            error!("Failed to fetch user {}: {:#}", username, e);
            bot.edit_message_text(chat_id, message_id, format!("❌ User not found: {}", username))
                .reply_markup(keyboards::refresh_keyboard("admin:users:0"))
                .await?;
        }
    }
    Ok(())
}
