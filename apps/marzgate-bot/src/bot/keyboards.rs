use crate::bot::utils::{display_name, gb, status_emoji};
use crate::marzban_client::MarzbanUser;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

pub const USERS_PER_PAGE: usize = 8;

pub fn admin_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("📊 Statistics", "admin:stats")],
        vec![InlineKeyboardButton::callback("👥 Users", "admin:users:0")],
        vec![InlineKeyboardButton::callback("🖥 Server", "admin:server")],
        vec![InlineKeyboardButton::callback("❌ Close", "admin:close")],
    ])
}

pub fn refresh_keyboard(refresh: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "🔄 Refresh",
            refresh.to_string(),
        )],
        vec![InlineKeyboardButton::callback("⬅️ Menu", "admin:menu")],
    ])
}

pub fn users_page(users: &[MarzbanUser], page: usize) -> InlineKeyboardMarkup {
    let total_pages = users.len().div_ceil(USERS_PER_PAGE).max(1);
    let page = page.min(total_pages - 1);
    let start = page * USERS_PER_PAGE;
    let page_users = &users[start..(start + USERS_PER_PAGE).min(users.len())];

    let mut rows: Vec<Vec<InlineKeyboardButton>> = page_users
        .iter()
        .map(|user| {
            vec![InlineKeyboardButton::callback(
                format!(
                    "{} {} ({:.1} GB)",
                    status_emoji(&user.status),
                    display_name(user),
                    gb(user.used_traffic)
                ),
                format!("user:{}", user.username),
            )]
        })
        .collect();

    let mut nav = Vec::new();
    if page > 0 {
        nav.push(InlineKeyboardButton::callback(
            "◀️",
            format!("admin:users:{}", page - 1),
        ));
    }
    nav.push(InlineKeyboardButton::callback(
        format!("{}/{}", page + 1, total_pages),
        "noop",
    ));
    if page + 1 < total_pages {
        nav.push(InlineKeyboardButton::callback(
            "▶️",
            format!("admin:users:{}", page + 1),
        ));
    }
    rows.push(nav);
    rows.push(vec![InlineKeyboardButton::callback("⬅️ Menu", "admin:menu")]);

    InlineKeyboardMarkup::new(rows)
}

pub fn user_actions(user: &MarzbanUser) -> InlineKeyboardMarkup {
    let username = &user.username;
    let mut rows = Vec::new();

    if user.status == "active" {
        rows.push(vec![InlineKeyboardButton::callback(
            "🔒 Block",
            format!("user:action:block:{}", username),
        )]);
    } else {
        rows.push(vec![InlineKeyboardButton::callback(
            "🔓 Unblock",
            format!("user:action:unblock:{}", username),
        )]);
    }
    rows.push(vec![
        InlineKeyboardButton::callback(
            "📊 + Traffic",
            format!("user:action:addtraffic:{}", username),
        ),
        InlineKeyboardButton::callback("📅 + Days", format!("user:action:adddays:{}", username)),
    ]);
    rows.push(vec![InlineKeyboardButton::callback(
        "🔄 Reset traffic",
        format!("user:action:reset:{}", username),
    )]);
    rows.push(vec![InlineKeyboardButton::callback(
        "⬅️ Back to list",
        "admin:users:0",
    )]);

    InlineKeyboardMarkup::new(rows)
}

pub fn add_days_keyboard(username: &str) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = [7i64, 30, 90, 365]
        .chunks(2)
        .map(|chunk| {
            chunk
                .iter()
                .map(|days| {
                    InlineKeyboardButton::callback(
                        format!("{} days", days),
                        format!("add:days:{}:{}", days, username),
                    )
                })
                .collect()
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback(
        "❌ Cancel",
        format!("user:{}", username),
    )]);
    InlineKeyboardMarkup::new(rows)
}

pub fn add_traffic_keyboard(username: &str) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = [10i64, 50, 100, 300]
        .chunks(2)
        .map(|chunk| {
            chunk
                .iter()
                .map(|amount| {
                    InlineKeyboardButton::callback(
                        format!("+{} GB", amount),
                        format!("add:traffic:{}:{}", amount, username),
                    )
                })
                .collect()
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback(
        "❌ Cancel",
        format!("user:{}", username),
    )]);
    InlineKeyboardMarkup::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users(n: usize) -> Vec<MarzbanUser> {
        (0..n)
            .map(|i| MarzbanUser {
                username: format!("user_{}", i),
                status: "active".to_string(),
                used_traffic: 0,
                data_limit: None,
                expire: None,
                online_at: None,
                note: None,
            })
            .collect()
    }

    #[test]
    fn first_page_of_many_has_next_but_no_prev() {
        let markup = users_page(&users(20), 0);
        // 8 user rows + nav row + menu row
        assert_eq!(markup.inline_keyboard.len(), 10);
        let nav = &markup.inline_keyboard[8];
        assert_eq!(nav.len(), 2); // counter + next
    }

    #[test]
    fn middle_page_has_both_directions() {
        let markup = users_page(&users(20), 1);
        let nav = &markup.inline_keyboard[8];
        assert_eq!(nav.len(), 3); // prev + counter + next
    }

    #[test]
    fn last_page_is_clamped_and_partial() {
        let markup = users_page(&users(20), 99);
        // 20 users, page clamps to 2 with 4 entries
        assert_eq!(markup.inline_keyboard.len(), 6);
        let nav = &markup.inline_keyboard[4];
        assert_eq!(nav.len(), 2); // prev + counter
    }

    #[test]
    fn empty_user_list_still_renders_nav() {
        let markup = users_page(&[], 0);
        assert_eq!(markup.inline_keyboard.len(), 2);
    }
}
