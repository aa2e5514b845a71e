use crate::marzban_client::MarzbanUser;
use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static NOTE_USERNAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([^)]+)\)").unwrap());

/// Telegram handle recovered from the panel note field
/// ("TG ID: 123456 (username)"), falling back to the internal username.
pub fn display_name(user: &MarzbanUser) -> String {
    if let Some(note) = &user.note {
        if let Some(caps) = NOTE_USERNAME.captures(note) {
            let name = &caps[1];
            if !name.is_empty() && name != "User" {
                return format!("@{}", name);
            }
        }
    }
    user.username.clone()
}

pub fn status_emoji(status: &str) -> &'static str {
    match status {
        "active" => "🟢",
        "disabled" => "🔴",
        "limited" => "🟡",
        "expired" => "⏰",
        _ => "❓",
    }
}

pub fn gb(bytes: i64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0 * 1024.0)
}

pub fn percent_bar(percent: u32) -> String {
    let filled = (percent.min(100) / 10) as usize;
    "▓".repeat(filled) + &"░".repeat(10 - filled)
}

pub fn traffic_bar(used: i64, limit: Option<i64>) -> (String, u32) {
    let percent = match limit {
        Some(limit) if limit > 0 => {
            (used as f64 / limit as f64 * 100.0).round().min(100.0) as u32
        }
        _ => 0,
    };
    (percent_bar(percent), percent)
}

pub fn expire_text(expire: Option<i64>, now: i64) -> String {
    let Some(ts) = expire else {
        return "♾ Unlimited".to_string();
    };
    match DateTime::<Utc>::from_timestamp(ts, 0) {
        Some(date) => {
            let days_left = (ts - now) / 86_400;
            format!("{} ({} d)", date.format("%d.%m.%Y"), days_left)
        }
        None => "♾ Unlimited".to_string(),
    }
}

pub fn online_text(online_at: Option<&str>) -> String {
    let Some(raw) = online_at else {
        return "Never".to_string();
    };
    // Panel reports ISO timestamps, sometimes with fractional seconds.
    let trimmed = raw.get(..19).unwrap_or(raw);
    match NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        Ok(dt) => dt.format("%d.%m.%Y %H:%M").to_string(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_note(note: Option<&str>) -> MarzbanUser {
        MarzbanUser {
            username: "user_44054166".to_string(),
            status: "active".to_string(),
            used_traffic: 0,
            data_limit: None,
            expire: None,
            online_at: None,
            note: note.map(|n| n.to_string()),
        }
    }

    #[test]
    fn display_name_prefers_note_handle() {
        let user = user_with_note(Some("TG ID: 44054166 (alice)"));
        assert_eq!(display_name(&user), "@alice");
    }

    #[test]
    fn display_name_falls_back_to_internal_username() {
        assert_eq!(display_name(&user_with_note(None)), "user_44054166");
        // The placeholder handle is not a real name.
        assert_eq!(
            display_name(&user_with_note(Some("TG ID: 44054166 (User)"))),
            "user_44054166"
        );
    }

    #[test]
    fn traffic_bar_scales_and_saturates() {
        let (bar, percent) = traffic_bar(50, Some(100));
        assert_eq!(percent, 50);
        assert_eq!(bar, "▓▓▓▓▓░░░░░");

        let (bar, percent) = traffic_bar(300, Some(100));
        assert_eq!(percent, 100);
        assert_eq!(bar, "▓▓▓▓▓▓▓▓▓▓");

        let (bar, percent) = traffic_bar(300, None);
        assert_eq!(percent, 0);
        assert_eq!(bar, "░░░░░░░░░░");
    }

    #[test]
    fn expire_text_renders_date_and_days_left() {
        let now = 1_700_000_000; // 14.11.2023
        let expire = now + 10 * 86_400;
        assert_eq!(expire_text(Some(expire), now), "24.11.2023 (10 d)");
        assert_eq!(expire_text(None, now), "♾ Unlimited");
    }

    #[test]
    fn online_text_handles_fractional_seconds() {
        assert_eq!(
            online_text(Some("2024-01-05T12:30:45.123456")),
            "05.01.2024 12:30"
        );
        assert_eq!(online_text(None), "Never");
    }
}
