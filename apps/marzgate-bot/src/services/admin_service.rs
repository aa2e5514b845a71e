use crate::marzban_client::{MarzbanClient, MarzbanUser, SystemStats, UserModify};
use anyhow::Result;
use chrono::Utc;

#[derive(Clone)]
pub struct AdminService {
    panel: MarzbanClient,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct UserSummary {
    pub total: usize,
    pub active: usize,
    pub disabled: usize,
    pub used_traffic: i64,
}

pub fn summarize_users(users: &[MarzbanUser]) -> UserSummary {
    let mut summary = UserSummary {
        total: users.len(),
        ..Default::default()
    };
    for user in users {
        match user.status.as_str() {
            "active" => summary.active += 1,
            "disabled" => summary.disabled += 1,
            _ => {}
        }
        summary.used_traffic += user.used_traffic;
    }
    summary
}

/// New expiry when extending by `days`: anchored at the current expiry,
/// or at `now` when the subscription never expires or already lapsed.
pub fn extended_expire(current: Option<i64>, now: i64, days: i64) -> i64 {
    let base = match current {
        Some(expire) if expire > now => expire,
        _ => now,
    };
    base + days * 86_400
}

impl AdminService {
    pub fn new(panel: MarzbanClient) -> Self {
        Self { panel }
    }

    pub async fn get_user(&self, username: &str) -> Result<MarzbanUser> {
        self.panel.get_user(username).await
    }

    pub async fn get_all_users(&self) -> Result<Vec<MarzbanUser>> {
        self.panel.get_all_users().await
    }

    /// None means the panel did not answer; rendered as offline.
    pub async fn server_status(&self) -> Option<SystemStats> {
        self.panel.system_stats().await.ok()
    }

    pub async fn enable_user(&self, username: &str) -> Result<()> {
        self.set_status(username, "active").await
    }

    pub async fn disable_user(&self, username: &str) -> Result<()> {
        self.set_status(username, "disabled").await
    }

    pub async fn reset_traffic(&self, username: &str) -> Result<()> {
        self.panel.reset_traffic(username).await
    }

    pub async fn extend_user(&self, username: &str, days: i64) -> Result<MarzbanUser> {
        let user = self.panel.get_user(username).await?;
        let expire = extended_expire(user.expire, Utc::now().timestamp(), days);
        let patch = UserModify {
            expire: Some(expire),
            ..Default::default()
        };
        self.panel.modify_user(username, &patch).await
    }

    pub async fn add_traffic(&self, username: &str, gb: i64) -> Result<MarzbanUser> {
        let user = self.panel.get_user(username).await?;
        let new_limit = user.data_limit.unwrap_or(0) + gb * 1024 * 1024 * 1024;
        let patch = UserModify {
            data_limit: Some(new_limit),
            ..Default::default()
        };
        self.panel.modify_user(username, &patch).await
    }

    async fn set_status(&self, username: &str, status: &str) -> Result<()> {
        let patch = UserModify {
            status: Some(status.to_string()),
            ..Default::default()
        };
        self.panel.modify_user(username, &patch).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(status: &str, used_traffic: i64) -> MarzbanUser {
        MarzbanUser {
            username: "user_1".to_string(),
            status: status.to_string(),
            used_traffic,
            data_limit: None,
            expire: None,
            online_at: None,
            note: None,
        }
    }

    #[test]
    fn summary_counts_statuses_and_sums_traffic() {
        let users = vec![
            user("active", 10),
            user("active", 20),
            user("disabled", 5),
            user("limited", 1),
        ];
        let summary = summarize_users(&users);
        assert_eq!(
            summary,
            UserSummary {
                total: 4,
                active: 2,
                disabled: 1,
                used_traffic: 36,
            }
        );
    }

    #[test]
    fn extension_from_future_expiry_stacks_on_top() {
        let now = 1_700_000_000;
        let expire = now + 5 * 86_400;
        assert_eq!(
            extended_expire(Some(expire), now, 30),
            expire + 30 * 86_400
        );
    }

    #[test]
    fn extension_from_past_or_absent_expiry_anchors_at_now() {
        let now = 1_700_000_000;
        assert_eq!(extended_expire(None, now, 7), now + 7 * 86_400);
        assert_eq!(
            extended_expire(Some(now - 86_400), now, 7),
            now + 7 * 86_400
        );
    }
}
