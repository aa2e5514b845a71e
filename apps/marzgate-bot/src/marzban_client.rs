use anyhow::Result;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// HTTP client for the Marzban panel REST API.
///
/// All persistent state (user records, traffic counters, expirations)
/// lives inside the panel; this client only moves it around.
#[derive(Clone)]
pub struct MarzbanClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    // Admin token expires panel-side; cached until a 401 invalidates it.
    token: Arc<RwLock<Option<String>>>,
}

impl MarzbanClient {
    pub fn new(
        base_url: String,
        username: String,
        password: String,
        verify_tls: bool,
    ) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(!verify_tls)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            password,
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub async fn get_user(&self, username: &str) -> Result<MarzbanUser> {
        self.request(Method::GET, &format!("/api/user/{}", username), None)
            .await
    }

    pub async fn get_all_users(&self) -> Result<Vec<MarzbanUser>> {
        #[derive(Deserialize)]
        struct UsersResponse {
            users: Vec<MarzbanUser>,
        }

        let resp: UsersResponse = self.request(Method::GET, "/api/users", None).await?;
        Ok(resp.users)
    }

    pub async fn modify_user(&self, username: &str, patch: &UserModify) -> Result<MarzbanUser> {
        let body = serde_json::to_value(patch)?;
        self.request(Method::PUT, &format!("/api/user/{}", username), Some(&body))
            .await
    }

    /// Destructive and non-idempotent: re-invoking zeroes counters again.
    pub async fn reset_traffic(&self, username: &str) -> Result<()> {
        let _: serde_json::Value = self
            .request(Method::POST, &format!("/api/user/{}/reset", username), None)
            .await?;
        Ok(())
    }

    pub async fn system_stats(&self) -> Result<SystemStats> {
        self.request(Method::GET, "/api/system", None).await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        let mut resp = self.send_authed(&method, &url, body).await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            *self.token.write().await = None;
            resp = self.send_authed(&method, &url, body).await?;
        }

        if !resp.status().is_success() {
            return Err(anyhow::anyhow!("Request failed: {}", resp.status()));
        }

        Ok(resp.json().await?)
    }

    async fn send_authed(
        &self,
        method: &Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response> {
        let token = self.token().await?;
        let mut req = self.client.request(method.clone(), url).bearer_auth(&token);
        if let Some(body) = body {
            req = req.json(body);
        }
        Ok(req.send().await?)
    }

    async fn token(&self) -> Result<String> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        let url = format!("{}/api/admin/token", self.base_url);
        let resp = self
            .client
            .post(&url)
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(anyhow::anyhow!("Panel login failed: {}", resp.status()));
        }

        let token: TokenResponse = resp.json().await?;
        *self.token.write().await = Some(token.access_token.clone());
        Ok(token.access_token)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarzbanUser {
    pub username: String,
    pub status: String,
    #[serde(default)]
    pub used_traffic: i64,
    #[serde(default)]
    pub data_limit: Option<i64>,
    /// Unix timestamp; None means the subscription never expires.
    #[serde(default)]
    pub expire: Option<i64>,
    #[serde(default)]
    pub online_at: Option<String>,
    /// Free-form note; the bot writes "TG ID: <id> (<username>)" here.
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UserModify {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemStats {
    #[serde(default)]
    pub mem_total: i64,
    #[serde(default)]
    pub mem_used: i64,
    #[serde(default)]
    pub cpu_usage: f64,
    #[serde(default)]
    pub online_users: Option<i64>,
}
