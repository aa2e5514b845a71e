use dotenvy::dotenv;
use std::env;
use teloxide::prelude::*;

mod bot;
mod marzban_client;
mod services;
mod state;

use crate::marzban_client::MarzbanClient;
use crate::services::admin_service::AdminService;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    log::info!("Starting Marzgate admin bot...");

    let token = env::var("BOT_TOKEN").expect("BOT_TOKEN is not set");
    let panel_url = env::var("MARZBAN_URL").expect("MARZBAN_URL is not set");
    let panel_username = env::var("MARZBAN_USERNAME").expect("MARZBAN_USERNAME is not set");
    let panel_password = env::var("MARZBAN_PASSWORD").expect("MARZBAN_PASSWORD is not set");
    let verify_tls = env::var("MARZBAN_VERIFY_SSL")
        .map(|v| v.to_lowercase() != "false")
        .unwrap_or(true);

    let admin_ids: Vec<i64> = env::var("ADMIN_IDS")
        .unwrap_or_default()
        .split(',')
        .filter_map(|id| id.trim().parse().ok())
        .collect();
    if admin_ids.is_empty() {
        log::warn!("ADMIN_IDS is empty, nobody can use the admin panel");
    }

    let panel = MarzbanClient::new(panel_url, panel_username, panel_password, verify_tls)
        .expect("failed to build panel HTTP client");
    let admin_service = AdminService::new(panel);

    let state = AppState {
        admin_service,
        admin_ids,
    };

    let bot = Bot::new(token);

    let (_tx, rx) = tokio::sync::broadcast::channel(1);

    bot::run_bot(bot, rx, state).await;
}
