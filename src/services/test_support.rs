use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::AppConfig;
use crate::db::{self, queries};
use crate::models::Principal;
use crate::services::notifier::{Notification, Notifier};
use crate::state::AppState;

pub fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        mail_api_url: String::new(),
        mail_api_key: String::new(),
        mail_from: "walks@example.com".to_string(),
        sweep_interval_secs: 300,
        reminder_window_start_minutes: 60,
        reminder_window_end_minutes: 120,
    }
}

pub fn test_state() -> (AppState, UnboundedReceiver<Notification>) {
    let conn = db::init_db(":memory:").unwrap();
    let (notifier, rx) = Notifier::channel();
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        config: test_config(),
        notifier,
    };
    (state, rx)
}

pub fn dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
}

pub fn seed_user(state: &AppState, name: &str, level: &str, is_admin: bool) -> Principal {
    let db = state.db.lock().unwrap();
    let email = format!("{}@example.com", name.to_lowercase());
    let token = format!("token-{}", name.to_lowercase());
    let user_id = queries::insert_user(&db, name, &email, level, is_admin, &token).unwrap();
    Principal { user_id, is_admin }
}

pub fn seed_dog(state: &AppState, name: &str, category: &str) -> i64 {
    let db = state.db.lock().unwrap();
    queries::insert_dog(&db, name, category, true).unwrap()
}

pub fn drain(rx: &mut UnboundedReceiver<Notification>) -> Vec<Notification> {
    let mut out = vec![];
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}
