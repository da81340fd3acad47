use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub mail_api_url: String,
    pub mail_api_key: String,
    pub mail_from: String,
    pub sweep_interval_secs: u64,
    pub reminder_window_start_minutes: i64,
    pub reminder_window_end_minutes: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "walkies.db".to_string()),
            mail_api_url: env::var("MAIL_API_URL").unwrap_or_default(),
            mail_api_key: env::var("MAIL_API_KEY").unwrap_or_default(),
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "walks@example.com".to_string()),
            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            reminder_window_start_minutes: env::var("REMINDER_WINDOW_START_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            reminder_window_end_minutes: env::var("REMINDER_WINDOW_END_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(120),
        }
    }
}
