use crate::notify::TwilioCredentials;
use shared::waitlist::WaitlistStatus;
use std::path::PathBuf;
use std::time::Duration;

/// Outbound SMS adapter selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsAdapter {
    /// Log messages instead of sending them
    Log,
    Twilio,
}

/// Server configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | WORK_DIR | ./data | Database and log directory |
/// | HTTP_PORT | 3000 | HTTP API port |
/// | ENVIRONMENT | development | development / staging / production |
/// | LOG_LEVEL | info | tracing filter when RUST_LOG is unset |
/// | LOCATION_ID | default | Location served by this instance |
/// | AVERAGE_TURN_MINUTES | 15 | Average table turn time |
/// | RESTAURANT_NAME | our restaurant | Name used in guest messages |
/// | SMS_ADAPTER | log | log / twilio |
/// | TWILIO_ACCOUNT_SID | - | Twilio account |
/// | TWILIO_AUTH_TOKEN | - | Twilio token |
/// | TWILIO_FROM_NUMBER | - | Sending number |
/// | NOTIFY_ON_STATUS | (empty) | Comma list of statuses that trigger a message |
/// | GATEWAY_POLL_INTERVAL_MS | 1000 | Snapshot refresh tick |
/// | GATEWAY_MAX_STALENESS_MS | 3000 | Snapshot staleness bound |
/// | REMINDER_MINUTES_BEFORE | 10 | Reminder lead time |
/// | REMINDER_CHECK_INTERVAL_SECS | 60 | Reminder sweep interval |
/// | EVENT_CHANNEL_CAPACITY | 4096 | Queue event broadcast capacity |
///
/// # Example
///
/// ```ignore
/// WORK_DIR=/data/waitlist HTTP_PORT=8080 SMS_ADAPTER=log cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: String,
    pub http_port: u16,
    /// development | staging | production
    pub environment: String,
    pub log_level: String,
    pub location_id: String,
    pub average_turn_minutes: f64,
    pub restaurant_name: String,
    pub sms_adapter: SmsAdapter,
    pub twilio: Option<TwilioCredentials>,
    pub notify_on_status: Vec<WaitlistStatus>,
    pub gateway_poll_interval_ms: u64,
    pub gateway_max_staleness_ms: u64,
    pub reminder_minutes_before: u32,
    pub reminder_check_interval_secs: u64,
    pub event_channel_capacity: usize,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let sms_adapter = match std::env::var("SMS_ADAPTER")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str()
        {
            "twilio" => SmsAdapter::Twilio,
            _ => SmsAdapter::Log,
        };

        let twilio = match (
            std::env::var("TWILIO_ACCOUNT_SID"),
            std::env::var("TWILIO_AUTH_TOKEN"),
            std::env::var("TWILIO_FROM_NUMBER"),
        ) {
            (Ok(account_sid), Ok(auth_token), Ok(from_number)) => Some(TwilioCredentials {
                account_sid,
                auth_token,
                from_number,
            }),
            _ => None,
        };

        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into()),
            http_port: env_or("HTTP_PORT", 3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            location_id: std::env::var("LOCATION_ID").unwrap_or_else(|_| "default".into()),
            average_turn_minutes: env_or(
                "AVERAGE_TURN_MINUTES",
                crate::waitlist::eta::DEFAULT_TURN_MINUTES,
            ),
            restaurant_name: std::env::var("RESTAURANT_NAME")
                .unwrap_or_else(|_| crate::notify::templates::DEFAULT_RESTAURANT_NAME.into()),
            sms_adapter,
            twilio,
            notify_on_status: parse_status_list(
                &std::env::var("NOTIFY_ON_STATUS").unwrap_or_default(),
            ),
            gateway_poll_interval_ms: env_or("GATEWAY_POLL_INTERVAL_MS", 1000),
            gateway_max_staleness_ms: env_or("GATEWAY_MAX_STALENESS_MS", 3000),
            reminder_minutes_before: env_or(
                "REMINDER_MINUTES_BEFORE",
                crate::notify::reminder::DEFAULT_REMINDER_MINUTES_BEFORE,
            ),
            reminder_check_interval_secs: env_or("REMINDER_CHECK_INTERVAL_SECS", 60),
            event_channel_capacity: env_or(
                "EVENT_CHANNEL_CAPACITY",
                crate::waitlist::manager::DEFAULT_EVENT_CHANNEL_CAPACITY,
            ),
        }
    }

    /// Config rooted at `work_dir`, everything else from the environment
    ///
    /// Mostly for tests.
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn work_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir)
    }

    /// redb file for this location
    pub fn db_path(&self) -> PathBuf {
        self.work_dir()
            .join("db")
            .join(format!("waitlist-{}.redb", self.location_id))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.work_dir().join("logs")
    }

    pub fn gateway_poll_interval(&self) -> Duration {
        Duration::from_millis(self.gateway_poll_interval_ms)
    }

    pub fn gateway_max_staleness(&self) -> Duration {
        Duration::from_millis(self.gateway_max_staleness_ms)
    }

    pub fn reminder_check_interval(&self) -> Duration {
        Duration::from_secs(self.reminder_check_interval_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Parse `"seated, no_show"` into statuses, skipping unknown names
pub fn parse_status_list(raw: &str) -> Vec<WaitlistStatus> {
    let mut statuses = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match name.parse::<WaitlistStatus>() {
            Ok(status) if !statuses.contains(&status) => statuses.push(status),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Ignoring NOTIFY_ON_STATUS entry"),
        }
    }
    statuses
}
