use std::env;

use chrono::FixedOffset;
use tracing::warn;

/// Default server timezone offset in minutes (+05:30).
const DEFAULT_SERVER_TZ_OFFSET_MINUTES: i32 = 330;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub backend_base_url: String,
    pub auth_token: String,
    pub video_base_url: String,
    pub server_tz_offset_minutes: i32,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let config = Self {
            backend_base_url: env::var("TELEMED_BACKEND_URL")
                .unwrap_or_else(|_| {
                    warn!("TELEMED_BACKEND_URL not set, using empty value");
                    String::new()
                }),
            auth_token: env::var("TELEMED_AUTH_TOKEN")
                .unwrap_or_else(|_| {
                    warn!("TELEMED_AUTH_TOKEN not set, using empty value");
                    String::new()
                }),
            video_base_url: env::var("TELEMED_VIDEO_BASE_URL")
                .unwrap_or_else(|_| {
                    warn!("TELEMED_VIDEO_BASE_URL not set, using default");
                    "https://meet.jit.si".to_string()
                }),
            server_tz_offset_minutes: env::var("TELEMED_SERVER_TZ_OFFSET_MINUTES")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or_else(|| {
                    warn!("TELEMED_SERVER_TZ_OFFSET_MINUTES not set, using default");
                    DEFAULT_SERVER_TZ_OFFSET_MINUTES
                }),
        };

        if !config.is_configured() {
            warn!("Client not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.backend_base_url.is_empty() && !self.auth_token.is_empty()
    }

    /// The fixed offset all server-side timestamps are expressed in.
    /// Out-of-range offsets fall back to UTC rather than panicking.
    pub fn server_timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.server_tz_offset_minutes * 60).unwrap_or_else(|| {
            warn!(
                "TELEMED_SERVER_TZ_OFFSET_MINUTES out of range ({}), falling back to UTC",
                self.server_tz_offset_minutes
            );
            FixedOffset::east_opt(0).unwrap()
        })
    }
}
