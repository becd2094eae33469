pub mod sites;

use std::time::Duration;

use anyhow::{Context, Result};

use sites::SiteConfig;

/// Which backend the subscription store runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl StoreBackend {
    // Anything other than an explicit "memory" selects Redis.
    fn from_env() -> Self {
        match std::env::var("STORE_BACKEND") {
            Ok(value) if value.eq_ignore_ascii_case("memory") => StoreBackend::Memory,
            _ => StoreBackend::Redis,
        }
    }
}

/// OAuth client credentials plus the offline refresh token used to mint
/// Drive API access tokens.
#[derive(Debug, Clone)]
pub struct DriveOauthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl DriveOauthConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            client_id: std::env::var("GOOGLE_CLIENT_ID").context("GOOGLE_CLIENT_ID not set")?,
            client_secret: std::env::var("GOOGLE_CLIENT_SECRET")
                .context("GOOGLE_CLIENT_SECRET not set")?,
            refresh_token: std::env::var("GOOGLE_REFRESH_TOKEN")
                .context("GOOGLE_REFRESH_TOKEN not set")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub redis_url: String,
    pub store_backend: StoreBackend,
    /// Public base URI the provider calls back on; the per-site hook key is
    /// appended to it.
    pub watch_notification_uri: String,
    /// Ingest endpoint of the downstream publishing pipeline.
    pub publish_url: String,
    pub queue_max_len: usize,
    pub throttle_seconds: u64,
    pub oauth: DriveOauthConfig,
    pub sites: Vec<SiteConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8085".to_string())
            .parse::<u16>()
            .context("PORT must be a number")?;

        let redis_url = std::env::var("REDIS_URL")
            .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

        let watch_notification_uri = std::env::var("WATCH_NOTIFICATION_URI")
            .context("WATCH_NOTIFICATION_URI not set")?;
        let publish_url = std::env::var("PUBLISH_URL").context("PUBLISH_URL not set")?;

        let queue_max_len = std::env::var("QUEUE_MAX_LEN")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<usize>()
            .context("QUEUE_MAX_LEN must be a number")?;

        let throttle_seconds = std::env::var("THROTTLE_SECONDS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u64>()
            .context("THROTTLE_SECONDS must be a number")?;

        let oauth = DriveOauthConfig::from_env()?;
        let sites = sites::load_sites(None)?;

        if sites.is_empty() {
            tracing::warn!("No sites configured; only the health endpoint will be served");
        }

        Ok(Self {
            host,
            port,
            redis_url,
            store_backend: StoreBackend::from_env(),
            watch_notification_uri,
            publish_url,
            queue_max_len,
            throttle_seconds,
            oauth,
            sites,
        })
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_secs(self.throttle_seconds)
    }

    /// Callback address the provider should push notifications to for `site`.
    pub fn notification_address(&self, site: &SiteConfig) -> String {
        format!(
            "{}/{}",
            self.watch_notification_uri.trim_end_matches('/'),
            site.hook_key
        )
    }
}
