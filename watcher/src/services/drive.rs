//! Thin client for the Drive v3 REST API: metadata lookup, paginated child
//! listing, and push-notification channel registration. Access tokens are
//! minted from the configured refresh token and cached until near expiry.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{AuthUrl, ClientId, ClientSecret, RefreshToken, TokenResponse, TokenUrl};
use reqwest::Client;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use drivesync_config::DriveOauthConfig;
use drivesync_models::drive::{DriveFile, DriveFileList, WatchChannel};

const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

const FILE_FIELDS: &str = "id,name,mimeType,lastModifyingUser(displayName)";
const LIST_PAGE_SIZE: u32 = 1000;

#[derive(Error, Debug)]
pub enum DriveError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("drive api error: status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("http error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for DriveError {
    fn from(err: reqwest::Error) -> Self {
        DriveError::Http(err.to_string())
    }
}

/// The slice of the Drive API the watcher consumes.
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// Current metadata for a single file or folder.
    async fn get_file(&self, file_id: &str) -> Result<DriveFile, DriveError>;

    /// One page of a folder's children; pass the previous page's token to
    /// continue a listing.
    async fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<DriveFileList, DriveError>;

    /// Register a push-notification channel delivering to `address`.
    async fn watch_file(&self, file_id: &str, address: &str) -> Result<WatchChannel, DriveError>;
}

#[derive(Debug, Clone)]
struct CachedToken {
    secret: String,
    expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct DriveApiClient {
    http: Client,
    base_url: String,
    oauth: DriveOauthConfig,
    token: Arc<RwLock<Option<CachedToken>>>,
}

impl DriveApiClient {
    pub fn new(oauth: DriveOauthConfig) -> Self {
        Self {
            http: Client::new(),
            base_url: DRIVE_API_BASE.to_string(),
            oauth,
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// Point the client at a different API host. Used by tests.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Seed the token cache so no refresh is attempted. Used by tests.
    pub fn with_access_token(mut self, token: &str) -> Self {
        self.token = Arc::new(RwLock::new(Some(CachedToken {
            secret: token.to_string(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        })));
        self
    }

    async fn access_token(&self) -> Result<String, DriveError> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref() {
                // Leave a minute of slack so a token never expires mid-request.
                if token.expires_at > Utc::now() + chrono::Duration::seconds(60) {
                    return Ok(token.secret.clone());
                }
            }
        }

        debug!("refreshing drive access token");
        let refreshed = self.refresh_access_token().await?;
        let secret = refreshed.secret.clone();
        *self.token.write().await = Some(refreshed);
        Ok(secret)
    }

    async fn refresh_access_token(&self) -> Result<CachedToken, DriveError> {
        let client = BasicClient::new(
            ClientId::new(self.oauth.client_id.clone()),
            Some(ClientSecret::new(self.oauth.client_secret.clone())),
            AuthUrl::new(GOOGLE_AUTH_URL.to_string())
                .map_err(|e| DriveError::Auth(e.to_string()))?,
            Some(
                TokenUrl::new(GOOGLE_TOKEN_URL.to_string())
                    .map_err(|e| DriveError::Auth(e.to_string()))?,
            ),
        );

        let token = client
            .exchange_refresh_token(&RefreshToken::new(self.oauth.refresh_token.clone()))
            .request_async(async_http_client)
            .await
            .map_err(|e| DriveError::Auth(e.to_string()))?;

        let expires_in = token
            .expires_in()
            .unwrap_or(std::time::Duration::from_secs(3600));
        let expires_at = Utc::now()
            + chrono::Duration::from_std(expires_in)
                .unwrap_or_else(|_| chrono::Duration::seconds(3600));

        Ok(CachedToken {
            secret: token.access_token().secret().clone(),
            expires_at,
        })
    }

    async fn api_error(response: reqwest::Response) -> DriveError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        DriveError::Api { status, body }
    }
}

#[async_trait]
impl DriveApi for DriveApiClient {
    async fn get_file(&self, file_id: &str) -> Result<DriveFile, DriveError> {
        let access_token = self.access_token().await?;
        let url = format!(
            "{}/files/{}?fields={}",
            self.base_url, file_id, FILE_FIELDS
        );

        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        Ok(response.json().await?)
    }

    async fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<DriveFileList, DriveError> {
        let query = format!("'{}' in parents and trashed = false", folder_id);
        let mut url = format!(
            "{}/files?pageSize={}&fields=nextPageToken,files({})&q={}",
            self.base_url,
            LIST_PAGE_SIZE,
            FILE_FIELDS,
            urlencoding::encode(&query),
        );

        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", token));
        }

        let access_token = self.access_token().await?;
        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        Ok(response.json().await?)
    }

    async fn watch_file(&self, file_id: &str, address: &str) -> Result<WatchChannel, DriveError> {
        let access_token = self.access_token().await?;
        let url = format!("{}/files/{}/watch", self.base_url, file_id);

        let channel = serde_json::json!({
            "id": Uuid::new_v4().to_string(),
            "type": "web_hook",
            "address": address,
        });

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", access_token))
            .json(&channel)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        Ok(response.json().await?)
    }
}
