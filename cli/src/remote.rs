use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use proteus_core::Error;
use proteus_core::models::{ProfileUpdate, RemoteProfile};
use proteus_core::remote::RemoteProfileStore;

/// Profile store reached over HTTP: `GET` and `PATCH` on
/// `{base}/profiles/{user_id}` with a bearer token.
pub struct HttpProfileStore {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpProfileStore {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "proteus-cli/{} (protein tracker)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(std::time::Duration::from_secs(10))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn profile_url(&self, user_id: &str) -> String {
        format!("{}/profiles/{user_id}", self.base_url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn unavailable(context: &str, err: impl std::fmt::Display) -> Error {
    Error::RemoteUnavailable(format!("{context}: {err}"))
}

#[derive(Debug, PartialEq, Eq)]
enum FetchStatus {
    Found,
    Missing,
    Unavailable,
}

/// Unauthenticated callers and absent documents both read as "no profile".
fn classify_fetch(status: StatusCode) -> FetchStatus {
    match status {
        s if s.is_success() => FetchStatus::Found,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
            FetchStatus::Missing
        }
        _ => FetchStatus::Unavailable,
    }
}

#[derive(Debug, PartialEq, Eq)]
enum UpdateStatus {
    Accepted,
    Declined,
    Unavailable,
}

fn classify_update(status: StatusCode) -> UpdateStatus {
    match status {
        s if s.is_success() => UpdateStatus::Accepted,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => UpdateStatus::Unavailable,
        s if s.is_client_error() => UpdateStatus::Declined,
        _ => UpdateStatus::Unavailable,
    }
}

#[async_trait]
impl RemoteProfileStore for HttpProfileStore {
    async fn fetch(&self, user_id: &str) -> proteus_core::Result<Option<RemoteProfile>> {
        let resp = self
            .authorized(self.client.get(self.profile_url(user_id)))
            .send()
            .await
            .map_err(|e| unavailable("Failed to reach profile store", e))?;

        let status = resp.status();
        debug!(user_id, %status, "profile fetch");
        match classify_fetch(status) {
            FetchStatus::Missing => Ok(None),
            FetchStatus::Unavailable => Err(unavailable("Profile store returned", status)),
            FetchStatus::Found => resp
                .json::<RemoteProfile>()
                .await
                .map(Some)
                .map_err(|e| unavailable("Failed to parse profile document", e)),
        }
    }

    async fn update(&self, user_id: &str, update: &ProfileUpdate) -> proteus_core::Result<bool> {
        let resp = self
            .authorized(self.client.patch(self.profile_url(user_id)))
            .json(update)
            .send()
            .await
            .map_err(|e| unavailable("Failed to reach profile store", e))?;

        let status = resp.status();
        debug!(user_id, %status, "profile update");
        match classify_update(status) {
            UpdateStatus::Accepted => Ok(true),
            UpdateStatus::Declined => Ok(false),
            UpdateStatus::Unavailable => Err(unavailable("Profile store returned", status)),
        }
    }
}
