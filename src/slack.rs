use std::{
    fmt,
    future::Future,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::status::DisplayStatus;

/// Slack method used to change the user's status
const SET_PROFILE_METHOD: &str = "users.profile.set";

pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum SlackError {
        #[error("Slack request failed: {0}")]
        Http(#[from] reqwest::Error),
        #[error("Failed to serialize Slack profile: {0}")]
        Serialize(#[from] serde_json::Error),
    }
}

pub use error::SlackError;

/// Where computed statuses end up.
pub trait StatusSink {
    fn publish(&self, status: &DisplayStatus) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// The `profile` parameter of `users.profile.set`
#[derive(Serialize, Debug)]
struct Profile<'a> {
    status_text: &'a str,
    status_emoji: &'a str,
}

/// Slack web API client, authenticated with a user token
pub struct SlackClient {
    client: Client,
    api_token: String,
    api_url: String,
    version_uid: String,
}

impl fmt::Debug for SlackClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackClient")
            .field("api_token", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .field("version_uid", &self.version_uid)
            .finish()
    }
}

impl SlackClient {
    /// Create a new client.
    ///
    /// `api_url` is the full URL of the API path of the team, method names are appended to it
    /// verbatim. Requests never time out unless `timeout` is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built (e.g. TLS backend failure).
    pub fn new(
        api_token: impl Into<String>,
        api_url: impl Into<String>,
        version_uid: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, SlackError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            api_token: api_token.into(),
            api_url: api_url.into(),
            version_uid: version_uid.into(),
        })
    }

    /// Build the URL of `method`. The timestamp keeps intermediate caches from answering.
    fn method_url(&self, method: &str, timestamp: u64) -> String {
        format!(
            "{}{method}?_x_id={}-{timestamp}",
            self.api_url, self.version_uid
        )
    }

    /// Call an API method once. Only transport failures are errors: whatever Slack answers is
    /// not inspected.
    async fn call(&self, method: &str, mut form: Vec<(&str, String)>) -> Result<(), SlackError> {
        form.push(("token", self.api_token.clone()));
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        let url = self.method_url(method, timestamp);

        let response = self.client.post(&url).form(&form).send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(method, %status, %body, "Slack responded");
        Ok(())
    }

    /// Set the status of the authenticated user.
    ///
    /// # Errors
    ///
    /// Returns an error if the request could not be sent or its response could not be read.
    pub async fn set_status(&self, emoji: &str, text: &str) -> Result<(), SlackError> {
        info!(%emoji, %text, "Setting status");
        let profile = serde_json::to_string(&Profile {
            status_text: text,
            status_emoji: emoji,
        })?;
        self.call(SET_PROFILE_METHOD, vec![("profile", profile)])
            .await
    }
}

impl StatusSink for SlackClient {
    async fn publish(&self, status: &DisplayStatus) -> anyhow::Result<()> {
        Ok(self.set_status(&status.emoji, &status.text).await?)
    }
}
