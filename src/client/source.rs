//! Conversation state sources.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Url;
use tracing::debug;

use crate::models::message::ConversationState;
use crate::{AppError, Result};

/// Read endpoint for one conversation's state.
pub trait ConversationSource: Send + Sync {
    /// Fetch the current state.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Fetch`] if the state cannot be retrieved or
    /// decoded.
    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<ConversationState>> + Send + '_>>;
}

/// Fetches `GET {base_url}/conversations/{id}` from the orchestrator.
#[derive(Debug, Clone)]
pub struct HttpConversationSource {
    client: reqwest::Client,
    url: Url,
}

impl HttpConversationSource {
    /// Build a source for `conversation_id` with a per-request `timeout`.
    ///
    /// The id is appended as a single percent-encoded path segment, so
    /// `/` and other reserved characters cannot change the route.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if `base_url` is not an absolute URL
    /// that can take path segments, or if the HTTP client cannot be built.
    pub fn new(base_url: &str, conversation_id: &str, timeout: Duration) -> Result<Self> {
        let url = conversation_url(base_url, conversation_id)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self { client, url })
    }

    /// Resolved endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn get(&self) -> Result<ConversationState> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| AppError::Fetch(format!("GET {} failed: {e}", self.url)))?;

        let state: ConversationState = response
            .json()
            .await
            .map_err(|e| AppError::Fetch(format!("invalid conversation body: {e}")))?;

        debug!(
            status = ?state.status,
            messages = state.messages.len(),
            "conversation fetched"
        );
        Ok(state)
    }
}

fn conversation_url(base_url: &str, conversation_id: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| AppError::Config(format!("invalid base url {base_url}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| AppError::Config(format!("base url cannot take a path: {base_url}")))?
        .pop_if_empty()
        .push("conversations")
        .push(conversation_id);
    Ok(url)
}

impl ConversationSource for HttpConversationSource {
    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<ConversationState>> + Send + '_>> {
        Box::pin(self.get())
    }
}
