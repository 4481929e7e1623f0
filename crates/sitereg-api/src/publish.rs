// Client for the message publishing service.
//
// One publisher per topic. Payloads travel base64-encoded next to a
// string attribute map, and the publisher refuses work after shutdown.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use secrecy::SecretString;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::PublishRequest;
use crate::transport::{ensure_trailing_slash, Transport};

/// Async client that publishes JSON messages to one topic.
///
/// The publisher must be shut down exactly once when the caller is done
/// with it; messages sent after shutdown are rejected with
/// [`Error::PublisherClosed`].
#[derive(Debug)]
pub struct Publisher {
    http: reqwest::Client,
    base_url: Url,
    topic: String,
    sent: AtomicUsize,
    closed: AtomicBool,
}

impl Publisher {
    /// Connect to the publishing service at `base_url` with a bearer `token`.
    pub fn new(
        base_url: Url,
        topic: impl Into<String>,
        token: &SecretString,
        transport: &Transport,
    ) -> Result<Self, Error> {
        let http = transport.build_client(token)?;
        Ok(Self::with_client(http, base_url, topic))
    }

    /// Build a publisher from an existing `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, topic: impl Into<String>) -> Self {
        Self {
            http,
            base_url: ensure_trailing_slash(base_url),
            topic: topic.into(),
            sent: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Topic this publisher sends to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Messages successfully published so far.
    pub fn messages_sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    /// Whether [`Publisher::shutdown`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Publish one JSON payload with the given message attributes.
    ///
    /// The payload travels base64-encoded in the request body.
    pub async fn send_message(
        &self,
        attributes: BTreeMap<String, String>,
        payload: &serde_json::Value,
    ) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::PublisherClosed);
        }
        let data = STANDARD.encode(serde_json::to_vec(payload)?);
        let request = PublishRequest { attributes, data };
        let url = self.messages_url()?;
        debug!(topic = %self.topic, "publishing message");
        let response = self.http.post(url).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(Error::from_response(response).await);
        }
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Stop the publisher. Further sends and a second shutdown both fail
    /// with [`Error::PublisherClosed`].
    pub fn shutdown(&self) -> Result<(), Error> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(Error::PublisherClosed);
        }
        debug!(
            topic = %self.topic,
            sent = self.messages_sent(),
            "publisher shut down"
        );
        Ok(())
    }

    fn messages_url(&self) -> Result<Url, Error> {
        let path = format!("v1/topics/{}/messages", self.topic);
        Ok(self.base_url.join(&path)?)
    }
}
