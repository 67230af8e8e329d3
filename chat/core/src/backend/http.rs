//! HTTP Backend Implementation
//!
//! [`ChatBackend`] over the backend's JSON API.
//!
//! # Endpoints
//!
//! All request/response calls are `POST` with a JSON body and
//! `Authorization: Bearer <token>`:
//! - `/api/chat/message/list` `{conversation_id}` → `[Message]`
//! - `/api/chat/message/send` `{conversation_id, message, sender}`
//! - `/api/chat/conversation/list` → `[Conversation]`
//! - `/api/chat/conversation/update` `{conversation_id, title}`
//! - `/api/chat/conversation/delete` `{conversation_id}`
//!
//! The event stream is `GET /sse/{conversation_id}?token=<token>`; the token
//! travels in the query because browser `EventSource` cannot set headers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use serde::de::DeserializeOwned;

use super::traits::{BackendError, ChatBackend};
use crate::context::AccessToken;
use crate::messages::{Conversation, ConversationId, Message, Sender};
use crate::transport::redact_url;

/// Backend client over reqwest
#[derive(Clone, Debug)]
pub struct HttpBackend {
    /// API base URL
    base: Url,
    /// HTTP client with the request timeout applied
    http_client: reqwest::Client,
}

impl HttpBackend {
    /// Create a client for the API at `base`
    pub fn new(base: Url, request_timeout: Duration) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { base, http_client })
    }

    /// Event stream URL for a conversation
    pub fn stream_url(
        &self,
        conversation_id: &ConversationId,
        token: &AccessToken,
    ) -> Result<Url, BackendError> {
        stream_url(&self.base, conversation_id, token)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, BackendError> {
        endpoint_url(&self.base, segments)
    }

    /// POST a JSON body and return the raw response text
    async fn post(
        &self,
        token: &AccessToken,
        segments: &[&str],
        body: serde_json::Value,
    ) -> Result<String, BackendError> {
        let url = self.endpoint(segments)?;
        tracing::debug!(url = %redact_url(&url), "Backend request");

        let response = self
            .http_client
            .post(url)
            .bearer_auth(token.expose())
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        segments: &[&str],
        body: serde_json::Value,
    ) -> Result<T, BackendError> {
        let text = self.post(token, segments, body).await?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Event stream URL: `{base}/sse/{conversation_id}?token={token}`
pub fn stream_url(
    base: &Url,
    conversation_id: &ConversationId,
    token: &AccessToken,
) -> Result<Url, BackendError> {
    let mut url = endpoint_url(base, &["sse", conversation_id.as_str()])?;
    url.query_pairs_mut().append_pair("token", token.expose());
    Ok(url)
}

/// Append path segments to the base, keeping any base path prefix
fn endpoint_url(base: &Url, segments: &[&str]) -> Result<Url, BackendError> {
    let mut url = base.clone();
    url.set_query(None);
    url.path_segments_mut()
        .map_err(|()| BackendError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn fetch_messages(
        &self,
        token: &AccessToken,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>, BackendError> {
        let messages: Vec<Message> = self
            .post_json(
                token,
                &["api", "chat", "message", "list"],
                serde_json::json!({ "conversation_id": conversation_id }),
            )
            .await?;
        tracing::debug!(
            conversation_id = %conversation_id,
            count = messages.len(),
            "Fetched message history"
        );
        Ok(messages)
    }

    async fn send_message(
        &self,
        token: &AccessToken,
        conversation_id: &ConversationId,
        message: &str,
    ) -> Result<(), BackendError> {
        self.post(
            token,
            &["api", "chat", "message", "send"],
            serde_json::json!({
                "conversation_id": conversation_id,
                "message": message,
                "sender": Sender::User,
            }),
        )
        .await?;
        Ok(())
    }

    async fn list_conversations(
        &self,
        token: &AccessToken,
    ) -> Result<Vec<Conversation>, BackendError> {
        self.post_json(
            token,
            &["api", "chat", "conversation", "list"],
            serde_json::json!({}),
        )
        .await
    }

    async fn rename_conversation(
        &self,
        token: &AccessToken,
        conversation_id: &ConversationId,
        title: &str,
    ) -> Result<(), BackendError> {
        self.post(
            token,
            &["api", "chat", "conversation", "update"],
            serde_json::json!({ "conversation_id": conversation_id, "title": title }),
        )
        .await?;
        Ok(())
    }

    async fn delete_conversation(
        &self,
        token: &AccessToken,
        conversation_id: &ConversationId,
    ) -> Result<(), BackendError> {
        self.post(
            token,
            &["api", "chat", "conversation", "delete"],
            serde_json::json!({ "conversation_id": conversation_id }),
        )
        .await?;
        Ok(())
    }
}
