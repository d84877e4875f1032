use crate::error::StoreError;
use crate::types::{ChatRecord, Message, Visibility};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;

/// Request/response persistence for conversation records.
///
/// The session only calls this for metadata edits and initial hydration,
/// never while a stream is open.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn list_chats(&self) -> Result<Vec<ChatRecord>, StoreError>;
    async fn rename_chat(&self, chat_id: &str, title: &str) -> Result<(), StoreError>;
    async fn set_visibility(&self, chat_id: &str, visibility: Visibility) -> Result<(), StoreError>;
    async fn delete_chat(&self, chat_id: &str) -> Result<(), StoreError>;
    async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>, StoreError>;
}

#[derive(Clone)]
pub struct HttpChatStore {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpChatStore {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/chats{path}", self.base_url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(api_key) => request.header("authorization", format!("Bearer {api_key}")),
            None => request,
        }
    }

    async fn check(
        &self,
        chat_id: Option<&str>,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            if let Some(chat_id) = chat_id {
                return Err(StoreError::NotFound(chat_id.to_string()));
            }
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ChatStore for HttpChatStore {
    async fn list_chats(&self) -> Result<Vec<ChatRecord>, StoreError> {
        let response = self.authorize(self.http.get(self.url(""))).send().await?;
        let response = self.check(None, response).await?;
        Ok(response.json::<Vec<ChatRecord>>().await?)
    }

    async fn rename_chat(&self, chat_id: &str, title: &str) -> Result<(), StoreError> {
        let request = self
            .http
            .patch(self.url(&format!("/{chat_id}")))
            .json(&json!({ "title": title }));
        let response = self.authorize(request).send().await?;
        self.check(Some(chat_id), response).await?;
        Ok(())
    }

    async fn set_visibility(&self, chat_id: &str, visibility: Visibility) -> Result<(), StoreError> {
        let request = self
            .http
            .patch(self.url(&format!("/{chat_id}")))
            .json(&json!({ "visibility": visibility }));
        let response = self.authorize(request).send().await?;
        self.check(Some(chat_id), response).await?;
        Ok(())
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<(), StoreError> {
        let request = self.http.delete(self.url(&format!("/{chat_id}")));
        let response = self.authorize(request).send().await?;
        self.check(Some(chat_id), response).await?;
        Ok(())
    }

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>, StoreError> {
        let request = self.http.get(self.url(&format!("/{chat_id}/messages")));
        let response = self.authorize(request).send().await?;
        let response = self.check(Some(chat_id), response).await?;
        Ok(response.json::<Vec<Message>>().await?)
    }
}
