//! Thin HTTP client over the relay platform's bot API. Pure transport: no
//! conversation or storage decisions live here.

use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{info, warn};

use super::types::{ApiResponse, FileInfo, ReplyMarkup, SentMessage};
use crate::error::AppError;

/// Upload method selected by coarse MIME class. Everything that is not
/// image, video, or audio travels as a generic document.
pub fn upload_method(mime_type: &str) -> (&'static str, &'static str) {
    if mime_type.starts_with("image/") {
        ("sendPhoto", "photo")
    } else if mime_type.starts_with("video/") {
        ("sendVideo", "video")
    } else if mime_type.starts_with("audio/") {
        ("sendAudio", "audio")
    } else {
        ("sendDocument", "document")
    }
}

#[derive(Clone)]
pub struct BotApi {
    http: reqwest::Client,
    api_root: String,
    token: String,
}

impl BotApi {
    pub fn new(token: &str, api_root: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_root: api_root.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_root, self.token, method)
    }

    /// Absolute download URL for a transient file path returned by
    /// `get_file`. The path expires; never persist the result.
    pub fn file_download_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_root, self.token, file_path)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await?;

        let envelope: ApiResponse<T> = response.json().await?;
        if !envelope.ok {
            return Err(AppError::Upstream(format!(
                "{} failed: {}",
                method,
                envelope
                    .description
                    .unwrap_or_else(|| "no description".to_string())
            )));
        }
        envelope
            .result
            .ok_or_else(|| AppError::Upstream(format!("{} returned no result", method)))
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<ReplyMarkup>,
    ) -> Result<SentMessage, AppError> {
        let mut body = json!({ "chat_id": chat_id, "text": text });
        if let Some(markup) = reply_markup {
            body["reply_markup"] = serde_json::to_value(markup)
                .map_err(|e| AppError::Internal(e.to_string()))?;
        }
        self.call("sendMessage", body).await
    }

    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), AppError> {
        let body = json!({ "chat_id": chat_id, "message_id": message_id, "text": text });
        self.call::<serde_json::Value>("editMessageText", body)
            .await?;
        Ok(())
    }

    pub async fn answer_callback_query(&self, callback_query_id: &str) -> Result<(), AppError> {
        let body = json!({ "callback_query_id": callback_query_id });
        self.call::<serde_json::Value>("answerCallbackQuery", body)
            .await?;
        Ok(())
    }

    /// Forward a blob to a chat, picking the upload method by coarse MIME
    /// class.
    pub async fn send_media(
        &self,
        chat_id: i64,
        data: Vec<u8>,
        file_name: &str,
        mime_type: &str,
    ) -> Result<SentMessage, AppError> {
        let (method, field) = upload_method(mime_type);

        let part = Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str(mime_type)
            .map_err(|e| {
                AppError::Validation(format!("unusable content type {}: {}", mime_type, e))
            })?;

        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part(field, part);

        let response = self
            .http
            .post(self.method_url(method))
            .multipart(form)
            .send()
            .await?;

        let envelope: ApiResponse<SentMessage> = response.json().await?;
        if !envelope.ok {
            return Err(AppError::Upstream(format!(
                "{} failed: {}",
                method,
                envelope
                    .description
                    .unwrap_or_else(|| "no description".to_string())
            )));
        }
        envelope
            .result
            .ok_or_else(|| AppError::Upstream(format!("{} returned no message", method)))
    }

    /// Look up the current transient path for an attachment reference.
    pub async fn get_file(&self, file_id: &str) -> Result<String, AppError> {
        let url = format!("{}?file_id={}", self.method_url("getFile"), urlencoding::encode(file_id));
        let response = self.http.get(url).send().await?;
        let envelope: ApiResponse<FileInfo> = response.json().await?;

        if !envelope.ok {
            return Err(AppError::Upstream(format!(
                "getFile failed for {}: {}",
                file_id,
                envelope
                    .description
                    .unwrap_or_else(|| "no description".to_string())
            )));
        }
        envelope
            .result
            .and_then(|info| info.file_path)
            .ok_or_else(|| {
                AppError::Upstream(format!("getFile returned no path for {}", file_id))
            })
    }

    /// Fetch the bytes behind a transient file path. The caller decides
    /// whether to buffer or stream the response body.
    pub async fn download(&self, file_path: &str) -> Result<reqwest::Response, AppError> {
        let response = self.http.get(self.file_download_url(file_path)).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "file download returned {}",
                response.status()
            )));
        }
        Ok(response)
    }

    pub async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), AppError> {
        let body = json!({ "chat_id": chat_id, "message_id": message_id });
        self.call::<serde_json::Value>("deleteMessage", body).await?;
        Ok(())
    }

    /// Register the webhook endpoint. Retries up to 3 times, honoring the
    /// platform's backoff hint on rate-limit responses. This is the only
    /// external call in the system that retries at all.
    pub async fn set_webhook(&self, webhook_url: &str) -> Result<(), AppError> {
        let mut last_error = String::new();

        for attempt in 1..=3 {
            let response = self
                .http
                .post(self.method_url("setWebhook"))
                .json(&json!({ "url": webhook_url }))
                .send()
                .await?;

            let envelope: ApiResponse<serde_json::Value> = response.json().await?;
            if envelope.ok {
                info!("webhook registered at {}", webhook_url);
                return Ok(());
            }

            last_error = envelope
                .description
                .unwrap_or_else(|| "no description".to_string());

            let retry_after = envelope
                .parameters
                .and_then(|p| p.retry_after)
                .unwrap_or(1);
            warn!(
                "webhook registration attempt {} failed ({}), retrying in {}s",
                attempt, last_error, retry_after
            );
            tokio::time::sleep(std::time::Duration::from_secs(retry_after)).await;
        }

        Err(AppError::Upstream(format!(
            "webhook registration failed after 3 attempts: {}",
            last_error
        )))
    }
}
