//! Serde mappings for the relay platform's update envelope and call results.
//! Only the fields the engine actually reads are modeled; everything else in
//! the envelope is ignored on deserialization.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub photo: Option<Vec<PhotoSize>>,
    #[serde(default)]
    pub document: Option<Document>,
    #[serde(default)]
    pub video: Option<Video>,
    #[serde(default)]
    pub audio: Option<Audio>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    #[serde(default)]
    pub file_size: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub file_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Video {
    pub file_id: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Audio {
    pub file_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
}

/// Envelope every API call comes back in.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(default)]
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Option<ResponseParameters>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseParameters {
    #[serde(default)]
    pub retry_after: Option<u64>,
}

/// The message a send call produced. Which attachment field is populated
/// depends on the upload method that was used.
#[derive(Debug, Clone, Deserialize)]
pub struct SentMessage {
    pub message_id: i64,
    #[serde(default)]
    pub photo: Option<Vec<PhotoSize>>,
    #[serde(default)]
    pub document: Option<Document>,
    #[serde(default)]
    pub video: Option<Video>,
    #[serde(default)]
    pub audio: Option<Audio>,
}

impl SentMessage {
    /// The backend-assigned attachment reference, wherever the platform put
    /// it. For photos that is the largest rendition.
    pub fn attachment_ref(&self) -> Option<String> {
        if let Some(doc) = &self.document {
            return Some(doc.file_id.clone());
        }
        if let Some(video) = &self.video {
            return Some(video.file_id.clone());
        }
        if let Some(audio) = &self.audio {
            return Some(audio.file_id.clone());
        }
        if let Some(photo) = &self.photo {
            return photo
                .iter()
                .max_by_key(|p| p.file_size.unwrap_or(0))
                .map(|p| p.file_id.clone());
        }
        None
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileInfo {
    pub file_id: String,
    #[serde(default)]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    Inline(InlineKeyboardMarkup),
    ForceReply { force_reply: bool },
}

impl InlineKeyboardButton {
    pub fn new(text: &str, callback_data: &str) -> Self {
        Self {
            text: text.to_string(),
            callback_data: callback_data.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_ref_prefers_typed_attachments() {
        let sent: SentMessage = serde_json::from_value(serde_json::json!({
            "message_id": 1,
            "document": {"file_id": "doc-1"}
        }))
        .unwrap();
        assert_eq!(sent.attachment_ref().as_deref(), Some("doc-1"));
    }

    #[test]
    fn attachment_ref_picks_largest_photo_rendition() {
        let sent: SentMessage = serde_json::from_value(serde_json::json!({
            "message_id": 2,
            "photo": [
                {"file_id": "small", "file_size": 100},
                {"file_id": "large", "file_size": 9000},
                {"file_id": "medium", "file_size": 4000}
            ]
        }))
        .unwrap();
        assert_eq!(sent.attachment_ref().as_deref(), Some("large"));
    }

    #[test]
    fn update_with_unknown_fields_still_parses() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 7,
            "message": {
                "message_id": 3,
                "chat": {"id": 42, "type": "private"},
                "text": "hello",
                "entities": []
            }
        }))
        .unwrap();
        assert_eq!(update.message.unwrap().chat.id, 42);
    }
}
