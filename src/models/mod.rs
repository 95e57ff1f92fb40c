use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Which backend a blob lives in. `blob_ref` on a [`FileRecord`] is only
/// meaningful together with this value: an object key for `Object`, a relay
/// attachment id for `Relay`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
pub enum StorageType {
    #[serde(rename = "object")]
    Object,
    #[serde(rename = "relay")]
    Relay,
}

impl Default for StorageType {
    fn default() -> Self {
        StorageType::Object
    }
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageType::Object => write!(f, "object"),
            StorageType::Relay => write!(f, "relay"),
        }
    }
}

impl TryFrom<String> for StorageType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "object" => Ok(StorageType::Object),
            "relay" => Ok(StorageType::Relay),
            _ => Err(format!("Invalid storage type: {}", value)),
        }
    }
}

/// Multi-turn conversation state, one per chat, persisted on [`UserSetting`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub enum WaitingState {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "awaiting_category_name")]
    AwaitingCategoryName,
    #[serde(rename = "awaiting_suffix")]
    AwaitingSuffix,
}

impl Default for WaitingState {
    fn default() -> Self {
        WaitingState::None
    }
}

impl std::fmt::Display for WaitingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitingState::None => write!(f, "none"),
            WaitingState::AwaitingCategoryName => write!(f, "awaiting_category_name"),
            WaitingState::AwaitingSuffix => write!(f, "awaiting_suffix"),
        }
    }
}

impl TryFrom<String> for WaitingState {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "none" => Ok(WaitingState::None),
            "awaiting_category_name" => Ok(WaitingState::AwaitingCategoryName),
            "awaiting_suffix" => Ok(WaitingState::AwaitingSuffix),
            _ => Err(format!("Invalid waiting state: {}", value)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Per-chat preferences, created on first contact from the chat.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserSetting {
    pub id: i64,
    pub chat_id: i64,
    #[sqlx(try_from = "String")]
    pub storage_type: StorageType,
    pub category_id: Option<i64>,
    pub custom_suffix: Option<String>,
    #[sqlx(try_from = "String")]
    pub waiting_for: WaitingState,
    pub created_at: DateTime<Utc>,
}

/// One stored blob. `url` is the canonical public locator; uniqueness is a
/// best-effort property of the generation scheme, not enforced by the store.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct FileRecord {
    pub id: i64,
    pub url: String,
    pub blob_ref: String,
    /// Relay message id carrying the blob; 0 for object-backend records.
    pub relay_message_id: i64,
    pub created_at: DateTime<Utc>,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    /// 0 for uploads that did not come through a chat.
    pub uploader_chat_id: i64,
    #[sqlx(try_from = "String")]
    pub storage_type: StorageType,
    pub category_id: Option<i64>,
    pub custom_suffix: Option<String>,
}

/// Insert payload for a new [`FileRecord`]; written by the upload handlers
/// after the storage side effect succeeded.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub url: String,
    pub blob_ref: String,
    pub relay_message_id: i64,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub uploader_chat_id: i64,
    pub storage_type: StorageType,
    pub category_id: Option<i64>,
    pub custom_suffix: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub status: &'static str,
    pub url: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateSuffixRequest {
    pub url: String,
    pub suffix: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteRequest {
    pub id: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteMultipleRequest {
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteMultipleResponse {
    pub status: &'static str,
    pub deleted: usize,
    pub failed: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCategoryRequest {
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryResponse {
    pub status: &'static str,
    pub category: Category,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteCategoryRequest {
    pub id: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub status: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_type_round_trips_through_strings() {
        for ty in [StorageType::Object, StorageType::Relay] {
            let parsed = StorageType::try_from(ty.to_string()).unwrap();
            assert_eq!(parsed, ty);
        }
        assert!(StorageType::try_from("ftp".to_string()).is_err());
    }

    #[test]
    fn waiting_state_round_trips_through_strings() {
        for state in [
            WaitingState::None,
            WaitingState::AwaitingCategoryName,
            WaitingState::AwaitingSuffix,
        ] {
            let parsed = WaitingState::try_from(state.to_string()).unwrap();
            assert_eq!(parsed, state);
        }
        assert!(WaitingState::try_from("waiting".to_string()).is_err());
    }
}
