//! Per-chat conversation engine. Interprets messages and button presses,
//! mutates the chat's persisted preferences, and keeps the status panel in
//! sync with what is actually stored.

use std::sync::Arc;

use tracing::{debug, error, warn};

use super::api::BotApi;
use super::types::{
    CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup, Message, ReplyMarkup, Update,
};
use crate::error::AppError;
use crate::models::{NewFileRecord, StorageType, UserSetting, WaitingState};
use crate::storage::router::{is_valid_suffix, StoreRequest};
use crate::AppState;

pub const CB_CREATE_CATEGORY: &str = "create_category";
pub const CB_SET_SUFFIX: &str = "set_suffix";
pub const CB_SWITCH_STORAGE: &str = "switch_storage";
pub const CB_SELECT_CATEGORY: &str = "select_category";
pub const CB_CLOSE: &str = "close";
const CB_CATEGORY_PREFIX: &str = "category:";

struct MediaAttachment {
    file_id: String,
    file_name: String,
    mime_type: String,
}

#[derive(Clone)]
pub struct ConversationEngine {
    state: Arc<AppState>,
}

impl ConversationEngine {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    fn api(&self) -> &BotApi {
        &self.state.bot
    }

    /// Entry point for a webhook event. Never fails outward: internal errors
    /// are logged and reported back to the chat, so the upstream platform
    /// sees nothing but success.
    pub async fn handle_update(&self, update: Update) {
        if let Some(message) = update.message {
            let chat_id = message.chat.id;
            if let Err(e) = self.handle_message(message).await {
                error!("message handling failed for chat {}: {}", chat_id, e);
                let _ = self
                    .api()
                    .send_message(chat_id, "Something went wrong, please try again.", None)
                    .await;
            }
        } else if let Some(callback) = update.callback_query {
            if let Err(e) = self.handle_callback(callback).await {
                error!("callback handling failed: {}", e);
            }
        }
    }

    async fn handle_message(&self, message: Message) -> Result<(), AppError> {
        let chat_id = message.chat.id;
        // First contact creates the row; everything below assumes it exists.
        let setting = self
            .state
            .db
            .get_or_create_user_setting(chat_id, self.state.config.default_storage)
            .await?;

        if let Some(media) = extract_media(&message) {
            return self.handle_media_upload(&setting, media).await;
        }

        let Some(text) = message.text.as_deref() else {
            return Ok(());
        };
        let text = text.trim();

        if text == "/start" || text == "/settings" {
            return self.send_status_panel(chat_id).await;
        }

        match setting.waiting_for {
            WaitingState::AwaitingCategoryName => self.finish_category_creation(chat_id, text).await,
            WaitingState::AwaitingSuffix => self.finish_suffix_assignment(chat_id, text).await,
            WaitingState::None => {
                self.api()
                    .send_message(chat_id, "Send me a file to upload, or open /settings.", None)
                    .await?;
                Ok(())
            }
        }
    }

    async fn handle_media_upload(
        &self,
        setting: &UserSetting,
        media: MediaAttachment,
    ) -> Result<(), AppError> {
        let chat_id = setting.chat_id;

        let file_path = self.api().get_file(&media.file_id).await?;
        let data = self
            .api()
            .download(&file_path)
            .await?
            .bytes()
            .await
            .map_err(AppError::from)?
            .to_vec();

        if data.len() > self.state.config.max_file_size_bytes() {
            self.api()
                .send_message(
                    chat_id,
                    &format!(
                        "File is too large; the limit is {} MB.",
                        self.state.config.max_file_size_mb
                    ),
                    None,
                )
                .await?;
            return Ok(());
        }

        let stored = self
            .state
            .storage
            .store(
                StoreRequest {
                    data: &data,
                    file_name: &media.file_name,
                    mime_type: &media.mime_type,
                    uploader_chat_id: chat_id,
                    storage_type: Some(setting.storage_type),
                    custom_suffix: setting.custom_suffix.as_deref(),
                },
                &self.state.db,
            )
            .await?;

        self.state
            .db
            .insert_file_record(&NewFileRecord {
                url: stored.url.clone(),
                blob_ref: stored.blob_ref,
                relay_message_id: stored.relay_message_id,
                file_name: media.file_name,
                file_size: data.len() as i64,
                mime_type: media.mime_type,
                uploader_chat_id: chat_id,
                storage_type: stored.storage_type,
                category_id: setting.category_id,
                custom_suffix: setting.custom_suffix.clone(),
            })
            .await?;

        self.api().send_message(chat_id, &stored.url, None).await?;
        Ok(())
    }

    async fn finish_category_creation(&self, chat_id: i64, name: &str) -> Result<(), AppError> {
        let db = &self.state.db;
        db.set_waiting_state(chat_id, WaitingState::None).await?;

        if name.is_empty() {
            self.api()
                .send_message(chat_id, "Category name must not be empty.", None)
                .await?;
            return Ok(());
        }

        if let Some(existing) = db.find_category_by_name(name).await? {
            self.api()
                .send_message(
                    chat_id,
                    &format!("Category \"{}\" already exists.", existing.name),
                    None,
                )
                .await?;
            return Ok(());
        }

        let category = db.create_category(name).await?;
        db.set_user_category(chat_id, Some(category.id)).await?;
        self.api()
            .send_message(
                chat_id,
                &format!("Category \"{}\" created and selected.", category.name),
                None,
            )
            .await?;
        self.send_status_panel(chat_id).await
    }

    async fn finish_suffix_assignment(&self, chat_id: i64, text: &str) -> Result<(), AppError> {
        let db = &self.state.db;
        db.set_waiting_state(chat_id, WaitingState::None).await?;

        let normalized = normalize_suffix_input(text);
        if let Some(suffix) = &normalized {
            if !is_valid_suffix(suffix) {
                self.api()
                    .send_message(
                        chat_id,
                        "Suffix may only contain letters, digits, - and _.",
                        None,
                    )
                    .await?;
                return Ok(());
            }
        }

        db.set_custom_suffix(chat_id, normalized.as_deref()).await?;

        let confirmation = match &normalized {
            Some(suffix) => format!("Suffix set to \"{}\".", suffix),
            None => "Suffix cleared.".to_string(),
        };
        self.api().send_message(chat_id, &confirmation, None).await?;
        self.send_status_panel(chat_id).await
    }

    async fn handle_callback(&self, callback: CallbackQuery) -> Result<(), AppError> {
        if let Err(e) = self.api().answer_callback_query(&callback.id).await {
            warn!("failed to answer callback query {}: {}", callback.id, e);
        }

        let Some(message) = callback.message else {
            return Ok(());
        };
        let chat_id = message.chat.id;
        let setting = self
            .state
            .db
            .get_or_create_user_setting(chat_id, self.state.config.default_storage)
            .await?;

        let Some(data) = callback.data.as_deref() else {
            return Ok(());
        };

        match data {
            CB_CREATE_CATEGORY => {
                self.state
                    .db
                    .set_waiting_state(chat_id, WaitingState::AwaitingCategoryName)
                    .await?;
                self.api()
                    .send_message(chat_id, "Send the name for the new category.", None)
                    .await?;
            }
            CB_SET_SUFFIX => {
                self.state
                    .db
                    .set_waiting_state(chat_id, WaitingState::AwaitingSuffix)
                    .await?;
                self.api()
                    .send_message(
                        chat_id,
                        "Reply with the suffix for your locators, or \"none\" to clear it.",
                        Some(ReplyMarkup::ForceReply { force_reply: true }),
                    )
                    .await?;
            }
            CB_SWITCH_STORAGE => {
                let next = match setting.storage_type {
                    StorageType::Object => StorageType::Relay,
                    StorageType::Relay => StorageType::Object,
                };
                self.state.db.set_storage_type(chat_id, next).await?;
                self.send_status_panel(chat_id).await?;
            }
            CB_SELECT_CATEGORY => {
                let categories = self.state.db.list_categories().await?;
                let keyboard = InlineKeyboardMarkup {
                    inline_keyboard: categories
                        .iter()
                        .map(|c| {
                            vec![InlineKeyboardButton::new(
                                &c.name,
                                &format!("{}{}", CB_CATEGORY_PREFIX, c.id),
                            )]
                        })
                        .collect(),
                };
                self.api()
                    .send_message(chat_id, "Pick a category:", Some(ReplyMarkup::Inline(keyboard)))
                    .await?;
            }
            CB_CLOSE => {
                // Edits only the triggering message; waiting_for is untouched.
                self.api()
                    .edit_message_text(chat_id, message.message_id, "Settings closed.")
                    .await?;
            }
            other if other.starts_with(CB_CATEGORY_PREFIX) => {
                let id = other[CB_CATEGORY_PREFIX.len()..]
                    .parse::<i64>()
                    .map_err(|_| AppError::Validation(format!("bad category id in {}", other)))?;
                match self.state.db.find_category_by_id(id).await? {
                    Some(category) => {
                        self.state
                            .db
                            .set_user_category(chat_id, Some(category.id))
                            .await?;
                        self.send_status_panel(chat_id).await?;
                    }
                    None => {
                        self.api()
                            .send_message(chat_id, "That category no longer exists.", None)
                            .await?;
                    }
                }
            }
            other => debug!("ignoring unknown callback data: {}", other),
        }

        Ok(())
    }

    /// Re-read the row and re-send the panel so the chat UI always reflects
    /// persisted state, not what this handler thinks it just wrote.
    async fn send_status_panel(&self, chat_id: i64) -> Result<(), AppError> {
        let setting = self
            .state
            .db
            .get_or_create_user_setting(chat_id, self.state.config.default_storage)
            .await?;

        let category_name = match setting.category_id {
            Some(id) => self
                .state
                .db
                .find_category_by_id(id)
                .await?
                .map(|c| c.name),
            None => None,
        };

        let text = render_status_panel(
            &setting,
            category_name.as_deref(),
            self.state.config.max_file_size_mb,
        );
        self.api()
            .send_message(
                chat_id,
                &text,
                Some(ReplyMarkup::Inline(settings_keyboard())),
            )
            .await?;
        Ok(())
    }
}

fn extract_media(message: &Message) -> Option<MediaAttachment> {
    if let Some(document) = &message.document {
        let file_name = document
            .file_name
            .clone()
            .unwrap_or_else(|| format!("file_{}.bin", message.message_id));
        let mime_type = document
            .mime_type
            .clone()
            .unwrap_or_else(|| {
                mime_guess::from_path(&file_name)
                    .first_or_octet_stream()
                    .to_string()
            });
        return Some(MediaAttachment {
            file_id: document.file_id.clone(),
            file_name,
            mime_type,
        });
    }

    if let Some(video) = &message.video {
        return Some(MediaAttachment {
            file_id: video.file_id.clone(),
            file_name: format!("video_{}.mp4", message.message_id),
            mime_type: video
                .mime_type
                .clone()
                .unwrap_or_else(|| "video/mp4".to_string()),
        });
    }

    if let Some(audio) = &message.audio {
        let file_name = audio
            .file_name
            .clone()
            .unwrap_or_else(|| format!("audio_{}.mp3", message.message_id));
        return Some(MediaAttachment {
            file_id: audio.file_id.clone(),
            file_name,
            mime_type: audio
                .mime_type
                .clone()
                .unwrap_or_else(|| "audio/mpeg".to_string()),
        });
    }

    if let Some(photo) = &message.photo {
        let largest = photo.iter().max_by_key(|p| p.file_size.unwrap_or(0))?;
        return Some(MediaAttachment {
            file_id: largest.file_id.clone(),
            file_name: format!("photo_{}.jpg", message.message_id),
            mime_type: "image/jpeg".to_string(),
        });
    }

    None
}

/// "none" (any case) and the common CJK spelling clear the suffix.
pub fn normalize_suffix_input(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("none") || trimmed == "无" {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn render_status_panel(
    setting: &UserSetting,
    category_name: Option<&str>,
    max_file_size_mb: u64,
) -> String {
    format!(
        "Current settings\n\nStorage: {}\nCategory: {}\nSuffix: {}\nMax file size: {} MB",
        setting.storage_type,
        category_name.unwrap_or("-"),
        setting.custom_suffix.as_deref().unwrap_or("-"),
        max_file_size_mb
    )
}

pub fn settings_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![
            vec![
                InlineKeyboardButton::new("Create category", CB_CREATE_CATEGORY),
                InlineKeyboardButton::new("Select category", CB_SELECT_CATEGORY),
            ],
            vec![
                InlineKeyboardButton::new("Set suffix", CB_SET_SUFFIX),
                InlineKeyboardButton::new("Switch storage", CB_SWITCH_STORAGE),
            ],
            vec![InlineKeyboardButton::new("Close", CB_CLOSE)],
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn setting(storage: StorageType, suffix: Option<&str>) -> UserSetting {
        UserSetting {
            id: 1,
            chat_id: 42,
            storage_type: storage,
            category_id: None,
            custom_suffix: suffix.map(str::to_string),
            waiting_for: WaitingState::None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn suffix_input_normalizes_clear_words() {
        assert_eq!(normalize_suffix_input("  mypic "), Some("mypic".to_string()));
        assert_eq!(normalize_suffix_input("none"), None);
        assert_eq!(normalize_suffix_input("NONE"), None);
        assert_eq!(normalize_suffix_input("无"), None);
    }

    #[test]
    fn status_panel_reflects_persisted_state() {
        let panel = render_status_panel(&setting(StorageType::Relay, Some("shots")), Some("Pets"), 20);
        assert!(panel.contains("Storage: relay"));
        assert!(panel.contains("Category: Pets"));
        assert!(panel.contains("Suffix: shots"));
        assert!(panel.contains("20 MB"));
    }

    #[test]
    fn status_panel_uses_placeholders_when_unset() {
        let panel = render_status_panel(&setting(StorageType::Object, None), None, 5);
        assert!(panel.contains("Category: -"));
        assert!(panel.contains("Suffix: -"));
    }

    #[test]
    fn settings_keyboard_carries_every_action() {
        let keyboard = settings_keyboard();
        let all: Vec<&str> = keyboard
            .inline_keyboard
            .iter()
            .flatten()
            .map(|b| b.callback_data.as_str())
            .collect();
        for action in [
            CB_CREATE_CATEGORY,
            CB_SELECT_CATEGORY,
            CB_SET_SUFFIX,
            CB_SWITCH_STORAGE,
            CB_CLOSE,
        ] {
            assert!(all.contains(&action), "missing {}", action);
        }
    }
}
