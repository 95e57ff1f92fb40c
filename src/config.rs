use crate::error::AppError;
use crate::models::StorageType;

/// Deployment configuration, read once at boot and passed by parameter into
/// every component. No process-wide mutable singleton.
#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    /// Scheme + host the canonical public locators are built from.
    pub public_base_url: String,
    pub bot_token: String,
    pub bot_api_root: String,
    /// Fixed chat the relay backend forwards blobs to.
    pub storage_chat_id: i64,
    /// When set, the bot webhook is registered against this URL at boot.
    pub webhook_url: Option<String>,
    pub default_storage: StorageType,
    pub max_file_size_mb: u64,
    pub object_storage: Option<ObjectStorageConfig>,
}

#[derive(Debug, Clone)]
pub struct ObjectStorageConfig {
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Custom endpoint for S3-compatible services.
    pub endpoint_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let bot_token = std::env::var("BOT_TOKEN")
            .map_err(|_| AppError::Configuration("BOT_TOKEN is required".to_string()))?;

        let storage_chat_id = std::env::var("STORAGE_CHAT_ID")
            .map_err(|_| AppError::Configuration("STORAGE_CHAT_ID is required".to_string()))?
            .parse::<i64>()
            .map_err(|_| {
                AppError::Configuration("STORAGE_CHAT_ID must be a numeric chat id".to_string())
            })?;

        let object_storage = object_storage_from_env()?;

        let default_storage = match std::env::var("DEFAULT_STORAGE") {
            Ok(value) => StorageType::try_from(value).map_err(AppError::Configuration)?,
            // Object storage is the durable primary when a bucket is bound.
            Err(_) if object_storage.is_some() => StorageType::Object,
            Err(_) => StorageType::Relay,
        };

        if default_storage == StorageType::Object && object_storage.is_none() {
            return Err(AppError::Configuration(
                "DEFAULT_STORAGE=object requires S3_BUCKET and its credentials".to_string(),
            ));
        }

        let server_address =
            std::env::var("SERVER_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8000".to_string());

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{}", server_address))
            .trim_end_matches('/')
            .to_string();

        Ok(Config {
            server_address,
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://filebed.db".to_string()),
            public_base_url,
            bot_token,
            bot_api_root: std::env::var("BOT_API_ROOT")
                .unwrap_or_else(|_| "https://api.telegram.org".to_string()),
            storage_chat_id,
            webhook_url: std::env::var("WEBHOOK_URL").ok(),
            default_storage,
            max_file_size_mb: std::env::var("MAX_FILE_SIZE_MB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            object_storage,
        })
    }

    pub fn max_file_size_bytes(&self) -> usize {
        (self.max_file_size_mb as usize) * 1024 * 1024
    }
}

/// All-or-nothing: a partially configured bucket binding is a deployment
/// mistake, not a reason to silently run relay-only.
fn object_storage_from_env() -> Result<Option<ObjectStorageConfig>, AppError> {
    let bucket = match std::env::var("S3_BUCKET") {
        Ok(bucket) => bucket,
        Err(_) => return Ok(None),
    };

    let access_key_id = std::env::var("S3_ACCESS_KEY_ID").map_err(|_| {
        AppError::Configuration("S3_ACCESS_KEY_ID is required when S3_BUCKET is set".to_string())
    })?;
    let secret_access_key = std::env::var("S3_SECRET_ACCESS_KEY").map_err(|_| {
        AppError::Configuration(
            "S3_SECRET_ACCESS_KEY is required when S3_BUCKET is set".to_string(),
        )
    })?;

    Ok(Some(ObjectStorageConfig {
        bucket,
        region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
        access_key_id,
        secret_access_key,
        endpoint_url: std::env::var("S3_ENDPOINT_URL").ok(),
    }))
}
