/*!
 * Test Helpers and Utilities
 *
 * Utilities for building test configurations and fully wired application
 * states with sensible defaults. Backend endpoints point wherever the test
 * says (usually a wiremock server); tests can modify the returned objects
 * as needed.
 */

use std::sync::Arc;

use crate::{
    build_state,
    config::{Config, ObjectStorageConfig},
    db::Database,
    models::StorageType,
    AppState,
};

/// Creates a test configuration with sensible defaults. `bot_api_root` is
/// the base URL for the relay platform API; `s3_endpoint` enables the
/// object backend against the given S3-compatible endpoint.
pub fn create_test_config(bot_api_root: &str, s3_endpoint: Option<&str>) -> Config {
    Config {
        server_address: "127.0.0.1:0".to_string(),
        database_url: "sqlite::memory:".to_string(),
        public_base_url: "http://files.test".to_string(),
        bot_token: "TESTTOKEN".to_string(),
        bot_api_root: bot_api_root.to_string(),
        storage_chat_id: -100900,
        webhook_url: None,
        default_storage: if s3_endpoint.is_some() {
            StorageType::Object
        } else {
            StorageType::Relay
        },
        max_file_size_mb: 20,
        object_storage: s3_endpoint.map(|endpoint| ObjectStorageConfig {
            bucket: "test-bucket".to_string(),
            region: "us-east-1".to_string(),
            access_key_id: "test-access-key".to_string(),
            secret_access_key: "test-secret-key".to_string(),
            endpoint_url: Some(endpoint.to_string()),
        }),
    }
}

/// Fresh in-memory database with the schema already ensured.
pub async fn create_test_database() -> Database {
    let db = Database::open_in_memory().await.expect("in-memory database");
    db.ensure_schema().await.expect("schema setup");
    db
}

/// Fully wired state over an in-memory database.
pub async fn create_test_state(bot_api_root: &str, s3_endpoint: Option<&str>) -> Arc<AppState> {
    let db = create_test_database().await;
    build_state(create_test_config(bot_api_root, s3_endpoint), db).expect("state wiring")
}
