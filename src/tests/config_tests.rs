use crate::config::ObjectStorageConfig;
use crate::error::AppError;
use crate::models::StorageType;
use crate::storage::object::ObjectBackend;
use crate::test_helpers::create_test_config;

#[test]
fn max_file_size_converts_to_bytes() {
    let config = create_test_config("http://127.0.0.1:1", None);
    assert_eq!(config.max_file_size_bytes(), 20 * 1024 * 1024);
}

#[test]
fn default_storage_tracks_the_bucket_binding() {
    let with_bucket = create_test_config("http://127.0.0.1:1", Some("http://127.0.0.1:2"));
    assert_eq!(with_bucket.default_storage, StorageType::Object);

    let without_bucket = create_test_config("http://127.0.0.1:1", None);
    assert_eq!(without_bucket.default_storage, StorageType::Relay);
    assert!(without_bucket.object_storage.is_none());
}

#[test]
fn object_backend_rejects_incomplete_bindings() {
    let incomplete = ObjectStorageConfig {
        bucket: "bucket".to_string(),
        region: "us-east-1".to_string(),
        access_key_id: String::new(),
        secret_access_key: "secret".to_string(),
        endpoint_url: None,
    };
    let err = ObjectBackend::new(&incomplete).unwrap_err();
    assert!(matches!(err, AppError::Configuration(_)));

    let no_bucket = ObjectStorageConfig {
        bucket: String::new(),
        region: "us-east-1".to_string(),
        access_key_id: "key".to_string(),
        secret_access_key: "secret".to_string(),
        endpoint_url: None,
    };
    assert!(matches!(
        ObjectBackend::new(&no_bucket).unwrap_err(),
        AppError::Configuration(_)
    ));
}
