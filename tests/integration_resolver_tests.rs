//! Retrieval-resolution chain tests: lookup order, backend dispatch,
//! transient relay paths, and the redirect fallback.

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use filebed::models::{NewFileRecord, StorageType};
use filebed::services::resolver::Resolved;
use filebed::test_helpers::create_test_state;

const DATA: &[u8] = b"byte-identical-content";

fn no_such_key() -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_raw(
        r#"<?xml version="1.0"?><Error><Code>NoSuchKey</Code><Message>missing</Message></Error>"#,
        "application/xml",
    )
}

fn object_record(url: &str, blob_ref: &str, file_name: &str) -> NewFileRecord {
    NewFileRecord {
        url: url.to_string(),
        blob_ref: blob_ref.to_string(),
        relay_message_id: 0,
        file_name: file_name.to_string(),
        file_size: DATA.len() as i64,
        mime_type: "image/png".to_string(),
        uploader_chat_id: 0,
        storage_type: StorageType::Object,
        category_id: None,
        custom_suffix: None,
    }
}

fn relay_record(url: &str, blob_ref: &str, file_name: &str) -> NewFileRecord {
    NewFileRecord {
        relay_message_id: 31,
        storage_type: StorageType::Relay,
        mime_type: "image/jpeg".to_string(),
        ..object_record(url, blob_ref, file_name)
    }
}

async fn resolved_bytes(resolved: Resolved) -> (Vec<u8>, String, Option<&'static str>) {
    match resolved {
        Resolved::Bytes {
            payload,
            content_type,
            cache_control,
            ..
        } => (
            payload.into_bytes().await.unwrap(),
            content_type,
            cache_control,
        ),
        Resolved::Redirect(url) => panic!("unexpected redirect to {}", url),
        Resolved::NotFound => panic!("unexpected not-found"),
    }
}

#[tokio::test]
async fn direct_object_lookup_serves_immutable_bytes() {
    let s3 = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/test-bucket/1700000000000.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(DATA, "image/png"))
        .mount(&s3)
        .await;

    let telegram = MockServer::start().await;
    let state = create_test_state(&telegram.uri(), Some(&s3.uri())).await;

    let resolved = state.resolver.resolve("/1700000000000.png").await.unwrap();
    let (bytes, content_type, cache) = resolved_bytes(resolved).await;

    assert_eq!(bytes, DATA);
    assert_eq!(content_type, "image/png");
    assert!(cache.unwrap().contains("immutable"));
}

#[tokio::test]
async fn metadata_lookup_dispatches_to_the_object_backend() {
    let s3 = MockServer::start().await;
    // The requested path is not a key, the recorded blob_ref is.
    Mock::given(method("GET"))
        .and(path("/test-bucket/stored-key.png"))
        .respond_with(no_such_key())
        .mount(&s3)
        .await;
    Mock::given(method("GET"))
        .and(path("/test-bucket/actual-key.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(DATA, "image/png"))
        .mount(&s3)
        .await;

    let telegram = MockServer::start().await;
    let state = create_test_state(&telegram.uri(), Some(&s3.uri())).await;

    state
        .db
        .insert_file_record(&object_record(
            "http://files.test/stored-key.png",
            "actual-key.png",
            "cat.png",
        ))
        .await
        .unwrap();

    let resolved = state.resolver.resolve("/stored-key.png").await.unwrap();
    let (bytes, content_type, cache) = resolved_bytes(resolved).await;

    assert_eq!(bytes, DATA);
    assert_eq!(content_type, "image/png");
    assert!(cache.is_some());
}

#[tokio::test]
async fn relay_paths_are_re_resolved_on_every_request() {
    let telegram = MockServer::start().await;

    // The transient path changes between the two resolutions; both must
    // succeed, proving the reference is never cached.
    Mock::given(method("GET"))
        .and(path("/botTESTTOKEN/getFile"))
        .and(query_param("file_id", "tg-file-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {"file_id": "tg-file-1", "file_path": "photos/first.jpg"}
        })))
        .up_to_n_times(1)
        .mount(&telegram)
        .await;
    Mock::given(method("GET"))
        .and(path("/botTESTTOKEN/getFile"))
        .and(query_param("file_id", "tg-file-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {"file_id": "tg-file-1", "file_path": "photos/second.jpg"}
        })))
        .mount(&telegram)
        .await;
    for transient in ["photos/first.jpg", "photos/second.jpg"] {
        Mock::given(method("GET"))
            .and(path(format!("/file/botTESTTOKEN/{}", transient)))
            .respond_with(ResponseTemplate::new(200).set_body_raw(DATA, "image/jpeg"))
            .expect(1)
            .mount(&telegram)
            .await;
    }

    let state = create_test_state(&telegram.uri(), None).await;
    state
        .db
        .insert_file_record(&relay_record(
            "http://files.test/999.jpg",
            "tg-file-1",
            "pic.jpg",
        ))
        .await
        .unwrap();

    for _ in 0..2 {
        let resolved = state.resolver.resolve("/999.jpg").await.unwrap();
        let (bytes, content_type, cache) = resolved_bytes(resolved).await;
        assert_eq!(bytes, DATA);
        assert_eq!(content_type, "image/jpeg");
        // No long-term caching promise for relay-served bytes.
        assert!(cache.is_none());
    }
}

#[tokio::test]
async fn file_name_lookup_falls_back_to_a_redirect() {
    let telegram = MockServer::start().await;
    // The relay refuses, so the bytes are unreachable under this path.
    Mock::given(method("GET"))
        .and(path("/botTESTTOKEN/getFile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": false,
            "description": "file is expired"
        })))
        .mount(&telegram)
        .await;

    let state = create_test_state(&telegram.uri(), None).await;
    state
        .db
        .insert_file_record(&relay_record(
            "http://files.test/17.jpg",
            "tg-expired",
            "kitten.jpg",
        ))
        .await
        .unwrap();

    match state.resolver.resolve("/kitten.jpg").await.unwrap() {
        Resolved::Redirect(url) => assert_eq!(url, "http://files.test/17.jpg"),
        _ => panic!("expected a redirect to the stored locator"),
    }
}

#[tokio::test]
async fn unknown_paths_are_not_found() {
    let telegram = MockServer::start().await;
    let state = create_test_state(&telegram.uri(), None).await;

    assert!(matches!(
        state.resolver.resolve("/nothing-here.bin").await.unwrap(),
        Resolved::NotFound
    ));
    assert!(matches!(
        state.resolver.resolve("/").await.unwrap(),
        Resolved::NotFound
    ));
}
