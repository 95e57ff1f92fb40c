//! End-to-end HTTP tests: multipart upload, locator serving, suffix rename,
//! deletion, and the always-acknowledging webhook.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use filebed::routes::router;
use filebed::test_helpers::create_test_state;

const DATA: &[u8] = b"png-bytes-that-must-round-trip";
const BOUNDARY: &str = "test-boundary-7f9a";

fn multipart_body(file_name: &str, content_type: &str, data: &[u8], extra: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in extra {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn photo_message(message_id: i64, file_id: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "ok": true,
        "result": {
            "message_id": message_id,
            "photo": [{"file_id": file_id, "file_size": 4096}]
        }
    }))
}

#[tokio::test]
async fn object_upload_round_trips_through_the_locator() {
    let s3 = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/test-bucket/\d+\.png$"))
        .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"etag\""))
        .expect(1)
        .mount(&s3)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/test-bucket/\d+\.png$"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(DATA, "image/png"))
        .mount(&s3)
        .await;

    let telegram = MockServer::start().await;
    let state = create_test_state(&telegram.uri(), Some(&s3.uri())).await;
    let app = router(state);

    let response = app
        .clone()
        .oneshot(upload_request(multipart_body("pic.png", "image/png", DATA, &[])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["status"], "success");
    let url = body["url"].as_str().unwrap().to_string();
    let key = url.rsplit('/').next().unwrap().to_string();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/{}", key))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/png"
    );
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "inline"
    );
    assert!(response
        .headers()
        .get(header::CACHE_CONTROL)
        .unwrap()
        .to_str()
        .unwrap()
        .contains("immutable"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], DATA);
}

#[tokio::test]
async fn object_outage_still_serves_the_upload_via_relay() {
    let s3 = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/test-bucket/.*$"))
        .respond_with(ResponseTemplate::new(500).set_body_raw(
            r#"<?xml version="1.0"?><Error><Code>InternalError</Code></Error>"#,
            "application/xml",
        ))
        .mount(&s3)
        .await;
    // The resolver's direct-key probe misses too.
    Mock::given(method("GET"))
        .and(path_regex(r"^/test-bucket/.*$"))
        .respond_with(ResponseTemplate::new(404).set_body_raw(
            r#"<?xml version="1.0"?><Error><Code>NoSuchKey</Code></Error>"#,
            "application/xml",
        ))
        .mount(&s3)
        .await;

    let telegram = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/botTESTTOKEN/sendPhoto"))
        .respond_with(photo_message(88, "tg-fallback-file"))
        .expect(1)
        .mount(&telegram)
        .await;
    Mock::given(method("GET"))
        .and(path("/botTESTTOKEN/getFile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {"file_id": "tg-fallback-file", "file_path": "photos/current.png"}
        })))
        .mount(&telegram)
        .await;
    Mock::given(method("GET"))
        .and(path("/file/botTESTTOKEN/photos/current.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(DATA, "image/png"))
        .mount(&telegram)
        .await;

    let state = create_test_state(&telegram.uri(), Some(&s3.uri())).await;
    let app = router(state);

    // Upload is configured for the object backend; the bucket is down.
    let response = app
        .clone()
        .oneshot(upload_request(multipart_body(
            "pic.png",
            "image/png",
            DATA,
            &[("storage_type", "object")],
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    let url = body["url"].as_str().unwrap().to_string();
    let key = url.rsplit('/').next().unwrap().to_string();

    // The locator still resolves, served through the relay.
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/{}", key))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], DATA);
}

#[tokio::test]
async fn upload_without_file_field_is_a_validation_error() {
    let telegram = MockServer::start().await;
    let state = create_test_state(&telegram.uri(), None).await;
    let app = router(state);

    let mut body = Vec::new();
    body.extend_from_slice(
        format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"category\"\r\n\r\ndefault\r\n--{BOUNDARY}--\r\n")
            .as_bytes(),
    );

    let response = app.oneshot(upload_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn suffix_rename_and_delete_work_end_to_end() {
    let telegram = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/botTESTTOKEN/sendPhoto"))
        .respond_with(photo_message(55, "tg-suffix-file"))
        .mount(&telegram)
        .await;
    Mock::given(method("GET"))
        .and(path("/botTESTTOKEN/getFile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {"file_id": "tg-suffix-file", "file_path": "photos/s.png"}
        })))
        .mount(&telegram)
        .await;
    Mock::given(method("GET"))
        .and(path("/file/botTESTTOKEN/photos/s.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(DATA, "image/png"))
        .mount(&telegram)
        .await;
    Mock::given(method("POST"))
        .and(path("/botTESTTOKEN/deleteMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": true})))
        .expect(1)
        .mount(&telegram)
        .await;

    let state = create_test_state(&telegram.uri(), None).await;
    let app = router(state);

    let response = app
        .clone()
        .oneshot(upload_request(multipart_body("pic.png", "image/png", DATA, &[])))
        .await
        .unwrap();
    let old_url = response_json(response).await["url"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/update-suffix")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"url": old_url, "suffix": "holiday"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let new_url = response_json(response).await["url"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(new_url, "http://files.test/holiday.png");

    // Renamed locator serves; the old one no longer exists.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/holiday.png")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let old_key = old_url.rsplit('/').next().unwrap();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/{}", old_key))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Bulk delete removes the metadata and the relayed message.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/delete-multiple")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"urls": [new_url]}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["deleted"], 1);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/holiday.png")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn webhook_always_acknowledges() {
    let telegram = MockServer::start().await;
    let state = create_test_state(&telegram.uri(), None).await;
    let app = router(state);

    for body in ["this is not json", "{\"update_id\": 3}", "{}"] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["status"], "received");
    }
}

#[tokio::test]
async fn category_routes_create_and_delete() {
    let telegram = MockServer::start().await;
    let state = create_test_state(&telegram.uri(), None).await;
    let app = router(state.clone());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/create-category")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"name": "Memes"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let id = body["category"]["id"].as_i64().unwrap();

    // Duplicate create is a client error on the HTTP surface.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/create-category")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"name": "Memes"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/delete-category")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"id": id}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(state.db.find_category_by_id(id).await.unwrap().is_none());
}
