mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use base64::Engine;
use common::{pipeline_with, png_bytes, StubModel};
use neuroscan::config::Config;
use neuroscan::triage::TriageTimeouts;
use neuroscan::web::{create_app, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

async fn app(dir: &TempDir, scores: &[f32]) -> Router {
    let (pipeline, _) =
        pipeline_with(dir.path(), StubModel::returning(scores), TriageTimeouts::default()).await;
    let config = Config::new(
        "127.0.0.1:0".into(),
        "unused.onnx".into(),
        dir.path().join("db").join("cases.db").display().to_string(),
        dir.path().join("uploads").display().to_string(),
        false,
    )
    .unwrap();

    create_app(AppState {
        pipeline: Arc::new(pipeline),
        config,
    })
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_upload(name: &str) -> Request<Body> {
    let image = base64::engine::general_purpose::STANDARD.encode(png_bytes(48, 48));
    let body = json!({ "image": image, "name": name, "age": "60", "phone": "555-0199" });
    Request::builder()
        .method(Method::POST)
        .uri("/cases/json")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart_upload(filename: &str, name: &str) -> Request<Body> {
    let boundary = "neuroscan-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\n{name}\r\n",
            b = boundary,
            name = name
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: image/png\r\n\r\n",
            b = boundary,
            f = filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(&png_bytes(20, 20));
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/cases")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn json_upload_creates_a_fetchable_case() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, &[0.01, 0.02, 0.96, 0.01]).await;

    let (status, body) = send(&app, json_upload("ivy")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["record"]["diagnosis_label"], "No Tumor");
    assert_eq!(body["data"]["record"]["confidence_percent"], "96.00%");

    let id = body["data"]["id"].as_str().unwrap().to_string();
    let (status, body) = send(&app, get(&format!("/cases/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["patient_name"], "ivy");
    assert_eq!(body["data"]["patient_age"], "60");
}

#[tokio::test]
async fn multipart_upload_records_patient_fields() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, &[0.1, 0.8, 0.05, 0.05]).await;

    let (status, body) = send(&app, multipart_upload("brain.png", "jon")).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["record"]["diagnosis_label"], "Tumor: meningioma");
    assert_eq!(body["data"]["record"]["patient_name"], "jon");
    assert!(body["data"]["record"]["image_ref"]
        .as_str()
        .unwrap()
        .ends_with("_brain.png"));
}

#[tokio::test]
async fn history_lists_newest_first() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, &[0.7, 0.1, 0.1, 0.1]).await;

    let (_, first) = send(&app, json_upload("first")).await;
    let (_, second) = send(&app, json_upload("second")).await;

    let (status, body) = send(&app, get("/cases")).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(
        ids,
        vec![
            second["data"]["id"].as_str().unwrap(),
            first["data"]["id"].as_str().unwrap()
        ]
    );
}

#[tokio::test]
async fn malformed_and_unknown_ids_are_reported_differently() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, &[0.25; 4]).await;

    let (status, body) = send(&app, get("/cases/not-a-real-id-format")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MALFORMED_ID");

    let unknown = uuid::Uuid::new_v4();
    let (status, body) = send(&app, get(&format!("/cases/{}", unknown))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = send(&app, delete("/cases/not-a-real-id-format")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleting_twice_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, &[0.25; 4]).await;

    let (_, created) = send(&app, json_upload("kim")).await;
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(&app, delete(&format!("/cases/{}", id))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let legacy_delete = Request::builder()
        .method(Method::POST)
        .uri(format!("/cases/{}/delete", id))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, legacy_delete).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, get(&format!("/cases/{}", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn undecodable_upload_is_rejected_without_a_record() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, &[0.25; 4]).await;

    let body = json!({
        "image": base64::engine::general_purpose::STANDARD.encode(b"not an image"),
        "name": "lee"
    });
    let request = Request::builder()
        .method(Method::POST)
        .uri("/cases/json")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "DECODE_ERROR");

    let (_, history) = send(&app, get("/cases")).await;
    assert!(history["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn request_id_header_is_echoed() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, &[0.25; 4]).await;

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "req-42");

    let (status, info) = send(&app, get("/api/info")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        info["models"]["classes"],
        json!(["glioma", "meningioma", "notumor", "pituitary"])
    );
    assert_eq!(info["models"]["model"]["backend"], "stub");
}

#[tokio::test]
async fn case_image_is_served_until_the_case_is_deleted() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, &[0.25; 4]).await;

    let (_, created) = send(&app, json_upload("max")).await;
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(get(&format!("/cases/{}/image", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.as_ref(), png_bytes(48, 48).as_slice());

    let (status, _) = send(&app, delete(&format!("/cases/{}", id))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(std::fs::read_dir(dir.path().join("uploads")).unwrap().count(), 0);

    let (status, body) = send(&app, get(&format!("/cases/{}/image", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}
