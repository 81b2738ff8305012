// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! HTTP tests for /health, POST /v1/ocr and POST /upload
//!
//! Requests go through the full router (`build_router`) with `oneshot`.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use handscript_node::api::{build_router, AppState};
use handscript_node::config::PipelineConfig;
use handscript_node::vision::ocr::{LineRecognizer, RecognitionError, NO_TEXT_SENTINEL};
use handscript_node::vision::HandwritingPipeline;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use crate::common::{encode_png, extent_reader, mock_recognizer, synthetic_page, THREE_BANDS};

const BOUNDARY: &str = "handscript-test-boundary";

fn app(recognizer: impl LineRecognizer + 'static, timeout: Duration) -> Router {
    let pipeline = HandwritingPipeline::new(PipelineConfig::default(), Arc::new(recognizer)).unwrap();
    build_router(AppState::new(Arc::new(pipeline), timeout))
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart_request(field: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"page.png\"\r\n",
            field
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn page_base64() -> String {
    STANDARD.encode(encode_png(&synthetic_page(&THREE_BANDS)))
}

#[cfg(test)]
mod ocr_endpoint_tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(30);

    #[tokio::test]
    async fn test_health() {
        let response = app(mock_recognizer(), TIMEOUT)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["segmentation"], "projection");
        assert_eq!(body["recognizer"], "line-recognizer");
    }

    #[tokio::test]
    async fn test_ocr_returns_page_text_and_lines() {
        let response = app(extent_reader(1), TIMEOUT)
            .oneshot(json_request(
                "/v1/ocr",
                serde_json::json!({ "image": page_base64() }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["text"], "ends at 379\nends at 379\nends at 379");
        assert_eq!(body["lines"].as_array().unwrap().len(), 3);
        assert_eq!(body["lines"][0]["status"], "text");
        assert_eq!(body["failedLines"], 0);
        assert!(body["processingTimeMs"].is_u64());
    }

    #[tokio::test]
    async fn test_ocr_missing_image_is_400() {
        let response = app(mock_recognizer(), TIMEOUT)
            .oneshot(json_request("/v1/ocr", serde_json::json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await;
        assert_eq!(body["error_type"], "validation_error");
    }

    #[tokio::test]
    async fn test_ocr_undecodable_image_is_400() {
        let mut mock = mock_recognizer();
        mock.expect_recognize().times(0);

        let response = app(mock, TIMEOUT)
            .oneshot(json_request(
                "/v1/ocr",
                serde_json::json!({ "image": STANDARD.encode(b"not an image at all") }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await;
        assert_eq!(body["error_type"], "invalid_image");
    }

    #[tokio::test]
    async fn test_ocr_recognizer_unavailable_is_503() {
        let mut mock = mock_recognizer();
        mock.expect_recognize()
            .returning(|_| Err(RecognitionError::Unavailable("model unloaded".to_string())));

        let response = app(mock, TIMEOUT)
            .oneshot(json_request(
                "/v1/ocr",
                serde_json::json!({ "image": page_base64() }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_ocr_deadline_is_408() {
        let mut mock = mock_recognizer();
        mock.expect_recognize().returning(|_| {
            std::thread::sleep(Duration::from_millis(300));
            Ok("slow".to_string())
        });

        let response = app(mock, Duration::from_millis(50))
            .oneshot(json_request(
                "/v1/ocr",
                serde_json::json!({ "image": page_base64() }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        let body = read_json(response).await;
        assert_eq!(body["error_type"], "cancelled");
        assert_eq!(body["details"]["total_lines"], 3);
    }

    #[tokio::test]
    async fn test_upload_returns_extracted_text() {
        let png = encode_png(&synthetic_page(&THREE_BANDS));
        let response = app(extent_reader(1), TIMEOUT)
            .oneshot(multipart_request("image", &png))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(
            body["extracted_text"],
            "ends at 379\nends at 379\nends at 379"
        );
    }

    #[tokio::test]
    async fn test_upload_blank_page() {
        let png = encode_png(&synthetic_page(&[]));
        let response = app(extent_reader(1), TIMEOUT)
            .oneshot(multipart_request("image", &png))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["extracted_text"], NO_TEXT_SENTINEL);
    }

    #[tokio::test]
    async fn test_upload_without_image_field_is_400() {
        let png = encode_png(&synthetic_page(&THREE_BANDS));
        let response = app(mock_recognizer(), TIMEOUT)
            .oneshot(multipart_request("document", &png))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await;
        assert_eq!(body["error"], "No image uploaded");
    }

    #[tokio::test]
    async fn test_upload_corrupt_image_is_400() {
        let response = app(mock_recognizer(), TIMEOUT)
            .oneshot(multipart_request("image", &[0x89, 0x50, 0x4E, 0x47, 0, 0, 0, 0]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await;
        assert!(body["error"].as_str().unwrap().starts_with("Invalid image"));
    }
}
