//! Endpoint tests against a pipeline wired with in-memory collaborators.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use paperdigest::categorizer::Classifier;
use paperdigest::config::ClassifierConfig;
use paperdigest::processor::{ExtractionCascade, NativeTextLayer, PageOcr};
use paperdigest::report::PdfReportRenderer;
use paperdigest::testing::{
    folders_for, sample_pdf, MockOcrEngine, MockRasterizer, MockRecordStore, MockStorage,
    MockSummarizer,
};
use paperdigest::{ArchiveRouter, Pipeline, PipelineConfig};
use paperdigest_server::{create_router, AppState};

struct TestApp {
    router: axum::Router,
    records: Arc<MockRecordStore>,
    summarizer: Arc<MockSummarizer>,
    storage: Arc<MockStorage>,
}

fn app_with(records: MockRecordStore, storage: MockStorage) -> TestApp {
    let records = Arc::new(records);
    let summarizer = Arc::new(MockSummarizer::returning("SUMMARY"));
    let storage = Arc::new(storage);

    let cascade = ExtractionCascade::new(
        vec![
            Box::new(NativeTextLayer::new()),
            Box::new(PageOcr::new("local_ocr", Arc::new(MockOcrEngine::text("ocr")), 2)),
        ],
        Arc::new(MockRasterizer::new(1)),
    );
    let pipeline = Pipeline::new(
        Arc::new(PipelineConfig::default()),
        records.clone(),
        cascade,
        Classifier::new(&ClassifierConfig::default()),
        summarizer.clone(),
        Arc::new(PdfReportRenderer::new(&Default::default())),
        ArchiveRouter::new(folders_for(&["other"]), storage.clone()),
    );

    TestApp {
        router: create_router(AppState::new(pipeline)),
        records,
        summarizer,
        storage,
    }
}

fn two_page_record() -> MockRecordStore {
    MockRecordStore::with_document(
        "42",
        "Monthly report",
        "report.pdf",
        sample_pdf(&["Revenue grew", "Costs fell"]),
    )
}

fn post_json(body: &str) -> Request<Body> {
    Request::post("/")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_job_returns_all_produced_values() {
    let app = app_with(two_page_record(), MockStorage::new());

    let response = app
        .router
        .oneshot(post_json(r#"{"recordId": "42"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["summary"], "SUMMARY");
    assert_eq!(
        body["original_link"],
        "https://storage.test/original-other/report.pdf"
    );
    let report_link = body["summary_pdf_link"].as_str().unwrap();
    assert!(report_link.starts_with("https://storage.test/summary-other/report_summary_"));
    assert_eq!(body.as_object().unwrap().len(), 3);

    let (_, text) = app.summarizer.last_request().unwrap();
    let first = text.find("Revenue grew").unwrap();
    let second = text.find("Costs fell").unwrap();
    assert!(first < second);
}

#[tokio::test]
async fn test_numeric_record_id_is_accepted() {
    let app = app_with(two_page_record(), MockStorage::new());
    let response = app
        .router
        .oneshot(post_json(r#"{"recordId": 42, "prompt": "Summarize briefly"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let (instruction, _) = app.summarizer.last_request().unwrap();
    assert_eq!(instruction, "Summarize briefly");
}

#[tokio::test]
async fn test_unreachable_record_store_is_bad_gateway() {
    let app = app_with(MockRecordStore::unreachable(), MockStorage::new());

    let response = app
        .router
        .oneshot(post_json(r#"{"recordId": "42"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("Failed to fetch record"));
    assert_eq!(body.as_object().unwrap().len(), 1);
    assert_eq!(app.records.calls(), 1);
    assert_eq!(app.summarizer.calls(), 0);
    assert!(app.storage.uploads().is_empty());
}

#[tokio::test]
async fn test_report_upload_failure_is_partial_success() {
    let app = app_with(
        two_page_record(),
        MockStorage::new().fail_uploads_to("summary-other"),
    );

    let response = app
        .router
        .oneshot(post_json(r#"{"recordId": "42"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["summary"], "SUMMARY");
    assert!(body.get("original_link").is_some());
    assert!(body.get("summary_pdf_link").is_none());
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let app = app_with(two_page_record(), MockStorage::new());

    for body in [r#"{"prompt": "x"}"#, "not json", r#"{"recordId": null}"#] {
        let response = app.router.clone().oneshot(post_json(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
        assert!(body_json(response).await["error"].is_string());
    }
    assert_eq!(app.records.calls(), 0);
}

#[tokio::test]
async fn test_options_and_head_return_empty_success() {
    let app = app_with(two_page_record(), MockStorage::new());

    for method in ["OPTIONS", "HEAD"] {
        let request = Request::builder()
            .method(method)
            .uri("/")
            .body(Body::empty())
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "method: {}", method);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(bytes.is_empty());
    }
    assert_eq!(app.records.calls(), 0);
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let app = app_with(two_page_record(), MockStorage::new());

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/")
        .header("origin", "https://example.cybozu.com")
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );
}

#[tokio::test]
async fn test_health() {
    let app = app_with(two_page_record(), MockStorage::new());

    let response = app
        .router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
