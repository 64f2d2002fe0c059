//! End-to-end pipeline runs against a filesystem archive.

mod common;

use common::{RuleBuilder, TestHarness};
use paperdigest::record::FieldValue;
use paperdigest::testing::{sample_pdf, sample_png, MockOcrEngine, MockRecordStore};
use paperdigest::{JobResponse, JobResult, Stage};

fn completed(result: JobResult) -> JobResponse {
    match result {
        JobResult::Completed(response) => response,
        JobResult::Failed { error } => panic!("Job failed: {}", error),
    }
}

fn invoice_harness(records: MockRecordStore) -> TestHarness {
    TestHarness::new(records, |config| {
        config
            .category("invoice")
            .route("other")
            .rule(RuleBuilder::new("invoice").keyword("請求書").build())
    })
}

#[tokio::test]
async fn test_native_pdf_archives_both_artifacts_under_one_category() {
    let harness = invoice_harness(MockRecordStore::with_document(
        "42",
        "請求書 4月分",
        "april.pdf",
        sample_pdf(&["Amount due 50,000 JPY", "Payment by 2024-05-31"]),
    ));

    let (result, ctx) = harness.run("42").await;
    let response = completed(result);

    assert_eq!(response.summary.as_deref(), Some("SUMMARY"));
    assert_eq!(
        response.original_link.as_deref(),
        Some("https://files.test/original-invoice/april.pdf")
    );

    let files = harness.archived_files();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0], "original-invoice/april.pdf");
    assert!(files[1].starts_with("summary-invoice/april_summary_"));

    let report = std::fs::read(harness.archive_dir.join(&files[1])).unwrap();
    assert!(report.starts_with(b"%PDF"));

    assert_eq!(harness.local_ocr.calls(), 0);
    assert_eq!(
        ctx.extraction.as_ref().and_then(|e| e.strategy.as_deref()),
        Some("native")
    );
}

#[tokio::test]
async fn test_links_are_written_back_as_they_are_produced() {
    let harness = invoice_harness(MockRecordStore::with_document(
        "7",
        "請求書",
        "inv.pdf",
        sample_pdf(&["Total 1,000"]),
    ));

    let (result, _) = harness.run("7").await;
    let response = completed(result);

    assert_eq!(
        harness.records.field("original_link"),
        response.original_link.map(FieldValue::Text)
    );
    assert_eq!(
        harness.records.field("summary"),
        Some(FieldValue::Text("SUMMARY".to_string()))
    );
    assert_eq!(
        harness.records.field("summary_pdf_link"),
        response.summary_pdf_link.map(FieldValue::Text)
    );
    assert_eq!(
        harness.records.field("attachment"),
        Some(FieldValue::Files(vec![]))
    );
}

#[tokio::test]
async fn test_scanned_image_goes_through_local_ocr() {
    let harness = TestHarness::with_ocr(
        MockRecordStore::with_document("9", "領収書", "receipt.png", sample_png()),
        MockOcrEngine::text("領収金額 3,300円"),
        |config| config.route("other"),
    );

    let (result, ctx) = harness.run("9").await;
    completed(result);

    assert_eq!(harness.local_ocr.calls(), 1);
    let (_, text) = harness.summarizer.last_request().unwrap();
    assert_eq!(text, "領収金額 3,300円");
    assert_eq!(
        ctx.extraction.as_ref().and_then(|e| e.strategy.as_deref()),
        Some("local_ocr")
    );
    assert!(harness
        .archived_files()
        .contains(&"original-other/receipt.png".to_string()));
}

#[tokio::test]
async fn test_retry_archives_again_under_fresh_names() {
    let harness = invoice_harness(MockRecordStore::with_document(
        "42",
        "請求書",
        "april.pdf",
        sample_pdf(&["Amount due"]),
    ));

    let (first, _) = harness.run("42").await;
    let (second, _) = harness.run("42").await;

    assert_eq!(
        completed(first).original_link.as_deref(),
        Some("https://files.test/original-invoice/april.pdf")
    );
    assert_eq!(
        completed(second).original_link.as_deref(),
        Some("https://files.test/original-invoice/april_2.pdf")
    );
    assert_eq!(harness.archived_files().len(), 4);
}

#[tokio::test]
async fn test_unrouted_category_keeps_attachment_when_archive_required() {
    let harness = TestHarness::new(
        MockRecordStore::with_document("5", "議事録", "minutes.pdf", sample_pdf(&["Agenda"])),
        |config| config.require_archive_before_clear(),
    );

    let (result, ctx) = harness.run("5").await;
    let response = completed(result);

    assert_eq!(response.summary.as_deref(), Some("SUMMARY"));
    assert!(response.original_link.is_none());
    assert!(response.summary_pdf_link.is_none());
    assert!(harness.archived_files().is_empty());
    assert!(harness.records.field("attachment").is_none());
    assert_eq!(ctx.errors.len(), 2);
    assert!(ctx.journal.iter().any(|r| r.stage == Stage::ClearSource));
}

#[tokio::test]
async fn test_workspace_is_removed_after_job() {
    let harness = invoice_harness(MockRecordStore::with_document(
        "42",
        "請求書",
        "april.pdf",
        sample_pdf(&["Amount due"]),
    ));

    let (_, ctx) = harness.run("42").await;

    assert!(ctx.workspace.is_none());
    let leftover = std::fs::read_dir(std::env::temp_dir())
        .unwrap()
        .flatten()
        .filter(|e| {
            e.file_name()
                .to_string_lossy()
                .starts_with(&format!("paperdigest-{}-", ctx.job.id))
        })
        .count();
    assert_eq!(leftover, 0);
}
