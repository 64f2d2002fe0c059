use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};

use crate::archive::ArchiveRouter;
use crate::categorizer::{Category, ClassificationSubject, Classifier};
use crate::config::{ArtifactKind, Config};
use crate::error::{PaperdigestError, ProcessError};
use crate::http::build_client;
use crate::processor::{ExtractionCascade, SourceDocument};
use crate::record::{FieldValue, KintoneClient, RecordStore};
use crate::report::{report_file_name, report_title, PdfReportRenderer, ReportRenderer};
use crate::sanitize;
use crate::summarizer::{GeminiSummarizer, Summarizer};

use super::config::PipelineConfig;
use super::context::{PipelineContext, Stage};
use super::error::{FetchError, PipelineError};
use super::job::{JobResponse, JobResult};
use super::workspace::JobWorkspace;

/// Runs one job through every stage, writing results back to the record as
/// each stage finishes.
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    records: Arc<dyn RecordStore>,
    cascade: ExtractionCascade,
    classifier: Classifier,
    summarizer: Arc<dyn Summarizer>,
    renderer: Arc<dyn ReportRenderer>,
    archive: ArchiveRouter,
}

impl Pipeline {
    /// Production constructor: builds every collaborator from config.
    pub fn from_config(config: &Config) -> Result<Self, PaperdigestError> {
        let client = build_client(&config.http)?;
        let request_timeout = std::time::Duration::from_secs(config.http.request_timeout_secs);

        let records = KintoneClient::new(
            client.clone(),
            &config.record_store,
            config.record_store.api_token.resolve("record_store.api_token")?,
        );
        let summarizer = GeminiSummarizer::new(
            client.clone(),
            &config.summarizer,
            config.summarizer.api_key.resolve("summarizer.api_key")?,
        );
        let cascade = ExtractionCascade::from_config(&config.ocr, &client, request_timeout);
        let archive = ArchiveRouter::from_config(&config.archive, &client)?;

        info!(
            strategies = ?cascade.strategy_names(),
            model = %config.summarizer.model,
            "Pipeline ready"
        );

        Ok(Self::new(
            Arc::new(PipelineConfig::from_config(config)),
            Arc::new(records),
            cascade,
            Classifier::new(&config.classifier),
            Arc::new(summarizer),
            Arc::new(PdfReportRenderer::new(&config.report)),
            archive,
        ))
    }

    /// Wires explicit collaborators, e.g. test doubles.
    pub fn new(
        config: Arc<PipelineConfig>,
        records: Arc<dyn RecordStore>,
        cascade: ExtractionCascade,
        classifier: Classifier,
        summarizer: Arc<dyn Summarizer>,
        renderer: Arc<dyn ReportRenderer>,
        archive: ArchiveRouter,
    ) -> Self {
        Self {
            config,
            records,
            cascade,
            classifier,
            summarizer,
            renderer,
            archive,
        }
    }

    /// Runs the job. Only a Fetch failure yields [`JobResult::Failed`];
    /// every later failure is recorded in the context and the job continues.
    pub async fn run(&self, mut ctx: PipelineContext) -> (JobResult, PipelineContext) {
        let span = info_span!("pipeline",
            job_id = %ctx.job.id,
            record_id = %ctx.job.record_id,
        );
        let result = self.run_stages(&mut ctx).instrument(span).await;

        if let Some(workspace) = ctx.workspace.take() {
            workspace.release();
        }
        (result, ctx)
    }

    async fn run_stages(&self, ctx: &mut PipelineContext) -> JobResult {
        if let Err(e) = self
            .step_fetch(ctx)
            .instrument(info_span!("fetch"))
            .await
        {
            let error = PipelineError::from(e);
            let message = error.to_string();
            ctx.fail(Stage::Fetch, error);
            return JobResult::Failed { error: message };
        }
        ctx.complete(Stage::Fetch);

        self.step_classify(ctx);

        self.step_upload_original(ctx)
            .instrument(info_span!("upload_original"))
            .await;

        self.step_extract_text(ctx)
            .instrument(info_span!("extract_text"))
            .await;

        self.step_summarize(ctx)
            .instrument(info_span!("summarize"))
            .await;

        self.step_render_report(ctx)
            .instrument(info_span!("render_report"))
            .await;

        self.step_upload_report(ctx)
            .instrument(info_span!("upload_report"))
            .await;

        self.step_clear_source(ctx)
            .instrument(info_span!("clear_source"))
            .await;

        let response = JobResponse {
            summary: ctx.summary.as_ref().map(|s| s.text.clone()),
            original_link: ctx.original_link.as_ref().map(|l| l.to_string()),
            summary_pdf_link: ctx.summary_link.as_ref().map(|l| l.to_string()),
        };
        info!(
            failures = ctx.errors.len(),
            original_link = response.original_link.is_some(),
            summary_pdf_link = response.summary_pdf_link.is_some(),
            "Job finished"
        );
        JobResult::Completed(response)
    }

    async fn step_fetch(&self, ctx: &mut PipelineContext) -> Result<(), FetchError> {
        let fields = &self.config.fields;

        let record = self
            .records
            .get_record(&ctx.job.record_id)
            .await
            .map_err(FetchError::Record)?;

        let attachment = record
            .attachments(&fields.attachment)
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::NoAttachment {
                field: fields.attachment.clone(),
            })?;

        let bytes = self
            .records
            .download(&attachment.file_key)
            .await
            .map_err(FetchError::Download)?;

        let workspace = JobWorkspace::create(&ctx.job.id).map_err(FetchError::Workspace)?;
        let title = record.text(&fields.title).map(str::to_string);
        let document =
            SourceDocument::materialize(&attachment.name, bytes, title, workspace.path())
                .await
                .map_err(FetchError::Document)?;

        debug!(
            file = %sanitize::redact_path(&document.path),
            format = ?document.format,
            bytes = document.bytes.len(),
            "Fetched attachment"
        );

        ctx.workspace = Some(workspace);
        ctx.record = Some(record);
        ctx.document = Some(document);
        Ok(())
    }

    /// Pure. An override wins only when it names a known category.
    fn step_classify(&self, ctx: &mut PipelineContext) {
        let override_category = ctx.job.category_override.as_deref().and_then(|label| {
            let resolved = self.classifier.resolve(label);
            if resolved.is_none() {
                warn!(category = label, "Ignoring unknown category override");
            }
            resolved
        });

        let category = override_category.unwrap_or_else(|| {
            let title = ctx.document.as_ref().and_then(|d| d.title.as_deref());
            let mut subject = ClassificationSubject {
                title,
                record: None,
            };
            if let Some(record) = ctx.record.as_ref() {
                subject = subject.with_record(record);
            }
            self.classifier.classify(&subject)
        });

        info!(category = %category, "Classified");
        ctx.category = Some(category);
        ctx.complete(Stage::Classify);
    }

    fn category(&self, ctx: &PipelineContext) -> Category {
        ctx.category
            .clone()
            .unwrap_or_else(|| self.classifier.default_category().clone())
    }

    async fn step_upload_original(&self, ctx: &mut PipelineContext) {
        let Some(document) = ctx.document.as_ref() else {
            ctx.skip(Stage::UploadOriginal);
            ctx.skip(Stage::PersistOriginalLink);
            return;
        };

        let category = self.category(ctx);
        let result = self
            .archive
            .archive(
                ArtifactKind::Original,
                &category,
                &document.bytes,
                &document.file_name,
                &document.content_type,
            )
            .await;

        match result {
            Ok(link) => {
                ctx.complete(Stage::UploadOriginal);
                let field = self.config.fields.original_link.clone();
                self.persist(ctx, Stage::PersistOriginalLink, &field, FieldValue::Text(link.to_string()))
                    .await;
                ctx.original_link = Some(link);
            }
            Err(e) => {
                ctx.fail(Stage::UploadOriginal, e.into());
                ctx.skip(Stage::PersistOriginalLink);
            }
        }
    }

    async fn step_extract_text(&self, ctx: &mut PipelineContext) {
        let (Some(document), Some(workspace)) = (ctx.document.as_ref(), ctx.workspace.as_ref())
        else {
            ctx.skip(Stage::ExtractText);
            return;
        };

        let extraction = self.cascade.extract(document, workspace.path()).await;
        let exhausted = extraction.is_empty();
        ctx.extraction = Some(extraction);
        ctx.complete(Stage::ExtractText);

        if exhausted {
            warn!(error = %PipelineError::ExtractionExhausted, "Continuing with empty text");
            ctx.errors.push(PipelineError::ExtractionExhausted);
        }
    }

    async fn step_summarize(&self, ctx: &mut PipelineContext) {
        let text = ctx
            .extraction
            .as_ref()
            .map(|e| e.text.as_str())
            .unwrap_or_default();
        let instruction = ctx
            .job
            .prompt
            .as_deref()
            .unwrap_or(&self.config.default_prompt);

        let summary = self.summarizer.summarize(text, instruction).await;
        if summary.degraded {
            warn!(error = %PipelineError::SummarizationDegraded, "Using placeholder summary");
            ctx.errors.push(PipelineError::SummarizationDegraded);
        }
        ctx.complete(Stage::Summarize);

        let field = self.config.fields.summary_text.clone();
        self.persist(ctx, Stage::PersistSummaryText, &field, FieldValue::Text(summary.text.clone()))
            .await;
        ctx.summary = Some(summary);
    }

    async fn step_render_report(&self, ctx: &mut PipelineContext) {
        let (Some(summary), Some(document)) = (ctx.summary.as_ref(), ctx.document.as_ref()) else {
            ctx.skip(Stage::RenderReport);
            return;
        };

        let title = report_title(&self.config.report, document.title.as_deref(), document.stem());
        let text = summary.text.clone();
        let renderer = Arc::clone(&self.renderer);

        let rendered = tokio::task::spawn_blocking(move || renderer.render(&title, &text))
            .await
            .map_err(|e| ProcessError::Render(format!("Render task failed: {}", e)))
            .and_then(|r| r);

        match rendered {
            Ok(report) => {
                debug!(pages = report.pages, "Report rendered");
                ctx.report = Some(report);
                ctx.complete(Stage::RenderReport);
            }
            Err(e) => ctx.fail(Stage::RenderReport, PipelineError::Render(e)),
        }
    }

    async fn step_upload_report(&self, ctx: &mut PipelineContext) {
        let (Some(report), Some(document)) = (ctx.report.as_ref(), ctx.document.as_ref()) else {
            ctx.skip(Stage::UploadReport);
            ctx.skip(Stage::PersistReportLink);
            return;
        };

        let category = self.category(ctx);
        let name = report_file_name(
            &self.config.report,
            document.stem(),
            chrono::Local::now().date_naive(),
        );
        let result = self
            .archive
            .archive(
                ArtifactKind::Summary,
                &category,
                &report.bytes,
                &name,
                self.renderer.content_type(),
            )
            .await;

        match result {
            Ok(link) => {
                ctx.complete(Stage::UploadReport);
                let field = self.config.fields.summary_link.clone();
                self.persist(ctx, Stage::PersistReportLink, &field, FieldValue::Text(link.to_string()))
                    .await;
                ctx.summary_link = Some(link);
            }
            Err(e) => {
                ctx.fail(Stage::UploadReport, e.into());
                ctx.skip(Stage::PersistReportLink);
            }
        }
    }

    /// Clearing the attachment marks the record as processed.
    async fn step_clear_source(&self, ctx: &mut PipelineContext) {
        if self.config.clear_source_requires_archive && ctx.original_link.is_none() {
            warn!("Original not archived, keeping source attachment");
            ctx.skip(Stage::ClearSource);
            return;
        }

        let field = &self.config.fields.attachment;
        match self.records.clear_field(&ctx.job.record_id, field).await {
            Ok(()) => ctx.complete(Stage::ClearSource),
            Err(e) => ctx.fail(
                Stage::ClearSource,
                PipelineError::Persistence {
                    field: field.clone(),
                    source: e,
                },
            ),
        }
    }

    async fn persist(&self, ctx: &mut PipelineContext, stage: Stage, field: &str, value: FieldValue) {
        match self.records.put_field(&ctx.job.record_id, field, value).await {
            Ok(()) => {
                debug!(stage = %stage, field, "Persisted");
                ctx.complete(stage);
            }
            Err(e) => ctx.fail(
                stage,
                PipelineError::Persistence {
                    field: field.to_string(),
                    source: e,
                },
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClassifierConfig, KeywordRule};
    use crate::pipeline::context::StageStatus;
    use crate::pipeline::job::Job;
    use crate::processor::{NativeTextLayer, PageOcr};
    use crate::record::RecordId;
    use crate::testing::{
        folders_for, sample_pdf, MockOcrEngine, MockRasterizer, MockRecordStore, MockRenderer,
        MockStorage, MockSummarizer,
    };

    struct Fixture {
        records: Arc<MockRecordStore>,
        summarizer: Arc<MockSummarizer>,
        storage: Arc<MockStorage>,
        local_ocr: Arc<MockOcrEngine>,
        cloud_ocr: Arc<MockOcrEngine>,
        renderer: Arc<dyn ReportRenderer>,
        folders: crate::config::FolderTable,
        config: PipelineConfig,
    }

    impl Fixture {
        fn new(records: MockRecordStore) -> Self {
            Self {
                records: Arc::new(records),
                summarizer: Arc::new(MockSummarizer::returning("SUMMARY")),
                storage: Arc::new(MockStorage::new()),
                local_ocr: Arc::new(MockOcrEngine::text("ocr text")),
                cloud_ocr: Arc::new(MockOcrEngine::text("cloud text")),
                renderer: Arc::new(PdfReportRenderer::new(&Default::default())),
                folders: folders_for(&["invoice", "other"]),
                config: PipelineConfig::default(),
            }
        }

        fn pipeline(&self) -> Pipeline {
            let classifier = Classifier::new(&ClassifierConfig {
                categories: vec!["invoice".to_string()],
                keywords: vec![KeywordRule {
                    category: "invoice".to_string(),
                    keywords: vec!["請求書".to_string()],
                    pattern: None,
                }],
                ..ClassifierConfig::default()
            });
            let cascade = ExtractionCascade::new(
                vec![
                    Box::new(NativeTextLayer::new()),
                    Box::new(PageOcr::new("local_ocr", self.local_ocr.clone(), 2)),
                    Box::new(PageOcr::new("cloud_ocr", self.cloud_ocr.clone(), 2)),
                ],
                Arc::new(MockRasterizer::new(1)),
            );
            Pipeline::new(
                Arc::new(self.config.clone()),
                self.records.clone(),
                cascade,
                classifier,
                self.summarizer.clone(),
                self.renderer.clone(),
                ArchiveRouter::new(self.folders.clone(), self.storage.clone()),
            )
        }

        async fn run(&self, job: Job) -> (JobResult, PipelineContext) {
            self.pipeline().run(PipelineContext::new(job)).await
        }
    }

    fn job() -> Job {
        Job::new(RecordId::new("42"))
    }

    fn native_record(title: &str) -> MockRecordStore {
        MockRecordStore::with_document(
            "42",
            title,
            "invoice.pdf",
            sample_pdf(&["Total 50,000 JPY", "Due 2024-05-31"]),
        )
    }

    fn completed(result: JobResult) -> JobResponse {
        match result {
            JobResult::Completed(response) => response,
            JobResult::Failed { error } => panic!("Job failed: {}", error),
        }
    }

    #[tokio::test]
    async fn test_happy_path_persists_every_field_and_clears_source() {
        let fixture = Fixture::new(native_record("請求書 4月分"));
        let (result, ctx) = fixture.run(job()).await;
        let response = completed(result);

        assert_eq!(response.summary.as_deref(), Some("SUMMARY"));
        assert_eq!(
            response.original_link.as_deref(),
            Some("https://storage.test/original-invoice/invoice.pdf")
        );
        assert!(response
            .summary_pdf_link
            .as_deref()
            .unwrap()
            .starts_with("https://storage.test/summary-invoice/invoice_summary_"));

        let writes = fixture.records.writes();
        let fields: Vec<&str> = writes.iter().map(|(f, _)| f.as_str()).collect();
        assert_eq!(
            fields,
            vec!["original_link", "summary", "summary_pdf_link", "attachment"]
        );
        assert_eq!(writes[3].1, FieldValue::Files(vec![]));

        assert!(ctx.errors.is_empty());
        assert!(ctx.workspace.is_none());
        assert_eq!(fixture.local_ocr.calls(), 0);
    }

    #[tokio::test]
    async fn test_default_prompt_used_without_override() {
        let fixture = Fixture::new(native_record("t"));
        fixture.run(job()).await;

        let (instruction, text) = fixture.summarizer.last_request().unwrap();
        assert_eq!(instruction, "以下を要約してください：");
        assert!(text.contains("Total 50,000 JPY"));
    }

    #[tokio::test]
    async fn test_job_prompt_overrides_default() {
        let fixture = Fixture::new(native_record("t"));
        let mut job = job();
        job.prompt = Some("三行で要約".to_string());
        fixture.run(job).await;

        let (instruction, _) = fixture.summarizer.last_request().unwrap();
        assert_eq!(instruction, "三行で要約");
    }

    #[tokio::test]
    async fn test_both_artifacts_share_one_category() {
        let fixture = Fixture::new(native_record("請求書"));
        fixture.run(job()).await;

        let folders: Vec<String> = fixture.storage.uploads().into_iter().map(|(f, _)| f).collect();
        assert_eq!(folders, vec!["original-invoice", "summary-invoice"]);
    }

    #[tokio::test]
    async fn test_known_override_wins_unknown_is_ignored() {
        let fixture = Fixture::new(native_record("請求書"));
        let mut j = job();
        j.category_override = Some("other".to_string());
        let (_, ctx) = fixture.run(j).await;
        assert_eq!(ctx.category.unwrap().as_str(), "other");

        let fixture = Fixture::new(native_record("請求書"));
        let mut j = job();
        j.category_override = Some("receipts".to_string());
        let (_, ctx) = fixture.run(j).await;
        assert_eq!(ctx.category.unwrap().as_str(), "invoice");
    }

    #[tokio::test]
    async fn test_report_upload_failure_keeps_summary_and_original_link() {
        let mut fixture = Fixture::new(native_record("請求書"));
        fixture.storage = Arc::new(MockStorage::new().fail_uploads_to("summary-invoice"));
        let (result, ctx) = fixture.run(job()).await;
        let response = completed(result);

        assert_eq!(response.summary.as_deref(), Some("SUMMARY"));
        assert!(response.original_link.is_some());
        assert!(response.summary_pdf_link.is_none());
        assert_eq!(ctx.status(Stage::PersistReportLink), Some(&StageStatus::Skipped));
        assert_eq!(ctx.status(Stage::ClearSource), Some(&StageStatus::Completed));
    }

    #[tokio::test]
    async fn test_missing_folder_mapping_is_configuration_error() {
        let mut fixture = Fixture::new(native_record("雑記"));
        fixture.folders = folders_for(&["invoice"]);
        let (result, ctx) = fixture.run(job()).await;
        let response = completed(result);

        assert_eq!(response.summary.as_deref(), Some("SUMMARY"));
        assert!(response.original_link.is_none());
        assert!(response.summary_pdf_link.is_none());
        assert!(fixture.storage.uploads().is_empty());
        assert!(ctx
            .errors
            .iter()
            .any(|e| matches!(e, PipelineError::Configuration { kind: ArtifactKind::Original, .. })));
    }

    #[tokio::test]
    async fn test_render_failure_skips_report_upload() {
        let mut fixture = Fixture::new(native_record("請求書"));
        fixture.renderer = Arc::new(MockRenderer::failing());
        let (result, ctx) = fixture.run(job()).await;
        let response = completed(result);

        assert!(response.summary_pdf_link.is_none());
        assert_eq!(fixture.storage.uploads().len(), 1);
        assert!(matches!(ctx.status(Stage::RenderReport), Some(StageStatus::Failed(_))));
        assert_eq!(ctx.status(Stage::UploadReport), Some(&StageStatus::Skipped));
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_stop_later_stages() {
        let fixture = Fixture::new(native_record("請求書").fail_writes_to("summary"));
        let (result, ctx) = fixture.run(job()).await;
        let response = completed(result);

        assert_eq!(response.summary.as_deref(), Some("SUMMARY"));
        assert!(response.summary_pdf_link.is_some());
        assert!(matches!(
            ctx.status(Stage::PersistSummaryText),
            Some(StageStatus::Failed(_))
        ));
        assert_eq!(ctx.status(Stage::ClearSource), Some(&StageStatus::Completed));
    }

    #[tokio::test]
    async fn test_missing_attachment_is_fatal_and_touches_nothing() {
        let records = MockRecordStore::with_record(
            crate::record::Record::new(RecordId::new("42")).with_text("title", "請求書"),
        );
        let fixture = Fixture::new(records);
        let (result, ctx) = fixture.run(job()).await;

        match result {
            JobResult::Failed { error } => assert!(error.contains("attachment")),
            other => panic!("Expected failure, got {:?}", other),
        }
        assert!(fixture.records.writes().is_empty());
        assert_eq!(fixture.summarizer.calls(), 0);
        assert!(fixture.storage.uploads().is_empty());
        assert_eq!(ctx.journal.len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_without_other_calls() {
        let fixture = Fixture::new(MockRecordStore::unreachable());
        let (result, ctx) = fixture.run(job()).await;

        assert!(!result.is_success());
        assert_eq!(fixture.records.calls(), 1);
        assert_eq!(fixture.summarizer.calls(), 0);
        assert_eq!(fixture.local_ocr.calls(), 0);
        assert!(fixture.storage.uploads().is_empty());
        assert!(ctx.errors[0].is_fatal());
    }

    #[tokio::test]
    async fn test_unsupported_attachment_is_fatal() {
        let records = MockRecordStore::with_document("42", "memo", "notes.txt", b"plain text".to_vec());
        let fixture = Fixture::new(records);
        let (result, _) = fixture.run(job()).await;
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn test_empty_extraction_still_summarizes_with_placeholder_path() {
        let mut fixture = Fixture::new(MockRecordStore::with_document(
            "42",
            "請求書",
            "scan.pdf",
            sample_pdf(&[""]),
        ));
        fixture.local_ocr = Arc::new(MockOcrEngine::failing());
        fixture.cloud_ocr = Arc::new(MockOcrEngine::failing());
        fixture.summarizer = Arc::new(MockSummarizer::degraded("⚠ 要約できませんでした"));
        let (result, ctx) = fixture.run(job()).await;
        let response = completed(result);

        assert_eq!(response.summary.as_deref(), Some("⚠ 要約できませんでした"));
        assert!(ctx
            .errors
            .iter()
            .any(|e| matches!(e, PipelineError::ExtractionExhausted)));
        assert!(ctx
            .errors
            .iter()
            .any(|e| matches!(e, PipelineError::SummarizationDegraded)));
        assert!(response.original_link.is_some());
    }

    #[tokio::test]
    async fn test_clear_source_can_require_archived_original() {
        let mut fixture = Fixture::new(native_record("雑記"));
        fixture.folders = crate::config::FolderTable::new();
        fixture.config.clear_source_requires_archive = true;
        let (_, ctx) = fixture.run(job()).await;

        assert_eq!(ctx.status(Stage::ClearSource), Some(&StageStatus::Skipped));
        assert!(fixture
            .records
            .writes()
            .iter()
            .all(|(field, _)| field != "attachment"));
    }

    #[tokio::test]
    async fn test_clear_source_runs_by_default_even_without_archive() {
        let mut fixture = Fixture::new(native_record("雑記"));
        fixture.folders = crate::config::FolderTable::new();
        let (_, ctx) = fixture.run(job()).await;
        assert_eq!(ctx.status(Stage::ClearSource), Some(&StageStatus::Completed));
    }

    #[tokio::test]
    async fn test_journal_follows_stage_order() {
        let fixture = Fixture::new(native_record("請求書"));
        let (_, ctx) = fixture.run(job()).await;

        let stages: Vec<Stage> = ctx.journal.iter().map(|r| r.stage).collect();
        assert_eq!(
            stages,
            vec![
                Stage::Fetch,
                Stage::Classify,
                Stage::UploadOriginal,
                Stage::PersistOriginalLink,
                Stage::ExtractText,
                Stage::Summarize,
                Stage::PersistSummaryText,
                Stage::RenderReport,
                Stage::UploadReport,
                Stage::PersistReportLink,
                Stage::ClearSource,
            ]
        );
    }
}
