//! In-memory collaborators and sample documents for tests.
//!
//! Enabled for this crate's unit tests and, through the `testing` feature,
//! for downstream integration tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use crate::archive::{ArchiveBackend, ArchiveError, UploadedFile};
use crate::config::{ArtifactKind, FolderTable};
use crate::error::ProcessError;
use crate::processor::{OcrEngine, PageRasterizer};
use crate::record::{Attachment, FieldValue, Record, RecordError, RecordId, RecordStore};
use crate::report::{RenderedReport, ReportRenderer};
use crate::summarizer::{Summarizer, Summary};

/// A PDF with one Courier text line per page. An empty string gives a page
/// with no text layer.
pub fn sample_pdf(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let operations = if text.is_empty() {
            Vec::new()
        } else {
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ]
        };
        let content = Content { operations }.encode().unwrap_or_default();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    let _ = doc.save_to(&mut bytes);
    bytes
}

/// A small white PNG.
pub fn sample_png() -> Vec<u8> {
    let image = image::RgbImage::from_pixel(8, 8, image::Rgb([255, 255, 255]));
    let mut bytes = std::io::Cursor::new(Vec::new());
    let _ = image.write_to(&mut bytes, image::ImageFormat::Png);
    bytes.into_inner()
}

/// `original-{category}` and `summary-{category}` for every label given.
pub fn folders_for(categories: &[&str]) -> FolderTable {
    let mut table = FolderTable::new();
    for category in categories {
        table
            .entry(ArtifactKind::Original)
            .or_default()
            .insert(category.to_string(), format!("original-{}", category));
        table
            .entry(ArtifactKind::Summary)
            .or_default()
            .insert(category.to_string(), format!("summary-{}", category));
    }
    table
}

// ---------------------------------------------------------------------------
// Record store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockRecordStore {
    records: HashMap<RecordId, Record>,
    files: HashMap<String, Vec<u8>>,
    unreachable: bool,
    failing_fields: Vec<String>,
    writes: Mutex<Vec<(String, FieldValue)>>,
    calls: AtomicUsize,
}

impl MockRecordStore {
    /// One record with a `title` text field and a single file in `attachment`
    /// under file key `fk-1`.
    pub fn with_document(id: &str, title: &str, file_name: &str, bytes: Vec<u8>) -> Self {
        let record = Record::new(RecordId::new(id))
            .with_text("title", title)
            .with_attachments(
                "attachment",
                vec![Attachment {
                    file_key: "fk-1".to_string(),
                    name: file_name.to_string(),
                    content_type: None,
                    size: Some(bytes.len().to_string()),
                }],
            );
        let mut store = Self::with_record(record);
        store.files.insert("fk-1".to_string(), bytes);
        store
    }

    pub fn with_record(record: Record) -> Self {
        let mut store = Self::default();
        store.records.insert(record.id.clone(), record);
        store
    }

    /// Every call fails as if the host could not be reached.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn fail_writes_to(mut self, field: &str) -> Self {
        self.failing_fields.push(field.to_string());
        self
    }

    /// Successful writes, in order.
    pub fn writes(&self) -> Vec<(String, FieldValue)> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    /// Last value written to `field`.
    pub fn field(&self, field: &str) -> Option<FieldValue> {
        self.writes()
            .into_iter()
            .rev()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<(), RecordError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            return Err(RecordError::Request("connection failed (mock)".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MockRecordStore {
    async fn get_record(&self, id: &RecordId) -> Result<Record, RecordError> {
        self.enter()?;
        self.records
            .get(id)
            .cloned()
            .ok_or_else(|| RecordError::NotFound(id.clone()))
    }

    async fn download(&self, file_key: &str) -> Result<Vec<u8>, RecordError> {
        self.enter()?;
        self.files.get(file_key).cloned().ok_or(RecordError::Status {
            status: 404,
            body: format!("no file {}", file_key),
        })
    }

    async fn put_field(
        &self,
        _id: &RecordId,
        field: &str,
        value: FieldValue,
    ) -> Result<(), RecordError> {
        self.enter()?;
        if self.failing_fields.iter().any(|f| f == field) {
            return Err(RecordError::Status {
                status: 400,
                body: format!("field {} rejected (mock)", field),
            });
        }
        if let Ok(mut writes) = self.writes.lock() {
            writes.push((field.to_string(), value));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Summarizer
// ---------------------------------------------------------------------------

pub struct MockSummarizer {
    summary: Summary,
    requests: Mutex<Vec<(String, String)>>,
}

impl MockSummarizer {
    pub fn returning(text: &str) -> Self {
        Self {
            summary: Summary::generated(text),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with the failure placeholder.
    pub fn degraded(placeholder: &str) -> Self {
        Self {
            summary: Summary::placeholder(placeholder),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    /// `(instruction, text)` of the most recent call.
    pub fn last_request(&self) -> Option<(String, String)> {
        self.requests.lock().ok().and_then(|r| r.last().cloned())
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(&self, text: &str, instruction: &str) -> Summary {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((instruction.to_string(), text.to_string()));
        }
        self.summary.clone()
    }
}

// ---------------------------------------------------------------------------
// Archive storage
// ---------------------------------------------------------------------------

/// Links have the form `https://storage.test/{folder}/{name}`.
#[derive(Default)]
pub struct MockStorage {
    fail_sharing: bool,
    failing_folders: Vec<String>,
    uploads: Mutex<Vec<(String, String)>>,
    shared: AtomicUsize,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_sharing(mut self) -> Self {
        self.fail_sharing = true;
        self
    }

    pub fn fail_uploads_to(mut self, folder: &str) -> Self {
        self.failing_folders.push(folder.to_string());
        self
    }

    /// `(folder, name)` of every successful upload.
    pub fn uploads(&self) -> Vec<(String, String)> {
        self.uploads.lock().map(|u| u.clone()).unwrap_or_default()
    }

    pub fn shared(&self) -> usize {
        self.shared.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArchiveBackend for MockStorage {
    async fn upload(
        &self,
        _bytes: &[u8],
        name: &str,
        _content_type: &str,
        folder: &str,
    ) -> Result<UploadedFile, ArchiveError> {
        if self.failing_folders.iter().any(|f| f == folder) {
            return Err(ArchiveError::Upload(format!("folder {} unavailable (mock)", folder)));
        }
        if let Ok(mut uploads) = self.uploads.lock() {
            uploads.push((folder.to_string(), name.to_string()));
        }
        Ok(UploadedFile {
            id: format!("{}/{}", folder, name),
            name: name.to_string(),
            web_link: format!("https://storage.test/{}/{}", folder, name),
        })
    }

    async fn set_public_readable(&self, file: &UploadedFile) -> Result<(), ArchiveError> {
        if self.fail_sharing {
            return Err(ArchiveError::Permission {
                name: file.name.clone(),
                reason: "sharing disabled (mock)".to_string(),
            });
        }
        self.shared.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Writes `page-N.png` files instead of running a real rasterizer.
pub struct MockRasterizer {
    pages: usize,
    fail: bool,
    calls: AtomicUsize,
}

impl MockRasterizer {
    pub fn new(pages: usize) -> Self {
        Self {
            pages,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(0)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageRasterizer for MockRasterizer {
    async fn rasterize(&self, _pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, ProcessError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProcessError::Rasterize("pdftoppm not available (mock)".to_string()));
        }

        tokio::fs::create_dir_all(out_dir)
            .await
            .map_err(|e| ProcessError::Rasterize(e.to_string()))?;
        let png = sample_png();
        let mut paths = Vec::with_capacity(self.pages);
        for page in 1..=self.pages {
            let path = out_dir.join(format!("page-{}.png", page));
            tokio::fs::write(&path, &png)
                .await
                .map_err(|e| ProcessError::Rasterize(e.to_string()))?;
            paths.push(path);
        }
        Ok(paths)
    }
}

type PageFn = Box<dyn Fn(usize) -> Result<String, ProcessError> + Send + Sync>;
type DelayFn = Box<dyn Fn(usize) -> Duration + Send + Sync>;

/// OCR engine answering per page number, parsed from `page-N` file names.
/// Any other image counts as page 1.
pub struct MockOcrEngine {
    respond: PageFn,
    delay: Option<DelayFn>,
    calls: AtomicUsize,
}

impl MockOcrEngine {
    pub fn text(text: &str) -> Self {
        let text = text.to_string();
        Self::per_page(move |_| Ok(text.clone()))
    }

    pub fn failing() -> Self {
        Self::per_page(|page| Err(ProcessError::OcrFailed(format!("page {} unreadable (mock)", page))))
    }

    pub fn per_page<F>(respond: F) -> Self
    where
        F: Fn(usize) -> Result<String, ProcessError> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay<F>(mut self, delay: F) -> Self
    where
        F: Fn(usize) -> Duration + Send + Sync + 'static,
    {
        self.delay = Some(Box::new(delay));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn page_of(image: &Path) -> usize {
    image
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.strip_prefix("page-"))
        .and_then(|n| n.parse().ok())
        .unwrap_or(1)
}

#[async_trait]
impl OcrEngine for MockOcrEngine {
    async fn recognize(&self, image: &Path) -> Result<String, ProcessError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let page = page_of(image);
        if let Some(delay) = &self.delay {
            tokio::time::sleep(delay(page)).await;
        }
        (self.respond)(page)
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockRenderer {
    fail: bool,
}

impl MockRenderer {
    pub fn failing() -> Self {
        Self { fail: true }
    }
}

impl ReportRenderer for MockRenderer {
    fn render(&self, title: &str, summary: &str) -> Result<RenderedReport, ProcessError> {
        if self.fail {
            return Err(ProcessError::Render("renderer disabled (mock)".to_string()));
        }
        Ok(RenderedReport {
            bytes: format!("%PDF-1.5\n{}\n{}", title, summary).into_bytes(),
            pages: 1,
        })
    }
}
