use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use scan_assembler_lib::core::config::PipelineConfig;
use scan_assembler_lib::core::errors::{AppError, AppResult};
use scan_assembler_lib::core::log::{LogLevel, ProcessingLog};
use scan_assembler_lib::core::types::{
    BlockKind, BoundingBox, ContentBlock, FolderBatch, FolderStatus, ItemOutcome, PageAnalysis,
    Rotation, SourceItem, SourceKind,
};
use scan_assembler_lib::export::element::{DocElement, DocumentTree};
use scan_assembler_lib::pipeline::orchestrator::Snapshot;
use scan_assembler_lib::pipeline::{CancelFlag, Orchestrator};
use scan_assembler_lib::providers::{
    Collaborators, DocumentSerializer, LayoutAnalyzer, PageDescriptor, PageRanker, PdfRasterizer,
    Summarizer,
};
use scan_assembler_lib::raster::codec;
use tokio::sync::{watch, Notify};

// ── Stub collaborators ────────────────────────────────────────────────────────

#[derive(Default)]
struct StubAnalyzer {
    by_payload: HashMap<Vec<u8>, PageAnalysis>,
    gate: Option<Arc<Notify>>,
    cancel_on_call: Option<CancelFlag>,
}

impl StubAnalyzer {
    fn answer(mut self, payload: &[u8], analysis: PageAnalysis) -> Self {
        self.by_payload.insert(payload.to_vec(), analysis);
        self
    }
}

#[async_trait]
impl LayoutAnalyzer for StubAnalyzer {
    async fn analyze(&self, raster: &[u8], _mime: &str, _language: &str) -> AppResult<PageAnalysis> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(cancel) = &self.cancel_on_call {
            cancel.cancel();
        }
        self.by_payload
            .get(raster)
            .cloned()
            .ok_or_else(|| AppError::ProviderInvalidResponse("no canned answer".to_string()))
    }
}

struct StubRanker(AppResult<Vec<i64>>);

#[async_trait]
impl PageRanker for StubRanker {
    async fn rank(&self, _pages: &[PageDescriptor]) -> AppResult<Vec<i64>> {
        self.0.clone()
    }
}

struct StubSummarizer;

#[async_trait]
impl Summarizer for StubSummarizer {
    async fn summarize(&self, _text: &str, language: &str) -> AppResult<String> {
        Ok(format!("**Short** summary in {language}"))
    }
}

/// Keeps every tree it is given; fails on trees containing "poison" or
/// "misconfigured".
#[derive(Default)]
struct CapturingSerializer {
    trees: Mutex<Vec<DocumentTree>>,
}

#[async_trait]
impl DocumentSerializer for CapturingSerializer {
    fn extension(&self) -> &str {
        "txt"
    }

    async fn serialize(&self, tree: &DocumentTree) -> AppResult<Vec<u8>> {
        self.trees.lock().expect("lock").push(tree.clone());
        let text = tree.text_content().join("\n");
        if text.contains("poison") {
            return Err(AppError::Assembly("refusing poisoned document".to_string()));
        }
        if text.contains("misconfigured") {
            return Err(AppError::Configuration("output template missing".to_string()));
        }
        Ok(text.into_bytes())
    }
}

struct StubRasterizer {
    pages: Vec<Option<DynamicImage>>,
}

impl PdfRasterizer for StubRasterizer {
    fn render_pages(&self, _pdf: &[u8], _scale: f32) -> AppResult<Vec<AppResult<DynamicImage>>> {
        Ok(self
            .pages
            .iter()
            .enumerate()
            .map(|(index, page)| {
                page.clone()
                    .ok_or_else(|| AppError::Extraction(format!("page {} is corrupt", index + 1)))
            })
            .collect())
    }
}

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn item(folder: &str, name: &str, payload: &[u8], kind: SourceKind) -> SourceItem {
    SourceItem {
        id: format!("{folder}-{name}-{}", payload.len()),
        name: name.to_string(),
        relative_path: format!("{folder}/{name}"),
        payload: payload.to_vec().into(),
        kind,
        included: true,
        rotation: Rotation::None,
    }
}

fn text_page(text: &str) -> PageAnalysis {
    PageAnalysis {
        page_number: None,
        blocks: vec![ContentBlock::paragraph(text)],
        ends_truncated: false,
    }
}

fn solid_png(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 200, 30])));
    codec::encode_png(&image).expect("png")
}

struct Harness {
    orchestrator: Orchestrator,
    serializer: Arc<CapturingSerializer>,
}

fn harness(
    analyzer: StubAnalyzer,
    ranker: StubRanker,
    rasterizer: StubRasterizer,
    config: PipelineConfig,
) -> Harness {
    let serializer = Arc::new(CapturingSerializer::default());
    let collaborators = Collaborators {
        analyzer: Arc::new(analyzer),
        ranker: Arc::new(ranker),
        summarizer: Arc::new(StubSummarizer),
        serializer: serializer.clone(),
        rasterizer: Arc::new(rasterizer),
    };
    let config = PipelineConfig {
        call_timeout: Duration::from_secs(5),
        max_retries: 0,
        ..config
    };
    Harness {
        orchestrator: Orchestrator::new(config, collaborators, ProcessingLog::new()),
        serializer,
    }
}

fn no_pdf() -> StubRasterizer {
    StubRasterizer { pages: Vec::new() }
}

fn texts(tree: &DocumentTree) -> Vec<String> {
    tree.text_content().into_iter().map(str::to_string).collect()
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ranker_order_drives_the_document() {
    let analyzer = StubAnalyzer::default()
        .answer(b"a", text_page("Text from a"))
        .answer(b"b", text_page("Text from b"));
    let h = harness(
        analyzer,
        StubRanker(Ok(vec![1, 0])),
        no_pdf(),
        PipelineConfig::default(),
    );
    let batch = FolderBatch::new(
        "scans",
        vec![
            item("scans", "a.jpg", b"a", SourceKind::Image),
            item("scans", "b.jpg", b"b", SourceKind::Image),
        ],
    );

    let report = h
        .orchestrator
        .run(vec![batch], &CancelFlag::new())
        .await
        .expect("run");

    let trees = h.serializer.trees.lock().expect("lock");
    assert_eq!(texts(&trees[0]), vec!["Text from b", "Text from a"]);

    let snapshot = h.orchestrator.subscribe().borrow().clone();
    assert_eq!(snapshot[0].status, FolderStatus::Completed);
    let artifact = snapshot[0].artifact.as_ref().expect("artifact");
    assert_eq!(artifact.file_name, "scans_AI_Processed.txt");

    let folder = &report.folders[0];
    assert_eq!(folder.status, FolderStatus::Completed);
    assert_eq!(folder.page_count, 2);
    assert_eq!(folder.artifact_name.as_deref(), Some("scans_AI_Processed.txt"));
    assert_eq!(folder.artifact_sha256.as_ref().map(String::len), Some(64));
    assert!(!report.cancelled);
}

#[tokio::test]
async fn serializer_failure_only_fails_its_folder() {
    let analyzer = StubAnalyzer::default()
        .answer(b"bad", text_page("poison"))
        .answer(b"good", text_page("fine"));
    let h = harness(
        analyzer,
        StubRanker(Ok(vec![])),
        no_pdf(),
        PipelineConfig::default(),
    );
    let batches = vec![
        FolderBatch::new("first", vec![item("first", "x.jpg", b"bad", SourceKind::Image)]),
        FolderBatch::new("second", vec![item("second", "y.jpg", b"good", SourceKind::Image)]),
    ];

    let report = h
        .orchestrator
        .run(batches, &CancelFlag::new())
        .await
        .expect("run");

    assert_eq!(report.folders[0].status, FolderStatus::Error);
    assert_eq!(
        report.folders[0].error.as_ref().map(AppError::code),
        Some("ASSEMBLY_ERROR")
    );
    assert_eq!(report.folders[1].status, FolderStatus::Completed);

    let snapshot = h.orchestrator.subscribe().borrow().clone();
    assert!(snapshot[0].artifact.is_none());
    assert!(snapshot[1].artifact.is_some());
}

#[tokio::test]
async fn analyzer_failure_becomes_an_error_paragraph() {
    let analyzer = StubAnalyzer::default().answer(b"ok", text_page("Readable page"));
    let h = harness(
        analyzer,
        StubRanker(Ok(vec![0, 1])),
        no_pdf(),
        PipelineConfig::default(),
    );
    let batch = FolderBatch::new(
        "scans",
        vec![
            item("scans", "blurry.jpg", b"??", SourceKind::Image),
            item("scans", "ok.jpg", b"ok", SourceKind::Image),
        ],
    );

    let report = h
        .orchestrator
        .run(vec![batch], &CancelFlag::new())
        .await
        .expect("run");

    let trees = h.serializer.trees.lock().expect("lock");
    let lines = texts(&trees[0]);
    assert!(lines[0].starts_with("[ANALYSIS ERROR] blurry.jpg: "));
    assert_eq!(lines[1], "Readable page");
    assert_eq!(report.folders[0].status, FolderStatus::Completed);
    assert!(matches!(
        report.folders[0].items[0],
        ItemOutcome::Processed {
            analysis_failures: 1,
            ..
        }
    ));
}

#[tokio::test]
async fn pdf_pages_that_fail_to_render_are_skipped() {
    let page = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([255, 255, 255])));
    let rasterizer = StubRasterizer {
        pages: vec![Some(page.clone()), None, Some(page)],
    };
    let h = harness(
        StubAnalyzer::default(),
        StubRanker(Ok(vec![1, 0])),
        rasterizer,
        PipelineConfig::default(),
    );
    let batch = FolderBatch::new("docs", vec![item("docs", "doc.pdf", b"%PDF", SourceKind::Pdf)]);

    let report = h
        .orchestrator
        .run(vec![batch], &CancelFlag::new())
        .await
        .expect("run");

    assert_eq!(report.folders[0].page_count, 2);
    let trees = h.serializer.trees.lock().expect("lock");
    let lines = texts(&trees[0]);
    assert!(lines[0].starts_with("[ANALYSIS ERROR] doc.pdf [Page 3]"));
    assert!(lines[1].starts_with("[ANALYSIS ERROR] doc.pdf [Page 1]"));
    assert!(h
        .orchestrator
        .log()
        .entries()
        .iter()
        .any(|entry| entry.level == LogLevel::Warn && entry.message.contains("[Page 2] skipped")));
}

#[tokio::test]
async fn pdf_without_pages_fails_the_item_not_the_folder() {
    let h = harness(
        StubAnalyzer::default().answer(b"img", text_page("Image page")),
        StubRanker(Ok(vec![])),
        StubRasterizer { pages: vec![None] },
        PipelineConfig::default(),
    );
    let batch = FolderBatch::new(
        "mixed",
        vec![
            item("mixed", "broken.pdf", b"%PDF", SourceKind::Pdf),
            item("mixed", "img.jpg", b"img", SourceKind::Image),
        ],
    );

    let report = h
        .orchestrator
        .run(vec![batch], &CancelFlag::new())
        .await
        .expect("run");

    let folder = &report.folders[0];
    assert_eq!(folder.status, FolderStatus::Completed);
    match &folder.items[0] {
        ItemOutcome::Failed { error, .. } => assert_eq!(error.code(), "EXTRACTION_ERROR"),
        other => panic!("expected failure, got {other:?}"),
    }
    let trees = h.serializer.trees.lock().expect("lock");
    assert_eq!(texts(&trees[0]), vec!["Image page"]);
}

#[tokio::test]
async fn excluded_items_are_skipped() {
    let h = harness(
        StubAnalyzer::default().answer(b"keep", text_page("Kept")),
        StubRanker(Ok(vec![])),
        no_pdf(),
        PipelineConfig::default(),
    );
    let mut cover = item("scans", "cover.jpg", b"cover", SourceKind::Image);
    cover.included = false;
    let batch = FolderBatch::new(
        "scans",
        vec![cover, item("scans", "keep.jpg", b"keep", SourceKind::Image)],
    );

    let report = h
        .orchestrator
        .run(vec![batch], &CancelFlag::new())
        .await
        .expect("run");

    assert!(matches!(report.folders[0].items[0], ItemOutcome::Skipped { .. }));
    let trees = h.serializer.trees.lock().expect("lock");
    assert_eq!(texts(&trees[0]), vec!["Kept"]);
}

#[tokio::test]
async fn crops_are_embedded_and_failures_noted() {
    let png = solid_png(600, 300);
    let page = PageAnalysis {
        page_number: Some(1),
        blocks: vec![
            ContentBlock::new(BlockKind::Heading, "Charts", None),
            ContentBlock::new(
                BlockKind::ImageCrop,
                "null",
                Some(BoundingBox::new(0, 0, 1000, 1000)),
            ),
            ContentBlock::new(BlockKind::TableCrop, "Table 1", None),
        ],
        ends_truncated: false,
    };
    let broken = PageAnalysis {
        page_number: Some(2),
        blocks: vec![ContentBlock::new(
            BlockKind::FormulaCrop,
            "x^2",
            Some(BoundingBox::new(100, 100, 200, 200)),
        )],
        ends_truncated: false,
    };
    let h = harness(
        StubAnalyzer::default()
            .answer(&png, page)
            .answer(b"not-an-image", broken),
        StubRanker(Ok(vec![0, 1])),
        no_pdf(),
        PipelineConfig::default(),
    );
    let batch = FolderBatch::new(
        "figs",
        vec![
            item("figs", "chart.png", &png, SourceKind::Image),
            item("figs", "formula.jpg", b"not-an-image", SourceKind::Image),
        ],
    );

    let report = h
        .orchestrator
        .run(vec![batch], &CancelFlag::new())
        .await
        .expect("run");

    let trees = h.serializer.trees.lock().expect("lock");
    let elements = &trees[0].elements;
    assert!(matches!(
        elements[1],
        DocElement::Image {
            width: 450,
            height: 225,
            ..
        }
    ));
    assert_eq!(elements[2], DocElement::Caption("Figure".to_string()));
    assert!(matches!(&elements[3], DocElement::Text { text, .. } if text == "Table 1"));
    assert!(matches!(&elements[4], DocElement::ErrorNote(note) if note.contains("formula.jpg")));
    assert_eq!(report.folders[0].crops, 1);
    assert_eq!(report.folders[0].crop_failures, 1);
}

#[tokio::test]
async fn summary_section_leads_when_enabled() {
    let h = harness(
        StubAnalyzer::default().answer(b"a", text_page("Body text")),
        StubRanker(Ok(vec![])),
        no_pdf(),
        PipelineConfig {
            summary_enabled: true,
            language: "German".to_string(),
            ..PipelineConfig::default()
        },
    );
    let batch = FolderBatch::new("scans", vec![item("scans", "a.jpg", b"a", SourceKind::Image)]);

    let report = h
        .orchestrator
        .run(vec![batch], &CancelFlag::new())
        .await
        .expect("run");

    let trees = h.serializer.trees.lock().expect("lock");
    assert_eq!(
        texts(&trees[0]),
        vec!["Summary", "Short summary in German", "Body text"]
    );
    assert_eq!(trees[0].elements[2], DocElement::Separator);
    assert!(report.folders[0].summary_included);
}

#[tokio::test]
async fn snapshots_follow_the_status_machine() {
    let gate = Arc::new(Notify::new());
    let analyzer = StubAnalyzer {
        gate: Some(gate.clone()),
        ..StubAnalyzer::default()
    };
    let h = harness(
        analyzer,
        StubRanker(Ok(vec![])),
        no_pdf(),
        PipelineConfig::default(),
    );
    let orchestrator = Arc::new(h.orchestrator);
    let mut snapshots = orchestrator.subscribe();
    let batches = vec![
        FolderBatch::new("one", vec![item("one", "a.jpg", b"a", SourceKind::Image)]),
        FolderBatch::new("two", vec![item("two", "b.jpg", b"b", SourceKind::Image)]),
    ];

    let runner = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.run(batches, &CancelFlag::new()).await })
    };

    let during = snapshots
        .wait_for(|state| state.first().map(|batch| batch.status) == Some(FolderStatus::Processing))
        .await
        .expect("snapshot")
        .clone();
    assert_eq!(during[1].status, FolderStatus::Pending);

    gate.notify_one();
    snapshots
        .wait_for(|state| state.get(1).map(|batch| batch.status) == Some(FolderStatus::Processing))
        .await
        .expect("snapshot");
    gate.notify_one();

    let report = runner.await.expect("join").expect("run");
    let statuses: Vec<FolderStatus> = report.folders.iter().map(|folder| folder.status).collect();
    assert_eq!(statuses, vec![FolderStatus::Completed, FolderStatus::Completed]);
}

#[tokio::test]
async fn cancellation_stops_between_items() {
    let cancel = CancelFlag::new();
    let analyzer = StubAnalyzer {
        cancel_on_call: Some(cancel.clone()),
        ..StubAnalyzer::default()
    }
    .answer(b"a", text_page("first"));
    let h = harness(
        analyzer,
        StubRanker(Ok(vec![])),
        no_pdf(),
        PipelineConfig::default(),
    );
    let batches = vec![
        FolderBatch::new(
            "one",
            vec![
                item("one", "a.jpg", b"a", SourceKind::Image),
                item("one", "b.jpg", b"b", SourceKind::Image),
            ],
        ),
        FolderBatch::new("two", vec![item("two", "c.jpg", b"c", SourceKind::Image)]),
    ];

    let report = h.orchestrator.run(batches, &cancel).await.expect("run");

    assert!(report.cancelled);
    assert_eq!(report.folders[0].status, FolderStatus::Error);
    assert_eq!(
        report.folders[0].error.as_ref().map(AppError::code),
        Some("CANCELLED")
    );
    assert_eq!(report.folders[0].items.len(), 1);
    assert_eq!(report.folders[1].status, FolderStatus::Pending);
    assert!(h.serializer.trees.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn configuration_error_stops_the_run() {
    let analyzer = StubAnalyzer::default()
        .answer(b"bad", text_page("misconfigured"))
        .answer(b"good", text_page("fine"));
    let h = harness(
        analyzer,
        StubRanker(Ok(vec![])),
        no_pdf(),
        PipelineConfig::default(),
    );
    let batches = vec![
        FolderBatch::new("first", vec![item("first", "x.jpg", b"bad", SourceKind::Image)]),
        FolderBatch::new("second", vec![item("second", "y.jpg", b"good", SourceKind::Image)]),
    ];

    let err = h
        .orchestrator
        .run(batches, &CancelFlag::new())
        .await
        .expect_err("configuration errors end the run");

    assert_eq!(err.code(), "CONFIGURATION_ERROR");
    let snapshot = h.orchestrator.subscribe().borrow().clone();
    assert_eq!(snapshot[0].status, FolderStatus::Error);
    assert_eq!(snapshot[1].status, FolderStatus::Pending);
    assert_eq!(h.serializer.trees.lock().expect("lock").len(), 1);
}

// ── Phase boundaries ──────────────────────────────────────────────────────────

/// Records, at each collaborator call, whether a snapshot was published since
/// the previous call.
#[derive(Default)]
struct PhaseWatch {
    receiver: Mutex<Option<watch::Receiver<Snapshot>>>,
    seen: Mutex<Vec<(&'static str, bool)>>,
}

impl PhaseWatch {
    fn record(&self, phase: &'static str) {
        let mut receiver = self.receiver.lock().expect("lock");
        let receiver = receiver.as_mut().expect("receiver attached");
        let changed = receiver.has_changed().expect("sender alive");
        receiver.borrow_and_update();
        self.seen.lock().expect("lock").push((phase, changed));
    }
}

struct WatchingRanker(Arc<PhaseWatch>);

#[async_trait]
impl PageRanker for WatchingRanker {
    async fn rank(&self, _pages: &[PageDescriptor]) -> AppResult<Vec<i64>> {
        self.0.record("reorder");
        Ok(vec![1, 0])
    }
}

struct WatchingSummarizer(Arc<PhaseWatch>);

#[async_trait]
impl Summarizer for WatchingSummarizer {
    async fn summarize(&self, _text: &str, _language: &str) -> AppResult<String> {
        self.0.record("summary");
        Ok("Short".to_string())
    }
}

struct WatchingSerializer(Arc<PhaseWatch>);

#[async_trait]
impl DocumentSerializer for WatchingSerializer {
    fn extension(&self) -> &str {
        "txt"
    }

    async fn serialize(&self, tree: &DocumentTree) -> AppResult<Vec<u8>> {
        self.0.record("serialize");
        Ok(tree.text_content().join("\n").into_bytes())
    }
}

#[tokio::test]
async fn snapshots_are_republished_after_each_phase() {
    let watch = Arc::new(PhaseWatch::default());
    let collaborators = Collaborators {
        analyzer: Arc::new(
            StubAnalyzer::default()
                .answer(b"a", text_page("First"))
                .answer(b"b", text_page("Second")),
        ),
        ranker: Arc::new(WatchingRanker(watch.clone())),
        summarizer: Arc::new(WatchingSummarizer(watch.clone())),
        serializer: Arc::new(WatchingSerializer(watch.clone())),
        rasterizer: Arc::new(no_pdf()),
    };
    let config = PipelineConfig {
        summary_enabled: true,
        call_timeout: Duration::from_secs(5),
        max_retries: 0,
        ..PipelineConfig::default()
    };
    let orchestrator = Orchestrator::new(config, collaborators, ProcessingLog::new());
    *watch.receiver.lock().expect("lock") = Some(orchestrator.subscribe());
    let batch = FolderBatch::new(
        "scans",
        vec![
            item("scans", "a.jpg", b"a", SourceKind::Image),
            item("scans", "b.jpg", b"b", SourceKind::Image),
        ],
    );

    let report = orchestrator
        .run(vec![batch], &CancelFlag::new())
        .await
        .expect("run");

    assert_eq!(report.folders[0].status, FolderStatus::Completed);
    assert_eq!(
        *watch.seen.lock().expect("lock"),
        vec![("reorder", true), ("summary", true), ("serialize", true)]
    );
}
