//! Collaborator boundaries the pipeline talks to.
//!
//! Each external service sits behind its own trait so a run can be wired to
//! Gemini, DOCX and pdfium in production and to deterministic stubs in tests.

use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::core::errors::AppResult;
use crate::core::types::PageAnalysis;
use crate::export::element::DocumentTree;

pub mod gemini;
pub mod layout_schema;
pub mod prompts;
pub mod retry;

#[async_trait]
pub trait LayoutAnalyzer: Send + Sync {
    async fn analyze(&self, raster: &[u8], mime: &str, language: &str) -> AppResult<PageAnalysis>;
}

/// Compact view of a page sent to the reading-order ranker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageDescriptor {
    pub temp_id: usize,
    pub file_name: String,
    pub detected_page_num: Option<u32>,
    pub first_sentence: String,
    pub last_sentence: String,
}

#[async_trait]
pub trait PageRanker: Send + Sync {
    /// Returns the ranker's proposed order as raw `tempId`s. Validation is the
    /// caller's job.
    async fn rank(&self, pages: &[PageDescriptor]) -> AppResult<Vec<i64>>;
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str, language: &str) -> AppResult<String>;
}

#[async_trait]
pub trait DocumentSerializer: Send + Sync {
    /// Native file extension, without the dot.
    fn extension(&self) -> &str;

    async fn serialize(&self, tree: &DocumentTree) -> AppResult<Vec<u8>>;
}

/// Renders PDF pages. Called on the blocking pool.
pub trait PdfRasterizer: Send + Sync {
    /// Outer error: the document could not be opened at all. Inner errors are
    /// per page, in page order.
    fn render_pages(&self, pdf: &[u8], scale: f32) -> AppResult<Vec<AppResult<DynamicImage>>>;
}

#[derive(Clone)]
pub struct Collaborators {
    pub analyzer: Arc<dyn LayoutAnalyzer>,
    pub ranker: Arc<dyn PageRanker>,
    pub summarizer: Arc<dyn Summarizer>,
    pub serializer: Arc<dyn DocumentSerializer>,
    pub rasterizer: Arc<dyn PdfRasterizer>,
}
