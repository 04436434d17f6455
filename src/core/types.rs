use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
}

// ── Sources ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Image,
    Pdf,
}

/// Clockwise rotation the surrounding application asked for.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    #[default]
    None,
    Quarter,
    Half,
    ThreeQuarter,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Self::None => 0,
            Self::Quarter => 90,
            Self::Half => 180,
            Self::ThreeQuarter => 270,
        }
    }

    pub fn swaps_dimensions(self) -> bool {
        matches!(self, Self::Quarter | Self::ThreeQuarter)
    }
}

impl TryFrom<u16> for Rotation {
    type Error = AppError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            90 => Ok(Self::Quarter),
            180 => Ok(Self::Half),
            270 => Ok(Self::ThreeQuarter),
            other => Err(AppError::InvalidInput(format!(
                "rotation must be 0, 90, 180 or 270 degrees, got {other}"
            ))),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(value: Rotation) -> Self {
        value.degrees()
    }
}

#[derive(Debug, Clone)]
pub struct SourceItem {
    pub id: String,
    pub name: String,
    pub relative_path: String,
    pub payload: Arc<[u8]>,
    pub kind: SourceKind,
    pub included: bool,
    pub rotation: Rotation,
}

impl SourceItem {
    pub fn byte_size(&self) -> usize {
        self.payload.len()
    }
}

/// Stable identifier for an ingested file. Two files with the same name and
/// size inside one folder collapse onto the same id.
pub fn source_item_id(folder: &str, name: &str, byte_size: usize) -> String {
    format!("{folder}-{name}-{byte_size}")
}

// ── Folder state machine ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FolderStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl FolderStatus {
    pub fn can_transition_to(self, next: FolderStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Error)
        )
    }
}

#[derive(Debug, Clone)]
pub struct Artifact {
    pub file_name: String,
    pub bytes: Arc<[u8]>,
}

#[derive(Debug, Clone)]
pub struct FolderBatch {
    pub name: String,
    pub items: Vec<SourceItem>,
    pub status: FolderStatus,
    pub artifact: Option<Artifact>,
}

impl FolderBatch {
    pub fn new(name: impl Into<String>, items: Vec<SourceItem>) -> Self {
        Self {
            name: name.into(),
            items,
            status: FolderStatus::Pending,
            artifact: None,
        }
    }

    /// Returns the next snapshot of this batch in `next` state.
    pub fn transition(&self, next: FolderStatus) -> AppResult<FolderBatch> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::InvalidInput(format!(
                "folder '{}' cannot move from {:?} to {:?}",
                self.name, self.status, next
            )));
        }
        Ok(FolderBatch {
            status: next,
            ..self.clone()
        })
    }

    /// Completes the batch with its artifact.
    pub fn complete(&self, artifact: Artifact) -> AppResult<FolderBatch> {
        let mut next = self.transition(FolderStatus::Completed)?;
        next.artifact = Some(artifact);
        Ok(next)
    }

    pub fn included_items(&self) -> impl Iterator<Item = &SourceItem> {
        self.items.iter().filter(|item| item.included)
    }
}

// ── Layout analysis ───────────────────────────────────────────────────────────

/// Normalized `[ymin, xmin, ymax, xmax]` box on a 0–1000 scale.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct BoundingBox {
    pub ymin: i32,
    pub xmin: i32,
    pub ymax: i32,
    pub xmax: i32,
}

impl BoundingBox {
    pub fn new(ymin: i32, xmin: i32, ymax: i32, xmax: i32) -> Self {
        Self {
            ymin,
            xmin,
            ymax,
            xmax,
        }
    }

    pub fn full_page() -> Self {
        Self::new(0, 0, 1000, 1000)
    }

    pub fn is_well_ordered(&self) -> bool {
        self.ymin < self.ymax && self.xmin < self.xmax
    }
}

impl From<[i32; 4]> for BoundingBox {
    fn from(value: [i32; 4]) -> Self {
        Self::new(value[0], value[1], value[2], value[3])
    }
}

impl From<BoundingBox> for [i32; 4] {
    fn from(value: BoundingBox) -> Self {
        [value.ymin, value.xmin, value.ymax, value.xmax]
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Heading,
    Subheading,
    Author,
    Paragraph,
    ImageDescription,
    TableCrop,
    FormulaCrop,
    ImageCrop,
}

impl BlockKind {
    /// Unknown kinds and the never-produced `table_row` fall back to paragraph.
    pub fn from_str(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "heading" => Self::Heading,
            "subheading" => Self::Subheading,
            "author" => Self::Author,
            "image_description" => Self::ImageDescription,
            "table_crop" => Self::TableCrop,
            "formula_crop" => Self::FormulaCrop,
            "image_crop" => Self::ImageCrop,
            _ => Self::Paragraph,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heading => "heading",
            Self::Subheading => "subheading",
            Self::Author => "author",
            Self::Paragraph => "paragraph",
            Self::ImageDescription => "image_description",
            Self::TableCrop => "table_crop",
            Self::FormulaCrop => "formula_crop",
            Self::ImageCrop => "image_crop",
        }
    }

    pub fn requires_crop(self) -> bool {
        matches!(self, Self::TableCrop | Self::FormulaCrop | Self::ImageCrop)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Heading {
        text: String,
    },
    Subheading {
        text: String,
    },
    Author {
        text: String,
    },
    Paragraph {
        text: String,
    },
    ImageDescription {
        text: String,
    },
    TableCrop {
        text: String,
        bbox: Option<BoundingBox>,
    },
    FormulaCrop {
        text: String,
        bbox: Option<BoundingBox>,
    },
    ImageCrop {
        text: String,
        bbox: Option<BoundingBox>,
    },
}

impl ContentBlock {
    /// Builds a block of `kind`; the box is kept only for crop kinds.
    pub fn new(kind: BlockKind, text: impl Into<String>, bbox: Option<BoundingBox>) -> Self {
        let text = text.into();
        match kind {
            BlockKind::Heading => Self::Heading { text },
            BlockKind::Subheading => Self::Subheading { text },
            BlockKind::Author => Self::Author { text },
            BlockKind::Paragraph => Self::Paragraph { text },
            BlockKind::ImageDescription => Self::ImageDescription { text },
            BlockKind::TableCrop => Self::TableCrop { text, bbox },
            BlockKind::FormulaCrop => Self::FormulaCrop { text, bbox },
            BlockKind::ImageCrop => Self::ImageCrop { text, bbox },
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::Paragraph { text: text.into() }
    }

    pub fn kind(&self) -> BlockKind {
        match self {
            Self::Heading { .. } => BlockKind::Heading,
            Self::Subheading { .. } => BlockKind::Subheading,
            Self::Author { .. } => BlockKind::Author,
            Self::Paragraph { .. } => BlockKind::Paragraph,
            Self::ImageDescription { .. } => BlockKind::ImageDescription,
            Self::TableCrop { .. } => BlockKind::TableCrop,
            Self::FormulaCrop { .. } => BlockKind::FormulaCrop,
            Self::ImageCrop { .. } => BlockKind::ImageCrop,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Heading { text }
            | Self::Subheading { text }
            | Self::Author { text }
            | Self::Paragraph { text }
            | Self::ImageDescription { text }
            | Self::TableCrop { text, .. }
            | Self::FormulaCrop { text, .. }
            | Self::ImageCrop { text, .. } => text,
        }
    }

    pub fn bbox(&self) -> Option<&BoundingBox> {
        match self {
            Self::TableCrop { bbox, .. }
            | Self::FormulaCrop { bbox, .. }
            | Self::ImageCrop { bbox, .. } => bbox.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageAnalysis {
    pub page_number: Option<u32>,
    pub blocks: Vec<ContentBlock>,
    pub ends_truncated: bool,
}

impl PageAnalysis {
    /// Placeholder used when the analyzer could not process a page.
    pub fn analysis_error(page_name: &str, reason: &str) -> Self {
        Self {
            page_number: None,
            blocks: vec![ContentBlock::paragraph(format!(
                "[ANALYSIS ERROR] {page_name}: {reason}"
            ))],
            ends_truncated: false,
        }
    }
}

/// One raster handed to layout analysis.
#[derive(Debug, Clone)]
pub struct RasterPage {
    pub name: String,
    pub bytes: Arc<[u8]>,
    pub mime: String,
}

#[derive(Debug, Clone)]
pub struct AssemblyPage {
    pub name: String,
    pub analysis: PageAnalysis,
    pub raster: Option<Arc<[u8]>>,
    pub mime: String,
    pub kind: SourceKind,
}

// ── Reports ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "source")]
pub enum ReorderSource {
    Unchanged,
    Hint,
    Fallback { reason: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ItemOutcome {
    Processed {
        item_id: String,
        name: String,
        pages: usize,
        analysis_failures: usize,
    },
    Skipped {
        item_id: String,
        name: String,
    },
    Failed {
        item_id: String,
        name: String,
        error: AppError,
    },
}

impl ItemOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderReport {
    pub folder: String,
    pub status: FolderStatus,
    pub items: Vec<ItemOutcome>,
    pub page_count: usize,
    pub reorder: ReorderSource,
    pub summary_included: bool,
    pub crops: usize,
    pub crop_failures: usize,
    pub artifact_name: Option<String>,
    pub artifact_sha256: Option<String>,
    pub error: Option<AppError>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub cancelled: bool,
    pub folders: Vec<FolderReport>,
}
