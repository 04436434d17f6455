use std::collections::HashMap;
use std::sync::Arc;

use crate::core::types::{source_item_id, FolderBatch, Rotation, SourceItem, SourceKind};
use crate::ingest::natural_order;

/// Group name for files that sit directly at the input root.
pub const ROOT_GROUP: &str = "Root";

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "bmp"];
const IMAGE_MIMES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/tiff",
    "image/bmp",
    "image/x-ms-bmp",
];

/// A file as handed over by whatever picked the input folder.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub relative_path: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl RawFile {
    pub fn new(relative_path: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            relative_path: relative_path.into(),
            mime: None,
            bytes,
        }
    }
}

/// Classifies a file by mime type first, then by extension. `None` means the
/// file is not accepted.
pub fn classify(path: &str, mime: Option<&str>) -> Option<SourceKind> {
    if let Some(mime) = mime {
        let mime = mime.trim().to_ascii_lowercase();
        if mime == "application/pdf" {
            return Some(SourceKind::Pdf);
        }
        if IMAGE_MIMES.contains(&mime.as_str()) {
            return Some(SourceKind::Image);
        }
    }

    let ext = file_name(path)
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if ext == "pdf" {
        Some(SourceKind::Pdf)
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(SourceKind::Image)
    } else {
        None
    }
}

/// Groups accepted files by their immediate parent directory.
///
/// Items sharing `(folder, name, size)` get the same id; the later one
/// replaces the earlier one, which de-duplicates re-selected files.
pub fn build_batches(files: Vec<RawFile>) -> Vec<FolderBatch> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<SourceItem>> = HashMap::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for file in files {
        let Some(kind) = classify(&file.relative_path, file.mime.as_deref()) else {
            tracing::debug!(path = %file.relative_path, "skipping unsupported file");
            continue;
        };

        let folder = parent_segment(&file.relative_path)
            .unwrap_or(ROOT_GROUP)
            .to_string();
        let name = file_name(&file.relative_path).to_string();
        let id = source_item_id(&folder, &name, file.bytes.len());
        let item = SourceItem {
            id: id.clone(),
            name,
            relative_path: file.relative_path,
            payload: Arc::from(file.bytes),
            kind,
            included: true,
            rotation: Rotation::None,
        };

        let items = groups.entry(folder.clone()).or_insert_with(|| {
            order.push(folder.clone());
            Vec::new()
        });
        match positions.get(&id) {
            Some(&index) => items[index] = item,
            None => {
                positions.insert(id, items.len());
                items.push(item);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|folder| {
            let mut items = groups.remove(&folder)?;
            natural_order::sort_by_name(&mut items, |item| item.name.as_str());
            Some(FolderBatch::new(folder, items))
        })
        .collect()
}

fn segments(path: &str) -> Vec<&str> {
    path.split(['/', '\\'])
        .filter(|segment| !segment.is_empty())
        .collect()
}

fn parent_segment(path: &str) -> Option<&str> {
    let parts = segments(path);
    if parts.len() < 2 {
        return None;
    }
    Some(parts[parts.len() - 2])
}

fn file_name(path: &str) -> &str {
    segments(path).last().copied().unwrap_or(path)
}
