use std::sync::Arc;

use crate::{
    core::{
        log::ProcessingLog,
        types::{AssemblyPage, BlockKind, BoundingBox, ContentBlock},
    },
    export::element::{DocElement, DocumentTree, TextStyle},
    raster::crop,
};

pub const SUMMARY_HEADING: &str = "Summary";
const NULL_CAPTION: &str = "null";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    pub crops: usize,
    pub crop_failures: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct AssemblyOptions {
    pub crop_padding_px: u32,
    pub max_display_size: u32,
}

/// Builds the element tree for one folder from its pages in reading order.
pub async fn assemble(
    pages: &[AssemblyPage],
    summary: Option<&str>,
    options: AssemblyOptions,
    log: &ProcessingLog,
) -> (DocumentTree, AssemblyStats) {
    let mut tree = DocumentTree::new();
    let mut stats = AssemblyStats::default();

    if let Some(summary) = summary {
        tree.push_text(SUMMARY_HEADING, TextStyle::Heading);
        tree.push_text(summary, TextStyle::Body);
        tree.push(DocElement::Separator);
    }

    for page in pages {
        for block in &page.analysis.blocks {
            match (block.bbox(), page.raster.as_ref()) {
                (Some(bbox), Some(raster)) if block.kind().requires_crop() => {
                    push_crop(&mut tree, &mut stats, page, block, *bbox, raster, options, log)
                        .await;
                }
                _ => push_text_block(&mut tree, block),
            }
        }
    }

    (tree, stats)
}

#[allow(clippy::too_many_arguments)]
async fn push_crop(
    tree: &mut DocumentTree,
    stats: &mut AssemblyStats,
    page: &AssemblyPage,
    block: &ContentBlock,
    bbox: BoundingBox,
    raster: &Arc<[u8]>,
    options: AssemblyOptions,
    log: &ProcessingLog,
) {
    match crop::crop_region_async(Arc::clone(raster), bbox, options.crop_padding_px).await {
        Ok(region) => {
            let (width, height) = fit_within(region.width, region.height, options.max_display_size);
            tree.push(DocElement::Image {
                data: region.png,
                width,
                height,
            });
            tree.push(DocElement::Caption(caption_for(block)));
            stats.crops += 1;
        }
        Err(err) => {
            stats.crop_failures += 1;
            log.warn(&page.name, format!("{} not embedded: {err}", block.kind().as_str()));
            tree.push(DocElement::ErrorNote(format!(
                "[CROP ERROR] {}: {err}",
                page.name
            )));
        }
    }
}

fn push_text_block(tree: &mut DocumentTree, block: &ContentBlock) {
    let text = block.text().trim();
    if text.is_empty() {
        return;
    }
    let style = match block.kind() {
        BlockKind::Heading => TextStyle::Heading,
        BlockKind::Subheading => TextStyle::Subheading,
        BlockKind::Author => TextStyle::Author,
        _ => TextStyle::Body,
    };
    tree.push_text(text, style);
}

/// Block text, or the kind's default when the analyzer sent nothing useful.
pub fn caption_for(block: &ContentBlock) -> String {
    let text = block.text().trim();
    if !text.is_empty() && text != NULL_CAPTION {
        return text.to_string();
    }
    match block.kind() {
        BlockKind::TableCrop => "Table",
        BlockKind::FormulaCrop => "Formula",
        _ => "Figure",
    }
    .to_string()
}

/// Scales `width`×`height` down to fit inside `max`×`max`. Never upscales.
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width.max(1), height.max(1));
    }
    let scale = f64::from(max) / f64::from(width.max(height));
    let scaled = |side: u32| ((f64::from(side) * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}
