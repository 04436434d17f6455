use std::sync::Arc;

use crate::{
    core::{
        config::PipelineConfig,
        errors::{AppError, AppResult},
        log::ProcessingLog,
        types::{AssemblyPage, PageAnalysis, RasterPage, Rotation, SourceItem, SourceKind},
    },
    providers::{retry::CallPolicy, LayoutAnalyzer, PdfRasterizer},
    raster::{codec, rotate},
};

/// Turns one source item into the rasters sent to layout analysis.
///
/// PDF pages that fail to render are logged and skipped; a PDF that yields no
/// page at all is an [`AppError::Extraction`].
pub async fn extract_rasters(
    item: &SourceItem,
    rasterizer: Arc<dyn PdfRasterizer>,
    config: &PipelineConfig,
    log: &ProcessingLog,
) -> AppResult<Vec<RasterPage>> {
    match item.kind {
        SourceKind::Pdf => extract_pdf(item, rasterizer, config, log).await,
        SourceKind::Image => extract_image(item, config).await.map(|page| vec![page]),
    }
}

async fn extract_pdf(
    item: &SourceItem,
    rasterizer: Arc<dyn PdfRasterizer>,
    config: &PipelineConfig,
    log: &ProcessingLog,
) -> AppResult<Vec<RasterPage>> {
    let payload = Arc::clone(&item.payload);
    let scale = config.render_scale;
    let quality = config.jpeg_quality;

    let rendered = tokio::task::spawn_blocking(move || -> AppResult<Vec<AppResult<Vec<u8>>>> {
        let pages = rasterizer.render_pages(&payload, scale)?;
        Ok(pages
            .into_iter()
            .map(|page| page.and_then(|image| codec::encode_jpeg(&image, quality)))
            .collect())
    })
    .await??;

    let mut rasters = Vec::with_capacity(rendered.len());
    for (index, page) in rendered.into_iter().enumerate() {
        let name = format!("{} [Page {}]", item.name, index + 1);
        match page {
            Ok(bytes) => rasters.push(RasterPage {
                name,
                bytes: bytes.into(),
                mime: codec::JPEG_MIME.to_string(),
            }),
            Err(err) => log.warn(&item.relative_path, format!("{name} skipped: {err}")),
        }
    }

    if rasters.is_empty() {
        return Err(AppError::Extraction(format!(
            "{} produced no usable pages",
            item.name
        )));
    }
    Ok(rasters)
}

async fn extract_image(item: &SourceItem, config: &PipelineConfig) -> AppResult<RasterPage> {
    if item.rotation == Rotation::None {
        return Ok(RasterPage {
            name: item.name.clone(),
            bytes: Arc::clone(&item.payload),
            mime: codec::sniff_mime(&item.payload, &item.name),
        });
    }

    let payload = Arc::clone(&item.payload);
    let rotation = item.rotation;
    let quality = config.jpeg_quality;
    let bytes = tokio::task::spawn_blocking(move || {
        let image = codec::decode(&payload)
            .map_err(|err| AppError::Extraction(format!("cannot decode image: {err}")))?;
        codec::encode_jpeg(&rotate::rotate(&image, rotation), quality)
    })
    .await??;

    Ok(RasterPage {
        name: item.name.clone(),
        bytes: bytes.into(),
        mime: codec::JPEG_MIME.to_string(),
    })
}

/// Runs layout analysis on every raster in order. A failed page becomes a
/// single error paragraph; the count of such pages is returned alongside.
pub async fn analyze_pages(
    rasters: Vec<RasterPage>,
    kind: SourceKind,
    analyzer: &dyn LayoutAnalyzer,
    policy: &CallPolicy,
    language: &str,
    log: &ProcessingLog,
) -> (Vec<AssemblyPage>, usize) {
    let mut pages = Vec::with_capacity(rasters.len());
    let mut failures = 0;

    for raster in rasters {
        let result = policy
            .run("analyze", || {
                analyzer.analyze(&raster.bytes[..], &raster.mime, language)
            })
            .await;

        let analysis = match result {
            Ok(analysis) => analysis,
            Err(err) => {
                failures += 1;
                let err = AppError::Analysis(err.to_string());
                log.warn(&raster.name, err.to_string());
                PageAnalysis::analysis_error(&raster.name, &err.to_string())
            }
        };

        pages.push(AssemblyPage {
            name: raster.name,
            analysis,
            raster: Some(raster.bytes),
            mime: raster.mime,
            kind,
        });
    }

    (pages, failures)
}
