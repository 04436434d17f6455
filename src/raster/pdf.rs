use std::path::PathBuf;

use image::DynamicImage;
use pdfium_render::prelude::*;

use crate::core::errors::{AppError, AppResult};
use crate::providers::PdfRasterizer;

/// Renders pages with pdfium. The library is bound per call so the rasterizer
/// itself stays `Send + Sync`.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    library_dir: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn new(library_dir: Option<PathBuf>) -> Self {
        Self { library_dir }
    }

    fn bind(&self) -> AppResult<Pdfium> {
        let bindings = match &self.library_dir {
            Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
                .or_else(|_| Pdfium::bind_to_system_library()),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|err| AppError::Extraction(format!("cannot load pdfium: {err}")))?;
        Ok(Pdfium::new(bindings))
    }
}

impl PdfRasterizer for PdfiumRasterizer {
    fn render_pages(&self, pdf: &[u8], scale: f32) -> AppResult<Vec<AppResult<DynamicImage>>> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|err| AppError::Extraction(format!("cannot open PDF: {err}")))?;
        let config = PdfRenderConfig::new()
            .scale_page_by_factor(scale)
            .render_form_data(true)
            .render_annotations(true);

        let pages = document
            .pages()
            .iter()
            .enumerate()
            .map(|(index, page)| {
                page.render_with_config(&config)
                    .map(|bitmap| bitmap.as_image())
                    .map_err(|err| {
                        AppError::Extraction(format!("page {} render failed: {err}", index + 1))
                    })
            })
            .collect();
        Ok(pages)
    }
}
