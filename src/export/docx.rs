//! DOCX rendering of an assembled [`DocumentTree`] via `docx-rs`.

use std::io::Cursor;

use async_trait::async_trait;
use docx_rs::{AlignmentType, Docx, LineSpacing, Paragraph, Pic, Run, Style, StyleType};

use crate::core::errors::{AppError, AppResult};
use crate::export::element::{DocElement, DocumentTree, TextStyle};
use crate::providers::DocumentSerializer;

const EMU_PER_UNIT: u32 = 9525;
const BODY_SIZE: usize = 24;
const ERROR_COLOR: &str = "C00000";

#[derive(Debug, Clone, Copy, Default)]
pub struct DocxSerializer;

#[async_trait]
impl DocumentSerializer for DocxSerializer {
    fn extension(&self) -> &str {
        "docx"
    }

    async fn serialize(&self, tree: &DocumentTree) -> AppResult<Vec<u8>> {
        let tree = tree.clone();
        tokio::task::spawn_blocking(move || render_docx(&tree))
            .await
            .map_err(|err| AppError::Assembly(format!("docx task failed: {err}")))?
    }
}

pub fn render_docx(tree: &DocumentTree) -> AppResult<Vec<u8>> {
    let mut docx = Docx::new()
        .add_style(
            Style::new("Heading1", StyleType::Paragraph)
                .name("Heading 1")
                .size(32)
                .bold(),
        )
        .add_style(
            Style::new("Heading2", StyleType::Paragraph)
                .name("Heading 2")
                .size(28)
                .bold(),
        );

    for element in &tree.elements {
        docx = docx.add_paragraph(paragraph_for(element));
    }

    let mut buf = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buf)
        .map_err(|err| AppError::Assembly(format!("docx packing failed: {err}")))?;
    Ok(buf.into_inner())
}

fn paragraph_for(element: &DocElement) -> Paragraph {
    match element {
        DocElement::Text { text, style } => styled_paragraph(text, *style),
        DocElement::Image {
            data,
            width,
            height,
        } => {
            let pic = Pic::new(data).size(width * EMU_PER_UNIT, height * EMU_PER_UNIT);
            Paragraph::new()
                .align(AlignmentType::Center)
                .add_run(Run::new().add_image(pic))
        }
        DocElement::Caption(text) => Paragraph::new()
            .align(AlignmentType::Center)
            .add_run(Run::new().add_text(text).italic().size(20)),
        DocElement::ErrorNote(text) => Paragraph::new().add_run(
            Run::new()
                .add_text(text)
                .italic()
                .color(ERROR_COLOR)
                .size(BODY_SIZE),
        ),
        DocElement::Separator => Paragraph::new()
            .align(AlignmentType::Center)
            .add_run(Run::new().add_text("* * *")),
    }
}

fn styled_paragraph(text: &str, style: TextStyle) -> Paragraph {
    match style {
        TextStyle::Heading => Paragraph::new()
            .style("Heading1")
            .add_run(Run::new().add_text(text).bold().size(32)),
        TextStyle::Subheading => Paragraph::new()
            .style("Heading2")
            .add_run(Run::new().add_text(text).bold().size(28)),
        TextStyle::Author => Paragraph::new()
            .align(AlignmentType::Center)
            .add_run(Run::new().add_text(text).bold().italic().size(BODY_SIZE)),
        TextStyle::Body => Paragraph::new()
            .align(AlignmentType::Both)
            .line_spacing(LineSpacing::new().line(276))
            .add_run(Run::new().add_text(text).size(BODY_SIZE)),
    }
}
