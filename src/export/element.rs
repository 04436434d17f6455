/// Paragraph styles the assembler can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    Heading,
    Subheading,
    Author,
    Body,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocElement {
    Text { text: String, style: TextStyle },
    /// Lossless raster shown at `width`×`height` logical units.
    Image { data: Vec<u8>, width: u32, height: u32 },
    Caption(String),
    ErrorNote(String),
    Separator,
}

/// Ordered element tree handed to a serializer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentTree {
    pub elements: Vec<DocElement>,
}

impl DocumentTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, element: DocElement) {
        self.elements.push(element);
    }

    pub fn push_text(&mut self, text: impl Into<String>, style: TextStyle) {
        self.elements.push(DocElement::Text {
            text: text.into(),
            style,
        });
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Visible text of every element, in order. Images and separators are
    /// skipped.
    pub fn text_content(&self) -> Vec<&str> {
        self.elements
            .iter()
            .filter_map(|element| match element {
                DocElement::Text { text, .. } => Some(text.as_str()),
                DocElement::Caption(text) | DocElement::ErrorNote(text) => Some(text.as_str()),
                DocElement::Image { .. } | DocElement::Separator => None,
            })
            .collect()
    }
}
