use crate::providers::layout_schema::response_schema;

pub fn layout_prompt(language: &str) -> String {
    let mut text = String::new();
    text.push_str("You are a document layout analyst. Read the scanned page image.\n");
    text.push_str("Return every content block in reading order.\n");
    text.push_str("Use heading, subheading, author, paragraph or image_description for text.\n");
    text.push_str("Use table_crop, formula_crop or image_crop for tables, formulas and figures, ");
    text.push_str("with box_2d as [ymin, xmin, ymax, xmax] on a 0-1000 scale and the caption as text ");
    text.push_str("(or \"null\" when there is none).\n");
    text.push_str("Set pageNumber to the printed page number, or null when none is visible.\n");
    text.push_str("Set isTruncated when the final sentence is cut off.\n");
    text.push_str(&format!("Transcribe text as written; the document language is {language}.\n\n"));
    text.push_str("Output JSON matching this schema:\n");
    text.push_str(&response_schema());
    text.push('\n');
    text
}

pub fn ranking_prompt(pages_json: &str) -> String {
    let mut text = String::new();
    text.push_str("These are pages of one scanned document, listed in arbitrary order.\n");
    text.push_str("Use detected page numbers and how each page's first sentence continues ");
    text.push_str("the previous page's last sentence to restore the reading order.\n\n");
    text.push_str("PAGES:\n");
    text.push_str(pages_json);
    text.push_str("\n\nOutput format: a JSON array with every tempId exactly once, in reading order.\n");
    text.push_str("[2, 0, 1]\n");
    text
}

pub fn summary_prompt(source: &str, language: &str) -> String {
    let mut text = String::new();
    text.push_str(&format!(
        "Summarize the following document in {language} in one or two plain paragraphs.\n"
    ));
    text.push_str("Do not use Markdown, bullet points or headings.\n\n");
    text.push_str("DOCUMENT:\n");
    text.push_str(source);
    text.push('\n');
    text
}
