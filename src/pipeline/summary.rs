use crate::{
    core::{
        log::ProcessingLog,
        types::{AssemblyPage, BlockKind},
    },
    providers::{retry::CallPolicy, Summarizer},
};

const SCOPE: &str = "summary";

/// Text sent to the summarizer, in reading order. Formula crops keep their
/// text here; image and table crops do not.
pub fn build_summary_source(pages: &[AssemblyPage], char_budget: usize) -> String {
    let joined = pages
        .iter()
        .map(|page| {
            page.analysis
                .blocks
                .iter()
                .filter(|block| !matches!(block.kind(), BlockKind::ImageCrop | BlockKind::TableCrop))
                .map(|block| block.text().trim())
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|page_text| !page_text.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    if joined.chars().count() > char_budget {
        joined.chars().take(char_budget).collect()
    } else {
        joined
    }
}

fn is_stripped_control(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{7f}')
}

/// Strips control characters and Markdown emphasis/heading markers.
pub fn clean_summary(raw: &str) -> String {
    let text: String = raw.chars().filter(|c| !is_stripped_control(*c)).collect();
    text.lines()
        .map(|line| {
            let trimmed = line.trim_start();
            let line = if trimmed.starts_with('#') {
                trimmed.trim_start_matches('#').trim_start()
            } else {
                line
            };
            line.replace("**", "").replace("__", "").replace('*', "")
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Returns `None` when there is nothing to summarize, when the summarizer
/// fails, or when its cleaned answer is empty.
pub async fn summarize(
    pages: &[AssemblyPage],
    summarizer: &dyn Summarizer,
    policy: &CallPolicy,
    language: &str,
    char_budget: usize,
    log: &ProcessingLog,
) -> Option<String> {
    let source = build_summary_source(pages, char_budget);
    if source.trim().is_empty() {
        log.info(SCOPE, "no narrative text, summary skipped");
        return None;
    }

    match policy
        .run("summarize", || summarizer.summarize(&source, language))
        .await
    {
        Ok(raw) => {
            let cleaned = clean_summary(&raw);
            if cleaned.is_empty() {
                log.warn(SCOPE, "summarizer returned empty text");
                None
            } else {
                Some(cleaned)
            }
        }
        Err(err) => {
            log.warn(SCOPE, format!("summary omitted: {err}"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::clean_summary;

    #[test]
    fn markdown_markers_are_removed() {
        let raw = "## Overview\n**Bold** claim and __under__ *it*.\n\u{7}# Done";
        assert_eq!(clean_summary(raw), "Overview\nBold claim and under it.\nDone");
    }

    #[test]
    fn newlines_and_tabs_survive() {
        assert_eq!(clean_summary("  a\tb\r\nc  "), "a\tb\nc");
    }
}
