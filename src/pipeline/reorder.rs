//! Reading-order recovery for the pages of one folder.
//!
//! The ranker's answer is only trusted when it is an exact permutation of the
//! page indices. Anything else (an error, a malformed reply, a partial or
//! duplicated order) falls back to sorting by detected page number, pages
//! without one last, ties kept in extraction order.

use crate::{
    core::{
        errors::{AppError, AppResult},
        log::ProcessingLog,
        types::{AssemblyPage, BlockKind, ReorderSource},
    },
    providers::{retry::CallPolicy, PageDescriptor, PageRanker},
};

const SCOPE: &str = "reorder";

#[derive(Debug, Clone)]
pub struct ReorderOutcome {
    pub pages: Vec<AssemblyPage>,
    pub source: ReorderSource,
}

pub async fn reorder(
    pages: Vec<AssemblyPage>,
    ranker: &dyn PageRanker,
    policy: &CallPolicy,
    excerpt_budget: usize,
    log: &ProcessingLog,
) -> ReorderOutcome {
    if pages.len() <= 1 {
        return ReorderOutcome {
            pages,
            source: ReorderSource::Unchanged,
        };
    }

    let descriptors = page_descriptors(&pages, excerpt_budget);
    let hint = policy
        .run("rank", || ranker.rank(&descriptors))
        .await
        .and_then(|raw| validate_permutation(&raw, pages.len()));

    let (order, source) = match hint {
        Ok(order) => {
            log.info(SCOPE, format!("applied ranker order for {} pages", pages.len()));
            (order, ReorderSource::Hint)
        }
        Err(err) => {
            log.warn(SCOPE, format!("falling back to page numbers: {err}"));
            (
                fallback_order(&pages),
                ReorderSource::Fallback {
                    reason: err.to_string(),
                },
            )
        }
    };

    ReorderOutcome {
        pages: apply_order(pages, &order),
        source,
    }
}

pub fn page_descriptors(pages: &[AssemblyPage], excerpt_budget: usize) -> Vec<PageDescriptor> {
    pages
        .iter()
        .enumerate()
        .map(|(index, page)| {
            let mut narrative = page
                .analysis
                .blocks
                .iter()
                .filter(|block| is_narrative(block.kind()))
                .map(|block| block.text().trim())
                .filter(|text| !text.is_empty());
            let first = narrative.next();
            let last = narrative.last().or(first);

            PageDescriptor {
                temp_id: index,
                file_name: page.name.clone(),
                detected_page_num: page.analysis.page_number,
                first_sentence: first.map(|t| head(t, excerpt_budget)).unwrap_or_default(),
                last_sentence: last.map(|t| tail(t, excerpt_budget)).unwrap_or_default(),
            }
        })
        .collect()
}

fn is_narrative(kind: BlockKind) -> bool {
    !kind.requires_crop()
}

fn head(text: &str, budget: usize) -> String {
    text.chars().take(budget).collect()
}

fn tail(text: &str, budget: usize) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(budget)).collect()
}

/// Accepts `hint` only if it is a bijection over `0..len`.
pub fn validate_permutation(hint: &[i64], len: usize) -> AppResult<Vec<usize>> {
    if hint.len() != len {
        return Err(AppError::ReorderHintInvalid(format!(
            "expected {len} indices, got {}",
            hint.len()
        )));
    }

    let mut seen = vec![false; len];
    let mut order = Vec::with_capacity(len);
    for &raw in hint {
        let index = usize::try_from(raw)
            .ok()
            .filter(|index| *index < len)
            .ok_or_else(|| AppError::ReorderHintInvalid(format!("index {raw} out of range")))?;
        if seen[index] {
            return Err(AppError::ReorderHintInvalid(format!(
                "index {index} appears twice"
            )));
        }
        seen[index] = true;
        order.push(index);
    }
    Ok(order)
}

/// Indices sorted by detected page number; pages without one go last.
pub fn fallback_order(pages: &[AssemblyPage]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..pages.len()).collect();
    order.sort_by_key(|&index| pages[index].analysis.page_number.unwrap_or(u32::MAX));
    order
}

/// Moves `pages` into `order`. `order` must be a permutation of the indices.
pub fn apply_order(pages: Vec<AssemblyPage>, order: &[usize]) -> Vec<AssemblyPage> {
    let mut slots: Vec<Option<AssemblyPage>> = pages.into_iter().map(Some).collect();
    order
        .iter()
        .filter_map(|&index| slots.get_mut(index).and_then(Option::take))
        .collect()
}
