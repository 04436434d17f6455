//! Wire shape of the layout analyzer's answer and its conversion into the
//! closed [`ContentBlock`] model.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::{AppError, AppResult};
use crate::core::types::{BlockKind, BoundingBox, ContentBlock, PageAnalysis};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LayoutResponse {
    /// Printed page number, if one is visible on the page.
    #[serde(default, alias = "page_number")]
    pub page_number: Option<i64>,
    /// True when the last sentence on the page is cut off mid-way.
    #[serde(default, alias = "is_truncated")]
    pub is_truncated: Option<bool>,
    #[serde(default)]
    pub blocks: Option<Vec<LayoutBlock>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LayoutBlock {
    /// One of heading, subheading, author, paragraph, image_description,
    /// table_crop, formula_crop, image_crop.
    #[serde(rename = "type", default)]
    pub block_type: Option<String>,
    /// Caption for crop blocks, `null` when there is none.
    #[serde(default)]
    pub text: Option<String>,
    /// `[ymin, xmin, ymax, xmax]` on a 0–1000 scale, for crop blocks.
    #[serde(default, rename = "box_2d", alias = "bbox", alias = "box")]
    pub box_2d: Option<Vec<f64>>,
}

/// JSON schema of [`LayoutResponse`], embedded in the analysis prompt.
pub fn response_schema() -> String {
    serde_json::to_string_pretty(&schemars::schema_for!(LayoutResponse)).unwrap_or_default()
}

/// Parses the analyzer's text output into a [`PageAnalysis`].
pub fn parse_page_analysis(raw: &str) -> AppResult<PageAnalysis> {
    let body = strip_code_fence(raw);
    let value: Value = serde_json::from_str(body)
        .map_err(|err| AppError::ProviderInvalidResponse(format!("layout output not JSON: {err}")))?;
    let value = match value {
        Value::Array(blocks) => serde_json::json!({ "blocks": blocks }),
        other => other,
    };
    let response: LayoutResponse = serde_json::from_value(value).map_err(|err| {
        AppError::ProviderInvalidResponse(format!("layout output has unexpected shape: {err}"))
    })?;
    Ok(response.into_analysis())
}

impl LayoutResponse {
    pub fn into_analysis(self) -> PageAnalysis {
        let blocks = self
            .blocks
            .unwrap_or_default()
            .into_iter()
            .filter_map(LayoutBlock::into_block)
            .collect();
        PageAnalysis {
            page_number: self
                .page_number
                .filter(|number| *number >= 1)
                .and_then(|number| u32::try_from(number).ok()),
            blocks,
            ends_truncated: self.is_truncated.unwrap_or(false),
        }
    }
}

impl LayoutBlock {
    fn into_block(self) -> Option<ContentBlock> {
        let kind = BlockKind::from_str(self.block_type.as_deref().unwrap_or_default());
        // A null caption falls back to the kind's default caption at assembly.
        let text = self.text.as_deref().unwrap_or_default().trim().to_string();
        let bbox = self.box_2d.as_deref().and_then(parse_box);
        if text.is_empty() && !(kind.requires_crop() && bbox.is_some()) {
            return None;
        }
        Some(ContentBlock::new(kind, text, bbox))
    }
}

fn parse_box(values: &[f64]) -> Option<BoundingBox> {
    if values.len() != 4 || values.iter().any(|value| !value.is_finite()) {
        return None;
    }
    let coords: Vec<i32> = values.iter().map(|value| value.round() as i32).collect();
    Some(BoundingBox::new(coords[0], coords[1], coords[2], coords[3]))
}

pub(crate) fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
