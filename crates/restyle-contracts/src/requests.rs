use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::OrchestrationError;
use crate::modes::{RequestShape, TransformMode};

/// Generation request body: field name to string, in a fixed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct GenerationRequest {
    fields: IndexMap<String, String>,
}

impl GenerationRequest {
    fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            fields: pairs
                .iter()
                .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
                .collect(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                .collect::<Map<String, Value>>(),
        )
    }
}

/// Shapes the generation body for `mode`. Pure: identical inputs always give
/// identical bodies.
pub fn build_generation_request(
    mode: &TransformMode,
    primary_url: &str,
    style_url: Option<&str>,
    text_prompt: Option<&str>,
) -> Result<GenerationRequest, OrchestrationError> {
    let style_url = non_blank(style_url);
    if mode.requires_style_image && style_url.is_none() {
        return Err(OrchestrationError::MissingStyleImage {
            mode: mode.id.clone(),
        });
    }
    match mode.shape {
        RequestShape::PromptOnly => Ok(prompt_only(mode, primary_url, text_prompt)),
        RequestShape::StyleOnly => style_only(mode, primary_url, style_url),
        RequestShape::MaskAndPrompt => {
            Ok(mask_and_prompt(mode, primary_url, style_url, text_prompt))
        }
    }
}

fn prompt_only(
    mode: &TransformMode,
    primary_url: &str,
    text_prompt: Option<&str>,
) -> GenerationRequest {
    let prompt = resolve_prompt(mode, text_prompt);
    GenerationRequest::from_pairs(&[("imageUrl", primary_url), ("textPrompt", prompt)])
}

fn style_only(
    mode: &TransformMode,
    primary_url: &str,
    style_url: Option<&str>,
) -> Result<GenerationRequest, OrchestrationError> {
    let Some(style_url) = style_url else {
        return Err(OrchestrationError::MissingStyleImage {
            mode: mode.id.clone(),
        });
    };
    Ok(GenerationRequest::from_pairs(&[
        ("imageUrl", primary_url),
        ("styleImageUrl", style_url),
    ]))
}

/// Without a mask the primary image doubles as one. This is the only
/// substitution the builder ever makes.
fn mask_and_prompt(
    mode: &TransformMode,
    primary_url: &str,
    style_url: Option<&str>,
    text_prompt: Option<&str>,
) -> GenerationRequest {
    let masked_url = style_url.unwrap_or(primary_url);
    let prompt = resolve_prompt(mode, text_prompt);
    GenerationRequest::from_pairs(&[
        ("imageUrl", primary_url),
        ("maskedImageUrl", masked_url),
        ("textPrompt", prompt),
    ])
}

fn resolve_prompt<'a>(mode: &'a TransformMode, text_prompt: Option<&'a str>) -> &'a str {
    non_blank(text_prompt).unwrap_or(mode.default_prompt.as_str())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
