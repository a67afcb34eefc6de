use super::registry::{ModeRegistry, TransformMode, DEFAULT_MODE_ID};
use crate::errors::OrchestrationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeSelection {
    pub mode: TransformMode,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModeSelector {
    pub registry: ModeRegistry,
}

impl ModeSelector {
    pub fn new(registry: Option<ModeRegistry>) -> Self {
        Self {
            registry: registry.unwrap_or_default(),
        }
    }

    /// Resolves the caller's mode. Only an absent (or blank) identifier
    /// falls back to the default; an unmatched one is `UnknownMode`.
    pub fn select(&self, requested: Option<&str>) -> Result<ModeSelection, OrchestrationError> {
        let requested = requested.map(str::trim).filter(|value| !value.is_empty());
        if let Some(requested_value) = requested {
            let mode = self.registry.lookup(requested_value)?;
            return Ok(ModeSelection {
                mode: mode.clone(),
                requested: Some(requested_value.to_string()),
                fallback_reason: None,
            });
        }

        let Some(mode) = self.registry.default_mode().cloned() else {
            return Err(OrchestrationError::UnknownMode {
                mode: DEFAULT_MODE_ID.to_string(),
            });
        };
        Ok(ModeSelection {
            mode,
            requested: None,
            fallback_reason: Some("No mode specified; using default.".to_string()),
        })
    }
}
