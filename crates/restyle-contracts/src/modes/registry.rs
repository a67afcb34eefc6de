use indexmap::IndexMap;
use serde::Serialize;

use crate::errors::OrchestrationError;

pub const DEFAULT_API_BASE: &str = "https://api.lightxeditor.com/external/api";
pub const DEFAULT_MODE_ID: &str = "cartoon";

const UPLOAD_PATH: &str = "v2/uploadImageUrl";
const CREDITS_PATH: &str = "v1/creditsInfo";

/// Field layout of a generation request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestShape {
    /// `{ imageUrl, textPrompt }`
    PromptOnly,
    /// `{ imageUrl, styleImageUrl }`
    StyleOnly,
    /// `{ imageUrl, maskedImageUrl, textPrompt }`
    MaskAndPrompt,
}

impl RequestShape {
    pub fn accepts_style_image(self) -> bool {
        !matches!(self, Self::PromptOnly)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformMode {
    pub id: String,
    pub generation_endpoint: String,
    pub status_endpoint: String,
    pub requires_style_image: bool,
    pub requires_text_prompt: bool,
    pub default_prompt: String,
    pub shape: RequestShape,
}

#[derive(Debug, Clone)]
pub struct ModeRegistry {
    api_base: String,
    modes: IndexMap<String, TransformMode>,
    aliases: IndexMap<String, String>,
}

impl ModeRegistry {
    /// Builds the shipped mode table against `api_base`, or the public
    /// provider base when none is given.
    pub fn new(api_base: Option<&str>) -> Self {
        let api_base = api_base
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let modes = default_modes(&api_base);
        let mut aliases = IndexMap::new();
        aliases.insert("face-swap".to_string(), "faceswap".to_string());
        aliases.insert("virtualtryon".to_string(), "virtual-try-on".to_string());
        Self {
            api_base,
            modes,
            aliases,
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn upload_endpoint(&self) -> String {
        format!("{}/{UPLOAD_PATH}", self.api_base)
    }

    pub fn credits_endpoint(&self) -> String {
        format!("{}/{CREDITS_PATH}", self.api_base)
    }

    pub fn get(&self, id: &str) -> Option<&TransformMode> {
        let key = id.trim().to_ascii_lowercase();
        let key = self.aliases.get(&key).cloned().unwrap_or(key);
        self.modes.get(&key)
    }

    pub fn lookup(&self, id: &str) -> Result<&TransformMode, OrchestrationError> {
        self.get(id).ok_or_else(|| OrchestrationError::UnknownMode {
            mode: id.to_string(),
        })
    }

    /// The prompt a mode falls back to; `None` when the mode takes no prompt.
    pub fn default_prompt_for(&self, id: &str) -> Result<Option<&str>, OrchestrationError> {
        let mode = self.lookup(id)?;
        if !mode.requires_text_prompt {
            return Ok(None);
        }
        Ok(Some(mode.default_prompt.as_str()))
    }

    pub fn default_mode(&self) -> Option<&TransformMode> {
        self.modes.get(DEFAULT_MODE_ID)
    }

    pub fn list(&self) -> impl Iterator<Item = &TransformMode> {
        self.modes.values()
    }

    pub fn ids(&self) -> Vec<String> {
        self.modes.keys().cloned().collect()
    }
}

impl Default for ModeRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

fn default_modes(api_base: &str) -> IndexMap<String, TransformMode> {
    let mut map = IndexMap::new();

    let mut insert = |id: &str,
                      generation_path: &str,
                      status_path: &str,
                      shape: RequestShape,
                      requires_style_image: bool,
                      default_prompt: &str| {
        map.insert(
            id.to_string(),
            TransformMode {
                id: id.to_string(),
                generation_endpoint: format!("{api_base}/{generation_path}"),
                status_endpoint: format!("{api_base}/{status_path}"),
                requires_style_image,
                requires_text_prompt: !matches!(shape, RequestShape::StyleOnly),
                default_prompt: default_prompt.to_string(),
                shape,
            },
        );
    };

    insert(
        "hairstyle",
        "v1/hairstyle",
        "v1/order-status",
        RequestShape::PromptOnly,
        false,
        "modern layered haircut",
    );
    insert(
        "haircolor",
        "v2/haircolor",
        "v2/order-status",
        RequestShape::PromptOnly,
        false,
        "natural chestnut brown hair",
    );
    insert(
        "outfit",
        "v1/outfit",
        "v1/order-status",
        RequestShape::PromptOnly,
        false,
        "smart casual outfit",
    );
    insert(
        "portrait",
        "v1/portrait",
        "v1/order-status",
        RequestShape::PromptOnly,
        false,
        "professional studio portrait",
    );
    insert(
        "cartoon",
        "v1/cartoon",
        "v1/order-status",
        RequestShape::PromptOnly,
        false,
        "cartoon character style",
    );
    insert(
        "caricature",
        "v1/caricature",
        "v1/order-status",
        RequestShape::PromptOnly,
        false,
        "playful caricature",
    );
    insert(
        "avatar",
        "v1/avatar",
        "v1/order-status",
        RequestShape::PromptOnly,
        false,
        "stylized 3d avatar",
    );
    insert(
        "virtual-try-on",
        "v2/aivirtualtryon",
        "v2/order-status",
        RequestShape::StyleOnly,
        true,
        "",
    );
    insert(
        "faceswap",
        "v1/face-swap",
        "v1/order-status",
        RequestShape::StyleOnly,
        true,
        "",
    );
    // The mask is optional: the builder degrades to the primary image.
    insert(
        "replace",
        "v1/replace",
        "v1/order-status",
        RequestShape::MaskAndPrompt,
        false,
        "replace with a clean background",
    );

    map
}
