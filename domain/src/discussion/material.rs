//! Reference materials attached to a discussion.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    File,
    Image,
    Other,
}

/// An attachment with optionally extracted text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    pub filename: String,
    pub kind: MaterialKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
}

impl Material {
    pub fn file(filename: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            kind: MaterialKind::File,
            text_content: Some(text.into()),
        }
    }

    pub fn image(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            kind: MaterialKind::Image,
            text_content: None,
        }
    }

    pub fn other(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            kind: MaterialKind::Other,
            text_content: None,
        }
    }

    fn render(&self) -> String {
        match (&self.kind, self.text_content.as_deref()) {
            (MaterialKind::File, Some(text)) if !text.trim().is_empty() => {
                format!("[文件: {}]\n{}", self.filename, text)
            }
            (MaterialKind::Image, _) => format!("[图片: {}]", self.filename),
            _ => format!("[附件: {}]", self.filename),
        }
    }
}

/// Concatenate materials into the raw reference text fed to the formatter.
pub fn render_materials(materials: &[Material]) -> String {
    materials
        .iter()
        .map(Material::render)
        .collect::<Vec<_>>()
        .join("\n\n")
}
