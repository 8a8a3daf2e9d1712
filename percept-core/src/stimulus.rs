use serde::{Deserialize, Serialize};
use std::fmt;

/// Source of an image shown in a trial.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StimulusKind {
    Ai,
    Human,
    /// Images already pooled in a mixed-source folder.
    Mix,
    Attention,
}

impl StimulusKind {
    /// Folder name under the image base path.
    pub fn dir(self) -> &'static str {
        match self {
            StimulusKind::Ai => "ai",
            StimulusKind::Human => "human",
            StimulusKind::Mix => "mix",
            StimulusKind::Attention => "attention",
        }
    }

    pub fn is_attention(self) -> bool {
        matches!(self, StimulusKind::Attention)
    }
}

impl fmt::Display for StimulusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StimulusItem {
    pub id: String,
    pub path: String,
    pub kind: StimulusKind,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_response: Option<String>,
}

impl StimulusItem {
    /// Image `number` of `category` for `kind`, laid out as `<base>/<kind>/<category>/<n>.jpg`.
    pub fn image(base_path: &str, kind: StimulusKind, category: &str, number: usize) -> Self {
        Self {
            id: format!("{}_{}_{}", kind.dir(), category, number),
            path: format!("{}{}/{}/{}.jpg", base_path, kind.dir(), category, number),
            kind,
            category: category.to_string(),
            expected_response: None,
        }
    }

    pub fn is_attention(&self) -> bool {
        self.kind.is_attention()
    }

    /// Answer an attention check is scored against; the category stands in when
    /// no explicit expected response was tagged.
    pub fn expected_answer(&self) -> &str {
        self.expected_response.as_deref().unwrap_or(&self.category)
    }
}
