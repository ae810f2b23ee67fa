//! Service error payloads

use serde::Deserialize;

/// RFC 7807 problem details returned by the configuration store.
///
/// The store answers failed requests with `application/problem+json`, e.g.
/// `{"type":"…/errors/key-locked","title":"…","name":"key","detail":"…","status":409}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProblemDetails {
    /// URI identifying the problem type.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Short summary of the problem.
    #[serde(default)]
    pub title: Option<String>,
    /// Name of the offending parameter or resource.
    #[serde(default)]
    pub name: Option<String>,
    /// Human-readable explanation.
    #[serde(default)]
    pub detail: Option<String>,
    /// HTTP status echoed by the service.
    #[serde(default)]
    pub status: Option<u16>,
}

impl ProblemDetails {
    /// Returns `true` if at least one descriptive field is set.
    pub(crate) fn is_meaningful(&self) -> bool {
        self.kind.is_some() || self.title.is_some() || self.detail.is_some()
    }

    /// One-line description preferring `detail`, then `title`, then `type`.
    pub fn summary(&self) -> String {
        match (&self.title, &self.detail) {
            (Some(title), Some(detail)) if !detail.is_empty() => format!("{} {}", title, detail),
            (Some(title), _) => title.clone(),
            (None, Some(detail)) => detail.clone(),
            (None, None) => self.kind.clone().unwrap_or_default(),
        }
    }
}

impl std::fmt::Display for ProblemDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            Some(kind) => write!(f, "[{}] {}", kind, self.summary()),
            None => write!(f, "{}", self.summary()),
        }
    }
}
