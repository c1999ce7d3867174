use serde::{Deserialize, Serialize};

/// Structured fields extracted from one sermon page.
///
/// Constructed only through [`ContentRecord::new`], which rejects records
/// with an empty title or body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    title: String,
    body: String,
    reference: Option<String>,
    attribution: Option<String>,
    organization: Option<String>,
    source_url: String,
}

impl ContentRecord {
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Option<Self> {
        let title = title.into().trim().to_string();
        let body = body.into().trim().to_string();
        if title.is_empty() || body.is_empty() {
            return None;
        }
        Some(Self {
            title,
            body,
            reference: None,
            attribution: None,
            organization: None,
            source_url: source_url.into(),
        })
    }

    pub fn with_reference(mut self, reference: Option<String>) -> Self {
        self.reference = non_blank(reference);
        self
    }

    pub fn with_attribution(mut self, attribution: Option<String>) -> Self {
        self.attribution = non_blank(attribution);
        self
    }

    pub fn with_organization(mut self, organization: Option<String>) -> Self {
        self.organization = non_blank(organization);
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn attribution(&self) -> Option<&str> {
        self.attribution.as_deref()
    }

    pub fn organization(&self) -> Option<&str> {
        self.organization.as_deref()
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
