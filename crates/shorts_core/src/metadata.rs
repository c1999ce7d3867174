use serde::Serialize;

use crate::script::truncate_chars;
use crate::ContentRecord;

const TITLE_CAP: usize = 100;
const EXCERPT_CAP: usize = 1000;
const DESCRIPTION_CAP: usize = 5000;
const MAX_TAGS: usize = 10;
const BASE_TAGS: &[&str] = &["Shorts", "Sermon", "Bible", "Faith"];

/// Title, description and tags sent along with a published artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
}

impl PublishMetadata {
    pub fn from_record(record: &ContentRecord) -> Self {
        Self {
            title: truncate_chars(record.title(), TITLE_CAP),
            description: build_description(record),
            tags: build_tags(record),
        }
    }
}

fn build_description(record: &ContentRecord) -> String {
    let mut parts = Vec::new();
    if let Some(reference) = record.reference() {
        parts.push(format!("Scripture: {reference}"));
        parts.push(String::new());
    }
    parts.push(truncate_chars(record.body(), EXCERPT_CAP));
    parts.push(String::new());
    if let Some(organization) = record.organization() {
        parts.push(format!("Church: {organization}"));
    }
    if let Some(attribution) = record.attribution() {
        parts.push(format!("Speaker: {attribution}"));
    }
    parts.push(String::new());
    parts.push("#Shorts #Sermon #Bible".to_string());
    parts.push(format!("Source: {}", record.source_url()));
    truncate_chars(&parts.join("\n"), DESCRIPTION_CAP)
}

fn build_tags(record: &ContentRecord) -> Vec<String> {
    let mut tags: Vec<String> = BASE_TAGS.iter().map(|t| t.to_string()).collect();

    if let Some(organization) = record.organization() {
        let cleaned = keep_word_chars(organization, true);
        if !cleaned.is_empty() {
            tags.push(cleaned);
        }
    }
    if let Some(reference) = record.reference() {
        for part in reference.split(|c: char| c.is_whitespace() || c == ',') {
            let cleaned = keep_word_chars(part, false);
            let len = cleaned.chars().count();
            let numeric = cleaned.chars().all(|c| c.is_ascii_digit());
            if len > 2 && len < 20 && !numeric {
                tags.push(cleaned);
            }
        }
    }

    let mut unique = Vec::with_capacity(tags.len());
    for tag in tags {
        if !unique.contains(&tag) {
            unique.push(tag);
        }
    }
    unique.truncate(MAX_TAGS);
    unique
}

fn keep_word_chars(input: &str, keep_spaces: bool) -> String {
    input
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || (keep_spaces && *c == ' '))
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ContentRecord {
        ContentRecord::new("A Living Hope", "Body text", "https://grace.org/s/1")
            .unwrap()
            .with_reference(Some("1 Peter 1:3-9".into()))
            .with_organization(Some("Grace Church!".into()))
    }

    #[test]
    fn tags_include_organization_and_reference_words() {
        let meta = PublishMetadata::from_record(&record());
        assert_eq!(
            meta.tags,
            vec!["Shorts", "Sermon", "Bible", "Faith", "Grace Church", "Peter"]
        );
    }

    #[test]
    fn description_mentions_source_and_reference() {
        let meta = PublishMetadata::from_record(&record());
        assert!(meta.description.starts_with("Scripture: 1 Peter 1:3-9"));
        assert!(meta.description.ends_with("Source: https://grace.org/s/1"));
    }
}
