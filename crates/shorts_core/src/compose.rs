use crate::script::{truncate_chars, Script, SCRIPT_CHAR_CAP};
use crate::ContentRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLabels {
    pub title: String,
    pub attribution: String,
    pub reference: String,
    pub action_heading: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeSettings {
    pub labels: ScriptLabels,
    /// Sentences containing any of these become action points.
    pub action_indicators: Vec<String>,
    /// Used verbatim when no sentence matches an indicator.
    pub default_action_points: String,
    pub max_action_points: usize,
    pub body_cap: usize,
    pub action_cap: usize,
    pub script_cap: usize,
}

impl Default for ComposeSettings {
    fn default() -> Self {
        Self {
            labels: ScriptLabels {
                title: "Title".to_string(),
                attribution: "Speaker".to_string(),
                reference: "Scripture".to_string(),
                action_heading: "Action points:".to_string(),
            },
            action_indicators: default_indicators(),
            default_action_points:
                "1. Meditate on the word\n2. Apply it in prayer\n3. Live it out this week"
                    .to_string(),
            max_action_points: 3,
            body_cap: 2000,
            action_cap: 500,
            script_cap: SCRIPT_CHAR_CAP,
        }
    }
}

impl ComposeSettings {
    /// Korean labels and default action points.
    pub fn korean() -> Self {
        Self {
            labels: ScriptLabels {
                title: "제목".to_string(),
                attribution: "목사".to_string(),
                reference: "성경".to_string(),
                action_heading: "실천사항:".to_string(),
            },
            default_action_points: "1. 말씀 묵상하기\n2. 기도로 적용하기\n3. 실천하며 살아가기"
                .to_string(),
            ..Self::default()
        }
    }
}

fn default_indicators() -> Vec<String> {
    [
        "apply", "practice", "action", "step", "live out", "commit", "실천", "적용", "행동",
        "실행", "방법", "단계",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Builds renderer scripts from extracted records. Pure and deterministic.
#[derive(Debug, Clone, Default)]
pub struct ScriptComposer {
    settings: ComposeSettings,
}

impl ScriptComposer {
    pub fn new(settings: ComposeSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ComposeSettings {
        &self.settings
    }

    pub fn compose(&self, record: &ContentRecord) -> Script {
        let labels = &self.settings.labels;
        let mut sections = vec![format!("{}: {}", labels.title, record.title())];
        if let Some(attribution) = record.attribution() {
            sections.push(format!("{}: {}", labels.attribution, attribution));
        }
        if let Some(reference) = record.reference() {
            sections.push(format!("{}: {}", labels.reference, reference));
        }
        sections.push(String::new());
        sections.push(truncate_chars(record.body(), self.settings.body_cap));
        sections.push(String::new());
        sections.push(labels.action_heading.clone());
        sections.push(self.action_points(record.body()));

        Script::from_sections(sections, self.settings.script_cap)
    }

    fn action_points(&self, body: &str) -> String {
        let indicators: Vec<String> = self
            .settings
            .action_indicators
            .iter()
            .map(|i| i.to_lowercase())
            .collect();
        let matches: Vec<&str> = body
            .split(['.', '!', '?'])
            .map(str::trim)
            .filter(|sentence| !sentence.is_empty())
            .filter(|sentence| {
                let lowered = sentence.to_lowercase();
                indicators.iter().any(|i| lowered.contains(i.as_str()))
            })
            .take(self.settings.max_action_points)
            .collect();

        if matches.is_empty() {
            return self.settings.default_action_points.clone();
        }
        truncate_chars(&matches.join(". "), self.settings.action_cap)
    }
}
