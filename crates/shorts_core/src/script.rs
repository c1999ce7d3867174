use serde::Serialize;

/// Hard cap on the joined script handed to the renderer, in characters.
pub const SCRIPT_CHAR_CAP: usize = 5000;

const OMISSION: &str = "...";

/// Renderer input: the ordered sections and their capped, joined text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Script {
    sections: Vec<String>,
    text: String,
}

impl Script {
    pub(crate) fn from_sections(sections: Vec<String>, cap: usize) -> Self {
        let text = truncate_chars(&sections.join("\n"), cap);
        Self { sections, text }
    }

    /// Sections as composed, before the global cap was applied.
    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    /// Final text; never longer than the cap it was composed with.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Truncate to at most `cap` characters, ending in `...` when shortened.
pub fn truncate_chars(input: &str, cap: usize) -> String {
    if input.chars().count() <= cap {
        return input.to_string();
    }
    let omission_len = OMISSION.chars().count();
    if cap <= omission_len {
        return input.chars().take(cap).collect();
    }
    let mut out: String = input.chars().take(cap - omission_len).collect();
    out.push_str(OMISSION);
    out
}
