use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Main,
    Postgame,
    HiddenGrotto,
}

impl SectionKind {
    /// Section heading (case-insensitive) to kind.
    pub fn from_heading(heading: &str) -> Option<Self> {
        match heading.to_lowercase().as_str() {
            "main story" => Some(SectionKind::Main),
            "postgame locations" => Some(SectionKind::Postgame),
            "hidden grotto guide" => Some(SectionKind::HiddenGrotto),
            _ => None,
        }
    }

    pub fn file_stem(self) -> &'static str {
        match self {
            SectionKind::Main => "main",
            SectionKind::Postgame => "postgame",
            SectionKind::HiddenGrotto => "hidden_grotto",
        }
    }
}

/// Section bodies in order of first appearance.
pub type Sections = IndexMap<SectionKind, String>;

fn separator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^===+").expect("valid regex"))
}

/// Split the guide on `===` heading blocks. Lines are trimmed; content of
/// unknown sections and anything before the first section is dropped. A
/// section appearing twice keeps only its last body.
pub fn split_sections(text: &str) -> Sections {
    let mut sections = Sections::new();
    let mut in_heading = false;
    let mut current: Option<SectionKind> = None;

    for line in text.lines() {
        let line = line.trim();
        if separator().is_match(line) {
            in_heading = !in_heading;
        } else if in_heading {
            current = SectionKind::from_heading(line);
            if let Some(kind) = current {
                sections.insert(kind, String::new());
            } else {
                debug!(heading = line, "skipping unknown section");
            }
        } else if let Some(body) = current.and_then(|kind| sections.get_mut(&kind)) {
            body.push_str(line);
            body.push('\n');
        }
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sections() {
        let text = "\
preamble
=====
MAIN STORY
=====
  line one
line two
=====
Credits
=====
thanks
=====
Postgame Locations
=====
late
";
        let sections = split_sections(text);
        let kinds: Vec<_> = sections.keys().copied().collect();
        assert_eq!(kinds, vec![SectionKind::Main, SectionKind::Postgame]);
        assert_eq!(sections[&SectionKind::Main], "line one\nline two\n");
        assert_eq!(sections[&SectionKind::Postgame], "late\n");
    }
}
