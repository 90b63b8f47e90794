use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use super::encounters::area_pattern;

/// Grotto entries are bare names, apart from fixed encounters that carry a
/// level and are met before anything else in the grotto.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GrottoEntry {
    Name(String),
    Fixed {
        pokemon: String,
        level: u32,
        #[serde(rename = "forcedFirst")]
        forced_first: bool,
    },
}

/// Location -> rarity tier -> entries.
pub type GrottoData = IndexMap<String, IndexMap<String, Vec<GrottoEntry>>>;

const FIXED_LOCATION: &str = "Route 5";
const FIXED_TIER: &str = "Guaranteed Encounters";

struct Patterns {
    list_start: Regex,
    entry: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        list_start: Regex::new(r"^(?P<category>.+?):").expect("valid regex"),
        entry: Regex::new(r"^-\s+(?P<entry>.+)").expect("valid regex"),
    })
}

#[derive(Default)]
struct GrottoParser {
    data: GrottoData,
    location: String,
    tier: String,
    entries: Vec<GrottoEntry>,
}

impl GrottoParser {
    fn take_line(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }
        if let Some(caps) = area_pattern().captures(line) {
            self.flush();
            self.location = caps["name"].to_string();
        } else if let Some(caps) = patterns().list_start.captures(line) {
            self.flush();
            self.tier = caps["category"].to_string();
        } else if let Some(caps) = patterns().entry.captures(line) {
            self.entries.push(GrottoEntry::Name(caps["entry"].to_string()));
        } else {
            debug!(line, "ignoring grotto line");
        }
    }

    /// A tier listed twice for one location keeps its last list.
    fn flush(&mut self) {
        if self.location.is_empty() || self.tier.is_empty() {
            return;
        }
        let entries = std::mem::take(&mut self.entries);
        self.data
            .entry(self.location.clone())
            .or_default()
            .insert(self.tier.clone(), entries);
    }

    fn finish(mut self) -> GrottoData {
        self.flush();
        add_fixed_encounters(&mut self.data);
        self.data
    }
}

fn add_fixed_encounters(data: &mut GrottoData) {
    data.entry(FIXED_LOCATION.to_string()).or_default().insert(
        FIXED_TIER.to_string(),
        vec![GrottoEntry::Fixed {
            pokemon: "Stantler".to_string(),
            level: 30,
            forced_first: true,
        }],
    );
}

/// Parse a de-columned `hidden grotto guide` section.
pub fn parse_hidden_grotto_section(text: &str) -> GrottoData {
    let mut parser = GrottoParser::default();
    for line in text.lines() {
        parser.take_line(line.trim());
    }
    parser.finish()
}
