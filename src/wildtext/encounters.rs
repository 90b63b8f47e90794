use std::collections::VecDeque;
use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

/// Lines carrying this marker point at the grotto section instead of
/// describing an encounter.
const GROTTO_REFERENCE: &str = "Search 'Hidden Grotto Guide'";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Encounter {
    pub pokemon: String,
    pub chance_pct: Option<i64>,
    pub level_range: (u32, u32),
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum WildCategory {
    Flat(Vec<Encounter>),
    Split(IndexMap<String, Vec<Encounter>>),
}

impl WildCategory {
    fn is_empty(&self) -> bool {
        match self {
            WildCategory::Flat(entries) => entries.is_empty(),
            WildCategory::Split(kinds) => kinds.is_empty(),
        }
    }
}

/// Location -> category -> encounters.
pub type WildData = IndexMap<String, IndexMap<String, WildCategory>>;

struct Patterns {
    area: Regex,
    category: Regex,
    category_rule: Regex,
    /// `Pidove Lv. 05-07 20%`, optionally with notes before the chance.
    encounter: Regex,
}

pub(super) fn area_pattern() -> &'static Regex {
    &patterns().area
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        area: Regex::new(r"^~~~+\s*(?P<name>.+?)\s*~~~+").expect("valid regex"),
        category: Regex::new(r"^(?P<main>[^,]+)(?:,\s*(?P<kind>.+?))?\s*:?$").expect("valid regex"),
        category_rule: Regex::new(r"^----+").expect("valid regex"),
        encounter: Regex::new(
            r"^(?P<mon>.+?)\s+Lv.\s+(?P<lvmin>\d+)(?:-(?P<lvmax>\d+))?(?:\s+(?P<notes>.+))?\s+(?P<pct>[\d-]+)%",
        )
        .expect("valid regex"),
    })
}

/// Parse one encounter line. `None` for blank lines, grotto references and
/// lines that do not describe an encounter.
pub fn parse_encounter(line: &str) -> Option<Encounter> {
    if line.trim().is_empty() || line.contains(GROTTO_REFERENCE) {
        return None;
    }
    let caps = patterns().encounter.captures(line)?;

    let min: u32 = match caps["lvmin"].parse() {
        Ok(level) => level,
        Err(_) => {
            warn!(line, "encounter level out of range");
            return None;
        }
    };
    let max = caps
        .name("lvmax")
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(min);

    Some(Encounter {
        pokemon: caps["mon"].to_string(),
        chance_pct: caps["pct"].parse().ok(),
        level_range: (min, max),
        notes: caps.name("notes").map(|m| m.as_str().to_string()),
    })
}

/// Streaming state for one section. Category headers are only recognised
/// by the rule line under them, so candidate lines wait in a two-line
/// lookbehind before they are parsed as encounters.
#[derive(Default)]
struct WildAreaParser {
    data: WildData,
    location: String,
    category: String,
    subcategory: Option<String>,
    entries: Vec<Encounter>,
    /// Newest line at the front.
    lookbehind: VecDeque<String>,
}

impl WildAreaParser {
    fn take_line(&mut self, line: &str) {
        let p = patterns();

        if let Some(caps) = p.area.captures(line) {
            self.commit();
            self.entries.clear();
            self.location = caps["name"].to_string();
            return;
        }
        if line.is_empty() && !self.location.is_empty() && !self.category.is_empty() {
            return;
        }
        if p.category_rule.is_match(line) {
            if let Some(header) = self.lookbehind.pop_front() {
                self.commit();
                let (main, kind) = split_category(&header);
                self.category = main;
                self.subcategory = kind;
                self.entries.clear();
                return;
            }
        }

        self.lookbehind.push_front(line.to_string());
        if self.lookbehind.len() > 1 {
            if let Some(oldest) = self.lookbehind.pop_back() {
                self.check_line(&oldest);
            }
        }
    }

    fn check_line(&mut self, line: &str) {
        match parse_encounter(line) {
            Some(encounter) => self.entries.push(encounter),
            None if !line.is_empty() => debug!(line, "not an encounter"),
            None => {}
        }
    }

    /// Flush the lookbehind and merge the collected entries into the
    /// current location/category.
    fn commit(&mut self) {
        if self.location.is_empty() || self.category.is_empty() {
            return;
        }
        while let Some(line) = self.lookbehind.pop_back() {
            self.check_line(&line);
        }

        let categories = self.data.entry(self.location.clone()).or_default();
        match (&self.subcategory, categories.get_mut(&self.category)) {
            (None, None) => {
                categories.insert(self.category.clone(), WildCategory::Flat(self.entries.clone()));
            }
            (None, Some(WildCategory::Flat(existing))) => union_in_place(existing, &self.entries),
            (Some(kind), None) => {
                let mut kinds = IndexMap::new();
                kinds.insert(kind.clone(), self.entries.clone());
                categories.insert(self.category.clone(), WildCategory::Split(kinds));
            }
            (Some(kind), Some(WildCategory::Split(kinds))) => match kinds.get_mut(kind) {
                Some(existing) => union_in_place(existing, &self.entries),
                None => {
                    kinds.insert(kind.clone(), self.entries.clone());
                }
            },
            (_, Some(_)) => warn!(
                location = %self.location,
                category = %self.category,
                "category used both with and without a kind, entries dropped"
            ),
        }
    }

    fn finish(mut self) -> WildData {
        self.commit();
        remove_empty(&mut self.data);
        self.data
    }
}

/// `Surf, Dark Spot` -> (`Surf`, `Dark Spot`).
fn split_category(header: &str) -> (String, Option<String>) {
    match patterns().category.captures(header) {
        Some(caps) => (
            caps["main"].trim().to_string(),
            caps.name("kind").map(|m| m.as_str().to_string()),
        ),
        None => (header.trim().to_string(), None),
    }
}

fn union_in_place(existing: &mut Vec<Encounter>, incoming: &[Encounter]) {
    for entry in incoming {
        if !existing.contains(entry) {
            existing.push(entry.clone());
        }
    }
}

fn remove_empty(data: &mut WildData) {
    for categories in data.values_mut() {
        for category in categories.values_mut() {
            if let WildCategory::Split(kinds) = category {
                kinds.retain(|_, entries| !entries.is_empty());
            }
        }
        categories.retain(|_, category| !category.is_empty());
    }
    data.retain(|_, categories| !categories.is_empty());
}

/// Parse a de-columned `main` or `postgame` section.
pub fn parse_wild_area_section(text: &str) -> WildData {
    let mut parser = WildAreaParser::default();
    for line in text.lines() {
        parser.take_line(line.trim());
    }
    parser.finish()
}
