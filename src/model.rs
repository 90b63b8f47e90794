use indexmap::IndexMap;
use serde::Deserialize;

/// One collectible entry. The name doubles as the persistence key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawItem")]
pub struct Item {
    pub name: String,
    pub chance_pct: Option<i64>,
    pub level_range: Option<(u32, u32)>,
    pub notes: Option<String>,
    /// Guaranteed to be the first encounter of its grouping.
    pub forced_first: bool,
}

/// Items arrive either as bare names or as encounter objects.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawItem {
    Name(String),
    Entry {
        pokemon: String,
        #[serde(default)]
        chance_pct: Option<i64>,
        #[serde(default)]
        level_range: Option<(u32, u32)>,
        #[serde(default)]
        level: Option<u32>,
        #[serde(default)]
        notes: Option<String>,
        #[serde(default, rename = "forcedFirst")]
        forced_first: bool,
    },
}

impl From<RawItem> for Item {
    fn from(raw: RawItem) -> Self {
        match raw {
            RawItem::Name(name) => Item::named(name),
            RawItem::Entry {
                pokemon,
                chance_pct,
                level_range,
                level,
                notes,
                forced_first,
            } => Item {
                name: pokemon,
                chance_pct,
                level_range: level_range.or(level.map(|lv| (lv, lv))),
                notes,
                forced_first,
            },
        }
    }
}

impl Item {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chance_pct: None,
            level_range: None,
            notes: None,
            forced_first: false,
        }
    }

    /// Secondary text shown next to the name, e.g. `20% · Lv. 5-7`.
    pub fn detail(&self) -> String {
        let mut parts = Vec::new();
        if let Some(pct) = self.chance_pct {
            parts.push(format!("{}%", pct));
        }
        match self.level_range {
            Some((min, max)) if min == max => parts.push(format!("Lv. {}", min)),
            Some((min, max)) => parts.push(format!("Lv. {}-{}", min, max)),
            None => {}
        }
        if let Some(notes) = self.notes.as_deref() {
            parts.push(notes.to_string());
        }
        if self.forced_first {
            parts.push("first".to_string());
        }
        parts.join(" · ")
    }
}

/// One habitat's content. The shape is decided once, at deserialization.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Category {
    FlatList(Vec<Item>),
    Categorized(IndexMap<String, Vec<Item>>),
}

impl Category {
    /// Number of Item leaves under this category.
    pub fn leaf_count(&self) -> usize {
        match self {
            Category::FlatList(items) => items.len(),
            Category::Categorized(subcats) => subcats.values().map(Vec::len).sum(),
        }
    }

    pub fn items(&self) -> Box<dyn Iterator<Item = &Item> + '_> {
        match self {
            Category::FlatList(items) => Box::new(items.iter()),
            Category::Categorized(subcats) => Box::new(subcats.values().flatten()),
        }
    }
}

/// Habitat name -> content, in source order.
pub type HabitatMap = IndexMap<String, Category>;

/// One table document: location name -> habitats.
pub type Dataset = IndexMap<String, HabitatMap>;

/// Auxiliary groupings (e.g. hidden grottos): grouping name -> content.
pub type SpecialData = IndexMap<String, Category>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_habitat_shapes() {
        let json = r#"{
            "Route 1": {
                "Grass": [
                    {"pokemon": "Patrat", "chance_pct": 40, "level_range": [2, 4], "notes": null},
                    {"pokemon": "Lillipup", "chance_pct": null, "level_range": [3, 3], "notes": "Rain"}
                ],
                "Surf": {
                    "Normal": [{"pokemon": "Basculin", "chance_pct": 60, "level_range": [20, 25], "notes": null}],
                    "Dark Spot": [{"pokemon": "Frillish", "chance_pct": 40, "level_range": [20, 25], "notes": null}]
                }
            }
        }"#;
        let dataset: Dataset = serde_json::from_str(json).unwrap();
        let habitats = &dataset["Route 1"];

        assert!(matches!(habitats["Grass"], Category::FlatList(_)));
        assert!(matches!(habitats["Surf"], Category::Categorized(_)));
        assert_eq!(habitats["Grass"].leaf_count(), 2);
        assert_eq!(habitats["Surf"].leaf_count(), 2);

        let order: Vec<_> = habitats.keys().cloned().collect();
        assert_eq!(order, vec!["Grass", "Surf"]);
    }

    #[test]
    fn test_special_items_bare_and_fixed() {
        let json = r#"{
            "Route 5": {
                "Common": ["Minccino", "Stantler"],
                "Guaranteed Encounters": [{"pokemon": "Stantler", "level": 30, "forcedFirst": true}]
            }
        }"#;
        let special: SpecialData = serde_json::from_str(json).unwrap();
        let Category::Categorized(tiers) = &special["Route 5"] else {
            panic!("expected tiers");
        };

        assert_eq!(tiers["Common"][0], Item::named("Minccino"));
        let fixed = &tiers["Guaranteed Encounters"][0];
        assert_eq!(fixed.name, "Stantler");
        assert_eq!(fixed.level_range, Some((30, 30)));
        assert!(fixed.forced_first);
    }

    #[test]
    fn test_detail_text() {
        let item = Item {
            name: "Pidove".into(),
            chance_pct: Some(20),
            level_range: Some((5, 7)),
            notes: None,
            forced_first: false,
        };
        assert_eq!(item.detail(), "20% · Lv. 5-7");
        assert_eq!(Item::named("Pidove").detail(), "");
    }
}
