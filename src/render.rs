use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::loader::NormalizedLocation;
use crate::model::{Category, Item};
use crate::slug::slugify;
use crate::surface::{BackRefs, Extent, Marker, Region, RegionId, RegionTable, Row, Tier};

/// Id prefix keeping special groupings apart from ordinary habitats.
pub const SPECIAL_PREFIX: &str = "hg-";

/// Columns a flat habitat covers: its own plus the absent sub-category column.
pub const FLAT_HABITAT_COLS: u16 = 2;

pub fn location_id(location: &str) -> RegionId {
    RegionId::new(format!("{}-loc-cell", slugify(location)))
}

pub fn habitat_id(location: &str, habitat: &str, special: bool) -> RegionId {
    RegionId::new(format!(
        "{}{}-{}-hab-cell",
        if special { SPECIAL_PREFIX } else { "" },
        slugify(habitat),
        slugify(location)
    ))
}

pub fn subcategory_id(location: &str, habitat: &str, subcategory: &str, special: bool) -> RegionId {
    RegionId::new(format!(
        "{}{}-{}-{}-sub-cell",
        if special { SPECIAL_PREFIX } else { "" },
        slugify(habitat),
        slugify(location),
        slugify(subcategory)
    ))
}

fn item_id(owner: &RegionId, position: usize, name: &str) -> RegionId {
    let stem = owner.as_str().trim_end_matches("-cell");
    RegionId::new(format!("{}-{}-{}-item", stem, position, slugify(name)))
}

/// Walks normalized locations and emits regions and rows. Header regions
/// wait in `pending` until the first row below them is emitted.
struct TableBuilder {
    table: RegionTable,
    pending: Vec<RegionId>,
}

impl TableBuilder {
    fn header(&mut self, id: RegionId, tier: Tier, label: &str, extent: Extent, markers: BTreeSet<Marker>, refs: BackRefs) {
        let region = Region {
            id: id.clone(),
            tier,
            label: label.to_string(),
            detail: None,
            extent,
            markers,
            refs,
            item: None,
            checked: false,
            badge: None,
        };
        if !self.table.insert_region(region) {
            warn!(region = %id, "duplicate region id, sibling names must be unique");
        }
        self.pending.push(id);
    }

    fn items(&mut self, items: &[Item], refs: &BackRefs, special: bool) {
        let Some(owner) = refs.innermost().cloned() else {
            return;
        };
        for (position, item) in items.iter().enumerate() {
            let id = item_id(&owner, position, &item.name);
            let detail = item.detail();
            let mut markers = BTreeSet::from([Marker::ItemCell]);
            if special {
                markers.insert(Marker::Special);
            }
            let region = Region {
                id: id.clone(),
                tier: Tier::Item,
                label: item.name.clone(),
                detail: (!detail.is_empty()).then_some(detail),
                extent: Extent::new(1, 1),
                markers,
                refs: refs.clone(),
                item: Some(item.name.clone()),
                checked: false,
                badge: None,
            };
            if !self.table.insert_region(region) {
                warn!(region = %id, "duplicate item region id");
            }

            let mut cells: Vec<RegionId> = self.pending.drain(..).collect();
            cells.push(id.clone());
            self.table.push_row(Row { cells, leaf: id });
        }
    }

    fn habitat(&mut self, location: &str, loc_id: &RegionId, name: &str, category: &Category, special: bool) {
        let count = category.leaf_count();
        if count == 0 {
            debug!(location, habitat = name, "skipping empty habitat");
            return;
        }

        let hab_id = habitat_id(location, name, special);
        let mut markers = BTreeSet::from([Marker::HabitatCell, Marker::Clickable]);
        if special {
            markers.insert(Marker::Special);
        }
        let loc_refs = BackRefs {
            location: Some(loc_id.clone()),
            ..BackRefs::default()
        };

        match category {
            Category::FlatList(items) => {
                markers.insert(Marker::NoSubcategory);
                self.header(
                    hab_id.clone(),
                    Tier::Habitat,
                    name,
                    Extent::new(count, FLAT_HABITAT_COLS),
                    markers,
                    loc_refs,
                );
                let refs = BackRefs {
                    location: Some(loc_id.clone()),
                    habitat: Some(hab_id),
                    subcategory: None,
                };
                self.items(items, &refs, special);
            }
            Category::Categorized(subcats) => {
                self.header(hab_id.clone(), Tier::Habitat, name, Extent::new(count, 1), markers, loc_refs);
                for (sub_name, items) in subcats {
                    if items.is_empty() {
                        continue;
                    }
                    let sub_id = subcategory_id(location, name, sub_name, special);
                    let mut sub_markers = BTreeSet::from([Marker::SubcatCell, Marker::Clickable]);
                    if special {
                        sub_markers.insert(Marker::Special);
                    }
                    self.header(
                        sub_id.clone(),
                        Tier::SubCategory,
                        sub_name,
                        Extent::new(items.len(), 1),
                        sub_markers,
                        BackRefs {
                            location: Some(loc_id.clone()),
                            habitat: Some(hab_id.clone()),
                            subcategory: None,
                        },
                    );
                    let refs = BackRefs {
                        location: Some(loc_id.clone()),
                        habitat: Some(hab_id.clone()),
                        subcategory: Some(sub_id),
                    };
                    self.items(items, &refs, special);
                }
            }
        }
    }

    fn location(&mut self, location: &NormalizedLocation) {
        let total = location.leaf_count();
        if total == 0 {
            debug!(location = %location.name, "skipping empty location");
            return;
        }

        let loc_id = location_id(&location.name);
        self.header(
            loc_id.clone(),
            Tier::Location,
            &location.name,
            Extent::new(total, 1),
            BTreeSet::from([Marker::AreaCell, Marker::Clickable]),
            BackRefs::default(),
        );

        for (name, category) in &location.habitats {
            self.habitat(&location.name, &loc_id, name, category, false);
        }
        // Special groupings always follow the ordinary habitats.
        for (name, category) in &location.specials {
            self.habitat(&location.name, &loc_id, name, category, true);
        }
    }
}

/// Lay out one table. Deterministic: source key order, depth first.
pub fn render_table(name: &str, locations: &[NormalizedLocation]) -> RegionTable {
    let mut builder = TableBuilder {
        table: RegionTable::new(name),
        pending: Vec::new(),
    };
    for location in locations {
        builder.location(location);
    }
    debug!(
        table = name,
        rows = builder.table.rows().len(),
        regions = builder.table.regions().count(),
        "rendered table"
    );
    builder.table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::normalize;
    use crate::model::{HabitatMap, SpecialData};

    fn flat(names: &[&str]) -> Category {
        Category::FlatList(names.iter().map(|n| Item::named(*n)).collect())
    }

    fn tiers(entries: &[(&str, &[&str])]) -> Category {
        Category::Categorized(
            entries
                .iter()
                .map(|(tier, names)| (tier.to_string(), names.iter().map(|n| Item::named(*n)).collect()))
                .collect(),
        )
    }

    fn sample() -> RegionTable {
        let mut habitats = HabitatMap::new();
        habitats.insert("Grass".into(), flat(&["Patrat", "Lillipup", "Purrloin"]));
        habitats.insert(
            "Surf".into(),
            tiers(&[("Normal", &["Basculin", "Frillish"]), ("Dark Spot", &["Alomomola"])]),
        );
        let mut special = SpecialData::new();
        special.insert("Route 1".into(), tiers(&[("Common", &["Audino"]), ("Rare", &["Patrat"])]));

        let locations = vec![normalize("Route 1", &habitats, &special)];
        render_table("main", &locations)
    }

    fn extent(table: &RegionTable, id: &str) -> Extent {
        table.region(&RegionId::from(id)).unwrap().extent
    }

    #[test]
    fn test_location_span_counts_special_leaves() {
        let table = sample();
        assert_eq!(extent(&table, "route-1-loc-cell"), Extent::new(8, 1));
        assert_eq!(table.rows().len(), 8);
    }

    #[test]
    fn test_habitat_spans() {
        let table = sample();
        assert_eq!(extent(&table, "grass-route-1-hab-cell"), Extent::new(3, FLAT_HABITAT_COLS));
        assert_eq!(extent(&table, "surf-route-1-hab-cell"), Extent::new(3, 1));
        assert_eq!(extent(&table, "surf-route-1-normal-sub-cell"), Extent::new(2, 1));
        assert_eq!(extent(&table, "surf-route-1-dark-spot-sub-cell"), Extent::new(1, 1));

        let grass = table.region(&RegionId::from("grass-route-1-hab-cell")).unwrap();
        assert!(grass.has(Marker::NoSubcategory));
    }

    #[test]
    fn test_headers_start_on_first_row_only() {
        let table = sample();
        let rows = table.rows();
        let first: Vec<&str> = rows[0].cells.iter().map(RegionId::as_str).collect();
        assert_eq!(
            first,
            vec!["route-1-loc-cell", "grass-route-1-hab-cell", "grass-route-1-hab-0-patrat-item"]
        );
        assert_eq!(rows[1].cells.len(), 1);

        let surf_first: Vec<&str> = rows[3].cells.iter().map(RegionId::as_str).collect();
        assert_eq!(
            surf_first,
            vec![
                "surf-route-1-hab-cell",
                "surf-route-1-normal-sub-cell",
                "surf-route-1-normal-sub-0-basculin-item"
            ]
        );
    }

    #[test]
    fn test_special_groupings_follow_with_prefix() {
        let table = sample();
        let rows = table.rows();
        let special_first = &rows[6];
        assert_eq!(special_first.cells[0].as_str(), "hg-route-1-route-1-hab-cell");

        let special = table.region(&special_first.cells[0]).unwrap();
        assert!(special.has(Marker::Special));
        assert_eq!(special.extent, Extent::new(2, 1));
    }

    #[test]
    fn test_leaf_back_references() {
        let table = sample();
        let leaf = table.region(&table.rows()[4].leaf).unwrap();
        assert_eq!(leaf.item.as_deref(), Some("Frillish"));
        assert_eq!(leaf.refs.location, Some(RegionId::from("route-1-loc-cell")));
        assert_eq!(leaf.refs.habitat, Some(RegionId::from("surf-route-1-hab-cell")));
        assert_eq!(leaf.refs.subcategory, Some(RegionId::from("surf-route-1-normal-sub-cell")));

        let flat_leaf = table.region(&table.rows()[0].leaf).unwrap();
        assert_eq!(flat_leaf.refs.subcategory, None);
    }

    #[test]
    fn test_empty_groups_are_skipped() {
        let mut habitats = HabitatMap::new();
        habitats.insert("Grass".into(), flat(&[]));
        habitats.insert("Cave".into(), tiers(&[("Normal", &[]), ("Dust", &["Drilbur"])]));
        let locations = vec![
            normalize("Route 4", &habitats, &SpecialData::new()),
            normalize("Empty", &HabitatMap::new(), &SpecialData::new()),
        ];
        let table = render_table("main", &locations);

        assert_eq!(table.rows().len(), 1);
        assert!(table.region(&RegionId::from("grass-route-4-hab-cell")).is_none());
        assert!(table.region(&RegionId::from("empty-loc-cell")).is_none());
        assert_eq!(extent(&table, "route-4-loc-cell"), Extent::new(1, 1));
        assert_eq!(table.rows()[0].cells.len(), 4);
    }
}
