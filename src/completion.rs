use std::collections::HashSet;

use crate::index::NodeIndex;
use crate::store::StateStore;
use crate::surface::{Marker, RegionId, Surface, Tier};

/// Rounded percentage text shown next to a collapsed location.
pub fn completion_badge(fraction: f32) -> String {
    format!("{}%", (fraction * 100.0).round() as u32)
}

/// Recompute one non-leaf node from the store: completed iff every item
/// below is collected. Locations also get their collected share of the
/// distinct names below.
fn recompute<S: StateStore, V: Surface>(index: &mut NodeIndex, surface: &mut V, store: &S, region: &RegionId) {
    let Some(tier) = index.node(region).map(|n| n.tier) else {
        return;
    };
    if tier == Tier::Item {
        return;
    }

    let completed = index.item_names(region).iter().all(|name| store.get(name));
    let completion = (tier == Tier::Location).then(|| {
        let universe = index.universe(region);
        if universe.is_empty() {
            1.0
        } else {
            let collected = universe.iter().filter(|name| store.get(name)).count();
            collected as f32 / universe.len() as f32
        }
    });

    let Some(node) = index.node_mut(region) else {
        return;
    };
    node.completed = completed;
    node.completion = completion;
    let collapsed = node.collapsed;

    surface.set_marker(region, Marker::Completed, completed);
    if let (Some(fraction), true) = (completion, collapsed) {
        surface.set_badge(region, Some(completion_badge(fraction)));
    }
}

/// Re-aggregate every ancestor of a toggled leaf, innermost first. Unknown
/// ids are a no-op.
pub fn on_item_toggled<S: StateStore, V: Surface>(
    index: &mut NodeIndex,
    surface: &mut V,
    store: &S,
    item_region: &RegionId,
) {
    for ancestor in index.ancestors(item_region) {
        recompute(index, surface, store, &ancestor);
    }
}

/// Push stored checkbox state onto a batch of leaves and re-aggregate the
/// union of their ancestors, each ancestor once.
pub fn sync_leaves<S: StateStore, V: Surface>(
    index: &mut NodeIndex,
    surface: &mut V,
    store: &S,
    leaves: &[RegionId],
) {
    let mut seen = HashSet::new();
    let mut ancestors = Vec::new();
    for leaf in leaves {
        let Some(name) = index.node(leaf).and_then(|n| n.item.clone()) else {
            continue;
        };
        let checked = store.get(&name);
        surface.set_checked(leaf, checked);
        surface.set_marker(leaf, Marker::Completed, checked);

        for ancestor in index.ancestors(leaf) {
            if seen.insert(ancestor.clone()) {
                ancestors.push(ancestor);
            }
        }
    }
    for ancestor in ancestors {
        recompute(index, surface, store, &ancestor);
    }
}

/// Re-derive every checkbox and aggregate from the store.
pub fn refresh_all<S: StateStore, V: Surface>(index: &mut NodeIndex, surface: &mut V, store: &S) {
    let leaves: Vec<RegionId> = index
        .all_regions()
        .into_iter()
        .filter(|region| index.node(region).map(|n| n.tier == Tier::Item).unwrap_or(false))
        .collect();
    sync_leaves(index, surface, store, &leaves);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::normalize;
    use crate::model::{Category, HabitatMap, Item, SpecialData};
    use crate::render::render_table;
    use crate::store::MemoryStore;
    use crate::surface::RegionTable;

    fn route_one() -> (RegionTable, NodeIndex) {
        let mut habitats = HabitatMap::new();
        habitats.insert(
            "Grass".into(),
            Category::FlatList(vec![Item::named("Patrat"), Item::named("Lillipup"), Item::named("Purrloin")]),
        );
        let table = render_table("main", &[normalize("Route 1", &habitats, &SpecialData::new())]);
        let index = NodeIndex::build(&table);
        (table, index)
    }

    fn leaf(table: &RegionTable, name: &str) -> RegionId {
        table.leaves_named(name).next().unwrap().clone()
    }

    const LOC: &str = "route-1-loc-cell";
    const GRASS: &str = "grass-route-1-hab-cell";

    #[test]
    fn test_two_of_three_collected() {
        let (mut table, mut index) = route_one();
        let mut store = MemoryStore::default();

        for name in ["Patrat", "Lillipup"] {
            store.set(name, true).unwrap();
            let id = leaf(&table, name);
            on_item_toggled(&mut index, &mut table, &store, &id);
        }

        let grass = index.node(&RegionId::from(GRASS)).unwrap();
        assert!(!grass.completed);
        let loc = index.node(&RegionId::from(LOC)).unwrap();
        assert!(!loc.completed);
        assert_eq!(completion_badge(loc.completion.unwrap()), "67%");
    }

    #[test]
    fn test_completion_flips_back() {
        let (mut table, mut index) = route_one();
        let mut store = MemoryStore::default();
        for name in ["Patrat", "Lillipup", "Purrloin"] {
            store.set(name, true).unwrap();
        }
        refresh_all(&mut index, &mut table, &store);

        assert!(index.node(&RegionId::from(GRASS)).unwrap().completed);
        assert!(index.node(&RegionId::from(LOC)).unwrap().completed);
        assert!(table.region(&RegionId::from(LOC)).unwrap().has(Marker::Completed));
        assert_eq!(index.node(&RegionId::from(LOC)).unwrap().completion, Some(1.0));

        store.set("Lillipup", false).unwrap();
        let id = leaf(&table, "Lillipup");
        sync_leaves(&mut index, &mut table, &store, &[id.clone()]);

        assert!(!table.region(&id).unwrap().checked);
        assert!(!index.node(&RegionId::from(GRASS)).unwrap().completed);
        assert!(!index.node(&RegionId::from(LOC)).unwrap().completed);
        assert!(!table.region(&RegionId::from(LOC)).unwrap().has(Marker::Completed));
    }

    #[test]
    fn test_percentage_uses_distinct_names() {
        let mut habitats = HabitatMap::new();
        habitats.insert("Grass".into(), Category::FlatList(vec![Item::named("Patrat"), Item::named("Audino")]));
        habitats.insert("Dust".into(), Category::FlatList(vec![Item::named("Audino")]));
        let mut table = render_table("main", &[normalize("Route 3", &habitats, &SpecialData::new())]);
        let mut index = NodeIndex::build(&table);
        let mut store = MemoryStore::default();
        store.set("Audino", true).unwrap();
        refresh_all(&mut index, &mut table, &store);

        let loc = index.node(&RegionId::from("route-3-loc-cell")).unwrap();
        assert_eq!(loc.completion, Some(0.5));
        assert!(index.node(&RegionId::from("dust-route-3-hab-cell")).unwrap().completed);
    }

    #[test]
    fn test_unknown_region_is_noop() {
        let (mut table, mut index) = route_one();
        let store = MemoryStore::default();
        on_item_toggled(&mut index, &mut table, &store, &RegionId::from("missing"));
        sync_leaves(&mut index, &mut table, &store, &[RegionId::from("missing")]);
        assert!(!index.node(&RegionId::from(LOC)).unwrap().completed);
    }
}
