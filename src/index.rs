use indextree::{Arena, NodeId};
use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use crate::surface::{Extent, RegionId, RegionTable, Tier};

/// Runtime node of the tracker hierarchy.
#[derive(Debug, Clone)]
pub struct HierarchyNode {
    pub tier: Tier,
    pub region: RegionId,
    /// Persistence key, leaves only.
    pub item: Option<String>,
    pub collapsed: bool,
    /// Extent assigned at render time, restored on expand.
    pub original_extent: Extent,
    /// Every item below is collected.
    pub completed: bool,
    /// Collected share of the distinct names below, locations only.
    pub completion: Option<f32>,
}

/// Arena tree rebuilt from the rendered regions' back-references.
pub struct NodeIndex {
    arena: Arena<HierarchyNode>,
    roots: Vec<NodeId>,
    region_to_node: HashMap<RegionId, NodeId>,
    parents: HashMap<RegionId, RegionId>,
}

impl NodeIndex {
    /// Reconstruct the hierarchy from a rendered table. Regions pointing at
    /// an unknown parent are skipped.
    pub fn build(table: &RegionTable) -> Self {
        let mut index = Self {
            arena: Arena::new(),
            roots: Vec::new(),
            region_to_node: HashMap::new(),
            parents: HashMap::new(),
        };

        // Group regions under their innermost back-reference first, so each
        // level is a lookup rather than a rescan.
        let mut children_of: HashMap<&RegionId, Vec<&RegionId>> = HashMap::new();
        let mut locations = Vec::new();
        for region in table.regions() {
            let parent = match region.tier {
                Tier::Location => None,
                Tier::Habitat => region.refs.location.as_ref(),
                Tier::SubCategory => region.refs.habitat.as_ref(),
                Tier::Item => region.refs.innermost(),
            };
            match (region.tier, parent) {
                (Tier::Location, _) => locations.push(&region.id),
                (_, Some(parent)) => children_of.entry(parent).or_default().push(&region.id),
                (_, None) => warn!(region = %region.id, "region has no back-reference, skipped"),
            }
        }

        for location in locations {
            if let Some(root) = index.attach(table, &children_of, location, None) {
                index.roots.push(root);
            }
        }

        let orphans = table.regions().count() - index.region_to_node.len();
        if orphans > 0 {
            warn!(table = %table.name, orphans, "regions without a reachable parent were skipped");
        }
        debug!(table = %table.name, nodes = index.region_to_node.len(), "node index built");
        index
    }

    fn attach(
        &mut self,
        table: &RegionTable,
        children_of: &HashMap<&RegionId, Vec<&RegionId>>,
        id: &RegionId,
        parent: Option<NodeId>,
    ) -> Option<NodeId> {
        let region = table.region(id)?;
        let node_id = self.arena.new_node(HierarchyNode {
            tier: region.tier,
            region: id.clone(),
            item: region.item.clone(),
            collapsed: false,
            original_extent: region.extent,
            completed: false,
            completion: None,
        });

        if let Some(parent_id) = parent {
            parent_id.append(node_id, &mut self.arena);
            if let Some(parent_node) = self.arena.get(parent_id) {
                self.parents.insert(id.clone(), parent_node.get().region.clone());
            }
        }
        self.region_to_node.insert(id.clone(), node_id);

        if let Some(children) = children_of.get(id) {
            for child in children {
                self.attach(table, children_of, child, Some(node_id));
            }
        }
        Some(node_id)
    }

    pub fn get_arena(&self) -> &Arena<HierarchyNode> {
        &self.arena
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node_id(&self, region: &RegionId) -> Option<NodeId> {
        self.region_to_node.get(region).copied()
    }

    pub fn node(&self, region: &RegionId) -> Option<&HierarchyNode> {
        let id = self.node_id(region)?;
        self.arena.get(id).map(|n| n.get())
    }

    pub fn node_mut(&mut self, region: &RegionId) -> Option<&mut HierarchyNode> {
        let id = self.node_id(region)?;
        self.arena.get_mut(id).map(|n| n.get_mut())
    }

    pub fn parent(&self, region: &RegionId) -> Option<&RegionId> {
        self.parents.get(region)
    }

    /// Ancestors of a region, innermost first, excluding the region itself.
    pub fn ancestors(&self, region: &RegionId) -> Vec<RegionId> {
        let mut chain = Vec::new();
        let mut current = self.parent(region);
        while let Some(parent) = current {
            chain.push(parent.clone());
            current = self.parent(parent);
        }
        chain
    }

    pub fn children(&self, region: &RegionId) -> Vec<RegionId> {
        let Some(id) = self.node_id(region) else {
            return Vec::new();
        };
        id.children(&self.arena)
            .filter_map(|child| self.arena.get(child).map(|n| n.get().region.clone()))
            .collect()
    }

    /// Every region below `region`, depth first, excluding itself.
    pub fn descendants(&self, region: &RegionId) -> Vec<RegionId> {
        let Some(id) = self.node_id(region) else {
            return Vec::new();
        };
        id.descendants(&self.arena)
            .skip(1)
            .filter_map(|d| self.arena.get(d).map(|n| n.get().region.clone()))
            .collect()
    }

    /// Item names reachable below `region` (the region itself if a leaf).
    pub fn item_names(&self, region: &RegionId) -> Vec<&str> {
        let Some(id) = self.node_id(region) else {
            return Vec::new();
        };
        id.descendants(&self.arena)
            .filter_map(|d| self.arena.get(d))
            .filter_map(|n| n.get().item.as_deref())
            .collect()
    }

    /// Distinct item names below `region`.
    pub fn universe(&self, region: &RegionId) -> BTreeSet<&str> {
        self.item_names(region).into_iter().collect()
    }

    /// Every region in the index, roots first then depth first.
    pub fn all_regions(&self) -> Vec<RegionId> {
        self.roots
            .iter()
            .flat_map(|root| root.descendants(&self.arena))
            .filter_map(|d| self.arena.get(d).map(|n| n.get().region.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.region_to_node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.region_to_node.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::normalize;
    use crate::model::{Category, HabitatMap, Item, SpecialData};
    use crate::render::render_table;
    use crate::surface::{BackRefs, Marker, Region};

    fn table() -> RegionTable {
        let mut habitats = HabitatMap::new();
        habitats.insert(
            "Grass".into(),
            Category::FlatList(vec![Item::named("Patrat"), Item::named("Lillipup")]),
        );
        habitats.insert(
            "Surf".into(),
            Category::Categorized(
                [
                    ("Normal".to_string(), vec![Item::named("Basculin")]),
                    ("Dark Spot".to_string(), vec![Item::named("Patrat")]),
                ]
                .into_iter()
                .collect(),
            ),
        );
        render_table("main", &[normalize("Route 1", &habitats, &SpecialData::new())])
    }

    #[test]
    fn test_tree_basic() {
        let index = NodeIndex::build(&table());
        assert_eq!(index.roots().len(), 1);
        assert_eq!(index.len(), 9);

        let loc = RegionId::from("route-1-loc-cell");
        assert_eq!(
            index.children(&loc),
            vec![RegionId::from("grass-route-1-hab-cell"), RegionId::from("surf-route-1-hab-cell")]
        );
        assert_eq!(index.children(&RegionId::from("grass-route-1-hab-cell")).len(), 2);
        assert_eq!(index.children(&RegionId::from("surf-route-1-hab-cell")).len(), 2);
        assert_eq!(index.parent(&loc), None);
    }

    #[test]
    fn test_ancestors_innermost_first() {
        let index = NodeIndex::build(&table());
        let leaf = RegionId::from("surf-route-1-dark-spot-sub-0-patrat-item");
        assert_eq!(
            index.ancestors(&leaf),
            vec![
                RegionId::from("surf-route-1-dark-spot-sub-cell"),
                RegionId::from("surf-route-1-hab-cell"),
                RegionId::from("route-1-loc-cell"),
            ]
        );
        assert!(index.ancestors(&RegionId::from("nope")).is_empty());
    }

    #[test]
    fn test_universe_deduplicates() {
        let index = NodeIndex::build(&table());
        let loc = RegionId::from("route-1-loc-cell");
        assert_eq!(index.item_names(&loc).len(), 4);
        assert_eq!(index.universe(&loc).into_iter().collect::<Vec<_>>(), vec!["Basculin", "Lillipup", "Patrat"]);
    }

    #[test]
    fn test_orphan_region_is_skipped() {
        let mut table = table();
        table.insert_region(Region {
            id: RegionId::from("stray-item"),
            tier: Tier::Item,
            label: "Stray".into(),
            detail: None,
            extent: Extent::new(1, 1),
            markers: [Marker::ItemCell].into_iter().collect(),
            refs: BackRefs {
                location: Some(RegionId::from("unknown-loc-cell")),
                ..BackRefs::default()
            },
            item: Some("Stray".into()),
            checked: false,
            badge: None,
        });

        let index = NodeIndex::build(&table);
        assert_eq!(index.len(), 9);
        assert!(index.node(&RegionId::from("stray-item")).is_none());
    }
}
