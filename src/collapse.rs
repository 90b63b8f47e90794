use crate::completion::completion_badge;
use crate::index::NodeIndex;
use crate::surface::{Extent, Marker, RegionId, Surface, Tier};

/// Columns a collapsed header spans, per tier, so the single remaining row
/// still covers every column to its right.
pub const LOCATION_COLLAPSED_COLS: u16 = 4;
pub const HABITAT_COLLAPSED_COLS: u16 = 3;
pub const SUBCATEGORY_COLLAPSED_COLS: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollapseState {
    Expanded,
    Collapsed,
}

/// Extent of a collapsed header, `None` for leaves.
pub fn collapsed_extent(tier: Tier) -> Option<Extent> {
    let cols = match tier {
        Tier::Location => LOCATION_COLLAPSED_COLS,
        Tier::Habitat => HABITAT_COLLAPSED_COLS,
        Tier::SubCategory => SUBCATEGORY_COLLAPSED_COLS,
        Tier::Item => return None,
    };
    Some(Extent::new(1, cols))
}

pub fn state(index: &NodeIndex, region: &RegionId) -> Option<CollapseState> {
    index.node(region).map(|n| {
        if n.collapsed {
            CollapseState::Collapsed
        } else {
            CollapseState::Expanded
        }
    })
}

/// Collapse a header: shrink it to one row spanning the remaining columns,
/// hide everything below it, and badge locations with their completion.
/// Collapsing a collapsed node does nothing.
pub fn collapse<V: Surface>(index: &mut NodeIndex, surface: &mut V, region: &RegionId) {
    let Some(node) = index.node_mut(region) else {
        return;
    };
    let Some(extent) = collapsed_extent(node.tier) else {
        return;
    };
    if node.collapsed {
        return;
    }
    node.collapsed = true;
    let badge = match (node.tier, node.completion) {
        (Tier::Location, Some(fraction)) => Some(completion_badge(fraction)),
        _ => None,
    };

    surface.set_extent(region, extent);
    surface.set_marker(region, Marker::Collapsed, true);
    if badge.is_some() {
        surface.set_badge(region, badge);
    }
    for descendant in index.descendants(region) {
        surface.set_marker(&descendant, Marker::Hidden, true);
    }
}

/// Expand a header: restore its render-time extent and reveal the subtree,
/// leaving the contents of still-collapsed descendants hidden.
pub fn expand<V: Surface>(index: &mut NodeIndex, surface: &mut V, region: &RegionId) {
    let Some(node) = index.node_mut(region) else {
        return;
    };
    if !node.collapsed {
        return;
    }
    node.collapsed = false;
    let extent = node.original_extent;

    surface.set_extent(region, extent);
    surface.set_marker(region, Marker::Collapsed, false);
    surface.set_badge(region, None);
    reveal_children(index, surface, region);
}

fn reveal_children<V: Surface>(index: &NodeIndex, surface: &mut V, region: &RegionId) {
    for child in index.children(region) {
        surface.set_marker(&child, Marker::Hidden, false);
        let child_collapsed = index.node(&child).map(|n| n.collapsed).unwrap_or(false);
        if !child_collapsed {
            reveal_children(index, surface, &child);
        }
    }
}

/// Flip a header's state; returns the new state, `None` if not collapsible.
pub fn toggle<V: Surface>(index: &mut NodeIndex, surface: &mut V, region: &RegionId) -> Option<CollapseState> {
    let tier = index.node(region)?.tier;
    collapsed_extent(tier)?;
    match state(index, region)? {
        CollapseState::Expanded => collapse(index, surface, region),
        CollapseState::Collapsed => expand(index, surface, region),
    }
    state(index, region)
}

/// Collapse every location.
pub fn collapse_all<V: Surface>(index: &mut NodeIndex, surface: &mut V) {
    let locations: Vec<RegionId> = index
        .roots()
        .iter()
        .filter_map(|root| index.get_arena().get(*root).map(|n| n.get().region.clone()))
        .collect();
    for location in locations {
        collapse(index, surface, &location);
    }
}

/// Expand every location.
pub fn expand_all<V: Surface>(index: &mut NodeIndex, surface: &mut V) {
    let locations: Vec<RegionId> = index
        .roots()
        .iter()
        .filter_map(|root| index.get_arena().get(*root).map(|n| n.get().region.clone()))
        .collect();
    for location in locations {
        expand(index, surface, &location);
    }
}
