//! Rendering surface: addressable regions laid out as a row-merged table.
//!
//! The core never draws anything itself. It writes extents, marker tags,
//! badges and checkbox state through [`Surface`]; [`RegionTable`] is the
//! in-memory implementation both front ends read from.

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;

/// Stable identifier of a region, derived from its ancestor path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(String);

impl RegionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Hierarchy level of a region; also its table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    Location,
    Habitat,
    SubCategory,
    Item,
}

/// Number of columns in the merged table.
pub const TABLE_COLUMNS: u16 = 4;

impl Tier {
    pub fn column(self) -> u16 {
        match self {
            Tier::Location => 0,
            Tier::Habitat => 1,
            Tier::SubCategory => 2,
            Tier::Item => 3,
        }
    }

    pub fn from_column(column: u16) -> Option<Tier> {
        match column {
            0 => Some(Tier::Location),
            1 => Some(Tier::Habitat),
            2 => Some(Tier::SubCategory),
            3 => Some(Tier::Item),
            _ => None,
        }
    }
}

/// Rows and columns a region covers. `rows` is the merge-span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub rows: usize,
    pub cols: u16,
}

impl Extent {
    pub const fn new(rows: usize, cols: u16) -> Self {
        Self { rows, cols }
    }
}

/// CSS-like tags attached to regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Marker {
    AreaCell,
    HabitatCell,
    SubcatCell,
    ItemCell,
    NoSubcategory,
    Special,
    Clickable,
    Hidden,
    Collapsed,
    Completed,
}

/// Ids of the enclosing regions. Back-references only, no ownership.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackRefs {
    pub location: Option<RegionId>,
    pub habitat: Option<RegionId>,
    pub subcategory: Option<RegionId>,
}

impl BackRefs {
    /// Closest enclosing region.
    pub fn innermost(&self) -> Option<&RegionId> {
        self.subcategory
            .as_ref()
            .or(self.habitat.as_ref())
            .or(self.location.as_ref())
    }

    pub fn for_tier(&self, tier: Tier) -> Option<&RegionId> {
        match tier {
            Tier::Location => self.location.as_ref(),
            Tier::Habitat => self.habitat.as_ref(),
            Tier::SubCategory => self.subcategory.as_ref(),
            Tier::Item => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub id: RegionId,
    pub tier: Tier,
    pub label: String,
    pub detail: Option<String>,
    pub extent: Extent,
    pub markers: BTreeSet<Marker>,
    pub refs: BackRefs,
    /// Persistence key of a leaf's checkbox.
    pub item: Option<String>,
    pub checked: bool,
    /// Extra text next to the label, e.g. a completion percentage.
    pub badge: Option<String>,
}

impl Region {
    pub fn has(&self, marker: Marker) -> bool {
        self.markers.contains(&marker)
    }

    pub fn is_hidden(&self) -> bool {
        self.has(Marker::Hidden)
    }
}

/// One table row: the regions starting on it (outermost first) and the leaf
/// the row belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub cells: Vec<RegionId>,
    pub leaf: RegionId,
}

/// A visible region as seen from one row.
#[derive(Debug, Clone, Copy)]
pub struct VisibleCell<'a> {
    pub region: &'a Region,
    pub column: u16,
    pub span: u16,
    /// The region's first row; labels are drawn here.
    pub starts: bool,
}

impl VisibleCell<'_> {
    pub fn covers(&self, column: u16) -> bool {
        column >= self.column && column < self.column + self.span
    }
}

/// What the core needs from a display.
pub trait Surface {
    fn set_extent(&mut self, region: &RegionId, extent: Extent);
    fn set_marker(&mut self, region: &RegionId, marker: Marker, on: bool);
    fn set_badge(&mut self, region: &RegionId, badge: Option<String>);
    fn set_checked(&mut self, region: &RegionId, checked: bool);
}

/// Regions of one rendered table, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionTable {
    pub name: String,
    regions: IndexMap<RegionId, Region>,
    rows: Vec<Row>,
}

impl RegionTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            regions: IndexMap::new(),
            rows: Vec::new(),
        }
    }

    /// Add a region; returns false when the id was already taken.
    pub fn insert_region(&mut self, region: Region) -> bool {
        self.regions.insert(region.id.clone(), region).is_none()
    }

    pub fn push_row(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub fn region(&self, id: &RegionId) -> Option<&Region> {
        self.regions.get(id)
    }

    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn is_hidden(&self, id: &RegionId) -> bool {
        self.region(id).map(Region::is_hidden).unwrap_or(true)
    }

    /// Indices of rows with at least one visible cell.
    pub fn visible_rows(&self) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.cells.iter().any(|cell| !self.is_hidden(cell)))
            .map(|(i, _)| i)
            .collect()
    }

    /// Region of the given tier covering a row, if that tier exists there.
    pub fn owner_at(&self, row: usize, tier: Tier) -> Option<&Region> {
        let leaf = self.region(&self.rows.get(row)?.leaf)?;
        match tier {
            Tier::Item => Some(leaf),
            _ => self.region(leaf.refs.for_tier(tier)?),
        }
    }

    /// Leaf regions whose checkbox is bound to `name`.
    pub fn leaves_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a RegionId> + 'a {
        self.regions
            .values()
            .filter(move |region| region.item.as_deref() == Some(name))
            .map(|region| &region.id)
    }

    /// Visible regions covering a row, left to right, with the columns each
    /// one spans. Columns nothing covers are skipped.
    pub fn visible_cells(&self, row: usize) -> Vec<VisibleCell<'_>> {
        let starts_on_row = self.rows.get(row).map(|r| r.cells.as_slice()).unwrap_or(&[]);
        let mut cells = Vec::new();
        let mut column = 0;
        while column < TABLE_COLUMNS {
            let owner = Tier::from_column(column)
                .and_then(|tier| self.owner_at(row, tier))
                .filter(|region| !region.is_hidden());
            match owner {
                Some(region) => {
                    let span = region.extent.cols.max(1);
                    cells.push(VisibleCell {
                        region,
                        column,
                        span,
                        starts: starts_on_row.contains(&region.id),
                    });
                    column += span;
                }
                None => column += 1,
            }
        }
        cells
    }

    fn region_mut(&mut self, id: &RegionId) -> Option<&mut Region> {
        self.regions.get_mut(id)
    }
}

impl Surface for RegionTable {
    fn set_extent(&mut self, region: &RegionId, extent: Extent) {
        if let Some(r) = self.region_mut(region) {
            r.extent = extent;
        }
    }

    fn set_marker(&mut self, region: &RegionId, marker: Marker, on: bool) {
        if let Some(r) = self.region_mut(region) {
            if on {
                r.markers.insert(marker);
            } else {
                r.markers.remove(&marker);
            }
        }
    }

    fn set_badge(&mut self, region: &RegionId, badge: Option<String>) {
        if let Some(r) = self.region_mut(region) {
            r.badge = badge;
        }
    }

    fn set_checked(&mut self, region: &RegionId, checked: bool) {
        if let Some(r) = self.region_mut(region) {
            r.checked = checked;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(id: &str, name: &str) -> Region {
        Region {
            id: RegionId::from(id),
            tier: Tier::Item,
            label: name.to_string(),
            detail: None,
            extent: Extent::new(1, 1),
            markers: BTreeSet::from([Marker::ItemCell]),
            refs: BackRefs::default(),
            item: Some(name.to_string()),
            checked: false,
            badge: None,
        }
    }

    #[test]
    fn test_surface_writes_and_unknown_ids() {
        let mut table = RegionTable::new("main");
        assert!(table.insert_region(leaf("a", "Patrat")));
        assert!(!table.insert_region(leaf("a", "Patrat")));

        let id = RegionId::from("a");
        table.set_checked(&id, true);
        table.set_marker(&id, Marker::Hidden, true);
        table.set_badge(&RegionId::from("missing"), Some("x".into()));

        let region = table.region(&id).unwrap();
        assert!(region.checked);
        assert!(region.is_hidden());
        assert!(table.is_hidden(&RegionId::from("missing")));
    }

    #[test]
    fn test_visible_rows_skip_fully_hidden() {
        let mut table = RegionTable::new("main");
        table.insert_region(leaf("a", "Patrat"));
        table.insert_region(leaf("b", "Lillipup"));
        table.push_row(Row { cells: vec!["a".into()], leaf: "a".into() });
        table.push_row(Row { cells: vec!["b".into()], leaf: "b".into() });

        table.set_marker(&RegionId::from("a"), Marker::Hidden, true);
        assert_eq!(table.visible_rows(), vec![1]);
        assert_eq!(table.leaves_named("Lillipup").count(), 1);
    }

    #[test]
    fn test_visible_cells_follow_extents() {
        let mut table = RegionTable::new("main");
        let header = |id: &str, tier: Tier, extent: Extent, refs: BackRefs| Region {
            id: RegionId::from(id),
            tier,
            label: id.to_string(),
            detail: None,
            extent,
            markers: BTreeSet::new(),
            refs,
            item: None,
            checked: false,
            badge: None,
        };
        table.insert_region(header("loc", Tier::Location, Extent::new(2, 1), BackRefs::default()));
        table.insert_region(header(
            "hab",
            Tier::Habitat,
            Extent::new(2, 2),
            BackRefs { location: Some("loc".into()), ..BackRefs::default() },
        ));
        let refs = BackRefs {
            location: Some("loc".into()),
            habitat: Some("hab".into()),
            subcategory: None,
        };
        for id in ["a", "b"] {
            let mut item = leaf(id, id);
            item.refs = refs.clone();
            table.insert_region(item);
        }
        table.push_row(Row { cells: vec!["loc".into(), "hab".into(), "a".into()], leaf: "a".into() });
        table.push_row(Row { cells: vec!["b".into()], leaf: "b".into() });

        let first: Vec<_> = table.visible_cells(0).iter().map(|c| (c.column, c.span, c.starts)).collect();
        assert_eq!(first, vec![(0, 1, true), (1, 2, true), (3, 1, true)]);
        let second: Vec<_> = table.visible_cells(1).iter().map(|c| (c.column, c.starts)).collect();
        assert_eq!(second, vec![(0, false), (1, false), (3, true)]);

        // Collapsed location: one cell across the whole row.
        table.set_extent(&"loc".into(), Extent::new(1, TABLE_COLUMNS));
        for id in ["hab", "a", "b"] {
            table.set_marker(&id.into(), Marker::Hidden, true);
        }
        let cells = table.visible_cells(0);
        assert_eq!(cells.len(), 1);
        assert!(cells[0].covers(3));
        assert_eq!(table.visible_rows(), vec![0]);
    }
}
