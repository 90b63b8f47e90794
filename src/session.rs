//! The page session: every table, its node index and the state store,
//! owned in one place and driven by the front ends.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::collapse::{self, CollapseState};
use crate::completion;
use crate::config::TrackerConfig;
use crate::error::Result;
use crate::index::NodeIndex;
use crate::loader::{normalize_dataset, LoadedDatasets};
use crate::render::render_table;
use crate::store::{self, StateStore};
use crate::surface::{RegionId, RegionTable, Tier};

/// One rendered table and the hierarchy rebuilt over it.
pub struct TrackerTable {
    pub view: RegionTable,
    pub index: NodeIndex,
}

impl TrackerTable {
    pub fn name(&self) -> &str {
        &self.view.name
    }
}

pub struct Session<S: StateStore> {
    store: S,
    tables: Vec<TrackerTable>,
}

impl<S: StateStore> Session<S> {
    /// Normalize, render and index every table, then apply the stored state
    /// and the initial collapse state.
    pub fn start(config: &TrackerConfig, store: S, datasets: &LoadedDatasets) -> Self {
        let tables = datasets
            .tables
            .iter()
            .map(|(name, dataset)| {
                let locations = normalize_dataset(dataset, &datasets.special);
                let view = render_table(name, &locations);
                let index = NodeIndex::build(&view);
                if index.is_empty() {
                    warn!(table = %name, "table has no items to track");
                }
                TrackerTable { view, index }
            })
            .collect();

        let mut session = Self { store, tables };
        session.apply_loaded_data();
        if config.collapsed_by_default {
            session.collapse_all();
        }
        info!(tables = session.tables.len(), "session started");
        session
    }

    pub fn tables(&self) -> &[TrackerTable] {
        &self.tables
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_collected(&self, name: &str) -> bool {
        self.store.get(name)
    }

    /// Set an item's collected flag and refresh every leaf sharing its name
    /// in every table. A store that fails to persist leaves both untouched.
    pub fn set_collected(&mut self, name: &str, value: bool) -> Result<()> {
        self.store.set(name, value)?;
        for table in &mut self.tables {
            let leaves: Vec<RegionId> = table.view.leaves_named(name).cloned().collect();
            if leaves.is_empty() {
                continue;
            }
            completion::sync_leaves(&mut table.index, &mut table.view, &self.store, &leaves);
        }
        debug!(name, value, "item toggled");
        Ok(())
    }

    /// Flip the checkbox of a leaf region. Returns the new value, `None` when
    /// the region is not a leaf of that table.
    pub fn toggle_item(&mut self, table: usize, region: &RegionId) -> Result<Option<bool>> {
        let Some(name) = self
            .tables
            .get(table)
            .and_then(|t| t.view.region(region))
            .filter(|r| r.tier == Tier::Item)
            .and_then(|r| r.item.clone())
        else {
            return Ok(None);
        };
        let value = !self.store.get(&name);
        self.set_collected(&name, value)?;
        Ok(Some(value))
    }

    pub fn toggle_collapse(&mut self, table: usize, region: &RegionId) -> Option<CollapseState> {
        let t = self.tables.get_mut(table)?;
        collapse::toggle(&mut t.index, &mut t.view, region)
    }

    pub fn collapse_all(&mut self) {
        for t in &mut self.tables {
            collapse::collapse_all(&mut t.index, &mut t.view);
        }
    }

    pub fn expand_all(&mut self) {
        for t in &mut self.tables {
            collapse::expand_all(&mut t.index, &mut t.view);
        }
    }

    /// Re-derive checkboxes and completion from the store.
    pub fn apply_loaded_data(&mut self) {
        for t in &mut self.tables {
            completion::refresh_all(&mut t.index, &mut t.view, &self.store);
        }
    }

    pub fn download(&self, path: &Path) -> Result<()> {
        store::download(&self.store, path)
    }

    /// Replace the store from a snapshot file and re-apply it. A file that
    /// fails to parse changes nothing.
    pub fn upload(&mut self, path: &Path) -> Result<usize> {
        let entries = store::upload(&mut self.store, path)?;
        self.apply_loaded_data();
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Dataset, HabitatMap, Item, SpecialData};
    use crate::store::{FileStore, MemoryStore, Snapshot};
    use crate::surface::Marker;

    fn datasets() -> LoadedDatasets {
        let mut route1 = HabitatMap::new();
        route1.insert(
            "Grass".into(),
            Category::FlatList(vec![Item::named("Patrat"), Item::named("Lillipup"), Item::named("Purrloin")]),
        );
        let mut main = Dataset::new();
        main.insert("Route 1".into(), route1);

        let mut route2 = HabitatMap::new();
        route2.insert("Grass".into(), Category::FlatList(vec![Item::named("Pidove")]));
        let mut postgame = Dataset::new();
        postgame.insert("Route 2".into(), route2);

        let mut special = SpecialData::new();
        special.insert(
            "Route 2 - Grotto".into(),
            Category::Categorized([("Common".to_string(), vec![Item::named("Patrat")])].into_iter().collect()),
        );

        LoadedDatasets {
            tables: vec![("main".into(), main), ("postgame".into(), postgame)],
            special,
        }
    }

    fn expanded_config() -> TrackerConfig {
        TrackerConfig {
            collapsed_by_default: false,
            ..TrackerConfig::default()
        }
    }

    fn id(s: &str) -> RegionId {
        RegionId::from(s)
    }

    #[test]
    fn test_starts_collapsed_by_default() {
        let session = Session::start(&TrackerConfig::default(), MemoryStore::default(), &datasets());
        let main = &session.tables()[0];
        assert!(main.view.region(&id("route-1-loc-cell")).unwrap().has(Marker::Collapsed));
        assert_eq!(main.view.visible_rows(), vec![0]);
    }

    #[test]
    fn test_shared_names_sync_across_tables() {
        let mut session = Session::start(&expanded_config(), MemoryStore::default(), &datasets());
        let leaf = session.tables()[0].view.rows()[0].leaf.clone();

        assert_eq!(session.toggle_item(0, &leaf).unwrap(), Some(true));
        assert!(session.is_collected("Patrat"));

        let postgame = &session.tables()[1];
        let grotto_leaf = postgame.view.leaves_named("Patrat").next().unwrap();
        assert!(postgame.view.region(grotto_leaf).unwrap().checked);
        let grotto = postgame.index.node(&id("hg-route-2-grotto-route-2-common-sub-cell")).unwrap();
        assert!(grotto.completed);
        let route2 = postgame.index.node(&id("route-2-loc-cell")).unwrap();
        assert_eq!(route2.completion, Some(0.5));
    }

    #[test]
    fn test_toggle_non_leaf_is_none() {
        let mut session = Session::start(&expanded_config(), MemoryStore::default(), &datasets());
        assert_eq!(session.toggle_item(0, &id("route-1-loc-cell")).unwrap(), None);
        assert_eq!(session.toggle_item(7, &id("route-1-loc-cell")).unwrap(), None);
        assert_eq!(
            session.toggle_collapse(0, &id("route-1-loc-cell")),
            Some(CollapseState::Collapsed)
        );
    }

    #[test]
    fn test_upload_of_download_reproduces_state() {
        let dir = tempfile::tempdir().unwrap();
        let export = dir.path().join("tracker-data.json");

        let mut session = Session::start(&expanded_config(), MemoryStore::default(), &datasets());
        session.set_collected("Patrat", true).unwrap();
        session.set_collected("Lillipup", true).unwrap();
        session.download(&export).unwrap();
        let before: Vec<RegionTable> = session.tables().iter().map(|t| t.view.clone()).collect();

        let mut fresh = Session::start(&expanded_config(), MemoryStore::default(), &datasets());
        assert_eq!(fresh.upload(&export).unwrap(), 2);
        let after: Vec<RegionTable> = fresh.tables().iter().map(|t| t.view.clone()).collect();

        assert_eq!(before, after);
        assert_eq!(fresh.store().load_all(), session.store().load_all());
    }

    #[test]
    fn test_upload_clears_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let export = dir.path().join("tracker-data.json");
        std::fs::write(&export, "{\"Pidove\": true}").unwrap();

        let store = MemoryStore::new(Snapshot::from([("Patrat".to_string(), true)]));
        let mut session = Session::start(&expanded_config(), store, &datasets());
        session.upload(&export).unwrap();

        assert!(!session.is_collected("Patrat"));
        let main = &session.tables()[0];
        assert!(!main.view.region(&main.view.rows()[0].leaf).unwrap().checked);
        let route2 = session.tables()[1].index.node(&id("route-2-loc-cell")).unwrap();
        assert_eq!(route2.completion, Some(0.5));
    }

    #[test]
    fn test_failed_save_keeps_checkbox_and_store_agreeing() {
        let dir = tempfile::tempdir().unwrap();
        let state_dir = dir.path().join("state");
        let store = FileStore::open(state_dir.join("state.json")).unwrap();
        let mut session = Session::start(&expanded_config(), store, &datasets());
        let leaf = session.tables()[0].view.rows()[0].leaf.clone();

        std::fs::remove_dir_all(&state_dir).unwrap();
        std::fs::write(&state_dir, "").unwrap();

        assert!(session.toggle_item(0, &leaf).is_err());
        assert!(!session.is_collected("Patrat"));
        assert!(!session.tables()[0].view.region(&leaf).unwrap().checked);

        // Once the directory is back the same click still collects.
        std::fs::remove_file(&state_dir).unwrap();
        assert_eq!(session.toggle_item(0, &leaf).unwrap(), Some(true));
        assert!(session.tables()[0].view.region(&leaf).unwrap().checked);
    }
}
