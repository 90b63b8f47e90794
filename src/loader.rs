use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use rayon::prelude::*;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use crate::model::{Dataset, HabitatMap, SpecialData};

/// Separator between a grouping's base location and its qualifier.
const PREFIX_SEPARATOR: char = '-';

/// Curated location -> special grouping pairs the prefix rule cannot find.
pub const SPECIAL_OVERRIDES: &[(&str, &str)] = &[("Pinwheel Forest (Inside)", "Pinwheel Forest")];

/// A location with its matched special groupings and completion universe.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedLocation {
    pub name: String,
    pub habitats: HabitatMap,
    pub specials: SpecialData,
    /// Distinct item names: the persisted keys this location completes over.
    pub universe: BTreeSet<String>,
}

impl NormalizedLocation {
    pub fn leaf_count(&self) -> usize {
        self.habitats
            .values()
            .chain(self.specials.values())
            .map(|category| category.leaf_count())
            .sum()
    }
}

/// Every document of a session, all present before anything renders.
#[derive(Debug, Clone, Default)]
pub struct LoadedDatasets {
    pub tables: Vec<(String, Dataset)>,
    pub special: SpecialData,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|source| TrackerError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| TrackerError::Dataset {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_dataset(path: &Path) -> Result<Dataset> {
    read_json(path)
}

pub fn read_special(path: &Path) -> Result<SpecialData> {
    read_json(path)
}

/// Read every configured table and the special document concurrently and
/// join them. Any failure fails the whole load.
pub fn load_datasets(config: &TrackerConfig) -> Result<LoadedDatasets> {
    config.validate()?;

    let (tables, special) = rayon::join(
        || {
            config
                .tables
                .par_iter()
                .filter(|table| !table.trim().is_empty())
                .map(|table| {
                    read_dataset(&config.table_path(table)).map(|dataset| (table.clone(), dataset))
                })
                .collect::<Result<Vec<_>>>()
        },
        || match config.special_path() {
            Some(path) => read_special(&path),
            None => Ok(SpecialData::new()),
        },
    );

    let loaded = LoadedDatasets {
        tables: tables?,
        special: special?,
    };
    info!(
        tables = loaded.tables.len(),
        special_groupings = loaded.special.len(),
        "datasets loaded"
    );
    Ok(loaded)
}

fn base_name(name: &str) -> &str {
    name.split(PREFIX_SEPARATOR).next().unwrap_or(name).trim()
}

/// Whether a special grouping belongs to a location: an override pair, or the
/// same text before the first separator.
pub fn matches_special(location: &str, grouping: &str) -> bool {
    let overridden = SPECIAL_OVERRIDES
        .iter()
        .any(|(loc, group)| *loc == location && *group == grouping);
    overridden || base_name(grouping) == base_name(location)
}

pub fn normalize(location: &str, habitats: &HabitatMap, special: &SpecialData) -> NormalizedLocation {
    let specials: SpecialData = special
        .iter()
        .filter(|(grouping, _)| matches_special(location, grouping))
        .map(|(grouping, category)| (grouping.clone(), category.clone()))
        .collect();

    let universe = habitats
        .values()
        .chain(specials.values())
        .flat_map(|category| category.items())
        .map(|item| item.name.clone())
        .collect();

    debug!(location, specials = specials.len(), "normalized location");
    NormalizedLocation {
        name: location.to_string(),
        habitats: habitats.clone(),
        specials,
        universe,
    }
}

pub fn normalize_dataset(dataset: &Dataset, special: &SpecialData) -> Vec<NormalizedLocation> {
    dataset
        .iter()
        .map(|(location, habitats)| normalize(location, habitats, special))
        .collect()
}
