//! Parser for the plain-text wild encounter guide. Produces the JSON
//! documents the tracker loads: `main`, `postgame` and `hidden_grotto`.

mod columns;
mod encounters;
mod grotto;
mod sections;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Result, TrackerError};

pub use columns::decolumn;
pub use encounters::{parse_encounter, parse_wild_area_section, Encounter, WildCategory, WildData};
pub use grotto::{parse_hidden_grotto_section, GrottoData, GrottoEntry};
pub use sections::{split_sections, SectionKind, Sections};

/// Parse a whole guide and write one pretty-printed document per section.
/// Returns the written paths in section order.
pub fn convert(input: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
    let text = fs::read_to_string(input).map_err(|source| TrackerError::Read {
        path: input.to_path_buf(),
        source,
    })?;
    fs::create_dir_all(out_dir).map_err(|source| TrackerError::Write {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::new();
    for (kind, body) in split_sections(&text) {
        let flat = decolumn(&body);
        let json = match kind {
            SectionKind::HiddenGrotto => serde_json::to_string_pretty(&parse_hidden_grotto_section(&flat))?,
            SectionKind::Main | SectionKind::Postgame => {
                serde_json::to_string_pretty(&parse_wild_area_section(&flat))?
            }
        };

        let path = out_dir.join(format!("{}.json", kind.file_stem()));
        fs::write(&path, json).map_err(|source| TrackerError::Write {
            path: path.clone(),
            source,
        })?;
        info!(section = kind.file_stem(), path = %path.display(), "wrote dataset");
        written.push(path);
    }
    Ok(written)
}
