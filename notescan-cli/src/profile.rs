//! Saving and loading analysis profiles and note lists as JSON.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use notescan_core::{AnalysisConfig, NoteEvent};

/// Saves an analysis profile to a JSON file.
pub fn save_profile(config: &AnalysisConfig, path: &Path) -> Result<()> {
    let json_string = serde_json::to_string_pretty(config)?;
    let mut file =
        File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    file.write_all(json_string.as_bytes())?;
    Ok(())
}

/// Loads an analysis profile from a JSON file.
///
/// Fields missing from the file keep their default values.
pub fn load_profile(path: &Path) -> Result<AnalysisConfig> {
    let mut file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut data = String::new();
    file.read_to_string(&mut data)?;
    let config: AnalysisConfig = serde_json::from_str(&data)
        .with_context(|| format!("{} is not a valid analysis profile", path.display()))?;
    Ok(config)
}

/// Saves quantized notes to a JSON file.
pub fn save_notes(notes: &[NoteEvent], path: &Path) -> Result<()> {
    let json_string = serde_json::to_string_pretty(notes)?;
    let mut file =
        File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    file.write_all(json_string.as_bytes())?;
    Ok(())
}
