//! JSON inputs for plan compilation.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use inspection_core::{PhotoOffset, StructurePoint};
use serde::de::DeserializeOwned;

pub fn load_structures(path: &Path) -> Result<Vec<StructurePoint>> {
    read_json(path).context("Failed to load structures")
}

pub fn load_offsets(path: &Path) -> Result<Vec<PhotoOffset>> {
    read_json(path).context("Failed to load photo offsets")
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}
