//! Test discovery
//!
//! Builds the ordered list of test units from command-line references or a
//! manifest file, and resolves `--replay FILE[:LANE]` arguments.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::models::TestUnit;

/// Manifest entry: either `"Class::name"` or `{class, name}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ManifestEntry {
    Reference(String),
    Unit { class: String, name: String },
}

/// Top level of a manifest: a bare list, or a list under `tests`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Manifest {
    List(Vec<ManifestEntry>),
    Document { tests: Vec<ManifestEntry> },
}

/// Units from `Class::name` references, numbered in the order given.
pub fn from_names<S: AsRef<str>>(names: &[S]) -> Vec<TestUnit> {
    names
        .iter()
        .map(AsRef::as_ref)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .enumerate()
        .map(|(i, name)| TestUnit::parse(i as u64 + 1, name))
        .collect()
}

/// Units listed in a YAML or JSON manifest.
pub fn from_manifest(path: impl AsRef<Path>) -> Result<Vec<TestUnit>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;

    let manifest: Manifest = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON manifest: {}", path.display()))?,
        _ => serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML manifest: {}", path.display()))?,
    };

    let entries = match manifest {
        Manifest::List(entries) | Manifest::Document { tests: entries } => entries,
    };

    let units: Vec<TestUnit> = entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let id = i as u64 + 1;
            match entry {
                ManifestEntry::Reference(reference) => TestUnit::parse(id, reference.trim()),
                ManifestEntry::Unit { class, name } => TestUnit::new(id, class, name),
            }
        })
        .collect();

    debug!("Located {} test(s) in {}", units.len(), path.display());
    Ok(units)
}

/// Split a `FILE[:LANE]` replay argument. The lane label defaults to the
/// file stem, so `logs/WorkerC.log` replays as `WorkerC`.
pub fn parse_replay_spec(spec: &str) -> Result<(PathBuf, String)> {
    let (file, label) = match spec.rsplit_once(':') {
        Some((file, label)) if !label.is_empty() && !label.contains('/') => {
            (file, Some(label.to_string()))
        }
        _ => (spec, None),
    };

    if file.is_empty() {
        bail!("Replay must be in the form FILE[:LANE], got '{}'", spec);
    }

    let path = PathBuf::from(file);
    let label = match label {
        Some(label) => label,
        None => path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string)
            .with_context(|| format!("Cannot derive a lane label from '{}'", spec))?,
    };
    Ok((path, label))
}
