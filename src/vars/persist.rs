//! Saved-variable snapshot on disk.
//!
//! The snapshot is a JSON object mapping each variable name to its saved
//! `value` and/or a `values` object keyed by the value of the variable its
//! default refers to:
//!
//! ```json
//! {
//!   "app_name": { "value": "myapp" },
//!   "db_name": { "values": { "myapp": "myapp_production" } }
//! }
//! ```
use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::value::VarValue;
use crate::error::VarError;

/// What the previous run saved for one variable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavedVar {
    /// Plain saved value.
    pub value: Option<VarValue>,
    /// Saved values keyed by the referenced variable's value at save time.
    pub values: BTreeMap<String, VarValue>,
}

/// The whole snapshot, keyed by variable name.
pub type SavedVars = BTreeMap<String, SavedVar>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct SavedVarRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    values: BTreeMap<String, serde_json::Value>,
}

impl From<&SavedVar> for SavedVarRecord {
    fn from(var: &SavedVar) -> Self {
        Self {
            value: var.value.as_ref().and_then(VarValue::to_json),
            values: var
                .values
                .iter()
                .filter_map(|(k, v)| v.to_json().map(|v| (k.clone(), v)))
                .collect(),
        }
    }
}

impl From<SavedVarRecord> for SavedVar {
    fn from(record: SavedVarRecord) -> Self {
        Self {
            value: record.value.as_ref().and_then(VarValue::from_json),
            values: record
                .values
                .iter()
                .filter_map(|(k, v)| VarValue::from_json(v).map(|v| (k.clone(), v)))
                .collect(),
        }
    }
}

/// Load the snapshot at `path`; a missing file is an empty snapshot.
///
/// # Errors
///
/// Returns [`VarError::Persist`] if the file exists but cannot be read or
/// is not a valid snapshot.
pub fn load(path: &Path) -> Result<SavedVars, VarError> {
    let persist_err = |source: Box<dyn std::error::Error + Send + Sync>| VarError::Persist {
        path: path.to_path_buf(),
        source,
    };
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("no saved vars at {}", path.display());
            return Ok(SavedVars::new());
        }
        Err(e) => return Err(persist_err(e.into())),
    };
    let records: BTreeMap<String, SavedVarRecord> =
        serde_json::from_str(&content).map_err(|e| persist_err(e.into()))?;
    Ok(records
        .into_iter()
        .map(|(name, record)| (name, SavedVar::from(record)))
        .collect())
}

/// Write `vars` to `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`VarError::Persist`] if the file cannot be written.
pub fn save(path: &Path, vars: &SavedVars) -> Result<(), VarError> {
    let persist_err = |source: Box<dyn std::error::Error + Send + Sync>| VarError::Persist {
        path: path.to_path_buf(),
        source,
    };
    let records: BTreeMap<&str, SavedVarRecord> = vars
        .iter()
        .map(|(name, var)| (name.as_str(), SavedVarRecord::from(var)))
        .collect();
    let json = serde_json::to_string_pretty(&records).map_err(|e| persist_err(e.into()))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| persist_err(e.into()))?;
    }
    std::fs::write(path, json + "\n").map_err(|e| persist_err(e.into()))?;
    tracing::debug!("saved {} vars to {}", vars.len(), path.display());
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load(&tmp.path().join("saved.json")).unwrap().is_empty());
    }

    #[test]
    fn invalid_json_is_persist_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("saved.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load(&path), Err(VarError::Persist { .. })));
    }

    #[test]
    fn save_then_load_preserves_values_and_reference_map() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("vars").join("saved.json");
        let vars = SavedVars::from([
            (
                "app_name".to_string(),
                SavedVar {
                    value: Some(VarValue::from("myapp")),
                    values: BTreeMap::new(),
                },
            ),
            (
                "db_name".to_string(),
                SavedVar {
                    value: None,
                    values: BTreeMap::from([(
                        "myapp".to_string(),
                        VarValue::from("myapp_production"),
                    )]),
                },
            ),
        ]);
        save(&path, &vars).unwrap();
        assert_eq!(load(&path).unwrap(), vars);
    }

    #[test]
    fn file_layout_omits_empty_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("saved.json");
        let vars = SavedVars::from([(
            "port".to_string(),
            SavedVar {
                value: Some(VarValue::Integer(5432)),
                values: BTreeMap::new(),
            },
        )]);
        save(&path, &vars).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({"port": {"value": 5432}}));
    }

    #[test]
    fn arrays_in_snapshot_are_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("saved.json");
        std::fs::write(&path, r#"{"hosts": {"value": ["a", "b"]}, "x": {"value": true}}"#)
            .unwrap();
        let vars = load(&path).unwrap();
        assert_eq!(vars["hosts"].value, None);
        assert_eq!(vars["x"].value, Some(VarValue::Bool(true)));
    }
}
