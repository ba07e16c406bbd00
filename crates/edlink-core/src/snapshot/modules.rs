//! `ModulesInfo.json` power/priority snapshot.
//!
//! The game rewrites `ModulesInfo.json` whenever module power state changes.
//! edlink reduces it to an ordered list of `{Slot, Power, Priority}` entries.

use serde::{Deserialize, Serialize};

use super::SnapshotParseError;

/// Slot name used when a module entry has none.
const UNKNOWN_SLOT: &str = "Unknown";

/// Power draw and priority of one module slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModulePower {
    pub slot: String,
    pub power: Option<f64>,
    pub priority: Option<i64>,
}

/// The ordered module list; serialized as a bare JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(transparent)]
pub struct ModulesSnapshot {
    pub modules: Vec<ModulePower>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawModulesInfo {
    #[serde(default)]
    modules: Vec<RawModule>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawModule {
    slot: Option<String>,
    power: Option<f64>,
    priority: Option<i64>,
}

impl ModulesSnapshot {
    /// Parses a `ModulesInfo.json` document.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotParseError::Json`] for empty or malformed documents.
    pub fn from_modules_json(document: &str) -> Result<Self, SnapshotParseError> {
        let raw: RawModulesInfo = serde_json::from_str(document)?;
        Ok(Self {
            modules: raw
                .modules
                .into_iter()
                .map(|m| ModulePower {
                    slot: m.slot.unwrap_or_else(|| UNKNOWN_SLOT.to_string()),
                    power: m.power,
                    priority: m.priority,
                })
                .collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = r#"{ "timestamp":"2024-05-01T18:00:00Z", "event":"ModuleInfo", "Modules":[
        { "Slot":"MainEngines", "Item":"int_engine_size5_class5", "Power":6.12, "Priority":0 },
        { "Slot":"ShieldGenerator", "Item":"int_shieldgenerator_size5_class3", "Power":2.52, "Priority":1 },
        { "Item":"int_cargorack_size4_class1" }
    ] }"#;

    #[test]
    fn test_parses_slots_in_order() {
        let snap = ModulesSnapshot::from_modules_json(SAMPLE).unwrap();

        assert_eq!(snap.len(), 3);
        assert_eq!(snap.modules[0].slot, "MainEngines");
        assert_eq!(snap.modules[1].priority, Some(1));
        assert_eq!(snap.modules[2].slot, "Unknown");
        assert_eq!(snap.modules[2].power, None);
    }

    #[test]
    fn test_serializes_as_array() {
        let snap = ModulesSnapshot::from_modules_json(SAMPLE).unwrap();

        let value = serde_json::to_value(&snap).unwrap();

        assert!(value.is_array());
        assert_eq!(
            value[0],
            json!({"Slot": "MainEngines", "Power": 6.12, "Priority": 0})
        );
    }

    #[test]
    fn test_missing_modules_is_empty() {
        let snap = ModulesSnapshot::from_modules_json(r#"{"event":"ModuleInfo"}"#).unwrap();
        assert!(snap.is_empty());
    }

    #[test]
    fn test_power_change_breaks_equality() {
        let a = ModulesSnapshot::from_modules_json(SAMPLE).unwrap();
        let b = ModulesSnapshot::from_modules_json(&SAMPLE.replace("2.52", "0.0")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_truncated_document_is_an_error() {
        assert!(ModulesSnapshot::from_modules_json(r#"{ "Modules":[ {"Slot":"#).is_err());
    }
}
