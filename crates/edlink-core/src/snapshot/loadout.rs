//! Ship loadout summary distilled from `Loadout` journal records.
//!
//! The game writes a `Loadout` record on load, after outfitting and after
//! every ship swap.  The raw record is large (full module blueprints, modifier
//! lists, values) and repeats often with identical content, so edlink keeps a
//! reduced summary and republishes it only when something in the summary
//! actually changed.

use serde::{Deserialize, Serialize};

use super::SnapshotParseError;

/// The journal discriminant that carries a loadout.
pub const LOADOUT_EVENT: &str = "Loadout";

/// Summary of the current ship.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoadoutSnapshot {
    pub ship: Option<String>,
    #[serde(rename = "ShipID")]
    pub ship_id: Option<u64>,
    pub ship_name: String,
    pub ship_ident: Option<String>,
    pub hull_health: Option<f64>,
    pub max_jump_range: Option<f64>,
    pub rebuy: Option<u64>,
    pub cargo_capacity: Option<u64>,
    pub modules: Vec<ModuleSummary>,
}

/// Summary of one fitted module.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModuleSummary {
    pub slot: Option<String>,
    pub item: Option<String>,
    pub health: Option<f64>,
    pub priority: Option<i64>,
    pub on: bool,
    /// Present (with its sibling) only for modules that carry ammunition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ammo_in_clip: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ammo_in_hopper: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engineering: Option<EngineeringSummary>,
}

/// Engineering modification applied to a module.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EngineeringSummary {
    pub engineer: Option<String>,
    pub blueprint: Option<String>,
    pub level: Option<i64>,
    pub quality: Option<f64>,
    pub experimental_effect: Option<String>,
}

// ── Raw journal shapes ────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawLoadout {
    ship: Option<String>,
    #[serde(rename = "ShipID")]
    ship_id: Option<u64>,
    ship_name: Option<String>,
    ship_ident: Option<String>,
    hull_health: Option<f64>,
    max_jump_range: Option<f64>,
    rebuy: Option<u64>,
    cargo_capacity: Option<u64>,
    #[serde(default)]
    modules: Vec<RawModule>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawModule {
    slot: Option<String>,
    item: Option<String>,
    health: Option<f64>,
    priority: Option<i64>,
    on: Option<bool>,
    ammo_in_clip: Option<u64>,
    ammo_in_hopper: Option<u64>,
    engineering: Option<RawEngineering>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawEngineering {
    engineer: Option<String>,
    blueprint_name: Option<String>,
    level: Option<i64>,
    quality: Option<f64>,
    experimental_effect: Option<String>,
}

impl From<RawModule> for ModuleSummary {
    fn from(raw: RawModule) -> Self {
        let has_ammo = raw.ammo_in_clip.is_some() || raw.ammo_in_hopper.is_some();
        Self {
            slot: raw.slot,
            item: raw.item,
            health: raw.health,
            priority: raw.priority,
            on: raw.on.unwrap_or(false),
            ammo_in_clip: has_ammo.then(|| raw.ammo_in_clip.unwrap_or(0)),
            ammo_in_hopper: has_ammo.then(|| raw.ammo_in_hopper.unwrap_or(0)),
            engineering: raw.engineering.map(|e| EngineeringSummary {
                engineer: e.engineer,
                blueprint: e.blueprint_name,
                level: e.level,
                quality: e.quality,
                experimental_effect: e.experimental_effect,
            }),
        }
    }
}

impl LoadoutSnapshot {
    /// Extracts the summary from a parsed journal record.
    ///
    /// Returns `Ok(None)` when the record is not a `Loadout` event.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotParseError::Json`] when a `Loadout` record has fields
    /// of the wrong type.
    pub fn from_record(record: &serde_json::Value) -> Result<Option<Self>, SnapshotParseError> {
        if record.get("event").and_then(|e| e.as_str()) != Some(LOADOUT_EVENT) {
            return Ok(None);
        }
        let raw = RawLoadout::deserialize(record)?;
        Ok(Some(Self {
            ship: raw.ship,
            ship_id: raw.ship_id,
            ship_name: raw.ship_name.unwrap_or_default().trim().to_string(),
            ship_ident: raw.ship_ident,
            hull_health: raw.hull_health,
            max_jump_range: raw.max_jump_range,
            rebuy: raw.rebuy,
            cargo_capacity: raw.cargo_capacity,
            modules: raw.modules.into_iter().map(ModuleSummary::from).collect(),
        }))
    }

    /// One-line description for the log, e.g. `EL-01K | Hull: 87%`.
    pub fn summary_line(&self) -> String {
        let ident = self.ship_ident.as_deref().unwrap_or("?");
        match self.hull_health {
            Some(hull) => format!("{ident} | Hull: {:.0}%", hull * 100.0),
            None => format!("{ident} | Hull: ?"),
        }
    }
}
