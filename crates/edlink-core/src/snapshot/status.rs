//! `Status.json` flag decoding.
//!
//! The game rewrites `Status.json` several times per second.  Its `Flags`
//! field packs 31 booleans into one integer:
//!
//! | Bit | Flag              | Bit | Flag               |
//! |-----|-------------------|-----|--------------------|
//! | 0   | Docked            | 16  | FsdMassLocked      |
//! | 1   | Landed            | 17  | FsdCharging        |
//! | 2   | LandingGearDown   | 18  | FsdCooldown        |
//! | 3   | ShieldsUp         | 19  | LowFuel            |
//! | 4   | Supercruise       | 20  | Overheating        |
//! | 5   | FlightAssistOff   | 21  | HasLatLong         |
//! | 6   | HardpointsOut     | 22  | IsInDanger         |
//! | 7   | InWing            | 23  | BeingInterdicted   |
//! | 8   | LightsOn          | 24  | InMainShip         |
//! | 9   | CargoScoopOut     | 25  | InFighter          |
//! | 10  | SilentRunning     | 26  | InSRV              |
//! | 11  | ScoopingFuel      | 27  | HudInAnalysisMode  |
//! | 12  | SrvHandbrake      | 28  | NightVision        |
//! | 13  | SrvUsingTurretView| 29  | AltControls        |
//! | 14  | SrvTurretRetracted| 30  | SrvHighBeam        |
//! | 15  | SrvDriveAssist    |     |                    |
//!
//! The flag names are a stable contract: dashboards subscribe to the
//! `StatusDelta` packet and read these keys directly.  Bit 31 is reserved and
//! ignored.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;

use super::SnapshotParseError;

/// Mask of the 31 defined flag bits.
const DEFINED_BITS: u32 = 0x7FFF_FFFF;

/// One named bit of the status `Flags` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusFlag {
    Docked,
    Landed,
    LandingGearDown,
    ShieldsUp,
    Supercruise,
    FlightAssistOff,
    HardpointsOut,
    InWing,
    LightsOn,
    CargoScoopOut,
    SilentRunning,
    ScoopingFuel,
    SrvHandbrake,
    SrvUsingTurretView,
    SrvTurretRetracted,
    SrvDriveAssist,
    FsdMassLocked,
    FsdCharging,
    FsdCooldown,
    LowFuel,
    Overheating,
    HasLatLong,
    IsInDanger,
    BeingInterdicted,
    InMainShip,
    InFighter,
    InSrv,
    HudInAnalysisMode,
    NightVision,
    AltControls,
    SrvHighBeam,
}

impl StatusFlag {
    /// Every flag, in bit order (index == bit number).
    pub const ALL: [StatusFlag; 31] = [
        StatusFlag::Docked,
        StatusFlag::Landed,
        StatusFlag::LandingGearDown,
        StatusFlag::ShieldsUp,
        StatusFlag::Supercruise,
        StatusFlag::FlightAssistOff,
        StatusFlag::HardpointsOut,
        StatusFlag::InWing,
        StatusFlag::LightsOn,
        StatusFlag::CargoScoopOut,
        StatusFlag::SilentRunning,
        StatusFlag::ScoopingFuel,
        StatusFlag::SrvHandbrake,
        StatusFlag::SrvUsingTurretView,
        StatusFlag::SrvTurretRetracted,
        StatusFlag::SrvDriveAssist,
        StatusFlag::FsdMassLocked,
        StatusFlag::FsdCharging,
        StatusFlag::FsdCooldown,
        StatusFlag::LowFuel,
        StatusFlag::Overheating,
        StatusFlag::HasLatLong,
        StatusFlag::IsInDanger,
        StatusFlag::BeingInterdicted,
        StatusFlag::InMainShip,
        StatusFlag::InFighter,
        StatusFlag::InSrv,
        StatusFlag::HudInAnalysisMode,
        StatusFlag::NightVision,
        StatusFlag::AltControls,
        StatusFlag::SrvHighBeam,
    ];

    /// Bit position within `Flags`.
    pub fn bit(self) -> u32 {
        self as u32
    }

    /// Wire name of the flag.
    pub fn name(self) -> &'static str {
        match self {
            StatusFlag::Docked => "Docked",
            StatusFlag::Landed => "Landed",
            StatusFlag::LandingGearDown => "LandingGearDown",
            StatusFlag::ShieldsUp => "ShieldsUp",
            StatusFlag::Supercruise => "Supercruise",
            StatusFlag::FlightAssistOff => "FlightAssistOff",
            StatusFlag::HardpointsOut => "HardpointsOut",
            StatusFlag::InWing => "InWing",
            StatusFlag::LightsOn => "LightsOn",
            StatusFlag::CargoScoopOut => "CargoScoopOut",
            StatusFlag::SilentRunning => "SilentRunning",
            StatusFlag::ScoopingFuel => "ScoopingFuel",
            StatusFlag::SrvHandbrake => "SrvHandbrake",
            StatusFlag::SrvUsingTurretView => "SrvUsingTurretView",
            StatusFlag::SrvTurretRetracted => "SrvTurretRetracted",
            StatusFlag::SrvDriveAssist => "SrvDriveAssist",
            StatusFlag::FsdMassLocked => "FsdMassLocked",
            StatusFlag::FsdCharging => "FsdCharging",
            StatusFlag::FsdCooldown => "FsdCooldown",
            StatusFlag::LowFuel => "LowFuel",
            StatusFlag::Overheating => "Overheating",
            StatusFlag::HasLatLong => "HasLatLong",
            StatusFlag::IsInDanger => "IsInDanger",
            StatusFlag::BeingInterdicted => "BeingInterdicted",
            StatusFlag::InMainShip => "InMainShip",
            StatusFlag::InFighter => "InFighter",
            StatusFlag::InSrv => "InSRV",
            StatusFlag::HudInAnalysisMode => "HudInAnalysisMode",
            StatusFlag::NightVision => "NightVision",
            StatusFlag::AltControls => "AltControls",
            StatusFlag::SrvHighBeam => "SrvHighBeam",
        }
    }
}

/// The decoded status flag set.
///
/// Two values are equal exactly when every named flag is equal; reserved bits
/// are dropped on construction so they can never cause a spurious change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StatusFlags(u32);

/// The subset of `Status.json` edlink reads.
#[derive(Deserialize)]
struct RawStatus {
    #[serde(rename = "Flags", default)]
    flags: u64,
}

impl StatusFlags {
    /// Decodes a raw `Flags` integer.  Total and pure.
    pub fn from_bits(bits: u32) -> Self {
        Self(bits & DEFINED_BITS)
    }

    /// Decodes the `Flags` field of a `Status.json` document (missing → 0).
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotParseError::Json`] if the document is not a JSON
    /// object or `Flags` is not a non-negative integer.
    pub fn from_status_json(document: &str) -> Result<Self, SnapshotParseError> {
        let raw: RawStatus = serde_json::from_str(document)?;
        // Only the low 31 bits carry flags; the truncating cast is intended.
        Ok(Self::from_bits(raw.flags as u32))
    }

    /// Returns the masked bit field.
    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn is_set(self, flag: StatusFlag) -> bool {
        self.0 & (1 << flag.bit()) != 0
    }

    /// Iterates every flag with its value, in bit order.
    pub fn iter(self) -> impl Iterator<Item = (StatusFlag, bool)> {
        StatusFlag::ALL.into_iter().map(move |f| (f, self.is_set(f)))
    }

    /// Lists the flags whose value differs from `previous`, with the new value.
    pub fn transitions_from(self, previous: StatusFlags) -> Vec<(StatusFlag, bool)> {
        let changed = self.0 ^ previous.0;
        StatusFlag::ALL
            .into_iter()
            .filter(|f| changed & (1 << f.bit()) != 0)
            .map(|f| (f, self.is_set(f)))
            .collect()
    }
}

impl Serialize for StatusFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(StatusFlag::ALL.len()))?;
        for (flag, value) in self.iter() {
            map.serialize_entry(flag.name(), &value)?;
        }
        map.end()
    }
}
