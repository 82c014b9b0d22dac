//! Core scoping and naming types: `Scope`, `UseKey`, `StreamName`.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Res};

/// The canonical stream names a `StreamKeeper` row holds values for.
/// `Sales` is a derived, read-only aggregate (`manufacture + import`);
/// it is included here so it can be a conversion/serialization target,
/// but `StreamKeeper::set_stream` rejects direct writes to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamName {
    Manufacture,
    Import,
    Export,
    Recycle,
    Sales,
    Equipment,
    PriorEquipment,
    NewEquipment,
    Consumption,
    DomesticConsumption,
    ImportConsumption,
    RecycleConsumption,
    ExportConsumption,
    Energy,
    RechargeEmissions,
    EolEmissions,
}

impl StreamName {
    /// Fixed array index for dense per-UseKey storage.
    pub const COUNT: usize = 16;

    pub fn index(self) -> usize {
        match self {
            StreamName::Manufacture => 0,
            StreamName::Import => 1,
            StreamName::Export => 2,
            StreamName::Recycle => 3,
            StreamName::Sales => 4,
            StreamName::Equipment => 5,
            StreamName::PriorEquipment => 6,
            StreamName::NewEquipment => 7,
            StreamName::Consumption => 8,
            StreamName::DomesticConsumption => 9,
            StreamName::ImportConsumption => 10,
            StreamName::RecycleConsumption => 11,
            StreamName::ExportConsumption => 12,
            StreamName::Energy => 13,
            StreamName::RechargeEmissions => 14,
            StreamName::EolEmissions => 15,
        }
    }

    /// Canonical units this stream is stored in internally.
    pub fn canonical_units(self) -> &'static str {
        match self {
            StreamName::Manufacture
            | StreamName::Import
            | StreamName::Export
            | StreamName::Recycle
            | StreamName::Sales => "kg",
            StreamName::Equipment | StreamName::PriorEquipment | StreamName::NewEquipment => {
                "units"
            }
            StreamName::Consumption
            | StreamName::DomesticConsumption
            | StreamName::ImportConsumption
            | StreamName::RecycleConsumption
            | StreamName::ExportConsumption
            | StreamName::RechargeEmissions
            | StreamName::EolEmissions => "tCO2e",
            StreamName::Energy => "kwh",
        }
    }

    pub fn is_read_only(self) -> bool {
        matches!(self, StreamName::Sales)
    }
}

/// A sales channel: the streams that each carry their own `initialCharge`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Manufacture,
    Import,
    Sales,
}

/// (application, substance) — addresses a row in the Stream Keeper.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UseKey {
    pub application: String,
    pub substance: String,
}

impl UseKey {
    pub fn new(application: impl Into<String>, substance: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            substance: substance.into(),
        }
    }
}

/// (stanza, application, substance), each optional. Operations requiring
/// application+substance fail with `ScopeMissing` when either is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub stanza: Option<String>,
    pub application: Option<String>,
    pub substance: Option<String>,
}

impl Scope {
    pub fn with_stanza(stanza: impl Into<String>) -> Self {
        Self {
            stanza: Some(stanza.into()),
            ..Default::default()
        }
    }

    pub fn with_application_substance(
        &self,
        application: impl Into<String>,
        substance: impl Into<String>,
    ) -> Self {
        Scope {
            stanza: self.stanza.clone(),
            application: Some(application.into()),
            substance: Some(substance.into()),
        }
    }

    /// Resolve to a `UseKey`, failing closed with `ScopeMissing` when
    /// either half is absent — required by every command that mutates a
    /// stream.
    pub fn use_key(&self) -> Res<UseKey> {
        let application = self
            .application
            .clone()
            .ok_or(EngineError::ScopeMissing { missing: "application" })?;
        let substance = self
            .substance
            .clone()
            .ok_or(EngineError::ScopeMissing { missing: "substance" })?;
        Ok(UseKey::new(application, substance))
    }
}
