//! The Serializer: turns Stream Keeper state into the per-year, per-(app,
//! sub) snapshot (`EngineResult`) that crosses the engine's API boundary.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Res;
use crate::recalc::{consumption_split, sales_distribution};
use crate::streams::types::{Channel, UseKey};
use crate::streams::{StreamKeeper, StreamName};
use crate::units::UnitConverter;

/// Import/export initial-charge volumes and their consumption equivalents,
/// split out from the aggregate sales figures for trade attribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSupplement {
    pub import_initial_charge_value: Decimal,
    pub import_initial_charge_consumption: Decimal,
    pub export_initial_charge_value: Decimal,
    pub export_initial_charge_consumption: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineResult {
    pub application: String,
    pub substance: String,
    pub year: i32,
    pub scenario: String,
    pub trial: u32,
    pub manufacture: Decimal,
    pub import: Decimal,
    pub recycle: Decimal,
    pub domestic_consumption: Decimal,
    pub import_consumption: Decimal,
    pub recycle_consumption: Decimal,
    pub export: Decimal,
    pub export_consumption: Decimal,
    pub population: Decimal,
    pub population_new: Decimal,
    pub recharge_emissions: Decimal,
    pub eol_emissions: Decimal,
    pub energy_consumption: Decimal,
    pub trade_supplement: TradeSupplement,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Serializer;

impl Serializer {
    pub fn new() -> Self {
        Self
    }

    /// `None` when nothing is enabled for this `(application, substance)` —
    /// only rows with at least one enabled stream are emitted.
    pub fn snapshot(
        &self,
        keeper: &StreamKeeper,
        _converter: &UnitConverter,
        key: &UseKey,
        year: i32,
        scenario: &str,
        trial: u32,
    ) -> Res<Option<EngineResult>> {
        if !keeper.has_any_enabled_stream(key) {
            return Ok(None);
        }

        let manufacture = keeper.get_stream(key, StreamName::Manufacture).value;
        let import = keeper.get_stream(key, StreamName::Import).value;
        let recycle = keeper.get_stream(key, StreamName::Recycle).value;
        let export = keeper.get_stream(key, StreamName::Export).value;
        let total_ghg = keeper.get_stream(key, StreamName::Consumption).value;
        let (domestic_consumption, import_consumption, recycle_consumption) =
            split_consumption_by_recycling(manufacture, import, recycle, total_ghg);

        let config = keeper.config(key);
        let new_equipment_units = keeper.get_stream(key, StreamName::NewEquipment).value;
        let kg_for_new = new_equipment_units * config.channel(Channel::Sales);
        let (_, pct_i) = sales_distribution(keeper, key);
        let import_initial_charge_value = pct_i * kg_for_new;
        let import_initial_charge_consumption = import_initial_charge_value * config.ghg_intensity;
        let export_initial_charge_value = export;
        let export_initial_charge_consumption = export * config.ghg_intensity;

        Ok(Some(EngineResult {
            application: key.application.clone(),
            substance: key.substance.clone(),
            year,
            scenario: scenario.to_string(),
            trial,
            manufacture,
            import,
            recycle,
            domestic_consumption,
            import_consumption,
            recycle_consumption,
            export,
            export_consumption: keeper.get_stream(key, StreamName::ExportConsumption).value,
            population: keeper.get_stream(key, StreamName::Equipment).value,
            population_new: new_equipment_units,
            recharge_emissions: keeper.get_stream(key, StreamName::RechargeEmissions).value,
            eol_emissions: keeper.get_stream(key, StreamName::EolEmissions).value,
            energy_consumption: keeper.get_stream(key, StreamName::Energy).value,
            trade_supplement: TradeSupplement {
                import_initial_charge_value,
                import_initial_charge_consumption,
                export_initial_charge_value,
                export_initial_charge_consumption,
            },
        }))
    }
}

/// The domestic/import/recycle consumption split: each channel's share of
/// total GHG consumption, proportional to the volume it contributed, so
/// the three lines always sum exactly to the total.
pub fn split_consumption_by_recycling(
    manufacture: Decimal,
    import: Decimal,
    recycle: Decimal,
    total_ghg_consumption: Decimal,
) -> (Decimal, Decimal, Decimal) {
    consumption_split(manufacture, import, recycle, total_ghg_consumption)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streams::types::UseKey;
    use rust_decimal_macros::dec;

    #[test]
    fn snapshot_is_none_when_nothing_enabled() {
        let keeper = StreamKeeper::new();
        let key = UseKey::new("A", "B");
        let converter = UnitConverter::new();
        let out = Serializer::new().snapshot(&keeper, &converter, &key, 2030, "BAU", 0).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn snapshot_reads_enabled_streams() {
        let mut keeper = StreamKeeper::new();
        let key = UseKey::new("Domestic Refrigeration", "HFC-134a");
        keeper.set_stream(&key, StreamName::Manufacture, dec!(100000)).unwrap();
        keeper.set_stream(&key, StreamName::Consumption, dec!(500)).unwrap();
        let converter = UnitConverter::new();
        let out = Serializer::new()
            .snapshot(&keeper, &converter, &key, 2030, "BAU", 0)
            .unwrap()
            .unwrap();
        assert_eq!(out.manufacture, dec!(100000));
        assert_eq!(out.application, "Domestic Refrigeration");
    }

    #[test]
    fn consumption_split_invariant_holds() {
        let (d, i, r) = split_consumption_by_recycling(dec!(70), dec!(20), dec!(10), dec!(1000));
        assert_eq!(d + i + r, dec!(1000));
    }
}
