//! The Stream Keeper: per-(application, substance) storage for stream
//! values, their enabled flags, and the substance/application
//! configuration (recharge, retirement, recycling, initial charges,
//! intensities).

use std::collections::HashMap;

use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::{EngineError, Res};
use crate::quantity::Quantity;
use crate::streams::types::{Channel, StreamName, UseKey};

#[derive(Debug, Clone)]
pub struct Configuration {
    /// Fraction (0..1) of prior equipment serviced each year.
    pub recharge_population: Decimal,
    /// kg refrigerant per serviced unit.
    pub recharge_intensity: Decimal,
    /// Fraction (0..1) of prior equipment retired per year.
    pub retirement_rate: Decimal,
    /// Recovery rate applied to recharge volume; stored as a fraction
    /// unless `recovery_is_absolute_kg` is set, in which case it is a
    /// kg quantity.
    pub recovery_rate: Decimal,
    pub recovery_is_absolute_kg: bool,
    /// Fraction (0..1) of recovered material that is reusable.
    pub yield_rate: Decimal,
    /// Percent (0..100) of recycled material that displaces virgin supply.
    pub displacement_rate: Decimal,
    pub initial_charge: [Decimal; 3], // indexed by Channel
    pub ghg_intensity: Decimal, // tCO2e per kg
    pub energy_intensity: Decimal, // kwh per kg
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            recharge_population: Decimal::ZERO,
            recharge_intensity: Decimal::ZERO,
            retirement_rate: Decimal::ZERO,
            recovery_rate: Decimal::ZERO,
            recovery_is_absolute_kg: false,
            yield_rate: Decimal::ZERO,
            displacement_rate: dec!(100),
            initial_charge: [Decimal::ZERO; 3],
            ghg_intensity: Decimal::ZERO,
            energy_intensity: Decimal::ZERO,
        }
    }
}

impl Configuration {
    pub fn channel(&self, channel: Channel) -> Decimal {
        self.initial_charge[channel_index(channel)]
    }

    pub fn set_channel(&mut self, channel: Channel, value: Decimal) {
        self.initial_charge[channel_index(channel)] = value;
    }
}

fn channel_index(channel: Channel) -> usize {
    match channel {
        Channel::Manufacture => 0,
        Channel::Import => 1,
        Channel::Sales => 2,
    }
}

#[derive(Debug, Clone)]
struct UseKeyRecord {
    values: [Decimal; StreamName::COUNT],
    enabled: [bool; StreamName::COUNT],
    config: Configuration,
}

impl Default for UseKeyRecord {
    fn default() -> Self {
        Self {
            values: [Decimal::ZERO; StreamName::COUNT],
            enabled: [false; StreamName::COUNT],
            config: Configuration::default(),
        }
    }
}

#[derive(Debug, Default)]
pub struct StreamKeeper {
    rows: HashMap<UseKey, UseKeyRecord>,
}

impl StreamKeeper {
    pub fn new() -> Self {
        Self::default()
    }

    fn row(&mut self, key: &UseKey) -> &mut UseKeyRecord {
        self.rows.entry(key.clone()).or_default()
    }

    fn row_ref(&self, key: &UseKey) -> Option<&UseKeyRecord> {
        self.rows.get(key)
    }

    /// Every UseKey that has at least one enabled stream — used by the
    /// Serializer to decide which (application, substance) rows to emit.
    pub fn keys_with_enabled_stream(&self) -> Vec<UseKey> {
        self.rows
            .iter()
            .filter(|(_, record)| record.enabled.iter().any(|e| *e))
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn get_stream(&self, key: &UseKey, stream: StreamName) -> Quantity {
        match self.row_ref(key) {
            Some(record) => {
                if stream == StreamName::Sales {
                    let manufacture = record.values[StreamName::Manufacture.index()];
                    let import = record.values[StreamName::Import.index()];
                    Quantity::new(manufacture + import, "kg")
                } else {
                    Quantity::new(record.values[stream.index()], stream.canonical_units())
                }
            }
            None => Quantity::zero(stream.canonical_units()),
        }
    }

    pub fn has_any_enabled_stream(&self, key: &UseKey) -> bool {
        self.row_ref(key).map(|r| r.enabled.iter().any(|e| *e)).unwrap_or(false)
    }

    pub fn is_enabled(&self, key: &UseKey, stream: StreamName) -> bool {
        match stream {
            StreamName::Sales => {
                self.is_enabled(key, StreamName::Manufacture) || self.is_enabled(key, StreamName::Import)
            }
            _ => self
                .row_ref(key)
                .map(|r| r.enabled[stream.index()])
                .unwrap_or(false),
        }
    }

    /// Write a stream's canonical-unit value. Always flips the enabled
    /// flag. Rejects writes to the read-only `Sales` aggregate.
    pub fn set_stream(&mut self, key: &UseKey, stream: StreamName, value: Decimal) -> Res<()> {
        if stream.is_read_only() {
            return Err(EngineError::ValidationError(
                "sales is a derived aggregate and cannot be set directly".to_string(),
            ));
        }
        debug!("set_stream {:?}.{:?} = {}", key, stream, value);
        let record = self.row(key);
        record.values[stream.index()] = value;
        record.enabled[stream.index()] = true;
        Ok(())
    }

    /// Flip a stream's enabled flag without touching its value.
    pub fn enable(&mut self, key: &UseKey, stream: StreamName) {
        self.row(key).enabled[stream.index()] = true;
    }

    pub fn config(&self, key: &UseKey) -> Configuration {
        self.row_ref(key).map(|r| r.config.clone()).unwrap_or_default()
    }

    pub fn set_recharge(&mut self, key: &UseKey, population: Decimal, intensity: Decimal) {
        let record = self.row(key);
        record.config.recharge_population = population;
        record.config.recharge_intensity = intensity;
    }

    pub fn set_retirement_rate(&mut self, key: &UseKey, rate: Decimal) {
        self.row(key).config.retirement_rate = rate;
    }

    pub fn set_recovery(
        &mut self,
        key: &UseKey,
        recovery_rate: Decimal,
        recovery_is_absolute_kg: bool,
        yield_rate: Decimal,
        displacement_rate: Option<Decimal>,
    ) {
        let record = self.row(key);
        record.config.recovery_rate = recovery_rate;
        record.config.recovery_is_absolute_kg = recovery_is_absolute_kg;
        record.config.yield_rate = yield_rate;
        if let Some(d) = displacement_rate {
            record.config.displacement_rate = d;
        }
    }

    pub fn set_initial_charge(&mut self, key: &UseKey, channel: Channel, value: Decimal) {
        self.row(key).config.set_channel(channel, value);
    }

    pub fn set_ghg_intensity(&mut self, key: &UseKey, value: Decimal) {
        self.row(key).config.ghg_intensity = value;
    }

    pub fn set_energy_intensity(&mut self, key: &UseKey, value: Decimal) {
        self.row(key).config.energy_intensity = value;
    }

    /// Called at year rollover: prior equipment becomes this year's
    /// starting point, and streams that are recomputed every year are
    /// cleared so a stale value can never leak forward. Configuration is
    /// left untouched (it persists until explicitly changed again).
    pub fn roll_year(&mut self) {
        for record in self.rows.values_mut() {
            let equipment = record.values[StreamName::Equipment.index()];
            record.values[StreamName::PriorEquipment.index()] = equipment;
            for stream in [
                StreamName::Manufacture,
                StreamName::Import,
                StreamName::Export,
                StreamName::Recycle,
                StreamName::NewEquipment,
                StreamName::Consumption,
                StreamName::DomesticConsumption,
                StreamName::ImportConsumption,
                StreamName::RecycleConsumption,
                StreamName::ExportConsumption,
                StreamName::Energy,
                StreamName::RechargeEmissions,
                StreamName::EolEmissions,
            ] {
                record.values[stream.index()] = Decimal::ZERO;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_round_trip() {
        let mut keeper = StreamKeeper::new();
        let key = UseKey::new("Domestic Refrigeration", "HFC-134a");
        keeper.set_stream(&key, StreamName::Manufacture, dec!(100)).unwrap();
        assert_eq!(keeper.get_stream(&key, StreamName::Manufacture).value, dec!(100));
        assert!(keeper.is_enabled(&key, StreamName::Manufacture));
    }

    #[test]
    fn sales_is_derived_and_rejects_direct_write() {
        let mut keeper = StreamKeeper::new();
        let key = UseKey::new("A", "B");
        keeper.set_stream(&key, StreamName::Manufacture, dec!(60)).unwrap();
        keeper.set_stream(&key, StreamName::Import, dec!(40)).unwrap();
        assert_eq!(keeper.get_stream(&key, StreamName::Sales).value, dec!(100));
        assert!(keeper.set_stream(&key, StreamName::Sales, dec!(1)).is_err());
    }

    #[test]
    fn enable_without_value_flips_flag_only() {
        let mut keeper = StreamKeeper::new();
        let key = UseKey::new("A", "B");
        keeper.enable(&key, StreamName::Export);
        assert!(keeper.is_enabled(&key, StreamName::Export));
        assert_eq!(keeper.get_stream(&key, StreamName::Export).value, Decimal::ZERO);
    }

    #[test]
    fn roll_year_carries_equipment_and_clears_flows() {
        let mut keeper = StreamKeeper::new();
        let key = UseKey::new("A", "B");
        keeper.set_stream(&key, StreamName::Equipment, dec!(1000)).unwrap();
        keeper.set_stream(&key, StreamName::Manufacture, dec!(500)).unwrap();
        keeper.roll_year();
        assert_eq!(keeper.get_stream(&key, StreamName::PriorEquipment).value, dec!(1000));
        assert_eq!(keeper.get_stream(&key, StreamName::Manufacture).value, Decimal::ZERO);
    }

    #[test]
    fn keys_with_enabled_stream_tracks_rows() {
        let mut keeper = StreamKeeper::new();
        let key = UseKey::new("A", "B");
        assert!(keeper.keys_with_enabled_stream().is_empty());
        keeper.set_stream(&key, StreamName::Manufacture, dec!(1)).unwrap();
        assert_eq!(keeper.keys_with_enabled_stream(), vec![key]);
    }
}
