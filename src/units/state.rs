//! State Getter: the façade the Unit Converter reads totals through.
//!
//! Per Design Note "Avoid shared mutable aliasing," this is not a trait
//! with a base/overriding implementation pair — it is a single immutable
//! `StateContext` value with explicit `Option<Quantity>` override fields.
//! A nested conversion that needs to pretend "what if volume were X"
//! constructs a new context via `.with_volume_override(...)` rather than
//! mutating shared state, which makes every conversion call trivially
//! thread-safe (no setter/clearer pairs to get wrong).

use rust_decimal::Decimal;

use crate::quantity::Quantity;
use crate::streams::keeper::Configuration;
use crate::streams::types::{Channel, StreamName, UseKey};
use crate::streams::StreamKeeper;

#[derive(Debug, Clone)]
pub struct StateContext {
    population: Quantity,
    volume: Quantity,
    amortized_unit_volume: Quantity,
    substance_consumption: Quantity,
    energy_intensity: Quantity,
    total_ghg_consumption: Quantity,
    total_energy_consumption: Quantity,
    years_elapsed: Decimal,
    pub tolerate_empty_intensity: bool,
}

impl StateContext {
    /// Build the base view from the Stream Keeper for the given scope.
    pub fn base(keeper: &StreamKeeper, key: &UseKey, years_elapsed: Decimal) -> Self {
        let config = keeper.config(key);
        let population = keeper.get_stream(key, StreamName::Equipment);
        let sales = keeper.get_stream(key, StreamName::Sales);
        let amortized_unit_volume = Quantity::new(amortized_charge(&config), "kg/unit");
        let substance_consumption = Quantity::new(config.ghg_intensity, "tCO2e/kg");
        let energy_intensity = Quantity::new(config.energy_intensity, "kwh/kg");
        let total_ghg_consumption = keeper.get_stream(key, StreamName::Consumption);
        let total_energy_consumption = keeper.get_stream(key, StreamName::Energy);

        Self {
            population,
            volume: sales,
            amortized_unit_volume,
            substance_consumption,
            energy_intensity,
            total_ghg_consumption,
            total_energy_consumption,
            years_elapsed,
            tolerate_empty_intensity: false,
        }
    }

    pub fn with_tolerate_empty_intensity(mut self, tolerate: bool) -> Self {
        self.tolerate_empty_intensity = tolerate;
        self
    }

    pub fn with_population_override(mut self, population: Quantity) -> Self {
        self.population = population;
        self
    }

    pub fn with_volume_override(mut self, volume: Quantity) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_amortized_unit_volume_override(mut self, value: Quantity) -> Self {
        self.amortized_unit_volume = value;
        self
    }

    pub fn with_substance_consumption_override(mut self, value: Quantity) -> Self {
        self.substance_consumption = value;
        self
    }

    pub fn population(&self) -> &Quantity {
        &self.population
    }

    pub fn volume(&self) -> &Quantity {
        &self.volume
    }

    pub fn amortized_unit_volume(&self) -> &Quantity {
        &self.amortized_unit_volume
    }

    pub fn substance_consumption(&self) -> &Quantity {
        &self.substance_consumption
    }

    pub fn energy_intensity(&self) -> &Quantity {
        &self.energy_intensity
    }

    pub fn total_ghg_consumption(&self) -> &Quantity {
        &self.total_ghg_consumption
    }

    pub fn total_energy_consumption(&self) -> &Quantity {
        &self.total_energy_consumption
    }

    pub fn years_elapsed(&self) -> Decimal {
        self.years_elapsed
    }
}

/// kg of refrigerant per new unit, amortized across sales channels: the
/// dedicated `sales` initial charge when set, otherwise the average of
/// the manufacture/import channel charges (documented open design choice
/// — see DESIGN.md).
fn amortized_charge(config: &Configuration) -> Decimal {
    let sales_charge = config.channel(Channel::Sales);
    if !sales_charge.is_zero() {
        return sales_charge;
    }
    let m = config.channel(Channel::Manufacture);
    let i = config.channel(Channel::Import);
    if m.is_zero() && i.is_zero() {
        Decimal::ZERO
    } else if m.is_zero() {
        i
    } else if i.is_zero() {
        m
    } else {
        (m + i) / Decimal::TWO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streams::Channel;
    use rust_decimal_macros::dec;

    #[test]
    fn base_view_reads_from_keeper() {
        let mut keeper = StreamKeeper::new();
        let key = UseKey::new("A", "B");
        keeper.set_stream(&key, StreamName::Equipment, dec!(500)).unwrap();
        keeper.set_initial_charge(&key, Channel::Sales, dec!(2));
        let ctx = StateContext::base(&keeper, &key, Decimal::ZERO);
        assert_eq!(ctx.population().value, dec!(500));
        assert_eq!(ctx.amortized_unit_volume().value, dec!(2));
    }

    #[test]
    fn override_does_not_mutate_keeper() {
        let keeper = StreamKeeper::new();
        let key = UseKey::new("A", "B");
        let ctx = StateContext::base(&keeper, &key, Decimal::ZERO)
            .with_population_override(Quantity::new(dec!(999), "units"));
        assert_eq!(ctx.population().value, dec!(999));
        assert_eq!(keeper.get_stream(&key, StreamName::Equipment).value, Decimal::ZERO);
    }
}
