//! `RecalcOperation`: an ordered list of strategies, and the type-state
//! builder that can only produce a list starting with a primary recalc.

use crate::error::Res;
use crate::recalc::kit::RecalcKit;
use crate::recalc::strategies::RecalcStrategy;
use crate::streams::types::UseKey;

#[derive(Debug, Clone)]
pub struct RecalcOperation {
    steps: Vec<RecalcStrategy>,
}

impl RecalcOperation {
    pub fn run(&self, kit: &mut RecalcKit, key: &UseKey) -> Res<()> {
        for step in &self.steps {
            step.execute(kit, key)?;
        }
        Ok(())
    }

    pub fn builder() -> RecalcOperationBuilder {
        RecalcOperationBuilder
    }

    /// `PopulationChangeRecalc` (subtractRecharge=false) → `RechargeEmissionsRecalc`.
    /// `RechargeEmissionsRecalc` also runs inline inside `PopulationChange`
    /// itself, so the chain here only needs the primary.
    pub fn for_population_change() -> Self {
        RecalcOperation::builder()
            .primary(RecalcStrategy::PopulationChange { subtract_recharge: false })
            .build()
    }

    /// `SalesRecalc` alone — its own writes use `propagate=false` semantics
    /// by construction (a strategy never re-enters the keeper's command
    /// layer), so no further chaining is needed here.
    pub fn for_sales() -> Self {
        RecalcOperation::builder().primary(RecalcStrategy::Sales).build()
    }

    pub fn for_sales_then_consumption() -> Self {
        RecalcOperation::builder()
            .primary(RecalcStrategy::Sales)
            .then(RecalcStrategy::Consumption)
            .build()
    }

    pub fn for_consumption() -> Self {
        RecalcOperation::builder().primary(RecalcStrategy::Consumption).build()
    }

    /// `equals()`: ghgIntensity changed, so consumption and both emissions
    /// streams must be recomputed regardless of command order.
    pub fn for_equals() -> Self {
        RecalcOperation::builder()
            .primary(RecalcStrategy::Consumption)
            .then(RecalcStrategy::RechargeEmissions)
            .then(RecalcStrategy::EolEmissions)
            .build()
    }

    /// `RetireRecalc` → `EolEmissionsRecalc` → `PopulationChangeRecalc`
    /// (subtractRecharge=true) → `SalesRecalc` → `ConsumptionRecalc`.
    pub fn for_retire() -> Self {
        RecalcOperation::builder()
            .primary(RecalcStrategy::Retire)
            .then(RecalcStrategy::EolEmissions)
            .then(RecalcStrategy::PopulationChange { subtract_recharge: true })
            .then(RecalcStrategy::Sales)
            .then(RecalcStrategy::Consumption)
            .build()
    }

    /// `recover()`: recovery/yield/displacement changed → resupply sales,
    /// then recompute consumption.
    pub fn for_recover() -> Self {
        RecalcOperation::builder()
            .primary(RecalcStrategy::Sales)
            .then(RecalcStrategy::Consumption)
            .build()
    }

    /// `recharge()`: recharge population/intensity changed → a full
    /// population-change pass (which folds in RechargeEmissions) followed
    /// by resupplying sales and consumption, so order versus `equals`/
    /// `retire` never matters.
    pub fn for_recharge() -> Self {
        RecalcOperation::builder()
            .primary(RecalcStrategy::PopulationChange { subtract_recharge: false })
            .then(RecalcStrategy::Sales)
            .then(RecalcStrategy::Consumption)
            .build()
    }
}

/// Enforces "one primary recalc then zero or more propagations" at the type
/// level (Design Note "Replace strategy inheritance with tagged variants"):
/// the only way to get a `PrimarySet` is through `.primary(...)`, and the
/// only way to get a `RecalcOperation` is through `PrimarySet::build()`.
pub struct RecalcOperationBuilder;

impl RecalcOperationBuilder {
    pub fn primary(self, strategy: RecalcStrategy) -> PrimarySet {
        PrimarySet { steps: vec![strategy] }
    }
}

pub struct PrimarySet {
    steps: Vec<RecalcStrategy>,
}

impl PrimarySet {
    pub fn then(mut self, strategy: RecalcStrategy) -> PrimarySet {
        self.steps.push(strategy);
        self
    }

    pub fn build(self) -> RecalcOperation {
        RecalcOperation { steps: self.steps }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streams::{Channel, StreamKeeper, StreamName};
    use crate::units::UnitConverter;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[test]
    fn builder_requires_a_primary_before_propagations() {
        let op = RecalcOperation::builder()
            .primary(RecalcStrategy::Sales)
            .then(RecalcStrategy::Consumption)
            .build();
        assert_eq!(op.steps.len(), 2);
    }

    #[test]
    fn for_retire_chain_produces_consistent_population() {
        let mut keeper = StreamKeeper::new();
        let converter = UnitConverter::new();
        let key = UseKey::new("Domestic Refrigeration", "HFC-134a");
        keeper.set_initial_charge(&key, Channel::Sales, dec!(1));
        keeper.set_stream(&key, StreamName::PriorEquipment, dec!(200000)).unwrap();
        keeper.set_stream(&key, StreamName::Equipment, dec!(200000)).unwrap();
        keeper.set_retirement_rate(&key, dec!(0.05));
        keeper.enable(&key, StreamName::Manufacture);

        let mut kit = RecalcKit::new(&mut keeper, &converter, Decimal::ONE);
        RecalcOperation::for_retire().run(&mut kit, &key).unwrap();

        assert_eq!(keeper.get_stream(&key, StreamName::PriorEquipment).value, dec!(190000));
        assert_eq!(keeper.get_stream(&key, StreamName::EolEmissions).value, Decimal::ZERO);
    }
}
