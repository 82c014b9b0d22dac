//! `RecalcKit`: the bundle of collaborators every recalc strategy needs.

use rust_decimal::Decimal;

use crate::streams::StreamKeeper;
use crate::units::UnitConverter;

pub struct RecalcKit<'a> {
    pub keeper: &'a mut StreamKeeper,
    pub converter: &'a UnitConverter,
    /// Years elapsed since the simulation's start year — feeds
    /// `StateContext::years_elapsed` for `year`/`years` ratio conversions.
    pub years_elapsed: Decimal,
    /// Transient hand-off from `Retire` to `EolEmissions` within a single
    /// chained `RecalcOperation`: the number of units retired this step,
    /// computed before `Retire` mutates `priorEquipment`. `EolEmissions`
    /// consumes (and clears) this when present, and falls back to
    /// recomputing from the current `priorEquipment`/`retirementRate`
    /// when run standalone.
    pub pending_retired_units: Option<Decimal>,
}

impl<'a> RecalcKit<'a> {
    pub fn new(keeper: &'a mut StreamKeeper, converter: &'a UnitConverter, years_elapsed: Decimal) -> Self {
        Self {
            keeper,
            converter,
            years_elapsed,
            pending_retired_units: None,
        }
    }
}
