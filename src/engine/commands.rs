//! The mutating command API (`setStream`, `changeStream`, `cap`, `floor`,
//! `recharge`, `retire`, `recover`, `replace`, `equals`, `enable`,
//! `setInitialCharge`).

use log::debug;
use rust_decimal::Decimal;

use crate::decimal::clamp_non_negative;
use crate::engine::{Engine, YearMatcher};
use crate::error::Res;
use crate::quantity::{NormalizedUnits, Quantity};
use crate::recalc::{RecalcKit, RecalcOperation};
use crate::streams::types::{Channel, UseKey};
use crate::streams::StreamName;
use crate::units::StateContext;

/// Which recalculation chain a direct `setStream`/`changeStream` write
/// should run, keyed by which stream was touched. Streams that are
/// themselves recalc outputs (population, consumption, emissions) are not
/// auto-chained — writing them directly is an explicit override.
fn recalc_chain_for(stream: StreamName) -> Option<RecalcOperation> {
    match stream {
        StreamName::Manufacture | StreamName::Import => {
            Some(RecalcOperation::builder()
                .primary(crate::recalc::RecalcStrategy::PopulationChange { subtract_recharge: false })
                .then(crate::recalc::RecalcStrategy::Consumption)
                .build())
        }
        StreamName::Export | StreamName::Recycle => Some(RecalcOperation::for_consumption()),
        _ => None,
    }
}

impl Engine {
    fn year_applies(&self, year_matcher: &Option<YearMatcher>) -> bool {
        match year_matcher {
            None => true,
            Some(m) => m.matches(self.current_year),
        }
    }

    fn state_for(&self, key: &UseKey) -> StateContext {
        StateContext::base(&self.keeper, key, self.years_elapsed())
    }

    fn run_chain(&mut self, chain: Option<RecalcOperation>, key: &UseKey) -> Res<()> {
        if let Some(op) = chain {
            let years_elapsed = self.years_elapsed();
            let mut kit = RecalcKit::new(&mut self.keeper, &self.converter, years_elapsed);
            op.run(&mut kit, key)?;
        }
        Ok(())
    }

    pub fn set_stream(
        &mut self,
        stream: StreamName,
        value: Quantity,
        year_matcher: Option<YearMatcher>,
        propagate: bool,
    ) -> Res<()> {
        if !self.year_applies(&year_matcher) {
            return Ok(());
        }
        let key = self.scope.use_key()?;
        let state = self.state_for(&key);
        let canonical = self.converter.convert(&value, stream.canonical_units(), &state)?.value;
        debug!("setStream {:?}.{:?} = {}", key, stream, canonical);
        self.keeper.set_stream(&key, stream, canonical)?;
        if propagate {
            self.run_chain(recalc_chain_for(stream), &key)?;
        }
        Ok(())
    }

    pub fn change_stream(&mut self, stream: StreamName, delta: Quantity, year_matcher: Option<YearMatcher>) -> Res<()> {
        if !self.year_applies(&year_matcher) {
            return Ok(());
        }
        let key = self.scope.use_key()?;
        let state = self.state_for(&key);
        let delta_canonical = self.converter.convert(&delta, stream.canonical_units(), &state)?.value;
        let current = self.keeper.get_stream(&key, stream).value;
        let updated = clamp_non_negative(current + delta_canonical);
        self.keeper.set_stream(&key, stream, updated)?;
        self.run_chain(recalc_chain_for(stream), &key)
    }

    /// Shared by `cap`/`floor`: resolves a bound expressed in the stream's
    /// unit, units, or any convertible unit into the stream's canonical
    /// value, adding recharge-on-top when the bound was units-based and
    /// the stream is volume-typed.
    fn resolve_volume_bound(&self, key: &UseKey, stream: StreamName, bound: &Quantity) -> Res<Decimal> {
        let canonical_units = stream.canonical_units();
        if canonical_units == "kg" {
            let normalized = NormalizedUnits::parse(&bound.units);
            if normalized.numerator == "unit" || normalized.numerator == "units" {
                let state = self.state_for(key);
                let cap_units = self.converter.convert(bound, "units", &state)?.value;
                let config = self.keeper.config(key);
                let prior = self.keeper.get_stream(key, StreamName::PriorEquipment).value;
                let recharge_kg = prior * config.recharge_population * config.recharge_intensity;
                return Ok(cap_units * config.channel(Channel::Sales) + recharge_kg);
            }
        }
        let state = self.state_for(key);
        Ok(self.converter.convert(bound, canonical_units, &state)?.value)
    }

    /// Converts a volume delta at the source's initial charge into the
    /// destination substance's canonical unit at the destination's initial
    /// charge — the "units-space when possible" bridge that `cap`/`floor`
    /// displacement and `replace` both share.
    fn bridge_via_units(&self, source_key: &UseKey, dest_key: &UseKey, stream: StreamName, amount: Decimal) -> Decimal {
        if stream.canonical_units() != "kg" {
            return amount;
        }
        let source_charge = self.keeper.config(source_key).channel(Channel::Sales);
        if source_charge.is_zero() {
            return amount;
        }
        let dest_charge = self.keeper.config(dest_key).channel(Channel::Sales);
        (amount / source_charge) * dest_charge
    }

    pub fn cap(
        &mut self,
        stream: StreamName,
        max: Quantity,
        year_matcher: Option<YearMatcher>,
        displace_target: Option<String>,
    ) -> Res<()> {
        if !self.year_applies(&year_matcher) {
            return Ok(());
        }
        let key = self.scope.use_key()?;
        let current = self.keeper.get_stream(&key, stream).value;
        let max_canonical = self.resolve_volume_bound(&key, stream, &max)?;
        if current <= max_canonical {
            return Ok(());
        }
        let excess = current - max_canonical;
        self.keeper.set_stream(&key, stream, max_canonical)?;
        self.run_chain(recalc_chain_for(stream), &key)?;

        if let Some(dest_substance) = displace_target {
            let dest_key = UseKey::new(key.application.clone(), dest_substance);
            let displaced = self.bridge_via_units(&key, &dest_key, stream, excess);
            let dest_current = self.keeper.get_stream(&dest_key, stream).value;
            self.keeper.set_stream(&dest_key, stream, dest_current + displaced)?;
            self.run_chain(recalc_chain_for(stream), &dest_key)?;
        }
        Ok(())
    }

    pub fn floor(
        &mut self,
        stream: StreamName,
        min: Quantity,
        year_matcher: Option<YearMatcher>,
        displace_target: Option<String>,
    ) -> Res<()> {
        if !self.year_applies(&year_matcher) {
            return Ok(());
        }
        let key = self.scope.use_key()?;
        let current = self.keeper.get_stream(&key, stream).value;
        let min_canonical = self.resolve_volume_bound(&key, stream, &min)?;
        if current >= min_canonical {
            return Ok(());
        }
        let shortfall = min_canonical - current;
        self.keeper.set_stream(&key, stream, min_canonical)?;
        self.run_chain(recalc_chain_for(stream), &key)?;

        if let Some(source_substance) = displace_target {
            let source_key = UseKey::new(key.application.clone(), source_substance);
            let drawn = self.bridge_via_units(&key, &source_key, stream, shortfall);
            let source_current = self.keeper.get_stream(&source_key, stream).value;
            let reduced = clamp_non_negative(source_current - drawn);
            self.keeper.set_stream(&source_key, stream, reduced)?;
            self.run_chain(recalc_chain_for(stream), &source_key)?;
        }
        Ok(())
    }

    pub fn recharge(&mut self, population: Quantity, intensity: Quantity, year_matcher: Option<YearMatcher>) -> Res<()> {
        if !self.year_applies(&year_matcher) {
            return Ok(());
        }
        let key = self.scope.use_key()?;
        let state = self.state_for(&key).with_population_override(
            self.keeper.get_stream(&key, StreamName::PriorEquipment),
        );
        let population_fraction = self.converter.convert(&population, "%", &state)?.value / Decimal::from(100);
        let intensity_kg_per_unit = self.converter.convert(&intensity, "kg/unit", &state)?.value;

        self.keeper.set_recharge(&key, population_fraction, intensity_kg_per_unit);
        self.run_chain(Some(RecalcOperation::for_recharge()), &key)
    }

    pub fn retire(&mut self, rate: Quantity, year_matcher: Option<YearMatcher>) -> Res<()> {
        if !self.year_applies(&year_matcher) {
            return Ok(());
        }
        let key = self.scope.use_key()?;
        let state = self.state_for(&key).with_population_override(
            self.keeper.get_stream(&key, StreamName::PriorEquipment),
        );
        let fraction = self.converter.convert(&rate, "%", &state)?.value / Decimal::from(100);
        self.keeper.set_retirement_rate(&key, fraction);
        self.run_chain(Some(RecalcOperation::for_retire()), &key)
    }

    /// `recover` — also exposed to scripts as `recycle`; `amount` may be a
    /// fraction of recharge volume (`%`) or an absolute kg quantity.
    pub fn recover(
        &mut self,
        amount: Quantity,
        yield_rate: Quantity,
        displacement: Option<Quantity>,
        year_matcher: Option<YearMatcher>,
    ) -> Res<()> {
        if !self.year_applies(&year_matcher) {
            return Ok(());
        }
        let key = self.scope.use_key()?;
        let normalized = amount.normalized_units();
        let (recovery_rate, recovery_is_absolute_kg) = if normalized.numerator == "%" {
            (amount.value / Decimal::from(100), false)
        } else {
            let state = self.state_for(&key);
            (self.converter.convert(&amount, "kg", &state)?.value, true)
        };

        let state = self.state_for(&key);
        let yield_fraction = self.converter.convert(&yield_rate, "%", &state)?.value / Decimal::from(100);
        let displacement_percent = match displacement {
            Some(q) => Some(self.converter.convert(&q, "%", &state)?.value),
            None => None,
        };

        self.keeper
            .set_recovery(&key, recovery_rate, recovery_is_absolute_kg, yield_fraction, displacement_percent);
        self.run_chain(Some(RecalcOperation::for_recover()), &key)
    }

    pub fn replace(
        &mut self,
        amount: Quantity,
        stream: StreamName,
        dest_substance: impl Into<String>,
        year_matcher: Option<YearMatcher>,
    ) -> Res<()> {
        if !self.year_applies(&year_matcher) {
            return Ok(());
        }
        let source_key = self.scope.use_key()?;
        let dest_key = UseKey::new(source_key.application.clone(), dest_substance.into());

        let state = self.state_for(&source_key);
        let amount_canonical = self.converter.convert(&amount, stream.canonical_units(), &state)?.value;

        let source_current = self.keeper.get_stream(&source_key, stream).value;
        let new_source = clamp_non_negative(source_current - amount_canonical);
        self.keeper.set_stream(&source_key, stream, new_source)?;

        let dest_amount = self.bridge_via_units(&source_key, &dest_key, stream, amount_canonical);
        let dest_current = self.keeper.get_stream(&dest_key, stream).value;
        self.keeper.set_stream(&dest_key, stream, dest_current + dest_amount)?;

        self.run_chain(recalc_chain_for(stream), &source_key)?;
        self.run_chain(recalc_chain_for(stream), &dest_key)
    }

    /// Sets substance GHG intensity and recomputes consumption plus both
    /// emissions streams, so `equals` and `recharge`/`retire` commute.
    pub fn equals(&mut self, intensity: Quantity, year_matcher: Option<YearMatcher>) -> Res<()> {
        if !self.year_applies(&year_matcher) {
            return Ok(());
        }
        let key = self.scope.use_key()?;
        let state = self.state_for(&key);
        let canonical = self.converter.convert(&intensity, "tCO2e/kg", &state)?.value;
        self.keeper.set_ghg_intensity(&key, canonical);
        self.run_chain(Some(RecalcOperation::for_equals()), &key)
    }

    pub fn enable(&mut self, stream: StreamName, year_matcher: Option<YearMatcher>) -> Res<()> {
        if !self.year_applies(&year_matcher) {
            return Ok(());
        }
        let key = self.scope.use_key()?;
        self.keeper.enable(&key, stream);
        Ok(())
    }

    /// No-op outside the year-matcher window, not a zero-write — kept
    /// consistent with every other command's year-gating behavior.
    pub fn set_initial_charge(&mut self, value: Quantity, channel: Channel, year_matcher: Option<YearMatcher>) -> Res<()> {
        if !self.year_applies(&year_matcher) {
            return Ok(());
        }
        let key = self.scope.use_key()?;
        let state = self.state_for(&key);
        let canonical = self.converter.convert(&value, "kg/unit", &state)?.value;
        self.keeper.set_initial_charge(&key, channel, canonical);
        Ok(())
    }
}
