//! The six recalculation steps, as a closed tagged enum (Design Note
//! "Replace strategy inheritance with tagged variants") rather than a
//! trait-object hierarchy. Each variant's `execute` reads/writes the
//! `StreamKeeper` through a [`RecalcKit`] for one [`UseKey`].

use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::decimal::{clamp_non_negative, round_half_up};
use crate::error::Res;
use crate::quantity::Quantity;
use crate::recalc::kit::RecalcKit;
use crate::streams::types::{Channel, StreamName, UseKey};
use crate::units::StateContext;

/// Fixed scale for every ratio division below — the split fractions and
/// population-change unit count are the only non-terminating divisions in
/// the recalculation graph.
const RATIO_SCALE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecalcStrategy {
    PopulationChange { subtract_recharge: bool },
    Sales,
    Consumption,
    RechargeEmissions,
    EolEmissions,
    Retire,
}

impl RecalcStrategy {
    pub fn execute(&self, kit: &mut RecalcKit, key: &UseKey) -> Res<()> {
        match self {
            RecalcStrategy::PopulationChange { subtract_recharge } => {
                population_change(kit, key, *subtract_recharge)
            }
            RecalcStrategy::Sales => sales(kit, key),
            RecalcStrategy::Consumption => consumption(kit, key),
            RecalcStrategy::RechargeEmissions => recharge_emissions(kit, key),
            RecalcStrategy::EolEmissions => eol_emissions(kit, key),
            RecalcStrategy::Retire => retire(kit, key),
        }
    }
}

/// (priorPopulation × rechargePopulation%) × rechargeIntensity(kg/unit).
fn recharge_population_units(kit: &RecalcKit, key: &UseKey) -> Decimal {
    let config = kit.keeper.config(key);
    let prior = kit.keeper.get_stream(key, StreamName::PriorEquipment).value;
    prior * config.recharge_population
}

fn recharge_volume_kg(kit: &RecalcKit, key: &UseKey) -> Decimal {
    let config = kit.keeper.config(key);
    recharge_population_units(kit, key) * config.recharge_intensity
}

/// Recovery volume applied to a recharge volume: a fraction of it, or an
/// absolute kg amount clamped so recovery never exceeds what was recharged.
fn recovery_volume_kg(kit: &RecalcKit, key: &UseKey, recharge_kg: Decimal) -> Decimal {
    let config = kit.keeper.config(key);
    if config.recovery_is_absolute_kg {
        clamp_non_negative(config.recovery_rate.min(recharge_kg))
    } else {
        recharge_kg * config.recovery_rate
    }
}

fn recycled_displaced_kg(kit: &RecalcKit, key: &UseKey) -> Decimal {
    let config = kit.keeper.config(key);
    let recharge_kg = recharge_volume_kg(kit, key);
    let recovered = recovery_volume_kg(kit, key, recharge_kg);
    let recycled = recovered * config.yield_rate;
    recycled * (config.displacement_rate / dec!(100))
}

/// The (manufacture, import) split fractions for distributing
/// `requiredKg`: prior-value ratio, then 100/0 on a single positive side,
/// then initial-charge ratio, failing closed on disabled channels
/// throughout. Takes the keeper directly (not a `RecalcKit`) so the
/// Serializer can reuse it for the import/export attribution split
/// without constructing a kit.
pub fn sales_distribution(keeper: &crate::streams::StreamKeeper, key: &UseKey) -> (Decimal, Decimal) {
    let m_enabled = keeper.is_enabled(key, StreamName::Manufacture);
    let i_enabled = keeper.is_enabled(key, StreamName::Import);

    if !m_enabled && !i_enabled {
        return (Decimal::ZERO, Decimal::ZERO);
    }
    if m_enabled && !i_enabled {
        return (Decimal::ONE, Decimal::ZERO);
    }
    if !m_enabled && i_enabled {
        return (Decimal::ZERO, Decimal::ONE);
    }

    let prior_m = keeper.get_stream(key, StreamName::Manufacture).value;
    let prior_i = keeper.get_stream(key, StreamName::Import).value;
    if !prior_m.is_zero() && !prior_i.is_zero() {
        let total = prior_m + prior_i;
        return (round_half_up(prior_m / total, RATIO_SCALE), round_half_up(prior_i / total, RATIO_SCALE));
    }
    if !prior_m.is_zero() {
        return (Decimal::ONE, Decimal::ZERO);
    }
    if !prior_i.is_zero() {
        return (Decimal::ZERO, Decimal::ONE);
    }

    let config = keeper.config(key);
    let charge_m = config.channel(Channel::Manufacture);
    let charge_i = config.channel(Channel::Import);
    let total = charge_m + charge_i;
    if total.is_zero() {
        (Decimal::ONE, Decimal::ZERO)
    } else {
        (round_half_up(charge_m / total, RATIO_SCALE), round_half_up(charge_i / total, RATIO_SCALE))
    }
}

fn population_change(kit: &mut RecalcKit, key: &UseKey, subtract_recharge: bool) -> Res<()> {
    let keeper = &kit.keeper;
    let prior_population = keeper.get_stream(key, StreamName::PriorEquipment).value;
    let sales_kg = keeper.get_stream(key, StreamName::Sales).value;
    let recharge_kg = if subtract_recharge {
        recharge_volume_kg(kit, key)
    } else {
        Decimal::ZERO
    };
    let available_for_new_kg = clamp_non_negative(sales_kg - recharge_kg);

    let config = kit.keeper.config(key);
    let initial_charge = config.channel(Channel::Sales);
    let delta_units = if initial_charge.is_zero() {
        Decimal::ZERO
    } else {
        round_half_up(available_for_new_kg / initial_charge, RATIO_SCALE)
    };

    let equipment = clamp_non_negative(prior_population + delta_units);
    let new_equipment = clamp_non_negative(delta_units);

    debug!(
        "PopulationChange {:?}: prior={} delta={} -> equipment={}",
        key, prior_population, delta_units, equipment
    );
    kit.keeper.set_stream(key, StreamName::Equipment, equipment)?;
    kit.keeper.set_stream(key, StreamName::NewEquipment, new_equipment)?;

    recharge_emissions(kit, key)
}

fn sales(kit: &mut RecalcKit, key: &UseKey) -> Res<()> {
    let recharge_kg = recharge_volume_kg(kit, key);
    let recycled_displaced = recycled_displaced_kg(kit, key);

    let converter = kit.converter;
    let state = StateContext::base(&*kit.keeper, key, kit.years_elapsed);
    let config = kit.keeper.config(key);
    let new_equipment_units = kit.keeper.get_stream(key, StreamName::NewEquipment).value;
    let kg_for_new = if config.channel(Channel::Sales).is_zero() {
        Decimal::ZERO
    } else {
        converter
            .convert(
                &Quantity::new(new_equipment_units, "units"),
                "kg",
                &state.clone().with_amortized_unit_volume_override(Quantity::new(
                    config.channel(Channel::Sales),
                    "kg/unit",
                )),
            )?
            .value
    };

    let gross_required_kg = clamp_non_negative(recharge_kg + kg_for_new);
    let net_required_kg = clamp_non_negative(gross_required_kg - recycled_displaced);

    let (pct_m, pct_i) = sales_distribution(kit.keeper, key);
    let manufacture = pct_m * net_required_kg;
    let import = pct_i * net_required_kg;

    debug!(
        "Sales {:?}: gross={} net={} recycle={} manufacture={} import={}",
        key, gross_required_kg, net_required_kg, recycled_displaced, manufacture, import
    );
    kit.keeper.set_stream(key, StreamName::Recycle, recycled_displaced)?;
    kit.keeper.set_stream(key, StreamName::Manufacture, manufacture)?;
    kit.keeper.set_stream(key, StreamName::Import, import)?;
    Ok(())
}

/// Shared by `ConsumptionRecalc` and the Serializer: splits total GHG/energy
/// consumption across domestic/import/recycle proportionally to the volume
/// each channel contributed, so the three lines always sum to the total.
pub fn consumption_split(manufacture: Decimal, import: Decimal, recycle: Decimal, total: Decimal) -> (Decimal, Decimal, Decimal) {
    let volume = manufacture + import + recycle;
    if volume.is_zero() {
        return (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);
    }
    (
        total * round_half_up(manufacture / volume, RATIO_SCALE),
        total * round_half_up(import / volume, RATIO_SCALE),
        total * round_half_up(recycle / volume, RATIO_SCALE),
    )
}

fn consumption(kit: &mut RecalcKit, key: &UseKey) -> Res<()> {
    let manufacture = kit.keeper.get_stream(key, StreamName::Manufacture).value;
    let import = kit.keeper.get_stream(key, StreamName::Import).value;
    let recycle = kit.keeper.get_stream(key, StreamName::Recycle).value;
    let export = kit.keeper.get_stream(key, StreamName::Export).value;
    let config = kit.keeper.config(key);
    let volume = manufacture + import + recycle;

    let total_ghg = clamp_non_negative(config.ghg_intensity * volume);
    let total_energy = clamp_non_negative(config.energy_intensity * volume);
    let (domestic, imported, recycled) = consumption_split(manufacture, import, recycle, total_ghg);
    let export_consumption = clamp_non_negative(config.ghg_intensity * export);

    debug!("Consumption {:?}: total={} energy={}", key, total_ghg, total_energy);
    kit.keeper.set_stream(key, StreamName::Consumption, total_ghg)?;
    kit.keeper.set_stream(key, StreamName::DomesticConsumption, domestic)?;
    kit.keeper.set_stream(key, StreamName::ImportConsumption, imported)?;
    kit.keeper.set_stream(key, StreamName::RecycleConsumption, recycled)?;
    kit.keeper.set_stream(key, StreamName::ExportConsumption, export_consumption)?;
    kit.keeper.set_stream(key, StreamName::Energy, total_energy)?;
    Ok(())
}

fn recharge_emissions(kit: &mut RecalcKit, key: &UseKey) -> Res<()> {
    let recharge_kg = recharge_volume_kg(kit, key);
    let config = kit.keeper.config(key);
    let recycle_consumption = kit.keeper.get_stream(key, StreamName::RecycleConsumption).value;

    let gross = clamp_non_negative(config.ghg_intensity * recharge_kg);
    let emissions = clamp_non_negative(gross - recycle_consumption);

    debug!("RechargeEmissions {:?}: {}", key, emissions);
    kit.keeper.set_stream(key, StreamName::RechargeEmissions, emissions)
}

fn eol_emissions(kit: &mut RecalcKit, key: &UseKey) -> Res<()> {
    let config = kit.keeper.config(key);
    let amortized_unit_volume = {
        let sales_charge = config.channel(Channel::Sales);
        if !sales_charge.is_zero() {
            sales_charge
        } else {
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
    };

    let retired_units = match kit.pending_retired_units.take() {
        Some(units) => units,
        None => kit.keeper.get_stream(key, StreamName::PriorEquipment).value * config.retirement_rate,
    };

    let emissions = clamp_non_negative(retired_units * amortized_unit_volume * config.ghg_intensity);
    debug!("EolEmissions {:?}: retired={} -> {}", key, retired_units, emissions);
    kit.keeper.set_stream(key, StreamName::EolEmissions, emissions)
}

fn retire(kit: &mut RecalcKit, key: &UseKey) -> Res<()> {
    let config = kit.keeper.config(key);
    let prior = kit.keeper.get_stream(key, StreamName::PriorEquipment).value;
    let equipment = kit.keeper.get_stream(key, StreamName::Equipment).value;
    let retired_units = prior * config.retirement_rate;

    kit.pending_retired_units = Some(retired_units);

    let new_prior = clamp_non_negative(prior - retired_units);
    let new_equipment = clamp_non_negative(equipment - retired_units);
    debug!("Retire {:?}: retired={} prior {}->{}", key, retired_units, prior, new_prior);
    kit.keeper.set_stream(key, StreamName::PriorEquipment, new_prior)?;
    kit.keeper.set_stream(key, StreamName::Equipment, new_equipment)?;
    Ok(())
}
