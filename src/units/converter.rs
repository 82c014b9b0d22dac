//! The Unit Converter: `convert(src, dstUnits, state) -> Quantity`.
//!
//! The state context (population, volume, amortized unit volume,
//! intensities, totals, years elapsed) is supplied by
//! [`crate::units::state::StateContext`] so the converter itself holds no
//! mutable state and is trivially reusable across scopes.

use rust_decimal::Decimal;

use crate::decimal::round_half_up;
use crate::error::{EngineError, Res};
use crate::quantity::{NormalizedUnits, Quantity};
use crate::units::state::StateContext;

/// Fixed scale applied to every division that crosses a denominator total —
/// the only place in a conversion where the result can fail to terminate.
const RATIO_SCALE: u32 = 10;

#[derive(Debug, Default, Clone, Copy)]
pub struct UnitConverter;

impl UnitConverter {
    pub fn new() -> Self {
        Self
    }

    pub fn convert(&self, src: &Quantity, dst_units: &str, state: &StateContext) -> Res<Quantity> {
        let src_norm = src.normalized_units();
        let dst_norm = NormalizedUnits::parse(dst_units);

        if src_norm == dst_norm {
            return Ok(Quantity::new(src.value, dst_units.to_string()));
        }
        if src.is_zero() {
            return Ok(Quantity::zero(dst_units.to_string()));
        }

        // Same-denominator shortcut: convert the numerator only.
        if let (Some(sd), Some(dd)) = (&src_norm.denominator, &dst_norm.denominator) {
            if sd == dd {
                let value =
                    convert_numerator(src.value, &src_norm.numerator, &dst_norm.numerator, state)?;
                return Ok(Quantity::new(value, dst_units.to_string()));
            }
            // Statically-equivalent denominators (kg<->mt, unit<->units,
            // year<->years) never need the state context's totals.
            if let Some(scale) = static_denominator_scale(Some(sd), dd) {
                let value =
                    convert_numerator(src.value, &src_norm.numerator, &dst_norm.numerator, state)?;
                return Ok(Quantity::new(value * scale, dst_units.to_string()));
            }
        }

        // Normalize away the source's denominator (if any) to an absolute
        // quantity in the source's numerator unit.
        let abs_value = match &src_norm.denominator {
            Some(den) => normalize_ratio_denominator(src.value, den, state)?,
            None => src.value,
        };

        let dst_numerator_value =
            convert_numerator(abs_value, &src_norm.numerator, &dst_norm.numerator, state)?;

        match &dst_norm.denominator {
            None => Ok(Quantity::new(dst_numerator_value, dst_units.to_string())),
            Some(dst_den) => {
                let total = total_for_denominator(dst_den, state);
                if total.is_zero() {
                    if let Some(scale) =
                        static_denominator_scale(src_norm.denominator.as_deref(), dst_den)
                    {
                        return Ok(Quantity::new(
                            dst_numerator_value * scale,
                            dst_units.to_string(),
                        ));
                    }
                    if state.tolerate_empty_intensity {
                        return Ok(Quantity::zero(dst_units.to_string()));
                    }
                    return Err(EngineError::ZeroDenominatorUnrecoverable {
                        denominator: dst_den.clone(),
                    });
                }
                Ok(Quantity::new(
                    round_half_up(dst_numerator_value / total, RATIO_SCALE),
                    dst_units.to_string(),
                ))
            }
        }
    }
}

/// Multiply a ratio's numerator by the relevant total to produce an
/// absolute quantity.
fn normalize_ratio_denominator(value: Decimal, den: &str, state: &StateContext) -> Res<Decimal> {
    let total = total_for_denominator(den, state);
    if total.is_zero() {
        return if state.tolerate_empty_intensity {
            Ok(Decimal::ZERO)
        } else {
            Err(EngineError::ZeroDenominatorUnrecoverable {
                denominator: den.to_string(),
            })
        };
    }
    Ok(value * total)
}

fn total_for_denominator(den: &str, state: &StateContext) -> Decimal {
    match den {
        "unit" | "units" => state.population().value,
        "year" | "years" => state.years_elapsed(),
        "tCO2e" => state.total_ghg_consumption().value,
        "kwh" => state.total_energy_consumption().value,
        "kg" => state.volume().value,
        "mt" => state.volume().value / Decimal::from(1000),
        _ => Decimal::ZERO,
    }
}

/// Static scale factor between two unit categories that are trivially
/// interconvertible regardless of engine state — used when a ratio's
/// denominator total is zero and an absolute scale is used instead.
/// Returns a factor `f` such that
/// `value_with_denominator_to = value_with_denominator_from * f`. A
/// quantity "per mt" is 1000x larger than the same quantity "per kg" (1 mt
/// = 1000 kg, so a fixed amount of numerator is spread over a bucket 1000x
/// bigger in kg-terms, meaning 1000x more numerator per mt-bucket) — hence
/// `kg -> mt` multiplies by 1000, the inverse of the `kg -> mt` *value*
/// conversion used for bare (non-ratio) quantities.
fn static_denominator_scale(from: Option<&str>, to: &str) -> Option<Decimal> {
    let from = from?;
    match (from, to) {
        ("kg", "mt") => Some(Decimal::from(1000)),
        ("mt", "kg") => Some(Decimal::new(1, 3)), // 1/1000
        ("unit", "units") | ("units", "unit") => Some(Decimal::ONE),
        ("year", "years") | ("years", "year") => Some(Decimal::ONE),
        _ if from == to => Some(Decimal::ONE),
        _ => None,
    }
}

fn is_pivotable(unit: &str) -> bool {
    matches!(unit, "kg" | "mt" | "unit" | "units" | "tCO2e" | "kwh")
}

/// Convert an absolute (denominator-free) numerator from `src_unit` to
/// `dst_unit`.
fn convert_numerator(value: Decimal, src_unit: &str, dst_unit: &str, state: &StateContext) -> Res<Decimal> {
    if src_unit == dst_unit {
        return Ok(value);
    }
    if (src_unit == "unit" && dst_unit == "units") || (src_unit == "units" && dst_unit == "unit") {
        return Ok(value);
    }
    if (src_unit == "year" && dst_unit == "years") || (src_unit == "years" && dst_unit == "year") {
        return Ok(value);
    }

    if src_unit == "%" {
        return percent_to(value, dst_unit, state);
    }
    if dst_unit == "%" {
        return to_percent(value, src_unit, state);
    }

    if is_pivotable(src_unit) && is_pivotable(dst_unit) {
        let kg = to_kg(value, src_unit, state)?;
        return from_kg(kg, dst_unit, state);
    }

    Err(EngineError::UnsupportedUnits {
        from_unit: src_unit.to_string(),
        target: dst_unit.to_string(),
    })
}

fn percent_to(value: Decimal, dst_unit: &str, state: &StateContext) -> Res<Decimal> {
    let fraction = value / Decimal::from(100);
    match dst_unit {
        "unit" | "units" => Ok(fraction * state.population().value),
        "tCO2e" => Ok(fraction * state.total_ghg_consumption().value),
        "kwh" => Ok(fraction * state.total_energy_consumption().value),
        "year" | "years" => Ok(fraction * state.years_elapsed()),
        "kg" | "mt" => {
            let kg = fraction * state.volume().value;
            from_kg(kg, dst_unit, state)
        }
        _ => Err(EngineError::UnsupportedUnits {
            from_unit: "%".to_string(),
            target: dst_unit.to_string(),
        }),
    }
}

fn to_percent(value: Decimal, src_unit: &str, state: &StateContext) -> Res<Decimal> {
    let (numerator, total, name) = match src_unit {
        "unit" | "units" => (value, state.population().value, "population"),
        "tCO2e" => (value, state.total_ghg_consumption().value, "tCO2e total"),
        "kwh" => (value, state.total_energy_consumption().value, "kwh total"),
        "year" | "years" => (value, state.years_elapsed(), "years"),
        "kg" | "mt" => {
            let kg = to_kg(value, src_unit, state)?;
            (kg, state.volume().value, "volume")
        }
        _ => {
            return Err(EngineError::UnsupportedUnits {
                from_unit: src_unit.to_string(),
                target: "%".to_string(),
            })
        }
    };
    divide_or_zero_denominator(numerator, total, name, state).map(|v| v * Decimal::from(100))
}

fn to_kg(value: Decimal, src_unit: &str, state: &StateContext) -> Res<Decimal> {
    match src_unit {
        "kg" => Ok(value),
        "mt" => Ok(value * Decimal::from(1000)),
        "unit" | "units" => Ok(value * state.amortized_unit_volume().value),
        "tCO2e" => divide_or_zero_denominator(
            value,
            state.substance_consumption().value,
            "tCO2e/kg",
            state,
        ),
        "kwh" => divide_or_zero_denominator(value, state.energy_intensity().value, "kwh/kg", state),
        other => Err(EngineError::UnsupportedUnits {
            from_unit: other.to_string(),
            target: "kg".to_string(),
        }),
    }
}

fn from_kg(kg: Decimal, dst_unit: &str, state: &StateContext) -> Res<Decimal> {
    match dst_unit {
        "kg" => Ok(kg),
        "mt" => Ok(kg / Decimal::from(1000)),
        "unit" | "units" => {
            divide_or_zero_denominator(kg, state.amortized_unit_volume().value, "kg/unit", state)
        }
        "tCO2e" => Ok(kg * state.substance_consumption().value),
        "kwh" => Ok(kg * state.energy_intensity().value),
        other => Err(EngineError::UnsupportedUnits {
            from_unit: "kg".to_string(),
            target: other.to_string(),
        }),
    }
}

fn divide_or_zero_denominator(
    numerator: Decimal,
    denominator: Decimal,
    name: &str,
    state: &StateContext,
) -> Res<Decimal> {
    if denominator.is_zero() {
        return if state.tolerate_empty_intensity {
            Ok(Decimal::ZERO)
        } else {
            Err(EngineError::ZeroDenominatorUnrecoverable {
                denominator: name.to_string(),
            })
        };
    }
    Ok(round_half_up(numerator / denominator, RATIO_SCALE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streams::types::{Channel, UseKey};
    use crate::streams::StreamKeeper;
    use rust_decimal_macros::dec;

    fn base_state() -> (StreamKeeper, UseKey) {
        let mut keeper = StreamKeeper::new();
        let key = UseKey::new("Domestic Refrigeration", "HFC-134a");
        keeper.set_initial_charge(&key, Channel::Sales, dec!(1));
        keeper.set_ghg_intensity(&key, dec!(5));
        (keeper, key)
    }

    #[test]
    fn identity_conversion() {
        let (keeper, key) = base_state();
        let state = StateContext::base(&keeper, &key, Decimal::ZERO);
        let q = Quantity::new(dec!(10), "kg");
        let out = UnitConverter::new().convert(&q, "kg", &state).unwrap();
        assert_eq!(out.value, dec!(10));
    }

    #[test]
    fn zero_value_short_circuits() {
        let (keeper, key) = base_state();
        let state = StateContext::base(&keeper, &key, Decimal::ZERO);
        let q = Quantity::zero("kg");
        let out = UnitConverter::new().convert(&q, "unit", &state).unwrap();
        assert_eq!(out.value, Decimal::ZERO);
    }

    #[test]
    fn mt_to_kg_and_back() {
        let (keeper, key) = base_state();
        let state = StateContext::base(&keeper, &key, Decimal::ZERO);
        let q = Quantity::new(dec!(100), "mt");
        let kg = UnitConverter::new().convert(&q, "kg", &state).unwrap();
        assert_eq!(kg.value, dec!(100000));
        let back = UnitConverter::new().convert(&kg, "mt", &state).unwrap();
        assert_eq!(back.value, dec!(100));
    }

    #[test]
    fn kg_to_units_via_initial_charge() {
        let mut keeper = StreamKeeper::new();
        let key = UseKey::new("A", "B");
        keeper.set_initial_charge(&key, Channel::Sales, dec!(5));
        let state = StateContext::base(&keeper, &key, Decimal::ZERO);
        let q = Quantity::new(dec!(100), "kg");
        let out = UnitConverter::new().convert(&q, "units", &state).unwrap();
        assert_eq!(out.value, dec!(20));
    }

    #[test]
    fn kg_to_tco2e_via_intensity() {
        let (keeper, key) = base_state();
        let state = StateContext::base(&keeper, &key, Decimal::ZERO);
        let q = Quantity::new(dec!(100), "kg");
        let out = UnitConverter::new().convert(&q, "tCO2e", &state).unwrap();
        assert_eq!(out.value, dec!(500));
    }

    #[test]
    fn zero_denominator_errors_without_tolerance() {
        let mut keeper = StreamKeeper::new();
        let key = UseKey::new("A", "B");
        let state = StateContext::base(&keeper, &key, Decimal::ZERO);
        keeper.set_stream(&key, crate::streams::StreamName::Manufacture, dec!(1)).unwrap();
        let q = Quantity::new(dec!(100), "kg");
        let err = UnitConverter::new().convert(&q, "units", &state);
        assert!(matches!(err, Err(EngineError::ZeroDenominatorUnrecoverable { .. })));
    }

    #[test]
    fn zero_denominator_tolerated_returns_zero() {
        let keeper = StreamKeeper::new();
        let key = UseKey::new("A", "B");
        let state = StateContext::base(&keeper, &key, Decimal::ZERO).with_tolerate_empty_intensity(true);
        let q = Quantity::new(dec!(100), "kg");
        let out = UnitConverter::new().convert(&q, "units", &state).unwrap();
        assert_eq!(out.value, Decimal::ZERO);
    }

    #[test]
    fn ratio_same_denominator_shortcut() {
        let (keeper, key) = base_state();
        let state = StateContext::base(&keeper, &key, Decimal::ZERO);
        let q = Quantity::new(dec!(10), "kg/unit");
        let out = UnitConverter::new().convert(&q, "mt/unit", &state).unwrap();
        assert_eq!(out.value, dec!(0.01));
    }

    #[test]
    fn ratio_zero_denominator_falls_back_to_static_scale() {
        let mut keeper = StreamKeeper::new();
        let key = UseKey::new("A", "B");
        // population (units) is zero, so converting X/unit -> X/units should
        // not need the population total at all (unit<->units are synonyms).
        let state = StateContext::base(&keeper, &key, Decimal::ZERO);
        keeper.set_stream(&key, crate::streams::StreamName::Manufacture, dec!(1)).unwrap();
        let q = Quantity::new(dec!(10), "kg/unit");
        let out = UnitConverter::new().convert(&q, "kg/units", &state).unwrap();
        assert_eq!(out.value, dec!(10));
    }

    #[test]
    fn percent_of_population_round_trip() {
        let mut keeper = StreamKeeper::new();
        let key = UseKey::new("A", "B");
        keeper.set_stream(&key, crate::streams::StreamName::Equipment, dec!(200)).unwrap();
        let state = StateContext::base(&keeper, &key, Decimal::ZERO);
        let q = Quantity::new(dec!(25), "%");
        let units = UnitConverter::new().convert(&q, "units", &state).unwrap();
        assert_eq!(units.value, dec!(50));
        let back = UnitConverter::new().convert(&units, "%", &state).unwrap();
        assert_eq!(back.value, dec!(25));
    }
}
