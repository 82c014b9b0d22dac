//! `Quantity`: a decimal value paired with a unit string, plus the unit
//! normalization rules shared by every consumer of units (the Converter,
//! the Stream Keeper, and the Operations adapter).

use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Res};

/// A unit string split into its semantic parts: the base numerator/
/// denominator (with whitespace stripped) and whether an `eachyear`
/// qualifier was present. Interning happens once, at construction, per
/// Design Note "Unit parsing" — call sites hold a `NormalizedUnits`
/// instead of re-splitting a raw string in hot loops.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedUnits {
    pub numerator: String,
    pub denominator: Option<String>,
    pub per_year: bool,
}

impl NormalizedUnits {
    pub fn parse(raw: &str) -> Self {
        let stripped: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        let (base, per_year) = match stripped.strip_suffix("eachyear") {
            Some(rest) => (rest.to_string(), true),
            None => (stripped, false),
        };
        match base.split_once('/') {
            Some((num, den)) => NormalizedUnits {
                numerator: num.to_string(),
                denominator: Some(den.to_string()),
                per_year,
            },
            None => NormalizedUnits {
                numerator: base,
                denominator: None,
                per_year,
            },
        }
    }

    /// Reconstruct the canonical string form (used for error messages and
    /// round-tripping through the Quantity's `units` field).
    pub fn to_canonical_string(&self) -> String {
        let mut s = match &self.denominator {
            Some(den) => format!("{}/{}", self.numerator, den),
            None => self.numerator.clone(),
        };
        if self.per_year {
            s.push_str(" eachyear");
        }
        s
    }
}

/// A decimal value with an associated unit. Equality/arithmetic compare
/// units by normalized form, not by the raw string the caller passed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: Decimal,
    pub units: String,
}

impl Quantity {
    pub fn new(value: Decimal, units: impl Into<String>) -> Self {
        Self {
            value,
            units: units.into(),
        }
    }

    pub fn zero(units: impl Into<String>) -> Self {
        Self::new(Decimal::ZERO, units)
    }

    pub fn normalized_units(&self) -> NormalizedUnits {
        NormalizedUnits::parse(&self.units)
    }

    pub fn is_zero(&self) -> bool {
        crate::decimal::is_zero(self.value)
    }

    fn units_equal(&self, other: &Quantity) -> bool {
        self.normalized_units() == other.normalized_units()
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.units)
    }
}

impl Add for Quantity {
    type Output = Res<Quantity>;

    fn add(self, rhs: Quantity) -> Res<Quantity> {
        if !self.units_equal(&rhs) {
            return Err(EngineError::IncompatibleUnits {
                lhs: self.units.clone(),
                rhs: rhs.units.clone(),
            });
        }
        Ok(Quantity::new(self.value + rhs.value, self.units))
    }
}

impl Sub for Quantity {
    type Output = Res<Quantity>;

    fn sub(self, rhs: Quantity) -> Res<Quantity> {
        if !self.units_equal(&rhs) {
            return Err(EngineError::IncompatibleUnits {
                lhs: self.units.clone(),
                rhs: rhs.units.clone(),
            });
        }
        Ok(Quantity::new(self.value - rhs.value, self.units))
    }
}

impl Mul<Decimal> for Quantity {
    type Output = Quantity;

    fn mul(self, rhs: Decimal) -> Quantity {
        Quantity::new(self.value * rhs, self.units)
    }
}

impl Div<Decimal> for Quantity {
    type Output = Quantity;

    fn div(self, rhs: Decimal) -> Quantity {
        if crate::decimal::is_zero(rhs) {
            Quantity::new(Decimal::ZERO, self.units)
        } else {
            Quantity::new(self.value / rhs, self.units)
        }
    }
}

/// Combine two quantities' units lexically for multiplication/division
/// (`kg * (1/year)` -> `kg/year`). The Unit
/// Converter is responsible for normalizing the result downstream; this
/// function only builds the raw combined string.
pub fn combine_units_mul(lhs: &str, rhs: &str) -> String {
    let l = NormalizedUnits::parse(lhs);
    let r = NormalizedUnits::parse(rhs);
    // lhs.num/lhs.den * rhs.num/rhs.den -> (lhs.num*rhs.num)/(lhs.den*rhs.den)
    let num = match (l.denominator.as_deref(), r.numerator.as_str()) {
        (Some(ld), rn) if ld == rn => l.numerator.clone(),
        _ => format!("{}*{}", l.numerator, r.numerator),
    };
    let den = match (&l.denominator, &r.denominator) {
        (Some(ld), Some(rd)) => Some(format!("{}*{}", ld, rd)),
        (Some(ld), None) => Some(ld.clone()),
        (None, Some(rd)) => Some(rd.clone()),
        (None, None) => None,
    };
    match den {
        Some(d) => format!("{}/{}", num, d),
        None => num,
    }
}
