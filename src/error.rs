//! Error taxonomy for the simulation engine.
//!
//! Errors are classified by cause, not by the component that raised them —
//! see DESIGN.md for the mapping back to spec language.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("operation requires an application and substance scope, but {missing} is unset")]
    ScopeMissing { missing: &'static str },

    #[error("cannot produce units `{target}` from `{from_unit}`")]
    UnsupportedUnits { from_unit: String, target: String },

    #[error("cannot combine quantities with incompatible units `{lhs}` and `{rhs}`")]
    IncompatibleUnits { lhs: String, rhs: String },

    #[error("scenario `{0}` not found")]
    ScenarioNotFound(String),

    #[error("policy `{0}` not found")]
    PolicyNotFound(String),

    #[error("conversion requires a non-zero `{denominator}` total and no static scale is available")]
    ZeroDenominatorUnrecoverable { denominator: String },

    #[error("script validation failed: {0}")]
    ValidationError(String),
}

/// Shorthand used throughout the engine; not to be confused with
/// [`crate::serializer::EngineResult`], the per-year snapshot type.
pub type Res<T> = Result<T, EngineError>;
