//! KigaliSim simulation engine: stream storage, unit conversion, the
//! recalculation graph, and the command API that QubecTalk scripts (lexed
//! and parsed elsewhere) drive through the [`operations`] adapter layer.

pub mod decimal;
pub mod engine;
pub mod error;
pub mod operations;
pub mod quantity;
pub mod recalc;
pub mod serializer;
pub mod streams;
pub mod units;

pub use engine::{Engine, YearMatcher};
pub use error::{EngineError, Res};
pub use quantity::Quantity;
pub use serializer::{EngineResult, Serializer, TradeSupplement};
pub use streams::{Channel, Scope, StreamKeeper, StreamName, UseKey};
