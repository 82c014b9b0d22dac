pub mod keeper;
pub mod types;

pub use keeper::{Configuration, StreamKeeper};
pub use types::{Channel, Scope, StreamName, UseKey};
