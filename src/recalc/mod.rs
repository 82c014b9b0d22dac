pub mod kit;
pub mod operation;
pub mod strategies;

pub use kit::RecalcKit;
pub use operation::{PrimarySet, RecalcOperation, RecalcOperationBuilder};
pub use strategies::{consumption_split, sales_distribution, RecalcStrategy};
