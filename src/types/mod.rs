pub mod data_point;
pub mod resolution;
pub mod subscription;
pub mod symbol;

pub use data_point::{Batch, DataPoint, DataPointPayload};
pub use resolution::Resolution;
pub use subscription::SubscriptionConfig;
pub use symbol::{Symbol, SymbolName};
