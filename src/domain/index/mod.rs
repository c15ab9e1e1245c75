pub mod builder;
pub mod changes;
pub mod performance;
