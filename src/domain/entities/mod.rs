pub mod composition;
pub mod observation;
pub mod performance;
