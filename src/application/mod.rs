pub mod build_index;
pub mod fetch;
pub mod ingest;
pub mod query;
pub mod retry;
