pub mod index_repository;
pub mod observation_repository;
pub mod price_source;
