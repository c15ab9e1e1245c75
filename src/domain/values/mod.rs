pub mod change_action;
pub mod date_range;
pub mod error_kind;
pub mod symbols;
