// Domain layer - Dashboard state model and pure structural rules
pub mod dashboard;
pub mod data_source;
pub mod grid;
pub mod path;
pub mod payload;
pub mod schema;
