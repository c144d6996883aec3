mod database;
pub mod model;

pub use database::initialize;
