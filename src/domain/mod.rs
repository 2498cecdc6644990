pub mod calendar;
pub mod costs;
pub mod errors;
pub mod performance;
pub mod ports;
pub mod repositories;
pub mod types;
