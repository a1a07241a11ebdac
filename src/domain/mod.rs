//! Core domain types and logic.

pub mod error;
pub mod price_series;
pub mod holdout;
pub mod parameters;
pub mod simulation;
pub mod parameter_space;
pub mod optimizer;
pub mod config;
