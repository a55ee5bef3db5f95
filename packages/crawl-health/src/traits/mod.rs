//! Core trait abstractions.

pub mod store;

pub use store::HealthStore;
