//! Core of the meal-plan generation service: the six-stage pipeline, the
//! plan scoring engine, the job queue abstraction, the retrying worker pool,
//! progress notification and the persistence handoff.

pub mod config;
pub mod error;
pub mod model;
pub mod notify;
pub mod persistence;
pub mod pipeline;
pub mod queue;
pub mod sanitize;
pub mod scoring;
pub mod worker;
