//! checkride-core — Core exam engine, traits, and scoring.
//!
//! This crate defines the fundamental data model, the session orchestrator,
//! and the grading pipeline that the entire checkride system builds on.

pub mod engine;
pub mod error;
pub mod evaluator;
pub mod mastery;
pub mod model;
pub mod probe;
pub mod report;
pub mod selector;
pub mod traits;
pub mod verdict;
