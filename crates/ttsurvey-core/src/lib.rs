//! ttsurvey-core — Session engine for listening-test studies.
//!
//! This crate holds everything a participant session needs apart from the
//! concrete document store: the data model, the seeded shuffle, the progress
//! state machine, the resumable local cache and the statistics used to report
//! results.

pub mod audio;
pub mod cache;
pub mod error;
pub mod model;
pub mod scheme;
pub mod sentences;
pub mod session;
pub mod shuffle;
pub mod state;
pub mod statistics;
pub mod traits;
pub mod validation;
