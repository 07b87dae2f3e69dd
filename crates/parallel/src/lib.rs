//! # LandDelta Parallel
//!
//! Execution modes for the independent units of the pipeline: scenes in a
//! sequence and years in a series. Work is expressed as a map over owned or
//! shared inputs followed by a join; no unit mutates shared state.

pub mod strategy;

pub use strategy::{num_cpus, set_num_threads, ParallelError, ParallelStrategy, ProcessingMode};
