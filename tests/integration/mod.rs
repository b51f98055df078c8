//! Integration test suite for the intelligence orchestrator.
//!
//! These tests drive the public API end to end: planning, execution with
//! retry and fallback, and analytics over the shared history.
//!
//! # Test Categories
//!
//! - `planning`: decision policy and graph analysis
//! - `execution`: dispatch, prospect propagation, progress events
//! - `recovery`: retry, fallback substitution, fail-fast, timeouts
//! - `analytics`: history aggregation across runs
//! - `configuration`: config files driving orchestrator behavior
//!
//! All providers are mocked; no test makes a network call.

mod fixtures;

mod analytics;
mod execution;
