//! Unit tests for the agenthost CLI
//!
//! These tests use hand-written port mocks and run fast without external I/O.

mod architecture;
mod bootstrap_run_service;
mod helpers;
mod inventory_service;
mod mocks;
mod property_tests;
mod provision_service;
mod realize_service;
