//! Integration tests for the agenthost CLI
//!
//! These tests spawn the actual binary and test end-to-end behavior.
//! None of them reach a cloud provider: only local commands are exercised.

mod cli_tests;
mod local_commands;
