//! Tests for the continuation runtime
//!
//! Organized by feature area; every scenario runs under both strategies.

mod construct_tests;
mod control_tests;
mod helpers;
mod replay_tests;
