//! Integration test suite for zinc.
//!
//! Drives real wallets against a scripted in-memory sync provider, through
//! full sync and spend cycles and under hostile delivery orders.

pub mod helpers;
