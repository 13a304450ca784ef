//! CryptoSage: social bot that turns natural-language claims into on-chain bets.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod llm;
pub mod data;
pub mod social;
pub mod ledger;
pub mod storage;
pub mod engine;
pub mod api;
