//! mailtriage - Message classification and label-driven mailbox engine
//!
//! Every synced message gets exactly one logical destination: deterministic
//! rules run first, then two independent AI classifiers whose disagreement
//! is settled by a review call. The outcome is a durable classification
//! record; folders are virtual views over those records, and "deleting" is a
//! label until the Deleted folder is emptied for real.
//!
//! ## Module Organization
//!
//! - `adapters/sqlite/`: durable state (messages, classifications, vocabulary, whitelist)
//! - `adapters/ai/`: classifier endpoint boundary
//! - `services/classify/`: rules, prompts, consensus, batch orchestration
//! - `services/`: label operations, storage accounting, post-sync handling
//! - `config/`: configuration management

pub mod adapters;
pub mod config;
pub mod error;
pub mod services;

pub use adapters::sqlite::DbPool;
pub use error::{EngineError, Result};
