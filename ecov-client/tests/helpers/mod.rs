//! Test Helper Utilities
//!
//! Shared utilities for testing ecov-client

#![allow(dead_code)]

pub mod fixtures;
pub mod mock_servers;
pub mod scripted;

pub use fixtures::{audit_payload, claim_payload, memory_db, portfolio_draft, wait_for};
pub use mock_servers::{spawn_audit_api, spawn_document_store, DocumentStoreState, GOOD_TOKEN};
pub use scripted::{FlakyStore, ScriptedAudit};
