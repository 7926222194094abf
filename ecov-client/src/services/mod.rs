//! External services

pub mod audit_client;

pub use audit_client::{AuditClient, AuditError, AuditService, InputLimits};
