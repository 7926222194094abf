//! # EcoVerifier Common Library
//!
//! Shared code for the EcoVerifier client including:
//! - Data model (reports, portfolios, portfolio companies)
//! - GreenScore classification and portfolio insights
//! - CSV / plain-text export
//! - Configuration loading
//! - Local key-value database
//! - Utility functions

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod export;
pub mod insights;
pub mod models;
pub mod score;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
pub use insights::{calculate_insights, Insights};
pub use models::{Portfolio, PortfolioCompany, Report, ReportKind};
pub use score::{ColorBucket, ScoreBand};
