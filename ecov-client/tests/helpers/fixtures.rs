//! Test data builders

use ecov_common::models::PortfolioDraft;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::time::Duration;

pub async fn memory_db() -> SqlitePool {
    ecov_common::db::init_memory_database()
        .await
        .expect("Failed to create in-memory database")
}

/// Audit response in the shape the audit API returns
pub fn audit_payload(company: &str, score: f64) -> Value {
    json!({
        "company": company,
        "greenscore": {
            "score": score,
            "base_score": score - 5.0,
            "rationale": format!("{company} publishes verified emissions data"),
            "factors": ["Scope 1-3 reporting", "Renewable energy sourcing"]
        },
        "sources": [
            {
                "title": "Annual sustainability report",
                "url": "https://example.com/report",
                "summary": "Emissions fell year over year"
            }
        ],
        "eco_audit": { "findings": [] }
    })
}

pub fn claim_payload(claim: &str, verdict: &str) -> Value {
    json!({
        "restated_claim": claim,
        "verdict": verdict,
        "explanation": "Independent audits partially support the claim",
        "sources": []
    })
}

pub fn portfolio_draft(name: &str) -> PortfolioDraft {
    PortfolioDraft::new(name)
}

/// Poll `condition` until it holds (2 s limit)
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("Condition not met within 2 s");
}
