//! Data model
//!
//! Field names on the wire are the stored document names (`uid`, `company`,
//! `greenscore`, `claim`, `report`, ...), shared by the local profile and
//! the document store.

use crate::{score, Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Company entry inside a portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioCompany {
    pub id: String,
    /// Free-text company name (not unique)
    #[serde(rename = "company")]
    pub company_name: String,
    /// Raw GreenScore as stored; consumers clamp
    #[serde(rename = "greenscore", deserialize_with = "lenient_score")]
    pub score: f64,
    pub added_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// Weak reference to the report this entry came from (lookup only)
    #[serde(rename = "reportId", default, skip_serializing_if = "Option::is_none")]
    pub source_report_id: Option<String>,
}

impl PortfolioCompany {
    /// New entry with a fresh client-side id
    pub fn new(
        company_name: impl Into<String>,
        score: f64,
        source_report_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: crate::uuid_utils::generate_id(),
            company_name: company_name.into(),
            score,
            added_at: now,
            last_updated: now,
            source_report_id,
        }
    }

    /// Score clamped to [0, 100]
    pub fn clamped_score(&self) -> f64 {
        score::clamp(self.score)
    }
}

/// User-curated named collection of companies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Display order is insertion order
    #[serde(default)]
    pub companies: Vec<PortfolioCompany>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "uid", default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

/// Input for creating a portfolio
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortfolioDraft {
    pub name: String,
    pub description: Option<String>,
    pub companies: Vec<PortfolioCompany>,
}

impl PortfolioDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_company(mut self, company: PortfolioCompany) -> Self {
        self.companies.push(company);
        self
    }

    /// Build the portfolio record, trimming name and description
    pub fn into_portfolio(self, id: String, now: DateTime<Utc>) -> Result<Portfolio> {
        let name = validate_name(&self.name)?;
        let mut portfolio = Portfolio {
            id,
            name,
            description: normalize_description(self.description),
            companies: Vec::with_capacity(self.companies.len()),
            created_at: now,
            updated_at: now,
            owner_id: None,
        };
        for company in self.companies {
            portfolio.push_company(company)?;
        }
        Ok(portfolio)
    }
}

/// Trim a portfolio name and reject empty / whitespace-only names
pub fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(
            "Portfolio name is required. Enter a name for the portfolio.".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

impl Portfolio {
    pub fn refresh_updated_at(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    pub fn company(&self, company_id: &str) -> Option<&PortfolioCompany> {
        self.companies.iter().find(|c| c.id == company_id)
    }

    /// Case-sensitive name match, used by the add-from-report flow
    pub fn has_company_named(&self, company_name: &str) -> bool {
        self.companies.iter().any(|c| c.company_name == company_name)
    }

    /// Append a company; entry ids must stay unique within the portfolio
    pub fn add_company(&mut self, company: PortfolioCompany, now: DateTime<Utc>) -> Result<()> {
        self.push_company(company)?;
        self.refresh_updated_at(now);
        Ok(())
    }

    /// Remove a company by entry id. Returns false if it was not present.
    pub fn remove_company(&mut self, company_id: &str, now: DateTime<Utc>) -> bool {
        let before = self.companies.len();
        self.companies.retain(|c| c.id != company_id);
        let removed = self.companies.len() != before;
        if removed {
            self.refresh_updated_at(now);
        }
        removed
    }

    /// Replace name and description
    pub fn edit_details(
        &mut self,
        name: &str,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.name = validate_name(name)?;
        self.description = normalize_description(description);
        self.refresh_updated_at(now);
        Ok(())
    }

    fn push_company(&mut self, company: PortfolioCompany) -> Result<()> {
        if self.company(&company.id).is_some() {
            return Err(Error::InvalidInput(format!(
                "Company entry {} is already in portfolio {}",
                company.id, self.id
            )));
        }
        self.companies.push(company);
        Ok(())
    }
}

/// Which audit-service endpoint produced a report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    /// Company audit (`generate-audit`)
    #[default]
    Audit,
    /// Sustainability claim check (`check`)
    Claim,
}

/// Stored result of one audit or claim-check request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    #[serde(rename = "uid", default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// Company name or claim text as submitted
    #[serde(rename = "claim")]
    pub subject_name: String,
    #[serde(default)]
    pub kind: ReportKind,
    /// Opaque audit-service response
    #[serde(rename = "report")]
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl Report {
    /// Raw numeric score from the payload, if any
    pub fn score(&self) -> Option<f64> {
        extract_score(&self.payload)
    }

    /// Payload score clamped to [0, 100]; a missing score counts as 0
    pub fn clamped_score(&self) -> f64 {
        score::clamp_opt(self.score())
    }

    /// Company named by the payload, falling back to the submitted subject
    pub fn company_name(&self) -> &str {
        self.payload
            .get("company")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(&self.subject_name)
    }
}

/// Locate the numeric GreenScore in an audit-service payload
///
/// Checks `greenscore.score` first, then a top-level `score`. Only JSON
/// numbers count.
pub fn extract_score(payload: &Value) -> Option<f64> {
    payload
        .get("greenscore")
        .and_then(|g| g.get("score"))
        .and_then(Value::as_f64)
        .or_else(|| payload.get("score").and_then(Value::as_f64))
}

/// Accept numbers, numeric strings and null; anything unusable becomes NaN
/// (which every consumer clamps to 0).
fn lenient_score<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    })
}
