//! [`Entity`] bindings for the data model

use super::Entity;
use chrono::{DateTime, Utc};
use ecov_common::db::{PORTFOLIOS_KEY, REPORTS_KEY};
use ecov_common::models::{extract_score, validate_name};
use ecov_common::{Error, Portfolio, PortfolioCompany, Report, ReportKind};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

/// Changed portfolio fields; `updatedAt` always moves
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `Some(None)` clears the description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub companies: Option<Vec<PortfolioCompany>>,
    pub updated_at: DateTime<Utc>,
}

impl PortfolioPatch {
    pub fn touch(now: DateTime<Utc>) -> Self {
        Self {
            name: None,
            description: None,
            companies: None,
            updated_at: now,
        }
    }

    pub fn companies(companies: Vec<PortfolioCompany>, now: DateTime<Utc>) -> Self {
        Self {
            companies: Some(companies),
            ..Self::touch(now)
        }
    }
}

impl Entity for Portfolio {
    type Patch = PortfolioPatch;

    const COLLECTION: &'static str = "portfolios";
    const LOCAL_KEY: &'static str = PORTFOLIOS_KEY;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    fn set_owner_id(&mut self, owner_id: Option<String>) {
        self.owner_id = owner_id;
    }

    fn created(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn last_modified(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn apply_patch(&mut self, patch: &PortfolioPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(companies) = &patch.companies {
            self.companies = companies.clone();
        }
        self.updated_at = patch.updated_at;
    }

    fn validate(&self) -> ecov_common::Result<()> {
        validate_name(&self.name)?;
        let mut seen = HashSet::new();
        for company in &self.companies {
            if !seen.insert(company.id.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "Company entry {} appears twice in portfolio {}",
                    company.id, self.name
                )));
            }
        }
        Ok(())
    }
}

/// Changed report fields
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportPatch {
    #[serde(rename = "claim", skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,
    #[serde(rename = "report", skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Entity for Report {
    type Patch = ReportPatch;

    const COLLECTION: &'static str = "reports";
    const LOCAL_KEY: &'static str = REPORTS_KEY;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    fn set_owner_id(&mut self, owner_id: Option<String>) {
        self.owner_id = owner_id;
    }

    fn created(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn apply_patch(&mut self, patch: &ReportPatch) {
        if let Some(subject) = &patch.subject_name {
            self.subject_name = subject.clone();
        }
        if let Some(payload) = &patch.payload {
            self.payload = payload.clone();
        }
    }

    fn validate(&self) -> ecov_common::Result<()> {
        if self.subject_name.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Report subject is empty. Enter a company name or claim.".to_string(),
            ));
        }
        validate_payload(self.kind, &self.payload)
    }
}

/// Required fields of an audit-service payload
///
/// Audits must carry a numeric GreenScore. Claim checks carry either a
/// verdict or a score.
pub fn validate_payload(kind: ReportKind, payload: &Value) -> ecov_common::Result<()> {
    let has_score = extract_score(payload).is_some();
    let ok = match kind {
        ReportKind::Audit => has_score,
        ReportKind::Claim => {
            has_score || payload.get("verdict").and_then(Value::as_str).is_some()
        }
    };
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "{} response is missing its required score",
            match kind {
                ReportKind::Audit => "Audit",
                ReportKind::Claim => "Claim check",
            }
        )))
    }
}
