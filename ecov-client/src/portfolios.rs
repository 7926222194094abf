//! Portfolio operations on top of the synced portfolio collection

use crate::collection::SyncedCollection;
use crate::error::SyncError;
use crate::store::PortfolioPatch;
use ecov_common::insights::{calculate_insights, generate_report, PortfolioReport};
use ecov_common::models::{validate_name, PortfolioDraft};
use ecov_common::{time, Insights, Portfolio, PortfolioCompany, Report};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Dashboard shows this many recently updated portfolios
pub const RECENT_LIMIT: usize = 3;

/// A scored company that can be added to a portfolio
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableCompany {
    #[serde(rename = "company")]
    pub company_name: String,
    #[serde(rename = "greenscore")]
    pub score: f64,
    pub report_id: String,
}

/// Companies offered by the add-to-portfolio picker: one per report that
/// carries a numeric score, in report order
pub fn available_companies(reports: &[Report]) -> Vec<AvailableCompany> {
    reports
        .iter()
        .filter_map(|report| {
            report.score().map(|score| AvailableCompany {
                company_name: report.company_name().to_string(),
                score,
                report_id: report.id.clone(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Added(Portfolio),
    /// A company with that name is already in the portfolio
    AlreadyPresent,
}

pub struct PortfolioBook {
    portfolios: Arc<SyncedCollection<Portfolio>>,
}

impl PortfolioBook {
    pub fn new(portfolios: Arc<SyncedCollection<Portfolio>>) -> Self {
        Self { portfolios }
    }

    pub fn collection(&self) -> &Arc<SyncedCollection<Portfolio>> {
        &self.portfolios
    }

    /// Create a portfolio; the name is checked before any store call
    pub async fn create(&self, draft: PortfolioDraft) -> Result<Portfolio, SyncError> {
        let portfolio = draft.into_portfolio(String::new(), time::now())?;
        let created = self.portfolios.create(portfolio).await?;
        info!(id = %created.id, name = %created.name, "Portfolio created");
        Ok(created)
    }

    /// Replace name and description (`None` clears the description)
    pub async fn edit_details(
        &self,
        id: &str,
        name: &str,
        description: Option<String>,
    ) -> Result<Portfolio, SyncError> {
        let name = validate_name(name)?;
        let description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        self.portfolios
            .update(
                id,
                PortfolioPatch {
                    name: Some(name),
                    description: Some(description),
                    ..PortfolioPatch::touch(time::now())
                },
            )
            .await
    }

    pub async fn add_company(
        &self,
        portfolio_id: &str,
        company: PortfolioCompany,
    ) -> Result<Portfolio, SyncError> {
        if company.company_name.trim().is_empty() {
            return Err(SyncError::Invalid(
                "Company name is required. Enter the company to add.".to_string(),
            ));
        }
        self.portfolios
            .update_with(portfolio_id, move |current| {
                let now = time::now();
                let mut next = current.clone();
                next.add_company(company, now)?;
                Ok(PortfolioPatch::companies(next.companies, now))
            })
            .await
    }

    /// Add the company a report describes, unless one with the same name is
    /// already in the portfolio
    pub async fn add_from_report(
        &self,
        portfolio_id: &str,
        report: &Report,
    ) -> Result<AddOutcome, SyncError> {
        let Some(score) = report.score() else {
            return Err(SyncError::Invalid(format!(
                "Report {} has no GreenScore. Run the audit again before adding it.",
                report.id
            )));
        };
        let name = report.company_name().to_string();

        let portfolio = self
            .portfolios
            .get(portfolio_id)
            .await
            .ok_or_else(|| SyncError::NotFound(format!("portfolio {portfolio_id}")))?;
        if portfolio.has_company_named(&name) {
            info!(portfolio = %portfolio_id, company = %name, "Company already in portfolio");
            return Ok(AddOutcome::AlreadyPresent);
        }

        let company = PortfolioCompany::new(name, score, Some(report.id.clone()), time::now());
        self.add_company(portfolio_id, company).await.map(AddOutcome::Added)
    }

    pub async fn remove_company(
        &self,
        portfolio_id: &str,
        company_id: &str,
    ) -> Result<Portfolio, SyncError> {
        let company_id = company_id.to_string();
        self.portfolios
            .update_with(portfolio_id, move |current| {
                let now = time::now();
                let mut next = current.clone();
                if !next.remove_company(&company_id, now) {
                    return Err(SyncError::NotFound(format!(
                        "company {} in portfolio {}",
                        company_id, current.name
                    )));
                }
                Ok(PortfolioPatch::companies(next.companies, now))
            })
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), SyncError> {
        self.portfolios.delete(id).await
    }

    pub async fn select(&self, id: &str) -> Result<Portfolio, SyncError> {
        self.portfolios.select(id).await
    }

    pub async fn active(&self) -> Option<Portfolio> {
        self.portfolios.active().await
    }

    pub async fn list(&self) -> Vec<Portfolio> {
        self.portfolios.entities().await
    }

    /// Most recently updated portfolios for the dashboard
    pub async fn recent(&self) -> Vec<Portfolio> {
        self.portfolios.recent(RECENT_LIMIT).await
    }

    pub async fn insights(&self, id: &str) -> Option<Insights> {
        self.portfolios.get(id).await.map(|p| calculate_insights(&p))
    }

    pub async fn report(&self, id: &str) -> Option<PortfolioReport> {
        self.portfolios
            .get(id)
            .await
            .map(|p| generate_report(&p, time::now()))
    }
}
