//! Portfolio insights
//!
//! Summary statistics over the companies of one portfolio. Every score is
//! clamped before it is counted, averaged or ranked. The result depends only
//! on the `companies` sequence, never on the clock.

use crate::models::{Portfolio, PortfolioCompany};
use crate::score::{self, ScoreBand};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of entries in each performer list
pub const PERFORMER_COUNT: usize = 3;

/// Per-band company counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreDistribution {
    pub excellent: usize,
    pub good: usize,
    pub fair: usize,
    pub poor: usize,
}

impl ScoreDistribution {
    fn record(&mut self, band: ScoreBand) {
        match band {
            ScoreBand::Excellent => self.excellent += 1,
            ScoreBand::Good => self.good += 1,
            ScoreBand::Fair => self.fair += 1,
            ScoreBand::Poor => self.poor += 1,
        }
    }

    pub fn count(&self, band: ScoreBand) -> usize {
        match band {
            ScoreBand::Excellent => self.excellent,
            ScoreBand::Good => self.good,
            ScoreBand::Fair => self.fair,
            ScoreBand::Poor => self.poor,
        }
    }

    pub fn total(&self) -> usize {
        self.excellent + self.good + self.fair + self.poor
    }
}

/// Score trend counts
///
/// No score history is kept, so every company counts as stable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trend {
    pub improving: usize,
    pub declining: usize,
    pub stable: usize,
}

/// Summary statistics for one portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    /// Mean clamped score rounded to one decimal; 0 for an empty portfolio
    pub average_score: f64,
    pub total_companies: usize,
    pub score_distribution: ScoreDistribution,
    /// Top companies, best first
    pub high_performers: Vec<PortfolioCompany>,
    /// Bottom companies, worst first
    pub low_performers: Vec<PortfolioCompany>,
    pub trend: Trend,
}

/// Portfolio snapshot bundled with its insights for export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioReport {
    pub portfolio: Portfolio,
    pub insights: Insights,
    pub generated_at: DateTime<Utc>,
}

/// Round half away from zero to one decimal place
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Compute insights for a portfolio
pub fn calculate_insights(portfolio: &Portfolio) -> Insights {
    let companies = &portfolio.companies;
    let total_companies = companies.len();

    let mut score_distribution = ScoreDistribution::default();
    let mut sum = 0.0;
    for company in companies {
        let s = company.clamped_score();
        sum += s;
        score_distribution.record(score::classify(s));
    }

    let average_score = if total_companies == 0 {
        0.0
    } else {
        round_one_decimal(sum / total_companies as f64)
    };

    // Stable: equal scores keep their first-seen order
    let mut by_score_desc: Vec<&PortfolioCompany> = companies.iter().collect();
    by_score_desc.sort_by(|a, b| b.clamped_score().total_cmp(&a.clamped_score()));

    let high_performers = by_score_desc
        .iter()
        .take(PERFORMER_COUNT)
        .map(|c| (*c).clone())
        .collect();

    // Last three of the descending order, reversed: worst first
    let tail_start = by_score_desc.len().saturating_sub(PERFORMER_COUNT);
    let low_performers = by_score_desc[tail_start..]
        .iter()
        .rev()
        .map(|c| (*c).clone())
        .collect();

    Insights {
        average_score,
        total_companies,
        score_distribution,
        high_performers,
        low_performers,
        trend: Trend {
            improving: 0,
            declining: 0,
            stable: total_companies,
        },
    }
}

/// Build an export bundle stamped with `generated_at`
pub fn generate_report(portfolio: &Portfolio, generated_at: DateTime<Utc>) -> PortfolioReport {
    PortfolioReport {
        portfolio: portfolio.clone(),
        insights: calculate_insights(portfolio),
        generated_at,
    }
}
