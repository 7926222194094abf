//! Audit and claim-check requests
//!
//! Each submission takes a request token. Only the response to the newest
//! submission may become the displayed report; older responses are dropped.
//! The last submitted input is kept verbatim so a retryable failure can be
//! re-issued unchanged.

use crate::collection::SyncedCollection;
use crate::error::{SyncError, UserFacingError};
use crate::services::audit_client::validate_input;
use crate::services::{AuditError, AuditService, InputLimits};
use crate::session::{Identity, Reloadable};
use crate::store::validate_payload;
use async_trait::async_trait;
use ecov_common::{time, Report, ReportKind};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// One user submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditRequest {
    Company(String),
    Claim(String),
}

impl AuditRequest {
    pub fn kind(&self) -> ReportKind {
        match self {
            AuditRequest::Company(_) => ReportKind::Audit,
            AuditRequest::Claim(_) => ReportKind::Claim,
        }
    }

    pub fn input(&self) -> &str {
        match self {
            AuditRequest::Company(s) | AuditRequest::Claim(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Report recorded; `displayed` is false when a newer request took over
    /// while it was being saved
    Completed { report: Report, displayed: bool },
    /// A newer request was issued before the response arrived
    Superseded,
}

#[derive(Default)]
struct DeskState {
    next_token: u64,
    in_flight: Option<u64>,
    last_request: Option<AuditRequest>,
    error: Option<UserFacingError>,
}

pub struct AuditDesk {
    service: Arc<dyn AuditService>,
    reports: Arc<SyncedCollection<Report>>,
    limits: InputLimits,
    state: Mutex<DeskState>,
}

impl AuditDesk {
    pub fn new(
        service: Arc<dyn AuditService>,
        reports: Arc<SyncedCollection<Report>>,
        limits: InputLimits,
    ) -> Self {
        Self {
            service,
            reports,
            limits,
            state: Mutex::new(DeskState::default()),
        }
    }

    pub fn reports(&self) -> &Arc<SyncedCollection<Report>> {
        &self.reports
    }

    pub async fn generate_audit(&self, company: &str) -> Result<SubmitOutcome, SyncError> {
        self.submit(AuditRequest::Company(company.to_string())).await
    }

    pub async fn check_claim(&self, claim: &str) -> Result<SubmitOutcome, SyncError> {
        self.submit(AuditRequest::Claim(claim.to_string())).await
    }

    /// Re-issue the last submission after a retryable failure
    pub async fn retry(&self) -> Result<SubmitOutcome, SyncError> {
        let request = {
            let state = self.state.lock().await;
            match (&state.last_request, &state.error) {
                (Some(request), Some(error)) if error.retryable => request.clone(),
                _ => {
                    return Err(SyncError::Invalid(
                        "There is no failed request to retry.".to_string(),
                    ))
                }
            }
        };
        info!(kind = ?request.kind(), "Retrying last request");
        self.submit(request).await
    }

    pub async fn submit(&self, request: AuditRequest) -> Result<SubmitOutcome, SyncError> {
        let max = match request.kind() {
            ReportKind::Audit => self.limits.max_input_chars,
            ReportKind::Claim => self.limits.max_claim_chars,
        };

        let token = {
            let mut state = self.state.lock().await;
            state.error = None;
            state.last_request = Some(request.clone());
            if let Err(e) = validate_input(request.input(), max) {
                let err = SyncError::Audit(e);
                state.error = Some(err.to_user_facing());
                return Err(err);
            }
            state.next_token += 1;
            state.in_flight = Some(state.next_token);
            state.next_token
        };

        let subject = request.input().trim().to_string();
        let kind = request.kind();
        debug!(token, kind = ?kind, "Submitting audit request");

        let response = match &request {
            AuditRequest::Company(_) => self.service.generate_audit(&subject).await,
            AuditRequest::Claim(_) => self.service.check_claim(&subject).await,
        };

        let payload = {
            let mut state = self.state.lock().await;
            if state.in_flight != Some(token) {
                warn!(token, "Dropping response to superseded request");
                return Ok(SubmitOutcome::Superseded);
            }

            let checked = response.and_then(|payload| {
                validate_payload(kind, &payload)
                    .map(|_| payload)
                    .map_err(|e| AuditError::MalformedResponse(e.to_string()))
            });
            match checked {
                Ok(payload) => payload,
                Err(e) => {
                    state.in_flight = None;
                    let err = SyncError::Audit(e);
                    state.error = Some(err.to_user_facing());
                    return Err(err);
                }
            }
        };

        let report = Report {
            id: String::new(),
            owner_id: None,
            subject_name: subject,
            kind,
            payload,
            created_at: time::now(),
        };
        let created = self.reports.create(report).await;

        let mut state = self.state.lock().await;
        let current = state.in_flight == Some(token);
        if current {
            state.in_flight = None;
        }
        match created {
            Ok(report) => {
                if current && self.reports.select(&report.id).await.is_err() {
                    debug!(id = %report.id, "Report left the list before it could be shown");
                }
                info!(id = %report.id, score = ?report.score(), displayed = current, "Report recorded");
                Ok(SubmitOutcome::Completed {
                    report,
                    displayed: current,
                })
            }
            Err(e) => {
                if current {
                    state.error = Some(e.to_user_facing());
                }
                Err(e)
            }
        }
    }

    pub async fn is_loading(&self) -> bool {
        self.state.lock().await.in_flight.is_some()
    }

    pub async fn error(&self) -> Option<UserFacingError> {
        self.state.lock().await.error.clone()
    }

    pub async fn last_request(&self) -> Option<AuditRequest> {
        self.state.lock().await.last_request.clone()
    }

    /// Report currently on display
    pub async fn current_report(&self) -> Option<Report> {
        self.reports.active().await
    }
}

#[async_trait]
impl Reloadable for AuditDesk {
    fn name(&self) -> &str {
        "audit-desk"
    }

    /// Responses to requests issued for another identity are dropped
    async fn reload(&self, _identity: Option<&Identity>) -> Result<(), SyncError> {
        let mut state = self.state.lock().await;
        if state.in_flight.take().is_some() {
            debug!("Abandoning in-flight request after identity change");
        }
        Ok(())
    }

    async fn clear_transient(&self) {
        let mut state = self.state.lock().await;
        state.error = None;
        state.last_request = None;
    }
}
