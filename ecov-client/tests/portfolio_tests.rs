//! Portfolio book and identity switching through a full ClientState

mod helpers;

use ecov_client::portfolios::{available_companies, AddOutcome};
use ecov_client::services::{AuditClient, InputLimits};
use ecov_client::session::{Identity, StaticIdentityProvider};
use ecov_client::store::{Backend, MemoryRemoteStore};
use ecov_client::{ClientState, RemoteStores, SyncError};
use ecov_common::{Portfolio, PortfolioCompany, Report};
use helpers::{memory_db, portfolio_draft, spawn_audit_api, spawn_document_store, ScriptedAudit};
use helpers::{audit_payload, GOOD_TOKEN};
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

async fn anonymous_state(db: sqlx::SqlitePool, remote: RemoteStores) -> ClientState {
    let audit = ScriptedAudit::new();
    audit.on("Acme", vec![Ok(audit_payload("Acme", 72.0))]);
    audit.on("Globex", vec![Ok(audit_payload("Globex", 41.0))]);
    let state = ClientState::new(db, audit, remote, InputLimits::default()).await;
    state.start(&StaticIdentityProvider::new(None)).await.unwrap();
    state
}

fn company(name: &str, score: f64) -> PortfolioCompany {
    PortfolioCompany::new(name, score, None, ecov_common::time::now())
}

#[tokio::test]
async fn test_blank_name_rejected() {
    let state = anonymous_state(memory_db().await, RemoteStores::memory()).await;
    let err = state.portfolios.create(portfolio_draft("   ")).await.unwrap_err();
    assert!(matches!(err, SyncError::Invalid(_)));
    assert!(state.portfolios.list().await.is_empty());
}

#[tokio::test]
async fn test_add_from_report_skips_duplicate_names() {
    let state = anonymous_state(memory_db().await, RemoteStores::memory()).await;
    state.desk.generate_audit("Acme").await.unwrap();
    let report = state.desk.current_report().await.unwrap();

    let portfolio = state.portfolios.create(portfolio_draft("Watchlist")).await.unwrap();
    let outcome = state
        .portfolios
        .add_from_report(&portfolio.id, &report)
        .await
        .unwrap();
    let AddOutcome::Added(updated) = outcome else {
        panic!("company was not added");
    };
    assert_eq!(updated.companies.len(), 1);
    assert_eq!(updated.companies[0].source_report_id.as_deref(), Some(report.id.as_str()));

    let again = state
        .portfolios
        .add_from_report(&portfolio.id, &report)
        .await
        .unwrap();
    assert_eq!(again, AddOutcome::AlreadyPresent);
    assert_eq!(state.portfolios.list().await[0].companies.len(), 1);
}

#[tokio::test]
async fn test_available_companies_follow_reports() {
    let state = anonymous_state(memory_db().await, RemoteStores::memory()).await;
    state.desk.generate_audit("Acme").await.unwrap();
    state.desk.generate_audit("Globex").await.unwrap();

    let reports: Vec<Report> = state.reports.entities().await;
    let available = available_companies(&reports);
    let names: Vec<&str> = available.iter().map(|c| c.company_name.as_str()).collect();
    assert_eq!(names, vec!["Globex", "Acme"]);
    assert_eq!(available[0].score, 41.0);
}

#[tokio::test]
async fn test_remove_and_edit() {
    let state = anonymous_state(memory_db().await, RemoteStores::memory()).await;
    let book = &state.portfolios;
    let portfolio = book.create(portfolio_draft("Energy")).await.unwrap();
    let with_two = {
        book.add_company(&portfolio.id, company("Acme", 80.0)).await.unwrap();
        book.add_company(&portfolio.id, company("Globex", 35.0)).await.unwrap()
    };
    let acme_id = with_two.companies[0].id.clone();

    let after = book.remove_company(&portfolio.id, &acme_id).await.unwrap();
    assert_eq!(after.companies.len(), 1);
    assert_eq!(after.companies[0].company_name, "Globex");

    let err = book.remove_company(&portfolio.id, &acme_id).await.unwrap_err();
    assert!(matches!(err, SyncError::NotFound(_)));

    let edited = book
        .edit_details(&portfolio.id, "  Clean energy ", Some("Utilities".to_string()))
        .await
        .unwrap();
    assert_eq!(edited.name, "Clean energy");
    assert_eq!(edited.description.as_deref(), Some("Utilities"));

    let cleared = book.edit_details(&portfolio.id, "Clean energy", None).await.unwrap();
    assert_eq!(cleared.description, None);
    assert!(cleared.updated_at >= edited.updated_at);
}

#[tokio::test]
async fn test_recent_and_insights() {
    let state = anonymous_state(memory_db().await, RemoteStores::memory()).await;
    let book = &state.portfolios;
    let mut ids = Vec::new();
    for name in ["One", "Two", "Three", "Four"] {
        ids.push(book.create(portfolio_draft(name)).await.unwrap().id);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let recent: Vec<String> = book.recent().await.into_iter().map(|p| p.name).collect();
    assert_eq!(recent, vec!["Four", "Three", "Two"]);

    for (name, score) in [("A", 90.0), ("B", 70.0), ("C", 50.0), ("D", 30.0)] {
        book.add_company(&ids[0], company(name, score)).await.unwrap();
    }
    let insights = book.insights(&ids[0]).await.unwrap();
    assert_eq!(insights.total_companies, 4);
    assert_eq!(insights.average_score, 60.0);
    let low: Vec<&str> = insights
        .low_performers
        .iter()
        .map(|c| c.company_name.as_str())
        .collect();
    assert_eq!(low, vec!["D", "C", "B"]);

    let report = book.report(&ids[0]).await.unwrap();
    assert_eq!(report.insights, insights);
    assert!(book.insights("missing").await.is_none());
}

#[tokio::test]
async fn test_local_data_survives_restart() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("ecoverifier.db");

    let portfolio_id = {
        let db = ecov_common::db::init_database(&db_path).await.unwrap();
        let state = anonymous_state(db.clone(), RemoteStores::memory()).await;
        state.desk.generate_audit("Acme").await.unwrap();
        let p = state.portfolios.create(portfolio_draft("Kept")).await.unwrap();
        state
            .portfolios
            .add_company(&p.id, company("Acme", 72.0))
            .await
            .unwrap();
        db.close().await;
        p.id
    };

    let db = ecov_common::db::init_database(&db_path).await.unwrap();
    let state = anonymous_state(db, RemoteStores::memory()).await;
    let reloaded = state.portfolios.collection().get(&portfolio_id).await.unwrap();
    assert_eq!(reloaded.name, "Kept");
    assert_eq!(reloaded.companies.len(), 1);
    assert_eq!(state.reports.len().await, 1);
    assert_eq!(state.reports.backend().await, Some(Backend::Local));
}

#[tokio::test]
async fn test_sign_in_and_out_switches_backend() {
    let remote_portfolios = MemoryRemoteStore::<Portfolio>::new().with_assigned_ids();
    let remote = RemoteStores::from_memory(MemoryRemoteStore::new(), remote_portfolios.clone());
    let state = anonymous_state(memory_db().await, remote).await;

    let local = state.portfolios.create(portfolio_draft("Offline")).await.unwrap();
    state.portfolios.select(&local.id).await.unwrap();

    state
        .session
        .sign_in(
            Identity::new("alice")
                .with_token(GOOD_TOKEN)
                .with_display_name("Alice"),
        )
        .await
        .unwrap();
    assert_eq!(state.portfolios.collection().backend().await, Some(Backend::Remote));
    assert_eq!(
        state.session.current().and_then(|i| i.display_name),
        Some("Alice".to_string())
    );
    assert!(state.portfolios.list().await.is_empty());

    let online = state.portfolios.create(portfolio_draft("Online")).await.unwrap();
    assert!(online.id.starts_with("doc-"));
    assert_eq!(online.owner_id.as_deref(), Some("alice"));
    assert_eq!(remote_portfolios.documents().await.len(), 1);
    state.portfolios.select(&online.id).await.unwrap();

    state.session.sign_out().await.unwrap();
    assert_eq!(state.portfolios.collection().backend().await, Some(Backend::Local));
    let names: Vec<String> = state.portfolios.list().await.into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["Offline"]);
    assert!(state.portfolios.active().await.is_none());
}

#[tokio::test]
#[serial]
async fn test_signed_in_session_over_http() {
    let (store_url, store_state) = spawn_document_store().await;
    let audit_url = spawn_audit_api().await;
    let audit = Arc::new(
        AuditClient::new(audit_url, Duration::from_secs(5), InputLimits::default()).unwrap(),
    );
    let remote = RemoteStores::http(&store_url).unwrap();
    let state = ClientState::new(memory_db().await, audit, remote, InputLimits::default()).await;

    let provider = StaticIdentityProvider::from_args_or_env(
        Some("alice".to_string()),
        Some(GOOD_TOKEN.to_string()),
    );
    let identity = state.start(&provider).await.unwrap();
    assert_eq!(identity.map(|i| i.uid), Some("alice".to_string()));

    state.desk.generate_audit("Initech").await.unwrap();
    let report = state.desk.current_report().await.unwrap();
    assert!(report.id.starts_with("srv-"));

    let portfolio = state.portfolios.create(portfolio_draft("Remote")).await.unwrap();
    state
        .portfolios
        .add_from_report(&portfolio.id, &report)
        .await
        .unwrap();

    let docs = store_state.documents("portfolios");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["uid"], "alice");
    assert_eq!(docs[0]["companies"][0]["company"], "Initech");
    assert_eq!(docs[0]["companies"][0]["reportId"], report.id.as_str());
    assert_eq!(store_state.documents("reports").len(), 1);
}
