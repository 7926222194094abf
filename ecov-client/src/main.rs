//! ecoverifier - EcoVerifier command-line client
//!
//! Runs GreenScore audits and claim checks, keeps the resulting reports,
//! and manages portfolios of scored companies. Data is stored in the local
//! profile database when anonymous and in the document store when a user
//! id is given.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use ecov_client::desk::SubmitOutcome;
use ecov_client::portfolios::{available_companies, AddOutcome};
use ecov_client::services::{AuditClient, AuditService, InputLimits};
use ecov_client::session::StaticIdentityProvider;
use ecov_client::store::ReportPatch;
use ecov_client::{ClientState, RemoteStores, SyncError};
use ecov_common::config::{self, ClientSettings, ConfigOverrides};
use ecov_common::models::PortfolioDraft;
use ecov_common::{export, score, time, Portfolio, PortfolioCompany, Report};
use tracing::{debug, info};

/// Command-line arguments for ecoverifier
#[derive(Parser, Debug)]
#[command(name = "ecoverifier")]
#[command(about = "GreenScore audits, claim checks and portfolio tracking")]
#[command(version)]
struct Args {
    /// TOML config file (default: ~/.config/ecoverifier/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Folder holding the profile database
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Audit API base URL
    #[arg(long)]
    api_url: Option<String>,

    /// Document store base URL (signed-in use)
    #[arg(long)]
    remote_url: Option<String>,

    /// Document store implementation
    #[arg(long, value_enum, default_value_t = RemoteMode::Http)]
    remote: RemoteMode,

    /// Signed-in user id (falls back to ECOV_UID; anonymous when unset)
    #[arg(long)]
    uid: Option<String>,

    /// Bearer token for the document store (falls back to ECOV_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Log level when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RemoteMode {
    Http,
    Memory,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a GreenScore audit for a company
    Audit {
        company: String,
        #[command(flatten)]
        retry: RetryArgs,
    },
    /// Check a sustainability claim
    Check {
        claim: String,
        #[command(flatten)]
        retry: RetryArgs,
    },
    /// Saved reports
    #[command(subcommand)]
    Reports(ReportsCommand),
    /// Portfolios
    #[command(subcommand)]
    Portfolio(PortfolioCommand),
    /// Check that the audit API is reachable
    Health,
}

#[derive(ClapArgs, Debug)]
struct RetryArgs {
    /// Re-issue the request this many times after a retryable failure
    #[arg(long, default_value_t = 0)]
    retries: u32,
}

#[derive(Subcommand, Debug)]
enum ReportsCommand {
    /// List reports, newest first
    List,
    /// Show one report
    Show {
        id: String,
        /// Also write a text document into this folder
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Change the subject a report is filed under
    Rename { id: String, subject: String },
    Delete { id: String },
    /// Scored companies available for portfolios
    Companies,
}

#[derive(Subcommand, Debug)]
enum PortfolioCommand {
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List portfolios, newest first
    List,
    /// The three most recently updated portfolios
    Recent,
    /// Show companies and insights
    Show { id: String },
    /// Add a company by name and score
    Add {
        portfolio_id: String,
        company: String,
        score: f64,
    },
    /// Add the company from a saved report
    AddReport {
        portfolio_id: String,
        report_id: String,
    },
    /// Remove a company entry
    Remove {
        portfolio_id: String,
        company_id: String,
    },
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,
        #[arg(long)]
        clear_description: bool,
    },
    Delete { id: String },
    /// Write the portfolio as CSV
    Export {
        id: String,
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

/// Presentation boundary: only the user-facing message leaves
fn user_error(e: SyncError) -> anyhow::Error {
    debug!(error = %e, "Operation failed");
    anyhow!(e.to_user_facing().to_string())
}

fn init_tracing(level: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = config::load_toml_config_or_default(args.config.as_deref());
    let overrides = ConfigOverrides {
        root_folder: args.root_folder.clone(),
        api_base_url: args.api_url.clone(),
        remote_store_url: args.remote_url.clone(),
        log_level: args.log_level.clone(),
    };
    let settings = ClientSettings::resolve(&overrides, &toml_config);

    init_tracing(&settings.log_level);
    info!("ecoverifier {}", env!("CARGO_PKG_VERSION"));
    debug!("Root folder: {}", settings.root_folder.display());

    let audit = Arc::new(
        AuditClient::from_settings(&settings).context("Failed to create audit API client")?,
    );

    if let Command::Health = args.command {
        return health(audit.as_ref(), &settings).await;
    }

    settings
        .ensure_root_folder()
        .context("Failed to initialize root folder")?;
    let db = ecov_common::db::init_database(&settings.database_path())
        .await
        .context("Failed to open profile database")?;

    let provider = StaticIdentityProvider::from_args_or_env(args.uid.clone(), args.token.clone());
    let remote = match (args.remote, settings.remote_store_url.as_deref()) {
        (RemoteMode::Memory, _) => RemoteStores::memory(),
        (RemoteMode::Http, Some(url)) => {
            RemoteStores::http(url).context("Failed to create document store client")?
        }
        (RemoteMode::Http, None) => {
            if args.uid.is_some() || std::env::var(ecov_client::session::ENV_UID).is_ok() {
                bail!(
                    "Signed-in use needs a document store: pass --remote-url or set {}",
                    config::ENV_REMOTE_STORE_URL
                );
            }
            RemoteStores::memory()
        }
    };

    let state = ClientState::new(db, audit, remote, InputLimits::from_settings(&settings)).await;
    let identity = state.start(&provider).await.map_err(user_error)?;
    match &identity {
        Some(i) => info!(uid = %i.uid, "Signed in"),
        None => info!("Anonymous session"),
    }

    match args.command {
        Command::Audit { company, retry } => {
            let outcome = state.desk.generate_audit(&company).await;
            finish_submission(&state, outcome, retry.retries).await
        }
        Command::Check { claim, retry } => {
            let outcome = state.desk.check_claim(&claim).await;
            finish_submission(&state, outcome, retry.retries).await
        }
        Command::Reports(cmd) => reports(&state, cmd).await,
        Command::Portfolio(cmd) => portfolio(&state, cmd).await,
        Command::Health => Ok(()),
    }
}

async fn health(audit: &dyn AuditService, settings: &ClientSettings) -> Result<()> {
    match audit.health().await {
        Ok(status) => {
            println!("{} -> HTTP {}", settings.api_base_url, status);
            if (200..300).contains(&status) {
                Ok(())
            } else {
                bail!("Audit API answered with HTTP {status}")
            }
        }
        Err(e) => bail!(e.user_message()),
    }
}

async fn finish_submission(
    state: &ClientState,
    mut outcome: Result<SubmitOutcome, SyncError>,
    retries: u32,
) -> Result<()> {
    let mut attempts = 0;
    while let Err(e) = &outcome {
        if attempts >= retries || !e.is_retryable() {
            break;
        }
        attempts += 1;
        eprintln!("{} Retrying ({attempts}/{retries})...", e.to_user_facing().message);
        outcome = state.desk.retry().await;
    }

    match outcome.map_err(user_error)? {
        SubmitOutcome::Completed { report, .. } => {
            print!("{}", export::report_to_text(&report));
            println!("Saved as report {}", report.id);
            Ok(())
        }
        SubmitOutcome::Superseded => Ok(()),
    }
}

fn report_line(report: &Report) -> String {
    let score = report
        .score()
        .map(|s| {
            let s = score::clamp(s);
            format!("{:>5.1} {:<9}", s, score::label(s).label())
        })
        .unwrap_or_else(|| format!("{:>5} {:<9}", "-", "-"));
    format!(
        "{}  {}  {:?}  {}  {}",
        report.id,
        time::to_date(&report.created_at),
        report.kind,
        score,
        report.subject_name
    )
}

async fn find_report(state: &ClientState, id: &str) -> Result<Report> {
    state
        .reports
        .get(id)
        .await
        .ok_or_else(|| user_error(SyncError::NotFound(format!("report {id}"))))
}

async fn reports(state: &ClientState, cmd: ReportsCommand) -> Result<()> {
    match cmd {
        ReportsCommand::List => {
            let reports = state.reports.entities().await;
            if reports.is_empty() {
                println!("No reports yet. Run `ecoverifier audit <company>` to create one.");
            }
            for report in &reports {
                println!("{}", report_line(report));
            }
        }
        ReportsCommand::Show { id, export: dir } => {
            let report = state.reports.select(&id).await.map_err(user_error)?;
            print!("{}", export::report_to_text(&report));
            if let Some(dir) = dir {
                if let Some(path) = export::save_report_text(Some(&report), &dir)? {
                    println!("Wrote {}", path.display());
                }
            }
        }
        ReportsCommand::Rename { id, subject } => {
            let subject = subject.trim().to_string();
            let report = state
                .reports
                .update(
                    &id,
                    ReportPatch {
                        subject_name: Some(subject),
                        payload: None,
                    },
                )
                .await
                .map_err(user_error)?;
            println!("{}", report_line(&report));
        }
        ReportsCommand::Delete { id } => {
            state.reports.delete(&id).await.map_err(user_error)?;
            println!("Deleted report {id}");
        }
        ReportsCommand::Companies => {
            let reports = state.reports.entities().await;
            for company in available_companies(&reports) {
                println!(
                    "{:>5.1}  {}  (report {})",
                    score::clamp(company.score),
                    company.company_name,
                    company.report_id
                );
            }
        }
    }
    Ok(())
}

fn print_portfolio_summary(portfolio: &Portfolio) {
    println!(
        "{}  {}  {} companies  updated {}",
        portfolio.id,
        portfolio.name,
        portfolio.companies.len(),
        time::to_date(&portfolio.updated_at)
    );
}

async fn portfolio(state: &ClientState, cmd: PortfolioCommand) -> Result<()> {
    let book = &state.portfolios;
    match cmd {
        PortfolioCommand::Create { name, description } => {
            let mut draft = PortfolioDraft::new(name);
            if let Some(description) = description {
                draft = draft.with_description(description);
            }
            let portfolio = book.create(draft).await.map_err(user_error)?;
            print_portfolio_summary(&portfolio);
        }
        PortfolioCommand::List => {
            for portfolio in book.list().await {
                print_portfolio_summary(&portfolio);
            }
        }
        PortfolioCommand::Recent => {
            for portfolio in book.recent().await {
                print_portfolio_summary(&portfolio);
            }
        }
        PortfolioCommand::Show { id } => {
            let portfolio = book.select(&id).await.map_err(user_error)?;
            show_portfolio(state, &portfolio).await;
        }
        PortfolioCommand::Add {
            portfolio_id,
            company,
            score,
        } => {
            let company = PortfolioCompany::new(company.trim(), score, None, time::now());
            let portfolio = book
                .add_company(&portfolio_id, company)
                .await
                .map_err(user_error)?;
            print_portfolio_summary(&portfolio);
        }
        PortfolioCommand::AddReport {
            portfolio_id,
            report_id,
        } => {
            let report = find_report(state, &report_id).await?;
            match book
                .add_from_report(&portfolio_id, &report)
                .await
                .map_err(user_error)?
            {
                AddOutcome::Added(portfolio) => print_portfolio_summary(&portfolio),
                AddOutcome::AlreadyPresent => {
                    println!("{} is already in this portfolio", report.company_name())
                }
            }
        }
        PortfolioCommand::Remove {
            portfolio_id,
            company_id,
        } => {
            let portfolio = book
                .remove_company(&portfolio_id, &company_id)
                .await
                .map_err(user_error)?;
            print_portfolio_summary(&portfolio);
        }
        PortfolioCommand::Edit {
            id,
            name,
            description,
            clear_description,
        } => {
            let current = book
                .collection()
                .get(&id)
                .await
                .ok_or_else(|| user_error(SyncError::NotFound(format!("portfolio {id}"))))?;
            let name = name.unwrap_or_else(|| current.name.clone());
            let description = if clear_description {
                None
            } else {
                description.or(current.description.clone())
            };
            let portfolio = book
                .edit_details(&id, &name, description)
                .await
                .map_err(user_error)?;
            print_portfolio_summary(&portfolio);
        }
        PortfolioCommand::Delete { id } => {
            book.delete(&id).await.map_err(user_error)?;
            println!("Deleted portfolio {id}");
        }
        PortfolioCommand::Export { id, dir } => {
            let portfolio = book.collection().get(&id).await;
            match export::save_portfolio_csv(portfolio.as_ref(), &dir)? {
                Some(path) => println!("Wrote {}", path.display()),
                None => bail!("No portfolio with id {id}"),
            }
        }
    }
    Ok(())
}

async fn show_portfolio(state: &ClientState, portfolio: &Portfolio) {
    print_portfolio_summary(portfolio);
    if let Some(description) = &portfolio.description {
        println!("  {description}");
    }
    for company in &portfolio.companies {
        let s = company.clamped_score();
        println!(
            "  {}  {:>5.1}  {:<9}  {}",
            company.id,
            s,
            score::label(s).label(),
            company.company_name
        );
    }

    if let Some(insights) = state.portfolios.insights(&portfolio.id).await {
        println!("Average GreenScore: {:.1}", insights.average_score);
        let d = &insights.score_distribution;
        println!(
            "Distribution: {} excellent, {} good, {} fair, {} poor",
            d.excellent, d.good, d.fair, d.poor
        );
        let names = |list: &[PortfolioCompany]| {
            list.iter()
                .map(|c| c.company_name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!("Top performers: {}", names(&insights.high_performers));
        println!("Needs improvement: {}", names(&insights.low_performers));
    }
}
