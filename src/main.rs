mod api;
mod config;
mod db;
mod dispatch;
mod extract;
mod history;
mod models;
mod normalize;
mod render;
mod response;
mod session;
mod tui;
mod verdict;
mod visitor;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use api::{AnalysisBackend, ApiClient};
use config::Config;
use db::{Database, HISTORY_KEY, PENDING_URL_KEY};
use dispatch::{Analysis, Dispatcher, ManualInput};
use history::{HistoryCache, HistoryFilter};
use models::{ScamReport, ScrapedJobPosting};
use session::AppState;

const CHAT_FALLBACK: &str = "I'm having trouble connecting right now.";
const DEFAULT_REPORTER: &str = "CLI User";
const DEFAULT_REPORT_DETAILS: &str = "Reported via command line";

#[derive(Parser)]
#[command(name = "fakejob")]
#[command(about = "Check job postings for fraud against a fakejob analysis server")]
struct Cli {
    /// Analysis API base URL (overrides env and config file)
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file and create the local store
    Init,

    /// Extract a job posting from a saved page or URL without analyzing it
    Extract {
        /// HTML file or http(s) URL
        source: String,

        /// Address the saved page came from
        #[arg(long)]
        page_url: Option<String>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract a posting from a page and analyze it
    Scan {
        /// HTML file or http(s) URL
        source: String,

        /// Address the saved page came from
        #[arg(long)]
        page_url: Option<String>,
    },

    /// Let the server fetch and analyze a job URL
    Url {
        url: String,
    },

    /// Analyze a posting typed in by hand
    Manual {
        #[arg(short, long)]
        title: String,

        #[arg(short, long, default_value = "")]
        company: String,

        #[arg(short, long, default_value = "")]
        location: String,

        /// Description text
        #[arg(short, long, conflicts_with = "description_file")]
        description: Option<String>,

        /// Read the description from a file
        #[arg(long)]
        description_file: Option<PathBuf>,

        /// Also scan the company's social media presence
        #[arg(long)]
        deep_scan: bool,
    },

    /// Bulk-analyze a CSV file of postings
    Csv {
        file: PathBuf,
    },

    /// Check a domain's reputation
    Domain {
        url: String,
    },

    /// Tell the server whether a verdict was right
    Feedback {
        /// Job title (defaults to the latest analysis)
        #[arg(short, long)]
        title: Option<String>,

        /// The verdict was wrong
        #[arg(long)]
        wrong: bool,
    },

    /// Report a posting as a scam
    ReportScam {
        url: String,

        #[arg(short, long, default_value = "")]
        company: String,

        #[arg(short, long, default_value = DEFAULT_REPORT_DETAILS)]
        details: String,

        #[arg(short, long, default_value = DEFAULT_REPORTER)]
        reporter: String,
    },

    /// List past analyses
    History {
        #[arg(short, long, value_enum, default_value = "all")]
        filter: HistoryFilter,

        /// Replace the local cache with the server's history first
        #[arg(long)]
        sync: bool,

        /// One "title | company | prediction" line per entry
        #[arg(long)]
        plain: bool,
    },

    /// Stats, trend and recent analyses; runs any queued URL first
    Dashboard,

    /// Queue a URL for the next dashboard run
    Queue {
        url: String,
    },

    /// Delete history on the server and locally
    ClearHistory,

    /// Download a PDF report for a history entry
    Report {
        /// Entry number as shown by `history`
        index: usize,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Ask the assistant a question
    Chat {
        #[arg(required = true)]
        message: Vec<String>,
    },

    /// Welcome prompt and visitor registration
    Welcome {
        #[command(subcommand)]
        command: WelcomeCommands,
    },

    /// Browse history interactively
    Browse {
        #[arg(short, long, value_enum, default_value = "all")]
        filter: HistoryFilter,
    },
}

#[derive(Subcommand)]
enum WelcomeCommands {
    /// Show whether the welcome prompt is due
    Status,

    /// Register an email address
    Register {
        email: String,
    },

    /// Dismiss the prompt for 30 days
    Skip,

    /// Ask the server to send the welcome email again
    Resend,

    /// Forget the registered visitor
    Forget,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("fakejob=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fakejob=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load(cli.api_base.as_deref())?;
    let client = ApiClient::new(&config)?;
    let db = Database::open()?;
    let mut state = AppState::new(HistoryCache::load(&db, config.history_cap)?);

    match cli.command {
        Commands::Init => {
            let path = Config::config_path().context("Could not determine config directory")?;
            if Config::write_default(&path)? {
                println!("Wrote default config to {}", path.display());
            } else {
                println!("Config already exists at {}", path.display());
            }
            println!("Local store at {}", db.path().display());
            println!("API base: {} ({:?})", client.base_url(), config.api_base_source);
        }

        Commands::Extract { source, page_url, json } => {
            let posting = load_posting(&source, page_url.as_deref(), &config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&posting)?);
            } else {
                println!("Title: {}", posting.title);
                println!("Company: {}", posting.company);
                println!("URL: {}", posting.url);
                println!("\n--- Description ({} chars) ---\n{}", posting.description.chars().count(), posting.description);
            }
        }

        Commands::Scan { source, page_url } => {
            let posting = load_posting(&source, page_url.as_deref(), &config)?;
            let ticket = state.begin_request();
            let analysis = Dispatcher::new(&client).analyze_scraped(&posting)?;
            show(&db, &mut state, ticket, analysis)?;
        }

        Commands::Url { url } => {
            let ticket = state.begin_request();
            let analysis = Dispatcher::new(&client).analyze_url(url.trim())?;
            show(&db, &mut state, ticket, analysis)?;
        }

        Commands::Manual {
            title,
            company,
            location,
            description,
            description_file,
            deep_scan,
        } => {
            let description = match (description, description_file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => String::new(),
            };
            let input = ManualInput {
                title,
                company,
                location,
                description,
                deep_scan,
            };
            let ticket = state.begin_request();
            let analysis = Dispatcher::new(&client).analyze_manual(&input)?;
            show(&db, &mut state, ticket, analysis)?;
        }

        Commands::Csv { file } => {
            let entries = Dispatcher::new(&client)
                .analyze_csv(&file)
                .context("CSV Error")?;
            let count = entries.len();
            state.history.add_bulk(&db, entries)?;
            println!("Successfully analyzed {} jobs from CSV!", count);
        }

        Commands::Domain { url } => {
            let report = client
                .check_domain(url.trim())
                .context("Domain check failed")?;
            println!("{}", render::domain_report(&report, url.trim()));
        }

        Commands::Feedback { title, wrong } => {
            let title = match title.or_else(|| state.history.latest().map(|e| e.title.clone())) {
                Some(title) => title,
                None => "Unknown".to_string(),
            };
            client.feedback(&title, !wrong)?;
            if wrong {
                println!("📝 Got it, we'll improve!");
            } else {
                println!("✅ Thanks for confirming!");
            }
        }

        Commands::ReportScam {
            url,
            company,
            details,
            reporter,
        } => {
            let report = ScamReport {
                url,
                company,
                details,
                reporter,
            };
            client.report_scam(&report)?;
            println!("✅ Reported!");
        }

        Commands::History { filter, sync, plain } => {
            if sync {
                sync_from_server(&db, &client, &mut state);
            }
            if plain {
                for line in state.history.summary_lines() {
                    println!("{}", line);
                }
            } else {
                print_table(&state.history, filter);
                if let Some(updated) = db.updated_at(HISTORY_KEY)? {
                    println!("\nLast updated: {} UTC", updated);
                }
            }
        }

        Commands::Dashboard => {
            sync_from_server(&db, &client, &mut state);

            if let Some(url) = db.take(PENDING_URL_KEY)? {
                println!("Analyzing queued URL {}\n", url);
                let ticket = state.begin_request();
                match Dispatcher::new(&client).analyze_url(&url) {
                    Ok(analysis) => show(&db, &mut state, ticket, analysis)?,
                    Err(e) => println!("Error: {}", e),
                }
                println!();
            }

            let stats = state.history.stats();
            println!("{}", render::stats_panel(&stats, state.total_scanned()));
            println!("{}", render::real_fake_share(&stats));
            println!("{}\n", render::trend_panel(&state.history.trend()));
            print_table(&state.history, HistoryFilter::All);

            if visitor::should_show_welcome(&db, Utc::now())? {
                println!("\nNew here? Run `fakejob welcome register <email>` or `fakejob welcome skip`.");
            }
        }

        Commands::Queue { url } => {
            let url = url.trim();
            if url.is_empty() {
                bail!("URL is empty");
            }
            db.set(PENDING_URL_KEY, url)?;
            println!("Queued {}. Run `fakejob dashboard` to analyze it.", url);
        }

        Commands::ClearHistory => {
            state.history.clear(&db, &client)?;
            println!("History cleared.");
        }

        Commands::Report { index, output } => {
            let Some(entry) = index.checked_sub(1).and_then(|i| state.history.get(i)) else {
                bail!("No history entry #{}. Run `fakejob history` to list entries.", index);
            };
            let pdf = client.generate_report(entry)?;
            let path = output.unwrap_or_else(|| PathBuf::from(report_file_name(&entry.company)));
            std::fs::write(&path, &pdf)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Saved report to {} ({} bytes)", path.display(), pdf.len());
        }

        Commands::Chat { message } => {
            let message = message.join(" ");
            let reply = match client.chat(&message) {
                Ok(reply) => reply.reply.filter(|r| !r.trim().is_empty()),
                Err(e) => {
                    warn!("Chat request failed: {}", e);
                    None
                }
            };
            println!("{}", reply.as_deref().unwrap_or(CHAT_FALLBACK));
        }

        Commands::Welcome { command } => match command {
            WelcomeCommands::Status => {
                match visitor::current_visitor(&db)? {
                    Some(v) => println!("Registered as {} ({})", visitor::display_name(&v), v.email),
                    None => println!("Not registered."),
                }
                if visitor::should_show_welcome(&db, Utc::now())? {
                    println!("Welcome prompt is due.");
                } else {
                    println!("Welcome prompt is not due.");
                }
            }
            WelcomeCommands::Register { email } => {
                let v = visitor::register(&db, &client, &email, Utc::now())?;
                println!("You're all set, {}! Start scanning jobs now.", visitor::display_name(&v));
            }
            WelcomeCommands::Skip => {
                visitor::skip(&db, Utc::now())?;
                println!("Welcome prompt dismissed for {} days.", visitor::REMEMBER_DAYS);
            }
            WelcomeCommands::Resend => {
                if visitor::resend(&db, &client)? {
                    println!("Email sent! Please check your inbox.");
                } else {
                    println!("The server could not send the email. Try again later.");
                }
            }
            WelcomeCommands::Forget => {
                visitor::forget(&db)?;
                println!("Visitor record removed.");
            }
        },

        Commands::Browse { filter } => {
            tui::run_browse(&state.history, filter)?;
        }
    }

    Ok(())
}

/// Read a posting from a saved HTML file or fetch it over HTTP.
fn load_posting(source: &str, page_url: Option<&str>, config: &Config) -> Result<ScrapedJobPosting> {
    let (html, url) = if source.starts_with("http://") || source.starts_with("https://") {
        (extract::fetch_page_html(source, config.timeout)?, source.to_string())
    } else {
        let html = std::fs::read_to_string(Path::new(source))
            .with_context(|| format!("Failed to read {}", source))?;
        (html, page_url.unwrap_or_default().to_string())
    };
    let posting = extract::extract_posting(&html, &url);
    info!(
        "Extracted title '{}', company '{}', {} description chars",
        posting.title,
        posting.company,
        posting.description.chars().count()
    );
    Ok(posting)
}

fn show(db: &Database, state: &mut AppState, ticket: session::RequestTicket, analysis: Analysis) -> Result<()> {
    if state.record(db, ticket, analysis)? {
        if let Some(current) = &state.current {
            println!("{}", render::result_card(current));
        }
    }
    Ok(())
}

/// Server history replaces the local cache; on failure the local cache stays.
fn sync_from_server(db: &Database, backend: &dyn AnalysisBackend, state: &mut AppState) {
    match backend.history() {
        Ok(summary) => {
            if let Some(records) = summary.history {
                let entries = records.into_iter().map(history::from_server).collect();
                if let Err(e) = state.history.replace_all(db, entries) {
                    warn!("Failed to store synced history: {}", e);
                }
            }
        }
        Err(e) => warn!("History sync failed, using local cache: {}", e),
    }

    match backend.analytics() {
        Ok(analytics) => state.server_total = analytics.predictions.map(|p| p.total),
        Err(e) => warn!("Analytics unavailable: {}", e),
    }
}

fn print_table(history: &HistoryCache, filter: HistoryFilter) {
    let rows: Vec<(usize, &models::HistoryEntry)> = history
        .entries()
        .iter()
        .enumerate()
        .filter(|(_, e)| filter.matches(e))
        .collect();
    println!("{}", render::history_table(&rows));
}

fn report_file_name(company: &str) -> String {
    let company = if company.trim().is_empty() { "Job" } else { company };
    let joined = company.split_whitespace().collect::<Vec<_>>().join("_");
    format!("fakejobai_Report_{}.pdf", joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeBackend;
    use crate::response::{Analytics, HistoryRecord, HistorySummary, PredictionCounts};

    #[test]
    fn test_report_file_name() {
        assert_eq!(report_file_name("Acme Global  Ltd"), "fakejobai_Report_Acme_Global_Ltd.pdf");
        assert_eq!(report_file_name(""), "fakejobai_Report_Job.pdf");
    }

    #[test]
    fn test_sync_replaces_cache_and_sets_total() {
        let db = Database::open_in_memory().unwrap();
        let backend = FakeBackend {
            history: Some(HistorySummary {
                history: Some(vec![HistoryRecord {
                    title: "Server job".to_string(),
                    ..Default::default()
                }]),
            }),
            analytics: Some(Analytics {
                predictions: Some(PredictionCounts { total: 1234 }),
            }),
            ..Default::default()
        };
        let mut state = AppState::new(HistoryCache::new(history::DASHBOARD_CAP));
        sync_from_server(&db, &backend, &mut state);

        assert_eq!(state.history.len(), 1);
        assert_eq!(state.history.latest().unwrap().title, "Server job");
        assert_eq!(state.total_scanned(), 1234);
    }

    #[test]
    fn test_sync_failure_keeps_local_cache() {
        let db = Database::open_in_memory().unwrap();
        let local = HistoryCache::from_entries(
            vec![history::from_server(HistoryRecord {
                title: "Local job".to_string(),
                ..Default::default()
            })],
            history::DASHBOARD_CAP,
        );
        let mut state = AppState::new(local);
        sync_from_server(&db, &FakeBackend::failing("offline"), &mut state);

        assert_eq!(state.history.latest().unwrap().title, "Local job");
        assert_eq!(state.server_total, None);
    }

    #[test]
    fn test_cli_parses_global_flags() {
        let cli = Cli::try_parse_from(["fakejob", "history", "--filter", "critical", "--api-base", "http://x/analyze"]).unwrap();
        assert_eq!(cli.api_base.as_deref(), Some("http://x/analyze"));
        assert!(matches!(cli.command, Commands::History { filter: HistoryFilter::Critical, .. }));
    }
}
