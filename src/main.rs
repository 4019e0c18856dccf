//! # AnalystOS CLI (`aos`)
//!
//! The `aos` binary drives the research backend from a terminal and runs the
//! development proxy.
//!
//! ## Usage
//!
//! ```bash
//! aos --config ./config/aos.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `aos serve proxy` | Forward `/api/*` to the backend |
//! | `aos auth whoami` | Log in and print the current user |
//! | `aos auth logout-all` | Revoke every refresh token of the user |
//! | `aos research <action>` | Upload, scrape, generate, poll jobs, read reports |
//! | `aos crypto <action>` | Prices, trending, search, overview, history, chat |
//! | `aos automation <action>` | Notion queue, history, triggers, config |
//! | `aos watch` | Periodically print automation status and market overview |
//!
//! Every command except `serve` logs in with `--username`/`--password`
//! (or `AOS_USERNAME`/`AOS_PASSWORD`) and logs out again when done. JSON
//! results go to stdout; progress and logs go to stderr.

use analystos::auth::AuthSession;
use analystos::automation::{AutomationApi, WorkflowConfig};
use analystos::client::ApiClient;
use analystos::config::{self, Config};
use analystos::crypto::{ChatRequest, CryptoApi};
use analystos::error::ClientError;
use analystos::jobs::{poll_job_with_progress, PollOptions};
use analystos::models::{EntityExtractionRequest, GenerateRequest, Job, ScrapeRequest};
use analystos::research::{ResearchApi, UploadFile};
use analystos::session::Session;
use analystos::{proxy, refresh, telemetry};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// AnalystOS CLI: research automation from the terminal.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. When the file does not exist, built-in defaults are used.
#[derive(Parser)]
#[command(
    name = "aos",
    about = "AnalystOS research automation client and development proxy",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/aos.toml")]
    config: PathBuf,

    #[command(flatten)]
    credentials: Credentials,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Credentials {
    /// Backend username.
    #[arg(long, global = true, env = "AOS_USERNAME")]
    username: Option<String>,

    /// Backend password.
    #[arg(long, global = true, env = "AOS_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

impl Credentials {
    fn require(&self) -> Result<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Ok((u.as_str(), p.as_str())),
            _ => anyhow::bail!("credentials required: pass --username/--password or set AOS_USERNAME/AOS_PASSWORD"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a local server.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },

    /// Session management.
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Documents, scraping, report generation, and jobs.
    Research {
        #[command(subcommand)]
        action: ResearchAction,
    },

    /// Market data and the crypto research chat.
    Crypto {
        #[command(subcommand)]
        action: CryptoAction,
    },

    /// Notion automation queue and history.
    Automation {
        #[command(subcommand)]
        action: AutomationAction,
    },

    /// Print automation status and market overview on their refresh timers.
    ///
    /// Intervals come from `[refresh]`. Stops on Ctrl-C.
    Watch,
}

#[derive(Subcommand)]
enum ServeService {
    /// Start the development proxy.
    ///
    /// Binds `[proxy].bind` and forwards `[proxy].prefix/*` to
    /// `[proxy].backend_url`.
    Proxy,
}

#[derive(Subcommand)]
enum AuthAction {
    /// Print the signed-in user.
    Whoami,
    /// Log out from every device.
    LogoutAll,
}

#[derive(Subcommand)]
enum ResearchAction {
    /// Upload up to 10 documents (.pdf, .docx, .txt, .md).
    Upload {
        files: Vec<PathBuf>,
        /// Wait for the processing job to finish.
        #[arg(long)]
        wait: bool,
    },
    /// Scrape up to 10 URLs, or every page of a sitemap.
    Scrape {
        #[arg(long = "url", conflicts_with = "sitemap")]
        urls: Vec<String>,
        #[arg(long)]
        sitemap: Option<String>,
        #[arg(long)]
        wait: bool,
    },
    /// Generate a report from completed sources.
    Generate {
        /// OpenRouter model id.
        #[arg(long)]
        model: String,
        /// Source job id (repeatable).
        #[arg(long = "source", required = true)]
        sources: Vec<String>,
        /// Research focus.
        #[arg(long)]
        query: Option<String>,
        #[arg(long)]
        wait: bool,
    },
    /// Extract people, organizations, and technologies from sources.
    ExtractEntities {
        #[arg(long = "source", required = true)]
        sources: Vec<String>,
        #[arg(long)]
        wait: bool,
    },
    /// Show a job, optionally waiting for it to finish.
    Job {
        id: String,
        #[arg(long)]
        wait: bool,
    },
    /// List reports.
    Reports {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        page_size: u32,
    },
    /// Show a report.
    Report { id: String },
    /// Download a report file.
    Download {
        id: String,
        /// Output path. Defaults to the server-provided file name.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum CryptoAction {
    Price { coin_id: String },
    Trending,
    Search { query: String },
    Overview,
    Historical {
        coin_id: String,
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
    /// Ask the crypto research assistant.
    Chat { message: String },
}

#[derive(Subcommand)]
enum AutomationAction {
    Status,
    Queue,
    /// Start research for a queued Notion item.
    Trigger {
        item_id: String,
        #[arg(long)]
        wait: bool,
    },
    History {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    Config,
    /// Update the workflow config. Unset flags keep their current value.
    SetConfig {
        #[arg(long)]
        auto_process: Option<bool>,
        #[arg(long)]
        default_model: Option<String>,
        #[arg(long)]
        auto_score: Option<bool>,
        #[arg(long)]
        notify_on_complete: Option<bool>,
    },
    /// Force a Notion sync.
    Sync,
}

fn load(path: &std::path::Path) -> Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        let mut cfg = Config::minimal();
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report_progress(job: &Job) {
    eprintln!("job {}  {}  {}%", job.id, job.status, job.progress);
}

async fn sign_in(cfg: &Config, credentials: &Credentials) -> Result<AuthSession> {
    let (username, password) = credentials.require()?;
    let client = ApiClient::new(&cfg.api)?;
    let mut auth = AuthSession::new(client, Session::new());
    auth.login(username, password)
        .await
        .with_context(|| format!("login as {} failed", username))?;
    if !auth.state().is_authenticated() {
        anyhow::bail!("login succeeded but the session could not be restored");
    }
    Ok(auth)
}

async fn wait_for(research: &ResearchApi<'_>, job_id: &str, opts: PollOptions) -> Result<Job> {
    let job = poll_job_with_progress(research, job_id, report_progress, opts).await?;
    Ok(job)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init("info");

    let cli = Cli::parse();
    let cfg = load(&cli.config)?;

    if let Commands::Serve {
        service: ServeService::Proxy,
    } = cli.command
    {
        return proxy::run_proxy(&cfg).await;
    }

    let mut auth = sign_in(&cfg, &cli.credentials).await?;
    let outcome = run(&cfg, &cli.command, &mut auth).await;
    if !matches!(
        cli.command,
        Commands::Auth {
            action: AuthAction::LogoutAll
        }
    ) {
        auth.logout().await;
    }
    outcome
}

async fn run(cfg: &Config, command: &Commands, auth: &mut AuthSession) -> Result<()> {
    let poll = PollOptions::from(&cfg.polling);
    let client = auth.client().clone();
    let session = auth.session().clone();
    let research = ResearchApi::new(&client, &session);

    match command {
        Commands::Serve { .. } => anyhow::bail!("serve does not take a session"),
        Commands::Auth { action } => match action {
            AuthAction::Whoami => print_json(&auth.state().user())?,
            AuthAction::LogoutAll => match auth.logout_all().await {
                Some(n) => println!("Revoked {} refresh tokens.", n),
                None => anyhow::bail!("logout-all failed; local session cleared"),
            },
        },
        Commands::Research { action } => match action {
            ResearchAction::Upload { files, wait } => {
                let mut uploads = Vec::with_capacity(files.len());
                for path in files {
                    uploads.push(UploadFile::from_path(path).await?);
                }
                let resp = research.upload(uploads).await?;
                print_json(&resp)?;
                if *wait {
                    print_json(&wait_for(&research, &resp.job_id, poll).await?)?;
                }
            }
            ResearchAction::Scrape {
                urls,
                sitemap,
                wait,
            } => {
                let req = ScrapeRequest {
                    urls: (!urls.is_empty()).then(|| urls.clone()),
                    sitemap_url: sitemap.clone(),
                };
                let resp = research.scrape(&req).await?;
                print_json(&resp)?;
                if *wait {
                    print_json(&wait_for(&research, &resp.job_id, poll).await?)?;
                }
            }
            ResearchAction::Generate {
                model,
                sources,
                query,
                wait,
            } => {
                let req = GenerateRequest {
                    model: model.clone(),
                    sources: sources.clone(),
                    query: query.clone(),
                };
                let resp = research.generate(&req).await?;
                print_json(&resp)?;
                if *wait {
                    print_json(&wait_for(&research, &resp.job_id, poll).await?)?;
                }
            }
            ResearchAction::ExtractEntities { sources, wait } => {
                let req = EntityExtractionRequest {
                    sources: sources.clone(),
                };
                let resp = research.extract_entities(&req).await?;
                print_json(&resp)?;
                if *wait {
                    print_json(&wait_for(&research, &resp.job_id, poll).await?)?;
                }
            }
            ResearchAction::Job { id, wait } => {
                let job = if *wait {
                    wait_for(&research, id, poll).await?
                } else {
                    research.job(id).await?
                };
                print_json(&job)?;
            }
            ResearchAction::Reports { page, page_size } => {
                print_json(&research.reports(*page, *page_size).await?)?;
            }
            ResearchAction::Report { id } => print_json(&research.report(id).await?)?,
            ResearchAction::Download { id, out } => {
                let stream = research.download_report(id).await?;
                let path = out.clone().unwrap_or_else(|| {
                    PathBuf::from(
                        stream
                            .filename()
                            .map(str::to_string)
                            .unwrap_or_else(|| format!("report-{}.md", id)),
                    )
                });
                let bytes = stream
                    .save_to(&path)
                    .await
                    .with_context(|| format!("download to {} failed", path.display()))?;
                eprintln!("wrote {} bytes to {}", bytes, path.display());
            }
        },
        Commands::Crypto { action } => {
            let crypto = CryptoApi::new(&client, &session);
            match action {
                CryptoAction::Price { coin_id } => print_json(&crypto.price(coin_id).await?)?,
                CryptoAction::Trending => print_json(&crypto.trending().await?)?,
                CryptoAction::Search { query } => print_json(&crypto.search(query).await?)?,
                CryptoAction::Overview => print_json(&crypto.market_overview().await?)?,
                CryptoAction::Historical { coin_id, days } => {
                    print_json(&crypto.historical(coin_id, *days).await?)?
                }
                CryptoAction::Chat { message } => {
                    let req = ChatRequest {
                        message: message.clone(),
                        history: Vec::new(),
                        context: None,
                    };
                    print_json(&crypto.chat(&req).await?)?
                }
            }
        }
        Commands::Automation { action } => {
            let automation = AutomationApi::new(&client, &session);
            match action {
                AutomationAction::Status => print_json(&automation.status().await?)?,
                AutomationAction::Queue => print_json(&automation.queue().await?)?,
                AutomationAction::Trigger { item_id, wait } => {
                    let resp = automation.trigger(item_id).await?;
                    print_json(&resp)?;
                    if *wait {
                        print_json(&wait_for(&research, &resp.job_id, poll).await?)?;
                    }
                }
                AutomationAction::History { limit } => {
                    print_json(&automation.history(*limit).await?)?
                }
                AutomationAction::Config => print_json(&automation.config().await?)?,
                AutomationAction::SetConfig {
                    auto_process,
                    default_model,
                    auto_score,
                    notify_on_complete,
                } => {
                    let current = automation.config().await?;
                    let updated = WorkflowConfig {
                        auto_process: auto_process.unwrap_or(current.auto_process),
                        default_model: default_model.clone().unwrap_or(current.default_model),
                        auto_score: auto_score.unwrap_or(current.auto_score),
                        notify_on_complete: notify_on_complete
                            .unwrap_or(current.notify_on_complete),
                    };
                    print_json(&automation.update_config(&updated).await?)?
                }
                AutomationAction::Sync => print_json(&automation.sync().await?)?,
            }
        }
        Commands::Watch => {
            let automation = &AutomationApi::new(&client, &session);
            let crypto = &CryptoApi::new(&client, &session);
            let status_timer = refresh::every(
                "automation-status",
                Duration::from_secs(cfg.refresh.automation_status_secs),
                move || async move {
                    let status = automation.status().await?;
                    println!("{}", serde_json::json!({ "automation": status }));
                    Ok::<_, ClientError>(())
                },
            );
            let market_timer = refresh::every(
                "market-overview",
                Duration::from_secs(cfg.refresh.market_data_secs),
                move || async move {
                    let overview = crypto.market_overview().await?;
                    println!("{}", serde_json::json!({ "market": overview }));
                    Ok::<_, ClientError>(())
                },
            );
            tokio::select! {
                _ = async { tokio::join!(status_timer, market_timer) } => {}
                _ = tokio::signal::ctrl_c() => eprintln!("stopping"),
            }
        }
    }

    Ok(())
}
