//! CLI command definitions, routing, and tracing setup.
//!
//! Each mission subcommand maps 1:1 onto a mission-runner operation; all
//! business logic lives in the library crates.

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use prospector_directory::DirectoryClient;
use prospector_genai::GenAiClient;
use prospector_mission::{
    CampaignKind, Decision, MissionProgress, MissionRunner, cancel_channel,
};
use prospector_shared::{
    AppConfig, IdealCustomerProfile, init_config, load_config, resolve_api_key, resolve_db_path,
    validate_api_keys,
};
use prospector_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Prospector — ICP-driven market targeting missions.
#[derive(Parser)]
#[command(
    name = "prospector",
    version,
    about = "Turn an Ideal Customer Profile into a validated, campaign-ready outreach list.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Acting user id (profiles and missions are per-user).
    #[arg(long, default_value = "local", global = true)]
    pub user: String,

    /// Mission slot within the user's account.
    #[arg(long, default_value = "default", global = true)]
    pub slot: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Manage the Ideal Customer Profile.
    Icp {
        #[command(subcommand)]
        action: IcpAction,
    },

    /// Run a targeting mission, one phase at a time.
    Mission {
        #[command(subcommand)]
        action: MissionAction,
    },

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// ICP subcommands.
#[derive(Subcommand)]
pub(crate) enum IcpAction {
    /// Write-replace the profile from comma-separated criteria.
    Set {
        /// Target industries, comma-separated.
        #[arg(long)]
        industries: Option<String>,

        /// Company-size ranges ("51-200") or "1000+", comma-separated.
        #[arg(long)]
        sizes: Option<String>,

        /// Target job titles, comma-separated.
        #[arg(long)]
        titles: Option<String>,

        /// Location scope keywords ("All US", "Remote"), comma-separated.
        #[arg(long)]
        scope: Option<String>,

        /// Target US states, comma-separated.
        #[arg(long)]
        states: Option<String>,

        /// Target cities, comma-separated.
        #[arg(long)]
        cities: Option<String>,

        /// Free-text avoid list.
        #[arg(long)]
        avoid: Option<String>,
    },
    /// Print the stored profile.
    Show,
}

/// Mission subcommands — the control surface, one operation each.
#[derive(Subcommand)]
pub(crate) enum MissionAction {
    /// Discover the market and draw a validation sample.
    Start,
    /// Show mission status.
    Status,
    /// Pull more companies into the validation sample.
    More,
    /// Record an accept/reject decision for a sampled company.
    Decide {
        /// Company candidate id.
        candidate_id: String,

        #[arg(long, conflicts_with = "reject")]
        accept: bool,

        #[arg(long)]
        reject: bool,

        /// Decision reason; repeatable.
        #[arg(long = "reason")]
        reasons: Vec<String>,
    },
    /// Confirm validated targets and enter the contact loop.
    Confirm,
    /// Discover contacts for the current company.
    Contacts,
    /// Record an accept/reject decision for a discovered contact.
    Review {
        /// Contact candidate id.
        contact_id: String,

        #[arg(long, conflicts_with = "reject")]
        accept: bool,

        #[arg(long)]
        reject: bool,
    },
    /// Fetch more contacts for the current company, excluding seen ones.
    FetchMore,
    /// Wrap up the current company and advance.
    Next,
    /// Choose the campaign flavor.
    Campaign {
        /// email-sequence or linkedin-message.
        kind: String,
    },
    /// Generate campaign assets for accepted contacts.
    Generate,
    /// Render and persist the final export.
    Export,
    /// Drop the mission, freeing its slot.
    Abandon,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "prospector=info",
        1 => "prospector=debug",
        _ => "prospector=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let user = cli.user.clone();
    let slot = cli.slot.clone();

    match cli.command {
        Command::Icp { action } => match action {
            IcpAction::Set {
                industries,
                sizes,
                titles,
                scope,
                states,
                cities,
                avoid,
            } => {
                cmd_icp_set(
                    &user, industries, sizes, titles, scope, states, cities, avoid,
                )
                .await
            }
            IcpAction::Show => cmd_icp_show(&user).await,
        },
        Command::Mission { action } => cmd_mission(&user, &slot, action).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Runner construction
// ---------------------------------------------------------------------------

async fn open_storage(config: &AppConfig) -> Result<Storage> {
    let db_path = resolve_db_path(config)?;
    Ok(Storage::open(&db_path).await?)
}

/// Build the mission runner. Provider-touching commands validate API keys
/// separately before calling this; local-only commands tolerate their
/// absence.
async fn build_runner(config: &AppConfig) -> Result<MissionRunner> {
    let storage = open_storage(config).await?;
    let apollo_key = resolve_api_key(&config.apollo.api_key_env).unwrap_or_default();
    let openrouter_key = resolve_api_key(&config.openrouter.api_key_env).unwrap_or_default();
    let directory =
        DirectoryClient::new(&config.apollo, apollo_key, config.defaults.result_cap)?;
    let genai = GenAiClient::new(&config.openrouter, openrouter_key)?;
    Ok(MissionRunner::new(
        config.clone(),
        storage,
        directory,
        genai,
    ))
}

/// Wire ctrl-c into a cooperative cancel token for long per-entity loops.
fn runner_with_ctrl_c(runner: MissionRunner) -> MissionRunner {
    let (handle, token) = cancel_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("stop requested; finishing the current unit of work");
            handle.cancel();
        }
    });
    runner.with_cancel(token)
}

// ---------------------------------------------------------------------------
// ICP commands
// ---------------------------------------------------------------------------

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

#[allow(clippy::too_many_arguments)]
async fn cmd_icp_set(
    user: &str,
    industries: Option<String>,
    sizes: Option<String>,
    titles: Option<String>,
    scope: Option<String>,
    states: Option<String>,
    cities: Option<String>,
    avoid: Option<String>,
) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;

    let icp = IdealCustomerProfile {
        industries: split_list(industries),
        company_sizes: split_list(sizes),
        job_titles: split_list(titles),
        location_scope: split_list(scope),
        target_states: split_list(states),
        target_cities: split_list(cities),
        avoid_list: avoid.unwrap_or_default(),
    };
    storage.put_icp(user, &icp).await?;

    info!(user, "ICP updated");
    println!("{}", serde_json::to_string_pretty(&icp)?);
    Ok(())
}

async fn cmd_icp_show(user: &str) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;

    match storage.get_icp(user).await? {
        Some(icp) => println!("{}", serde_json::to_string_pretty(&icp)?),
        None => println!("No ICP configured for '{user}'. Run `prospector icp set` first."),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Mission commands
// ---------------------------------------------------------------------------

fn parse_decision(accept: bool, reject: bool) -> Result<Decision> {
    match (accept, reject) {
        (true, false) => Ok(Decision::Accept),
        (false, true) => Ok(Decision::Reject),
        _ => Err(eyre!("pass exactly one of --accept or --reject")),
    }
}

async fn cmd_mission(user: &str, slot: &str, action: MissionAction) -> Result<()> {
    let config = load_config()?;

    match action {
        MissionAction::Start => {
            validate_api_keys(&config)?;
            let runner = build_runner(&config).await?;
            let reporter = CliProgress::new();
            let report = runner.start(user, slot, &reporter).await?;
            reporter.finish();
            println!();
            println!("  Mission started.");
            println!("  ID:        {}", report.mission_id);
            println!("  Companies: {}", report.companies_found);
            println!("  To review: {}", report.sample_size);
            println!();
            println!("  Next: `prospector mission decide <company-id> --accept|--reject`");
        }
        MissionAction::Status => {
            let runner = build_runner(&config).await?;
            let status = runner.status(user, slot).await?;
            println!();
            println!("  Phase:      {}", status.phase);
            println!("  Version:    {}", status.version);
            println!("  Discovered: {}", status.companies_discovered);
            println!(
                "  Validated:  {}/{}",
                status.sample_decided, status.sample_size
            );
            println!(
                "  Companies:  {}/{} processed",
                status.company_cursor, status.companies_selected
            );
            println!("  Assets:     {}", status.assets);
            println!("  Exported:   {}", status.exported);
            println!();
        }
        MissionAction::More => {
            validate_api_keys(&config)?;
            let runner = build_runner(&config).await?;
            let report = runner.show_more_companies(user, slot).await?;
            println!(
                "Added {} companies; sample now {}.",
                report.companies_found, report.sample_size
            );
        }
        MissionAction::Decide {
            candidate_id,
            accept,
            reject,
            reasons,
        } => {
            let decision = parse_decision(accept, reject)?;
            let runner = build_runner(&config).await?;
            let progress = runner
                .record_validation(user, slot, &candidate_id, decision, &reasons)
                .await?;
            println!(
                "Recorded. {}/{} decided (phase: {}).",
                progress.decided, progress.total, progress.phase
            );
        }
        MissionAction::Confirm => {
            let runner = build_runner(&config).await?;
            let confirmation = runner.confirm_targets(user, slot).await?;
            println!(
                "{} companies confirmed. Next: `prospector mission contacts`.",
                confirmation.selected
            );
        }
        MissionAction::Contacts => {
            validate_api_keys(&config)?;
            let runner = runner_with_ctrl_c(build_runner(&config).await?);
            let reporter = CliProgress::new();
            let report = runner.discover_contacts(user, slot, &reporter).await?;
            reporter.finish();
            match report.company_id {
                Some(company_id) => println!(
                    "{} contacts found at {company_id} ({} companies remaining).",
                    report.contacts_found, report.companies_remaining
                ),
                None if report.cancelled => println!("Stopped; progress saved."),
                None => println!("Contact loop complete (phase: {}).", report.phase),
            }
        }
        MissionAction::Review {
            contact_id,
            accept,
            reject,
        } => {
            let decision = parse_decision(accept, reject)?;
            let runner = build_runner(&config).await?;
            let progress = runner
                .record_contact_decision(user, slot, &contact_id, decision)
                .await?;
            println!(
                "Recorded. {}/{} in batch (phase: {}).",
                progress.decided_in_batch, progress.batch_size, progress.phase
            );
        }
        MissionAction::FetchMore => {
            validate_api_keys(&config)?;
            let runner = build_runner(&config).await?;
            let report = runner.fetch_more_contacts(user, slot).await?;
            println!(
                "Fetched {} new contacts; batch now {}.",
                report.added, report.batch_size
            );
        }
        MissionAction::Next => {
            let runner = build_runner(&config).await?;
            let advance = runner.complete_company(user, slot).await?;
            match advance.next_company {
                Some(company_id) => println!("Moving on to {company_id}."),
                None => println!("All companies processed (phase: {}).", advance.phase),
            }
        }
        MissionAction::Campaign { kind } => {
            let kind = match kind.as_str() {
                "email-sequence" => CampaignKind::EmailSequence,
                "linkedin-message" => CampaignKind::LinkedinMessage,
                other => {
                    return Err(eyre!(
                        "unknown campaign kind '{other}': expected 'email-sequence' or 'linkedin-message'"
                    ));
                }
            };
            let runner = build_runner(&config).await?;
            let phase = runner.select_campaign(user, slot, kind).await?;
            println!("Campaign kind set (phase: {phase}).");
        }
        MissionAction::Generate => {
            validate_api_keys(&config)?;
            let runner = runner_with_ctrl_c(build_runner(&config).await?);
            let reporter = CliProgress::new();
            let report = runner.generate_campaigns(user, slot, &reporter).await?;
            reporter.finish();
            println!();
            println!(
                "  Generated {}/{} assets.",
                report.generated, report.total
            );
            if let Some(failure) = &report.failed {
                println!(
                    "  Stopped at {}: {}. Completed assets are saved; re-run to continue.",
                    failure.contact_id, failure.error
                );
            }
            if report.persistence_degraded {
                println!("  Warning: a save failed; generated assets were still returned.");
            }
            println!("  Phase: {}", report.phase);
            println!();
        }
        MissionAction::Export => {
            let runner = build_runner(&config).await?;
            let bundle = runner.export(user, slot).await?;
            println!("{}", bundle.markdown);
            if bundle.persistence_degraded {
                println!();
                println!("Warning: the export save failed; output above is complete.");
            }
        }
        MissionAction::Abandon => {
            let runner = build_runner(&config).await?;
            runner.abandon(user, slot).await?;
            println!("Mission slot '{slot}' cleared.");
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl MissionProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn entity(&self, current: usize, total: usize, detail: &str) {
        self.spinner
            .set_message(format!("[{current}/{total}] {detail}"));
    }
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
