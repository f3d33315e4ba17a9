//! Farewatch CLI - search discounted flights and keep price watches on them
//!
//! Commands cover account management, deal search with client-side sorting
//! and pagination, and the price-watch lifecycle.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use serde::Serialize;
use tracing::{error, warn};

use farewatch::airports;
use farewatch::api::ApiClient;
use farewatch::auth::{self, Gate};
use farewatch::config::{
    api_url, API_ENV, CLI_VERSION, HTTP_TIMEOUT_SECS, SESSION_EXPIRY_BUFFER_SECS, USER_AGENT,
};
use farewatch::error::ClientError;
use farewatch::search::{ResultPage, SearchController, SearchFilters};
use farewatch::session::read_session;
use farewatch::sort::SortKey;
use farewatch::watches::{self, FrequencyUnit, WatchList};

#[derive(Parser)]
#[command(
    name = "farewatch",
    about = "Farewatch CLI - flight deal search and price-watch alerts",
    disable_version_flag = true,
    version = CLI_VERSION
)]
struct Cli {
    #[arg(long = "version", short = 'v')]
    version: bool,

    #[command(subcommand)]
    cmd: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account
    Register {
        /// Account email address
        #[arg(long)]
        email: String,
        /// Account password
        #[arg(long)]
        password: String,
    },
    /// Log in and store the session cookies locally
    Login {
        /// Account email address
        #[arg(long)]
        email: String,
        /// Account password
        #[arg(long)]
        password: String,
    },
    /// Logout: end the server session and clear the local one
    Logout,
    /// Exchange the refresh cookie for a fresh access token
    Refresh,
    /// Show the current logged-in account (if any)
    Status {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Look up airport codes by city or airport name
    Airports {
        /// Search term, at least two characters
        term: String,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Search discounted flight destinations
    Search {
        #[command(flatten)]
        filters: FilterArgs,
        #[command(flatten)]
        view: ViewArgs,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Search and turn one of the results into a price watch
    Watch {
        #[command(flatten)]
        filters: FilterArgs,
        #[command(flatten)]
        view: ViewArgs,
        /// Row number of the result to watch, as shown by `search`
        #[arg(long)]
        pick: usize,
        /// How many units to wait between checks, e.g. the 6 in "every 6 hours"
        #[arg(long)]
        frequency: u32,
        /// Unit for the check cadence
        #[arg(long, value_enum)]
        unit: FrequencyUnit,
    },
    /// List your price watches
    Watches {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Delete a price watch by id
    Unwatch {
        /// Watch id as shown by `watches`
        id: i64,
    },
}

/// Search criteria shared by `search` and `watch`.
#[derive(Args, Clone)]
struct FilterArgs {
    /// Origin airport IATA code (see `farewatch airports`)
    #[arg(long)]
    origin: String,
    /// Departure date, or the start of the departure window (YYYY-MM-DD)
    #[arg(long)]
    start: NaiveDate,
    /// End of the departure window; round trips only
    #[arg(long, conflicts_with = "one_way")]
    end: Option<NaiveDate>,
    /// Search one-way fares instead of round trips
    #[arg(long)]
    one_way: bool,
    /// Price ceiling in whole EUR
    #[arg(long)]
    max_price: u32,
    /// Exact trip length in days; round trips only
    #[arg(long, conflicts_with = "one_way")]
    duration: Option<u8>,
    /// Only consider non-stop itineraries
    #[arg(long)]
    non_stop: bool,
}

impl FilterArgs {
    fn into_filters(self) -> Result<SearchFilters, ClientError> {
        SearchFilters {
            origin: self.origin,
            start_date: self.start,
            end_date: self.end,
            one_way: self.one_way,
            max_price: self.max_price,
            duration_days: self.duration,
            non_stop: self.non_stop,
        }
        .validated()
    }
}

/// Result-view options shared by `search` and `watch`.
#[derive(Args, Clone)]
struct ViewArgs {
    /// Fetch this many pages before displaying (re-queries and appends)
    #[arg(long, default_value_t = 1)]
    pages: u32,
    /// Sort the collected results before displaying
    #[arg(long, value_enum)]
    sort: Option<SortKey>,
}

#[derive(Serialize)]
struct StatusOutput {
    logged_in: bool,
    email: Option<String>,
    access_expires_at: Option<u64>,
}

/// Probe the session behind a spinner so the wait has a visible
/// placeholder, then report the gate's verdict.
async fn probe_gate(api: &ApiClient) -> Gate {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠚", "⠞", "⠖", "⠦", "⠴", "⠲", "⠳", "⠓"]),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message("Checking session...");
    let gate = auth::check_access(api).await;
    spinner.finish_and_clear();
    gate
}

async fn require_access(api: &ApiClient) -> Result<()> {
    match probe_gate(api).await {
        Gate::Allowed => Ok(()),
        Gate::RedirectToLogin => {
            anyhow::bail!("Not signed in. Run 'farewatch login' first.")
        }
    }
}

async fn register(api: &ApiClient, email: &str, password: &str) -> Result<()> {
    let message = api
        .register(email, password)
        .await
        .context("register request failed")?;
    println!("{}", message);
    Ok(())
}

async fn login(api: &ApiClient, email: &str, password: &str) -> Result<()> {
    let session = auth::perform_login(api, email, password).await?;

    // Verify the fresh cookies the same way a protected screen would.
    let authed = api.clone().with_session(&session);
    match probe_gate(&authed).await {
        Gate::Allowed => println!("✅ Logged in as {}", session.email),
        Gate::RedirectToLogin => {
            warn!("session probe failed right after login");
            println!("Logged in, but the new session failed verification. Try again.");
        }
    }
    Ok(())
}

async fn logout(api: &ApiClient) -> Result<()> {
    if read_session().await.is_err() {
        println!("No active session");
        return Ok(());
    }
    auth::perform_logout(api).await?;
    println!("Logged out (local session removed).");
    Ok(())
}

async fn refresh(api: &ApiClient) -> Result<()> {
    let session = read_session()
        .await
        .context("No active session found. Run 'farewatch login' first.")?;
    let api = api.clone().with_session(&session);
    auth::perform_refresh(&api, session).await?;
    println!("Token refreshed.");
    Ok(())
}

async fn status(json_output: bool) -> Result<()> {
    match read_session().await {
        Ok(sess) => {
            if json_output {
                let output = StatusOutput {
                    logged_in: true,
                    email: Some(sess.email.clone()),
                    access_expires_at: sess.access_exp,
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("Logged in as: {}", sess.email);
                if let Some(exp) = sess.access_exp {
                    let now = std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .expect("System time is before UNIX EPOCH")
                        .as_secs();
                    if exp > now {
                        println!("Access token expires in: {}s", exp - now);
                    } else {
                        println!("Access token expired (run 'farewatch refresh')");
                    }
                }
            }
            Ok(())
        }
        Err(_) => {
            if json_output {
                let output = StatusOutput {
                    logged_in: false,
                    email: None,
                    access_expires_at: None,
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("No active session found. Run 'farewatch login' first.");
            }
            Ok(())
        }
    }
}

async fn airports_cmd(api: &ApiClient, term: &str, json: bool) -> Result<()> {
    require_access(api).await?;
    let suggestions = airports::lookup(api, term)
        .await
        .context("airport lookup failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&suggestions)?);
        return Ok(());
    }
    if suggestions.is_empty() {
        println!("No matching airports.");
        return Ok(());
    }
    for suggestion in &suggestions {
        println!("{}", suggestion.label());
    }
    Ok(())
}

/// Submit the search, keep loading pages up to the requested count while
/// the backend keeps answering with results, then apply the sort.
async fn collect_results(
    api: &ApiClient,
    filters: FilterArgs,
    view: &ViewArgs,
) -> Result<SearchController> {
    let filters = filters.into_filters()?;
    let mut controller = SearchController::new();
    controller.submit(api, filters).await?;

    let wanted = view.pages.max(1);
    while controller.page().page_number < wanted && controller.page().has_more {
        controller.load_more(api).await?;
    }

    if let Some(key) = view.sort {
        controller.sort_by(key);
    }
    Ok(controller)
}

fn render_results(page: &ResultPage, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&page.items)?);
        return Ok(());
    }
    if page.items.is_empty() {
        println!("No flight destinations found.");
        return Ok(());
    }

    println!("Flight Destinations:");
    for (i, flight) in page.items.iter().enumerate() {
        println!("{:>3}. {} ➔ {}", i + 1, flight.origin, flight.destination);
        println!(
            "     Date: {} - Price: ${}",
            flight.departure_date, flight.price.total
        );
    }
    if page.has_more {
        println!(
            "More results may be available; re-run with --pages {}.",
            page.page_number + 1
        );
    }
    Ok(())
}

async fn search(api: &ApiClient, filters: FilterArgs, view: ViewArgs, json: bool) -> Result<()> {
    require_access(api).await?;
    let controller = collect_results(api, filters, &view).await?;
    render_results(controller.page(), json)
}

async fn watch(
    api: &ApiClient,
    filters: FilterArgs,
    view: ViewArgs,
    pick: usize,
    frequency: u32,
    unit: FrequencyUnit,
) -> Result<()> {
    require_access(api).await?;
    let controller = collect_results(api, filters, &view).await?;

    let items = &controller.page().items;
    if pick == 0 || pick > items.len() {
        anyhow::bail!(
            "--pick {} is out of range; the search returned {} result(s)",
            pick,
            items.len()
        );
    }
    let flight = &items[pick - 1];

    let created = watches::create_watch(api, flight, frequency, unit).await?;
    println!(
        "✅ Watching {} ➔ {} at ${} or less (every {} {}).",
        created.origin,
        created.destination,
        created.max_price,
        created.frequency,
        created.frequency_unit
    );
    println!("Watch id: {}", created.id);
    Ok(())
}

async fn list_watches(api: &ApiClient, json: bool) -> Result<()> {
    require_access(api).await?;

    let mut list = WatchList::new();
    list.refresh(api).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&list.entries)?);
        return Ok(());
    }
    if list.entries.is_empty() {
        println!("No subscriptions at the moment.");
        return Ok(());
    }

    println!("Price watches:");
    for watch in &list.entries {
        println!("[{}] {} ➔ {}", watch.id, watch.origin, watch.destination);
        println!(
            "     Departure Date: {} | Max Price: ${} | Frequency: every {} {}",
            watch.departure_date, watch.max_price, watch.frequency, watch.frequency_unit
        );
    }
    Ok(())
}

async fn unwatch(api: &ApiClient, id: i64) -> Result<()> {
    require_access(api).await?;

    let mut list = WatchList::new();
    list.refresh(api).await?;
    list.delete(api, id).await?;

    println!("✅ Deleted watch {}. {} remaining.", id, list.entries.len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    if std::env::var("RUST_LOG")
        .ok()
        .map(|value| value.to_lowercase().contains("debug"))
        .unwrap_or(false)
    {
        eprintln!(
            "⚠️ Debug logging is enabled; session cookies may appear in logs. Proceed carefully."
        );
    }

    let cli = Cli::parse();

    if cli.version {
        println!("Farewatch CLI version {}", CLI_VERSION);
        return Ok(());
    }

    let cmd = match cli.cmd {
        Some(cmd) => cmd,
        None => {
            Cli::command().print_help().ok();
            println!();
            return Ok(());
        }
    };

    // Disable connection pooling when pointed at a short-lived test server.
    let mut builder = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS));

    if std::env::var(API_ENV).is_ok() {
        builder = builder.pool_max_idle_per_host(0).pool_idle_timeout(None);
    }

    let client = builder.build().context("create http client")?;

    let mut api = ApiClient::new(client, api_url());
    if let Ok(session) = read_session().await {
        if session.is_near_expiry(SESSION_EXPIRY_BUFFER_SECS) {
            warn!("access token is expired or near expiry; run 'farewatch refresh' if requests fail");
        }
        api.set_session(&session);
    }

    match cmd {
        Commands::Register { email, password } => {
            if let Err(e) = register(&api, &email, &password).await {
                error!("register failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Login { email, password } => {
            if let Err(e) = login(&api, &email, &password).await {
                error!("login failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Logout => {
            if let Err(e) = logout(&api).await {
                error!("logout failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Refresh => {
            if let Err(e) = refresh(&api).await {
                error!("refresh failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Status { json } => {
            if let Err(e) = status(json).await {
                error!("status failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Airports { term, json } => {
            if let Err(e) = airports_cmd(&api, &term, json).await {
                eprintln!("airports failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Search {
            filters,
            view,
            json,
        } => {
            if let Err(e) = search(&api, filters, view, json).await {
                eprintln!("search failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Watch {
            filters,
            view,
            pick,
            frequency,
            unit,
        } => {
            if let Err(e) = watch(&api, filters, view, pick, frequency, unit).await {
                eprintln!("watch failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Watches { json } => {
            if let Err(e) = list_watches(&api, json).await {
                eprintln!("watches failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Unwatch { id } => {
            if let Err(e) = unwatch(&api, id).await {
                eprintln!("unwatch failed: {:#}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
