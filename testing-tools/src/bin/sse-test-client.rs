use anyhow::Result;
use clap::Parser;
use colored::*;
use domain::NotificationsClient;
use sse::session::CredentialSource;
use std::time::Duration;

use testing_tools::output::print_test_summary;
use testing_tools::scenarios;
use testing_tools::sse_client::Connection;

#[derive(Parser)]
#[command(name = "sse-test-client")]
#[command(about = "Push notification integration testing tool")]
struct Cli {
    /// Base URL of the booking API (e.g., http://localhost:8080/api)
    #[arg(long)]
    base_url: String,

    /// Bearer token of a signed-in user
    #[arg(long, env = "ACCESS_TOKEN", hide_env_values = true)]
    token: String,

    /// Test scenario to run
    #[arg(long, value_enum)]
    scenario: ScenarioChoice,

    /// Frame kind to wait for in the wait-for-event scenario
    #[arg(long, default_value = "NOTIFICATION")]
    event_kind: String,

    /// Seconds to wait for the stream to open or for an event
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Seconds to print frames for in the watch scenario
    #[arg(long, default_value_t = 60)]
    duration_secs: u64,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone)]
enum ScenarioChoice {
    /// Test that the push stream opens and stays up
    ConnectionTest,
    /// Wait for the first frame of a given kind (trigger it from another client)
    WaitForEvent,
    /// Print every frame for a while
    Watch,
    /// Fetch the unread notification count over REST
    UnreadCount,
    /// Connection test followed by the unread count check
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    let timeout = Duration::from_secs(cli.timeout_secs);

    println!("{}", "=== SETUP PHASE ===".bright_white().bold());

    let credentials = CredentialSource::new();
    credentials.sign_in(cli.token.clone());
    let api_client = NotificationsClient::new(cli.base_url.clone(), credentials.reader())?;

    let needs_stream = !matches!(cli.scenario, ScenarioChoice::UnreadCount);
    let mut sse = if needs_stream {
        println!("\n{} Opening push connection...", "→".blue());
        Some(Connection::establish(
            &cli.base_url,
            &cli.token,
            "Subscriber".to_string(),
        )?)
    } else {
        None
    };

    println!("\n{}", "=== TEST PHASE ===".bright_white().bold());

    let mut results = Vec::new();

    match (&cli.scenario, sse.as_mut()) {
        (ScenarioChoice::ConnectionTest, Some(sse)) => {
            results.push(scenarios::test_connection(sse, timeout).await?);
        }
        (ScenarioChoice::WaitForEvent, Some(sse)) => {
            results.push(scenarios::test_wait_for_event(sse, &cli.event_kind, timeout).await?);
        }
        (ScenarioChoice::Watch, Some(sse)) => {
            let duration = Duration::from_secs(cli.duration_secs);
            results.push(scenarios::test_watch(sse, duration).await?);
        }
        (ScenarioChoice::All, Some(sse)) => {
            results.push(scenarios::test_connection(sse, timeout).await?);
            results.push(scenarios::test_unread_count(&api_client).await?);
        }
        _ => {
            results.push(scenarios::test_unread_count(&api_client).await?);
        }
    }

    println!("\n{}", "=== RESULTS ===".bright_white().bold());
    print_test_summary(&results);

    let all_passed = results.iter().all(|r| r.passed);

    if all_passed {
        println!("\n{}", "All tests passed! ✓".bright_green().bold());
    } else {
        println!("\n{}", "Some tests failed! ✗".bright_red().bold());
    }

    std::process::exit(if all_passed { 0 } else { 1 });
}
