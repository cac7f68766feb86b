use anyhow::Result;
use colored::*;
use domain::NotificationsClient;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::output::{print_event, TestResult};
use crate::sse_client::{Connection, Next};

fn result(scenario: &str, start: Instant, outcome: Result<String, String>) -> TestResult {
    let (passed, message) = match outcome {
        Ok(message) => (true, message),
        Err(message) => (false, message),
    };
    TestResult {
        scenario: scenario.to_string(),
        passed,
        message: Some(message),
        duration: start.elapsed(),
    }
}

pub async fn test_connection(sse: &mut Connection, timeout: Duration) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Connection Test ===".bright_cyan().bold());
    println!(
        "{}",
        "Opening the push stream and checking it stays up".bright_white()
    );

    if let Err(e) = sse.wait_for_open(timeout).await {
        println!("{} Stream did not open: {}", "✗".red(), e);
        return Ok(result("connection_test", start, Err(e.to_string())));
    }
    println!("{} {} stream open", "✓".green(), sse.label);

    println!(
        "{} Waiting 2 seconds to verify the connection stays alive...",
        "→".blue()
    );
    let stable_until = Instant::now() + Duration::from_secs(2);
    loop {
        let remaining = stable_until.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match sse.next(remaining).await {
            Ok(Next::Frame(event)) => print_event(&sse.label, &event),
            Ok(Next::Opened) => {}
            Ok(Next::Idle) => break,
            Err(e) => {
                println!("{} Connection dropped: {}", "✗".red(), e);
                return Ok(result("connection_test", start, Err(e.to_string())));
            }
        }
    }

    println!("{} Connection remains stable", "✓".green());
    Ok(result(
        "connection_test",
        start,
        Ok("Push connection established and maintained".to_string()),
    ))
}

pub async fn test_wait_for_event(
    sse: &mut Connection,
    kind: &str,
    timeout: Duration,
) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Wait For Event ===".bright_cyan().bold());
    println!("{} Waiting up to {:?} for a {} frame...", "→".blue(), timeout, kind);

    match sse.wait_for_event(kind, timeout).await {
        Ok(event) => {
            print_event(&sse.label, &event);
            if event.envelope.is_some() {
                println!("{} Frame decoded correctly", "✓".green());
                Ok(result("wait_for_event", start, Ok(format!("Received {kind}"))))
            } else {
                println!("{} Frame did not decode!", "✗".red());
                Ok(result(
                    "wait_for_event",
                    start,
                    Err(format!("{kind} frame has an invalid payload")),
                ))
            }
        }
        Err(e) => {
            println!("{} {}", "✗".red(), e);
            Ok(result("wait_for_event", start, Err(e.to_string())))
        }
    }
}

/// Prints every frame for `duration` and reports counts per kind.
pub async fn test_watch(sse: &mut Connection, duration: Duration) -> Result<TestResult> {
    let start = Instant::now();
    let until = start + duration;
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    let mut undecodable = 0;

    println!("\n{}", "=== WATCH ===".bright_cyan().bold());
    println!("{} Printing frames for {:?}...", "→".blue(), duration);

    loop {
        let remaining = until.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match sse.next(remaining).await {
            Ok(Next::Frame(event)) => {
                print_event(&sse.label, &event);
                if event.envelope.is_none() {
                    undecodable += 1;
                }
                *seen.entry(event.kind).or_default() += 1;
            }
            Ok(Next::Opened) => println!("{} {} stream open", "✓".green(), sse.label),
            Ok(Next::Idle) => break,
            Err(e) => return Ok(result("watch", start, Err(e.to_string()))),
        }
    }

    let counts = seen
        .iter()
        .map(|(kind, count)| format!("{kind}={count}"))
        .collect::<Vec<_>>()
        .join(", ");
    let summary = format!("{counts} ({undecodable} undecodable)");

    if undecodable == 0 {
        Ok(result("watch", start, Ok(summary)))
    } else {
        Ok(result("watch", start, Err(summary)))
    }
}

pub async fn test_unread_count(client: &NotificationsClient) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Unread Count ===".bright_cyan().bold());

    match client.unread_count().await {
        Ok(count) => {
            println!("{} {} unread notifications", "✓".green(), count);
            Ok(result("unread_count", start, Ok(format!("{count} unread"))))
        }
        Err(e) => {
            println!("{} Unread count request failed: {}", "✗".red(), e);
            Ok(result("unread_count", start, Err(e.to_string())))
        }
    }
}
