use colored::*;
use sse::message::Event as PushEvent;
use std::time::Duration;

use crate::sse_client::Event;

#[derive(Debug)]
pub struct TestResult {
    pub scenario: String,
    pub passed: bool,
    pub message: Option<String>,
    pub duration: Duration,
}

pub fn print_event(label: &str, event: &Event) {
    println!(
        "\n[{}] {} event received",
        label.bright_blue().bold(),
        event.kind.yellow()
    );

    if let Some(summary) = event.envelope.as_ref().map(|e| summarize(&e.event)) {
        println!("   {}", summary.bright_white());
    }

    if let Ok(pretty) = serde_json::to_string_pretty(&event.data) {
        println!("   {}", pretty.dimmed());
    }
}

fn summarize(event: &PushEvent) -> String {
    match event {
        PushEvent::Notification(n) => format!("{:?} notification {}", n.category, n.notification_id),
        PushEvent::Heartbeat => "heartbeat".to_string(),
        PushEvent::ShiftUpdate(_) => "shift update".to_string(),
        PushEvent::ClinicCounterUpdate(Some(count)) => format!("{count} clinics pending approval"),
        PushEvent::ClinicCounterUpdate(None) => "clinic counter with non-numeric payload".to_string(),
        PushEvent::BookingUpdate(update) => {
            format!("booking {} {:?}", update.booking_code, update.action)
        }
    }
}

pub fn print_test_summary(results: &[TestResult]) {
    println!("\n{}", "=== TEST SUMMARY ===".bright_white().bold());

    let total = results.len();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = total - passed;

    for result in results {
        let status = if result.passed {
            "PASS".green().bold()
        } else {
            "FAIL".red().bold()
        };

        println!("[{}] {} ({:?})", status, result.scenario, result.duration);

        if let Some(msg) = &result.message {
            println!("      {}", msg.dimmed());
        }
    }

    println!(
        "\n{}: {} passed, {} failed",
        "Results".bold(),
        passed.to_string().green(),
        failed.to_string().red()
    );
}
