use domain::{NotificationInbox, NotificationsClient};
use log::*;
use service::{
    config::{BackoffKind, Config},
    logging::Logger,
};
use sse::{
    Backoff, Callbacks, CounterSink, Counters, CredentialSource, Notifier, Options,
    ReconnectOptions,
};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

const INBOX_PAGE_SIZE: u32 = 20;

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to start logger: {e}");
        std::process::exit(1);
    }

    info!(
        "Starting clinic notifications against {} [{}]",
        config.api_base_url(),
        config.runtime_env()
    );

    let credentials = CredentialSource::new();

    let api = match NotificationsClient::new(config.api_base_url(), credentials.reader()) {
        Ok(api) => Arc::new(api),
        Err(e) => {
            error!("Failed to build notification API client: {e}");
            std::process::exit(1);
        }
    };

    let counters = Counters::new(Some(api.clone()), None);
    let inbox = Arc::new(Mutex::new(NotificationInbox::new()));

    let notifier = match Notifier::builder(notifier_options(&config))
        .session(credentials.reader())
        .counters(counters.clone())
        .callbacks(callbacks(inbox.clone()))
        .spawn()
    {
        Ok(notifier) => notifier,
        Err(e) => {
            error!("Failed to start notifier: {e}");
            std::process::exit(1);
        }
    };

    tokio::spawn(log_counter(counters.unread.clone()));
    tokio::spawn(log_counter(counters.pending_clinics.clone()));
    tokio::spawn(log_status(notifier.subscribe_status()));

    match config.access_token() {
        Some(token) => {
            credentials.sign_in(token);
            load_inbox(&api, &inbox).await;
        }
        None => warn!("No access token configured; waiting idle until shutdown"),
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
    }

    info!("Shutting down");
    credentials.sign_out();
    notifier.shutdown().await;
}

fn notifier_options(config: &Config) -> Options {
    let backoff = match config.reconnect_backoff {
        BackoffKind::Fixed => Backoff::Fixed,
        BackoffKind::Exponential => Backoff::Exponential {
            max_delay: config.max_reconnect_delay(),
        },
    };

    Options {
        base_url: config.api_base_url().to_string(),
        reconnect: ReconnectOptions {
            delay: config.reconnect_delay(),
            max_attempts: config.max_reconnect_attempts,
            backoff,
        },
        log_heartbeats: config.is_development(),
    }
}

fn callbacks(inbox: Arc<Mutex<NotificationInbox>>) -> Callbacks {
    Callbacks::new()
        .on_notification(move |notification| {
            let mut inbox = inbox.lock().unwrap_or_else(PoisonError::into_inner);
            if !inbox.upsert(notification.clone()) {
                debug!(
                    "Notification {} already in inbox",
                    notification.notification_id
                );
            }
        })
        .on_shift_update(|payload| info!("Shift updated: {payload}"))
        .on_booking_update(|update| {
            info!(
                "Booking {} {:?} (status {})",
                update.booking_code, update.action, update.status
            );
            if update.is_reassignment() {
                info!(
                    "Booking {} reassigned from {:?} to {:?}",
                    update.booking_code, update.old_staff_id, update.new_staff_id
                );
            }
        })
}

async fn load_inbox(api: &NotificationsClient, inbox: &Mutex<NotificationInbox>) {
    match api.list(0, INBOX_PAGE_SIZE).await {
        Ok(page) => {
            let mut inbox = inbox.lock().unwrap_or_else(PoisonError::into_inner);
            let added = inbox.merge_page(page.content);
            info!(
                "Loaded {added} notifications ({} unread of {} total)",
                inbox.unread_count(),
                page.total_elements
            );
        }
        Err(e) => warn!("Failed to load notifications: {e}"),
    }
}

async fn log_counter(sink: Arc<CounterSink>) {
    let mut rx = sink.subscribe();
    while rx.changed().await.is_ok() {
        let state = *rx.borrow_and_update();
        if !state.loading {
            info!("{} = {}", sink.name(), state.value);
        }
    }
}

async fn log_status(mut rx: watch::Receiver<sse::ConnectionStatus>) {
    while rx.changed().await.is_ok() {
        let status = *rx.borrow_and_update();
        if status.reconnect_pending {
            info!(
                "Push connection {} (reconnect attempt {} pending)",
                status.state, status.reconnect_attempts
            );
        } else {
            info!("Push connection {}", status.state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(args: &[&str]) -> Config {
        use clap::Parser;
        let mut argv = vec!["clinic_notify"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_options_use_fixed_backoff_by_default() {
        let options = notifier_options(&config(&[
            "--api-base-url",
            "https://api.example.com/api",
            "--runtime-env",
            "production",
        ]));

        assert_eq!(options.base_url, "https://api.example.com/api");
        assert_eq!(options.reconnect.backoff, Backoff::Fixed);
        assert!(!options.log_heartbeats);
    }

    #[test]
    fn test_options_map_exponential_backoff() {
        let options = notifier_options(&config(&[
            "--reconnect-backoff",
            "exponential",
            "--reconnect-delay-ms",
            "250",
            "--max-reconnect-delay-ms",
            "4000",
            "--max-reconnect-attempts",
            "4",
            "--runtime-env",
            "development",
        ]));

        assert_eq!(options.reconnect.delay, Duration::from_millis(250));
        assert_eq!(options.reconnect.max_attempts, 4);
        assert_eq!(
            options.reconnect.backoff,
            Backoff::Exponential {
                max_delay: Duration::from_millis(4000)
            }
        );
        assert!(options.log_heartbeats);
    }
}
