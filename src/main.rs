use std::process::ExitCode;
use std::time::Duration;

use chrono::Local;
use tokio::time::{MissedTickBehavior, interval};
use url::Url;

pub mod config;
pub mod console;
pub mod http_probe;
pub mod slack;

use config::app_config::{AppConfig, load_config, setup_resolver, setup_tls_config};
use http_probe::prelude::*;
use slack::{Notification, NotifyError, SlackClient, failure_notification, success_notification};

/// The optional Slack sink together with how failures to reach it are handled.
struct Notifier {
    client: SlackClient,
    alert_prefix: String,
    exit_on_error: bool,
}

impl Notifier {
    async fn deliver(&self, target: &Url, notification: Notification) -> Result<(), NotifyError> {
        let sent = self
            .client
            .post(
                target.as_str(),
                &notification.prefix,
                &notification.message,
                notification.severity,
            )
            .await;

        match sent {
            Err(e) if !self.exit_on_error => {
                log::warn!("Slack notification not delivered: {}", report(&e));
                Ok(())
            }
            other => other,
        }
    }
}

fn setup(app_config: &AppConfig) -> Result<(Prober, Option<Notifier>), Box<dyn std::error::Error>> {
    let tls = setup_tls_config(app_config.verify_certificates)?;
    let (resolver_config, resolver_opts) = setup_resolver(&app_config.dns_servers)?;
    let prober = Prober::new(tls, resolver_config, resolver_opts, app_config.timeout);

    let notifier = match &app_config.slack {
        Some(slack) => Some(Notifier {
            client: SlackClient::new(slack)?,
            alert_prefix: slack.alert_prefix.clone(),
            exit_on_error: slack.exit_on_error,
        }),
        None => None,
    };

    Ok((prober, notifier))
}

async fn poll_once(target: &Url, prober: &Prober, notifier: Option<&Notifier>) -> Result<(), NotifyError> {
    let date = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let outcome = prober.probe(target).await;

    println!("{date}");
    match &outcome {
        Ok(result) => {
            if target.scheme() == "https" {
                let host = target.host_str().unwrap_or_default();
                print!(
                    "{}",
                    console::cert_info(result.leaf_certificate.as_ref(), host, chrono::Utc::now())
                );
            }
            println!("{}", console::time_info(result));
        }
        Err(e) => println!("Polling error occurred!: {}\n", report(e)),
    }

    let Some(notifier) = notifier else {
        return Ok(());
    };
    let notification = match &outcome {
        Ok(result) => success_notification(&date, result),
        Err(e) => failure_notification(&date, &notifier.alert_prefix, e),
    };
    notifier.deliver(target, notification).await
}

/// Probes once immediately and then on every tick. A probe always finishes
/// before the next one starts; ticks missed meanwhile are delayed, not bunched.
async fn run(
    target: &Url,
    every: Duration,
    prober: &Prober,
    notifier: Option<&Notifier>,
) -> Result<(), NotifyError> {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        poll_once(target, prober, notifier).await?;
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let app_config = match load_config() {
        Ok(app_config) => app_config,
        Err(e) => {
            log::error!("Cannot load configuration: {}", report(&e));
            return ExitCode::FAILURE;
        }
    };

    let (prober, notifier) = match setup(&app_config) {
        Ok(components) => components,
        Err(e) => {
            log::error!("Startup failed: {}", report(e.as_ref()));
            return ExitCode::FAILURE;
        }
    };

    log::info!(
        "Monitoring {} every {:?} with a {:?} timeout, slack notifications {}",
        app_config.target,
        app_config.interval,
        prober.timeout(),
        if notifier.is_some() { "enabled" } else { "disabled" }
    );

    tokio::select! {
        result = run(&app_config.target, app_config.interval, &prober, notifier.as_ref()) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                log::error!("Stopping after failed notification: {}", report(&e));
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            log::info!("Interrupted, shutting down");
            ExitCode::SUCCESS
        }
    }
}
