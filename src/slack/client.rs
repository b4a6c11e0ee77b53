use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

use crate::config::probe_config::SlackConfig;

/// Colour of the attachment bar in Slack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Good,
    Warning,
    Danger,
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("failed to send slack notification")]
    Request(#[from] reqwest::Error),

    #[error("slack webhook answered {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[derive(Debug, Serialize)]
struct Payload<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    channel: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    username: &'a str,
    attachments: Vec<Attachment<'a>>,
}

#[derive(Debug, Serialize)]
struct Attachment<'a> {
    fallback: String,
    color: Severity,
    #[serde(skip_serializing_if = "str::is_empty")]
    pretext: &'a str,
    title: &'a str,
    title_link: &'a str,
    text: &'a str,
}

/// Posts messages to a Slack incoming webhook.
#[derive(Debug, Clone)]
pub struct SlackClient {
    http: Client,
    webhook_url: String,
    channel: String,
    username: String,
}

impl SlackClient {
    pub fn new(config: &SlackConfig) -> Result<Self, NotifyError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("webmon/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(SlackClient {
            http,
            webhook_url: config.webhook_url.clone(),
            channel: config.channel.clone(),
            username: config.username.clone(),
        })
    }

    /// Sends one message about `target` as a single coloured attachment.
    ///
    /// # Arguments
    ///
    /// * `target` - The monitored URL, used as title and title link.
    /// * `prefix` - Text shown above the attachment, e.g. `<!channel>`. May be empty.
    /// * `message` - The attachment body.
    /// * `severity` - Attachment colour.
    pub async fn post(
        &self,
        target: &str,
        prefix: &str,
        message: &str,
        severity: Severity,
    ) -> Result<(), NotifyError> {
        let payload = build_payload(&self.channel, &self.username, target, prefix, message, severity);

        let response = self.http.post(&self.webhook_url).json(&payload).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            log::error!("Failed to post to Slack: {} - {}", status, body);
            return Err(NotifyError::Status { status, body });
        }
        Ok(())
    }
}

fn build_payload<'a>(
    channel: &'a str,
    username: &'a str,
    target: &'a str,
    prefix: &'a str,
    message: &'a str,
    severity: Severity,
) -> Payload<'a> {
    Payload {
        channel,
        username,
        attachments: vec![Attachment {
            fallback: format!("{target}: {message}"),
            color: severity,
            pretext: prefix,
            title: target,
            title_link: target,
            text: message,
        }],
    }
}
