use serde::Deserialize;

/// Top level layout of the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub webmon: WebmonConfig,

    /// Slack notification settings. Notifications are disabled when absent or
    /// when the webhook URL is empty.
    #[serde(default)]
    pub slack: Option<SlackConfig>,
}

/// The endpoint to monitor and how to probe it.
#[derive(Debug, Clone, Deserialize)]
pub struct WebmonConfig {
    /// The http or https URL that is probed.
    pub url: String,

    /// Upper bound for one probe, from DNS lookup to the last body byte.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Time between the start of two consecutive probes.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    /// When disabled, expired or untrusted certificates are still reported
    /// instead of failing the handshake.
    #[serde(default = "default_verify_certificates")]
    pub verify_certificates: bool,

    /// Name servers to resolve the target with. Uses the system resolver
    /// configuration when empty.
    #[serde(default)]
    pub dns_servers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackConfig {
    pub webhook_url: String,

    #[serde(default)]
    pub channel: String,

    #[serde(default)]
    pub username: String,

    /// Prepended to failure alerts, e.g. `<!channel>`.
    #[serde(default)]
    pub alert_prefix: String,

    /// Stop monitoring when a notification cannot be delivered.
    #[serde(default)]
    pub exit_on_error: bool,
}

fn default_timeout_seconds() -> u64 {
    5
}

fn default_interval_seconds() -> u64 {
    60
}

fn default_verify_certificates() -> bool {
    true
}

#[cfg(test)]
pub mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let yaml = r##"
                    webmon:
                        url: https://example.com
                    "##;

        let config: Config = serde_yaml::from_str(yaml).expect("Invalid YAML");
        assert_eq!(config.webmon.url, "https://example.com");
        assert_eq!(config.webmon.timeout_seconds, 5);
        assert_eq!(config.webmon.interval_seconds, 60);
        assert!(config.webmon.verify_certificates);
        assert!(config.webmon.dns_servers.is_empty());
        assert!(config.slack.is_none());
    }

    #[test]
    fn test_full_config_deserialization() {
        let yaml = r##"
                    webmon:
                        url: http://www.example.com/health
                        timeout_seconds: 2
                        interval_seconds: 10
                        verify_certificates: false
                        dns_servers: [1.1.1.1, 8.8.8.8]
                    slack:
                        webhook_url: https://hooks.slack.com/services/T000/B000/XXXX
                        channel: "#alerts"
                        username: webmon
                        alert_prefix: "<!channel>"
                        exit_on_error: true
                    "##;

        let config: Config = serde_yaml::from_str(yaml).expect("Invalid YAML");
        assert_eq!(config.webmon.timeout_seconds, 2);
        assert_eq!(config.webmon.interval_seconds, 10);
        assert!(!config.webmon.verify_certificates);
        assert_eq!(config.webmon.dns_servers, vec!["1.1.1.1", "8.8.8.8"]);

        let slack = config.slack.expect("Slack config not found");
        assert_eq!(slack.channel, "#alerts");
        assert_eq!(slack.username, "webmon");
        assert_eq!(slack.alert_prefix, "<!channel>");
        assert!(slack.exit_on_error);
    }

    #[test]
    fn test_slack_optional_fields() {
        let yaml = r##"
                    webmon:
                        url: https://example.com
                    slack:
                        webhook_url: https://hooks.slack.com/services/T000/B000/XXXX
                    "##;

        let config: Config = serde_yaml::from_str(yaml).expect("Invalid YAML");
        let slack = config.slack.expect("Slack config not found");
        assert!(slack.channel.is_empty());
        assert!(slack.alert_prefix.is_empty());
        assert!(!slack.exit_on_error);
    }

    #[test]
    fn test_missing_url_is_rejected() {
        let yaml = r##"
                    webmon:
                        timeout_seconds: 2
                    "##;

        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }
}
