use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// `AppConfig` holds all configuration parameters required by the application.
///
/// The configuration is loaded from environment variables prefixed with
/// `CALENDARIUM_` (optionally via a `.env` file) or uses default values if the
/// variable is not set. Secrets have empty defaults and are checked by
/// [`AppConfig::validate`].
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AppConfig {
    // --- Database settings ---
    /// Path of the SQLite database file. Created if it does not exist.
    pub database_path: String,

    // --- HTTP server ---
    /// The port on which the HTTP server will listen.
    pub http_port: u16,
    /// Basic-auth user allowed to list orders.
    pub orders_api_username: String,
    /// Basic-auth password allowed to list orders.
    pub orders_api_password: String,

    // --- Order forwarding ---
    /// Forward accepted orders to the order management service.
    pub forwarding_enabled: bool,
    /// Order creation endpoint of the order management service.
    pub billbee_url: String,
    /// Value of the `X-Billbee-Api-Key` header.
    pub billbee_api_key: String,
    pub billbee_username: String,
    pub billbee_password: String,
    /// Product ID of the calendar inside the order management service.
    pub billbee_product_id: i64,
    /// Minimum spacing between two forwarding requests (e.g. "500ms").
    #[serde(deserialize_with = "deserialize_duration")]
    pub forward_interval: Duration,
    /// Timeout of a single forwarding request (e.g. "30s").
    #[serde(deserialize_with = "deserialize_duration")]
    pub forward_timeout: Duration,

    // --- Failure notification ---
    /// Send an email when forwarding fails.
    pub smtp_enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    /// Sender address of alert emails.
    pub smtp_from: String,
    /// Recipients of alert emails (comma-separated string in env, at most two).
    pub notify_to: Vec<String>,
    /// Link to the order list that is embedded in alert emails.
    pub orders_overview_url: String,
}

/// Accepts human-readable durations like "500ms", "5s", "1m".
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let val = String::deserialize(deserializer)?;
    humantime::parse_duration(&val)
        .map_err(|e| D::Error::custom(format!("Invalid duration '{val}': {e}")))
}

impl AppConfig {
    /// Loads configuration from environment variables (and optionally from `.env` file).
    ///
    /// Fields not set via env will be filled with default values.
    ///
    /// # Errors
    /// Returns an error if environment variables cannot be parsed into the expected types.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            // Database
            .set_default("database_path", "calendarium.db")?
            // HTTP
            .set_default("http_port", 8000)?
            .set_default("orders_api_username", "")?
            .set_default("orders_api_password", "")?
            // Forwarding
            .set_default("forwarding_enabled", false)?
            .set_default("billbee_url", "")?
            .set_default("billbee_api_key", "")?
            .set_default("billbee_username", "")?
            .set_default("billbee_password", "")?
            .set_default("billbee_product_id", 200000000711626_i64)?
            .set_default("forward_interval", "500ms")?
            .set_default("forward_timeout", "30s")?
            // Notification
            .set_default("smtp_enabled", false)?
            .set_default("smtp_host", "")?
            .set_default("smtp_port", 587)?
            .set_default("smtp_username", "")?
            .set_default("smtp_password", "")?
            .set_default("smtp_from", "hallo@calendariumculinarium.de")?
            .set_default("notify_to", Vec::<String>::new())?
            .set_default(
                "orders_overview_url",
                "https://calendariumculinarium.de/api/orders",
            )?
            .add_source(
                config::Environment::with_prefix("CALENDARIUM")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("notify_to"),
            )
            .build()?;

        settings
            .try_deserialize()
            .context("Failed to load configuration")
    }

    /// Checks combinations of settings that deserialize fine but cannot work.
    ///
    /// # Errors
    /// Returns an error naming the first inconsistent setting.
    pub fn validate(&self) -> Result<()> {
        if self.orders_api_username.is_empty() || self.orders_api_password.is_empty() {
            bail!("orders_api_username and orders_api_password must be set");
        }
        if self.forwarding_enabled && self.billbee_url.is_empty() {
            bail!("forwarding is enabled but billbee_url is empty");
        }
        if self.smtp_enabled && !self.forwarding_enabled {
            bail!("smtp notification requires forwarding to be enabled");
        }
        if self.smtp_enabled && (self.smtp_host.is_empty() || self.notify_to.is_empty()) {
            bail!("smtp notification requires smtp_host and at least one notify_to address");
        }
        if self.notify_to.len() > 2 {
            bail!("at most two notify_to addresses are supported, got {}", self.notify_to.len());
        }
        Ok(())
    }
}
