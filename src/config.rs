use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use url::Url;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::models::DeliveryWindow;
use crate::services::checkout::CheckoutSettings;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const ENV_PREFIX: &str = "CHECKOUT";
const DEFAULT_ORDER_SERVICE_URL: &str = "http://localhost:8080/api";
const DEFAULT_STOREFRONT_URL: &str = "http://localhost:3000";
const DEFAULT_RETURN_PATH: &str = "/checkout/return";
const DEFAULT_PROCESSOR_API_URL: &str = "https://api.stripe.com";
const DEFAULT_CURRENCY: &str = "HKD";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
const DEFAULT_PRESENTATION_DELAY_MS: u64 = 3000;
const DEFAULT_PAYME_POLL_INTERVAL_SECS: u64 = 30;
const DEFAULT_PAYME_SUCCESS_DELAY_MS: u64 = 2000;
const DEFAULT_TRANSIENT_STORE_DIR: &str = ".checkout-state";

/// Checkout configuration with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CheckoutConfig {
    /// Profile name
    #[serde(default = "default_environment")]
    #[validate(length(min = 1))]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Order service base URL, e.g. `https://shop.example/api`
    #[serde(default = "default_order_service_url")]
    #[validate(custom = "validate_absolute_url")]
    pub order_service_url: String,

    /// Storefront origin for checkout, return and confirmation routes
    #[serde(default = "default_storefront_url")]
    #[validate(custom = "validate_absolute_url")]
    pub storefront_url: String,

    #[serde(default = "default_return_path")]
    #[validate(custom = "validate_route_path")]
    pub return_path: String,

    /// Payment processor REST base
    #[serde(default = "default_processor_api_url")]
    #[validate(custom = "validate_absolute_url")]
    pub processor_api_url: String,

    /// Publishable key for client-secret-scoped processor calls
    #[serde(default)]
    pub processor_publishable_key: String,

    #[serde(default = "default_currency")]
    #[validate(length(equal = 3))]
    pub currency: String,

    /// Order service and processor request timeout
    #[serde(default = "default_http_timeout_secs")]
    #[validate(range(min = 1, max = 120))]
    pub http_timeout_secs: u64,

    #[serde(default = "default_presentation_delay_ms")]
    pub success_redirect_delay_ms: u64,

    #[serde(default = "default_presentation_delay_ms")]
    pub retry_redirect_delay_ms: u64,

    /// Wait before the single re-check of a `processing` payment
    #[serde(default = "default_presentation_delay_ms")]
    pub processing_recheck_delay_ms: u64,

    #[serde(default = "default_payme_poll_interval_secs")]
    #[validate(range(min = 1))]
    pub payme_poll_interval_secs: u64,

    #[serde(default = "default_payme_success_delay_ms")]
    pub payme_success_delay_ms: u64,

    /// Earliest delivery date, in days from today
    #[serde(default = "default_min_delivery_lead_days")]
    #[validate(range(min = 0))]
    pub min_delivery_lead_days: i64,

    /// Latest delivery date, in days from today
    #[serde(default = "default_max_delivery_lead_days")]
    pub max_delivery_lead_days: i64,

    /// Major-unit tolerance when comparing paid and expected totals
    #[serde(default = "default_amount_tolerance")]
    pub amount_tolerance: Decimal,

    /// Directory backing the file transient store
    #[serde(default = "default_transient_store_dir")]
    pub transient_store_dir: PathBuf,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            order_service_url: default_order_service_url(),
            storefront_url: default_storefront_url(),
            return_path: default_return_path(),
            processor_api_url: default_processor_api_url(),
            processor_publishable_key: String::new(),
            currency: default_currency(),
            http_timeout_secs: default_http_timeout_secs(),
            success_redirect_delay_ms: default_presentation_delay_ms(),
            retry_redirect_delay_ms: default_presentation_delay_ms(),
            processing_recheck_delay_ms: default_presentation_delay_ms(),
            payme_poll_interval_secs: default_payme_poll_interval_secs(),
            payme_success_delay_ms: default_payme_success_delay_ms(),
            min_delivery_lead_days: default_min_delivery_lead_days(),
            max_delivery_lead_days: default_max_delivery_lead_days(),
            amount_tolerance: default_amount_tolerance(),
            transient_store_dir: default_transient_store_dir(),
        }
    }
}

impl CheckoutConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn delivery_window(&self) -> DeliveryWindow {
        DeliveryWindow {
            min_lead_days: self.min_delivery_lead_days,
            max_lead_days: self.max_delivery_lead_days,
        }
    }

    pub fn storefront_url(&self) -> Result<Url, AppConfigError> {
        Url::parse(&self.storefront_url)
            .map_err(|e| AppConfigError::InvalidUrl(format!("storefront_url: {}", e)))
    }

    /// Absolute URL the processor sends the shopper back to.
    pub fn return_url(&self) -> Result<Url, AppConfigError> {
        self.storefront_url()?
            .join(&self.return_path)
            .map_err(|e| AppConfigError::InvalidUrl(format!("return_path: {}", e)))
    }

    /// Runtime settings for the checkout components.
    pub fn checkout_settings(&self) -> Result<CheckoutSettings, AppConfigError> {
        let mut settings = CheckoutSettings::new(self.storefront_url()?, self.return_url()?);
        settings.delivery_window = self.delivery_window();
        settings.amount_tolerance = self.amount_tolerance;
        settings.currency = self.currency.clone();
        settings.success_redirect_delay = Duration::from_millis(self.success_redirect_delay_ms);
        settings.retry_redirect_delay = Duration::from_millis(self.retry_redirect_delay_ms);
        settings.processing_recheck_delay =
            Duration::from_millis(self.processing_recheck_delay_ms);
        settings.payme_poll_interval = Duration::from_secs(self.payme_poll_interval_secs);
        settings.payme_success_delay = Duration::from_millis(self.payme_success_delay_ms);
        Ok(settings)
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.max_delivery_lead_days <= self.min_delivery_lead_days {
            let mut err = ValidationError::new("delivery_window");
            err.message = Some("max_delivery_lead_days must exceed min_delivery_lead_days".into());
            errors.add("max_delivery_lead_days", err);
        }

        if self.amount_tolerance.is_sign_negative() {
            let mut err = ValidationError::new("amount_tolerance");
            err.message = Some("Must not be negative".into());
            errors.add("amount_tolerance", err);
        }

        if self.is_production() && self.processor_publishable_key.trim().is_empty() {
            let mut err = ValidationError::new("processor_publishable_key_required");
            err.message =
                Some("Set CHECKOUT__PROCESSOR_PUBLISHABLE_KEY outside development".into());
            errors.add("processor_publishable_key", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Runs derive and cross-field validation.
    pub fn validate_all(&self) -> Result<(), AppConfigError> {
        self.validate().map_err(|e| {
            error!("Configuration validation failed: {:?}", e);
            AppConfigError::Validation(e)
        })?;
        self.validate_additional_constraints().map_err(|e| {
            error!("Configuration constraint validation failed: {:?}", e);
            AppConfigError::Validation(e)
        })
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Invalid URL in configuration: {0}")]
    InvalidUrl(String),
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_order_service_url() -> String {
    DEFAULT_ORDER_SERVICE_URL.to_string()
}
fn default_storefront_url() -> String {
    DEFAULT_STOREFRONT_URL.to_string()
}
fn default_return_path() -> String {
    DEFAULT_RETURN_PATH.to_string()
}
fn default_processor_api_url() -> String {
    DEFAULT_PROCESSOR_API_URL.to_string()
}
fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}
fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}
fn default_presentation_delay_ms() -> u64 {
    DEFAULT_PRESENTATION_DELAY_MS
}
fn default_payme_poll_interval_secs() -> u64 {
    DEFAULT_PAYME_POLL_INTERVAL_SECS
}
fn default_payme_success_delay_ms() -> u64 {
    DEFAULT_PAYME_SUCCESS_DELAY_MS
}
fn default_min_delivery_lead_days() -> i64 {
    DeliveryWindow::default().min_lead_days
}
fn default_max_delivery_lead_days() -> i64 {
    DeliveryWindow::default().max_lead_days
}
fn default_amount_tolerance() -> Decimal {
    Decimal::new(1, 2)
}
fn default_transient_store_dir() -> PathBuf {
    PathBuf::from(DEFAULT_TRANSIENT_STORE_DIR)
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_absolute_url(value: &str) -> Result<(), ValidationError> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => {
            let mut err = ValidationError::new("url");
            err.message = Some("Must be an absolute http(s) URL".into());
            Err(err)
        }
    }
}

fn validate_route_path(value: &str) -> Result<(), ValidationError> {
    if value.starts_with('/') && !value.starts_with("//") {
        Ok(())
    } else {
        let mut err = ValidationError::new("route_path");
        err.message = Some("Must be an absolute path such as /checkout/return".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("storefront_checkout={}", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Loads checkout configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (CHECKOUT__*)
pub fn load_config() -> Result<CheckoutConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

/// Same as [`load_config`] with an explicit config directory.
pub fn load_config_from(config_dir: &Path) -> Result<CheckoutConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let config = Config::builder()
        .set_default("environment", run_env.clone())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(&run_env)).required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    let checkout_config: CheckoutConfig = config.try_deserialize()?;
    checkout_config.validate_all()?;

    info!("Configuration loaded successfully");
    Ok(checkout_config)
}
