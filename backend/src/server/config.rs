//! Application settings and the HTTP server configuration built from them.
//!
//! [`AppSettings`] is loaded through OrthoConfig from CLI flags, environment
//! variables prefixed `SPOOLKEEPER_` and an optional config file. It is
//! validated once into [`RuntimeSettings`]; invalid values abort startup.

use std::net::SocketAddr;
use std::time::Duration;

use actix_web::web;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[cfg(feature = "metrics")]
use actix_web_prom::PrometheusMetrics;
use spoolkeeper::domain::{DownloadPolicy, MonitorSettings};
use spoolkeeper::inbound::http::state::HttpState;
use spoolkeeper::inbound::ws::state::WsState;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_INVENTORY_URL: &str = "http://localhost:7912";

/// Raw configuration values.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "SPOOLKEEPER")]
pub struct AppSettings {
    /// PostgreSQL connection URL. Required.
    pub database_url: Option<String>,
    /// HTTP listen address.
    pub bind_addr: Option<String>,
    /// Inventory service base URL.
    pub inventory_url: Option<String>,
    /// Inventory request timeout.
    #[ortho_config(default = 10)]
    pub inventory_timeout_secs: u64,
    /// Shared poll tick for every device.
    #[ortho_config(default = 5)]
    pub poll_interval_secs: u64,
    /// Timeout for one printer status request.
    #[ortho_config(default = 5)]
    pub status_timeout_secs: u64,
    /// Overall budget for fetching one print file.
    #[ortho_config(default = 300)]
    pub download_timeout_secs: u64,
    /// Download attempts, including the first.
    #[ortho_config(default = 3)]
    pub download_max_attempts: u32,
    /// Delay before the first download retry.
    #[ortho_config(default = 1000)]
    pub download_initial_backoff_ms: u64,
    /// Lifetime of a pairing session.
    #[ortho_config(default = 300)]
    pub pairing_ttl_secs: u64,
    /// Interval between expired pairing session sweeps.
    #[ortho_config(default = 60)]
    pub pairing_sweep_secs: u64,
    /// WebSocket origin allow-list. Empty allows all.
    #[ortho_config(skip_cli)]
    pub ws_allowed_origins: Option<OriginList>,
}

/// Origin allow-list as configured.
///
/// The environment layer turns a comma separated value into a list while a
/// single origin stays a string, so both shapes are accepted. Entries may
/// themselves be comma separated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OriginList {
    /// One value, possibly comma separated.
    One(String),
    /// Values already split into a list.
    Many(Vec<String>),
}

impl OriginList {
    /// Non-empty trimmed origins in configuration order.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        let values = match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::Many(values) => values.as_slice(),
        };
        values
            .iter()
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
    }
}

/// Reasons [`AppSettings::validate`] rejects a configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("database_url is required")]
    MissingDatabaseUrl,
    #[error("bind_addr `{0}` is not a socket address")]
    InvalidBindAddr(String),
    #[error("inventory_url `{0}` must be an http or https URL")]
    InvalidInventoryUrl(String),
    #[error("ws_allowed_origins entry `{0}` is not a URL")]
    InvalidOrigin(String),
    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
}

/// Validated settings consumed by the bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub inventory_url: Url,
    pub inventory_timeout: Duration,
    pub monitor: MonitorSettings,
    pub pairing_ttl: Duration,
    pub pairing_sweep: Duration,
    pub ws_allowed_origins: Vec<Url>,
}

fn positive_secs(value: u64, field: &'static str) -> Result<Duration, SettingsError> {
    if value == 0 {
        return Err(SettingsError::NotPositive(field));
    }
    Ok(Duration::from_secs(value))
}

impl AppSettings {
    /// Check every value and convert to typed settings.
    ///
    /// # Errors
    ///
    /// Returns the first invalid value found.
    pub fn validate(&self) -> Result<RuntimeSettings, SettingsError> {
        let database_url = self
            .database_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(SettingsError::MissingDatabaseUrl)?
            .to_owned();

        let bind_raw = self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
        let bind_addr = bind_raw
            .parse()
            .map_err(|_| SettingsError::InvalidBindAddr(bind_raw.to_owned()))?;

        let inventory_raw = self
            .inventory_url
            .as_deref()
            .unwrap_or(DEFAULT_INVENTORY_URL);
        let inventory_url = Url::parse(inventory_raw)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .ok_or_else(|| SettingsError::InvalidInventoryUrl(inventory_raw.to_owned()))?;

        if self.download_max_attempts == 0 {
            return Err(SettingsError::NotPositive("download_max_attempts"));
        }
        if self.download_initial_backoff_ms == 0 {
            return Err(SettingsError::NotPositive("download_initial_backoff_ms"));
        }
        let monitor = MonitorSettings {
            poll_interval: positive_secs(self.poll_interval_secs, "poll_interval_secs")?,
            status_timeout: positive_secs(self.status_timeout_secs, "status_timeout_secs")?,
            download: DownloadPolicy {
                max_attempts: self.download_max_attempts,
                initial_backoff: Duration::from_millis(self.download_initial_backoff_ms),
                overall_timeout: positive_secs(
                    self.download_timeout_secs,
                    "download_timeout_secs",
                )?,
                ..DownloadPolicy::default()
            },
        };

        let ws_allowed_origins = self
            .ws_allowed_origins
            .iter()
            .flat_map(OriginList::entries)
            .map(|origin| {
                Url::parse(origin).map_err(|_| SettingsError::InvalidOrigin(origin.to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RuntimeSettings {
            database_url,
            bind_addr,
            inventory_url,
            inventory_timeout: positive_secs(
                self.inventory_timeout_secs,
                "inventory_timeout_secs",
            )?,
            monitor,
            pairing_ttl: positive_secs(self.pairing_ttl_secs, "pairing_ttl_secs")?,
            pairing_sweep: positive_secs(self.pairing_sweep_secs, "pairing_sweep_secs")?,
            ws_allowed_origins,
        })
    }
}

/// Everything [`super::create_server`] needs to serve requests.
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) http_state: web::Data<HttpState>,
    pub(crate) ws_state: web::Data<WsState>,
    #[cfg(feature = "metrics")]
    pub(crate) prometheus: Option<PrometheusMetrics>,
}

impl ServerConfig {
    /// Construct a server configuration around prepared adapter state.
    #[must_use]
    pub fn new(bind_addr: SocketAddr, http_state: HttpState, ws_state: WsState) -> Self {
        Self {
            bind_addr,
            http_state: web::Data::new(http_state),
            ws_state: web::Data::new(ws_state),
            #[cfg(feature = "metrics")]
            prometheus: None,
        }
    }

    #[cfg(feature = "metrics")]
    /// Attach Prometheus middleware to the configuration.
    #[must_use]
    pub fn with_metrics(mut self, prometheus: Option<PrometheusMetrics>) -> Self {
        self.prometheus = prometheus;
        self
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for settings loading and validation.

    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::{fixture, rstest};

    use super::*;

    const KEYS: [&str; 12] = [
        "SPOOLKEEPER_DATABASE_URL",
        "SPOOLKEEPER_BIND_ADDR",
        "SPOOLKEEPER_INVENTORY_URL",
        "SPOOLKEEPER_INVENTORY_TIMEOUT_SECS",
        "SPOOLKEEPER_POLL_INTERVAL_SECS",
        "SPOOLKEEPER_STATUS_TIMEOUT_SECS",
        "SPOOLKEEPER_DOWNLOAD_TIMEOUT_SECS",
        "SPOOLKEEPER_DOWNLOAD_MAX_ATTEMPTS",
        "SPOOLKEEPER_DOWNLOAD_INITIAL_BACKOFF_MS",
        "SPOOLKEEPER_PAIRING_TTL_SECS",
        "SPOOLKEEPER_PAIRING_SWEEP_SECS",
        "SPOOLKEEPER_WS_ALLOWED_ORIGINS",
    ];

    fn cleared_env_with(
        overrides: &[(&'static str, &str)],
    ) -> Vec<(&'static str, Option<String>)> {
        KEYS.iter()
            .map(|key| {
                let value = overrides
                    .iter()
                    .find(|(name, _)| name == key)
                    .map(|(_, value)| (*value).to_owned());
                (*key, value)
            })
            .collect()
    }

    fn load_from_empty_args() -> AppSettings {
        AppSettings::load_from_iter([OsString::from("spoolkeeper")]).expect("config should load")
    }

    #[fixture]
    fn minimal() -> AppSettings {
        AppSettings {
            database_url: Some("postgres://localhost/spoolkeeper".to_owned()),
            bind_addr: None,
            inventory_url: None,
            inventory_timeout_secs: 10,
            poll_interval_secs: 5,
            status_timeout_secs: 5,
            download_timeout_secs: 300,
            download_max_attempts: 3,
            download_initial_backoff_ms: 1000,
            pairing_ttl_secs: 300,
            pairing_sweep_secs: 60,
            ws_allowed_origins: None,
        }
    }

    #[rstest]
    fn defaults_apply_when_only_the_database_is_set() {
        let _guard = lock_env(cleared_env_with(&[(
            "SPOOLKEEPER_DATABASE_URL",
            "postgres://db/spools",
        )]));

        let settings = load_from_empty_args().validate().expect("valid settings");

        assert_eq!(settings.database_url, "postgres://db/spools");
        assert_eq!(settings.bind_addr, "0.0.0.0:8080".parse().expect("addr"));
        assert_eq!(settings.inventory_url.as_str(), "http://localhost:7912/");
        assert_eq!(settings.inventory_timeout, Duration::from_secs(10));
        assert_eq!(settings.monitor, MonitorSettings::default());
        assert_eq!(settings.pairing_ttl, Duration::from_secs(300));
        assert_eq!(settings.pairing_sweep, Duration::from_secs(60));
        assert!(settings.ws_allowed_origins.is_empty());
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env(cleared_env_with(&[
            ("SPOOLKEEPER_DATABASE_URL", "postgres://db/spools"),
            ("SPOOLKEEPER_BIND_ADDR", "127.0.0.1:9000"),
            ("SPOOLKEEPER_INVENTORY_URL", "https://spoolman.lan"),
            ("SPOOLKEEPER_POLL_INTERVAL_SECS", "2"),
            ("SPOOLKEEPER_DOWNLOAD_MAX_ATTEMPTS", "5"),
            ("SPOOLKEEPER_PAIRING_TTL_SECS", "120"),
            (
                "SPOOLKEEPER_WS_ALLOWED_ORIGINS",
                "http://dash.lan:3000, https://dash.example",
            ),
        ]));

        let settings = load_from_empty_args().validate().expect("valid settings");

        assert_eq!(settings.bind_addr.port(), 9000);
        assert_eq!(settings.inventory_url.host_str(), Some("spoolman.lan"));
        assert_eq!(settings.monitor.poll_interval, Duration::from_secs(2));
        assert_eq!(settings.monitor.download.max_attempts, 5);
        assert_eq!(settings.pairing_ttl, Duration::from_secs(120));
        assert_eq!(settings.ws_allowed_origins.len(), 2);
    }

    #[rstest]
    fn a_single_origin_from_the_environment_loads() {
        let _guard = lock_env(cleared_env_with(&[
            ("SPOOLKEEPER_DATABASE_URL", "postgres://db/spools"),
            ("SPOOLKEEPER_WS_ALLOWED_ORIGINS", "https://dash.example"),
        ]));

        let settings = load_from_empty_args().validate().expect("valid settings");

        assert_eq!(
            settings
                .ws_allowed_origins
                .iter()
                .map(Url::as_str)
                .collect::<Vec<_>>(),
            vec!["https://dash.example/"]
        );
    }

    #[rstest]
    #[case::single(serde_json::json!("http://a.lan"), vec!["http://a.lan"])]
    #[case::comma_string(serde_json::json!("http://a.lan, http://b.lan,"), vec!["http://a.lan", "http://b.lan"])]
    #[case::list(serde_json::json!(["http://a.lan", " ", "http://b.lan"]), vec!["http://a.lan", "http://b.lan"])]
    fn origin_lists_accept_both_shapes(
        #[case] raw: serde_json::Value,
        #[case] expected: Vec<&str>,
    ) {
        let list: OriginList = serde_json::from_value(raw).expect("origin list");
        assert_eq!(list.entries().collect::<Vec<_>>(), expected);
    }

    #[rstest]
    fn missing_database_url_is_rejected(mut minimal: AppSettings) {
        minimal.database_url = Some("   ".to_owned());
        assert_eq!(
            minimal.validate(),
            Err(SettingsError::MissingDatabaseUrl)
        );
    }

    #[rstest]
    #[case::bind(|s: &mut AppSettings| s.bind_addr = Some("nowhere".into()))]
    #[case::inventory_scheme(|s: &mut AppSettings| s.inventory_url = Some("ftp://spools".into()))]
    #[case::origin(|s: &mut AppSettings| s.ws_allowed_origins = Some(OriginList::One("not a url".into())))]
    #[case::poll(|s: &mut AppSettings| s.poll_interval_secs = 0)]
    #[case::attempts(|s: &mut AppSettings| s.download_max_attempts = 0)]
    #[case::backoff(|s: &mut AppSettings| s.download_initial_backoff_ms = 0)]
    #[case::sweep(|s: &mut AppSettings| s.pairing_sweep_secs = 0)]
    fn invalid_values_fail_validation(
        mut minimal: AppSettings,
        #[case] corrupt: fn(&mut AppSettings),
    ) {
        corrupt(&mut minimal);
        assert!(minimal.validate().is_err());
    }

    #[rstest]
    fn download_policy_keeps_the_backoff_cap(minimal: AppSettings) {
        let settings = minimal.validate().expect("valid settings");
        assert_eq!(
            settings.monitor.download.max_backoff,
            DownloadPolicy::default().max_backoff
        );
        assert_eq!(
            settings.monitor.download.initial_backoff,
            Duration::from_millis(1000)
        );
    }
}
