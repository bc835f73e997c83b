//! Call engine configuration.
//!
//! Host policy flags, localized error strings, and timing knobs are loaded
//! from environment variables. The room access token is redacted in Debug
//! output.

use crate::media::composition::CompositionPolicy;
use common::config::LoggingConfig;
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default text shown when joining the room fails.
pub const DEFAULT_I18N_CONNECTION_ERROR: &str = "It was not possible to join the room";

/// Default text shown when the room drops with an error.
pub const DEFAULT_I18N_DISCONNECTED_WITH_ERROR: &str = "Disconnected";

/// Default label of the notice's accept button.
pub const DEFAULT_I18N_ACCEPT: &str = "Accept";

/// Default time a session may stay in `RECONNECTING` before it is torn down.
pub const DEFAULT_RECONNECT_TIMEOUT_SECONDS: u64 = 30;

/// Default capacity of the observer event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Call engine configuration.
#[derive(Clone)]
pub struct Config {
    /// When set, hang-up only emits `HANG_UP` and the host decides what to do.
    pub hang_up_in_app: bool,

    /// When set, connection errors are reported only as events; no notice is raised.
    pub handle_error_in_app: bool,

    /// Localized notice text for a failed join.
    pub i18n_connection_error: String,

    /// Localized notice text for an error disconnect.
    pub i18n_disconnected_with_error: String,

    /// Localized accept button label.
    pub i18n_accept: String,

    /// Host theme colors, validated `#RRGGBB` or `#AARRGGBB`.
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,

    /// Promote the last side participant into the primary slot when nobody shares a screen.
    pub promote_fallback: bool,

    /// Route call audio to the loudspeaker.
    pub speakerphone: bool,

    /// Maximum time in `RECONNECTING` before the engine gives up.
    pub reconnect_timeout_seconds: u64,

    /// Capacity of the bounded observer channel.
    pub event_buffer: usize,

    /// Optional default room access token.
    pub access_token: Option<SecretString>,

    /// Logging settings shared with the binary.
    pub logging: LoggingConfig,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("hang_up_in_app", &self.hang_up_in_app)
            .field("handle_error_in_app", &self.handle_error_in_app)
            .field("i18n_connection_error", &self.i18n_connection_error)
            .field(
                "i18n_disconnected_with_error",
                &self.i18n_disconnected_with_error,
            )
            .field("i18n_accept", &self.i18n_accept)
            .field("primary_color", &self.primary_color)
            .field("secondary_color", &self.secondary_color)
            .field("promote_fallback", &self.promote_fallback)
            .field("speakerphone", &self.speakerphone)
            .field("reconnect_timeout_seconds", &self.reconnect_timeout_seconds)
            .field("event_buffer", &self.event_buffer)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("logging", &self.logging)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hang_up_in_app: false,
            handle_error_in_app: false,
            i18n_connection_error: DEFAULT_I18N_CONNECTION_ERROR.to_string(),
            i18n_disconnected_with_error: DEFAULT_I18N_DISCONNECTED_WITH_ERROR.to_string(),
            i18n_accept: DEFAULT_I18N_ACCEPT.to_string(),
            primary_color: None,
            secondary_color: None,
            promote_fallback: true,
            speakerphone: true,
            reconnect_timeout_seconds: DEFAULT_RECONNECT_TIMEOUT_SECONDS,
            event_buffer: DEFAULT_EVENT_BUFFER,
            access_token: None,
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let hang_up_in_app = parse_flag(vars, "CALL_HANG_UP_IN_APP", defaults.hang_up_in_app)?;
        let handle_error_in_app = parse_flag(
            vars,
            "CALL_HANDLE_ERROR_IN_APP",
            defaults.handle_error_in_app,
        )?;
        let promote_fallback =
            parse_flag(vars, "CALL_PROMOTE_FALLBACK", defaults.promote_fallback)?;
        let speakerphone = parse_flag(vars, "CALL_SPEAKERPHONE", defaults.speakerphone)?;

        let i18n_connection_error = vars
            .get("CALL_I18N_CONNECTION_ERROR")
            .cloned()
            .unwrap_or(defaults.i18n_connection_error);

        let i18n_disconnected_with_error = vars
            .get("CALL_I18N_DISCONNECTED_WITH_ERROR")
            .cloned()
            .unwrap_or(defaults.i18n_disconnected_with_error);

        let i18n_accept = vars
            .get("CALL_I18N_ACCEPT")
            .cloned()
            .unwrap_or(defaults.i18n_accept);

        let primary_color = parse_color(vars, "CALL_PRIMARY_COLOR_HEX")?;
        let secondary_color = parse_color(vars, "CALL_SECONDARY_COLOR_HEX")?;

        let reconnect_timeout_seconds = match vars.get("CALL_RECONNECT_TIMEOUT_SECONDS") {
            Some(raw) => raw.parse().map_err(|_| {
                ConfigError::InvalidValue(format!("CALL_RECONNECT_TIMEOUT_SECONDS={raw}"))
            })?,
            None => defaults.reconnect_timeout_seconds,
        };

        let event_buffer = match vars.get("CALL_EVENT_BUFFER") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue(format!(
                        "CALL_EVENT_BUFFER={raw} (must be a positive integer)"
                    )))
                }
            },
            None => defaults.event_buffer,
        };

        let access_token = vars
            .get("CALL_ACCESS_TOKEN")
            .filter(|t| !t.is_empty())
            .map(|t| SecretString::from(t.clone()));

        Ok(Config {
            hang_up_in_app,
            handle_error_in_app,
            i18n_connection_error,
            i18n_disconnected_with_error,
            i18n_accept,
            primary_color,
            secondary_color,
            promote_fallback,
            speakerphone,
            reconnect_timeout_seconds,
            event_buffer,
            access_token,
            logging: LoggingConfig::from_vars(vars),
        })
    }

    pub fn reconnect_timeout(&self) -> Duration {
        Duration::from_secs(self.reconnect_timeout_seconds)
    }

    pub fn composition_policy(&self) -> CompositionPolicy {
        CompositionPolicy {
            promote_fallback: self.promote_fallback,
        }
    }
}

fn parse_flag(
    vars: &HashMap<String, String>,
    key: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match vars.get(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(format!("{key}={v}"))),
        },
    }
}

fn parse_color(vars: &HashMap<String, String>, key: &str) -> Result<Option<String>, ConfigError> {
    let Some(raw) = vars.get(key).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let digits = raw.strip_prefix('#').unwrap_or("");
    let valid_len = digits.len() == 6 || digits.len() == 8;
    if valid_len && digits.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(Some(raw.to_ascii_uppercase()))
    } else {
        Err(ConfigError::InvalidValue(format!(
            "{key}={raw} (expected #RRGGBB or #AARRGGBB)"
        )))
    }
}
