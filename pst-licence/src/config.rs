//! Client configuration: licensing server endpoint and local site identity.

use crate::error::{LicenceError, LicenceResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default licensing server origin.
pub const DEFAULT_API_URI: &str = "http://www.thaiepay.com";

/// Default query-string template appended to the api origin.
pub const DEFAULT_API_QUERY_ARGS: &str = "?wc-api=software-api&request=%request%";

/// Placeholder substituted with the request action name.
pub const REQUEST_PLACEHOLDER: &str = "%request%";

/// Option holding the licence table for plugin products.
pub const PRODUCTS_OPTION: &str = "pst_products_licence_activation";

/// Option holding the licence table for theme products.
pub const THEMES_OPTION: &str = "pst_themes_licence_activation";

/// Licence client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenceConfig {
    /// Licensing server origin (e.g. `http://www.thaiepay.com`).
    pub api_uri: String,
    /// Query-string template containing the `%request%` placeholder.
    pub api_query_args: String,
    /// Home url of this installation, including scheme.
    pub home_url: String,
    /// Whether the current request is served over HTTPS. When unset, the
    /// scheme of `home_url` decides.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    /// Transport timeout in seconds.
    pub timeout_secs: u64,
    /// User agent sent by the HTTP transport.
    pub user_agent: String,
}

impl Default for LicenceConfig {
    fn default() -> Self {
        Self {
            api_uri: DEFAULT_API_URI.to_string(),
            api_query_args: DEFAULT_API_QUERY_ARGS.to_string(),
            home_url: String::new(),
            secure: None,
            timeout_secs: 30,
            user_agent: concat!("pst-licence/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl LicenceConfig {
    /// Creates a configuration for the given home url. Security follows
    /// its scheme.
    #[must_use]
    pub fn for_home_url(home_url: impl Into<String>) -> Self {
        Self {
            home_url: home_url.into(),
            ..Self::default()
        }
    }

    /// Returns `secure`, or whether `home_url` is an https url when unset.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.secure
            .unwrap_or_else(|| self.home_url.starts_with("https://"))
    }

    /// Parses and validates a TOML configuration.
    pub fn from_toml_str(s: &str) -> LicenceResult<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| LicenceError::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML configuration file.
    pub fn load(path: &Path) -> LicenceResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            LicenceError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Validates required fields.
    pub fn validate(&self) -> LicenceResult<()> {
        if self.api_uri.trim().is_empty() {
            return Err(LicenceError::Config("api_uri is required".into()));
        }
        if !self.api_query_args.contains(REQUEST_PLACEHOLDER) {
            return Err(LicenceError::Config(format!(
                "api_query_args must contain the {REQUEST_PLACEHOLDER} placeholder"
            )));
        }
        if self.home_url.trim().is_empty() {
            return Err(LicenceError::Config("home_url is required".into()));
        }
        Ok(())
    }

    /// Returns the instance identifier: the home url without its leading
    /// scheme. Which scheme is stripped depends on [`Self::is_secure`].
    #[must_use]
    pub fn instance(&self) -> String {
        let scheme = if self.is_secure() { "https://" } else { "http://" };
        self.home_url
            .strip_prefix(scheme)
            .unwrap_or(&self.home_url)
            .to_string()
    }

    /// Returns the url where an expired licence key can be renewed, or
    /// `None` for an empty key.
    #[must_use]
    pub fn renewing_uri(&self, licence_key: &str) -> Option<String> {
        if licence_key.is_empty() {
            return None;
        }
        Some(format!(
            "{}?renewing_key={}",
            self.api_uri.replace("www.", ""),
            urlencoding::encode(licence_key)
        ))
    }
}
