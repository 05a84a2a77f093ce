//! Command line front end for PST product licences.
//!
//! Reads a TOML file describing the site, the product family and its
//! registered products, and wires a [`LicenceController`] backed by a JSON
//! option file and the blocking HTTP transport.

use chrono::NaiveDate;
use pst_licence::{
    FileOptionStore, HttpClient, LicenceConfig, LicenceController, LicenceError, LicenceProvider,
    LicenceRecord, LicenceResult, LicenceState, OptionStore, PanelRenderer, PanelView, ProductFamily,
    RenderTarget, StatusCode,
};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// One `[[products]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProductEntry {
    /// Registration key (plugin init file or theme slug).
    pub init: String,
    pub product_id: String,
    pub secret_key: String,
}

/// Contents of the CLI configuration file.
///
/// ```toml
/// family = "plugin"
/// store_path = "licences.json"
///
/// [licence]
/// home_url = "https://shop.example.com"
///
/// [[products]]
/// init = "pst-gateway/init.php"
/// product_id = "pst-gateway"
/// secret_key = "..."
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub family: ProductFamily,
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    pub licence: LicenceConfig,
    #[serde(default)]
    pub products: Vec<ProductEntry>,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("pst-licence-options.json")
}

impl CliConfig {
    /// Parses and validates a configuration document.
    pub fn from_toml_str(s: &str) -> LicenceResult<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| LicenceError::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file. A relative `store_path` is resolved
    /// against the file's directory.
    pub fn load(path: &Path) -> LicenceResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            LicenceError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let mut config = Self::from_toml_str(&contents)?;
        if config.store_path.is_relative() {
            if let Some(dir) = path.parent() {
                config.store_path = dir.join(&config.store_path);
            }
        }
        Ok(config)
    }

    pub fn validate(&self) -> LicenceResult<()> {
        self.licence.validate()?;
        for (i, product) in self.products.iter().enumerate() {
            if product.init.trim().is_empty() {
                return Err(LicenceError::Config(format!("products[{i}].init is empty")));
            }
            if product.product_id.trim().is_empty() {
                return Err(LicenceError::Config(format!(
                    "products[{i}].product_id is empty"
                )));
            }
        }
        Ok(())
    }

    /// Builds a controller with every configured product registered.
    pub fn controller(
        &self,
        store: Arc<dyn OptionStore>,
        http: Arc<dyn HttpClient>,
        renderer: Arc<dyn PanelRenderer>,
    ) -> LicenceController {
        let mut provider = self.family.provider(self.licence.clone(), store, http);
        for product in &self.products {
            provider.register(&product.init, &product.secret_key, &product.product_id);
        }
        LicenceController::new(provider, renderer)
    }

    /// Opens the option file named by `store_path`.
    pub fn open_store(&self) -> LicenceResult<FileOptionStore> {
        FileOptionStore::open(&self.store_path)
    }
}

/// One row of `status` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusLine {
    pub init: String,
    pub product_id: String,
    pub state: LicenceState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub licence_expires: Option<String>,
    /// Parsed expiry, when the server's string is a recognised date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_on: Option<NaiveDate>,
    /// The stored expiry lies in the past. The server remains the authority
    /// on the licence state until the next check.
    pub lapsed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusLine {
    /// Expiry column for text output.
    #[must_use]
    pub fn expiry_label(&self) -> String {
        let expiry = match (self.expires_on, self.licence_expires.as_deref()) {
            (Some(date), _) => date.to_string(),
            (None, Some(raw)) => raw.to_string(),
            (None, None) => "-".to_string(),
        };
        if self.lapsed {
            format!("{expiry} (lapsed)")
        } else {
            expiry
        }
    }
}

/// Local licence state of every registered product as of `today`. No
/// network traffic.
pub fn status_lines(
    controller: &LicenceController,
    today: NaiveDate,
) -> LicenceResult<Vec<StatusLine>> {
    let manager = controller.provider().manager();
    let table = manager.get_licence()?;
    Ok(manager
        .registry()
        .products()
        .map(|product| {
            let record = table.get(&product.product_id);
            StatusLine {
                init: product.product_init.clone(),
                product_id: product.product_id.clone(),
                state: LicenceState::of(record),
                licence_expires: record.and_then(|r| r.licence_expires.clone()),
                expires_on: record.and_then(LicenceRecord::expires_on),
                lapsed: record.is_some_and(|r| r.is_expired_on(today)),
                message: record.and_then(|r| r.message.clone()),
            }
        })
        .collect())
}

/// Plain-text activation panel.
pub fn render_text(view: &PanelView) -> String {
    let mut out = String::new();

    if !view.activated.is_empty() {
        let _ = writeln!(out, "Activated");
        for (init, entry) in &view.activated {
            let _ = write!(out, "  {init} ({})", entry.product.product_id);
            if let Some(expires) = &entry.licence.licence_expires {
                let _ = write!(out, " expires {expires}");
            }
            if let (Some(remaining), Some(limit)) = (
                entry.licence.activation_remaining,
                entry.licence.activation_limit,
            ) {
                let _ = write!(out, ", {remaining} of {limit} activations remaining");
            }
            out.push('\n');
        }
    }

    for (code, title) in [(StatusCode::Expired, "Expired"), (StatusCode::Banned, "Banned")] {
        let Some(products) = view.no_active.get(&code).filter(|p| !p.is_empty()) else {
            continue;
        };
        let _ = writeln!(out, "{title}");
        for (init, entry) in products {
            let reason = entry
                .licence
                .message
                .as_deref()
                .or(code.message())
                .unwrap_or_default();
            let _ = write!(out, "  {init} ({}): {reason}", entry.product.product_id);
            if let Some(uri) = view.renewing_uris.get(init) {
                let _ = write!(out, ". Renew at {uri}");
            }
            out.push('\n');
        }
    }

    let pending: Vec<_> = view
        .to_active
        .iter()
        .filter(|(init, _)| !view.no_active.values().any(|p| p.contains_key(*init)))
        .collect();
    if !pending.is_empty() {
        let _ = writeln!(out, "To activate");
        for (init, product) in pending {
            let _ = writeln!(out, "  {init} ({})", product.product_id);
        }
    }

    if out.is_empty() {
        out.push_str("No products registered\n");
    }
    out
}

/// Renders the panel as text. Streamed renders go to the wrapped writer.
pub struct TextPanelRenderer<W> {
    out: Mutex<W>,
}

impl TextPanelRenderer<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> TextPanelRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> LicenceResult<W> {
        self.out
            .into_inner()
            .map_err(|_| LicenceError::Render("output lock poisoned".into()))
    }
}

impl<W: Write + Send> PanelRenderer for TextPanelRenderer<W> {
    fn render(&self, view: &PanelView, target: RenderTarget) -> LicenceResult<Option<String>> {
        let text = render_text(view);
        match target {
            RenderTarget::Captured => Ok(Some(text)),
            RenderTarget::Streamed => {
                let mut out = self
                    .out
                    .lock()
                    .map_err(|_| LicenceError::Render("output lock poisoned".into()))?;
                out.write_all(text.as_bytes())
                    .and_then(|()| out.flush())
                    .map_err(|e| LicenceError::Render(e.to_string()))?;
                Ok(None)
            }
        }
    }
}
