//! Product families.
//!
//! A family decides how products are registered and where its licence
//! table is stored; everything else is shared behaviour provided by
//! [`LicenceProvider`]'s default methods on top of [`LicenceManager`].

use crate::config::{LicenceConfig, PRODUCTS_OPTION, THEMES_OPTION};
use crate::error::LicenceResult;
use crate::manager::{ActivationResult, LicenceManager, UpdateReport};
use crate::queries::{LicencedProducts, ProductMap};
use crate::record::StatusCode;
use crate::registry::{ProductInfo, ProductRegistry};
use crate::store::OptionStore;
use crate::transport::HttpClient;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// A family of licensable products.
pub trait LicenceProvider: Send + Sync {
    /// Registers (or re-registers) a product under `init`.
    fn register(&mut self, init: &str, secret_key: &str, product_id: &str);

    /// The shared licence machinery for this family.
    fn manager(&self) -> &LicenceManager;

    fn get_products(&self) -> &ProductRegistry {
        self.manager().registry()
    }

    fn get_product(&self, init: &str) -> Option<&ProductInfo> {
        self.manager().get_product(init)
    }

    fn activate(
        &self,
        product_init: &str,
        email: &str,
        licence_key: &str,
    ) -> LicenceResult<ActivationResult> {
        self.manager().activate(product_init, email, licence_key)
    }

    fn check(&self, product_init: &str) -> LicenceResult<bool> {
        self.manager().check(product_init)
    }

    fn update_licence_information(&self) -> UpdateReport {
        self.manager().update_licence_information()
    }

    fn get_activated_products(&self) -> LicenceResult<LicencedProducts> {
        self.manager().get_activated_products()
    }

    fn get_to_active_products(&self) -> LicenceResult<ProductMap> {
        self.manager().get_to_active_products()
    }

    fn get_no_active_licence_key(&self) -> LicenceResult<BTreeMap<StatusCode, LicencedProducts>> {
        self.manager().get_no_active_licence_key()
    }
}

/// Product family selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductFamily {
    #[default]
    Plugin,
    Theme,
}

impl ProductFamily {
    /// Option holding this family's licence table.
    #[must_use]
    pub fn option_name(&self) -> &'static str {
        match self {
            Self::Plugin => PRODUCTS_OPTION,
            Self::Theme => THEMES_OPTION,
        }
    }

    /// Creates an empty provider for this family.
    #[must_use]
    pub fn provider(
        &self,
        config: LicenceConfig,
        store: Arc<dyn OptionStore>,
        http: Arc<dyn HttpClient>,
    ) -> Box<dyn LicenceProvider> {
        match self {
            Self::Plugin => Box::new(PluginLicence::new(config, store, http)),
            Self::Theme => Box::new(ThemeLicence::new(config, store, http)),
        }
    }
}

/// Licences for plugins, keyed by plugin init file.
#[derive(Debug)]
pub struct PluginLicence {
    manager: LicenceManager,
}

impl PluginLicence {
    pub fn new(config: LicenceConfig, store: Arc<dyn OptionStore>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            manager: LicenceManager::new(config, PRODUCTS_OPTION, store, http),
        }
    }
}

impl LicenceProvider for PluginLicence {
    fn register(&mut self, init: &str, secret_key: &str, product_id: &str) {
        if self
            .manager
            .registry_mut()
            .register(init, secret_key, product_id)
            .is_some()
        {
            debug!(plugin_init = %init, "Plugin registration replaced");
        }
    }

    fn manager(&self) -> &LicenceManager {
        &self.manager
    }
}

/// Licences for themes, keyed by theme slug.
#[derive(Debug)]
pub struct ThemeLicence {
    manager: LicenceManager,
}

impl ThemeLicence {
    pub fn new(config: LicenceConfig, store: Arc<dyn OptionStore>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            manager: LicenceManager::new(config, THEMES_OPTION, store, http),
        }
    }
}

impl LicenceProvider for ThemeLicence {
    fn register(&mut self, init: &str, secret_key: &str, product_id: &str) {
        if self
            .manager
            .registry_mut()
            .register(init, secret_key, product_id)
            .is_some()
        {
            debug!(theme = %init, "Theme registration replaced");
        }
    }

    fn manager(&self) -> &LicenceManager {
        &self.manager
    }
}
