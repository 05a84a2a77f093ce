//! Licence operations: activation, status checks and refreshes.
//!
//! Each operation runs to completion on the calling thread: resolve the
//! product, talk to the licensing server once, apply the answer to a working
//! copy of the licence table, write the table back.

use crate::codec::{
    ActivationOutcome, CheckOutcome, Credentials, RequestKind, ResponseMap, build_request_url,
    decode_activation, decode_check, endpoint,
};
use crate::config::LicenceConfig;
use crate::error::LicenceResult;
use crate::queries::{self, LicencedProducts, ProductMap};
use crate::record::{LicenceRecord, LicenceTable, StatusCode};
use crate::registry::{ProductInfo, ProductRegistry};
use crate::state::LicenceStateMachine;
use crate::store::{OptionStore, load_table};
use crate::transport::{HttpClient, HttpResponse};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of an activation attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationResult {
    /// Whether the server activated the licence.
    pub activated: bool,
    /// The stored record, when activation succeeded.
    pub record: Option<LicenceRecord>,
    /// The server's answer. `None` when the server was unreachable or did
    /// not answer with a JSON object.
    pub body: Option<ResponseMap>,
}

/// Result of checking one product during a refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProductCheck {
    /// The server confirmed the licence is active.
    Active,
    /// The licence is not active, or the server could not confirm it.
    Inactive,
    /// The check could not complete (e.g. the option store failed).
    Failed { error: String },
}

/// Per-product outcome of [`LicenceManager::update_licence_information`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    /// Keyed by product init.
    pub results: BTreeMap<String, ProductCheck>,
}

impl UpdateReport {
    /// Number of products confirmed active.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.results
            .values()
            .filter(|r| matches!(r, ProductCheck::Active))
            .count()
    }

    /// Product inits whose check failed.
    pub fn failed(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|(_, r)| matches!(r, ProductCheck::Failed { .. }))
            .map(|(init, _)| init.as_str())
    }
}

/// Coordinates the registry, the licensing server and the option store for
/// one product family.
pub struct LicenceManager {
    config: LicenceConfig,
    option_name: String,
    registry: ProductRegistry,
    store: Arc<dyn OptionStore>,
    http: Arc<dyn HttpClient>,
}

impl LicenceManager {
    /// Creates a manager persisting its licence table under `option_name`.
    pub fn new(
        config: LicenceConfig,
        option_name: impl Into<String>,
        store: Arc<dyn OptionStore>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            config,
            option_name: option_name.into(),
            registry: ProductRegistry::new(),
            store,
            http,
        }
    }

    #[must_use]
    pub fn config(&self) -> &LicenceConfig {
        &self.config
    }

    /// Name of the option holding this family's licence table.
    #[must_use]
    pub fn option_name(&self) -> &str {
        &self.option_name
    }

    #[must_use]
    pub fn registry(&self) -> &ProductRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ProductRegistry {
        &mut self.registry
    }

    /// Looks up a registered product.
    #[must_use]
    pub fn get_product(&self, init: &str) -> Option<&ProductInfo> {
        self.registry.get_product(init)
    }

    /// Looks up a registered product's server-side id.
    #[must_use]
    pub fn get_product_id(&self, init: &str) -> Option<&str> {
        self.registry.get_product_id(init)
    }

    /// Reads the stored licence table.
    pub fn get_licence(&self) -> LicenceResult<LicenceTable> {
        load_table(self.store.as_ref(), &self.option_name)
    }

    /// Endpoint for `kind` without credentials.
    #[must_use]
    pub fn get_api_uri(&self, kind: RequestKind) -> String {
        endpoint(&self.config, kind)
    }

    /// Instance identifier sent to the licensing server.
    #[must_use]
    pub fn get_home_url(&self) -> String {
        self.config.instance()
    }

    /// Url where `licence_key` can be renewed.
    #[must_use]
    pub fn get_renewing_uri(&self, licence_key: &str) -> Option<String> {
        self.config.renewing_uri(licence_key)
    }

    /// Human message for a server error code.
    #[must_use]
    pub fn get_error_code_message(&self, code: &str) -> Option<&'static str> {
        StatusCode::parse(code).message()
    }

    fn send(&self, kind: RequestKind, product: &ProductInfo, credentials: &Credentials) -> LicenceResult<HttpResponse> {
        let url = build_request_url(&self.config, kind, product, credentials);
        debug!(
            product_id = %product.product_id,
            endpoint = %self.get_api_uri(kind),
            "Sending {} request",
            kind
        );
        let response = self.http.get(&url);
        if let Err(e) = &response {
            warn!(product_id = %product.product_id, "Licensing server unreachable: {}", e);
        }
        response
    }

    /// Activates `product_init` with the given email and licence key.
    ///
    /// Fails with [`crate::LicenceError::UnknownProduct`] before any network
    /// traffic if the product is not registered. Server refusals are not
    /// errors: they come back with `activated == false` and the server's
    /// body.
    pub fn activate(
        &self,
        product_init: &str,
        email: &str,
        licence_key: &str,
    ) -> LicenceResult<ActivationResult> {
        let product = self.registry.require(product_init)?;
        let credentials = Credentials::from_input(email, licence_key);

        let outcome = decode_activation(self.send(RequestKind::Activation, product, &credentials));
        match outcome {
            ActivationOutcome::Activated { fields, body } => {
                let mut machine = LicenceStateMachine::load(self.store.as_ref(), &self.option_name)?;
                let record = machine.activate(&product.product_id, &credentials, &fields);
                machine.commit(self.store.as_ref(), &self.option_name)?;
                info!(
                    product_init = %product_init,
                    product_id = %product.product_id,
                    "Licence activated (remaining activations: {:?})",
                    record.activation_remaining
                );
                Ok(ActivationResult {
                    activated: true,
                    record: Some(record),
                    body: Some(body),
                })
            }
            ActivationOutcome::NotActivated { body } => {
                info!(product_init = %product_init, "Licensing server refused activation");
                Ok(ActivationResult {
                    activated: false,
                    record: None,
                    body: Some(body),
                })
            }
            ActivationOutcome::TransportFailure => Ok(ActivationResult {
                activated: false,
                record: None,
                body: None,
            }),
            ActivationOutcome::MalformedResponse(e) => {
                warn!(product_init = %product_init, "Unusable activation response: {}", e);
                Ok(ActivationResult {
                    activated: false,
                    record: None,
                    body: None,
                })
            }
        }
    }

    /// Re-validates the stored licence of `product_init` and returns whether
    /// it is active.
    ///
    /// Products without a stored record (or not registered at all) return
    /// `false` without contacting the server. Unreachable servers and
    /// unusable answers return `false` and leave the stored table untouched.
    pub fn check(&self, product_init: &str) -> LicenceResult<bool> {
        let Some(product) = self.registry.get_product(product_init) else {
            warn!(product_init = %product_init, "Check requested for unregistered product");
            return Ok(false);
        };

        let mut machine = LicenceStateMachine::load(self.store.as_ref(), &self.option_name)?;
        let Some(record) = machine.record(&product.product_id) else {
            debug!(product_init = %product_init, "No licence record, skipping check");
            return Ok(false);
        };
        let credentials = Credentials {
            email: record.email.clone(),
            licence_key: record.licence_key.clone(),
        };

        let outcome = decode_check(self.send(RequestKind::Check, product, &credentials));
        match &outcome {
            CheckOutcome::Error { code, .. } => info!(
                product_init = %product_init,
                code = %code,
                "Licence check rejected: {}",
                code.message().unwrap_or("unknown error code")
            ),
            CheckOutcome::Indeterminate => {
                debug!(product_init = %product_init, "Check response carried no verdict")
            }
            CheckOutcome::MalformedResponse(e) => {
                warn!(product_init = %product_init, "Unusable check response: {}", e)
            }
            CheckOutcome::Success { .. } | CheckOutcome::TransportFailure => {}
        }

        let activated = machine.apply_check(&product.product_id, &outcome);
        machine.commit(self.store.as_ref(), &self.option_name)?;
        Ok(activated)
    }

    /// Checks every registered product in turn. A failed check is recorded
    /// in the report and does not stop the remaining checks.
    pub fn update_licence_information(&self) -> UpdateReport {
        let mut report = UpdateReport::default();
        for product in self.registry.products() {
            let result = match self.check(&product.product_init) {
                Ok(true) => ProductCheck::Active,
                Ok(false) => ProductCheck::Inactive,
                Err(e) => {
                    warn!(product_init = %product.product_init, "Licence check failed: {}", e);
                    ProductCheck::Failed {
                        error: e.to_string(),
                    }
                }
            };
            report.results.insert(product.product_init.clone(), result);
        }
        info!(
            "Licence information updated: {} of {} products active",
            report.active_count(),
            report.results.len()
        );
        report
    }

    /// Registered products with an activated licence.
    pub fn get_activated_products(&self) -> LicenceResult<LicencedProducts> {
        Ok(queries::activated_products(&self.registry, &self.get_licence()?))
    }

    /// Registered products without an activated licence.
    pub fn get_to_active_products(&self) -> LicenceResult<ProductMap> {
        Ok(queries::to_active_products(&self.registry, &self.get_licence()?))
    }

    /// Expired (106) and banned (107) products, grouped by code.
    pub fn get_no_active_licence_key(&self) -> LicenceResult<BTreeMap<StatusCode, LicencedProducts>> {
        Ok(queries::no_active_licence_keys(&self.registry, &self.get_licence()?))
    }
}

impl std::fmt::Debug for LicenceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenceManager")
            .field("config", &self.config)
            .field("option_name", &self.option_name)
            .field("products", &self.registry.len())
            .finish()
    }
}
