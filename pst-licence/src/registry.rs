//! In-memory registry of licensable products.

use crate::error::{LicenceError, LicenceResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Static metadata for one registered product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    /// Key the product was registered under (its init file or slug).
    pub product_init: String,
    /// Product identifier known to the licensing server.
    pub product_id: String,
    /// Secret key shared with the licensing server.
    pub secret_key: String,
}

/// Product init to product metadata.
///
/// Iteration order is the lexical order of the init keys, which keeps
/// refreshes and derived listings deterministic.
#[derive(Debug, Clone, Default)]
pub struct ProductRegistry {
    products: BTreeMap<String, ProductInfo>,
}

impl ProductRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the product registered under `init`, returning
    /// the previous entry.
    pub fn register(
        &mut self,
        init: &str,
        secret_key: &str,
        product_id: &str,
    ) -> Option<ProductInfo> {
        self.products.insert(
            init.to_string(),
            ProductInfo {
                product_init: init.to_string(),
                product_id: product_id.to_string(),
                secret_key: secret_key.to_string(),
            },
        )
    }

    /// Looks up a product by init.
    #[must_use]
    pub fn get_product(&self, init: &str) -> Option<&ProductInfo> {
        self.products.get(init)
    }

    /// Looks up a product's server-side identifier by init.
    #[must_use]
    pub fn get_product_id(&self, init: &str) -> Option<&str> {
        self.products.get(init).map(|p| p.product_id.as_str())
    }

    /// Looks up a product, failing with [`LicenceError::UnknownProduct`].
    pub fn require(&self, init: &str) -> LicenceResult<&ProductInfo> {
        self.get_product(init)
            .ok_or_else(|| LicenceError::UnknownProduct(init.to_string()))
    }

    /// Iterates registered products in init order.
    pub fn products(&self) -> impl Iterator<Item = &ProductInfo> {
        self.products.values()
    }

    /// Returns true if `init` is registered.
    #[must_use]
    pub fn contains(&self, init: &str) -> bool {
        self.products.contains_key(init)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
