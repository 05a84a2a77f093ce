//! Derived views over the registry and the licence table. No I/O.

use crate::record::{LicenceRecord, LicenceTable, StatusCode};
use crate::registry::{ProductInfo, ProductRegistry};
use serde::Serialize;
use std::collections::BTreeMap;

/// A registered product together with its stored licence record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductLicence {
    #[serde(flatten)]
    pub product: ProductInfo,
    pub licence: LicenceRecord,
}

/// Products keyed by product init.
pub type ProductMap = BTreeMap<String, ProductInfo>;

/// Products with their licence records, keyed by product init.
pub type LicencedProducts = BTreeMap<String, ProductLicence>;

/// Registered products whose record has `activated == true`.
#[must_use]
pub fn activated_products(registry: &ProductRegistry, table: &LicenceTable) -> LicencedProducts {
    registry
        .products()
        .filter_map(|product| {
            let record = table.get(&product.product_id).filter(|r| r.activated)?;
            Some((
                product.product_init.clone(),
                ProductLicence {
                    product: product.clone(),
                    licence: record.clone(),
                },
            ))
        })
        .collect()
}

/// Registered products that are not activated.
#[must_use]
pub fn to_active_products(registry: &ProductRegistry, table: &LicenceTable) -> ProductMap {
    let activated = activated_products(registry, table);
    registry
        .products()
        .filter(|product| !activated.contains_key(&product.product_init))
        .map(|product| (product.product_init.clone(), product.clone()))
        .collect()
}

/// Not-activated products whose record retains code 106 (expired) or 107
/// (banned), grouped by that code.
#[must_use]
pub fn no_active_licence_keys(
    registry: &ProductRegistry,
    table: &LicenceTable,
) -> BTreeMap<StatusCode, LicencedProducts> {
    let mut grouped: BTreeMap<StatusCode, LicencedProducts> = BTreeMap::new();
    for (init, product) in to_active_products(registry, table) {
        let Some(record) = table.get(&product.product_id) else {
            continue;
        };
        if record.activated {
            continue;
        }
        let Some(code @ (StatusCode::Expired | StatusCode::Banned)) = record.status_code.clone()
        else {
            continue;
        };
        grouped.entry(code).or_default().insert(
            init,
            ProductLicence {
                product,
                licence: record.clone(),
            },
        );
    }
    grouped
}
