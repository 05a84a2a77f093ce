//! Activation panel contract.
//!
//! Rendering itself belongs to the embedding application. The core builds a
//! [`PanelView`] and says where the output should go.

use crate::error::LicenceResult;
use crate::manager::LicenceManager;
use crate::queries::{self, LicencedProducts, ProductMap};
use crate::record::StatusCode;
use serde::Serialize;
use std::collections::BTreeMap;

/// Where rendered panel output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    /// Return the markup to the caller (ajax-style requests).
    Captured,
    /// Write the markup directly to the output stream.
    Streamed,
}

impl RenderTarget {
    /// Picks the target for a request.
    #[must_use]
    pub fn for_request(ajax: bool) -> Self {
        if ajax { Self::Captured } else { Self::Streamed }
    }
}

/// Everything the activation panel displays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PanelView {
    /// Products with an active licence, keyed by init.
    pub activated: LicencedProducts,
    /// Products still to activate, keyed by init.
    pub to_active: ProductMap,
    /// Expired and banned products, grouped by status code.
    pub no_active: BTreeMap<StatusCode, LicencedProducts>,
    /// Renewal links for expired products, keyed by init.
    pub renewing_uris: BTreeMap<String, String>,
}

impl PanelView {
    /// Builds the view from a single read of the licence table.
    pub fn build(manager: &LicenceManager) -> LicenceResult<Self> {
        let table = manager.get_licence()?;
        let registry = manager.registry();
        let no_active = queries::no_active_licence_keys(registry, &table);

        let renewing_uris = no_active
            .get(&StatusCode::Expired)
            .into_iter()
            .flatten()
            .filter_map(|(init, entry)| {
                manager
                    .get_renewing_uri(&entry.licence.licence_key)
                    .map(|uri| (init.clone(), uri))
            })
            .collect();

        Ok(Self {
            activated: queries::activated_products(registry, &table),
            to_active: queries::to_active_products(registry, &table),
            no_active,
            renewing_uris,
        })
    }
}

/// Renders the activation panel.
pub trait PanelRenderer: Send + Sync {
    /// Renders `view`. A [`RenderTarget::Captured`] render returns the
    /// markup; a [`RenderTarget::Streamed`] render writes it out and returns
    /// `None`.
    fn render(&self, view: &PanelView, target: RenderTarget) -> LicenceResult<Option<String>>;
}
