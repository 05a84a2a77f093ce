//! Licence activation and entitlement checks for PST products.
//!
//! This crate handles:
//! - Registering licensable products (plugins and themes) with their secret keys
//! - Activating a licence key against the remote licensing server
//! - Periodically re-validating stored licences and applying expiry, ban and
//!   revocation answers
//! - Deriving the activated / to-activate / expired-or-banned views shown in
//!   the activation panel
//!
//! # Licence Table
//!
//! Each product family persists one table, keyed by product id, under a
//! named option in an [`OptionStore`]. The table is read at the start of an
//! operation and written back whole when the server answers.
//!
//! # Server Codes
//!
//! | code | meaning                    | effect on the record        |
//! |------|----------------------------|-----------------------------|
//! | 200  | valid                      | refreshed                   |
//! | 101  | invalid licence key        | deleted                     |
//! | 102  | software deactivated       | deleted                     |
//! | 106  | expired                    | kept, marked not activated  |
//! | 107  | banned                     | kept, marked not activated  |
//! | 100, 103-105 | request problems   | unchanged                   |

mod codec;
mod config;
mod controller;
mod error;
mod manager;
mod panel;
mod provider;
mod queries;
mod record;
mod registry;
mod sanitize;
mod state;
mod store;
mod transport;
mod value;

pub use codec::{
    ActivationFields, ActivationOutcome, CheckOutcome, Credentials, ParseError, RequestKind,
    ResponseMap, build_request_url, decode_activation, decode_check, endpoint, parse_body,
};
pub use config::{
    DEFAULT_API_QUERY_ARGS, DEFAULT_API_URI, LicenceConfig, PRODUCTS_OPTION, REQUEST_PLACEHOLDER,
    THEMES_OPTION,
};
pub use controller::{ActivateRequest, LicenceController, RequestContext, ResponseEnvelope};
pub use error::{LicenceError, LicenceResult};
pub use manager::{ActivationResult, LicenceManager, ProductCheck, UpdateReport};
pub use panel::{PanelRenderer, PanelView, RenderTarget};
pub use provider::{LicenceProvider, PluginLicence, ProductFamily, ThemeLicence};
pub use queries::{
    LicencedProducts, ProductLicence, ProductMap, activated_products, no_active_licence_keys,
    to_active_products,
};
pub use record::{LicenceRecord, LicenceState, LicenceTable, RecordEffect, StatusCode};
pub use registry::{ProductInfo, ProductRegistry};
pub use sanitize::{sanitize_email, sanitize_text_field};
pub use state::LicenceStateMachine;
pub use store::{FileOptionStore, MemoryOptionStore, OptionStore, load_table, save_table};
pub use transport::{HttpClient, HttpResponse};

#[cfg(feature = "online")]
pub use transport::ReqwestClient;
