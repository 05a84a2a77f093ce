//! Shared test helpers for licence tests.

#![allow(dead_code)]

use pst_licence::{
    HttpClient, HttpResponse, LicenceConfig, LicenceError, LicenceManager, LicenceRecord,
    LicenceResult, LicenceTable, MemoryOptionStore, OptionStore, PRODUCTS_OPTION, PanelRenderer,
    PanelView, RenderTarget, load_table, save_table,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const HOME_URL: &str = "https://shop.example.com";
pub const PLUGIN_INIT: &str = "pst-gateway/init.php";
pub const PRODUCT_ID: &str = "pst-gateway";
pub const SECRET_KEY: &str = "s3cr3t";
pub const EMAIL: &str = "owner@example.com";
pub const LICENCE_KEY: &str = "KEY-1234";

/// Fake transport replaying scripted responses and recording requested urls.
#[derive(Default)]
pub struct ScriptedHttp {
    responses: Mutex<VecDeque<LicenceResult<HttpResponse>>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues a 200 response with a JSON body.
    pub fn reply(&self, body: serde_json::Value) {
        self.push(Ok(HttpResponse::ok(body.to_string())));
    }

    /// Queues a raw body.
    pub fn reply_raw(&self, status: u16, body: &str) {
        self.push(Ok(HttpResponse {
            status,
            body: body.to_string(),
        }));
    }

    /// Queues a transport failure.
    pub fn fail(&self) {
        self.push(Err(LicenceError::Transport("connection refused".into())));
    }

    fn push(&self, response: LicenceResult<HttpResponse>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl HttpClient for ScriptedHttp {
    fn get(&self, url: &str) -> LicenceResult<HttpResponse> {
        self.requests.lock().unwrap().push(url.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LicenceError::Transport("no scripted response".into())))
    }
}

/// Option store counting writes.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryOptionStore,
    writes: Mutex<usize>,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap()
    }
}

impl OptionStore for CountingStore {
    fn get_option(&self, name: &str) -> LicenceResult<Option<serde_json::Value>> {
        self.inner.get_option(name)
    }

    fn update_option(&self, name: &str, value: serde_json::Value) -> LicenceResult<()> {
        *self.writes.lock().unwrap() += 1;
        self.inner.update_option(name, value)
    }
}

/// Option store whose writes always fail.
#[derive(Default)]
pub struct ReadOnlyStore {
    inner: MemoryOptionStore,
}

impl ReadOnlyStore {
    /// A read-only store already holding one record.
    pub fn with_record(product_id: &str, record: LicenceRecord) -> Self {
        let store = Self::default();
        seed(&store.inner, product_id, record);
        store
    }
}

impl OptionStore for ReadOnlyStore {
    fn get_option(&self, name: &str) -> LicenceResult<Option<serde_json::Value>> {
        self.inner.get_option(name)
    }

    fn update_option(&self, _name: &str, _value: serde_json::Value) -> LicenceResult<()> {
        Err(LicenceError::Storage("read-only".into()))
    }
}

/// Renderer that records every render and returns a fixed marker.
#[derive(Default)]
pub struct RecordingRenderer {
    pub renders: Mutex<Vec<(PanelView, RenderTarget)>>,
}

impl RecordingRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn render_count(&self) -> usize {
        self.renders.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<(PanelView, RenderTarget)> {
        self.renders.lock().unwrap().last().cloned()
    }
}

impl PanelRenderer for RecordingRenderer {
    fn render(&self, view: &PanelView, target: RenderTarget) -> LicenceResult<Option<String>> {
        self.renders.lock().unwrap().push((view.clone(), target));
        Ok(match target {
            RenderTarget::Captured => Some(format!("<panel activated={}>", view.activated.len())),
            RenderTarget::Streamed => None,
        })
    }
}

pub fn config() -> LicenceConfig {
    LicenceConfig::for_home_url(HOME_URL)
}

/// A plugin-family manager with the standard product registered.
pub fn manager(store: Arc<dyn OptionStore>, http: Arc<dyn HttpClient>) -> LicenceManager {
    let mut manager = LicenceManager::new(config(), PRODUCTS_OPTION, store, http);
    manager
        .registry_mut()
        .register(PLUGIN_INIT, SECRET_KEY, PRODUCT_ID);
    manager
}

/// An activated record for the standard credentials.
pub fn active_record() -> LicenceRecord {
    LicenceRecord {
        email: EMAIL.into(),
        licence_key: LICENCE_KEY.into(),
        activated: true,
        licence_expires: Some("2030-01-01".into()),
        activation_limit: Some(3),
        activation_remaining: Some(2),
        ..LicenceRecord::default()
    }
}

/// Seeds the plugin table with one record for `product_id`.
pub fn seed(store: &dyn OptionStore, product_id: &str, record: LicenceRecord) {
    let mut table = load_table(store, PRODUCTS_OPTION).unwrap();
    table.insert(product_id, record);
    save_table(store, PRODUCTS_OPTION, &table).unwrap();
}

pub fn table(store: &dyn OptionStore) -> LicenceTable {
    load_table(store, PRODUCTS_OPTION).unwrap()
}

/// Returns the decoded value of a query parameter in a recorded url.
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        if k != name {
            return None;
        }
        urlencoding::decode(v).ok().map(|v| v.into_owned())
    })
}
