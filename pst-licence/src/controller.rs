//! Request-level entry points for the activation panel.
//!
//! Wraps a [`LicenceProvider`] with the response shape the admin panel
//! expects: the server's answer plus, when appropriate, the re-rendered
//! panel.

use crate::codec::ResponseMap;
use crate::error::LicenceResult;
use crate::manager::UpdateReport;
use crate::panel::{PanelRenderer, PanelView, RenderTarget};
use crate::provider::LicenceProvider;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Activation form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivateRequest {
    pub product_init: String,
    pub email: String,
    pub licence_key: String,
}

/// Properties of the incoming request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// The caller wants the panel markup back instead of streamed output.
    pub ajax: bool,
}

impl RequestContext {
    #[must_use]
    pub fn target(&self) -> RenderTarget {
        RenderTarget::for_request(self.ajax)
    }
}

/// Response returned to the panel.
///
/// Serializes to the server's body with an added `template` key holding the
/// captured panel markup. With neither a body nor a template it serializes
/// to `false`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseEnvelope {
    pub body: Option<ResponseMap>,
    pub template: Option<String>,
}

impl ResponseEnvelope {
    /// Returns the JSON form of the envelope.
    #[must_use]
    pub fn to_value(&self) -> Value {
        if self.body.is_none() && self.template.is_none() {
            return Value::Bool(false);
        }
        let mut map = self.body.clone().unwrap_or_default();
        if let Some(template) = &self.template {
            map.insert("template".into(), Value::String(template.clone()));
        }
        Value::Object(map)
    }
}

impl Serialize for ResponseEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

type AfterCheckHook = Box<dyn Fn(&UpdateReport) + Send + Sync>;

/// Activation panel controller for one product family.
pub struct LicenceController {
    provider: Box<dyn LicenceProvider>,
    renderer: Arc<dyn PanelRenderer>,
    after_check: Vec<AfterCheckHook>,
}

impl LicenceController {
    pub fn new(provider: Box<dyn LicenceProvider>, renderer: Arc<dyn PanelRenderer>) -> Self {
        Self {
            provider,
            renderer,
            after_check: Vec::new(),
        }
    }

    #[must_use]
    pub fn provider(&self) -> &dyn LicenceProvider {
        self.provider.as_ref()
    }

    /// Registers a hook run after every [`Self::update_licence_information`].
    pub fn on_after_check<F>(&mut self, hook: F)
    where
        F: Fn(&UpdateReport) + Send + Sync + 'static,
    {
        self.after_check.push(Box::new(hook));
    }

    /// Handles an activation form submission.
    ///
    /// Unknown products fail before any network traffic. The panel is
    /// re-rendered only when the server activated the licence. The licence
    /// is already stored by then, so a failed render is logged and the
    /// envelope goes back without a template.
    pub fn activate(
        &self,
        request: &ActivateRequest,
        ctx: RequestContext,
    ) -> LicenceResult<ResponseEnvelope> {
        let result = self
            .provider
            .activate(&request.product_init, &request.email, &request.licence_key)?;

        let template = if result.activated {
            self.show_activation_panel(ctx).unwrap_or_else(|e| {
                warn!(
                    product = %request.product_init,
                    error = %e,
                    "Failed to render activation panel"
                );
                None
            })
        } else {
            None
        };
        Ok(ResponseEnvelope {
            body: result.body,
            template,
        })
    }

    /// Re-validates a single product.
    pub fn check(&self, product_init: &str) -> LicenceResult<bool> {
        self.provider.check(product_init)
    }

    /// Re-validates every registered product, runs the after-check hooks
    /// and re-renders the panel. The body carries the per-product report.
    pub fn update_licence_information(&self, ctx: RequestContext) -> LicenceResult<ResponseEnvelope> {
        let report = self.provider.update_licence_information();
        debug!(hooks = self.after_check.len(), "Running after-check hooks");
        for hook in &self.after_check {
            hook(&report);
        }

        let body = match serde_json::to_value(&report)? {
            Value::Object(map) => map,
            _ => ResponseMap::new(),
        };
        Ok(ResponseEnvelope {
            body: Some(body),
            template: self.show_activation_panel(ctx)?,
        })
    }

    /// Current panel contents.
    pub fn panel_view(&self) -> LicenceResult<PanelView> {
        PanelView::build(self.provider.manager())
    }

    /// Renders the panel for `ctx`. Returns the markup for captured renders.
    pub fn show_activation_panel(&self, ctx: RequestContext) -> LicenceResult<Option<String>> {
        let view = self.panel_view()?;
        self.renderer.render(&view, ctx.target())
    }
}

impl std::fmt::Debug for LicenceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenceController")
            .field("manager", self.provider.manager())
            .field("after_check_hooks", &self.after_check.len())
            .finish()
    }
}
