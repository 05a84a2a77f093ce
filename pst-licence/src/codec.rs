//! Licensing server protocol: request urls and response decoding.
//!
//! Requests are plain GETs against
//! `{api_uri}?wc-api=software-api&request={activation|check}` with the
//! credentials appended as url-encoded query parameters:
//! `email`, `licence_key`, `product_id`, `secret_key`, `instance`.
//!
//! Responses are JSON objects. Activation answers carry `activated`; check
//! answers carry `success` and, on failure, a `code` from 100 to 107.

use crate::config::{LicenceConfig, REQUEST_PLACEHOLDER};
use crate::error::LicenceResult;
use crate::record::StatusCode;
use crate::registry::ProductInfo;
use crate::sanitize::{sanitize_email, sanitize_text_field};
use crate::transport::HttpResponse;
use crate::value::{as_int, as_text, is_truthy};
use serde_json::{Map, Value};
use std::fmt;

/// A decoded JSON object returned by the licensing server.
pub type ResponseMap = Map<String, Value>;

/// The action a request asks the server to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Activation,
    Check,
}

impl RequestKind {
    /// The value of the `request` query parameter.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activation => "activation",
            Self::Check => "check",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Email and licence key identifying a licence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub licence_key: String,
}

impl Credentials {
    /// Builds credentials from user input, sanitizing both fields.
    #[must_use]
    pub fn from_input(email: &str, licence_key: &str) -> Self {
        Self {
            email: sanitize_email(email),
            licence_key: sanitize_text_field(licence_key),
        }
    }
}

/// Returns the endpoint for `kind`, without credentials.
#[must_use]
pub fn endpoint(config: &LicenceConfig, kind: RequestKind) -> String {
    format!("{}{}", config.api_uri, config.api_query_args).replace(REQUEST_PLACEHOLDER, kind.as_str())
}

/// Builds the full request url for `kind`.
#[must_use]
pub fn build_request_url(
    config: &LicenceConfig,
    kind: RequestKind,
    product: &ProductInfo,
    credentials: &Credentials,
) -> String {
    let base = endpoint(config, kind);
    let instance = config.instance();
    let product_id = sanitize_text_field(&product.product_id);
    let secret_key = sanitize_text_field(&product.secret_key);
    let params = [
        ("email", credentials.email.as_str()),
        ("licence_key", credentials.licence_key.as_str()),
        ("product_id", product_id.as_str()),
        ("secret_key", secret_key.as_str()),
        ("instance", instance.as_str()),
    ];

    let query = params
        .iter()
        .map(|(name, value)| format!("{name}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{query}")
}

/// Why a response body could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The body is not JSON.
    InvalidJson(String),
    /// The body is JSON but not an object.
    NotAnObject,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson(e) => write!(f, "response is not JSON: {e}"),
            Self::NotAnObject => f.write_str("response is not a JSON object"),
        }
    }
}

/// Parses a response body into a JSON object.
pub fn parse_body(body: &str) -> Result<ResponseMap, ParseError> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ParseError::NotAnObject),
        Err(e) => Err(ParseError::InvalidJson(e.to_string())),
    }
}

/// Licence fields returned by a successful activation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationFields {
    pub licence_expires: Option<String>,
    pub message: Option<String>,
    pub activation_limit: Option<i64>,
    pub activation_remaining: Option<i64>,
}

/// Decoded answer to an activation request.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivationOutcome {
    /// The server activated the licence for this instance.
    Activated {
        fields: ActivationFields,
        body: ResponseMap,
    },
    /// The server refused; `body` carries its explanation.
    NotActivated { body: ResponseMap },
    /// The server could not be reached.
    TransportFailure,
    /// The server answered with something other than a JSON object.
    MalformedResponse(ParseError),
}

/// Decoded answer to a check request.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// `success` was truthy.
    Success {
        activated: bool,
        licence_expires: Option<String>,
        activation_remaining: Option<i64>,
        activation_limit: Option<i64>,
    },
    /// `success` was falsy and a `code` was given.
    Error {
        code: StatusCode,
        additional_info: Option<String>,
        licence_expires: Option<String>,
    },
    /// The object lacked the fields needed to interpret it.
    Indeterminate,
    /// The server could not be reached.
    TransportFailure,
    /// The server answered with something other than a JSON object.
    MalformedResponse(ParseError),
}

impl CheckOutcome {
    /// Returns true if the server actually answered the check, which is the
    /// condition for writing the licence table back.
    #[must_use]
    pub fn is_answer(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Error { .. })
    }
}

fn field<'a>(body: &'a ResponseMap, name: &str) -> Option<&'a Value> {
    body.get(name).filter(|v| !v.is_null())
}

fn text_field(body: &ResponseMap, name: &str) -> Option<String> {
    field(body, name).and_then(as_text)
}

fn int_field(body: &ResponseMap, name: &str) -> Option<i64> {
    field(body, name).and_then(as_int)
}

/// Decodes the transport result of an activation request.
#[must_use]
pub fn decode_activation(response: LicenceResult<HttpResponse>) -> ActivationOutcome {
    let response = match response {
        Ok(response) => response,
        Err(_) => return ActivationOutcome::TransportFailure,
    };
    let body = match parse_body(&response.body) {
        Ok(body) => body,
        Err(e) => return ActivationOutcome::MalformedResponse(e),
    };

    if body.get("activated").is_some_and(is_truthy) {
        let fields = ActivationFields {
            licence_expires: text_field(&body, "licence_expires"),
            message: text_field(&body, "message"),
            activation_limit: int_field(&body, "activation_limit"),
            activation_remaining: int_field(&body, "activation_remaining"),
        };
        ActivationOutcome::Activated { fields, body }
    } else {
        ActivationOutcome::NotActivated { body }
    }
}

/// Decodes the transport result of a check request.
#[must_use]
pub fn decode_check(response: LicenceResult<HttpResponse>) -> CheckOutcome {
    let response = match response {
        Ok(response) => response,
        Err(_) => return CheckOutcome::TransportFailure,
    };
    let body = match parse_body(&response.body) {
        Ok(body) => body,
        Err(e) => return CheckOutcome::MalformedResponse(e),
    };

    let Some(success) = field(&body, "success") else {
        return CheckOutcome::Indeterminate;
    };

    if is_truthy(success) {
        return CheckOutcome::Success {
            activated: body.get("activated").is_some_and(is_truthy),
            licence_expires: text_field(&body, "licence_expires"),
            activation_remaining: int_field(&body, "activation_remaining"),
            activation_limit: int_field(&body, "activation_limit"),
        };
    }

    match text_field(&body, "code") {
        Some(code) => CheckOutcome::Error {
            code: StatusCode::parse(&code),
            additional_info: text_field(&body, "additional_info"),
            licence_expires: text_field(&body, "licence_expires"),
        },
        None => CheckOutcome::Indeterminate,
    }
}
