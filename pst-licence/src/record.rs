//! Persisted licence records and the table that holds them.

use crate::value::{as_text, lenient_bool, lenient_int, lenient_text};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Status code reported by the licensing server.
///
/// Stored as the server's string form (`"200"`, `"106"`, ...). Codes outside
/// the known set are kept verbatim in [`StatusCode::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub enum StatusCode {
    /// 200: licence key is valid.
    Valid,
    /// 100: invalid request.
    InvalidRequest,
    /// 101: invalid licence key.
    InvalidLicenceKey,
    /// 102: software has been deactivated.
    SoftwareDeactivated,
    /// 103: maximum number of activations exceeded.
    ActivationLimitExceeded,
    /// 104: invalid instance id.
    InvalidInstance,
    /// 105: invalid secret key.
    InvalidSecretKey,
    /// 106: licence key has expired.
    Expired,
    /// 107: licence key has been banned.
    Banned,
    /// Any code this client does not know.
    Other(String),
}

/// What a check error code does to the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordEffect {
    /// Reported only; the record is left untouched.
    Keep,
    /// The record is removed from the table.
    Delete,
    /// Marked inactive; message, status code and expiry are stored.
    Expire,
    /// Marked inactive; message and status code are stored.
    Ban,
}

impl StatusCode {
    /// Parses the server's code string.
    #[must_use]
    pub fn parse(code: &str) -> Self {
        match code.trim() {
            "200" => Self::Valid,
            "100" => Self::InvalidRequest,
            "101" => Self::InvalidLicenceKey,
            "102" => Self::SoftwareDeactivated,
            "103" => Self::ActivationLimitExceeded,
            "104" => Self::InvalidInstance,
            "105" => Self::InvalidSecretKey,
            "106" => Self::Expired,
            "107" => Self::Banned,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the server's string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Valid => "200",
            Self::InvalidRequest => "100",
            Self::InvalidLicenceKey => "101",
            Self::SoftwareDeactivated => "102",
            Self::ActivationLimitExceeded => "103",
            Self::InvalidInstance => "104",
            Self::InvalidSecretKey => "105",
            Self::Expired => "106",
            Self::Banned => "107",
            Self::Other(code) => code,
        }
    }

    /// Human readable message for error codes 100-107.
    #[must_use]
    pub fn message(&self) -> Option<&'static str> {
        match self {
            Self::InvalidRequest => Some("Invalid Request"),
            Self::InvalidLicenceKey => Some("Invalid licence key"),
            Self::SoftwareDeactivated => Some("Software has been deactivated"),
            Self::ActivationLimitExceeded => Some("Maximum number of activations exceeded"),
            Self::InvalidInstance => Some("Invalid instance ID"),
            Self::InvalidSecretKey => Some("Invalid security key"),
            Self::Expired => Some("Licence key has expired"),
            Self::Banned => Some("Licence key has been banned"),
            Self::Valid | Self::Other(_) => None,
        }
    }

    /// Effect of this code on the stored record when returned by a check.
    #[must_use]
    pub fn effect(&self) -> RecordEffect {
        match self {
            Self::InvalidLicenceKey | Self::SoftwareDeactivated => RecordEffect::Delete,
            Self::Expired => RecordEffect::Expire,
            Self::Banned => RecordEffect::Ban,
            _ => RecordEffect::Keep,
        }
    }
}

impl<'de> Deserialize<'de> for StatusCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        as_text(&value)
            .map(|code| Self::parse(&code))
            .ok_or_else(|| serde::de::Error::custom("status code must be a string or a number"))
    }
}

impl From<StatusCode> for String {
    fn from(code: StatusCode) -> Self {
        code.as_str().to_string()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Locally persisted snapshot of one product's entitlement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenceRecord {
    /// Email the licence was activated with.
    #[serde(default)]
    pub email: String,
    /// Licence key the product was activated with.
    #[serde(default)]
    pub licence_key: String,
    /// Last status code retained from the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<StatusCode>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub activated: bool,
    /// Expiry as reported by the server.
    #[serde(default, deserialize_with = "lenient_text")]
    pub licence_expires: Option<String>,
    /// Server message (activation message, or the reason a licence stopped
    /// being active).
    #[serde(default, deserialize_with = "lenient_text")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub activation_limit: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub activation_remaining: Option<i64>,
}

impl LicenceRecord {
    /// Returns the state this record represents.
    #[must_use]
    pub fn state(&self) -> LicenceState {
        LicenceState::of(Some(self))
    }

    /// Parses the expiry date. Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`
    /// and RFC 3339.
    #[must_use]
    pub fn expires_on(&self) -> Option<NaiveDate> {
        let raw = self.licence_expires.as_deref()?.trim();
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Some(date);
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
            return Some(dt.date());
        }
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.date_naive())
    }

    /// Returns true if the stored expiry lies before `today`.
    #[must_use]
    pub fn is_expired_on(&self, today: NaiveDate) -> bool {
        self.expires_on().is_some_and(|date| date < today)
    }
}

/// Licence state of one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenceState {
    /// No record: never activated, or deleted after code 101/102.
    Unregistered,
    /// Record present and activated.
    Active,
    /// Record present but not activated, without a retained 106/107.
    Inactive,
    /// Not activated after code 106.
    Expired,
    /// Not activated after code 107.
    Banned,
}

impl LicenceState {
    /// Classifies an optional record.
    #[must_use]
    pub fn of(record: Option<&LicenceRecord>) -> Self {
        match record {
            None => Self::Unregistered,
            Some(r) if r.activated => Self::Active,
            Some(r) => match r.status_code {
                Some(StatusCode::Expired) => Self::Expired,
                Some(StatusCode::Banned) => Self::Banned,
                _ => Self::Inactive,
            },
        }
    }
}

impl fmt::Display for LicenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unregistered => "unregistered",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Expired => "expired",
            Self::Banned => "banned",
        };
        f.pad(s)
    }
}

/// Product id to licence record. A missing entry means "never activated".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LicenceTable(BTreeMap<String, LicenceRecord>);

impl LicenceTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, product_id: &str) -> Option<&LicenceRecord> {
        self.0.get(product_id)
    }

    pub fn get_mut(&mut self, product_id: &str) -> Option<&mut LicenceRecord> {
        self.0.get_mut(product_id)
    }

    /// Inserts or replaces a record, returning the previous one.
    pub fn insert(&mut self, product_id: &str, record: LicenceRecord) -> Option<LicenceRecord> {
        self.0.insert(product_id.to_string(), record)
    }

    pub fn remove(&mut self, product_id: &str) -> Option<LicenceRecord> {
        self.0.remove(product_id)
    }

    #[must_use]
    pub fn contains(&self, product_id: &str) -> bool {
        self.0.contains_key(product_id)
    }

    /// Returns true if the product has a record with `activated == true`.
    #[must_use]
    pub fn is_activated(&self, product_id: &str) -> bool {
        self.0.get(product_id).is_some_and(|r| r.activated)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &LicenceRecord)> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
