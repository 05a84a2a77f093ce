//! Licence state machine.
//!
//! Holds a working copy of the licence table for the duration of one
//! operation, applies transitions driven by decoded server answers, and
//! writes the table back on commit.
//!
//! ```text
//! Unregistered --activation--> Active
//! Active --check 106--> Expired      (record kept, activated = false)
//! Active --check 107--> Banned       (record kept, activated = false)
//! any    --check 101/102--> Unregistered (record deleted)
//! any    --successful check / re-activation--> Active
//! ```

use crate::codec::{ActivationFields, CheckOutcome, Credentials};
use crate::error::LicenceResult;
use crate::record::{LicenceRecord, LicenceState, LicenceTable, RecordEffect, StatusCode};
use crate::store::{OptionStore, load_table, save_table};
use tracing::debug;

/// Working copy of a licence table.
#[derive(Debug, Clone, Default)]
pub struct LicenceStateMachine {
    table: LicenceTable,
    dirty: bool,
}

impl LicenceStateMachine {
    /// Starts from an existing table.
    #[must_use]
    pub fn new(table: LicenceTable) -> Self {
        Self {
            table,
            dirty: false,
        }
    }

    /// Loads the table stored under `option`.
    pub fn load(store: &dyn OptionStore, option: &str) -> LicenceResult<Self> {
        Ok(Self::new(load_table(store, option)?))
    }

    #[must_use]
    pub fn table(&self) -> &LicenceTable {
        &self.table
    }

    #[must_use]
    pub fn into_table(self) -> LicenceTable {
        self.table
    }

    #[must_use]
    pub fn record(&self, product_id: &str) -> Option<&LicenceRecord> {
        self.table.get(product_id)
    }

    #[must_use]
    pub fn state_of(&self, product_id: &str) -> LicenceState {
        LicenceState::of(self.table.get(product_id))
    }

    /// Returns true if a transition requires the table to be written back.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Records a successful activation, replacing any previous record for
    /// the product.
    pub fn activate(
        &mut self,
        product_id: &str,
        credentials: &Credentials,
        fields: &ActivationFields,
    ) -> LicenceRecord {
        let record = LicenceRecord {
            email: credentials.email.clone(),
            licence_key: credentials.licence_key.clone(),
            status_code: None,
            activated: true,
            licence_expires: fields.licence_expires.clone(),
            message: fields.message.clone(),
            activation_limit: fields.activation_limit,
            activation_remaining: fields.activation_remaining,
        };
        self.table.insert(product_id, record.clone());
        self.dirty = true;
        debug!(product_id = %product_id, "Licence activated");
        record
    }

    /// Applies the answer to a check request and returns whether the product
    /// is activated afterwards.
    ///
    /// Only answered checks mark the table dirty. Transport failures,
    /// malformed and indeterminate responses leave everything untouched.
    pub fn apply_check(&mut self, product_id: &str, outcome: &CheckOutcome) -> bool {
        if !self.table.contains(product_id) {
            return false;
        }

        match outcome {
            CheckOutcome::Success {
                activated,
                licence_expires,
                activation_remaining,
                activation_limit,
            } => {
                if let Some(record) = self.table.get_mut(product_id) {
                    record.status_code = Some(StatusCode::Valid);
                    record.activated = *activated;
                    record.licence_expires = licence_expires.clone();
                    record.activation_remaining = *activation_remaining;
                    record.activation_limit = *activation_limit;
                }
                self.dirty = true;
                *activated
            }
            CheckOutcome::Error {
                code,
                additional_info,
                licence_expires,
            } => {
                match code.effect() {
                    RecordEffect::Delete => {
                        self.table.remove(product_id);
                        debug!(product_id = %product_id, code = %code, "Licence record deleted");
                    }
                    RecordEffect::Expire => {
                        if let Some(record) = self.table.get_mut(product_id) {
                            record.activated = false;
                            record.message = additional_info.clone();
                            record.status_code = Some(code.clone());
                            record.licence_expires = licence_expires.clone();
                        }
                    }
                    RecordEffect::Ban => {
                        if let Some(record) = self.table.get_mut(product_id) {
                            record.activated = false;
                            record.message = additional_info.clone();
                            record.status_code = Some(code.clone());
                        }
                    }
                    RecordEffect::Keep => {}
                }
                self.dirty = true;
                false
            }
            CheckOutcome::Indeterminate
            | CheckOutcome::TransportFailure
            | CheckOutcome::MalformedResponse(_) => false,
        }
    }

    /// Writes the table back if a transition made it dirty. Returns whether
    /// a write happened.
    pub fn commit(&mut self, store: &dyn OptionStore, option: &str) -> LicenceResult<bool> {
        if !self.dirty {
            return Ok(false);
        }
        save_table(store, option, &self.table)?;
        self.dirty = false;
        Ok(true)
    }
}
