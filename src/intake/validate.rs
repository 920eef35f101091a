//! Structural validation of intake artifacts.

use snafu::prelude::*;

use crate::error::{EmptyAggregateSnafu, EmptyRecordIdSnafu, MalformedSnafu, SchemaError};
use crate::record::Aggregate;

/// Validates a raw payload against the aggregate schema.
///
/// The controller treats any error as a batch-level rejection without
/// inspecting its contents.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, payload: &[u8]) -> Result<Aggregate, SchemaError>;
}

/// Validator for JSON aggregate documents.
///
/// Expects `{"timestamp": <rfc3339>, "records": [{"id", "timestamp",
/// "description"}, ...]}` with at least one record and non-empty ids.
#[derive(Default)]
pub struct JsonValidator;

impl JsonValidator {
    pub fn new() -> Self {
        Self
    }
}

impl SchemaValidator for JsonValidator {
    fn validate(&self, payload: &[u8]) -> Result<Aggregate, SchemaError> {
        let aggregate: Aggregate = serde_json::from_slice(payload).context(MalformedSnafu)?;

        ensure!(!aggregate.records.is_empty(), EmptyAggregateSnafu);
        for (index, record) in aggregate.records.iter().enumerate() {
            ensure!(!record.id.is_empty(), EmptyRecordIdSnafu { index });
        }

        Ok(aggregate)
    }
}
