//! Mapper configuration.

use crate::converter::DataConverter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use wcmf_core::{ConnectionParams, Error, Result};
use wcmf_schema::Schema;

/// Column of the sequence table holding the next id.
pub const SEQUENCE_COLUMN: &str = "id";

fn default_sequence_type() -> String {
    "Adodbseq".to_string()
}

/// Configuration shared by all mappers of a facade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapperConfig {
    pub connection: ConnectionParams,
    /// Persistent type whose table stores the id sequence
    #[serde(default = "default_sequence_type")]
    pub sequence_type: String,
    #[serde(skip)]
    pub data_converter: Option<Arc<dyn DataConverter>>,
}

impl MapperConfig {
    pub fn new(connection: ConnectionParams) -> Self {
        Self {
            connection,
            sequence_type: default_sequence_type(),
            data_converter: None,
        }
    }

    pub fn sequence_type(mut self, name: impl Into<String>) -> Self {
        self.sequence_type = name.into();
        self
    }

    pub fn data_converter(mut self, converter: Arc<dyn DataConverter>) -> Self {
        self.data_converter = Some(converter);
        self
    }

    /// Parse a JSON configuration. The data converter is set in code.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Resolve the sequence table name and column in `schema`.
    pub fn sequence_table(&self, schema: &Schema) -> Result<(String, String)> {
        let ty = schema.get(&self.sequence_type).ok_or_else(|| {
            Error::config(format!(
                "sequence type '{}' is not mapped",
                self.sequence_type
            ))
        })?;
        let attr = ty.get_attribute(SEQUENCE_COLUMN).ok_or_else(|| {
            Error::config(format!(
                "sequence type '{}' has no '{}' attribute",
                self.sequence_type, SEQUENCE_COLUMN
            ))
        })?;
        Ok((
            ty.table_name(&self.connection.table_prefix),
            attr.column_name().to_string(),
        ))
    }
}
