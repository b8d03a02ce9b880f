//! Serializable connector definitions.
use serde::{Deserialize, Serialize};

/// Stored form of a connector: the address string plus the module and handler
/// that should serve it.
///
/// `ConnectorAddress` (de)serializes through this type, so connector
/// definitions can live in any serde backed config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorContract {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
}
