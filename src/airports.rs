//! Airport and city lookup backing the origin field.

use serde::{Deserialize, Serialize};

use crate::api::ApiClient;
use crate::config::AUTOCOMPLETE_MIN_CHARS;
use crate::error::ApiError;

/// One suggestion from the airport lookup endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirportSuggestion {
    pub iata_code: String,
    pub name: String,
    #[serde(default)]
    pub city_name: String,
}

impl AirportSuggestion {
    /// Display row in the shape `"MAD, Adolfo Suarez Barajas (Madrid)"`.
    pub fn label(&self) -> String {
        format!("{}, {} ({})", self.iata_code, self.name, self.city_name)
    }
}

/// Look up suggestions for a partial term. Terms shorter than the minimum
/// are answered locally with no suggestions and never hit the network.
pub async fn lookup(api: &ApiClient, term: &str) -> Result<Vec<AirportSuggestion>, ApiError> {
    let term = term.trim();
    if term.chars().count() < AUTOCOMPLETE_MIN_CHARS {
        return Ok(Vec::new());
    }
    api.airport_autocomplete(term).await
}
