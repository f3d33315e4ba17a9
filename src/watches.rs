//! Price-watch subscriptions: create, list, delete.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::ApiClient;
use crate::error::ClientError;
use crate::search::FlightResult;

/// Schedule unit for how often the backend re-checks a watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl std::fmt::Display for FrequencyUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let unit = match self {
            FrequencyUnit::Minutes => "minutes",
            FrequencyUnit::Hours => "hours",
            FrequencyUnit::Days => "days",
            FrequencyUnit::Weeks => "weeks",
        };
        f.write_str(unit)
    }
}

/// A standing price watch as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceWatch {
    pub id: i64,
    pub origin: String,
    pub destination: String,
    pub departure_date: String,
    pub max_price: f64,
    pub frequency: u32,
    pub frequency_unit: FrequencyUnit,
}

/// Creation payload, derived from a flight result plus the schedule the
/// user picked. The result's price becomes the watch's price ceiling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchPayload {
    pub origin: String,
    pub destination: String,
    pub departure_date: String,
    pub max_price: f64,
    pub frequency: u32,
    pub frequency_unit: FrequencyUnit,
}

impl WatchPayload {
    pub fn from_result(flight: &FlightResult, frequency: u32, unit: FrequencyUnit) -> Self {
        Self {
            origin: flight.origin.clone(),
            destination: flight.destination.clone(),
            departure_date: flight.departure_date.clone(),
            max_price: flight.price.total,
            frequency,
            frequency_unit: unit,
        }
    }
}

/// Register a watch for the given flight result.
///
/// Deliberately detached from [`WatchList`]: creating a watch never
/// touches a held listing. The listing screen re-fetches on its own
/// activation, so a fresh watch only shows up through a later
/// [`WatchList::refresh`].
pub async fn create_watch(
    api: &ApiClient,
    flight: &FlightResult,
    frequency: u32,
    unit: FrequencyUnit,
) -> Result<PriceWatch, ClientError> {
    if frequency == 0 {
        return Err(ClientError::InvalidFilters(
            "watch frequency must be at least 1".into(),
        ));
    }
    let payload = WatchPayload::from_result(flight, frequency, unit);
    api.create_watch(&payload)
        .await
        .map_err(ClientError::WatchCreate)
}

/// Listing lifecycle: loading until the first fetch resolves, then either
/// loaded or failed for that activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchPhase {
    Loading,
    Loaded,
    Failed,
}

/// The client's cached view of the backend's watch collection.
///
/// Never authoritative: a refresh replaces the entries wholesale, and a
/// delete trims one entry only after the backend acknowledged it.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchList {
    pub entries: Vec<PriceWatch>,
    pub phase: WatchPhase,
}

impl WatchList {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            phase: WatchPhase::Loading,
        }
    }

    /// Replace the held entries with a freshly fetched collection.
    pub fn apply_loaded(&mut self, entries: Vec<PriceWatch>) {
        self.entries = entries;
        self.phase = WatchPhase::Loaded;
    }

    /// Record a failed fetch. Previously held entries stay untouched.
    pub fn apply_failed(&mut self) {
        self.phase = WatchPhase::Failed;
    }

    /// Drop the entry with the given id, leaving all others alone.
    pub fn apply_deleted(&mut self, id: i64) {
        self.entries.retain(|w| w.id != id);
    }

    /// Fetch the full collection, replacing any held copy (no merging).
    pub async fn refresh(&mut self, api: &ApiClient) -> Result<(), ClientError> {
        self.phase = WatchPhase::Loading;
        match api.list_watches().await {
            Ok(entries) => {
                debug!("loaded {} price watches", entries.len());
                self.apply_loaded(entries);
                Ok(())
            }
            Err(e) => {
                self.apply_failed();
                Err(ClientError::WatchList(e))
            }
        }
    }

    /// Delete one watch. The local entry goes away only after the backend
    /// acknowledged; on failure the list is left exactly as it was.
    pub async fn delete(&mut self, api: &ApiClient, id: i64) -> Result<(), ClientError> {
        api.delete_watch(id)
            .await
            .map_err(ClientError::WatchDelete)?;
        self.apply_deleted(id);
        Ok(())
    }
}

impl Default for WatchList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::Price;

    fn watch(id: i64, destination: &str) -> PriceWatch {
        PriceWatch {
            id,
            origin: "MAD".into(),
            destination: destination.into(),
            departure_date: "2024-05-01".into(),
            max_price: 120.0,
            frequency: 6,
            frequency_unit: FrequencyUnit::Hours,
        }
    }

    #[test]
    fn frequency_unit_uses_backend_spelling() {
        assert_eq!(
            serde_json::to_string(&FrequencyUnit::Minutes).unwrap(),
            "\"minutes\""
        );
        let unit: FrequencyUnit = serde_json::from_str("\"weeks\"").unwrap();
        assert_eq!(unit, FrequencyUnit::Weeks);
        assert_eq!(FrequencyUnit::Days.to_string(), "days");
    }

    #[test]
    fn payload_copies_the_result_price_as_ceiling() {
        let flight = FlightResult {
            origin: "MAD".into(),
            destination: "LON".into(),
            departure_date: "2024-05-01".into(),
            return_date: None,
            price: Price {
                total: 132.97,
                currency: None,
            },
        };
        let payload = WatchPayload::from_result(&flight, 2, FrequencyUnit::Days);

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["origin"], "MAD");
        assert_eq!(json["destination"], "LON");
        assert_eq!(json["departure_date"], "2024-05-01");
        assert_eq!(json["max_price"], 132.97);
        assert_eq!(json["frequency"], 2);
        assert_eq!(json["frequency_unit"], "days");
    }

    #[test]
    fn loaded_replaces_wholesale() {
        let mut list = WatchList::new();
        assert_eq!(list.phase, WatchPhase::Loading);

        list.apply_loaded(vec![watch(1, "LON"), watch(2, "PAR")]);
        assert_eq!(list.phase, WatchPhase::Loaded);
        assert_eq!(list.entries.len(), 2);

        list.apply_loaded(vec![watch(3, "NYC")]);
        assert_eq!(list.entries.len(), 1);
        assert_eq!(list.entries[0].id, 3);
    }

    #[test]
    fn failed_fetch_keeps_old_entries() {
        let mut list = WatchList::new();
        list.apply_loaded(vec![watch(1, "LON")]);
        list.apply_failed();
        assert_eq!(list.phase, WatchPhase::Failed);
        assert_eq!(list.entries.len(), 1);
    }

    #[test]
    fn delete_trims_exactly_one_id() {
        let mut list = WatchList::new();
        list.apply_loaded(vec![watch(1, "LON"), watch(2, "PAR"), watch(3, "NYC")]);

        list.apply_deleted(2);
        let ids: Vec<i64> = list.entries.iter().map(|w| w.id).collect();
        assert_eq!(ids, [1, 3]);

        list.apply_deleted(99);
        assert_eq!(list.entries.len(), 2);
    }

    #[tokio::test]
    async fn create_rejects_zero_frequency() {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .build()
            .unwrap();
        let api = ApiClient::new(client, "http://127.0.0.1:1".to_string());
        let flight = FlightResult {
            origin: "MAD".into(),
            destination: "LON".into(),
            departure_date: "2024-05-01".into(),
            return_date: None,
            price: Price {
                total: 50.0,
                currency: None,
            },
        };

        let err = create_watch(&api, &flight, 0, FrequencyUnit::Hours)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidFilters(_)));
    }
}
