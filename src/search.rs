//! Search filters, request building, and the result-page state machine.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::api::ApiClient;
use crate::error::ClientError;
use crate::sort::{self, SortKey};

/// Shortest trip length the search form accepts, in days.
pub const MIN_TRIP_DURATION_DAYS: u8 = 1;

/// Longest trip length the search form accepts, in days.
pub const MAX_TRIP_DURATION_DAYS: u8 = 15;

/// User-entered search criteria, validated once at the input boundary.
///
/// `end_date` and `duration_days` only carry meaning for round trips;
/// request building ignores them when `one_way` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilters {
    pub origin: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub one_way: bool,
    pub max_price: u32,
    pub duration_days: Option<u8>,
    pub non_stop: bool,
}

impl SearchFilters {
    /// Check field-level constraints and normalize the origin code.
    pub fn validated(mut self) -> Result<Self, ClientError> {
        let origin = self.origin.trim().to_ascii_uppercase();
        if origin.is_empty() {
            return Err(ClientError::InvalidFilters("origin is required".into()));
        }
        self.origin = origin;

        if !self.one_way {
            let end = self.end_date.ok_or_else(|| {
                ClientError::InvalidFilters("round trips need a return date".into())
            })?;
            if end < self.start_date {
                return Err(ClientError::InvalidFilters(
                    "return date precedes the departure date".into(),
                ));
            }
        }

        if let Some(days) = self.duration_days {
            if !(MIN_TRIP_DURATION_DAYS..=MAX_TRIP_DURATION_DAYS).contains(&days) {
                return Err(ClientError::InvalidFilters(format!(
                    "trip duration must be between {} and {} days",
                    MIN_TRIP_DURATION_DAYS, MAX_TRIP_DURATION_DAYS
                )));
            }
        }

        Ok(self)
    }

    /// Derive the wire request. Deterministic and infallible: `one_way`
    /// alone decides the date shape and view, and round-trip-only fields
    /// are dropped from one-way requests.
    pub fn to_request(&self) -> SearchRequest {
        let departure_date = match (self.one_way, self.end_date) {
            (false, Some(end)) => format!(
                "{},{}",
                self.start_date.format("%Y-%m-%d"),
                end.format("%Y-%m-%d")
            ),
            _ => self.start_date.format("%Y-%m-%d").to_string(),
        };

        SearchRequest {
            origin: self.origin.clone(),
            departure_date,
            one_way: self.one_way,
            max_price: self.max_price,
            view_by: if self.one_way {
                ViewBy::Date
            } else {
                ViewBy::Duration
            },
            duration: match (self.one_way, self.duration_days) {
                (false, Some(days)) => Some(days.to_string()),
                _ => None,
            },
            non_stop: self.non_stop.then_some(true),
        }
    }
}

/// Result grouping requested from the search backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViewBy {
    Date,
    Duration,
}

/// Wire payload for `POST /api/flight_destinations`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub origin: String,
    /// A single date for one-way trips, `"start,end"` for round trips.
    pub departure_date: String,
    pub one_way: bool,
    pub max_price: u32,
    pub view_by: ViewBy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub non_stop: Option<bool>,
}

/// One destination offer as returned by the search backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightResult {
    pub origin: String,
    pub destination: String,
    pub departure_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_date: Option<String>,
    pub price: Price,
}

/// Offer price. The backend serializes `total` as a decimal string, so
/// deserialization accepts both strings and numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    #[serde(deserialize_with = "de_decimal")]
    pub total: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

fn de_decimal<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Accumulated result state for one search session.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultPage {
    pub items: Vec<FlightResult>,
    pub page_number: u32,
    pub has_more: bool,
}

impl ResultPage {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            page_number: 1,
            has_more: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for ResultPage {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives submission and pagination over one [`ResultPage`].
///
/// Every intent is stamped with a monotonically increasing token, and a
/// completion only lands while its token is still the newest one issued.
/// When intents are driven concurrently from an event loop, the displayed
/// page therefore reflects the most recent intent, not whichever response
/// happened to arrive last.
#[derive(Debug)]
pub struct SearchController {
    filters: Option<SearchFilters>,
    page: ResultPage,
    issued: u64,
}

impl SearchController {
    pub fn new() -> Self {
        Self {
            filters: None,
            page: ResultPage::new(),
            issued: 0,
        }
    }

    pub fn page(&self) -> &ResultPage {
        &self.page
    }

    pub fn filters(&self) -> Option<&SearchFilters> {
        self.filters.as_ref()
    }

    /// Register a new search intent: the page resets immediately and the
    /// filters are kept for later pagination. Returns the intent token and
    /// the request to send.
    pub fn begin_submit(&mut self, filters: SearchFilters) -> (u64, SearchRequest) {
        self.issued += 1;
        self.page.reset();
        let request = filters.to_request();
        self.filters = Some(filters);
        (self.issued, request)
    }

    /// Register a pagination intent against the last submitted filters.
    /// There is no server-side cursor: the identical query is re-issued
    /// and the new page appended. `None` before any submission.
    pub fn begin_load_more(&mut self) -> Option<(u64, SearchRequest)> {
        let request = self.filters.as_ref()?.to_request();
        self.issued += 1;
        Some((self.issued, request))
    }

    /// Apply a completed submission. Returns false when the completion is
    /// stale (a newer intent was issued meanwhile) and was discarded.
    pub fn apply_submit(&mut self, token: u64, items: Vec<FlightResult>) -> bool {
        if token != self.issued {
            debug!("discarding stale search completion (token {})", token);
            return false;
        }
        self.page.has_more = !items.is_empty();
        self.page.items = items;
        self.page.page_number = 1;
        true
    }

    /// Apply a completed pagination fetch: append in arrival order, bump
    /// the page counter, recompute `has_more`. Stale completions are
    /// discarded as in [`Self::apply_submit`].
    pub fn apply_load_more(&mut self, token: u64, items: Vec<FlightResult>) -> bool {
        if token != self.issued {
            debug!("discarding stale pagination completion (token {})", token);
            return false;
        }
        self.page.has_more = !items.is_empty();
        self.page.items.extend(items);
        self.page.page_number += 1;
        true
    }

    /// Submit a fresh search. On failure the page stays reset (empty
    /// items, page 1) and the error is surfaced for display.
    pub async fn submit(
        &mut self,
        api: &ApiClient,
        filters: SearchFilters,
    ) -> Result<(), ClientError> {
        let (token, request) = self.begin_submit(filters);
        let items = api
            .flight_destinations(&request)
            .await
            .map_err(ClientError::Search)?;
        self.apply_submit(token, items);
        Ok(())
    }

    /// Fetch and append the next page. On failure existing items are
    /// preserved untouched. Returns whether a page was applied.
    pub async fn load_more(&mut self, api: &ApiClient) -> Result<bool, ClientError> {
        let Some((token, request)) = self.begin_load_more() else {
            debug!("load more requested before any submission");
            return Ok(false);
        };
        let items = api
            .flight_destinations(&request)
            .await
            .map_err(ClientError::Pagination)?;
        Ok(self.apply_load_more(token, items))
    }

    /// Re-order the current items in place; never re-fetches.
    pub fn sort_by(&mut self, key: SortKey) {
        sort::sort_results(&mut self.page.items, key);
    }
}

impl Default for SearchController {
    fn default() -> Self {
        Self::new()
    }
}
