//! Client-side ordering of search results.

use std::cmp::Ordering;

use chrono::NaiveDate;
use clap::ValueEnum;

use crate::search::FlightResult;

/// Sort key selectable from the result view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortKey {
    /// Ascending by total price.
    Price,
    /// Ascending by departure date, in calendar order.
    Date,
}

/// Re-order results in place. The sort is stable: ties keep their
/// relative arrival order.
pub fn sort_results(items: &mut [FlightResult], key: SortKey) {
    match key {
        SortKey::Price => items.sort_by(|a, b| {
            a.price
                .total
                .partial_cmp(&b.price.total)
                .unwrap_or(Ordering::Equal)
        }),
        SortKey::Date => {
            items.sort_by(|a, b| cmp_departure_dates(&a.departure_date, &b.departure_date))
        }
    }
}

/// Calendar comparison of `YYYY-MM-DD` strings, not a lexical one, so
/// unpadded components still order correctly. Unparseable dates compare
/// equal and therefore stay where they arrived.
fn cmp_departure_dates(a: &str, b: &str) -> Ordering {
    match (parse_date(a), parse_date(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => Ordering::Equal,
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}
