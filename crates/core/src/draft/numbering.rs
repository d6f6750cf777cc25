use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::normalize_collection;
use crate::catalog::resolver::CatalogSource;

/// Listing queries tried in order; each asks the backend for the requisition
/// with the highest numeric key.
pub const NUMBERING_QUERIES: &[&str] = &[
    "/requisitions/?ordering=-number&limit=1",
    "/requisitions/?ordering=-number&page_size=1",
    "/requisitions/?ordering=-id&limit=1",
    "/requisitions/?ordering=-id&page_size=1",
];

/// Numeric key fields in preference order; the first present field decides.
const NUMERIC_FIELDS: &[&str] = &["number", "folio", "consecutive", "no", "n", "id"];

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ReservationError {
    #[error("every numbering query failed; a requisition number could not be reserved")]
    SourceExhausted,
}

/// Computes a provisional display number: one past the highest existing
/// requisition number. This is a soft reservation only; the authoritative
/// number is assigned at save time and may differ.
pub struct NumberingReservation;

impl NumberingReservation {
    pub async fn reserve<S>(source: &S) -> Result<String, ReservationError>
    where
        S: CatalogSource,
    {
        let mut any_response = false;

        for query in NUMBERING_QUERIES {
            let payload = match source.fetch(query).await {
                Ok(payload) => payload,
                Err(error) => {
                    debug!(
                        event_name = "numbering.query_failed",
                        query = %query,
                        error = %error,
                        "numbering query failed, trying next"
                    );
                    continue;
                }
            };
            any_response = true;

            if let Some(last) = extract_highest_number(&payload) {
                debug!(
                    event_name = "numbering.reserved",
                    query = %query,
                    last,
                    "provisional requisition number computed"
                );
                return Ok((last + 1).to_string());
            }
        }

        if any_response {
            // The backend answered but holds no numbered requisitions yet.
            return Ok("1".to_string());
        }

        warn!(
            event_name = "numbering.exhausted",
            "no numbering query could be reached; reservation failed"
        );
        Err(ReservationError::SourceExhausted)
    }
}

/// Highest numeric key among the returned records. Listings are requested in
/// descending order, but an unordered backend is tolerated by scanning every
/// record rather than trusting the first.
fn extract_highest_number(payload: &Value) -> Option<i64> {
    let records = normalize_collection(payload)?;
    records.iter().filter_map(numeric_key).max()
}

fn numeric_key(record: &Value) -> Option<i64> {
    let object = record.as_object()?;
    let raw = NUMERIC_FIELDS.iter().find_map(|field| object.get(*field))?;
    match raw {
        Value::Number(value) => value.as_i64(),
        Value::String(value) => value.trim().parse::<i64>().ok(),
        _ => None,
    }
}
