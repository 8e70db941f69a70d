//! Preference dispatcher.
//!
//! Turns a raw client payload plus an optional preference-type index into an
//! [`Answer`] for the engine. Which transform applies is decided by one table
//! keyed on `(family, index)`; nothing here looks at which concrete method is
//! running. Dispatch is pure: the pending requests are only read.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use st_domain::error::{Error, Result};

use crate::family::MethodFamily;
use crate::navigation::{self, NavigationResponse};
use crate::request::{Answer, PendingRequests, Request};

/// A preference attached to a pending request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Preference {
    /// Indices of solutions the client likes.
    PreferredSolutions { indices: Vec<usize> },
    /// Indices of solutions the client wants to move away from.
    NonPreferredSolutions { indices: Vec<usize> },
    /// One aspiration level per published column.
    ReferencePoint { columns: Vec<String>, values: Vec<f64> },
    /// `[lower, upper]` per objective.
    Bounds { matrix: Vec<Vec<f64>> },
    Classification {
        #[serde(default)]
        current_solution: Vec<f64>,
        classifications: Vec<String>,
        levels: Vec<f64>,
    },
    /// Payload handed to the engine untouched.
    Payload { payload: Map<String, Value> },
    Navigation(NavigationResponse),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dispatch table
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transform {
    Finalize,
    Advance,
    Preferred,
    NonPreferred,
    ReferencePoint,
    Bounds,
    Classification,
    Passthrough,
}

/// Index used when the client sends none.
pub const NO_PREFERENCE: i64 = -1;

/// Tuple slots of the population requests, in index order 1..=4.
const SLOT_PREFERRED: usize = 0;
const SLOT_NON_PREFERRED: usize = 1;
const SLOT_REFERENCE_POINT: usize = 2;
const SLOT_BOUNDS: usize = 3;

const TABLE: &[(MethodFamily, i64, Transform)] = &[
    (MethodFamily::Scalarizing, NO_PREFERENCE, Transform::Passthrough),
    (MethodFamily::Scalarizing, 5, Transform::Passthrough),
    (MethodFamily::Population, NO_PREFERENCE, Transform::Finalize),
    (MethodFamily::Population, 0, Transform::Advance),
    (MethodFamily::Population, 1, Transform::Preferred),
    (MethodFamily::Population, 2, Transform::NonPreferred),
    (MethodFamily::Population, 3, Transform::ReferencePoint),
    (MethodFamily::Population, 4, Transform::Bounds),
    (MethodFamily::Population, 5, Transform::Classification),
];

fn lookup(family: MethodFamily, index: i64) -> Option<Transform> {
    TABLE
        .iter()
        .find(|(f, i, _)| *f == family && *i == index)
        .map(|(_, _, t)| *t)
}

/// Resolve a client payload into an answer for the engine.
///
/// Navigation payloads bypass the table: `go_to_previous` is handled by
/// [`navigation::route`].
pub fn dispatch(
    family: MethodFamily,
    index: Option<i64>,
    payload: &Value,
    pending: &PendingRequests,
) -> Result<Answer> {
    if family == MethodFamily::Navigation {
        return navigation::route(payload, pending);
    }

    let index = index.unwrap_or(NO_PREFERENCE);
    let transform = lookup(family, index).ok_or(Error::PreferenceIndexOutOfRange(index))?;

    let answer = match transform {
        Transform::Finalize => Answer::Finalize,
        Transform::Advance => Answer::Advance,
        Transform::Passthrough => {
            let request = single(pending)?;
            let payload = as_object(payload)?.clone();
            Answer::Respond(request.clone().with_response(Preference::Payload { payload }))
        }
        Transform::Preferred => {
            let indices = indices(preference_data(payload)?)?;
            let request = slot(pending, SLOT_PREFERRED, index)?;
            Answer::Respond(request.clone().with_response(Preference::PreferredSolutions { indices }))
        }
        Transform::NonPreferred => {
            let indices = indices(preference_data(payload)?)?;
            let request = slot(pending, SLOT_NON_PREFERRED, index)?;
            Answer::Respond(
                request
                    .clone()
                    .with_response(Preference::NonPreferredSolutions { indices }),
            )
        }
        Transform::ReferencePoint => {
            let request = slot(pending, SLOT_REFERENCE_POINT, index)?;
            let columns = published_columns(request)?;
            let mut rows = at_least_2d(preference_data(payload)?)?;
            if rows.len() != 1 {
                return Err(Error::InvalidPreference(format!(
                    "a reference point is a single row, got {} rows",
                    rows.len()
                )));
            }
            let values = rows.remove(0);
            if values.len() != columns.len() {
                return Err(Error::InvalidPreference(format!(
                    "reference point has {} values for {} columns",
                    values.len(),
                    columns.len()
                )));
            }
            Answer::Respond(
                request
                    .clone()
                    .with_response(Preference::ReferencePoint { columns, values }),
            )
        }
        Transform::Bounds => {
            let matrix = at_least_2d(preference_data(payload)?)?;
            let request = slot(pending, SLOT_BOUNDS, index)?;
            Answer::Respond(request.clone().with_response(Preference::Bounds { matrix }))
        }
        Transform::Classification => {
            let preference: Preference = serde_json::from_value(tagged(payload, "classification")?)
                .map_err(|e| Error::InvalidPreference(format!("classification: {e}")))?;
            let request = slot(pending, SLOT_REFERENCE_POINT, index)?;
            Answer::Respond(request.clone().with_response(preference))
        }
    };
    Ok(answer)
}

// ── helpers ─────────────────────────────────────────────────────────

fn single(pending: &PendingRequests) -> Result<&Request> {
    match pending {
        PendingRequests::Single(r) => Ok(r),
        PendingRequests::Tuple(_) => Err(Error::InvalidPreference(
            "this method expects a preference type index".into(),
        )),
    }
}

fn slot(pending: &PendingRequests, slot: usize, index: i64) -> Result<&Request> {
    match pending {
        PendingRequests::Tuple(rs) => rs.get(slot).ok_or(Error::PreferenceIndexOutOfRange(index)),
        PendingRequests::Single(r) if slot == 0 => Ok(r),
        PendingRequests::Single(_) => Err(Error::PreferenceIndexOutOfRange(index)),
    }
}

fn as_object(payload: &Value) -> Result<&Map<String, Value>> {
    payload
        .as_object()
        .ok_or_else(|| Error::InvalidPreference("response must be a JSON object".into()))
}

fn preference_data(payload: &Value) -> Result<&Value> {
    as_object(payload)?
        .get("preference_data")
        .ok_or_else(|| Error::InvalidPreference("missing `preference_data`".into()))
}

fn tagged(payload: &Value, tag: &str) -> Result<Value> {
    let mut map = as_object(payload)?.clone();
    map.insert("type".into(), Value::String(tag.into()));
    Ok(Value::Object(map))
}

fn indices(data: &Value) -> Result<Vec<usize>> {
    let items = data
        .as_array()
        .ok_or_else(|| Error::InvalidPreference("expected an array of solution indices".into()))?;
    items
        .iter()
        .map(|v| {
            v.as_u64()
                .map(|i| i as usize)
                .ok_or_else(|| Error::InvalidPreference(format!("`{v}` is not a solution index")))
        })
        .collect()
}

fn number(v: &Value) -> Result<f64> {
    v.as_f64()
        .ok_or_else(|| Error::InvalidPreference(format!("`{v}` is not a number")))
}

/// A scalar, a vector or a matrix, always returned as rows.
fn at_least_2d(data: &Value) -> Result<Vec<Vec<f64>>> {
    let rows = match data {
        Value::Number(_) => vec![vec![number(data)?]],
        Value::Array(items) if items.iter().all(Value::is_array) && !items.is_empty() => items
            .iter()
            .map(|row| row.as_array().into_iter().flatten().map(number).collect())
            .collect::<Result<Vec<_>>>()?,
        Value::Array(items) => vec![items.iter().map(number).collect::<Result<Vec<_>>>()?],
        other => {
            return Err(Error::InvalidPreference(format!(
                "expected numeric data, got `{other}`"
            )))
        }
    };
    let width = rows.first().map(Vec::len).unwrap_or(0);
    if width == 0 || rows.iter().any(|r| r.len() != width) {
        return Err(Error::InvalidPreference("preference rows must be non-empty and equally long".into()));
    }
    Ok(rows)
}

fn published_columns(request: &Request) -> Result<Vec<String>> {
    request
        .content
        .get("dimensions_data")
        .and_then(|d| d.get("columns"))
        .and_then(Value::as_array)
        .map(|cols| {
            cols.iter()
                .filter_map(|c| c.as_str().map(str::to_owned))
                .collect()
        })
        .ok_or_else(|| Error::InvalidPreference("request publishes no column order".into()))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
