/// Normalization of block-engine JSON-RPC responses.
///
/// The block-engine answers with loosely-shaped JSON (`result` may be a
/// string, an array or an object; `err` may be `null`, `{"Ok": null}` or an
/// arbitrary error object).  Everything is mapped into typed values here so
/// the submitter and tracker never probe raw fields.  A shape we don't
/// recognize becomes [`RelayError::UnknownShape`] instead of a partial read.
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;

use crate::bundle::ConfirmationState;
use crate::error::{RelayError, Result};

// ─── Typed status values ────────────────────────────────────────────────────

/// `confirmation_status` tag reported by `getBundleStatuses`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationTag {
    Pending,
    Processed,
    Confirmed,
    Finalized,
}

impl FromStr for ConfirmationTag {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s {
            "pending" => Ok(Self::Pending),
            "processed" => Ok(Self::Processed),
            "confirmed" => Ok(Self::Confirmed),
            "finalized" => Ok(Self::Finalized),
            other => Err(other.to_string()),
        }
    }
}

/// One bundle's entry from a status call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleStatusEntry {
    pub bundle_id: String,
    pub tag: ConfirmationTag,
    pub slot: Option<u64>,
    /// Rejection reason; `None` when the relay reported no error.
    pub err: Option<String>,
    /// Signatures of the landed transactions, when reported.
    pub transactions: Vec<String>,
}

impl BundleStatusEntry {
    /// Map the relay's tag onto the tracker's state machine.
    ///
    /// `confirmed` / `finalized` → `Confirmed`; `processed` with a reason →
    /// `Failed`; anything else is still `Pending`.
    pub fn verdict(&self) -> ConfirmationState {
        match (self.tag, &self.err) {
            (ConfirmationTag::Confirmed | ConfirmationTag::Finalized, _) => {
                ConfirmationState::Confirmed { slot: self.slot }
            }
            (ConfirmationTag::Processed, Some(reason)) => ConfirmationState::Failed {
                slot: self.slot,
                reason: reason.clone(),
            },
            _ => ConfirmationState::Pending,
        }
    }
}

/// In-flight status reported by `getInflightBundleStatuses`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InflightStatus {
    /// Bundle is still queued / being auctioned.
    Pending,
    /// Bundle landed on-chain.
    Landed { slot: Option<u64> },
    /// Bundle failed to land.
    Failed,
    /// The block-engine does not know the bundle (expired or never seen).
    Invalid,
}

impl InflightStatus {
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for InflightStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Landed { slot: Some(slot) } => write!(f, "Landed (slot {slot})"),
            Self::Landed { slot: None } => write!(f, "Landed"),
            Self::Failed => write!(f, "Failed"),
            Self::Invalid => write!(f, "Invalid"),
        }
    }
}

// ─── Parsers ────────────────────────────────────────────────────────────────

/// Parse a `sendBundle` response into the relay-issued bundle id.
pub fn parse_send_bundle(response: &Value) -> Result<String> {
    const METHOD: &str = "sendBundle";
    check_rpc_error(METHOD, response)?;

    response
        .get("result")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| unknown_shape(METHOD, "missing 'result' bundle id"))
}

/// Parse a `getTipAccounts` response. An empty list is returned as-is.
pub fn parse_tip_accounts(response: &Value) -> Result<Vec<Pubkey>> {
    const METHOD: &str = "getTipAccounts";
    check_rpc_error(METHOD, response)?;

    let accounts = response
        .get("result")
        .and_then(Value::as_array)
        .ok_or_else(|| unknown_shape(METHOD, "missing 'result' array"))?;

    accounts
        .iter()
        .map(|v| {
            let s = v
                .as_str()
                .ok_or_else(|| unknown_shape(METHOD, "tip account is not a string"))?;
            Pubkey::from_str(s)
                .map_err(|e| unknown_shape(METHOD, format!("invalid tip account {s}: {e}")))
        })
        .collect()
}

/// Parse a `getBundleStatuses` response and pick out `bundle_id`'s entry.
///
/// `Ok(None)` means the relay has not indexed the bundle yet.
pub fn parse_bundle_statuses(response: &Value, bundle_id: &str) -> Result<Option<BundleStatusEntry>> {
    const METHOD: &str = "getBundleStatuses";

    let Some(entries) = value_entries(METHOD, response)? else {
        return Ok(None);
    };
    let Some(entry) = find_entry(entries, bundle_id) else {
        return Ok(None);
    };

    let raw_tag = entry
        .get("confirmation_status")
        .and_then(Value::as_str)
        .ok_or_else(|| unknown_shape(METHOD, "entry missing 'confirmation_status'"))?;
    let tag = raw_tag
        .parse::<ConfirmationTag>()
        .map_err(|other| unknown_shape(METHOD, format!("unknown confirmation_status `{other}`")))?;

    let transactions = entry
        .get("transactions")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();

    Ok(Some(BundleStatusEntry {
        bundle_id: bundle_id.to_string(),
        tag,
        slot: entry.get("slot").and_then(Value::as_u64),
        err: entry.get("err").and_then(rejection_reason),
        transactions,
    }))
}

/// Parse a `getInflightBundleStatuses` response for `bundle_id`.
pub fn parse_inflight_status(response: &Value, bundle_id: &str) -> Result<Option<InflightStatus>> {
    const METHOD: &str = "getInflightBundleStatuses";

    let Some(entries) = value_entries(METHOD, response)? else {
        return Ok(None);
    };
    let Some(entry) = find_entry(entries, bundle_id) else {
        return Ok(None);
    };

    let status = entry
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| unknown_shape(METHOD, "entry missing 'status'"))?;

    let parsed = match status {
        "Pending" => InflightStatus::Pending,
        "Landed" => InflightStatus::Landed {
            slot: entry.get("landed_slot").and_then(Value::as_u64),
        },
        "Failed" => InflightStatus::Failed,
        "Invalid" => InflightStatus::Invalid,
        other => return Err(unknown_shape(METHOD, format!("unknown status `{other}`"))),
    };
    Ok(Some(parsed))
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Surface a JSON-RPC `error` object as [`RelayError::Call`], keeping the
/// relay's own message text.
fn check_rpc_error(method: &'static str, response: &Value) -> Result<()> {
    match response.get("error") {
        None | Some(Value::Null) => Ok(()),
        Some(err) => {
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            Err(RelayError::Call { method, message })
        }
    }
}

/// `result.value` as an array; `None` when the relay returned no entries.
fn value_entries<'a>(method: &'static str, response: &'a Value) -> Result<Option<&'a Vec<Value>>> {
    check_rpc_error(method, response)?;

    let result = response
        .get("result")
        .ok_or_else(|| unknown_shape(method, "missing 'result'"))?;
    if result.is_null() {
        return Ok(None);
    }

    match result.get("value") {
        Some(Value::Array(entries)) => Ok(Some(entries)),
        Some(Value::Null) => Ok(None),
        Some(_) => Err(unknown_shape(method, "'result.value' is not an array")),
        None => Err(unknown_shape(method, "missing 'result.value'")),
    }
}

/// The entry for `bundle_id`; entries without an id match positionally.
fn find_entry<'a>(entries: &'a [Value], bundle_id: &str) -> Option<&'a Value> {
    entries.iter().filter(|e| e.is_object()).find(|e| {
        match e.get("bundle_id").and_then(Value::as_str) {
            Some(id) => id == bundle_id,
            None => true,
        }
    })
}

fn rejection_reason(err: &Value) -> Option<String> {
    match err {
        Value::Null => None,
        Value::Object(map) if map.contains_key("Ok") => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn unknown_shape(method: &'static str, detail: impl Into<String>) -> RelayError {
    RelayError::UnknownShape {
        method,
        detail: detail.into(),
    }
}
