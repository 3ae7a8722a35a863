//! Domain types for groups, files and stamping statistics
//!
//! Upstream file objects are handled as raw JSON. The proxy only rewrites
//! `is_stamped` and passes every other field back unchanged, whatever its type.

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Storage/stamping partition used by the webhook API
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Network {
    #[default]
    Public,
    Private,
    All,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Public => "public",
            Network::Private => "private",
            Network::All => "all",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown network {0:?} (expected public, private or all)")]
pub struct ParseNetworkError(String);

impl FromStr for Network {
    type Err = ParseNetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Network::Public),
            "private" => Ok(Network::Private),
            "all" => Ok(Network::All),
            _ => Err(ParseNetworkError(s.to_string())),
        }
    }
}

impl TryFrom<String> for Network {
    type Error = ParseNetworkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Which field decided a file's stamping status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampEvidence {
    /// A ledger transaction id is present
    ForeignTxId,
    /// `bulk_check.is_stamped` was reported
    BulkCheck,
    /// The file's own `is_stamped` flag
    FileFlag,
    /// Nothing reported; assume unstamped
    Default,
}

/// Decide whether an upstream file object is stamped.
///
/// Precedence, first match wins:
/// 1. `foreign_tx_id` is a non-empty string or a number: stamped
/// 2. `bulk_check.is_stamped`
/// 3. `is_stamped`
/// 4. not stamped
///
/// The upstream `is_stamped` flag lags behind transaction completion, so a
/// transaction id always overrides it. Fields are read leniently; a field of
/// an unexpected type is treated as absent and never hides the others.
pub fn resolve_is_stamped(file: &Value) -> (bool, StampEvidence) {
    if has_tx_id(file.get("foreign_tx_id")) {
        return (true, StampEvidence::ForeignTxId);
    }
    let bulk = file.get("bulk_check").and_then(|b| b.get("is_stamped"));
    if let Some(stamped) = flag(bulk) {
        return (stamped, StampEvidence::BulkCheck);
    }
    match flag(file.get("is_stamped")) {
        Some(stamped) => (stamped, StampEvidence::FileFlag),
        None => (false, StampEvidence::Default),
    }
}

fn has_tx_id(value: Option<&Value>) -> bool {
    match value {
        Some(Value::String(tx)) => !tx.trim().is_empty(),
        Some(Value::Number(_)) => true,
        _ => false,
    }
}

/// `true`/`false`, or a number where zero means false
fn flag(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        _ => None,
    }
}

/// File size in bytes from a number or a numeric string; anything else is zero
pub fn file_size(file: &Value) -> u64 {
    match file.get("size") {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Rewrite `is_stamped` on a raw upstream file object.
///
/// Returns the resolved flag, or `None` for values that aren't objects (those
/// are left as they are).
pub fn resolve_file_value(value: &mut Value) -> Option<bool> {
    let (stamped, evidence) = resolve_is_stamped(value);
    let Value::Object(map) = value else {
        tracing::debug!("Leaving non-object file entry untouched");
        return None;
    };
    map.insert("is_stamped".to_string(), Value::Bool(stamped));
    tracing::trace!(
        "File {:?}: is_stamped={} ({:?})",
        map.get("name").and_then(serde_json::Value::as_str),
        stamped,
        evidence
    );
    Some(stamped)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GroupStats {
    pub total_files: u64,
    pub stamped_files: u64,
    pub total_size: u64,
    pub all_stamped: bool,
}

impl GroupStats {
    pub fn new(total_files: u64, stamped_files: u64, total_size: u64) -> Self {
        Self {
            total_files,
            stamped_files,
            total_size,
            all_stamped: total_files > 0 && total_files == stamped_files,
        }
    }

    /// Stats carried in the `X-*` headers of a HEAD response.
    ///
    /// `X-Stamped-Files` is optional; older API versions don't send it.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self::new(
            header_u64(headers, "x-total-files"),
            header_u64(headers, "x-stamped-files"),
            header_u64(headers, "x-total-size"),
        )
    }

    /// Summary of a file listing. Every entry counts towards the total,
    /// whatever shape it has.
    pub fn from_files(files: &[Value]) -> Self {
        let (mut stamped, mut size) = (0u64, 0u64);
        for file in files {
            if resolve_is_stamped(file).0 {
                stamped += 1;
            }
            size = size.saturating_add(file_size(file));
        }
        Self::new(files.len() as u64, stamped, size)
    }
}

/// Account-wide numbers returned by a HEAD on the webhook without a group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TenantStats {
    pub credits: u64,
    pub group_enabled: bool,
    pub group_exists: Option<String>,
    pub group_public: Option<String>,
    /// Not reported at tenant level; always zero
    pub stamped_files: u64,
    pub total_files: u64,
    pub total_size: u64,
}

impl TenantStats {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            credits: header_u64(headers, "x-credits"),
            group_enabled: header_str(headers, "x-group-enabled") == Some("true"),
            group_exists: header_str(headers, "x-group-exists").map(str::to_string),
            group_public: header_str(headers, "x-group-public").map(str::to_string),
            stamped_files: 0,
            total_files: header_u64(headers, "x-total-files"),
            total_size: header_u64(headers, "x-total-size"),
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Leading-digit parse; anything unparseable counts as zero
fn header_u64(headers: &HeaderMap, name: &str) -> u64 {
    header_str(headers, name)
        .map(|v| {
            let digits: String = v.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().unwrap_or(0)
        })
        .unwrap_or(0)
}
