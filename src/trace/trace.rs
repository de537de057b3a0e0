use serde::Serialize;
use sha1::{Digest, Sha1};
use std::time::{SystemTime, UNIX_EPOCH};

/// One line of a run's `journal.jsonl`.
#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    pub timestamp_ms: u128,
    pub route: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// SHA-1 of the captured HTML, hex encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_fingerprint: Option<String>,

    /// Set when the captured HTML equals the previous snapshot's.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unchanged: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TraceEvent {
    pub fn now(route: &str) -> Self {
        Self {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or_default(),
            route: route.to_string(),
            detail: None,
            html_fingerprint: None,
            unchanged: None,
            count: None,
            error: None,
        }
    }

    pub fn with_detail(mut self, detail: impl ToString) -> Self {
        self.detail = Some(detail.to_string());
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: &str, unchanged: bool) -> Self {
        self.html_fingerprint = Some(fingerprint.to_string());
        self.unchanged = Some(unchanged);
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

/// Hex SHA-1 of a captured page.
pub fn html_fingerprint(html: &str) -> String {
    let digest = Sha1::digest(html.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
