//! Pin, gateway, and validation settings.

use serde::{Deserialize, Serialize};

/// Pin collaborator settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PinSettings {
    /// Pin-by-CID endpoint.
    pub endpoint: String,
    /// Bearer credential; pins are skipped when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for PinSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.pinata.cloud/v3/files/public/pin_by_cid".to_string(),
            jwt: None,
            timeout_ms: 15_000,
        }
    }
}

/// How gateway fetches are scheduled for one identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchStrategy {
    /// Every template concurrently; each attempt stands alone.
    #[default]
    All,
    /// Local gateway first, public templates after a threshold; first success wins.
    LocalFirst,
}

/// Gateway fetch collaborator settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewaySettings {
    /// URL templates; `{cid}` is replaced by the identifier.
    pub templates: Vec<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Stop reading a body after this many bytes.
    pub max_bytes: u64,
    /// Scheduling strategy.
    pub strategy: FetchStrategy,
    /// Local gateway template for [`FetchStrategy::LocalFirst`].
    pub local_gateway: String,
    /// Timeout of the local attempt in milliseconds.
    pub local_timeout_ms: u64,
    /// How long the local attempt runs alone before public gateways start.
    pub fallback_threshold_ms: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            templates: vec![
                "https://ipfs.io/ipfs/{cid}".to_string(),
                "https://ok-test.mypinata.cloud/files/{cid}".to_string(),
            ],
            timeout_ms: 20_000,
            max_bytes: 20 * 1024 * 1024,
            strategy: FetchStrategy::All,
            local_gateway: "http://localhost:8080/ipfs/{cid}".to_string(),
            local_timeout_ms: 5000,
            fallback_threshold_ms: 200,
        }
    }
}

/// Opt-in validation rules. Violations are logged, never enforced.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationSettings {
    /// Master switch.
    pub enabled: bool,
    /// Accepted subject prefixes; empty accepts all.
    pub allowed_subject_prefixes: Vec<String>,
    /// Require a non-empty `mint`.
    pub require_mint: bool,
    /// Require a non-empty `image`.
    pub require_image: bool,
    /// Keys every `INFO` must carry.
    pub require_info_keys: Vec<String>,
}
