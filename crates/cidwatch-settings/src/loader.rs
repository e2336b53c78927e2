//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`CidwatchSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. Check cross-field constraints
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::{CidwatchSettings, FetchStrategy};

/// Resolve the default settings file (`~/.cidwatch/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".cidwatch").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<CidwatchSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, defaults are used. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<CidwatchSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

fn load_file_layer(path: &Path) -> Result<CidwatchSettings> {
    let defaults = serde_json::to_value(CidwatchSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

fn validate(settings: &CidwatchSettings) -> Result<()> {
    if settings.stream.url.trim().is_empty() {
        return Err(SettingsError::InvalidValue("stream.url is empty".into()));
    }
    if settings.stream.subscriptions.is_empty() {
        return Err(SettingsError::InvalidValue(
            "stream.subscriptions is empty".into(),
        ));
    }
    if settings.reconnect.initial_delay_ms == 0
        || settings.reconnect.max_delay_ms < settings.reconnect.initial_delay_ms
    {
        return Err(SettingsError::InvalidValue(format!(
            "reconnect delays must satisfy 0 < initial ({}) <= max ({})",
            settings.reconnect.initial_delay_ms, settings.reconnect.max_delay_ms
        )));
    }
    Ok(())
}

/// Apply overrides from the process environment.
pub fn apply_env_overrides(settings: &mut CidwatchSettings) {
    apply_env_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from any variable lookup.
///
/// Each variable has strict parsing rules:
/// - Durations in seconds accept fractions (`"2.5"`)
/// - Booleans accept: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`
/// - Lists are comma-separated; blank entries are dropped
/// - Invalid values are ignored with a warning (fall back to file/default)
/// - Empty strings count as unset
pub fn apply_env_overrides_from<F>(settings: &mut CidwatchSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Stream ──────────────────────────────────────────────────────
    if let Some(v) = env.string("NATS_WS_URL") {
        settings.stream.url = v;
    }
    if let Some(v) = env.string("PUMP_WS_KEY") {
        settings.stream.websocket_key = v;
    }
    if let Some(v) = env.string("PUMP_WS_BEARER") {
        settings.stream.bearer = Some(v);
    }

    // ── Auth ────────────────────────────────────────────────────────
    if let Some(v) = env.string("PUMP_NATS_USER") {
        settings.auth.user = Some(v);
    }
    if let Some(v) = env
        .string("PUMP_NATS_PASS")
        .or_else(|| env.string("PUMP_NATS_PASSWORD"))
    {
        settings.auth.pass = Some(v);
    }
    if let Some(v) = env.string("PUMP_NATS_TOKEN") {
        settings.auth.token = Some(v);
    }
    if let Some(v) = env.string("PUMP_NATS_JWT") {
        settings.auth.jwt = Some(v);
    }
    if let Some(v) = env.string("PUMP_NATS_SIG") {
        settings.auth.sig = Some(v);
    }

    // ── Pin ─────────────────────────────────────────────────────────
    if let Some(v) = env
        .string("PINATA_JWT")
        .or_else(|| env.string("PINATA_BEARER"))
    {
        settings.pin.jwt = Some(v);
    }
    if let Some(v) = env.seconds_as_ms("PINATA_TIMEOUT_SECONDS") {
        settings.pin.timeout_ms = v;
    }

    // ── Gateway ─────────────────────────────────────────────────────
    if let Some(v) = env.list("IPFS_GATEWAYS") {
        settings.gateway.templates = v;
    }
    if let Some(v) = env.seconds_as_ms("GATEWAY_TIMEOUT_SECONDS") {
        settings.gateway.timeout_ms = v;
    }
    if let Some(v) = env.u64_in("GATEWAY_MAX_BYTES", 1, u64::MAX) {
        settings.gateway.max_bytes = v;
    }
    if let Some(v) = env.bool("SMART_IPFS_ENABLED") {
        settings.gateway.strategy = if v {
            FetchStrategy::LocalFirst
        } else {
            FetchStrategy::All
        };
    }
    if let Some(v) = env.string("SMART_IPFS_LOCAL_GATEWAY") {
        settings.gateway.local_gateway = v;
    }
    if let Some(v) = env.u64_in("SMART_IPFS_LOCAL_TIMEOUT_MS", 1, 600_000) {
        settings.gateway.local_timeout_ms = v;
    }
    if let Some(v) = env.u64_in("SMART_IPFS_FALLBACK_THRESHOLD_MS", 0, 600_000) {
        settings.gateway.fallback_threshold_ms = v;
    }

    // ── Validation ──────────────────────────────────────────────────
    if let Some(v) = env.bool("VALIDATE_ENABLED") {
        settings.validation.enabled = v;
    }
    if let Some(v) = env.list("VALIDATE_ALLOWED_SUBJECTS") {
        settings.validation.allowed_subject_prefixes = v;
    }
    if let Some(v) = env.bool("VALIDATE_REQUIRE_MINT") {
        settings.validation.require_mint = v;
    }
    if let Some(v) = env.bool("VALIDATE_REQUIRE_IMAGE") {
        settings.validation.require_image = v;
    }
    if let Some(v) = env.list("VALIDATE_INFO_KEYS") {
        settings.validation.require_info_keys = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("CIDWATCH_EVENT_LOG") {
        settings.logging.event_log_path = v;
    }
    if let Some(v) = env.string("CIDWATCH_RAW_LOG") {
        settings.logging.raw_log_path = Some(v);
    }
    if let Some(v) = env.string("CIDWATCH_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a positive, possibly fractional, number of seconds into milliseconds.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn parse_seconds_as_ms(val: &str) -> Option<u64> {
    let secs: f64 = val.trim().parse().ok()?;
    (secs.is_finite() && secs > 0.0 && secs <= 86_400.0).then(|| (secs * 1000.0).round() as u64)
}

/// Split a comma-separated list, trimming entries and dropping blanks.
pub fn parse_csv(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn string(&self, name: &str) -> Option<String> {
        self.raw(name)
    }

    fn list(&self, name: &str) -> Option<Vec<String>> {
        self.raw(name).map(|v| parse_csv(&v))
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = self.raw(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u64_in(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = self.raw(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }

    fn seconds_as_ms(&self, name: &str) -> Option<u64> {
        let val = self.raw(name)?;
        let result = parse_seconds_as_ms(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid seconds env var, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
