//! # cidwatch-settings
//!
//! Configuration with layered sources.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`CidwatchSettings::default()`]
//! 2. **Settings file**: `~/.cidwatch/settings.json` or an explicit path
//!    (deep-merged over defaults)
//! 3. **Environment variables**: the `PUMP_*`, `PINATA_*`, `GATEWAY_*`,
//!    `SMART_IPFS_*`, `VALIDATE_*` and `CIDWATCH_*` families (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_env_overrides_from, deep_merge, load_settings,
    load_settings_from_path, settings_path,
};
pub use types::*;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
