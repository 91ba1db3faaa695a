//! # structdb-settings
//!
//! Layered configuration for structdb stores.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`StructDbSettings::default()`]
//! 2. **User file**: `~/.structdb/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `STRUCTDB_*` overrides (highest priority)
//!
//! ```ignore
//! let settings = structdb_settings::load_settings().unwrap_or_default();
//! let store = AsyncStore::<(Reading,)>::open_with("data.db", &settings);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path, parse_bool,
    parse_u32_range, parse_u64_range, read_settings_file, settings_path,
};
pub use types::*;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
