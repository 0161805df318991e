//! Fuzz target for the TOML configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser
//!
//! Exercises `AppConfig::parse()` (TOML decoding plus validation) with
//! arbitrary input.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = connidx_config::AppConfig::parse(s) {
            assert!(config.indexer.reindex_delay_ms > 0);
            assert!(!config.library.resource_path.is_absolute());
        }
    }
});
