//! Fuzz target for descriptor parsing.
//!
//! Run with: cargo +nightly fuzz run fuzz_dcf_parser
//!
//! Feeds arbitrary text through block splitting and DCF parsing; neither may
//! panic, and a registry built from the text must serialize.

#![no_main]

use libfuzzer_sys::fuzz_target;

use connidx_core::ConnectionsRegistry;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = connidx_core::dcf::parse(s);

        let mut registry = ConnectionsRegistry::new();
        let added = registry.add_descriptor("fuzz", s);
        assert!(registry.len() <= added);
        let _ = registry.to_json();
    }
});
