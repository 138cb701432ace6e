//! Fuzz harness for `Version::parse` and `build_range`.
//!
//! Arbitrary input is split into lines and treated as release tags. Parsing
//! must never panic, and every candidate `build_range` yields must be unique,
//! sorted, and inside the requested range.

#![no_main]
use libfuzzer_sys::fuzz_target;
use relbisect_core::version::{Version, VersionRange, build_range};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    for line in text.lines() {
        if let Ok(version) = Version::parse(line) {
            // The canonical form must parse back to the same version.
            assert_eq!(Version::parse(&version.canonical()).ok(), Some(version));
        }
    }

    let Ok(range) = VersionRange::parse("0.0.0", "999.999.999") else {
        return;
    };
    let candidates = build_range(text.lines(), &range);
    for pair in candidates.as_slice().windows(2) {
        assert!(pair[0] < pair[1], "unsorted or duplicate: {} {}", pair[0], pair[1]);
    }
    assert!(candidates.as_slice().iter().all(|v| range.contains(v)));
});
