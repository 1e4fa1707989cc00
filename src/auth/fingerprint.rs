// Copyright 2025 Lablup Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Host key fingerprint verification.
//!
//! Pure comparison, no state. Both sides are normalized before the compare
//! so the same digest written as `SHA256:abc...`, `ab:cd:ef...`, or in
//! mixed case matches itself.

/// Verify a transport-reported fingerprint against the pinned one.
///
/// When `expected` is `None` no pinning is configured and verification
/// trivially passes. This is trust-on-first-use: the first host to answer
/// is believed. Callers wanting host identity guarantees must pin a
/// fingerprint.
pub fn verify(expected: Option<&str>, actual: &str) -> bool {
    match expected {
        None => true,
        Some(expected) => normalize(expected) == normalize(actual),
    }
}

/// Reduce a fingerprint to a canonical form: algorithm prefix stripped,
/// colon separators removed, lowercase.
fn normalize(fingerprint: &str) -> String {
    let trimmed = fingerprint.trim();

    let without_prefix = ["SHA256:", "SHA512:", "MD5:"]
        .iter()
        .find_map(|prefix| {
            (trimmed.len() >= prefix.len()
                && trimmed[..prefix.len()].eq_ignore_ascii_case(prefix))
            .then(|| &trimmed[prefix.len()..])
        })
        .unwrap_or(trimmed);

    without_prefix
        .chars()
        .filter(|c| *c != ':')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_pin_passes() {
        assert!(verify(None, "SHA256:whatever"));
    }

    #[test]
    fn test_exact_match() {
        assert!(verify(Some("deadbeef"), "deadbeef"));
    }

    #[test]
    fn test_mismatch() {
        assert!(!verify(Some("deadbeef"), "cafebabe"));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(verify(Some("DEADBEEF"), "deadbeef"));
    }

    #[test]
    fn test_prefix_stripped() {
        assert!(verify(
            Some("SHA256:nThbg6kXUpJWGl7E1IGOCspRomTxdCARLviKw6E5SY8"),
            "nThbg6kXUpJWGl7E1IGOCspRomTxdCARLviKw6E5SY8"
        ));
    }

    #[test]
    fn test_colon_hex_form() {
        assert!(verify(
            Some("de:ad:be:ef:ca:fe"),
            "DEADBEEFCAFE"
        ));
    }

    #[test]
    fn test_whitespace_trimmed() {
        assert!(verify(Some("  deadbeef  "), "deadbeef"));
    }
}
