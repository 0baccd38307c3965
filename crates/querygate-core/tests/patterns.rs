// crates/querygate-core/tests/patterns.rs
// ============================================================================
// Module: Catalog Pattern Tests
// Description: Wildcard translation properties for metadata listings.
// Purpose: Ensure translated client patterns select the names clients expect.
// Dependencies: querygate-core, proptest
// ============================================================================

//! Catalog pattern tests: wildcard translation properties for metadata listings.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use proptest::prelude::*;
use querygate_core::convert_identifier_pattern;
use querygate_core::convert_schema_pattern;

proptest! {
    #[test]
    fn literal_names_match_themselves(name in "[a-z0-9_]{1,16}") {
        prop_assert!(convert_identifier_pattern(Some(&name)).matches(&name));
        prop_assert!(convert_schema_pattern(Some(&name)).matches(&name.to_uppercase()));
    }

    #[test]
    fn percent_suffix_matches_any_extension(
        prefix in "[a-z]{1,8}",
        suffix in "[a-z0-9]{0,8}",
    ) {
        let pattern = convert_identifier_pattern(Some(&format!("{prefix}%")));
        let extended = format!("{prefix}{suffix}");
        let prefixed = format!("#{prefix}{suffix}");
        prop_assert!(pattern.matches(&extended));
        prop_assert!(!pattern.matches(&prefixed));
    }

    #[test]
    fn underscore_matches_exactly_one_character(name in "[a-z]{1,10}", extra in "[a-z]") {
        let pattern = convert_identifier_pattern(Some(&"_".repeat(name.len())));
        prop_assert!(pattern.matches(&name));
        let longer = format!("{name}{extra}");
        prop_assert!(!pattern.matches(&longer));
    }

    #[test]
    fn escaped_wildcards_are_literal(prefix in "[a-z]{1,8}", other in "[a-z]") {
        let pattern = convert_identifier_pattern(Some(&format!("{prefix}\\%")));
        let literal = format!("{prefix}%");
        let wildcard_target = format!("{prefix}{other}");
        prop_assert!(pattern.matches(&literal));
        prop_assert!(!pattern.matches(&wildcard_target));
    }
}

#[test]
fn null_patterns_match_every_name() {
    for name in ["", "default", "global_temp", "Sales"] {
        assert!(convert_schema_pattern(None).matches(name), "schema {name}");
        assert!(convert_identifier_pattern(None).matches(name), "identifier {name}");
    }
}
