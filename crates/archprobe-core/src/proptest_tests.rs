//! Property-based tests for archprobe-core types.
//!
//! These tests use proptest to verify the normalization rules across many
//! randomly generated image names.

use proptest::prelude::*;

use crate::{normalize, with_latest_tag, PlatformSpec, DEFAULT_NAMESPACE, DEFAULT_REGISTRY_HOST};

/// Strategy for generating repository name components.
fn component_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9._-]{0,20}"
}

/// Strategy for generating registry hosts, with or without a port.
fn host_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z][a-z0-9-]{1,15}\\.(io|com|net|dev)",
        "(localhost|registry)(:[1-9][0-9]{2,4})?",
    ]
}

/// Strategy for generating an optional `:tag` or `@digest` suffix.
fn suffix_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[A-Za-z0-9_][A-Za-z0-9_.-]{0,20}".prop_map(|tag| format!(":{tag}")),
        "[a-f0-9]{64}".prop_map(|hex| format!("@sha256:{hex}")),
    ]
}

/// Strategy for `@` suffixes that are not well-formed digests: no algorithm
/// separator, or path separators inside the digest.
fn loose_digest_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z0-9]{1,12}".prop_map(|digest| format!("@{digest}")),
        "[a-z0-9]{1,8}/[a-z0-9/:]{1,12}".prop_map(|digest| format!("@{digest}")),
    ]
}

/// Strategy for generating names with at least three segments.
fn qualified_name_strategy() -> impl Strategy<Value = String> {
    (
        host_strategy(),
        prop::collection::vec(component_strategy(), 2..5),
        prop_oneof![3 => suffix_strategy(), 1 => loose_digest_strategy()],
    )
        .prop_map(|(host, path, suffix)| format!("{host}/{}{suffix}", path.join("/")))
}

/// Strategy for generating platform strings.
fn platform_strategy() -> impl Strategy<Value = String> {
    (
        "(linux|windows|darwin|freebsd)",
        "(amd64|arm64|arm|386|ppc64le|s390x|riscv64)",
        prop::option::of("v[5-8]"),
    )
        .prop_map(|(os, arch, variant)| match variant {
            Some(v) => format!("{os}/{arch}/{v}"),
            None => format!("{os}/{arch}"),
        })
}

proptest! {
    #[test]
    fn single_segment_names_get_default_host_and_namespace(
        name in component_strategy(),
        suffix in suffix_strategy(),
    ) {
        let reference = normalize(&format!("{name}{suffix}"));
        prop_assert_eq!(
            reference.to_string(),
            format!("{DEFAULT_REGISTRY_HOST}/{DEFAULT_NAMESPACE}/{name}{suffix}")
        );
    }

    #[test]
    fn two_segment_names_get_default_host(
        namespace in component_strategy(),
        name in component_strategy(),
        suffix in suffix_strategy(),
    ) {
        let input = format!("{namespace}/{name}{suffix}");
        let reference = normalize(&input);
        prop_assert_eq!(reference.to_string(), format!("{DEFAULT_REGISTRY_HOST}/{input}"));
    }

    #[test]
    fn qualified_names_pass_through(name in qualified_name_strategy()) {
        prop_assert_eq!(normalize(&name).to_string(), name);
    }

    #[test]
    fn normalize_is_idempotent(name in qualified_name_strategy()) {
        let once = normalize(&name);
        let twice = normalize(&once.to_string());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn digest_separator_survives_display(name in qualified_name_strategy()) {
        let reference = normalize(&name);
        prop_assert_eq!(reference.is_digest(), name.contains('@'));
    }

    #[test]
    fn at_sign_in_first_segment_passes_through(
        name in component_strategy(),
        digest in component_strategy(),
        path in prop::collection::vec(component_strategy(), 2..4),
    ) {
        let input = format!("{name}@{digest}/{}", path.join("/"));
        let reference = normalize(&input);
        prop_assert_eq!(reference.registry_host(), format!("{name}@{digest}"));
        prop_assert_eq!(reference.to_string(), input);
    }

    #[test]
    fn normalized_short_names_are_idempotent(
        name in component_strategy(),
        suffix in suffix_strategy(),
    ) {
        let once = normalize(&format!("{name}{suffix}"));
        prop_assert_eq!(normalize(&once.to_string()), once);
    }

    #[test]
    fn with_latest_tag_always_yields_latest(
        name in prop_oneof![
            qualified_name_strategy(),
            (component_strategy(), suffix_strategy()).prop_map(|(n, s)| format!("{n}{s}")),
        ],
    ) {
        let reference = with_latest_tag(&name).unwrap();
        prop_assert_eq!(reference.tag_or_digest(), Some("latest"));
        prop_assert!(!reference.is_digest());
    }

    #[test]
    fn platform_display_roundtrips(platform in platform_strategy()) {
        let parsed: PlatformSpec = platform.parse().unwrap();
        prop_assert_eq!(parsed.to_string(), platform);
    }

    #[test]
    fn platform_matches_itself(platform in platform_strategy()) {
        let parsed: PlatformSpec = platform.parse().unwrap();
        prop_assert!(parsed.matches(&parsed));
    }
}
