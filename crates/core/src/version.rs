//! Version comparison rules (spec §9).
//!
//! Versions are parsed as semver (`major.minor.patch`), with any
//! prerelease/build suffix stripped before numeric comparison. A
//! non-parseable version only ever compares equal to itself as a string,
//! and such a version *always* requires the producer to supply a new,
//! different string — a `bad_request` otherwise.

use semver::Version;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedVersion {
    Semver(Version),
    Opaque(String),
}

pub fn parse(v: &str) -> ParsedVersion {
    // Strip build metadata the `semver` crate is stricter about than we need
    // (spec says prerelease/build suffix is stripped before comparison).
    let core = v.split(['-', '+']).next().unwrap_or(v);
    match Version::parse(&normalize(core)) {
        Ok(parsed) => ParsedVersion::Semver(parsed),
        Err(_) => ParsedVersion::Opaque(v.to_string()),
    }
}

/// `semver::Version::parse` requires exactly major.minor.patch; pad
/// shorter version strings like "1" or "1.2" the way most tooling accepts.
fn normalize(core: &str) -> String {
    let parts: Vec<&str> = core.split('.').collect();
    match parts.len() {
        1 => format!("{}.0.0", parts[0]),
        2 => format!("{}.{}.0", parts[0], parts[1]),
        _ => core.to_string(),
    }
}

/// True iff `candidate` is strictly greater than `current` under the rule
/// in spec §9. Non-parseable versions are never considered greater than
/// anything (including themselves) unless the strings differ, in which case
/// the producer is trusted and the comparison still requires it differ from
/// current — callers should additionally check plain string inequality.
pub fn is_strictly_greater(current: &str, candidate: &str) -> bool {
    match (parse(current), parse(candidate)) {
        (ParsedVersion::Semver(a), ParsedVersion::Semver(b)) => b > a,
        _ => current != candidate,
    }
}

/// Ingest auto-publish bump rule: `1.2.0 -> 1.3.0`. Falls back to `2.0.0`
/// for a fresh major bump when the current version can't be parsed.
pub fn bump_minor(current: &str) -> String {
    match parse(current) {
        ParsedVersion::Semver(mut v) => {
            v.minor += 1;
            v.patch = 0;
            v.pre = semver::Prerelease::EMPTY;
            v.build = semver::BuildMetadata::EMPTY;
            v.to_string()
        }
        ParsedVersion::Opaque(_) => "2.0.0".to_string(),
    }
}

/// Version assigned to a newly-created contract off the back of a breaking
/// ingest change.
pub fn first_major() -> &'static str {
    "2.0.0"
}

/// Version assigned to the very first contract for an asset.
pub fn first_version() -> &'static str {
    "1.0.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semver_strictly_greater() {
        assert!(is_strictly_greater("1.0.0", "1.1.0"));
        assert!(!is_strictly_greater("1.1.0", "1.0.0"));
        assert!(!is_strictly_greater("1.0.0", "1.0.0"));
    }

    #[test]
    fn prerelease_suffix_stripped_before_compare() {
        assert!(is_strictly_greater("1.0.0", "1.0.1-beta.1"));
    }

    #[test]
    fn opaque_versions_require_different_strings() {
        assert!(is_strictly_greater("build-42", "build-43"));
        assert!(!is_strictly_greater("build-42", "build-42"));
    }

    #[test]
    fn bump_minor_rule() {
        assert_eq!(bump_minor("1.2.0"), "1.3.0");
        assert_eq!(bump_minor("1.2.5"), "1.3.0");
        assert_eq!(bump_minor("not-a-version"), "2.0.0");
    }
}
