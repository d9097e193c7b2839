//! Version tokens and installed-version selection.
//!
//! A version token is one of:
//! - `latest`: the highest installed version under semver ordering
//! - an exact semantic version (`1.2.3`)
//! - a range (`^1.2`, `>=1.0.0 <2.0.0`, `1.2.3 - 2.0.0`, `1.x || 3.x`)
//!
//! Ranges accept npm spellings on top of the `semver` crate syntax. They are
//! normalized into one [`VersionReq`] per `||` alternative before matching.

use semver::{Version, VersionReq};

/// The literal token selecting the highest installed version.
pub const LATEST: &str = "latest";

/// A parsed version constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionToken {
    /// Highest installed version.
    Latest,
    /// One exact version. The original spelling is kept because it names the
    /// version directory on disk.
    Exact {
        /// Version as written in the specifier.
        raw: String,
        /// Parsed version.
        version: Version,
    },
    /// A semantic version range.
    Range(VersionRange),
}

impl VersionToken {
    /// Classify a raw token as `latest`, exact, or range.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when the token is none of the three.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if raw == LATEST {
            return Ok(Self::Latest);
        }
        if let Ok(version) = Version::parse(raw) {
            return Ok(Self::Exact {
                raw: raw.to_string(),
                version,
            });
        }
        VersionRange::parse(raw).map(Self::Range)
    }

    /// Pick the best match among `installed`.
    ///
    /// Exact tokens require an equal version, `latest` takes the maximum, and
    /// ranges take the highest non-prerelease version that satisfies them.
    #[must_use]
    pub fn select<'a>(&self, installed: impl IntoIterator<Item = &'a Version>) -> Option<Version> {
        let mut candidates = installed.into_iter();
        match self {
            Self::Latest => candidates.max().cloned(),
            Self::Exact { version, .. } => candidates.find(|v| *v == version).cloned(),
            Self::Range(range) => candidates.filter(|v| range.matches(v)).max().cloned(),
        }
    }
}

impl std::fmt::Display for VersionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Latest => f.write_str(LATEST),
            Self::Exact { raw, .. } => f.write_str(raw),
            Self::Range(range) => f.write_str(&range.raw),
        }
    }
}

/// A version range made of `||`-separated alternatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    raw: String,
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    /// Parse a range expression.
    ///
    /// # Errors
    ///
    /// Returns a description of the first alternative that fails to parse.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err("empty version range".to_string());
        }

        let mut alternatives = Vec::new();
        for alternative in raw.split("||") {
            let normalized = normalize_alternative(alternative)
                .ok_or_else(|| format!("invalid version range '{raw}'"))?;
            let req = VersionReq::parse(&normalized)
                .map_err(|e| format!("invalid version '{raw}': {e}"))?;
            alternatives.push(req);
        }

        Ok(Self {
            raw: raw.to_string(),
            alternatives,
        })
    }

    /// Whether `version` satisfies any alternative. Prereleases never match.
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        version.pre.is_empty() && self.alternatives.iter().any(|req| req.matches(version))
    }

    /// The range as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// Rewrite one npm-style alternative into `semver` crate syntax.
///
/// - `1.2.3 - 2.0.0` becomes `>=1.2.3, <=2.0.0`
/// - `>= 1.0.0 < 2` becomes `>=1.0.0, <2`
/// - a bare partial version `1.2` becomes `=1.2` (npm reads it as `1.2.x`)
fn normalize_alternative(alternative: &str) -> Option<String> {
    let tokens: Vec<&str> = alternative
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect();

    if let [low, "-", high] = tokens.as_slice() {
        return Some(format!(">={low}, <={high}"));
    }

    let mut comparators = Vec::with_capacity(tokens.len());
    let mut pending_op = String::new();
    for token in tokens {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^')) {
            pending_op.push_str(token);
            continue;
        }
        let comparator = if pending_op.is_empty() && is_bare_partial(token) {
            format!("={token}")
        } else {
            format!("{pending_op}{token}")
        };
        pending_op.clear();
        comparators.push(comparator);
    }

    if !pending_op.is_empty() || comparators.is_empty() {
        return None;
    }
    Some(comparators.join(", "))
}

/// `1` or `1.2` with no operator and no wildcard.
fn is_bare_partial(token: &str) -> bool {
    token.chars().next().is_some_and(|c| c.is_ascii_digit())
        && token.split('.').count() < 3
        && token.chars().all(|c| c.is_ascii_digit() || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn versions(list: &[&str]) -> Vec<Version> {
        list.iter().map(|v| Version::parse(v).unwrap()).collect()
    }

    #[test]
    fn classify_tokens() {
        assert_eq!(VersionToken::parse("latest").unwrap(), VersionToken::Latest);
        assert!(matches!(
            VersionToken::parse("1.2.3").unwrap(),
            VersionToken::Exact { .. }
        ));
        assert!(matches!(
            VersionToken::parse("^1.2").unwrap(),
            VersionToken::Range(_)
        ));
        assert!(VersionToken::parse("banana").is_err());
        assert!(VersionToken::parse("").is_err());
    }

    #[test]
    fn latest_picks_semver_maximum_not_lexical() {
        let installed = versions(&["0.9.0", "0.10.0", "0.2.0"]);
        let picked = VersionToken::Latest.select(&installed).unwrap();
        assert_eq!(picked, Version::new(0, 10, 0));
    }

    #[test]
    fn latest_includes_prereleases() {
        let installed = versions(&["1.0.0", "2.0.0-beta.1"]);
        let picked = VersionToken::Latest.select(&installed).unwrap();
        assert_eq!(picked.to_string(), "2.0.0-beta.1");
    }

    #[test]
    fn range_picks_highest_satisfying() {
        let installed = versions(&["1.0.0", "1.4.2", "1.9.0", "2.0.0"]);
        let token = VersionToken::parse("^1.2").unwrap();
        assert_eq!(token.select(&installed).unwrap(), Version::new(1, 9, 0));
    }

    #[test]
    fn range_excludes_prereleases() {
        let installed = versions(&["1.0.0", "1.1.0-alpha.1"]);
        let token = VersionToken::parse(">=1.0.0").unwrap();
        assert_eq!(token.select(&installed).unwrap(), Version::new(1, 0, 0));

        let only_pre = versions(&["1.1.0-alpha.1"]);
        let token = VersionToken::parse(">=1.1.0-alpha.0").unwrap();
        assert!(token.select(&only_pre).is_none());
    }

    #[test]
    fn exact_requires_equality() {
        let installed = versions(&["1.0.0", "1.0.1"]);
        let token = VersionToken::parse("1.0.1").unwrap();
        assert_eq!(token.select(&installed).unwrap(), Version::new(1, 0, 1));
        let token = VersionToken::parse("1.0.2").unwrap();
        assert!(token.select(&installed).is_none());
    }

    #[test]
    fn npm_comparator_sets() {
        let range = VersionRange::parse(">=1.0.0 <2.0.0").unwrap();
        assert!(range.matches(&Version::new(1, 5, 0)));
        assert!(!range.matches(&Version::new(2, 0, 0)));

        let range = VersionRange::parse(">= 1.0.0 < 2").unwrap();
        assert!(range.matches(&Version::new(1, 0, 0)));
        assert!(!range.matches(&Version::new(2, 1, 0)));
    }

    #[test]
    fn npm_hyphen_range() {
        let range = VersionRange::parse("1.2.3 - 2.0.0").unwrap();
        assert!(range.matches(&Version::new(1, 2, 3)));
        assert!(range.matches(&Version::new(2, 0, 0)));
        assert!(!range.matches(&Version::new(2, 0, 1)));
    }

    #[test]
    fn npm_alternatives() {
        let range = VersionRange::parse("^1.0.0 || ^3.0.0").unwrap();
        assert!(range.matches(&Version::new(1, 2, 0)));
        assert!(!range.matches(&Version::new(2, 0, 0)));
        assert!(range.matches(&Version::new(3, 1, 0)));
    }

    #[test]
    fn bare_partial_means_patch_range() {
        let range = VersionRange::parse("1.2").unwrap();
        assert!(range.matches(&Version::new(1, 2, 9)));
        assert!(!range.matches(&Version::new(1, 3, 0)));
    }

    #[test]
    fn wildcards() {
        let range = VersionRange::parse("1.x").unwrap();
        assert!(range.matches(&Version::new(1, 7, 0)));
        assert!(!range.matches(&Version::new(2, 0, 0)));
        assert!(VersionRange::parse("*").unwrap().matches(&Version::new(0, 0, 1)));
    }

    #[test]
    fn dangling_operator_is_rejected() {
        assert!(VersionRange::parse(">=").is_err());
        assert!(VersionRange::parse("1.0.0 ||").is_err());
    }
}
