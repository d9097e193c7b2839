//! Tool package specifier parsing and validation.
//!
//! Parses specifiers like `@scope/name@1.2.3`, `@scope/name@^1.0`, `name@latest`.
//! The version token is mandatory: exactly one `@` must separate the name from
//! the version, and it may not sit at either edge of the name part.

use crate::error::{ToolError, ToolResult};
use crate::version::VersionToken;

/// A parsed tool package specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    /// Optional scope (without the `@` prefix).
    pub scope: Option<String>,
    /// Package name (without scope).
    pub name: String,
    /// Version constraint.
    pub version: VersionToken,
}

impl PackageSpec {
    /// Parse a tool package specifier string.
    ///
    /// Accepted formats:
    /// - `@scope/name@<version-token>`
    /// - `name@<version-token>`
    ///
    /// where `<version-token>` is an exact semantic version, a range, or `latest`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidSpecifier`] if the specifier is empty, lacks a
    /// version, has more than one version separator, names an invalid package,
    /// or carries a version token that is neither exact, a range, nor `latest`.
    pub fn parse(spec: &str) -> ToolResult<Self> {
        let trimmed = spec.trim();
        let invalid = |reason: &str| ToolError::InvalidSpecifier {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid("empty package specifier"));
        }

        // The leading `@` of a scope is not a version separator.
        let (scoped, body) = match trimmed.strip_prefix('@') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let mut separators = body.match_indices('@').map(|(i, _)| i);
        let at_pos = separators
            .next()
            .ok_or_else(|| invalid("missing '@<version>' suffix"))?;
        if separators.next().is_some() {
            return Err(invalid("more than one '@' version separator"));
        }

        let name_part = &body[..at_pos];
        let version_part = body.get(at_pos.saturating_add(1)..).unwrap_or_default();
        if name_part.is_empty() || version_part.is_empty() {
            return Err(invalid("version separator at the edge of the specifier"));
        }

        let (scope, name) = if scoped {
            let (scope, name) = name_part
                .split_once('/')
                .ok_or_else(|| invalid("scoped package must be '@scope/name'"))?;
            if scope.is_empty() || name.is_empty() {
                return Err(invalid("scoped package must be '@scope/name'"));
            }
            (Some(scope.to_string()), name.to_string())
        } else {
            (None, name_part.to_string())
        };

        let version = VersionToken::parse(version_part).map_err(|reason| invalid(&reason))?;

        let parsed = Self {
            scope,
            name,
            version,
        };
        parsed.validate().map_err(|reason| invalid(&reason))?;
        Ok(parsed)
    }

    /// Validate the scope and name as single path segments.
    fn validate(&self) -> Result<(), String> {
        if let Some(scope) = &self.scope {
            validate_name_component(scope, "scope")?;
        }
        validate_name_component(&self.name, "name")
    }

    /// Full package name including scope (e.g. `@scope/name` or `name`).
    #[must_use]
    pub fn full_name(&self) -> String {
        match &self.scope {
            Some(scope) => format!("@{scope}/{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Validate a single name component (scope or package name).
///
/// Any spelling is accepted as long as the component stays one directory
/// level under a search root: non-empty, not `.` or `..`, and free of path
/// separators and NUL.
fn validate_name_component(name: &str, kind: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err(format!("{kind} cannot be empty"));
    }
    if name == "." || name == ".." {
        return Err(format!("{kind} cannot be '{name}'"));
    }
    if let Some(c) = name.chars().find(|c| matches!(c, '/' | '\\' | '\0')) {
        return Err(format!("{kind} contains forbidden character {c:?}"));
    }
    Ok(())
}

impl std::fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.full_name(), self.version)
    }
}

impl std::str::FromStr for PackageSpec {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_scoped_exact() {
        let spec = PackageSpec::parse("@zack/summarize@0.1.0").unwrap();
        assert_eq!(spec.scope.as_deref(), Some("zack"));
        assert_eq!(spec.name, "summarize");
        assert!(matches!(spec.version, VersionToken::Exact { .. }));
    }

    #[test]
    fn parse_scoped_range() {
        let spec = PackageSpec::parse("@zack/summarize@^0.1").unwrap();
        assert!(matches!(spec.version, VersionToken::Range(_)));
    }

    #[test]
    fn parse_unscoped_latest() {
        let spec = PackageSpec::parse("hello-tool@latest").unwrap();
        assert_eq!(spec.scope, None);
        assert_eq!(spec.version, VersionToken::Latest);
    }

    #[test]
    fn missing_version_is_rejected() {
        let err = PackageSpec::parse("@zack/summarize").unwrap_err();
        assert!(matches!(err, ToolError::InvalidSpecifier { .. }));
        assert!(PackageSpec::parse("hello-tool").is_err());
    }

    #[test]
    fn separator_at_edge_is_rejected() {
        assert!(PackageSpec::parse("@zack/summarize@").is_err());
        assert!(PackageSpec::parse("@@1.0.0").is_err());
        assert!(PackageSpec::parse("hello@").is_err());
    }

    #[test]
    fn duplicate_separator_is_rejected() {
        let err = PackageSpec::parse("@zack/summarize@1.0.0@2.0.0").unwrap_err();
        assert!(err.to_string().contains("more than one"));
    }

    #[test]
    fn invalid_version_token_is_rejected() {
        let err = PackageSpec::parse("@zack/summarize@not-a-version").unwrap_err();
        assert!(matches!(err, ToolError::InvalidSpecifier { .. }));
    }

    #[test]
    fn scope_without_name_is_rejected() {
        assert!(PackageSpec::parse("@zack@1.0.0").is_err());
        assert!(PackageSpec::parse("@zack/@1.0.0").is_err());
    }

    #[test]
    fn path_traversal_is_rejected() {
        assert!(PackageSpec::parse("../etc@1.0.0").is_err());
        assert!(PackageSpec::parse("@zack/..@1.0.0").is_err());
    }

    #[test]
    fn mixed_case_and_underscores_are_accepted() {
        let spec = PackageSpec::parse("@Acme/Summarize@1.0.0").unwrap();
        assert_eq!(spec.scope.as_deref(), Some("Acme"));
        assert_eq!(spec.name, "Summarize");

        let spec = PackageSpec::parse("my_Tool@latest").unwrap();
        assert_eq!(spec.full_name(), "my_Tool");
    }

    #[test]
    fn separators_and_nul_are_rejected() {
        assert!(PackageSpec::parse("@zack/sum/marize@1.0.0").is_err());
        assert!(PackageSpec::parse("zack\\tool@1.0.0").is_err());
        assert!(PackageSpec::parse("to\0ol@1.0.0").is_err());
        assert!(PackageSpec::parse("@./tool@1.0.0").is_err());
    }

    #[test]
    fn display_round_trips_the_written_form() {
        let spec = PackageSpec::parse("  @zack/summarize@0.1.0 ").unwrap();
        assert_eq!(spec.to_string(), "@zack/summarize@0.1.0");
        assert_eq!(spec.full_name(), "@zack/summarize");
    }
}
