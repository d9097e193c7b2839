//! Tool discovery across search roots.
//!
//! Layout under each search root:
//!
//! ```text
//! <root>/<name-dir>/<version>/agent.json
//! ```
//!
//! A scoped package `@scope/name` may be installed under any of several
//! directory spellings, since `@` and `/` are not safe everywhere. A version
//! directory only counts as installed when it contains a manifest.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use semver::Version;
use tracing::{debug, info};

use crate::error::{ToolError, ToolResult};
use crate::spec::PackageSpec;
use crate::version::VersionToken;

/// Manifest file name inside every installed version directory.
pub const MANIFEST_FILE_NAME: &str = "agent.json";

/// Read-only view of the directory tree the locator searches.
///
/// [`FsLister`] is the real filesystem; tests can substitute an in-memory tree.
pub trait DirLister: Send + Sync {
    /// Names of the immediate subdirectories of `dir`. Missing or unreadable
    /// directories yield an empty list.
    fn subdirectories(&self, dir: &Path) -> Vec<String>;

    /// Whether `path` exists and is a regular file.
    fn is_file(&self, path: &Path) -> bool;
}

/// [`DirLister`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLister;

impl DirLister for FsLister {
    fn subdirectories(&self, dir: &Path) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Where a tool was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedTool {
    /// The search root that produced the match.
    pub search_root: PathBuf,
    /// The installed version directory (`<root>/<name-dir>/<version>`).
    pub tool_dir: PathBuf,
    /// Path to the manifest inside `tool_dir`.
    pub manifest_path: PathBuf,
    /// The selected version.
    pub version: Version,
}

/// On-disk spellings tried for a package name, relative to a search root.
///
/// `@scope/name` yields `@scope/name`, `scope/name`, `scope__name`, and
/// `scope-name`. An unscoped name yields only itself.
#[must_use]
pub fn name_dir_candidates(spec: &PackageSpec) -> Vec<PathBuf> {
    let Some(scope) = &spec.scope else {
        return vec![PathBuf::from(&spec.name)];
    };

    let candidates = [
        Path::new(&format!("@{scope}")).join(&spec.name),
        Path::new(scope).join(&spec.name),
        PathBuf::from(format!("{scope}__{}", spec.name)),
        PathBuf::from(format!("{scope}-{}", spec.name)),
    ];

    let mut unique = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !unique.contains(&candidate) {
            unique.push(candidate);
        }
    }
    unique
}

/// Installed versions in `name_dir`, sorted ascending.
///
/// Only subdirectories whose names parse as semantic versions and which
/// contain a manifest file are returned.
#[must_use]
pub fn installed_versions(lister: &dyn DirLister, name_dir: &Path) -> Vec<Version> {
    let versions: BTreeSet<Version> = lister
        .subdirectories(name_dir)
        .into_iter()
        .filter(|dir| lister.is_file(&name_dir.join(dir).join(MANIFEST_FILE_NAME)))
        .filter_map(|dir| Version::parse(&dir).ok())
        .collect();
    versions.into_iter().collect()
}

/// Locates installed tools across an ordered list of search roots.
pub struct ToolLocator<'a> {
    roots: Vec<PathBuf>,
    lister: &'a dyn DirLister,
}

impl<'a> ToolLocator<'a> {
    /// Create a locator over `roots` (already in priority order).
    #[must_use]
    pub fn new(roots: Vec<PathBuf>, lister: &'a dyn DirLister) -> Self {
        Self { roots, lister }
    }

    /// The search roots, in priority order.
    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Find the first search root holding a version that satisfies `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotFound`] naming every searched root when no root
    /// yields a match.
    pub fn locate(&self, spec: &PackageSpec) -> ToolResult<LocatedTool> {
        let candidates = name_dir_candidates(spec);

        for root in &self.roots {
            let found = match &spec.version {
                VersionToken::Exact { raw, version } => {
                    self.find_exact(root, &candidates, raw, version)
                },
                token => self.find_matching(root, &candidates, token),
            };
            if let Some(located) = found {
                info!(
                    tool = %spec.full_name(),
                    version = %located.version,
                    root = %root.display(),
                    "Located tool"
                );
                return Ok(located);
            }
            debug!(tool = %spec, root = %root.display(), "No match under search root");
        }

        Err(ToolError::NotFound {
            spec: spec.to_string(),
            searched: self.roots.clone(),
        })
    }

    fn find_exact(
        &self,
        root: &Path,
        candidates: &[PathBuf],
        raw: &str,
        version: &Version,
    ) -> Option<LocatedTool> {
        candidates.iter().find_map(|candidate| {
            let tool_dir = root.join(candidate).join(raw);
            let manifest_path = tool_dir.join(MANIFEST_FILE_NAME);
            self.lister.is_file(&manifest_path).then(|| LocatedTool {
                search_root: root.to_path_buf(),
                tool_dir,
                manifest_path,
                version: version.clone(),
            })
        })
    }

    fn find_matching(
        &self,
        root: &Path,
        candidates: &[PathBuf],
        token: &VersionToken,
    ) -> Option<LocatedTool> {
        // Collect across every spelling so the best version wins, remembering
        // which spelling holds it (first spelling wins on ties).
        let mut best: Option<(Version, PathBuf)> = None;
        for candidate in candidates {
            let name_dir = root.join(candidate);
            let installed = installed_versions(self.lister, &name_dir);
            let Some(selected) = token.select(&installed) else {
                continue;
            };
            if best.as_ref().is_none_or(|(current, _)| selected > *current) {
                best = Some((selected, name_dir));
            }
        }

        best.map(|(version, name_dir)| {
            let tool_dir = name_dir.join(version.to_string());
            LocatedTool {
                search_root: root.to_path_buf(),
                manifest_path: tool_dir.join(MANIFEST_FILE_NAME),
                tool_dir,
                version,
            }
        })
    }
}
