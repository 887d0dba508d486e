//! Name resolution
//!
//! Maps a user-facing tool name (`java`, `node`, `vscode`) plus an optional
//! version to the package identifiers of one platform.
//!
//! Resolution runs in two stages:
//!
//! 1. The static [`CATALOG`], ordered by declaration. A version request is
//!    applied with the row's [`VersionStyle`].
//! 2. An optional [`PackageIndex`] queried only when the catalog has no row
//!    for the name. Index hits are ordered lexically.
//!
//! Candidates are always returned in a reproducible order so that "pick #1"
//! means the same package on every run.

use crate::platform::{PackageManager, PlatformTarget};
use crate::validator::DEFAULT_VERSION;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// A concrete package on one platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPackage {
    /// Catalog name the request matched (`java` for `jdk`)
    pub canonical_name: String,
    /// Identifier understood by the platform package manager
    pub platform_identifier: String,
    /// Version that will be installed, `latest` when unpinned
    pub resolved_version: String,
    /// Set when the requested version could not be honoured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substitution: Option<String>,
}

/// Result of resolving one name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    One(ResolvedPackage),
    Many(Vec<ResolvedPackage>),
    None,
}

impl ResolutionOutcome {
    fn from_candidates(mut candidates: Vec<ResolvedPackage>) -> Self {
        match candidates.len() {
            0 => ResolutionOutcome::None,
            1 => ResolutionOutcome::One(candidates.remove(0)),
            _ => ResolutionOutcome::Many(candidates),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ResolutionOutcome::None)
    }

    /// All candidates in order
    pub fn candidates(&self) -> Vec<&ResolvedPackage> {
        match self {
            ResolutionOutcome::One(p) => vec![p],
            ResolutionOutcome::Many(ps) => ps.iter().collect(),
            ResolutionOutcome::None => Vec::new(),
        }
    }
}

/// How a catalog row expresses a pinned version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionStyle {
    /// Versioned package name, `{version}` is substituted (`openjdk-{version}-jdk`).
    /// Narrows the row to a single candidate.
    Template(&'static str),
    /// Homebrew formula convention `name@version`
    FormulaAt,
    /// Identifier unchanged, version passed to the package manager
    ManagerFlag,
    /// No versioned packages; the unversioned identifier is used
    Unversioned,
}

/// One row of the mapping table
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub tool: &'static str,
    pub aliases: &'static [&'static str],
    pub platforms: &'static [PlatformTarget],
    pub candidates: &'static [&'static str],
    pub version_style: VersionStyle,
}

impl CatalogEntry {
    fn matches(&self, name: &str, platform: PlatformTarget) -> bool {
        self.platforms.contains(&platform)
            && (self.tool == name || self.aliases.contains(&name))
    }
}

const fn row(
    tool: &'static str,
    aliases: &'static [&'static str],
    platforms: &'static [PlatformTarget],
    candidates: &'static [&'static str],
    version_style: VersionStyle,
) -> CatalogEntry {
    CatalogEntry {
        tool,
        aliases,
        platforms,
        candidates,
        version_style,
    }
}

use PlatformTarget::{LinuxAlpine, LinuxArch, LinuxDebian, LinuxRhel, MacOs, Windows};
use VersionStyle::{FormulaAt, ManagerFlag, Template, Unversioned};

const DEBIAN: &[PlatformTarget] = &[LinuxDebian];
const RHEL: &[PlatformTarget] = &[LinuxRhel];
const ARCH: &[PlatformTarget] = &[LinuxArch];
const ALPINE: &[PlatformTarget] = &[LinuxAlpine];
const MACOS: &[PlatformTarget] = &[MacOs];
const WINDOWS: &[PlatformTarget] = &[Windows];
const UNIX: &[PlatformTarget] = &[LinuxDebian, LinuxRhel, LinuxArch, LinuxAlpine, MacOs];
const LINUX: &[PlatformTarget] = &[LinuxDebian, LinuxRhel, LinuxArch, LinuxAlpine];

const JAVA: &[&str] = &["jdk", "openjdk", "java-jdk"];
const PYTHON: &[&str] = &["python3", "py"];
const NODE: &[&str] = &["node", "node.js"];
const VSCODE: &[&str] = &["code", "visual-studio-code", "visual studio code", "vs-code"];
const NEOVIM: &[&str] = &["nvim"];
const GO: &[&str] = &["golang"];
const RUST: &[&str] = &["rustup", "rustc", "cargo"];
const INTELLIJ: &[&str] = &["intellij-idea", "idea"];
const POSTGRES: &[&str] = &["postgresql", "psql"];

/// Static tool mapping table. Row order is the tie-break order.
pub const CATALOG: &[CatalogEntry] = &[
    // Java
    row("java", JAVA, DEBIAN, &["default-jdk", "openjdk-21-jdk", "openjdk-17-jdk", "openjdk-11-jdk"], Template("openjdk-{version}-jdk")),
    row("java", JAVA, RHEL, &["java-latest-openjdk", "java-21-openjdk", "java-17-openjdk"], Template("java-{version}-openjdk")),
    row("java", JAVA, ARCH, &["jdk-openjdk", "jdk21-openjdk", "jdk17-openjdk"], Template("jdk{version}-openjdk")),
    row("java", JAVA, ALPINE, &["openjdk21", "openjdk17"], Template("openjdk{version}")),
    row("java", JAVA, MACOS, &["openjdk"], FormulaAt),
    row("java", JAVA, WINDOWS, &["EclipseAdoptium.Temurin.21.JDK", "Microsoft.OpenJDK.21"], Template("EclipseAdoptium.Temurin.{version}.JDK")),
    // Python
    row("python", PYTHON, DEBIAN, &["python3"], Template("python{version}")),
    row("python", PYTHON, RHEL, &["python3"], Template("python{version}")),
    row("python", PYTHON, ARCH, &["python"], Unversioned),
    row("python", PYTHON, ALPINE, &["python3"], Unversioned),
    row("python", PYTHON, MACOS, &["python@3.12"], FormulaAt),
    row("python", PYTHON, WINDOWS, &["Python.Python.3.12"], Template("Python.Python.{version}")),
    // Node.js
    row("nodejs", NODE, LINUX, &["nodejs"], Unversioned),
    row("nodejs", NODE, MACOS, &["node"], FormulaAt),
    row("nodejs", NODE, WINDOWS, &["OpenJS.NodeJS.LTS", "OpenJS.NodeJS"], ManagerFlag),
    // Editors and IDEs
    row("vscode", VSCODE, &[LinuxDebian, LinuxRhel, LinuxArch], &["code"], Unversioned),
    row("vscode", VSCODE, MACOS, &["visual-studio-code"], Unversioned),
    row("vscode", VSCODE, WINDOWS, &["Microsoft.VisualStudioCode"], ManagerFlag),
    row("neovim", NEOVIM, UNIX, &["neovim"], Unversioned),
    row("neovim", NEOVIM, WINDOWS, &["Neovim.Neovim"], ManagerFlag),
    row("intellij", INTELLIJ, DEBIAN, &["intellij-idea-community"], Unversioned),
    row("intellij", INTELLIJ, ARCH, &["intellij-idea-community-edition"], Unversioned),
    row("intellij", INTELLIJ, MACOS, &["intellij-idea-ce"], Unversioned),
    row("intellij", INTELLIJ, WINDOWS, &["JetBrains.IntelliJIDEA.Community"], ManagerFlag),
    row("pycharm", &[], DEBIAN, &["pycharm-community"], Unversioned),
    row("pycharm", &[], ARCH, &["pycharm-community-edition"], Unversioned),
    row("pycharm", &[], MACOS, &["pycharm-ce"], Unversioned),
    row("pycharm", &[], WINDOWS, &["JetBrains.PyCharm.Community"], ManagerFlag),
    row("eclipse", &[], DEBIAN, &["eclipse"], Unversioned),
    row("eclipse", &[], MACOS, &["eclipse-java"], Unversioned),
    // Containers
    row("docker", &[], DEBIAN, &["docker.io"], Unversioned),
    row("docker", &[], RHEL, &["docker-ce"], Unversioned),
    row("docker", &[], &[LinuxArch, LinuxAlpine, MacOs], &["docker"], Unversioned),
    row("docker", &[], WINDOWS, &["Docker.DockerDesktop"], ManagerFlag),
    // Toolchains
    row("git", &[], UNIX, &["git"], Unversioned),
    row("git", &[], WINDOWS, &["Git.Git"], ManagerFlag),
    row("go", GO, DEBIAN, &["golang-go"], Unversioned),
    row("go", GO, RHEL, &["golang"], Unversioned),
    row("go", GO, &[LinuxArch, LinuxAlpine], &["go"], Unversioned),
    row("go", GO, MACOS, &["go"], FormulaAt),
    row("go", GO, WINDOWS, &["GoLang.Go"], ManagerFlag),
    row("rust", RUST, DEBIAN, &["rustc", "rustup"], Unversioned),
    row("rust", RUST, &[LinuxArch, MacOs], &["rustup", "rust"], Unversioned),
    row("rust", RUST, &[LinuxRhel, LinuxAlpine], &["rust"], Unversioned),
    row("rust", RUST, WINDOWS, &["Rustlang.Rustup"], ManagerFlag),
    row("gcc", &["cc"], LINUX, &["gcc"], Unversioned),
    row("gcc", &["cc"], MACOS, &["gcc"], FormulaAt),
    row("maven", &["mvn"], UNIX, &["maven"], Unversioned),
    row("gradle", &[], &[LinuxArch, MacOs], &["gradle"], Unversioned),
    row("gradle", &[], DEBIAN, &["gradle"], Unversioned),
    row("curl", &[], UNIX, &["curl"], Unversioned),
    row("curl", &[], WINDOWS, &["cURL.cURL"], ManagerFlag),
    // Databases
    row("postgres", POSTGRES, DEBIAN, &["postgresql"], Template("postgresql-{version}")),
    row("postgres", POSTGRES, RHEL, &["postgresql-server"], Unversioned),
    row("postgres", POSTGRES, &[LinuxArch, LinuxAlpine], &["postgresql"], Unversioned),
    row("postgres", POSTGRES, MACOS, &["postgresql@16"], FormulaAt),
    row("postgres", POSTGRES, WINDOWS, &["PostgreSQL.PostgreSQL"], ManagerFlag),
];

/// Lookup in the system package index for names the catalog does not know
#[async_trait]
pub trait PackageIndex: Send + Sync {
    /// Identifiers exactly matching `name` on `platform`. Order is not significant.
    async fn search(&self, name: &str, platform: PlatformTarget) -> Vec<String>;
}

/// Name resolver: static catalog first, package index second
#[derive(Clone, Default)]
pub struct NameResolver {
    index: Option<Arc<dyn PackageIndex>>,
}

impl NameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index(mut self, index: Arc<dyn PackageIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Resolve `tool_name` at `version` on `platform`
    pub async fn resolve(
        &self,
        tool_name: &str,
        version: &str,
        platform: PlatformTarget,
    ) -> ResolutionOutcome {
        let outcome = resolve_static(tool_name, version, platform);
        if !outcome.is_none() {
            return outcome;
        }

        let Some(index) = &self.index else {
            return ResolutionOutcome::None;
        };

        let name = normalize_name(tool_name);
        let mut hits = index.search(&name, platform).await;
        hits.sort();
        hits.dedup();
        debug!(tool = %name, platform = %platform, hits = hits.len(), "Package index lookup");

        let candidates = hits
            .into_iter()
            .map(|identifier| {
                let style = if platform.package_manager() == PackageManager::Winget {
                    ManagerFlag
                } else {
                    Unversioned
                };
                apply_version(&name, &identifier, style, version, platform)
            })
            .collect();
        ResolutionOutcome::from_candidates(candidates)
    }
}

/// Resolve against the static catalog only. Pure.
pub fn resolve_static(tool_name: &str, version: &str, platform: PlatformTarget) -> ResolutionOutcome {
    let name = normalize_name(tool_name);
    let pinned = is_pinned(version).then(|| version.trim());

    let mut ranked: Vec<(usize, usize, ResolvedPackage)> = Vec::new();
    for (row_idx, entry) in CATALOG.iter().enumerate() {
        if !entry.matches(&name, platform) {
            continue;
        }
        match (pinned, entry.version_style) {
            (Some(v), Template(template)) => {
                ranked.push((
                    row_idx,
                    0,
                    ResolvedPackage {
                        canonical_name: entry.tool.to_string(),
                        platform_identifier: template.replace("{version}", v),
                        resolved_version: v.to_string(),
                        substitution: None,
                    },
                ));
            }
            (_, style) => {
                for (cand_idx, identifier) in entry.candidates.iter().enumerate() {
                    ranked.push((
                        row_idx,
                        cand_idx,
                        apply_version(entry.tool, identifier, style, version, platform),
                    ));
                }
            }
        }
    }

    ranked.sort_by(|a, b| {
        (a.0, a.1, &a.2.platform_identifier).cmp(&(b.0, b.1, &b.2.platform_identifier))
    });
    let mut seen = std::collections::HashSet::new();
    let candidates: Vec<ResolvedPackage> = ranked
        .into_iter()
        .map(|(_, _, p)| p)
        .filter(|p| seen.insert(p.platform_identifier.clone()))
        .collect();

    debug!(tool = %name, platform = %platform, candidates = candidates.len(), "Catalog lookup");
    ResolutionOutcome::from_candidates(candidates)
}

fn apply_version(
    canonical: &str,
    identifier: &str,
    style: VersionStyle,
    version: &str,
    platform: PlatformTarget,
) -> ResolvedPackage {
    let unpinned = ResolvedPackage {
        canonical_name: canonical.to_string(),
        platform_identifier: identifier.to_string(),
        resolved_version: DEFAULT_VERSION.to_string(),
        substitution: None,
    };
    if !is_pinned(version) {
        return unpinned;
    }
    let version = version.trim();

    match style {
        FormulaAt => {
            let base = identifier.split('@').next().unwrap_or(identifier);
            ResolvedPackage {
                platform_identifier: format!("{}@{}", base, version),
                resolved_version: version.to_string(),
                ..unpinned
            }
        }
        ManagerFlag => ResolvedPackage {
            resolved_version: version.to_string(),
            ..unpinned
        },
        // Template rows with a pin never reach here
        Template(_) | Unversioned => {
            warn!(
                tool = canonical,
                version, platform = %platform, "No versioned package, using unversioned identifier"
            );
            ResolvedPackage {
                substitution: Some(format!(
                    "No {} {} package for {}; falling back to {}",
                    canonical, version, platform, identifier
                )),
                ..unpinned
            }
        }
    }
}

fn is_pinned(version: &str) -> bool {
    let v = version.trim();
    !v.is_empty() && !v.eq_ignore_ascii_case(DEFAULT_VERSION)
}

fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace('_', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identifiers(outcome: &ResolutionOutcome) -> Vec<&str> {
        outcome
            .candidates()
            .into_iter()
            .map(|p| p.platform_identifier.as_str())
            .collect()
    }

    #[test]
    fn test_java_on_debian_is_ambiguous_in_declared_order() {
        let outcome = resolve_static("java", "latest", LinuxDebian);
        assert!(matches!(outcome, ResolutionOutcome::Many(_)));
        assert_eq!(
            identifiers(&outcome),
            vec!["default-jdk", "openjdk-21-jdk", "openjdk-17-jdk", "openjdk-11-jdk"]
        );
    }

    #[test]
    fn test_versioned_template_narrows_to_one() {
        let outcome = resolve_static("java", "17", LinuxDebian);
        match outcome {
            ResolutionOutcome::One(pkg) => {
                assert_eq!(pkg.platform_identifier, "openjdk-17-jdk");
                assert_eq!(pkg.resolved_version, "17");
                assert_eq!(pkg.canonical_name, "java");
                assert!(pkg.substitution.is_none());
            }
            other => panic!("expected one candidate, got {:?}", other),
        }
    }

    #[test]
    fn test_formula_at_convention_on_macos() {
        let outcome = resolve_static("python", "3.11", MacOs);
        assert_eq!(identifiers(&outcome), vec!["python@3.11"]);
    }

    #[test]
    fn test_unversioned_fallback_records_substitution() {
        let ResolutionOutcome::One(pkg) = resolve_static("nodejs", "18", LinuxDebian) else {
            panic!("expected one candidate");
        };
        assert_eq!(pkg.platform_identifier, "nodejs");
        assert_eq!(pkg.resolved_version, "latest");
        let note = pkg.substitution.expect("substitution recorded");
        assert!(note.contains("falling back to nodejs"));
    }

    #[test]
    fn test_manager_flag_keeps_identifier() {
        let ResolutionOutcome::One(pkg) = resolve_static("git", "2.44.0", Windows) else {
            panic!("expected one candidate");
        };
        assert_eq!(pkg.platform_identifier, "Git.Git");
        assert_eq!(pkg.resolved_version, "2.44.0");
    }

    #[test]
    fn test_aliases_and_case() {
        assert_eq!(identifiers(&resolve_static("NVIM", "", LinuxArch)), vec!["neovim"]);
        assert_eq!(identifiers(&resolve_static("vs-code", "latest", MacOs)), vec!["visual-studio-code"]);
        assert_eq!(identifiers(&resolve_static("node", "latest", LinuxAlpine)), vec!["nodejs"]);
    }

    #[test]
    fn test_unknown_tool_is_none() {
        assert!(resolve_static("notarealtool123", "latest", LinuxDebian).is_none());
    }

    #[test]
    fn test_tool_without_row_on_platform_is_none() {
        assert!(resolve_static("eclipse", "latest", LinuxAlpine).is_none());
    }

    struct FixedIndex(Vec<&'static str>);

    #[async_trait]
    impl PackageIndex for FixedIndex {
        async fn search(&self, _name: &str, _platform: PlatformTarget) -> Vec<String> {
            self.0.iter().map(|s| s.to_string()).collect()
        }
    }

    #[tokio::test]
    async fn test_index_consulted_only_on_catalog_miss() {
        let resolver = NameResolver::new().with_index(Arc::new(FixedIndex(vec!["zz-pkg"])));

        let hit = resolver.resolve("docker", "latest", LinuxDebian).await;
        assert_eq!(identifiers(&hit), vec!["docker.io"]);

        let miss = resolver.resolve("htop", "latest", LinuxDebian).await;
        assert_eq!(identifiers(&miss), vec!["zz-pkg"]);
    }

    #[tokio::test]
    async fn test_index_hits_sorted_lexically() {
        let resolver =
            NameResolver::new().with_index(Arc::new(FixedIndex(vec!["tmux-b", "tmux", "tmux-a", "tmux"])));
        let outcome = resolver.resolve("tmux", "latest", LinuxArch).await;
        assert_eq!(identifiers(&outcome), vec!["tmux", "tmux-a", "tmux-b"]);
    }

    #[tokio::test]
    async fn test_empty_index_is_none() {
        let resolver = NameResolver::new().with_index(Arc::new(FixedIndex(vec![])));
        assert!(resolver.resolve("notarealtool123", "latest", MacOs).await.is_none());
    }
}
