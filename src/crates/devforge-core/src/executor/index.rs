//! Package index lookups for names outside the static catalog

use super::process::{CommandRunner, CommandSpec};
use crate::platform::{PackageManager, PlatformTarget};
use crate::resolver::PackageIndex;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// [`PackageIndex`] that asks the platform package manager
pub struct SystemPackageIndex {
    runner: Arc<dyn CommandRunner>,
}

impl SystemPackageIndex {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl PackageIndex for SystemPackageIndex {
    async fn search(&self, name: &str, platform: PlatformTarget) -> Vec<String> {
        let manager = platform.package_manager();
        if !self.runner.exists(manager.program()) {
            return Vec::new();
        }

        let spec = match manager {
            PackageManager::Apt => CommandSpec::new("apt-cache").args(["show", name]),
            PackageManager::Dnf => CommandSpec::new("dnf").args(["info", "--quiet", name]),
            PackageManager::Pacman => CommandSpec::new("pacman").args(["-Si", name]),
            PackageManager::Apk => CommandSpec::new("apk").args(["search", "-e", name]),
            PackageManager::Brew => CommandSpec::new("brew").args(["info", name]),
            PackageManager::Winget => CommandSpec::new("winget").args([
                "search",
                "--exact",
                name,
                "--accept-source-agreements",
            ]),
        };

        let output = match self.runner.run(&spec).await {
            Ok(output) => output,
            Err(e) => {
                debug!(error = %e, "Package index lookup failed");
                return Vec::new();
            }
        };
        if !output.success() {
            return Vec::new();
        }

        match manager {
            PackageManager::Winget => parse_winget_ids(&output.stdout),
            PackageManager::Apk if output.stdout.trim().is_empty() => Vec::new(),
            _ => vec![name.to_string()],
        }
    }
}

/// Extract the `Id` column of a `winget search` table
pub fn parse_winget_ids(table: &str) -> Vec<String> {
    let lines: Vec<&str> = table.lines().collect();
    let Some(header_idx) = lines
        .iter()
        .position(|l| l.contains("Id") && l.contains("Version"))
    else {
        return Vec::new();
    };
    let header = lines[header_idx];
    let (Some(id_start), Some(version_start)) = (header.find("Id"), header.find("Version")) else {
        return Vec::new();
    };

    lines[header_idx + 1..]
        .iter()
        .filter(|l| !l.trim_start().starts_with('-') && !l.trim().is_empty())
        .filter_map(|l| {
            let chars: Vec<char> = l.chars().collect();
            if chars.len() <= id_start {
                return None;
            }
            let end = version_start.min(chars.len());
            let id: String = chars[id_start..end].iter().collect();
            let id = id.trim();
            (!id.is_empty()).then(|| id.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::fake::ScriptedRunner;

    const WINGET_TABLE: &str = "\
Name                 Id                         Version  Source
--------------------------------------------------------------
Microsoft OpenJDK 17 Microsoft.OpenJDK.17       17.0.9   winget
Eclipse Temurin 17   EclipseAdoptium.Temurin.17 17.0.9.9 winget
";

    #[test]
    fn test_parse_winget_ids() {
        assert_eq!(
            parse_winget_ids(WINGET_TABLE),
            vec!["Microsoft.OpenJDK.17", "EclipseAdoptium.Temurin.17"]
        );
    }

    #[test]
    fn test_parse_winget_without_results() {
        assert!(parse_winget_ids("No package found matching input criteria.").is_empty());
    }

    #[tokio::test]
    async fn test_apt_show_hit() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .with_programs(&["apt-get"])
                .on("apt-cache show htop", 0, "Package: htop\n", ""),
        );
        let index = SystemPackageIndex::new(runner);
        assert_eq!(index.search("htop", PlatformTarget::LinuxDebian).await, vec!["htop"]);
    }

    #[tokio::test]
    async fn test_miss_is_empty() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .with_programs(&["pacman"])
                .on("pacman -Si", 1, "", "error: package 'nope' was not found"),
        );
        let index = SystemPackageIndex::new(runner);
        assert!(index.search("nope", PlatformTarget::LinuxArch).await.is_empty());
    }
}
