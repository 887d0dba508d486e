//! Platform detection
//!
//! The platform is detected once at startup and handed to the dispatcher;
//! nothing re-detects it per request.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Closed set of supported platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PlatformTarget {
    #[serde(rename = "windows")]
    Windows,
    #[serde(rename = "macos")]
    MacOs,
    #[serde(rename = "linux-debian")]
    LinuxDebian,
    #[serde(rename = "linux-rhel")]
    LinuxRhel,
    #[serde(rename = "linux-arch")]
    LinuxArch,
    #[serde(rename = "linux-alpine")]
    LinuxAlpine,
}

/// Package manager used on a platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Apt,
    Dnf,
    Pacman,
    Apk,
    Brew,
    Winget,
}

impl PackageManager {
    /// Executable invoked for this package manager
    pub fn program(&self) -> &'static str {
        match self {
            PackageManager::Apt => "apt-get",
            PackageManager::Dnf => "dnf",
            PackageManager::Pacman => "pacman",
            PackageManager::Apk => "apk",
            PackageManager::Brew => "brew",
            PackageManager::Winget => "winget",
        }
    }

    /// Whether mutating commands need root
    pub fn needs_root(&self) -> bool {
        !matches!(self, PackageManager::Brew | PackageManager::Winget)
    }
}

impl PlatformTarget {
    pub const ALL: [PlatformTarget; 6] = [
        PlatformTarget::Windows,
        PlatformTarget::MacOs,
        PlatformTarget::LinuxDebian,
        PlatformTarget::LinuxRhel,
        PlatformTarget::LinuxArch,
        PlatformTarget::LinuxAlpine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformTarget::Windows => "windows",
            PlatformTarget::MacOs => "macos",
            PlatformTarget::LinuxDebian => "linux-debian",
            PlatformTarget::LinuxRhel => "linux-rhel",
            PlatformTarget::LinuxArch => "linux-arch",
            PlatformTarget::LinuxAlpine => "linux-alpine",
        }
    }

    pub fn package_manager(&self) -> PackageManager {
        match self {
            PlatformTarget::Windows => PackageManager::Winget,
            PlatformTarget::MacOs => PackageManager::Brew,
            PlatformTarget::LinuxDebian => PackageManager::Apt,
            PlatformTarget::LinuxRhel => PackageManager::Dnf,
            PlatformTarget::LinuxArch => PackageManager::Pacman,
            PlatformTarget::LinuxAlpine => PackageManager::Apk,
        }
    }

    pub fn is_linux(&self) -> bool {
        !matches!(self, PlatformTarget::Windows | PlatformTarget::MacOs)
    }

    /// Detect the platform of the running process.
    ///
    /// Returns `None` on an OS outside the supported set.
    pub fn detect() -> Option<Self> {
        let detected = match std::env::consts::OS {
            "windows" => Some(PlatformTarget::Windows),
            "macos" => Some(PlatformTarget::MacOs),
            "linux" => {
                let content = std::fs::read_to_string("/etc/os-release")
                    .or_else(|_| std::fs::read_to_string("/usr/lib/os-release"))
                    .unwrap_or_default();
                Some(parse_os_release(&content))
            }
            _ => None,
        };
        debug!(os = std::env::consts::OS, platform = ?detected, "Detected platform");
        detected
    }
}

impl fmt::Display for PlatformTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        PlatformTarget::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| format!("Unknown platform '{}'", s))
    }
}

/// Map `/etc/os-release` content to a Linux family.
///
/// Looks at `ID` first, then each entry of `ID_LIKE`. Unknown
/// distributions default to the Debian family.
pub fn parse_os_release(content: &str) -> PlatformTarget {
    let mut id = String::new();
    let mut id_like = String::new();
    for line in content.lines() {
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'').to_ascii_lowercase();
            match key.trim() {
                "ID" => id = value,
                "ID_LIKE" => id_like = value,
                _ => {}
            }
        }
    }

    std::iter::once(id.as_str())
        .chain(id_like.split_whitespace())
        .find_map(family_of)
        .unwrap_or(PlatformTarget::LinuxDebian)
}

fn family_of(id: &str) -> Option<PlatformTarget> {
    match id {
        "debian" | "ubuntu" | "linuxmint" | "pop" | "elementary" | "kali" | "raspbian" => {
            Some(PlatformTarget::LinuxDebian)
        }
        "rhel" | "fedora" | "centos" | "rocky" | "almalinux" | "amzn" | "ol" => {
            Some(PlatformTarget::LinuxRhel)
        }
        "arch" | "manjaro" | "endeavouros" => Some(PlatformTarget::LinuxArch),
        "alpine" => Some(PlatformTarget::LinuxAlpine),
        _ => None,
    }
}
