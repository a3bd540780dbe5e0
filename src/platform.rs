//! Host classification: which system tags apply to the current machine.
use std::fmt;

/// Detected operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    /// Linux, any distribution.
    Linux,
    /// macOS.
    MacOs,
    /// Windows.
    Windows,
}

impl Os {
    /// The system tag used for this OS in dependency payloads.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::MacOs => "osx",
            Self::Windows => "windows",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Identifier for a class of host (`osx`, `linux`, `ubuntu`, `apt`, …).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemTag(String);

impl SystemTag {
    /// Create a tag; tags are compared case-insensitively, so they are
    /// stored lowercased.
    #[must_use]
    pub fn new(tag: impl AsRef<str>) -> Self {
        Self(tag.as_ref().to_ascii_lowercase())
    }

    /// Borrow the tag text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SystemTag {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl fmt::Display for SystemTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read-only view of the current host's identity.
///
/// The engine only consumes this to pick per-system payload fragments; it
/// never computes the identity itself.
pub trait HostInfo: Send + Sync + fmt::Debug {
    /// The host's system tag (the OS family, e.g. `osx` or `linux`).
    fn system(&self) -> SystemTag;

    /// Every tag that applies to this host, most specific first.
    fn match_list(&self) -> Vec<SystemTag>;

    /// One-line description for run reports.
    fn description(&self) -> String {
        self.match_list()
            .iter()
            .map(SystemTag::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Platform information for the current system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// Operating system family.
    pub os: Os,
    /// Distribution id from `/etc/os-release` (`ubuntu`, `arch`, …).
    pub flavour: Option<String>,
    /// Release codename (`jammy`, `bookworm`, …).
    pub codename: Option<String>,
}

impl Platform {
    /// Detect the current platform.
    #[must_use]
    pub fn detect() -> Self {
        let os = Self::detect_os();
        let (flavour, codename) = if os == Os::Linux {
            std::fs::read_to_string("/etc/os-release")
                .map(|content| parse_os_release(&content))
                .unwrap_or_default()
        } else {
            (None, None)
        };
        Self {
            os,
            flavour,
            codename,
        }
    }

    /// Create a platform with explicit values.
    #[must_use]
    pub fn new(os: Os, flavour: Option<&str>, codename: Option<&str>) -> Self {
        Self {
            os,
            flavour: flavour.map(str::to_ascii_lowercase),
            codename: codename.map(str::to_ascii_lowercase),
        }
    }

    /// Whether this is Linux.
    pub fn is_linux(&self) -> bool {
        self.os == Os::Linux
    }

    /// Whether this is macOS.
    pub fn is_macos(&self) -> bool {
        self.os == Os::MacOs
    }

    /// Package-manager family implied by the flavour, if known.
    #[must_use]
    pub fn pkg_family(&self) -> Option<&'static str> {
        match self.os {
            Os::MacOs => Some("brew"),
            Os::Windows => None,
            Os::Linux => match self.flavour.as_deref()? {
                "ubuntu" | "debian" | "linuxmint" | "pop" => Some("apt"),
                "fedora" | "centos" | "rhel" | "rocky" | "almalinux" => Some("yum"),
                "arch" | "manjaro" | "endeavouros" => Some("pacman"),
                "alpine" => Some("apk"),
                "opensuse" | "opensuse-leap" | "opensuse-tumbleweed" => Some("zypper"),
                _ => None,
            },
        }
    }

    fn detect_os() -> Os {
        if cfg!(target_os = "macos") {
            Os::MacOs
        } else if cfg!(target_os = "windows") {
            Os::Windows
        } else {
            // Other Unix-likes are treated as Linux.
            Os::Linux
        }
    }
}

impl HostInfo for Platform {
    fn system(&self) -> SystemTag {
        SystemTag::new(self.os.tag())
    }

    fn match_list(&self) -> Vec<SystemTag> {
        let mut tags: Vec<SystemTag> = [
            self.codename.as_deref(),
            self.flavour.as_deref(),
            self.pkg_family(),
            Some(self.os.tag()),
        ]
        .into_iter()
        .flatten()
        .map(SystemTag::new)
        .collect();
        tags.dedup();
        tags
    }
}

/// Extract `ID` and `VERSION_CODENAME` from `/etc/os-release` content.
fn parse_os_release(content: &str) -> (Option<String>, Option<String>) {
    let mut id = None;
    let mut codename = None;
    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "ID" => id = Some(value.to_ascii_lowercase()),
            "VERSION_CODENAME" => codename = Some(value.to_ascii_lowercase()),
            _ => {}
        }
    }
    (id, codename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_detect_returns_valid() {
        let p = Platform::detect();
        assert!(!p.match_list().is_empty());
    }

    #[test]
    fn match_list_is_most_specific_first() {
        let p = Platform::new(Os::Linux, Some("Ubuntu"), Some("jammy"));
        let tags: Vec<String> = p.match_list().iter().map(ToString::to_string).collect();
        assert_eq!(tags, vec!["jammy", "ubuntu", "apt", "linux"]);
    }

    #[test]
    fn macos_match_list() {
        let p = Platform::new(Os::MacOs, None, None);
        let tags: Vec<String> = p.match_list().iter().map(ToString::to_string).collect();
        assert_eq!(tags, vec!["brew", "osx"]);
        assert_eq!(p.system(), SystemTag::new("osx"));
    }

    #[test]
    fn unknown_flavour_has_no_pkg_family() {
        let p = Platform::new(Os::Linux, Some("gentoo"), None);
        assert_eq!(p.pkg_family(), None);
        let tags: Vec<String> = p.match_list().iter().map(ToString::to_string).collect();
        assert_eq!(tags, vec!["gentoo", "linux"]);
    }

    #[test]
    fn parse_os_release_reads_quoted_values() {
        let content = "NAME=\"Ubuntu\"\nID=ubuntu\nVERSION_CODENAME=\"jammy\"\nID_LIKE=debian\n";
        let (id, codename) = parse_os_release(content);
        assert_eq!(id.as_deref(), Some("ubuntu"));
        assert_eq!(codename.as_deref(), Some("jammy"));
    }

    #[test]
    fn parse_os_release_skips_empty_codename() {
        let (id, codename) = parse_os_release("ID=arch\nVERSION_CODENAME=\n");
        assert_eq!(id.as_deref(), Some("arch"));
        assert_eq!(codename, None);
    }

    #[test]
    fn system_tags_are_case_insensitive() {
        assert_eq!(SystemTag::new("OSX"), SystemTag::from("osx"));
    }

    #[test]
    fn description_joins_match_list() {
        let p = Platform::new(Os::Linux, Some("arch"), None);
        assert_eq!(p.description(), "arch pacman linux");
    }

    #[test]
    fn os_display() {
        assert_eq!(Os::Linux.to_string(), "linux");
        assert_eq!(Os::MacOs.to_string(), "osx");
        assert_eq!(Os::Windows.to_string(), "windows");
    }
}
