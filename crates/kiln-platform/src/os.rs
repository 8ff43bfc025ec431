//! Operating system detection.

/// Operating systems an image can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    Linux,
    Windows,
    Darwin,
    FreeBsd,
    Unknown,
}

impl Os {
    pub fn from_name(name: &str) -> Self {
        match name {
            "linux" => Self::Linux,
            "windows" => Self::Windows,
            "macos" | "darwin" => Self::Darwin,
            "freebsd" => Self::FreeBsd,
            _ => Self::Unknown,
        }
    }

    /// OCI operating system name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Windows => "windows",
            Self::Darwin => "darwin",
            Self::FreeBsd => "freebsd",
            Self::Unknown => "unknown",
        }
    }
}

/// Detect current operating system.
pub fn detect() -> Os {
    Os::from_name(std::env::consts::OS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macos_is_darwin() {
        assert_eq!(Os::from_name("macos").name(), "darwin");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn detects_linux() {
        assert_eq!(detect(), Os::Linux);
    }
}
