use std::fmt;

use once_cell::sync::Lazy;

use crate::arch::{self, Arch};
use crate::os::{self, Os};

static HOST: Lazy<Platform> = Lazy::new(|| Platform::new(os::detect(), arch::detect()));

/// An `os/arch[/variant]` platform identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    pub fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// The platform this process runs on.
    pub fn host() -> Self {
        *HOST
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os.name(), self.arch.name())?;
        if let Some(variant) = self.arch.variant() {
            write!(f, "/{variant}")?;
        }
        Ok(())
    }
}

/// Host platform formatted for a build request, e.g. `linux/amd64`.
pub fn default_string() -> String {
    Platform::host().to_string()
}
