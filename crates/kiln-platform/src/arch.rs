//! Architecture detection.

/// CPU architecture, named the way OCI image indexes name it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    I386,
    Amd64,
    Arm { variant: ArmVariant },
    Arm64,
    Ppc64le,
    S390x,
    Riscv64,
    Unknown,
}

/// 32-bit ARM revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmVariant {
    V6,
    V7,
}

impl Arch {
    /// Map a kernel/machine architecture name (`uname -m` style) to an OCI architecture.
    pub fn from_machine(machine: &str) -> Self {
        match machine {
            "i386" | "i586" | "i686" | "x86" => Self::I386,
            "x86_64" | "amd64" => Self::Amd64,
            "armv6l" | "armv6" => Self::Arm {
                variant: ArmVariant::V6,
            },
            "arm" | "armv7l" | "armv7" | "armhf" => Self::Arm {
                variant: ArmVariant::V7,
            },
            "aarch64" | "arm64" => Self::Arm64,
            "ppc64le" => Self::Ppc64le,
            "s390x" => Self::S390x,
            "riscv64" => Self::Riscv64,
            _ => Self::Unknown,
        }
    }

    /// OCI architecture name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::I386 => "386",
            Self::Amd64 => "amd64",
            Self::Arm { .. } => "arm",
            Self::Arm64 => "arm64",
            Self::Ppc64le => "ppc64le",
            Self::S390x => "s390x",
            Self::Riscv64 => "riscv64",
            Self::Unknown => "unknown",
        }
    }

    pub fn variant(&self) -> Option<&'static str> {
        match self {
            Self::Arm {
                variant: ArmVariant::V6,
            } => Some("v6"),
            Self::Arm {
                variant: ArmVariant::V7,
            } => Some("v7"),
            _ => None,
        }
    }
}

/// Detect current architecture.
pub fn detect() -> Arch {
    let cpu_arch = sysinfo::System::cpu_arch();
    match Arch::from_machine(cpu_arch.as_str()) {
        // Some kernels do not report a machine name; fall back to the compile target.
        Arch::Unknown => Arch::from_machine(std::env::consts::ARCH),
        arch => arch,
    }
}
