//! Build-target description.
//!
//! A [`Target`] is a pure value describing the host or a requested build
//! target. Construction never fails: unrecognized triple components degrade
//! to `Unknown` and the derived queries fall back to defaults.

/// Processor architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X86_64,
    Aarch64,
    Arm,
    Riscv64,
    Unknown,
}

impl Arch {
    pub fn name(self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
            Arch::Arm => "arm",
            Arch::Riscv64 => "riscv64",
            Arch::Unknown => "unknown",
        }
    }
}

/// Operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    Linux,
    Macos,
    Windows,
    Freebsd,
    Unknown,
}

impl Os {
    pub fn name(self) -> &'static str {
        match self {
            Os::Linux => "linux",
            Os::Macos => "macos",
            Os::Windows => "windows",
            Os::Freebsd => "freebsd",
            Os::Unknown => "unknown",
        }
    }
}

/// ABI / environment component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abi {
    None,
    Gnu,
    Msvc,
    Mingw,
    Musl,
    Unknown,
}

impl Abi {
    pub fn name(self) -> &'static str {
        match self {
            Abi::None => "none",
            Abi::Gnu => "gnu",
            Abi::Msvc => "msvc",
            Abi::Mingw => "mingw",
            Abi::Musl => "musl",
            Abi::Unknown => "unknown",
        }
    }
}

/// An immutable target descriptor: architecture, OS, ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub arch: Arch,
    pub os: Os,
    pub abi: Abi,
}

impl Target {
    pub fn new(arch: Arch, os: Os, abi: Abi) -> Self {
        Target { arch, os, abi }
    }

    /// Parse a canonical triple like `x86_64-unknown-linux-gnu` or
    /// `aarch64-apple-darwin`. Unrecognized components become `Unknown`.
    pub fn from_triple(triple: &str) -> Self {
        let parts: Vec<&str> = triple.split('-').collect();

        let arch = match parts.first().copied() {
            Some("x86_64") | Some("amd64") => Arch::X86_64,
            Some("aarch64") | Some("arm64") => Arch::Aarch64,
            Some("arm") | Some("armv7") => Arch::Arm,
            Some("riscv64") | Some("riscv64gc") => Arch::Riscv64,
            _ => Arch::Unknown,
        };

        let mut os = Os::Unknown;
        for part in &parts[1.min(parts.len())..] {
            os = match *part {
                "linux" => Os::Linux,
                "windows" => Os::Windows,
                "freebsd" => Os::Freebsd,
                "macos" | "macosx" | "darwin" | "ios" => Os::Macos,
                _ => continue,
            };
            break;
        }

        let mut abi = Abi::None;
        if let Some(last) = parts.last() {
            abi = match *last {
                "gnu" => Abi::Gnu,
                "msvc" => Abi::Msvc,
                "mingw" => Abi::Mingw,
                "musl" => Abi::Musl,
                _ => Abi::None,
            };
        }

        Target { arch, os, abi }
    }

    /// The compiling host as a target.
    pub fn host() -> Self {
        let arch = if cfg!(target_arch = "x86_64") {
            Arch::X86_64
        } else if cfg!(target_arch = "aarch64") {
            Arch::Aarch64
        } else if cfg!(target_arch = "arm") {
            Arch::Arm
        } else if cfg!(target_arch = "riscv64") {
            Arch::Riscv64
        } else {
            Arch::Unknown
        };

        let os = if cfg!(target_os = "linux") {
            Os::Linux
        } else if cfg!(target_os = "macos") {
            Os::Macos
        } else if cfg!(target_os = "windows") {
            Os::Windows
        } else if cfg!(target_os = "freebsd") {
            Os::Freebsd
        } else {
            Os::Unknown
        };

        let abi = if cfg!(target_env = "gnu") {
            Abi::Gnu
        } else if cfg!(target_env = "musl") {
            Abi::Musl
        } else if cfg!(target_env = "msvc") {
            Abi::Msvc
        } else {
            Abi::None
        };

        Target { arch, os, abi }
    }

    /// Pointer width in bytes. 32-bit arm is the only 4-byte target in
    /// scope; unknown architectures default to 8.
    pub fn pointer_size(&self) -> u32 {
        match self.arch {
            Arch::X86_64 | Arch::Aarch64 | Arch::Riscv64 => 8,
            Arch::Arm => 4,
            Arch::Unknown => 8,
        }
    }

    pub fn pointer_alignment(&self) -> u32 {
        self.pointer_size()
    }

    pub fn requires_pic(&self) -> bool {
        self.os == Os::Windows || self.abi == Abi::Gnu
    }

    pub fn requires_pie(&self) -> bool {
        self.os == Os::Macos
    }

    pub fn requires_libc(&self) -> bool {
        matches!(self.os, Os::Macos | Os::Freebsd)
    }

    pub fn can_dynamic_link(&self) -> bool {
        true
    }

    pub fn uses_c_abi(&self) -> bool {
        true
    }

    /// The C library the target links against.
    pub fn libc_name(&self) -> &'static str {
        if self.os == Os::Windows {
            "mingw"
        } else if self.os == Os::Macos {
            "darwin"
        } else if matches!(self.abi, Abi::Gnu | Abi::Mingw) {
            "glibc"
        } else if self.abi == Abi::Musl {
            "musl"
        } else if self.abi == Abi::Msvc {
            "msvcrt"
        } else {
            "unknown"
        }
    }

    /// Canonical triple string: `<arch>-unknown-<os>[-<env>]`. The env
    /// component is `gnu` for both gnu and mingw, `msvc`, or `musl`; macos
    /// and the remaining ABIs omit it.
    pub fn to_triple_string(&self) -> String {
        let env = match self.abi {
            Abi::Gnu | Abi::Mingw => Some("gnu"),
            Abi::Msvc => Some("msvc"),
            Abi::Musl => Some("musl"),
            Abi::None | Abi::Unknown => None,
        };
        let env = if self.os == Os::Macos { None } else { env };
        match env {
            Some(env) => format!("{}-unknown-{}-{}", self.arch.name(), self.os.name(), env),
            None => format!("{}-unknown-{}", self.arch.name(), self.os.name()),
        }
    }

    /// Human-readable name: `<arch>-<os>[-<abi>]`, the ABI suffix omitted
    /// for none/unknown.
    pub fn name(&self) -> String {
        match self.abi {
            Abi::None | Abi::Unknown => format!("{}-{}", self.arch.name(), self.os.name()),
            abi => format!("{}-{}-{}", self.arch.name(), self.os.name(), abi.name()),
        }
    }
}
