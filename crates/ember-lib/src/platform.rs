/// Platform probing for rule evaluation and argument synthesis.
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsType {
    Windows,
    Osx,
    Linux,
}

impl OsType {
    /// Detect the host platform. Anything that is neither Windows nor
    /// macOS reports as linux, matching the version-manifest vocabulary.
    pub fn current() -> Self {
        #[cfg(target_os = "windows")]
        return OsType::Windows;

        #[cfg(target_os = "macos")]
        return OsType::Osx;

        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        return OsType::Linux;
    }

    /// OS tag as it appears in manifest rules and native classifiers.
    pub fn name(&self) -> &'static str {
        match self {
            OsType::Windows => "windows",
            OsType::Osx => "osx",
            OsType::Linux => "linux",
        }
    }

    /// Separator between `-cp` entries.
    pub fn classpath_separator(&self) -> &'static str {
        match self {
            OsType::Windows => ";",
            OsType::Osx | OsType::Linux => ":",
        }
    }

    /// Platform-specific JVM flag. `minor` is the minor component of the
    /// descriptor id ("1.19.2" -> 19); on osx the flag only applies to
    /// versions newer than 1.12.
    pub fn jvm_extra_flag(&self, minor: u32) -> Option<&'static str> {
        match self {
            OsType::Windows => Some(
                "-XX:HeapDumpPath=MojangTricksIntelDriversForPerformance_javaw.exe_minecraft.exe.heapdump",
            ),
            OsType::Osx => (minor > 12).then_some("-XstartOnFirstThread"),
            OsType::Linux => Some("-Xss1M"),
        }
    }
}

/// Pointer-width tag used by `${arch}` templates in native classifier maps.
pub fn arch_bits() -> &'static str {
    match env::consts::ARCH {
        "x86" | "i386" | "arm" | "armv7l" => "32",
        _ => "64",
    }
}
