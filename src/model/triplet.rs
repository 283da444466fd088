//! Target identity: architecture, vendor and operating system.
//!
//! A [`Triplet`] names both the machine the driver runs on (the host) and the
//! machine the native image is built for (the target). Named [`Profile`]s
//! cover the supported combinations.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// CPU architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    /// 64-bit x86
    Amd64,
    /// 64-bit ARM as named by Apple toolchains
    Arm64,
    /// 64-bit ARM as named by GNU toolchains
    Aarch64,
}

impl Arch {
    /// Name used in triplets and directory keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::Amd64 => "x86_64",
            Arch::Arm64 => "arm64",
            Arch::Aarch64 => "aarch64",
        }
    }

    /// Whether this is one of the 64-bit ARM spellings
    pub fn is_arm(&self) -> bool {
        matches!(self, Arch::Arm64 | Arch::Aarch64)
    }
}

/// Toolchain vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    /// GNU/Linux toolchains
    Linux,
    /// Apple toolchains
    Apple,
    /// Microsoft toolchains
    Microsoft,
}

impl Vendor {
    /// Name used in triplets
    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::Linux => "linux",
            Vendor::Apple => "apple",
            Vendor::Microsoft => "microsoft",
        }
    }
}

/// Operating system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    /// Linux desktop
    Linux,
    /// macOS
    Darwin,
    /// Windows
    Windows,
    /// iOS devices and simulator
    Ios,
    /// Android
    Android,
}

impl Os {
    /// Name used in triplets and directory keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Linux => "linux",
            Os::Darwin => "darwin",
            Os::Windows => "windows",
            Os::Ios => "ios",
            Os::Android => "android",
        }
    }

    /// Whether the OS is a mobile platform
    pub fn is_mobile(&self) -> bool {
        matches!(self, Os::Ios | Os::Android)
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named target profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Profile {
    /// x86_64-linux-linux
    Linux,
    /// aarch64-linux-linux
    LinuxAarch64,
    /// x86_64-apple-darwin
    MacOs,
    /// x86_64-microsoft-windows
    Windows,
    /// arm64-apple-ios
    Ios,
    /// x86_64-apple-ios
    IosSim,
    /// aarch64-linux-android
    Android,
}

impl Profile {
    /// Every profile, in display order
    pub const ALL: [Profile; 7] = [
        Profile::Linux,
        Profile::LinuxAarch64,
        Profile::MacOs,
        Profile::Windows,
        Profile::Ios,
        Profile::IosSim,
        Profile::Android,
    ];

    /// Profile name as accepted on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Profile::Linux => "linux",
            Profile::LinuxAarch64 => "linux-aarch64",
            Profile::MacOs => "macos",
            Profile::Windows => "windows",
            Profile::Ios => "ios",
            Profile::IosSim => "ios-sim",
            Profile::Android => "android",
        }
    }
}

impl FromStr for Profile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Profile::ALL
            .into_iter()
            .find(|profile| profile.name() == normalized)
            .ok_or_else(|| ConfigError::UnknownProfile {
                name: s.to_string(),
            })
    }
}

/// Architecture, vendor and operating system of a build host or target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Triplet {
    arch: Arch,
    vendor: Vendor,
    os: Os,
}

impl Triplet {
    /// Create a triplet from its parts
    pub const fn new(arch: Arch, vendor: Vendor, os: Os) -> Self {
        Self { arch, vendor, os }
    }

    /// Triplet for a named profile
    pub const fn from_profile(profile: Profile) -> Self {
        match profile {
            Profile::Linux => Self::new(Arch::Amd64, Vendor::Linux, Os::Linux),
            Profile::LinuxAarch64 => Self::new(Arch::Aarch64, Vendor::Linux, Os::Linux),
            Profile::MacOs => Self::new(Arch::Amd64, Vendor::Apple, Os::Darwin),
            Profile::Windows => Self::new(Arch::Amd64, Vendor::Microsoft, Os::Windows),
            Profile::Ios => Self::new(Arch::Arm64, Vendor::Apple, Os::Ios),
            Profile::IosSim => Self::new(Arch::Amd64, Vendor::Apple, Os::Ios),
            Profile::Android => Self::new(Arch::Aarch64, Vendor::Linux, Os::Android),
        }
    }

    /// Triplet of the machine the driver runs on
    pub fn from_host() -> Result<Self, ConfigError> {
        Self::from_os_name(std::env::consts::OS)
    }

    /// Resolve a host operating system name to its desktop profile.
    ///
    /// Matching is by substring so both `"macos"` and `"Mac OS X"` resolve,
    /// and `"linux"` as well as `"GNU/Linux"` map to Linux.
    ///
    /// # Examples
    ///
    /// ```
    /// use kodegen_bundler_native::model::{Os, Triplet};
    ///
    /// let triplet = Triplet::from_os_name("Mac OS X").unwrap();
    /// assert_eq!(triplet.os(), Os::Darwin);
    /// assert!(Triplet::from_os_name("freebsd").is_err());
    /// ```
    pub fn from_os_name(name: &str) -> Result<Self, ConfigError> {
        let lower = name.to_ascii_lowercase();
        let profile = if lower.contains("mac") {
            Profile::MacOs
        } else if lower.contains("nux") {
            Profile::Linux
        } else if lower.contains("windows") {
            Profile::Windows
        } else {
            return Err(ConfigError::UnsupportedPlatform {
                os: name.to_string(),
            });
        };
        Ok(Self::from_profile(profile))
    }

    /// Resolve an optional profile name; `None` and `"host"` mean the host.
    pub fn resolve(profile: Option<&str>) -> Result<Self, ConfigError> {
        match profile.map(str::trim) {
            None | Some("") | Some("host") => Self::from_host(),
            Some(name) => Ok(Self::from_profile(name.parse()?)),
        }
    }

    /// Architecture
    pub fn arch(&self) -> Arch {
        self.arch
    }

    /// Vendor
    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    /// Operating system
    pub fn os(&self) -> Os {
        self.os
    }

    /// `arch-os` key used for bundle and build directories, e.g. `x86_64-linux`
    pub fn arch_os(&self) -> String {
        format!("{}-{}", self.arch.as_str(), self.os.as_str())
    }

    /// `os-arch` key, e.g. `linux-x86_64`
    pub fn os_arch(&self) -> String {
        format!("{}-{}", self.os.as_str(), self.arch.as_str())
    }

    /// Whether a host with this triplet can produce images for `target`.
    ///
    /// Same-OS builds are always allowed; macOS additionally builds iOS
    /// and Linux additionally builds Android.
    pub fn can_compile_to(&self, target: &Triplet) -> bool {
        self.os == target.os
            || matches!(
                (self.os, target.os),
                (Os::Darwin, Os::Ios) | (Os::Linux, Os::Android)
            )
    }
}

impl fmt::Display for Triplet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.arch.as_str(),
            self.vendor.as_str(),
            self.os.as_str()
        )
    }
}
