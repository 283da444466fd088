//! Static SDK bundles and their cache layout.

use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

use crate::error::DependencyError;
use crate::model::{Os, Triplet};

/// Download path template, relative to the mirror base URL
pub const URL_TEMPLATE: &str = "${kind}/${kind}-${target}-${version}.zip";

const RUNTIME_MEMBERS: &[&str] = &[
    "lib/libjava.a",
    "lib/libnet.a",
    "lib/libnio.a",
    "lib/libzip.a",
    "lib/libprefs.a",
];

const WINDOWS_RUNTIME_MEMBERS: &[&str] = &[
    "lib/java.lib",
    "lib/net.lib",
    "lib/nio.lib",
    "lib/zip.lib",
    "lib/prefs.lib",
];

const UI_TOOLKIT_MEMBERS: &[&str] = &[
    "lib/javafx.base.jar",
    "lib/javafx.controls.jar",
    "lib/javafx.graphics.jar",
    "lib/javafx.fxml.jar",
    "lib/javafx.media.jar",
    "lib/javafx.web.jar",
];

/// Kinds of prebuilt static SDK the linker may need
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BundleKind {
    /// Static runtime libraries
    RuntimeStatic,
    /// Static UI toolkit SDK
    UiToolkitStatic,
}

impl BundleKind {
    /// Name used in cache paths and URLs
    pub fn slug(&self) -> &'static str {
        match self {
            BundleKind::RuntimeStatic => "staticjdk",
            BundleKind::UiToolkitStatic => "javafxstaticsdk",
        }
    }

    /// Files that must be present for the bundle to be usable on `os`,
    /// relative to the bundle directory
    pub fn members(&self, os: Os) -> &'static [&'static str] {
        match (self, os) {
            (BundleKind::RuntimeStatic, Os::Windows) => WINDOWS_RUNTIME_MEMBERS,
            (BundleKind::RuntimeStatic, _) => RUNTIME_MEMBERS,
            (BundleKind::UiToolkitStatic, _) => UI_TOOLKIT_MEMBERS,
        }
    }
}

impl fmt::Display for BundleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundleKind::RuntimeStatic => f.write_str("runtime static SDK"),
            BundleKind::UiToolkitStatic => f.write_str("UI toolkit static SDK"),
        }
    }
}

/// One versioned bundle for one target, located in the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    kind: BundleKind,
    version: String,
    os: Os,
    dir_key: String,
    file_key: String,
    version_dir: PathBuf,
}

impl Bundle {
    /// Locate a bundle under `cache_root`
    pub fn new(kind: BundleKind, version: &str, target: &Triplet, cache_root: &Path) -> Self {
        Self {
            kind,
            version: version.to_string(),
            os: target.os(),
            dir_key: target.arch_os(),
            file_key: target.os_arch(),
            version_dir: cache_root.join(kind.slug()).join(version),
        }
    }

    /// Bundle kind
    pub fn kind(&self) -> BundleKind {
        self.kind
    }

    /// Bundle version
    pub fn version(&self) -> &str {
        &self.version
    }

    /// `<cache>/<kind>/<version>/<arch-os>`
    pub fn dir(&self) -> PathBuf {
        self.version_dir.join(&self.dir_key)
    }

    /// Directory holding the linkable members
    pub fn lib_dir(&self) -> PathBuf {
        self.dir().join("lib")
    }

    /// `<cache>/<kind>/<version>/<kind>-<os-arch>.md5`
    pub fn checksum_file(&self) -> PathBuf {
        self.version_dir
            .join(format!("{}-{}.md5", self.kind.slug(), self.file_key))
    }

    /// Where the downloaded archive is kept while extracting
    pub fn archive_path(&self) -> PathBuf {
        self.version_dir.join(format!(
            "{}-{}-{}.zip",
            self.kind.slug(),
            self.file_key,
            self.version
        ))
    }

    /// Members as (relative key, absolute path)
    pub fn member_paths(&self) -> Vec<(&'static str, PathBuf)> {
        let dir = self.dir();
        self.kind
            .members(self.os)
            .iter()
            .map(|member| (*member, dir.join(member)))
            .collect()
    }

    /// Download URL under `base`, filled in from [`URL_TEMPLATE`]
    pub fn url(&self, base: &Url) -> Result<Url, DependencyError> {
        let relative = substitute(
            URL_TEMPLATE,
            &[
                ("kind", self.kind.slug()),
                ("target", &self.file_key),
                ("version", &self.version),
            ],
        );
        base.join(&relative).map_err(|source| DependencyError::InvalidUrl {
            url: format!("{base}{relative}"),
            source,
        })
    }
}

impl fmt::Display for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.kind, self.version, self.file_key)
    }
}

/// Replace `${name}` placeholders
fn substitute(template: &str, values: &[(&str, &str)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |acc, (name, value)| {
            acc.replace(&format!("${{{name}}}"), value)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Profile;

    fn runtime_bundle() -> Bundle {
        Bundle::new(
            BundleKind::RuntimeStatic,
            "15-ea+3",
            &Triplet::from_profile(Profile::Linux),
            Path::new("/cache"),
        )
    }

    #[test]
    fn cache_layout() {
        let bundle = runtime_bundle();
        assert_eq!(bundle.dir(), Path::new("/cache/staticjdk/15-ea+3/x86_64-linux"));
        assert_eq!(
            bundle.lib_dir(),
            Path::new("/cache/staticjdk/15-ea+3/x86_64-linux/lib")
        );
        assert_eq!(
            bundle.checksum_file(),
            Path::new("/cache/staticjdk/15-ea+3/staticjdk-linux-x86_64.md5")
        );
    }

    #[test]
    fn url_is_derived_from_template() {
        let base = Url::parse("https://download2.gluonhq.com/substrate/").unwrap();
        let url = runtime_bundle().url(&base).unwrap();
        assert_eq!(
            url.as_str(),
            "https://download2.gluonhq.com/substrate/staticjdk/staticjdk-linux-x86_64-15-ea+3.zip"
        );
    }

    #[test]
    fn ui_toolkit_members_are_jars() {
        assert!(
            BundleKind::UiToolkitStatic
                .members(Os::Linux)
                .iter()
                .all(|m| m.starts_with("lib/") && m.ends_with(".jar"))
        );
        assert_eq!(BundleKind::RuntimeStatic.members(Os::Linux).len(), 5);
        assert!(
            BundleKind::RuntimeStatic
                .members(Os::Windows)
                .iter()
                .all(|m| m.ends_with(".lib"))
        );
    }
}
