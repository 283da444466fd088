//! Dependency provisioning.
//!
//! [`FileDeps::ensure`] makes sure every static SDK bundle the link step
//! needs is present in the local cache and matches the checksums recorded
//! when it was extracted. Missing, incomplete or drifted bundles are fetched
//! again from the mirror.
//!
//! A bundle is valid only when its directory exists and holds every
//! expected member. With hash checking on it must also have a checksum
//! side-file (written last, after a complete extraction, and removed before
//! a new fetch starts) whose recorded checksums match every member.

pub mod bundle;
pub mod checksum;
pub mod http;

use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

use crate::error::{DependencyError, ErrorExt};
use crate::model::{BuildConfiguration, Os};

pub use bundle::{Bundle, BundleKind};

/// Outcome of validating one cached bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validity {
    /// Present and matching its recorded checksums
    Valid,
    /// Bundle directory does not exist
    MissingDirectory,
    /// A member file is absent
    MissingMember(String),
    /// Hash checking is on and there is no checksum side-file, so the last
    /// extraction never finished
    MissingChecksums,
    /// A member's checksum is unknown or differs from the recorded one
    ChecksumMismatch(String),
}

impl Validity {
    /// Whether the bundle can be used as is
    pub fn is_valid(&self) -> bool {
        matches!(self, Validity::Valid)
    }
}

impl fmt::Display for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validity::Valid => f.write_str("valid"),
            Validity::MissingDirectory => f.write_str("not downloaded"),
            Validity::MissingMember(member) => write!(f, "missing {member}"),
            Validity::MissingChecksums => f.write_str("incomplete extraction"),
            Validity::ChecksumMismatch(member) => write!(f, "{member} changed since extraction"),
        }
    }
}

/// One bundle as provisioned for linking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedBundle {
    /// Bundle kind
    pub kind: BundleKind,
    /// Directory to pass to the linker
    pub lib_dir: PathBuf,
    /// Whether it had to be downloaded during this call
    pub fetched: bool,
}

/// What [`FileDeps::ensure`] did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    /// Bundles in link order
    pub bundles: Vec<ProvisionedBundle>,
}

impl ProvisionReport {
    /// Library directories in link order
    pub fn lib_dirs(&self) -> Vec<PathBuf> {
        self.bundles.iter().map(|b| b.lib_dir.clone()).collect()
    }

    /// Whether any bundle was downloaded
    pub fn fetched_any(&self) -> bool {
        self.bundles.iter().any(|b| b.fetched)
    }
}

/// Local cache of static SDK bundles
#[derive(Debug, Clone)]
pub struct FileDeps {
    cache_root: PathBuf,
    download_url: Url,
}

impl FileDeps {
    /// Cache rooted where the configuration says
    pub fn new(config: &BuildConfiguration) -> Self {
        Self {
            cache_root: config.cache_root().to_path_buf(),
            download_url: config.download_url().clone(),
        }
    }

    /// Root of the cache
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Bundles the configuration needs downloaded.
    ///
    /// The runtime bundle is skipped when a custom runtime location is set.
    pub fn required_bundles(&self, config: &BuildConfiguration) -> Vec<Bundle> {
        let mut bundles = Vec::new();
        if config.use_jni() && config.custom_runtime_libs().is_none() {
            bundles.push(Bundle::new(
                BundleKind::RuntimeStatic,
                config.runtime_version(),
                config.target(),
                &self.cache_root,
            ));
        }
        if config.use_ui_toolkit() {
            bundles.push(Bundle::new(
                BundleKind::UiToolkitStatic,
                config.ui_toolkit_version(),
                config.target(),
                &self.cache_root,
            ));
        }
        bundles
    }

    /// Make every required bundle available and valid.
    ///
    /// Idempotent: a second call on a valid cache performs no download.
    pub async fn ensure(
        &self,
        config: &BuildConfiguration,
    ) -> Result<ProvisionReport, DependencyError> {
        let mut report = ProvisionReport::default();

        if config.use_jni()
            && let Some(custom) = config.custom_runtime_libs()
        {
            check_custom_runtime(custom, config.target().os())?;
            log::info!("Using runtime static libraries from {}", custom.display());
            report.bundles.push(ProvisionedBundle {
                kind: BundleKind::RuntimeStatic,
                lib_dir: custom.to_path_buf(),
                fetched: false,
            });
        }

        for bundle in self.required_bundles(config) {
            let fetched = self.ensure_bundle(&bundle, config.check_hash()).await?;
            report.bundles.push(ProvisionedBundle {
                kind: bundle.kind(),
                lib_dir: bundle.lib_dir(),
                fetched,
            });
        }

        Ok(report)
    }

    /// Validate one bundle, fetching it when invalid. Returns whether it was fetched.
    async fn ensure_bundle(&self, bundle: &Bundle, check_hash: bool) -> Result<bool, DependencyError> {
        let validity = self.validate(bundle, check_hash).await;
        if validity.is_valid() {
            log::debug!("{} is up to date in {}", bundle, bundle.dir().display());
            return Ok(false);
        }

        log::info!("{} is {}, fetching", bundle, validity);
        self.fetch(bundle).await?;

        let validity = self.validate(bundle, check_hash).await;
        if !validity.is_valid() {
            return Err(DependencyError::StillInvalid {
                bundle: bundle.to_string(),
                reason: validity.to_string(),
            });
        }
        Ok(true)
    }

    /// Check a cached bundle against its recorded checksums
    pub async fn validate(&self, bundle: &Bundle, check_hash: bool) -> Validity {
        if !bundle.dir().is_dir() {
            return Validity::MissingDirectory;
        }

        let members = bundle.member_paths();
        if let Some((member, _)) = members.iter().find(|(_, path)| !path.is_file()) {
            return Validity::MissingMember(member.to_string());
        }

        if check_hash {
            let Some(recorded) = checksum::load(&bundle.checksum_file()).await else {
                return Validity::MissingChecksums;
            };
            for (member, path) in &members {
                let current = checksum::file_checksum(path).await;
                let expected = recorded.get(*member);
                match (current, expected) {
                    (Some(current), Some(expected)) if current == *expected => {}
                    _ => return Validity::ChecksumMismatch(member.to_string()),
                }
            }
        }

        Validity::Valid
    }

    /// Download and extract a bundle, recording checksums last
    async fn fetch(&self, bundle: &Bundle) -> Result<(), DependencyError> {
        let url = bundle.url(&self.download_url)?;
        let checksum_file = bundle.checksum_file();

        // A fetch that dies part way must not leave an old side-file behind.
        checksum::remove(&checksum_file).await?;

        let archive = bundle.archive_path();
        http::download_to_file(&url, &archive).await?;

        let dest = bundle.dir();
        tokio::fs::create_dir_all(&dest)
            .await
            .fs_context("creating bundle directory", &dest)?;
        let checksums = http::extract_zip(&archive, &dest).await?;

        checksum::persist(&checksum_file, &checksums).await?;

        if let Err(e) = tokio::fs::remove_file(&archive).await {
            log::debug!("Could not remove {}: {}", archive.display(), e);
        }

        log::info!("Provisioned {} in {}", bundle, dest.display());
        Ok(())
    }
}

/// A user-supplied runtime directory must hold the runtime members directly.
fn check_custom_runtime(dir: &Path, os: Os) -> Result<(), DependencyError> {
    if !dir.is_dir() {
        return Err(DependencyError::CustomLibsMissing {
            path: dir.to_path_buf(),
            member: "the directory itself".to_string(),
        });
    }
    for member in BundleKind::RuntimeStatic.members(os) {
        let file_name = member.trim_start_matches("lib/");
        if !dir.join(file_name).is_file() {
            return Err(DependencyError::CustomLibsMissing {
                path: dir.to_path_buf(),
                member: file_name.to_string(),
            });
        }
    }
    Ok(())
}
