//! Build directory layout for one target.

use std::path::{Path, PathBuf};

use crate::error::{ErrorExt, FsError};

use super::triplet::Triplet;

/// Directories used while building for one target.
///
/// ```text
/// <build-root>/<arch-os>/           application dir, linked output
/// <build-root>/<arch-os>/gvm/       compiler working dir, directive files
/// <build-root>/<arch-os>/gvm/tmp/   compiler temp dir (object files)
/// <build-root>/<arch-os>/gvm/log/   process logs
/// <build-root>/<arch-os>/gensrc/    generated sources
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessPaths {
    build_root: PathBuf,
    app: PathBuf,
    gvm: PathBuf,
    tmp: PathBuf,
    log: PathBuf,
    gen_src: PathBuf,
}

impl ProcessPaths {
    /// Compute the layout without touching the filesystem
    pub fn new(build_root: impl Into<PathBuf>, target: &Triplet) -> Self {
        let build_root = build_root.into();
        let app = build_root.join(target.arch_os());
        let gvm = app.join("gvm");
        Self {
            tmp: gvm.join("tmp"),
            log: gvm.join("log"),
            gen_src: app.join("gensrc"),
            build_root,
            app,
            gvm,
        }
    }

    /// Create every directory of the layout
    pub fn create(&self) -> Result<(), FsError> {
        for dir in [&self.tmp, &self.log, &self.gen_src] {
            std::fs::create_dir_all(dir).fs_context("creating build directory", dir)?;
        }
        Ok(())
    }

    /// Build root shared by all targets
    pub fn build_root(&self) -> &Path {
        &self.build_root
    }

    /// Per-target application directory
    pub fn app(&self) -> &Path {
        &self.app
    }

    /// Compiler working directory
    pub fn gvm(&self) -> &Path {
        &self.gvm
    }

    /// Compiler temp directory
    pub fn tmp(&self) -> &Path {
        &self.tmp
    }

    /// Process log directory
    pub fn log(&self) -> &Path {
        &self.log
    }

    /// Generated sources
    pub fn gen_src(&self) -> &Path {
        &self.gen_src
    }
}
