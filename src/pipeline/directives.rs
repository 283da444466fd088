//! Compiler directive files.
//!
//! Reflection and JNI registrations are written as JSON configuration files
//! next to the compiler's working directory and referenced from the
//! command line; the remaining directives become plain flags.

use std::path::Path;

use serde::Serialize;

use crate::error::{ErrorExt, PipelineError};
use crate::model::{ClassPath, CompileDirectives, Triplet};

/// Supplies compiler directives for a classpath.
///
/// The default source returns the directives from the configuration;
/// classpath scanners plug in here.
pub trait DirectiveSource: Send + Sync {
    /// Directives for compiling `classpath`
    fn directives(&self, classpath: &ClassPath) -> CompileDirectives;
}

impl DirectiveSource for CompileDirectives {
    fn directives(&self, _classpath: &ClassPath) -> CompileDirectives {
        self.clone()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassEntry<'a> {
    name: &'a str,
    all_declared_constructors: bool,
    all_public_constructors: bool,
    all_declared_fields: bool,
    all_public_fields: bool,
    all_declared_methods: bool,
    all_public_methods: bool,
}

impl<'a> ClassEntry<'a> {
    fn everything(name: &'a str) -> Self {
        Self {
            name,
            all_declared_constructors: true,
            all_public_constructors: true,
            all_declared_fields: true,
            all_public_fields: true,
            all_declared_methods: true,
            all_public_methods: true,
        }
    }
}

/// Write directive files into `dir` and return the compiler flags that use them.
pub async fn write_directives(
    dir: &Path,
    target: &Triplet,
    directives: &CompileDirectives,
) -> Result<Vec<String>, PipelineError> {
    let mut flags = Vec::new();

    if !directives.reflection.is_empty() {
        let file = dir.join(format!("reflectionconfig-{}.json", target.arch_os()));
        write_class_list(&file, &directives.reflection).await?;
        flags.push(format!("-H:ReflectionConfigurationFiles={}", file.display()));
    }

    if !directives.jni.is_empty() {
        let file = dir.join(format!("jniconfig-{}.json", target.arch_os()));
        write_class_list(&file, &directives.jni).await?;
        flags.push(format!("-H:JNIConfigurationFiles={}", file.display()));
    }

    if !directives.initialize_at_build_time.is_empty() {
        flags.push(format!(
            "--initialize-at-build-time={}",
            directives.initialize_at_build_time.join(",")
        ));
    }

    if !directives.resource_bundles.is_empty() {
        flags.push(format!(
            "-H:IncludeResourceBundles={}",
            directives.resource_bundles.join(",")
        ));
    }

    Ok(flags)
}

async fn write_class_list(file: &Path, classes: &[String]) -> Result<(), PipelineError> {
    let entries: Vec<_> = classes.iter().map(|c| ClassEntry::everything(c)).collect();
    let json = serde_json::to_string_pretty(&entries).map_err(|source| {
        PipelineError::Directives {
            path: file.to_path_buf(),
            source,
        }
    })?;
    tokio::fs::write(file, json)
        .await
        .fs_context("writing directive file", file)?;
    Ok(())
}
