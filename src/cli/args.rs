//! Command line argument parsing and validation.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::error::{CliError, NativeError};
use crate::model::{BuildConfiguration, ClassPath, CompileDirectives, Triplet};
use crate::pipeline::Step;

/// Build a Java application into a native executable
#[derive(Parser, Debug, Clone)]
#[command(
    name = "kodegen_bundler_native",
    version,
    about = "Build a Java application into a native executable",
    long_about = "Compile a classpath ahead of time with native-image, link it against \
verified static SDK bundles and optionally run the result.

Usage:
  kodegen_bundler_native --classpath app.jar --main-class com.example.Main
  kodegen_bundler_native --step link --target android ...
  kodegen_bundler_native --expected 'Hello World!' ... -- --app-arg"
)]
pub struct Args {
    /// Application classpath, separated like PATH
    #[arg(long, env = "IMAGECP", value_name = "CLASSPATH")]
    pub classpath: String,

    /// Root of a runtime SDK that ships native-image
    #[arg(long, env = "GRAALVM_HOME", value_name = "DIR")]
    pub graalvm: PathBuf,

    /// Main class, optionally prefixed with its module (`module/pkg.Main`)
    #[arg(long, env = "MAINCLASS", value_name = "CLASS")]
    pub main_class: String,

    /// Name of the produced executable
    #[arg(long, default_value = crate::model::DEFAULT_APP_NAME)]
    pub app_name: String,

    /// Target profile: host, linux, linux-aarch64, macos, windows, ios, ios-sim, android
    #[arg(long, value_name = "PROFILE")]
    pub target: Option<String>,

    /// Last step to perform: compile, link, package or run
    #[arg(long, default_value = "run", value_parser = parse_step)]
    pub step: Step,

    /// Capture the application's output and require this last line
    #[arg(long, value_name = "LINE")]
    pub expected: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Trust cached bundles without checking their checksums
    #[arg(long)]
    pub no_hash_check: bool,

    /// Bundle cache directory
    #[arg(long, env = "KODEGEN_NATIVE_CACHE", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Build output directory
    #[arg(long, default_value = "target/native", value_name = "DIR")]
    pub build_root: PathBuf,

    /// Runtime static SDK version
    #[arg(long, value_name = "VERSION")]
    pub runtime_version: Option<String>,

    /// UI toolkit static SDK version
    #[arg(long, value_name = "VERSION")]
    pub ui_version: Option<String>,

    /// Link the runtime static libraries
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    pub use_jni: bool,

    /// Link the UI toolkit static SDK (also enabled when the classpath contains it)
    #[arg(long)]
    pub use_ui_toolkit: bool,

    /// Use runtime static libraries from this directory instead of downloading them
    #[arg(long, value_name = "DIR")]
    pub runtime_libs: Option<PathBuf>,

    /// Linker executable
    #[arg(long, value_name = "PATH")]
    pub linker: Option<PathBuf>,

    /// Mirror to download static SDK bundles from
    #[arg(long, value_name = "URL")]
    pub download_url: Option<String>,

    /// Classes registered for reflection
    #[arg(long, value_delimiter = ',', value_name = "CLASS")]
    pub reflection: Vec<String>,

    /// Classes registered for JNI access
    #[arg(long, value_delimiter = ',', value_name = "CLASS")]
    pub jni: Vec<String>,

    /// Classes initialized while building the image
    #[arg(long, value_delimiter = ',', value_name = "CLASS")]
    pub initialize_at_build_time: Vec<String>,

    /// Resource bundles to embed
    #[arg(long, value_delimiter = ',', value_name = "BUNDLE")]
    pub resource_bundles: Vec<String>,

    /// Extra native-image argument (repeatable)
    #[arg(long = "compiler-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub compiler_args: Vec<String>,

    /// Extra linker argument (repeatable)
    #[arg(long = "linker-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub linker_args: Vec<String>,

    /// Arguments passed to the application
    #[arg(last = true, value_name = "APP_ARGS")]
    pub app_args: Vec<String>,
}

fn parse_step(value: &str) -> Result<Step, String> {
    value.parse().map_err(|e: CliError| e.to_string())
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), CliError> {
        if self.classpath.trim().is_empty() {
            return Err(CliError::InvalidArguments {
                reason: "classpath is empty".to_string(),
            });
        }
        if self.expected.is_some() && self.step != Step::Run {
            return Err(CliError::InvalidArguments {
                reason: format!("--expected needs --step run, got --step {}", self.step),
            });
        }
        if self.runtime_libs.is_some() && !self.use_jni {
            return Err(CliError::InvalidArguments {
                reason: "--runtime-libs has no effect with --use-jni false".to_string(),
            });
        }
        Ok(())
    }

    /// Parsed classpath
    pub fn classpath(&self) -> ClassPath {
        ClassPath::parse(&self.classpath)
    }

    /// Build configuration described by the arguments
    pub fn to_configuration(&self) -> Result<BuildConfiguration, NativeError> {
        let host = Triplet::from_host()?;
        let target = Triplet::resolve(self.target.as_deref())?;

        let mut builder = BuildConfiguration::builder()
            .app_name(&self.app_name)
            .main_class(&self.main_class)
            .graalvm_home(&self.graalvm)
            .host(host)
            .target(target)
            .use_jni(self.use_jni)
            .use_ui_toolkit(self.use_ui_toolkit)
            .check_hash(!self.no_hash_check)
            .verbose(self.verbose)
            .compiler_args(self.compiler_args.iter().cloned())
            .linker_args(self.linker_args.iter().cloned())
            .runtime_args(self.app_args.iter().cloned())
            .directives(CompileDirectives {
                reflection: self.reflection.clone(),
                jni: self.jni.clone(),
                initialize_at_build_time: self.initialize_at_build_time.clone(),
                resource_bundles: self.resource_bundles.clone(),
            });

        if let Some(dir) = &self.cache_dir {
            builder = builder.cache_root(dir);
        }
        if let Some(version) = &self.runtime_version {
            builder = builder.runtime_version(version);
        }
        if let Some(version) = &self.ui_version {
            builder = builder.ui_toolkit_version(version);
        }
        if let Some(dir) = &self.runtime_libs {
            builder = builder.custom_runtime_libs(dir);
        }
        if let Some(linker) = &self.linker {
            builder = builder.linker(linker);
        }
        if let Some(url) = &self.download_url {
            builder = builder.download_url(url);
        }

        Ok(builder.build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec![
            "kodegen_bundler_native",
            "--classpath",
            "app.jar",
            "--graalvm",
            "/opt/graalvm",
            "--main-class",
            "app/com.example.Main",
        ];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults() {
        let args = parse(&[]);
        assert_eq!(args.step, Step::Run);
        assert!(args.use_jni);
        assert!(!args.no_hash_check);
        assert_eq!(args.build_root, PathBuf::from("target/native"));
        args.validate().unwrap();
    }

    #[test]
    fn lists_and_trailing_args() {
        let args = parse(&[
            "--reflection",
            "a.B,c.D",
            "--compiler-arg",
            "-H:+Foo",
            "--",
            "--app-flag",
        ]);
        assert_eq!(args.reflection, vec!["a.B", "c.D"]);
        assert_eq!(args.compiler_args, vec!["-H:+Foo"]);
        assert_eq!(args.app_args, vec!["--app-flag"]);
    }

    #[test]
    fn expected_requires_run_step() {
        let args = parse(&["--step", "link", "--expected", "Hello"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn bad_step_is_rejected_by_parser() {
        let result = Args::try_parse_from([
            "kodegen_bundler_native",
            "--classpath",
            "a.jar",
            "--graalvm",
            "/g",
            "--main-class",
            "M",
            "--step",
            "deploy",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn configuration_reflects_flags() {
        let args = parse(&[
            "--no-hash-check",
            "--use-jni",
            "false",
            "--cache-dir",
            "/tmp/native-cache",
            "--target",
            "host",
        ]);
        let config = args.to_configuration().unwrap();
        assert_eq!(config.main_class(), "com.example.Main");
        assert!(!config.check_hash());
        assert!(!config.use_jni());
        assert_eq!(config.cache_root(), std::path::Path::new("/tmp/native-cache"));
    }
}
