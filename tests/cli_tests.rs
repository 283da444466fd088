//! Command line behaviour of the binary

use assert_cmd::Command;
use predicates::prelude::*;

fn bin() -> Command {
    let mut cmd = Command::cargo_bin("kodegen_bundler_native").unwrap();
    cmd.env_remove("IMAGECP")
        .env_remove("GRAALVM_HOME")
        .env_remove("MAINCLASS");
    cmd
}

#[test]
fn help_lists_build_options() {
    bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--classpath"))
        .stdout(predicate::str::contains("--step"))
        .stdout(predicate::str::contains("--no-hash-check"));
}

#[test]
fn main_class_is_required() {
    bin()
        .args(["--classpath", "app.jar", "--graalvm", "/opt/graalvm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--main-class"));
}

#[test]
fn unknown_step_is_rejected() {
    bin()
        .args([
            "--classpath",
            "app.jar",
            "--graalvm",
            "/opt/graalvm",
            "--main-class",
            "com.example.Main",
            "--step",
            "deploy",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("deploy"));
}

#[test]
fn unknown_target_fails_without_building() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("app.jar"), b"jar").unwrap();
    bin()
        .current_dir(dir.path())
        .args([
            "--classpath",
            "app.jar",
            "--graalvm",
            "/opt/graalvm",
            "--main-class",
            "com.example.Main",
            "--target",
            "plan9",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("plan9"));
    assert!(!dir.path().join("target/native").exists());
}

#[test]
fn expected_output_needs_run_step() {
    bin()
        .args([
            "--classpath",
            "app.jar",
            "--graalvm",
            "/opt/graalvm",
            "--main-class",
            "com.example.Main",
            "--step",
            "compile",
            "--expected",
            "Hello",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid arguments"));
}

#[cfg(target_os = "linux")]
#[test]
fn package_step_reports_its_stage() {
    use std::os::unix::fs::PermissionsExt;

    fn script(path: &std::path::Path, body: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, format!("#!/bin/sh\n{body}")).unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("app.jar"), b"jar").unwrap();
    script(
        &dir.path().join("graalvm/bin/native-image"),
        r#"for arg in "$@"; do
  case "$arg" in
    -H:TempDirectory=*) tmp="${arg#-H:TempDirectory=}" ;;
  esac
done
mkdir -p "$tmp/SVM-1"
: > "$tmp/SVM-1/com.example.main.o"
"#,
    );
    let linker = dir.path().join("tools/cc");
    script(
        &linker,
        r#"while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then : > "$2"; shift; fi
  shift
done
"#,
    );

    bin()
        .current_dir(dir.path())
        .env("NO_COLOR", "1")
        .arg("--classpath")
        .arg(dir.path().join("app.jar"))
        .arg("--graalvm")
        .arg(dir.path().join("graalvm"))
        .arg("--build-root")
        .arg(dir.path().join("build"))
        .arg("--cache-dir")
        .arg(dir.path().join("cache"))
        .arg("--linker")
        .arg(&linker)
        .args(["--main-class", "com.example.Main", "--step", "package"])
        .args(["--use-jni", "false"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Link succeeded"))
        .stdout(predicate::str::contains("Package: linux"))
        .stdout(predicate::str::contains("Package succeeded"));
}
