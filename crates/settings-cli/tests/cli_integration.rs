//! End-to-end tests of the `settings` subcommands against real files.

use std::fs;
use std::path::{Path, PathBuf};

use settings_cli::commands::{self, ValueKind};
use settings_cli::config::{CliConfig, Mount};
use uuid::Uuid;

struct TempFile(PathBuf);

impl TempFile {
    fn new(contents: &str) -> Self {
        let path = std::env::temp_dir().join(format!("settings-cli-{}.conf", Uuid::new_v4()));
        fs::write(&path, contents).expect("write temp file");
        Self(path)
    }

    fn missing() -> Self {
        Self(std::env::temp_dir().join(format!("settings-cli-{}.conf", Uuid::new_v4())))
    }

    fn path(&self) -> &Path {
        &self.0
    }

    fn read(&self) -> String {
        fs::read_to_string(&self.0).expect("read temp file")
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

fn mount(name: &str, file: &TempFile, read_only: bool) -> Mount {
    Mount {
        name: name.to_string(),
        path: file.path().to_path_buf(),
        read_only,
    }
}

#[test]
fn test_get_reads_from_the_longest_mount() {
    // Arrange
    let root = TempFile::new("app.window.width=800\n");
    let app = TempFile::new("window.width=1280\n");
    let resolver = commands::build_resolver(
        &CliConfig::default(),
        &[mount("", &root, true), mount("app", &app, false)],
    )
    .expect("build resolver");

    // Act
    let width = commands::get(&resolver, "App.Window.Width").expect("get");

    // Assert
    assert_eq!(width, "1280");
}

#[test]
fn test_get_unknown_setting_is_an_error() {
    let file = TempFile::new("present=1\n");
    let resolver =
        commands::build_resolver(&CliConfig::default(), &[mount("", &file, false)]).unwrap();

    let err = commands::get(&resolver, "absent").unwrap_err();

    assert!(err.to_string().contains("absent"));
}

#[test]
fn test_set_writes_canonical_value_to_file() {
    // Arrange
    let file = TempFile::new("# window\nwidth=800\n");
    let resolver =
        commands::build_resolver(&CliConfig::default(), &[mount("app", &file, false)]).unwrap();

    // Act
    commands::set(&resolver, "app.enabled", "1", ValueKind::Bool).expect("set bool");
    commands::set(&resolver, "app.width", " 1024 ", ValueKind::Uint).expect("set uint");

    // Assert
    let text = file.read();
    assert!(text.starts_with("# window\nwidth=1024\n"), "got {text:?}");
    assert!(text.contains("enabled=true"), "got {text:?}");
    assert_eq!(commands::get(&resolver, "app.enabled").unwrap(), "true");
}

#[test]
fn test_set_rejects_invalid_value_before_writing() {
    let file = TempFile::new("width=800\n");
    let resolver =
        commands::build_resolver(&CliConfig::default(), &[mount("", &file, false)]).unwrap();

    let result = commands::set(&resolver, "width", "wide", ValueKind::Int);

    assert!(result.is_err());
    assert_eq!(file.read(), "width=800\n");
}

#[test]
fn test_set_on_read_only_mount_fails() {
    let file = TempFile::new("width=800\n");
    let resolver =
        commands::build_resolver(&CliConfig::default(), &[mount("", &file, true)]).unwrap();

    let err = commands::set(&resolver, "width", "900", ValueKind::Uint).unwrap_err();

    assert!(err.to_string().contains("not written"), "got {err}");
    assert_eq!(file.read(), "width=800\n");
}

#[test]
fn test_set_without_mounts_fails() {
    let resolver = commands::build_resolver(&CliConfig::default(), &[]).unwrap();

    assert!(commands::set(&resolver, "x", "1", ValueKind::String).is_err());
}

#[test]
fn test_list_prints_full_names() {
    // Arrange
    let root = TempFile::new("top=1\n");
    let app = TempFile::new("b=2\na=3\n");
    let resolver = commands::build_resolver(
        &CliConfig::default(),
        &[mount("", &root, false), mount("app", &app, false)],
    )
    .unwrap();

    // Act
    let lines = commands::list(&resolver, false).unwrap();
    let json = commands::list(&resolver, true).unwrap();

    // Assert
    assert_eq!(lines, "app.a=3\napp.b=2\ntop=1\n");
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["app.b"], "2");
    assert_eq!(parsed["top"], "1");
}

#[test]
fn test_copy_respects_no_overwrite() {
    // Arrange
    let app = TempFile::new("a=1\nb=2\n");
    let dest = TempFile::new("app.a=keep\n");
    let resolver =
        commands::build_resolver(&CliConfig::default(), &[mount("app", &app, false)]).unwrap();

    // Act
    let added = commands::copy(&resolver, dest.path(), false).expect("copy");

    // Assert
    assert_eq!(added, 1);
    let text = dest.read();
    assert!(text.contains("app.a=keep"), "got {text:?}");
    assert!(text.contains("app.b="), "got {text:?}");
}

#[test]
fn test_copy_creates_missing_destination() {
    let app = TempFile::new("a=1\n");
    let dest = TempFile::missing();
    let resolver =
        commands::build_resolver(&CliConfig::default(), &[mount("app", &app, false)]).unwrap();

    let added = commands::copy(&resolver, dest.path(), true).expect("copy");

    assert_eq!(added, 1);
    assert!(dest.read().contains("app.a="));
}

#[test]
fn test_seed_defaults_fills_only_missing_settings() {
    // Arrange
    let app = TempFile::new("width=1280\n");
    let defaults = TempFile::new(
        "# shipped defaults\napp.width=800\napp.height=600\nelsewhere.x=1\n\nnot a setting\n",
    );
    let resolver =
        commands::build_resolver(&CliConfig::default(), &[mount("app", &app, false)]).unwrap();

    // Act
    let written = commands::seed_defaults(&resolver, defaults.path()).expect("seed");

    // Assert
    assert_eq!(written, 1);
    let text = app.read();
    assert!(text.contains("width=1280"), "got {text:?}");
    assert!(text.contains("height=600"), "got {text:?}");
    assert!(!text.contains("x=1"), "got {text:?}");
}

#[test]
fn test_build_resolver_reports_unreadable_mount() {
    let dir = std::env::temp_dir();
    let bad = Mount {
        name: "app".to_string(),
        path: dir,
        read_only: false,
    };

    let err = commands::build_resolver(&CliConfig::default(), &[bad]).unwrap_err();

    assert!(err.to_string().contains("cannot mount"), "got {err}");
}
