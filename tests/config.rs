use std::io::Write;

use test_case::test_case;
use typed_llvm_ir::config::{CompileOptions, Config, ConfigError, OptLevel};

#[test]
fn load_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("failed to create temp file");
    write!(
        file,
        r#"
[target]
triple = "aarch64-apple-darwin"

[profile.bench]
release = true
opt_level = 2
"#
    )
    .expect("failed to write config");

    let config = Config::load(file.path()).expect("failed to load config");
    assert_eq!(
        config.compile_options("bench").expect("no bench profile"),
        CompileOptions {
            optlevel: OptLevel::Default,
            target_triple: Some("aarch64-apple-darwin".to_string()),
        }
    );
}

#[test]
fn missing_file_is_reported() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let err = Config::load(&dir.path().join("typed-ir.toml")).expect_err("expected error");
    assert!(matches!(err, ConfigError::Io { .. }), "{:#?}", err);
}

#[test]
fn builtin_profiles() {
    let config = Config::from_toml("").expect("failed to parse");
    assert_eq!(config.target.triple, None);
    assert_eq!(
        config.compile_options("dev").map(|options| options.optlevel).ok(),
        Some(OptLevel::None)
    );
    assert_eq!(
        config.compile_options("release").map(|options| options.optlevel).ok(),
        Some(OptLevel::Aggressive)
    );
}

#[test]
fn defined_profiles_override_builtins() {
    let config = Config::from_toml("[profile.release]\nopt_level = 1\n").expect("failed to parse");
    assert_eq!(
        config.compile_options("release").map(|options| options.optlevel).ok(),
        Some(OptLevel::Less)
    );
}

#[test]
fn release_flag_picks_the_marked_profile() {
    let config = Config::from_toml(
        "[profile.ship]\nrelease = true\nopt_level = 2\n\n[profile.fast]\nopt_level = 1\n",
    )
    .expect("failed to parse");
    assert_eq!(config.default_profile(false), "dev");
    assert_eq!(config.default_profile(true), "ship");
    assert_eq!(
        config
            .compile_options(config.default_profile(true))
            .map(|options| options.optlevel)
            .ok(),
        Some(OptLevel::Default)
    );

    let unmarked = Config::from_toml("[profile.fast]\nopt_level = 1\n").expect("failed to parse");
    assert_eq!(unmarked.default_profile(true), "release");
}

#[test]
fn unknown_profile() {
    let err = Config::default()
        .compile_options("fast")
        .expect_err("expected error");
    assert!(
        matches!(&err, ConfigError::UnknownProfile(name) if name == "fast"),
        "{:#?}",
        err
    );
}

#[test]
fn invalid_toml() {
    let err = Config::from_toml("[profile.dev]\nopt_level = \"high\"\n").expect_err("expected error");
    assert!(matches!(err, ConfigError::Parse(_)), "{:#?}", err);
}

#[test_case(0, OptLevel::None)]
#[test_case(1, OptLevel::Less)]
#[test_case(2, OptLevel::Default)]
#[test_case(3, OptLevel::Aggressive)]
#[test_case(9, OptLevel::Aggressive)]
fn opt_level_from_number(level: u8, expected: OptLevel) {
    assert_eq!(OptLevel::from(level), expected);
}
