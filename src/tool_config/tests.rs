use super::*;
use std::env;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_config_dir(label: &str) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = env::temp_dir().join(format!("statuslight_cfg_{label}_{unique}"));
    fs::create_dir_all(&dir).expect("create temp config dir");
    dir
}

#[test]
fn parses_full_schema() {
    let config = ToolConfig::parse(
        r#"
patterns:
  waiting:
    - '\?\s*$'
    - '\(y/n\)'
  thinking:
    - '\.\.\.$'
idle_threshold_ms: 300
strip_ansi: true
"#,
    )
    .expect("parse config");
    assert_eq!(config.patterns.waiting, vec![r"\?\s*$", r"\(y/n\)"]);
    assert_eq!(config.patterns.thinking, vec![r"\.\.\.$"]);
    assert_eq!(config.idle_threshold_ms, 300);
    assert!(config.strip_ansi);
}

#[test]
fn missing_keys_take_defaults() {
    let config = ToolConfig::parse("patterns:\n  thinking: ['Running']\n").expect("parse config");
    assert!(config.patterns.waiting.is_empty());
    assert_eq!(config.patterns.thinking, vec!["Running"]);
    assert_eq!(config.idle_threshold_ms, DEFAULT_IDLE_THRESHOLD_MS);
    assert!(!config.strip_ansi);
}

#[test]
fn blank_file_is_default() {
    let config = ToolConfig::parse("# nothing configured yet\n\n").expect("parse config");
    assert_eq!(config, ToolConfig::default());
}

#[test]
fn rejects_wrong_types() {
    assert!(ToolConfig::parse("idle_threshold_ms: soon\n").is_err());
    assert!(ToolConfig::parse("patterns:\n  waiting: 7\n").is_err());
}

#[test]
fn rejects_unknown_pattern_group() {
    assert!(ToolConfig::parse("patterns:\n  sleeping: ['zzz']\n").is_err());
}

#[test]
fn load_prefers_tool_file() {
    let dir = temp_config_dir("tool");
    fs::write(dir.join("claude.yaml"), "idle_threshold_ms: 900\n").unwrap();
    fs::write(dir.join("default.yaml"), "idle_threshold_ms: 100\n").unwrap();

    let config = load_config(&dir, "claude").expect("load config");
    assert_eq!(config.idle_threshold_ms, 900);
    assert_eq!(config.source, ConfigSource::Tool(dir.join("claude.yaml")));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn load_falls_back_to_default_file() {
    let dir = temp_config_dir("default");
    fs::write(dir.join("default.yaml"), "idle_threshold_ms: 100\n").unwrap();

    let config = load_config(&dir, "codex").expect("load config");
    assert_eq!(config.idle_threshold_ms, 100);
    assert_eq!(config.source, ConfigSource::Default(dir.join("default.yaml")));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn load_falls_back_to_built_in() {
    let dir = temp_config_dir("builtin");
    let config = load_config(&dir, "aider").expect("load config");
    assert_eq!(config, ToolConfig::default());
    assert!(config.patterns.waiting.is_empty());
    assert!(config.patterns.thinking.is_empty());
    assert_eq!(config.idle_threshold_ms, 500);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn load_from_missing_dir_is_built_in() {
    let dir = env::temp_dir().join("statuslight_cfg_does_not_exist_4b1f");
    let config = load_config(&dir, "claude").expect("load config");
    assert_eq!(config.source, ConfigSource::BuiltIn);
}

#[test]
fn malformed_tool_file_is_fatal_even_with_default_present() {
    let dir = temp_config_dir("malformed");
    fs::write(dir.join("claude.yaml"), "patterns: [unclosed\n").unwrap();
    fs::write(dir.join("default.yaml"), "idle_threshold_ms: 100\n").unwrap();

    let err = load_config(&dir, "claude").expect_err("malformed config must fail");
    assert!(format!("{err:#}").contains("claude.yaml"));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn unreadable_path_is_fatal() {
    let dir = temp_config_dir("unreadable");
    // A directory where the file should be fails with something other than NotFound.
    fs::create_dir_all(dir.join("claude.yaml")).unwrap();
    assert!(load_config(&dir, "claude").is_err());
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn source_display_names_origin() {
    assert_eq!(ConfigSource::BuiltIn.to_string(), "built-in defaults");
    let shown = ConfigSource::Tool(PathBuf::from("/etc/sl/claude.yaml")).to_string();
    assert_eq!(shown, "tool file /etc/sl/claude.yaml");
}

#[test]
fn shipped_configs_parse_and_compile() {
    for raw in [
        include_str!("../../configs/default.yaml"),
        include_str!("../../configs/claude.yaml"),
    ] {
        let config = ToolConfig::parse(raw).expect("shipped config parses");
        crate::activity::Classifier::from_config(&config).expect("shipped patterns compile");
    }
}
