//! Scenario: layered config loading and the typed view
//!
//! # Invariants under test
//! - Same layers → same `config_hash`; key order in the source is irrelevant.
//! - Later layers override earlier ones, leaf by leaf.
//! - `AppConfig::from_json` fills defaults for absent keys and rejects
//!   out-of-range values.
//! - Literal secrets in YAML are refused with CONFIG_SECRET_DETECTED.
//! - Keys nothing reads are surfaced by `report_unused_keys`.

use rbk_config::{
    load_layered_yaml_from_strings, report_unused_keys, AppConfig, UnusedKeyPolicy,
};

const BASE_YAML: &str = r#"
db:
  max_connections: 10
  lock_timeout_ms: 5000
server:
  addr: "127.0.0.1:8899"
auth:
  issuer: "roombook"
  secrets_env:
    access: "RBK_ACCESS_SECRET"
    refresh: "RBK_REFRESH_SECRET"
"#;

const BASE_YAML_REORDERED: &str = r#"
auth:
  secrets_env:
    refresh: "RBK_REFRESH_SECRET"
    access: "RBK_ACCESS_SECRET"
  issuer: "roombook"
server:
  addr: "127.0.0.1:8899"
db:
  lock_timeout_ms: 5000
  max_connections: 10
"#;

const OVERLAY_YAML: &str = r#"
db:
  lock_timeout_ms: 250
server:
  addr: "0.0.0.0:5001"
"#;

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

#[test]
fn reordered_keys_produce_same_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();

    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
    assert_eq!(a.config_hash.len(), 64, "SHA-256 hex digest");
}

#[test]
fn overlay_changes_hash_and_overrides_leaves() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();

    assert_ne!(base.config_hash, merged.config_hash);

    let cfg = AppConfig::from_json(&merged.config_json).unwrap();
    assert_eq!(cfg.db.lock_timeout_ms, 250, "overlay wins");
    assert_eq!(cfg.db.max_connections, 10, "base kept where overlay is silent");
    assert_eq!(cfg.server.addr.port(), 5001);
}

// ---------------------------------------------------------------------------
// Typed view
// ---------------------------------------------------------------------------

#[test]
fn empty_config_yields_defaults() {
    let loaded = load_layered_yaml_from_strings(&[]).unwrap();
    let cfg = AppConfig::from_json(&loaded.config_json).unwrap();
    assert_eq!(cfg, AppConfig::default());
    assert_eq!(cfg.auth.access_ttl_secs, 900);
    assert_eq!(cfg.auth.refresh_ttl_secs, 2_592_000);
}

#[test]
fn zero_lock_timeout_is_rejected() {
    let loaded = load_layered_yaml_from_strings(&["db:\n  lock_timeout_ms: 0\n"]).unwrap();
    let err = AppConfig::from_json(&loaded.config_json).unwrap_err();
    assert!(err.to_string().contains("CONFIG_INVALID"), "got: {err}");
}

#[test]
fn bad_addr_is_a_shape_error() {
    let loaded = load_layered_yaml_from_strings(&["server:\n  addr: \"not-an-addr\"\n"]).unwrap();
    assert!(AppConfig::from_json(&loaded.config_json).is_err());
}

// ---------------------------------------------------------------------------
// Secret literals
// ---------------------------------------------------------------------------

#[test]
fn literal_jwt_in_yaml_is_refused() {
    let yaml = r#"
auth:
  secrets_env:
    access: "eyJhbGciOiJIUzI1NiJ9.e30.abc"
"#;
    let err = load_layered_yaml_from_strings(&[yaml]).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("CONFIG_SECRET_DETECTED"), "got: {msg}");
    assert!(!msg.contains("eyJhbGci"), "value must be redacted: {msg}");
}

// ---------------------------------------------------------------------------
// Unused keys
// ---------------------------------------------------------------------------

#[test]
fn shipped_base_layer_is_fully_consumed() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
    assert!(report.is_clean());
}

#[test]
fn unknown_key_warns_or_fails_per_policy() {
    let yaml = "db:\n  max_connections: 4\n  pool_mode: \"session\"\n";
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();

    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert_eq!(report.unused_leaf_pointers, vec!["/db/pool_mode".to_string()]);

    let err = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap_err();
    assert!(err.to_string().contains("CONFIG_UNUSED_KEYS"));
}
