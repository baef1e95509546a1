use std::fs;
use std::io::Write;

use wallet_config::{enforce_unused_keys, load_layered_yaml, WalletSettings};

fn write_yaml(dir: &tempfile::TempDir, name: &str, contents: &str) -> String {
    let path = dir.path().join(name);
    let mut f = fs::File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn base_and_environment_overlay_merge_into_typed_settings() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_yaml(
        &dir,
        "base.yaml",
        "retry:\n  optimistic_lock:\n    max_attempts: 5\n\
         cache:\n  ttl_seconds: 30\n\
         outbox:\n  batch_size: 50\n",
    );
    let prod_overlay = write_yaml(
        &dir,
        "prod.yaml",
        "cache:\n  ttl_seconds: 120\n\
         server:\n  bind_addr: \"0.0.0.0:9090\"\n",
    );

    let loaded = load_layered_yaml(&[&base, &prod_overlay]).unwrap();
    let settings = WalletSettings::from_json(&loaded.config_json);

    assert_eq!(settings.retry.optimistic_lock.max_attempts, 5);
    assert_eq!(settings.cache.ttl.as_secs(), 120);
    assert_eq!(settings.outbox.batch_size, 50);
    assert_eq!(settings.server.bind_addr, "0.0.0.0:9090");
}

#[test]
fn unrecognized_keys_are_warned_in_default_mode_and_rejected_in_strict_mode() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_yaml(
        &dir,
        "base.yaml",
        "cache:\n  ttl_seconds: 30\n\
         typo_sektion:\n  value: 1\n",
    );

    let loaded = load_layered_yaml(&[&base]).unwrap();

    let warned = enforce_unused_keys(&loaded.config_json, false).unwrap();
    assert_eq!(warned, vec!["/typo_sektion/value".to_string()]);

    let err = enforce_unused_keys(&loaded.config_json, true).unwrap_err();
    assert!(format!("{err}").contains("typo_sektion"));
}

#[test]
fn identical_effective_config_from_different_file_layouts_hashes_equal() {
    let dir_a = tempfile::tempdir().unwrap();
    let a1 = write_yaml(&dir_a, "a1.yaml", "cache:\n  ttl_seconds: 30\n");
    let a2 = write_yaml(&dir_a, "a2.yaml", "outbox:\n  batch_size: 10\n");

    let dir_b = tempfile::tempdir().unwrap();
    let combined = write_yaml(
        &dir_b,
        "combined.yaml",
        "cache:\n  ttl_seconds: 30\noutbox:\n  batch_size: 10\n",
    );

    let loaded_a = load_layered_yaml(&[&a1, &a2]).unwrap();
    let loaded_b = load_layered_yaml(&[&combined]).unwrap();

    assert_eq!(loaded_a.config_hash, loaded_b.config_hash);
}
