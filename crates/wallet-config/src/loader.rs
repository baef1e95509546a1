use anyhow::{Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

/// Load and deep-merge layered YAML files in order (later files override
/// earlier ones), then canonicalize to sorted-key JSON and hash it.
///
/// Two deployments with identical effective configuration produce the same
/// `config_hash`, which is the audit trail's join key.
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Default::default());

    for p in paths {
        let s = fs::read_to_string(p).with_context(|| format!("read config: {p}"))?;
        let yaml_val: serde_yaml::Value =
            serde_yaml::from_str(&s).with_context(|| format!("parse yaml: {p}"))?;
        let json_val = serde_json::to_value(yaml_val).context("yaml->json conversion failed")?;
        deep_merge(&mut merged, json_val);
    }

    let canonical = canonicalize_json(&merged);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let hash = hex::encode(hasher.finalize());

    Ok(LoadedConfig {
        config_json: serde_json::from_str(&canonical).context("canonical json parse failed")?,
        canonical_json: canonical,
        config_hash: hash,
    })
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_json: Value,
    pub canonical_json: String,
    pub config_hash: String,
}

fn deep_merge(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => {
            for (k, v) in src_map {
                match dst_map.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        dst_map.insert(k, v);
                    }
                }
            }
        }
        (dst_slot, src_val) => {
            *dst_slot = src_val;
        }
    }
}

fn canonicalize_json(v: &Value) -> String {
    let sorted = sort_keys(v);
    serde_json::to_string(&sorted).expect("json serialization must not fail")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_yaml(dir: &tempfile::TempDir, name: &str, contents: &str) -> String {
        let path = dir.path().join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn merges_later_files_over_earlier() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_yaml(
            &dir,
            "base.yaml",
            "cache:\n  ttl_seconds: 30\nretry:\n  optimistic_lock:\n    max_attempts: 3\n",
        );
        let overlay = write_yaml(&dir, "overlay.yaml", "cache:\n  ttl_seconds: 60\n");

        let loaded = load_layered_yaml(&[&base, &overlay]).unwrap();

        assert_eq!(loaded.config_json["cache"]["ttl_seconds"], 60);
        assert_eq!(
            loaded.config_json["retry"]["optimistic_lock"]["max_attempts"],
            3
        );
    }

    #[test]
    fn same_effective_config_hashes_identically_regardless_of_key_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_yaml(&dir, "a.yaml", "a: 1\nb: 2\n");
        let b = write_yaml(&dir, "b.yaml", "b: 2\na: 1\n");

        let loaded_a = load_layered_yaml(&[&a]).unwrap();
        let loaded_b = load_layered_yaml(&[&b]).unwrap();

        assert_eq!(loaded_a.config_hash, loaded_b.config_hash);
    }

    #[test]
    fn missing_file_produces_context_error() {
        let err = load_layered_yaml(&["/nonexistent/path/does-not-exist.yaml"]).unwrap_err();
        assert!(format!("{err:#}").contains("read config"));
    }
}
