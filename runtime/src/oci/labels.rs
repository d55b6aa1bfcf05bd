//! Image config labels.
//!
//! Labels live under `config.Labels` in both Docker and OCI image configs.
//! Deplab owns exactly one of them, `io.deplab.metadata`, whose value is the
//! compact JSON encoding of [`Metadata`]. All other labels are preserved.

use std::collections::HashMap;

use deplab_core::error::{DeplabError, Result};
use deplab_core::metadata::{Metadata, METADATA_LABEL};

/// Labels of an image config; empty when the config has none.
pub fn image_labels(config: &serde_json::Value) -> HashMap<String, String> {
    config
        .get("config")
        .and_then(|c| c.get("Labels"))
        .and_then(|l| l.as_object())
        .map(|labels| {
            labels
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Copy of `config` with the metadata label set.
pub fn with_metadata_label(
    config: &serde_json::Value,
    metadata: &Metadata,
) -> Result<serde_json::Value> {
    let mut config = config.clone();
    let root = config.as_object_mut().ok_or_else(|| {
        DeplabError::OciImageError("Image config is not a JSON object".to_string())
    })?;

    let container_config = root
        .entry("config")
        .or_insert_with(|| serde_json::json!({}));
    if container_config.is_null() {
        *container_config = serde_json::json!({});
    }
    let container_config = container_config.as_object_mut().ok_or_else(|| {
        DeplabError::OciImageError("Image config field `config` is not an object".to_string())
    })?;

    let labels = container_config
        .entry("Labels")
        .or_insert_with(|| serde_json::json!({}));
    if labels.is_null() {
        *labels = serde_json::json!({});
    }
    let labels = labels.as_object_mut().ok_or_else(|| {
        DeplabError::OciImageError("Image config field `Labels` is not an object".to_string())
    })?;

    labels.insert(
        METADATA_LABEL.to_string(),
        serde_json::Value::String(metadata.to_label_value()?),
    );

    Ok(config)
}

/// Decode the metadata label, if present.
pub fn metadata_from_labels(labels: &HashMap<String, String>) -> Result<Option<Metadata>> {
    labels
        .get(METADATA_LABEL)
        .map(|value| Metadata::from_label_value(value))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use deplab_core::metadata::{BaseInfo, Provenance};

    fn metadata() -> Metadata {
        Metadata {
            base: BaseInfo::unknown(),
            provenance: vec![Provenance {
                name: "deplab".to_string(),
                version: "0.0.0-dev".to_string(),
                url: "https://example.com".to_string(),
            }],
            dependencies: vec![],
        }
    }

    #[test]
    fn test_image_labels() {
        let config = serde_json::json!({
            "config": { "Labels": { "a": "1", "b": "2", "weird": 3 } }
        });
        let labels = image_labels(&config);
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.get("a"), Some(&"1".to_string()));
    }

    #[test]
    fn test_image_labels_missing() {
        assert!(image_labels(&serde_json::json!({})).is_empty());
        assert!(image_labels(&serde_json::json!({"config": {"Labels": null}})).is_empty());
    }

    #[test]
    fn test_with_metadata_label_preserves_other_fields() {
        let config = serde_json::json!({
            "architecture": "arm64",
            "config": { "Env": ["PATH=/bin"], "Labels": { "keep": "me" } },
            "rootfs": { "type": "layers", "diff_ids": ["sha256:aa"] }
        });
        let updated = with_metadata_label(&config, &metadata()).unwrap();

        assert_eq!(updated["architecture"], "arm64");
        assert_eq!(updated["rootfs"], config["rootfs"]);
        assert_eq!(updated["config"]["Env"], config["config"]["Env"]);

        let labels = image_labels(&updated);
        assert_eq!(labels.get("keep"), Some(&"me".to_string()));
        assert_eq!(metadata_from_labels(&labels).unwrap(), Some(metadata()));
    }

    #[test]
    fn test_with_metadata_label_creates_missing_sections() {
        for config in [
            serde_json::json!({}),
            serde_json::json!({"config": null}),
            serde_json::json!({"config": {"Labels": null}}),
        ] {
            let updated = with_metadata_label(&config, &metadata()).unwrap();
            assert!(image_labels(&updated).contains_key(METADATA_LABEL));
        }
    }

    #[test]
    fn test_with_metadata_label_rejects_non_object() {
        assert!(with_metadata_label(&serde_json::json!([]), &metadata()).is_err());
    }

    #[test]
    fn test_metadata_from_labels() {
        let mut labels = HashMap::new();
        assert_eq!(metadata_from_labels(&labels).unwrap(), None);

        labels.insert(METADATA_LABEL.to_string(), "not json".to_string());
        assert!(metadata_from_labels(&labels).is_err());
    }
}
