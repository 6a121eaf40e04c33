//! JSON patch (RFC 6902) helpers

use json_patch::Patch;
use serde_json::Value;

/// Target paths of the operations in `patch`, in order.
pub fn patch_paths(patch: &Patch) -> Vec<String> {
    patch
        .0
        .iter()
        .filter_map(|op| serde_json::to_value(op).ok())
        .filter_map(|op| op.get("path").and_then(Value::as_str).map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_patch_paths() {
        let patch: Patch = serde_json::from_value(json!([
            {"op": "replace", "path": "/metadata/labels/a", "value": "b"},
            {"op": "remove", "path": "/metadata/annotations"}
        ]))
        .unwrap();

        assert_eq!(
            patch_paths(&patch),
            vec!["/metadata/labels/a", "/metadata/annotations"]
        );
        assert!(patch_paths(&Patch(vec![])).is_empty());
    }
}
