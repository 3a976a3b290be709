//! Catalog manifest data structures
//!
//! The manifest is consumed read-only and unknown fields are ignored. Several
//! fields are loosely typed in the wild (a single resource object instead of
//! a list, a country code instead of a list of them, a bare string where a
//! publisher object belongs), so only `name` is strict. Everything else is
//! kept as raw JSON or read leniently, and normalized during metadata
//! derivation. One odd node never fails the whole manifest.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::constants::catalog::{ENTITY_MIME_TYPE, GROUP_NODE_TYPE};

/// Root catalog document
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogManifest {
    /// Ordered dataset nodes
    pub datasets: Vec<CatalogNode>,
}

/// One entry in the catalog manifest
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogNode {
    /// Foreign identifier, unique within the manifest
    pub name: String,
    /// Node classification; `"collection"` marks a grouping node
    #[serde(default, rename = "type", deserialize_with = "string_or_none")]
    pub node_type: Option<String>,
    /// Nested nodes of a container
    #[serde(default)]
    pub children: Option<Value>,
    /// Nested nodes of a container (alternate key)
    #[serde(default)]
    pub datasets: Option<Value>,
    /// Display title
    #[serde(default)]
    pub title: Option<Value>,
    /// Free-text description
    #[serde(default)]
    pub description: Option<Value>,
    /// Free-text summary
    #[serde(default)]
    pub summary: Option<Value>,
    /// Publishing organisation; anything but an object reads as empty
    #[serde(default, deserialize_with = "object_or_default")]
    pub publisher: Publisher,
    /// Landing page of the source data
    #[serde(default)]
    pub data_url: Option<Value>,
    /// Collection category
    #[serde(default)]
    pub category: Option<Value>,
    /// Update frequency. The outer `Option` records whether the key was
    /// present at all, the inner one whether it was null.
    #[serde(default, deserialize_with = "present")]
    pub frequency: Option<Option<String>>,
    /// Attached resources; a single object is accepted as a one-item list
    #[serde(default, deserialize_with = "resource_list")]
    pub resources: Vec<ResourceDescriptor>,
}

/// Publisher block of a catalog node
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Publisher {
    /// Organisation name
    #[serde(default)]
    pub name: Option<Value>,
    /// Organisation website
    #[serde(default)]
    pub url: Option<Value>,
    /// Country code, or a list of them
    #[serde(default)]
    pub country: Option<Value>,
}

/// A remotely hosted file attached to a dataset
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResourceDescriptor {
    /// Fetch location
    #[serde(default, deserialize_with = "string_or_none")]
    pub url: Option<String>,
    /// Content-type tag
    #[serde(default, deserialize_with = "string_or_none")]
    pub mime_type: Option<String>,
}

impl ResourceDescriptor {
    /// Whether this resource carries newline-delimited structured entities
    pub fn is_entity_stream(&self) -> bool {
        self.mime_type.as_deref() == Some(ENTITY_MIME_TYPE)
    }
}

impl CatalogNode {
    /// Pure grouping node, never reconciled itself
    pub fn is_group(&self) -> bool {
        self.node_type.as_deref() == Some(GROUP_NODE_TYPE)
    }

    /// Container holding nested nodes; an empty nested list does not count
    pub fn is_container(&self) -> bool {
        self.children.as_ref().is_some_and(is_truthy)
            || self.datasets.as_ref().is_some_and(is_truthy)
    }

    /// Resources whose content type is the structured-entity type, in order
    pub fn entity_resources(&self) -> Vec<&ResourceDescriptor> {
        self.resources
            .iter()
            .filter(|r| r.is_entity_stream())
            .collect()
    }
}

/// JSON truthiness: null, false, 0, "" and empty containers are falsy
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Keeps "key present but null" distinct from "key absent". Non-string
/// scalars keep their JSON text.
fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Some(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }))
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn object_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(match Value::deserialize(deserializer)? {
        value @ Value::Object(_) => serde_json::from_value(value).unwrap_or_default(),
        _ => T::default(),
    })
}

/// A list of resource objects or a single one; anything else is dropped
fn resource_list<'de, D>(deserializer: D) -> Result<Vec<ResourceDescriptor>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        value @ Value::Object(_) => vec![value],
        _ => Vec::new(),
    };
    Ok(items
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(value: Value) -> CatalogNode {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_group_and_container_detection() {
        assert!(node(json!({"name": "g", "type": "collection"})).is_group());
        assert!(!node(json!({"name": "d", "type": "dataset"})).is_group());
        assert!(node(json!({"name": "c", "children": [{"name": "x"}]})).is_container());
        assert!(node(json!({"name": "c", "datasets": ["x"]})).is_container());
        assert!(!node(json!({"name": "c", "children": []})).is_container());
        assert!(!node(json!({"name": "c", "datasets": null})).is_container());
    }

    #[test]
    fn test_frequency_presence() {
        assert_eq!(node(json!({"name": "a"})).frequency, None);
        assert_eq!(node(json!({"name": "a", "frequency": null})).frequency, Some(None));
        assert_eq!(
            node(json!({"name": "a", "frequency": "daily"})).frequency,
            Some(Some("daily".to_string()))
        );
        assert_eq!(
            node(json!({"name": "a", "frequency": 7})).frequency,
            Some(Some("7".to_string()))
        );
    }

    #[test]
    fn test_entity_resources_filter_by_mime_type() {
        let n = node(json!({
            "name": "a",
            "resources": [
                {"url": "http://x/1.json", "mime_type": "application/json+ftm"},
                {"url": "http://x/2.csv", "mime_type": "text/csv"},
                {"url": "http://x/3.json", "mime_type": "application/json"},
                {"url": "http://x/4.json"},
                {"url": "http://x/5.json", "mime_type": "application/json+ftm"}
            ]
        }));
        let urls: Vec<_> = n
            .entity_resources()
            .into_iter()
            .filter_map(|r| r.url.as_deref())
            .collect();
        assert_eq!(urls, vec!["http://x/1.json", "http://x/5.json"]);
    }

    #[test]
    fn test_single_resource_object() {
        let n = node(json!({
            "name": "a",
            "resources": {"url": "http://x/1.json", "mime_type": "application/json+ftm"}
        }));
        assert_eq!(n.entity_resources().len(), 1);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let manifest: CatalogManifest = serde_json::from_value(json!({
            "updated_at": "2024-01-01",
            "datasets": [{"name": "a", "title": "A", "tags": ["x"], "coverage": {"start": 1}}]
        }))
        .unwrap();
        assert_eq!(manifest.datasets.len(), 1);
        assert_eq!(manifest.datasets[0].title, Some(json!("A")));
    }

    #[test]
    fn test_odd_node_beside_good_one_still_parses() {
        let manifest: CatalogManifest = serde_json::from_value(json!({
            "datasets": [
                {"name": "good", "title": "Good", "publisher": {"name": "P"}},
                {"name": "odd", "title": "Odd", "publisher": "Some Org"}
            ]
        }))
        .unwrap();

        assert_eq!(manifest.datasets.len(), 2);
        assert_eq!(manifest.datasets[0].publisher.name, Some(json!("P")));
        assert!(manifest.datasets[1].publisher.name.is_none());
        assert_eq!(manifest.datasets[1].title, Some(json!("Odd")));
    }

    #[test]
    fn test_mistyped_fields_degrade_per_field() {
        let n = node(json!({
            "name": "odd",
            "type": ["dataset"],
            "title": 42,
            "category": false,
            "data_url": {"href": "http://x"},
            "publisher": {"name": ["A", "B"], "url": 3},
            "resources": [
                "http://x/loose.json",
                {"url": 3, "mime_type": "application/json+ftm"},
                {"url": "http://x/ok.json", "mime_type": "application/json+ftm"}
            ]
        }));

        assert!(n.node_type.is_none());
        assert!(!n.is_group());
        assert_eq!(n.title, Some(json!(42)));
        assert_eq!(n.publisher.url, Some(json!(3)));
        let urls: Vec<_> = n
            .entity_resources()
            .into_iter()
            .map(|r| r.url.as_deref())
            .collect();
        assert_eq!(urls, vec![None, Some("http://x/ok.json")]);

        let n = node(json!({"name": "a", "publisher": ["x"], "resources": "http://x"}));
        assert!(n.publisher.country.is_none());
        assert!(n.resources.is_empty());
    }
}
