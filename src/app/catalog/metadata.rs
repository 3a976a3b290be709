//! Collection metadata derived from a catalog node
//!
//! Derivation is pure: the same node and default frequency always produce the
//! same [`DerivedMetadata`]. Which fields reach the store is decided by the
//! explicit payload builders, not by mutating a map.

use serde_json::Value;

use super::types::{is_truthy, CatalogNode};
use crate::app::store::CollectionPayload;
use crate::constants::catalog::DEFAULT_CATEGORY;

/// Metadata computed for one dataset during a reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedMetadata {
    pub label: String,
    pub summary: String,
    pub publisher: Option<String>,
    pub publisher_url: Option<String>,
    pub countries: Vec<String>,
    pub data_url: Option<String>,
    /// Sent on create only
    pub category: String,
    /// `None` means the key is left out of the payload entirely
    pub frequency: Option<Option<String>>,
}

impl DerivedMetadata {
    /// Derive metadata for `node`, falling back to `default_frequency` when the
    /// node does not carry a `frequency` key of its own
    pub fn derive(node: &CatalogNode, default_frequency: Option<&str>) -> Self {
        let description = ensure_str(node.description.as_ref());
        let summary = ensure_str(node.summary.as_ref());
        let summary = format!("{description}\n\n{summary}").trim().to_string();

        let label = scalar_text(node.title.as_ref()).unwrap_or_else(|| {
            tracing::debug!(dataset = %node.name, "Node has no usable title, labelling by name");
            node.name.clone()
        });

        let category =
            scalar_text(node.category.as_ref()).unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        let frequency = match &node.frequency {
            Some(explicit) => Some(explicit.clone()),
            None => default_frequency.map(|f| Some(f.to_string())),
        };

        Self {
            label,
            summary,
            publisher: scalar_text(node.publisher.name.as_ref()),
            publisher_url: scalar_text(node.publisher.url.as_ref()),
            countries: normalize_countries(node.publisher.country.as_ref()),
            data_url: scalar_text(node.data_url.as_ref()),
            category,
            frequency,
        }
    }

    /// Payload for creating a new collection: carries `category` and the
    /// dataset's foreign identifier
    pub fn create_payload(&self, foreign_id: &str) -> CollectionPayload {
        CollectionPayload {
            category: Some(self.category.clone()),
            foreign_id: Some(foreign_id.to_string()),
            ..self.base_payload()
        }
    }

    /// Payload for updating an existing collection: `category` is withheld so
    /// an operator's edit to it survives re-runs
    pub fn update_payload(&self) -> CollectionPayload {
        self.base_payload()
    }

    fn base_payload(&self) -> CollectionPayload {
        CollectionPayload {
            label: self.label.clone(),
            summary: self.summary.clone(),
            publisher: self.publisher.clone(),
            publisher_url: self.publisher_url.clone(),
            countries: self.countries.clone(),
            data_url: self.data_url.clone(),
            category: None,
            frequency: self.frequency.clone(),
            foreign_id: None,
        }
    }
}

/// Render a loosely typed text field: strings are trimmed, other truthy
/// values are rendered as JSON, falsy values become empty
fn ensure_str(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) if is_truthy(other) => other.to_string(),
        _ => String::new(),
    }
}

/// Read a single-valued text field: non-blank strings are kept as written,
/// numbers and booleans as their JSON text, anything else counts as absent
fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Normalize a country field that may be absent, a single code or a list
fn normalize_countries(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter_map(country_code).collect(),
        Some(other) => country_code(other).into_iter().collect(),
    }
}

fn country_code(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::String(_) | Value::Null => None,
        other => Some(other.to_string()),
    }
}
