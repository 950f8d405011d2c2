use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::normalizer::{LabelNormalizer, to_relation_type};

pub const MAX_LEADERS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub label: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub verb: String,
    #[serde(default)]
    pub object: String,
    #[serde(rename = "type", default)]
    pub rel_type: String,
    #[serde(default)]
    pub name: String,
}

/// Graph description produced by one extraction call.
///
/// Only `statements` is mandatory in a model reply (`cypher` is accepted as an
/// older name for it); every other key defaults to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredPayload {
    #[serde(default, deserialize_with = "one_or_many")]
    pub hierarchy: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub nodes: Vec<Node>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub relationships: Vec<Relationship>,
    #[serde(default, deserialize_with = "leader_terms")]
    pub leaders: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub schema: Vec<Value>,
    #[serde(alias = "cypher", deserialize_with = "statement_list")]
    pub statements: Vec<String>,
}

impl StructuredPayload {
    /// Concatenate every field of `parts` in order.
    ///
    /// Leaders are deduplicated and capped so the merged payload still ranks
    /// at most five terms.
    pub fn merge(parts: impl IntoIterator<Item = StructuredPayload>) -> StructuredPayload {
        let mut merged = StructuredPayload::default();
        for part in parts {
            merged.hierarchy.extend(part.hierarchy);
            merged.nodes.extend(part.nodes);
            merged.relationships.extend(part.relationships);
            merged.schema.extend(part.schema);
            merged.statements.extend(part.statements);
            for leader in part.leaders {
                if !merged.leaders.contains(&leader) {
                    merged.leaders.push(leader);
                }
            }
        }
        merged.leaders.truncate(MAX_LEADERS);
        merged
    }

    /// Force node labels and relationship types into identifier-safe form.
    pub fn normalize_identifiers(mut self) -> Self {
        let mut labels = LabelNormalizer::new();
        for node in &mut self.nodes {
            node.label = labels.normalize(&node.label);
        }
        for relationship in &mut self.relationships {
            let source = if relationship.rel_type.trim().is_empty() {
                &relationship.verb
            } else {
                &relationship.rel_type
            };
            relationship.rel_type = to_relation_type(source);
        }
        self.leaders.truncate(MAX_LEADERS);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty() && self.nodes.is_empty() && self.relationships.is_empty()
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Outline and schema may arrive as a list or a single object.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        other => vec![other],
    })
}

/// Keys holding the term itself when a leader comes back as an object.
const LEADER_KEYS: [&str; 3] = ["term", "word", "name"];

fn leader_terms<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        other => vec![other],
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s),
            // {"term": "graph", "count": 4}
            Value::Object(mut map) => LEADER_KEYS
                .iter()
                .find_map(|key| match map.remove(*key) {
                    Some(Value::String(s)) => Some(s),
                    _ => None,
                })
                .or_else(|| {
                    map.into_iter().find_map(|(_, v)| match v {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                }),
            Value::Null => None,
            other => Some(other.to_string()),
        })
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// Statements may come back as one `;`-separated string instead of a list.
fn statement_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let statements = match Value::deserialize(deserializer)? {
        Value::Null => Vec::new(),
        Value::String(script) => script.split(';').map(str::to_string).collect(),
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        other => {
            return Err(serde::de::Error::custom(format!(
                "statements must be a list or a string, got {other}"
            )));
        }
    };

    Ok(statements
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> StructuredPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_statements_required() {
        let result = serde_json::from_value::<StructuredPayload>(json!({"nodes": []}));
        assert!(result.is_err());
    }

    #[test]
    fn test_cypher_alias_and_string_script() {
        let p = payload(json!({"cypher": "CREATE (a:A); CREATE (b:B);  "}));
        assert_eq!(p.statements, vec!["CREATE (a:A)", "CREATE (b:B)"]);
    }

    #[test]
    fn test_single_object_hierarchy_and_leader_objects() {
        let p = payload(json!({
            "hierarchy": {"title": "Doc", "children": []},
            "leaders": ["graph", {"term": "node", "count": 3}, null],
            "statements": []
        }));
        assert_eq!(p.hierarchy.len(), 1);
        assert_eq!(p.leaders, vec!["graph", "node"]);
    }

    #[test]
    fn test_leader_objects_prefer_term_keys() {
        let p = payload(json!({
            "leaders": [
                {"word": "graph", "pos": "noun"},
                {"category": "entity", "name": "Ada"},
                {"label": "fallback", "weight": 2}
            ],
            "statements": []
        }));
        assert_eq!(p.leaders, vec!["graph", "Ada", "fallback"]);
    }

    #[test]
    fn test_merge_concatenates_in_order() {
        let a = payload(json!({
            "nodes": [{"label": "A", "name": "a"}],
            "leaders": ["x", "y", "z"],
            "statements": ["CREATE (:A)"]
        }));
        let b = payload(json!({
            "nodes": [{"label": "B", "name": "b"}],
            "leaders": ["z", "u", "v", "w"],
            "statements": ["CREATE (:B)"]
        }));

        let merged = StructuredPayload::merge([a, b]);
        assert_eq!(merged.statements, vec!["CREATE (:A)", "CREATE (:B)"]);
        assert_eq!(merged.nodes[1].label, "B");
        assert_eq!(merged.leaders, vec!["x", "y", "z", "u", "v"]);
    }

    #[test]
    fn test_normalize_identifiers() {
        let p = payload(json!({
            "nodes": [
                {"label": "3D Printer", "name": "printer"},
                {"label": "person", "name": "Ann"},
                {"label": "Person", "name": "Bob"}
            ],
            "relationships": [
                {"subject": "Ann", "verb": "works for", "object": "Acme", "type": "", "name": "w"}
            ],
            "leaders": ["a", "b", "c", "d", "e", "f"],
            "statements": ["CREATE (:A)"]
        }))
        .normalize_identifiers();

        assert_eq!(p.nodes[0].label, "N_3D_Printer");
        assert_eq!(p.nodes[1].label, "person");
        assert_eq!(p.nodes[2].label, "person");
        assert_eq!(p.relationships[0].rel_type, "WORKS_FOR");
        assert_eq!(p.leaders.len(), MAX_LEADERS);
    }
}
