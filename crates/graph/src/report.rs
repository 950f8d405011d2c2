use std::collections::HashMap;
use std::fmt::Write;

use serde::Serialize;

use crate::error::Result;
use crate::store::GraphStore;

const NODE_COUNT: &str = "MATCH (n) RETURN count(n) AS count";
const RELATIONSHIP_COUNT: &str = "MATCH ()-[r]->() RETURN count(r) AS count";
const LABELS: &str = "CALL db.labels() YIELD label RETURN label ORDER BY label";
const RELATIONSHIP_TYPES: &str = "CALL db.relationshipTypes() YIELD relationshipType \
     RETURN relationshipType ORDER BY relationshipType";
const HUBS: &str = "MATCH (n)-[r]-() WITH n, count(r) AS degree ORDER BY degree DESC LIMIT 5 \
     RETURN toString(coalesce(n.name, n.id, elementId(n))) + ' (' + \
     coalesce(head(labels(n)), 'node') + ', degree ' + toString(degree) + ')' AS hub";
const NAMES: &str = "MATCH (n) WHERE n.name IS NOT NULL RETURN toString(n.name) AS name LIMIT 2000";

const TOP_WORDS: usize = 4;
const WRAP_WIDTH: usize = 95;

/// Summary of what ended up in the graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphReport {
    pub node_count: i64,
    pub relationship_count: i64,
    pub labels: Vec<String>,
    pub relationship_types: Vec<String>,
    pub hubs: Vec<String>,
    pub top_words: Vec<String>,
}

impl GraphReport {
    pub async fn collect(store: &dyn GraphStore) -> Result<Self> {
        let names = store.read_column(NAMES, "name").await?;
        Ok(Self {
            node_count: store.read_count(NODE_COUNT, "count").await?,
            relationship_count: store.read_count(RELATIONSHIP_COUNT, "count").await?,
            labels: store.read_column(LABELS, "label").await?,
            relationship_types: store.read_column(RELATIONSHIP_TYPES, "relationshipType").await?,
            hubs: store.read_column(HUBS, "hub").await?,
            top_words: top_words(&names, TOP_WORDS),
        })
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "The graph holds {} nodes and {} relationships.",
            self.node_count, self.relationship_count
        );

        let sections = [
            ("Labels", &self.labels),
            ("Relationship types", &self.relationship_types),
            ("Most connected", &self.hubs),
            ("Frequent name words", &self.top_words),
        ];
        for (title, values) in sections {
            if values.is_empty() {
                continue;
            }
            let line = format!("{title}: {}.", values.join(", "));
            for wrapped in wrap(&line, WRAP_WIDTH) {
                let _ = writeln!(out, "{wrapped}");
            }
        }
        out
    }
}

/// Most frequent words across node names, ties broken alphabetically.
pub fn top_words(names: &[String], limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for name in names {
        for word in name.split(|c: char| !c.is_alphabetic()) {
            let len = word.chars().count();
            if len > 2 && len < 25 {
                *counts.entry(word.to_lowercase()).or_insert(0) += 1;
            }
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(word, _)| word).collect()
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
