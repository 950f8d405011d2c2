pub fn build_extraction_prompt(chunk_text: &str) -> String {
    format!(
        r#"You are a JSON-only extraction assistant. Turn the text below into a knowledge graph.

OUTPUT CONTRACT:
- Return exactly one JSON object and nothing else: no prose, no markdown, no code fences.
- The reply must parse as strict JSON exactly as sent.

REQUIRED KEYS:
{{
  "hierarchy": [{{"title": "Section heading", "children": [{{"title": "Subsection"}}]}}],
  "nodes": [{{"label": "SafeIdentifier", "name": "original name"}}],
  "relationships": [{{"subject": "name", "verb": "verb phrase", "object": "name", "type": "RELATION_TYPE", "name": "short description"}}],
  "leaders": ["the five most frequent nouns, fewer if the text has fewer"],
  "schema": [{{"kind": "node|relationship", "type": "Identifier", "properties": ["name"]}}],
  "statements": ["MERGE (a:Label {{name: 'value'}})"]
}}

RULES:
- "statements" is an array of Cypher statements that recreate the whole graph; use MERGE so they can run twice
- Every label and relationship type must be a valid identifier that starts with a letter
- Replace spaces, punctuation and apostrophes in identifiers with an underscore
- Prefix identifiers that would start with a digit with a letter, e.g. N_2024_Report
- Relationship types are UPPER_SNAKE_CASE
- Relationships are always directed: (a)-[:TYPE]->(b), never (a)-[:TYPE]-(b)
- Escape quotes inside Cypher string values

TEXT:
{}

JSON OUTPUT:"#,
        chunk_text
    )
}

pub fn build_corrective_prompt(original_prompt: &str) -> String {
    format!(
        r#"Your previous reply was not valid JSON. Resend the complete JSON object for the request below.
Output only the raw JSON object: no markdown formatting, no code blocks, no explanations.

{}"#,
        original_prompt
    )
}

pub fn build_narrative_prompt(hierarchy: &str, schema: &str, language: &str) -> String {
    format!(
        r#"You are a knowledge graph expert. Using the hierarchy and schema below, write a fluent
narrative in {language} that explains what the graph represents, highlights the key concepts
and describes the most significant relationships. Do NOT use markdown formatting.

HIERARCHY:
{hierarchy}

SCHEMA:
{schema}

NARRATIVE:"#
    )
}
