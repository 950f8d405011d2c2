//! Structural repair of generated Cypher.
//!
//! Statements are lexed into a small token view (string literals, quoted
//! identifiers, words, punctuation) so that rewrites only ever touch label
//! positions and relationship arrows, never the contents of literals.
//!
//! Rules, applied per statement:
//! - split on top-level `;` and trim; empty pieces are dropped
//! - `-[...]-` without an arrowhead on either side becomes `-[...]->`
//! - a label or relationship type starting with a digit is backtick-quoted
//!
//! The output of [`sanitize`] is a fixed point: sanitizing it again changes nothing.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    /// String literal, backtick identifier or comment, kept verbatim
    Opaque(&'a str),
    Word(&'a str),
    Space(&'a str),
    Punct(char),
}

impl Token<'_> {
    fn is_punct(&self, c: char) -> bool {
        matches!(self, Token::Punct(p) if *p == c)
    }

    fn render(&self, out: &mut String) {
        match self {
            Token::Opaque(s) | Token::Word(s) | Token::Space(s) => out.push_str(s),
            Token::Punct(c) => out.push(*c),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Open {
    bracket: char,
    /// `[` directly after a `-`: a relationship pattern
    relationship: bool,
    /// relationship pattern whose left side has no `<`
    undirected_left: bool,
}

pub fn sanitize<S: AsRef<str>>(statements: &[S]) -> Vec<String> {
    statements
        .iter()
        .flat_map(|s| sanitize_statement(s.as_ref()))
        .collect()
}

/// Sanitize one statement; a script with several `;`-separated statements
/// yields several results.
pub fn sanitize_statement(statement: &str) -> Vec<String> {
    let tokens = tokenize(statement);
    tokens
        .split(|t| t.is_punct(';'))
        .map(repair)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn repair(tokens: &[Token<'_>]) -> String {
    let mut quote = vec![false; tokens.len()];
    let mut arrow_after = vec![false; tokens.len()];
    let mut stack: Vec<Open> = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        let Token::Punct(c) = *token else { continue };
        match c {
            '(' | '{' => stack.push(Open {
                bracket: c,
                relationship: false,
                undirected_left: false,
            }),
            '[' => {
                let dash = prev_significant(tokens, i).filter(|&j| tokens[j].is_punct('-'));
                let relationship = dash.is_some();
                let undirected_left = dash.is_some_and(|j| {
                    !prev_significant(tokens, j).is_some_and(|k| tokens[k].is_punct('<'))
                });
                stack.push(Open {
                    bracket: '[',
                    relationship,
                    undirected_left,
                });
            }
            ')' | '}' => {
                stack.pop();
            }
            ']' => {
                let Some(open) = stack.pop() else { continue };
                if !open.undirected_left {
                    continue;
                }
                if let Some(j) = next_significant(tokens, i).filter(|&j| tokens[j].is_punct('-')) {
                    let has_head = next_significant(tokens, j).is_some_and(|k| tokens[k].is_punct('>'));
                    if !has_head {
                        arrow_after[j] = true;
                    }
                }
            }
            ':' | '|' => {
                let top = stack.last();
                let label_position = match c {
                    ':' => !top.is_some_and(|o| o.bracket == '{'),
                    _ => top.is_some_and(|o| o.relationship),
                };
                if !label_position {
                    continue;
                }
                if let Some(j) = next_significant(tokens, i) {
                    if let Token::Word(word) = tokens[j] {
                        if word.starts_with(|ch: char| ch.is_ascii_digit()) {
                            quote[j] = true;
                        }
                    }
                }
            }
            _ => {}
        }
    }

    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::Word(word) if quote[i] => {
                out.push('`');
                out.push_str(word);
                out.push('`');
            }
            _ => token.render(&mut out),
        }
        if arrow_after[i] {
            out.push('>');
        }
    }
    out
}

fn prev_significant(tokens: &[Token<'_>], i: usize) -> Option<usize> {
    (0..i).rev().find(|&j| !matches!(tokens[j], Token::Space(_)))
}

fn next_significant(tokens: &[Token<'_>], i: usize) -> Option<usize> {
    (i + 1..tokens.len()).find(|&j| !matches!(tokens[j], Token::Space(_)))
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < input.len() {
        let rest = &input[pos..];
        let Some(ch) = rest.chars().next() else { break };

        let (len, token) = match ch {
            '\'' | '"' => {
                let len = quoted_len(rest, ch, true);
                (len, Token::Opaque(&rest[..len]))
            }
            '`' => {
                let len = quoted_len(rest, ch, false);
                (len, Token::Opaque(&rest[..len]))
            }
            '/' if rest.starts_with("//") => {
                let len = rest.find('\n').unwrap_or(rest.len());
                (len, Token::Opaque(&rest[..len]))
            }
            c if c.is_whitespace() => {
                let len = prefix_len(rest, char::is_whitespace);
                (len, Token::Space(&rest[..len]))
            }
            c if is_word_char(c) => {
                let len = prefix_len(rest, is_word_char);
                (len, Token::Word(&rest[..len]))
            }
            c => (c.len_utf8(), Token::Punct(c)),
        };

        tokens.push(token);
        pos += len;
    }
    tokens
}

fn prefix_len(text: &str, pred: fn(char) -> bool) -> usize {
    text.char_indices()
        .find(|&(_, c)| !pred(c))
        .map_or(text.len(), |(i, _)| i)
}

/// Byte length of the quoted run at the start of `text`, quotes included.
/// An unterminated quote runs to the end of the text.
fn quoted_len(text: &str, quote: char, backslash_escapes: bool) -> usize {
    let mut chars = text.char_indices().skip(1).peekable();
    while let Some((i, c)) = chars.next() {
        if backslash_escapes && c == '\\' {
            chars.next();
        } else if c == quote {
            // doubled backtick inside a quoted identifier
            if !backslash_escapes && chars.peek().is_some_and(|&(_, n)| n == quote) {
                chars.next();
                continue;
            }
            return i + c.len_utf8();
        }
    }
    text.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(statement: &str) -> String {
        let mut out = sanitize_statement(statement);
        assert_eq!(out.len(), 1, "{out:?}");
        out.remove(0)
    }

    #[test]
    fn test_undirected_relationship_gets_arrow() {
        assert_eq!(
            one("MERGE (a)-[:WORKS_FOR]-(b)"),
            "MERGE (a)-[:WORKS_FOR]->(b)"
        );
        assert_eq!(
            one("MATCH (a) , (b) MERGE (a) - [r:KNOWS {since: 2020}] - (b)"),
            "MATCH (a) , (b) MERGE (a) - [r:KNOWS {since: 2020}] -> (b)"
        );
    }

    #[test]
    fn test_directed_relationships_untouched() {
        for s in [
            "MERGE (a)-[:R]->(b)",
            "MERGE (a)<-[:R]-(b)",
            "MERGE (a)<-[:R]->(b)",
            "MATCH (a)-->(b) RETURN a",
        ] {
            assert_eq!(one(s), s);
        }
    }

    #[test]
    fn test_digit_labels_are_quoted() {
        assert_eq!(one("MERGE (n:2024Report {name: 'x'})"), "MERGE (n:`2024Report` {name: 'x'})");
        assert_eq!(one("CREATE (a)-[:1ST_OF]->(b)"), "CREATE (a)-[:`1ST_OF`]->(b)");
        assert_eq!(one("MATCH (n) SET n:3D"), "MATCH (n) SET n:`3D`");
        assert_eq!(one("MATCH (a)-[:A|2B]->(b) RETURN a"), "MATCH (a)-[:A|`2B`]->(b) RETURN a");
    }

    #[test]
    fn test_map_values_and_literals_untouched() {
        for s in [
            "MERGE (n:Person {age: 30, born:1990})",
            "MERGE (n:Event {at: '12:30 -[:X]- 2B'})",
            "RETURN [x IN range(1, 3) | 2 * x]",
            "MERGE (n:`2Quoted`)",
            r#"MERGE (n:Path {value: "C:\\dir\"; -[:R]- "})"#,
        ] {
            assert_eq!(one(s), s);
        }
    }

    #[test]
    fn test_terminators_and_blank_statements() {
        let input = vec![
            "  CREATE (a:A);  ".to_string(),
            "CREATE (b:B);;".to_string(),
            "   ".to_string(),
            ";".to_string(),
            "CREATE (c:C); CREATE (d:D)".to_string(),
        ];
        assert_eq!(
            sanitize(&input),
            vec!["CREATE (a:A)", "CREATE (b:B)", "CREATE (c:C)", "CREATE (d:D)"]
        );
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let input = vec![
            "MERGE (a:1Thing)-[:2REL]-(b:Other);".to_string(),
            "MERGE (a)-[:R]- (b) ;; ".to_string(),
            "MERGE (n:Person {name: 'O\\'Brien', note: \"a;b\"})".to_string(),
            "CREATE (x:`9Lives`)<-[:R]-(y)".to_string(),
            "MATCH (a), (b) MERGE (a)-[:R1|2R]-(b) // trailing -[:Z]-".to_string(),
            "unterminated 'string -[:R]- (b)".to_string(),
            String::new(),
        ];
        let once = sanitize(&input);
        let twice = sanitize(&once);
        assert_eq!(once, twice);
        assert_eq!(once[0], "MERGE (a:`1Thing`)-[:`2REL`]->(b:Other)");
        assert_eq!(once[1], "MERGE (a)-[:R]-> (b)");
    }

    #[test]
    fn test_tokenizer_round_trips_input() {
        let s = "MERGE (n:Ünïcode {name: 'é;x', `we``ird`: 1}) // note";
        let mut out = String::new();
        for token in tokenize(s) {
            token.render(&mut out);
        }
        assert_eq!(out, s);
    }
}
