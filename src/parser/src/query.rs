//! Dotted path queries over a JSON document
//!
//! The dialect is the small subset of GJSON paths the selection rules need:
//!
//! - `a.b.c` walks object members, `\` escapes the next character (`a\.b`)
//! - `*` and `?` wildcards pick the first matching member in document order
//! - a numeric segment indexes into an array (`items.0`)
//! - `#` as the last segment yields the length of an array
//! - `#` followed by more segments maps the rest of the path over every
//!   element of an array, keeping the elements where it matched
//!   (`groups.#.values` on an array of objects yields an array of arrays)

use std::borrow::Cow;

use serde_json::Value;

/// Outcome of evaluating a path against a document
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult<'a> {
    Missing,
    Found(Cow<'a, Value>),
}

impl<'a> QueryResult<'a> {
    pub fn exists(&self) -> bool {
        matches!(self, QueryResult::Found(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self.value(), Some(Value::Object(_)))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            QueryResult::Found(value) => Some(value.as_ref()),
            QueryResult::Missing => None,
        }
    }

    pub fn into_owned(self) -> Option<Value> {
        match self {
            QueryResult::Found(value) => Some(value.into_owned()),
            QueryResult::Missing => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    /// `#`: array length, or projection when more segments follow
    Count,
    Key(String),
    Pattern(Vec<PatternToken>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PatternToken {
    Char(char),
    /// `?`
    One,
    /// `*`
    Any,
}

/// Evaluate `path` against `document`
pub fn query<'a>(document: &'a Value, path: &str) -> QueryResult<'a> {
    if path.is_empty() {
        return QueryResult::Missing;
    }
    let segments = parse_path(path);
    evaluate(document, &segments)
}

fn parse_path(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut tokens = Vec::new();
    let mut wildcard = false;
    let mut escaped_hash = false;
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    escaped_hash |= next == '#';
                    tokens.push(PatternToken::Char(next));
                }
            }
            '.' => {
                segments.push(finish_segment(&mut tokens, wildcard, escaped_hash));
                wildcard = false;
                escaped_hash = false;
            }
            '*' => {
                wildcard = true;
                tokens.push(PatternToken::Any);
            }
            '?' => {
                wildcard = true;
                tokens.push(PatternToken::One);
            }
            other => tokens.push(PatternToken::Char(other)),
        }
    }
    segments.push(finish_segment(&mut tokens, wildcard, escaped_hash));

    segments
}

fn finish_segment(tokens: &mut Vec<PatternToken>, wildcard: bool, escaped_hash: bool) -> Segment {
    let tokens = std::mem::take(tokens);
    if wildcard {
        return Segment::Pattern(tokens);
    }

    let key: String = tokens
        .into_iter()
        .map(|token| match token {
            PatternToken::Char(c) => c,
            PatternToken::One => '?',
            PatternToken::Any => '*',
        })
        .collect();

    if key == "#" && !escaped_hash {
        Segment::Count
    } else {
        Segment::Key(key)
    }
}

fn evaluate<'a>(value: &'a Value, segments: &[Segment]) -> QueryResult<'a> {
    let Some((segment, rest)) = segments.split_first() else {
        return QueryResult::Found(Cow::Borrowed(value));
    };

    match (segment, value) {
        (Segment::Count, Value::Array(items)) if rest.is_empty() => {
            QueryResult::Found(Cow::Owned(Value::from(items.len())))
        }
        (Segment::Count, Value::Array(items)) => {
            let projected = items
                .iter()
                .filter_map(|item| evaluate(item, rest).into_owned())
                .collect();
            QueryResult::Found(Cow::Owned(Value::Array(projected)))
        }
        (Segment::Key(key), Value::Object(members)) => members
            .get(key)
            .map_or(QueryResult::Missing, |member| evaluate(member, rest)),
        (Segment::Pattern(pattern), Value::Object(members)) => members
            .iter()
            .find(|(key, _)| matches_pattern(pattern, key))
            .map_or(QueryResult::Missing, |(_, member)| evaluate(member, rest)),
        (Segment::Key(key), Value::Array(items)) => key
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get(index))
            .map_or(QueryResult::Missing, |item| evaluate(item, rest)),
        _ => QueryResult::Missing,
    }
}

/// Glob match that only ever resumes from the last `*`, no recursion
fn matches_pattern(pattern: &[PatternToken], key: &str) -> bool {
    let key: Vec<char> = key.chars().collect();
    let (mut p, mut k) = (0, 0);
    // position after the last `*` and the key position it is matched up to
    let mut backtrack: Option<(usize, usize)> = None;

    while k < key.len() {
        match pattern.get(p) {
            Some(PatternToken::Any) => {
                p += 1;
                backtrack = Some((p, k));
            }
            Some(PatternToken::One) => {
                p += 1;
                k += 1;
            }
            Some(PatternToken::Char(c)) if *c == key[k] => {
                p += 1;
                k += 1;
            }
            _ => match backtrack {
                Some((star_p, star_k)) => {
                    p = star_p;
                    k = star_k + 1;
                    backtrack = Some((star_p, star_k + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p.min(pattern.len())..]
        .iter()
        .all(|token| *token == PatternToken::Any)
}
