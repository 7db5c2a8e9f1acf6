// Path queries over a `Document`
//
// A small subset of XPath 1.0 location paths, enough to address every field of
// the export API responses:
//
// - `/A/B` - child steps from the document root (a leading `/` is optional)
// - `//B` - `B` elements at any depth below the context
// - `*` - any element
// - `B[2]` - positional predicate, 1-based, per parent
// - `text()` - text children
// - `@attr` - attribute value
// - `.` - the context node itself
//
// A trailing `/` is ignored, so resource base paths such as `/PREDMET_INFO/`
// are valid queries on their own.

use crate::document::{Document, NodeId, DOCUMENT_NODE};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Unexpected '{found}' at position {position} in `{query}`, expected {expected}")]
    UnexpectedToken {
        query: String,
        position: usize,
        found: char,
        expected: String,
    },

    #[error("Unexpected end of `{query}`, expected {expected}")]
    UnexpectedEnd { query: String, expected: String },

    #[error("Invalid position {value} in `{query}`: positions start at 1")]
    InvalidPosition { query: String, value: String },

    #[error("`{step}` must be the last step of `{query}`")]
    TerminalStep { query: String, step: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    /// `//` - children of the context node or of any of its descendants
    Descendant,
    SelfNode,
    Attribute,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    Name(String),
    AnyElement,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub position: Option<usize>,
}

/// A compiled path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub steps: Vec<Step>,
}

/// A single query result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match<'d> {
    Node(NodeId),
    Attribute { owner: NodeId, value: &'d str },
}

impl<'d> Match<'d> {
    /// The XPath string-value of the match.
    pub fn string_value(&self, document: &Document) -> String {
        match self {
            Match::Node(id) => document.string_value(*id),
            Match::Attribute { value, .. } => value.to_string(),
        }
    }
}

impl Query {
    pub fn parse(query: &str) -> Result<Query, QueryError> {
        Parser::new(query).parse()
    }

    /// Evaluates the query against the whole document. Matches come back in
    /// document order without duplicates.
    pub fn evaluate<'d>(&self, document: &'d Document) -> Vec<Match<'d>> {
        let mut context: Vec<NodeId> = vec![DOCUMENT_NODE];

        for step in &self.steps {
            if step.axis == Axis::Attribute {
                // the parser guarantees an attribute step is the last one
                let NodeTest::Name(key) = &step.test else {
                    return Vec::new();
                };
                return context
                    .into_iter()
                    .filter_map(|owner| {
                        document
                            .attribute(owner, key)
                            .map(|value| Match::Attribute { owner, value })
                    })
                    .collect();
            }

            let mut next = Vec::new();
            for &node in &context {
                next.extend(evaluate_step(document, node, step));
            }
            next.sort_unstable();
            next.dedup();
            context = next;
            if context.is_empty() {
                break;
            }
        }

        context.into_iter().map(Match::Node).collect()
    }

    /// Evaluates the query and returns only node matches.
    pub fn select_nodes(&self, document: &Document) -> Vec<NodeId> {
        self.evaluate(document)
            .into_iter()
            .filter_map(|m| match m {
                Match::Node(id) => Some(id),
                Match::Attribute { .. } => None,
            })
            .collect()
    }
}

fn evaluate_step(document: &Document, node: NodeId, step: &Step) -> Vec<NodeId> {
    match step.axis {
        Axis::SelfNode => vec![node],
        Axis::Child => select_children(document, node, step),
        Axis::Descendant => {
            let mut parents = vec![node];
            parents.extend(document.descendants(node));
            parents
                .into_iter()
                .flat_map(|parent| select_children(document, parent, step))
                .collect()
        }
        Axis::Attribute => Vec::new(),
    }
}

fn select_children(document: &Document, parent: NodeId, step: &Step) -> Vec<NodeId> {
    let candidates = document
        .children(parent)
        .iter()
        .copied()
        .filter(|&child| matches_test(document, child, &step.test));

    match step.position {
        Some(position) => candidates.skip(position - 1).take(1).collect(),
        None => candidates.collect(),
    }
}

fn matches_test(document: &Document, node: NodeId, test: &NodeTest) -> bool {
    match test {
        NodeTest::Name(name) => document.name(node) == Some(name.as_str()),
        NodeTest::AnyElement => document.is_element(node),
        NodeTest::Text => document.text(node).is_some(),
    }
}

struct Parser<'q> {
    query: &'q str,
    position: usize,
}

impl<'q> Parser<'q> {
    fn new(query: &'q str) -> Self {
        Self { query, position: 0 }
    }

    fn parse(mut self) -> Result<Query, QueryError> {
        let mut steps: Vec<Step> = Vec::new();
        self.skip_whitespace();

        let mut axis = Axis::Child;
        if self.peek() == Some('/') {
            self.next();
            if self.peek() == Some('/') {
                self.next();
                axis = Axis::Descendant;
            }
        }

        while !self.is_eof() {
            if let Some(last) = steps.last() {
                if matches!(last.axis, Axis::Attribute) || last.test == NodeTest::Text {
                    return Err(QueryError::TerminalStep {
                        query: self.query.to_string(),
                        step: step_label(last),
                    });
                }
            }

            steps.push(self.parse_step(axis)?);
            self.skip_whitespace();

            match self.peek() {
                None => break,
                Some('/') => {
                    self.next();
                    axis = if self.peek() == Some('/') {
                        self.next();
                        Axis::Descendant
                    } else {
                        Axis::Child
                    };
                    if self.is_eof() && axis == Axis::Descendant {
                        return Err(self.unexpected_end("a step after '//'"));
                    }
                }
                Some(found) => return Err(self.unexpected(found, "'/' or end of query")),
            }
        }

        if steps.is_empty() && axis == Axis::Descendant {
            return Err(self.unexpected_end("a step after '//'"));
        }

        Ok(Query { steps })
    }

    fn parse_step(&mut self, axis: Axis) -> Result<Step, QueryError> {
        self.skip_whitespace();
        match self.peek() {
            Some('.') => {
                self.next();
                Ok(Step {
                    axis: Axis::SelfNode,
                    test: NodeTest::AnyElement,
                    position: None,
                })
            }
            Some('@') => {
                self.next();
                let name = self.parse_name()?;
                Ok(Step {
                    axis: Axis::Attribute,
                    test: NodeTest::Name(name),
                    position: None,
                })
            }
            Some('*') => {
                self.next();
                let position = self.parse_predicate()?;
                Ok(Step {
                    axis,
                    test: NodeTest::AnyElement,
                    position,
                })
            }
            Some(_) => {
                let name = self.parse_name()?;
                let test = if name == "text" && self.peek() == Some('(') {
                    self.next();
                    self.expect(')')?;
                    NodeTest::Text
                } else {
                    NodeTest::Name(name)
                };
                let position = self.parse_predicate()?;
                Ok(Step {
                    axis,
                    test,
                    position,
                })
            }
            None => Err(self.unexpected_end("a step")),
        }
    }

    fn parse_name(&mut self) -> Result<String, QueryError> {
        let start = self.position;
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.' | ':') {
                self.next();
            } else {
                break;
            }
        }
        if start == self.position {
            return match self.peek() {
                Some(found) => Err(self.unexpected(found, "a name")),
                None => Err(self.unexpected_end("a name")),
            };
        }
        Ok(self.query[start..self.position].to_string())
    }

    fn parse_predicate(&mut self) -> Result<Option<usize>, QueryError> {
        if self.peek() != Some('[') {
            return Ok(None);
        }
        self.next();
        self.skip_whitespace();

        let start = self.position;
        while matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
            self.next();
        }
        let digits = &self.query[start..self.position];
        if digits.is_empty() {
            return match self.peek() {
                Some(found) => Err(self.unexpected(found, "a position")),
                None => Err(self.unexpected_end("a position")),
            };
        }
        let value = digits
            .parse::<usize>()
            .ok()
            .filter(|&v| v >= 1)
            .ok_or_else(|| QueryError::InvalidPosition {
                query: self.query.to_string(),
                value: digits.to_string(),
            })?;

        self.skip_whitespace();
        self.expect(']')?;
        Ok(Some(value))
    }

    fn expect(&mut self, expected: char) -> Result<(), QueryError> {
        match self.peek() {
            Some(ch) if ch == expected => {
                self.next();
                Ok(())
            }
            Some(found) => Err(self.unexpected(found, &format!("'{}'", expected))),
            None => Err(self.unexpected_end(&format!("'{}'", expected))),
        }
    }

    fn peek(&self) -> Option<char> {
        self.query[self.position..].chars().next()
    }

    fn next(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.position += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(ch) if ch.is_whitespace()) {
            self.next();
        }
    }

    fn is_eof(&self) -> bool {
        self.position >= self.query.len()
    }

    fn unexpected(&self, found: char, expected: &str) -> QueryError {
        QueryError::UnexpectedToken {
            query: self.query.to_string(),
            position: self.position,
            found,
            expected: expected.to_string(),
        }
    }

    fn unexpected_end(&self, expected: &str) -> QueryError {
        QueryError::UnexpectedEnd {
            query: self.query.to_string(),
            expected: expected.to_string(),
        }
    }
}

fn step_label(step: &Step) -> String {
    match (&step.axis, &step.test) {
        (Axis::Attribute, NodeTest::Name(name)) => format!("@{}", name),
        _ => "text()".to_string(),
    }
}
