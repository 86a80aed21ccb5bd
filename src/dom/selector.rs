//! A small CSS selector engine covering what fill scripts and label lookup use:
//! type, `*`, `#id`, `.class`, `[attr]`, `[attr=value]`, descendant and child
//! combinators, and comma-separated groups.

use super::{Document, NodeId};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    groups: Vec<Vec<SelectorPart>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SelectorPart {
    step: SelectorStep,
    // Relation to the part on the left.
    combinator: Combinator,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SelectorStep {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrCondition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrCondition {
    Exists(String),
    Equals(String, String),
}

impl Selector {
    pub fn parse(selector: &str) -> Result<Self> {
        let mut parser = Parser {
            chars: selector.chars().collect(),
            pos: 0,
            source: selector,
        };
        let mut groups = Vec::new();
        loop {
            groups.push(parser.chain()?);
            parser.skip_whitespace();
            match parser.peek() {
                None => break,
                Some(',') => parser.pos += 1,
                Some(_) => return Err(parser.unsupported()),
            }
        }
        Ok(Self { groups })
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        doc.is_element(node) && self.groups.iter().any(|parts| matches_from(doc, node, parts))
    }
}

fn matches_from(doc: &Document, node: NodeId, parts: &[SelectorPart]) -> bool {
    let Some((last, rest)) = parts.split_last() else {
        return false;
    };
    if !last.step.matches(doc, node) {
        return false;
    }
    if rest.is_empty() {
        return true;
    }
    match last.combinator {
        Combinator::Child => doc
            .parent_element(node)
            .is_some_and(|parent| matches_from(doc, parent, rest)),
        Combinator::Descendant => {
            let mut cursor = doc.parent_element(node);
            while let Some(ancestor) = cursor {
                if matches_from(doc, ancestor, rest) {
                    return true;
                }
                cursor = doc.parent_element(ancestor);
            }
            false
        }
    }
}

impl SelectorStep {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        if let Some(tag) = &self.tag {
            if !doc.is_tag(node, tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if doc.attribute(node, "id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|class| doc.has_class(node, class)) {
            return false;
        }
        self.attrs.iter().all(|condition| match condition {
            AttrCondition::Exists(name) => doc.attribute(node, name).is_some(),
            AttrCondition::Equals(name, expected) => match doc.attribute(node, name) {
                // `type` values are matched ASCII case-insensitively in HTML.
                Some(actual) if name == "type" => actual.eq_ignore_ascii_case(expected),
                Some(actual) => actual == expected,
                None => false,
            },
        })
    }
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    source: &'a str,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn unsupported(&self) -> Error {
        Error::UnsupportedSelector(self.source.to_string())
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn chain(&mut self) -> Result<Vec<SelectorPart>> {
        self.skip_whitespace();
        let mut parts = Vec::new();
        let mut combinator = Combinator::Descendant;
        loop {
            let step = self.compound()?;
            parts.push(SelectorPart { step, combinator });
            let had_whitespace = self.skip_whitespace();
            match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.pos += 1;
                    self.skip_whitespace();
                    combinator = Combinator::Child;
                }
                Some(_) if had_whitespace => combinator = Combinator::Descendant,
                Some(_) => return Err(self.unsupported()),
            }
        }
        Ok(parts)
    }

    fn compound(&mut self) -> Result<SelectorStep> {
        let mut step = SelectorStep::default();
        let mut consumed = false;
        match self.peek() {
            Some('*') => {
                self.pos += 1;
                consumed = true;
            }
            Some(ch) if is_ident_char(ch) || ch == '\\' => {
                step.tag = Some(self.ident()?.to_ascii_lowercase());
                consumed = true;
            }
            _ => {}
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    step.id = Some(self.ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    step.classes.push(self.ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    step.attrs.push(self.attribute()?);
                }
                _ => break,
            }
            consumed = true;
        }
        if consumed {
            Ok(step)
        } else {
            Err(self.unsupported())
        }
    }

    fn ident(&mut self) -> Result<String> {
        let mut out = String::new();
        while let Some(ch) = self.peek() {
            if ch == '\\' {
                self.pos += 1;
                let escaped = self.peek().ok_or_else(|| self.unsupported())?;
                out.push(escaped);
                self.pos += 1;
            } else if is_ident_char(ch) {
                out.push(ch);
                self.pos += 1;
            } else {
                break;
            }
        }
        if out.is_empty() {
            return Err(self.unsupported());
        }
        Ok(out)
    }

    fn quoted(&mut self, quote: char) -> Result<String> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.unsupported()),
                Some('\\') => {
                    self.pos += 1;
                    let escaped = self.peek().ok_or_else(|| self.unsupported())?;
                    out.push(escaped);
                    self.pos += 1;
                }
                Some(ch) if ch == quote => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(ch) => {
                    out.push(ch);
                    self.pos += 1;
                }
            }
        }
    }

    fn attribute(&mut self) -> Result<AttrCondition> {
        self.skip_whitespace();
        let name = self.ident()?.to_ascii_lowercase();
        self.skip_whitespace();
        let condition = match self.peek() {
            Some(']') => AttrCondition::Exists(name),
            Some('=') => {
                self.pos += 1;
                self.skip_whitespace();
                let value = match self.peek() {
                    Some(quote @ ('\'' | '"')) => self.quoted(quote)?,
                    _ => self.ident()?,
                };
                self.skip_whitespace();
                AttrCondition::Equals(name, value)
            }
            _ => return Err(self.unsupported()),
        };
        if self.peek() != Some(']') {
            return Err(self.unsupported());
        }
        self.pos += 1;
        Ok(condition)
    }
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '-' || ch == '_' || !ch.is_ascii()
}

/// Escape a value for use inside a single-quoted attribute selector.
pub fn escape_attribute_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, ':' | '\\' | '.' | '\'') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
