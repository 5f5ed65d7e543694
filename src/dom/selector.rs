//! A small CSS selector matcher.
//!
//! Supported: type selectors, `*`, `#id`, `.class`, `[attr]`, `[attr=value]`
//! (value bare or quoted), descendant and child (`>`) combinators, and
//! comma-separated selector lists. Pseudo-classes are rejected.

use super::{DomNode, ElementNode};
use crate::error::{Error, Result};

/// A parsed selector list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selector {
    source: String,
    alternatives: Vec<Complex>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Complex {
    compounds: Vec<Compound>,
    /// `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`.
    combinators: Vec<Combinator>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeMatch>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct AttributeMatch {
    name: String,
    value: Option<String>,
}

impl Selector {
    /// Parse a selector list.
    pub fn parse(source: &str) -> Result<Self> {
        let mut parser = Parser::new(source);
        let mut alternatives = vec![parser.complex()?];
        while parser.chars.next_if_eq(&',').is_some() {
            alternatives.push(parser.complex()?);
        }
        Ok(Self {
            source: source.to_string(),
            alternatives,
        })
    }

    /// The selector text as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `element`, nested inside `ancestors` (outermost first), matches.
    #[must_use]
    pub fn matches(&self, element: &ElementNode, ancestors: &[&ElementNode]) -> bool {
        self.alternatives
            .iter()
            .any(|complex| complex.matches_at(complex.compounds.len() - 1, element, ancestors))
    }
}

impl Complex {
    fn matches_at(&self, index: usize, element: &ElementNode, ancestors: &[&ElementNode]) -> bool {
        if !self.compounds[index].matches(element) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match self.combinators[index - 1] {
            Combinator::Child => ancestors.split_last().is_some_and(|(parent, rest)| {
                self.matches_at(index - 1, parent, rest)
            }),
            Combinator::Descendant => (0..ancestors.len())
                .rev()
                .any(|i| self.matches_at(index - 1, ancestors[i], &ancestors[..i])),
        }
    }
}

impl Compound {
    fn matches(&self, element: &ElementNode) -> bool {
        if let Some(tag) = &self.tag {
            if !tag.eq_ignore_ascii_case(&element.tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.id() != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|class| element.has_class(class)) {
            return false;
        }
        self.attributes
            .iter()
            .all(|attr| match (element.attr(&attr.name), &attr.value) {
                (Some(actual), Some(expected)) => actual == expected,
                (Some(_), None) => true,
                (None, _) => false,
            })
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().peekable(),
        }
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::InvalidSelector {
            selector: self.source.to_string(),
            reason: reason.into(),
        }
    }

    fn skip_whitespace(&mut self) -> bool {
        let mut skipped = false;
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.chars.next();
            skipped = true;
        }
        skipped
    }

    fn complex(&mut self) -> Result<Complex> {
        self.skip_whitespace();
        let mut compounds = vec![self.compound()?];
        let mut combinators = Vec::new();

        loop {
            let spaced = self.skip_whitespace();
            match self.chars.peek().copied() {
                None | Some(',') => break,
                Some('>') => {
                    self.chars.next();
                    self.skip_whitespace();
                    combinators.push(Combinator::Child);
                }
                Some(_) if spaced => combinators.push(Combinator::Descendant),
                Some(c) => return Err(self.error(format!("unexpected '{c}'"))),
            }
            compounds.push(self.compound()?);
        }

        Ok(Complex {
            compounds,
            combinators,
        })
    }

    fn compound(&mut self) -> Result<Compound> {
        let mut compound = Compound::default();
        let mut any = false;

        match self.chars.peek().copied() {
            Some('*') => {
                self.chars.next();
                any = true;
            }
            Some(c) if is_ident_char(c) => {
                compound.tag = Some(self.ident()?);
                any = true;
            }
            _ => {}
        }

        loop {
            match self.chars.peek().copied() {
                Some('#') => {
                    self.chars.next();
                    compound.id = Some(self.ident()?);
                }
                Some('.') => {
                    self.chars.next();
                    compound.classes.push(self.ident()?);
                }
                Some('[') => {
                    self.chars.next();
                    compound.attributes.push(self.attribute()?);
                }
                Some(':') => return Err(self.error("pseudo-classes are not supported")),
                _ => break,
            }
            any = true;
        }

        if any {
            Ok(compound)
        } else {
            Err(self.error("expected a selector"))
        }
    }

    fn attribute(&mut self) -> Result<AttributeMatch> {
        self.skip_whitespace();
        let name = self.ident()?;
        self.skip_whitespace();
        let value = match self.chars.next() {
            Some(']') => return Ok(AttributeMatch { name, value: None }),
            Some('=') => {
                self.skip_whitespace();
                self.attribute_value()?
            }
            _ => return Err(self.error("malformed attribute selector")),
        };
        self.skip_whitespace();
        if self.chars.next() != Some(']') {
            return Err(self.error("unterminated attribute selector"));
        }
        Ok(AttributeMatch {
            name,
            value: Some(value),
        })
    }

    fn attribute_value(&mut self) -> Result<String> {
        match self.chars.peek().copied() {
            Some(quote @ ('"' | '\'')) => {
                self.chars.next();
                let mut value = String::new();
                for c in self.chars.by_ref() {
                    if c == quote {
                        return Ok(value);
                    }
                    value.push(c);
                }
                Err(self.error("unterminated string"))
            }
            _ => self.ident(),
        }
    }

    fn ident(&mut self) -> Result<String> {
        let mut ident = String::new();
        while let Some(c) = self.chars.peek().copied() {
            if !is_ident_char(c) {
                break;
            }
            ident.push(c);
            self.chars.next();
        }
        if ident.is_empty() {
            Err(self.error("expected an identifier"))
        } else {
            Ok(ident)
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

/// All elements under `nodes` matching `selector`, in document order.
#[must_use]
pub fn select_all<'a>(nodes: &'a [DomNode], selector: &Selector) -> Vec<&'a ElementNode> {
    let mut found = Vec::new();
    let mut ancestors = Vec::new();
    walk(nodes, selector, &mut ancestors, &mut found);
    found
}

fn walk<'a>(
    nodes: &'a [DomNode],
    selector: &Selector,
    ancestors: &mut Vec<&'a ElementNode>,
    found: &mut Vec<&'a ElementNode>,
) {
    for node in nodes {
        if let DomNode::Element(element) = node {
            if selector.matches(element, ancestors) {
                found.push(element);
            }
            ancestors.push(element);
            walk(&element.children, selector, ancestors, found);
            ancestors.pop();
        }
    }
}
