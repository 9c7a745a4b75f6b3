//! Minimal CSS selector engine for the virtual DOM.
//!
//! Supported: type (`li`), universal (`*`), `#id`, `.class`, `[attr]`,
//! `[attr='v']`, the descendant and `>` combinators, and `,` groups.
//! Anything else (pseudo-classes, sibling combinators, substring attribute
//! operators) is rejected instead of silently matching nothing.

use std::collections::HashMap;

use super::VirtualNode;
use crate::result::{PageflowError, PageflowResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrTest {
    Exists(String),
    Equals(String, String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// `compounds[i]` is joined to `compounds[i + 1]` by `combinators[i]`
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

/// A parsed selector list
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CssSelector {
    groups: Vec<Complex>,
}

fn unsupported(input: &str, what: &str) -> PageflowError {
    PageflowError::driver(format!("mock driver cannot evaluate css '{input}': {what}"))
}

impl CssSelector {
    pub(crate) fn parse(input: &str) -> PageflowResult<Self> {
        let groups = split_top_level(input)
            .into_iter()
            .map(|g| parse_complex(g.trim(), input))
            .collect::<PageflowResult<Vec<_>>>()?;
        if groups.is_empty() {
            return Err(unsupported(input, "empty selector"));
        }
        Ok(Self { groups })
    }

    /// Whether `nodes[index]` matches any group
    pub(crate) fn matches(&self, dom: &Dom<'_>, index: usize) -> bool {
        self.groups.iter().any(|complex| {
            let last = complex.compounds.len() - 1;
            match_at(complex, last, dom, index)
        })
    }
}

/// Indexed view over a rendered node list
#[derive(Debug)]
pub(crate) struct Dom<'a> {
    pub(crate) nodes: &'a [VirtualNode],
    by_handle: HashMap<&'a str, usize>,
}

impl<'a> Dom<'a> {
    pub(crate) fn new(nodes: &'a [VirtualNode]) -> Self {
        let by_handle = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.handle.as_str(), i))
            .collect();
        Self { nodes, by_handle }
    }

    pub(crate) fn index_of(&self, handle: &str) -> Option<usize> {
        self.by_handle.get(handle).copied()
    }

    pub(crate) fn parent(&self, index: usize) -> Option<usize> {
        self.nodes[index]
            .parent
            .as_deref()
            .and_then(|p| self.index_of(p))
    }

    /// Whether `index` sits strictly below `ancestor`
    pub(crate) fn is_descendant(&self, index: usize, ancestor: usize) -> bool {
        let mut current = self.parent(index);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.parent(p);
        }
        false
    }

    /// Visible only if the node and all its ancestors are visible
    pub(crate) fn is_visible(&self, index: usize) -> bool {
        let mut current = Some(index);
        while let Some(i) = current {
            if !self.nodes[i].visible {
                return false;
            }
            current = self.parent(i);
        }
        true
    }

    /// Own text followed by descendant text, in document order
    pub(crate) fn text_content(&self, index: usize) -> String {
        let mut out = self.nodes[index].text.clone();
        for (i, _) in self.nodes.iter().enumerate().skip(index + 1) {
            if self.is_descendant(i, index) {
                out.push_str(&self.nodes[i].text);
            }
        }
        out
    }
}

fn match_at(complex: &Complex, part: usize, dom: &Dom<'_>, index: usize) -> bool {
    if !compound_matches(&complex.compounds[part], &dom.nodes[index]) {
        return false;
    }
    if part == 0 {
        return true;
    }
    match complex.combinators[part - 1] {
        Combinator::Child => dom
            .parent(index)
            .is_some_and(|p| match_at(complex, part - 1, dom, p)),
        Combinator::Descendant => {
            let mut current = dom.parent(index);
            while let Some(p) = current {
                if match_at(complex, part - 1, dom, p) {
                    return true;
                }
                current = dom.parent(p);
            }
            false
        }
    }
}

fn compound_matches(compound: &Compound, node: &VirtualNode) -> bool {
    if let Some(tag) = &compound.tag {
        if !tag.eq_ignore_ascii_case(&node.tag) {
            return false;
        }
    }
    if let Some(id) = &compound.id {
        if node.attr_value("id").as_deref() != Some(id.as_str()) {
            return false;
        }
    }
    if !compound.classes.iter().all(|c| node.classes.contains(c)) {
        return false;
    }
    compound.attrs.iter().all(|test| match test {
        AttrTest::Exists(name) => node.attr_value(name).is_some(),
        AttrTest::Equals(name, value) => node.attr_value(name).as_deref() == Some(value.as_str()),
    })
}

fn split_top_level(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

fn parse_complex(s: &str, input: &str) -> PageflowResult<Complex> {
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    let mut compounds = Vec::new();
    let mut combinators = Vec::new();
    let mut pending: Option<Combinator> = None;

    while i < chars.len() {
        if chars[i].is_whitespace() {
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            if !compounds.is_empty() && pending.is_none() {
                pending = Some(Combinator::Descendant);
            }
            continue;
        }
        if chars[i] == '>' {
            if compounds.is_empty() {
                return Err(unsupported(input, "leading combinator"));
            }
            pending = Some(Combinator::Child);
            i += 1;
            continue;
        }
        let compound = parse_compound(&chars, &mut i, input)?;
        if !compounds.is_empty() {
            combinators.push(pending.take().unwrap_or(Combinator::Descendant));
        }
        compounds.push(compound);
    }

    if compounds.is_empty() {
        return Err(unsupported(input, "empty selector"));
    }
    if pending == Some(Combinator::Child) {
        return Err(unsupported(input, "dangling combinator"));
    }
    Ok(Complex {
        compounds,
        combinators,
    })
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn read_ident(chars: &[char], i: &mut usize, input: &str) -> PageflowResult<String> {
    let mut out = String::new();
    while *i < chars.len() {
        let c = chars[*i];
        if c == '\\' && *i + 1 < chars.len() {
            out.push(chars[*i + 1]);
            *i += 2;
        } else if is_ident_char(c) {
            out.push(c);
            *i += 1;
        } else {
            break;
        }
    }
    if out.is_empty() {
        return Err(unsupported(input, "expected identifier"));
    }
    Ok(out)
}

fn skip_ws(chars: &[char], i: &mut usize) {
    while *i < chars.len() && chars[*i].is_whitespace() {
        *i += 1;
    }
}

fn parse_attr(chars: &[char], i: &mut usize, input: &str) -> PageflowResult<AttrTest> {
    // caller consumed '['
    skip_ws(chars, i);
    let name = read_ident(chars, i, input)?;
    skip_ws(chars, i);
    match chars.get(*i) {
        Some(']') => {
            *i += 1;
            return Ok(AttrTest::Exists(name));
        }
        Some('=') => *i += 1,
        Some(_) => return Err(unsupported(input, "only [attr] and [attr=value] are supported")),
        None => return Err(unsupported(input, "unterminated attribute")),
    }
    skip_ws(chars, i);
    let value = match chars.get(*i) {
        Some(&q) if q == '\'' || q == '"' => {
            *i += 1;
            let mut v = String::new();
            loop {
                match chars.get(*i) {
                    Some('\\') if *i + 1 < chars.len() => {
                        v.push(chars[*i + 1]);
                        *i += 2;
                    }
                    Some(&c) if c == q => {
                        *i += 1;
                        break;
                    }
                    Some(&c) => {
                        v.push(c);
                        *i += 1;
                    }
                    None => return Err(unsupported(input, "unterminated string")),
                }
            }
            v
        }
        _ => read_ident(chars, i, input)?,
    };
    skip_ws(chars, i);
    if chars.get(*i) != Some(&']') {
        return Err(unsupported(input, "unterminated attribute"));
    }
    *i += 1;
    Ok(AttrTest::Equals(name, value))
}

fn parse_compound(chars: &[char], i: &mut usize, input: &str) -> PageflowResult<Compound> {
    let mut compound = Compound::default();
    let start = *i;
    while *i < chars.len() {
        let c = chars[*i];
        match c {
            '*' if *i == start => *i += 1,
            '#' => {
                *i += 1;
                compound.id = Some(read_ident(chars, i, input)?);
            }
            '.' => {
                *i += 1;
                compound.classes.push(read_ident(chars, i, input)?);
            }
            '[' => {
                *i += 1;
                compound.attrs.push(parse_attr(chars, i, input)?);
            }
            c if is_ident_char(c) && *i == start => {
                compound.tag = Some(read_ident(chars, i, input)?.to_ascii_lowercase());
            }
            c if c.is_whitespace() || c == '>' => break,
            ':' => return Err(unsupported(input, "pseudo-classes are not supported")),
            '+' | '~' => return Err(unsupported(input, "sibling combinators are not supported")),
            other => return Err(unsupported(input, &format!("unexpected '{other}'"))),
        }
    }
    Ok(compound)
}
