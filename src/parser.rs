//! Parser for the router's nested-block configuration text.
//!
//! The grammar is a sequence of `key [arg ...]` statements, each terminated
//! by a newline or followed by a `{ ... }` block:
//!
//! ```text
//! blacklist {
//!     dns-redirect-ip 0.0.0.0
//!     exclude apple.com
//!     hosts {
//!         include beap.gemini.yahoo.com
//!         source adaway {
//!             description "Blocking mobile ad providers"
//!             prefix "127.0.0.1 "
//!             url http://adaway.org/hosts.txt
//!         }
//!     }
//! }
//! ```
//!
//! Text is first tokenized and read into an untyped [`Node`] tree, which is
//! then resolved into a typed [`ConfigTree`]. The untyped tree never leaves
//! this module.

use std::collections::BTreeSet;
use std::iter::Peekable;
use std::path::PathBuf;
use std::str::Chars;
use tracing::debug;

use crate::config::Settings;
use crate::error::EdgeblockError;
use crate::model::{ConfigTree, Origin, RuleGroup, Source, Wildcard, PRE_CONFIGURED};

const DEFAULT_IP: &str = "0.0.0.0";

/// Deepest block nesting accepted; real router configs stay below ten.
const MAX_DEPTH: usize = 64;

type ParseResult<T> = Result<T, EdgeblockError>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Open,
    Close,
    Newline,
}

/// Untyped statement: `key args... [{ children }]`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    key: String,
    args: Vec<String>,
    children: Option<Vec<Node>>,
    line: usize,
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(raw: &'a str) -> Self {
        Self {
            chars: raw.chars().peekable(),
            line: 1,
        }
    }

    fn tokenize(mut self) -> ParseResult<Vec<(Token, usize)>> {
        let mut tokens = Vec::new();

        while let Some(&c) = self.chars.peek() {
            match c {
                '\n' => {
                    self.chars.next();
                    tokens.push((Token::Newline, self.line));
                    self.line += 1;
                }
                c if c.is_whitespace() => {
                    self.chars.next();
                }
                '{' => {
                    self.chars.next();
                    tokens.push((Token::Open, self.line));
                }
                '}' => {
                    self.chars.next();
                    tokens.push((Token::Close, self.line));
                }
                '"' => {
                    let line = self.line;
                    let word = self.quoted()?;
                    tokens.push((Token::Word(word), line));
                }
                '#' => self.skip_line(),
                '/' if self.starts_block_comment() => self.skip_block_comment()?,
                _ => {
                    let word = self.bare();
                    tokens.push((Token::Word(word), self.line));
                }
            }
        }

        Ok(tokens)
    }

    fn quoted(&mut self) -> ParseResult<String> {
        let start = self.line;
        self.chars.next();
        let mut word = String::new();

        loop {
            match self.chars.next() {
                Some('"') => return Ok(word),
                Some('\\') => match self.chars.next() {
                    Some(escaped) => word.push(escaped),
                    None => break,
                },
                Some(c) => {
                    if c == '\n' {
                        self.line += 1;
                    }
                    word.push(c);
                }
                None => break,
            }
        }

        Err(EdgeblockError::malformed(start, "unterminated quoted string"))
    }

    fn bare(&mut self) -> String {
        let mut word = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() || c == '{' || c == '}' || c == '"' {
                break;
            }
            word.push(c);
            self.chars.next();
        }
        word
    }

    fn skip_line(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c == '\n' {
                break;
            }
            self.chars.next();
        }
    }

    fn starts_block_comment(&self) -> bool {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.peek() == Some(&'*')
    }

    fn skip_block_comment(&mut self) -> ParseResult<()> {
        let start = self.line;
        self.chars.next();
        self.chars.next();

        let mut prev = '\0';
        for c in self.chars.by_ref() {
            if c == '\n' {
                self.line += 1;
            }
            if prev == '*' && c == '/' {
                return Ok(());
            }
            prev = c;
        }

        Err(EdgeblockError::malformed(start, "unterminated comment"))
    }
}

/// Recursive-descent reader over the token stream.
struct Reader {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
}

impl Reader {
    fn next(&mut self) -> Option<(Token, usize)> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    /// Read statements until the closing brace of the block opened at
    /// `opened_at`, or until end of input at the top level.
    fn block(&mut self, opened_at: Option<usize>) -> ParseResult<Vec<Node>> {
        let mut nodes = Vec::new();

        loop {
            let Some((token, line)) = self.next() else {
                return match opened_at {
                    Some(open) => Err(EdgeblockError::malformed(open, "unterminated block")),
                    None => Ok(nodes),
                };
            };

            match token {
                Token::Newline => continue,
                Token::Close => {
                    return match opened_at {
                        Some(_) => Ok(nodes),
                        None => Err(EdgeblockError::malformed(line, "unexpected '}'")),
                    };
                }
                Token::Open => {
                    return Err(EdgeblockError::malformed(line, "block without a key"));
                }
                Token::Word(key) => nodes.push(self.statement(key, line)?),
            }
        }
    }

    fn statement(&mut self, key: String, line: usize) -> ParseResult<Node> {
        let mut args = Vec::new();
        while let Some(Token::Word(_)) = self.peek() {
            if let Some((Token::Word(arg), _)) = self.next() {
                args.push(arg);
            }
        }

        let children = match self.peek() {
            Some(Token::Open) => {
                self.next();
                if self.depth >= MAX_DEPTH {
                    return Err(EdgeblockError::malformed(line, "blocks nested too deeply"));
                }
                self.depth += 1;
                let children = self.block(Some(line))?;
                self.depth -= 1;
                Some(children)
            }
            _ => None,
        };

        Ok(Node {
            key,
            args,
            children,
            line,
        })
    }
}

fn read_nodes(raw: &str) -> ParseResult<Vec<Node>> {
    let tokens = Lexer::new(raw).tokenize()?;
    Reader {
        tokens,
        pos: 0,
        depth: 0,
    }
    .block(None)
}

/// Resolves raw configuration text into a [`ConfigTree`].
pub struct Parser<'s> {
    nodes: &'s [String],
    wildcard: &'s Wildcard,
}

impl<'s> Parser<'s> {
    pub fn new(settings: &'s Settings) -> Self {
        Self {
            nodes: &settings.nodes,
            wildcard: &settings.wildcard,
        }
    }

    pub fn parse(&self, raw: &str) -> ParseResult<ConfigTree> {
        let nodes = read_nodes(raw)?;
        let mut groups = Vec::new();
        self.collect_groups(&nodes, None, &mut groups)?;
        Ok(ConfigTree { groups })
    }

    fn is_group(&self, key: &str) -> bool {
        self.nodes.iter().any(|n| n == key)
    }

    fn collect_groups(
        &self,
        nodes: &[Node],
        parent: Option<&RuleGroup>,
        out: &mut Vec<RuleGroup>,
    ) -> ParseResult<()> {
        for node in nodes {
            let Some(children) = &node.children else {
                continue;
            };

            if self.is_group(&node.key) {
                if out.iter().any(|g| g.name == node.key) {
                    return Err(EdgeblockError::malformed(
                        node.line,
                        format!("duplicate group '{}'", node.key),
                    ));
                }
                let group = self.group(node, children, parent)?;
                let nested: Vec<Node> = children
                    .iter()
                    .filter(|c| c.children.is_some() && self.is_group(&c.key))
                    .cloned()
                    .collect();
                out.push(group.clone());
                self.collect_groups(&nested, Some(&group), out)?;
            } else if parent.is_none() {
                self.collect_groups(children, None, out)?;
            }
        }
        Ok(())
    }

    fn group(
        &self,
        node: &Node,
        children: &[Node],
        parent: Option<&RuleGroup>,
    ) -> ParseResult<RuleGroup> {
        let mut group = RuleGroup {
            name: node.key.clone(),
            ip: parent
                .map(|p| p.ip.clone())
                .unwrap_or_else(|| DEFAULT_IP.to_string()),
            ..Default::default()
        };
        let mut disabled = false;

        for child in children {
            match child.key.as_str() {
                "disabled" => disabled = flag(child)?,
                "ip" | "dns-redirect-ip" => group.ip = value(child),
                "exclude" | "excludes" => group.excludes.extend(values(child)),
                "include" | "includes" => group.includes.extend(values(child)),
                "source" | "sources" => {
                    for (name, body, line) in source_bodies(child) {
                        let Some(source) = build_source(&group.name, name, body, line)? else {
                            continue;
                        };
                        if name == PRE_CONFIGURED || group.sources.contains_key(name) {
                            return Err(EdgeblockError::malformed(
                                line,
                                format!("duplicate source '{}' in group '{}'", name, group.name),
                            ));
                        }
                        group.sources.insert(name.to_string(), source);
                    }
                }
                key if self.is_group(key) => {}
                key => debug!("Ignoring key '{}' in group '{}'", key, group.name),
            }
        }

        group.disabled = disabled || parent.is_some_and(|p| p.disabled);

        if let Some(pre) = self.pre_configured(&group) {
            group.sources.insert(PRE_CONFIGURED.to_string(), pre);
        }

        Ok(group)
    }

    /// Inline source carrying the group's emittable include entries.
    fn pre_configured(&self, group: &RuleGroup) -> Option<Source> {
        let lines: Vec<&str> = group
            .includes
            .iter()
            .map(String::as_str)
            .filter(|i| !self.wildcard.is_pattern(i))
            .collect();
        if lines.is_empty() {
            return None;
        }

        Some(Source {
            name: PRE_CONFIGURED.to_string(),
            disabled: false,
            description: format!("pre-configured {} entries", group.name),
            prefix: String::new(),
            ip: None,
            origin: Origin::Inline(lines.join("\n")),
        })
    }
}

/// Parse with default group names and wildcard.
pub fn parse(raw: &str) -> ParseResult<ConfigTree> {
    let settings = Settings::default();
    Parser::new(&settings).parse(raw)
}

/// Accepts `source NAME { .. }`, `sources NAME { .. }` and
/// `sources { NAME { .. } .. }`.
fn source_bodies(node: &Node) -> Vec<(&str, &[Node], usize)> {
    const EMPTY: &[Node] = &[];
    match (node.args.first(), &node.children) {
        (Some(name), Some(body)) => vec![(name.as_str(), body.as_slice(), node.line)],
        (Some(name), None) => vec![(name.as_str(), EMPTY, node.line)],
        (None, Some(entries)) => entries
            .iter()
            .map(|e| {
                let body = e.children.as_deref().unwrap_or(EMPTY);
                (e.key.as_str(), body, e.line)
            })
            .collect(),
        (None, None) => Vec::new(),
    }
}

fn build_source(
    group: &str,
    name: &str,
    body: &[Node],
    line: usize,
) -> ParseResult<Option<Source>> {
    let mut disabled = false;
    let mut description = String::new();
    let mut prefix = String::new();
    let mut ip = None;
    let mut file = None;
    let mut url = None;

    for child in body {
        match child.key.as_str() {
            "disabled" => disabled = flag(child)?,
            "description" => description = value(child),
            "prefix" => prefix = value(child),
            "ip" | "dns-redirect-ip" => ip = Some(value(child)).filter(|v| !v.is_empty()),
            "file" => file = Some(value(child)).filter(|v| !v.is_empty()),
            "url" => url = Some(value(child)).filter(|v| !v.is_empty()),
            key => debug!("Ignoring key '{}' in source '{}/{}'", key, group, name),
        }
    }

    let origin = match (file, url) {
        (Some(path), None) => Origin::File(PathBuf::from(path)),
        (None, Some(url)) => Origin::Url(url),
        (Some(path), Some(_)) if disabled => Origin::File(PathBuf::from(path)),
        (None, None) if disabled => {
            debug!("Dropping disabled source '{}/{}' without origin", group, name);
            return Ok(None);
        }
        (Some(_), Some(_)) => {
            return Err(EdgeblockError::malformed(
                line,
                format!("source '{}/{}' sets both file and url", group, name),
            ));
        }
        (None, None) => {
            return Err(EdgeblockError::malformed(
                line,
                format!("source '{}/{}' needs a file or url", group, name),
            ));
        }
    };

    Ok(Some(Source {
        name: name.to_string(),
        disabled,
        description,
        prefix,
        ip,
        origin,
    }))
}

fn value(node: &Node) -> String {
    node.args.join(" ")
}

/// Sequence values: inline args plus the keys (and args) of a child block.
fn values(node: &Node) -> BTreeSet<String> {
    let mut out: BTreeSet<String> = node.args.iter().cloned().collect();
    for child in node.children.iter().flatten() {
        out.insert(child.key.clone());
        out.extend(child.args.iter().cloned());
    }
    out.retain(|v| !v.trim().is_empty());
    out
}

fn flag(node: &Node) -> ParseResult<bool> {
    match node.args.first().map(String::as_str) {
        None | Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(other) => Err(EdgeblockError::malformed(
            node.line,
            format!("'{}' expects true or false, got '{}'", node.key, other),
        )),
    }
}
