//! Template parser - turns lexer tokens into a node tree

use super::expr::{self, Condition, Expr, ForHeader, Pipeline};
use super::lexer::Token;
use super::TemplateError;

/// AST node types
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text
    Text(String),

    /// `{{ pipeline }}`
    Output(Pipeline),

    /// `if` / `elsif` / `else`; `unless` becomes a negated first branch
    If {
        branches: Vec<(Condition, Vec<Node>)>,
        otherwise: Option<Vec<Node>>,
    },

    /// `for ... in ...` with an optional `else` for empty iterables
    For {
        header: ForHeader,
        body: Vec<Node>,
        empty: Option<Vec<Node>>,
    },

    /// `include name key=value ...`
    Include {
        name: String,
        params: Vec<(String, Expr)>,
        line: usize,
    },
}

/// Where a block body stopped
struct Stop {
    tag: String,
    args: String,
    line: usize,
}

/// Parser that converts tokens to AST
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    /// Parse the whole token stream
    pub fn parse(&mut self) -> Result<Vec<Node>, TemplateError> {
        let (nodes, stop) = self.parse_nodes(&[])?;
        match stop {
            None => Ok(nodes),
            Some(stop) => Err(unexpected(&stop)),
        }
    }

    /// Parse nodes until one of `terminators` (or the end of input)
    fn parse_nodes(&mut self, terminators: &[&str]) -> Result<(Vec<Node>, Option<Stop>), TemplateError> {
        let mut nodes = Vec::new();

        while self.pos < self.tokens.len() {
            let token = self.tokens[self.pos].clone();
            self.pos += 1;
            match token {
                Token::Text(text) => nodes.push(Node::Text(text)),
                Token::Output { source, line } => {
                    nodes.push(Node::Output(expr::parse_pipeline(&source, line)?));
                }
                Token::Tag { source, line } => {
                    let (tag, args) = split_tag(&source);
                    if terminators.contains(&tag) || is_block_boundary(tag) {
                        return Ok((
                            nodes,
                            Some(Stop {
                                tag: tag.to_string(),
                                args: args.to_string(),
                                line,
                            }),
                        ));
                    }
                    nodes.push(self.parse_tag(tag, args, line)?);
                }
            }
        }

        Ok((nodes, None))
    }

    fn parse_tag(&mut self, tag: &str, args: &str, line: usize) -> Result<Node, TemplateError> {
        match tag {
            "if" => self.parse_if(args, line, false),
            "unless" => self.parse_if(args, line, true),
            "for" => self.parse_for(args, line),
            "include" => parse_include(args, line),
            other => Err(TemplateError::Syntax {
                line,
                message: format!("unknown tag `{}`", other),
            }),
        }
    }

    fn parse_if(&mut self, args: &str, line: usize, negate: bool) -> Result<Node, TemplateError> {
        let (open, close) = if negate {
            ("unless", "endunless")
        } else {
            ("if", "endif")
        };

        let mut cond = expr::parse_condition(args, line)?;
        if negate {
            cond = Condition::Not(Box::new(cond));
        }

        let mut branches = Vec::new();
        let mut otherwise = None;
        let mut current = cond;

        loop {
            let (body, stop) = self.parse_nodes(&[close, "elsif", "else"])?;
            let stop = stop.ok_or_else(|| unclosed(open, line))?;
            match stop.tag.as_str() {
                "elsif" => {
                    let next = expr::parse_condition(&stop.args, stop.line)?;
                    branches.push((std::mem::replace(&mut current, next), body));
                }
                "else" => {
                    branches.push((current, body));
                    let (body, stop) = self.parse_nodes(&[close])?;
                    let stop = stop.ok_or_else(|| unclosed(open, line))?;
                    if stop.tag != close {
                        return Err(unexpected(&stop));
                    }
                    otherwise = Some(body);
                    break;
                }
                t if t == close => {
                    branches.push((current, body));
                    break;
                }
                _ => return Err(unexpected(&stop)),
            }
        }

        Ok(Node::If {
            branches,
            otherwise,
        })
    }

    fn parse_for(&mut self, args: &str, line: usize) -> Result<Node, TemplateError> {
        let header = expr::parse_for(args, line)?;
        let (body, stop) = self.parse_nodes(&["endfor", "else"])?;
        let stop = stop.ok_or_else(|| unclosed("for", line))?;

        let empty = match stop.tag.as_str() {
            "endfor" => None,
            "else" => {
                let (empty, stop) = self.parse_nodes(&["endfor"])?;
                let stop = stop.ok_or_else(|| unclosed("for", line))?;
                if stop.tag != "endfor" {
                    return Err(unexpected(&stop));
                }
                Some(empty)
            }
            _ => return Err(unexpected(&stop)),
        };

        Ok(Node::For {
            header,
            body,
            empty,
        })
    }
}

/// `include nav.html title="x"`: the name is a bare or quoted file path
fn parse_include(args: &str, line: usize) -> Result<Node, TemplateError> {
    let args = args.trim();
    let (name, rest) = if let Some(quoted) = args.strip_prefix('"').or_else(|| args.strip_prefix('\'')) {
        let quote = &args[..1];
        match quoted.find(quote) {
            Some(end) => (&quoted[..end], &quoted[end + 1..]),
            None => {
                return Err(TemplateError::Syntax {
                    line,
                    message: "unterminated include name".to_string(),
                })
            }
        }
    } else {
        args.split_once(char::is_whitespace).unwrap_or((args, ""))
    };

    if name.is_empty() {
        return Err(TemplateError::Syntax {
            line,
            message: "include needs a file name".to_string(),
        });
    }

    Ok(Node::Include {
        name: name.to_string(),
        params: expr::parse_params(rest, line)?,
        line,
    })
}

fn split_tag(source: &str) -> (&str, &str) {
    let source = source.trim();
    match source.split_once(char::is_whitespace) {
        Some((tag, args)) => (tag, args.trim()),
        None => (source, ""),
    }
}

/// Tags that only make sense inside an enclosing block
fn is_block_boundary(tag: &str) -> bool {
    matches!(tag, "else" | "elsif" | "endif" | "endunless" | "endfor" | "endraw" | "endcomment")
}

fn unclosed(tag: &str, line: usize) -> TemplateError {
    TemplateError::Syntax {
        line,
        message: format!("`{{% {} %}}` is never closed", tag),
    }
}

fn unexpected(stop: &Stop) -> TemplateError {
    TemplateError::Syntax {
        line: stop.line,
        message: format!("unexpected `{{% {} %}}`", stop.tag),
    }
}
