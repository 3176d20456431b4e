//! Expressions inside directives: paths, literals, filter pipelines and
//! `if` conditions

use super::{filters, TemplateError};
use crate::content::Value;

/// A value-producing expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// `root.key[index].key`
    Path { root: String, segments: Vec<Segment> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Key(String),
    Index(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterCall {
    pub name: String,
    pub args: Vec<Expr>,
}

/// `expr | filter: a, b | filter`
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub expr: Expr,
    pub filters: Vec<FilterCall>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Contains,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Test(Expr),
    Compare { left: Expr, op: CmpOp, right: Expr },
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
}

/// Loop header: `item in list limit: 3 offset: 1 reversed`
#[derive(Debug, Clone, PartialEq)]
pub struct ForHeader {
    pub var: String,
    pub iterable: Expr,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
    pub reversed: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Dot,
    LBracket,
    RBracket,
    Pipe,
    Colon,
    Comma,
    Assign,
    Op(CmpOp),
}

fn tokenize(src: &str, line: usize) -> Result<Vec<Tok>, TemplateError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '.' => {
                tokens.push(Tok::Dot);
                i += 1;
            }
            '[' => {
                tokens.push(Tok::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Tok::RBracket);
                i += 1;
            }
            '|' => {
                tokens.push(Tok::Pipe);
                i += 1;
            }
            ':' => {
                tokens.push(Tok::Colon);
                i += 1;
            }
            ',' => {
                tokens.push(Tok::Comma);
                i += 1;
            }
            '=' | '!' | '<' | '>' => {
                let next = chars.get(i + 1).copied();
                let (tok, width) = match (c, next) {
                    ('=', Some('=')) => (Tok::Op(CmpOp::Eq), 2),
                    ('!', Some('=')) => (Tok::Op(CmpOp::Ne), 2),
                    ('<', Some('=')) => (Tok::Op(CmpOp::Le), 2),
                    ('>', Some('=')) => (Tok::Op(CmpOp::Ge), 2),
                    ('<', Some('>')) => (Tok::Op(CmpOp::Ne), 2),
                    ('<', _) => (Tok::Op(CmpOp::Lt), 1),
                    ('>', _) => (Tok::Op(CmpOp::Gt), 1),
                    ('=', _) => (Tok::Assign, 1),
                    _ => return Err(syntax(line, format!("unexpected `{}` in `{}`", c, src))),
                };
                tokens.push(tok);
                i += width;
            }
            '"' | '\'' => {
                let quote = c;
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != quote {
                    end += 1;
                }
                if end >= chars.len() {
                    return Err(syntax(line, format!("unterminated string in `{}`", src)));
                }
                tokens.push(Tok::Str(chars[start..end].iter().collect()));
                i = end + 1;
            }
            c if c.is_ascii_digit()
                || (c == '-' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let is_float = chars.get(i) == Some(&'.')
                    && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
                if is_float {
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let tok = if is_float {
                    text.parse().map(Tok::Float).ok()
                } else {
                    text.parse().map(Tok::Int).ok()
                };
                tokens.push(tok.ok_or_else(|| syntax(line, format!("bad number `{}`", text)))?);
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '-' | '?'))
                {
                    i += 1;
                }
                tokens.push(Tok::Ident(chars[start..i].iter().collect()));
            }
            other => {
                return Err(syntax(line, format!("unexpected `{}` in `{}`", other, src)));
            }
        }
    }

    // `contains` is a word operator
    Ok(tokens
        .into_iter()
        .map(|t| match t {
            Tok::Ident(w) if w == "contains" => Tok::Op(CmpOp::Contains),
            t => t,
        })
        .collect())
}

/// Recursive-descent parser over one directive's tokens
struct ExprParser<'a> {
    tokens: Vec<Tok>,
    pos: usize,
    src: &'a str,
    line: usize,
}

impl<'a> ExprParser<'a> {
    fn new(src: &'a str, line: usize) -> Result<Self, TemplateError> {
        Ok(Self {
            tokens: tokenize(src, line)?,
            pos: 0,
            src,
            line,
        })
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Ident(w)) if w == word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn error(&self, message: impl Into<String>) -> TemplateError {
        syntax(self.line, format!("{} in `{}`", message.into(), self.src))
    }

    fn expect_end(&self) -> Result<(), TemplateError> {
        match self.peek() {
            None => Ok(()),
            Some(tok) => Err(self.error(format!("unexpected {:?}", tok))),
        }
    }

    fn ident(&mut self) -> Result<String, TemplateError> {
        match self.next() {
            Some(Tok::Ident(name)) => Ok(name),
            _ => Err(self.error("expected a name")),
        }
    }

    fn expr(&mut self) -> Result<Expr, TemplateError> {
        let root = match self.next() {
            Some(Tok::Str(s)) => return Ok(Expr::Literal(Value::String(s))),
            Some(Tok::Int(n)) => return Ok(Expr::Literal(Value::Integer(n))),
            Some(Tok::Float(n)) => return Ok(Expr::Literal(Value::Float(n))),
            Some(Tok::Ident(word)) => match word.as_str() {
                "true" => return Ok(Expr::Literal(Value::Bool(true))),
                "false" => return Ok(Expr::Literal(Value::Bool(false))),
                "nil" | "null" => return Ok(Expr::Literal(Value::Null)),
                _ => word,
            },
            Some(Tok::LBracket) => {
                // `[ "key" ]` at the root looks up a top-level variable by name
                self.pos -= 1;
                String::new()
            }
            _ => return Err(self.error("expected a value")),
        };

        let mut segments = Vec::new();
        loop {
            if self.eat(&Tok::Dot) {
                segments.push(Segment::Key(self.ident()?));
            } else if self.eat(&Tok::LBracket) {
                let index = self.expr()?;
                if !self.eat(&Tok::RBracket) {
                    return Err(self.error("expected `]`"));
                }
                segments.push(Segment::Index(index));
            } else {
                break;
            }
        }
        Ok(Expr::Path { root, segments })
    }

    fn pipeline(&mut self) -> Result<Pipeline, TemplateError> {
        let expr = self.expr()?;
        let mut filters = Vec::new();
        while self.eat(&Tok::Pipe) {
            let name = self.ident()?;
            if !filters::is_known(&name) {
                return Err(syntax(self.line, format!("unknown filter `{}`", name)));
            }
            let mut args = Vec::new();
            if self.eat(&Tok::Colon) {
                args.push(self.expr()?);
                while self.eat(&Tok::Comma) {
                    args.push(self.expr()?);
                }
            }
            filters.push(FilterCall { name, args });
        }
        Ok(Pipeline { expr, filters })
    }

    /// `and` / `or` chains group from the right
    fn condition(&mut self) -> Result<Condition, TemplateError> {
        let left = self.comparison()?;
        if self.eat_word("and") {
            Ok(Condition::And(Box::new(left), Box::new(self.condition()?)))
        } else if self.eat_word("or") {
            Ok(Condition::Or(Box::new(left), Box::new(self.condition()?)))
        } else {
            Ok(left)
        }
    }

    /// `not` binds tighter than `and` / `or` and looser than comparisons
    fn comparison(&mut self) -> Result<Condition, TemplateError> {
        let negated = matches!(self.peek(), Some(Tok::Ident(w)) if w == "not")
            && self.tokens.len() > self.pos + 1;
        if negated {
            self.pos += 1;
            return Ok(Condition::Not(Box::new(self.comparison()?)));
        }
        let left = self.expr()?;
        match self.peek() {
            Some(Tok::Op(op)) => {
                let op = *op;
                self.pos += 1;
                let right = self.expr()?;
                Ok(Condition::Compare { left, op, right })
            }
            _ => Ok(Condition::Test(left)),
        }
    }

    fn for_header(&mut self) -> Result<ForHeader, TemplateError> {
        let var = self.ident()?;
        if !self.eat_word("in") {
            return Err(self.error("expected `in`"));
        }
        let iterable = self.expr()?;
        let mut header = ForHeader {
            var,
            iterable,
            limit: None,
            offset: None,
            reversed: false,
        };
        while !self.at_end() {
            self.eat(&Tok::Comma);
            let word = self.ident()?;
            match word.as_str() {
                "reversed" => header.reversed = true,
                "limit" | "offset" => {
                    if !self.eat(&Tok::Colon) {
                        return Err(self.error(format!("expected `:` after `{}`", word)));
                    }
                    let value = self.expr()?;
                    if word == "limit" {
                        header.limit = Some(value);
                    } else {
                        header.offset = Some(value);
                    }
                }
                other => return Err(self.error(format!("unknown loop option `{}`", other))),
            }
        }
        Ok(header)
    }

    /// `key=value` pairs, optionally comma separated
    fn params(&mut self) -> Result<Vec<(String, Expr)>, TemplateError> {
        let mut params = Vec::new();
        while !self.at_end() {
            self.eat(&Tok::Comma);
            let key = self.ident()?;
            if !self.eat(&Tok::Assign) && !self.eat(&Tok::Colon) {
                return Err(self.error(format!("expected `=` after `{}`", key)));
            }
            params.push((key, self.expr()?));
        }
        Ok(params)
    }
}

pub fn parse_pipeline(src: &str, line: usize) -> Result<Pipeline, TemplateError> {
    let mut p = ExprParser::new(src, line)?;
    if p.at_end() {
        return Err(syntax(line, "empty output directive"));
    }
    let pipeline = p.pipeline()?;
    p.expect_end()?;
    Ok(pipeline)
}

pub fn parse_condition(src: &str, line: usize) -> Result<Condition, TemplateError> {
    let mut p = ExprParser::new(src, line)?;
    if p.at_end() {
        return Err(syntax(line, "missing condition"));
    }
    let cond = p.condition()?;
    p.expect_end()?;
    Ok(cond)
}

pub fn parse_for(src: &str, line: usize) -> Result<ForHeader, TemplateError> {
    let mut p = ExprParser::new(src, line)?;
    let header = p.for_header()?;
    p.expect_end()?;
    Ok(header)
}

pub fn parse_params(src: &str, line: usize) -> Result<Vec<(String, Expr)>, TemplateError> {
    ExprParser::new(src, line)?.params()
}

fn syntax(line: usize, message: impl Into<String>) -> TemplateError {
    TemplateError::Syntax {
        line,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(root: &str, keys: &[&str]) -> Expr {
        Expr::Path {
            root: root.to_string(),
            segments: keys.iter().map(|k| Segment::Key(k.to_string())).collect(),
        }
    }

    #[test]
    fn test_parse_path_and_filters() {
        let p = parse_pipeline("page.title | truncate: 10, \"..\" | upcase", 1).unwrap();
        assert_eq!(p.expr, path("page", &["title"]));
        assert_eq!(p.filters.len(), 2);
        assert_eq!(p.filters[0].name, "truncate");
        assert_eq!(
            p.filters[0].args,
            vec![
                Expr::Literal(Value::Integer(10)),
                Expr::Literal(Value::from(".."))
            ]
        );
    }

    #[test]
    fn test_parse_index_access() {
        let p = parse_pipeline("site.data[\"people\"][0].name", 1).unwrap();
        match p.expr {
            Expr::Path { root, segments } => {
                assert_eq!(root, "site");
                assert_eq!(segments.len(), 4);
                assert_eq!(segments[2], Segment::Index(Expr::Literal(Value::Integer(0))));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_conditions_group_right() {
        let c = parse_condition("a or b and c", 1).unwrap();
        match c {
            Condition::Or(left, right) => {
                assert_eq!(*left, Condition::Test(path("a", &[])));
                assert!(matches!(*right, Condition::And(_, _)));
            }
            other => panic!("unexpected {:?}", other),
        }
        let c = parse_condition("page.tags contains \"rust\"", 1).unwrap();
        assert!(matches!(c, Condition::Compare { op: CmpOp::Contains, .. }));
        assert!(matches!(
            parse_condition("x <= -2", 1).unwrap(),
            Condition::Compare { op: CmpOp::Le, right: Expr::Literal(Value::Integer(-2)), .. }
        ));
    }

    #[test]
    fn test_not_prefix() {
        assert_eq!(
            parse_condition("not page.draft", 1).unwrap(),
            Condition::Not(Box::new(Condition::Test(path("page", &["draft"]))))
        );
        match parse_condition("not a == 1 and b", 1).unwrap() {
            Condition::And(left, right) => {
                assert!(matches!(*left, Condition::Not(ref c) if matches!(**c, Condition::Compare { .. })));
                assert_eq!(*right, Condition::Test(path("b", &[])));
            }
            other => panic!("unexpected {:?}", other),
        }
        // a lone `not` is just a variable name
        assert_eq!(parse_condition("not", 1).unwrap(), Condition::Test(path("not", &[])));
    }

    #[test]
    fn test_for_header() {
        let h = parse_for("post in site.posts limit: 2 offset: 1 reversed", 1).unwrap();
        assert_eq!(h.var, "post");
        assert_eq!(h.iterable, path("site", &["posts"]));
        assert_eq!(h.limit, Some(Expr::Literal(Value::Integer(2))));
        assert!(h.reversed);
        assert!(parse_for("post of posts", 1).is_err());
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse_pipeline("", 1).is_err());
        assert!(parse_pipeline("a b", 1).is_err());
        assert!(parse_pipeline("'open", 1).is_err());
        assert!(parse_pipeline("x | nope", 1).is_err());
        assert!(parse_condition("x ==", 1).is_err());
    }

    #[test]
    fn test_params() {
        let params = parse_params("title=\"Hi\" count=3, page=page.url", 1).unwrap();
        assert_eq!(params.len(), 3);
        assert_eq!(params[2].1, path("page", &["url"]));
    }
}
