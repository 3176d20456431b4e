//! Template lexer - splits source into literal text, `{{ output }}` and
//! `{% tag %}` tokens

use super::TemplateError;

/// Token types produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Raw text content
    Text(String),
    /// Output directive: `{{ ... }}`
    Output { source: String, line: usize },
    /// Tag directive: `{% ... %}`
    Tag { source: String, line: usize },
}

/// Lexer over a template source
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    tokens: Vec<Token>,
    /// Set by a `-%}` / `-}}` closer: strip leading whitespace of the next text
    trim_next: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            tokens: Vec::new(),
            trim_next: false,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(mut self) -> Result<Vec<Token>, TemplateError> {
        let src = self.src;
        while self.pos < src.len() {
            let rest = &src[self.pos..];
            let next = find_open(rest);

            let Some((offset, is_tag)) = next else {
                self.push_text(rest);
                self.advance(rest.len());
                break;
            };

            self.push_text(&rest[..offset]);
            self.advance(offset);

            if is_tag {
                self.read_tag()?;
            } else {
                self.read_output()?;
            }
        }
        Ok(self.tokens)
    }

    fn read_output(&mut self) -> Result<(), TemplateError> {
        let line = self.line;
        let src = self.src;
        let rest = &src[self.pos..];
        let Some(close) = rest.find("}}") else {
            return Err(syntax(line, "unclosed `{{`"));
        };
        let (inner, trim_left, trim_right) = trim_markers(&rest[2..close]);
        if trim_left {
            self.trim_previous();
        }
        self.tokens.push(Token::Output {
            source: inner.trim().to_string(),
            line,
        });
        self.trim_next = trim_right;
        self.advance(close + 2);
        Ok(())
    }

    fn read_tag(&mut self) -> Result<(), TemplateError> {
        let line = self.line;
        let src = self.src;
        let rest = &src[self.pos..];
        let Some(close) = rest.find("%}") else {
            return Err(syntax(line, "unclosed `{%`"));
        };
        let (inner, trim_left, trim_right) = trim_markers(&rest[2..close]);
        let inner = inner.trim().to_string();
        if trim_left {
            self.trim_previous();
        }
        self.advance(close + 2);

        let name = inner.split_whitespace().next().unwrap_or("");
        match name {
            "raw" => {
                let body = self.read_until_end_tag("endraw", line)?;
                if !body.is_empty() {
                    self.tokens.push(Token::Text(body));
                }
            }
            "comment" => {
                self.read_until_end_tag("endcomment", line)?;
            }
            _ => {
                self.tokens.push(Token::Tag {
                    source: inner,
                    line,
                });
                self.trim_next = trim_right;
            }
        }
        Ok(())
    }

    /// Consume everything up to and including `{% end_name %}`,
    /// returning the text in between verbatim.
    fn read_until_end_tag(&mut self, end_name: &str, line: usize) -> Result<String, TemplateError> {
        let src = self.src;
        let rest = &src[self.pos..];
        let mut search = 0;
        while let Some(open) = rest[search..].find("{%") {
            let start = search + open;
            let Some(close) = rest[start..].find("%}") else {
                break;
            };
            let (inner, _, trim_right) = trim_markers(&rest[start + 2..start + close]);
            if inner.trim() == end_name {
                let body = rest[..start].to_string();
                self.advance(start + close + 2);
                self.trim_next = trim_right;
                return Ok(body);
            }
            search = start + 2;
        }
        Err(syntax(line, format!("missing `{{% {} %}}`", end_name)))
    }

    fn push_text(&mut self, text: &str) {
        let text = if std::mem::take(&mut self.trim_next) {
            text.trim_start()
        } else {
            text
        };
        if !text.is_empty() {
            self.tokens.push(Token::Text(text.to_string()));
        }
    }

    /// Strip trailing whitespace from the preceding text token
    fn trim_previous(&mut self) {
        if let Some(Token::Text(text)) = self.tokens.last_mut() {
            let trimmed = text.trim_end().len();
            text.truncate(trimmed);
            if text.is_empty() {
                self.tokens.pop();
            }
        }
    }

    fn advance(&mut self, n: usize) {
        self.line += self.src[self.pos..self.pos + n].matches('\n').count();
        self.pos += n;
    }
}

/// Position of the next `{{` or `{%`, and whether it is a tag
fn find_open(s: &str) -> Option<(usize, bool)> {
    let output = s.find("{{");
    let tag = s.find("{%");
    match (output, tag) {
        (Some(o), Some(t)) if t < o => Some((t, true)),
        (Some(o), _) => Some((o, false)),
        (None, Some(t)) => Some((t, true)),
        (None, None) => None,
    }
}

/// Remove `-` whitespace-control markers from directive contents
fn trim_markers(inner: &str) -> (&str, bool, bool) {
    let (inner, left) = match inner.strip_prefix('-') {
        Some(rest) => (rest, true),
        None => (inner, false),
    };
    let (inner, right) = match inner.strip_suffix('-') {
        Some(rest) => (rest, true),
        None => (inner, false),
    };
    (inner, left, right)
}

fn syntax(line: usize, message: impl Into<String>) -> TemplateError {
    TemplateError::Syntax {
        line,
        message: message.into(),
    }
}
