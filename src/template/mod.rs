//! Template engine
//!
//! A small Liquid-style language: `{{ expr | filter: arg }}` output,
//! `{% if %}`, `{% unless %}`, `{% for %}`, `{% include %}`, `{% raw %}`
//! and `{% comment %}` blocks, with `{%-` / `-%}` whitespace control.
//! Parsing happens once per template; rendering is a pure function of the
//! parsed template and a [`RenderContext`].

mod context;
mod eval;
mod expr;
pub mod filters;
mod lexer;
mod parser;

use std::collections::HashMap;
use thiserror::Error;

pub use context::RenderContext;
pub use filters::Filters;
pub use parser::Node;

use eval::Evaluator;
use lexer::Lexer;

/// Deepest include nesting before rendering gives up
pub const MAX_INCLUDE_DEPTH: usize = 16;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("line {line}: include `{name}` not found")]
    MissingInclude { name: String, line: usize },

    #[error("line {line}: include `{name}` nested more than {} levels deep", MAX_INCLUDE_DEPTH)]
    IncludeDepth { name: String, line: usize },
}

impl TemplateError {
    pub fn line(&self) -> usize {
        match self {
            TemplateError::Syntax { line, .. }
            | TemplateError::MissingInclude { line, .. }
            | TemplateError::IncludeDepth { line, .. } => *line,
        }
    }
}

/// A parsed template
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    nodes: Vec<Node>,
}

impl Template {
    /// Parse a template source
    pub fn parse(name: &str, source: &str) -> Result<Self, TemplateError> {
        let tokens = Lexer::new(source).tokenize()?;
        let nodes = parser::Parser::new(tokens).parse()?;
        Ok(Self {
            name: name.to_string(),
            nodes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// True when the template has no directives at all
    pub fn is_literal(&self) -> bool {
        self.nodes.iter().all(|n| matches!(n, Node::Text(_)))
    }
}

/// Filters plus the registered include fragments
#[derive(Debug, Clone, Default)]
pub struct Engine {
    filters: Filters,
    includes: HashMap<String, Template>,
}

impl Engine {
    pub fn new(filters: Filters) -> Self {
        Self {
            filters,
            includes: HashMap::new(),
        }
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    /// Parse and register an include fragment under `name`
    pub fn register_include(&mut self, name: &str, source: &str) -> Result<(), TemplateError> {
        let template = Template::parse(name, source)?;
        self.includes.insert(name.to_string(), template);
        Ok(())
    }

    pub fn include(&self, name: &str) -> Option<&Template> {
        self.includes.get(name)
    }

    /// Render a parsed template against a context
    pub fn render(&self, template: &Template, ctx: &RenderContext) -> Result<String, TemplateError> {
        Evaluator::new(self).render(template.nodes(), ctx)
    }

    /// Parse and render in one step
    pub fn render_str(&self, source: &str, ctx: &RenderContext) -> Result<String, TemplateError> {
        let template = Template::parse("inline", source)?;
        self.render(&template, ctx)
    }
}
