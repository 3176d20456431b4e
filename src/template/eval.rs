//! Evaluator - renders a node tree against a context

use indexmap::IndexMap;
use std::borrow::Cow;

use super::context::Scope;
use super::expr::{CmpOp, Condition, Expr, ForHeader, Pipeline, Segment};
use super::parser::Node;
use super::{Engine, RenderContext, TemplateError, MAX_INCLUDE_DEPTH};
use crate::content::Value;

pub(crate) struct Evaluator<'e> {
    engine: &'e Engine,
}

impl<'e> Evaluator<'e> {
    pub fn new(engine: &'e Engine) -> Self {
        Self { engine }
    }

    pub fn render(&self, nodes: &[Node], ctx: &RenderContext) -> Result<String, TemplateError> {
        let mut out = String::new();
        self.render_nodes(nodes, &Scope::Root(ctx), &mut out, 0)?;
        Ok(out)
    }

    fn render_nodes(
        &self,
        nodes: &[Node],
        scope: &Scope<'_>,
        out: &mut String,
        depth: usize,
    ) -> Result<(), TemplateError> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Output(pipeline) => {
                    out.push_str(&self.eval_pipeline(pipeline, scope).to_output_string());
                }
                Node::If {
                    branches,
                    otherwise,
                } => {
                    let taken = branches.iter().find(|(cond, _)| self.test(cond, scope));
                    match (taken, otherwise) {
                        (Some((_, body)), _) => self.render_nodes(body, scope, out, depth)?,
                        (None, Some(body)) => self.render_nodes(body, scope, out, depth)?,
                        (None, None) => {}
                    }
                }
                Node::For {
                    header,
                    body,
                    empty,
                } => self.render_for(header, body, empty.as_deref(), scope, out, depth)?,
                Node::Include { name, params, line } => {
                    if depth >= MAX_INCLUDE_DEPTH {
                        return Err(TemplateError::IncludeDepth {
                            name: name.clone(),
                            line: *line,
                        });
                    }
                    let template = self.engine.include(name).ok_or_else(|| {
                        TemplateError::MissingInclude {
                            name: name.clone(),
                            line: *line,
                        }
                    })?;
                    let args: IndexMap<String, Value> = params
                        .iter()
                        .map(|(key, expr)| (key.clone(), self.eval(expr, scope).into_owned()))
                        .collect();
                    let mut vars = IndexMap::new();
                    vars.insert("include".to_string(), Value::Map(args));
                    self.render_nodes(template.nodes(), &scope.child(vars), out, depth + 1)?;
                }
            }
        }
        Ok(())
    }

    fn render_for(
        &self,
        header: &ForHeader,
        body: &[Node],
        empty: Option<&[Node]>,
        scope: &Scope<'_>,
        out: &mut String,
        depth: usize,
    ) -> Result<(), TemplateError> {
        let iterable = self.eval(&header.iterable, scope);
        let mut items: Vec<Value> = match iterable.as_ref() {
            Value::Null => Vec::new(),
            Value::List(items) => items.clone(),
            Value::Map(map) => map
                .iter()
                .map(|(k, v)| Value::List(vec![Value::String(k.clone()), v.clone()]))
                .collect(),
            scalar => vec![scalar.clone()],
        };

        let offset = self.eval_count(header.offset.as_ref(), scope).unwrap_or(0);
        items.drain(..offset.min(items.len()));
        if let Some(limit) = self.eval_count(header.limit.as_ref(), scope) {
            items.truncate(limit);
        }
        if header.reversed {
            items.reverse();
        }

        if items.is_empty() {
            if let Some(empty) = empty {
                self.render_nodes(empty, scope, out, depth)?;
            }
            return Ok(());
        }

        let length = items.len();
        for (i, item) in items.into_iter().enumerate() {
            let mut forloop = IndexMap::new();
            forloop.insert("index".to_string(), Value::from(i + 1));
            forloop.insert("index0".to_string(), Value::from(i));
            forloop.insert("rindex".to_string(), Value::from(length - i));
            forloop.insert("rindex0".to_string(), Value::from(length - i - 1));
            forloop.insert("first".to_string(), Value::Bool(i == 0));
            forloop.insert("last".to_string(), Value::Bool(i + 1 == length));
            forloop.insert("length".to_string(), Value::from(length));

            let mut vars = IndexMap::new();
            vars.insert(header.var.clone(), item);
            vars.insert("forloop".to_string(), Value::Map(forloop));
            self.render_nodes(body, &scope.child(vars), out, depth)?;
        }
        Ok(())
    }

    fn eval_count(&self, expr: Option<&Expr>, scope: &Scope<'_>) -> Option<usize> {
        expr.and_then(|e| self.eval(e, scope).as_usize())
    }

    fn eval_pipeline(&self, pipeline: &Pipeline, scope: &Scope<'_>) -> Value {
        let mut value = self.eval(&pipeline.expr, scope).into_owned();
        for filter in &pipeline.filters {
            let args: Vec<Value> = filter
                .args
                .iter()
                .map(|a| self.eval(a, scope).into_owned())
                .collect();
            value = self.engine.filters().apply(&filter.name, value, &args);
        }
        value
    }

    fn eval<'s>(&self, expr: &Expr, scope: &'s Scope<'_>) -> Cow<'s, Value> {
        match expr {
            Expr::Literal(value) => Cow::Owned(value.clone()),
            Expr::Path { root, segments } => self.resolve(root, segments, scope),
        }
    }

    /// Walk a path; any missing step yields `Null`
    fn resolve<'s>(&self, root: &str, segments: &[Segment], scope: &'s Scope<'_>) -> Cow<'s, Value> {
        let mut segments = segments.iter();

        let mut current: Cow<'s, Value> = if root.is_empty() {
            // `["name"]` at the root
            let name = match segments.next() {
                Some(Segment::Index(expr)) => self.eval(expr, scope).to_output_string(),
                _ => String::new(),
            };
            lookup_root(scope, &name)
        } else {
            lookup_root(scope, root)
        };

        for segment in segments {
            let key = match segment {
                Segment::Key(key) => Cow::Owned(Value::String(key.clone())),
                Segment::Index(expr) => self.eval(expr, scope),
            };
            current = match current {
                Cow::Borrowed(value) => property(value, &key),
                Cow::Owned(value) => Cow::Owned(property(&value, &key).into_owned()),
            };
            if current.is_null() {
                break;
            }
        }
        current
    }

    fn test(&self, cond: &Condition, scope: &Scope<'_>) -> bool {
        match cond {
            Condition::Test(expr) => self.eval(expr, scope).is_truthy(),
            Condition::Compare { left, op, right } => {
                compare(&self.eval(left, scope), *op, &self.eval(right, scope))
            }
            Condition::And(a, b) => self.test(a, scope) && self.test(b, scope),
            Condition::Or(a, b) => self.test(a, scope) || self.test(b, scope),
            Condition::Not(c) => !self.test(c, scope),
        }
    }
}

fn lookup_root<'s>(scope: &'s Scope<'_>, name: &str) -> Cow<'s, Value> {
    match scope.get(name) {
        Some(value) => Cow::Borrowed(value),
        None => Cow::Owned(Value::Null),
    }
}

/// One path step: map key, list index, or the `size` / `first` / `last`
/// pseudo-properties
fn property<'v>(value: &'v Value, key: &Value) -> Cow<'v, Value> {
    match (value, key) {
        (Value::Map(map), Value::String(k)) => match map.get(k) {
            Some(v) => Cow::Borrowed(v),
            None if k == "size" => Cow::Owned(Value::from(map.len())),
            None => Cow::Owned(Value::Null),
        },
        (Value::List(items), Value::Integer(i)) => {
            let index = if *i < 0 { items.len() as i64 + i } else { *i };
            usize::try_from(index)
                .ok()
                .and_then(|i| items.get(i))
                .map_or(Cow::Owned(Value::Null), Cow::Borrowed)
        }
        (Value::List(items), Value::String(k)) => match k.as_str() {
            "size" => Cow::Owned(Value::from(items.len())),
            "first" => items.first().map_or(Cow::Owned(Value::Null), Cow::Borrowed),
            "last" => items.last().map_or(Cow::Owned(Value::Null), Cow::Borrowed),
            _ => Cow::Owned(Value::Null),
        },
        (Value::String(s), Value::String(k)) if k == "size" => {
            Cow::Owned(Value::from(s.chars().count()))
        }
        _ => Cow::Owned(Value::Null),
    }
}

fn compare(left: &Value, op: CmpOp, right: &Value) -> bool {
    use std::cmp::Ordering::{Equal, Greater, Less};
    match op {
        CmpOp::Eq => left.loose_eq(right),
        CmpOp::Ne => !left.loose_eq(right),
        CmpOp::Lt => left.partial_cmp_loose(right) == Some(Less),
        CmpOp::Gt => left.partial_cmp_loose(right) == Some(Greater),
        CmpOp::Le => matches!(left.partial_cmp_loose(right), Some(Less | Equal)),
        CmpOp::Ge => matches!(left.partial_cmp_loose(right), Some(Greater | Equal)),
        CmpOp::Contains => match left {
            Value::String(s) => right.scalar_string().is_some_and(|needle| s.contains(&needle)),
            Value::List(items) => items.iter().any(|item| item.loose_eq(right)),
            Value::Map(map) => right.scalar_string().is_some_and(|k| map.contains_key(&k)),
            _ => false,
        },
    }
}
