//! Render contexts

use indexmap::IndexMap;
use std::sync::Arc;

use crate::content::Value;

/// Variables visible to a render, as a stack of shared layers.
///
/// Later layers shadow earlier ones. Layers are reference counted so the
/// site-wide layer is shared by every unit's context.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    layers: Vec<Arc<IndexMap<String, Value>>>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(vars: IndexMap<String, Value>) -> Self {
        Self {
            layers: vec![Arc::new(vars)],
        }
    }

    /// A new context with `vars` on top of this one
    pub fn with_layer(&self, vars: IndexMap<String, Value>) -> Self {
        self.with_shared_layer(Arc::new(vars))
    }

    pub fn with_shared_layer(&self, vars: Arc<IndexMap<String, Value>>) -> Self {
        let mut layers = self.layers.clone();
        layers.push(vars);
        Self { layers }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.layers.iter().rev().find_map(|layer| layer.get(name))
    }
}

/// Loop and include variables layered over a [`RenderContext`] during
/// evaluation
pub(crate) enum Scope<'a> {
    Root(&'a RenderContext),
    Child {
        parent: &'a Scope<'a>,
        vars: IndexMap<String, Value>,
    },
}

impl<'a> Scope<'a> {
    pub fn child(&'a self, vars: IndexMap<String, Value>) -> Scope<'a> {
        Scope::Child { parent: self, vars }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Scope::Root(ctx) => ctx.get(name),
            Scope::Child { parent, vars } => vars.get(name).or_else(|| parent.get(name)),
        }
    }
}
