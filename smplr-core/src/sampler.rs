use std::sync::Arc;

use crate::action::Action;

/// A named, repeatable unit of load-generation work.
///
/// Cloning is cheap: workers of a pooled run share the same action.
#[derive(Debug, Clone)]
pub struct Sampler {
    name: Arc<str>,
    action: Arc<dyn Action>,
}

impl Sampler {
    pub fn new(name: impl Into<Arc<str>>, action: impl Action + 'static) -> Self {
        Self {
            name: name.into(),
            action: Arc::new(action),
        }
    }

    pub fn from_shared(name: impl Into<Arc<str>>, action: Arc<dyn Action>) -> Self {
        Self {
            name: name.into(),
            action,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        self.name.clone()
    }

    pub fn action(&self) -> &dyn Action {
        self.action.as_ref()
    }
}
