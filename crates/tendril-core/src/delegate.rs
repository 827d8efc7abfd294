//! Delegate - 複数の (method, target) を束ねられる呼び出し可能オブジェクト
//!
//! `Delegate` は target を強参照で持つ、順序付きのバインディング列です。
//! そのまま `invoke` で全員を順に呼べますが、`SubscriberStore` に登録する
//! ときは `CallableReference::from_existing_callable` を通すため、
//! バインディングが 1 つでなければなりません（束ねた delegate をうっかり
//! 1 購読者として登録するのを防ぐ）。

use std::fmt;
use std::sync::Arc;

use crate::error::HandlerResult;
use crate::reference::{MethodId, Target, Thunk, instance_thunk, static_thunk};
use crate::source::TopicSource;

/// One (method, target) pair inside a delegate. `target` is `None` for
/// static methods.
pub struct Binding<P> {
    method: MethodId,
    target: Option<Arc<Target>>,
    thunk: Thunk<P>,
}

impl<P> Binding<P> {
    pub fn method(&self) -> &MethodId {
        &self.method
    }

    pub fn target(&self) -> Option<&Arc<Target>> {
        self.target.as_ref()
    }

    pub(crate) fn thunk(&self) -> Thunk<P> {
        Arc::clone(&self.thunk)
    }

    fn invoke(&self, source: &TopicSource, payload: &P) -> HandlerResult {
        let unit: &Target = &();
        let target = self.target.as_deref().unwrap_or(unit);
        (self.thunk)(target, source, payload)
    }
}

impl<P> Clone for Binding<P> {
    fn clone(&self) -> Self {
        Self {
            method: self.method.clone(),
            target: self.target.clone(),
            thunk: Arc::clone(&self.thunk),
        }
    }
}

/// Non-empty, ordered chain of bindings.
pub struct Delegate<P> {
    bindings: Vec<Binding<P>>,
}

impl<P: 'static> Delegate<P> {
    pub fn instance<T: Send + Sync + 'static>(
        method: MethodId,
        target: &Arc<T>,
        func: fn(&T, &TopicSource, &P) -> HandlerResult,
    ) -> Self {
        let target: Arc<Target> = target.clone();
        Self {
            bindings: vec![Binding {
                method,
                target: Some(target),
                thunk: instance_thunk(func),
            }],
        }
    }

    pub fn static_fn(method: MethodId, func: fn(&TopicSource, &P) -> HandlerResult) -> Self {
        Self {
            bindings: vec![Binding {
                method,
                target: None,
                thunk: static_thunk(func),
            }],
        }
    }
}

impl<P> Delegate<P> {
    /// Append `other`'s bindings after ours.
    #[must_use]
    pub fn combine(mut self, other: Delegate<P>) -> Self {
        self.bindings.extend(other.bindings);
        self
    }

    pub fn bindings(&self) -> &[Binding<P>] {
        &self.bindings
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Call every binding in order, stopping at the first error.
    pub fn invoke(&self, source: &TopicSource, payload: &P) -> HandlerResult {
        for binding in &self.bindings {
            binding.invoke(source, payload)?;
        }
        Ok(())
    }
}

impl<P> Clone for Delegate<P> {
    fn clone(&self) -> Self {
        Self {
            bindings: self.bindings.clone(),
        }
    }
}

impl<P> fmt::Debug for Delegate<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.bindings.iter().map(|b| &b.method))
            .finish()
    }
}
