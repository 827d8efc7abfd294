//! CallableReference - method + target を弱参照 / 強参照で保持する
//!
//! # 二層構造
//! - **表層（Typed）**: `Method<T, P>` / `bind::<T>()` - `T` と `P` が静的に対応する
//! - **内部（Erased）**: `Thunk<P>` - `&(dyn Any + Send + Sync)` を受け取る object-safe な関数
//!
//! target の所有は `Owner::Strong | Owner::Weak` のどちらか。static method は
//! 宣言型のハンドルを `Strong` で持ち、失効しない。
//!
//! `resolve()` は純粋な読み取りで、参照の状態を変えない。死んだ参照を
//! 取り除くのは `SubscriberStore::purge` の仕事。

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

use crate::delegate::Delegate;
use crate::error::{HandlerError, HandlerResult, Result, TendrilError};
use crate::source::TopicSource;

/// Type-erased target.
pub type Target = dyn Any + Send + Sync;

/// Erased invocation: receives the live target, the topic source and the payload.
pub(crate) type Thunk<P> = Arc<dyn Fn(&Target, &TopicSource, &P) -> HandlerResult + Send + Sync>;

/// Comparable identity of a method: declaring type + member name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId {
    declaring_type: Cow<'static, str>,
    member: Cow<'static, str>,
}

impl MethodId {
    pub fn new(
        declaring_type: impl Into<Cow<'static, str>>,
        member: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            member: member.into(),
        }
    }

    pub const fn from_static(declaring_type: &'static str, member: &'static str) -> Self {
        Self {
            declaring_type: Cow::Borrowed(declaring_type),
            member: Cow::Borrowed(member),
        }
    }

    /// Uses `std::any::type_name::<T>()` as the declaring type.
    pub fn of<T: ?Sized>(member: &'static str) -> Self {
        Self::from_static(std::any::type_name::<T>(), member)
    }

    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    pub fn member(&self) -> &str {
        &self.member
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.declaring_type, self.member)
    }
}

/// The callable half of a binding.
pub enum Method<T, P> {
    /// Needs a live `T` to run.
    Instance(fn(&T, &TopicSource, &P) -> HandlerResult),
    /// Bound to the declaring type only.
    Static(fn(&TopicSource, &P) -> HandlerResult),
}

impl<T, P> Clone for Method<T, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, P> Copy for Method<T, P> {}

/// Who keeps the target alive.
#[derive(Clone)]
pub enum Owner {
    Strong(Arc<Target>),
    /// Non-owning observer; once the last strong owner elsewhere is gone it
    /// never resolves again.
    Weak(Weak<Target>),
}

impl Owner {
    pub fn upgrade(&self) -> Option<Arc<Target>> {
        match self {
            Owner::Strong(target) => Some(Arc::clone(target)),
            Owner::Weak(observer) => observer.upgrade(),
        }
    }

    pub fn is_weak(&self) -> bool {
        matches!(self, Owner::Weak(_))
    }

    fn is_alive(&self) -> bool {
        match self {
            Owner::Strong(_) => true,
            Owner::Weak(observer) => observer.strong_count() > 0,
        }
    }
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Strong(target) => match target.downcast_ref::<TypeHandle>() {
                Some(handle) => write!(f, "Static({})", handle.declaring_type),
                None => f.write_str("Strong"),
            },
            Owner::Weak(observer) => write!(f, "Weak(alive={})", observer.strong_count() > 0),
        }
    }
}

/// Handle standing in for the declaring type of a static method.
struct TypeHandle {
    declaring_type: String,
}

/// Liveness / dispatch state of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceState {
    Active,
    /// Registered but skipped by dispatch (store-level flag).
    Ignored,
    /// The weak target has been released.
    Disconnected,
}

/// Identity of the target half of a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKey {
    Static,
    Absent,
    /// Address of the live target allocation.
    Instance(usize),
}

/// (method identity, target identity): what equality is defined over.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceKey {
    pub method: MethodId,
    pub target: TargetKey,
}

impl ReferenceKey {
    pub fn for_target<T: ?Sized>(method: MethodId, target: &Arc<T>) -> Self {
        Self {
            method,
            target: TargetKey::Instance(Arc::as_ptr(target).cast::<()>() as usize),
        }
    }

    pub fn for_static(method: MethodId) -> Self {
        Self {
            method,
            target: TargetKey::Static,
        }
    }
}

/// Immutable (method, target) pair, target held weakly or strongly.
pub struct CallableReference<P> {
    method: MethodId,
    is_static: bool,
    owner: Owner,
    thunk: Thunk<P>,
}

impl<P: 'static> CallableReference<P> {
    /// Bind `method` to `target`.
    ///
    /// Instance methods fail with `InvalidBinding` when `target` is `None`.
    /// For static methods `target` and `weak` are ignored.
    pub fn bind<T: Send + Sync + 'static>(
        method_id: MethodId,
        method: Method<T, P>,
        target: Option<&Arc<T>>,
        weak: bool,
    ) -> Result<Self> {
        match method {
            Method::Static(func) => Ok(Self::static_binding(method_id, func)),
            Method::Instance(func) => match target {
                Some(target) => Ok(Self::instance_binding(method_id, target, func, weak)),
                None => Err(TendrilError::InvalidBinding { method: method_id }),
            },
        }
    }

    /// Instance binding that does not keep `target` alive.
    pub fn weak<T: Send + Sync + 'static>(
        method_id: MethodId,
        target: &Arc<T>,
        func: fn(&T, &TopicSource, &P) -> HandlerResult,
    ) -> Self {
        Self::instance_binding(method_id, target, func, true)
    }

    /// Instance binding that owns a share of `target`.
    pub fn strong<T: Send + Sync + 'static>(
        method_id: MethodId,
        target: &Arc<T>,
        func: fn(&T, &TopicSource, &P) -> HandlerResult,
    ) -> Self {
        Self::instance_binding(method_id, target, func, false)
    }

    pub fn static_fn(
        method_id: MethodId,
        func: fn(&TopicSource, &P) -> HandlerResult,
    ) -> Self {
        Self::static_binding(method_id, func)
    }

    /// Capture an already-bound callable.
    ///
    /// The callable must carry exactly one binding; a chained delegate fails
    /// with `MultipleBindingsNotAllowed`. Instance targets are observed
    /// weakly, so the returned reference does not extend their lifetime.
    pub fn from_existing_callable(callable: &Delegate<P>) -> Result<Self> {
        let [binding] = callable.bindings() else {
            return Err(TendrilError::MultipleBindingsNotAllowed {
                count: callable.binding_count(),
            });
        };
        let reference = match binding.target() {
            Some(target) => Self {
                method: binding.method().clone(),
                is_static: false,
                owner: Owner::Weak(Arc::downgrade(target)),
                thunk: binding.thunk(),
            },
            None => Self {
                method: binding.method().clone(),
                is_static: true,
                owner: Owner::Strong(type_handle(binding.method())),
                thunk: binding.thunk(),
            },
        };
        Ok(reference)
    }

    fn instance_binding<T: Send + Sync + 'static>(
        method_id: MethodId,
        target: &Arc<T>,
        func: fn(&T, &TopicSource, &P) -> HandlerResult,
        weak: bool,
    ) -> Self {
        let erased: Arc<Target> = target.clone();
        let owner = if weak {
            Owner::Weak(Arc::downgrade(&erased))
        } else {
            Owner::Strong(erased)
        };
        Self {
            method: method_id,
            is_static: false,
            owner,
            thunk: instance_thunk(func),
        }
    }

    fn static_binding(method_id: MethodId, func: fn(&TopicSource, &P) -> HandlerResult) -> Self {
        let owner = Owner::Strong(type_handle(&method_id));
        Self {
            method: method_id,
            is_static: true,
            owner,
            thunk: static_thunk(func),
        }
    }
}

impl<P> CallableReference<P> {
    pub fn method(&self) -> &MethodId {
        &self.method
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn is_weak(&self) -> bool {
        self.owner.is_weak()
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    /// `Some` while the target is alive (always for static methods).
    pub fn resolve(&self) -> Option<InvocableHandle<'_, P>> {
        let target = self.owner.upgrade()?;
        Some(InvocableHandle {
            reference: self,
            target,
        })
    }

    pub fn target_alive(&self) -> bool {
        self.is_static || self.owner.is_alive()
    }

    pub fn state(&self) -> ReferenceState {
        if self.target_alive() {
            ReferenceState::Active
        } else {
            ReferenceState::Disconnected
        }
    }

    pub fn target_key(&self) -> TargetKey {
        if self.is_static {
            return TargetKey::Static;
        }
        match self.owner.upgrade() {
            Some(target) => TargetKey::Instance(Arc::as_ptr(&target).cast::<()>() as usize),
            None => TargetKey::Absent,
        }
    }

    pub fn key(&self) -> ReferenceKey {
        ReferenceKey {
            method: self.method.clone(),
            target: self.target_key(),
        }
    }

    pub(crate) fn matches_key(&self, key: &ReferenceKey) -> bool {
        self.method == key.method && self.target_key() == key.target
    }
}

impl<P> Clone for CallableReference<P> {
    fn clone(&self) -> Self {
        Self {
            method: self.method.clone(),
            is_static: self.is_static,
            owner: self.owner.clone(),
            thunk: Arc::clone(&self.thunk),
        }
    }
}

impl<P> PartialEq for CallableReference<P> {
    fn eq(&self, other: &Self) -> bool {
        self.method == other.method && self.target_key() == other.target_key()
    }
}

impl<P> Eq for CallableReference<P> {}

impl<P> Hash for CallableReference<P> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.method.hash(state);
        self.target_key().hash(state);
    }
}

impl<P> fmt::Debug for CallableReference<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallableReference")
            .field("method", &self.method)
            .field("is_static", &self.is_static)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// A resolved reference. Holds the target alive until dropped.
pub struct InvocableHandle<'a, P> {
    reference: &'a CallableReference<P>,
    target: Arc<Target>,
}

impl<P> InvocableHandle<'_, P> {
    pub fn method(&self) -> &MethodId {
        &self.reference.method
    }

    pub fn invoke(&self, source: &TopicSource, payload: &P) -> HandlerResult {
        (self.reference.thunk)(self.target.as_ref(), source, payload)
    }
}

pub(crate) fn instance_thunk<T, P>(func: fn(&T, &TopicSource, &P) -> HandlerResult) -> Thunk<P>
where
    T: Send + Sync + 'static,
    P: 'static,
{
    Arc::new(move |target: &Target, source: &TopicSource, payload: &P| {
        match target.downcast_ref::<T>() {
            Some(target) => func(target, source, payload),
            None => Err(HandlerError::new(format!(
                "target is not a {}",
                std::any::type_name::<T>()
            ))),
        }
    })
}

pub(crate) fn static_thunk<P: 'static>(func: fn(&TopicSource, &P) -> HandlerResult) -> Thunk<P> {
    Arc::new(move |_: &Target, source: &TopicSource, payload: &P| func(source, payload))
}

fn type_handle(method: &MethodId) -> Arc<Target> {
    Arc::new(TypeHandle {
        declaring_type: method.declaring_type().to_string(),
    })
}
