//! Lifecycle Hooks
//!
//! Hooks are composed once, when a scope is appended to the tree, into one
//! flat callable per kind. Composition order follows nesting: the enclosing
//! scope's hook runs first, for "after" hooks too.

use crate::error::Error;
use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

/// A composed lifecycle callback
pub type Hook = Rc<dyn Fn() -> Result<(), Error>>;

/// Result of user code: either nothing or a fallible `Result`.
///
/// Lets DSL closures be written as plain blocks or with `?`.
pub trait Outcome {
    /// Normalize into the engine's error type
    fn into_result(self) -> Result<(), Error>;
}

impl Outcome for () {
    #[inline]
    fn into_result(self) -> Result<(), Error> {
        Ok(())
    }
}

impl<E: fmt::Display> Outcome for Result<(), E> {
    #[inline]
    fn into_result(self) -> Result<(), Error> {
        self.map_err(|e| Error::Failed(e.to_string()))
    }
}

/// Compose two optional hooks.
///
/// Absent hooks cost nothing: composing with `None` returns the other side
/// unchanged. When both exist, `outer` runs to completion before `inner`
/// starts, and a failing `outer` skips `inner`.
pub fn combine(outer: Option<Hook>, inner: Option<Hook>) -> Option<Hook> {
    match (outer, inner) {
        (None, None) => None,
        (Some(hook), None) | (None, Some(hook)) => Some(hook),
        (Some(outer), Some(inner)) => Some(Rc::new(move || {
            outer()?;
            inner()
        })),
    }
}

/// Invoke an optional hook
#[inline]
pub fn run_hook(hook: &Option<Hook>) -> Result<(), Error> {
    match hook {
        Some(hook) => hook(),
        None => Ok(()),
    }
}

/// Wrap a user closure into a [`Hook`], turning panics into errors
pub fn hook<F, O>(f: F) -> Hook
where
    F: Fn() -> O + 'static,
    O: Outcome,
{
    Rc::new(move || catch(|| f().into_result()))
}

/// Run user code, converting a panic into [`Error::Panicked`]
pub fn catch<F>(f: F) -> Result<(), Error>
where
    F: FnOnce() -> Result<(), Error>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(Error::Panicked(panic_message(payload.as_ref()))),
    }
}

/// Extract the message of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Lifecycle hook kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// Before each test
    BeforeEach,
    /// After each test
    AfterEach,
    /// Before the warmup iterations of a measurement
    BeforeWarmup,
    /// After the warmup iterations of a measurement
    AfterWarmup,
    /// Before each batch (warmup included)
    BeforeBatch,
    /// After each batch (warmup included)
    AfterBatch,
    /// Before each iteration
    BeforeIteration,
    /// After each iteration
    AfterIteration,
}

/// One composed hook per kind
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    /// Runs before each test
    pub before_each: Option<Hook>,
    /// Runs after each test
    pub after_each: Option<Hook>,
    /// Runs before warmup
    pub before_warmup: Option<Hook>,
    /// Runs after warmup
    pub after_warmup: Option<Hook>,
    /// Runs before each batch
    pub before_batch: Option<Hook>,
    /// Runs after each batch
    pub after_batch: Option<Hook>,
    /// Runs before each iteration
    pub before_iteration: Option<Hook>,
    /// Runs after each iteration
    pub after_iteration: Option<Hook>,
}

impl LifecycleHooks {
    fn slot(&mut self, kind: HookKind) -> &mut Option<Hook> {
        match kind {
            HookKind::BeforeEach => &mut self.before_each,
            HookKind::AfterEach => &mut self.after_each,
            HookKind::BeforeWarmup => &mut self.before_warmup,
            HookKind::AfterWarmup => &mut self.after_warmup,
            HookKind::BeforeBatch => &mut self.before_batch,
            HookKind::AfterBatch => &mut self.after_batch,
            HookKind::BeforeIteration => &mut self.before_iteration,
            HookKind::AfterIteration => &mut self.after_iteration,
        }
    }

    /// Register a hook after the ones already present for `kind`
    pub fn add(&mut self, kind: HookKind, hook: Hook) {
        let slot = self.slot(kind);
        *slot = combine(slot.take(), Some(hook));
    }

    /// Hooks of a nested scope: every kind composed as `combine(self, own)`
    pub fn inherit(&self, own: &LifecycleHooks) -> LifecycleHooks {
        let pair = |outer: &Option<Hook>, inner: &Option<Hook>| combine(outer.clone(), inner.clone());
        LifecycleHooks {
            before_each: pair(&self.before_each, &own.before_each),
            after_each: pair(&self.after_each, &own.after_each),
            before_warmup: pair(&self.before_warmup, &own.before_warmup),
            after_warmup: pair(&self.after_warmup, &own.after_warmup),
            before_batch: pair(&self.before_batch, &own.before_batch),
            after_batch: pair(&self.after_batch, &own.after_batch),
            before_iteration: pair(&self.before_iteration, &own.before_iteration),
            after_iteration: pair(&self.after_iteration, &own.after_iteration),
        }
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("before_each", &self.before_each.is_some())
            .field("after_each", &self.after_each.is_some())
            .field("before_warmup", &self.before_warmup.is_some())
            .field("after_warmup", &self.after_warmup.is_some())
            .field("before_batch", &self.before_batch.is_some())
            .field("after_batch", &self.after_batch.is_some())
            .field("before_iteration", &self.before_iteration.is_some())
            .field("after_iteration", &self.after_iteration.is_some())
            .finish()
    }
}
