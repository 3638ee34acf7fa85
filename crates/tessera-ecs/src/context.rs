//! Context variables: at most one value per type stored alongside the
//! registry's entities, for registry-wide state such as caches or settings.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::registry::{violated, Registry};
use crate::EcsError;

struct ContextVar {
    debug_name: String,
    value: Box<dyn Any + Send>,
}

/// Type-keyed storage behind the `*_ctx` methods of [`Registry`].
#[derive(Default)]
pub struct ContextVars {
    vars: HashMap<TypeId, ContextVar>,
}

impl std::fmt::Debug for ContextVars {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.vars.values().map(|v| v.debug_name.as_str()).collect();
        names.sort();
        f.debug_set().entries(names).finish()
    }
}

fn cast<V: Any>(var: &ContextVar) -> &V {
    match var.value.downcast_ref::<V>() {
        Some(v) => v,
        None => unreachable!("context slot for {} has the wrong type", std::any::type_name::<V>()),
    }
}

fn cast_mut<V: Any>(var: &mut ContextVar) -> &mut V {
    match var.value.downcast_mut::<V>() {
        Some(v) => v,
        None => unreachable!("context slot for {} has the wrong type", std::any::type_name::<V>()),
    }
}

impl ContextVars {
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Debug name given when `V` was set.
    pub fn debug_name<V: Send + 'static>(&self) -> Option<&str> {
        self.vars
            .get(&TypeId::of::<V>())
            .map(|v| v.debug_name.as_str())
    }
}

impl Registry {
    /// Store `value`, replacing any previous `V`.
    pub fn set_ctx<V: Send + 'static>(&mut self, debug_name: &str, value: V) -> &mut V {
        let var = ContextVar {
            debug_name: debug_name.to_owned(),
            value: Box::new(value),
        };
        let slot = match self.context.vars.entry(TypeId::of::<V>()) {
            std::collections::hash_map::Entry::Occupied(mut occupied) => {
                tracing::debug!(name = debug_name, "replaced context variable");
                occupied.insert(var);
                occupied.into_mut()
            }
            std::collections::hash_map::Entry::Vacant(vacant) => vacant.insert(var),
        };
        cast_mut::<V>(slot)
    }

    pub fn try_ctx<V: Send + 'static>(&self) -> Option<&V> {
        self.context.vars.get(&TypeId::of::<V>()).map(cast::<V>)
    }

    pub fn try_ctx_mut<V: Send + 'static>(&mut self) -> Option<&mut V> {
        self.context.vars.get_mut(&TypeId::of::<V>()).map(cast_mut::<V>)
    }

    /// The stored `V`, which must have been set.
    #[track_caller]
    pub fn ctx<V: Send + 'static>(&self) -> &V {
        match self.try_ctx::<V>() {
            Some(v) => v,
            None => violated(EcsError::MissingContext {
                type_name: std::any::type_name::<V>(),
            }),
        }
    }

    #[track_caller]
    pub fn ctx_mut<V: Send + 'static>(&mut self) -> &mut V {
        match self.try_ctx_mut::<V>() {
            Some(v) => v,
            None => violated(EcsError::MissingContext {
                type_name: std::any::type_name::<V>(),
            }),
        }
    }

    /// The stored `V`, setting it from `f` first if absent.
    pub fn ctx_or_set_with<V: Send + 'static>(
        &mut self,
        debug_name: &str,
        f: impl FnOnce() -> V,
    ) -> &mut V {
        let var = self
            .context
            .vars
            .entry(TypeId::of::<V>())
            .or_insert_with(|| ContextVar {
                debug_name: debug_name.to_owned(),
                value: Box::new(f()),
            });
        cast_mut::<V>(var)
    }

    /// Remove and return the stored `V`.
    pub fn unset_ctx<V: Send + 'static>(&mut self) -> Option<V> {
        let var = self.context.vars.remove(&TypeId::of::<V>())?;
        match var.value.downcast::<V>() {
            Ok(v) => Some(*v),
            Err(_) => unreachable!("context slot for {} has the wrong type", std::any::type_name::<V>()),
        }
    }

    pub fn context(&self) -> &ContextVars {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct FrameCounter(u64);

    #[derive(Debug, PartialEq)]
    struct Settings {
        verbose: bool,
    }

    #[test]
    fn set_read_overwrite() {
        let mut reg = Registry::new();
        reg.set_ctx("frames", FrameCounter(1));
        reg.ctx_mut::<FrameCounter>().0 += 1;
        assert_eq!(reg.ctx::<FrameCounter>(), &FrameCounter(2));

        reg.set_ctx("frames", FrameCounter(0));
        assert_eq!(reg.try_ctx::<FrameCounter>(), Some(&FrameCounter(0)));
        assert_eq!(reg.context().len(), 1);
        assert_eq!(reg.context().debug_name::<FrameCounter>(), Some("frames"));
    }

    #[test]
    fn ctx_or_set_with_runs_once() {
        let mut reg = Registry::new();
        let mut calls = 0;
        for _ in 0..3 {
            reg.ctx_or_set_with("settings", || {
                calls += 1;
                Settings { verbose: true }
            });
        }
        assert_eq!(calls, 1);
        assert!(reg.ctx::<Settings>().verbose);
    }

    #[test]
    fn unset_returns_value() {
        let mut reg = Registry::new();
        reg.set_ctx("frames", FrameCounter(7));
        assert_eq!(reg.unset_ctx::<FrameCounter>(), Some(FrameCounter(7)));
        assert_eq!(reg.unset_ctx::<FrameCounter>(), None);
        assert!(reg.context().is_empty());
    }

    #[test]
    #[should_panic(expected = "is not set")]
    fn ctx_missing_panics() {
        let reg = Registry::new();
        let _ = reg.ctx::<Settings>();
    }
}
