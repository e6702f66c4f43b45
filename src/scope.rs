// Scope chain: a singly-linked list of mutable binding frames. Contexts are
// cheap reference-counted handles; a closure keeps its defining chain alive
// past the structural pop of the construct that created it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::{Function, Value};

/// Variable names opening with this prefix are reserved for the host.
pub(crate) const RESERVED_PREFIX: &str = "__";
/// Legacy registry key under which hosts attached functions; never assignable.
pub(crate) const FUNCS_KEY: &str = "_func";

/// Reports whether `name` may be used as an assignment target. `$`-prefixed
/// names are the comparison placeholders and are read-only.
pub(crate) fn assignable(name: &str) -> bool {
    !name.starts_with(RESERVED_PREFIX) && !name.starts_with('$') && name != FUNCS_KEY
}

/// Host hook consulted when a variable read misses every scope in the chain.
pub type Resolver = Rc<dyn Fn(&str) -> Option<Value>>;

struct Scope {
    vars: HashMap<String, Value>,
    funcs: HashMap<String, Function>,
    tag: Option<String>,
    parent: Option<Rc<RefCell<Scope>>>,
    /// Set on the root frame only.
    resolver: Option<Resolver>,
}

impl Scope {
    fn new(tag: Option<String>, parent: Option<Rc<RefCell<Scope>>>) -> Self {
        Scope {
            vars: HashMap::new(),
            funcs: HashMap::new(),
            tag,
            parent,
            resolver: None,
        }
    }
}

/// A handle to one frame of the scope chain. Cloning the handle aliases the
/// frame; `push`/`pop` move along the chain.
#[derive(Clone)]
pub struct Context {
    scope: Rc<RefCell<Scope>>,
}

impl Context {
    /// Create a root (global) context. It persists across evaluations and
    /// accumulates any globals defined during execution.
    pub fn new() -> Self {
        Context {
            scope: Rc::new(RefCell::new(Scope::new(None, None))),
        }
    }

    /// Create a root context seeded with initial variables.
    pub fn with_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let ctx = Context::new();
        {
            let mut scope = ctx.scope.borrow_mut();
            for (name, value) in vars {
                scope.vars.insert(name, value);
            }
        }
        ctx
    }

    /// Push a child scope and return a handle to it.
    pub fn push(&self, tag: Option<&str>) -> Context {
        Context {
            scope: Rc::new(RefCell::new(Scope::new(
                tag.map(|t| t.to_string()),
                Some(Rc::clone(&self.scope)),
            ))),
        }
    }

    /// Return the parent handle, or the context itself at the root (the pop
    /// floor).
    pub fn pop(&self) -> Context {
        match &self.scope.borrow().parent {
            Some(parent) => Context {
                scope: Rc::clone(parent),
            },
            None => self.clone(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.scope.borrow().parent.is_none()
    }

    /// The root (global) context of this chain.
    pub fn global(&self) -> Context {
        let mut current = Rc::clone(&self.scope);
        loop {
            let parent = current.borrow().parent.clone();
            match parent {
                Some(p) => current = p,
                None => return Context { scope: current },
            }
        }
    }

    /// Read a variable, walking from this scope through its parents. Does not
    /// consult the host resolver; see [`Context::resolve_external`].
    pub fn get_var(&self, name: &str) -> Option<Value> {
        let mut current = Rc::clone(&self.scope);
        loop {
            if let Some(v) = current.borrow().vars.get(name) {
                return Some(v.clone());
            }
            let parent = current.borrow().parent.clone();
            match parent {
                Some(p) => current = p,
                None => return None,
            }
        }
    }

    /// Default-qualifier write: mutate the nearest existing binding, creating
    /// one in this scope when no chain frame binds the name.
    pub fn set_var(&self, name: &str, value: Value) {
        let mut current = Rc::clone(&self.scope);
        loop {
            {
                let mut scope = current.borrow_mut();
                if scope.vars.contains_key(name) {
                    scope.vars.insert(name.to_string(), value);
                    return;
                }
            }
            let parent = current.borrow().parent.clone();
            match parent {
                Some(p) => current = p,
                None => break,
            }
        }
        self.scope
            .borrow_mut()
            .vars
            .insert(name.to_string(), value);
    }

    /// `local` write: bind in this scope only, shadowing any outer binding.
    pub fn define_var(&self, name: &str, value: Value) {
        self.scope
            .borrow_mut()
            .vars
            .insert(name.to_string(), value);
    }

    /// `global` write: bind in the root scope.
    pub fn set_global(&self, name: &str, value: Value) {
        self.global()
            .scope
            .borrow_mut()
            .vars
            .insert(name.to_string(), value);
    }

    /// Remove a binding from this scope only. Convenience for hosts.
    pub fn remove_var(&self, name: &str) -> Option<Value> {
        self.scope.borrow_mut().vars.remove(name)
    }

    /// Install a function in this scope. Later definitions in inner scopes
    /// shadow outer ones at call time.
    pub fn define_function(&self, name: &str, func: Function) {
        self.scope
            .borrow_mut()
            .funcs
            .insert(name.to_string(), func);
    }

    /// Resolve a function name through the chain.
    pub fn lookup_function(&self, name: &str) -> Option<Function> {
        let mut current = Rc::clone(&self.scope);
        loop {
            if let Some(f) = current.borrow().funcs.get(name) {
                return Some(f.clone());
            }
            let parent = current.borrow().parent.clone();
            match parent {
                Some(p) => current = p,
                None => return None,
            }
        }
    }

    /// Find the nearest enclosing scope carrying `tag`; with no tag, the root.
    pub fn find_scope_by_tag(&self, tag: Option<&str>) -> Option<Context> {
        let Some(tag) = tag else {
            return Some(self.global());
        };
        let mut current = Rc::clone(&self.scope);
        loop {
            if current.borrow().tag.as_deref() == Some(tag) {
                return Some(Context { scope: current });
            }
            let parent = current.borrow().parent.clone();
            match parent {
                Some(p) => current = p,
                None => return None,
            }
        }
    }

    /// Install the external resolver hook on the root scope.
    pub fn set_resolver(&self, resolver: impl Fn(&str) -> Option<Value> + 'static) {
        self.global().scope.borrow_mut().resolver = Some(Rc::new(resolver));
    }

    /// Consult the root's resolver hook for a name no scope binds.
    pub fn resolve_external(&self, name: &str) -> Option<Value> {
        let root = self.global();
        let resolver = root.scope.borrow().resolver.clone();
        resolver.and_then(|r| r(name))
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
