//! Evaluation sessions.

use std::{
    cell::{Cell, RefCell},
    fmt,
    panic::{self, AssertUnwindSafe},
    rc::{Rc, Weak},
    sync::Arc,
};

use crate::{
    ast::{Expr, Position},
    builtin,
    class::ClassRegistry,
    config::Config,
    error::{panic_message, Error, Fault, Result},
    extensions,
    parser::parse,
    scope::Scope,
    value::Value,
};

pub(crate) struct State {
    root: Scope,
    classes: ClassRegistry,
    config: Config,
    depth: Cell<usize>,
    /// Program text whose expressions are being evaluated.
    source: RefCell<Option<Rc<Source>>>,
    /// Innermost expression of the failure currently propagating, with the
    /// program it was read from.
    fault_site: RefCell<Option<(Expr, Option<Rc<Source>>)>>,
}

/// A program handed to a session. Functions keep the program they were
/// defined in so failures inside them are located in the right text.
#[derive(Debug)]
pub struct Source {
    pub label: Arc<str>,
    pub text: Arc<str>,
}

impl Source {
    pub fn new(label: &str, text: &str) -> Rc<Self> {
        Rc::new(Source {
            label: Arc::from(label),
            text: Arc::from(text),
        })
    }
}

impl Drop for State {
    fn drop(&mut self) {
        // Closures bound here capture the root scope; clearing it breaks the
        // cycle so they can be freed.
        self.root.clear();
        self.classes.clear();
    }
}

/// An interpreter session: a root scope, a class registry and the evaluation
/// machinery. Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct Evaluator {
    state: Rc<State>,
}

/// A non-owning handle to an [`Evaluator`], as held by the functions it
/// creates.
#[derive(Clone, Default)]
pub struct WeakEvaluator(Weak<State>);

impl WeakEvaluator {
    pub fn upgrade(&self) -> Option<Evaluator> {
        self.0.upgrade().map(|state| Evaluator { state })
    }
}

/// Counts one level of function application; see [`Evaluator::enter`].
pub(crate) struct DepthGuard<'a> {
    depth: &'a Cell<usize>,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - 1);
    }
}

/// Restores the previously current program on drop; see
/// [`Evaluator::enter_source`].
pub(crate) struct SourceGuard<'a> {
    slot: &'a RefCell<Option<Rc<Source>>>,
    previous: Option<Rc<Source>>,
}

impl Drop for SourceGuard<'_> {
    fn drop(&mut self) {
        *self.slot.borrow_mut() = self.previous.take();
    }
}

impl Evaluator {
    /// A session configured from the environment.
    pub fn new() -> Self {
        Self::with_config(Config::from_env())
    }

    pub fn with_config(config: Config) -> Self {
        let evaluator = Evaluator {
            state: Rc::new(State {
                root: Scope::new(),
                classes: ClassRegistry::new(),
                config,
                depth: Cell::new(0),
                source: RefCell::new(None),
                fault_site: RefCell::new(None),
            }),
        };
        builtin::install(&evaluator);
        extensions::install(&evaluator);
        tracing::debug!(max_depth = config.max_depth, "evaluator ready");
        evaluator
    }

    pub fn downgrade(&self) -> WeakEvaluator {
        WeakEvaluator(Rc::downgrade(&self.state))
    }

    pub fn ptr_eq(&self, other: &Evaluator) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    pub fn root_scope(&self) -> &Scope {
        &self.state.root
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.state.classes
    }

    pub fn config(&self) -> &Config {
        &self.state.config
    }

    /// Current nesting of function applications.
    pub fn depth(&self) -> usize {
        self.state.depth.get()
    }

    pub(crate) fn enter(&self) -> Result<DepthGuard<'_>> {
        let depth = &self.state.depth;
        if depth.get() >= self.state.config.max_depth {
            return Err(Error::StackExhausted(self.state.config.max_depth));
        }
        depth.set(depth.get() + 1);
        Ok(DepthGuard { depth })
    }

    /// The program currently being evaluated, if it came from source text.
    pub(crate) fn current_source(&self) -> Option<Rc<Source>> {
        self.state.source.borrow().clone()
    }

    /// Makes `source` current until the guard is dropped.
    pub(crate) fn enter_source(&self, source: Option<Rc<Source>>) -> SourceGuard<'_> {
        let slot = &self.state.source;
        let previous = slot.replace(source);
        SourceGuard { slot, previous }
    }

    /// Remembers `expr` as the origin of the failure being propagated, unless
    /// a deeper expression was already recorded.
    pub(crate) fn note_fault_site(&self, expr: &Expr) {
        let mut site = self.state.fault_site.borrow_mut();
        if site.is_none() {
            *site = Some((expr.clone(), self.current_source()));
        }
    }

    pub(crate) fn clear_fault_site(&self) {
        self.state.fault_site.borrow_mut().take();
    }

    fn take_fault_site(&self) -> Option<(Expr, Option<Rc<Source>>)> {
        self.state.fault_site.borrow_mut().take()
    }

    /// Evaluates `exprs` in order, returning the last value.
    pub fn evaluate_all(&self, exprs: &[Expr], scope: &Scope) -> Result<Value> {
        let mut result = Value::NULL;
        for expr in exprs {
            result = self.evaluate(expr, scope)?;
        }
        Ok(result)
    }

    /// Parses and evaluates `source` in the root scope. Each top-level
    /// expression runs guarded: a failure, or a panic in native code, stops
    /// the run and is reported with the innermost expression that raised it.
    /// Bindings made by earlier expressions stay in place.
    pub fn run(&self, source: &str, label: &str) -> Result<Value, Fault> {
        let program = parse(source, label)?;
        tracing::debug!(label, expressions = program.len(), "running program");
        let text = Source::new(label, source);
        let _source = self.enter_source(Some(text.clone()));
        let mut result = Value::NULL;
        for expr in &program {
            self.clear_fault_site();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                self.evaluate(expr, self.root_scope())
            }));
            let error = match outcome {
                Ok(Ok(value)) => {
                    result = value;
                    continue;
                }
                Ok(Err(error)) => error,
                Err(payload) => Error::NativePanic(panic_message(&*payload)),
            };
            let (site, origin) = self
                .take_fault_site()
                .unwrap_or_else(|| (expr.clone(), Some(text.clone())));
            let fault = self.fault(error, label, &site, origin.as_deref());
            tracing::debug!(%fault, "evaluation failed");
            return Err(fault);
        }
        Ok(result)
    }

    /// Locates `site` in the program it was read from. Expressions built
    /// without source text keep the running program's label but get no
    /// position.
    fn fault(&self, error: Error, label: &str, site: &Expr, origin: Option<&Source>) -> Fault {
        let origin = origin.filter(|source| site.span.end <= source.text.len());
        Fault {
            error,
            label: origin.map_or_else(|| Arc::from(label), |source| source.label.clone()),
            expression: Some(site.to_string()),
            span: origin.map(|_| site.span),
            position: origin.map(|source| Position::locate(&source.text, site.span.start)),
        }
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("config", &self.state.config)
            .field("depth", &self.state.depth.get())
            .field("globals", &self.state.root.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_returns_last_value() {
        let evaluator = Evaluator::new();
        assert_eq!(evaluator.run("1 2 3", "test").unwrap(), Value::Int(3));
        assert_eq!(evaluator.run("", "test").unwrap(), Value::NULL);
    }

    #[test]
    fn test_fault_reports_innermost_expression() {
        let evaluator = Evaluator::new();
        let source = "(set a 1)\n(list a (missing 2))";
        let fault = evaluator.run(source, "demo.st").unwrap_err();
        assert!(matches!(&fault.error, Error::UnboundSymbol(name) if &**name == "missing"));
        assert_eq!(fault.expression.as_deref(), Some("missing"));
        let position = fault.position.unwrap();
        assert_eq!((position.line, position.column), (2, 10));
        assert_eq!(&*fault.label, "demo.st");
        // The failed expression does not disturb earlier bindings.
        assert_eq!(evaluator.root_scope().lookup("a"), Some(Value::Int(1)));
        assert_eq!(evaluator.depth(), 0);
    }

    #[test]
    fn test_fault_located_in_the_defining_program() {
        let evaluator = Evaluator::new();
        evaluator
            .run("(function helper (x)\n  (x + 1)\n  (missing x))", "lib.st")
            .unwrap();
        let fault = evaluator.run("\n\n(helper 1)", "main.st").unwrap_err();
        assert!(matches!(&fault.error, Error::UnboundSymbol(name) if &**name == "missing"));
        assert_eq!(&*fault.label, "lib.st");
        let position = fault.position.unwrap();
        assert_eq!((position.line, position.column), (3, 4));
        assert_eq!(fault.span.map(|span| span.start), Some(position.offset));
        assert!(evaluator.current_source().is_none());
    }

    #[test]
    fn test_syntax_errors_become_faults() {
        let evaluator = Evaluator::new();
        let fault = evaluator.run("(add 1", "demo.st").unwrap_err();
        assert!(matches!(fault.error, Error::Syntax(_)));
        assert_eq!(fault.position.map(|p| p.offset), Some(6));
    }

    #[test]
    fn test_depth_limit() {
        let evaluator = Evaluator::with_config(Config::default().with_max_depth(16));
        let fault = evaluator
            .run("(function forever (n) (forever (n + 1))) (forever 0)", "test")
            .unwrap_err();
        assert!(matches!(fault.error, Error::StackExhausted(16)));
        assert_eq!(evaluator.depth(), 0);
        assert!(matches!(
            evaluator.run("(forever)", "test").map_err(|fault| fault.error),
            Err(Error::ArityMismatch { expected: 1, got: 0, .. })
        ));
    }

    #[test]
    fn test_dropping_the_session_frees_closures() {
        let evaluator = Evaluator::new();
        evaluator.run("(function f (x) x)", "test").unwrap();
        let f = evaluator.root_scope().lookup("f").unwrap();
        let weak = match &f {
            Value::Function(function) => Rc::downgrade(function),
            other => panic!("expected a function, got {:?}", other),
        };
        drop(f);
        drop(evaluator);
        assert!(weak.upgrade().is_none());
    }
}
