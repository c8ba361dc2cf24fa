//! The callable capability shared by interpreted closures and host natives.

use std::{any::Any, fmt, rc::Rc};

use crate::{
    class,
    error::{Error, Result},
    scope::Scope,
    value::Value,
    vm::{Evaluator, WeakEvaluator},
};

/// Anything the evaluator can apply.
pub trait Function: Any {
    /// When true the evaluator passes argument expressions unevaluated, as
    /// [`Value::Expr`], and the function decides what to evaluate.
    fn evaluates_own_arguments(&self) -> bool {
        false
    }

    /// The session this function belongs to, if it is still alive.
    fn evaluator(&self) -> Option<Evaluator>;

    /// Apply to already prepared arguments. `scope` is the caller's scope;
    /// closures ignore it and run in a child of the scope they captured.
    fn apply(&self, arguments: &[Value], scope: &Scope) -> Result<Value>;

    fn captured_scope(&self) -> Option<Scope> {
        None
    }

    fn name(&self) -> Option<Rc<str>> {
        None
    }

    /// Name of the builtin class used to dispatch messages sent to this value.
    fn class_name(&self) -> &'static str {
        class::FUNCTION
    }

    fn as_any(&self) -> &dyn Any;
}

pub type NativeBody = dyn Fn(&Evaluator, &[Value], &Scope) -> Result<Value>;

/// A function implemented in Rust.
pub struct NativeFunction {
    name: Rc<str>,
    evaluator: WeakEvaluator,
    arity: Option<usize>,
    evaluates_own_arguments: bool,
    body: Box<NativeBody>,
}

impl NativeFunction {
    /// `arity` of `None` accepts any number of arguments.
    pub fn new(
        evaluator: &Evaluator,
        name: &str,
        arity: Option<usize>,
        body: impl Fn(&Evaluator, &[Value], &Scope) -> Result<Value> + 'static,
    ) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            evaluator: evaluator.downgrade(),
            arity,
            evaluates_own_arguments: false,
            body: Box::new(body),
        })
    }

    /// Like [`NativeFunction::new`], but the body receives its argument
    /// expressions unevaluated.
    pub fn special_form(
        evaluator: &Evaluator,
        name: &str,
        body: impl Fn(&Evaluator, &[Value], &Scope) -> Result<Value> + 'static,
    ) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            evaluator: evaluator.downgrade(),
            arity: None,
            evaluates_own_arguments: true,
            body: Box::new(body),
        })
    }

    pub fn arity(&self) -> Option<usize> {
        self.arity
    }
}

impl Function for NativeFunction {
    fn evaluates_own_arguments(&self) -> bool {
        self.evaluates_own_arguments
    }

    fn evaluator(&self) -> Option<Evaluator> {
        self.evaluator.upgrade()
    }

    fn apply(&self, arguments: &[Value], scope: &Scope) -> Result<Value> {
        if let Some(expected) = self.arity {
            if arguments.len() != expected {
                return Err(Error::ArityMismatch {
                    function: (*self.name).into(),
                    expected,
                    got: arguments.len(),
                });
            }
        }
        let evaluator = self.evaluator.upgrade().ok_or(Error::SessionClosed)?;
        (self.body)(&evaluator, arguments, scope)
    }

    fn name(&self) -> Option<Rc<str>> {
        Some(self.name.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("evaluates_own_arguments", &self.evaluates_own_arguments)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_function_checks_arity() {
        let evaluator = Evaluator::new();
        let double = NativeFunction::new(&evaluator, "double", Some(1), |_, args, _| {
            Ok(Value::Int(args[0].as_int().unwrap_or(0) * 2))
        });
        let scope = Scope::new();
        assert_eq!(double.apply(&[Value::Int(4)], &scope).unwrap(), Value::Int(8));
        match double.apply(&[], &scope) {
            Err(Error::ArityMismatch { expected, got, .. }) => assert_eq!((expected, got), (1, 0)),
            other => panic!("expected arity mismatch, got {:?}", other.map(|v| v.to_string())),
        }
    }

    #[test]
    fn test_native_function_outliving_its_session() {
        let evaluator = Evaluator::new();
        let constant = NativeFunction::new(&evaluator, "constant", None, |_, _, _| Ok(Value::TRUE));
        drop(evaluator);
        assert!(constant.evaluator().is_none());
        assert!(matches!(
            constant.apply(&[], &Scope::new()),
            Err(Error::SessionClosed)
        ));
    }
}
