//! The tree walking evaluator.
//!
//! A non-empty list is read in this order:
//!
//! 1. `(receiver key: arg ...)` with a keyword symbol second is always a
//!    message send, even when `receiver` is a function.
//! 2. `(f arg ...)` applies `f` when the head evaluates to a function.
//! 3. `(value)` with a non-callable head is just that value.
//! 4. `(receiver selector)` and `(receiver op arg)` send unary and binary
//!    messages.
//!
//! `(super ...)` inside a method sends to `self`, starting method lookup at
//! the superclass of the class that owns the method.

use std::rc::Rc;

use crate::{
    ast::{Expr, ExprKind},
    closure::{SELF, SUPER},
    error::{Error, Result},
    function::Function,
    scope::Scope,
    value::Value,
    vm::Evaluator,
};

mod dispatch;

pub use dispatch::Message;

impl Evaluator {
    /// Evaluates `expr` in `scope`.
    pub fn evaluate(&self, expr: &Expr, scope: &Scope) -> Result<Value> {
        let result = match &expr.kind {
            ExprKind::Nil => Ok(Value::NULL),
            ExprKind::Int(x) => Ok(Value::Int(*x)),
            ExprKind::Float(x) => Ok(Value::Float(*x)),
            ExprKind::Str(x) => Ok(Value::Str(x.clone())),
            ExprKind::Symbol(name) => self.resolve(name, scope),
            ExprKind::List(items) => self.evaluate_list(items, scope),
        };
        result.map_err(|error| {
            self.note_fault_site(expr);
            error
        })
    }

    /// Looks `name` up in the scope chain, then among the registered classes.
    pub fn resolve(&self, name: &str, scope: &Scope) -> Result<Value> {
        if let Some(value) = scope.lookup(name) {
            return Ok(value);
        }
        if let Some(class) = self.classes().get(name) {
            return Ok(Value::Class(class));
        }
        Err(Error::UnboundSymbol(name.into()))
    }

    fn evaluate_list(&self, items: &[Expr], scope: &Scope) -> Result<Value> {
        let (head, rest) = match items.split_first() {
            Some(split) => split,
            None => return Ok(Value::empty_list()),
        };

        if head.as_symbol() == Some(SUPER) {
            if let Some(Value::Class(superclass)) = scope.lookup(SUPER) {
                let receiver = scope.lookup(SELF).unwrap_or(Value::NULL);
                return self.send_parts(&receiver, rest, scope, Some(superclass));
            }
        }

        if rest.first().map_or(false, Expr::is_keyword) {
            let receiver = self.evaluate(head, scope)?;
            return self.send_parts(&receiver, rest, scope, None);
        }

        let target = self.evaluate(head, scope)?;
        if let Value::Function(function) = &target {
            return self.apply_parts(function, rest, scope);
        }
        if rest.is_empty() {
            return Ok(target);
        }
        self.send_parts(&target, rest, scope, None)
    }

    /// Applies `function` to argument expressions, evaluating them left to
    /// right unless the function evaluates its own arguments.
    pub fn apply_parts(
        &self,
        function: &Rc<dyn Function>,
        arguments: &[Expr],
        scope: &Scope,
    ) -> Result<Value> {
        let values = if function.evaluates_own_arguments() {
            arguments.iter().cloned().map(Value::Expr).collect()
        } else {
            arguments
                .iter()
                .map(|argument| self.evaluate(argument, scope))
                .collect::<Result<Vec<_>>>()?
        };
        function.apply(&values, scope)
    }

    /// Parses `source` and evaluates it in `scope`, returning the last value.
    pub fn evaluate_source(&self, source: &str, label: &str, scope: &Scope) -> Result<Value> {
        let program = crate::parser::parse(source, label)?;
        let _source = self.enter_source(Some(crate::vm::Source::new(label, source)));
        self.evaluate_all(&program, scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn eval(evaluator: &Evaluator, source: &str) -> Result<Value> {
        evaluator.evaluate_source(source, "test", evaluator.root_scope())
    }

    #[test]
    fn test_atoms_evaluate_to_themselves() {
        let evaluator = Evaluator::new();
        assert_eq!(eval(&evaluator, "42").unwrap(), Value::Int(42));
        assert_eq!(eval(&evaluator, "-2.5").unwrap(), Value::Float(-2.5));
        assert_eq!(eval(&evaluator, "\"hi\"").unwrap(), Value::from("hi"));
        assert_eq!(eval(&evaluator, "nil").unwrap(), Value::NULL);
        assert_eq!(eval(&evaluator, "()").unwrap(), Value::empty_list());
    }

    #[test]
    fn test_unbound_symbol() {
        let evaluator = Evaluator::new();
        assert!(matches!(
            eval(&evaluator, "nowhere"),
            Err(Error::UnboundSymbol(name)) if &*name == "nowhere"
        ));
    }

    #[test]
    fn test_symbols_fall_back_to_classes() {
        let evaluator = Evaluator::new();
        match eval(&evaluator, "Number").unwrap() {
            Value::Class(class) => assert_eq!(class.name(), "Number"),
            other => panic!("expected a class, got {:?}", other),
        }
    }

    #[test]
    fn test_lone_value_in_parentheses() {
        let evaluator = Evaluator::new();
        assert_eq!(eval(&evaluator, "(7)").unwrap(), Value::Int(7));
        assert_eq!(eval(&evaluator, "((7))").unwrap(), Value::Int(7));
    }

    #[test]
    fn test_function_application_and_binary_messages() {
        let evaluator = Evaluator::new();
        assert_eq!(
            eval(&evaluator, "(function add (a b) (a + b)) (add 1 2)").unwrap(),
            Value::Int(3)
        );
        assert_eq!(eval(&evaluator, "((2 * 3) - 1)").unwrap(), Value::Int(5));
    }

    #[test]
    fn test_keyword_second_means_message_even_for_functions() {
        let evaluator = Evaluator::new();
        let result = eval(
            &evaluator,
            "(function f () 1) (f respondsTo: \"whileTrue:\")",
        )
        .unwrap();
        assert_eq!(result, Value::TRUE);
    }

    #[test]
    fn test_raw_arguments_for_special_forms() {
        let evaluator = Evaluator::new();
        let quoted = eval(&evaluator, "(quote (a b))").unwrap();
        assert_eq!(
            quoted,
            Value::Expr(parse("(a b)", "test").unwrap().remove(0))
        );
    }

    #[test]
    fn test_arguments_evaluate_left_to_right() {
        let evaluator = Evaluator::new();
        let result = eval(
            &evaluator,
            "(set trace (list))
             (function note (x) (set trace (trace append: x)) x)
             (list (note 1) (note 2) (note 3))
             trace",
        )
        .unwrap();
        assert_eq!(
            result,
            Value::from(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
    }
}
