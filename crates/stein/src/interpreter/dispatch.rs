use std::rc::Rc;

use crate::{
    ast::Expr,
    class::{self, Class, Method},
    closure::Closure,
    error::{Error, Result},
    scope::Scope,
    value::Value,
    vm::Evaluator,
};

/// A decoded message: its selector and evaluated arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub selector: String,
    pub arguments: Vec<Value>,
}

fn printed(parts: &[Expr]) -> String {
    parts.iter().map(Expr::to_string).collect::<Vec<_>>().join(" ")
}

impl Evaluator {
    /// Builds the message spelled by `parts`, the elements following the
    /// receiver.
    pub(crate) fn decode_message(
        &self,
        receiver: &Value,
        parts: &[Expr],
        scope: &Scope,
    ) -> Result<Message> {
        let malformed = || Error::DispatchFailure {
            receiver: self.classes().class_of(receiver).name().into(),
            selector: printed(parts).into(),
        };
        match parts {
            [selector] if !selector.is_keyword() => {
                let selector = selector.as_symbol().ok_or_else(malformed)?;
                Ok(Message {
                    selector: selector.to_string(),
                    arguments: vec![],
                })
            }
            [selector, argument] if !selector.is_keyword() => {
                let selector = selector.as_symbol().ok_or_else(malformed)?;
                Ok(Message {
                    selector: selector.to_string(),
                    arguments: vec![self.evaluate(argument, scope)?],
                })
            }
            _ if !parts.is_empty() && parts.len() % 2 == 0 => {
                let mut selector = String::new();
                let mut arguments = Vec::with_capacity(parts.len() / 2);
                for pair in parts.chunks(2) {
                    match pair[0].as_symbol() {
                        Some(keyword) if pair[0].is_keyword() => selector.push_str(keyword),
                        _ => return Err(malformed()),
                    }
                    arguments.push(self.evaluate(&pair[1], scope)?);
                }
                Ok(Message {
                    selector,
                    arguments,
                })
            }
            _ => Err(malformed()),
        }
    }

    pub(crate) fn send_parts(
        &self,
        receiver: &Value,
        parts: &[Expr],
        scope: &Scope,
        lookup_from: Option<Rc<Class>>,
    ) -> Result<Value> {
        let message = self.decode_message(receiver, parts, scope)?;
        self.dispatch(receiver, &message.selector, &message.arguments, lookup_from)
    }

    /// Sends `selector` with `arguments` to `receiver`.
    pub fn send(&self, receiver: &Value, selector: &str, arguments: &[Value]) -> Result<Value> {
        self.dispatch(receiver, selector, arguments, None)
    }

    /// Like [`Evaluator::send`], with method lookup starting at `class`.
    pub fn send_super(
        &self,
        receiver: &Value,
        class: &Rc<Class>,
        selector: &str,
        arguments: &[Value],
    ) -> Result<Value> {
        self.dispatch(receiver, selector, arguments, Some(class.clone()))
    }

    #[tracing::instrument(level = "trace", skip(self, receiver, arguments, lookup_from))]
    fn dispatch(
        &self,
        receiver: &Value,
        selector: &str,
        arguments: &[Value],
        lookup_from: Option<Rc<Class>>,
    ) -> Result<Value> {
        let class = lookup_from.unwrap_or_else(|| self.classes().class_of(receiver));
        let method = class.resolve(selector).ok_or_else(|| Error::DispatchFailure {
            receiver: self.classes().class_of(receiver).name().into(),
            selector: selector.into(),
        })?;
        let expected = class::selector_arity(selector);
        if arguments.len() != expected {
            return Err(Error::ArityMismatch {
                function: selector.into(),
                expected,
                got: arguments.len(),
            });
        }
        tracing::trace!(class = class.name(), "method resolved");
        match method {
            Method::Native(body) => body(self, receiver, arguments),
            Method::Function(function) => match function.as_any().downcast_ref::<Closure>() {
                Some(closure) => closure.apply_method(receiver, arguments),
                None => {
                    let mut full = Vec::with_capacity(arguments.len() + 1);
                    full.push(receiver.clone());
                    full.extend_from_slice(arguments);
                    function.apply(&full, self.root_scope())
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn decode(evaluator: &Evaluator, source: &str) -> Result<Message> {
        let parts = parse(source, "test").unwrap();
        evaluator.decode_message(&Value::Int(1), &parts, evaluator.root_scope())
    }

    #[test]
    fn test_decoding() {
        let evaluator = Evaluator::new();
        assert_eq!(
            decode(&evaluator, "description").unwrap(),
            Message {
                selector: "description".into(),
                arguments: vec![],
            }
        );
        assert_eq!(
            decode(&evaluator, "+ (1 + 1)").unwrap(),
            Message {
                selector: "+".into(),
                arguments: vec![Value::Int(2)],
            }
        );
        assert_eq!(
            decode(&evaluator, "at: 0 put: \"x\"").unwrap(),
            Message {
                selector: "at:put:".into(),
                arguments: vec![Value::Int(0), Value::from("x")],
            }
        );
    }

    #[test]
    fn test_malformed_messages() {
        let evaluator = Evaluator::new();
        for source in ["a b c", "at: 1 put:", "3", "at: 1 b 2", "at:"] {
            assert!(
                matches!(decode(&evaluator, source), Err(Error::DispatchFailure { .. })),
                "{} should not decode",
                source
            );
        }
    }

    #[test]
    fn test_unknown_selector() {
        let evaluator = Evaluator::new();
        match evaluator.send(&Value::Int(1), "frobnicate", &[]) {
            Err(Error::DispatchFailure { receiver, selector }) => {
                assert_eq!((&*receiver, &*selector), ("Number", "frobnicate"));
            }
            other => panic!("expected a dispatch failure, got {:?}", other),
        }
    }

    #[test]
    fn test_send_checks_selector_arity() {
        let evaluator = Evaluator::new();
        assert!(matches!(
            evaluator.send(&Value::Int(1), "+", &[]),
            Err(Error::ArityMismatch { expected: 1, got: 0, .. })
        ));
    }
}
