//! Interpreted functions.

use std::{
    any::Any,
    cell::RefCell,
    fmt,
    os::raw::c_void,
    panic::{self, AssertUnwindSafe},
    rc::{Rc, Weak},
    sync::Arc,
};

use crate::{
    ast::{Expr, ExprKind},
    class::{self, Class},
    error::{panic_message, Error, Result},
    ffi::{NativeType, Signature},
    function::Function,
    scope::Scope,
    trampoline::Trampoline,
    value::Value,
    vm::{Evaluator, Source, WeakEvaluator},
};

pub const SELF: &str = "self";
pub const SUPER: &str = "super";

#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    pub name: Rc<str>,
    pub ty: Option<NativeType>,
}

impl Parameter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            ty: None,
        }
    }

    pub fn typed(name: &str, ty: NativeType) -> Self {
        Self {
            name: name.into(),
            ty: Some(ty),
        }
    }
}

/// Ordered parameters, optionally typed, plus an optional return type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Prototype {
    parameters: Vec<Parameter>,
    returns: Option<NativeType>,
}

impl Prototype {
    pub fn new(parameters: Vec<Parameter>, returns: Option<NativeType>) -> Self {
        Self {
            parameters,
            returns,
        }
    }

    pub fn untyped(names: &[&str]) -> Self {
        Self::new(names.iter().map(|name| Parameter::new(name)).collect(), None)
    }

    /// Reads `(a (b int) -> double)`.
    pub fn parse(expr: &Expr) -> Result<Self> {
        let items = match &expr.kind {
            ExprKind::List(items) => items,
            ExprKind::Nil => return Ok(Prototype::default()),
            _ => {
                return Err(Error::invalid_form(
                    "prototype",
                    format!("expected a parameter list, found {}", expr),
                ))
            }
        };
        let mut prototype = Prototype::default();
        let mut items = items.iter();
        while let Some(item) = items.next() {
            match &item.kind {
                ExprKind::Symbol(arrow) if &**arrow == "->" => {
                    let ty = items.next().and_then(Expr::as_symbol).ok_or_else(|| {
                        Error::invalid_form("prototype", "'->' must be followed by a type name")
                    })?;
                    if let Some(extra) = items.next() {
                        return Err(Error::invalid_form(
                            "prototype",
                            format!("unexpected {} after the return type", extra),
                        ));
                    }
                    prototype.returns = Some(NativeType::from_name(ty));
                }
                ExprKind::Symbol(name) => prototype.push(Parameter::new(name))?,
                ExprKind::List(pair) => match &pair[..] {
                    [name, ty] => match (name.as_symbol(), ty.as_symbol()) {
                        (Some(name), Some(ty)) => {
                            prototype.push(Parameter::typed(name, NativeType::from_name(ty)))?
                        }
                        _ => {
                            return Err(Error::invalid_form(
                                "prototype",
                                format!("expected (name type), found {}", item),
                            ))
                        }
                    },
                    _ => {
                        return Err(Error::invalid_form(
                            "prototype",
                            format!("expected (name type), found {}", item),
                        ))
                    }
                },
                _ => {
                    return Err(Error::invalid_form(
                        "prototype",
                        format!("{} is not a parameter", item),
                    ))
                }
            }
        }
        Ok(prototype)
    }

    fn push(&mut self, parameter: Parameter) -> Result<()> {
        if crate::ast::is_keyword(&parameter.name) || &*parameter.name == SELF {
            return Err(Error::invalid_form(
                "prototype",
                format!("'{}' cannot be a parameter name", parameter.name),
            ));
        }
        if self.parameters.iter().any(|p| p.name == parameter.name) {
            return Err(Error::invalid_form(
                "prototype",
                format!("duplicate parameter '{}'", parameter.name),
            ));
        }
        self.parameters.push(parameter);
        Ok(())
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn returns(&self) -> Option<&NativeType> {
        self.returns.as_ref()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// The signature implied by the annotations, if there are any. Untyped
    /// parameters and an undeclared return type default to `id`.
    pub fn signature(&self) -> Option<Signature> {
        let annotated = self.returns.is_some() || self.parameters.iter().any(|p| p.ty.is_some());
        annotated.then(|| {
            Signature::new(
                self.parameters
                    .iter()
                    .map(|p| p.ty.clone().unwrap_or(NativeType::Object))
                    .collect(),
                self.returns.clone().unwrap_or(NativeType::Object),
            )
        })
    }
}

/// A function implemented by interpreted expressions, closed over the scope it
/// was created in.
pub struct Closure {
    evaluator: WeakEvaluator,
    superscope: Scope,
    owning_class: RefCell<Option<Rc<Class>>>,
    name: RefCell<Option<Rc<str>>>,
    prototype: Prototype,
    implementation: Arc<[Expr]>,
    /// Program the implementation was read from.
    source: Option<Rc<Source>>,
    signature: Option<Signature>,
    /// `None` without a signature, the build outcome otherwise.
    native: Option<Result<Trampoline>>,
}

impl Closure {
    /// When `signature` is given the native trampoline is built right away. A
    /// failed build is logged and leaves the closure usable from the
    /// interpreter, with [`Closure::function_pointer`] returning `None`.
    pub fn new(
        prototype: Prototype,
        implementation: impl Into<Arc<[Expr]>>,
        signature: Option<Signature>,
        evaluator: &Evaluator,
        superscope: Scope,
    ) -> Rc<Closure> {
        let implementation = implementation.into();
        Rc::new_cyclic(|this: &Weak<Closure>| {
            let native = signature.as_ref().map(|signature| {
                if signature.arguments().len() != prototype.len() {
                    return Err(Error::ArityMismatch {
                        function: format!("signature {}", signature).into(),
                        expected: prototype.len(),
                        got: signature.arguments().len(),
                    });
                }
                let target: Weak<dyn Function> = this.clone();
                Trampoline::build(signature, target, None)
            });
            if let Some(Err(error)) = &native {
                tracing::warn!(%error, "closure has no native entry point");
            }
            Closure {
                evaluator: evaluator.downgrade(),
                superscope,
                owning_class: RefCell::new(None),
                name: RefCell::new(None),
                prototype,
                implementation,
                source: evaluator.current_source(),
                signature,
                native,
            }
        })
    }

    /// Native entry point, if a signature was given and the trampoline could
    /// be built. Valid while the closure is alive.
    pub fn function_pointer(&self) -> Option<*const c_void> {
        match &self.native {
            Some(Ok(trampoline)) => Some(trampoline.function_pointer()),
            _ => None,
        }
    }

    /// Why there is no native entry point despite a signature.
    pub fn trampoline_error(&self) -> Option<&Error> {
        match &self.native {
            Some(Err(error)) => Some(error),
            _ => None,
        }
    }

    pub fn superscope(&self) -> &Scope {
        &self.superscope
    }

    pub fn owning_class(&self) -> Option<Rc<Class>> {
        self.owning_class.borrow().clone()
    }

    /// Makes `super` resolve to the superclass of `class` inside the body.
    pub fn set_owning_class(&self, class: Option<Rc<Class>>) {
        *self.owning_class.borrow_mut() = class;
    }

    pub fn set_name(&self, name: Option<&str>) {
        *self.name.borrow_mut() = name.map(Rc::from);
    }

    pub fn prototype(&self) -> &Prototype {
        &self.prototype
    }

    pub fn implementation(&self) -> &[Expr] {
        &self.implementation
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    fn display_name(&self) -> Box<str> {
        match &*self.name.borrow() {
            Some(name) => (**name).into(),
            None => "<lambda>".into(),
        }
    }

    fn parameter_type(&self, index: usize) -> Option<&NativeType> {
        self.prototype.parameters[index].ty.as_ref().or_else(|| {
            self.signature
                .as_ref()
                .filter(|s| s.arguments().len() == self.prototype.len())
                .map(|s| &s.arguments()[index])
        })
    }

    fn return_type(&self) -> Option<&NativeType> {
        self.prototype
            .returns()
            .or_else(|| self.signature.as_ref().map(Signature::returns))
    }

    /// A fresh child of the captured scope with the parameters bound.
    fn bind(&self, arguments: &[Value]) -> Result<Scope> {
        if arguments.len() != self.prototype.len() {
            return Err(Error::ArityMismatch {
                function: self.display_name(),
                expected: self.prototype.len(),
                got: arguments.len(),
            });
        }
        let scope = self.superscope.child();
        for (index, (parameter, argument)) in
            self.prototype.parameters.iter().zip(arguments).enumerate()
        {
            let value = match self.parameter_type(index) {
                Some(ty) => ty.coerce(argument)?,
                None => argument.clone(),
            };
            scope.define(&parameter.name, value);
        }
        if let Some(class) = &*self.owning_class.borrow() {
            if let Some(superclass) = class.superclass() {
                scope.define(SUPER, Value::Class(superclass.clone()));
            }
        }
        Ok(scope)
    }

    fn run(&self, evaluator: &Evaluator, scope: &Scope) -> Result<Value> {
        let _frame = evaluator.enter()?;
        let _source = evaluator.enter_source(self.source.clone());
        let mut result = Value::NULL;
        for expr in self.implementation.iter() {
            result = evaluator.evaluate(expr, scope)?;
        }
        match self.return_type() {
            Some(NativeType::Object) | None => Ok(result),
            Some(ty) => ty.coerce(&result),
        }
    }

    fn session(&self) -> Result<Evaluator> {
        self.evaluator.upgrade().ok_or(Error::SessionClosed)
    }

    /// Applies the closure as a method of `receiver`: `self` is bound in the
    /// body's scope.
    pub fn apply_method(&self, receiver: &Value, arguments: &[Value]) -> Result<Value> {
        let evaluator = self.session()?;
        let scope = self.bind(arguments)?;
        scope.define(SELF, receiver.clone());
        self.run(&evaluator, &scope)
    }

    /// Repeats `body` while this closure returns a true value. Returns the
    /// last result of `body`, `null` if it never ran.
    pub fn while_true(&self, body: &dyn Function) -> Result<Value> {
        self.repeat_while(true, body)
    }

    /// Repeats `body` while this closure returns a false value.
    pub fn while_false(&self, body: &dyn Function) -> Result<Value> {
        self.repeat_while(false, body)
    }

    fn repeat_while(&self, expected: bool, body: &dyn Function) -> Result<Value> {
        let mut last = Value::NULL;
        while self.apply(&[], &self.superscope)?.is_true() == expected {
            last = body.apply(&[], &self.superscope)?;
        }
        Ok(last)
    }

    /// Applies this closure, handing any failure to `handler` instead of the
    /// caller. Returns whether the handler ran. A handler declaring one
    /// parameter receives the failure's message.
    pub fn on_exception(&self, handler: &dyn Function) -> Result<bool> {
        let evaluator = self.session()?;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.apply(&[], &self.superscope)));
        let message: Box<str> = match outcome {
            Ok(Ok(_)) => return Ok(false),
            Ok(Err(error)) => error.to_string().into(),
            Err(payload) => Error::NativePanic(panic_message(&*payload)).to_string().into(),
        };
        tracing::debug!(%message, "exception handled");
        evaluator.clear_fault_site();
        let takes_message = handler
            .as_any()
            .downcast_ref::<Closure>()
            .map_or(false, |closure| closure.prototype.len() == 1);
        let arguments = if takes_message {
            vec![Value::Str((*message).into())]
        } else {
            vec![]
        };
        handler.apply(&arguments, &self.superscope)?;
        Ok(true)
    }
}

impl Function for Closure {
    fn evaluator(&self) -> Option<Evaluator> {
        self.evaluator.upgrade()
    }

    fn apply(&self, arguments: &[Value], _scope: &Scope) -> Result<Value> {
        let evaluator = self.session()?;
        let scope = self.bind(arguments)?;
        self.run(&evaluator, &scope)
    }

    fn captured_scope(&self) -> Option<Scope> {
        Some(self.superscope.clone())
    }

    fn name(&self) -> Option<Rc<str>> {
        self.name.borrow().clone()
    }

    fn class_name(&self) -> &'static str {
        class::CLOSURE
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("name", &self.name.borrow())
            .field("prototype", &self.prototype)
            .field("signature", &self.signature)
            .field("native", &self.function_pointer())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn expr(source: &str) -> Expr {
        parse(source, "test").unwrap().remove(0)
    }

    #[test]
    fn test_prototype_parsing() {
        let prototype = Prototype::parse(&expr("(a (b int) (c double) -> float)")).unwrap();
        assert_eq!(
            prototype.parameters(),
            &[
                Parameter::new("a"),
                Parameter::typed("b", NativeType::I32),
                Parameter::typed("c", NativeType::F64),
            ]
        );
        assert_eq!(prototype.returns(), Some(&NativeType::F32));
        assert_eq!(
            prototype.signature(),
            Some(Signature::parse(&["id", "int", "double"], "float"))
        );
        assert_eq!(Prototype::parse(&expr("(a b)")).unwrap().signature(), None);
        assert!(Prototype::parse(&expr("nil")).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_prototypes() {
        for source in ["(a a)", "(1)", "((a))", "(a ->)", "(-> int extra)", "(self)", "x"] {
            assert!(
                matches!(Prototype::parse(&expr(source)), Err(Error::InvalidForm { .. })),
                "{} should be rejected",
                source
            );
        }
    }

    #[test]
    fn test_apply_binds_parameters_in_captured_scope() {
        let evaluator = Evaluator::new();
        let captured = evaluator.root_scope().child();
        captured.define("offset", Value::Int(10));
        let body = parse("(x + offset)", "test").unwrap();
        let closure = Closure::new(Prototype::untyped(&["x"]), body, None, &evaluator, captured);
        let unrelated = Scope::new();
        assert_eq!(closure.apply(&[Value::Int(5)], &unrelated).unwrap(), Value::Int(15));
        assert!(closure.function_pointer().is_none());
        assert!(closure.trampoline_error().is_none());
    }

    #[test]
    fn test_empty_body_yields_null() {
        let evaluator = Evaluator::new();
        let closure = Closure::new(
            Prototype::default(),
            Vec::new(),
            None,
            &evaluator,
            evaluator.root_scope().clone(),
        );
        assert_eq!(closure.apply(&[], &Scope::new()).unwrap(), Value::NULL);
    }

    #[test]
    fn test_typed_parameters_are_coerced() {
        let evaluator = Evaluator::new();
        let body = parse("x", "test").unwrap();
        let prototype = Prototype::parse(&expr("((x char) -> long)")).unwrap();
        let signature = prototype.signature();
        let closure = Closure::new(prototype, body, signature, &evaluator, Scope::new());
        assert_eq!(closure.apply(&[Value::Int(257)], &Scope::new()).unwrap(), Value::Int(1));
        assert!(matches!(
            closure.apply(&[Value::from("no")], &Scope::new()),
            Err(Error::TypeCoercion { .. })
        ));
    }

    #[test]
    fn test_mismatched_signature_disables_trampoline() {
        let evaluator = Evaluator::new();
        let closure = Closure::new(
            Prototype::untyped(&["a", "b"]),
            parse("a", "test").unwrap(),
            Some(Signature::parse(&["int"], "int")),
            &evaluator,
            Scope::new(),
        );
        assert!(closure.function_pointer().is_none());
        assert!(matches!(closure.trampoline_error(), Some(Error::ArityMismatch { .. })));
        assert_eq!(
            closure.apply(&[Value::Int(1), Value::Int(2)], &Scope::new()).unwrap(),
            Value::Int(1)
        );
    }

    #[test]
    fn test_names() {
        let evaluator = Evaluator::new();
        let closure = Closure::new(Prototype::default(), Vec::new(), None, &evaluator, Scope::new());
        assert_eq!(Function::name(&*closure), None);
        closure.set_name(Some("unit"));
        assert_eq!(Function::name(&*closure).as_deref(), Some("unit"));
        match closure.apply(&[Value::NULL], &Scope::new()) {
            Err(Error::ArityMismatch { function, .. }) => assert_eq!(&*function, "unit"),
            other => panic!("expected an arity mismatch, got {:?}", other),
        }
    }
}
