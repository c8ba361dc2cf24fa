//! Messages every value understands, plus the class and closure protocols:
//! truthiness, conditionals, printing, instance variables, subclassing and
//! `extend:`.
//!
//! Function values answer `name` too. In source `(f name)` applies `f`, so
//! that message is reached through [`Evaluator::send`].

use std::rc::Rc;

use crate::{
    class::{Class, Method},
    closure::Closure,
    error::{Error, Result},
    function::Function,
    object::Instance,
    value::Value,
    vm::Evaluator,
};

pub(crate) fn function<'a>(evaluator: &Evaluator, value: &'a Value) -> Result<&'a Rc<dyn Function>> {
    value.as_function().ok_or_else(|| {
        Error::coercion("Function", evaluator.classes().class_of(value).name())
    })
}

fn closure<'a>(evaluator: &Evaluator, value: &'a Value) -> Result<&'a Closure> {
    function(evaluator, value)?
        .as_any()
        .downcast_ref::<Closure>()
        .ok_or_else(|| Error::coercion("Closure", evaluator.classes().class_of(value).name()))
}

fn class(value: &Value) -> Result<&Rc<Class>> {
    match value {
        Value::Class(class) => Ok(class),
        other => Err(Error::coercion("Class", other.pretty_description())),
    }
}

fn text<'a>(what: &str, value: &'a Value) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| Error::coercion(what, value.pretty_description()))
}

/// Applies a clause such as the argument of `ifTrue:`.
fn run_clause(evaluator: &Evaluator, clause: &Value) -> Result<Value> {
    function(evaluator, clause)?.apply(&[], evaluator.root_scope())
}

fn object_is_true(_: &Evaluator, receiver: &Value, _: &[Value]) -> Result<Value> {
    Ok(Value::Bool(receiver.is_true()))
}

fn object_if_true(evaluator: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    if receiver.is_true() {
        run_clause(evaluator, &args[0])
    } else {
        Ok(Value::NULL)
    }
}

fn object_if_false(evaluator: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    if receiver.is_true() {
        Ok(Value::NULL)
    } else {
        run_clause(evaluator, &args[0])
    }
}

fn object_if_true_if_false(evaluator: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    let clause = if receiver.is_true() { &args[0] } else { &args[1] };
    run_clause(evaluator, clause)
}

fn object_if_false_if_true(evaluator: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    let clause = if receiver.is_true() { &args[1] } else { &args[0] };
    run_clause(evaluator, clause)
}

fn object_description(_: &Evaluator, receiver: &Value, _: &[Value]) -> Result<Value> {
    Ok(Value::from(receiver.to_string()))
}

fn object_pretty_description(_: &Evaluator, receiver: &Value, _: &[Value]) -> Result<Value> {
    Ok(Value::from(receiver.pretty_description()))
}

fn object_print(_: &Evaluator, receiver: &Value, _: &[Value]) -> Result<Value> {
    println!("{}", receiver);
    Ok(receiver.clone())
}

fn object_pretty_print(_: &Evaluator, receiver: &Value, _: &[Value]) -> Result<Value> {
    println!("{}", receiver.pretty_description());
    Ok(receiver.clone())
}

fn object_class(evaluator: &Evaluator, receiver: &Value, _: &[Value]) -> Result<Value> {
    Ok(Value::Class(evaluator.classes().class_of(receiver)))
}

fn object_responds_to(evaluator: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    let selector = text("selector", &args[0])?;
    Ok(Value::Bool(
        evaluator.classes().class_of(receiver).responds_to(selector),
    ))
}

fn object_equals(_: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(*receiver == args[0]))
}

fn instance<'a>(evaluator: &Evaluator, receiver: &'a Value, field: &str) -> Result<&'a Instance> {
    match receiver {
        Value::Object(instance) => Ok(instance),
        other => Err(Error::NoSuchField {
            class: evaluator.classes().class_of(other).name().into(),
            field: field.into(),
        }),
    }
}

fn object_value_for_ivar(evaluator: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    let field = text("field name", &args[0])?;
    instance(evaluator, receiver, field)?.get(field)
}

fn object_set_value_for_ivar(evaluator: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    let field = text("field name", &args[1])?;
    instance(evaluator, receiver, field)?.set(field, args[0].clone())?;
    Ok(args[0].clone())
}

fn class_new(_: &Evaluator, receiver: &Value, _: &[Value]) -> Result<Value> {
    Ok(Value::Object(Instance::new(class(receiver)?.clone())))
}

fn class_name(_: &Evaluator, receiver: &Value, _: &[Value]) -> Result<Value> {
    Ok(Value::from(class(receiver)?.name()))
}

fn class_superclass(_: &Evaluator, receiver: &Value, _: &[Value]) -> Result<Value> {
    Ok(class(receiver)?
        .superclass()
        .cloned()
        .map(Value::Class)
        .unwrap_or(Value::NULL))
}

fn class_subclass(evaluator: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    let name = text("class name", &args[0])?;
    let superclass = class(receiver)?.clone();
    Ok(Value::Class(evaluator.classes().define(name, Some(superclass), &[])?))
}

fn class_subclass_fields(evaluator: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    let name = text("class name", &args[0])?;
    let fields = match &args[1] {
        Value::List(items) => items
            .iter()
            .map(|item| text("field name", item))
            .collect::<Result<Vec<_>>>()?,
        other => return Err(Error::coercion("List", other.pretty_description())),
    };
    let superclass = class(receiver)?.clone();
    Ok(Value::Class(evaluator.classes().define(name, Some(superclass), &fields)?))
}

impl Evaluator {
    /// Runs the body of `definitions` in a fresh scope and installs every
    /// function it binds as a method of `class`, named by its binding.
    /// Returns the number of methods installed.
    pub fn extend(&self, class: &Rc<Class>, definitions: &Closure) -> Result<usize> {
        let scope = definitions.superscope().child();
        self.evaluate_all(definitions.implementation(), &scope)?;
        let mut methods = Vec::new();
        for name in scope.names() {
            if let Some(Value::Function(function)) = scope.get_local(&name) {
                // Unbound so the scope and its methods do not form a cycle.
                scope.remove(&name);
                if let Some(closure) = function.as_any().downcast_ref::<Closure>() {
                    closure.set_owning_class(Some(class.clone()));
                    closure.set_name(Some(&*name));
                }
                methods.push((Rc::from(&*name), Method::Function(function)));
            }
        }
        tracing::debug!(class = class.name(), methods = methods.len(), "extended class");
        let count = methods.len();
        class.extend(methods);
        Ok(count)
    }
}

fn class_extend(evaluator: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    let class = class(receiver)?;
    evaluator.extend(class, closure(evaluator, &args[0])?)?;
    Ok(receiver.clone())
}

fn closure_while_true(evaluator: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    closure(evaluator, receiver)?.while_true(&**function(evaluator, &args[0])?)
}

fn closure_while_false(evaluator: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    closure(evaluator, receiver)?.while_false(&**function(evaluator, &args[0])?)
}

fn closure_on_exception(evaluator: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    let handled = closure(evaluator, receiver)?.on_exception(&**function(evaluator, &args[0])?)?;
    Ok(Value::Bool(handled))
}

fn function_name(evaluator: &Evaluator, receiver: &Value, _: &[Value]) -> Result<Value> {
    Ok(function(evaluator, receiver)?
        .name()
        .map(|name| Value::from(&*name))
        .unwrap_or(Value::NULL))
}

pub(crate) fn install(evaluator: &Evaluator) {
    let classes = evaluator.classes();

    let object = classes.object();
    object.define_native("isTrue", object_is_true);
    object.define_native("ifTrue:", object_if_true);
    object.define_native("ifFalse:", object_if_false);
    object.define_native("ifTrue:ifFalse:", object_if_true_if_false);
    object.define_native("ifFalse:ifTrue:", object_if_false_if_true);
    object.define_native("description", object_description);
    object.define_native("prettyDescription", object_pretty_description);
    object.define_native("print", object_print);
    object.define_native("prettyPrint", object_pretty_print);
    object.define_native("class", object_class);
    object.define_native("respondsTo:", object_responds_to);
    object.define_native("=", object_equals);
    object.define_native("valueForIvarNamed:", object_value_for_ivar);
    object.define_native("setValue:forIvarNamed:", object_set_value_for_ivar);

    let class = classes.class();
    class.define_native("new", class_new);
    class.define_native("name", class_name);
    class.define_native("superclass", class_superclass);
    class.define_native("subclass:", class_subclass);
    class.define_native("subclass:fields:", class_subclass_fields);
    class.define_native("extend:", class_extend);

    classes.function().define_native("name", function_name);

    let closure = classes.closure();
    closure.define_native("whileTrue:", closure_while_true);
    closure.define_native("whileFalse:", closure_while_false);
    closure.define_native("onException:", closure_on_exception);
}
