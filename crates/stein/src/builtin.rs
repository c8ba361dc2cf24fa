//! Root scope forms and the methods of the builtin value classes.

use std::rc::Rc;

use crate::{
    ast::{Expr, ExprKind},
    closure::{Closure, Prototype, SELF},
    error::{Error, Result},
    extensions::function,
    function::NativeFunction,
    scope::Scope,
    value::Value,
    vm::Evaluator,
};

fn raw<'a>(form: &str, args: &'a [Value], index: usize) -> Result<&'a Expr> {
    args.get(index)
        .and_then(Value::as_expr)
        .ok_or_else(|| Error::invalid_form(form, format!("missing argument {}", index + 1)))
}

fn name<'a>(form: &str, expr: &'a Expr) -> Result<&'a str> {
    match expr.as_symbol() {
        Some(name) if !expr.is_keyword() && name != SELF => Ok(name),
        _ => Err(Error::invalid_form(
            form,
            format!("expected a variable name, found {}", expr),
        )),
    }
}

fn make_closure(
    evaluator: &Evaluator,
    form: &str,
    prototype: &Expr,
    body: &[Value],
    scope: &Scope,
) -> Result<Rc<Closure>> {
    let prototype = Prototype::parse(prototype)?;
    let body = body
        .iter()
        .map(|part| {
            part.as_expr()
                .cloned()
                .ok_or_else(|| Error::invalid_form(form, "body must be unevaluated"))
        })
        .collect::<Result<Vec<_>>>()?;
    let signature = prototype.signature();
    Ok(Closure::new(prototype, body, signature, evaluator, scope.clone()))
}

/// `(lambda (params) body...)`
pub fn builtin_lambda(evaluator: &Evaluator, args: &[Value], scope: &Scope) -> Result<Value> {
    let prototype = raw("lambda", args, 0)?;
    let closure = make_closure(evaluator, "lambda", prototype, &args[1..], scope)?;
    Ok(Value::Function(closure))
}

/// `(function name (params) body...)` binds the closure in the calling scope.
/// A string literal name such as `"at:put:"` binds a keyword selector, which
/// is how a body passed to `extend:` defines keyword methods.
pub fn builtin_function(evaluator: &Evaluator, args: &[Value], scope: &Scope) -> Result<Value> {
    let head = raw("function", args, 0)?;
    let function_name = match &head.kind {
        ExprKind::Str(selector) if !selector.is_empty() => &**selector,
        _ => name("function", head)?,
    };
    let prototype = raw("function", args, 1)?;
    let closure = make_closure(evaluator, "function", prototype, &args[2..], scope)?;
    closure.set_name(Some(function_name));
    tracing::debug!(name = function_name, arity = closure.prototype().len(), "defined function");
    let value = Value::Function(closure);
    scope.define(function_name, value.clone());
    Ok(value)
}

/// `(set name expr)` assigns to the nearest binding of `name`.
pub fn builtin_set(evaluator: &Evaluator, args: &[Value], scope: &Scope) -> Result<Value> {
    if args.len() != 2 {
        return Err(Error::invalid_form("set", "expected (set name value)"));
    }
    let variable = name("set", raw("set", args, 0)?)?;
    let value = evaluator.evaluate(raw("set", args, 1)?, scope)?;
    scope.assign(variable, value.clone());
    Ok(value)
}

pub fn builtin_quote(_: &Evaluator, args: &[Value], _: &Scope) -> Result<Value> {
    if args.len() != 1 {
        return Err(Error::invalid_form("quote", "expected exactly one expression"));
    }
    Ok(args[0].clone())
}

/// Returns the first false operand, or the last one.
pub fn builtin_and(evaluator: &Evaluator, args: &[Value], scope: &Scope) -> Result<Value> {
    let mut result = Value::TRUE;
    for index in 0..args.len() {
        result = evaluator.evaluate(raw("and", args, index)?, scope)?;
        if !result.is_true() {
            break;
        }
    }
    Ok(result)
}

/// Returns the first true operand, or the last one.
pub fn builtin_or(evaluator: &Evaluator, args: &[Value], scope: &Scope) -> Result<Value> {
    let mut result = Value::FALSE;
    for index in 0..args.len() {
        result = evaluator.evaluate(raw("or", args, index)?, scope)?;
        if result.is_true() {
            break;
        }
    }
    Ok(result)
}

pub fn builtin_list(_: &Evaluator, args: &[Value], _: &Scope) -> Result<Value> {
    Ok(Value::from(args.to_vec()))
}

pub fn builtin_print(_: &Evaluator, args: &[Value], _: &Scope) -> Result<Value> {
    let line = args.iter().map(Value::to_string).collect::<Vec<_>>().join(" ");
    println!("{}", line);
    Ok(args.last().cloned().unwrap_or(Value::NULL))
}

pub fn builtin_raise(_: &Evaluator, args: &[Value], _: &Scope) -> Result<Value> {
    let message = args.iter().map(Value::to_string).collect::<Vec<_>>().join(" ");
    Err(Error::Exception(message.into()))
}

fn number(value: &Value) -> Result<f64> {
    value
        .as_float()
        .ok_or_else(|| Error::coercion("Number", value.pretty_description()))
}

fn arithmetic(
    receiver: &Value,
    argument: &Value,
    int: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
) -> Result<Value> {
    if let (Value::Int(a), Value::Int(b)) = (receiver, argument) {
        if let Some(result) = int(*a, *b) {
            return Ok(Value::Int(result));
        }
    }
    Ok(Value::Float(float(number(receiver)?, number(argument)?)))
}

fn nonzero_divisor(argument: &Value) -> Result<()> {
    if number(argument)? == 0.0 {
        return Err(Error::Exception("division by zero".into()));
    }
    Ok(())
}

fn number_add(_: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    arithmetic(receiver, &args[0], i64::checked_add, |a, b| a + b)
}

fn number_sub(_: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    arithmetic(receiver, &args[0], i64::checked_sub, |a, b| a - b)
}

fn number_mul(_: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    arithmetic(receiver, &args[0], i64::checked_mul, |a, b| a * b)
}

/// Integer division stays integral when it is exact.
fn number_div(_: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    nonzero_divisor(&args[0])?;
    arithmetic(
        receiver,
        &args[0],
        |a, b| match a.checked_rem(b) {
            Some(0) => a.checked_div(b),
            _ => None,
        },
        |a, b| a / b,
    )
}

fn number_rem(_: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    nonzero_divisor(&args[0])?;
    arithmetic(receiver, &args[0], i64::checked_rem, |a, b| a % b)
}

fn compare(receiver: &Value, argument: &Value, int: fn(&i64, &i64) -> bool, float: fn(&f64, &f64) -> bool) -> Result<Value> {
    if let (Value::Int(a), Value::Int(b)) = (receiver, argument) {
        return Ok(Value::Bool(int(a, b)));
    }
    Ok(Value::Bool(float(&number(receiver)?, &number(argument)?)))
}

fn number_lt(_: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    compare(receiver, &args[0], i64::lt, f64::lt)
}

fn number_gt(_: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    compare(receiver, &args[0], i64::gt, f64::gt)
}

fn number_le(_: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    compare(receiver, &args[0], i64::le, f64::le)
}

fn number_ge(_: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    compare(receiver, &args[0], i64::ge, f64::ge)
}

fn string(value: &Value) -> Result<&str> {
    value
        .as_str()
        .ok_or_else(|| Error::coercion("String", value.pretty_description()))
}

fn string_length(_: &Evaluator, receiver: &Value, _: &[Value]) -> Result<Value> {
    Ok(Value::Int(string(receiver)?.chars().count() as i64))
}

fn string_concat(_: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::from(format!("{}{}", string(receiver)?, args[0])))
}

fn list(value: &Value) -> Result<&Rc<[Value]>> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(Error::coercion("List", other.pretty_description())),
    }
}

fn list_count(_: &Evaluator, receiver: &Value, _: &[Value]) -> Result<Value> {
    Ok(Value::Int(list(receiver)?.len() as i64))
}

fn list_at(_: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    let items = list(receiver)?;
    let index = match &args[0] {
        Value::Int(index) => *index,
        other => return Err(Error::coercion("integer index", other.pretty_description())),
    };
    usize::try_from(index)
        .ok()
        .and_then(|index| items.get(index))
        .cloned()
        .ok_or_else(|| {
            Error::Exception(
                format!("index {} out of bounds for a list of {}", index, items.len()).into(),
            )
        })
}

fn list_first(_: &Evaluator, receiver: &Value, _: &[Value]) -> Result<Value> {
    Ok(list(receiver)?.first().cloned().unwrap_or(Value::NULL))
}

/// Returns a new list; lists are immutable.
fn list_append(_: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    let mut items = list(receiver)?.to_vec();
    items.push(args[0].clone());
    Ok(Value::from(items))
}

// Enumeration blocks run in the root scope, like message handlers.

fn list_foreach(evaluator: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    let body = function(evaluator, &args[0])?;
    for item in list(receiver)?.iter() {
        body.apply(std::slice::from_ref(item), evaluator.root_scope())?;
    }
    Ok(receiver.clone())
}

fn list_map(evaluator: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    let body = function(evaluator, &args[0])?;
    let mapped = list(receiver)?
        .iter()
        .map(|item| body.apply(std::slice::from_ref(item), evaluator.root_scope()))
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::from(mapped))
}

fn list_filter(evaluator: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    let test = function(evaluator, &args[0])?;
    let mut kept = vec![];
    for item in list(receiver)?.iter() {
        if test.apply(std::slice::from_ref(item), evaluator.root_scope())?.is_true() {
            kept.push(item.clone());
        }
    }
    Ok(Value::from(kept))
}

/// `(items inject: initial into: (lambda (total item) ...))`
fn list_inject_into(evaluator: &Evaluator, receiver: &Value, args: &[Value]) -> Result<Value> {
    let step = function(evaluator, &args[1])?;
    list(receiver)?.iter().try_fold(args[0].clone(), |total, item| {
        step.apply(&[total, item.clone()], evaluator.root_scope())
    })
}

pub(crate) fn install(evaluator: &Evaluator) {
    let root = evaluator.root_scope();
    root.define("true", Value::TRUE);
    root.define("false", Value::FALSE);
    root.define("null", Value::NULL);

    let forms: [(&str, fn(&Evaluator, &[Value], &Scope) -> Result<Value>); 6] = [
        ("lambda", builtin_lambda),
        ("function", builtin_function),
        ("set", builtin_set),
        ("quote", builtin_quote),
        ("and", builtin_and),
        ("or", builtin_or),
    ];
    for (name, form) in forms {
        root.define(name, Value::Function(NativeFunction::special_form(evaluator, name, form)));
    }

    let functions: [(&str, fn(&Evaluator, &[Value], &Scope) -> Result<Value>); 3] = [
        ("list", builtin_list),
        ("print", builtin_print),
        ("raise", builtin_raise),
    ];
    for (name, function) in functions {
        root.define(name, Value::Function(NativeFunction::new(evaluator, name, None, function)));
    }

    let classes = evaluator.classes();
    let number = classes.number();
    number.define_native("+", number_add);
    number.define_native("-", number_sub);
    number.define_native("*", number_mul);
    number.define_native("/", number_div);
    number.define_native("%", number_rem);
    number.define_native("<", number_lt);
    number.define_native(">", number_gt);
    number.define_native("<=", number_le);
    number.define_native(">=", number_ge);

    let string = classes.string();
    string.define_native("length", string_length);
    string.define_native("+", string_concat);

    let list = classes.list();
    list.define_native("count", list_count);
    list.define_native("at:", list_at);
    list.define_native("first", list_first);
    list.define_native("append:", list_append);
    list.define_native("foreach:", list_foreach);
    list.define_native("map:", list_map);
    list.define_native("filter:", list_filter);
    list.define_native("inject:into:", list_inject_into);
}
