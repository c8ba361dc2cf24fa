use std::{fmt, rc::Rc, sync::Arc};

use crate::{
    ast::Expr,
    class::Class,
    ffi::Pointer,
    function::Function,
    object::Instance,
};

/// An interpreter value.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(Rc<[Value]>),
    /// An unevaluated expression, as received by functions that evaluate their
    /// own arguments or produced by `quote`.
    Expr(Expr),
    Function(Rc<dyn Function>),
    Class(Rc<Class>),
    Object(Rc<Instance>),
    Pointer(Pointer),
}

impl Value {
    pub const NULL: Value = Value::Null;
    pub const TRUE: Value = Value::Bool(true);
    pub const FALSE: Value = Value::Bool(false);

    pub fn empty_list() -> Value {
        Value::List(Rc::from(Vec::new()))
    }

    pub fn function(function: Rc<dyn Function>) -> Value {
        Value::Function(function)
    }

    /// `null`, `false` and numeric zero are false; everything else is true.
    pub fn is_true(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(x) => *x,
            Value::Int(x) => *x != 0,
            Value::Float(x) => *x != 0.0,
            _ => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(x) => Some(*x),
            Value::Float(x) => Some(*x as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(x) => Some(*x as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(x) => Some(x),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Rc<dyn Function>> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_expr(&self) -> Option<&Expr> {
        match self {
            Value::Expr(e) => Some(e),
            _ => None,
        }
    }

    /// Like `Display`, but strings are quoted and escaped.
    pub fn pretty_description(&self) -> String {
        match self {
            Value::Str(x) => format!("{:?}", &**x),
            Value::List(items) => {
                let items: Vec<_> = items.iter().map(Value::pretty_description).collect();
                format!("({})", items.join(" "))
            }
            other => other.to_string(),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Expr(a), Value::Expr(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => {
                Rc::as_ptr(a) as *const u8 == Rc::as_ptr(b) as *const u8
            }
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Pointer(a), Value::Pointer(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(x) => write!(f, "{}", x),
            Value::Int(x) => write!(f, "{}", x),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(x) => f.write_str(x),
            Value::List(items) => {
                f.write_str("(")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str(")")
            }
            Value::Expr(x) => write!(f, "{}", x),
            Value::Function(x) => match x.name() {
                Some(name) => write!(f, "<{} {}>", x.class_name(), name),
                None => write!(f, "<{}>", x.class_name()),
            },
            Value::Class(x) => f.write_str(x.name()),
            Value::Object(x) => write!(f, "<{} instance>", x.class().name()),
            Value::Pointer(x) => write!(f, "{:p}", x.as_ptr()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pretty_description())
    }
}

impl From<bool> for Value {
    fn from(x: bool) -> Self {
        Value::Bool(x)
    }
}

impl From<i64> for Value {
    fn from(x: i64) -> Self {
        Value::Int(x)
    }
}

impl From<i32> for Value {
    fn from(x: i32) -> Self {
        Value::Int(x as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(x: &str) -> Self {
        Value::Str(x.into())
    }
}

impl From<String> for Value {
    fn from(x: String) -> Self {
        Value::Str(x.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(x: Vec<Value>) -> Self {
        Value::List(x.into())
    }
}

impl From<Rc<dyn Function>> for Value {
    fn from(x: Rc<dyn Function>) -> Self {
        Value::Function(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        for falsy in [Value::NULL, Value::FALSE, Value::Int(0), Value::Float(0.0)] {
            assert!(!falsy.is_true(), "{:?} should be false", falsy);
        }
        for truthy in [
            Value::TRUE,
            Value::Int(-1),
            Value::from(""),
            Value::empty_list(),
        ] {
            assert!(truthy.is_true(), "{:?} should be true", truthy);
        }
    }

    #[test]
    fn test_numeric_equality_crosses_representations() {
        assert_eq!(Value::Int(3), Value::Float(3.0));
        assert_ne!(Value::Int(3), Value::from("3"));
    }

    #[test]
    fn test_descriptions() {
        let list = Value::from(vec![Value::from("a"), Value::Int(1), Value::Float(2.0)]);
        assert_eq!(list.to_string(), "(a 1 2.0)");
        assert_eq!(list.pretty_description(), "(\"a\" 1 2.0)");
    }
}
