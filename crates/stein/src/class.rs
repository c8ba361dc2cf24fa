//! Classes, method tables and the per-session class registry.

use std::{cell::RefCell, fmt, rc::Rc};

use indexmap::IndexMap;

use crate::{
    error::{Error, Result},
    function::Function,
    value::Value,
    vm::Evaluator,
};

pub const OBJECT: &str = "Object";
pub const NULL: &str = "Null";
pub const BOOLEAN: &str = "Boolean";
pub const NUMBER: &str = "Number";
pub const STRING: &str = "String";
pub const LIST: &str = "List";
pub const FUNCTION: &str = "Function";
pub const CLOSURE: &str = "Closure";
pub const CLASS: &str = "Class";
pub const EXPRESSION: &str = "Expression";
pub const POINTER: &str = "Pointer";

pub type NativeMethod = fn(evaluator: &Evaluator, receiver: &Value, arguments: &[Value]) -> Result<Value>;

#[derive(Clone)]
pub enum Method {
    Native(NativeMethod),
    /// Closures are applied with `self` bound to the receiver. Any other
    /// function receives the receiver as its first argument.
    Function(Rc<dyn Function>),
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Native(_) => f.write_str("Method::Native"),
            Method::Function(function) => write!(f, "Method::Function({:?})", function.name()),
        }
    }
}

/// Number of arguments a message with this selector carries.
pub fn selector_arity(selector: &str) -> usize {
    let keywords = selector.matches(':').count();
    if keywords > 0 {
        keywords
    } else if is_binary_selector(selector) {
        1
    } else {
        0
    }
}

/// Operator selectors such as `+` or `<=`.
pub fn is_binary_selector(selector: &str) -> bool {
    matches!(selector.chars().next(), Some(c) if !c.is_alphanumeric() && c != '_')
}

pub struct Class {
    name: Rc<str>,
    superclass: Option<Rc<Class>>,
    methods: RefCell<IndexMap<Rc<str>, Method>>,
    /// Field name to slot index, inherited fields first.
    fields: IndexMap<Rc<str>, usize>,
}

impl Class {
    pub fn new(name: &str, superclass: Option<Rc<Class>>, fields: &[&str]) -> Rc<Class> {
        let mut table = superclass
            .as_ref()
            .map(|superclass| superclass.fields.clone())
            .unwrap_or_default();
        for field in fields {
            let index = table.len();
            table.entry(Rc::from(*field)).or_insert(index);
        }
        Rc::new(Class {
            name: name.into(),
            superclass,
            methods: RefCell::new(IndexMap::new()),
            fields: table,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn superclass(&self) -> Option<&Rc<Class>> {
        self.superclass.as_ref()
    }

    pub fn is_subclass_of(&self, other: &Class) -> bool {
        let mut class = Some(self);
        while let Some(current) = class {
            if std::ptr::eq(current, other) {
                return true;
            }
            class = current.superclass.as_deref();
        }
        false
    }

    /// Adds or replaces a method. A replaced method keeps its position in the
    /// table.
    pub fn define_method(&self, selector: &str, method: Method) {
        self.methods.borrow_mut().insert(selector.into(), method);
    }

    pub fn define_native(&self, selector: &str, method: NativeMethod) {
        self.define_method(selector, Method::Native(method));
    }

    /// Merges `methods` into the table at run time.
    pub fn extend(&self, methods: impl IntoIterator<Item = (Rc<str>, Method)>) {
        self.methods.borrow_mut().extend(methods);
    }

    pub fn local_method(&self, selector: &str) -> Option<Method> {
        self.methods.borrow().get(selector).cloned()
    }

    /// Finds `selector` in this class or the nearest superclass defining it.
    pub fn resolve(&self, selector: &str) -> Option<Method> {
        let mut class = Some(self);
        while let Some(current) = class {
            if let Some(method) = current.local_method(selector) {
                return Some(method);
            }
            class = current.superclass.as_deref();
        }
        None
    }

    pub fn responds_to(&self, selector: &str) -> bool {
        self.resolve(selector).is_some()
    }

    pub fn selectors(&self) -> Vec<Rc<str>> {
        self.methods.borrow().keys().cloned().collect()
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.get(name).copied()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|name| &**name)
    }

    /// Drops every method. Closure methods capture scopes that may hold the
    /// class again.
    pub(crate) fn clear_methods(&self) {
        let methods = std::mem::take(&mut *self.methods.borrow_mut());
        drop(methods);
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("superclass", &self.superclass.as_ref().map(|c| c.name()))
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The classes known to one session, by name, in registration order.
pub struct ClassRegistry {
    classes: RefCell<IndexMap<Rc<str>, Rc<Class>>>,
    object: Rc<Class>,
    null: Rc<Class>,
    boolean: Rc<Class>,
    number: Rc<Class>,
    string: Rc<Class>,
    list: Rc<Class>,
    function: Rc<Class>,
    closure: Rc<Class>,
    class: Rc<Class>,
    expression: Rc<Class>,
    pointer: Rc<Class>,
}

impl ClassRegistry {
    /// A registry holding the builtin hierarchy.
    pub fn new() -> Self {
        let object = Class::new(OBJECT, None, &[]);
        let leaf = |name| Class::new(name, Some(object.clone()), &[]);
        let function = leaf(FUNCTION);
        let registry = ClassRegistry {
            classes: RefCell::new(IndexMap::new()),
            null: leaf(NULL),
            boolean: leaf(BOOLEAN),
            number: leaf(NUMBER),
            string: leaf(STRING),
            list: leaf(LIST),
            closure: Class::new(CLOSURE, Some(function.clone()), &[]),
            function,
            class: leaf(CLASS),
            expression: leaf(EXPRESSION),
            pointer: leaf(POINTER),
            object,
        };
        for class in [
            &registry.object,
            &registry.null,
            &registry.boolean,
            &registry.number,
            &registry.string,
            &registry.list,
            &registry.function,
            &registry.closure,
            &registry.class,
            &registry.expression,
            &registry.pointer,
        ] {
            registry
                .classes
                .borrow_mut()
                .insert(class.name.clone(), class.clone());
        }
        registry
    }

    pub fn get(&self, name: &str) -> Option<Rc<Class>> {
        self.classes.borrow().get(name).cloned()
    }

    pub fn names(&self) -> Vec<Rc<str>> {
        self.classes.borrow().keys().cloned().collect()
    }

    /// Registers a new class. Names are unique within a registry.
    pub fn define(
        &self,
        name: &str,
        superclass: Option<Rc<Class>>,
        fields: &[&str],
    ) -> Result<Rc<Class>> {
        if self.classes.borrow().contains_key(name) {
            return Err(Error::invalid_form(
                "class definition",
                format!("a class named '{}' already exists", name),
            ));
        }
        let class = Class::new(name, superclass.or_else(|| Some(self.object.clone())), fields);
        self.classes
            .borrow_mut()
            .insert(class.name.clone(), class.clone());
        tracing::debug!(class = name, "registered class");
        Ok(class)
    }

    pub fn object(&self) -> &Rc<Class> {
        &self.object
    }

    pub fn number(&self) -> &Rc<Class> {
        &self.number
    }

    pub fn string(&self) -> &Rc<Class> {
        &self.string
    }

    pub fn list(&self) -> &Rc<Class> {
        &self.list
    }

    pub fn function(&self) -> &Rc<Class> {
        &self.function
    }

    pub fn closure(&self) -> &Rc<Class> {
        &self.closure
    }

    pub fn class(&self) -> &Rc<Class> {
        &self.class
    }

    /// The class messages sent to `value` are resolved against.
    pub fn class_of(&self, value: &Value) -> Rc<Class> {
        match value {
            Value::Null => self.null.clone(),
            Value::Bool(_) => self.boolean.clone(),
            Value::Int(_) | Value::Float(_) => self.number.clone(),
            Value::Str(_) => self.string.clone(),
            Value::List(_) => self.list.clone(),
            Value::Expr(_) => self.expression.clone(),
            Value::Function(function) => match function.class_name() {
                CLOSURE => self.closure.clone(),
                FUNCTION => self.function.clone(),
                other => self.get(other).unwrap_or_else(|| self.function.clone()),
            },
            Value::Class(_) => self.class.clone(),
            Value::Object(instance) => instance.class().clone(),
            Value::Pointer(_) => self.pointer.clone(),
        }
    }

    pub(crate) fn clear(&self) {
        let classes = std::mem::take(&mut *self.classes.borrow_mut());
        for class in classes.values() {
            class.clear_methods();
        }
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}
