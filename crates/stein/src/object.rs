use std::{cell::RefCell, fmt, rc::Rc};

use crate::{
    class::Class,
    error::{Error, Result},
    value::Value,
};

/// An instance of a user defined class. Slots follow the class's field
/// descriptor table and start out `null`.
pub struct Instance {
    class: Rc<Class>,
    fields: RefCell<Vec<Value>>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Rc<Self> {
        let fields = vec![Value::NULL; class.field_count()];
        Rc::new(Instance {
            class,
            fields: RefCell::new(fields),
        })
    }

    pub fn class(&self) -> &Rc<Class> {
        &self.class
    }

    fn slot(&self, field: &str) -> Result<usize> {
        self.class
            .field_index(field)
            .ok_or_else(|| Error::NoSuchField {
                class: self.class.name().into(),
                field: field.into(),
            })
    }

    pub fn get(&self, field: &str) -> Result<Value> {
        let slot = self.slot(field)?;
        Ok(self.fields.borrow()[slot].clone())
    }

    pub fn set(&self, field: &str, value: Value) -> Result<()> {
        let slot = self.slot(field)?;
        let previous = std::mem::replace(&mut self.fields.borrow_mut()[slot], value);
        drop(previous);
        Ok(())
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.class.name());
        let fields = self.fields.borrow();
        for (name, value) in self.class.field_names().zip(fields.iter()) {
            s.field(name, value);
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_by_name() {
        let point = Class::new("Point", None, &["x", "y"]);
        let instance = Instance::new(point);
        assert_eq!(instance.get("x").unwrap(), Value::NULL);
        instance.set("y", Value::Int(3)).unwrap();
        assert_eq!(instance.get("y").unwrap(), Value::Int(3));
    }

    #[test]
    fn test_unknown_field() {
        let instance = Instance::new(Class::new("Point", None, &["x"]));
        match instance.set("z", Value::TRUE) {
            Err(Error::NoSuchField { class, field }) => {
                assert_eq!((&*class, &*field), ("Point", "z"));
            }
            other => panic!("expected NoSuchField, got {:?}", other),
        }
        assert!(instance.get("z").is_err());
    }
}
