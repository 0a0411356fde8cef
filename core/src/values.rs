//! Runtime value types

use crate::errors::ErrorInfo;
use crate::runtime::Continuation;
use serde_json::{Map, Value as JsonValue};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Shared, identity-bearing reference to a heap object.
pub type ObjRef = Rc<RefCell<Object>>;

/// A heap object: a class tag plus named fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Object {
    pub class: String,
    pub fields: HashMap<String, Val>,
}

impl Object {
    /// Allocate a fresh, empty object of the given class.
    pub fn alloc(class: impl Into<String>) -> ObjRef {
        Rc::new(RefCell::new(Object {
            class: class.into(),
            fields: HashMap::new(),
        }))
    }

    pub fn with_fields(class: impl Into<String>, fields: HashMap<String, Val>) -> ObjRef {
        Rc::new(RefCell::new(Object {
            class: class.into(),
            fields,
        }))
    }
}

/// Runtime value type
///
/// Objects and continuations have reference semantics: two `Val::Obj` are
/// equal only if they point at the same object.
#[derive(Clone)]
pub enum Val {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    List(Vec<Val>),
    Obj(ObjRef),
    Cont(Continuation),
    /// Error value with code and message
    Error(ErrorInfo),
}

impl Val {
    /// Check if value is truthy (for conditionals)
    pub fn is_truthy(&self) -> bool {
        match self {
            Val::Bool(b) => *b,
            Val::Null => false,
            _ => true,
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Val::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_obj(&self) -> Option<&ObjRef> {
        match self {
            Val::Obj(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_cont(&self) -> Option<&Continuation> {
        match self {
            Val::Cont(k) => Some(k),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Null => "null",
            Val::Bool(_) => "bool",
            Val::Num(_) => "number",
            Val::Str(_) => "string",
            Val::List(_) => "list",
            Val::Obj(_) => "object",
            Val::Cont(_) => "continuation",
            Val::Error(_) => "error",
        }
    }

    /// Convert to JSON for reporting. Continuations have no JSON form and
    /// render as a tagged placeholder.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Val::Null => JsonValue::Null,
            Val::Bool(b) => JsonValue::Bool(*b),
            Val::Num(n) => serde_json::Number::from_f64(*n)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Val::Str(s) => JsonValue::String(s.clone()),
            Val::List(items) => JsonValue::Array(items.iter().map(Val::to_json).collect()),
            Val::Obj(obj) => {
                let obj = obj.borrow();
                let mut map = Map::new();
                for (k, v) in &obj.fields {
                    map.insert(k.clone(), v.to_json());
                }
                JsonValue::Object(map)
            }
            Val::Cont(_) => serde_json::json!({ "t": "Continuation" }),
            Val::Error(err) => serde_json::json!({ "code": err.code, "message": err.message }),
        }
    }
}

impl PartialEq for Val {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Val::Null, Val::Null) => true,
            (Val::Bool(a), Val::Bool(b)) => a == b,
            (Val::Num(a), Val::Num(b)) => a == b,
            (Val::Str(a), Val::Str(b)) => a == b,
            (Val::List(a), Val::List(b)) => a == b,
            (Val::Obj(a), Val::Obj(b)) => Rc::ptr_eq(a, b),
            (Val::Cont(a), Val::Cont(b)) => a.same_as(b),
            (Val::Error(a), Val::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Null => write!(f, "Null"),
            Val::Bool(b) => write!(f, "Bool({})", b),
            Val::Num(n) => write!(f, "Num({})", n),
            Val::Str(s) => write!(f, "Str({:?})", s),
            Val::List(items) => f.debug_tuple("List").field(items).finish(),
            // Fields may hold cycles back to the object itself.
            Val::Obj(obj) => write!(f, "Obj({}@{:p})", obj.borrow().class, Rc::as_ptr(obj)),
            Val::Cont(k) => write!(f, "Cont({} frames)", k.depth()),
            Val::Error(err) => f.debug_tuple("Error").field(err).finish(),
        }
    }
}

impl From<f64> for Val {
    fn from(n: f64) -> Self {
        Val::Num(n)
    }
}

impl From<bool> for Val {
    fn from(b: bool) -> Self {
        Val::Bool(b)
    }
}

impl From<&str> for Val {
    fn from(s: &str) -> Self {
        Val::Str(s.to_string())
    }
}

impl From<String> for Val {
    fn from(s: String) -> Self {
        Val::Str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::hashmap;

    #[test]
    fn test_objects_compare_by_identity() {
        let a = Object::alloc("Point");
        let b = Object::alloc("Point");
        assert_eq!(Val::Obj(a.clone()), Val::Obj(a.clone()));
        assert_ne!(Val::Obj(a), Val::Obj(b));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Val::Null.is_truthy());
        assert!(!Val::Bool(false).is_truthy());
        assert!(Val::Num(0.0).is_truthy());
        assert!(Val::Str(String::new()).is_truthy());
    }

    #[test]
    fn test_to_json() {
        let obj = Object::with_fields(
            "Point",
            hashmap! {
                "x".to_string() => Val::Num(1.0),
                "tags".to_string() => Val::List(vec![Val::from("a")]),
            },
        );
        let json = Val::Obj(obj).to_json();
        assert_eq!(json, serde_json::json!({ "x": 1.0, "tags": ["a"] }));

        let err = Val::Error(ErrorInfo::new("E", "boom")).to_json();
        assert_eq!(err, serde_json::json!({ "code": "E", "message": "boom" }));
    }
}
