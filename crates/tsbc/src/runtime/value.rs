// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Runtime value representation.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use num_bigint::BigInt;

use super::object::{ArrayData, Instance, MapData};

/// A value held in a local, on the operand stack or in a container.
///
/// On the operand stack boolean, byte and short values travel as
/// [`Value::Int`]; the narrow variants only appear once a value is boxed,
/// which is what the host sees as arguments and results.
#[derive(Debug, Clone)]
pub enum Value {
    /// null
    Null,
    /// Boxed boolean
    Boolean(bool),
    /// Boxed byte
    Byte(i8),
    /// int, or the stack form of boolean, byte and short
    Int(i32),
    /// Boxed short
    Short(i16),
    /// long
    Long(i64),
    /// float
    Float(f32),
    /// double
    Double(f64),
    /// Arbitrary precision integer
    BigInt(BigInt),
    /// Immutable string
    String(Rc<str>),
    /// Fixed-size native array
    Array(Rc<RefCell<ArrayData>>),
    /// Growable list
    List(Rc<RefCell<Vec<Value>>>),
    /// Insertion-ordered map
    Map(Rc<RefCell<MapData>>),
    /// Instance of a compiled class
    Object(Rc<RefCell<Instance>>),
}

fn float_eq(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

/// Structural equality for containers, identity for instances. NaN equals
/// NaN, as boxed floating values compare in the target runtime.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => float_eq(f64::from(*a), f64::from(*b)),
            (Value::Double(a), Value::Double(b)) => float_eq(*a, *b),
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Value {
    /// A new list holding `values`.
    pub fn list(values: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(values)))
    }

    /// A new map holding `entries` in order.
    pub fn map(entries: Vec<(Value, Value)>) -> Self {
        let mut data = MapData::default();
        for (key, value) in entries {
            data.insert(key, value);
        }
        Value::Map(Rc::new(RefCell::new(data)))
    }

    /// Returns true for null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The result of `typeof` for this value.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Byte(_)
            | Value::Short(_)
            | Value::Int(_)
            | Value::Long(_)
            | Value::Float(_)
            | Value::Double(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::String(_) => "string",
            Value::Null
            | Value::Array(_)
            | Value::List(_)
            | Value::Map(_)
            | Value::Object(_) => "object",
        }
    }

    /// Whether the value counts as true in a condition.
    ///
    /// Zero, NaN, null and the empty string are false. Every other value,
    /// containers and instances included, is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Byte(v) => *v != 0,
            Value::Short(v) => *v != 0,
            Value::Int(v) => *v != 0,
            Value::Long(v) => *v != 0,
            Value::Float(v) => *v != 0.0 && !v.is_nan(),
            Value::Double(v) => *v != 0.0 && !v.is_nan(),
            Value::BigInt(v) => v.sign() != num_bigint::Sign::NoSign,
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::List(_) | Value::Map(_) | Value::Object(_) => true,
        }
    }

    /// Runtime class name, for diagnostics.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Boolean(_) => "Boolean".to_string(),
            Value::Byte(_) => "Byte".to_string(),
            Value::Short(_) => "Short".to_string(),
            Value::Int(_) => "Integer".to_string(),
            Value::Long(_) => "Long".to_string(),
            Value::Float(_) => "Float".to_string(),
            Value::Double(_) => "Double".to_string(),
            Value::BigInt(_) => "BigInteger".to_string(),
            Value::String(_) => "String".to_string(),
            Value::Array(_) => "array".to_string(),
            Value::List(_) => "ArrayList".to_string(),
            Value::Map(_) => "LinkedHashMap".to_string(),
            Value::Object(obj) => obj.borrow().class.clone(),
        }
    }

    /// The elements of a list, if this is one.
    pub fn as_list(&self) -> Option<Vec<Value>> {
        match self {
            Value::List(list) => Some(list.borrow().clone()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Byte(n) => write!(f, "{n}"),
            Value::Short(n) => write!(f, "{n}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Long(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n:?}"),
            Value::Double(n) => write!(f, "{n:?}"),
            Value::BigInt(n) => write!(f, "{n}"),
            Value::String(s) => f.write_str(s),
            Value::Array(array) => {
                let array = array.borrow();
                write_seq(f, array.values.iter())
            }
            Value::List(list) => write_seq(f, list.borrow().iter()),
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}={value}")?;
                }
                f.write_str("}")
            }
            Value::Object(obj) => {
                let obj = obj.borrow();
                write!(f, "{}{{", obj.class)?;
                for (i, (name, value)) in obj.fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}={value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

fn write_seq<'a>(f: &mut fmt::Formatter<'_>, values: impl Iterator<Item = &'a Value>) -> fmt::Result {
    f.write_str("[")?;
    for (i, value) in values.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{value}")?;
    }
    f.write_str("]")
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i8> for Value {
    fn from(n: i8) -> Self {
        Value::Byte(n)
    }
}

impl From<i16> for Value {
    fn from(n: i16) -> Self {
        Value::Short(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Float(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<BigInt> for Value {
    fn from(n: BigInt) -> Self {
        Value::BigInt(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_of() {
        assert_eq!(Value::Null.type_of(), "object");
        assert_eq!(Value::from(true).type_of(), "boolean");
        assert_eq!(Value::from(1.5).type_of(), "number");
        assert_eq!(Value::from(BigInt::from(3)).type_of(), "bigint");
        assert_eq!(Value::from("s").type_of(), "string");
        assert_eq!(Value::list(vec![]).type_of(), "object");
    }

    #[test]
    fn test_truthiness() {
        for value in [
            Value::Null,
            Value::Int(0),
            Value::Byte(0),
            Value::Double(0.0),
            Value::Float(f32::NAN),
            Value::from(BigInt::from(0)),
            Value::from(""),
            Value::from(false),
        ] {
            assert!(!value.is_truthy(), "{value:?}");
        }
        for value in [
            Value::Int(5),
            Value::Long(-1),
            Value::Double(0.25),
            Value::from(BigInt::from(7)),
            Value::from("s"),
            Value::from(true),
            Value::list(vec![]),
            Value::map(vec![]),
        ] {
            assert!(value.is_truthy(), "{value:?}");
        }
    }

    #[test]
    fn test_container_equality_is_structural() {
        let a = Value::list(vec![Value::Int(1), Value::from("x")]);
        let b = Value::list(vec![Value::Int(1), Value::from("x")]);
        assert_eq!(a, b);
        assert_ne!(a, Value::list(vec![Value::Int(1)]));
        // Boxed types do not compare across kinds.
        assert_ne!(Value::Int(1), Value::Long(1));
        assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Double(1.0).to_string(), "1.0");
        assert_eq!(Value::Int(-3).to_string(), "-3");
        assert_eq!(
            Value::list(vec![Value::Int(1), Value::Null]).to_string(),
            "[1, null]"
        );
        assert_eq!(
            Value::map(vec![(Value::from("a"), Value::Int(1))]).to_string(),
            "{a=1}"
        );
    }
}
