// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Heap objects: native arrays, maps and class instances.

use crate::compiler::bytecode::ElemKind;
use crate::types::{NumKind, PrimitiveType};

use super::value::Value;

/// A fixed-size array. Elements are kept in their stack form.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayData {
    /// Element kind
    pub kind: ElemKind,
    /// Elements
    pub values: Vec<Value>,
}

/// The zero value of an element kind.
pub fn default_element(kind: ElemKind) -> Value {
    match kind {
        ElemKind::Ref => Value::Null,
        ElemKind::Prim(p) => match p.num_kind() {
            NumKind::Int => Value::Int(0),
            NumKind::Long => Value::Long(0),
            NumKind::Float => Value::Float(0.0),
            NumKind::Double => Value::Double(0.0),
        },
    }
}

impl ArrayData {
    /// An array of `length` zero values.
    pub fn new(kind: ElemKind, length: usize) -> Self {
        Self {
            kind,
            values: vec![default_element(kind); length],
        }
    }

    /// Stores `value`, truncating sub-int elements to their width.
    pub fn store(&mut self, index: usize, value: Value) {
        let value = match (self.kind, value) {
            (ElemKind::Prim(PrimitiveType::Boolean), Value::Int(v)) => Value::Int(v & 1),
            (ElemKind::Prim(PrimitiveType::Byte), Value::Int(v)) => Value::Int(i32::from(v as i8)),
            (ElemKind::Prim(PrimitiveType::Short), Value::Int(v)) => Value::Int(i32::from(v as i16)),
            (_, value) => value,
        };
        self.values[index] = value;
    }
}

/// An insertion-ordered map with value keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapData {
    entries: Vec<(Value, Value)>,
}

impl MapData {
    fn position(&self, key: &Value) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    /// Looks up `key`.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.position(key).map(|i| &self.entries[i].1)
    }

    /// Inserts or replaces; returns the previous value.
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        match self.position(&key) {
            Some(i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Removes `key`; returns the removed value.
    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        self.position(key).map(|i| self.entries.remove(i).1)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &(Value, Value)> {
        self.entries.iter()
    }
}

/// An instance of a compiled class.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    /// Class name
    pub class: String,
    /// Instance fields in declaration order
    pub fields: Vec<(String, Value)>,
}

impl Instance {
    /// Reads a field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Writes a field; returns false if the class has no such field.
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}
