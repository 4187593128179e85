// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The bytecode interpreter.
//!
//! A reference executor for compiled modules: it decodes every method
//! once, then runs methods on a value stack with the semantics of the
//! target machine (wrapping int arithmetic, saturating float to int
//! conversion, checked casts and bounds).

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::compiler::bytecode::{
    ArithOp, BigOp, BitOp, CompiledMethod, CompiledModule, Cond, Constant, DecodeError, ElemKind,
    IntKind, MethodDescriptor, Op, TypeTag,
};
use crate::compiler::coercion::{self, Scalar};
use crate::runtime::object::{default_element, ArrayData, Instance, MapData};
use crate::runtime::value::Value;
use crate::types::{NumKind, PrimitiveType, Ty};

/// Errors raised while executing bytecode.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// A null reference was dereferenced.
    #[error("null pointer in {0}")]
    NullPointer(&'static str),
    /// Native array index out of range.
    #[error("array index {index} out of bounds for length {length}")]
    ArrayIndexOutOfBounds {
        /// The index used
        index: i32,
        /// The array length
        length: usize,
    },
    /// List index out of range.
    #[error("index {index} out of bounds for length {length}")]
    IndexOutOfBounds {
        /// The index used
        index: i32,
        /// The list length
        length: usize,
    },
    /// A checked cast failed.
    #[error("{0}")]
    ClassCast(String),
    /// Integer division by zero.
    #[error("arithmetic error: {0}")]
    Arithmetic(&'static str),
    /// Array allocation with a negative length.
    #[error("negative array size {0}")]
    NegativeArraySize(i32),
    /// Calls nested deeper than the configured limit.
    #[error("call depth limit of {0} exceeded")]
    StackOverflow(usize),
    /// No such class in the module.
    #[error("no class '{0}'")]
    NoSuchClass(String),
    /// No such method in the class.
    #[error("no method '{class}.{name}'")]
    NoSuchMethod {
        /// Class name
        class: String,
        /// Method name
        name: String,
    },
    /// Host arguments do not fit the method signature.
    #[error("illegal argument: {0}")]
    IllegalArgument(String),
    /// The code could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// The bytecode broke an invariant the compiler guarantees.
    #[error("internal runtime error: {0}")]
    Internal(String),
}

/// Result type for execution.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Interpreter limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    /// Maximum nesting of method calls
    pub max_call_depth: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self { max_call_depth: 1024 }
    }
}

/// A method decoded for execution.
struct Decoded<'m> {
    class: &'m str,
    method: &'m CompiledMethod,
    ops: Vec<Op>,
    /// Byte offset of each instruction
    pcs: Vec<usize>,
    /// Instruction index of each byte offset that starts one
    index_of: FxHashMap<usize, usize>,
}

impl<'m> Decoded<'m> {
    fn new(class: &'m str, method: &'m CompiledMethod) -> Result<Self> {
        let instructions = method.instructions()?;
        let mut ops = Vec::with_capacity(instructions.len());
        let mut pcs = Vec::with_capacity(instructions.len());
        let mut index_of = FxHashMap::default();
        for (index, (pc, op)) in instructions.into_iter().enumerate() {
            index_of.insert(pc, index);
            pcs.push(pc);
            ops.push(op);
        }
        Ok(Self {
            class,
            method,
            ops,
            pcs,
            index_of,
        })
    }

    fn jump(&self, index: usize, offset: i32) -> Result<usize> {
        let target = self.pcs[index] as i64 + i64::from(offset);
        usize::try_from(target)
            .ok()
            .and_then(|pc| self.index_of.get(&pc).copied())
            .ok_or_else(|| {
                RuntimeError::Internal(format!(
                    "{}.{}: branch to {target} is not an instruction",
                    self.class, self.method.name
                ))
            })
    }

    fn constant(&self, index: u16) -> Result<&'m Constant> {
        self.method
            .constants
            .get(index)
            .ok_or_else(|| RuntimeError::Internal(format!("constant #{index} out of range")))
    }
}

/// Executes a compiled module.
pub struct Runtime<'m> {
    module: &'m CompiledModule,
    methods: FxHashMap<(&'m str, &'m str), Rc<Decoded<'m>>>,
    statics: FxHashMap<(String, String), Value>,
    options: RuntimeOptions,
    depth: usize,
}

fn pop(stack: &mut Vec<Value>) -> Result<Value> {
    stack
        .pop()
        .ok_or_else(|| RuntimeError::Internal("operand stack underflow".to_string()))
}

fn mismatch(expected: &str, found: &Value) -> RuntimeError {
    RuntimeError::Internal(format!("expected {expected} on the stack, found {}", found.type_name()))
}

fn pop_int(stack: &mut Vec<Value>) -> Result<i32> {
    match pop(stack)? {
        Value::Int(v) => Ok(v),
        other => Err(mismatch("int", &other)),
    }
}

fn pop_long(stack: &mut Vec<Value>) -> Result<i64> {
    match pop(stack)? {
        Value::Long(v) => Ok(v),
        other => Err(mismatch("long", &other)),
    }
}

fn pop_float(stack: &mut Vec<Value>) -> Result<f32> {
    match pop(stack)? {
        Value::Float(v) => Ok(v),
        other => Err(mismatch("float", &other)),
    }
}

fn pop_double(stack: &mut Vec<Value>) -> Result<f64> {
    match pop(stack)? {
        Value::Double(v) => Ok(v),
        other => Err(mismatch("double", &other)),
    }
}

fn pop_bigint(stack: &mut Vec<Value>, what: &'static str) -> Result<BigInt> {
    match pop(stack)? {
        Value::BigInt(v) => Ok(v),
        Value::Null => Err(RuntimeError::NullPointer(what)),
        other => Err(mismatch("bigint", &other)),
    }
}

fn pop_list(stack: &mut Vec<Value>, what: &'static str) -> Result<Rc<RefCell<Vec<Value>>>> {
    match pop(stack)? {
        Value::List(list) => Ok(list),
        Value::Null => Err(RuntimeError::NullPointer(what)),
        other => Err(mismatch("list", &other)),
    }
}

fn pop_map(stack: &mut Vec<Value>, what: &'static str) -> Result<Rc<RefCell<MapData>>> {
    match pop(stack)? {
        Value::Map(map) => Ok(map),
        Value::Null => Err(RuntimeError::NullPointer(what)),
        other => Err(mismatch("map", &other)),
    }
}

fn pop_array(stack: &mut Vec<Value>, what: &'static str) -> Result<Rc<RefCell<ArrayData>>> {
    match pop(stack)? {
        Value::Array(array) => Ok(array),
        Value::Null => Err(RuntimeError::NullPointer(what)),
        other => Err(mismatch("array", &other)),
    }
}

fn pop_object(stack: &mut Vec<Value>, what: &'static str) -> Result<Rc<RefCell<Instance>>> {
    match pop(stack)? {
        Value::Object(obj) => Ok(obj),
        Value::Null => Err(RuntimeError::NullPointer(what)),
        other => Err(mismatch("object", &other)),
    }
}

fn array_index(index: i32, length: usize) -> Result<usize> {
    usize::try_from(index)
        .ok()
        .filter(|i| *i < length)
        .ok_or(RuntimeError::ArrayIndexOutOfBounds { index, length })
}

fn list_index(index: i32, length: usize) -> Result<usize> {
    usize::try_from(index)
        .ok()
        .filter(|i| *i < length)
        .ok_or(RuntimeError::IndexOutOfBounds { index, length })
}

fn ordering(order: Ordering) -> Value {
    Value::Int(order as i32)
}

/// Float comparison; `nan` is the result when either side is NaN.
fn compare_floats(a: f64, b: f64, nan: i32) -> Value {
    Value::Int(a.partial_cmp(&b).map_or(nan, |order| order as i32))
}

fn scalar_value(scalar: Scalar) -> Value {
    match scalar {
        Scalar::Int(v) => Value::Int(v),
        Scalar::Long(v) => Value::Long(v),
        Scalar::Float(v) => Value::Float(v),
        Scalar::Double(v) => Value::Double(v),
    }
}

fn int_arith(op: ArithOp, a: i32, b: i32) -> Result<i32> {
    Ok(match op {
        ArithOp::Add => a.wrapping_add(b),
        ArithOp::Sub => a.wrapping_sub(b),
        ArithOp::Mul => a.wrapping_mul(b),
        ArithOp::Div if b == 0 => return Err(RuntimeError::Arithmetic("/ by zero")),
        ArithOp::Div => a.wrapping_div(b),
        ArithOp::Rem if b == 0 => return Err(RuntimeError::Arithmetic("/ by zero")),
        ArithOp::Rem => a.wrapping_rem(b),
    })
}

fn long_arith(op: ArithOp, a: i64, b: i64) -> Result<i64> {
    Ok(match op {
        ArithOp::Add => a.wrapping_add(b),
        ArithOp::Sub => a.wrapping_sub(b),
        ArithOp::Mul => a.wrapping_mul(b),
        ArithOp::Div if b == 0 => return Err(RuntimeError::Arithmetic("/ by zero")),
        ArithOp::Div => a.wrapping_div(b),
        ArithOp::Rem if b == 0 => return Err(RuntimeError::Arithmetic("/ by zero")),
        ArithOp::Rem => a.wrapping_rem(b),
    })
}

fn float_arith(op: ArithOp, a: f64, b: f64) -> f64 {
    match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
        ArithOp::Rem => a % b,
    }
}

fn convert(from: NumKind, to: NumKind, value: Value) -> Result<Value> {
    Ok(match (from, value) {
        (NumKind::Int, Value::Int(v)) => match to {
            NumKind::Int => Value::Int(v),
            NumKind::Long => Value::Long(i64::from(v)),
            NumKind::Float => Value::Float(v as f32),
            NumKind::Double => Value::Double(f64::from(v)),
        },
        (NumKind::Long, Value::Long(v)) => match to {
            NumKind::Int => Value::Int(v as i32),
            NumKind::Long => Value::Long(v),
            NumKind::Float => Value::Float(v as f32),
            NumKind::Double => Value::Double(v as f64),
        },
        (NumKind::Float, Value::Float(v)) => match to {
            NumKind::Int => Value::Int(v as i32),
            NumKind::Long => Value::Long(v as i64),
            NumKind::Float => Value::Float(v),
            NumKind::Double => Value::Double(f64::from(v)),
        },
        (NumKind::Double, Value::Double(v)) => match to {
            NumKind::Int => Value::Int(v as i32),
            NumKind::Long => Value::Long(v as i64),
            NumKind::Float => Value::Float(v as f32),
            NumKind::Double => Value::Double(v),
        },
        (_, other) => return Err(mismatch("a number", &other)),
    })
}

fn box_value(p: PrimitiveType, value: Value) -> Result<Value> {
    Ok(match (p, value) {
        (PrimitiveType::Boolean, Value::Int(v)) => Value::Boolean(v != 0),
        (PrimitiveType::Byte, Value::Int(v)) => Value::Byte(v as i8),
        (PrimitiveType::Short, Value::Int(v)) => Value::Short(v as i16),
        (PrimitiveType::Int, v @ Value::Int(_))
        | (PrimitiveType::Long, v @ Value::Long(_))
        | (PrimitiveType::Float, v @ Value::Float(_))
        | (PrimitiveType::Double, v @ Value::Double(_)) => v,
        (p, other) => return Err(mismatch(p.name(), &other)),
    })
}

fn unbox_value(p: PrimitiveType, value: Value) -> Result<Value> {
    Ok(match (p, value) {
        (_, Value::Null) => return Err(RuntimeError::NullPointer("unboxing")),
        (PrimitiveType::Boolean, Value::Boolean(b)) => Value::Int(i32::from(b)),
        (PrimitiveType::Byte, Value::Byte(v)) => Value::Int(i32::from(v)),
        (PrimitiveType::Short, Value::Short(v)) => Value::Int(i32::from(v)),
        (PrimitiveType::Int, v @ Value::Int(_))
        | (PrimitiveType::Long, v @ Value::Long(_))
        | (PrimitiveType::Float, v @ Value::Float(_))
        | (PrimitiveType::Double, v @ Value::Double(_)) => v,
        (p, other) => {
            return Err(RuntimeError::ClassCast(format!(
                "{} cannot be cast to {}",
                other.type_name(),
                p.boxed_name()
            )));
        }
    })
}

fn instance_of(value: &Value, tag: TypeTag) -> bool {
    match (tag, value) {
        (_, Value::Null) => true,
        (TypeTag::Boxed(PrimitiveType::Boolean), Value::Boolean(_))
        | (TypeTag::Boxed(PrimitiveType::Byte), Value::Byte(_))
        | (TypeTag::Boxed(PrimitiveType::Short), Value::Short(_))
        | (TypeTag::Boxed(PrimitiveType::Int), Value::Int(_))
        | (TypeTag::Boxed(PrimitiveType::Long), Value::Long(_))
        | (TypeTag::Boxed(PrimitiveType::Float), Value::Float(_))
        | (TypeTag::Boxed(PrimitiveType::Double), Value::Double(_))
        | (TypeTag::BigInt, Value::BigInt(_))
        | (TypeTag::String, Value::String(_))
        | (TypeTag::Array, Value::Array(_))
        | (TypeTag::List, Value::List(_))
        | (TypeTag::Map, Value::Map(_))
        | (TypeTag::Object, Value::Object(_)) => true,
        _ => false,
    }
}

fn same_reference(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
        (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
        (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
        (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
        (Value::String(a), Value::String(b)) => Rc::ptr_eq(a, b),
        (a, b) => a == b,
    }
}

fn big_binary(op: BigOp, stack: &mut Vec<Value>) -> Result<Value> {
    if matches!(op, BigOp::Shl | BigOp::Shr) {
        let distance = pop_int(stack)?;
        let value = pop_bigint(stack, "bigint shift")?;
        let left = (op == BigOp::Shl) == (distance >= 0);
        let distance = distance.unsigned_abs() as usize;
        return Ok(Value::BigInt(if left { value << distance } else { value >> distance }));
    }
    let b = pop_bigint(stack, "bigint arithmetic")?;
    let a = pop_bigint(stack, "bigint arithmetic")?;
    if matches!(op, BigOp::Div | BigOp::Rem) && b.is_zero() {
        return Err(RuntimeError::Arithmetic("BigInteger divide by zero"));
    }
    Ok(Value::BigInt(match op {
        BigOp::Add => a + b,
        BigOp::Sub => a - b,
        BigOp::Mul => a * b,
        BigOp::Div => a / b,
        BigOp::Rem => a % b,
        BigOp::And => a & b,
        BigOp::Or => a | b,
        BigOp::Xor => a ^ b,
        BigOp::Shl | BigOp::Shr => return Err(RuntimeError::Internal("bigint shift".to_string())),
    }))
}

/// Converts a host value to the form a slot of `ty` holds.
fn to_slot(value: &Value, ty: &Ty) -> Result<Value> {
    let Ty::Primitive(p) = ty else {
        return Ok(value.clone());
    };
    let converted = match (p.num_kind(), value) {
        (NumKind::Int, Value::Boolean(b)) if *p == PrimitiveType::Boolean => Some(Value::Int(i32::from(*b))),
        (NumKind::Int, Value::Byte(v)) => Some(Value::Int(i32::from(*v))),
        (NumKind::Int, Value::Short(v)) => Some(Value::Int(i32::from(*v))),
        (NumKind::Int, Value::Int(v)) if *p != PrimitiveType::Boolean => Some(Value::Int(*v)),
        (NumKind::Long, Value::Int(v)) => Some(Value::Long(i64::from(*v))),
        (NumKind::Long, Value::Long(v)) => Some(Value::Long(*v)),
        (NumKind::Float, Value::Float(v)) => Some(Value::Float(*v)),
        (NumKind::Float, Value::Int(v)) => Some(Value::Float(*v as f32)),
        (NumKind::Double, Value::Double(v)) => Some(Value::Double(*v)),
        (NumKind::Double, Value::Float(v)) => Some(Value::Double(f64::from(*v))),
        (NumKind::Double, Value::Int(v)) => Some(Value::Double(f64::from(*v))),
        (NumKind::Double, Value::Long(v)) => Some(Value::Double(*v as f64)),
        _ => None,
    };
    // Sub-int slots hold the value truncated to their width.
    let converted = match (p, converted) {
        (PrimitiveType::Byte, Some(Value::Int(v))) => Some(Value::Int(i32::from(v as i8))),
        (PrimitiveType::Short, Some(Value::Int(v))) => Some(Value::Int(i32::from(v as i16))),
        (_, converted) => converted,
    };
    converted.ok_or_else(|| RuntimeError::IllegalArgument(format!("{} is not a {}", value.type_name(), p.name())))
}

/// Converts a slot value of `ty` to its host form.
fn from_slot(value: Value, ty: &Ty) -> Value {
    match (ty, value) {
        (Ty::Primitive(PrimitiveType::Boolean), Value::Int(v)) => Value::Boolean(v != 0),
        (Ty::Primitive(PrimitiveType::Byte), Value::Int(v)) => Value::Byte(v as i8),
        (Ty::Primitive(PrimitiveType::Short), Value::Int(v)) => Value::Short(v as i16),
        (_, value) => value,
    }
}

fn field_default(ty: &Ty) -> Value {
    default_element(ElemKind::of(ty))
}

impl<'m> Runtime<'m> {
    /// Prepares `module` for execution and runs its static initializers.
    pub fn new(module: &'m CompiledModule) -> Result<Self> {
        Self::with_options(module, RuntimeOptions::default())
    }

    /// Like [`Runtime::new`] with explicit limits.
    pub fn with_options(module: &'m CompiledModule, options: RuntimeOptions) -> Result<Self> {
        let mut methods = FxHashMap::default();
        let mut statics = FxHashMap::default();
        for class in &module.classes {
            for method in &class.methods {
                let decoded = Decoded::new(&class.name, method)?;
                methods.insert((class.name.as_str(), method.name.as_str()), Rc::new(decoded));
            }
            for field in class.fields.iter().filter(|field| field.is_static) {
                statics.insert((class.name.clone(), field.name.clone()), field_default(&field.ty));
            }
        }

        let mut runtime = Self {
            module,
            methods,
            statics,
            options,
            depth: 0,
        };
        for class in &module.classes {
            if class.method("<clinit>").is_some() {
                debug!(class = %class.name, "running static initializer");
                runtime.call(&class.name, "<clinit>", Vec::new())?;
            }
        }
        Ok(runtime)
    }

    /// Creates an instance of `class` and runs its field initializers.
    pub fn instantiate(&mut self, class: &str) -> Result<Value> {
        let compiled = self
            .module
            .class(class)
            .ok_or_else(|| RuntimeError::NoSuchClass(class.to_string()))?;
        let fields = compiled
            .fields
            .iter()
            .filter(|field| !field.is_static)
            .map(|field| (field.name.clone(), field_default(&field.ty)))
            .collect();
        let object = Value::Object(Rc::new(RefCell::new(Instance {
            class: class.to_string(),
            fields,
        })));
        if compiled.method("<init>").is_some() {
            self.call(class, "<init>", vec![object.clone()])?;
        }
        Ok(object)
    }

    /// Calls an instance method on `receiver`.
    pub fn invoke(&mut self, receiver: &Value, method: &str, args: &[Value]) -> Result<Value> {
        let class = match receiver {
            Value::Object(obj) => obj.borrow().class.clone(),
            Value::Null => return Err(RuntimeError::NullPointer("method call")),
            other => {
                return Err(RuntimeError::IllegalArgument(format!(
                    "{} is not an instance",
                    other.type_name()
                )));
            }
        };
        let descriptor = self.descriptor(&class, method)?;
        if descriptor.is_static {
            return Err(RuntimeError::IllegalArgument(format!("{class}.{method} is static")));
        }
        let mut slots = vec![receiver.clone()];
        slots.extend(self.host_args(&descriptor, args)?);
        let result = self.call(&class, method, slots)?;
        Ok(result.map_or(Value::Null, |value| from_slot(value, &descriptor.ret)))
    }

    /// Calls a static method.
    pub fn invoke_static(&mut self, class: &str, method: &str, args: &[Value]) -> Result<Value> {
        let descriptor = self.descriptor(class, method)?;
        if !descriptor.is_static {
            return Err(RuntimeError::IllegalArgument(format!("{class}.{method} is not static")));
        }
        let slots = self.host_args(&descriptor, args)?;
        let result = self.call(class, method, slots)?;
        Ok(result.map_or(Value::Null, |value| from_slot(value, &descriptor.ret)))
    }

    /// Reads a static field.
    pub fn get_static(&self, class: &str, field: &str) -> Option<Value> {
        self.statics.get(&(class.to_string(), field.to_string())).map(|value| {
            let ty = self
                .module
                .class(class)
                .and_then(|c| c.fields.iter().find(|f| f.name == field))
                .map(|f| f.ty.clone())
                .unwrap_or(Ty::Any);
            from_slot(value.clone(), &ty)
        })
    }

    fn descriptor(&self, class: &str, method: &str) -> Result<MethodDescriptor> {
        self.methods
            .get(&(class, method))
            .map(|decoded| decoded.method.descriptor.clone())
            .ok_or_else(|| RuntimeError::NoSuchMethod {
                class: class.to_string(),
                name: method.to_string(),
            })
    }

    fn host_args(&self, descriptor: &MethodDescriptor, args: &[Value]) -> Result<Vec<Value>> {
        if args.len() != descriptor.params.len() {
            return Err(RuntimeError::IllegalArgument(format!(
                "expected {} arguments, got {}",
                descriptor.params.len(),
                args.len()
            )));
        }
        args.iter().zip(&descriptor.params).map(|(arg, ty)| to_slot(arg, ty)).collect()
    }

    fn call(&mut self, class: &str, name: &str, args: Vec<Value>) -> Result<Option<Value>> {
        let method = self
            .methods
            .get(&(class, name))
            .cloned()
            .ok_or_else(|| RuntimeError::NoSuchMethod {
                class: class.to_string(),
                name: name.to_string(),
            })?;
        if self.depth >= self.options.max_call_depth {
            return Err(RuntimeError::StackOverflow(self.options.max_call_depth));
        }
        self.depth += 1;
        trace!(class, method = name, depth = self.depth, "call");
        let result = self.execute(&method, args);
        self.depth -= 1;
        result
    }

    // ========================================================================
    // Execution
    // ========================================================================

    fn execute(&mut self, method: &Decoded<'m>, mut locals: Vec<Value>) -> Result<Option<Value>> {
        locals.resize(usize::from(method.method.max_locals).max(locals.len()), Value::Null);
        let mut stack: Vec<Value> = Vec::with_capacity(usize::from(method.method.max_stack));
        let mut index = 0;

        loop {
            let op = *method.ops.get(index).ok_or_else(|| {
                RuntimeError::Internal(format!("{}.{} fell off the end", method.class, method.method.name))
            })?;
            let current = index;
            index += 1;

            match op {
                Op::Nop => {}
                Op::AConstNull => stack.push(Value::Null),
                Op::IConst(v) => stack.push(Value::Int(i32::from(v))),
                Op::Ldc(i) => stack.push(match method.constant(i)? {
                    Constant::Int(v) => Value::Int(*v),
                    Constant::Long(v) => Value::Long(*v),
                    Constant::Float(v) => Value::Float(*v),
                    Constant::Double(v) => Value::Double(*v),
                    Constant::String(s) => Value::from(s.as_str()),
                    Constant::BigInt(v) => Value::BigInt(v.clone()),
                    other => return Err(RuntimeError::Internal(format!("ldc of {other}"))),
                }),
                Op::Load(_, slot) => {
                    let value = locals
                        .get(usize::from(slot))
                        .cloned()
                        .ok_or_else(|| RuntimeError::Internal(format!("local {slot} out of range")))?;
                    stack.push(value);
                }
                Op::Store(_, slot) => {
                    let value = pop(&mut stack)?;
                    let target = locals
                        .get_mut(usize::from(slot))
                        .ok_or_else(|| RuntimeError::Internal(format!("local {slot} out of range")))?;
                    *target = value;
                }

                // Stack manipulation
                Op::Pop => {
                    pop(&mut stack)?;
                }
                Op::Dup => {
                    let v = pop(&mut stack)?;
                    stack.push(v.clone());
                    stack.push(v);
                }
                Op::DupX1 => {
                    let v1 = pop(&mut stack)?;
                    let v2 = pop(&mut stack)?;
                    stack.extend([v1.clone(), v2, v1]);
                }
                Op::DupX2 => {
                    let v1 = pop(&mut stack)?;
                    let v2 = pop(&mut stack)?;
                    let v3 = pop(&mut stack)?;
                    stack.extend([v1.clone(), v3, v2, v1]);
                }
                Op::Dup2 => {
                    let v1 = pop(&mut stack)?;
                    let v2 = pop(&mut stack)?;
                    stack.extend([v2.clone(), v1.clone(), v2, v1]);
                }
                Op::Swap => {
                    let v1 = pop(&mut stack)?;
                    let v2 = pop(&mut stack)?;
                    stack.extend([v1, v2]);
                }

                // Arithmetic
                Op::Arith(op, kind) => {
                    let result = match kind {
                        NumKind::Int => {
                            let b = pop_int(&mut stack)?;
                            Value::Int(int_arith(op, pop_int(&mut stack)?, b)?)
                        }
                        NumKind::Long => {
                            let b = pop_long(&mut stack)?;
                            Value::Long(long_arith(op, pop_long(&mut stack)?, b)?)
                        }
                        NumKind::Float => {
                            let b = pop_float(&mut stack)?;
                            let a = pop_float(&mut stack)?;
                            Value::Float(float_arith(op, f64::from(a), f64::from(b)) as f32)
                        }
                        NumKind::Double => {
                            let b = pop_double(&mut stack)?;
                            Value::Double(float_arith(op, pop_double(&mut stack)?, b))
                        }
                    };
                    stack.push(result);
                }
                Op::Neg(kind) => {
                    let result = match (kind, pop(&mut stack)?) {
                        (NumKind::Int, Value::Int(v)) => Value::Int(v.wrapping_neg()),
                        (NumKind::Long, Value::Long(v)) => Value::Long(v.wrapping_neg()),
                        (NumKind::Float, Value::Float(v)) => Value::Float(-v),
                        (NumKind::Double, Value::Double(v)) => Value::Double(-v),
                        (_, other) => return Err(mismatch("a number", &other)),
                    };
                    stack.push(result);
                }
                Op::Bitwise(op, IntKind::Int) => {
                    let b = pop_int(&mut stack)?;
                    let a = pop_int(&mut stack)?;
                    stack.push(Value::Int(match op {
                        BitOp::Shl => a.wrapping_shl(b as u32),
                        BitOp::Shr => a.wrapping_shr(b as u32),
                        BitOp::UShr => (a as u32).wrapping_shr(b as u32) as i32,
                        BitOp::And => a & b,
                        BitOp::Or => a | b,
                        BitOp::Xor => a ^ b,
                    }));
                }
                Op::Bitwise(op, IntKind::Long) => {
                    let value = match op {
                        BitOp::Shl | BitOp::Shr | BitOp::UShr => {
                            let distance = pop_int(&mut stack)? as u32;
                            let a = pop_long(&mut stack)?;
                            match op {
                                BitOp::Shl => a.wrapping_shl(distance),
                                BitOp::Shr => a.wrapping_shr(distance),
                                _ => (a as u64).wrapping_shr(distance) as i64,
                            }
                        }
                        _ => {
                            let b = pop_long(&mut stack)?;
                            let a = pop_long(&mut stack)?;
                            match op {
                                BitOp::And => a & b,
                                BitOp::Or => a | b,
                                _ => a ^ b,
                            }
                        }
                    };
                    stack.push(Value::Long(value));
                }
                Op::Convert(from, to) => {
                    let value = pop(&mut stack)?;
                    stack.push(convert(from, to, value)?);
                }
                Op::I2B => {
                    let v = pop_int(&mut stack)?;
                    stack.push(Value::Int(i32::from(v as i8)));
                }
                Op::I2S => {
                    let v = pop_int(&mut stack)?;
                    stack.push(Value::Int(i32::from(v as i16)));
                }
                Op::LCmp => {
                    let b = pop_long(&mut stack)?;
                    let a = pop_long(&mut stack)?;
                    stack.push(ordering(a.cmp(&b)));
                }
                Op::FCmpL | Op::FCmpG => {
                    let b = pop_float(&mut stack)?;
                    let a = pop_float(&mut stack)?;
                    let nan = if op == Op::FCmpG { 1 } else { -1 };
                    stack.push(compare_floats(f64::from(a), f64::from(b), nan));
                }
                Op::DCmpL | Op::DCmpG => {
                    let b = pop_double(&mut stack)?;
                    let a = pop_double(&mut stack)?;
                    let nan = if op == Op::DCmpG { 1 } else { -1 };
                    stack.push(compare_floats(a, b, nan));
                }

                // Control flow
                Op::If(cond, offset) => {
                    if self.test(cond, &mut stack)? {
                        index = method.jump(current, i32::from(offset))?;
                    }
                }
                Op::Goto(offset) => index = method.jump(current, i32::from(offset))?,
                Op::GotoW(offset) => index = method.jump(current, offset)?,
                Op::Return(None) => return Ok(None),
                Op::Return(Some(_)) => return Ok(Some(pop(&mut stack)?)),

                // Fields and calls
                Op::GetStatic(i) => {
                    let field = self.field_ref(method, i)?;
                    let value = self
                        .statics
                        .get(&field)
                        .cloned()
                        .ok_or_else(|| RuntimeError::Internal(format!("no static {}.{}", field.0, field.1)))?;
                    stack.push(value);
                }
                Op::PutStatic(i) => {
                    let field = self.field_ref(method, i)?;
                    let value = pop(&mut stack)?;
                    self.statics.insert(field, value);
                }
                Op::GetField(i) => {
                    let (_, name) = self.field_ref(method, i)?;
                    let object = pop_object(&mut stack, "field read")?;
                    let value = object
                        .borrow()
                        .get(&name)
                        .cloned()
                        .ok_or_else(|| RuntimeError::Internal(format!("no field {name}")))?;
                    stack.push(value);
                }
                Op::PutField(i) => {
                    let (_, name) = self.field_ref(method, i)?;
                    let value = pop(&mut stack)?;
                    let object = pop_object(&mut stack, "field write")?;
                    if !object.borrow_mut().set(&name, value) {
                        return Err(RuntimeError::Internal(format!("no field {name}")));
                    }
                }
                Op::InvokeVirtual(i) | Op::InvokeStatic(i) => {
                    let target = method
                        .method
                        .constants
                        .method(i)
                        .ok_or_else(|| RuntimeError::Internal(format!("constant #{i} is not a method")))?;
                    let count = usize::from(target.descriptor.arg_slots());
                    if stack.len() < count {
                        return Err(RuntimeError::Internal("operand stack underflow".to_string()));
                    }
                    let args = stack.split_off(stack.len() - count);
                    if matches!(op, Op::InvokeVirtual(_)) && args.first().is_some_and(Value::is_null) {
                        return Err(RuntimeError::NullPointer("method call"));
                    }
                    if let Some(result) = self.call(&target.class, &target.name, args)? {
                        stack.push(result);
                    }
                }

                // Native arrays
                Op::NewArray(kind) => {
                    let length = pop_int(&mut stack)?;
                    let length = usize::try_from(length).map_err(|_| RuntimeError::NegativeArraySize(length))?;
                    stack.push(Value::Array(Rc::new(RefCell::new(ArrayData::new(kind, length)))));
                }
                Op::ArrayLength => {
                    let array = pop_array(&mut stack, "array length")?;
                    let length = array.borrow().values.len();
                    stack.push(Value::Int(length as i32));
                }
                Op::ArrayLoad(_) => {
                    let index = pop_int(&mut stack)?;
                    let array = pop_array(&mut stack, "array load")?;
                    let array = array.borrow();
                    let i = array_index(index, array.values.len())?;
                    stack.push(array.values[i].clone());
                }
                Op::ArrayStore(_) => {
                    let value = pop(&mut stack)?;
                    let index = pop_int(&mut stack)?;
                    let array = pop_array(&mut stack, "array store")?;
                    let mut array = array.borrow_mut();
                    let i = array_index(index, array.values.len())?;
                    array.store(i, value);
                }

                // Types
                Op::CheckCast(tag) => {
                    let value = stack
                        .last()
                        .ok_or_else(|| RuntimeError::Internal("operand stack underflow".to_string()))?;
                    if !instance_of(value, tag) {
                        return Err(RuntimeError::ClassCast(format!(
                            "{} cannot be cast to {tag}",
                            value.type_name()
                        )));
                    }
                }
                Op::Box(p) => {
                    let value = pop(&mut stack)?;
                    stack.push(box_value(p, value)?);
                }
                Op::Unbox(p) => {
                    let value = pop(&mut stack)?;
                    stack.push(unbox_value(p, value)?);
                }
                Op::TypeOf => {
                    let value = pop(&mut stack)?;
                    stack.push(Value::from(value.type_of()));
                }
                Op::Truthy => {
                    let value = pop(&mut stack)?;
                    stack.push(Value::Int(i32::from(value.is_truthy())));
                }
                Op::ObjEquals => {
                    let b = pop(&mut stack)?;
                    let a = pop(&mut stack)?;
                    stack.push(Value::Int(i32::from(a == b)));
                }

                // Strings
                Op::StrConcat => {
                    let b = pop(&mut stack)?;
                    let a = pop(&mut stack)?;
                    stack.push(Value::from(format!("{a}{b}")));
                }
                Op::StrLength => match pop(&mut stack)? {
                    Value::String(s) => stack.push(Value::Int(s.encode_utf16().count() as i32)),
                    Value::Null => return Err(RuntimeError::NullPointer("string length")),
                    other => return Err(mismatch("string", &other)),
                },

                // Lists
                Op::NewList => stack.push(Value::list(Vec::new())),
                Op::ListAdd => {
                    let value = pop(&mut stack)?;
                    pop_list(&mut stack, "list add")?.borrow_mut().push(value);
                }
                Op::ListGet => {
                    let index = pop_int(&mut stack)?;
                    let list = pop_list(&mut stack, "list get")?;
                    let list = list.borrow();
                    let i = list_index(index, list.len())?;
                    stack.push(list[i].clone());
                }
                Op::ListSet => {
                    let value = pop(&mut stack)?;
                    let index = pop_int(&mut stack)?;
                    let list = pop_list(&mut stack, "list set")?;
                    let mut list = list.borrow_mut();
                    let i = list_index(index, list.len())?;
                    stack.push(std::mem::replace(&mut list[i], value));
                }
                Op::ListDelete => {
                    let index = pop_int(&mut stack)?;
                    let list = pop_list(&mut stack, "list delete")?;
                    let mut list = list.borrow_mut();
                    let removed = match usize::try_from(index) {
                        Ok(i) if i < list.len() => {
                            list.remove(i);
                            true
                        }
                        _ => false,
                    };
                    stack.push(Value::Int(i32::from(removed)));
                }
                Op::ListSize => {
                    let list = pop_list(&mut stack, "list size")?;
                    let size = list.borrow().len();
                    stack.push(Value::Int(size as i32));
                }

                // Maps
                Op::NewMap => stack.push(Value::map(Vec::new())),
                Op::MapPut => {
                    let value = pop(&mut stack)?;
                    let key = pop(&mut stack)?;
                    let map = pop_map(&mut stack, "map put")?;
                    let previous = map.borrow_mut().insert(key, value);
                    stack.push(previous.unwrap_or(Value::Null));
                }
                Op::MapGet => {
                    let key = pop(&mut stack)?;
                    let map = pop_map(&mut stack, "map get")?;
                    let value = map.borrow().get(&key).cloned();
                    stack.push(value.unwrap_or(Value::Null));
                }
                Op::MapDelete => {
                    let key = pop(&mut stack)?;
                    let map = pop_map(&mut stack, "map delete")?;
                    let removed = map.borrow_mut().remove(&key).is_some();
                    stack.push(Value::Int(i32::from(removed)));
                }

                // Arbitrary precision
                Op::BigBinary(op) => {
                    let value = big_binary(op, &mut stack)?;
                    stack.push(value);
                }
                Op::BigNeg => {
                    let v = pop_bigint(&mut stack, "bigint negation")?;
                    stack.push(Value::BigInt(-v));
                }
                Op::BigNot => {
                    let v = pop_bigint(&mut stack, "bigint not")?;
                    stack.push(Value::BigInt(!v));
                }
                Op::BigCmp => {
                    let b = pop_bigint(&mut stack, "bigint comparison")?;
                    let a = pop_bigint(&mut stack, "bigint comparison")?;
                    stack.push(ordering(a.cmp(&b)));
                }
                Op::BigToPrim(p) => {
                    let v = pop_bigint(&mut stack, "bigint conversion")?;
                    let scalar = match p {
                        PrimitiveType::Float | PrimitiveType::Double => {
                            coercion::float_to_primitive(v.to_f64().unwrap_or(f64::NAN), p)
                        }
                        _ => coercion::integer_to_primitive(&v, p),
                    };
                    stack.push(scalar_value(scalar));
                }
                Op::LongToBig => {
                    let v = pop_long(&mut stack)?;
                    stack.push(Value::BigInt(BigInt::from(v)));
                }
            }
        }
    }

    fn test(&self, cond: Cond, stack: &mut Vec<Value>) -> Result<bool> {
        Ok(match cond {
            Cond::Eq => pop_int(stack)? == 0,
            Cond::Ne => pop_int(stack)? != 0,
            Cond::Lt => pop_int(stack)? < 0,
            Cond::Ge => pop_int(stack)? >= 0,
            Cond::Gt => pop_int(stack)? > 0,
            Cond::Le => pop_int(stack)? <= 0,
            Cond::ICmpEq | Cond::ICmpNe | Cond::ICmpLt | Cond::ICmpGe | Cond::ICmpGt | Cond::ICmpLe => {
                let b = pop_int(stack)?;
                let a = pop_int(stack)?;
                match cond {
                    Cond::ICmpEq => a == b,
                    Cond::ICmpNe => a != b,
                    Cond::ICmpLt => a < b,
                    Cond::ICmpGe => a >= b,
                    Cond::ICmpGt => a > b,
                    _ => a <= b,
                }
            }
            Cond::ACmpEq | Cond::ACmpNe => {
                let b = pop(stack)?;
                let a = pop(stack)?;
                same_reference(&a, &b) == (cond == Cond::ACmpEq)
            }
            Cond::Null => pop(stack)?.is_null(),
            Cond::NonNull => !pop(stack)?.is_null(),
        })
    }

    fn field_ref(&self, method: &Decoded<'m>, index: u16) -> Result<(String, String)> {
        method
            .method
            .constants
            .field(index)
            .map(|field| (field.class.clone(), field.name.clone()))
            .ok_or_else(|| RuntimeError::Internal(format!("constant #{index} is not a field")))
    }
}
