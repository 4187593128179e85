// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Instruction set, constant pool and compiled artifacts.
//!
//! The instruction set is shaped after the JVM: typed loads, stores and
//! arithmetic, numbered local slots, 16-bit branch displacements with a
//! 32-bit `goto_w`, and opcode numbers taken from the JVM where one exists.
//! Collections, boxing and bigint arithmetic are single intrinsic
//! instructions instead of library calls.
//!
//! Every value occupies exactly one local slot and one stack entry.

use std::fmt;

use num_bigint::BigInt;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::types::{NumKind, PrimitiveType, StackKind, Ty};

/// Branch conditions.
///
/// The first six compare an int against zero, the `ICmp*` family compares
/// two ints, `ACmp*` two references, and `Null`/`NonNull` one reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cond {
    /// `ifeq`
    Eq,
    /// `ifne`
    Ne,
    /// `iflt`
    Lt,
    /// `ifge`
    Ge,
    /// `ifgt`
    Gt,
    /// `ifle`
    Le,
    /// `if_icmpeq`
    ICmpEq,
    /// `if_icmpne`
    ICmpNe,
    /// `if_icmplt`
    ICmpLt,
    /// `if_icmpge`
    ICmpGe,
    /// `if_icmpgt`
    ICmpGt,
    /// `if_icmple`
    ICmpLe,
    /// `if_acmpeq`
    ACmpEq,
    /// `if_acmpne`
    ACmpNe,
    /// `ifnull`
    Null,
    /// `ifnonnull`
    NonNull,
}

/// Relational operators a branch can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compare {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl Compare {
    /// The comparison that holds exactly when this one does not.
    pub fn negate(self) -> Compare {
        match self {
            Compare::Eq => Compare::Ne,
            Compare::Ne => Compare::Eq,
            Compare::Lt => Compare::Ge,
            Compare::Ge => Compare::Lt,
            Compare::Gt => Compare::Le,
            Compare::Le => Compare::Gt,
        }
    }
}

const CONDITIONS: [(Cond, u8, &str); 16] = [
    (Cond::Eq, 0x99, "ifeq"),
    (Cond::Ne, 0x9A, "ifne"),
    (Cond::Lt, 0x9B, "iflt"),
    (Cond::Ge, 0x9C, "ifge"),
    (Cond::Gt, 0x9D, "ifgt"),
    (Cond::Le, 0x9E, "ifle"),
    (Cond::ICmpEq, 0x9F, "if_icmpeq"),
    (Cond::ICmpNe, 0xA0, "if_icmpne"),
    (Cond::ICmpLt, 0xA1, "if_icmplt"),
    (Cond::ICmpGe, 0xA2, "if_icmpge"),
    (Cond::ICmpGt, 0xA3, "if_icmpgt"),
    (Cond::ICmpLe, 0xA4, "if_icmple"),
    (Cond::ACmpEq, 0xA5, "if_acmpeq"),
    (Cond::ACmpNe, 0xA6, "if_acmpne"),
    (Cond::Null, 0xC6, "ifnull"),
    (Cond::NonNull, 0xC7, "ifnonnull"),
];

impl Cond {
    /// Tests an int against zero.
    pub fn zero(cmp: Compare) -> Cond {
        match cmp {
            Compare::Eq => Cond::Eq,
            Compare::Ne => Cond::Ne,
            Compare::Lt => Cond::Lt,
            Compare::Ge => Cond::Ge,
            Compare::Gt => Cond::Gt,
            Compare::Le => Cond::Le,
        }
    }

    /// Compares two ints.
    pub fn ints(cmp: Compare) -> Cond {
        match cmp {
            Compare::Eq => Cond::ICmpEq,
            Compare::Ne => Cond::ICmpNe,
            Compare::Lt => Cond::ICmpLt,
            Compare::Ge => Cond::ICmpGe,
            Compare::Gt => Cond::ICmpGt,
            Compare::Le => Cond::ICmpLe,
        }
    }

    /// The condition that holds exactly when this one does not.
    pub fn negate(self) -> Cond {
        match self {
            Cond::Eq => Cond::Ne,
            Cond::Ne => Cond::Eq,
            Cond::Lt => Cond::Ge,
            Cond::Ge => Cond::Lt,
            Cond::Gt => Cond::Le,
            Cond::Le => Cond::Gt,
            Cond::ICmpEq => Cond::ICmpNe,
            Cond::ICmpNe => Cond::ICmpEq,
            Cond::ICmpLt => Cond::ICmpGe,
            Cond::ICmpGe => Cond::ICmpLt,
            Cond::ICmpGt => Cond::ICmpLe,
            Cond::ICmpLe => Cond::ICmpGt,
            Cond::ACmpEq => Cond::ACmpNe,
            Cond::ACmpNe => Cond::ACmpEq,
            Cond::Null => Cond::NonNull,
            Cond::NonNull => Cond::Null,
        }
    }

    /// Number of operands the branch pops.
    pub fn operands(self) -> u16 {
        match self {
            Cond::ICmpEq
            | Cond::ICmpNe
            | Cond::ICmpLt
            | Cond::ICmpGe
            | Cond::ICmpGt
            | Cond::ICmpLe
            | Cond::ACmpEq
            | Cond::ACmpNe => 2,
            _ => 1,
        }
    }

    fn opcode(self) -> u8 {
        CONDITIONS
            .iter()
            .find(|(cond, _, _)| *cond == self)
            .map_or(0, |(_, opcode, _)| *opcode)
    }

    fn from_opcode(opcode: u8) -> Option<Cond> {
        CONDITIONS
            .iter()
            .find(|(_, code, _)| *code == opcode)
            .map(|(cond, _, _)| *cond)
    }

    fn mnemonic(self) -> &'static str {
        CONDITIONS
            .iter()
            .find(|(cond, _, _)| *cond == self)
            .map_or("if?", |(_, _, name)| *name)
    }
}

/// Arithmetic operators available for every numeric kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Division
    Div,
    /// Remainder
    Rem,
}

/// Shift and bitwise operators, integral kinds only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitOp {
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `>>>`
    UShr,
    /// `&`
    And,
    /// `|`
    Or,
    /// `^`
    Xor,
}

/// Integral stack kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntKind {
    /// 32-bit
    Int,
    /// 64-bit
    Long,
}

impl IntKind {
    /// Narrows a numeric kind to an integral one.
    pub fn of(kind: NumKind) -> Option<IntKind> {
        match kind {
            NumKind::Int => Some(IntKind::Int),
            NumKind::Long => Some(IntKind::Long),
            NumKind::Float | NumKind::Double => None,
        }
    }
}

/// Bigint binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BigOp {
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Truncating division
    Div,
    /// Remainder
    Rem,
    /// Bitwise and
    And,
    /// Bitwise or
    Or,
    /// Bitwise xor
    Xor,
    /// Left shift by an int
    Shl,
    /// Arithmetic right shift by an int
    Shr,
}

const BIG_OPS: [(BigOp, &str); 10] = [
    (BigOp::Add, "add"),
    (BigOp::Sub, "sub"),
    (BigOp::Mul, "mul"),
    (BigOp::Div, "div"),
    (BigOp::Rem, "rem"),
    (BigOp::And, "and"),
    (BigOp::Or, "or"),
    (BigOp::Xor, "xor"),
    (BigOp::Shl, "shl"),
    (BigOp::Shr, "shr"),
];

impl BigOp {
    fn code(self) -> u8 {
        BIG_OPS
            .iter()
            .position(|(op, _)| *op == self)
            .map_or(0, |index| index as u8)
    }

    fn from_code(code: u8) -> Option<BigOp> {
        BIG_OPS.get(code as usize).map(|(op, _)| *op)
    }

    fn name(self) -> &'static str {
        BIG_OPS[self.code() as usize].1
    }
}

/// Element kinds of native arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElemKind {
    /// Primitive elements
    Prim(PrimitiveType),
    /// Reference elements
    Ref,
}

impl ElemKind {
    /// The element kind used to store values of `ty`.
    pub fn of(ty: &Ty) -> ElemKind {
        match ty {
            Ty::Primitive(p) => ElemKind::Prim(*p),
            _ => ElemKind::Ref,
        }
    }

    fn code(self) -> u8 {
        match self {
            ElemKind::Prim(p) => p.code(),
            ElemKind::Ref => 1,
        }
    }

    fn from_code(code: u8) -> Option<ElemKind> {
        if code == 1 {
            Some(ElemKind::Ref)
        } else {
            PrimitiveType::from_code(code).map(ElemKind::Prim)
        }
    }

    fn load_opcode(self) -> u8 {
        match self {
            ElemKind::Prim(PrimitiveType::Int) => 0x2E,
            ElemKind::Prim(PrimitiveType::Long) => 0x2F,
            ElemKind::Prim(PrimitiveType::Float) => 0x30,
            ElemKind::Prim(PrimitiveType::Double) => 0x31,
            ElemKind::Ref => 0x32,
            ElemKind::Prim(PrimitiveType::Byte) => 0x33,
            ElemKind::Prim(PrimitiveType::Boolean) => 0x34,
            ElemKind::Prim(PrimitiveType::Short) => 0x35,
        }
    }

    fn from_load_opcode(opcode: u8) -> Option<ElemKind> {
        Some(match opcode {
            0x2E => ElemKind::Prim(PrimitiveType::Int),
            0x2F => ElemKind::Prim(PrimitiveType::Long),
            0x30 => ElemKind::Prim(PrimitiveType::Float),
            0x31 => ElemKind::Prim(PrimitiveType::Double),
            0x32 => ElemKind::Ref,
            0x33 => ElemKind::Prim(PrimitiveType::Byte),
            0x34 => ElemKind::Prim(PrimitiveType::Boolean),
            0x35 => ElemKind::Prim(PrimitiveType::Short),
            _ => return None,
        })
    }

    fn prefix(self) -> char {
        match self {
            ElemKind::Prim(PrimitiveType::Int) => 'i',
            ElemKind::Prim(PrimitiveType::Long) => 'l',
            ElemKind::Prim(PrimitiveType::Float) => 'f',
            ElemKind::Prim(PrimitiveType::Double) => 'd',
            ElemKind::Prim(PrimitiveType::Byte) => 'b',
            ElemKind::Prim(PrimitiveType::Boolean) => 'z',
            ElemKind::Prim(PrimitiveType::Short) => 's',
            ElemKind::Ref => 'a',
        }
    }
}

/// Runtime type tests for `checkcast`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// A boxed primitive of exactly this type
    Boxed(PrimitiveType),
    /// A bigint
    BigInt,
    /// A string
    String,
    /// A native array
    Array,
    /// A growable list
    List,
    /// An ordered map
    Map,
    /// A class instance
    Object,
}

impl TypeTag {
    fn code(self) -> u8 {
        match self {
            TypeTag::Boxed(p) => p.code(),
            TypeTag::BigInt => 20,
            TypeTag::String => 21,
            TypeTag::Array => 22,
            TypeTag::List => 23,
            TypeTag::Map => 24,
            TypeTag::Object => 25,
        }
    }

    fn from_code(code: u8) -> Option<TypeTag> {
        Some(match code {
            20 => TypeTag::BigInt,
            21 => TypeTag::String,
            22 => TypeTag::Array,
            23 => TypeTag::List,
            24 => TypeTag::Map,
            25 => TypeTag::Object,
            other => return PrimitiveType::from_code(other).map(TypeTag::Boxed),
        })
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Boxed(p) => f.write_str(p.boxed_name()),
            TypeTag::BigInt => f.write_str("BigInteger"),
            TypeTag::String => f.write_str("String"),
            TypeTag::Array => f.write_str("array"),
            TypeTag::List => f.write_str("ArrayList"),
            TypeTag::Map => f.write_str("LinkedHashMap"),
            TypeTag::Object => f.write_str("Object"),
        }
    }
}

/// A decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Do nothing
    Nop,
    /// Push null
    AConstNull,
    /// Push a small int immediate
    IConst(i16),
    /// Push a constant pool entry
    Ldc(u16),
    /// Push a local slot
    Load(StackKind, u16),
    /// Pop into a local slot
    Store(StackKind, u16),
    /// Discard the top value
    Pop,
    /// `a -> a a`
    Dup,
    /// `b a -> a b a`
    DupX1,
    /// `c b a -> a c b a`
    DupX2,
    /// `b a -> b a b a`
    Dup2,
    /// `b a -> a b`
    Swap,
    /// Typed arithmetic
    Arith(ArithOp, NumKind),
    /// Typed negation
    Neg(NumKind),
    /// Integral shift or bitwise operation
    Bitwise(BitOp, IntKind),
    /// Primitive conversion
    Convert(NumKind, NumKind),
    /// Int to byte
    I2B,
    /// Int to short
    I2S,
    /// Compare longs
    LCmp,
    /// Compare floats, NaN yields -1
    FCmpL,
    /// Compare floats, NaN yields 1
    FCmpG,
    /// Compare doubles, NaN yields -1
    DCmpL,
    /// Compare doubles, NaN yields 1
    DCmpG,
    /// Conditional short branch
    If(Cond, i16),
    /// Unconditional short branch
    Goto(i16),
    /// Unconditional wide branch
    GotoW(i32),
    /// Return, typed or void
    Return(Option<StackKind>),
    /// Push a static field
    GetStatic(u16),
    /// Pop into a static field
    PutStatic(u16),
    /// Replace an object with one of its fields
    GetField(u16),
    /// Pop a value and an object into a field
    PutField(u16),
    /// Call an instance method
    InvokeVirtual(u16),
    /// Call a static method
    InvokeStatic(u16),
    /// Allocate a native array
    NewArray(ElemKind),
    /// Native array length
    ArrayLength,
    /// Load a native array element
    ArrayLoad(ElemKind),
    /// Store a native array element
    ArrayStore(ElemKind),
    /// Check an opaque reference
    CheckCast(TypeTag),
    /// Box a primitive
    Box(PrimitiveType),
    /// Unbox a reference
    Unbox(PrimitiveType),
    /// Push the `typeof` tag of a reference
    TypeOf,
    /// Truthiness of a reference by its runtime kind, as an int
    Truthy,
    /// Value equality of two references, as an int
    ObjEquals,
    /// Concatenate the string forms of two references
    StrConcat,
    /// String length in UTF-16 units
    StrLength,
    /// Allocate a growable list
    NewList,
    /// `list value ->`
    ListAdd,
    /// `list index -> value`
    ListGet,
    /// `list index value -> previous`
    ListSet,
    /// `list index -> existed`; removes the element
    ListDelete,
    /// `list -> size`
    ListSize,
    /// Allocate an ordered map
    NewMap,
    /// `map key value -> previous`
    MapPut,
    /// `map key -> value`
    MapGet,
    /// `map key -> existed`; removes the entry
    MapDelete,
    /// Bigint binary operation
    BigBinary(BigOp),
    /// Bigint negation
    BigNeg,
    /// Bigint complement
    BigNot,
    /// Compare bigints to -1, 0 or 1
    BigCmp,
    /// Truncate a bigint to a primitive
    BigToPrim(PrimitiveType),
    /// Widen a long to a bigint
    LongToBig,
}

const CONVERSIONS: [(NumKind, NumKind, u8, &str); 12] = [
    (NumKind::Int, NumKind::Long, 0x85, "i2l"),
    (NumKind::Int, NumKind::Float, 0x86, "i2f"),
    (NumKind::Int, NumKind::Double, 0x87, "i2d"),
    (NumKind::Long, NumKind::Int, 0x88, "l2i"),
    (NumKind::Long, NumKind::Float, 0x89, "l2f"),
    (NumKind::Long, NumKind::Double, 0x8A, "l2d"),
    (NumKind::Float, NumKind::Int, 0x8B, "f2i"),
    (NumKind::Float, NumKind::Long, 0x8C, "f2l"),
    (NumKind::Float, NumKind::Double, 0x8D, "f2d"),
    (NumKind::Double, NumKind::Int, 0x8E, "d2i"),
    (NumKind::Double, NumKind::Long, 0x8F, "d2l"),
    (NumKind::Double, NumKind::Float, 0x90, "d2f"),
];

fn arith_base(op: ArithOp) -> u8 {
    match op {
        ArithOp::Add => 0x60,
        ArithOp::Sub => 0x64,
        ArithOp::Mul => 0x68,
        ArithOp::Div => 0x6C,
        ArithOp::Rem => 0x70,
    }
}

fn bit_base(op: BitOp) -> u8 {
    match op {
        BitOp::Shl => 0x78,
        BitOp::Shr => 0x7A,
        BitOp::UShr => 0x7C,
        BitOp::And => 0x7E,
        BitOp::Or => 0x80,
        BitOp::Xor => 0x82,
    }
}

fn load_opcode(kind: StackKind) -> u8 {
    match kind {
        StackKind::Num(kind) => 0x15 + kind.index(),
        StackKind::Ref => 0x19,
    }
}

fn kind_prefix(kind: StackKind) -> char {
    match kind {
        StackKind::Num(NumKind::Int) => 'i',
        StackKind::Num(NumKind::Long) => 'l',
        StackKind::Num(NumKind::Float) => 'f',
        StackKind::Num(NumKind::Double) => 'd',
        StackKind::Ref => 'a',
    }
}

fn stack_kind_at(index: u8) -> StackKind {
    NumKind::from_index(index).map_or(StackKind::Ref, StackKind::Num)
}

/// Errors decoding a byte stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The byte at `pc` is not an opcode.
    #[error("unknown opcode {opcode:#04x} at {pc}")]
    UnknownOpcode {
        /// The byte
        opcode: u8,
        /// Its offset
        pc: usize,
    },
    /// The stream ends inside an instruction.
    #[error("truncated instruction at {0}")]
    Truncated(usize),
    /// An operand byte is out of range.
    #[error("invalid operand at {0}")]
    BadOperand(usize),
}

impl Op {
    /// The opcode byte.
    pub fn opcode(&self) -> u8 {
        match *self {
            Op::Nop => 0x00,
            Op::AConstNull => 0x01,
            Op::IConst(_) => 0x11,
            Op::Ldc(_) => 0x13,
            Op::Load(kind, _) => load_opcode(kind),
            Op::Store(kind, _) => load_opcode(kind) + 0x21,
            Op::ArrayLoad(elem) => elem.load_opcode(),
            Op::ArrayStore(elem) => elem.load_opcode() + 0x21,
            Op::Pop => 0x57,
            Op::Dup => 0x59,
            Op::DupX1 => 0x5A,
            Op::DupX2 => 0x5B,
            Op::Dup2 => 0x5C,
            Op::Swap => 0x5F,
            Op::Arith(op, kind) => arith_base(op) + kind.index(),
            Op::Neg(kind) => 0x74 + kind.index(),
            Op::Bitwise(op, kind) => bit_base(op) + u8::from(kind == IntKind::Long),
            Op::Convert(from, to) => CONVERSIONS
                .iter()
                .find(|(f, t, _, _)| *f == from && *t == to)
                .map_or(0x00, |(_, _, opcode, _)| *opcode),
            Op::I2B => 0x91,
            Op::I2S => 0x93,
            Op::LCmp => 0x94,
            Op::FCmpL => 0x95,
            Op::FCmpG => 0x96,
            Op::DCmpL => 0x97,
            Op::DCmpG => 0x98,
            Op::If(cond, _) => cond.opcode(),
            Op::Goto(_) => 0xA7,
            Op::GotoW(_) => 0xC8,
            Op::Return(Some(kind)) => 0xAC + kind_index(kind),
            Op::Return(None) => 0xB1,
            Op::GetStatic(_) => 0xB2,
            Op::PutStatic(_) => 0xB3,
            Op::GetField(_) => 0xB4,
            Op::PutField(_) => 0xB5,
            Op::InvokeVirtual(_) => 0xB6,
            Op::InvokeStatic(_) => 0xB8,
            Op::NewArray(_) => 0xBC,
            Op::ArrayLength => 0xBE,
            Op::CheckCast(_) => 0xC0,
            Op::Box(_) => 0xCB,
            Op::Unbox(_) => 0xCC,
            Op::TypeOf => 0xCD,
            Op::ObjEquals => 0xCE,
            Op::StrConcat => 0xCF,
            Op::StrLength => 0xD0,
            Op::NewList => 0xD1,
            Op::ListAdd => 0xD2,
            Op::ListGet => 0xD3,
            Op::ListSet => 0xD4,
            Op::ListDelete => 0xD5,
            Op::ListSize => 0xD6,
            Op::NewMap => 0xD7,
            Op::MapPut => 0xD8,
            Op::MapGet => 0xD9,
            Op::MapDelete => 0xDA,
            Op::BigBinary(_) => 0xDB,
            Op::BigNeg => 0xDC,
            Op::BigNot => 0xDD,
            Op::BigCmp => 0xDE,
            Op::BigToPrim(_) => 0xDF,
            Op::LongToBig => 0xE0,
            Op::Truthy => 0xE1,
        }
    }

    /// Encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        1 + match self {
            Op::IConst(_)
            | Op::Ldc(_)
            | Op::Load(..)
            | Op::Store(..)
            | Op::If(..)
            | Op::Goto(_)
            | Op::GetStatic(_)
            | Op::PutStatic(_)
            | Op::GetField(_)
            | Op::PutField(_)
            | Op::InvokeVirtual(_)
            | Op::InvokeStatic(_) => 2,
            Op::GotoW(_) => 4,
            Op::NewArray(_)
            | Op::CheckCast(_)
            | Op::Box(_)
            | Op::Unbox(_)
            | Op::BigBinary(_)
            | Op::BigToPrim(_) => 1,
            _ => 0,
        }
    }

    /// Appends the encoded instruction to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.opcode());
        match *self {
            Op::IConst(value) => out.extend_from_slice(&value.to_be_bytes()),
            Op::If(_, offset) | Op::Goto(offset) => out.extend_from_slice(&offset.to_be_bytes()),
            Op::GotoW(offset) => out.extend_from_slice(&offset.to_be_bytes()),
            Op::Ldc(index)
            | Op::Load(_, index)
            | Op::Store(_, index)
            | Op::GetStatic(index)
            | Op::PutStatic(index)
            | Op::GetField(index)
            | Op::PutField(index)
            | Op::InvokeVirtual(index)
            | Op::InvokeStatic(index) => out.extend_from_slice(&index.to_be_bytes()),
            Op::NewArray(elem) => out.push(elem.code()),
            Op::CheckCast(tag) => out.push(tag.code()),
            Op::Box(p) | Op::Unbox(p) | Op::BigToPrim(p) => out.push(p.code()),
            Op::BigBinary(op) => out.push(op.code()),
            _ => {}
        }
    }

    /// Decodes the instruction starting at `pc`, returning it and its length.
    pub fn decode(code: &[u8], pc: usize) -> Result<(Op, usize), DecodeError> {
        let opcode = *code.get(pc).ok_or(DecodeError::Truncated(pc))?;
        let u8_at = |offset: usize| -> Result<u8, DecodeError> {
            code.get(pc + offset).copied().ok_or(DecodeError::Truncated(pc))
        };
        let u16_at = || -> Result<u16, DecodeError> { Ok(u16::from_be_bytes([u8_at(1)?, u8_at(2)?])) };
        let i16_at = || -> Result<i16, DecodeError> { Ok(i16::from_be_bytes([u8_at(1)?, u8_at(2)?])) };
        let bad = DecodeError::BadOperand(pc);

        let op = match opcode {
            0x00 => Op::Nop,
            0x01 => Op::AConstNull,
            0x11 => Op::IConst(i16_at()?),
            0x13 => Op::Ldc(u16_at()?),
            0x15..=0x19 => Op::Load(stack_kind_at(opcode - 0x15), u16_at()?),
            0x36..=0x3A => Op::Store(stack_kind_at(opcode - 0x36), u16_at()?),
            0x2E..=0x35 => Op::ArrayLoad(ElemKind::from_load_opcode(opcode).ok_or(bad)?),
            0x4F..=0x56 => Op::ArrayStore(ElemKind::from_load_opcode(opcode - 0x21).ok_or(bad)?),
            0x57 => Op::Pop,
            0x59 => Op::Dup,
            0x5A => Op::DupX1,
            0x5B => Op::DupX2,
            0x5C => Op::Dup2,
            0x5F => Op::Swap,
            0x60..=0x73 => {
                let op = match (opcode - 0x60) / 4 {
                    0 => ArithOp::Add,
                    1 => ArithOp::Sub,
                    2 => ArithOp::Mul,
                    3 => ArithOp::Div,
                    _ => ArithOp::Rem,
                };
                Op::Arith(op, NumKind::from_index((opcode - 0x60) % 4).ok_or(bad)?)
            }
            0x74..=0x77 => Op::Neg(NumKind::from_index(opcode - 0x74).ok_or(bad)?),
            0x78..=0x83 => {
                let op = match (opcode - 0x78) / 2 {
                    0 => BitOp::Shl,
                    1 => BitOp::Shr,
                    2 => BitOp::UShr,
                    3 => BitOp::And,
                    4 => BitOp::Or,
                    _ => BitOp::Xor,
                };
                let kind = if (opcode - 0x78) % 2 == 0 { IntKind::Int } else { IntKind::Long };
                Op::Bitwise(op, kind)
            }
            0x85..=0x90 => {
                let (from, to, _, _) = CONVERSIONS
                    .iter()
                    .find(|(_, _, code, _)| *code == opcode)
                    .ok_or(bad)?;
                Op::Convert(*from, *to)
            }
            0x91 => Op::I2B,
            0x93 => Op::I2S,
            0x94 => Op::LCmp,
            0x95 => Op::FCmpL,
            0x96 => Op::FCmpG,
            0x97 => Op::DCmpL,
            0x98 => Op::DCmpG,
            0x99..=0xA6 | 0xC6 | 0xC7 => {
                Op::If(Cond::from_opcode(opcode).ok_or(bad)?, i16_at()?)
            }
            0xA7 => Op::Goto(i16_at()?),
            0xC8 => Op::GotoW(i32::from_be_bytes([u8_at(1)?, u8_at(2)?, u8_at(3)?, u8_at(4)?])),
            0xAC..=0xB0 => Op::Return(Some(stack_kind_at(opcode - 0xAC))),
            0xB1 => Op::Return(None),
            0xB2 => Op::GetStatic(u16_at()?),
            0xB3 => Op::PutStatic(u16_at()?),
            0xB4 => Op::GetField(u16_at()?),
            0xB5 => Op::PutField(u16_at()?),
            0xB6 => Op::InvokeVirtual(u16_at()?),
            0xB8 => Op::InvokeStatic(u16_at()?),
            0xBC => Op::NewArray(ElemKind::from_code(u8_at(1)?).ok_or(bad)?),
            0xBE => Op::ArrayLength,
            0xC0 => Op::CheckCast(TypeTag::from_code(u8_at(1)?).ok_or(bad)?),
            0xCB => Op::Box(PrimitiveType::from_code(u8_at(1)?).ok_or(bad)?),
            0xCC => Op::Unbox(PrimitiveType::from_code(u8_at(1)?).ok_or(bad)?),
            0xCD => Op::TypeOf,
            0xCE => Op::ObjEquals,
            0xCF => Op::StrConcat,
            0xD0 => Op::StrLength,
            0xD1 => Op::NewList,
            0xD2 => Op::ListAdd,
            0xD3 => Op::ListGet,
            0xD4 => Op::ListSet,
            0xD5 => Op::ListDelete,
            0xD6 => Op::ListSize,
            0xD7 => Op::NewMap,
            0xD8 => Op::MapPut,
            0xD9 => Op::MapGet,
            0xDA => Op::MapDelete,
            0xDB => Op::BigBinary(BigOp::from_code(u8_at(1)?).ok_or(bad)?),
            0xDC => Op::BigNeg,
            0xDD => Op::BigNot,
            0xDE => Op::BigCmp,
            0xDF => Op::BigToPrim(PrimitiveType::from_code(u8_at(1)?).ok_or(bad)?),
            0xE0 => Op::LongToBig,
            0xE1 => Op::Truthy,
            _ => return Err(DecodeError::UnknownOpcode { opcode, pc }),
        };
        let len = op.encoded_len();
        if pc + len > code.len() {
            return Err(DecodeError::Truncated(pc));
        }
        Ok((op, len))
    }

    /// Returns true when control never falls through to the next instruction.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Op::Goto(_) | Op::GotoW(_) | Op::Return(_))
    }

    /// Relative displacement of a branch, from the start of this instruction.
    pub fn branch_offset(&self) -> Option<i32> {
        match *self {
            Op::If(_, offset) | Op::Goto(offset) => Some(i32::from(offset)),
            Op::GotoW(offset) => Some(offset),
            _ => None,
        }
    }

    /// How many values the instruction pops and pushes.
    ///
    /// Returns `None` when a call or field operand does not name a method or
    /// field in `pool`.
    pub fn stack_effect(&self, pool: &ConstantPool) -> Option<(u16, u16)> {
        let effect = match *self {
            Op::Nop | Op::Goto(_) | Op::GotoW(_) | Op::Return(None) => (0, 0),
            Op::AConstNull | Op::IConst(_) | Op::Ldc(_) | Op::Load(..) => (0, 1),
            Op::NewList | Op::NewMap => (0, 1),
            Op::Store(..) | Op::Pop | Op::Return(Some(_)) => (1, 0),
            Op::Dup => (1, 2),
            Op::DupX1 => (2, 3),
            Op::DupX2 => (3, 4),
            Op::Dup2 => (2, 4),
            Op::Swap => (2, 2),
            Op::Arith(..) | Op::Bitwise(..) => (2, 1),
            Op::LCmp | Op::FCmpL | Op::FCmpG | Op::DCmpL | Op::DCmpG => (2, 1),
            Op::Neg(_) | Op::Convert(..) | Op::I2B | Op::I2S => (1, 1),
            Op::If(cond, _) => (cond.operands(), 0),
            Op::GetStatic(index) => {
                pool.field(index)?;
                (0, 1)
            }
            Op::PutStatic(index) => {
                pool.field(index)?;
                (1, 0)
            }
            Op::GetField(index) => {
                pool.field(index)?;
                (1, 1)
            }
            Op::PutField(index) => {
                pool.field(index)?;
                (2, 0)
            }
            Op::InvokeVirtual(index) | Op::InvokeStatic(index) => {
                let method = pool.method(index)?;
                let receiver = u16::from(matches!(self, Op::InvokeVirtual(_)));
                let pushes = u16::from(method.descriptor.ret != Ty::Void);
                (method.descriptor.params.len() as u16 + receiver, pushes)
            }
            Op::NewArray(_) | Op::ArrayLength | Op::CheckCast(_) => (1, 1),
            Op::Box(_) | Op::Unbox(_) | Op::TypeOf | Op::Truthy | Op::StrLength => (1, 1),
            Op::ArrayLoad(_) => (2, 1),
            Op::ArrayStore(_) => (3, 0),
            Op::ObjEquals | Op::StrConcat => (2, 1),
            Op::ListAdd => (2, 0),
            Op::ListGet | Op::ListDelete => (2, 1),
            Op::ListSet => (3, 1),
            Op::ListSize => (1, 1),
            Op::MapPut => (3, 1),
            Op::MapGet | Op::MapDelete => (2, 1),
            Op::BigBinary(_) | Op::BigCmp => (2, 1),
            Op::BigNeg | Op::BigNot | Op::BigToPrim(_) | Op::LongToBig => (1, 1),
        };
        Some(effect)
    }
}

fn kind_index(kind: StackKind) -> u8 {
    match kind {
        StackKind::Num(kind) => kind.index(),
        StackKind::Ref => 4,
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Op::Nop => f.write_str("nop"),
            Op::AConstNull => f.write_str("aconst_null"),
            Op::IConst(value) => write!(f, "sipush {value}"),
            Op::Ldc(index) => write!(f, "ldc_w #{index}"),
            Op::Load(kind, slot) => write!(f, "{}load {slot}", kind_prefix(kind)),
            Op::Store(kind, slot) => write!(f, "{}store {slot}", kind_prefix(kind)),
            Op::Pop => f.write_str("pop"),
            Op::Dup => f.write_str("dup"),
            Op::DupX1 => f.write_str("dup_x1"),
            Op::DupX2 => f.write_str("dup_x2"),
            Op::Dup2 => f.write_str("dup2"),
            Op::Swap => f.write_str("swap"),
            Op::Arith(op, kind) => {
                let name = match op {
                    ArithOp::Add => "add",
                    ArithOp::Sub => "sub",
                    ArithOp::Mul => "mul",
                    ArithOp::Div => "div",
                    ArithOp::Rem => "rem",
                };
                write!(f, "{}{name}", kind_prefix(StackKind::Num(kind)))
            }
            Op::Neg(kind) => write!(f, "{}neg", kind_prefix(StackKind::Num(kind))),
            Op::Bitwise(op, kind) => {
                let prefix = if kind == IntKind::Long { 'l' } else { 'i' };
                let name = match op {
                    BitOp::Shl => "shl",
                    BitOp::Shr => "shr",
                    BitOp::UShr => "ushr",
                    BitOp::And => "and",
                    BitOp::Or => "or",
                    BitOp::Xor => "xor",
                };
                write!(f, "{prefix}{name}")
            }
            Op::Convert(from, to) => {
                let name = CONVERSIONS
                    .iter()
                    .find(|(a, b, _, _)| *a == from && *b == to)
                    .map_or("convert?", |(_, _, _, name)| *name);
                f.write_str(name)
            }
            Op::I2B => f.write_str("i2b"),
            Op::I2S => f.write_str("i2s"),
            Op::LCmp => f.write_str("lcmp"),
            Op::FCmpL => f.write_str("fcmpl"),
            Op::FCmpG => f.write_str("fcmpg"),
            Op::DCmpL => f.write_str("dcmpl"),
            Op::DCmpG => f.write_str("dcmpg"),
            Op::If(cond, offset) => write!(f, "{} {offset:+}", cond.mnemonic()),
            Op::Goto(offset) => write!(f, "goto {offset:+}"),
            Op::GotoW(offset) => write!(f, "goto_w {offset:+}"),
            Op::Return(Some(kind)) => write!(f, "{}return", kind_prefix(kind)),
            Op::Return(None) => f.write_str("return"),
            Op::GetStatic(index) => write!(f, "getstatic #{index}"),
            Op::PutStatic(index) => write!(f, "putstatic #{index}"),
            Op::GetField(index) => write!(f, "getfield #{index}"),
            Op::PutField(index) => write!(f, "putfield #{index}"),
            Op::InvokeVirtual(index) => write!(f, "invokevirtual #{index}"),
            Op::InvokeStatic(index) => write!(f, "invokestatic #{index}"),
            Op::NewArray(elem) => write!(f, "newarray {}", elem.prefix()),
            Op::ArrayLength => f.write_str("arraylength"),
            Op::ArrayLoad(elem) => write!(f, "{}aload", elem.prefix()),
            Op::ArrayStore(elem) => write!(f, "{}astore", elem.prefix()),
            Op::CheckCast(tag) => write!(f, "checkcast {tag}"),
            Op::Box(p) => write!(f, "box {}", p.boxed_name()),
            Op::Unbox(p) => write!(f, "unbox {}", p.name()),
            Op::TypeOf => f.write_str("typeof"),
            Op::Truthy => f.write_str("truthy"),
            Op::ObjEquals => f.write_str("obj_equals"),
            Op::StrConcat => f.write_str("str_concat"),
            Op::StrLength => f.write_str("str_length"),
            Op::NewList => f.write_str("new_list"),
            Op::ListAdd => f.write_str("list_add"),
            Op::ListGet => f.write_str("list_get"),
            Op::ListSet => f.write_str("list_set"),
            Op::ListDelete => f.write_str("list_delete"),
            Op::ListSize => f.write_str("list_size"),
            Op::NewMap => f.write_str("new_map"),
            Op::MapPut => f.write_str("map_put"),
            Op::MapGet => f.write_str("map_get"),
            Op::MapDelete => f.write_str("map_delete"),
            Op::BigBinary(op) => write!(f, "big_{}", op.name()),
            Op::BigNeg => f.write_str("big_neg"),
            Op::BigNot => f.write_str("big_not"),
            Op::BigCmp => f.write_str("big_cmp"),
            Op::BigToPrim(p) => write!(f, "big_to_{}", p.name()),
            Op::LongToBig => f.write_str("long_to_big"),
        }
    }
}

/// The signature of a method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    /// Parameter types, excluding the receiver
    pub params: Vec<Ty>,
    /// Return type
    pub ret: Ty,
    /// Whether the method has no receiver
    pub is_static: bool,
}

impl MethodDescriptor {
    /// Local slots taken by the receiver and parameters.
    pub fn arg_slots(&self) -> u16 {
        self.params.len() as u16 + u16::from(!self.is_static)
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for param in &self.params {
            f.write_str(&param.descriptor())?;
        }
        write!(f, "){}", self.ret.descriptor())
    }
}

/// A reference to a field of a compiled class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// Owning class
    pub class: String,
    /// Field name
    pub name: String,
    /// Field type
    pub ty: Ty,
}

/// A reference to a method of a compiled class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    /// Owning class
    pub class: String,
    /// Method name
    pub name: String,
    /// Signature
    pub descriptor: MethodDescriptor,
}

/// A constant pool entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// 32-bit float
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// String
    String(String),
    /// Arbitrary precision integer
    BigInt(BigInt),
    /// Field reference
    Field(FieldRef),
    /// Method reference
    Method(MethodRef),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "int {v}"),
            Constant::Long(v) => write!(f, "long {v}"),
            Constant::Float(v) => write!(f, "float {v:?}"),
            Constant::Double(v) => write!(f, "double {v:?}"),
            Constant::String(v) => write!(f, "string {v:?}"),
            Constant::BigInt(v) => write!(f, "bigint {v}"),
            Constant::Field(r) => write!(f, "field {}.{}:{}", r.class, r.name, r.ty.descriptor()),
            Constant::Method(r) => write!(f, "method {}.{}{}", r.class, r.name, r.descriptor),
        }
    }
}

/// Identity of a constant for deduplication. Floats compare by bit pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Int(i32),
    Long(i64),
    Float(u32),
    Double(u64),
    String(String),
    BigInt(BigInt),
    Field(String, String),
    Method(String, String),
}

impl From<&Constant> for ConstantKey {
    fn from(constant: &Constant) -> Self {
        match constant {
            Constant::Int(v) => ConstantKey::Int(*v),
            Constant::Long(v) => ConstantKey::Long(*v),
            Constant::Float(v) => ConstantKey::Float(v.to_bits()),
            Constant::Double(v) => ConstantKey::Double(v.to_bits()),
            Constant::String(v) => ConstantKey::String(v.clone()),
            Constant::BigInt(v) => ConstantKey::BigInt(v.clone()),
            Constant::Field(r) => ConstantKey::Field(r.class.clone(), r.name.clone()),
            Constant::Method(r) => ConstantKey::Method(r.class.clone(), r.name.clone()),
        }
    }
}

/// A deduplicating constant pool.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<Constant>,
    index: FxHashMap<ConstantKey, u16>,
}

impl ConstantPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a constant, or finds an equal one.
    ///
    /// Returns `None` when the pool already holds `limit` entries.
    pub fn insert(&mut self, constant: Constant, limit: usize) -> Option<u16> {
        let key = ConstantKey::from(&constant);
        if let Some(&index) = self.index.get(&key) {
            return Some(index);
        }
        if self.entries.len() >= limit.min(u16::MAX as usize + 1) {
            return None;
        }
        let index = self.entries.len() as u16;
        self.entries.push(constant);
        self.index.insert(key, index);
        Some(index)
    }

    /// Looks up an entry.
    pub fn get(&self, index: u16) -> Option<&Constant> {
        self.entries.get(index as usize)
    }

    /// Looks up a field reference.
    pub fn field(&self, index: u16) -> Option<&FieldRef> {
        match self.get(index) {
            Some(Constant::Field(field)) => Some(field),
            _ => None,
        }
    }

    /// Looks up a method reference.
    pub fn method(&self, index: u16) -> Option<&MethodRef> {
        match self.get(index) {
            Some(Constant::Method(method)) => Some(method),
            _ => None,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the entries in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Constant> {
        self.entries.iter()
    }
}

/// A fully resolved method.
#[derive(Debug, Clone)]
pub struct CompiledMethod {
    /// Method name
    pub name: String,
    /// Signature
    pub descriptor: MethodDescriptor,
    /// Encoded instructions
    pub code: Vec<u8>,
    /// Constants referenced by the code
    pub constants: ConstantPool,
    /// Deepest operand stack reached
    pub max_stack: u16,
    /// Local slots used, including receiver and parameters
    pub max_locals: u16,
}

impl CompiledMethod {
    /// Decodes the whole method into `(pc, op)` pairs.
    pub fn instructions(&self) -> Result<Vec<(usize, Op)>, DecodeError> {
        let mut out = Vec::new();
        let mut pc = 0;
        while pc < self.code.len() {
            let (op, len) = Op::decode(&self.code, pc)?;
            out.push((pc, op));
            pc += len;
        }
        Ok(out)
    }
}

impl fmt::Display for CompiledMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}{} stack={} locals={}",
            self.name, self.descriptor, self.max_stack, self.max_locals
        )?;
        match self.instructions() {
            Ok(instructions) => {
                for (pc, op) in instructions {
                    match op.branch_offset() {
                        Some(offset) => {
                            writeln!(f, "  {pc:5}: {op}  // -> {}", pc as i64 + i64::from(offset))?
                        }
                        None => writeln!(f, "  {pc:5}: {op}")?,
                    }
                }
            }
            Err(err) => writeln!(f, "  <{err}>")?,
        }
        for (index, constant) in self.constants.iter().enumerate() {
            writeln!(f, "  #{index} = {constant}")?;
        }
        Ok(())
    }
}

/// A field of a compiled class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Field name
    pub name: String,
    /// Field type
    pub ty: Ty,
    /// Whether the field is static
    pub is_static: bool,
}

/// A compiled class.
#[derive(Debug, Clone)]
pub struct CompiledClass {
    /// Class name
    pub name: String,
    /// Declared fields
    pub fields: Vec<FieldInfo>,
    /// Methods, including synthetic `<init>` and `<clinit>`
    pub methods: Vec<CompiledMethod>,
}

impl CompiledClass {
    /// Finds a method by name.
    pub fn method(&self, name: &str) -> Option<&CompiledMethod> {
        self.methods.iter().find(|method| method.name == name)
    }
}

/// The output of compiling a module.
#[derive(Debug, Clone, Default)]
pub struct CompiledModule {
    /// Compiled classes, in declaration order
    pub classes: Vec<CompiledClass>,
}

impl CompiledModule {
    /// Finds a class by name.
    pub fn class(&self, name: &str) -> Option<&CompiledClass> {
        self.classes.iter().find(|class| class.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(op: Op) {
        let mut bytes = Vec::new();
        op.encode(&mut bytes);
        assert_eq!(bytes.len(), op.encoded_len(), "{op}");
        assert_eq!(Op::decode(&bytes, 0), Ok((op, bytes.len())), "{op}");
    }

    #[test]
    fn test_encoding_is_reversible() {
        let ops = [
            Op::IConst(-300),
            Op::Load(StackKind::Num(NumKind::Long), 7),
            Op::Store(StackKind::Ref, 300),
            Op::Arith(ArithOp::Rem, NumKind::Double),
            Op::Bitwise(BitOp::UShr, IntKind::Long),
            Op::Convert(NumKind::Float, NumKind::Long),
            Op::If(Cond::ICmpLe, -12),
            Op::If(Cond::NonNull, 40),
            Op::GotoW(-70000),
            Op::Return(Some(StackKind::Ref)),
            Op::ArrayLoad(ElemKind::Prim(PrimitiveType::Short)),
            Op::ArrayStore(ElemKind::Prim(PrimitiveType::Boolean)),
            Op::NewArray(ElemKind::Ref),
            Op::CheckCast(TypeTag::Boxed(PrimitiveType::Int)),
            Op::BigBinary(BigOp::Shr),
            Op::BigToPrim(PrimitiveType::Byte),
            Op::Truthy,
        ];
        for op in ops {
            round_trip(op);
        }
    }

    #[test]
    fn test_jvm_opcode_numbers() {
        assert_eq!(Op::Arith(ArithOp::Add, NumKind::Int).opcode(), 0x60);
        assert_eq!(Op::Arith(ArithOp::Add, NumKind::Double).opcode(), 0x63);
        assert_eq!(Op::Load(StackKind::Ref, 0).opcode(), 0x19);
        assert_eq!(Op::Store(StackKind::Num(NumKind::Int), 0).opcode(), 0x36);
        assert_eq!(Op::ArrayStore(ElemKind::Prim(PrimitiveType::Int)).opcode(), 0x4F);
        assert_eq!(Op::Goto(0).opcode(), 0xA7);
        assert_eq!(Op::GotoW(0).opcode(), 0xC8);
        assert_eq!(Op::Return(None).opcode(), 0xB1);
    }

    #[test]
    fn test_branch_sizes() {
        assert_eq!(Op::Goto(0).encoded_len(), 3);
        assert_eq!(Op::If(Cond::Eq, 0).encoded_len(), 3);
        assert_eq!(Op::GotoW(0).encoded_len(), 5);
    }

    #[test]
    fn test_condition_negation() {
        for (cond, _, _) in CONDITIONS {
            assert_eq!(cond.negate().negate(), cond);
            assert_ne!(cond.negate(), cond);
        }
    }

    #[test]
    fn test_constant_pool_dedup() {
        let mut pool = ConstantPool::new();
        let a = pool.insert(Constant::String("x".into()), 10).unwrap();
        let b = pool.insert(Constant::Long(5), 10).unwrap();
        assert_eq!(pool.insert(Constant::String("x".into()), 10), Some(a));
        assert_eq!(pool.insert(Constant::Long(5), 10), Some(b));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_constant_pool_float_identity() {
        let mut pool = ConstantPool::new();
        let zero = pool.insert(Constant::Double(0.0), 10).unwrap();
        let neg_zero = pool.insert(Constant::Double(-0.0), 10).unwrap();
        assert_ne!(zero, neg_zero);
        let nan = pool.insert(Constant::Double(f64::NAN), 10).unwrap();
        assert_eq!(pool.insert(Constant::Double(f64::NAN), 10), Some(nan));
    }

    #[test]
    fn test_constant_pool_limit() {
        let mut pool = ConstantPool::new();
        assert!(pool.insert(Constant::Int(1), 1).is_some());
        assert_eq!(pool.insert(Constant::Int(2), 1), None);
        assert_eq!(pool.insert(Constant::Int(1), 1), Some(0));
    }

    #[test]
    fn test_descriptor_string() {
        let descriptor = MethodDescriptor {
            params: vec![Ty::INT, Ty::LONG],
            ret: Ty::Any,
            is_static: false,
        };
        assert_eq!(descriptor.to_string(), "(IJ)Ljava/lang/Object;");
        assert_eq!(descriptor.arg_slots(), 3);
    }
}
