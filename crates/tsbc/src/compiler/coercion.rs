// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Type coercion.
//!
//! Two halves live here:
//!
//! - value-level conversions ([`integer_to_primitive`],
//!   [`float_to_primitive`]) used to fold literals at compile time and by the
//!   runner when it executes `big_to_prim`, so both agree bit for bit;
//! - conversion planning ([`plan`]), which turns a `(from, to)` type pair
//!   into the steps the code generator lowers to instructions.
//!
//! Narrowing integral conversions keep the low-order bits of the target
//! width, two's complement. Floating to integral conversions saturate and
//! map NaN to zero. Every function is pure.

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use super::bytecode::TypeTag;
use super::literals::NumericLiteral;
use crate::types::{NumKind, PrimitiveType, Ty};

/// A primitive constant in its stack representation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    /// boolean, byte, short or int
    Int(i32),
    /// long
    Long(i64),
    /// float
    Float(f32),
    /// double
    Double(f64),
}

/// The low 64 bits of `value`, two's complement.
pub fn low_bits(value: &BigInt) -> i64 {
    let bytes = value.to_signed_bytes_le();
    let fill = if value.is_negative() { 0xFF } else { 0x00 };
    let mut buf = [fill; 8];
    for (dst, src) in buf.iter_mut().zip(bytes.iter()) {
        *dst = *src;
    }
    i64::from_le_bytes(buf)
}

/// Converts an arbitrary precision integer to a primitive.
pub fn integer_to_primitive(value: &BigInt, target: PrimitiveType) -> Scalar {
    let low = low_bits(value);
    match target {
        PrimitiveType::Boolean => Scalar::Int(i32::from(!value.is_zero())),
        PrimitiveType::Byte => Scalar::Int(i32::from(low as i8)),
        PrimitiveType::Short => Scalar::Int(i32::from(low as i16)),
        PrimitiveType::Int => Scalar::Int(low as i32),
        PrimitiveType::Long => Scalar::Long(low),
        PrimitiveType::Float => Scalar::Float(value.to_f32().unwrap_or(f32::NAN)),
        PrimitiveType::Double => Scalar::Double(value.to_f64().unwrap_or(f64::NAN)),
    }
}

/// Converts a double to a primitive.
pub fn float_to_primitive(value: f64, target: PrimitiveType) -> Scalar {
    match target {
        PrimitiveType::Boolean => Scalar::Int(i32::from(value != 0.0 && !value.is_nan())),
        PrimitiveType::Byte => Scalar::Int(i32::from(value as i32 as i8)),
        PrimitiveType::Short => Scalar::Int(i32::from(value as i32 as i16)),
        PrimitiveType::Int => Scalar::Int(value as i32),
        PrimitiveType::Long => Scalar::Long(value as i64),
        PrimitiveType::Float => Scalar::Float(value as f32),
        PrimitiveType::Double => Scalar::Double(value),
    }
}

/// Converts a parsed literal to a primitive.
pub fn literal_to_primitive(literal: &NumericLiteral, target: PrimitiveType) -> Scalar {
    match literal {
        NumericLiteral::Integer(value) => integer_to_primitive(value, target),
        NumericLiteral::Float(value) => float_to_primitive(*value, target),
    }
}

/// The type a literal has when nothing constrains it.
///
/// Integers are `int` when they fit in 32 bits, `long` when they fit in 64,
/// `double` otherwise. Fractions are `double`.
pub fn natural_literal_type(literal: &NumericLiteral) -> PrimitiveType {
    match literal {
        NumericLiteral::Integer(value) if value.to_i32().is_some() => PrimitiveType::Int,
        NumericLiteral::Integer(value) if value.to_i64().is_some() => PrimitiveType::Long,
        _ => PrimitiveType::Double,
    }
}

/// How a value of some kind is tested for truthiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truthiness {
    /// Non-zero
    Num(NumKind),
    /// Non-zero bigint
    BigInt,
    /// Non-empty string
    String,
    /// Non-null reference
    Reference,
    /// Opaque reference, decided by its runtime kind
    Dynamic,
}

/// One step of a conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    /// Primitive conversion between stack kinds (`i2l`, `d2i`, ...)
    Convert(NumKind, NumKind),
    /// Narrow an int to byte or short (`i2b`, `i2s`)
    Narrow(PrimitiveType),
    /// Box a primitive
    Box(PrimitiveType),
    /// Unbox a boxed primitive; null faults at run time
    Unbox(PrimitiveType),
    /// Check an opaque reference against a type
    CheckCast(TypeTag),
    /// Truncate or convert a bigint to a primitive
    BigToPrimitive(PrimitiveType),
    /// Widen a long to a bigint
    LongToBig,
    /// Produce `1` for truthy and `0` for falsy values
    Truthiness(Truthiness),
}

/// The runtime type check for a reference type, if one is needed.
pub fn type_tag(ty: &Ty) -> Option<TypeTag> {
    match ty {
        Ty::Boxed(p) | Ty::Primitive(p) => Some(TypeTag::Boxed(*p)),
        Ty::BigInt => Some(TypeTag::BigInt),
        Ty::String => Some(TypeTag::String),
        Ty::Array(_) => Some(TypeTag::Array),
        Ty::List => Some(TypeTag::List),
        Ty::Map => Some(TypeTag::Map),
        Ty::Class(_) => Some(TypeTag::Object),
        Ty::Any | Ty::Null | Ty::Void => None,
    }
}

fn primitive_to_primitive(
    from: PrimitiveType,
    to: PrimitiveType,
) -> Result<Vec<Conversion>, String> {
    if from == to {
        return Ok(Vec::new());
    }
    if to == PrimitiveType::Boolean {
        return Ok(vec![Conversion::Truthiness(Truthiness::Num(from.num_kind()))]);
    }
    if from == PrimitiveType::Boolean {
        return Err(format!("cannot convert boolean to {}", to.name()));
    }

    let mut steps = Vec::new();
    let (from_kind, to_kind) = (from.num_kind(), to.num_kind());
    if from_kind != to_kind {
        steps.push(Conversion::Convert(from_kind, to_kind));
    }
    // After a conversion into the int category the value spans 32 bits.
    let width = if from_kind == NumKind::Int { from.bit_width() } else { 32 };
    match to {
        PrimitiveType::Byte if width > 8 => steps.push(Conversion::Narrow(PrimitiveType::Byte)),
        PrimitiveType::Short if width > 16 => steps.push(Conversion::Narrow(PrimitiveType::Short)),
        _ => {}
    }
    Ok(steps)
}

fn from_any(to: &Ty) -> Result<Vec<Conversion>, String> {
    match to {
        Ty::Primitive(PrimitiveType::Boolean) => Ok(vec![Conversion::Truthiness(Truthiness::Dynamic)]),
        Ty::Primitive(p) => Ok(vec![
            Conversion::CheckCast(TypeTag::Boxed(*p)),
            Conversion::Unbox(*p),
        ]),
        Ty::Void => Err("cannot convert Object to void".to_string()),
        other => Ok(type_tag(other).map(Conversion::CheckCast).into_iter().collect()),
    }
}

fn to_bigint(from: PrimitiveType) -> Result<Vec<Conversion>, String> {
    match from.num_kind() {
        NumKind::Long => Ok(vec![Conversion::LongToBig]),
        NumKind::Int if from != PrimitiveType::Boolean => Ok(vec![
            Conversion::Convert(NumKind::Int, NumKind::Long),
            Conversion::LongToBig,
        ]),
        _ => Err(format!("cannot convert {} to bigint", from.name())),
    }
}

/// Plans the conversion of a value of type `from` into type `to`.
///
/// The error string explains why the pair is not convertible; the caller
/// attaches the source location.
pub fn plan(from: &Ty, to: &Ty) -> Result<Vec<Conversion>, String> {
    use Conversion::*;

    if from == to {
        return Ok(Vec::new());
    }
    match (from, to) {
        (Ty::Void, _) => Err("a void expression has no value".to_string()),
        (_, Ty::Void) => Err(format!("cannot convert {from} to void")),
        (Ty::Null, Ty::Primitive(p)) => Err(format!("null cannot be converted to {}", p.name())),
        (Ty::Null, _) => Ok(Vec::new()),
        (Ty::Primitive(p), Ty::Any) => Ok(vec![Box(*p)]),
        (_, Ty::Any) => Ok(Vec::new()),
        (Ty::Any, to) => from_any(to),
        (Ty::Primitive(p), Ty::Primitive(q)) => primitive_to_primitive(*p, *q),
        (Ty::Primitive(p), Ty::Boxed(q)) => {
            let mut steps = primitive_to_primitive(*p, *q)?;
            steps.push(Box(*q));
            Ok(steps)
        }
        (Ty::Boxed(p), Ty::Primitive(q)) => {
            let mut steps = vec![Unbox(*p)];
            steps.extend(primitive_to_primitive(*p, *q)?);
            Ok(steps)
        }
        (Ty::Boxed(p), Ty::Boxed(q)) => {
            let mut steps = vec![Unbox(*p)];
            steps.extend(primitive_to_primitive(*p, *q)?);
            steps.push(Box(*q));
            Ok(steps)
        }
        (Ty::BigInt, Ty::Primitive(PrimitiveType::Boolean)) => {
            Ok(vec![Truthiness(self::Truthiness::BigInt)])
        }
        (Ty::BigInt, Ty::Primitive(q)) => Ok(vec![BigToPrimitive(*q)]),
        (Ty::BigInt, Ty::Boxed(q)) => {
            let mut steps = plan(from, &Ty::Primitive(*q))?;
            steps.push(Box(*q));
            Ok(steps)
        }
        (Ty::Primitive(p), Ty::BigInt) => to_bigint(*p),
        (Ty::Boxed(p), Ty::BigInt) => {
            let mut steps = vec![Unbox(*p)];
            steps.extend(to_bigint(*p)?);
            Ok(steps)
        }
        (Ty::String, Ty::Primitive(PrimitiveType::Boolean)) => {
            Ok(vec![Truthiness(self::Truthiness::String)])
        }
        (from, Ty::Primitive(PrimitiveType::Boolean)) if from.is_reference() => {
            Ok(vec![Truthiness(self::Truthiness::Reference)])
        }
        _ => Err(format!("cannot convert {from} to {to}")),
    }
}

/// The arithmetic a numeric operation runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arith {
    /// Machine arithmetic of a stack kind
    Num(NumKind),
    /// Arbitrary precision arithmetic
    BigInt,
}

impl Arith {
    /// The type of the operation's operands and result.
    pub fn ty(self) -> Ty {
        match self {
            Arith::Num(kind) => Ty::Primitive(kind.primitive()),
            Arith::BigInt => Ty::BigInt,
        }
    }
}

/// The arithmetic a unary numeric operator applies to an operand of `ty`.
///
/// Sub-int types promote to int. Opaque values compute as int.
pub fn unary_arith(ty: &Ty) -> Option<Arith> {
    match ty {
        Ty::BigInt => Some(Arith::BigInt),
        Ty::Any => Some(Arith::Num(NumKind::Int)),
        _ => ty
            .unboxed()
            .filter(|p| p.is_numeric())
            .map(|p| Arith::Num(p.num_kind())),
    }
}

/// Binary numeric promotion.
///
/// An opaque operand takes the other operand's kind. Mixing bigint with any
/// other numeric type is an error.
pub fn binary_arith(left: &Ty, right: &Ty) -> Result<Arith, String> {
    let l = unary_arith(left).ok_or_else(|| format!("{left} is not numeric"))?;
    let r = unary_arith(right).ok_or_else(|| format!("{right} is not numeric"))?;
    match (left, right, l, r) {
        (Ty::Any, _, _, r) => Ok(r),
        (_, Ty::Any, l, _) => Ok(l),
        (_, _, Arith::BigInt, Arith::BigInt) => Ok(Arith::BigInt),
        (_, _, Arith::Num(a), Arith::Num(b)) => Ok(Arith::Num(a.promote(b))),
        _ => Err(format!("cannot mix bigint and other types ({left} and {right})")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn pow2(bits: u32) -> BigInt {
        BigInt::from(1) << bits
    }

    #[test]
    fn test_narrowing_keeps_low_bits() {
        assert_eq!(integer_to_primitive(&pow2(32), PrimitiveType::Int), Scalar::Int(0));
        assert_eq!(
            integer_to_primitive(&pow2(31), PrimitiveType::Int),
            Scalar::Int(i32::MIN)
        );
        assert_eq!(
            integer_to_primitive(&pow2(63), PrimitiveType::Long),
            Scalar::Long(i64::MIN)
        );
        assert_eq!(integer_to_primitive(&BigInt::from(255), PrimitiveType::Byte), Scalar::Int(-1));
        assert_eq!(integer_to_primitive(&BigInt::from(128), PrimitiveType::Byte), Scalar::Int(-128));
        assert_eq!(
            integer_to_primitive(&BigInt::from(65535 + 2), PrimitiveType::Short),
            Scalar::Int(1)
        );
    }

    #[test]
    fn test_narrowing_matches_modular_arithmetic() {
        let samples = [
            BigInt::from(-1),
            BigInt::from(-129),
            pow2(70) + BigInt::from(5),
            -(pow2(64) + BigInt::from(3)),
            BigInt::from(i64::MAX) * BigInt::from(3),
        ];
        for value in &samples {
            for (target, bits) in [
                (PrimitiveType::Byte, 8u32),
                (PrimitiveType::Short, 16),
                (PrimitiveType::Int, 32),
                (PrimitiveType::Long, 64),
            ] {
                let modulus = pow2(bits);
                let mut expected = value % &modulus;
                if expected.is_negative() {
                    expected += &modulus;
                }
                if expected >= pow2(bits - 1) {
                    expected -= &modulus;
                }
                let expected = expected.to_i64().unwrap();
                let actual = match integer_to_primitive(value, target) {
                    Scalar::Int(v) => i64::from(v),
                    Scalar::Long(v) => v,
                    other => panic!("unexpected {other:?}"),
                };
                assert_eq!(actual, expected, "{value} as {target:?}");
            }
        }
    }

    #[test]
    fn test_boolean_conversions() {
        assert_eq!(integer_to_primitive(&BigInt::from(0), PrimitiveType::Boolean), Scalar::Int(0));
        assert_eq!(integer_to_primitive(&pow2(64), PrimitiveType::Boolean), Scalar::Int(1));
        assert_eq!(float_to_primitive(f64::NAN, PrimitiveType::Boolean), Scalar::Int(0));
        assert_eq!(float_to_primitive(-0.5, PrimitiveType::Boolean), Scalar::Int(1));
    }

    #[test]
    fn test_float_to_integral_saturates() {
        assert_eq!(float_to_primitive(1e20, PrimitiveType::Int), Scalar::Int(i32::MAX));
        assert_eq!(float_to_primitive(f64::NAN, PrimitiveType::Long), Scalar::Long(0));
        assert_eq!(float_to_primitive(-3.9, PrimitiveType::Int), Scalar::Int(-3));
        assert_eq!(float_to_primitive(300.0, PrimitiveType::Byte), Scalar::Int(44));
    }

    #[test]
    fn test_natural_literal_types() {
        let int = NumericLiteral::Integer(BigInt::from(7));
        let long = NumericLiteral::Integer(pow2(40));
        let huge = NumericLiteral::Integer(pow2(80));
        assert_eq!(natural_literal_type(&int), PrimitiveType::Int);
        assert_eq!(natural_literal_type(&long), PrimitiveType::Long);
        assert_eq!(natural_literal_type(&huge), PrimitiveType::Double);
        assert_eq!(natural_literal_type(&NumericLiteral::Float(0.5)), PrimitiveType::Double);
    }

    #[test]
    fn test_plan_widening_and_narrowing() {
        assert_eq!(plan(&Ty::INT, &Ty::LONG).unwrap(), vec![Conversion::Convert(NumKind::Int, NumKind::Long)]);
        assert_eq!(plan(&Ty::BYTE, &Ty::INT).unwrap(), vec![]);
        assert_eq!(plan(&Ty::BYTE, &Ty::SHORT).unwrap(), vec![]);
        assert_eq!(
            plan(&Ty::SHORT, &Ty::BYTE).unwrap(),
            vec![Conversion::Narrow(PrimitiveType::Byte)]
        );
        assert_eq!(
            plan(&Ty::DOUBLE, &Ty::BYTE).unwrap(),
            vec![
                Conversion::Convert(NumKind::Double, NumKind::Int),
                Conversion::Narrow(PrimitiveType::Byte)
            ]
        );
    }

    #[test]
    fn test_plan_boxing() {
        let integer = Ty::Boxed(PrimitiveType::Int);
        assert_eq!(plan(&Ty::INT, &integer).unwrap(), vec![Conversion::Box(PrimitiveType::Int)]);
        assert_eq!(
            plan(&integer, &Ty::LONG).unwrap(),
            vec![
                Conversion::Unbox(PrimitiveType::Int),
                Conversion::Convert(NumKind::Int, NumKind::Long)
            ]
        );
        assert_eq!(
            plan(&Ty::Any, &Ty::INT).unwrap(),
            vec![
                Conversion::CheckCast(TypeTag::Boxed(PrimitiveType::Int)),
                Conversion::Unbox(PrimitiveType::Int)
            ]
        );
        assert_eq!(plan(&Ty::LONG, &Ty::Any).unwrap(), vec![Conversion::Box(PrimitiveType::Long)]);
    }

    #[test]
    fn test_plan_opaque_to_boolean_is_dynamic() {
        assert_eq!(
            plan(&Ty::Any, &Ty::BOOLEAN).unwrap(),
            vec![Conversion::Truthiness(Truthiness::Dynamic)]
        );
        assert_eq!(
            plan(&Ty::Boxed(PrimitiveType::Int), &Ty::BOOLEAN).unwrap(),
            vec![
                Conversion::Unbox(PrimitiveType::Int),
                Conversion::Truthiness(Truthiness::Num(NumKind::Int))
            ]
        );
    }

    #[test]
    fn test_plan_bigint() {
        assert_eq!(
            plan(&Ty::BigInt, &Ty::LONG).unwrap(),
            vec![Conversion::BigToPrimitive(PrimitiveType::Long)]
        );
        assert_eq!(
            plan(&Ty::BigInt, &Ty::BOOLEAN).unwrap(),
            vec![Conversion::Truthiness(Truthiness::BigInt)]
        );
        assert_eq!(
            plan(&Ty::INT, &Ty::BigInt).unwrap(),
            vec![Conversion::Convert(NumKind::Int, NumKind::Long), Conversion::LongToBig]
        );
        assert!(plan(&Ty::DOUBLE, &Ty::BigInt).is_err());
    }

    #[test]
    fn test_plan_rejections() {
        assert!(plan(&Ty::BOOLEAN, &Ty::INT).is_err());
        assert!(plan(&Ty::Null, &Ty::INT).is_err());
        assert!(plan(&Ty::String, &Ty::INT).is_err());
        assert!(plan(&Ty::Void, &Ty::Any).is_err());
        assert_eq!(plan(&Ty::Null, &Ty::String).unwrap(), vec![]);
    }

    #[test]
    fn test_arith_promotion() {
        assert_eq!(binary_arith(&Ty::BYTE, &Ty::SHORT), Ok(Arith::Num(NumKind::Int)));
        assert_eq!(binary_arith(&Ty::INT, &Ty::DOUBLE), Ok(Arith::Num(NumKind::Double)));
        assert_eq!(
            binary_arith(&Ty::Boxed(PrimitiveType::Long), &Ty::INT),
            Ok(Arith::Num(NumKind::Long))
        );
        assert_eq!(binary_arith(&Ty::Any, &Ty::FLOAT), Ok(Arith::Num(NumKind::Float)));
        assert_eq!(binary_arith(&Ty::BigInt, &Ty::BigInt), Ok(Arith::BigInt));
        assert!(binary_arith(&Ty::BigInt, &Ty::INT).is_err());
        assert!(binary_arith(&Ty::BOOLEAN, &Ty::INT).is_err());
    }
}
