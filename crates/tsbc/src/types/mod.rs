// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static types of the source language, as seen by the code generator.

use std::fmt;

/// Primitive value types of the target machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    /// `boolean`
    Boolean,
    /// 8-bit signed integer
    Byte,
    /// 16-bit signed integer
    Short,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    Long,
    /// 32-bit IEEE float
    Float,
    /// 64-bit IEEE float
    Double,
}

/// The computational category of a numeric value on the operand stack.
///
/// Booleans, bytes and shorts are all carried as `Int`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumKind {
    /// 32-bit integer arithmetic
    Int,
    /// 64-bit integer arithmetic
    Long,
    /// 32-bit float arithmetic
    Float,
    /// 64-bit float arithmetic
    Double,
}

/// What a local slot or return holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackKind {
    /// A numeric or boolean primitive
    Num(NumKind),
    /// A reference (possibly null)
    Ref,
}

impl PrimitiveType {
    /// All primitive types, narrowest integral first.
    pub const ALL: [PrimitiveType; 7] = [
        PrimitiveType::Boolean,
        PrimitiveType::Byte,
        PrimitiveType::Short,
        PrimitiveType::Int,
        PrimitiveType::Long,
        PrimitiveType::Float,
        PrimitiveType::Double,
    ];

    /// Returns true for byte, short, int and long.
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            PrimitiveType::Byte | PrimitiveType::Short | PrimitiveType::Int | PrimitiveType::Long
        )
    }

    /// Returns true for float and double.
    pub fn is_floating(self) -> bool {
        matches!(self, PrimitiveType::Float | PrimitiveType::Double)
    }

    /// Returns true for every primitive except boolean.
    pub fn is_numeric(self) -> bool {
        self != PrimitiveType::Boolean
    }

    /// Storage width in bits.
    pub fn bit_width(self) -> u32 {
        match self {
            PrimitiveType::Boolean => 1,
            PrimitiveType::Byte => 8,
            PrimitiveType::Short => 16,
            PrimitiveType::Int | PrimitiveType::Float => 32,
            PrimitiveType::Long | PrimitiveType::Double => 64,
        }
    }

    /// The stack category values of this type compute in.
    pub fn num_kind(self) -> NumKind {
        match self {
            PrimitiveType::Boolean
            | PrimitiveType::Byte
            | PrimitiveType::Short
            | PrimitiveType::Int => NumKind::Int,
            PrimitiveType::Long => NumKind::Long,
            PrimitiveType::Float => NumKind::Float,
            PrimitiveType::Double => NumKind::Double,
        }
    }

    /// JVM descriptor character.
    pub fn descriptor(self) -> char {
        match self {
            PrimitiveType::Boolean => 'Z',
            PrimitiveType::Byte => 'B',
            PrimitiveType::Short => 'S',
            PrimitiveType::Int => 'I',
            PrimitiveType::Long => 'J',
            PrimitiveType::Float => 'F',
            PrimitiveType::Double => 'D',
        }
    }

    /// Source name of the primitive.
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Byte => "byte",
            PrimitiveType::Short => "short",
            PrimitiveType::Int => "int",
            PrimitiveType::Long => "long",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
        }
    }

    /// Name of the boxed form.
    pub fn boxed_name(self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "Boolean",
            PrimitiveType::Byte => "Byte",
            PrimitiveType::Short => "Short",
            PrimitiveType::Int => "Integer",
            PrimitiveType::Long => "Long",
            PrimitiveType::Float => "Float",
            PrimitiveType::Double => "Double",
        }
    }

    /// Encoding used in instruction operands.
    pub fn code(self) -> u8 {
        match self {
            PrimitiveType::Boolean => 4,
            PrimitiveType::Byte => 8,
            PrimitiveType::Short => 9,
            PrimitiveType::Int => 10,
            PrimitiveType::Long => 11,
            PrimitiveType::Float => 6,
            PrimitiveType::Double => 7,
        }
    }

    /// Inverse of [`PrimitiveType::code`].
    pub fn from_code(code: u8) -> Option<Self> {
        PrimitiveType::ALL.into_iter().find(|p| p.code() == code)
    }
}

impl NumKind {
    /// The primitive type that represents this kind.
    pub fn primitive(self) -> PrimitiveType {
        match self {
            NumKind::Int => PrimitiveType::Int,
            NumKind::Long => PrimitiveType::Long,
            NumKind::Float => PrimitiveType::Float,
            NumKind::Double => PrimitiveType::Double,
        }
    }

    /// Index in JVM opcode families (`iadd`, `ladd`, `fadd`, `dadd`).
    pub fn index(self) -> u8 {
        match self {
            NumKind::Int => 0,
            NumKind::Long => 1,
            NumKind::Float => 2,
            NumKind::Double => 3,
        }
    }

    /// Inverse of [`NumKind::index`].
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(NumKind::Int),
            1 => Some(NumKind::Long),
            2 => Some(NumKind::Float),
            3 => Some(NumKind::Double),
            _ => None,
        }
    }

    /// Returns true for int and long.
    pub fn is_integral(self) -> bool {
        matches!(self, NumKind::Int | NumKind::Long)
    }

    /// Rank in binary numeric promotion.
    fn rank(self) -> u8 {
        self.index()
    }

    /// The wider of two kinds.
    pub fn promote(self, other: NumKind) -> NumKind {
        if self.rank() >= other.rank() { self } else { other }
    }
}

/// A static type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    /// No value
    Void,
    /// A primitive
    Primitive(PrimitiveType),
    /// A boxed primitive (nullable reference)
    Boxed(PrimitiveType),
    /// Arbitrary precision integer
    BigInt,
    /// String
    String,
    /// Native fixed-size array
    Array(Box<Ty>),
    /// Growable list of references
    List,
    /// Insertion-ordered map
    Map,
    /// Instance of a compiled class
    Class(String),
    /// Opaque reference (`any`, `Object`)
    Any,
    /// The type of the `null` literal
    Null,
}

impl Ty {
    /// `boolean`
    pub const BOOLEAN: Ty = Ty::Primitive(PrimitiveType::Boolean);
    /// `byte`
    pub const BYTE: Ty = Ty::Primitive(PrimitiveType::Byte);
    /// `short`
    pub const SHORT: Ty = Ty::Primitive(PrimitiveType::Short);
    /// `int`
    pub const INT: Ty = Ty::Primitive(PrimitiveType::Int);
    /// `long`
    pub const LONG: Ty = Ty::Primitive(PrimitiveType::Long);
    /// `float`
    pub const FLOAT: Ty = Ty::Primitive(PrimitiveType::Float);
    /// `double`
    pub const DOUBLE: Ty = Ty::Primitive(PrimitiveType::Double);

    /// Parses a type annotation.
    ///
    /// Returns `None` for names that are not built in; callers resolve those
    /// against the classes being compiled.
    pub fn from_annotation(text: &str) -> Option<Ty> {
        let text = text.trim();
        if let Some(element) = text.strip_suffix("[]") {
            return Ty::from_annotation(element).map(|ty| Ty::Array(Box::new(ty)));
        }
        if let Some(element) = text
            .strip_prefix("Array<")
            .and_then(|rest| rest.strip_suffix('>'))
        {
            return Ty::from_annotation(element).map(|ty| Ty::Array(Box::new(ty)));
        }
        let ty = match text {
            "void" => Ty::Void,
            "boolean" => Ty::BOOLEAN,
            "byte" => Ty::BYTE,
            "short" => Ty::SHORT,
            "int" => Ty::INT,
            "long" => Ty::LONG,
            "float" => Ty::FLOAT,
            "double" | "number" => Ty::DOUBLE,
            "Boolean" => Ty::Boxed(PrimitiveType::Boolean),
            "Byte" => Ty::Boxed(PrimitiveType::Byte),
            "Short" => Ty::Boxed(PrimitiveType::Short),
            "Integer" => Ty::Boxed(PrimitiveType::Int),
            "Long" => Ty::Boxed(PrimitiveType::Long),
            "Float" => Ty::Boxed(PrimitiveType::Float),
            "Double" | "Number" => Ty::Boxed(PrimitiveType::Double),
            "bigint" | "BigInt" | "BigInteger" => Ty::BigInt,
            "string" | "String" => Ty::String,
            "ArrayList" | "List" => Ty::List,
            "LinkedHashMap" | "Map" | "Record" | "object" => Ty::Map,
            "any" | "unknown" | "Object" => Ty::Any,
            _ => return None,
        };
        Some(ty)
    }

    /// The primitive a value of this type computes as, if any.
    pub fn unboxed(&self) -> Option<PrimitiveType> {
        match self {
            Ty::Primitive(p) | Ty::Boxed(p) => Some(*p),
            _ => None,
        }
    }

    /// Returns true for primitive types.
    pub fn is_primitive(&self) -> bool {
        matches!(self, Ty::Primitive(_))
    }

    /// Returns true for types whose values are references.
    pub fn is_reference(&self) -> bool {
        !matches!(self, Ty::Primitive(_) | Ty::Void)
    }

    /// What a slot holding this type contains.
    pub fn stack_kind(&self) -> Option<StackKind> {
        match self {
            Ty::Void => None,
            Ty::Primitive(p) => Some(StackKind::Num(p.num_kind())),
            _ => Some(StackKind::Ref),
        }
    }

    /// The `typeof` tag when it is known statically.
    pub fn typeof_tag(&self) -> Option<&'static str> {
        match self {
            Ty::Primitive(PrimitiveType::Boolean) | Ty::Boxed(PrimitiveType::Boolean) => {
                Some("boolean")
            }
            Ty::Primitive(_) | Ty::Boxed(_) => Some("number"),
            Ty::BigInt => Some("bigint"),
            Ty::String => Some("string"),
            Ty::Array(_) | Ty::List | Ty::Map | Ty::Class(_) | Ty::Null => Some("object"),
            Ty::Void => Some("undefined"),
            Ty::Any => None,
        }
    }

    /// JVM field descriptor.
    pub fn descriptor(&self) -> String {
        match self {
            Ty::Void => "V".to_string(),
            Ty::Primitive(p) => p.descriptor().to_string(),
            Ty::Boxed(p) => format!("Ljava/lang/{};", p.boxed_name()),
            Ty::BigInt => "Ljava/math/BigInteger;".to_string(),
            Ty::String => "Ljava/lang/String;".to_string(),
            Ty::Array(element) => format!("[{}", element.descriptor()),
            Ty::List => "Ljava/util/ArrayList;".to_string(),
            Ty::Map => "Ljava/util/LinkedHashMap;".to_string(),
            Ty::Class(name) => format!("L{name};"),
            Ty::Any | Ty::Null => "Ljava/lang/Object;".to_string(),
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Void => f.write_str("void"),
            Ty::Primitive(p) => f.write_str(p.name()),
            Ty::Boxed(p) => f.write_str(p.boxed_name()),
            Ty::BigInt => f.write_str("bigint"),
            Ty::String => f.write_str("string"),
            Ty::Array(element) => write!(f, "{element}[]"),
            Ty::List => f.write_str("ArrayList"),
            Ty::Map => f.write_str("LinkedHashMap"),
            Ty::Class(name) => f.write_str(name),
            Ty::Any => f.write_str("Object"),
            Ty::Null => f.write_str("null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotations() {
        assert_eq!(Ty::from_annotation("int"), Some(Ty::INT));
        assert_eq!(Ty::from_annotation("Integer"), Some(Ty::Boxed(PrimitiveType::Int)));
        assert_eq!(
            Ty::from_annotation("byte[]"),
            Some(Ty::Array(Box::new(Ty::BYTE)))
        );
        assert_eq!(
            Ty::from_annotation("Array<string>"),
            Some(Ty::Array(Box::new(Ty::String)))
        );
        assert_eq!(Ty::from_annotation("Point"), None);
    }

    #[test]
    fn test_descriptors() {
        assert_eq!(Ty::LONG.descriptor(), "J");
        assert_eq!(Ty::Array(Box::new(Ty::INT)).descriptor(), "[I");
        assert_eq!(Ty::Boxed(PrimitiveType::Int).descriptor(), "Ljava/lang/Integer;");
        assert_eq!(Ty::Class("Point".into()).descriptor(), "LPoint;");
    }

    #[test]
    fn test_promotion() {
        assert_eq!(NumKind::Int.promote(NumKind::Long), NumKind::Long);
        assert_eq!(NumKind::Double.promote(NumKind::Float), NumKind::Double);
        assert_eq!(NumKind::Int.promote(NumKind::Int), NumKind::Int);
    }

    #[test]
    fn test_typeof_tags() {
        assert_eq!(Ty::BOOLEAN.typeof_tag(), Some("boolean"));
        assert_eq!(Ty::Boxed(PrimitiveType::Long).typeof_tag(), Some("number"));
        assert_eq!(Ty::Map.typeof_tag(), Some("object"));
        assert_eq!(Ty::Any.typeof_tag(), None);
    }

    #[test]
    fn test_primitive_codes_round_trip() {
        for p in PrimitiveType::ALL {
            assert_eq!(PrimitiveType::from_code(p.code()), Some(p));
        }
    }
}
