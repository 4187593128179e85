// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Assignable places.
//!
//! Resolving a place pushes its locators (receiver, index or key) and
//! records how to load and store through them. Every read-modify-write
//! evaluates the locators exactly once:
//!
//! ```text
//! locators, dup locators, load, [dup value below], compute,
//! [dup value below], store
//! ```
//!
//! The value duplicate goes beneath the locators, so the instruction
//! depends on how many slots they occupy: `dup` for none, `dup_x1` for a
//! receiver, `dup_x2` for a container with an index or key.

use crate::ast::*;
use crate::compiler::bytecode::{ArithOp, BigOp, Constant, ElemKind, Op, TypeTag};
use crate::compiler::coercion::{self, Arith};
use crate::error::{CompileError, Result};
use crate::types::{NumKind, Ty};

use super::{slot_kind, Compiler, LocalSlot};

/// A resolved assignment target.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Place {
    /// A local variable
    Local(LocalSlot),
    /// An element of a native array; the element type
    ArrayElement(Ty),
    /// An element of a dynamic list
    ListElement,
    /// An entry of a dynamic map
    MapEntry,
    /// An instance field
    Field { index: u16, ty: Ty },
    /// A static field
    Static { index: u16, ty: Ty },
    /// The read-only `length` of an array, list or string
    Length(Ty),
}

impl Place {
    /// The type loads produce and stores expect.
    pub(crate) fn ty(&self) -> Ty {
        match self {
            Place::Local(slot) => slot.ty.clone(),
            Place::ArrayElement(ty) => ty.clone(),
            Place::ListElement | Place::MapEntry => Ty::Any,
            Place::Field { ty, .. } | Place::Static { ty, .. } => ty.clone(),
            Place::Length(_) => Ty::INT,
        }
    }

    /// Stack slots taken by the locators.
    pub(crate) fn width(&self) -> u8 {
        match self {
            Place::Local(_) | Place::Static { .. } => 0,
            Place::Field { .. } | Place::Length(_) => 1,
            Place::ArrayElement(_) | Place::ListElement | Place::MapEntry => 2,
        }
    }
}

fn strip_parens(mut expr: &Expression) -> &Expression {
    while let ExpressionKind::Paren(inner) = &expr.kind {
        expr = inner;
    }
    expr
}

impl Compiler<'_> {
    // ========================================================================
    // Resolution
    // ========================================================================

    /// Resolves `expr` as a place, emitting its locators.
    pub(super) fn locate(&mut self, expr: &Expression) -> Result<Place> {
        match &expr.kind {
            ExpressionKind::Paren(inner) => self.locate(inner),
            ExpressionKind::Identifier(name) => self
                .scopes
                .resolve(name)
                .cloned()
                .map(Place::Local)
                .ok_or_else(|| CompileError::unknown_identifier(expr, name)),
            ExpressionKind::Member(member) => self.locate_member(expr, member),
            ExpressionKind::Update(_) => Err(CompileError::invalid_lvalue(
                expr,
                "the result of an update expression is not assignable",
            )),
            ExpressionKind::Number(_)
            | ExpressionKind::BigInt(_)
            | ExpressionKind::String(_)
            | ExpressionKind::Boolean(_)
            | ExpressionKind::Null => Err(CompileError::invalid_lvalue(expr, "a literal is not assignable")),
            _ => Err(CompileError::invalid_lvalue(
                expr,
                format!("the result of a {} is not assignable", expr.node_kind()),
            )),
        }
    }

    /// `Class.field` when `Class` names a compiled class, not a local.
    pub(super) fn static_member<'e>(&self, member: &'e MemberExpression) -> Option<(&'e str, &'e str)> {
        match (&member.object.kind, &member.property) {
            (ExpressionKind::Identifier(class), MemberProperty::Identifier(name)) if self.is_class_name(class) => {
                Some((class.as_str(), name.as_str()))
            }
            _ => None,
        }
    }

    fn locate_member(&mut self, expr: &Expression, member: &MemberExpression) -> Result<Place> {
        if let Some((class, name)) = self.static_member(member) {
            let (index, ty) = self.field_constant(expr, class, name, true)?;
            return Ok(Place::Static { index, ty });
        }

        let object_ty = self.compile_expr(&member.object, None)?;
        match (object_ty, &member.property) {
            (ty @ (Ty::Array(_) | Ty::List | Ty::String), MemberProperty::Identifier(name)) if name == "length" => {
                Ok(Place::Length(ty))
            }
            (Ty::Array(element), MemberProperty::Computed(index)) => {
                self.compile_expr_as(index, &Ty::INT)?;
                Ok(Place::ArrayElement(*element))
            }
            (Ty::List, MemberProperty::Computed(index)) => {
                self.compile_expr_as(index, &Ty::INT)?;
                Ok(Place::ListElement)
            }
            (Ty::Map, property) => {
                self.compile_map_key(property)?;
                Ok(Place::MapEntry)
            }
            (Ty::Any, property) => {
                self.emitter.emit(Op::CheckCast(TypeTag::Map));
                self.compile_map_key(property)?;
                Ok(Place::MapEntry)
            }
            (Ty::Class(class), MemberProperty::Identifier(name)) => {
                let (index, ty) = self.field_constant(expr, &class, name, false)?;
                Ok(Place::Field { index, ty })
            }
            (ty, _) => Err(CompileError::type_error(expr, format!("cannot access a property of {ty}"))),
        }
    }

    fn compile_map_key(&mut self, property: &MemberProperty) -> Result<()> {
        match property {
            MemberProperty::Identifier(name) => self.emitter.push_string(name),
            MemberProperty::Computed(key) => self.compile_expr_as(key, &Ty::Any),
        }
    }

    /// The type of the place `expr` names, without emitting code.
    pub(super) fn place_type(&self, expr: &Expression) -> Result<Ty> {
        match &expr.kind {
            ExpressionKind::Paren(inner) => self.place_type(inner),
            ExpressionKind::Identifier(name) => self
                .scopes
                .resolve(name)
                .map(|slot| slot.ty.clone())
                .ok_or_else(|| CompileError::unknown_identifier(expr, name)),
            ExpressionKind::Member(member) => {
                if let Some((class, name)) = self.static_member(member) {
                    return self.field_type(expr, class, name, true);
                }
                match (self.infer_type(&member.object)?, &member.property) {
                    (Ty::Array(_) | Ty::List | Ty::String, MemberProperty::Identifier(name)) if name == "length" => {
                        Ok(Ty::INT)
                    }
                    (Ty::Array(element), MemberProperty::Computed(_)) => Ok(*element),
                    (Ty::List, MemberProperty::Computed(_)) | (Ty::Map | Ty::Any, _) => Ok(Ty::Any),
                    (Ty::Class(class), MemberProperty::Identifier(name)) => self.field_type(expr, &class, name, false),
                    (ty, _) => Err(CompileError::type_error(expr, format!("cannot access a property of {ty}"))),
                }
            }
            _ => Err(CompileError::invalid_lvalue(
                expr,
                format!("the result of a {} is not assignable", expr.node_kind()),
            )),
        }
    }

    fn field_type(&self, at: &Expression, class: &str, name: &str, is_static: bool) -> Result<Ty> {
        self.table
            .class(class)
            .and_then(|sig| sig.field(name))
            .filter(|field| field.is_static == is_static)
            .map(|field| field.ty.clone())
            .ok_or_else(|| CompileError::type_error(at, format!("{class} has no field '{name}'")))
    }

    /// Resolves a place that is about to be written.
    fn locate_for_write(&mut self, target: &Expression) -> Result<Place> {
        let place = self.locate(target)?;
        match &place {
            Place::Local(slot) if !slot.mutable => {
                let name = match &strip_parens(target).kind {
                    ExpressionKind::Identifier(name) => name.as_str(),
                    _ => "binding",
                };
                Err(CompileError::type_error(
                    target,
                    format!("cannot assign to '{name}' because it is a constant"),
                ))
            }
            Place::Length(_) => Err(CompileError::invalid_lvalue(target, "length is read-only")),
            _ => Ok(place),
        }
    }

    // ========================================================================
    // Loads and stores
    // ========================================================================

    /// Reads through the locators on the stack.
    pub(super) fn load_place(&mut self, place: &Place) {
        let op = match place {
            Place::Local(slot) => Op::Load(slot_kind(&slot.ty), slot.index),
            Place::ArrayElement(ty) => Op::ArrayLoad(ElemKind::of(ty)),
            Place::ListElement => Op::ListGet,
            Place::MapEntry => Op::MapGet,
            Place::Field { index, .. } => Op::GetField(*index),
            Place::Static { index, .. } => Op::GetStatic(*index),
            Place::Length(Ty::Array(_)) => Op::ArrayLength,
            Place::Length(Ty::List) => Op::ListSize,
            Place::Length(_) => Op::StrLength,
        };
        self.emitter.emit(op);
    }

    /// Writes the value on top of the stack through the locators below it.
    fn store_place(&mut self, place: &Place) -> Result<()> {
        match place {
            Place::Local(slot) => self.emitter.emit(Op::Store(slot_kind(&slot.ty), slot.index)),
            Place::ArrayElement(ty) => self.emitter.emit(Op::ArrayStore(ElemKind::of(ty))),
            Place::ListElement => {
                self.emitter.emit(Op::ListSet);
                self.emitter.emit(Op::Pop);
            }
            Place::MapEntry => {
                self.emitter.emit(Op::MapPut);
                self.emitter.emit(Op::Pop);
            }
            Place::Field { index, .. } => self.emitter.emit(Op::PutField(*index)),
            Place::Static { index, .. } => self.emitter.emit(Op::PutStatic(*index)),
            Place::Length(_) => return Err(CompileError::Internal("store to length".to_string())),
        }
        Ok(())
    }

    fn dup_locators(&mut self, place: &Place) {
        match place.width() {
            0 => {}
            1 => self.emitter.emit(Op::Dup),
            _ => self.emitter.emit(Op::Dup2),
        }
    }

    /// Copies the value on top of the stack beneath the locators.
    fn dup_value_below(&mut self, place: &Place) {
        self.emitter.emit(match place.width() {
            0 => Op::Dup,
            1 => Op::DupX1,
            _ => Op::DupX2,
        });
    }

    // ========================================================================
    // Update, assignment and delete
    // ========================================================================

    /// `++x`, `x++`, `--x`, `x--`. The result has the place's type.
    pub(super) fn compile_update(&mut self, update: &UpdateExpression) -> Result<Ty> {
        let target = &update.argument;
        let place = self.locate_for_write(target)?;
        let ty = place.ty();
        let arith = coercion::unary_arith(&ty)
            .ok_or_else(|| CompileError::type_error(target, format!("cannot increment or decrement {ty}")))?;
        let op_ty = arith.ty();

        self.dup_locators(&place);
        self.load_place(&place);
        if !update.prefix {
            self.dup_value_below(&place);
        }
        self.coerce(&ty, &op_ty, target)?;
        self.push_one(arith)?;
        let subtract = update.operator == UpdateOperator::Decrement;
        self.emitter.emit(match arith {
            Arith::Num(kind) => Op::Arith(if subtract { ArithOp::Sub } else { ArithOp::Add }, kind),
            Arith::BigInt => Op::BigBinary(if subtract { BigOp::Sub } else { BigOp::Add }),
        });
        self.coerce(&op_ty, &ty, target)?;
        if update.prefix {
            self.dup_value_below(&place);
        }
        self.store_place(&place)?;
        Ok(ty)
    }

    fn push_one(&mut self, arith: Arith) -> Result<()> {
        match arith {
            Arith::Num(NumKind::Int) => {
                self.emitter.emit(Op::IConst(1));
                Ok(())
            }
            Arith::Num(NumKind::Long) => self.emitter.push_long(1),
            Arith::Num(NumKind::Float) => self.emitter.ldc(Constant::Float(1.0)),
            Arith::Num(NumKind::Double) => self.emitter.ldc(Constant::Double(1.0)),
            Arith::BigInt => self.emitter.push_bigint(1.into()),
        }
    }

    /// `=` and compound assignment. The result is the stored value.
    pub(super) fn compile_assign(&mut self, expr: &Expression, assign: &AssignExpression) -> Result<Ty> {
        let place = self.locate_for_write(&assign.target)?;
        let ty = place.ty();
        match assign.operator.binary() {
            None => self.compile_expr_as(&assign.value, &ty)?,
            Some(op) => {
                let right = self.infer_type(&assign.value)?;
                let plan = self.plan_binary(expr, op, &ty, &right)?;
                self.dup_locators(&place);
                self.load_place(&place);
                let result = self.compile_binary_tail(expr, op, &plan, &ty, &assign.value)?;
                // Compound assignment narrows back implicitly.
                self.coerce(&result, &ty, expr)?;
            }
        }
        self.dup_value_below(&place);
        self.store_place(&place)?;
        Ok(ty)
    }

    /// `delete list[i]` or `delete map[key]`; true when something was removed.
    pub(super) fn compile_delete(&mut self, expr: &Expression, argument: &Expression) -> Result<Ty> {
        let target = strip_parens(argument);
        if !matches!(target.kind, ExpressionKind::Member(_)) {
            return Err(CompileError::invalid_lvalue(
                expr,
                "delete requires a list element or map entry",
            ));
        }
        match self.locate(target)? {
            Place::ListElement => self.emitter.emit(Op::ListDelete),
            Place::MapEntry => self.emitter.emit(Op::MapDelete),
            Place::ArrayElement(_) => {
                return Err(CompileError::invalid_lvalue(
                    expr,
                    "elements of a fixed-size array cannot be deleted",
                ));
            }
            _ => {
                return Err(CompileError::invalid_lvalue(
                    expr,
                    "delete requires a list element or map entry",
                ));
            }
        }
        Ok(Ty::BOOLEAN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimitiveType;

    #[test]
    fn test_locator_widths() {
        let local = Place::Local(LocalSlot {
            index: 0,
            ty: Ty::INT,
            mutable: true,
        });
        assert_eq!(local.width(), 0);
        assert_eq!(Place::Static { index: 1, ty: Ty::INT }.width(), 0);
        assert_eq!(Place::Field { index: 1, ty: Ty::INT }.width(), 1);
        assert_eq!(Place::ArrayElement(Ty::BYTE).width(), 2);
        assert_eq!(Place::ListElement.width(), 2);
        assert_eq!(Place::MapEntry.width(), 2);
    }

    #[test]
    fn test_place_types() {
        assert_eq!(Place::ListElement.ty(), Ty::Any);
        assert_eq!(Place::Length(Ty::String).ty(), Ty::INT);
        assert_eq!(
            Place::ArrayElement(Ty::Primitive(PrimitiveType::Short)).ty(),
            Ty::SHORT
        );
    }
}
