// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Expression compilation.
//!
//! [`Compiler::compile_expr`] leaves exactly one value on the stack (none
//! for a void call) and returns its static type. [`Compiler::infer_type`]
//! computes the same type without emitting anything; operators use it to
//! pick an arithmetic kind before compiling their operands.

use num_bigint::BigInt;

use crate::ast::*;
use crate::compiler::bytecode::{
    ArithOp, BigOp, BitOp, Compare, Cond, ElemKind, IntKind, MethodDescriptor, Op,
};
use crate::compiler::coercion::{self, Arith};
use crate::compiler::emitter::Label;
use crate::compiler::literals::{self, NumericLiteral};
use crate::error::{CompileError, Result};
use crate::types::{NumKind, PrimitiveType, StackKind, Ty};

use super::{slot_kind, Compiler};

/// How a binary operator computes.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum BinaryPlan {
    /// String concatenation
    Concat,
    /// `&`, `|` or `^` on booleans
    Logical(BitOp),
    /// Arithmetic on operands converted to `arith`; the right operand is
    /// converted to `right`
    Numeric { arith: Arith, right: Ty },
}

/// How a call finds its receiver.
enum Receiver<'e> {
    Static,
    This,
    Value(&'e Expression),
}

struct Callee<'e> {
    class: String,
    name: String,
    descriptor: MethodDescriptor,
    receiver: Receiver<'e>,
}

fn compare_of(op: BinaryOperator) -> Option<Compare> {
    Some(match op {
        BinaryOperator::Equal | BinaryOperator::StrictEqual => Compare::Eq,
        BinaryOperator::NotEqual | BinaryOperator::StrictNotEqual => Compare::Ne,
        BinaryOperator::LessThan => Compare::Lt,
        BinaryOperator::LessThanEqual => Compare::Le,
        BinaryOperator::GreaterThan => Compare::Gt,
        BinaryOperator::GreaterThanEqual => Compare::Ge,
        _ => return None,
    })
}

fn bit_op(op: BinaryOperator) -> Option<BitOp> {
    Some(match op {
        BinaryOperator::LeftShift => BitOp::Shl,
        BinaryOperator::RightShift => BitOp::Shr,
        BinaryOperator::UnsignedRightShift => BitOp::UShr,
        BinaryOperator::BitwiseAnd => BitOp::And,
        BinaryOperator::BitwiseOr => BitOp::Or,
        BinaryOperator::BitwiseXor => BitOp::Xor,
        _ => return None,
    })
}

fn arith_op(op: BinaryOperator) -> Option<ArithOp> {
    Some(match op {
        BinaryOperator::Add => ArithOp::Add,
        BinaryOperator::Subtract => ArithOp::Sub,
        BinaryOperator::Multiply => ArithOp::Mul,
        BinaryOperator::Divide => ArithOp::Div,
        BinaryOperator::Modulo => ArithOp::Rem,
        _ => return None,
    })
}

fn big_op(op: BinaryOperator) -> Option<BigOp> {
    Some(match op {
        BinaryOperator::Add => BigOp::Add,
        BinaryOperator::Subtract => BigOp::Sub,
        BinaryOperator::Multiply => BigOp::Mul,
        BinaryOperator::Divide => BigOp::Div,
        BinaryOperator::Modulo => BigOp::Rem,
        BinaryOperator::BitwiseAnd => BigOp::And,
        BinaryOperator::BitwiseOr => BigOp::Or,
        BinaryOperator::BitwiseXor => BigOp::Xor,
        BinaryOperator::LeftShift => BigOp::Shl,
        BinaryOperator::RightShift => BigOp::Shr,
        _ => return None,
    })
}

fn is_boolean(ty: &Ty) -> bool {
    ty.unboxed() == Some(PrimitiveType::Boolean)
}

/// The common type of two branches of a conditional.
fn unify(a: Ty, b: Ty) -> Ty {
    if a == b {
        return a;
    }
    match (&a, &b) {
        (Ty::Null, other) | (other, Ty::Null) if other.is_reference() => other.clone(),
        _ if is_boolean(&a) && is_boolean(&b) => Ty::BOOLEAN,
        _ => match coercion::binary_arith(&a, &b) {
            Ok(arith) if a != Ty::Any && b != Ty::Any => arith.ty(),
            _ => Ty::Any,
        },
    }
}

fn parse_number(expr: &Expression, raw: &str) -> Result<NumericLiteral> {
    literals::parse_number(raw).map_err(|err| CompileError::type_error(expr, err.to_string()))
}

fn parse_bigint(expr: &Expression, raw: &str) -> Result<BigInt> {
    literals::parse_bigint(raw).map_err(|err| CompileError::type_error(expr, err.to_string()))
}

impl Compiler<'_> {
    // ========================================================================
    // Entry points
    // ========================================================================

    /// Compiles `expr`, leaving its value on the stack.
    ///
    /// `hint` is the type the caller will convert the value to. Literals
    /// use it to materialize directly in that type.
    pub(super) fn compile_expr(&mut self, expr: &Expression, hint: Option<&Ty>) -> Result<Ty> {
        match &expr.kind {
            ExpressionKind::Number(raw) => self.compile_number(expr, raw, false, hint),
            ExpressionKind::BigInt(raw) => self.compile_bigint(expr, raw, false),
            ExpressionKind::String(value) => {
                self.emitter.push_string(value)?;
                Ok(Ty::String)
            }
            ExpressionKind::Boolean(value) => {
                self.emitter.emit(Op::IConst(i16::from(*value)));
                Ok(Ty::BOOLEAN)
            }
            ExpressionKind::Null => {
                self.emitter.emit(Op::AConstNull);
                Ok(Ty::Null)
            }
            ExpressionKind::Identifier(name) => self.compile_identifier(expr, name),
            ExpressionKind::This => {
                let ty = self.this_type(expr)?;
                self.emitter.emit(Op::Load(StackKind::Ref, 0));
                Ok(ty)
            }
            ExpressionKind::Unary(unary) => self.compile_unary(expr, unary, hint),
            ExpressionKind::Update(update) => self.compile_update(update),
            ExpressionKind::Binary(binary) => self.compile_binary(expr, binary),
            ExpressionKind::Assign(assign) => self.compile_assign(expr, assign),
            ExpressionKind::Conditional(conditional) => self.compile_conditional(expr, conditional, hint),
            ExpressionKind::Paren(inner) => self.compile_expr(inner, hint),
            ExpressionKind::Array(elements) => self.compile_array(elements, hint),
            ExpressionKind::Object(properties) => self.compile_object(properties),
            ExpressionKind::Member(_) => {
                let place = self.locate(expr)?;
                self.load_place(&place);
                Ok(place.ty())
            }
            ExpressionKind::Call(call) => self.compile_call(expr, call),
            ExpressionKind::Cast(cast) => {
                let target = self.resolve_type(&cast.ty, NodeKind::Cast)?;
                self.compile_expr_as(&cast.expression, &target)?;
                Ok(target)
            }
        }
    }

    /// Compiles `expr` and converts the result to `target`.
    pub(super) fn compile_expr_as(&mut self, expr: &Expression, target: &Ty) -> Result<()> {
        let actual = self.compile_expr(expr, Some(target))?;
        self.coerce(&actual, target, expr)
    }

    /// The static type of `expr`, without emitting code.
    pub(super) fn infer_type(&self, expr: &Expression) -> Result<Ty> {
        match &expr.kind {
            ExpressionKind::Number(raw) => {
                Ok(Ty::Primitive(coercion::natural_literal_type(&parse_number(expr, raw)?)))
            }
            ExpressionKind::BigInt(_) => Ok(Ty::BigInt),
            ExpressionKind::String(_) => Ok(Ty::String),
            ExpressionKind::Boolean(_) => Ok(Ty::BOOLEAN),
            ExpressionKind::Null => Ok(Ty::Null),
            ExpressionKind::Identifier(name) => match self.scopes.resolve(name) {
                Some(slot) => Ok(slot.ty.clone()),
                None if name == "undefined" => Ok(Ty::Null),
                None => Err(CompileError::unknown_identifier(expr, name)),
            },
            ExpressionKind::This => self.this_type(expr),
            ExpressionKind::Unary(unary) => self.infer_unary(expr, unary),
            ExpressionKind::Update(update) => self.place_type(&update.argument),
            ExpressionKind::Binary(binary) => {
                if binary.operator.is_comparison() || binary.operator.is_logical() {
                    return Ok(Ty::BOOLEAN);
                }
                let left = self.infer_type(&binary.left)?;
                let right = self.infer_type(&binary.right)?;
                Ok(match self.plan_binary(expr, binary.operator, &left, &right)? {
                    BinaryPlan::Concat => Ty::String,
                    BinaryPlan::Logical(_) => Ty::BOOLEAN,
                    BinaryPlan::Numeric { arith, .. } => arith.ty(),
                })
            }
            ExpressionKind::Assign(assign) => self.place_type(&assign.target),
            ExpressionKind::Conditional(conditional) => Ok(unify(
                self.infer_type(&conditional.consequent)?,
                self.infer_type(&conditional.alternate)?,
            )),
            ExpressionKind::Paren(inner) => self.infer_type(inner),
            ExpressionKind::Array(_) => Ok(Ty::List),
            ExpressionKind::Object(_) => Ok(Ty::Map),
            ExpressionKind::Member(_) => self.place_type(expr),
            ExpressionKind::Call(call) => Ok(self.resolve_callee(expr, call)?.descriptor.ret),
            ExpressionKind::Cast(cast) => self.resolve_type(&cast.ty, NodeKind::Cast),
        }
    }

    // ========================================================================
    // Literals and names
    // ========================================================================

    fn compile_number(&mut self, expr: &Expression, raw: &str, negate: bool, hint: Option<&Ty>) -> Result<Ty> {
        let mut literal = parse_number(expr, raw)?;
        if negate {
            literal = literal.negate();
        }
        match (hint, &literal) {
            (Some(Ty::BigInt), NumericLiteral::Integer(value)) => {
                self.emitter.push_bigint(value.clone())?;
                return Ok(Ty::BigInt);
            }
            (Some(Ty::Primitive(p) | Ty::Boxed(p)), _) => {
                self.push_scalar(coercion::literal_to_primitive(&literal, *p))?;
                return Ok(Ty::Primitive(*p));
            }
            _ => {}
        }
        let natural = coercion::natural_literal_type(&literal);
        self.push_scalar(coercion::literal_to_primitive(&literal, natural))?;
        Ok(Ty::Primitive(natural))
    }

    fn compile_bigint(&mut self, expr: &Expression, raw: &str, negate: bool) -> Result<Ty> {
        let value = parse_bigint(expr, raw)?;
        self.emitter.push_bigint(if negate { -value } else { value })?;
        Ok(Ty::BigInt)
    }

    fn compile_identifier(&mut self, expr: &Expression, name: &str) -> Result<Ty> {
        match self.scopes.resolve(name) {
            Some(slot) => {
                let ty = slot.ty.clone();
                self.emitter.emit(Op::Load(slot_kind(&ty), slot.index));
                Ok(ty)
            }
            None if name == "undefined" => {
                self.emitter.emit(Op::AConstNull);
                Ok(Ty::Null)
            }
            None => Err(CompileError::unknown_identifier(expr, name)),
        }
    }

    // ========================================================================
    // Unary operators
    // ========================================================================

    fn numeric_operand(&self, expr: &Expression, operand: &Expression, what: &str) -> Result<Arith> {
        let ty = self.infer_type(operand)?;
        coercion::unary_arith(&ty)
            .ok_or_else(|| CompileError::type_error(expr, format!("{what} expects a numeric operand, found {ty}")))
    }

    fn infer_unary(&self, expr: &Expression, unary: &UnaryExpression) -> Result<Ty> {
        let argument = &unary.argument;
        match unary.operator {
            UnaryOperator::LogicalNot | UnaryOperator::Delete => Ok(Ty::BOOLEAN),
            UnaryOperator::TypeOf => Ok(Ty::String),
            UnaryOperator::Void => Ok(Ty::Null),
            UnaryOperator::Minus => match &argument.kind {
                ExpressionKind::Number(raw) => Ok(Ty::Primitive(coercion::natural_literal_type(
                    &parse_number(argument, raw)?.negate(),
                ))),
                _ => Ok(self.numeric_operand(expr, argument, "unary '-'")?.ty()),
            },
            UnaryOperator::Plus => Ok(self.numeric_operand(expr, argument, "unary '+'")?.ty()),
            UnaryOperator::BitwiseNot => Ok(self.numeric_operand(expr, argument, "'~'")?.ty()),
        }
    }

    fn compile_unary(&mut self, expr: &Expression, unary: &UnaryExpression, hint: Option<&Ty>) -> Result<Ty> {
        let argument = &unary.argument;
        match unary.operator {
            UnaryOperator::LogicalNot => {
                let ty = self.infer_type(argument)?;
                if !is_boolean(&ty) {
                    return Err(CompileError::type_error(
                        expr,
                        format!("'!' expects a boolean operand, found {ty}"),
                    ));
                }
                self.compile_expr_as(argument, &Ty::BOOLEAN)?;
                self.emitter.emit(Op::IConst(1));
                self.emitter.emit(Op::Bitwise(BitOp::Xor, IntKind::Int));
                Ok(Ty::BOOLEAN)
            }
            UnaryOperator::Minus => {
                match &argument.kind {
                    ExpressionKind::Number(raw) => return self.compile_number(argument, raw, true, hint),
                    ExpressionKind::BigInt(raw) => return self.compile_bigint(argument, raw, true),
                    _ => {}
                }
                let arith = self.numeric_operand(expr, argument, "unary '-'")?;
                self.compile_expr_as(argument, &arith.ty())?;
                self.emitter.emit(match arith {
                    Arith::Num(kind) => Op::Neg(kind),
                    Arith::BigInt => Op::BigNeg,
                });
                Ok(arith.ty())
            }
            UnaryOperator::Plus => {
                let arith = self.numeric_operand(expr, argument, "unary '+'")?;
                self.compile_expr_as(argument, &arith.ty())?;
                Ok(arith.ty())
            }
            UnaryOperator::BitwiseNot => {
                let arith = self.numeric_operand(expr, argument, "'~'")?;
                self.compile_expr_as(argument, &arith.ty())?;
                match arith {
                    Arith::Num(NumKind::Int) => {
                        self.emitter.emit(Op::IConst(-1));
                        self.emitter.emit(Op::Bitwise(BitOp::Xor, IntKind::Int));
                    }
                    Arith::Num(NumKind::Long) => {
                        self.emitter.push_long(-1)?;
                        self.emitter.emit(Op::Bitwise(BitOp::Xor, IntKind::Long));
                    }
                    Arith::BigInt => self.emitter.emit(Op::BigNot),
                    Arith::Num(_) => {
                        return Err(CompileError::type_error(expr, "'~' expects an integral operand"));
                    }
                }
                Ok(arith.ty())
            }
            UnaryOperator::TypeOf => {
                let ty = self.compile_expr(argument, None)?;
                match ty.typeof_tag() {
                    None => self.emitter.emit(Op::TypeOf),
                    Some(tag) => {
                        if ty != Ty::Void {
                            self.emitter.emit(Op::Pop);
                        }
                        self.emitter.push_string(tag)?;
                    }
                }
                Ok(Ty::String)
            }
            UnaryOperator::Void => {
                let ty = self.compile_expr(argument, None)?;
                if ty != Ty::Void {
                    self.emitter.emit(Op::Pop);
                }
                self.emitter.emit(Op::AConstNull);
                Ok(Ty::Null)
            }
            UnaryOperator::Delete => self.compile_delete(expr, argument),
        }
    }

    // ========================================================================
    // Binary operators
    // ========================================================================

    /// Chooses how `left op right` computes. Not for comparisons or `&&`/`||`.
    pub(super) fn plan_binary(&self, expr: &Expression, op: BinaryOperator, left: &Ty, right: &Ty) -> Result<BinaryPlan> {
        if op == BinaryOperator::Add && (*left == Ty::String || *right == Ty::String) {
            return Ok(BinaryPlan::Concat);
        }
        if op.is_bitwise() && is_boolean(left) && is_boolean(right) {
            if let Some(bit) = bit_op(op) {
                return Ok(BinaryPlan::Logical(bit));
            }
        }

        let mismatch = |reason: String| CompileError::type_error(expr, format!("operator '{}': {reason}", op.symbol()));
        if op.is_shift() {
            let arith = coercion::unary_arith(left).ok_or_else(|| mismatch(format!("{left} is not numeric")))?;
            return match arith {
                Arith::BigInt if *right == Ty::BigInt && op != BinaryOperator::UnsignedRightShift => {
                    Ok(BinaryPlan::Numeric { arith, right: Ty::INT })
                }
                Arith::Num(kind) if kind.is_integral() => match coercion::unary_arith(right) {
                    Some(Arith::Num(r)) if r.is_integral() => Ok(BinaryPlan::Numeric { arith, right: Ty::INT }),
                    _ => Err(mismatch(format!("shift distance must be integral, found {right}"))),
                },
                _ => Err(mismatch(format!("cannot shift {left}"))),
            };
        }

        let arith = coercion::binary_arith(left, right).map_err(mismatch)?;
        if op.is_bitwise() && !matches!(arith, Arith::BigInt | Arith::Num(NumKind::Int | NumKind::Long)) {
            return Err(mismatch("bitwise operators require integral operands".to_string()));
        }
        Ok(BinaryPlan::Numeric { arith, right: arith.ty() })
    }

    /// Finishes a binary operation whose left operand, of type `left`, is
    /// already on the stack. Returns the result type.
    pub(super) fn compile_binary_tail(
        &mut self,
        expr: &Expression,
        op: BinaryOperator,
        plan: &BinaryPlan,
        left: &Ty,
        right: &Expression,
    ) -> Result<Ty> {
        match plan {
            BinaryPlan::Concat => {
                self.box_for_concat(left, expr)?;
                let right_ty = self.compile_expr(right, None)?;
                self.box_for_concat(&right_ty, right)?;
                self.emitter.emit(Op::StrConcat);
                Ok(Ty::String)
            }
            BinaryPlan::Logical(bit) => {
                self.coerce(left, &Ty::BOOLEAN, expr)?;
                self.compile_expr_as(right, &Ty::BOOLEAN)?;
                self.emitter.emit(Op::Bitwise(*bit, IntKind::Int));
                Ok(Ty::BOOLEAN)
            }
            BinaryPlan::Numeric { arith, right: right_ty } => {
                let result = arith.ty();
                self.coerce(left, &result, expr)?;
                self.compile_expr_as(right, right_ty)?;
                let instruction = match arith {
                    Arith::BigInt => big_op(op).map(Op::BigBinary),
                    Arith::Num(kind) => arith_op(op)
                        .map(|a| Op::Arith(a, *kind))
                        .or_else(|| Some(Op::Bitwise(bit_op(op)?, IntKind::of(*kind)?))),
                };
                let instruction = instruction.ok_or_else(|| {
                    CompileError::Internal(format!("no instruction for '{}' on {result}", op.symbol()))
                })?;
                self.emitter.emit(instruction);
                Ok(result)
            }
        }
    }

    fn box_for_concat(&mut self, ty: &Ty, at: &Expression) -> Result<()> {
        match ty {
            Ty::Void => Err(CompileError::type_error(at, "a void expression has no value")),
            Ty::Primitive(p) => {
                self.emitter.emit(Op::Box(*p));
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn compile_binary(&mut self, expr: &Expression, binary: &BinaryExpression) -> Result<Ty> {
        let op = binary.operator;
        if op.is_comparison() || op.is_logical() {
            return self.compile_boolean_value(expr);
        }
        let left = self.infer_type(&binary.left)?;
        let right = self.infer_type(&binary.right)?;
        let plan = self.plan_binary(expr, op, &left, &right)?;
        let left = match &plan {
            BinaryPlan::Concat => self.compile_expr(&binary.left, None)?,
            BinaryPlan::Logical(_) => {
                self.compile_expr_as(&binary.left, &Ty::BOOLEAN)?;
                Ty::BOOLEAN
            }
            BinaryPlan::Numeric { arith, .. } => {
                let ty = arith.ty();
                self.compile_expr_as(&binary.left, &ty)?;
                ty
            }
        };
        self.compile_binary_tail(expr, op, &plan, &left, &binary.right)
    }

    /// Materializes a condition as 0 or 1.
    fn compile_boolean_value(&mut self, expr: &Expression) -> Result<Ty> {
        let when_false = self.emitter.new_label();
        let end = self.emitter.new_label();
        self.compile_branch(expr, false, when_false)?;
        self.emitter.emit(Op::IConst(1));
        self.emitter.goto(end);
        self.emitter.bind(when_false);
        self.emitter.emit(Op::IConst(0));
        self.emitter.bind(end);
        Ok(Ty::BOOLEAN)
    }

    // ========================================================================
    // Conditions
    // ========================================================================

    /// Jumps to `target` when `expr` evaluates to `jump_if`; falls through
    /// otherwise. Nothing is left on the stack.
    pub(super) fn compile_branch(&mut self, expr: &Expression, jump_if: bool, target: Label) -> Result<()> {
        match &expr.kind {
            ExpressionKind::Paren(inner) => self.compile_branch(inner, jump_if, target),
            ExpressionKind::Boolean(value) => {
                if *value == jump_if {
                    self.emitter.goto(target);
                }
                Ok(())
            }
            ExpressionKind::Unary(unary) if unary.operator == UnaryOperator::LogicalNot => {
                let ty = self.infer_type(&unary.argument)?;
                if !is_boolean(&ty) {
                    return Err(CompileError::type_error(
                        expr,
                        format!("'!' expects a boolean operand, found {ty}"),
                    ));
                }
                self.compile_branch(&unary.argument, !jump_if, target)
            }
            ExpressionKind::Binary(binary) if binary.operator.is_logical() => {
                let is_and = binary.operator == BinaryOperator::LogicalAnd;
                if is_and != jump_if {
                    // `a && b` jumping when false, `a || b` jumping when true:
                    // either operand decides alone.
                    self.compile_branch(&binary.left, jump_if, target)?;
                    self.compile_branch(&binary.right, jump_if, target)
                } else {
                    let skip = self.emitter.new_label();
                    self.compile_branch(&binary.left, !jump_if, skip)?;
                    self.compile_branch(&binary.right, jump_if, target)?;
                    self.emitter.bind(skip);
                    Ok(())
                }
            }
            ExpressionKind::Binary(binary) if binary.operator.is_comparison() => {
                self.compile_compare_branch(expr, binary, jump_if, target)
            }
            _ => {
                self.compile_expr_as(expr, &Ty::BOOLEAN)?;
                self.emitter.branch(if jump_if { Cond::Ne } else { Cond::Eq }, target);
                Ok(())
            }
        }
    }

    fn compile_compare_branch(
        &mut self,
        expr: &Expression,
        binary: &BinaryExpression,
        jump_if: bool,
        target: Label,
    ) -> Result<()> {
        let op = binary.operator;
        let compare = compare_of(op)
            .ok_or_else(|| CompileError::Internal(format!("'{}' is not a comparison", op.symbol())))?;
        let cmp = if jump_if { compare } else { compare.negate() };
        let (left, right) = (&binary.left, &binary.right);
        let left_ty = self.infer_type(left)?;
        let right_ty = self.infer_type(right)?;

        if op.is_equality() && (left_ty == Ty::Null || right_ty == Ty::Null) {
            let (other, other_ty) = if left_ty == Ty::Null {
                (right, &right_ty)
            } else {
                (left, &left_ty)
            };
            if other_ty.is_primitive() {
                return Err(CompileError::type_error(
                    expr,
                    format!("{other_ty} is never null"),
                ));
            }
            self.compile_expr(other, None)?;
            self.emitter
                .branch(if cmp == Compare::Eq { Cond::Null } else { Cond::NonNull }, target);
            return Ok(());
        }

        if is_boolean(&left_ty) && is_boolean(&right_ty) {
            self.compile_expr_as(left, &Ty::BOOLEAN)?;
            self.compile_expr_as(right, &Ty::BOOLEAN)?;
            self.emitter.branch(Cond::ints(cmp), target);
            return Ok(());
        }

        // Equality against an opaque value compares boxed values.
        let opaque = left_ty == Ty::Any || right_ty == Ty::Any;
        let numeric = if op.is_equality() && opaque {
            None
        } else {
            coercion::binary_arith(&left_ty, &right_ty).ok()
        };
        match numeric {
            Some(arith) => {
                let ty = arith.ty();
                self.compile_expr_as(left, &ty)?;
                self.compile_expr_as(right, &ty)?;
                let compare_op = match arith {
                    Arith::Num(NumKind::Int) => {
                        self.emitter.branch(Cond::ints(cmp), target);
                        return Ok(());
                    }
                    Arith::Num(NumKind::Long) => Op::LCmp,
                    // NaN must make every ordered comparison false: `<` and
                    // `<=` use the variant mapping NaN to 1, `>` and `>=` the
                    // one mapping it to -1.
                    Arith::Num(NumKind::Float) => match compare {
                        Compare::Lt | Compare::Le => Op::FCmpG,
                        _ => Op::FCmpL,
                    },
                    Arith::Num(NumKind::Double) => match compare {
                        Compare::Lt | Compare::Le => Op::DCmpG,
                        _ => Op::DCmpL,
                    },
                    Arith::BigInt => Op::BigCmp,
                };
                self.emitter.emit(compare_op);
                self.emitter.branch(Cond::zero(cmp), target);
                Ok(())
            }
            None if op.is_equality() => {
                self.compile_expr_as(left, &Ty::Any)?;
                self.compile_expr_as(right, &Ty::Any)?;
                self.emitter.emit(Op::ObjEquals);
                self.emitter
                    .branch(if cmp == Compare::Eq { Cond::Ne } else { Cond::Eq }, target);
                Ok(())
            }
            None => Err(CompileError::type_error(
                expr,
                format!("operator '{}' cannot compare {left_ty} and {right_ty}", op.symbol()),
            )),
        }
    }

    fn compile_conditional(
        &mut self,
        expr: &Expression,
        conditional: &ConditionalExpression,
        hint: Option<&Ty>,
    ) -> Result<Ty> {
        let ty = match hint {
            Some(ty) if *ty != Ty::Void => ty.clone(),
            _ => self.infer_type(expr)?,
        };
        let otherwise = self.emitter.new_label();
        let end = self.emitter.new_label();
        self.compile_branch(&conditional.test, false, otherwise)?;
        self.compile_expr_as(&conditional.consequent, &ty)?;
        self.emitter.goto(end);
        self.emitter.bind(otherwise);
        self.compile_expr_as(&conditional.alternate, &ty)?;
        self.emitter.bind(end);
        Ok(ty)
    }

    // ========================================================================
    // Containers
    // ========================================================================

    fn compile_array(&mut self, elements: &[Expression], hint: Option<&Ty>) -> Result<Ty> {
        if let Some(Ty::Array(element)) = hint {
            let element = (**element).clone();
            let kind = ElemKind::of(&element);
            self.emitter.push_int(elements.len() as i32)?;
            self.emitter.emit(Op::NewArray(kind));
            for (i, value) in elements.iter().enumerate() {
                self.emitter.emit(Op::Dup);
                self.emitter.push_int(i as i32)?;
                self.compile_expr_as(value, &element)?;
                self.emitter.emit(Op::ArrayStore(kind));
            }
            return Ok(Ty::Array(Box::new(element)));
        }

        self.emitter.emit(Op::NewList);
        for value in elements {
            self.emitter.emit(Op::Dup);
            self.compile_expr_as(value, &Ty::Any)?;
            self.emitter.emit(Op::ListAdd);
        }
        Ok(Ty::List)
    }

    fn compile_object(&mut self, properties: &[Property]) -> Result<Ty> {
        self.emitter.emit(Op::NewMap);
        for property in properties {
            self.emitter.emit(Op::Dup);
            match &property.key {
                PropertyKey::Identifier(name) | PropertyKey::String(name) => self.emitter.push_string(name)?,
                PropertyKey::Computed(key) => self.compile_expr_as(key, &Ty::Any)?,
            }
            self.compile_expr_as(&property.value, &Ty::Any)?;
            self.emitter.emit(Op::MapPut);
            self.emitter.emit(Op::Pop);
        }
        Ok(Ty::Map)
    }

    // ========================================================================
    // Calls
    // ========================================================================

    fn method_of(&self, expr: &Expression, class: &str, name: &str) -> Result<MethodDescriptor> {
        self.table
            .class(class)
            .and_then(|sig| sig.methods.get(name))
            .cloned()
            .ok_or_else(|| CompileError::unknown_identifier(expr, &format!("{class}.{name}")))
    }

    fn resolve_callee<'e>(&self, expr: &Expression, call: &'e CallExpression) -> Result<Callee<'e>> {
        let own = self.class.name.clone();
        let (class, name, receiver) = match &call.callee.kind {
            ExpressionKind::Identifier(name) => {
                let descriptor = self.method_of(expr, &own, name)?;
                let receiver = if descriptor.is_static { Receiver::Static } else { Receiver::This };
                return self.check_callee(expr, call, own, name.clone(), descriptor, receiver);
            }
            ExpressionKind::Member(member) => {
                let MemberProperty::Identifier(name) = &member.property else {
                    return Err(CompileError::unsupported(expr, "computed method names"));
                };
                match &member.object.kind {
                    ExpressionKind::This => (own, name.clone(), Receiver::This),
                    ExpressionKind::Identifier(class) if self.is_class_name(class) => {
                        (class.clone(), name.clone(), Receiver::Static)
                    }
                    _ => match self.infer_type(&member.object)? {
                        Ty::Class(class) => (class, name.clone(), Receiver::Value(&member.object)),
                        ty => {
                            return Err(CompileError::unsupported(
                                expr,
                                format!("cannot call method '{name}' on {ty}"),
                            ));
                        }
                    },
                }
            }
            _ => return Err(CompileError::unsupported(expr, "only methods of compiled classes can be called")),
        };
        let descriptor = self.method_of(expr, &class, &name)?;
        self.check_callee(expr, call, class, name, descriptor, receiver)
    }

    fn check_callee<'e>(
        &self,
        expr: &Expression,
        call: &CallExpression,
        class: String,
        name: String,
        descriptor: MethodDescriptor,
        receiver: Receiver<'e>,
    ) -> Result<Callee<'e>> {
        match (&receiver, descriptor.is_static) {
            (Receiver::Static, false) => {
                return Err(CompileError::type_error(
                    expr,
                    format!("'{class}.{name}' is an instance method"),
                ));
            }
            (Receiver::This, false) => {
                self.this_type(expr)?;
            }
            _ => {}
        }
        if call.arguments.len() != descriptor.params.len() {
            return Err(CompileError::type_error(
                expr,
                format!(
                    "'{name}' expects {} arguments, got {}",
                    descriptor.params.len(),
                    call.arguments.len()
                ),
            ));
        }
        // A static method called through an instance needs no receiver.
        let receiver = if descriptor.is_static { Receiver::Static } else { receiver };
        Ok(Callee {
            class,
            name,
            descriptor,
            receiver,
        })
    }

    fn compile_call(&mut self, expr: &Expression, call: &CallExpression) -> Result<Ty> {
        let callee = self.resolve_callee(expr, call)?;
        match callee.receiver {
            Receiver::Static => {}
            Receiver::This => self.emitter.emit(Op::Load(StackKind::Ref, 0)),
            Receiver::Value(object) => {
                self.compile_expr_as(object, &Ty::Class(callee.class.clone()))?;
            }
        }
        for (argument, param) in call.arguments.iter().zip(&callee.descriptor.params) {
            self.compile_expr_as(argument, param)?;
        }
        let index = self.method_constant(&callee.class, &callee.name, &callee.descriptor)?;
        self.emitter.emit(if callee.descriptor.is_static {
            Op::InvokeStatic(index)
        } else {
            Op::InvokeVirtual(index)
        });
        Ok(callee.descriptor.ret)
    }
}
