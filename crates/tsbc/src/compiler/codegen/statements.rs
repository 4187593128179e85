// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Statement and control flow compilation.
//!
//! Statements leave the operand stack as they found it. Loops register a
//! [`LoopContext`](super::LoopContext) for the duration of their body so
//! `break` and `continue` can find their targets.

use crate::ast::*;
use crate::compiler::bytecode::Op;
use crate::error::{CompileError, Result};
use crate::types::Ty;

use super::{out_of_slots, slot_kind, Compiler, DeclareError};

impl Compiler<'_> {
    /// Compiles one statement.
    pub(super) fn compile_statement(&mut self, stmt: &Statement) -> Result<()> {
        match &stmt.kind {
            StatementKind::VariableDeclaration(decl) => self.compile_variable_declaration(stmt, decl),
            StatementKind::Expression(expr) => self.compile_expression_statement(expr),
            StatementKind::Block(body) => self.compile_block(body),
            StatementKind::If(if_stmt) => self.compile_if_statement(if_stmt),
            StatementKind::While(while_stmt) => self.compile_while_statement(while_stmt, None),
            StatementKind::DoWhile(do_while) => self.compile_do_while_statement(do_while, None),
            StatementKind::For(for_stmt) => self.compile_for_statement(stmt, for_stmt, None),
            StatementKind::Labeled(labeled) => self.compile_labeled_statement(stmt, labeled),
            StatementKind::Break(label) => self.compile_jump(stmt, label.as_deref(), false),
            StatementKind::Continue(label) => self.compile_jump(stmt, label.as_deref(), true),
            StatementKind::Return(value) => self.compile_return_statement(stmt, value.as_ref()),
            StatementKind::Empty => Ok(()),
        }
    }

    // ========================================================================
    // Declarations and simple statements
    // ========================================================================

    fn compile_variable_declaration(&mut self, stmt: &Statement, decl: &VariableDeclaration) -> Result<()> {
        let mutable = decl.kind != VariableKind::Const;
        for declarator in &decl.declarations {
            let ty = match (&declarator.ty, &declarator.init) {
                (Some(ann), _) => self.resolve_type(ann, NodeKind::VariableDeclaration)?,
                (None, Some(init)) => match self.infer_type(init)? {
                    Ty::Null | Ty::Void => Ty::Any,
                    ty => ty,
                },
                (None, None) => Ty::Any,
            };
            if ty == Ty::Void {
                return Err(CompileError::type_error_at(
                    stmt,
                    format!("'{}' cannot have type void", declarator.name),
                ));
            }

            match &declarator.init {
                Some(init) => self.compile_expr_as(init, &ty)?,
                None if !mutable => {
                    return Err(CompileError::type_error_at(
                        stmt,
                        format!("const '{}' must be initialized", declarator.name),
                    ));
                }
                None => self.push_default(&ty)?,
            }

            // Declared after the initializer so `let x = x` sees the outer x.
            let slot = self
                .scopes
                .declare(&declarator.name, ty, mutable)
                .map_err(|e| match e {
                    DeclareError::Redeclared(name) => {
                        CompileError::type_error_at(stmt, format!("'{name}' is already declared in this scope"))
                    }
                    DeclareError::OutOfSlots => out_of_slots(),
                })?;
            self.emitter.emit(Op::Store(slot_kind(&slot.ty), slot.index));
        }
        Ok(())
    }

    fn compile_expression_statement(&mut self, expr: &Expression) -> Result<()> {
        let ty = self.compile_expr(expr, None)?;
        if ty != Ty::Void {
            self.emitter.emit(Op::Pop);
        }
        Ok(())
    }

    fn compile_block(&mut self, body: &[Statement]) -> Result<()> {
        self.scopes.push();
        for stmt in body {
            self.compile_statement(stmt)?;
        }
        self.scopes.pop();
        Ok(())
    }

    fn compile_return_statement(&mut self, stmt: &Statement, value: Option<&Expression>) -> Result<()> {
        let ret = self.return_ty.clone();
        match (value, &ret) {
            (None, Ty::Void) => self.emitter.emit(Op::Return(None)),
            (Some(_), Ty::Void) => {
                return Err(CompileError::type_error_at(stmt, "a void method cannot return a value"));
            }
            (None, Ty::Any) => {
                self.emitter.emit(Op::AConstNull);
                self.emitter.emit(Op::Return(Some(slot_kind(&ret))));
            }
            (None, _) => {
                return Err(CompileError::type_error_at(stmt, format!("a value of type {ret} must be returned")));
            }
            (Some(value), _) => {
                self.compile_expr_as(value, &ret)?;
                self.emitter.emit(Op::Return(Some(slot_kind(&ret))));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Control flow
    // ========================================================================

    fn compile_if_statement(&mut self, if_stmt: &IfStatement) -> Result<()> {
        let otherwise = self.emitter.new_label();
        self.compile_branch(&if_stmt.test, false, otherwise)?;
        self.compile_statement(&if_stmt.consequent)?;
        match &if_stmt.alternate {
            Some(alternate) => {
                let end = self.emitter.new_label();
                self.emitter.goto(end);
                self.emitter.bind(otherwise);
                self.compile_statement(alternate)?;
                self.emitter.bind(end);
            }
            None => self.emitter.bind(otherwise),
        }
        Ok(())
    }

    fn compile_while_statement(&mut self, while_stmt: &WhileStatement, label: Option<String>) -> Result<()> {
        let test = self.emitter.here();
        let end = self.emitter.new_label();
        self.compile_branch(&while_stmt.test, false, end)?;

        self.loops.push(label, end, Some(test));
        self.compile_statement(&while_stmt.body)?;
        self.loops.pop();

        self.emitter.goto(test);
        self.emitter.bind(end);
        Ok(())
    }

    /// The body runs once before the test; `continue` goes to the test.
    fn compile_do_while_statement(&mut self, do_while: &DoWhileStatement, label: Option<String>) -> Result<()> {
        let body = self.emitter.here();
        let test = self.emitter.new_label();
        let end = self.emitter.new_label();

        self.loops.push(label, end, Some(test));
        self.compile_statement(&do_while.body)?;
        self.loops.pop();

        self.emitter.bind(test);
        self.compile_branch(&do_while.test, true, body)?;
        self.emitter.bind(end);
        Ok(())
    }

    fn compile_for_statement(&mut self, stmt: &Statement, for_stmt: &ForStatement, label: Option<String>) -> Result<()> {
        self.scopes.push();
        match &for_stmt.init {
            Some(ForInit::Declaration(decl)) => self.compile_variable_declaration(stmt, decl)?,
            Some(ForInit::Expression(expr)) => self.compile_expression_statement(expr)?,
            None => {}
        }

        let top = self.emitter.here();
        let next = self.emitter.new_label();
        let end = self.emitter.new_label();
        if let Some(test) = &for_stmt.test {
            self.compile_branch(test, false, end)?;
        }

        self.loops.push(label, end, Some(next));
        self.compile_statement(&for_stmt.body)?;
        self.loops.pop();

        self.emitter.bind(next);
        if let Some(update) = &for_stmt.update {
            self.compile_expression_statement(update)?;
        }
        self.emitter.goto(top);
        self.emitter.bind(end);
        self.scopes.pop();
        Ok(())
    }

    /// A label on a loop names the loop; on anything else it makes the
    /// statement a `break` target only.
    fn compile_labeled_statement(&mut self, stmt: &Statement, labeled: &LabeledStatement) -> Result<()> {
        if self.loops.break_target(Some(&labeled.label)).is_some() {
            return Err(CompileError::type_error_at(
                stmt,
                format!("label '{}' is already in use", labeled.label),
            ));
        }
        let label = Some(labeled.label.clone());
        match &labeled.body.kind {
            StatementKind::While(while_stmt) => self.compile_while_statement(while_stmt, label),
            StatementKind::DoWhile(do_while) => self.compile_do_while_statement(do_while, label),
            StatementKind::For(for_stmt) => self.compile_for_statement(&labeled.body, for_stmt, label),
            _ => {
                let end = self.emitter.new_label();
                self.loops.push(label, end, None);
                self.compile_statement(&labeled.body)?;
                self.loops.pop();
                self.emitter.bind(end);
                Ok(())
            }
        }
    }

    fn compile_jump(&mut self, stmt: &Statement, label: Option<&str>, is_continue: bool) -> Result<()> {
        let target = if is_continue {
            self.loops.continue_target(label)
        } else {
            self.loops.break_target(label)
        };
        let target = target.ok_or_else(|| CompileError::UnresolvedLabel {
            label: label.unwrap_or("<loop>").to_string(),
            node: stmt.node_kind(),
            span: stmt.span,
        })?;
        self.emitter.goto(target);
        Ok(())
    }
}
