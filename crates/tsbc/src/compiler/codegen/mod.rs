// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Code generation from AST to bytecode.
//!
//! A [`Compiler`] owns everything needed to compile one method: the
//! emitter, the scope chain and the loop stack. Class-level information
//! comes from a read-only [`ClassTable`] built once per module, so classes
//! can be compiled on separate threads.

mod expressions;
mod lvalue;
mod scope;
mod statements;


pub use scope::{DeclareError, LocalSlot, LoopContext, LoopId, Loops, ScopeId, Scopes};

use rustc_hash::FxHashMap;
use tracing::{debug, instrument};

use crate::ast::*;
use crate::compiler::bytecode::{
    CompiledClass, CompiledMethod, Cond, Constant, FieldInfo, FieldRef, MethodDescriptor,
    MethodRef, Op,
};
use crate::compiler::coercion::{self, Conversion, Scalar, Truthiness};
use crate::compiler::emitter::Emitter;
use crate::error::{CompileError, Result};
use crate::options::CompilerOptions;
use crate::types::{NumKind, PrimitiveType, StackKind, Ty};

/// Signature of a field.
#[derive(Debug, Clone)]
pub struct FieldSignature {
    /// Declared type
    pub ty: Ty,
    /// Whether the field is static
    pub is_static: bool,
}

/// Everything other classes may know about a class.
#[derive(Debug, Clone)]
pub struct ClassSignature {
    /// Class name
    pub name: String,
    /// Fields in declaration order
    pub fields: Vec<(String, FieldSignature)>,
    /// Methods by name
    pub methods: FxHashMap<String, MethodDescriptor>,
}

impl ClassSignature {
    /// Looks up a field.
    pub fn field(&self, name: &str) -> Option<&FieldSignature> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, sig)| sig)
    }
}

/// Signatures of every class in a module.
#[derive(Debug, Default)]
pub struct ClassTable {
    classes: FxHashMap<String, ClassSignature>,
}

fn annotation_error(ann: &TypeAnnotation, node: NodeKind) -> CompileError {
    CompileError::TypeError {
        node,
        span: ann.span,
        message: format!("unknown type '{}'", ann.text),
    }
}

/// Slot indices are 16 bits wide.
fn out_of_slots() -> CompileError {
    CompileError::LimitExceeded {
        what: "local slot",
        limit: usize::from(u16::MAX) + 1,
    }
}

/// The type of an unannotated field from its initializer, when it is a literal.
fn literal_type(init: Option<&Expression>) -> Ty {
    match init.map(|expr| &expr.kind) {
        Some(ExpressionKind::Number(raw)) => crate::compiler::literals::parse_number(raw)
            .map(|lit| Ty::Primitive(coercion::natural_literal_type(&lit)))
            .unwrap_or(Ty::Any),
        Some(ExpressionKind::BigInt(_)) => Ty::BigInt,
        Some(ExpressionKind::String(_)) => Ty::String,
        Some(ExpressionKind::Boolean(_)) => Ty::BOOLEAN,
        Some(ExpressionKind::Array(_)) => Ty::List,
        Some(ExpressionKind::Object(_)) => Ty::Map,
        _ => Ty::Any,
    }
}

impl ClassTable {
    /// Collects class, field and method signatures.
    pub fn build(module: &Module) -> Result<Self> {
        let mut table = ClassTable::default();
        for class in &module.classes {
            if table.classes.contains_key(&class.name) {
                return Err(CompileError::TypeError {
                    node: NodeKind::Class,
                    span: class.span,
                    message: format!("duplicate class '{}'", class.name),
                });
            }
            table.classes.insert(
                class.name.clone(),
                ClassSignature {
                    name: class.name.clone(),
                    fields: Vec::new(),
                    methods: FxHashMap::default(),
                },
            );
        }

        for class in &module.classes {
            let mut fields = Vec::with_capacity(class.fields.len());
            for field in &class.fields {
                let ty = match &field.ty {
                    Some(ann) => table.resolve(ann, NodeKind::Field)?,
                    None => literal_type(field.init.as_ref()),
                };
                if ty == Ty::Void || fields.iter().any(|(name, _)| name == &field.name) {
                    return Err(CompileError::TypeError {
                        node: NodeKind::Field,
                        span: field.span,
                        message: format!("invalid field '{}'", field.name),
                    });
                }
                fields.push((
                    field.name.clone(),
                    FieldSignature {
                        ty,
                        is_static: field.is_static,
                    },
                ));
            }

            let mut methods = FxHashMap::default();
            for method in &class.methods {
                let params = method
                    .params
                    .iter()
                    .map(|param| match &param.ty {
                        Some(ann) => table.resolve(ann, NodeKind::Method),
                        None => Ok(Ty::Any),
                    })
                    .collect::<Result<Vec<_>>>()?;
                let ret = match &method.return_type {
                    Some(ann) => table.resolve(ann, NodeKind::Method)?,
                    None => Ty::Any,
                };
                let descriptor = MethodDescriptor {
                    params,
                    ret,
                    is_static: method.is_static,
                };
                if methods.insert(method.name.clone(), descriptor).is_some() {
                    return Err(CompileError::TypeError {
                        node: NodeKind::Method,
                        span: method.span,
                        message: format!("duplicate method '{}'", method.name),
                    });
                }
            }

            if let Some(sig) = table.classes.get_mut(&class.name) {
                sig.fields = fields;
                sig.methods = methods;
            }
        }
        Ok(table)
    }

    /// Looks up a class.
    pub fn class(&self, name: &str) -> Option<&ClassSignature> {
        self.classes.get(name)
    }

    /// Resolves a type annotation, including names of compiled classes.
    pub fn resolve(&self, ann: &TypeAnnotation, node: NodeKind) -> Result<Ty> {
        if let Some(ty) = Ty::from_annotation(&ann.text) {
            return Ok(ty);
        }
        let text = ann.text.trim();
        if let Some(element) = text.strip_suffix("[]") {
            let element = TypeAnnotation {
                text: element.to_string(),
                span: ann.span,
            };
            return Ok(Ty::Array(Box::new(self.resolve(&element, node)?)));
        }
        if self.classes.contains_key(text) {
            return Ok(Ty::Class(text.to_string()));
        }
        Err(annotation_error(ann, node))
    }
}

/// What a slot or return of `ty` holds.
pub(crate) fn slot_kind(ty: &Ty) -> StackKind {
    ty.stack_kind().unwrap_or(StackKind::Ref)
}

/// Compiles one method body.
pub struct Compiler<'a> {
    table: &'a ClassTable,
    class: &'a ClassSignature,
    is_static: bool,
    return_ty: Ty,
    emitter: Emitter,
    scopes: Scopes,
    loops: Loops,
}

impl<'a> Compiler<'a> {
    /// Creates a compiler for a method of `class`.
    pub fn new(
        options: &'a CompilerOptions,
        table: &'a ClassTable,
        class: &'a ClassSignature,
        is_static: bool,
        return_ty: Ty,
    ) -> Self {
        Self {
            table,
            class,
            is_static,
            return_ty,
            emitter: Emitter::new(options),
            scopes: Scopes::new(u16::from(!is_static)),
            loops: Loops::new(),
        }
    }

    // ========================================================================
    // Types and coercion
    // ========================================================================

    fn resolve_type(&self, ann: &TypeAnnotation, node: NodeKind) -> Result<Ty> {
        self.table.resolve(ann, node)
    }

    /// Converts the value on top of the stack from `from` to `to`.
    fn coerce(&mut self, from: &Ty, to: &Ty, at: &Expression) -> Result<()> {
        let steps = coercion::plan(from, to).map_err(|reason| CompileError::type_error(at, reason))?;
        for step in steps {
            self.emit_conversion(step)?;
        }
        Ok(())
    }

    fn emit_conversion(&mut self, step: Conversion) -> Result<()> {
        let op = match step {
            Conversion::Convert(from, to) => Op::Convert(from, to),
            Conversion::Narrow(p) => {
                if p == PrimitiveType::Byte {
                    Op::I2B
                } else {
                    Op::I2S
                }
            }
            Conversion::Box(p) => Op::Box(p),
            Conversion::Unbox(p) => Op::Unbox(p),
            Conversion::CheckCast(tag) => Op::CheckCast(tag),
            Conversion::BigToPrimitive(p) => Op::BigToPrim(p),
            Conversion::LongToBig => Op::LongToBig,
            Conversion::Truthiness(truthiness) => return self.emit_truthiness(truthiness),
        };
        self.emitter.emit(op);
        Ok(())
    }

    /// Replaces the value on top of the stack with 1 if truthy, else 0.
    fn emit_truthiness(&mut self, truthiness: Truthiness) -> Result<()> {
        let falsy = self.emitter.new_label();
        let end = self.emitter.new_label();
        match truthiness {
            Truthiness::Num(NumKind::Int) => self.emitter.branch(Cond::Eq, falsy),
            Truthiness::Num(NumKind::Long) => {
                self.emitter.push_long(0)?;
                self.emitter.emit(Op::LCmp);
                self.emitter.branch(Cond::Eq, falsy);
            }
            Truthiness::Num(kind) => {
                // NaN is falsy: x != x only for NaN.
                let nan = self.emitter.new_label();
                let (cmp, zero) = if kind == NumKind::Float {
                    (Op::FCmpL, Constant::Float(0.0))
                } else {
                    (Op::DCmpL, Constant::Double(0.0))
                };
                self.emitter.emit(Op::Dup);
                self.emitter.emit(Op::Dup);
                self.emitter.emit(cmp);
                self.emitter.branch(Cond::Ne, nan);
                self.emitter.ldc(zero)?;
                self.emitter.emit(cmp);
                self.emitter.branch(Cond::Eq, falsy);
                self.emitter.emit(Op::IConst(1));
                self.emitter.goto(end);
                self.emitter.bind(nan);
                self.emitter.emit(Op::Pop);
                self.emitter.bind(falsy);
                self.emitter.emit(Op::IConst(0));
                self.emitter.bind(end);
                return Ok(());
            }
            Truthiness::BigInt => {
                self.emitter.push_bigint(0.into())?;
                self.emitter.emit(Op::BigCmp);
                self.emitter.branch(Cond::Eq, falsy);
            }
            Truthiness::String => {
                // null and "" are both falsy.
                let null = self.emitter.new_label();
                self.emitter.emit(Op::Dup);
                self.emitter.branch(Cond::Null, null);
                self.emitter.emit(Op::StrLength);
                self.emitter.branch(Cond::Eq, falsy);
                self.emitter.emit(Op::IConst(1));
                self.emitter.goto(end);
                self.emitter.bind(null);
                self.emitter.emit(Op::Pop);
                self.emitter.bind(falsy);
                self.emitter.emit(Op::IConst(0));
                self.emitter.bind(end);
                return Ok(());
            }
            Truthiness::Reference => self.emitter.branch(Cond::Null, falsy),
            Truthiness::Dynamic => {
                self.emitter.emit(Op::Truthy);
                return Ok(());
            }
        }
        self.emitter.emit(Op::IConst(1));
        self.emitter.goto(end);
        self.emitter.bind(falsy);
        self.emitter.emit(Op::IConst(0));
        self.emitter.bind(end);
        Ok(())
    }

    fn push_scalar(&mut self, scalar: Scalar) -> Result<()> {
        match scalar {
            Scalar::Int(v) => self.emitter.push_int(v),
            Scalar::Long(v) => self.emitter.push_long(v),
            Scalar::Float(v) => self.emitter.ldc(Constant::Float(v)),
            Scalar::Double(v) => self.emitter.ldc(Constant::Double(v)),
        }
    }

    /// Pushes the value an uninitialized binding of `ty` holds.
    fn push_default(&mut self, ty: &Ty) -> Result<()> {
        match ty {
            Ty::Primitive(p) => self.push_scalar(coercion::integer_to_primitive(&0.into(), *p)),
            _ => {
                self.emitter.emit(Op::AConstNull);
                Ok(())
            }
        }
    }

    // ========================================================================
    // Class members
    // ========================================================================

    fn field_constant(&mut self, at: &Expression, class: &str, name: &str, is_static: bool) -> Result<(u16, Ty)> {
        let field = self
            .table
            .class(class)
            .and_then(|sig| sig.field(name))
            .filter(|field| field.is_static == is_static)
            .ok_or_else(|| {
                let kind = if is_static { "static field" } else { "field" };
                CompileError::type_error(at, format!("{class} has no {kind} '{name}'"))
            })?;
        let ty = field.ty.clone();
        let index = self.emitter.constant(Constant::Field(FieldRef {
            class: class.to_string(),
            name: name.to_string(),
            ty: ty.clone(),
        }))?;
        Ok((index, ty))
    }

    fn method_constant(&mut self, class: &str, name: &str, descriptor: &MethodDescriptor) -> Result<u16> {
        self.emitter.constant(Constant::Method(MethodRef {
            class: class.to_string(),
            name: name.to_string(),
            descriptor: descriptor.clone(),
        }))
    }

    /// Returns true when `name` refers to a class rather than a local.
    fn is_class_name(&self, name: &str) -> bool {
        self.scopes.resolve(name).is_none() && self.table.class(name).is_some()
    }

    fn this_type(&self, at: &Expression) -> Result<Ty> {
        if self.is_static {
            return Err(CompileError::type_error(at, "'this' is not available in a static method"));
        }
        Ok(Ty::Class(self.class.name.clone()))
    }

    // ========================================================================
    // Method bodies
    // ========================================================================

    fn emit_default_return(&mut self) -> Result<()> {
        let ret = self.return_ty.clone();
        if ret == Ty::Void {
            self.emitter.emit(Op::Return(None));
        } else {
            self.push_default(&ret)?;
            self.emitter.emit(Op::Return(Some(slot_kind(&ret))));
        }
        Ok(())
    }

    /// Compiles a method body and resolves its code.
    pub fn compile_method(mut self, method: &MethodDeclaration, descriptor: MethodDescriptor) -> Result<CompiledMethod> {
        self.scopes.push();
        for (param, ty) in method.params.iter().zip(&descriptor.params) {
            self.scopes
                .declare(&param.name, ty.clone(), true)
                .map_err(|e| match e {
                    DeclareError::Redeclared(name) => CompileError::TypeError {
                        node: NodeKind::Method,
                        span: method.span,
                        message: format!("duplicate parameter '{name}'"),
                    },
                    DeclareError::OutOfSlots => out_of_slots(),
                })?;
        }
        for stmt in &method.body {
            self.compile_statement(stmt)?;
        }
        self.emit_default_return()?;
        self.scopes.pop();
        self.emitter.finish(&method.name, descriptor)
    }

    /// Compiles field initializers into `<init>` or `<clinit>`.
    fn compile_initializer(mut self, name: &str, fields: &[&FieldDeclaration]) -> Result<CompiledMethod> {
        self.scopes.push();
        let is_static = self.is_static;
        let class = self.class.name.clone();
        for field in fields {
            let Some(init) = &field.init else { continue };
            if !is_static {
                self.emitter.emit(Op::Load(StackKind::Ref, 0));
            }
            let (index, ty) = self.field_constant(init, &class, &field.name, is_static)?;
            self.compile_expr_as(init, &ty)?;
            self.emitter.emit(if is_static { Op::PutStatic(index) } else { Op::PutField(index) });
        }
        self.emitter.emit(Op::Return(None));
        self.scopes.pop();
        let descriptor = MethodDescriptor {
            params: Vec::new(),
            ret: Ty::Void,
            is_static,
        };
        self.emitter.finish(name, descriptor)
    }
}

/// Compiles one class.
#[instrument(skip_all, fields(class = %decl.name))]
pub fn compile_class(decl: &ClassDeclaration, table: &ClassTable, options: &CompilerOptions) -> Result<CompiledClass> {
    let sig = table
        .class(&decl.name)
        .ok_or_else(|| CompileError::Internal(format!("class '{}' missing from table", decl.name)))?;

    let mut methods = Vec::with_capacity(decl.methods.len() + 2);
    for method in &decl.methods {
        let descriptor = sig.methods.get(&method.name).cloned().ok_or_else(|| {
            CompileError::Internal(format!("method '{}' missing from table", method.name))
        })?;
        let compiler = Compiler::new(options, table, sig, descriptor.is_static, descriptor.ret.clone());
        methods.push(compiler.compile_method(method, descriptor)?);
    }

    for (name, is_static) in [("<init>", false), ("<clinit>", true)] {
        let fields: Vec<&FieldDeclaration> = decl
            .fields
            .iter()
            .filter(|field| field.is_static == is_static && field.init.is_some())
            .collect();
        if !fields.is_empty() {
            let compiler = Compiler::new(options, table, sig, is_static, Ty::Void);
            methods.push(compiler.compile_initializer(name, &fields)?);
        }
    }

    let fields = sig
        .fields
        .iter()
        .map(|(name, field)| FieldInfo {
            name: name.clone(),
            ty: field.ty.clone(),
            is_static: field.is_static,
        })
        .collect();

    debug!(methods = methods.len(), "class compiled");
    Ok(CompiledClass {
        name: decl.name.clone(),
        fields,
        methods,
    })
}
