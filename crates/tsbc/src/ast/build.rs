// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Constructor helpers for building ASTs without a parser.
//!
//! Every node gets an empty span. Hosts that have real positions can build
//! the structs directly.
//!
//! ```
//! use tsbc::ast::build::*;
//!
//! let body = vec![
//!     let_("i", Some("int"), num("0")),
//!     do_while(block(vec![expr(post_inc(ident("i")))]), lt(ident("i"), num("10"))),
//!     ret(ident("i")),
//! ];
//! let module = module(vec![class("Counter").method(method("run", body).returns("int"))]);
//! assert_eq!(module.classes[0].methods.len(), 1);
//! ```

use super::*;

fn e(kind: ExpressionKind) -> Expression {
    Expression::new(kind, Span::default())
}

fn s(kind: StatementKind) -> Statement {
    Statement::new(kind, Span::default())
}

fn annotation(text: &str) -> TypeAnnotation {
    TypeAnnotation {
        text: text.to_string(),
        span: Span::default(),
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// Numeric literal from its raw text.
pub fn num(raw: &str) -> Expression {
    e(ExpressionKind::Number(raw.to_string()))
}

/// Bigint literal from its raw text, with or without the trailing `n`.
pub fn bigint(raw: &str) -> Expression {
    e(ExpressionKind::BigInt(raw.to_string()))
}

/// String literal.
pub fn string(value: &str) -> Expression {
    e(ExpressionKind::String(value.to_string()))
}

/// Boolean literal.
pub fn boolean(value: bool) -> Expression {
    e(ExpressionKind::Boolean(value))
}

/// `null`.
pub fn null() -> Expression {
    e(ExpressionKind::Null)
}

/// Identifier reference.
pub fn ident(name: &str) -> Expression {
    e(ExpressionKind::Identifier(name.to_string()))
}

/// `this`.
pub fn this() -> Expression {
    e(ExpressionKind::This)
}

/// Unary expression.
pub fn unary(operator: UnaryOperator, argument: Expression) -> Expression {
    e(ExpressionKind::Unary(UnaryExpression {
        operator,
        argument: Box::new(argument),
    }))
}

/// `!arg`
pub fn not(argument: Expression) -> Expression {
    unary(UnaryOperator::LogicalNot, argument)
}

/// `-arg`
pub fn neg(argument: Expression) -> Expression {
    unary(UnaryOperator::Minus, argument)
}

/// `typeof arg`
pub fn type_of(argument: Expression) -> Expression {
    unary(UnaryOperator::TypeOf, argument)
}

/// `delete arg`
pub fn delete(argument: Expression) -> Expression {
    unary(UnaryOperator::Delete, argument)
}

fn update(operator: UpdateOperator, prefix: bool, argument: Expression) -> Expression {
    e(ExpressionKind::Update(UpdateExpression {
        operator,
        prefix,
        argument: Box::new(argument),
    }))
}

/// `++arg`
pub fn pre_inc(argument: Expression) -> Expression {
    update(UpdateOperator::Increment, true, argument)
}

/// `--arg`
pub fn pre_dec(argument: Expression) -> Expression {
    update(UpdateOperator::Decrement, true, argument)
}

/// `arg++`
pub fn post_inc(argument: Expression) -> Expression {
    update(UpdateOperator::Increment, false, argument)
}

/// `arg--`
pub fn post_dec(argument: Expression) -> Expression {
    update(UpdateOperator::Decrement, false, argument)
}

/// Binary expression.
pub fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
    e(ExpressionKind::Binary(BinaryExpression {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    }))
}

/// `left + right`
pub fn add(left: Expression, right: Expression) -> Expression {
    binary(BinaryOperator::Add, left, right)
}

/// `left - right`
pub fn sub(left: Expression, right: Expression) -> Expression {
    binary(BinaryOperator::Subtract, left, right)
}

/// `left * right`
pub fn mul(left: Expression, right: Expression) -> Expression {
    binary(BinaryOperator::Multiply, left, right)
}

/// `left < right`
pub fn lt(left: Expression, right: Expression) -> Expression {
    binary(BinaryOperator::LessThan, left, right)
}

/// `left > right`
pub fn gt(left: Expression, right: Expression) -> Expression {
    binary(BinaryOperator::GreaterThan, left, right)
}

/// `left === right`
pub fn eq(left: Expression, right: Expression) -> Expression {
    binary(BinaryOperator::StrictEqual, left, right)
}

/// `left && right`
pub fn and(left: Expression, right: Expression) -> Expression {
    binary(BinaryOperator::LogicalAnd, left, right)
}

/// `left || right`
pub fn or(left: Expression, right: Expression) -> Expression {
    binary(BinaryOperator::LogicalOr, left, right)
}

/// `target = value`
pub fn assign(target: Expression, value: Expression) -> Expression {
    assign_op(AssignOperator::Assign, target, value)
}

/// Compound or plain assignment.
pub fn assign_op(operator: AssignOperator, target: Expression, value: Expression) -> Expression {
    e(ExpressionKind::Assign(AssignExpression {
        operator,
        target: Box::new(target),
        value: Box::new(value),
    }))
}

/// `test ? consequent : alternate`
pub fn cond(test: Expression, consequent: Expression, alternate: Expression) -> Expression {
    e(ExpressionKind::Conditional(ConditionalExpression {
        test: Box::new(test),
        consequent: Box::new(consequent),
        alternate: Box::new(alternate),
    }))
}

/// `(inner)`
pub fn paren(inner: Expression) -> Expression {
    e(ExpressionKind::Paren(Box::new(inner)))
}

/// `[elements]`
pub fn array(elements: Vec<Expression>) -> Expression {
    e(ExpressionKind::Array(elements))
}

/// `{ key: value, ... }` with identifier keys.
pub fn object(properties: Vec<(&str, Expression)>) -> Expression {
    e(ExpressionKind::Object(
        properties
            .into_iter()
            .map(|(key, value)| Property {
                key: PropertyKey::Identifier(key.to_string()),
                value,
            })
            .collect(),
    ))
}

/// Object literal with arbitrary keys.
pub fn object_with(properties: Vec<Property>) -> Expression {
    e(ExpressionKind::Object(properties))
}

/// `object.name`
pub fn member(object: Expression, name: &str) -> Expression {
    e(ExpressionKind::Member(MemberExpression {
        object: Box::new(object),
        property: MemberProperty::Identifier(name.to_string()),
    }))
}

/// `object[index]`
pub fn index(object: Expression, index: Expression) -> Expression {
    e(ExpressionKind::Member(MemberExpression {
        object: Box::new(object),
        property: MemberProperty::Computed(Box::new(index)),
    }))
}

/// `callee(arguments)`
pub fn call(callee: Expression, arguments: Vec<Expression>) -> Expression {
    e(ExpressionKind::Call(CallExpression {
        callee: Box::new(callee),
        arguments,
    }))
}

/// `expression as ty`
pub fn cast(expression: Expression, ty: &str) -> Expression {
    e(ExpressionKind::Cast(CastExpression {
        expression: Box::new(expression),
        ty: annotation(ty),
    }))
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

fn declare(kind: VariableKind, name: &str, ty: Option<&str>, init: Option<Expression>) -> VariableDeclaration {
    VariableDeclaration {
        kind,
        declarations: vec![VariableDeclarator {
            name: name.to_string(),
            ty: ty.map(annotation),
            init,
            span: Span::default(),
        }],
    }
}

/// `let name: ty = init`
pub fn let_(name: &str, ty: Option<&str>, init: Expression) -> Statement {
    s(StatementKind::VariableDeclaration(declare(
        VariableKind::Let,
        name,
        ty,
        Some(init),
    )))
}

/// `let name: ty` without initializer.
pub fn let_uninit(name: &str, ty: &str) -> Statement {
    s(StatementKind::VariableDeclaration(declare(
        VariableKind::Let,
        name,
        Some(ty),
        None,
    )))
}

/// `const name: ty = init`
pub fn const_(name: &str, ty: Option<&str>, init: Expression) -> Statement {
    s(StatementKind::VariableDeclaration(declare(
        VariableKind::Const,
        name,
        ty,
        Some(init),
    )))
}

/// `var name: ty = init`
pub fn var_(name: &str, ty: Option<&str>, init: Expression) -> Statement {
    s(StatementKind::VariableDeclaration(declare(
        VariableKind::Var,
        name,
        ty,
        Some(init),
    )))
}

/// Expression statement.
pub fn expr(expression: Expression) -> Statement {
    s(StatementKind::Expression(expression))
}

/// `{ body }`
pub fn block(body: Vec<Statement>) -> Statement {
    s(StatementKind::Block(body))
}

/// `if (test) consequent`
pub fn if_(test: Expression, consequent: Statement) -> Statement {
    s(StatementKind::If(IfStatement {
        test,
        consequent: Box::new(consequent),
        alternate: None,
    }))
}

/// `if (test) consequent else alternate`
pub fn if_else(test: Expression, consequent: Statement, alternate: Statement) -> Statement {
    s(StatementKind::If(IfStatement {
        test,
        consequent: Box::new(consequent),
        alternate: Some(Box::new(alternate)),
    }))
}

/// `while (test) body`
pub fn while_(test: Expression, body: Statement) -> Statement {
    s(StatementKind::While(WhileStatement {
        test,
        body: Box::new(body),
    }))
}

/// `do body while (test)`
pub fn do_while(body: Statement, test: Expression) -> Statement {
    s(StatementKind::DoWhile(DoWhileStatement {
        body: Box::new(body),
        test,
    }))
}

/// `for (init; test; update) body`
pub fn for_(
    init: Option<Statement>,
    test: Option<Expression>,
    update: Option<Expression>,
    body: Statement,
) -> Statement {
    let init = init.and_then(|stmt| match stmt.kind {
        StatementKind::VariableDeclaration(decl) => Some(ForInit::Declaration(decl)),
        StatementKind::Expression(expr) => Some(ForInit::Expression(expr)),
        _ => None,
    });
    s(StatementKind::For(ForStatement {
        init,
        test,
        update,
        body: Box::new(body),
    }))
}

/// `label: body`
pub fn labeled(label: &str, body: Statement) -> Statement {
    s(StatementKind::Labeled(LabeledStatement {
        label: label.to_string(),
        body: Box::new(body),
    }))
}

/// `break` / `break label`
pub fn break_(label: Option<&str>) -> Statement {
    s(StatementKind::Break(label.map(str::to_string)))
}

/// `continue` / `continue label`
pub fn continue_(label: Option<&str>) -> Statement {
    s(StatementKind::Continue(label.map(str::to_string)))
}

/// `return value`
pub fn ret(value: Expression) -> Statement {
    s(StatementKind::Return(Some(value)))
}

/// `return`
pub fn ret_void() -> Statement {
    s(StatementKind::Return(None))
}

/// `;`
pub fn empty() -> Statement {
    s(StatementKind::Empty)
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// A module from its classes.
pub fn module(classes: Vec<ClassDeclaration>) -> Module {
    Module { classes }
}

/// An empty class declaration, extended with [`ClassDeclaration::field`]
/// and [`ClassDeclaration::method`].
pub fn class(name: &str) -> ClassDeclaration {
    ClassDeclaration {
        name: name.to_string(),
        fields: Vec::new(),
        methods: Vec::new(),
        span: Span::default(),
    }
}

/// An instance method with no parameters and no return annotation.
pub fn method(name: &str, body: Vec<Statement>) -> MethodDeclaration {
    MethodDeclaration {
        name: name.to_string(),
        params: Vec::new(),
        return_type: None,
        is_static: false,
        body,
        span: Span::default(),
    }
}

/// An instance field.
pub fn field(name: &str, ty: Option<&str>, init: Option<Expression>) -> FieldDeclaration {
    FieldDeclaration {
        name: name.to_string(),
        ty: ty.map(annotation),
        is_static: false,
        init,
        span: Span::default(),
    }
}

impl ClassDeclaration {
    /// Appends a field.
    pub fn field(mut self, field: FieldDeclaration) -> Self {
        self.fields.push(field);
        self
    }

    /// Appends a method.
    pub fn method(mut self, method: MethodDeclaration) -> Self {
        self.methods.push(method);
        self
    }
}

impl FieldDeclaration {
    /// Marks the field static.
    pub fn static_(mut self) -> Self {
        self.is_static = true;
        self
    }
}

impl MethodDeclaration {
    /// Appends a typed parameter.
    pub fn param(mut self, name: &str, ty: &str) -> Self {
        self.params.push(Parameter {
            name: name.to_string(),
            ty: Some(annotation(ty)),
        });
        self
    }

    /// Sets the return type annotation.
    pub fn returns(mut self, ty: &str) -> Self {
        self.return_type = Some(annotation(ty));
        self
    }

    /// Marks the method static.
    pub fn static_(mut self) -> Self {
        self.is_static = true;
        self
    }
}
