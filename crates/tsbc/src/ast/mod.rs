// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed AST consumed by the compiler.
//!
//! The shape follows the ESTree conventions of TypeScript front ends, with
//! one difference that matters to code generation: numeric and bigint
//! literals keep their raw source text, so radix prefixes, digit separators
//! and out-of-range magnitudes survive until a target type is known.
//!
//! Producing this tree is the job of an external parser. The [`build`]
//! module offers constructor helpers for hosts and tests.

pub mod build;

use std::fmt;

/// A byte range in the original source text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span {
    /// Start offset (inclusive)
    pub start: u32,
    /// End offset (exclusive)
    pub end: u32,
}

impl Span {
    /// Creates a new span.
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// The kind of an AST node, carried by diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Numeric literal
    NumberLiteral,
    /// Bigint literal
    BigIntLiteral,
    /// String literal
    StringLiteral,
    /// Boolean literal
    BooleanLiteral,
    /// `null`
    NullLiteral,
    /// Identifier reference
    Identifier,
    /// `this`
    This,
    /// Unary expression
    Unary,
    /// Update expression (`++`/`--`)
    Update,
    /// Binary expression
    Binary,
    /// Assignment expression
    Assign,
    /// Conditional expression
    Conditional,
    /// Parenthesized expression
    Paren,
    /// Array literal
    ArrayLiteral,
    /// Object literal
    ObjectLiteral,
    /// Member access
    Member,
    /// Call expression
    Call,
    /// `as` cast
    Cast,
    /// Variable declaration
    VariableDeclaration,
    /// Expression statement
    ExpressionStatement,
    /// Block statement
    Block,
    /// If statement
    If,
    /// While statement
    While,
    /// Do-while statement
    DoWhile,
    /// For statement
    For,
    /// Labeled statement
    Labeled,
    /// Break statement
    Break,
    /// Continue statement
    Continue,
    /// Return statement
    Return,
    /// Empty statement
    Empty,
    /// Class declaration
    Class,
    /// Class method
    Method,
    /// Class field
    Field,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::NumberLiteral => "number literal",
            NodeKind::BigIntLiteral => "bigint literal",
            NodeKind::StringLiteral => "string literal",
            NodeKind::BooleanLiteral => "boolean literal",
            NodeKind::NullLiteral => "null literal",
            NodeKind::Identifier => "identifier",
            NodeKind::This => "this",
            NodeKind::Unary => "unary expression",
            NodeKind::Update => "update expression",
            NodeKind::Binary => "binary expression",
            NodeKind::Assign => "assignment",
            NodeKind::Conditional => "conditional expression",
            NodeKind::Paren => "parenthesized expression",
            NodeKind::ArrayLiteral => "array literal",
            NodeKind::ObjectLiteral => "object literal",
            NodeKind::Member => "member expression",
            NodeKind::Call => "call expression",
            NodeKind::Cast => "cast expression",
            NodeKind::VariableDeclaration => "variable declaration",
            NodeKind::ExpressionStatement => "expression statement",
            NodeKind::Block => "block",
            NodeKind::If => "if statement",
            NodeKind::While => "while statement",
            NodeKind::DoWhile => "do-while statement",
            NodeKind::For => "for statement",
            NodeKind::Labeled => "labeled statement",
            NodeKind::Break => "break statement",
            NodeKind::Continue => "continue statement",
            NodeKind::Return => "return statement",
            NodeKind::Empty => "empty statement",
            NodeKind::Class => "class declaration",
            NodeKind::Method => "method",
            NodeKind::Field => "field",
        };
        f.write_str(name)
    }
}

/// A compilation unit: a list of classes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    /// The classes declared in this module
    pub classes: Vec<ClassDeclaration>,
}

/// A source-level type annotation, kept as written (`int`, `byte[]`, `Integer`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeAnnotation {
    /// The annotation text
    pub text: String,
    /// Where it was written
    pub span: Span,
}

/// A class declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDeclaration {
    /// Class name
    pub name: String,
    /// Field declarations
    pub fields: Vec<FieldDeclaration>,
    /// Method declarations
    pub methods: Vec<MethodDeclaration>,
    /// Source span
    pub span: Span,
}

/// A class field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDeclaration {
    /// Field name
    pub name: String,
    /// Declared type
    pub ty: Option<TypeAnnotation>,
    /// Whether the field is static
    pub is_static: bool,
    /// Optional initializer
    pub init: Option<Expression>,
    /// Source span
    pub span: Span,
}

/// A method parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Declared type
    pub ty: Option<TypeAnnotation>,
}

/// A class method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDeclaration {
    /// Method name
    pub name: String,
    /// Parameters
    pub params: Vec<Parameter>,
    /// Declared return type
    pub return_type: Option<TypeAnnotation>,
    /// Whether the method is static
    pub is_static: bool,
    /// Method body
    pub body: Vec<Statement>,
    /// Source span
    pub span: Span,
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    /// What kind of expression this is
    pub kind: ExpressionKind,
    /// Source span
    pub span: Span,
}

/// Expression variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    /// Numeric literal, raw text (`42`, `0x1F`, `1_000`, `2.5e3`)
    Number(String),
    /// Bigint literal, raw text (`123n`, `0xFFn`)
    BigInt(String),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),
    /// `null`
    Null,
    /// Identifier reference
    Identifier(String),
    /// `this`
    This,
    /// Unary expression
    Unary(UnaryExpression),
    /// `++`/`--` expression
    Update(UpdateExpression),
    /// Binary or logical expression
    Binary(BinaryExpression),
    /// Assignment expression
    Assign(AssignExpression),
    /// `test ? consequent : alternate`
    Conditional(ConditionalExpression),
    /// `(expr)`
    Paren(Box<Expression>),
    /// `[a, b, c]`
    Array(Vec<Expression>),
    /// `{ key: value }`
    Object(Vec<Property>),
    /// `obj.prop` / `obj[expr]`
    Member(MemberExpression),
    /// `callee(args)`
    Call(CallExpression),
    /// `expr as T`
    Cast(CastExpression),
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// `!`
    LogicalNot,
    /// `-`
    Minus,
    /// `+`
    Plus,
    /// `~`
    BitwiseNot,
    /// `typeof`
    TypeOf,
    /// `void`
    Void,
    /// `delete`
    Delete,
}

/// A unary expression.
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpression {
    /// The operator
    pub operator: UnaryOperator,
    /// The operand
    pub argument: Box<Expression>,
}

/// Update operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOperator {
    /// `++`
    Increment,
    /// `--`
    Decrement,
}

/// An update expression.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateExpression {
    /// The operator
    pub operator: UpdateOperator,
    /// `++x` when true, `x++` when false
    pub prefix: bool,
    /// The update target
    pub argument: Box<Expression>,
}

/// Binary and logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Modulo,
    /// `&`
    BitwiseAnd,
    /// `|`
    BitwiseOr,
    /// `^`
    BitwiseXor,
    /// `<<`
    LeftShift,
    /// `>>`
    RightShift,
    /// `>>>`
    UnsignedRightShift,
    /// `<`
    LessThan,
    /// `<=`
    LessThanEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanEqual,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `===`
    StrictEqual,
    /// `!==`
    StrictNotEqual,
    /// `&&`
    LogicalAnd,
    /// `||`
    LogicalOr,
}

impl BinaryOperator {
    /// Returns true for relational and equality operators.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::LessThan
                | BinaryOperator::LessThanEqual
                | BinaryOperator::GreaterThan
                | BinaryOperator::GreaterThanEqual
                | BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::StrictEqual
                | BinaryOperator::StrictNotEqual
        )
    }

    /// Returns true for `==`, `!=`, `===` and `!==`.
    pub fn is_equality(self) -> bool {
        matches!(
            self,
            BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::StrictEqual
                | BinaryOperator::StrictNotEqual
        )
    }

    /// Returns true for `&&` and `||`.
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOperator::LogicalAnd | BinaryOperator::LogicalOr)
    }

    /// Returns true for shift operators.
    pub fn is_shift(self) -> bool {
        matches!(
            self,
            BinaryOperator::LeftShift
                | BinaryOperator::RightShift
                | BinaryOperator::UnsignedRightShift
        )
    }

    /// Returns true for `&`, `|` and `^`.
    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            BinaryOperator::BitwiseAnd | BinaryOperator::BitwiseOr | BinaryOperator::BitwiseXor
        )
    }

    /// The source token.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::BitwiseAnd => "&",
            BinaryOperator::BitwiseOr => "|",
            BinaryOperator::BitwiseXor => "^",
            BinaryOperator::LeftShift => "<<",
            BinaryOperator::RightShift => ">>",
            BinaryOperator::UnsignedRightShift => ">>>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanEqual => ">=",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::StrictEqual => "===",
            BinaryOperator::StrictNotEqual => "!==",
            BinaryOperator::LogicalAnd => "&&",
            BinaryOperator::LogicalOr => "||",
        }
    }
}

/// A binary expression.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpression {
    /// The operator
    pub operator: BinaryOperator,
    /// Left operand
    pub left: Box<Expression>,
    /// Right operand
    pub right: Box<Expression>,
}

/// Assignment operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOperator {
    /// `=`
    Assign,
    /// `+=`
    Add,
    /// `-=`
    Subtract,
    /// `*=`
    Multiply,
    /// `/=`
    Divide,
    /// `%=`
    Modulo,
    /// `&=`
    BitwiseAnd,
    /// `|=`
    BitwiseOr,
    /// `^=`
    BitwiseXor,
    /// `<<=`
    LeftShift,
    /// `>>=`
    RightShift,
    /// `>>>=`
    UnsignedRightShift,
}

impl AssignOperator {
    /// The binary operator a compound assignment applies.
    pub fn binary(self) -> Option<BinaryOperator> {
        Some(match self {
            AssignOperator::Assign => return None,
            AssignOperator::Add => BinaryOperator::Add,
            AssignOperator::Subtract => BinaryOperator::Subtract,
            AssignOperator::Multiply => BinaryOperator::Multiply,
            AssignOperator::Divide => BinaryOperator::Divide,
            AssignOperator::Modulo => BinaryOperator::Modulo,
            AssignOperator::BitwiseAnd => BinaryOperator::BitwiseAnd,
            AssignOperator::BitwiseOr => BinaryOperator::BitwiseOr,
            AssignOperator::BitwiseXor => BinaryOperator::BitwiseXor,
            AssignOperator::LeftShift => BinaryOperator::LeftShift,
            AssignOperator::RightShift => BinaryOperator::RightShift,
            AssignOperator::UnsignedRightShift => BinaryOperator::UnsignedRightShift,
        })
    }
}

/// An assignment expression.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignExpression {
    /// The operator
    pub operator: AssignOperator,
    /// Assignment target
    pub target: Box<Expression>,
    /// Assigned value
    pub value: Box<Expression>,
}

/// A conditional (ternary) expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalExpression {
    /// The condition
    pub test: Box<Expression>,
    /// Value when true
    pub consequent: Box<Expression>,
    /// Value when false
    pub alternate: Box<Expression>,
}

/// Object literal property key.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKey {
    /// `name: value`
    Identifier(String),
    /// `"name": value`
    String(String),
    /// `[expr]: value`
    Computed(Expression),
}

/// An object literal property.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// The key
    pub key: PropertyKey,
    /// The value
    pub value: Expression,
}

/// The property part of a member expression.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberProperty {
    /// `obj.name`
    Identifier(String),
    /// `obj[expr]`
    Computed(Box<Expression>),
}

/// A member expression.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberExpression {
    /// The object
    pub object: Box<Expression>,
    /// The property
    pub property: MemberProperty,
}

/// A call expression.
#[derive(Debug, Clone, PartialEq)]
pub struct CallExpression {
    /// The callee
    pub callee: Box<Expression>,
    /// Positional arguments
    pub arguments: Vec<Expression>,
}

/// An `as` cast.
#[derive(Debug, Clone, PartialEq)]
pub struct CastExpression {
    /// The value being cast
    pub expression: Box<Expression>,
    /// The target type
    pub ty: TypeAnnotation,
}

impl Expression {
    /// Creates an expression with the given span.
    pub fn new(kind: ExpressionKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// The node kind, for diagnostics.
    pub fn node_kind(&self) -> NodeKind {
        match &self.kind {
            ExpressionKind::Number(_) => NodeKind::NumberLiteral,
            ExpressionKind::BigInt(_) => NodeKind::BigIntLiteral,
            ExpressionKind::String(_) => NodeKind::StringLiteral,
            ExpressionKind::Boolean(_) => NodeKind::BooleanLiteral,
            ExpressionKind::Null => NodeKind::NullLiteral,
            ExpressionKind::Identifier(_) => NodeKind::Identifier,
            ExpressionKind::This => NodeKind::This,
            ExpressionKind::Unary(_) => NodeKind::Unary,
            ExpressionKind::Update(_) => NodeKind::Update,
            ExpressionKind::Binary(_) => NodeKind::Binary,
            ExpressionKind::Assign(_) => NodeKind::Assign,
            ExpressionKind::Conditional(_) => NodeKind::Conditional,
            ExpressionKind::Paren(_) => NodeKind::Paren,
            ExpressionKind::Array(_) => NodeKind::ArrayLiteral,
            ExpressionKind::Object(_) => NodeKind::ObjectLiteral,
            ExpressionKind::Member(_) => NodeKind::Member,
            ExpressionKind::Call(_) => NodeKind::Call,
            ExpressionKind::Cast(_) => NodeKind::Cast,
        }
    }
}

/// A statement node.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// What kind of statement this is
    pub kind: StatementKind,
    /// Source span
    pub span: Span,
}

/// Statement variants.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    /// `let`/`const`/`var` declaration
    VariableDeclaration(VariableDeclaration),
    /// Expression statement
    Expression(Expression),
    /// `{ ... }`
    Block(Vec<Statement>),
    /// `if (test) consequent else alternate`
    If(IfStatement),
    /// `while (test) body`
    While(WhileStatement),
    /// `do body while (test)`
    DoWhile(DoWhileStatement),
    /// `for (init; test; update) body`
    For(ForStatement),
    /// `label: body`
    Labeled(LabeledStatement),
    /// `break` with optional label
    Break(Option<String>),
    /// `continue` with optional label
    Continue(Option<String>),
    /// `return` with optional value
    Return(Option<Expression>),
    /// `;`
    Empty,
}

/// Variable declaration kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// var declaration
    Var,
    /// let declaration
    Let,
    /// const declaration
    Const,
}

/// A variable declaration statement.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    /// The kind of declaration
    pub kind: VariableKind,
    /// The declarators
    pub declarations: Vec<VariableDeclarator>,
}

/// A single variable declarator.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclarator {
    /// The declared name
    pub name: String,
    /// Optional type annotation
    pub ty: Option<TypeAnnotation>,
    /// Optional initializer expression
    pub init: Option<Expression>,
    /// Source span
    pub span: Span,
}

/// An if statement.
#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    /// The condition
    pub test: Expression,
    /// The then branch
    pub consequent: Box<Statement>,
    /// The optional else branch
    pub alternate: Option<Box<Statement>>,
}

/// A while statement.
#[derive(Debug, Clone, PartialEq)]
pub struct WhileStatement {
    /// The condition
    pub test: Expression,
    /// The loop body
    pub body: Box<Statement>,
}

/// A do-while statement.
#[derive(Debug, Clone, PartialEq)]
pub struct DoWhileStatement {
    /// The loop body
    pub body: Box<Statement>,
    /// The condition
    pub test: Expression,
}

/// For loop initializer.
#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    /// Variable declaration
    Declaration(VariableDeclaration),
    /// Expression
    Expression(Expression),
}

/// A for statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ForStatement {
    /// The initializer
    pub init: Option<ForInit>,
    /// The condition
    pub test: Option<Expression>,
    /// The update expression
    pub update: Option<Expression>,
    /// The loop body
    pub body: Box<Statement>,
}

/// A labeled statement.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledStatement {
    /// The label name
    pub label: String,
    /// The labeled statement
    pub body: Box<Statement>,
}

impl Statement {
    /// Creates a statement with the given span.
    pub fn new(kind: StatementKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// The node kind, for diagnostics.
    pub fn node_kind(&self) -> NodeKind {
        match &self.kind {
            StatementKind::VariableDeclaration(_) => NodeKind::VariableDeclaration,
            StatementKind::Expression(_) => NodeKind::ExpressionStatement,
            StatementKind::Block(_) => NodeKind::Block,
            StatementKind::If(_) => NodeKind::If,
            StatementKind::While(_) => NodeKind::While,
            StatementKind::DoWhile(_) => NodeKind::DoWhile,
            StatementKind::For(_) => NodeKind::For,
            StatementKind::Labeled(_) => NodeKind::Labeled,
            StatementKind::Break(_) => NodeKind::Break,
            StatementKind::Continue(_) => NodeKind::Continue,
            StatementKind::Return(_) => NodeKind::Return,
            StatementKind::Empty => NodeKind::Empty,
        }
    }

    /// Returns true for the loop statements a label may attach to.
    pub fn is_loop(&self) -> bool {
        matches!(
            self.kind,
            StatementKind::While(_) | StatementKind::DoWhile(_) | StatementKind::For(_)
        )
    }
}
