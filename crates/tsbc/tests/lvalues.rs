// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Assignment, compound assignment and delete across locals, fields,
//! statics, arrays, lists and maps.

mod common;

use common::*;
use tsbc::ast::build::*;
use tsbc::ast::{AssignOperator, NodeKind};
use tsbc::{CompileError, Runtime, RuntimeError, Value};

fn key_call() -> tsbc::ast::Expression {
    call(member(ident("Main"), "key"), vec![])
}

/// `Main.key()` bumps `Main.calls` and returns `"a"`.
fn key_method() -> tsbc::ast::MethodDeclaration {
    method(
        "key",
        vec![expr(post_inc(member(ident("Main"), "calls"))), ret(string("a"))],
    )
    .returns("string")
    .static_()
}

#[test]
fn test_computed_key_is_evaluated_once() {
    let body = vec![
        const_("m", None, object(vec![("a", num("1"))])),
        expr(assign_op(AssignOperator::Add, index(ident("m"), key_call()), num("5"))),
        expr(post_inc(index(ident("m"), key_call()))),
        ret(add(mul(member(ident("m"), "a"), num("10")), member(ident("Main"), "calls"))),
    ];
    let module = module(vec![class("Main")
        .field(field("calls", Some("int"), Some(num("0"))).static_())
        .method(key_method())
        .method(main("int", body))]);
    // m.a = 1 + 5 + 1 = 7, key() ran twice.
    assert_eq!(run(&compile(&module)), Value::Int(72));
}

#[test]
fn test_assignment_result_is_stored_value() {
    // a = b = 300 where b is a byte.
    let result = eval(
        "int",
        vec![
            let_uninit("a", "int"),
            let_uninit("b", "byte"),
            expr(assign(ident("a"), assign(ident("b"), num("300")))),
            ret(ident("a")),
        ],
    );
    assert_eq!(result, Value::Int(44));
}

#[test]
fn test_compound_assignment_narrows_implicitly() {
    let result = eval(
        "short",
        vec![
            let_("s", Some("short"), num("32767")),
            expr(assign_op(AssignOperator::Add, ident("s"), num("1"))),
            ret(ident("s")),
        ],
    );
    assert_eq!(result, Value::Short(-32768));

    let result = eval(
        "int",
        vec![
            let_("i", Some("int"), num("10")),
            expr(assign_op(AssignOperator::Multiply, ident("i"), num("2.75"))),
            ret(ident("i")),
        ],
    );
    assert_eq!(result, Value::Int(27));
}

#[test]
fn test_compound_string_append() {
    let result = eval(
        "string",
        vec![
            let_("s", Some("string"), string("n")),
            expr(assign_op(AssignOperator::Add, ident("s"), num("1"))),
            expr(assign_op(AssignOperator::Add, ident("s"), boolean(false))),
            ret(ident("s")),
        ],
    );
    assert_eq!(result, Value::from("n1false"));
}

#[test]
fn test_shift_assignments() {
    let result = eval(
        "long",
        vec![
            let_("l", Some("long"), num("1")),
            expr(assign_op(AssignOperator::LeftShift, ident("l"), num("40"))),
            expr(assign_op(AssignOperator::UnsignedRightShift, ident("l"), num("8"))),
            ret(ident("l")),
        ],
    );
    assert_eq!(result, Value::Long(1 << 32));
}

#[test]
fn test_field_and_static_assignment() {
    let set = method(
        "set",
        vec![
            expr(assign(member(this(), "name"), ident("value"))),
            expr(assign_op(AssignOperator::Add, member(ident("Box"), "writes"), num("1"))),
        ],
    )
    .param("value", "string")
    .returns("void");
    let module = module(vec![class("Box")
        .field(field("name", Some("string"), Some(string("empty"))))
        .field(field("writes", Some("int"), None).static_())
        .method(set)
        .method(method("get", vec![ret(member(this(), "name"))]).returns("string"))]);
    let compiled = compile(&module);
    let mut runtime = Runtime::new(&compiled).unwrap();
    let boxed = runtime.instantiate("Box").unwrap();
    assert_eq!(runtime.invoke(&boxed, "get", &[]).unwrap(), Value::from("empty"));
    runtime.invoke(&boxed, "set", &[Value::from("full")]).unwrap();
    assert_eq!(runtime.invoke(&boxed, "get", &[]).unwrap(), Value::from("full"));
    assert_eq!(runtime.get_static("Box", "writes"), Some(Value::Int(1)));
}

#[test]
fn test_array_store_and_length() {
    let result = eval(
        "int",
        vec![
            let_("a", Some("byte[]"), array(vec![num("1"), num("2")])),
            expr(assign(index(ident("a"), num("1")), num("255"))),
            ret(add(index(ident("a"), num("1")), member(ident("a"), "length"))),
        ],
    );
    assert_eq!(result, Value::Int(-1 + 2));
}

#[test]
fn test_array_index_out_of_bounds() {
    let module = main_module(
        "int",
        vec![
            let_("a", Some("int[]"), array(vec![num("1")])),
            ret(index(ident("a"), num("3"))),
        ],
    );
    let compiled = compile(&module);
    let mut runtime = Runtime::new(&compiled).unwrap();
    let err = runtime.invoke_static("Main", "main", &[]).unwrap_err();
    assert_eq!(err, RuntimeError::ArrayIndexOutOfBounds { index: 3, length: 1 });
}

#[test]
fn test_length_is_read_only() {
    let err = compile_err(&main_module(
        "void",
        vec![
            let_("a", Some("int[]"), array(vec![])),
            expr(assign(member(ident("a"), "length"), num("3"))),
        ],
    ));
    assert!(matches!(err, CompileError::InvalidLvalue { node: NodeKind::Member, .. }));
}

#[test]
fn test_delete_list_element_and_map_entry() {
    let result = eval(
        "string",
        vec![
            const_("list", None, array(vec![num("1"), num("2"), num("3")])),
            const_("map", None, object(vec![("a", num("1")), ("b", num("2"))])),
            let_("removed", Some("boolean"), delete(index(ident("list"), num("0")))),
            let_("missing", Some("boolean"), delete(member(ident("map"), "z"))),
            expr(delete(member(ident("map"), "a"))),
            ret(add(
                add(add(add(string(""), ident("list")), ident("map")), ident("removed")),
                ident("missing"),
            )),
        ],
    );
    assert_eq!(result, Value::from("[2, 3]{b=2}truefalse"));
}

#[test]
fn test_delete_array_element_is_rejected() {
    let err = compile_err(&main_module(
        "void",
        vec![
            let_("a", Some("int[]"), array(vec![num("1")])),
            expr(delete(index(ident("a"), num("0")))),
        ],
    ));
    assert!(matches!(err, CompileError::InvalidLvalue { .. }));
}

#[test]
fn test_assign_to_const_is_rejected() {
    let err = compile_err(&main_module(
        "void",
        vec![const_("x", Some("int"), num("1")), expr(assign(ident("x"), num("2")))],
    ));
    assert!(matches!(err, CompileError::TypeError { .. }));
}

#[test]
fn test_assign_to_call_is_rejected() {
    let module = module(vec![class("Main")
        .field(field("calls", Some("int"), None).static_())
        .method(key_method())
        .method(main("void", vec![expr(assign(key_call(), string("b")))]))]);
    let err = compile_err(&module);
    assert!(matches!(err, CompileError::InvalidLvalue { node: NodeKind::Call, .. }));
}

#[test]
fn test_unknown_identifier() {
    let err = compile_err(&main_module("void", vec![expr(assign(ident("nope"), num("1")))]));
    assert!(matches!(err, CompileError::UnknownIdentifier { ref name, .. } if name == "nope"));
}
