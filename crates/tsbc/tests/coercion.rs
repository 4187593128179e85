// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Implicit and explicit conversions between primitive, boxed, bigint and
//! opaque values.

mod common;

use common::*;
use tsbc::ast::build::*;
use tsbc::ast::BinaryOperator;
use tsbc::{CompileError, Runtime, RuntimeError, Value};

#[test]
fn test_bigint_literal_truncates_into_long() {
    let result = eval(
        "long",
        vec![let_("l", Some("long"), bigint("9223372036854775808n")), ret(ident("l"))],
    );
    assert_eq!(result, Value::Long(i64::MIN));
}

#[test]
fn test_bigint_variable_truncates_into_int() {
    let result = eval(
        "int",
        vec![let_("n", Some("bigint"), bigint("4294967297n")), ret(cast(ident("n"), "int"))],
    );
    assert_eq!(result, Value::Int(1));
}

#[test]
fn test_long_widens_into_bigint() {
    let result = eval(
        "bigint",
        vec![
            let_("l", Some("long"), num("9223372036854775807")),
            let_("n", Some("bigint"), ident("l")),
            ret(add(ident("n"), bigint("1n"))),
        ],
    );
    assert_eq!(result, Value::BigInt("9223372036854775808".parse().unwrap()));
}

#[test]
fn test_literal_out_of_range_folds_to_target() {
    assert_eq!(eval("byte", vec![ret(num("200"))]), Value::Byte(-56));
    assert_eq!(eval("short", vec![ret(num("65537"))]), Value::Short(1));
    assert_eq!(eval("int", vec![ret(num("4294967298"))]), Value::Int(2));
    assert_eq!(eval("int", vec![ret(neg(num("2147483648")))]), Value::Int(i32::MIN));
}

#[test]
fn test_explicit_narrowing_casts() {
    let result = eval(
        "byte",
        vec![let_("i", Some("int"), num("300")), ret(cast(ident("i"), "byte"))],
    );
    assert_eq!(result, Value::Byte(44));
}

#[test]
fn test_floating_to_integral_saturates() {
    let big = eval(
        "int",
        vec![let_("d", Some("double"), num("1e20")), ret(cast(ident("d"), "int"))],
    );
    assert_eq!(big, Value::Int(i32::MAX));

    let nan = eval(
        "long",
        vec![
            let_("d", Some("double"), binary(BinaryOperator::Divide, num("0.0"), num("0.0"))),
            ret(cast(ident("d"), "long")),
        ],
    );
    assert_eq!(nan, Value::Long(0));
}

#[test]
fn test_mixed_arithmetic_promotes() {
    // 7 / 2 in int, then 7 / 2.0 in double.
    let result = eval(
        "double",
        vec![
            let_("i", Some("int"), num("7")),
            let_("half", Some("int"), binary(BinaryOperator::Divide, ident("i"), num("2"))),
            ret(add(ident("half"), binary(BinaryOperator::Divide, ident("i"), num("2.0")))),
        ],
    );
    assert_eq!(result, Value::Double(3.0 + 3.5));
}

#[test]
fn test_boxed_values_unbox_for_arithmetic() {
    let result = eval(
        "int",
        vec![
            let_("boxed", Some("Integer"), num("40")),
            ret(add(ident("boxed"), num("2"))),
        ],
    );
    assert_eq!(result, Value::Int(42));
}

#[test]
fn test_opaque_values_cast_back() {
    let result = eval(
        "long",
        vec![
            let_("a", Some("any"), num("5")),
            let_("n", Some("int"), cast(ident("a"), "int")),
            ret(mul(ident("n"), num("3000000000"))),
        ],
    );
    assert_eq!(result, Value::Long(15_000_000_000));
}

#[test]
fn test_opaque_cast_to_wrong_type_fails_at_runtime() {
    let module = main_module(
        "int",
        vec![let_("a", Some("any"), string("five")), ret(cast(ident("a"), "int"))],
    );
    let compiled = compile(&module);
    let mut runtime = Runtime::new(&compiled).unwrap();
    let err = runtime.invoke_static("Main", "main", &[]).unwrap_err();
    assert!(matches!(err, RuntimeError::ClassCast(_)));
}

#[test]
fn test_string_concatenation_formats_operands() {
    let result = eval(
        "string",
        vec![
            let_("d", Some("double"), num("1.5")),
            ret(add(add(add(string("x="), ident("d")), string(",")), boolean(true))),
        ],
    );
    assert_eq!(result, Value::from("x=1.5,true"));

    let result = eval("string", vec![ret(add(num("1"), add(num("2"), string("3"))))]);
    assert_eq!(result, Value::from("123"));
}

#[test]
fn test_typeof_static_and_dynamic() {
    let result = eval(
        "string",
        vec![
            let_("a", Some("any"), bigint("1n")),
            ret(add(
                add(add(type_of(num("1")), string(" ")), add(type_of(string("s")), string(" "))),
                type_of(ident("a")),
            )),
        ],
    );
    assert_eq!(result, Value::from("number string bigint"));
}

#[test]
fn test_typeof_evaluates_its_operand() {
    let result = eval(
        "int",
        vec![let_("x", Some("int"), num("1")), expr(type_of(post_inc(ident("x")))), ret(ident("x"))],
    );
    assert_eq!(result, Value::Int(2));

    // The static tag of x++ and the dynamic tag of a map store.
    let result = eval(
        "string",
        vec![
            let_("x", Some("int"), num("1")),
            const_("m", None, object(vec![("n", num("1"))])),
            let_("tag", Some("string"), type_of(post_inc(ident("x")))),
            let_("stored", Some("string"), type_of(assign(member(ident("m"), "n"), string("7")))),
            ret(add(add(add(ident("tag"), ident("stored")), ident("x")), member(ident("m"), "n"))),
        ],
    );
    assert_eq!(result, Value::from("numberstring27"));
}

#[test]
fn test_opaque_equality_compares_values() {
    let result = eval(
        "boolean",
        vec![let_("a", Some("any"), string("hi")), ret(eq(ident("a"), string("hi")))],
    );
    assert_eq!(result, Value::Boolean(true));
}

#[test]
fn test_null_into_primitive_is_rejected() {
    let err = compile_err(&main_module("int", vec![let_("x", Some("int"), null())]));
    assert!(matches!(err, CompileError::TypeError { .. }));
}

#[test]
fn test_string_into_number_is_rejected() {
    let err = compile_err(&main_module("int", vec![ret(string("1"))]));
    assert!(matches!(err, CompileError::TypeError { .. }));
}
