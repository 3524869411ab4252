//! Integration tests for compilation and expression evaluation.

use std::collections::BTreeMap;

use l20n::compiler::{Entry, RuntimeError, Scope, compile};
use l20n::parser::parse_strict;
use l20n::{Data, data};

fn env_of(source: &str) -> l20n::compiler::Env {
    let ast = parse_strict(source).expect("source should parse");
    let (mut env, errors) = compile(&ast);
    assert!(errors.is_empty(), "unexpected compilation errors: {errors:?}");
    env.add_builtin_plural("en");
    env
}

fn entity<'e>(env: &'e l20n::compiler::Env, id: &str) -> &'e l20n::compiler::Entity {
    match env.get(id) {
        Some(Entry::Entity(entity)) => entity,
        _ => panic!("expected entity {id}"),
    }
}

fn resolve(source: &str, id: &str, args: &BTreeMap<String, Data>) -> String {
    let env = env_of(source);
    let scope = Scope::new(&env, args, None);
    entity(&env, id)
        .get_string(&scope)
        .expect("resolution should succeed")
        .expect("entity should have a value")
}

fn resolve_err(source: &str, id: &str, args: &BTreeMap<String, Data>) -> RuntimeError {
    let env = env_of(source);
    let scope = Scope::new(&env, args, None);
    entity(&env, id)
        .get_string(&scope)
        .expect_err("resolution should fail")
}

// =============================================================================
// Literals
// =============================================================================

#[test]
fn non_complex_literal_is_returned_exactly_as_written() {
    // escape sequences survive untouched on the constant fast path
    let text = resolve(r#"<a "say \"hi\"">"#, "a", &data! {});
    assert_eq!(text, r#"say \"hi\""#);
}

#[test]
fn complex_string_substitutes_variables() {
    let args = data! { "name" => "World" };
    assert_eq!(
        resolve(r#"<greet "Hello, {{ $name }}!">"#, "greet", &args),
        "Hello, World!"
    );
}

#[test]
fn numbers_in_placeables_format_without_fraction() {
    let args = data! { "n" => 5 };
    assert_eq!(resolve(r#"<count "{{ $n }} new">"#, "count", &args), "5 new");
}

#[test]
fn escaped_placeable_in_complex_string_stays_literal() {
    let args = data! { "n" => 5 };
    assert_eq!(
        resolve(r#"<a "\{{ kept }} and {{ $n }}">"#, "a", &args),
        "{{ kept }} and 5"
    );
}

#[test]
fn boolean_placeable_is_a_type_error() {
    let args = data! { "flag" => true };
    let err = resolve_err(r#"<a "{{ $flag }}">"#, "a", &args);
    assert!(err.to_string().contains("strings or numbers"));
}

// =============================================================================
// Self-reference bubbling
// =============================================================================

#[test]
fn this_keeps_meaning_the_referenced_entity() {
    let source = r#"
        <brandName { *short: "Firefox", long: "Mozilla {{ ~ }}" }>
        <about "About {{ brandName.long }}">
    "#;
    assert_eq!(resolve(source, "about", &data! {}), "About Mozilla Firefox");
}

// =============================================================================
// Hash selection
// =============================================================================

#[test]
fn index_selects_a_branch() {
    let source = r#"<p[$n] {one: "one", other: "many"}>"#;
    assert_eq!(resolve(source, "p", &data! { "n" => "one" }), "one");
    assert_eq!(resolve(source, "p", &data! { "n" => "other" }), "many");
}

#[test]
fn missing_key_without_default_is_an_index_error_naming_keys_tried() {
    let err = resolve_err(
        r#"<p[$n] {one: "one", other: "many"}>"#,
        "p",
        &data! { "n" => "missing" },
    );
    let RuntimeError::Index(index_err) = err else {
        panic!("expected an index error, got {err:?}");
    };
    assert!(index_err.message.contains("\"missing\""));
}

#[test]
fn default_key_catches_unmatched_indexes() {
    let source = r#"<p[$n] {one: "one", *other: "many"}>"#;
    assert_eq!(resolve(source, "p", &data! { "n" => "few" }), "many");
}

#[test]
fn nested_hashes_consume_index_slots_in_order() {
    let source = r#"<m[$outer, $inner] { a: { x: "ax", y: "ay" }, b: { x: "bx" } }>"#;
    let args = data! { "outer" => "a", "inner" => "y" };
    assert_eq!(resolve(source, "m", &args), "ay");
}

#[test]
fn non_string_index_is_an_index_error() {
    let err = resolve_err(r#"<p[1] {one: "one"}>"#, "p", &data! {});
    assert!(matches!(err, RuntimeError::Index(_)));
    assert!(err.to_string().contains("index must be a string"));
}

// =============================================================================
// Plural selection
// =============================================================================

#[test]
fn builtin_plural_selects_cldr_categories() {
    let source = r#"<cats[plural($n)] { one: "cat", *other: "cats" }>"#;
    assert_eq!(resolve(source, "cats", &data! { "n" => 1 }), "cat");
    assert_eq!(resolve(source, "cats", &data! { "n" => 5 }), "cats");
}

#[test]
fn source_defined_plural_shadows_the_builtin() {
    let source = r#"
        <plural($n) { "few" }>
        <x[plural($n)] { few: "F" }>
    "#;
    assert_eq!(resolve(source, "x", &data! { "n" => 1 }), "F");
}

// =============================================================================
// Macros
// =============================================================================

#[test]
fn macro_arity_is_exact() {
    let source = r#"
        <m($n) { $n }>
        <none "{{ m() }}">
        <two "{{ m(1, 2) }}">
        <one "{{ m(7) }}">
    "#;
    assert_eq!(resolve(source, "one", &data! {}), "7");

    let err = resolve_err(source, "none", &data! {});
    assert!(err.to_string().contains("takes exactly 1 argument(s) (0 given)"));

    let err = resolve_err(source, "two", &data! {});
    assert!(err.to_string().contains("takes exactly 1 argument(s) (2 given)"));
}

#[test]
fn conditional_macro_resolves_per_argument() {
    let source = r#"
        <plural($n) { $n == 1 ? "one" : "many" }>
        <emails[plural($n)] { one: "One email", many: "{{ $n }} emails" }>
    "#;
    assert_eq!(resolve(source, "emails", &data! { "n" => 1 }), "One email");
    assert_eq!(resolve(source, "emails", &data! { "n" => 3 }), "3 emails");
}

#[test]
fn resolving_an_uncalled_macro_is_an_error() {
    let source = r#"
        <m($n) { $n }>
        <bad "{{ m }}">
    "#;
    let err = resolve_err(source, "bad", &data! {});
    assert!(err.to_string().contains("uncalled macro"));
}

// =============================================================================
// Operators
// =============================================================================

#[test]
fn arithmetic_precedence() {
    let source = r#"
        <m($n) { 2 + $n * 4 }>
        <v "{{ m(3) }}">
    "#;
    assert_eq!(resolve(source, "v", &data! {}), "14");
}

#[test]
fn string_concatenation_with_plus() {
    let source = r#"
        <m($a) { $a + "!" }>
        <v "{{ m('go') }}">
    "#;
    assert_eq!(resolve(source, "v", &data! {}), "go!");
}

#[test]
fn mixed_operand_types_name_the_operator() {
    let source = r#"
        <m($a) { $a + 1 }>
        <v "{{ m('x') }}">
    "#;
    let err = resolve_err(source, "v", &data! {});
    assert!(err.to_string().contains("+ operator"));
}

#[test]
fn division_and_modulo_by_zero_are_errors() {
    let div = r#"
        <m($n) { $n / 0 }>
        <v "{{ m(4) }}">
    "#;
    assert!(resolve_err(div, "v", &data! {}).to_string().contains("division by zero"));

    let rem = r#"
        <m($n) { $n % 0 }>
        <v "{{ m(4) }}">
    "#;
    assert!(resolve_err(rem, "v", &data! {}).to_string().contains("modulo zero"));
}

#[test]
fn logical_operators_require_booleans() {
    let source = r#"
        <m($a, $b) { $a && $b ? "both" : "not both" }>
        <v "{{ m(1 == 1, 2 == 3) }}">
    "#;
    assert_eq!(resolve(source, "v", &data! {}), "not both");

    let bad = r#"
        <m($a) { $a && $a }>
        <v "{{ m(1) }}">
    "#;
    assert!(resolve_err(bad, "v", &data! {}).to_string().contains("two booleans"));
}

#[test]
fn conditional_test_must_be_boolean() {
    let source = r#"
        <m($n) { $n ? "y" : "n" }>
        <v "{{ m(1) }}">
    "#;
    let err = resolve_err(source, "v", &data! {});
    assert!(err.to_string().contains("must test a boolean"));
}

// =============================================================================
// Attributes and property access
// =============================================================================

#[test]
fn attribute_expression_reads_another_entitys_attribute() {
    let source = r#"
        <a "A" t: "Titled">
        <b "{{ a::t }}">
    "#;
    assert_eq!(resolve(source, "b", &data! {}), "Titled");
}

#[test]
fn entity_get_enumerates_public_attributes_only() {
    let source = r#"<login "Sign in" title: "Use your account" _internal: "x">"#;
    let env = env_of(source);
    let args = data! {};
    let scope = Scope::new(&env, &args, None);
    let value = entity(&env, "login").get(&scope).unwrap();
    assert_eq!(value.value.as_deref(), Some("Sign in"));
    assert_eq!(value.attributes.len(), 1);
    assert_eq!(value.attributes["title"], "Use your account");
}

#[test]
fn attribute_uses_its_own_index() {
    let source = r#"<w[$v] { m: "val-m", f: "val-f" } t[$a]: { m: "attr-m", f: "attr-f" }>"#;
    let env = env_of(source);
    let args = data! { "v" => "m", "a" => "f" };
    let scope = Scope::new(&env, &args, None);
    let value = entity(&env, "w").get(&scope).unwrap();
    assert_eq!(value.value.as_deref(), Some("val-m"));
    assert_eq!(value.attributes["t"], "attr-f");
}

#[test]
fn computed_property_selects_a_hash_member() {
    let source = r#"
        <h { a: "x", b: "y" }>
        <u "{{ h['b'] }}">
    "#;
    assert_eq!(resolve(source, "u", &data! {}), "y");
}

#[test]
fn property_access_walks_caller_data_objects() {
    let source = r#"<who "{{ $user.name }}">"#;
    let mut user = BTreeMap::new();
    user.insert("name".to_string(), Data::from("Ann"));
    let args = data! { "user" => Data::Map(user) };
    assert_eq!(resolve(source, "who", &args), "Ann");
}

#[test]
fn property_of_a_plain_string_is_an_error() {
    let source = r#"
        <a "plain">
        <b "{{ a.member }}">
    "#;
    let err = resolve_err(source, "b", &data! {});
    assert!(err.to_string().contains("cannot get property of a string"));
}

#[test]
fn valueless_entity_resolves_to_none() {
    let env = env_of(r#"<only t: "T">"#);
    let args = data! {};
    let scope = Scope::new(&env, &args, None);
    let value = entity(&env, "only").get(&scope).unwrap();
    assert_eq!(value.value, None);
    assert_eq!(value.attributes["t"], "T");
}

// =============================================================================
// Unknown references
// =============================================================================

#[test]
fn unknown_entry_suggests_close_matches() {
    let source = r#"
        <brandName "Firefox">
        <a "{{ brandNane }}">
    "#;
    let err = resolve_err(source, "a", &data! {});
    assert!(err.to_string().contains("unknown entry"));
    assert!(err.to_string().contains("did you mean brandName"));
}

#[test]
fn unknown_variable_is_an_error() {
    let err = resolve_err(r#"<a "{{ $nope }}">"#, "a", &data! {});
    assert!(err.to_string().contains("unknown variable: nope"));
}

// =============================================================================
// Cycle detection
// =============================================================================

#[test]
fn self_referential_placeable_is_a_cyclic_reference() {
    let err = resolve_err(r#"<cyc "{{ cyc }}">"#, "cyc", &data! {});
    assert!(err.to_string().contains("cyclic reference"));
}

#[test]
fn self_referential_this_is_a_cyclic_reference() {
    let err = resolve_err(r#"<cyc "me: {{ ~ }}">"#, "cyc", &data! {});
    assert!(err.to_string().contains("cyclic reference"));
}

#[test]
fn index_referring_to_its_own_entity_is_a_cyclic_reference() {
    let err = resolve_err(r#"<c[c] { one: "x" }>"#, "c", &data! {});
    assert!(err.to_string().contains("cyclic reference"));
}

#[test]
fn guard_clears_after_a_failure_so_later_resolutions_succeed() {
    let source = r#"<sel[$k] { a: "A" }>"#;
    let env = env_of(source);

    // first resolution fails: the selector references an unknown variable
    let empty = data! {};
    let scope = Scope::new(&env, &empty, None);
    assert!(entity(&env, "sel").get_string(&scope).is_err());

    // the same compiled entity resolves fine once the data is there
    let args = data! { "k" => "a" };
    let scope = Scope::new(&env, &args, None);
    assert_eq!(
        entity(&env, "sel").get_string(&scope).unwrap().as_deref(),
        Some("A")
    );
}

#[test]
fn cyclic_failure_does_not_poison_unrelated_entities() {
    let source = r#"
        <cyc "{{ cyc }}">
        <fine "ok {{ other }}">
        <other "here">
    "#;
    let env = env_of(source);
    let args = data! {};
    let scope = Scope::new(&env, &args, None);
    assert!(entity(&env, "cyc").get_string(&scope).is_err());
    assert_eq!(
        entity(&env, "fine").get_string(&scope).unwrap().as_deref(),
        Some("ok here")
    );
}

// =============================================================================
// Value errors carry source text
// =============================================================================

#[test]
fn value_errors_carry_the_raw_source() {
    let err = resolve_err(r#"<a "Broken {{ missing }}">"#, "a", &data! {});
    let RuntimeError::Value(value_err) = err else {
        panic!("expected a value error, got {err:?}");
    };
    assert_eq!(value_err.source, "Broken {{ missing }}");
    assert_eq!(value_err.entry, "a");
}

#[test]
fn index_failures_outrank_value_failures() {
    // the index cannot be computed, so this is an IndexError even though a
    // placeable failed while resolving it
    let source = r#"<p["{{ $missing }}"] { remove: "Remove?", keep: "Keep?" }>"#;
    let err = resolve_err(source, "p", &data! {});
    assert!(matches!(err, RuntimeError::Index(_)));
}
