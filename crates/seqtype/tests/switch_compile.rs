use platynui_seqtype::runtime::{DynamicContext, DynamicContextBuilder, ErrorCode};
use platynui_seqtype::simple_node::{elem, text};
use platynui_seqtype::{
    Error, ExpandedName, Expr, SequenceType, SimpleNode, StaticContextBuilder, SwitchCase, TypeError,
    XdmItem as I, XdmSequence, compile_expr, compile_expr_with_context, make_error_expression,
    xdm::XdmAtomicValue as A, xdm::XdmString,
};
use rstest::rstest;

type N = SimpleNode;

fn ctx() -> DynamicContext<N> {
    DynamicContextBuilder::<N>::default().build()
}

fn ty(s: &str) -> SequenceType {
    s.parse().unwrap()
}

fn run(e: &Expr) -> Result<XdmSequence<N>, Error> {
    e.evaluate(&ctx())
}

fn string(s: &str) -> I<N> {
    I::Atomic(A::String(XdmString::literal(s)))
}

/// `switch(operand) case 1 case "abc" cast as xs:integer return "one" default return "other"`
fn switch_with_bad_selector(operand: i64) -> Expr {
    Expr::switch(
        Expr::integer(operand),
        vec![
            SwitchCase::new(
                Expr::string("one"),
                vec![Expr::integer(1), Expr::string("abc").cast(ty("xs:integer"))],
            ),
            SwitchCase::default_case(Expr::string("other")),
        ],
    )
}

fn cases(e: &Expr) -> &[SwitchCase] {
    match e {
        Expr::Switch { cases, .. } => cases,
        other => panic!("expected switch, got {other}"),
    }
}

#[rstest]
fn bad_selector_is_deferred() {
    let compiled = compile_expr(switch_with_bad_selector(1)).unwrap();
    let first = &cases(&compiled)[0];
    assert!(!first.selectors()[0].is_deferred());
    assert!(first.selectors()[1].is_deferred());
    assert!(!first.result().is_deferred());
}

#[rstest]
fn deferred_selector_unreached_never_raises() {
    let compiled = compile_expr(switch_with_bad_selector(1)).unwrap();
    assert_eq!(run(&compiled).unwrap(), vec![string("one")]);
}

#[rstest]
fn deferred_selector_raises_when_reached() {
    let compiled = compile_expr(switch_with_bad_selector(2)).unwrap();
    let err = run(&compiled).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FORG0001);
}

#[rstest]
fn same_error_without_switch_fails_compilation() {
    let err = compile_expr(Expr::string("abc").cast(ty("xs:integer"))).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FORG0001);
}

#[rstest]
fn update_in_selector_rejected() {
    let e = Expr::switch(
        Expr::integer(1),
        vec![
            SwitchCase::new(Expr::string("one"), vec![Expr::integer(1)]),
            SwitchCase::new(Expr::string("two"), vec![Expr::delete(Expr::ContextItem)]),
        ],
    );
    let err = compile_expr(e).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XUST0001);
    assert_eq!(err.type_error(), Some(&TypeError::UpdateNotAllowedInSelector));
}

#[rstest]
fn update_check_precedes_branch_compilation() {
    // The first case alone would only be deferred; the update in the
    // second case still fails the whole switch.
    let e = Expr::switch(
        Expr::integer(1),
        vec![
            SwitchCase::new(Expr::var("undeclared"), vec![Expr::string("x").cast(ty("xs:integer"))]),
            SwitchCase::new(
                Expr::integer(2),
                vec![Expr::Sequence(vec![Expr::integer(2), Expr::delete(Expr::ContextItem)])],
            ),
        ],
    );
    let err = compile_expr(e).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XUST0001);
}

#[rstest]
fn update_in_result_branch_allowed() {
    let e = Expr::switch(
        Expr::integer(1),
        vec![SwitchCase::new(Expr::delete(Expr::ContextItem), vec![Expr::integer(1)])],
    );
    let compiled = compile_expr(e).unwrap();
    assert!(compiled.has_updates());
    let c = DynamicContextBuilder::<N>::default()
        .with_context_item(I::Node(elem("doomed").build()))
        .build();
    assert!(compiled.evaluate(&c).unwrap().is_empty());
}

#[rstest]
fn delete_of_atomic_target_fails() {
    let e = Expr::delete(Expr::integer(3));
    let err = run(&compile_expr(e).unwrap()).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XUTY0007);
}

#[rstest]
fn update_in_operand_rejected() {
    let e = Expr::switch(
        Expr::delete(Expr::ContextItem),
        vec![SwitchCase::default_case(Expr::Empty)],
    );
    assert_eq!(compile_expr(e).unwrap_err().code_enum(), ErrorCode::XUST0001);
}

#[rstest]
#[case(1, "one")]
#[case(2, "two")]
#[case(3, "two")]
#[case(9, "other")]
fn first_matching_case_wins(#[case] operand: i64, #[case] expected: &str) {
    let e = Expr::switch(
        Expr::integer(operand),
        vec![
            SwitchCase::new(Expr::string("one"), vec![Expr::integer(1)]),
            SwitchCase::new(Expr::string("two"), vec![Expr::integer(2), Expr::decimal(3.0)]),
            SwitchCase::new(Expr::string("late"), vec![Expr::integer(2)]),
            SwitchCase::default_case(Expr::string("other")),
        ],
    );
    let compiled = compile_expr(e).unwrap();
    assert_eq!(run(&compiled).unwrap(), vec![string(expected)]);
}

#[rstest]
fn no_match_without_default_is_empty() {
    let e = Expr::switch(
        Expr::string("b"),
        vec![SwitchCase::new(Expr::string("a"), vec![Expr::string("a")])],
    );
    assert!(run(&compile_expr(e).unwrap()).unwrap().is_empty());
}

#[rstest]
fn empty_operand_matches_empty_selector() {
    let e = Expr::switch(
        Expr::Empty,
        vec![
            SwitchCase::new(Expr::string("one"), vec![Expr::integer(1)]),
            SwitchCase::new(Expr::string("none"), vec![Expr::Empty]),
        ],
    );
    assert_eq!(run(&compile_expr(e).unwrap()).unwrap(), vec![string("none")]);
}

#[rstest]
fn operand_is_atomized() {
    let e = Expr::switch(
        Expr::ContextItem,
        vec![
            SwitchCase::new(Expr::string("hit"), vec![Expr::string("hello")]),
            SwitchCase::default_case(Expr::string("miss")),
        ],
    );
    let c = DynamicContextBuilder::<N>::default()
        .with_context_item(I::Node(elem("p").child(text("hello")).build()))
        .build();
    assert_eq!(compile_expr(e).unwrap().evaluate(&c).unwrap(), vec![string("hit")]);
}

#[rstest]
fn multi_item_operand_is_type_error() {
    let e = Expr::switch(
        Expr::Sequence(vec![Expr::integer(1), Expr::integer(2)]),
        vec![SwitchCase::default_case(Expr::Empty)],
    );
    let err = run(&compile_expr(e).unwrap()).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
}

#[rstest]
fn deferred_result_branch_raises_only_when_selected() {
    let e = |operand| {
        Expr::switch(
            Expr::integer(operand),
            vec![
                SwitchCase::new(Expr::var("nope"), vec![Expr::integer(1)]),
                SwitchCase::default_case(Expr::string("fine")),
            ],
        )
    };
    assert_eq!(run(&compile_expr(e(2)).unwrap()).unwrap(), vec![string("fine")]);
    let err = run(&compile_expr(e(1)).unwrap()).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPST0008);
}

#[rstest]
fn deferred_error_is_raised_verbatim() {
    let captured = Error::from_code(ErrorCode::FOCA0002, "captured");
    let placeholder = make_error_expression(captured);
    for _ in 0..2 {
        let err = run(&placeholder).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::FOCA0002);
        assert_eq!(err.message, "captured");
    }
}

#[rstest]
fn switch_display() {
    let e = switch_with_bad_selector(1);
    assert_eq!(
        e.to_string(),
        "switch(1) case 1 case \"abc\" cast as xs:integer return \"one\" default return \"other\""
    );
    let compiled = compile_expr(e).unwrap();
    assert_eq!(
        compiled.to_string(),
        "switch(1) case 1 case error(err:FORG0001) return \"one\" default return \"other\""
    );
}

#[rstest]
fn undeclared_variable() {
    let err = compile_expr(Expr::var("x")).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPST0008);

    let sc = StaticContextBuilder::new()
        .with_variable(ExpandedName::local("x"))
        .build();
    let compiled = compile_expr_with_context(Expr::var("x"), &sc).unwrap();
    let c = DynamicContextBuilder::<N>::default()
        .with_variable(ExpandedName::local("x"), vec![I::<N>::Atomic(A::Integer(5))])
        .build();
    assert_eq!(compiled.evaluate(&c).unwrap(), vec![I::Atomic(A::Integer(5))]);
}

#[rstest]
fn typed_let_promotes_binding() {
    let e = Expr::bind("x", Some(ty("xs:double")), Expr::decimal(3.5), Expr::var("x"));
    let compiled = compile_expr(e).unwrap();
    assert_eq!(run(&compiled).unwrap(), vec![I::Atomic(A::Double(3.5))]);
}

#[rstest]
fn let_scope_ends_with_body() {
    let e = Expr::Sequence(vec![
        Expr::bind("x", None, Expr::integer(1), Expr::var("x")),
        Expr::var("x"),
    ]);
    assert_eq!(compile_expr(e).unwrap_err().code_enum(), ErrorCode::XPST0008);
}

#[rstest]
#[case(Expr::string("5"), "xs:integer")]
#[case(Expr::integer(5), "xs:string")]
fn typed_let_rejects_disallowed_constant(#[case] value: Expr, #[case] declared: &str) {
    let e = Expr::bind("x", Some(ty(declared)), value, Expr::var("x"));
    let err = compile_expr(e).unwrap_err();
    assert!(matches!(err.type_error(), Some(TypeError::CastTypeMismatch { .. })));
}

#[rstest]
fn typed_let_rejects_empty_constant() {
    let e = Expr::bind("x", Some(ty("xs:integer")), Expr::Empty, Expr::var("x"));
    let err = compile_expr(e).unwrap_err();
    assert!(matches!(err.type_error(), Some(TypeError::CannotCastEmptyToType { .. })));
}

#[rstest]
fn typed_let_checks_runtime_value() {
    let sc = StaticContextBuilder::new()
        .with_variable(ExpandedName::local("v"))
        .build();
    let e = Expr::bind("x", Some(ty("xs:integer")), Expr::var("v"), Expr::var("x"));
    let compiled = compile_expr_with_context(e, &sc).unwrap();
    let c = DynamicContextBuilder::<N>::default()
        .with_variable(ExpandedName::local("v"), vec![string("5")])
        .build();
    let err = compiled.evaluate(&c).unwrap_err();
    assert!(matches!(err.type_error(), Some(TypeError::CastTypeMismatch { .. })));
}

#[rstest]
fn cast_of_empty_constant() {
    let err = compile_expr(Expr::Empty.cast(ty("xs:integer"))).unwrap_err();
    assert!(matches!(err.type_error(), Some(TypeError::EmptySequenceNotAllowed { .. })));
    let ok = compile_expr(Expr::Empty.cast(ty("xs:integer?"))).unwrap();
    assert!(run(&ok).unwrap().is_empty());
}

#[rstest]
fn cast_allows_any_coercion() {
    let e = compile_expr(Expr::integer(42).cast(ty("xs:string"))).unwrap();
    assert_eq!(run(&e).unwrap(), vec![I::Atomic(A::String(XdmString::derived("42")))]);
}

#[rstest]
fn cast_of_multiple_items() {
    let e = Expr::Sequence(vec![Expr::integer(1), Expr::integer(2)]).cast(ty("xs:integer?"));
    let err = compile_expr(e).unwrap_err();
    assert!(matches!(
        err.type_error(),
        Some(TypeError::CastCardinalityExceeded { .. })
    ));
}

#[rstest]
fn qname_cast_of_literal_compiles() {
    let e = compile_expr(Expr::string("xs:double").cast(ty("xs:QName"))).unwrap();
    let out = run(&e).unwrap();
    assert!(matches!(&out[..], [I::Atomic(A::QName { local, .. })] if local == "double"));
}

#[rstest]
fn instance_of_expression() {
    let e = compile_expr(Expr::integer(1).instance_of(ty("xs:decimal"))).unwrap();
    assert_eq!(run(&e).unwrap(), vec![I::Atomic(A::Boolean(true))]);
    let e = compile_expr(Expr::integer(1).instance_of(ty("xs:string"))).unwrap();
    assert_eq!(run(&e).unwrap(), vec![I::Atomic(A::Boolean(false))]);
}

#[rstest]
fn context_item_required() {
    let err = run(&compile_expr(Expr::ContextItem).unwrap()).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPDY0002);
}
