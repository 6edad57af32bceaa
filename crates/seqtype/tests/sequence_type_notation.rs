use platynui_seqtype::consts::XS;
use platynui_seqtype::runtime::ErrorCode;
use platynui_seqtype::{
    AtomicType, ExpandedName, ItemType, NodeKind, Occurrence, ReturnType, SequenceType,
    StaticContextBuilder, parse_sequence_type,
};
use rstest::rstest;

#[rstest]
#[case("xs:integer")]
#[case("xs:integer?")]
#[case("xs:double*")]
#[case("xs:string+")]
#[case("xs:anyURI")]
#[case("xs:QName?")]
#[case("xs:dateTime")]
#[case("xs:untypedAtomic*")]
#[case("item()")]
#[case("item()*")]
#[case("node()+")]
#[case("element()")]
#[case("element(book)?")]
#[case("attribute(id)")]
#[case("text()")]
#[case("comment()*")]
#[case("document-node()")]
#[case("processing-instruction()")]
#[case("empty-sequence()")]
fn display_round_trip(#[case] notation: &str) {
    let t: SequenceType = notation.parse().unwrap();
    assert_eq!(t.to_string(), notation);
    let again: SequenceType = t.to_string().parse().unwrap();
    assert_eq!(again, t);
}

#[rstest]
fn parts_of_parsed_type() {
    let t: SequenceType = "element(book)*".parse().unwrap();
    assert_eq!(t.item_type(), &ItemType::Node(Some(NodeKind::Element)));
    assert_eq!(t.occurrence(), Occurrence::ZeroOrMore);
    assert_eq!(t.restriction(), Some(&ExpandedName::local("book")));

    let t: SequenceType = "element(*)".parse().unwrap();
    assert_eq!(t.restriction(), None);
}

#[rstest]
fn whitespace_is_insignificant() {
    let t: SequenceType = " xs:integer ? ".parse().unwrap();
    assert_eq!(t, SequenceType::atomic(AtomicType::Integer, Occurrence::ZeroOrOne));
    let t: SequenceType = "element( book )".parse().unwrap();
    assert_eq!(t.restriction(), Some(&ExpandedName::local("book")));
}

#[rstest]
fn unprefixed_atomic_names_are_schema_types() {
    let t: SequenceType = "integer".parse().unwrap();
    assert_eq!(t.item_type(), &ItemType::Atomic(AtomicType::Integer));
}

#[rstest]
fn prefixes_resolve_through_static_context() {
    let sc = StaticContextBuilder::new()
        .with_namespace("s", XS)
        .with_namespace("b", "urn:books")
        .build();
    let t = parse_sequence_type("s:decimal+", &sc).unwrap();
    assert_eq!(t, SequenceType::atomic(AtomicType::Decimal, Occurrence::OneOrMore));
    let t = parse_sequence_type("element(b:book)", &sc).unwrap();
    assert_eq!(
        t.restriction(),
        Some(&ExpandedName::new(Some("urn:books".to_string()), "book"))
    );
}

#[rstest]
#[case("xs:integer??", ErrorCode::XPST0003)]
#[case("element(", ErrorCode::XPST0003)]
#[case("", ErrorCode::XPST0003)]
#[case("empty-sequence()?", ErrorCode::XPST0003)]
#[case("text(foo)", ErrorCode::XPST0003)]
#[case("comment(x)", ErrorCode::XPST0003)]
#[case("node(a)", ErrorCode::XPST0003)]
#[case("document-node(b)", ErrorCode::XPST0003)]
#[case("processing-instruction(*)", ErrorCode::XPST0003)]
#[case("xs:gYear", ErrorCode::XPST0051)]
#[case("fn:integer", ErrorCode::XPST0051)]
#[case("q:integer", ErrorCode::XPST0081)]
#[case("element(q:book)", ErrorCode::XPST0081)]
fn parse_errors(#[case] notation: &str, #[case] code: ErrorCode) {
    let sc = StaticContextBuilder::new()
        .with_namespace("fn", "http://www.w3.org/2005/xpath-functions")
        .build();
    let err = parse_sequence_type(notation, &sc).unwrap_err();
    assert_eq!(err.code_enum(), code, "{notation}: {err}");
}

#[rstest]
fn xml_prefix_cannot_be_rebound() {
    let sc = StaticContextBuilder::new().with_namespace("xml", "urn:other").build();
    assert_eq!(
        sc.resolve_prefix("xml"),
        Some(platynui_seqtype::consts::XML_URI)
    );
}

#[rstest]
#[case("xs:integer", ReturnType::Numeric)]
#[case("xs:double?", ReturnType::NumericSeq)]
#[case("element()", ReturnType::Node)]
#[case("node()*", ReturnType::NodeSeq)]
#[case("xs:string", ReturnType::Other)]
#[case("xs:boolean+", ReturnType::NonNumericSeq)]
#[case("item()*", ReturnType::NonNumericSeq)]
fn return_type_inference(#[case] notation: &str, #[case] expected: ReturnType) {
    let t: SequenceType = notation.parse().unwrap();
    assert_eq!(t.return_type(), expected);
}
