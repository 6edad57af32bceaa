use pest::Parser;
use pest::iterators::Pair;
use std::str::FromStr;
use std::sync::Arc;

use crate::consts::XS;
use crate::model::NodeKind;
use crate::runtime::{Error, ErrorCode, StaticContext};
use crate::seqtype::{Occurrence, SequenceType};
use crate::types::{AtomicType, ItemType};
use crate::xdm::ExpandedName;

#[derive(pest_derive::Parser)]
#[grammar = "seqtype.pest"]
pub struct SeqTypeParser;

/// Parse sequence type notation, resolving prefixes through `static_ctx`.
/// A name inside `element(..)` or `attribute(..)` becomes the name
/// restriction of the returned type.
pub fn parse_sequence_type(input: &str, static_ctx: &StaticContext) -> Result<SequenceType, Error> {
    let mut pairs = SeqTypeParser::parse(Rule::sequence_type, input).map_err(|e| {
        Error::from_code(ErrorCode::XPST0003, format!("invalid sequence type '{input}'"))
            .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
    })?;
    let root = pairs
        .next()
        .ok_or_else(|| Error::from_code(ErrorCode::XPST0003, "empty sequence type"))?;

    let mut item = ItemType::Item;
    let mut occurrence = Occurrence::ExactlyOne;
    let mut restriction = None;
    for pair in root.into_inner() {
        match pair.as_rule() {
            Rule::empty_sequence => return Ok(SequenceType::empty()),
            Rule::any_item => item = ItemType::Item,
            Rule::kind_test => (item, restriction) = kind_test(pair, static_ctx)?,
            Rule::atomic_type => item = atomic_type(pair, static_ctx)?,
            Rule::occurrence => {
                occurrence = match pair.as_str() {
                    "?" => Occurrence::ZeroOrOne,
                    "*" => Occurrence::ZeroOrMore,
                    _ => Occurrence::OneOrMore,
                }
            }
            _ => {}
        }
    }
    let ty = SequenceType::new(item, occurrence);
    Ok(match restriction {
        Some(name) => ty.with_restriction(name),
        None => ty,
    })
}

fn kind_test(
    pair: Pair<Rule>,
    static_ctx: &StaticContext,
) -> Result<(ItemType, Option<ExpandedName>), Error> {
    let mut kind = None;
    let mut name = None;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::named_kind => {
                kind = match p.as_str() {
                    "attribute" => Some(NodeKind::Attribute),
                    _ => Some(NodeKind::Element),
                }
            }
            Rule::kind_name => {
                kind = match p.as_str() {
                    "document-node" => Some(NodeKind::Document),
                    "text" => Some(NodeKind::Text),
                    "comment" => Some(NodeKind::Comment),
                    "processing-instruction" => Some(NodeKind::ProcessingInstruction),
                    _ => None,
                }
            }
            Rule::qname => name = Some(resolve_name(p.as_str(), static_ctx, None)?),
            _ => {}
        }
    }
    Ok((ItemType::Node(kind), name))
}

fn atomic_type(pair: Pair<Rule>, static_ctx: &StaticContext) -> Result<ItemType, Error> {
    let lexical = pair.as_str().trim();
    let name = resolve_name(lexical, static_ctx, Some(XS))?;
    if name.ns_uri.as_deref() != Some(XS) {
        return Err(unknown_type(lexical));
    }
    AtomicType::from_local(&name.local)
        .map(ItemType::Atomic)
        .ok_or_else(|| unknown_type(lexical))
}

fn unknown_type(lexical: &str) -> Error {
    Error::from_code(ErrorCode::XPST0051, format!("unknown atomic type '{lexical}'"))
}

fn resolve_name(
    lexical: &str,
    static_ctx: &StaticContext,
    default_ns: Option<&str>,
) -> Result<ExpandedName, Error> {
    match lexical.split_once(':') {
        Some((prefix, local)) => {
            let ns = static_ctx.resolve_prefix(prefix).ok_or_else(|| {
                Error::from_code(ErrorCode::XPST0081, format!("unbound prefix '{prefix}'"))
            })?;
            Ok(ExpandedName::new(Some(ns.to_string()), local))
        }
        None => Ok(ExpandedName::new(default_ns.map(str::to_string), lexical)),
    }
}

impl FromStr for SequenceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_sequence_type(s, &StaticContext::default())
    }
}
