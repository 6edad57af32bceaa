use chrono::{DateTime, FixedOffset, NaiveDate};
use core::fmt;
use core::hash::{Hash, Hasher};

use crate::model::XdmNode;
use crate::runtime::Error;
use crate::types::{AtomicType, ItemType};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpandedName {
    pub ns_uri: Option<String>,
    pub local: String,
}

impl ExpandedName {
    pub fn new(ns_uri: Option<String>, local: impl Into<String>) -> Self {
        Self {
            ns_uri,
            local: local.into(),
        }
    }

    /// Name in no namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Self::new(None, local)
    }
}

impl fmt::Display for ExpandedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ns_uri {
            Some(ns) => write!(f, "Q{{{}}}{}", ns, self.local),
            None => f.write_str(&self.local),
        }
    }
}

/// `xs:string` payload.
///
/// `direct` records whether the string came straight from a literal. Only
/// direct strings may be cast to `xs:QName`; any conversion produces a
/// derived string. Equality compares the text only.
#[derive(Debug, Clone, Eq)]
pub struct XdmString {
    value: String,
    direct: bool,
}

impl XdmString {
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            direct: true,
        }
    }

    pub fn derived(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            direct: false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn is_direct(&self) -> bool {
        self.direct
    }

    pub fn clear_direct(&mut self) {
        self.direct = false;
    }

    pub fn into_string(self) -> String {
        self.value
    }
}

impl PartialEq for XdmString {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

// Must agree with `PartialEq`: provenance is not hashed.
impl Hash for XdmString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum XdmAtomicValue {
    Boolean(bool),
    String(XdmString),
    UntypedAtomic(String),
    AnyUri(String),
    Integer(i64),
    Decimal(f64),
    Double(f64),
    Float(f32),
    QName {
        ns_uri: Option<String>,
        prefix: Option<String>,
        local: String,
    },
    Date {
        date: NaiveDate,
        tz: Option<FixedOffset>,
    },
    DateTime(DateTime<FixedOffset>),
}

impl XdmAtomicValue {
    /// Most specific atomic type of the value.
    pub fn atomic_type(&self) -> AtomicType {
        match self {
            XdmAtomicValue::Boolean(_) => AtomicType::Boolean,
            XdmAtomicValue::String(_) => AtomicType::String,
            XdmAtomicValue::UntypedAtomic(_) => AtomicType::UntypedAtomic,
            XdmAtomicValue::AnyUri(_) => AtomicType::AnyUri,
            XdmAtomicValue::Integer(_) => AtomicType::Integer,
            XdmAtomicValue::Decimal(_) => AtomicType::Decimal,
            XdmAtomicValue::Double(_) => AtomicType::Double,
            XdmAtomicValue::Float(_) => AtomicType::Float,
            XdmAtomicValue::QName { .. } => AtomicType::QName,
            XdmAtomicValue::Date { .. } => AtomicType::Date,
            XdmAtomicValue::DateTime(_) => AtomicType::DateTime,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            XdmAtomicValue::Integer(i) => Some(*i as f64),
            XdmAtomicValue::Decimal(d) | XdmAtomicValue::Double(d) => Some(*d),
            XdmAtomicValue::Float(f) => Some(f64::from(*f)),
            _ => None,
        }
    }

    fn as_text(&self) -> Option<&str> {
        match self {
            XdmAtomicValue::String(s) => Some(s.as_str()),
            XdmAtomicValue::UntypedAtomic(s) | XdmAtomicValue::AnyUri(s) => Some(s),
            _ => None,
        }
    }

    /// `fn:deep-equal` semantics for two atomic values: numerics compare by
    /// value across types (NaN equals NaN), string-like values by codepoints,
    /// everything else requires the same type family. Incomparable pairs are
    /// simply unequal.
    pub fn deep_eq(&self, other: &XdmAtomicValue) -> bool {
        use XdmAtomicValue as A;
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            return (a.is_nan() && b.is_nan()) || a == b;
        }
        if let (Some(a), Some(b)) = (self.as_text(), other.as_text()) {
            return a == b;
        }
        match (self, other) {
            (A::Boolean(a), A::Boolean(b)) => a == b,
            (
                A::QName {
                    ns_uri: na,
                    local: la,
                    ..
                },
                A::QName {
                    ns_uri: nb,
                    local: lb,
                    ..
                },
            ) => na == nb && la == lb,
            (A::Date { date: da, tz: ta }, A::Date { date: db, tz: tb }) => da == db && ta == tb,
            (A::DateTime(a), A::DateTime(b)) => a == b,
            _ => false,
        }
    }
}

pub type XdmSequence<N> = Vec<XdmItem<N>>;

pub type XdmItemResult<N> = Result<XdmItem<N>, Error>;

#[derive(Debug, Clone, PartialEq)]
pub enum XdmItem<N> {
    Node(N),
    Atomic(XdmAtomicValue),
}

impl<N> From<XdmAtomicValue> for XdmItem<N> {
    fn from(a: XdmAtomicValue) -> Self {
        XdmItem::Atomic(a)
    }
}

impl<N: XdmNode> XdmItem<N> {
    /// Runtime type of the item as seen by instance checks.
    pub fn item_type(&self) -> ItemType {
        match self {
            XdmItem::Node(n) => ItemType::Node(Some(n.kind())),
            XdmItem::Atomic(a) => ItemType::Atomic(a.atomic_type()),
        }
    }

    /// Untyped provenance licenses conversions that would otherwise be
    /// rejected.
    pub fn is_untyped(&self) -> bool {
        self.item_type().is_untyped()
    }

    /// Typed value of the item; nodes atomize to `xs:untypedAtomic`.
    pub fn atomize(self) -> XdmAtomicValue {
        match self {
            XdmItem::Node(n) => XdmAtomicValue::UntypedAtomic(n.string_value()),
            XdmItem::Atomic(a) => a,
        }
    }
}

impl<N> fmt::Display for XdmItem<N>
where
    N: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XdmItem::Node(_) => write!(f, "<node>"),
            XdmItem::Atomic(a) => write!(f, "{:?}", a),
        }
    }
}

/// Pull-based item source. Pulling may fail with an upstream evaluation
/// error, which consumers propagate unchanged.
pub trait SequenceCursor<N> {
    fn next_item(&mut self) -> Option<XdmItemResult<N>>;
}

impl<N, I> SequenceCursor<N> for I
where
    I: Iterator<Item = XdmItemResult<N>>,
{
    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        self.next()
    }
}

/// Cursor over an already materialized sequence.
pub fn sequence_cursor<N>(seq: XdmSequence<N>) -> impl SequenceCursor<N> {
    seq.into_iter().map(Ok::<XdmItem<N>, Error>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(s: &XdmString) -> u64 {
        let mut h = DefaultHasher::new();
        s.hash(&mut h);
        h.finish()
    }

    #[test]
    fn provenance_is_ignored_by_eq_and_hash() {
        let lit = XdmString::literal("x");
        let der = XdmString::derived("x");
        assert_eq!(lit, der);
        assert_eq!(hash_of(&lit), hash_of(&der));

        let set: HashSet<_> = [lit, der].into_iter().collect();
        assert_eq!(set.len(), 1);
    }
}
