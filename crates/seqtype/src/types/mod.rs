//! Item types and the predicates the casting layer relies on: instance
//! checks, exact type identity, static classification and the implicit
//! promotion policy.

pub mod casting;

use core::fmt;

use crate::model::NodeKind;

/// Built-in atomic types known to the casting layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomicType {
    AnyAtomic,
    UntypedAtomic,
    String,
    AnyUri,
    Boolean,
    Decimal,
    Integer,
    Double,
    Float,
    QName,
    Date,
    DateTime,
}

/// Local names (in the XML Schema namespace) of every atomic type.
const ATOMIC_TYPES: &[(&str, AtomicType)] = &[
    ("anyAtomicType", AtomicType::AnyAtomic),
    ("untypedAtomic", AtomicType::UntypedAtomic),
    ("string", AtomicType::String),
    ("anyURI", AtomicType::AnyUri),
    ("boolean", AtomicType::Boolean),
    ("decimal", AtomicType::Decimal),
    ("integer", AtomicType::Integer),
    ("double", AtomicType::Double),
    ("float", AtomicType::Float),
    ("QName", AtomicType::QName),
    ("date", AtomicType::Date),
    ("dateTime", AtomicType::DateTime),
];

impl AtomicType {
    pub fn from_local(local: &str) -> Option<Self> {
        ATOMIC_TYPES
            .iter()
            .find(|(name, _)| *name == local)
            .map(|(_, t)| *t)
    }

    pub fn local_name(self) -> &'static str {
        ATOMIC_TYPES
            .iter()
            .find(|(_, t)| *t == self)
            .map_or("anyAtomicType", |(name, _)| name)
    }

    /// Base type in the derivation hierarchy; `None` for the root.
    pub fn parent(self) -> Option<AtomicType> {
        match self {
            AtomicType::AnyAtomic => None,
            AtomicType::Integer => Some(AtomicType::Decimal),
            _ => Some(AtomicType::AnyAtomic),
        }
    }

    /// Reflexive, transitive derivation test.
    pub fn derives_from(self, base: AtomicType) -> bool {
        let mut cur = Some(self);
        while let Some(t) = cur {
            if t == base {
                return true;
            }
            cur = t.parent();
        }
        false
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            AtomicType::Decimal | AtomicType::Integer | AtomicType::Double | AtomicType::Float
        )
    }
}

impl fmt::Display for AtomicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "xs:{}", self.local_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    /// `empty-sequence()`: no item is an instance of it.
    EmptySequence,
    /// `item()`
    Item,
    /// `node()` when `None`, otherwise a kind test such as `element()`.
    Node(Option<NodeKind>),
    Atomic(AtomicType),
}

/// Coarse classification used for static return-type inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    Numeric,
    Node,
    Other,
}

/// Statically inferred result shape of a typed expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnType {
    Numeric,
    Node,
    Other,
    NumericSeq,
    NodeSeq,
    NonNumericSeq,
}

impl ItemType {
    /// Whether a value whose runtime type is `self` is an instance of
    /// `declared`.
    pub fn instance_of(&self, declared: &ItemType) -> bool {
        match (self, declared) {
            (ItemType::EmptySequence, _) | (_, ItemType::EmptySequence) => false,
            (_, ItemType::Item) => true,
            (ItemType::Node(_), ItemType::Node(None)) => true,
            (ItemType::Node(Some(k)), ItemType::Node(Some(d))) => k == d,
            (ItemType::Atomic(a), ItemType::Atomic(d)) => a.derives_from(*d),
            _ => false,
        }
    }

    pub fn same_type(&self, other: &ItemType) -> bool {
        self == other
    }

    pub fn classify(&self) -> TypeClass {
        match self {
            ItemType::Atomic(a) if a.is_numeric() => TypeClass::Numeric,
            ItemType::Node(_) => TypeClass::Node,
            _ => TypeClass::Other,
        }
    }

    /// Untyped values are nodes and `xs:untypedAtomic`.
    pub fn is_untyped(&self) -> bool {
        matches!(
            self,
            ItemType::Node(_) | ItemType::Atomic(AtomicType::UntypedAtomic)
        )
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemType::EmptySequence => f.write_str("empty-sequence()"),
            ItemType::Item => f.write_str("item()"),
            ItemType::Node(None) => f.write_str("node()"),
            ItemType::Node(Some(kind)) => write!(f, "{}()", kind.test_name()),
            ItemType::Atomic(a) => write!(f, "{a}"),
        }
    }
}

/// How a value that is not an instance of the target may still be converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    Disallowed,
    /// Numeric or URI promotion through the coercion function.
    Promote,
    /// Untyped source: any conversion the coercion function accepts.
    Untyped,
}

/// Implicit promotion policy for `(source, target)` pairs that fail the
/// instance check.
pub fn promotion(source: &ItemType, target: &ItemType) -> Promotion {
    use AtomicType as T;
    if source.is_untyped() {
        return Promotion::Untyped;
    }
    match (source, target) {
        (ItemType::Atomic(s), ItemType::Atomic(T::Float | T::Double))
            if s.derives_from(T::Decimal) =>
        {
            Promotion::Promote
        }
        (ItemType::Atomic(T::AnyUri), ItemType::Atomic(T::String)) => Promotion::Promote,
        _ => Promotion::Disallowed,
    }
}
