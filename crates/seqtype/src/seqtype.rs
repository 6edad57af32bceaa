//! Sequence types: an item type, an occurrence indicator and an optional
//! node-name restriction.
//!
//! A `SequenceType` answers two questions about a sequence:
//! - `instance_of`: does the sequence conform as-is?
//! - `cast_one` / `cast_all`: convert the sequence into the type, applying
//!   implicit promotion, or fail with a [`TypeError`].
//!
//! Both pull items lazily from a [`SequenceCursor`] and stop at the first
//! failure; errors raised while pulling are returned unchanged.

use core::fmt;
use smallvec::SmallVec;
use std::sync::OnceLock;

use crate::diagnostics::TypeError;
use crate::model::XdmNode;
use crate::runtime::{DynamicContext, Error};
use crate::types::casting::coerce;
use crate::types::{AtomicType, ItemType, Promotion, ReturnType, TypeClass, promotion};
use crate::xdm::{ExpandedName, SequenceCursor, XdmAtomicValue, XdmItem, XdmSequence};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Occurrence {
    #[default]
    ExactlyOne,
    ZeroOrOne,
    OneOrMore,
    ZeroOrMore,
}

impl Occurrence {
    pub fn allows_empty(self) -> bool {
        matches!(self, Occurrence::ZeroOrOne | Occurrence::ZeroOrMore)
    }

    pub fn allows_many(self) -> bool {
        matches!(self, Occurrence::OneOrMore | Occurrence::ZeroOrMore)
    }

    pub fn indicator(self) -> &'static str {
        match self {
            Occurrence::ExactlyOne => "",
            Occurrence::ZeroOrOne => "?",
            Occurrence::OneOrMore => "+",
            Occurrence::ZeroOrMore => "*",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceType {
    item: ItemType,
    occurrence: Occurrence,
    restriction: OnceLock<ExpandedName>,
}

impl SequenceType {
    pub fn new(item: ItemType, occurrence: Occurrence) -> Self {
        Self {
            item,
            occurrence,
            restriction: OnceLock::new(),
        }
    }

    /// `empty-sequence()`
    pub fn empty() -> Self {
        Self::new(ItemType::EmptySequence, Occurrence::ZeroOrMore)
    }

    pub fn atomic(t: AtomicType, occurrence: Occurrence) -> Self {
        Self::new(ItemType::Atomic(t), occurrence)
    }

    /// Builder form of [`SequenceType::restrict`]. The first binding wins;
    /// rebinding an already restricted type is a caller bug and trips a
    /// debug assertion.
    pub fn with_restriction(self, name: ExpandedName) -> Self {
        let rebound = self.restriction.set(name);
        debug_assert!(rebound.is_ok(), "restriction already bound to {:?}", self.restriction.get());
        self
    }

    /// Bind the node-name restriction. Only the first assignment takes
    /// effect; later ones hand the rejected name back.
    pub fn restrict(&self, name: ExpandedName) -> Result<(), ExpandedName> {
        self.restriction.set(name)
    }

    pub fn item_type(&self) -> &ItemType {
        &self.item
    }

    pub fn occurrence(&self) -> Occurrence {
        self.occurrence
    }

    pub fn restriction(&self) -> Option<&ExpandedName> {
        self.restriction.get()
    }

    /// Whether a sequence without items satisfies the type.
    fn accepts_empty(&self) -> bool {
        self.item == ItemType::EmptySequence || self.occurrence.allows_empty()
    }

    /// Check `cursor` against the type without converting anything.
    pub fn instance_of<N: XdmNode>(&self, mut cursor: impl SequenceCursor<N>) -> Result<bool, Error> {
        let Some(first) = cursor.next_item() else {
            return Ok(self.accepts_empty());
        };
        let first = first?;
        if !self.occurrence.allows_many() {
            if cursor.next_item().transpose()?.is_some() {
                return Ok(false);
            }
            return Ok(self.item_matches(&first));
        }
        if !self.item_matches(&first) {
            return Ok(false);
        }
        while let Some(item) = cursor.next_item() {
            if !self.item_matches(&item?) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn item_matches<N: XdmNode>(&self, item: &XdmItem<N>) -> bool {
        item.item_type().instance_of(&self.item) && self.restriction_matches(item)
    }

    fn restriction_matches<N: XdmNode>(&self, item: &XdmItem<N>) -> bool {
        match (self.restriction.get(), item) {
            (None, _) => true,
            (Some(name), XdmItem::Node(n)) => n.has_name(name),
            (Some(_), XdmItem::Atomic(_)) => false,
        }
    }

    /// Pass `item` through the name restriction.
    fn check<N: XdmNode>(&self, item: XdmItem<N>) -> Result<XdmItem<N>, Error> {
        match self.restriction.get() {
            Some(name) if !self.restriction_matches(&item) => Err(TypeError::CastRestrictionViolated {
                target: self.item,
                restriction: name.clone(),
            }
            .into()),
            _ => Ok(item),
        }
    }

    /// Convert a single optional value, as for a typed parameter or return
    /// slot. Any conversion the coercion function supports is attempted;
    /// `origin` describes the source expression in error messages.
    pub fn cast_one<N: XdmNode>(
        &self,
        item: Option<XdmItem<N>>,
        origin: &dyn fmt::Display,
        ctx: &DynamicContext<N>,
    ) -> Result<Option<XdmItem<N>>, Error> {
        let Some(mut item) = item else {
            if self.occurrence == Occurrence::ExactlyOne {
                return Err(TypeError::EmptySequenceNotAllowed {
                    origin: origin.to_string(),
                }
                .into());
            }
            return Ok(None);
        };
        if item.item_type().same_type(&self.item) {
            if let XdmItem::Atomic(XdmAtomicValue::String(s)) = &mut item {
                s.clear_direct();
            }
            return Ok(Some(item));
        }
        let converted = coerce(item, &self.item, ctx)?;
        self.check(converted).map(Some)
    }

    /// Convert a whole sequence under the implicit promotion rules.
    pub fn cast_all<N: XdmNode>(
        &self,
        mut cursor: impl SequenceCursor<N>,
        ctx: &DynamicContext<N>,
    ) -> Result<XdmSequence<N>, Error> {
        let Some(first) = cursor.next_item() else {
            if self.accepts_empty() {
                return Ok(Vec::new());
            }
            return Err(TypeError::CannotCastEmptyToType { target: self.item }.into());
        };
        let first = first?;
        if self.item == ItemType::EmptySequence {
            return Err(TypeError::CannotCastEmptyToType { target: self.item }.into());
        }
        let first = self.promote(first, ctx)?;
        let next = cursor.next_item().transpose()?;
        if next.is_some() && !self.occurrence.allows_many() {
            return Err(TypeError::CastCardinalityExceeded {
                target: self.item,
                occurrence: self.occurrence,
            }
            .into());
        }

        let mut out: SmallVec<[XdmItem<N>; 4]> = SmallVec::new();
        out.push(first);
        let mut next = next;
        while let Some(item) = next {
            out.push(self.promote(item, ctx)?);
            next = cursor.next_item().transpose()?;
        }
        Ok(out.into_vec())
    }

    /// Instance, or promote-or-fail, then restriction check.
    fn promote<N: XdmNode>(&self, item: XdmItem<N>, ctx: &DynamicContext<N>) -> Result<XdmItem<N>, Error> {
        let found = item.item_type();
        if found.instance_of(&self.item) {
            return self.check(item);
        }
        match promotion(&found, &self.item) {
            Promotion::Disallowed => Err(TypeError::CastTypeMismatch {
                target: self.item,
                found,
            }
            .into()),
            rule @ (Promotion::Promote | Promotion::Untyped) => {
                tracing::trace!(?rule, from = %found, to = %self.item, "implicit promotion");
                self.check(coerce(item, &self.item, ctx)?)
            }
        }
    }

    /// Shape of values produced under this type, for static rewrites.
    pub fn return_type(&self) -> ReturnType {
        let class = self.item.classify();
        if self.occurrence == Occurrence::ExactlyOne {
            return match class {
                TypeClass::Numeric => ReturnType::Numeric,
                TypeClass::Node => ReturnType::Node,
                TypeClass::Other => ReturnType::Other,
            };
        }
        match class {
            TypeClass::Numeric => ReturnType::NumericSeq,
            TypeClass::Node => ReturnType::NodeSeq,
            TypeClass::Other => ReturnType::NonNumericSeq,
        }
    }
}

impl fmt::Display for SequenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.item, self.restriction.get()) {
            (ItemType::EmptySequence, _) => return f.write_str("empty-sequence()"),
            (ItemType::Node(Some(kind)), Some(name)) => write!(f, "{}({})", kind.test_name(), name)?,
            (item, _) => write!(f, "{item}")?,
        }
        f.write_str(self.occurrence.indicator())
    }
}
