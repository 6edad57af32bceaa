//! Error kinds raised by sequence-type checks, casts and the switch-case
//! compiler. Each kind maps onto a W3C error code; the kind itself travels as
//! the source of the resulting [`Error`] so callers can match on it.

use std::sync::Arc;

use crate::runtime::{Error, ErrorCode};
use crate::seqtype::Occurrence;
use crate::types::ItemType;
use crate::xdm::ExpandedName;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TypeError {
    #[error("empty sequence not allowed: {origin}")]
    EmptySequenceNotAllowed { origin: String },

    #[error("cannot cast sequence to {target}: cardinality does not match")]
    CannotCastEmptyToType { target: ItemType },

    #[error("cannot promote {found} to {target}")]
    CastTypeMismatch { target: ItemType, found: ItemType },

    #[error("{target} does not match name restriction {restriction}")]
    CastRestrictionViolated {
        target: ItemType,
        restriction: ExpandedName,
    },

    #[error("more than one item cannot be cast to {target}{}", .occurrence.indicator())]
    CastCardinalityExceeded {
        target: ItemType,
        occurrence: Occurrence,
    },

    #[error("updating expression not allowed in switch case selector")]
    UpdateNotAllowedInSelector,
}

impl TypeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            TypeError::UpdateNotAllowedInSelector => ErrorCode::XUST0001,
            _ => ErrorCode::XPTY0004,
        }
    }
}

impl From<TypeError> for Error {
    fn from(e: TypeError) -> Self {
        Error::from_code(e.code(), e.to_string())
            .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
    }
}
