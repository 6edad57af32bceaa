//! Namespace URIs shared across the crate.

/// XML Schema namespace (`xs:` prefix).
pub const XS: &str = "http://www.w3.org/2001/XMLSchema";
/// W3C error namespace (`err:` prefix).
pub const ERR_NS: &str = "http://www.w3.org/2005/xqt-errors";
/// Implicitly bound `xml` namespace.
pub const XML_URI: &str = "http://www.w3.org/XML/1998/namespace";
