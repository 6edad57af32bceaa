use chrono::{FixedOffset, Offset, Utc};
use core::fmt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::consts::{ERR_NS, XML_URI, XS};
use crate::diagnostics::TypeError;
use crate::xdm::{ExpandedName, XdmItem, XdmSequence};

/// W3C error codes emitted by the casting layer and the expression compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    FOCA0002, // value out of range for target type (NaN/INF to integer, overflow)
    FONS0004, // no namespace bound to prefix
    FORG0001, // invalid lexical form / casting failure
    XPDY0002, // context item undefined
    XPST0003, // syntax error
    XPST0008, // undeclared variable
    XPST0051, // unknown atomic type
    XPST0081, // unbound prefix in a static name
    XPTY0004, // type error (cardinality, promotion, restriction)
    XUST0001, // updating expression where none is allowed
    XUTY0007, // update target is not a node
    // Anything outside the err: namespace
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        use ErrorCode::*;
        match self {
            FOCA0002 => "err:FOCA0002",
            FONS0004 => "err:FONS0004",
            FORG0001 => "err:FORG0001",
            XPDY0002 => "err:XPDY0002",
            XPST0003 => "err:XPST0003",
            XPST0008 => "err:XPST0008",
            XPST0051 => "err:XPST0051",
            XPST0081 => "err:XPST0081",
            XPTY0004 => "err:XPTY0004",
            XUST0001 => "err:XUST0001",
            XUTY0007 => "err:XUTY0007",
            Unknown => "err:UNKNOWN",
        }
    }

    /// Returns the QName for this code in the `xqt-errors` namespace.
    pub fn qname(&self) -> ExpandedName {
        let local = self.as_str().trim_start_matches("err:");
        ExpandedName::new(Some(ERR_NS.to_string()), local)
    }

    pub fn from_code(s: &str) -> Self {
        use ErrorCode::*;
        match s {
            "err:FOCA0002" => FOCA0002,
            "err:FONS0004" => FONS0004,
            "err:FORG0001" => FORG0001,
            "err:XPDY0002" => XPDY0002,
            "err:XPST0003" => XPST0003,
            "err:XPST0008" => XPST0008,
            "err:XPST0051" => XPST0051,
            "err:XPST0081" => XPST0081,
            "err:XPTY0004" => XPTY0004,
            "err:XUST0001" => XUST0001,
            "err:XUTY0007" => XUTY0007,
            _ => Unknown,
        }
    }
}

/// Query error. Cloneable so a captured compile error can be raised again
/// each time a deferred branch is evaluated.
#[derive(Debug, Clone)]
pub struct Error {
    pub code: ExpandedName,
    pub message: String,
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new_qname(code: ExpandedName, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            source: None,
        }
    }

    pub fn from_code(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self::new_qname(code.qname(), msg)
    }

    /// Attach the underlying cause.
    pub fn with_source(
        mut self,
        source: impl Into<Option<Arc<dyn std::error::Error + Send + Sync>>>,
    ) -> Self {
        self.source = source.into();
        self
    }

    pub fn code_enum(&self) -> ErrorCode {
        if self.code.ns_uri.as_deref() == Some(ERR_NS) {
            ErrorCode::from_code(&format!("err:{}", self.code.local))
        } else {
            ErrorCode::Unknown
        }
    }

    /// `err:LOCAL` for W3C codes, `Q{ns}local` otherwise.
    pub fn format_code(&self) -> String {
        if self.code.ns_uri.as_deref() == Some(ERR_NS) {
            format!("err:{}", self.code.local)
        } else {
            self.code.to_string()
        }
    }

    /// The structured cast-layer error this error was raised from, if any.
    pub fn type_error(&self) -> Option<&TypeError> {
        self.source.as_deref()?.downcast_ref::<TypeError>()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error: {} ({})", self.message, self.format_code())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

#[derive(Debug, Clone, Default)]
pub struct NamespaceBindings {
    pub by_prefix: HashMap<String, String>,
}

/// Compile-time context: prefix bindings used to resolve type names and
/// `xs:QName` casts, plus externally declared variables.
#[derive(Debug, Clone)]
pub struct StaticContext {
    pub namespaces: NamespaceBindings,
    pub in_scope_variables: HashSet<ExpandedName>,
}

impl Default for StaticContext {
    fn default() -> Self {
        let mut ns = NamespaceBindings::default();
        // Implicit bindings; `xml` cannot be overridden
        ns.by_prefix.insert("xml".to_string(), XML_URI.to_string());
        ns.by_prefix.insert("xs".to_string(), XS.to_string());
        ns.by_prefix.insert("err".to_string(), ERR_NS.to_string());
        Self {
            namespaces: ns,
            in_scope_variables: HashSet::new(),
        }
    }
}

impl StaticContext {
    pub fn resolve_prefix(&self, prefix: &str) -> Option<&str> {
        self.namespaces.by_prefix.get(prefix).map(String::as_str)
    }
}

/// Builder for `StaticContext`; explicit namespace registrations never
/// replace the reserved `xml` binding.
pub struct StaticContextBuilder {
    ctx: StaticContext,
}

impl Default for StaticContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticContextBuilder {
    pub fn new() -> Self {
        Self {
            ctx: StaticContext::default(),
        }
    }

    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        let p = prefix.into();
        if p == "xml" {
            return self;
        }
        self.ctx.namespaces.by_prefix.insert(p, uri.into());
        self
    }

    /// Declare an external variable so references to it compile.
    pub fn with_variable(mut self, name: ExpandedName) -> Self {
        self.ctx.in_scope_variables.insert(name);
        self
    }

    pub fn build(self) -> StaticContext {
        self.ctx
    }
}

/// Evaluation context threaded through coercions. The casting layer never
/// inspects it; only the atomic conversions read namespaces and the
/// implicit timezone.
#[derive(Debug, Clone)]
pub struct DynamicContext<N> {
    pub static_ctx: Arc<StaticContext>,
    pub context_item: Option<XdmItem<N>>,
    pub variables: HashMap<ExpandedName, XdmSequence<N>>,
    pub timezone_override: Option<FixedOffset>,
}

impl<N> Default for DynamicContext<N> {
    fn default() -> Self {
        Self {
            static_ctx: Arc::new(StaticContext::default()),
            context_item: None,
            variables: HashMap::new(),
            timezone_override: None,
        }
    }
}

impl<N> DynamicContext<N> {
    /// Timezone applied to `xs:dateTime` values whose lexical form has none.
    pub fn implicit_timezone(&self) -> FixedOffset {
        self.timezone_override.unwrap_or_else(|| Utc.fix())
    }
}

impl<N: Clone> DynamicContext<N> {
    /// Child context with one more variable binding.
    pub fn with_binding(&self, name: ExpandedName, value: XdmSequence<N>) -> Self {
        let mut child = self.clone();
        child.variables.insert(name, value);
        child
    }
}

pub struct DynamicContextBuilder<N> {
    ctx: DynamicContext<N>,
}

impl<N> Default for DynamicContextBuilder<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> DynamicContextBuilder<N> {
    pub fn new() -> Self {
        Self {
            ctx: DynamicContext::default(),
        }
    }

    pub fn with_static_context(mut self, sc: StaticContext) -> Self {
        self.ctx.static_ctx = Arc::new(sc);
        self
    }

    pub fn with_context_item(mut self, item: impl Into<XdmItem<N>>) -> Self {
        self.ctx.context_item = Some(item.into());
        self
    }

    pub fn with_variable(mut self, name: ExpandedName, value: impl Into<XdmSequence<N>>) -> Self {
        self.ctx.variables.insert(name, value.into());
        self
    }

    /// Override the implicit timezone (offset in minutes east of UTC).
    /// Out-of-range offsets are ignored.
    pub fn with_timezone(mut self, offset_minutes: i32) -> Self {
        if let Some(tz) = FixedOffset::east_opt(offset_minutes * 60) {
            self.ctx.timezone_override = Some(tz);
        }
        self
    }

    pub fn build(self) -> DynamicContext<N> {
        self.ctx
    }
}
