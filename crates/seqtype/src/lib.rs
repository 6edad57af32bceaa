pub mod compiler;
pub mod consts;
pub mod diagnostics;
pub mod expr;
pub mod model;
pub mod parser;
pub mod runtime;
pub mod seqtype;
pub mod simple_node;
pub mod types;
pub mod xdm;

pub use compiler::{Compiler, compile_expr, compile_expr_with_context, make_error_expression};
pub use diagnostics::TypeError;
pub use expr::{Expr, SwitchCase};
pub use model::{NodeKind, QName, XdmNode};
pub use parser::parse_sequence_type;
pub use runtime::{
    DynamicContext, DynamicContextBuilder, Error, ErrorCode, StaticContext, StaticContextBuilder,
};
pub use seqtype::{Occurrence, SequenceType};
pub use simple_node::{SimpleNode, SimpleNodeBuilder, attr, doc as simple_doc, elem, elem_ns, text};
pub use types::{AtomicType, ItemType, Promotion, ReturnType, TypeClass};
pub use xdm::{
    ExpandedName, SequenceCursor, XdmAtomicValue, XdmItem, XdmSequence, XdmString, sequence_cursor,
};
