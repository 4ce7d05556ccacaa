//! Marten syntax: the parse tree model the binder decorates and the
//! analysis pass consumes.

pub mod ast;
pub mod span;

pub use ast::{
    DottedName, LiteralValue, Node, NodeId, NodeKind, Operator, ParamCategory, ParseTree,
};
pub use span::Span;
