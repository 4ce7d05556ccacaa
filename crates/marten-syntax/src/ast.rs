// ast.rs
//
// The parse tree the upstream parser produces and the binder decorates.
// Nodes live in a flat arena and refer to each other by `NodeId`; the tree
// is immutable once analysis starts.

use crate::Span;

/// Unique identifier for parse tree nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeId(u32);

impl NodeId {
    /// Create a NodeId from a raw index. Only tree builders should use this.
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Return the underlying index.
    pub fn index(self) -> u32 {
        self.0
    }

    /// Create a NodeId with an arbitrary index in test code.
    #[cfg(any(test, feature = "testing"))]
    pub fn new_for_test(index: u32) -> Self {
        Self(index)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Parameter kinds, in source order of their markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamCategory {
    /// An ordinary positional-or-keyword parameter
    Simple,
    /// A `*args` list parameter
    VarArgList,
    /// A `**kwargs` dictionary parameter
    VarArgDict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
    FloorDivide,
    Mod,
    Pow,
    Negate,
    Not,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
    Is,
    IsNot,
    In,
    NotIn,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Bool(bool),
    None,
    Ellipsis,
}

/// A dotted module path as written in an import statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DottedName {
    pub parts: Vec<String>,
}

impl DottedName {
    pub fn new(parts: &[&str]) -> Self {
        Self {
            parts: parts.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn dotted(&self) -> String {
        self.parts.join(".")
    }

    /// The name the import binds when no alias is given (`import a.b` binds `a`).
    pub fn bound_name(&self) -> &str {
        self.parts.first().map(String::as_str).unwrap_or("")
    }
}

/// One syntactic form per variant; the analysis walker dispatches on this tag.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Module {
        body: Vec<NodeId>,
    },
    Suite {
        statements: Vec<NodeId>,
    },
    ClassDef {
        name: NodeId,
        arguments: Vec<NodeId>,
        decorators: Vec<NodeId>,
        suite: NodeId,
    },
    FunctionDef {
        name: NodeId,
        parameters: Vec<NodeId>,
        return_annotation: Option<NodeId>,
        decorators: Vec<NodeId>,
        suite: NodeId,
    },
    Parameter {
        category: ParamCategory,
        name: Option<NodeId>,
        annotation: Option<NodeId>,
        default: Option<NodeId>,
    },
    Lambda {
        parameters: Vec<NodeId>,
        expression: NodeId,
    },
    Call {
        callee: NodeId,
        arguments: Vec<NodeId>,
    },
    Argument {
        name: Option<String>,
        value: NodeId,
    },
    Return {
        expression: Option<NodeId>,
    },
    Yield {
        expression: Option<NodeId>,
    },
    YieldFrom {
        expression: NodeId,
    },
    Raise {
        expression: Option<NodeId>,
        cause: Option<NodeId>,
    },
    Assignment {
        target: NodeId,
        value: NodeId,
        /// A `# type: ...` comment annotation, already re-parsed by the parser
        annotation_comment: Option<NodeId>,
    },
    AugAssignment {
        target: NodeId,
        operator: Operator,
        value: NodeId,
    },
    TypeAnnotation {
        target: NodeId,
        annotation: NodeId,
    },
    Del {
        targets: Vec<NodeId>,
    },
    MemberAccess {
        object: NodeId,
        /// Always a `Name` node
        member: NodeId,
    },
    Import {
        entries: Vec<NodeId>,
    },
    ImportAs {
        module: DottedName,
        alias: Option<NodeId>,
    },
    ImportFrom {
        module: DottedName,
        entries: Vec<NodeId>,
    },
    ImportFromAs {
        name: NodeId,
        alias: Option<NodeId>,
    },
    Name {
        value: String,
    },
    Literal(LiteralValue),
    Tuple {
        items: Vec<NodeId>,
    },
    List {
        items: Vec<NodeId>,
    },
    Subscript {
        base: NodeId,
        arguments: Vec<NodeId>,
    },
    UnaryOp {
        operator: Operator,
        operand: NodeId,
    },
    BinaryOp {
        left: NodeId,
        operator: Operator,
        right: NodeId,
    },
    FormatString {
        expressions: Vec<NodeId>,
    },
    /// Adjacent string literals. When the string appears in an annotation
    /// position, `type_annotation` holds the re-parsed forward reference.
    StringList {
        parts: Vec<NodeId>,
        type_annotation: Option<NodeId>,
    },
    For {
        target: NodeId,
        iterable: NodeId,
        suite: NodeId,
        else_suite: Option<NodeId>,
    },
    While {
        test: NodeId,
        suite: NodeId,
        else_suite: Option<NodeId>,
    },
    If {
        test: NodeId,
        suite: NodeId,
        else_suite: Option<NodeId>,
    },
    With {
        items: Vec<NodeId>,
        suite: NodeId,
    },
    WithItem {
        expression: NodeId,
        target: Option<NodeId>,
    },
    Try {
        suite: NodeId,
        handlers: Vec<NodeId>,
        else_suite: Option<NodeId>,
        finally_suite: Option<NodeId>,
    },
    ExceptHandler {
        type_expression: Option<NodeId>,
        name: Option<NodeId>,
        suite: NodeId,
    },
    Assert {
        test: NodeId,
        message: Option<NodeId>,
    },
    Pass,
    Break,
    Continue,
    /// A parse error recovery node; `child` is the partial expression, if any.
    Error {
        child: Option<NodeId>,
    },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub span: Span,
    pub kind: NodeKind,
}

/// Flat arena of parse nodes. The parser allocates nodes bottom-up and then
/// fixes parent links; analysis only ever reads.
#[derive(Debug, Default, Clone)]
pub struct ParseTree {
    nodes: Vec<Node>,
}

impl ParseTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, span: Span, kind: NodeKind) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u32);
        self.nodes.push(Node {
            id,
            parent: None,
            span,
            kind,
        });
        id
    }

    pub fn set_parent(&mut self, child: NodeId, parent: NodeId) {
        self.nodes[child.index() as usize].parent = Some(parent);
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index() as usize]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.node(id).span
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The `value` of a `Name` node, if `id` is one.
    pub fn name_value(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Name { value } => Some(value.as_str()),
            _ => None,
        }
    }

    /// Iterate ancestors starting from the node's parent, walking to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut current = self.parent(id);
        std::iter::from_fn(move || {
            let next = current?;
            current = self.parent(next);
            Some(next)
        })
    }

    /// Children in syntactic order. This drives the default walk.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let push = |out: &mut Vec<NodeId>, n: &NodeId| out.push(*n);
        let push_opt = |out: &mut Vec<NodeId>, n: &Option<NodeId>| {
            if let Some(n) = n {
                out.push(*n);
            }
        };
        match self.kind(id) {
            NodeKind::Module { body } | NodeKind::Suite { statements: body } => {
                out.extend(body.iter().copied());
            }
            NodeKind::ClassDef {
                name,
                arguments,
                decorators,
                suite,
            } => {
                out.extend(decorators.iter().copied());
                push(&mut out, name);
                out.extend(arguments.iter().copied());
                push(&mut out, suite);
            }
            NodeKind::FunctionDef {
                name,
                parameters,
                return_annotation,
                decorators,
                suite,
            } => {
                out.extend(decorators.iter().copied());
                push(&mut out, name);
                out.extend(parameters.iter().copied());
                push_opt(&mut out, return_annotation);
                push(&mut out, suite);
            }
            NodeKind::Parameter {
                name,
                annotation,
                default,
                ..
            } => {
                push_opt(&mut out, name);
                push_opt(&mut out, annotation);
                push_opt(&mut out, default);
            }
            NodeKind::Lambda {
                parameters,
                expression,
            } => {
                out.extend(parameters.iter().copied());
                push(&mut out, expression);
            }
            NodeKind::Call { callee, arguments } => {
                push(&mut out, callee);
                out.extend(arguments.iter().copied());
            }
            NodeKind::Argument { value, .. } => push(&mut out, value),
            NodeKind::Return { expression } | NodeKind::Yield { expression } => {
                push_opt(&mut out, expression)
            }
            NodeKind::YieldFrom { expression } => push(&mut out, expression),
            NodeKind::Raise { expression, cause } => {
                push_opt(&mut out, expression);
                push_opt(&mut out, cause);
            }
            NodeKind::Assignment {
                target,
                value,
                annotation_comment,
            } => {
                push(&mut out, target);
                push(&mut out, value);
                push_opt(&mut out, annotation_comment);
            }
            NodeKind::AugAssignment { target, value, .. } => {
                push(&mut out, target);
                push(&mut out, value);
            }
            NodeKind::TypeAnnotation { target, annotation } => {
                push(&mut out, target);
                push(&mut out, annotation);
            }
            NodeKind::Del { targets } => out.extend(targets.iter().copied()),
            NodeKind::MemberAccess { object, member } => {
                push(&mut out, object);
                push(&mut out, member);
            }
            NodeKind::Import { entries } => out.extend(entries.iter().copied()),
            NodeKind::ImportAs { alias, .. } => push_opt(&mut out, alias),
            NodeKind::ImportFrom { entries, .. } => out.extend(entries.iter().copied()),
            NodeKind::ImportFromAs { name, alias } => {
                push(&mut out, name);
                push_opt(&mut out, alias);
            }
            NodeKind::Name { .. }
            | NodeKind::Literal(_)
            | NodeKind::Pass
            | NodeKind::Break
            | NodeKind::Continue => {}
            NodeKind::Tuple { items } | NodeKind::List { items } => {
                out.extend(items.iter().copied())
            }
            NodeKind::Subscript { base, arguments } => {
                push(&mut out, base);
                out.extend(arguments.iter().copied());
            }
            NodeKind::UnaryOp { operand, .. } => push(&mut out, operand),
            NodeKind::BinaryOp { left, right, .. } => {
                push(&mut out, left);
                push(&mut out, right);
            }
            NodeKind::FormatString { expressions } => out.extend(expressions.iter().copied()),
            NodeKind::StringList {
                parts,
                type_annotation,
            } => {
                out.extend(parts.iter().copied());
                push_opt(&mut out, type_annotation);
            }
            NodeKind::For {
                target,
                iterable,
                suite,
                else_suite,
            } => {
                push(&mut out, target);
                push(&mut out, iterable);
                push(&mut out, suite);
                push_opt(&mut out, else_suite);
            }
            NodeKind::While {
                test,
                suite,
                else_suite,
            }
            | NodeKind::If {
                test,
                suite,
                else_suite,
            } => {
                push(&mut out, test);
                push(&mut out, suite);
                push_opt(&mut out, else_suite);
            }
            NodeKind::With { items, suite } => {
                out.extend(items.iter().copied());
                push(&mut out, suite);
            }
            NodeKind::WithItem { expression, target } => {
                push(&mut out, expression);
                push_opt(&mut out, target);
            }
            NodeKind::Try {
                suite,
                handlers,
                else_suite,
                finally_suite,
            } => {
                push(&mut out, suite);
                out.extend(handlers.iter().copied());
                push_opt(&mut out, else_suite);
                push_opt(&mut out, finally_suite);
            }
            NodeKind::ExceptHandler {
                type_expression,
                name,
                suite,
            } => {
                push_opt(&mut out, type_expression);
                push_opt(&mut out, name);
                push(&mut out, suite);
            }
            NodeKind::Assert { test, message } => {
                push(&mut out, test);
                push_opt(&mut out, message);
            }
            NodeKind::Error { child } => push_opt(&mut out, child),
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(tree: &mut ParseTree, kind: NodeKind) -> NodeId {
        tree.add(Span::default(), kind)
    }

    #[test]
    fn parent_links_and_ancestors() {
        let mut tree = ParseTree::new();
        let name = leaf(
            &mut tree,
            NodeKind::Name {
                value: "x".to_string(),
            },
        );
        let ret = leaf(
            &mut tree,
            NodeKind::Return {
                expression: Some(name),
            },
        );
        let suite = leaf(
            &mut tree,
            NodeKind::Suite {
                statements: vec![ret],
            },
        );
        tree.set_parent(name, ret);
        tree.set_parent(ret, suite);

        let ancestors: Vec<_> = tree.ancestors(name).collect();
        assert_eq!(ancestors, vec![ret, suite]);
    }

    #[test]
    fn children_follow_syntactic_order() {
        let mut tree = ParseTree::new();
        let callee = leaf(
            &mut tree,
            NodeKind::Name {
                value: "f".to_string(),
            },
        );
        let arg = leaf(&mut tree, NodeKind::Literal(LiteralValue::Int(1)));
        let arg_node = leaf(
            &mut tree,
            NodeKind::Argument {
                name: None,
                value: arg,
            },
        );
        let call = leaf(
            &mut tree,
            NodeKind::Call {
                callee,
                arguments: vec![arg_node],
            },
        );
        assert_eq!(tree.children(call), vec![callee, arg_node]);
    }

    #[test]
    fn dotted_name_binds_first_part() {
        let name = DottedName::new(&["os", "path"]);
        assert_eq!(name.dotted(), "os.path");
        assert_eq!(name.bound_name(), "os");
    }
}
