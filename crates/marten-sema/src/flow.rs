// flow.rs
//
// Reachability oracle over the binder's flow-node flags. Flags are sparse:
// a node without an entry inherits the nearest decorated ancestor's.

use bitflags::bitflags;
use rustc_hash::FxHashMap;

use marten_syntax::{NodeId, ParseTree};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FlowFlags: u8 {
        /// Control flow cannot arrive at this node
        const UNREACHABLE = 1 << 0;
        /// Control flow cannot continue past this node (it always raises
        /// or returns)
        const NO_FALLTHROUGH = 1 << 1;
    }
}

pub type FlowMap = FxHashMap<NodeId, FlowFlags>;

fn flags_for(tree: &ParseTree, flow: &FlowMap, node: NodeId) -> FlowFlags {
    if let Some(flags) = flow.get(&node) {
        return *flags;
    }
    for ancestor in tree.ancestors(node) {
        if let Some(flags) = flow.get(&ancestor) {
            return *flags;
        }
    }
    FlowFlags::empty()
}

/// Whether control flow may arrive at the node.
pub fn is_node_reachable(tree: &ParseTree, flow: &FlowMap, node: NodeId) -> bool {
    !flags_for(tree, flow, node).contains(FlowFlags::UNREACHABLE)
}

/// Whether control may fall through past the node. False when the node's
/// body always raises or returns.
pub fn is_after_node_reachable(tree: &ParseTree, flow: &FlowMap, node: NodeId) -> bool {
    let flags = flags_for(tree, flow, node);
    !flags.contains(FlowFlags::UNREACHABLE) && !flags.contains(FlowFlags::NO_FALLTHROUGH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use marten_syntax::{NodeKind, Span};

    #[test]
    fn unreachable_flag_inherited_from_ancestor() {
        let mut tree = ParseTree::new();
        let inner = tree.add(Span::default(), NodeKind::Pass);
        let suite = tree.add(
            Span::default(),
            NodeKind::Suite {
                statements: vec![inner],
            },
        );
        tree.set_parent(inner, suite);

        let mut flow = FlowMap::default();
        flow.insert(suite, FlowFlags::UNREACHABLE);
        assert!(!is_node_reachable(&tree, &flow, inner));
        assert!(!is_node_reachable(&tree, &flow, suite));
    }

    #[test]
    fn nodes_default_to_reachable() {
        let mut tree = ParseTree::new();
        let node = tree.add(Span::default(), NodeKind::Pass);
        let flow = FlowMap::default();
        assert!(is_node_reachable(&tree, &flow, node));
        assert!(is_after_node_reachable(&tree, &flow, node));
    }

    #[test]
    fn no_fallthrough_blocks_after_reachability_only() {
        let mut tree = ParseTree::new();
        let node = tree.add(Span::default(), NodeKind::Pass);
        let mut flow = FlowMap::default();
        flow.insert(node, FlowFlags::NO_FALLTHROUGH);
        assert!(is_node_reachable(&tree, &flow, node));
        assert!(!is_after_node_reachable(&tree, &flow, node));
    }
}
