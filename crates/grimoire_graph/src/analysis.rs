// SPDX-License-Identifier: MIT OR Apache-2.0
//! Static analysis of spell graphs: root resolution and cost walks.

use crate::graph::Graph;
use crate::node::NodeId;
use crate::port::names;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Find the node a cast starts from.
///
/// The root is the single node whose `ExecIn` has no connections. With zero or
/// several candidates the first node is used and a warning is logged.
pub fn resolve_root(graph: &Graph) -> Option<NodeId> {
    let first = graph.node_ids().next()?;
    let candidates: Vec<NodeId> = graph
        .node_ids()
        .filter(|&id| graph.connected_pins(id, names::EXEC_IN).is_empty())
        .collect();

    match candidates.as_slice() {
        [root] => Some(*root),
        [] => {
            tracing::warn!(
                "Graph '{}' has no unconnected entry node, using first node",
                graph.name
            );
            Some(first)
        }
        many => {
            tracing::warn!(
                "Graph '{}' has {} entry candidates, using first node",
                graph.name,
                many.len()
            );
            Some(first)
        }
    }
}

/// Total scaled mana cost of every node in the graph
pub fn spell_mana_cost(graph: &Graph) -> f32 {
    graph.nodes().map(|node| node.scaled_mana_cost()).sum()
}

/// Result of walking the `ExecOut` chain of a root
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompiledAbility {
    /// Root the walk started from
    pub root: Option<NodeId>,
    /// Visited nodes in visit order
    pub nodes: Vec<NodeId>,
    /// Scaled mana cost of the visited nodes
    pub mana_cost: f32,
}

/// Walk `ExecOut` connections depth first from `root`, visiting each node once
pub fn compile_ability(graph: &Graph, root: NodeId) -> CompiledAbility {
    let mut compiled = CompiledAbility {
        root: Some(root),
        ..CompiledAbility::default()
    };
    let mut visited = HashSet::new();
    visit(graph, root, &mut visited, &mut compiled);
    tracing::debug!(
        "Compiled '{}': {} node(s), cost {:.2}",
        graph.name,
        compiled.nodes.len(),
        compiled.mana_cost
    );
    compiled
}

fn visit(
    graph: &Graph,
    node_id: NodeId,
    visited: &mut HashSet<NodeId>,
    compiled: &mut CompiledAbility,
) {
    if !visited.insert(node_id) {
        return;
    }
    let Some(node) = graph.node(node_id) else {
        return;
    };
    compiled.nodes.push(node_id);
    compiled.mana_cost += node.scaled_mana_cost();
    for next in graph.targets_of(node_id, names::EXEC_OUT) {
        visit(graph, next, visited, compiled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeKind, NodeKindTag, Rarity, SpellNode};

    fn node(tag: NodeKindTag) -> SpellNode {
        SpellNode::new(NodeKind::default_for(tag))
    }

    #[test]
    fn test_single_root() {
        let mut graph = Graph::new("root");
        let trigger = graph.add_node(node(NodeKindTag::Trigger));
        let magic = graph.add_node(node(NodeKindTag::Magic));
        graph.connect(trigger, names::EXEC_OUT, magic, names::EXEC_IN).unwrap();
        let mut reordered = Graph::new("reordered");
        reordered.add_node(graph.node(magic).unwrap().clone());
        reordered.add_node(graph.node(trigger).unwrap().clone());
        reordered.connect(trigger, names::EXEC_OUT, magic, names::EXEC_IN).unwrap();

        assert_eq!(resolve_root(&graph), Some(trigger));
        assert_eq!(resolve_root(&reordered), Some(trigger));
    }

    #[test]
    fn test_root_fallback_to_first_node() {
        let mut graph = Graph::new("two roots");
        let first = graph.add_node(node(NodeKindTag::Magic));
        graph.add_node(node(NodeKindTag::Effect));
        assert_eq!(resolve_root(&graph), Some(first));
        assert_eq!(resolve_root(&Graph::new("empty")), None);
    }

    #[test]
    fn test_cycle_without_entry_falls_back_to_first_node() {
        let mut graph = Graph::new("cycle");
        let a = graph.add_node(node(NodeKindTag::Flow));
        let b = graph.add_node(node(NodeKindTag::Flow));
        graph.connect(a, names::EXEC_OUT, b, names::EXEC_IN).unwrap();
        graph.connect(b, names::EXEC_OUT, a, names::EXEC_IN).unwrap();

        assert!(graph.connected_pins(a, names::EXEC_IN).len() == 1);
        assert!(graph.connected_pins(b, names::EXEC_IN).len() == 1);
        assert_eq!(resolve_root(&graph), Some(a));
    }

    #[test]
    fn test_mana_cost_is_deterministic() {
        let mut graph = Graph::new("cost");
        graph.add_node(node(NodeKindTag::Magic).with_rarity(Rarity::Epic));
        graph.add_node(node(NodeKindTag::Condition));
        graph.add_node(node(NodeKindTag::Trigger).with_rarity(Rarity::Legendary));
        assert_eq!(spell_mana_cost(&graph), 45.0);
        assert_eq!(spell_mana_cost(&graph), spell_mana_cost(&graph.clone()));
    }

    #[test]
    fn test_compile_visits_exec_chain_once() {
        let mut graph = Graph::new("compile");
        let a = graph.add_node(node(NodeKindTag::Magic).with_rarity(Rarity::Uncommon));
        let b = graph.add_node(node(NodeKindTag::Effect).with_rarity(Rarity::Uncommon));
        let c = graph.add_node(node(NodeKindTag::Variable));
        let orphan = graph.add_node(node(NodeKindTag::Magic));
        graph.connect(a, names::EXEC_OUT, b, names::EXEC_IN).unwrap();
        graph.connect(a, names::EXEC_OUT, c, names::EXEC_IN).unwrap();
        graph.connect(b, names::EXEC_OUT, c, names::EXEC_IN).unwrap();

        let compiled = compile_ability(&graph, a);
        assert_eq!(compiled.nodes, vec![a, b, c]);
        assert_eq!(compiled.mana_cost, 25.0 + 12.5 + 3.0);
        assert!(!compiled.nodes.contains(&orphan));
    }
}
