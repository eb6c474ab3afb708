//! Tool selection and dependency-ordered execution planning.

use petgraph::graph::{DiGraph, NodeIndex};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use tracing::{debug, warn};

use super::needs::{NeedAssessment, Priority};
use crate::mcp::normalize_tool_name;

/// A tool chosen for execution. Explicit tools carry no priority until a need claims them.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedTool {
    pub name: String,
    pub priority: Option<Priority>,
    pub explicit: bool,
}

/// Explicit tools first in their given order and spelling, then need-derived tools
/// in need order. With no needs the explicit list comes back unchanged.
pub fn select_relevant_tools(
    needs: &NeedAssessment,
    explicit: &[String],
    need_tools: &BTreeMap<String, Vec<String>>,
) -> Vec<SelectedTool> {
    if needs.is_empty() {
        return explicit
            .iter()
            .map(|name| SelectedTool {
                name: name.clone(),
                priority: None,
                explicit: true,
            })
            .collect();
    }

    let mut selected: Vec<SelectedTool> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for name in explicit {
        let key = normalize_tool_name(name);
        if positions.contains_key(&key) {
            continue;
        }
        positions.insert(key, selected.len());
        selected.push(SelectedTool {
            name: name.clone(),
            priority: None,
            explicit: true,
        });
    }

    for (category, need) in needs.iter() {
        let Some(tools) = need_tools.get(category) else {
            debug!("No tools mapped for need {}", category);
            continue;
        };
        for name in tools {
            let key = normalize_tool_name(name);
            match positions.get(&key) {
                Some(&idx) => {
                    let entry = &mut selected[idx];
                    entry.priority = entry.priority.max(Some(need.priority));
                }
                None => {
                    positions.insert(key, selected.len());
                    selected.push(SelectedTool {
                        name: name.clone(),
                        priority: Some(need.priority),
                        explicit: false,
                    });
                }
            }
        }
    }

    selected
}

/// Indices into `tools`, prerequisites before dependents, ties broken by position.
///
/// A tool named more than once (in any spelling) is planned at its first
/// position only. Only edges between selected tools count. A cycle falls back
/// to the given order.
pub fn execution_order(tools: &[String], dependencies: &BTreeMap<String, Vec<String>>) -> Vec<usize> {
    // node i holds the position of the i-th distinct tool, so node order is position order
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let mut index_of: HashMap<String, NodeIndex> = HashMap::new();

    for (position, name) in tools.iter().enumerate() {
        let key = normalize_tool_name(name);
        if index_of.contains_key(&key) {
            debug!("Tool {} selected twice, keeping first position", name);
            continue;
        }
        index_of.insert(key, graph.add_node(position));
    }

    for (dependent, prerequisites) in dependencies {
        let Some(&to) = index_of.get(&normalize_tool_name(dependent)) else {
            continue;
        };
        for prerequisite in prerequisites {
            if let Some(&from) = index_of.get(&normalize_tool_name(prerequisite)) {
                if from != to {
                    graph.update_edge(from, to, ());
                }
            }
        }
    }

    if petgraph::algo::is_cyclic_directed(&graph) {
        warn!("Tool dependency cycle detected, using selection order");
        return graph.node_indices().map(|n| graph[n]).collect();
    }

    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|n| {
            graph
                .neighbors_directed(n, petgraph::Direction::Incoming)
                .count()
        })
        .collect();

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &d)| d == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(Reverse(index)) = ready.pop() {
        let node = NodeIndex::new(index);
        order.push(graph[node]);
        for next in graph.neighbors(node) {
            in_degree[next.index()] -= 1;
            if in_degree[next.index()] == 0 {
                ready.push(Reverse(next.index()));
            }
        }
    }

    order
}
