//! Task dependency graph and plan analysis.
//!
//! The graph is built from a task set's declared dependencies. It provides
//! the topological execution order (with cycle detection), the parallel
//! group hint, the critical-path duration, and the total estimated cost.

use crate::core::task::{Task, TaskId};
use crate::error::{Error, Result};
use crate::registry::CapabilityRegistry;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

/// Per-node data kept in the graph.
#[derive(Debug, Clone)]
struct Node {
    id: TaskId,
    estimated_duration_ms: u64,
    agent: String,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Visited,
}

/// Result of analysing a task set.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphAnalysis {
    pub execution_order: Vec<TaskId>,
    pub parallel_groups: Vec<Vec<TaskId>>,
    pub total_estimated_cost: f64,
    pub total_estimated_duration_ms: u64,
}

/// The task dependency graph.
///
/// Edges point from a dependency to its dependent. Node indices follow the
/// order tasks were supplied in, which keeps every traversal deterministic.
pub struct TaskDAG {
    graph: DiGraph<Node, ()>,
    task_index: HashMap<TaskId, NodeIndex>,
}

impl TaskDAG {
    /// Build the graph for a task set.
    ///
    /// # Errors
    /// Returns a planning error if two tasks share an id or a task depends
    /// on an id that is not in the set. Cycles are reported later by
    /// [`TaskDAG::topological_order`].
    pub fn build(tasks: &[Task]) -> Result<Self> {
        let mut graph = DiGraph::with_capacity(tasks.len(), tasks.len());
        let mut task_index = HashMap::with_capacity(tasks.len());

        for task in tasks {
            let index = graph.add_node(Node {
                id: task.id.clone(),
                estimated_duration_ms: task.estimated_duration_ms,
                agent: task.agent().to_string(),
            });
            if task_index.insert(task.id.clone(), index).is_some() {
                return Err(Error::Planning(format!("Duplicate task id {}", task.id)));
            }
        }

        for task in tasks {
            let to = task_index[&task.id];
            for dep in &task.dependencies {
                let from = task_index.get(dep).ok_or_else(|| {
                    Error::Planning(format!("Task {} depends on unknown task {}", task.id, dep))
                })?;
                graph.add_edge(*from, to, ());
            }
        }

        Ok(Self { graph, task_index })
    }

    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains_task(&self, id: &TaskId) -> bool {
        self.task_index.contains_key(id)
    }

    /// Direct dependencies of a node, in declaration order.
    fn dependency_nodes(&self, index: NodeIndex) -> Vec<NodeIndex> {
        // petgraph yields the most recently added edge first.
        let mut deps: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(index, Direction::Incoming)
            .collect();
        deps.reverse();
        deps
    }

    fn id_of(&self, index: NodeIndex) -> TaskId {
        self.graph[index].id.clone()
    }

    /// Tasks not yet completed whose dependencies are all in `completed`.
    pub fn ready_tasks(&self, completed: &HashSet<TaskId>) -> Vec<TaskId> {
        self.graph
            .node_indices()
            .filter(|&index| {
                let node = &self.graph[index];
                !completed.contains(&node.id)
                    && self
                        .graph
                        .neighbors_directed(index, Direction::Incoming)
                        .all(|dep| completed.contains(&self.graph[dep].id))
            })
            .map(|index| self.id_of(index))
            .collect()
    }

    /// Depth-first topological sort.
    ///
    /// Every dependency appears before its dependents. Re-entering a node
    /// that is still being visited means the graph has a cycle.
    pub fn topological_order(&self) -> Result<Vec<TaskId>> {
        let mut marks: HashMap<NodeIndex, Mark> = HashMap::with_capacity(self.task_count());
        let mut order = Vec::with_capacity(self.task_count());

        for index in self.graph.node_indices() {
            self.visit(index, &mut marks, &mut order)?;
        }

        Ok(order)
    }

    fn visit(
        &self,
        index: NodeIndex,
        marks: &mut HashMap<NodeIndex, Mark>,
        order: &mut Vec<TaskId>,
    ) -> Result<()> {
        match marks.get(&index) {
            Some(Mark::Visiting) => {
                return Err(Error::Planning(format!(
                    "Circular dependency detected at task {}",
                    self.graph[index].id
                )))
            }
            Some(Mark::Visited) => return Ok(()),
            None => {}
        }

        marks.insert(index, Mark::Visiting);
        for dep in self.dependency_nodes(index) {
            self.visit(dep, marks, order)?;
        }
        marks.insert(index, Mark::Visited);
        order.push(self.id_of(index));
        Ok(())
    }

    /// Tasks with no dependencies, as one group when there are several.
    pub fn parallel_groups(&self) -> Vec<Vec<TaskId>> {
        let roots: Vec<TaskId> = self
            .graph
            .node_indices()
            .filter(|&index| {
                self.graph
                    .neighbors_directed(index, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|index| self.id_of(index))
            .collect();

        if roots.len() > 1 {
            vec![roots]
        } else {
            Vec::new()
        }
    }

    /// Length of the longest dependency chain, in milliseconds.
    ///
    /// `finish(t) = max(finish(dep)) + t.estimate`, memoized per node.
    pub fn critical_path_ms(&self) -> Result<u64> {
        // Guarantees termination of the recursion below.
        self.topological_order()?;

        let mut memo: HashMap<NodeIndex, u64> = HashMap::with_capacity(self.task_count());
        Ok(self
            .graph
            .node_indices()
            .map(|index| self.finish_time(index, &mut memo))
            .max()
            .unwrap_or(0))
    }

    fn finish_time(&self, index: NodeIndex, memo: &mut HashMap<NodeIndex, u64>) -> u64 {
        if let Some(&t) = memo.get(&index) {
            return t;
        }
        let deps_done = self
            .graph
            .neighbors_directed(index, Direction::Incoming)
            .collect::<Vec<_>>()
            .into_iter()
            .map(|dep| self.finish_time(dep, memo))
            .max()
            .unwrap_or(0);
        let total = deps_done + self.graph[index].estimated_duration_ms;
        memo.insert(index, total);
        total
    }

    /// Sum of each task's assigned provider cost.
    pub fn total_cost(&self, registry: &CapabilityRegistry) -> f64 {
        self.graph
            .node_weights()
            .map(|node| registry.cost_of(&node.agent))
            .sum()
    }

    /// Run every analysis step.
    pub fn analyze(&self, registry: &CapabilityRegistry) -> Result<GraphAnalysis> {
        Ok(GraphAnalysis {
            execution_order: self.topological_order()?,
            parallel_groups: self.parallel_groups(),
            total_estimated_cost: self.total_cost(registry),
            total_estimated_duration_ms: self.critical_path_ms()?,
        })
    }
}

impl std::fmt::Debug for TaskDAG {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDAG")
            .field("tasks", &self.task_count())
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}
