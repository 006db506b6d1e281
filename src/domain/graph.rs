//! Ordering graph over task relationships
//!
//! `depends-on` and `blocks` relationships order work, so they must stay
//! acyclic. The graph is built from [`Relationships`] and uses petgraph for
//! cycle detection.

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use thiserror::Error;

use super::id::TaskId;
use super::relationship::{RelationKind, Relationships};
use super::task::TaskStatus;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("Adding dependency would create a cycle: {0} -> {1}")]
    CycleDetected(TaskId, TaskId),

    #[error("Self-dependency not allowed: {0}")]
    SelfDependency(TaskId),
}

/// Directed graph where an edge `a -> b` means "a must finish before b"
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<TaskId, ()>,
    node_map: HashMap<TaskId, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the graph from the ordering relationships
    pub fn from_relationships(rels: &Relationships) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        for (task, kind, targets) in rels.iter() {
            for target in targets {
                graph.add_relation(task, kind, target)?;
            }
        }
        Ok(graph)
    }

    /// Builds the graph from relationships as found in a document, skipping
    /// each edge that would close a cycle. Returns the skipped edges' errors.
    pub fn from_relationships_lenient(rels: &Relationships) -> (Self, Vec<GraphError>) {
        let mut graph = Self::new();
        let mut skipped = Vec::new();
        for (task, kind, targets) in rels.iter() {
            for target in targets {
                if let Err(e) = graph.add_relation(task, kind, target) {
                    skipped.push(e);
                }
            }
        }
        (graph, skipped)
    }

    fn node(&mut self, id: &TaskId) -> NodeIndex {
        if let Some(idx) = self.node_map.get(id) {
            return *idx;
        }
        let idx = self.graph.add_node(id.clone());
        self.node_map.insert(id.clone(), idx);
        idx
    }

    /// Adds one relationship edge; non-ordering kinds are ignored
    pub fn add_relation(
        &mut self,
        task: &TaskId,
        kind: RelationKind,
        target: &TaskId,
    ) -> Result<(), GraphError> {
        match kind {
            RelationKind::DependsOn => self.add_dependency(task, target),
            RelationKind::Blocks => self.add_dependency(target, task),
            _ => Ok(()),
        }
    }

    /// Adds an edge meaning `task` depends on `depends_on`
    pub fn add_dependency(&mut self, task: &TaskId, depends_on: &TaskId) -> Result<(), GraphError> {
        if task == depends_on {
            return Err(GraphError::SelfDependency(task.clone()));
        }

        let task_idx = self.node(task);
        let dep_idx = self.node(depends_on);
        let edge = self.graph.add_edge(dep_idx, task_idx, ());

        if is_cyclic_directed(&self.graph) {
            self.graph.remove_edge(edge);
            return Err(GraphError::CycleDetected(task.clone(), depends_on.clone()));
        }

        Ok(())
    }

    /// Checks whether replacing `task`'s targets of `kind` keeps the graph acyclic
    pub fn check_replacement(
        rels: &Relationships,
        task: &TaskId,
        kind: RelationKind,
        targets: &[TaskId],
    ) -> Result<(), GraphError> {
        let mut without = rels.clone();
        without.remove(task, kind);
        let mut graph = Self::from_relationships(&without)?;
        for target in targets {
            graph.add_relation(task, kind, target)?;
        }
        Ok(())
    }

    /// Returns the direct prerequisites of a task
    pub fn dependencies(&self, task: &TaskId) -> Vec<TaskId> {
        let Some(idx) = self.node_map.get(task) else {
            return vec![];
        };
        let mut deps: Vec<TaskId> = self
            .graph
            .neighbors_directed(*idx, petgraph::Direction::Incoming)
            .filter_map(|i| self.graph.node_weight(i).cloned())
            .collect();
        deps.sort();
        deps
    }

    /// Returns prerequisites that are still open
    pub fn open_dependencies(
        &self,
        task: &TaskId,
        statuses: &HashMap<TaskId, TaskStatus>,
    ) -> Vec<TaskId> {
        self.dependencies(task)
            .into_iter()
            .filter(|dep| statuses.get(dep).is_some_and(|s| *s == TaskStatus::Pending))
            .collect()
    }
}
