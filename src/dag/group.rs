// src/dag/group.rs

//! Task groups and their execution strategies.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use tracing::debug;

use crate::dag::graph::TaskGraph;
use crate::task::{GroupId, Hooks, Task, TaskName, TaskState};

/// How the members of a group are ordered.
#[derive(Debug, Clone)]
pub enum ExecutionStrategy {
    /// One member at a time, in submission order.
    Sequential,
    /// Members run once their graph predecessors have succeeded.
    Graph(TaskGraph),
}

/// A live group of tasks registered in the scheduler.
///
/// Member tasks live in the flat scheduler registry; the group only holds
/// their names. When a member is removed from the registry its last state is
/// kept in `retired` so ordering and cascade decisions stay stable.
#[derive(Debug, Clone)]
pub struct TaskGroup {
    pub id: GroupId,
    pub name: String,
    /// Member names. For `Graph`, member `i` is graph node `i`.
    pub members: Vec<TaskName>,
    pub strategy: ExecutionStrategy,
    pub hooks: Hooks,
    /// Working directory for the group's hooks.
    pub cwd: Option<PathBuf>,
    /// Set at the first member admission; guards the on-start hook.
    pub started: bool,
    retired: HashMap<TaskName, TaskState>,
}

impl TaskGroup {
    pub fn new(
        id: GroupId,
        name: String,
        members: Vec<TaskName>,
        strategy: ExecutionStrategy,
        hooks: Hooks,
    ) -> Self {
        Self {
            id,
            name,
            members,
            strategy,
            hooks,
            cwd: None,
            started: false,
            retired: HashMap::new(),
        }
    }

    /// Remember the final state of a member that leaves the registry.
    pub fn retire(&mut self, task: &str, state: TaskState) {
        if self.members.iter().any(|m| m == task) {
            self.retired.insert(task.to_string(), state);
        }
    }

    /// Current state of a member, falling back to its retired state.
    ///
    /// `None` means the member is unknown to both; it is treated as never
    /// succeeding, so anything depending on it stays blocked.
    ///
    /// A registry entry only counts while it still belongs to this group: a
    /// removed member's name may be reused by an unrelated task.
    pub fn member_state(&self, task: &str, registry: &HashMap<TaskName, Task>) -> Option<TaskState> {
        registry
            .get(task)
            .filter(|t| t.group == Some(self.id))
            .map(|t| t.state)
            .or_else(|| self.retired.get(task).copied())
    }

    fn state_at(&self, idx: usize, registry: &HashMap<TaskName, Task>) -> Option<TaskState> {
        self.member_state(&self.members[idx], registry)
    }

    /// Members whose ordering preconditions are satisfied and which are
    /// WAITING, i.e. candidates for admission.
    pub fn eligible(&self, registry: &HashMap<TaskName, Task>) -> Vec<TaskName> {
        match &self.strategy {
            ExecutionStrategy::Sequential => {
                for idx in 0..self.members.len() {
                    match self.state_at(idx, registry) {
                        Some(TaskState::Succeeded) => continue,
                        Some(TaskState::Waiting) => {
                            return vec![self.members[idx].clone()];
                        }
                        // A live, suspended, failed, cancelled or unknown
                        // member holds everything behind it.
                        _ => return Vec::new(),
                    }
                }
                Vec::new()
            }
            ExecutionStrategy::Graph(graph) => (0..graph.len())
                .filter(|&idx| self.state_at(idx, registry) == Some(TaskState::Waiting))
                .filter(|&idx| {
                    graph
                        .dependencies_of(idx)
                        .iter()
                        .all(|&dep| self.state_at(dep, registry) == Some(TaskState::Succeeded))
                })
                .map(|idx| self.members[idx].clone())
                .collect(),
        }
    }

    /// Non-terminal members that must be cancelled because something they
    /// (transitively) depend on failed or was cancelled.
    ///
    /// Traversal never continues through a terminal member: a member that is
    /// already cancelled has either been cascaded before or will be handled
    /// as a cascade source in its own right.
    pub fn cascade_targets(&self, registry: &HashMap<TaskName, Task>) -> Vec<TaskName> {
        let unsuccessful = |idx: usize| {
            self.state_at(idx, registry)
                .is_some_and(TaskState::is_unsuccessful_end)
        };
        let non_terminal = |idx: usize| {
            self.state_at(idx, registry)
                .is_some_and(|s| !s.is_terminal())
        };

        match &self.strategy {
            ExecutionStrategy::Sequential => {
                let Some(first_bad) = (0..self.members.len()).find(|&idx| unsuccessful(idx)) else {
                    return Vec::new();
                };
                ((first_bad + 1)..self.members.len())
                    .filter(|&idx| non_terminal(idx))
                    .map(|idx| self.members[idx].clone())
                    .collect()
            }
            ExecutionStrategy::Graph(graph) => {
                let mut stack: Vec<usize> = (0..graph.len())
                    .filter(|&idx| unsuccessful(idx))
                    .flat_map(|idx| graph.dependents_of(idx).iter().copied())
                    .collect();
                let mut visited: HashSet<usize> = HashSet::new();
                let mut targets = Vec::new();

                while let Some(idx) = stack.pop() {
                    if !visited.insert(idx) || !non_terminal(idx) {
                        continue;
                    }
                    debug!(
                        group = %self.name,
                        task = %self.members[idx],
                        "dependent of a failed task; cascading"
                    );
                    targets.push(self.members[idx].clone());
                    stack.extend(graph.dependents_of(idx).iter().copied());
                }

                targets.sort_by_key(|name| self.members.iter().position(|m| m == name));
                targets
            }
        }
    }

    /// Whether every member has reached a terminal state (or left the
    /// registry after reaching one).
    pub fn all_terminal(&self, registry: &HashMap<TaskName, Task>) -> bool {
        self.members.iter().all(|m| {
            self.member_state(m, registry)
                .is_some_and(TaskState::is_terminal)
        })
    }
}
