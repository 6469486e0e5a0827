//! Kahn's-algorithm topological sort plus an execution-side ready/complete
//! gate over an `AgentTask` DAG.

use std::collections::{HashMap, HashSet, VecDeque};

use shannon_core::model::{AgentResult, AgentResultStatus, AgentTask};

/// Soft diagnostics produced while pre-processing the raw dependency list,
/// before cycle detection runs. These are warnings, not errors (spec §4.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerWarning {
    /// A task declared itself as its own dependency; the self-edge was dropped.
    SelfDependency { id: String },
    /// A task declared a dependency on an id that is not in the task set;
    /// the edge was dropped.
    UnknownDependency { id: String, dependency: String },
}

/// A cycle found during topological sort: the set of nodes that never
/// reached in-degree zero, plus one DFS-extracted path through the cycle
/// with the first and last element equal (spec property 3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub remaining_nodes: Vec<String>,
    pub cycle_path: Vec<String>,
}

impl CycleReport {
    /// Human-readable "A → B → C → A" rendering of `cycle_path`.
    pub fn render(&self) -> String {
        self.cycle_path.join(" \u{2192} ")
    }
}

pub type TopoSortResult = Result<Vec<String>, CycleReport>;

/// Drop self-dependencies and dependencies on unknown ids, returning the
/// cleaned adjacency plus the warnings raised along the way.
fn preprocess(tasks: &[AgentTask]) -> (HashMap<String, Vec<String>>, Vec<SchedulerWarning>) {
    let known: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    let mut warnings = Vec::new();
    let mut deps: HashMap<String, Vec<String>> = HashMap::new();

    for task in tasks {
        let mut clean = Vec::new();
        for dep in &task.dependencies {
            if dep == &task.id {
                warnings.push(SchedulerWarning::SelfDependency {
                    id: task.id.clone(),
                });
                continue;
            }
            if !known.contains(dep.as_str()) {
                warnings.push(SchedulerWarning::UnknownDependency {
                    id: task.id.clone(),
                    dependency: dep.clone(),
                });
                continue;
            }
            clean.push(dep.clone());
        }
        deps.insert(task.id.clone(), clean);
    }
    (deps, warnings)
}

/// DFS from every node, tracking the current recursion stack, to extract one
/// concrete cycle path once Kahn's algorithm has determined a cycle exists.
fn extract_cycle(deps: &HashMap<String, Vec<String>>, remaining: &HashSet<String>) -> Vec<String> {
    let mut visiting: HashSet<String> = HashSet::new();
    let mut stack: Vec<String> = Vec::new();

    fn visit(
        node: &str,
        deps: &HashMap<String, Vec<String>>,
        remaining: &HashSet<String>,
        visiting: &mut HashSet<String>,
        stack: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        if let Some(pos) = stack.iter().position(|n| n == node) {
            let mut cycle: Vec<String> = stack[pos..].to_vec();
            cycle.push(node.to_string());
            return Some(cycle);
        }
        if visiting.contains(node) {
            return None;
        }
        visiting.insert(node.to_string());
        stack.push(node.to_string());
        if let Some(edges) = deps.get(node) {
            for dep in edges {
                if remaining.contains(dep) {
                    if let Some(cycle) = visit(dep, deps, remaining, visiting, stack) {
                        return Some(cycle);
                    }
                }
            }
        }
        stack.pop();
        None
    }

    let mut nodes: Vec<&String> = remaining.iter().collect();
    nodes.sort();
    for node in nodes {
        if let Some(cycle) = visit(node, deps, remaining, &mut visiting, &mut stack) {
            return cycle;
        }
    }
    Vec::new()
}

/// Run Kahn's algorithm over the pre-processed adjacency. `deps` maps a
/// node id to the ids it depends on (must complete before it can run).
fn topo_sort(deps: &HashMap<String, Vec<String>>) -> TopoSortResult {
    // `dependents[x]` = nodes that depend on x, i.e. the reverse edges Kahn's
    // algorithm walks when a node's in-degree drops to zero.
    let mut dependents: HashMap<String, Vec<String>> =
        deps.keys().map(|k| (k.clone(), Vec::new())).collect();
    let mut in_degree: HashMap<String, usize> = deps.keys().map(|k| (k.clone(), 0)).collect();

    for (node, node_deps) in deps {
        *in_degree.get_mut(node).unwrap() = node_deps.len();
        for dep in node_deps {
            dependents.get_mut(dep).unwrap().push(node.clone());
        }
    }

    let mut queue: VecDeque<String> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(id, _)| id.clone())
        .collect();
    // Deterministic order: decision paths must not depend on HashMap iteration order.
    let mut queue: Vec<String> = queue.drain(..).collect();
    queue.sort();
    let mut queue: VecDeque<String> = queue.into();

    let mut order = Vec::with_capacity(deps.len());
    while let Some(node) = queue.pop_front() {
        order.push(node.clone());
        let mut newly_zero = Vec::new();
        if let Some(children) = dependents.get(&node) {
            for child in children {
                let deg = in_degree.get_mut(child).unwrap();
                *deg -= 1;
                if *deg == 0 {
                    newly_zero.push(child.clone());
                }
            }
        }
        newly_zero.sort();
        for child in newly_zero {
            queue.push_back(child);
        }
    }

    if order.len() == deps.len() {
        Ok(order)
    } else {
        let ordered: HashSet<&String> = order.iter().collect();
        let remaining: HashSet<String> = deps
            .keys()
            .filter(|id| !ordered.contains(id))
            .cloned()
            .collect();
        let cycle_path = extract_cycle(deps, &remaining);
        let mut remaining_nodes: Vec<String> = remaining.into_iter().collect();
        remaining_nodes.sort();
        Err(CycleReport {
            remaining_nodes,
            cycle_path,
        })
    }
}

/// Per-node execution state tracked by the runtime gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Pending,
    Running,
    Completed,
    Failed,
    /// A dependency failed and the configured policy is "halt subtree".
    Blocked,
}

/// Behavior when a task's dependency fails terminally (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DependencyFailurePolicy {
    /// Mark the whole dependent subtree `Blocked` (the spec's stated default).
    #[default]
    HaltSubtree,
    /// Leave downstream tasks eligible to run even after a dependency fails.
    Continue,
}

/// The execution-side gate: `ready`/`complete` over a validated DAG.
pub struct Scheduler {
    deps: HashMap<String, Vec<String>>,
    dependents: HashMap<String, Vec<String>>,
    states: HashMap<String, NodeState>,
    policy: DependencyFailurePolicy,
}

impl Scheduler {
    /// Pre-process and validate `tasks`, returning warnings alongside the
    /// scheduler (or a `CycleReport` if the DAG is invalid).
    pub fn new(
        tasks: &[AgentTask],
        policy: DependencyFailurePolicy,
    ) -> Result<(Self, Vec<SchedulerWarning>), CycleReport> {
        let (deps, warnings) = preprocess(tasks);
        topo_sort(&deps)?;

        let mut dependents: HashMap<String, Vec<String>> =
            deps.keys().map(|k| (k.clone(), Vec::new())).collect();
        for (node, node_deps) in &deps {
            for dep in node_deps {
                dependents.get_mut(dep).unwrap().push(node.clone());
            }
        }

        let states = deps.keys().map(|k| (k.clone(), NodeState::Pending)).collect();

        Ok((
            Self {
                deps,
                dependents,
                states,
                policy,
            },
            warnings,
        ))
    }

    /// Validate `tasks` as a topological order only, without building a
    /// runtime gate — used by PLANNING to check a cycle before committing
    /// to a plan (spec §4.8).
    pub fn validate(tasks: &[AgentTask]) -> (TopoSortResult, Vec<SchedulerWarning>) {
        let (deps, warnings) = preprocess(tasks);
        (topo_sort(&deps), warnings)
    }

    /// The set of task ids whose dependencies have all completed and which
    /// have not yet started.
    pub fn ready(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .states
            .iter()
            .filter(|(_, state)| **state == NodeState::Pending)
            .filter(|(id, _)| {
                self.deps
                    .get(*id)
                    .map(|d| d.iter().all(|dep| self.states.get(dep) == Some(&NodeState::Completed)))
                    .unwrap_or(true)
            })
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn mark_running(&mut self, id: &str) {
        if let Some(state) = self.states.get_mut(id) {
            *state = NodeState::Running;
        }
    }

    /// Record the outcome of a task. On failure, propagates `Blocked` to the
    /// dependent subtree unless the policy is `Continue`.
    pub fn complete(&mut self, id: &str, result: &AgentResult) {
        let state = match result.status {
            AgentResultStatus::Completed => NodeState::Completed,
            AgentResultStatus::Failed => NodeState::Failed,
        };
        self.states.insert(id.to_string(), state);

        if state == NodeState::Failed && self.policy == DependencyFailurePolicy::HaltSubtree {
            self.block_subtree(id);
        }
    }

    fn block_subtree(&mut self, failed_id: &str) {
        let mut queue: VecDeque<String> = self
            .dependents
            .get(failed_id)
            .cloned()
            .unwrap_or_default()
            .into();
        while let Some(id) = queue.pop_front() {
            if self.states.get(&id) == Some(&NodeState::Pending) {
                self.states.insert(id.clone(), NodeState::Blocked);
                if let Some(children) = self.dependents.get(&id) {
                    queue.extend(children.clone());
                }
            }
        }
    }

    pub fn state_of(&self, id: &str) -> Option<NodeState> {
        self.states.get(id).copied()
    }

    /// True once every node is in a terminal state (`Completed`, `Failed`,
    /// or `Blocked`).
    pub fn is_done(&self) -> bool {
        self.states
            .values()
            .all(|s| !matches!(s, NodeState::Pending | NodeState::Running))
    }

    pub fn blocked_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .states
            .iter()
            .filter(|(_, s)| **s == NodeState::Blocked)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}
