//! Dependency graph over a requirement store.
//!
//! An edge `u -> v` means "u depends on v" (equivalently, v blocks u).
//! Construction reads only dependency sets: blocks edges are the reciprocal
//! of dependency edges and are validated separately, not re-derived here.
//! Cross-repository references become synthetic external nodes plus tagged
//! [`CrossRepoEdge`] records for the federation layer.
//!
//! All node collections are ordered so traversal output is deterministic:
//! cycle detection visits nodes in ascending id order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use crate::refs::RequirementRef;
use crate::store::RequirementStore;

/// Classification of a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Both endpoints live in the same repository.
    Local,
    /// Endpoints live in different repositories.
    CrossRepo,
    /// The destination is a shadow requirement.
    Shadow,
}

/// A dependency edge that spans repository boundaries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CrossRepoEdge {
    /// Source requirement id.
    pub from_id: String,
    /// Destination requirement id.
    pub to_id: String,
    /// Source repository (empty for the local repository).
    pub from_repo: String,
    /// Destination repository (empty for the local repository).
    pub to_repo: String,
    /// Edge classification.
    pub kind: EdgeKind,
    /// Whether the destination has been verified reachable.
    pub verified: bool,
    /// Content hash of the shadow destination, when `kind` is `Shadow`.
    pub shadow_hash: String,
}

impl CrossRepoEdge {
    /// Build an unverified cross-repo edge.
    pub fn new(
        from_id: impl Into<String>,
        to_id: impl Into<String>,
        from_repo: impl Into<String>,
        to_repo: impl Into<String>,
        kind: EdgeKind,
    ) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
            from_repo: from_repo.into(),
            to_repo: to_repo.into(),
            kind,
            verified: false,
            shadow_hash: String::new(),
        }
    }

    /// Fully qualified source id.
    pub fn from_full_id(&self) -> String {
        qualify(&self.from_repo, &self.from_id)
    }

    /// Fully qualified destination id.
    pub fn to_full_id(&self) -> String {
        qualify(&self.to_repo, &self.to_id)
    }
}

fn qualify(repo: &str, id: &str) -> String {
    if repo.is_empty() {
        id.to_string()
    } else {
        format!("{repo}:{id}")
    }
}

/// Aggregate graph statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub cross_repo_edges: usize,
    pub avg_out_degree: f64,
    pub cycles: usize,
}

/// Directed dependency graph.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    forward: BTreeMap<String, BTreeSet<String>>,
    reverse: BTreeMap<String, BTreeSet<String>>,
    nodes: BTreeSet<String>,
    cross_repo: Vec<CrossRepoEdge>,
    repo: String,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph from a store in O(N + E).
    ///
    /// `repo` identifies the local repository for cross-repo edge tagging;
    /// empty means unfederated.
    pub fn from_store(store: &RequirementStore, repo: &str) -> Self {
        let mut graph = Self {
            repo: repo.to_string(),
            ..Self::default()
        };

        for req in store.all() {
            graph.nodes.insert(req.req_id.clone());
            for raw in &req.dependencies {
                match RequirementRef::parse(raw) {
                    RequirementRef::Local { req_id } => {
                        graph.insert_edge(&req.req_id, &req_id);
                    }
                    RequirementRef::CrossRepo {
                        repo: to_repo,
                        req_id,
                    } => {
                        // The external node keeps the full reference form so
                        // traversals stay unambiguous across repositories.
                        graph.push_cross_repo_edge(CrossRepoEdge::new(
                            req.req_id.clone(),
                            req_id,
                            repo,
                            to_repo,
                            EdgeKind::CrossRepo,
                        ));
                        graph.insert_edge(&req.req_id, raw);
                    }
                }
            }
            // Blocks sets are intentionally not read: under reciprocity they
            // mirror dependencies, and the validator reports divergence.
        }

        graph
    }

    fn insert_edge(&mut self, from: &str, to: &str) {
        self.nodes.insert(from.to_string());
        self.nodes.insert(to.to_string());
        self.forward
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        self.reverse
            .entry(to.to_string())
            .or_default()
            .insert(from.to_string());
    }

    fn push_cross_repo_edge(&mut self, edge: CrossRepoEdge) {
        let exists = self
            .cross_repo
            .iter()
            .any(|e| e.from_full_id() == edge.from_full_id() && e.to_full_id() == edge.to_full_id());
        if !exists {
            self.cross_repo.push(edge);
        }
    }

    /// Add a dependency edge directly.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.insert_edge(from, to);
    }

    /// Remove a dependency edge.
    pub fn remove_edge(&mut self, from: &str, to: &str) {
        if let Some(targets) = self.forward.get_mut(from) {
            targets.remove(to);
        }
        if let Some(sources) = self.reverse.get_mut(to) {
            sources.remove(from);
        }
    }

    /// Register a cross-repository edge and mirror it into the adjacency so
    /// graph algorithms see the external node.
    pub fn add_cross_repo_edge(&mut self, edge: CrossRepoEdge) {
        self.insert_edge(&edge.from_full_id(), &edge.to_full_id());
        self.push_cross_repo_edge(edge);
    }

    /// All cross-repository edges.
    pub fn cross_repo_edges(&self) -> &[CrossRepoEdge] {
        &self.cross_repo
    }

    /// Cross-repo dependencies of one requirement.
    pub fn cross_repo_dependencies(&self, req_id: &str) -> Vec<&CrossRepoEdge> {
        self.cross_repo
            .iter()
            .filter(|e| e.from_id == req_id)
            .collect()
    }

    /// Cross-repo edges that target one requirement.
    pub fn cross_repo_dependents(&self, req_id: &str) -> Vec<&CrossRepoEdge> {
        self.cross_repo
            .iter()
            .filter(|e| e.to_id == req_id)
            .collect()
    }

    /// Repository this graph was built for.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Direct dependencies of a requirement.
    pub fn dependencies(&self, req_id: &str) -> BTreeSet<String> {
        self.forward.get(req_id).cloned().unwrap_or_default()
    }

    /// Requirements that directly depend on this one.
    pub fn dependents(&self, req_id: &str) -> BTreeSet<String> {
        self.reverse.get(req_id).cloned().unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.forward.values().map(BTreeSet::len).sum()
    }

    pub fn contains(&self, req_id: &str) -> bool {
        self.nodes.contains(req_id)
    }

    /// Everything a requirement transitively depends on, excluding itself.
    pub fn transitive_dependencies(&self, req_id: &str) -> BTreeSet<String> {
        self.reach(req_id, &self.forward)
    }

    /// Everything transitively blocked by a requirement, excluding itself.
    pub fn transitive_blocks(&self, req_id: &str) -> BTreeSet<String> {
        self.reach(req_id, &self.reverse)
    }

    fn reach(
        &self,
        start: &str,
        adjacency: &BTreeMap<String, BTreeSet<String>>,
    ) -> BTreeSet<String> {
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut pending: Vec<&String> = adjacency
            .get(start)
            .map(|s| s.iter().collect())
            .unwrap_or_default();

        while let Some(current) = pending.pop() {
            if current.as_str() == start || !seen.insert(current.clone()) {
                continue;
            }
            if let Some(next) = adjacency.get(current) {
                pending.extend(next.iter().filter(|n| !seen.contains(*n)));
            }
        }

        seen
    }

    /// Strongly connected components with more than one member, via an
    /// iterative Tarjan pass. Self-loops are not reported here; the validator
    /// owns that diagnostic. Component membership order follows the
    /// discovery order of the pass, which is deterministic because roots are
    /// visited in ascending id order.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        struct Frame<'a> {
            node: &'a str,
            neighbors: Vec<&'a str>,
            next: usize,
        }

        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut lowlink: HashMap<&str, usize> = HashMap::new();
        let mut on_stack: BTreeSet<&str> = BTreeSet::new();
        let mut stack: Vec<&str> = Vec::new();
        let mut counter = 0usize;
        let mut components: Vec<Vec<String>> = Vec::new();

        for root in &self.nodes {
            if index.contains_key(root.as_str()) {
                continue;
            }

            let mut frames = vec![Frame {
                node: root.as_str(),
                neighbors: self.neighbor_list(root),
                next: 0,
            }];
            index.insert(root.as_str(), counter);
            lowlink.insert(root.as_str(), counter);
            counter += 1;
            stack.push(root.as_str());
            on_stack.insert(root.as_str());

            while let Some(frame) = frames.last_mut() {
                if frame.next < frame.neighbors.len() {
                    let neighbor = frame.neighbors[frame.next];
                    frame.next += 1;
                    if !index.contains_key(neighbor) {
                        index.insert(neighbor, counter);
                        lowlink.insert(neighbor, counter);
                        counter += 1;
                        stack.push(neighbor);
                        on_stack.insert(neighbor);
                        frames.push(Frame {
                            node: neighbor,
                            neighbors: self.neighbor_list(neighbor),
                            next: 0,
                        });
                    } else if on_stack.contains(neighbor) {
                        let node = frame.node;
                        let candidate = index[neighbor].min(lowlink[node]);
                        lowlink.insert(node, candidate);
                    }
                } else {
                    let finished = frames.pop().expect("frame present");
                    if let Some(parent) = frames.last() {
                        let candidate = lowlink[finished.node].min(lowlink[parent.node]);
                        lowlink.insert(parent.node, candidate);
                    }
                    if lowlink[finished.node] == index[finished.node] {
                        let mut component: Vec<String> = Vec::new();
                        loop {
                            let member = stack.pop().expect("scc member on stack");
                            on_stack.remove(member);
                            component.push(member.to_string());
                            if member == finished.node {
                                break;
                            }
                        }
                        if component.len() > 1 {
                            components.push(component);
                        }
                    }
                }
            }
        }

        components
    }

    fn neighbor_list<'a>(&'a self, node: &str) -> Vec<&'a str> {
        self.forward
            .get(node)
            .map(|s| s.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// A closed walk through one cycle's members, for human-readable
    /// reporting. The first element is repeated at the end when the walk
    /// closes.
    pub fn find_cycle_path(&self, members: &BTreeSet<String>) -> Vec<String> {
        let Some(start) = members.iter().next() else {
            return Vec::new();
        };

        let mut path = vec![start.clone()];
        let mut visited: BTreeSet<String> = BTreeSet::new();
        visited.insert(start.clone());
        let mut current: &String = start;

        loop {
            let candidates: Vec<&String> = self
                .forward
                .get(current)
                .map(|next| next.iter().filter(|n| members.contains(*n)).collect())
                .unwrap_or_default();
            if candidates.is_empty() {
                break;
            }

            if let Some(unvisited) = candidates
                .iter()
                .copied()
                .find(|n| !visited.contains(n.as_str()))
            {
                path.push(unvisited.clone());
                visited.insert(unvisited.clone());
                current = unvisited;
                continue;
            }
            if candidates.contains(&start) {
                path.push(start.clone());
                return path;
            }
            break;
        }

        // No closed walk found (degenerate member set): report members as-is.
        members.iter().cloned().collect()
    }

    /// Kahn's algorithm. Returns `None` when any cycle exists, otherwise a
    /// total order in which every dependency precedes its dependents.
    pub fn topological_sort(&self) -> Option<Vec<String>> {
        let mut remaining_deps: BTreeMap<&str, usize> = self
            .nodes
            .iter()
            .map(|n| {
                (
                    n.as_str(),
                    self.forward.get(n).map(BTreeSet::len).unwrap_or(0),
                )
            })
            .collect();

        let mut queue: VecDeque<&str> = remaining_deps
            .iter()
            .filter(|(_, deps)| **deps == 0)
            .map(|(n, _)| *n)
            .collect();
        let mut order: Vec<String> = Vec::with_capacity(self.nodes.len());

        while let Some(node) = queue.pop_front() {
            order.push(node.to_string());
            if let Some(dependents) = self.reverse.get(node) {
                for dependent in dependents {
                    let deps = remaining_deps
                        .get_mut(dependent.as_str())
                        .expect("known node");
                    *deps -= 1;
                    if *deps == 0 {
                        queue.push_back(dependent.as_str());
                    }
                }
            }
        }

        (order.len() == self.nodes.len()).then_some(order)
    }

    /// Nodes ranked by how many others they transitively block: only nodes
    /// with a positive count, count descending, ties broken by id ascending.
    pub fn critical_path(&self) -> Vec<String> {
        let mut ranked: Vec<(usize, &String)> = self
            .nodes
            .iter()
            .map(|n| (self.transitive_blocks(n).len(), n))
            .filter(|(count, _)| *count > 0)
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        ranked.into_iter().map(|(_, n)| n.clone()).collect()
    }

    /// Aggregate statistics.
    pub fn statistics(&self) -> GraphStats {
        let nodes = self.node_count();
        let edges = self.edge_count();
        GraphStats {
            nodes,
            edges,
            cross_repo_edges: self.cross_repo.len(),
            avg_out_degree: if nodes == 0 {
                0.0
            } else {
                edges as f64 / nodes as f64
            },
            cycles: self.find_cycles().len(),
        }
    }
}
