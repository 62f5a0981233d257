use crate::errors::ShuntError;
use crate::plan::types::ToolCall;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

/// Query terms that signal a follow-up on an earlier search.
const EXPANSION_WORDS: &[&str] = &["more", "additional", "details", "follow", "continue"];

/// Tools whose invocations read and write workspace files.
const FILE_TOOLS: &[&str] = &["read_file", "write_file", "edit_file"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Data,
    Ordering,
    Conflict,
}

impl EdgeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::Data => "data",
            EdgeKind::Ordering => "ordering",
            EdgeKind::Conflict => "conflict",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    pub strength: f64,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: String,
    pub tool_name: String,
    pub parallel_safe: bool,
    /// Topological depth: 0 for steps with no prerequisites.
    pub level: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyReport {
    /// step id → prerequisite step ids
    pub dependencies: HashMap<String, HashSet<String>>,
    pub graph: DependencyGraph,
}

/// Derives inter-step dependencies from a tool-call batch.
///
/// Three passes contribute edges: data flow (argument references to earlier
/// outputs), ordering (batch-order constraints), and conflicts (steps that
/// must not run concurrently). All edges point from lower batch index to
/// higher, so the result is acyclic by construction.
pub struct DependencyAnalyzer;

impl DependencyAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, calls: &[ToolCall]) -> Result<DependencyReport, ShuntError> {
        let mut edges: Vec<GraphEdge> = Vec::new();
        let mut seen: HashSet<(usize, usize)> = HashSet::new();
        let mut unsafe_nodes: HashSet<usize> = HashSet::new();

        self.data_pass(calls, &mut edges, &mut seen);
        self.ordering_pass(calls, &mut edges, &mut seen);
        self.conflict_pass(calls, &mut edges, &mut seen, &mut unsafe_nodes);

        let mut dependencies: HashMap<String, HashSet<String>> = HashMap::new();
        for edge in &edges {
            dependencies
                .entry(edge.to.clone())
                .or_default()
                .insert(edge.from.clone());
        }

        let levels = assign_levels(calls, &dependencies)?;
        let nodes = calls
            .iter()
            .enumerate()
            .map(|(i, call)| GraphNode {
                id: call.id.clone(),
                tool_name: call.name.clone(),
                parallel_safe: !unsafe_nodes.contains(&i),
                level: levels[&call.id],
            })
            .collect();

        debug!(
            "dependency analysis: {} calls, {} edges, {} serialized",
            calls.len(),
            edges.len(),
            unsafe_nodes.len()
        );

        Ok(DependencyReport {
            dependencies,
            graph: DependencyGraph { nodes, edges },
        })
    }

    /// Pass 1: argument references to outputs of earlier steps.
    fn data_pass(
        &self,
        calls: &[ToolCall],
        edges: &mut Vec<GraphEdge>,
        seen: &mut HashSet<(usize, usize)>,
    ) {
        for (j, call) in calls.iter().enumerate() {
            // A url that is a placeholder rather than a concrete address
            // must come from an earlier search.
            if let Some(url) = call.arguments["url"].as_str()
                && is_variable_reference(url)
                && let Some(i) = latest_before(calls, j, "web_search")
            {
                push_edge(
                    calls,
                    edges,
                    seen,
                    i,
                    j,
                    EdgeKind::Data,
                    0.9,
                    "url references earlier search output",
                );
            }

            // Follow-up phrasing expands an earlier search.
            if let Some(query) = call.arguments["query"].as_str() {
                let lower = query.to_lowercase();
                if EXPANSION_WORDS.iter().any(|w| lower.contains(w))
                    && let Some(i) = latest_before(calls, j, "web_search")
                {
                    push_edge(
                        calls,
                        edges,
                        seen,
                        i,
                        j,
                        EdgeKind::Data,
                        0.7,
                        "follow-up query expands earlier search",
                    );
                }
            }

            // A read of a path an earlier step wrote consumes its output.
            if is_file_tool(&call.name)
                && let Some(path) = file_path(call)
            {
                for (i, earlier) in calls.iter().enumerate().take(j) {
                    if earlier.name == "write_file"
                        && let Some(other) = file_path(earlier)
                        && paths_overlap(path, other)
                    {
                        push_edge(
                            calls,
                            edges,
                            seen,
                            i,
                            j,
                            EdgeKind::Data,
                            0.9,
                            "reads a path written by an earlier step",
                        );
                    }
                }
            }

            // Hard tool rule: web_fetch consumes web_search results.
            if call.name == "web_fetch"
                && let Some(i) = latest_before(calls, j, "web_search")
            {
                push_edge(
                    calls,
                    edges,
                    seen,
                    i,
                    j,
                    EdgeKind::Data,
                    1.0,
                    "web_fetch consumes web_search results",
                );
            }
        }
    }

    /// Pass 2: batch-order constraints.
    fn ordering_pass(
        &self,
        calls: &[ToolCall],
        edges: &mut Vec<GraphEdge>,
        seen: &mut HashSet<(usize, usize)>,
    ) {
        for (j, call) in calls.iter().enumerate() {
            // File operations on the same path run in batch order.
            if is_file_tool(&call.name)
                && let Some(path) = file_path(call)
            {
                for (i, earlier) in calls.iter().enumerate().take(j) {
                    if is_file_tool(&earlier.name) && file_path(earlier) == Some(path) {
                        push_edge(
                            calls,
                            edges,
                            seen,
                            i,
                            j,
                            EdgeKind::Ordering,
                            1.0,
                            "file operations on the same path run in batch order",
                        );
                    }
                }
            }

            // A fetch of a concrete URL still follows an earlier search.
            if call.name == "web_fetch"
                && call.arguments["url"].as_str().is_some_and(looks_like_url)
                && let Some(i) = latest_before(calls, j, "web_search")
            {
                push_edge(
                    calls,
                    edges,
                    seen,
                    i,
                    j,
                    EdgeKind::Ordering,
                    0.85,
                    "fetch follows search in batch order",
                );
            }
        }
    }

    /// Pass 3: steps that must never overlap. Adds an ordering edge
    /// (lower index first) and marks both nodes non-parallel-safe.
    fn conflict_pass(
        &self,
        calls: &[ToolCall],
        edges: &mut Vec<GraphEdge>,
        seen: &mut HashSet<(usize, usize)>,
        unsafe_nodes: &mut HashSet<usize>,
    ) {
        for j in 0..calls.len() {
            for i in 0..j {
                let conflict = match (calls[i].name.as_str(), calls[j].name.as_str()) {
                    ("write_file", "write_file") => {
                        match (file_path(&calls[i]), file_path(&calls[j])) {
                            (Some(a), Some(b)) if a == b => {
                                Some("concurrent writes to the same path")
                            }
                            _ => None,
                        }
                    }
                    ("exec", "exec") => {
                        if exec_dir(&calls[i]) == exec_dir(&calls[j]) {
                            Some("concurrent exec in the same working directory")
                        } else {
                            None
                        }
                    }
                    _ => None,
                };
                if let Some(description) = conflict {
                    push_edge(calls, edges, seen, i, j, EdgeKind::Conflict, 1.0, description);
                    unsafe_nodes.insert(i);
                    unsafe_nodes.insert(j);
                }
            }
        }
    }
}

impl Default for DependencyAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn push_edge(
    calls: &[ToolCall],
    edges: &mut Vec<GraphEdge>,
    seen: &mut HashSet<(usize, usize)>,
    from: usize,
    to: usize,
    kind: EdgeKind,
    strength: f64,
    description: &str,
) {
    if seen.insert((from, to)) {
        edges.push(GraphEdge {
            from: calls[from].id.clone(),
            to: calls[to].id.clone(),
            kind,
            strength,
            description: description.to_string(),
        });
    }
}

/// Index of the latest call named `tool` strictly before `before`.
fn latest_before(calls: &[ToolCall], before: usize, tool: &str) -> Option<usize> {
    (0..before).rev().find(|&i| calls[i].name == tool)
}

fn is_file_tool(name: &str) -> bool {
    FILE_TOOLS.contains(&name)
}

fn file_path(call: &ToolCall) -> Option<&str> {
    call.arguments["path"].as_str()
}

fn exec_dir(call: &ToolCall) -> &str {
    call.arguments["cwd"]
        .as_str()
        .or_else(|| call.arguments["workdir"].as_str())
        .unwrap_or(".")
}

fn paths_overlap(a: &str, b: &str) -> bool {
    a == b || a.starts_with(b) || b.starts_with(a)
}

/// A url that names a placeholder instead of a concrete address.
fn is_variable_reference(url: &str) -> bool {
    url.contains('$') || url.contains('{') || url.len() < 8 || !url.contains('.')
}

fn looks_like_url(url: &str) -> bool {
    url::Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
        .unwrap_or(false)
}

/// BFS on in-degree (Kahn). Edges always point forward in batch order, so a
/// cycle indicates an analyzer bug; surface it as a planning error rather
/// than resolving heuristically.
fn assign_levels(
    calls: &[ToolCall],
    dependencies: &HashMap<String, HashSet<String>>,
) -> Result<HashMap<String, usize>, ShuntError> {
    let mut in_degree: HashMap<&str, usize> = calls.iter().map(|c| (c.id.as_str(), 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for (to, froms) in dependencies {
        *in_degree.entry(to.as_str()).or_insert(0) = froms.len();
        for from in froms {
            dependents.entry(from.as_str()).or_default().push(to.as_str());
        }
    }

    let mut levels: HashMap<String, usize> = HashMap::new();
    let mut queue: VecDeque<&str> = calls
        .iter()
        .map(|c| c.id.as_str())
        .filter(|id| in_degree[id] == 0)
        .collect();
    for id in &queue {
        levels.insert((*id).to_string(), 0);
    }

    while let Some(id) = queue.pop_front() {
        let level = levels[id];
        for &next in dependents.get(id).map(Vec::as_slice).unwrap_or_default() {
            let entry = levels.entry(next.to_string()).or_insert(0);
            *entry = (*entry).max(level + 1);
            let degree = in_degree.get_mut(next).expect("dependency target missing");
            *degree -= 1;
            if *degree == 0 {
                queue.push_back(next);
            }
        }
    }

    if levels.len() != calls.len() {
        return Err(ShuntError::Planning(
            "dependency cycle detected in tool-call batch".to_string(),
        ));
    }
    Ok(levels)
}
