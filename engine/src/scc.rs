//! Strongly-connected-component decomposition with pruning.
//!
//! Tarjan's algorithm, implemented iteratively (an explicit work-stack
//! standing in for the call stack) so a long chain of wallets can never
//! blow the native stack the way a recursive `strongconnect` could on a
//! very deep graph.

use crate::graph::{VertexId, WantsGraph};
use crate::time::Deadline;
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SccMetadata {
    pub processed: usize,
    pub timed_out: bool,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone)]
pub struct SccResult {
    pub sccs: Vec<Vec<VertexId>>,
    pub metadata: SccMetadata,
}

/// Prunes vertices that cannot lie on any cycle: no outgoing edge, or no
/// incoming edge. One pass suffices in practice because the graph builder
/// never creates self-loops, so there is no degenerate single-vertex case
/// to iterate away.
pub fn prune_non_cyclic(graph: &WantsGraph) -> BTreeSet<VertexId> {
    graph
        .vertices()
        .filter(|&v| graph.out_degree(v) > 0 && graph.in_degree(v) > 0)
        .collect()
}

/// Tarjan's SCC over the subgraph induced by `keep` (after pruning),
/// batching seed-node visitation and checking `deadline` between batches.
/// On timeout, returns whatever SCCs were fully closed so far with
/// `timed_out = true`. Never panics, never drops a closed SCC.
pub fn find_sccs(graph: &WantsGraph, keep: &BTreeSet<VertexId>, deadline: &Deadline, batch_size: usize) -> SccResult {
    let start = std::time::Instant::now();
    let n = graph.vertex_count();
    let mut state = TarjanState::new(n);
    let mut processed = 0usize;
    let mut timed_out = false;

    let seeds: Vec<VertexId> = keep.iter().copied().collect();
    'batches: for batch in seeds.chunks(batch_size.max(1)) {
        if deadline.is_expired() {
            timed_out = true;
            break 'batches;
        }
        for &v in batch {
            if state.index_of[v.0 as usize].is_none() {
                strongconnect_iterative(graph, keep, v, &mut state);
                processed += 1;
            }
        }
    }

    debug!(
        vertices = n,
        sccs_found = state.sccs.len(),
        timed_out,
        "scc phase complete"
    );

    SccResult {
        sccs: state.sccs,
        metadata: SccMetadata {
            processed,
            timed_out,
            elapsed_ms: start.elapsed().as_millis() as u64,
        },
    }
}

/// Discards SCCs that cannot contain an elementary cycle: the graph never
/// has self-loops, so only size ≥ 2 components qualify.
pub fn filter_cyclic_sccs(sccs: Vec<Vec<VertexId>>) -> Vec<Vec<VertexId>> {
    sccs.into_iter().filter(|scc| scc.len() >= 2).collect()
}

struct TarjanState {
    index_counter: u32,
    index_of: Vec<Option<u32>>,
    lowlink: Vec<u32>,
    on_stack: Vec<bool>,
    stack: Vec<VertexId>,
    sccs: Vec<Vec<VertexId>>,
}

impl TarjanState {
    fn new(n: usize) -> Self {
        Self {
            index_counter: 0,
            index_of: vec![None; n],
            lowlink: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
            sccs: Vec::new(),
        }
    }
}

/// One frame of the explicit work-stack: the vertex being visited and how
/// far through its (sorted) neighbor list we've iterated.
struct Frame {
    vertex: VertexId,
    neighbors: Vec<VertexId>,
    next_neighbor: usize,
}

fn strongconnect_iterative(graph: &WantsGraph, keep: &BTreeSet<VertexId>, root: VertexId, state: &mut TarjanState) {
    let mut work: Vec<Frame> = vec![open_frame(graph, keep, root, state)];

    while let Some(frame) = work.last_mut() {
        let v = frame.vertex;
        if frame.next_neighbor < frame.neighbors.len() {
            let w = frame.neighbors[frame.next_neighbor];
            frame.next_neighbor += 1;
            match state.index_of[w.0 as usize] {
                None => {
                    work.push(open_frame(graph, keep, w, state));
                }
                Some(w_index) => {
                    if state.on_stack[w.0 as usize] {
                        state.lowlink[v.0 as usize] = state.lowlink[v.0 as usize].min(w_index);
                    }
                }
            }
            continue;
        }

        // All neighbors visited: close this frame, propagate lowlink, pop.
        let v_index = state.index_of[v.0 as usize].unwrap();
        if state.lowlink[v.0 as usize] == v_index {
            let mut scc = Vec::new();
            while let Some(w) = state.stack.pop() {
                state.on_stack[w.0 as usize] = false;
                scc.push(w);
                if w == v {
                    break;
                }
            }
            scc.sort_unstable();
            state.sccs.push(scc);
        }
        work.pop();
        if let Some(parent) = work.last() {
            let parent_v = parent.vertex.0 as usize;
            state.lowlink[parent_v] = state.lowlink[parent_v].min(state.lowlink[v.0 as usize]);
        }
    }
}

fn open_frame(graph: &WantsGraph, keep: &BTreeSet<VertexId>, v: VertexId, state: &mut TarjanState) -> Frame {
    state.index_of[v.0 as usize] = Some(state.index_counter);
    state.lowlink[v.0 as usize] = state.index_counter;
    state.index_counter += 1;
    state.stack.push(v);
    state.on_stack[v.0 as usize] = true;
    let neighbors: Vec<VertexId> = graph.out_neighbors(v).filter(|n| keep.contains(n)).collect();
    Frame {
        vertex: v,
        neighbors,
        next_neighbor: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_graph;
    use crate::model::{Item, Snapshot, Wallet};

    fn three_cycle() -> WantsGraph {
        let mut snap = Snapshot::new();
        let mut a = Wallet::new("A");
        a.wanted_items.insert("c".into());
        let mut b = Wallet::new("B");
        b.wanted_items.insert("a".into());
        let mut c = Wallet::new("C");
        c.wanted_items.insert("b".into());
        snap.insert_wallet(a);
        snap.insert_wallet(b);
        snap.insert_wallet(c);
        snap.insert_item(Item::new("a", "A"));
        snap.insert_item(Item::new("b", "B"));
        snap.insert_item(Item::new("c", "C"));
        build_graph(&snap)
    }

    #[test]
    fn finds_single_scc_for_three_cycle() {
        let graph = three_cycle();
        let keep = prune_non_cyclic(&graph);
        assert_eq!(keep.len(), 3);
        let result = find_sccs(&graph, &keep, &Deadline::from_millis(5_000), 1_000);
        let cyclic = filter_cyclic_sccs(result.sccs);
        assert_eq!(cyclic.len(), 1);
        assert_eq!(cyclic[0].len(), 3);
    }

    #[test]
    fn isolated_node_has_no_scc() {
        let mut snap = Snapshot::new();
        snap.insert_wallet(Wallet::new("LONELY"));
        let graph = build_graph(&snap);
        let keep = prune_non_cyclic(&graph);
        assert!(keep.is_empty());
    }

    #[test]
    fn deadline_already_expired_yields_timed_out_with_no_work_done() {
        let graph = three_cycle();
        let keep = prune_non_cyclic(&graph);
        let expired = Deadline::from_millis(0);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let result = find_sccs(&graph, &keep, &expired, 1_000);
        assert!(result.metadata.timed_out);
    }
}
