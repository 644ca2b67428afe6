//! In-process HNSW graph.
//!
//! Layered navigable-small-world graph over one namespace's records.
//! Levels are derived deterministically from the record id hash, so a given
//! insertion order always produces the same graph and search results are
//! reproducible in tests. Deletes are tombstones: the slot stays in the
//! arrays (neighbor indices remain valid) but is unlinked and excluded from
//! results.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use super::model::{DistanceMetric, IndexedRecord};

/// Graph construction and search-breadth parameters.
///
/// - `m`: max neighbors per node per layer. Higher improves recall at the
///   cost of memory and build time.
/// - `ef_construction`: candidate-list breadth while inserting. Higher
///   builds a better graph, slower.
/// - `ef_runtime`: candidate-list breadth while querying. Higher improves
///   recall at the cost of query latency; adjustable per namespace at any
///   time without rebuilding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HnswParams {
    pub m: usize,
    pub ef_construction: usize,
    pub ef_runtime: usize,
}

pub const DEFAULT_M: usize = 16;
pub const DEFAULT_EF_CONSTRUCTION: usize = 200;
pub const DEFAULT_EF_RUNTIME: usize = 10;

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: DEFAULT_M,
            ef_construction: DEFAULT_EF_CONSTRUCTION,
            ef_runtime: DEFAULT_EF_RUNTIME,
        }
    }
}

const MAX_LEVEL: usize = 16;

struct Slot {
    /// `None` marks a tombstone.
    record: Option<IndexedRecord>,
    level: usize,
    /// Neighbor slot indices, one list per layer `0..=level`.
    neighbors: Vec<Vec<usize>>,
}

/// Distance-ordered heap entry. Total order via `f32::total_cmp` with the
/// slot index as the final tie-break so heap behavior is deterministic.
#[derive(PartialEq)]
struct Candidate {
    distance: f32,
    slot: usize,
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.slot.cmp(&other.slot))
    }
}

pub(crate) struct HnswGraph {
    metric: DistanceMetric,
    m: usize,
    ef_construction: usize,
    level_mult: f64,
    slots: Vec<Slot>,
    by_id: HashMap<String, usize>,
    entry_point: Option<usize>,
    max_level: usize,
}

impl HnswGraph {
    pub fn new(metric: DistanceMetric, params: HnswParams) -> Self {
        Self {
            metric,
            m: params.m.max(2),
            ef_construction: params.ef_construction.max(1),
            level_mult: 1.0 / (params.m.max(2) as f64).ln(),
            slots: Vec::new(),
            by_id: HashMap::new(),
            entry_point: None,
            max_level: 0,
        }
    }

    /// Number of live (non-tombstoned) records.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn tombstones(&self) -> usize {
        self.slots.len() - self.by_id.len()
    }

    pub fn max_level(&self) -> usize {
        self.max_level
    }

    pub fn get(&self, id: &str) -> Option<&IndexedRecord> {
        self.by_id
            .get(id)
            .and_then(|&slot| self.slots[slot].record.as_ref())
    }

    /// Iterates over live records.
    pub fn records(&self) -> impl Iterator<Item = &IndexedRecord> {
        self.slots.iter().filter_map(|slot| slot.record.as_ref())
    }

    /// Deterministic level assignment: an exponentially distributed level
    /// derived from the BLAKE3 hash of the id.
    fn level_for(&self, id: &str) -> usize {
        let digest = blake3::hash(id.as_bytes());
        let bits = u64::from_le_bytes(
            digest.as_bytes()[0..8]
                .try_into()
                .expect("BLAKE3 digests are 32 bytes"),
        );
        // Map to (0, 1]; never exactly zero so ln() is finite.
        let uniform = (bits as f64 + 1.0) / (u64::MAX as f64 + 1.0);
        (((-uniform.ln()) * self.level_mult) as usize).min(MAX_LEVEL)
    }

    fn distance_to(&self, query: &[f32], slot: usize) -> f32 {
        match self.slots[slot].record.as_ref() {
            Some(record) => self.metric.distance(query, &record.vector),
            // Tombstone: unreachable via links, but rank last if visited.
            None => f32::MAX,
        }
    }

    /// Inserts a record, overwriting any live record with the same id.
    pub fn insert(&mut self, record: IndexedRecord) {
        if self.by_id.contains_key(&record.id) {
            self.remove(&record.id);
        }

        let idx = self.slots.len();
        let level = self.level_for(&record.id);
        let vector = record.vector.clone();

        self.by_id.insert(record.id.clone(), idx);
        self.slots.push(Slot {
            record: Some(record),
            level,
            neighbors: vec![Vec::new(); level + 1],
        });

        let Some(entry) = self.entry_point else {
            self.entry_point = Some(idx);
            self.max_level = level;
            return;
        };

        // Greedy descent through layers above the insertion level.
        let mut current = entry;
        for layer in ((level + 1)..=self.max_level).rev() {
            current = self.greedy_closest(current, &vector, layer);
        }

        // Link into each layer from the insertion level down.
        for layer in (0..=level.min(self.max_level)).rev() {
            let found = self.search_layer(current, &vector, self.ef_construction, layer);

            let selected: Vec<usize> = found.iter().take(self.m).map(|c| c.slot).collect();
            self.slots[idx].neighbors[layer] = selected.clone();

            for neighbor in selected {
                if layer < self.slots[neighbor].neighbors.len() {
                    self.slots[neighbor].neighbors[layer].push(idx);
                    if self.slots[neighbor].neighbors[layer].len() > self.m * 2 {
                        self.prune(neighbor, layer);
                    }
                }
            }

            if let Some(closest) = found.first() {
                current = closest.slot;
            }
        }

        if level > self.max_level {
            self.max_level = level;
            self.entry_point = Some(idx);
        }
    }

    /// Tombstones a record and unlinks it from the graph. Returns whether a
    /// live record existed.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(idx) = self.by_id.remove(id) else {
            return false;
        };

        // Unlink everywhere: neighbor lists are not symmetric, so a scan of
        // all slots is required to drop back-links as well.
        for slot in 0..self.slots.len() {
            if slot != idx {
                for list in &mut self.slots[slot].neighbors {
                    list.retain(|&s| s != idx);
                }
            }
        }

        let level = self.slots[idx].level;
        self.slots[idx].record = None;
        self.slots[idx].neighbors = vec![Vec::new(); level + 1];

        if self.entry_point == Some(idx) {
            self.entry_point = self.highest_live_slot();
            self.max_level = self
                .entry_point
                .map(|slot| self.slots[slot].level)
                .unwrap_or(0);
        }

        true
    }

    fn highest_live_slot(&self) -> Option<usize> {
        self.by_id
            .values()
            .copied()
            .max_by_key(|&slot| (self.slots[slot].level, slot))
    }

    /// Approximate nearest neighbors of `query` with candidate-list breadth
    /// `ef`, closest first. Returns `(record, distance)` pairs.
    pub fn search(&self, query: &[f32], ef: usize) -> Vec<(&IndexedRecord, f32)> {
        let Some(entry) = self.entry_point else {
            return Vec::new();
        };

        let mut current = entry;
        for layer in (1..=self.max_level).rev() {
            current = self.greedy_closest(current, query, layer);
        }

        self.search_layer(current, query, ef.max(1), 0)
            .into_iter()
            .filter_map(|c| {
                self.slots[c.slot]
                    .record
                    .as_ref()
                    .map(|record| (record, c.distance))
            })
            .collect()
    }

    fn greedy_closest(&self, mut current: usize, query: &[f32], layer: usize) -> usize {
        let mut best = self.distance_to(query, current);
        loop {
            let mut improved = false;
            if layer < self.slots[current].neighbors.len() {
                for &neighbor in &self.slots[current].neighbors[layer] {
                    let d = self.distance_to(query, neighbor);
                    if d < best {
                        best = d;
                        current = neighbor;
                        improved = true;
                    }
                }
            }
            if !improved {
                return current;
            }
        }
    }

    /// Best-first search within one layer. Returns up to `ef` candidates
    /// sorted closest-first.
    fn search_layer(&self, entry: usize, query: &[f32], ef: usize, layer: usize) -> Vec<Candidate> {
        let mut visited = vec![false; self.slots.len()];
        visited[entry] = true;

        let entry_distance = self.distance_to(query, entry);

        // Min-heap of candidates to expand; max-heap of the best `ef` found.
        let mut frontier: BinaryHeap<Reverse<Candidate>> = BinaryHeap::new();
        let mut found: BinaryHeap<Candidate> = BinaryHeap::new();

        frontier.push(Reverse(Candidate {
            distance: entry_distance,
            slot: entry,
        }));
        found.push(Candidate {
            distance: entry_distance,
            slot: entry,
        });

        while let Some(Reverse(candidate)) = frontier.pop() {
            let worst = found
                .peek()
                .map(|c| c.distance)
                .unwrap_or(f32::MAX);
            if candidate.distance > worst && found.len() >= ef {
                break;
            }

            if layer < self.slots[candidate.slot].neighbors.len() {
                for &neighbor in &self.slots[candidate.slot].neighbors[layer] {
                    if visited[neighbor] {
                        continue;
                    }
                    visited[neighbor] = true;

                    let d = self.distance_to(query, neighbor);
                    let worst = found
                        .peek()
                        .map(|c| c.distance)
                        .unwrap_or(f32::MAX);

                    if found.len() < ef || d < worst {
                        frontier.push(Reverse(Candidate {
                            distance: d,
                            slot: neighbor,
                        }));
                        found.push(Candidate {
                            distance: d,
                            slot: neighbor,
                        });
                        if found.len() > ef {
                            found.pop();
                        }
                    }
                }
            }
        }

        let mut result = found.into_vec();
        result.sort();
        result
    }

    /// Trims a neighbor list back to the `m` closest.
    fn prune(&mut self, slot: usize, layer: usize) {
        let Some(vector) = self.slots[slot].record.as_ref().map(|r| r.vector.clone()) else {
            return;
        };

        let mut scored: Vec<Candidate> = self.slots[slot].neighbors[layer]
            .iter()
            .map(|&neighbor| Candidate {
                distance: self.distance_to(&vector, neighbor),
                slot: neighbor,
            })
            .collect();
        scored.sort();
        scored.truncate(self.m);

        self.slots[slot].neighbors[layer] = scored.into_iter().map(|c| c.slot).collect();
    }
}
