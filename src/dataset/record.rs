//! Canonical trajectory records and the per-dataset frame index.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// Points and records
// ---------------------------------------------------------------------------

/// A 2D position. Serialized as a two-element `[x, y]` array.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

/// One normalized observation: agent `agent_id` at `(x, y)` in `frame`.
///
/// `agent_id` starts at 1 and is dense within its source file; `x` and `y`
/// lie in `[0, 1]` with each axis's file-wide maximum at exactly 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanonicalRecord {
    pub frame: u32,
    pub agent_id: u32,
    pub x: f64,
    pub y: f64,
}

impl CanonicalRecord {
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// An agent's position within one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentPosition {
    pub agent_id: u32,
    pub point: Point,
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// All canonical records read from one source, indexed by frame.
///
/// Frames are addressed by their *offset* in the sorted list of distinct
/// frame values, so a dataset whose frames are `{3, 4, 9}` has offsets
/// `0, 1, 2`. Sequence windows are runs of consecutive offsets.
#[derive(Debug, Clone)]
pub struct Dataset {
    path: PathBuf,
    records: Vec<CanonicalRecord>,
    frame_ids: Vec<u32>,
    /// Positions per frame offset, sorted by agent id.
    frames: Vec<Vec<AgentPosition>>,
    /// Records shadowed by a later record for the same agent and frame.
    duplicates: usize,
}

impl Dataset {
    /// Build the frame index over `records`.
    ///
    /// If an agent appears twice in the same frame the later record wins and
    /// a warning names the frame and agent.
    pub fn from_records(path: impl Into<PathBuf>, records: Vec<CanonicalRecord>) -> Self {
        let path = path.into();
        let mut by_frame: BTreeMap<u32, BTreeMap<u32, Point>> = BTreeMap::new();
        let mut duplicates = 0;
        for r in &records {
            let replaced = by_frame
                .entry(r.frame)
                .or_default()
                .insert(r.agent_id, r.point());
            if replaced.is_some() {
                duplicates += 1;
                warn!(
                    path = %path.display(),
                    frame = r.frame,
                    agent_id = r.agent_id,
                    "Duplicate agent in frame, keeping the later record"
                );
            }
        }

        let frame_ids = by_frame.keys().copied().collect();
        let frames = by_frame
            .into_values()
            .map(|agents| {
                agents
                    .into_iter()
                    .map(|(agent_id, point)| AgentPosition { agent_id, point })
                    .collect()
            })
            .collect();

        Self {
            path,
            records,
            frame_ids,
            frames,
            duplicates,
        }
    }

    /// The canonical file this dataset was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    /// Records dropped because the same agent appeared again in that frame.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Number of distinct frames.
    pub fn num_frames(&self) -> usize {
        self.frame_ids.len()
    }

    /// Distinct frame values in ascending order.
    pub fn frame_ids(&self) -> &[u32] {
        &self.frame_ids
    }

    /// Agents active at the frame with the given offset, sorted by id.
    pub fn agents_at(&self, offset: usize) -> &[AgentPosition] {
        self.frames.get(offset).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Distinct agent ids across the whole dataset.
    pub fn agent_ids(&self) -> BTreeSet<u32> {
        self.records.iter().map(|r| r.agent_id).collect()
    }

    /// Agents present in every frame of `offsets`.
    pub fn persistent_agents(&self, offsets: std::ops::Range<usize>) -> Vec<u32> {
        let mut frames = offsets.map(|o| self.agents_at(o));
        let Some(first) = frames.next() else {
            return Vec::new();
        };
        let mut present: BTreeSet<u32> = first.iter().map(|a| a.agent_id).collect();
        for frame in frames {
            let here: BTreeSet<u32> = frame.iter().map(|a| a.agent_id).collect();
            present.retain(|id| here.contains(id));
            if present.is_empty() {
                break;
            }
        }
        present.into_iter().collect()
    }

    /// Position of `agent_id` at frame offset `offset`, if present.
    pub fn position(&self, offset: usize, agent_id: u32) -> Option<Point> {
        let agents = self.agents_at(offset);
        agents
            .binary_search_by_key(&agent_id, |a| a.agent_id)
            .ok()
            .map(|i| agents[i].point)
    }
}
