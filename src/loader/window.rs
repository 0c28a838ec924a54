//! Sequence windows and batches produced by the loader.

use std::ops::Range;

use crate::dataset::{Dataset, Point};

/// `seq_length` consecutive frames of one dataset, restricted to the agents
/// present in every one of those frames.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceWindow {
    /// Index of the dataset the window was drawn from.
    pub dataset: usize,
    /// Offset of the first frame within the dataset's distinct frames.
    pub start: usize,
    /// Frame values covered by the window, in order.
    pub frames: Vec<u32>,
    /// Agents present throughout the window, ascending.
    pub agents: Vec<u32>,
    /// `positions[t][a]` is the position of `agents[a]` at `frames[t]`.
    pub positions: Vec<Vec<Point>>,
}

impl SequenceWindow {
    /// Cut the window covering frame offsets `start..start + len` out of
    /// `data`. The range must lie inside the dataset.
    pub(crate) fn extract(data: &Dataset, dataset: usize, start: usize, len: usize) -> Self {
        let offsets = start..start + len;
        let agents = data.persistent_agents(offsets.clone());
        let frames = data.frame_ids()[offsets.clone()].to_vec();
        let positions = offsets
            .map(|o| {
                agents
                    .iter()
                    .filter_map(|&id| data.position(o, id))
                    .collect()
            })
            .collect();

        Self {
            dataset,
            start,
            frames,
            agents,
            positions,
        }
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn num_agents(&self) -> usize {
        self.agents.len()
    }

    /// The positions of one agent across the window, if it is present.
    pub fn track(&self, agent_id: u32) -> Option<Vec<Point>> {
        let a = self.agents.binary_search(&agent_id).ok()?;
        Some(self.positions.iter().map(|frame| frame[a]).collect())
    }

    /// A sub-window over the frame range `range` (relative to this window).
    pub fn slice(&self, range: Range<usize>) -> Self {
        Self {
            dataset: self.dataset,
            start: self.start + range.start,
            frames: self.frames[range.clone()].to_vec(),
            agents: self.agents.clone(),
            positions: self.positions[range].to_vec(),
        }
    }

    /// Split into the one-step-shifted `(input, target)` pair: all frames but
    /// the last, and all frames but the first.
    pub fn split_shifted(&self) -> (Self, Self) {
        let n = self.len();
        (self.slice(0..n.saturating_sub(1)), self.slice(n.min(1)..n))
    }
}

/// `batch_size` windows split into next-position supervision pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub inputs: Vec<SequenceWindow>,
    pub targets: Vec<SequenceWindow>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub(crate) fn push(&mut self, window: &SequenceWindow) {
        let (input, target) = window.split_shifted();
        self.inputs.push(input);
        self.targets.push(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::CanonicalRecord;

    fn dataset() -> Dataset {
        let mut records = Vec::new();
        for frame in 0..4u32 {
            for agent_id in 1..=2u32 {
                // Agent 2 leaves after frame 2.
                if agent_id == 2 && frame == 3 {
                    continue;
                }
                records.push(CanonicalRecord {
                    frame,
                    agent_id,
                    x: frame as f64 / 10.0,
                    y: agent_id as f64 / 10.0,
                });
            }
        }
        Dataset::from_records("p.csv", records)
    }

    #[test]
    fn test_extract_keeps_persistent_agents() {
        let ds = dataset();
        let w = SequenceWindow::extract(&ds, 0, 0, 3);
        assert_eq!(w.agents, vec![1, 2]);
        assert_eq!(w.frames, vec![0, 1, 2]);

        let w = SequenceWindow::extract(&ds, 0, 1, 3);
        assert_eq!(w.agents, vec![1]);
        assert_eq!(w.positions.iter().map(Vec::len).collect::<Vec<_>>(), vec![1, 1, 1]);
    }

    #[test]
    fn test_split_shifted() {
        let ds = dataset();
        let w = SequenceWindow::extract(&ds, 0, 0, 4);
        let (input, target) = w.split_shifted();
        assert_eq!(input.frames, vec![0, 1, 2]);
        assert_eq!(target.frames, vec![1, 2, 3]);
        assert_eq!(target.start, 1);
        assert_eq!(input.positions[1], target.positions[0]);
    }

    #[test]
    fn test_track() {
        let ds = dataset();
        let w = SequenceWindow::extract(&ds, 0, 0, 3);
        let track = w.track(2).unwrap();
        assert_eq!(track.len(), 3);
        assert_eq!(track[2], Point::new(0.2, 0.2));
        assert!(w.track(5).is_none());
    }
}
