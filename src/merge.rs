//! Cluster merging.
//!
//! One moving object often leaves more than one region in the mask (its
//! leading and trailing edges, or a split silhouette). The merger collapses
//! spots closer than the merge radius into their midpoint.
//!
//! The merge is a single greedy pass over the input order: spot `i` absorbs
//! every later spot `j` within the radius, moving to the midpoint each time.
//! Absorbed spots are tombstoned and never revisited. The result therefore
//! depends on the input order and is not a fixed point: two survivors may
//! still lie within the radius of each other.

use crate::detect::Spot;

#[derive(Clone, Copy, Debug)]
pub struct ClusterMerger {
    radius: f64,
}

impl ClusterMerger {
    pub fn new(radius: f64) -> Self {
        Self { radius }
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Merge spots within `radius` of each other. Order of survivors follows
    /// the input order.
    pub fn merge(&self, spots: Vec<Spot>) -> Vec<Spot> {
        let mut slots: Vec<Option<Spot>> = spots.into_iter().map(Some).collect();
        for i in 0..slots.len() {
            for j in (i + 1)..slots.len() {
                let (Some(a), Some(b)) = (slots[i], slots[j]) else {
                    continue;
                };
                if a.distance(&b) < self.radius {
                    slots[i] = Some(a.midpoint(&b));
                    slots[j] = None;
                }
            }
        }
        let merged: Vec<Spot> = slots.into_iter().flatten().collect();
        log::trace!("merge: {} spots after merging (radius {})", merged.len(), self.radius);
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_pair_collapses_to_midpoint() {
        let merger = ClusterMerger::new(20.0);
        let merged = merger.merge(vec![Spot::new(10.0, 10.0), Spot::new(20.0, 10.0)]);
        assert_eq!(merged, vec![Spot::new(15.0, 10.0)]);
    }

    #[test]
    fn pair_at_radius_stays_separate() {
        let merger = ClusterMerger::new(20.0);
        let spots = vec![Spot::new(0.0, 0.0), Spot::new(20.0, 0.0)];
        assert_eq!(merger.merge(spots.clone()), spots);
    }

    #[test]
    fn empty_and_single_inputs_pass_through() {
        let merger = ClusterMerger::new(20.0);
        assert!(merger.merge(Vec::new()).is_empty());
        assert_eq!(merger.merge(vec![Spot::new(3.0, 4.0)]), vec![Spot::new(3.0, 4.0)]);
    }

    #[test]
    fn absorbing_spot_moves_before_next_comparison() {
        // (0,0) absorbs (15,0) and moves to (7.5,0); (30,0) is then 22.5 away.
        let merger = ClusterMerger::new(20.0);
        let merged = merger.merge(vec![
            Spot::new(0.0, 0.0),
            Spot::new(15.0, 0.0),
            Spot::new(30.0, 0.0),
        ]);
        assert_eq!(merged, vec![Spot::new(7.5, 0.0), Spot::new(30.0, 0.0)]);
    }

    #[test]
    fn result_depends_on_input_order() {
        let merger = ClusterMerger::new(20.0);
        let forward = merger.merge(vec![
            Spot::new(0.0, 0.0),
            Spot::new(15.0, 0.0),
            Spot::new(30.0, 0.0),
        ]);
        let middle_first = merger.merge(vec![
            Spot::new(15.0, 0.0),
            Spot::new(0.0, 0.0),
            Spot::new(30.0, 0.0),
        ]);
        // Middle first: (15,0) absorbs (0,0) -> (7.5,0), which is 22.5 from (30,0).
        assert_eq!(middle_first, vec![Spot::new(7.5, 0.0), Spot::new(30.0, 0.0)]);

        let reversed = merger.merge(vec![
            Spot::new(30.0, 0.0),
            Spot::new(15.0, 0.0),
            Spot::new(0.0, 0.0),
        ]);
        assert_eq!(reversed, vec![Spot::new(22.5, 0.0), Spot::new(0.0, 0.0)]);
        assert_ne!(forward, reversed);
    }

    #[test]
    fn survivors_can_remain_within_radius() {
        // (25,0) is compared before (0,0) moves to (9.5,0), so both survive 15.5 apart.
        let merger = ClusterMerger::new(20.0);
        let merged = merger.merge(vec![
            Spot::new(0.0, 0.0),
            Spot::new(25.0, 0.0),
            Spot::new(19.0, 0.0),
        ]);
        assert_eq!(merged, vec![Spot::new(9.5, 0.0), Spot::new(25.0, 0.0)]);
        assert!(merged[0].distance(&merged[1]) < merger.radius());
    }
}
