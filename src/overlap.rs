//! OverlapKeeper: begin/end-contact membership across frames (§3 "OverlapKeeper",
//! §4.8 step 4, §8 invariant 6).

use std::collections::HashSet;

use crate::body::{BodyId, ShapeId};

/// Unordered pair of shape ids, keyed canonically so `(a, b)` and `(b, a)` hash the same.
pub type ShapePair = (BodyId, ShapeId, BodyId, ShapeId);
/// Unordered pair of body ids.
pub type BodyPair = (BodyId, BodyId);

fn canon_shape_pair(a: (BodyId, ShapeId), b: (BodyId, ShapeId)) -> ShapePair {
    use slotmap::Key;
    if a.1.data().as_ffi() <= b.1.data().as_ffi() {
        (a.0, a.1, b.0, b.1)
    } else {
        (b.0, b.1, a.0, a.1)
    }
}

fn canon_body_pair(a: BodyId, b: BodyId) -> BodyPair {
    use slotmap::Key;
    if a.data().as_ffi() <= b.data().as_ffi() {
        (a, b)
    } else {
        (b, a)
    }
}

/// Tracks which shape pairs and body pairs were overlapping last frame versus this
/// frame, to drive `begin_contact`/`end_contact` events and `first_impact` (§3, §9).
#[derive(Debug, Default)]
pub struct OverlapKeeper {
    previous_shape_overlaps: HashSet<ShapePair>,
    current_shape_overlaps: HashSet<ShapePair>,
    previous_body_overlaps: HashSet<BodyPair>,
    current_body_overlaps: HashSet<BodyPair>,
}

impl OverlapKeeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that this frame, shape `a` on body `body_a` overlaps shape `b` on `body_b`.
    pub fn set_overlapping(&mut self, body_a: BodyId, shape_a: ShapeId, body_b: BodyId, shape_b: ShapeId) {
        self.current_shape_overlaps
            .insert(canon_shape_pair((body_a, shape_a), (body_b, shape_b)));
        self.current_body_overlaps
            .insert(canon_body_pair(body_a, body_b));
    }

    /// Shape pairs overlapping this frame but not last (drives `begin_contact`).
    pub fn new_overlaps(&self) -> Vec<ShapePair> {
        self.current_shape_overlaps
            .difference(&self.previous_shape_overlaps)
            .copied()
            .collect()
    }

    /// Shape pairs overlapping last frame but not this one (drives `end_contact`).
    pub fn ended_overlaps(&self) -> Vec<ShapePair> {
        self.previous_shape_overlaps
            .difference(&self.current_shape_overlaps)
            .copied()
            .collect()
    }

    /// Whether this body pair was overlapping at the *previous* step — the sole
    /// driver of `first_impact` (§9 "Determinism caveats": body-pair membership only).
    pub fn was_body_pair_overlapping(&self, a: BodyId, b: BodyId) -> bool {
        self.previous_body_overlaps.contains(&canon_body_pair(a, b))
    }

    pub fn is_shape_pair_overlapping(&self, body_a: BodyId, shape_a: ShapeId, body_b: BodyId, shape_b: ShapeId) -> bool {
        self.current_shape_overlaps
            .contains(&canon_shape_pair((body_a, shape_a), (body_b, shape_b)))
    }

    /// Roll `current` into `previous` and clear `current`, ready for the next step.
    pub fn commit(&mut self) {
        self.previous_shape_overlaps = std::mem::take(&mut self.current_shape_overlaps);
        self.previous_body_overlaps = std::mem::take(&mut self.current_body_overlaps);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn body(n: u64) -> BodyId {
        BodyId::from(KeyData::from_ffi(n))
    }
    fn shape(n: u64) -> ShapeId {
        ShapeId::from(KeyData::from_ffi(n))
    }

    #[test]
    fn begin_contact_fires_exactly_once_for_sustained_overlap() {
        let mut keeper = OverlapKeeper::new();

        keeper.set_overlapping(body(1), shape(1), body(2), shape(2));
        assert_eq!(keeper.new_overlaps().len(), 1);
        keeper.commit();

        keeper.set_overlapping(body(1), shape(1), body(2), shape(2));
        assert_eq!(keeper.new_overlaps().len(), 0, "no repeat begin_contact on sustained overlap");
        keeper.commit();
    }

    #[test]
    fn end_contact_fires_when_overlap_stops() {
        let mut keeper = OverlapKeeper::new();
        keeper.set_overlapping(body(1), shape(1), body(2), shape(2));
        keeper.commit();

        // Nothing set this frame: the pair ended.
        assert_eq!(keeper.ended_overlaps().len(), 1);
    }

    #[test]
    fn first_impact_uses_body_pair_not_shape_pair() {
        let mut keeper = OverlapKeeper::new();
        keeper.set_overlapping(body(1), shape(1), body(2), shape(2));
        keeper.commit();

        // A *different* shape pair on the same bodies should not count as a first impact.
        assert!(keeper.was_body_pair_overlapping(body(1), body(2)));
    }
}
