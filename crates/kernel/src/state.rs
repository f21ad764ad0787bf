use physim_common::{BodyId, Vector2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kinematic state of one body at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BodyState {
    pub position: Vector2,
    pub velocity: Vector2,
    /// Instantaneous acceleration at this position and velocity, kept for
    /// arrow overlays.
    pub acceleration: Vector2,
}

/// Immutable snapshot of every body at one simulated time.
///
/// Produced by the stepper, one per step. Snapshots never reference each
/// other, so callers may keep or drop any of them freely.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimulationState {
    time: f64,
    tick: u64,
    bodies: BTreeMap<BodyId, BodyState>,
}

impl SimulationState {
    pub(crate) fn new(time: f64, tick: u64, bodies: BTreeMap<BodyId, BodyState>) -> Self {
        Self { time, tick, bodies }
    }

    /// Simulated seconds since the initial state.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Number of steps taken since the initial state.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Per-body states (BTreeMap for deterministic iteration).
    pub fn bodies(&self) -> &BTreeMap<BodyId, BodyState> {
        &self.bodies
    }

    pub fn body(&self, id: &str) -> Option<&BodyState> {
        self.bodies.get(id)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Deterministic FNV-1a hash over canonical (id-ordered) state.
    pub fn state_hash(&self) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        let mix = |h: &mut u64, bytes: &[u8]| {
            for &b in bytes {
                *h ^= b as u64;
                *h = h.wrapping_mul(0x0100_0000_01b3);
            }
        };
        mix(&mut h, &self.tick.to_le_bytes());
        mix(&mut h, &self.time.to_bits().to_le_bytes());
        for (id, body) in &self.bodies {
            mix(&mut h, id.as_str().as_bytes());
            mix(&mut h, &[0]);
            for v in [body.position, body.velocity, body.acceleration] {
                mix(&mut h, &v.x.to_bits().to_le_bytes());
                mix(&mut h, &v.y.to_bits().to_le_bytes());
            }
        }
        h
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(x: f64) -> SimulationState {
        let mut bodies = BTreeMap::new();
        bodies.insert(
            BodyId::from("b"),
            BodyState {
                position: Vector2::new(x, 0.0),
                ..BodyState::default()
            },
        );
        bodies.insert(BodyId::from("a"), BodyState::default());
        SimulationState::new(0.5, 3, bodies)
    }

    #[test]
    fn bodies_iterate_in_id_order() {
        let s = state(1.0);
        let ids: Vec<_> = s.bodies().keys().map(BodyId::as_str).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(s.len(), 2);
        assert_eq!(s.tick(), 3);
        assert_eq!(s.body("b").map(|b| b.position.x), Some(1.0));
    }

    #[test]
    fn state_hash_tracks_content() {
        assert_eq!(state(1.0).state_hash(), state(1.0).state_hash());
        assert_ne!(state(1.0).state_hash(), state(1.5).state_hash());
        assert_ne!(state(0.0).state_hash(), state(-0.0).state_hash());
    }
}
