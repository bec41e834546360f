use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// 2024-01-01T00:00:00Z in unix milliseconds.
const EPOCH_MS: i64 = 1_704_067_200_000;

const NODE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const MAX_NODE: u16 = (1 << NODE_BITS) - 1;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

/// Source of feed-entry identifiers.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> i64;
}

/// Snowflake-style ids: 41 bits of milliseconds since 2024, 10 bits of node,
/// 12 bits of per-millisecond sequence. Ids from one generator are strictly
/// increasing; ids from different nodes never collide.
pub struct SnowflakeGenerator {
    node: u64,
    /// `millis << SEQUENCE_BITS | sequence` of the last issued id.
    state: AtomicU64,
}

impl SnowflakeGenerator {
    pub fn new(node: u16) -> Self {
        Self {
            node: u64::from(node.min(MAX_NODE)),
            state: AtomicU64::new(0),
        }
    }

    fn now_ms() -> u64 {
        (Utc::now().timestamp_millis() - EPOCH_MS).max(0) as u64
    }
}

impl Default for SnowflakeGenerator {
    fn default() -> Self {
        Self::new(0)
    }
}

impl IdGenerator for SnowflakeGenerator {
    fn next_id(&self) -> i64 {
        loop {
            let now = Self::now_ms();
            let prev = self.state.load(Ordering::Acquire);
            let prev_ms = prev >> SEQUENCE_BITS;
            let prev_seq = prev & SEQUENCE_MASK;

            // Sequence exhausted or clock stepped back: borrow the next millisecond.
            let (ms, seq) = if now > prev_ms {
                (now, 0)
            } else if prev_seq < SEQUENCE_MASK {
                (prev_ms, prev_seq + 1)
            } else {
                (prev_ms + 1, 0)
            };

            let next = (ms << SEQUENCE_BITS) | seq;
            if self
                .state
                .compare_exchange(prev, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let id = (ms << (NODE_BITS + SEQUENCE_BITS)) | (self.node << SEQUENCE_BITS) | seq;
                return id as i64;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn ids_are_strictly_increasing() {
        let generator = SnowflakeGenerator::new(1);
        let mut last = 0;
        for _ in 0..10_000 {
            let id = generator.next_id();
            assert!(id > last);
            last = id;
        }
    }

    #[test]
    fn ids_are_unique_across_threads() {
        let generator = Arc::new(SnowflakeGenerator::new(3));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let generator = Arc::clone(&generator);
                std::thread::spawn(move || (0..2_000).map(|_| generator.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 8_000);
    }

    #[test]
    fn different_nodes_do_not_collide() {
        let a = SnowflakeGenerator::new(1).next_id();
        let b = SnowflakeGenerator::new(2).next_id();
        assert_ne!(a, b);
    }

    #[test]
    fn node_is_encoded_and_clamped() {
        let id = SnowflakeGenerator::new(7).next_id() as u64;
        assert_eq!((id >> SEQUENCE_BITS) & u64::from(MAX_NODE), 7);

        let id = SnowflakeGenerator::new(u16::MAX).next_id() as u64;
        assert_eq!((id >> SEQUENCE_BITS) & u64::from(MAX_NODE), u64::from(MAX_NODE));
    }
}
