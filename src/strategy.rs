//! Selection strategy for which free entry a check-out draws.

use serde::{Deserialize, Serialize};

/// Determines which end of the free list (or which random slot) a
/// non-blocking check-out draws a resource from.
///
/// The strategy is fixed once the pool has handed out its first resource —
/// see [`crate::pool::Pool::set_strategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionStrategy {
    /// Draw from the tail of the free list (most recently returned first).
    Lifo,
    /// Draw from the head of the free list (oldest returned first).
    Fifo,
    /// Draw from a uniformly random index in the free list.
    Random,
}

impl Default for SelectionStrategy {
    fn default() -> Self {
        SelectionStrategy::Lifo
    }
}

impl SelectionStrategy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "LIFO" => Some(SelectionStrategy::Lifo),
            "FIFO" => Some(SelectionStrategy::Fifo),
            "RANDOM" => Some(SelectionStrategy::Random),
            _ => None,
        }
    }
}
