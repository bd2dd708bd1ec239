use serde::{Deserialize, Serialize};

/// What a driver did with its car during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Accelerate,
    Coast,
    Shift(u8),
}

impl Action {
    pub fn is_accelerating(actions: &[Self]) -> bool {
        actions.contains(&Self::Accelerate)
    }
}
