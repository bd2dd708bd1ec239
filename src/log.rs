use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::car::Snapshot;

#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct Log {
    pub tick: usize,
    pub player_actions: Vec<Action>,
    pub ai_actions: Vec<Action>,
    pub cars: Vec<Snapshot>,
}

impl Log {
    pub fn add_info(
        &mut self,
        tick: usize,
        player_actions: Vec<Action>,
        ai_actions: Vec<Action>,
        cars: Vec<Snapshot>,
    ) {
        self.tick = tick;
        self.player_actions = player_actions;
        self.ai_actions = ai_actions;
        self.cars = cars;
    }
}
