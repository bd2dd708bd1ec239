use crate::action::Action;
use crate::car::Car;

mod heuristic;
mod lua;

pub use heuristic::HeuristicDriver;
pub use lua::LuaDriver;

/// Anything that can sit behind the wheel for one tick.
///
/// Drivers act on the car before its physics update and report what they
/// did; the race feeds `Action::Accelerate` back into the engine
/// temperature model.
pub trait Driver {
    fn drive(&mut self, car: &mut Car) -> color_eyre::Result<Vec<Action>>;
}

/// Keyboard state sampled for the current frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PlayerInput {
    pub accelerate: bool,
    pub gear: Option<u8>,
}

impl Driver for PlayerInput {
    fn drive(&mut self, car: &mut Car) -> color_eyre::Result<Vec<Action>> {
        let mut actions = Vec::with_capacity(2);
        if let Some(gear) = self.gear.take() {
            car.select_gear(gear);
            actions.push(Action::Shift(gear));
        }

        // A car stuck in a gear it doesn't have goes nowhere.
        if !car.has_valid_gear() {
            return Ok(actions);
        }

        car.throttle(self.accelerate, 1.0);
        actions.push(if self.accelerate {
            Action::Accelerate
        } else {
            Action::Coast
        });
        Ok(actions)
    }
}
