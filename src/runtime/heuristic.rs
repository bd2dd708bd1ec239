use rand::Rng;

use crate::action::Action;
use crate::car::Car;

use super::Driver;

const HOT_ENGINE: f64 = 95.0;
const HOT_ENGINE_BACK_OFF: f64 = 0.3;
const LAUNCH_RATIO: f64 = 0.3;
const LAUNCH_BOOST: f64 = 1.5;
const MIN_SHIFT_RATIO: f64 = 0.9;
const SHIFT_SPEED_LOSS: f64 = 0.95;

/// The computer opponent: full throttle unless the engine runs hot, shifting
/// up once the current gear is nearly used up.
pub struct HeuristicDriver<R> {
    rng: R,
}

impl<R: Rng> HeuristicDriver<R> {
    pub const fn new(rng: R) -> Self {
        Self { rng }
    }

    fn should_accelerate(&mut self, car: &Car) -> bool {
        if car.temperature > HOT_ENGINE {
            return self.rng.gen::<f64>() > HOT_ENGINE_BACK_OFF;
        }
        true
    }
}

impl<R: Rng> Driver for HeuristicDriver<R> {
    fn drive(&mut self, car: &mut Car) -> color_eyre::Result<Vec<Action>> {
        let Some(max_speed) = car.nominal_max_speed() else {
            return Ok(Vec::new());
        };
        let mut actions = Vec::with_capacity(2);

        if self.should_accelerate(car) && car.speed < max_speed {
            let boost = if car.speed < max_speed * LAUNCH_RATIO {
                LAUNCH_BOOST
            } else {
                1.0
            };
            car.throttle(true, boost);
            actions.push(Action::Accelerate);
        } else {
            car.coast();
            actions.push(Action::Coast);
        }

        if !car.is_top_gear() && car.speed / max_speed >= car.spec.shift_point(car.gear) {
            let next_gear_speed = car.spec.max_speed(car.gear + 1).unwrap_or(f64::INFINITY);
            if car.speed > max_speed * MIN_SHIFT_RATIO && car.speed < next_gear_speed {
                let gear = car.gear + 1;
                car.select_gear(gear);
                car.speed *= SHIFT_SPEED_LOSS;
                tracing::debug!(car = %car.name, gear, speed = car.speed, "shifted up");
                actions.push(Action::Shift(gear));
            }
        }

        Ok(actions)
    }
}
