use std::path::Path;

use color_eyre::eyre::WrapErr;
use mlua::{Function, Lua, Table};

use crate::action::Action;
use crate::car::Car;

use super::{Driver, PlayerInput};

const ENTRY_POINT: &str = "takeYourTurn";

/// Drives a car from a Lua script.
///
/// The script defines `takeYourTurn(car)`, receives a table with the car's
/// snapshot and answers with `{ accelerate = bool, gear = n }`. Both fields
/// are optional; returning nothing coasts.
pub struct LuaDriver {
    lua: Lua,
}

impl LuaDriver {
    pub fn new(script: &str) -> color_eyre::Result<Self> {
        let lua = Lua::new();
        lua.load(script)
            .exec()
            .wrap_err("Failed to load Lua script")?;

        let _: Function = lua
            .globals()
            .get(ENTRY_POINT)
            .wrap_err_with(|| format!("Lua script does not define {ENTRY_POINT}"))?;

        Ok(Self { lua })
    }

    pub fn from_file(path: &Path) -> color_eyre::Result<Self> {
        let script = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read Lua script {}", path.display()))?;
        Self::new(&script).wrap_err_with(|| format!("in {}", path.display()))
    }

    fn ask(&self, car: &Car) -> color_eyre::Result<PlayerInput> {
        let take_your_turn: Function = self.lua.globals().get(ENTRY_POINT)?;
        let reply: Option<Table> = take_your_turn
            .call(car.snapshot())
            .wrap_err_with(|| format!("Failed to call {ENTRY_POINT}"))?;

        let Some(reply) = reply else {
            return Ok(PlayerInput::default());
        };
        Ok(PlayerInput {
            accelerate: reply.get::<_, Option<bool>>("accelerate")?.unwrap_or(false),
            gear: reply.get::<_, Option<f64>>("gear")?.map(gear_number),
        })
    }
}

/// Scripts answer with plain Lua numbers. Anything that is not a whole number
/// in `u8` range becomes gear 0, which freezes the car like any other
/// invalid gear.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn gear_number(gear: f64) -> u8 {
    if gear.fract() == 0.0 && (0.0..=f64::from(u8::MAX)).contains(&gear) {
        gear as u8
    } else {
        0
    }
}

impl Driver for LuaDriver {
    fn drive(&mut self, car: &mut Car) -> color_eyre::Result<Vec<Action>> {
        let mut input = self.ask(car)?;
        // Only an actual change of gear counts as a shift.
        if input.gear == Some(car.gear) {
            input.gear = None;
        }
        input.drive(car)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CarSpec;

    const SHIFTER: &str = r#"
    function takeYourTurn(car)
        local gear = car.gear
        if car.max_speed ~= nil and car.speed >= car.max_speed * 0.95 and gear < 6 then
            gear = gear + 1
        end
        return { accelerate = true, gear = gear }
    end
    "#;

    #[test]
    fn script_controls_throttle_and_gear() {
        let mut driver = LuaDriver::new(SHIFTER).unwrap();
        let mut car = Car::new("Script", CarSpec::default());

        assert_eq!(driver.drive(&mut car).unwrap(), vec![Action::Accelerate]);
        assert_eq!(car.speed, 5.0);

        car.speed = 66.0;
        assert_eq!(
            driver.drive(&mut car).unwrap(),
            vec![Action::Shift(2), Action::Accelerate]
        );
        assert_eq!(car.gear, 2);
    }

    #[test]
    fn empty_reply_coasts() {
        let mut driver = LuaDriver::new("function takeYourTurn(car) end").unwrap();
        let mut car = Car::new("Script", CarSpec::default());
        car.speed = 10.0;
        assert_eq!(driver.drive(&mut car).unwrap(), vec![Action::Coast]);
        assert_eq!(car.speed, 7.5);
    }

    #[test]
    fn script_sees_the_car() {
        let script = r#"
        function takeYourTurn(car)
            assert(car.name == "Script")
            assert(car.gear == 1)
            assert(car.temperature == 60)
            assert(car.overheating == false)
            return { accelerate = car.position < 1 }
        end
        "#;
        let mut driver = LuaDriver::new(script).unwrap();
        let mut car = Car::new("Script", CarSpec::default());
        assert_eq!(driver.drive(&mut car).unwrap(), vec![Action::Accelerate]);
    }

    #[test]
    fn out_of_range_gear_freezes_the_car() {
        for gear in ["-1", "300", "2.5"] {
            let script = format!(
                "function takeYourTurn(car) return {{ accelerate = true, gear = {gear} }} end"
            );
            let mut driver = LuaDriver::new(&script).unwrap();
            let mut car = Car::new("Script", CarSpec::default());
            car.speed = 20.0;

            let actions = driver.drive(&mut car).unwrap();
            assert_eq!(actions, vec![Action::Shift(0)], "gear = {gear}");
            car.update(true, f64::MAX);
            assert_eq!(car.gear, 0);
            assert_eq!(car.speed, 20.0);
            assert_eq!(car.position, 0.0);
        }
    }

    #[test]
    fn whole_gear_numbers_are_taken() {
        assert_eq!(gear_number(3.0), 3);
        assert_eq!(gear_number(0.0), 0);
        assert_eq!(gear_number(255.0), 255);
        assert_eq!(gear_number(f64::NAN), 0);
    }

    #[test]
    fn missing_entry_point_is_an_error() {
        assert!(LuaDriver::new("local x = 1").is_err());
        assert!(LuaDriver::new("this is not lua").is_err());
    }

    #[test]
    fn script_errors_propagate() {
        let mut driver = LuaDriver::new("function takeYourTurn(car) error('boom') end").unwrap();
        let mut car = Car::new("Script", CarSpec::default());
        assert!(driver.drive(&mut car).is_err());
    }
}
