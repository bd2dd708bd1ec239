use mlua::prelude::LuaError;
use mlua::{IntoLua, Lua, Value};
use serde::{Deserialize, Serialize};

use crate::config::CarSpec;

pub const BASE_TEMPERATURE: f64 = 60.0;
pub const OVERHEAT_ABOVE: f64 = 100.0;
pub const COOLED_BELOW: f64 = 90.0;
const OVERHEAT_SPEED_PENALTY: f64 = 0.7;
const OVERHEAT_ACCELERATION_PENALTY: f64 = 0.8;
const HEATING_RATE: f64 = 0.5;
const COOLING_RATE: f64 = 0.3;
const DRAG_SPEED_RATIO: f64 = 1.2;
pub const TICKS_PER_SECOND: f64 = 60.0;

#[derive(Debug, Clone)]
pub struct Car {
    pub name: String,
    pub position: f64,
    pub speed: f64,
    pub gear: u8,
    pub temperature: f64,
    pub overheating: bool,
    pub finished: bool,
    pub rpm: f64,
    pub spec: CarSpec,
}

impl Car {
    pub fn new(name: impl Into<String>, spec: CarSpec) -> Self {
        Self {
            name: name.into(),
            position: 0.0,
            speed: 0.0,
            gear: 1,
            temperature: BASE_TEMPERATURE,
            overheating: false,
            finished: false,
            rpm: 0.0,
            spec,
        }
    }

    pub fn nominal_max_speed(&self) -> Option<f64> {
        self.spec.max_speed(self.gear)
    }

    /// Max speed of the current gear with the overheating penalty applied.
    pub fn current_max_speed(&self) -> Option<f64> {
        self.nominal_max_speed().map(|max| {
            if self.overheating {
                max * OVERHEAT_SPEED_PENALTY
            } else {
                max
            }
        })
    }

    pub fn acceleration(&self) -> f64 {
        if self.overheating {
            self.spec.acceleration * OVERHEAT_ACCELERATION_PENALTY
        } else {
            self.spec.acceleration
        }
    }

    pub fn has_valid_gear(&self) -> bool {
        self.nominal_max_speed().is_some()
    }

    pub fn is_top_gear(&self) -> bool {
        self.gear >= self.spec.gears()
    }

    /// Gears are set directly, the way the number keys do it. An out of range
    /// gear freezes the car until a valid one is selected.
    pub fn select_gear(&mut self, gear: u8) {
        if gear != self.gear {
            tracing::debug!(car = %self.name, from = self.gear, to = gear, "gear selected");
        }
        self.gear = gear;
    }

    /// Applies one tick of throttle (or engine braking) at `boost` times the
    /// current acceleration.
    pub fn throttle(&mut self, accelerating: bool, boost: f64) {
        if accelerating {
            self.speed += self.acceleration() * boost;
        } else {
            self.coast();
        }
    }

    pub fn coast(&mut self) {
        self.speed = (self.speed - self.acceleration() / 2.0).max(0.0);
    }

    pub fn update(&mut self, accelerating: bool, track_length: f64) {
        if self.finished {
            return;
        }
        let Some(nominal_max_speed) = self.nominal_max_speed() else {
            return;
        };

        if accelerating {
            self.temperature += HEATING_RATE * (self.speed / nominal_max_speed);
        } else {
            self.temperature = (self.temperature - COOLING_RATE).max(BASE_TEMPERATURE);
        }

        if self.temperature > OVERHEAT_ABOVE {
            if !self.overheating {
                tracing::info!(car = %self.name, temperature = self.temperature, "overheating");
            }
            self.overheating = true;
        } else if self.temperature < COOLED_BELOW {
            if self.overheating {
                tracing::info!(car = %self.name, temperature = self.temperature, "cooled down");
            }
            self.overheating = false;
        }

        let max_speed = if self.overheating {
            nominal_max_speed * OVERHEAT_SPEED_PENALTY
        } else {
            nominal_max_speed
        };

        self.speed = self.speed.clamp(0.0, max_speed);
        self.rpm = (self.speed / max_speed) * 100.0;

        let effective_speed = self.speed * (1.0 - (self.speed / (max_speed * DRAG_SPEED_RATIO)));
        self.position += effective_speed / TICKS_PER_SECOND;

        if self.position >= track_length {
            tracing::info!(car = %self.name, position = self.position, "crossed the finish line");
            self.finished = true;
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            name: self.name.clone(),
            position: self.position,
            speed: self.speed,
            gear: self.gear,
            temperature: self.temperature,
            overheating: self.overheating,
            rpm: self.rpm,
            max_speed: self.current_max_speed(),
            finished: self.finished,
        }
    }
}

/// Read-only view of a car, logged every tick and handed to scripted drivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    pub position: f64,
    pub speed: f64,
    pub gear: u8,
    pub temperature: f64,
    pub overheating: bool,
    pub rpm: f64,
    pub max_speed: Option<f64>,
    pub finished: bool,
}

impl<'lua> IntoLua<'lua> for Snapshot {
    fn into_lua(self, lua: &'lua Lua) -> color_eyre::Result<Value<'lua>, LuaError> {
        let table = lua.create_table()?;
        table.set("name", self.name)?;
        table.set("position", self.position)?;
        table.set("speed", self.speed)?;
        table.set("gear", self.gear)?;
        table.set("temperature", self.temperature)?;
        table.set("overheating", self.overheating)?;
        table.set("rpm", self.rpm)?;
        table.set("max_speed", self.max_speed)?;
        table.set("finished", self.finished)?;
        Ok(Value::Table(table))
    }
}
