use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use color_eyre::eyre::WrapErr;
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::car::{Car, Snapshot};
use crate::config::{parse_track_length, Config, ConfigError, TrackLength};
use crate::log::Log;
use crate::runtime::{Driver, PlayerInput};

/// Meters of track kept visible behind the player.
pub const CAMERA_LEAD: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    Player,
    #[serde(rename = "AI")]
    Ai,
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player => write!(f, "Player"),
            Self::Ai => write!(f, "AI"),
        }
    }
}

pub struct Race {
    ticks: usize,
    track_length: f64,
    player: Car,
    ai: Car,
    ai_driver: Box<dyn Driver>,
    scroll: f64,
    record_logs: bool,
    logs: Vec<Log>,
    winner: Option<Winner>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceSummary {
    pub winner: Option<Winner>,
    pub ticks: usize,
    pub track_length: f64,
    pub player: Snapshot,
    pub ai: Snapshot,
}

impl Race {
    pub fn new(config: &Config, track_length: TrackLength, ai_driver: Box<dyn Driver>) -> Self {
        let track_length = track_length.meters();
        let player = Car::new(Winner::Player.to_string(), config.player_car());
        let ai = Car::new(Winner::Ai.to_string(), config.ai_car());

        Self {
            ticks: 0,
            track_length,
            scroll: player.position - CAMERA_LEAD,
            player,
            ai,
            ai_driver,
            record_logs: config.export_log,
            logs: Vec::new(),
            winner: None,
        }
    }

    pub const fn ticks(&self) -> usize {
        self.ticks
    }

    pub const fn track_length(&self) -> f64 {
        self.track_length
    }

    pub const fn player(&self) -> &Car {
        &self.player
    }

    pub const fn ai(&self) -> &Car {
        &self.ai
    }

    pub const fn scroll(&self) -> f64 {
        self.scroll
    }

    pub const fn winner(&self) -> Option<Winner> {
        self.winner
    }

    pub fn logs(&self) -> &[Log] {
        &self.logs
    }

    /// Advances the race by one frame and reports the winner once there is
    /// one. The player is checked first, so it takes a dead heat.
    pub fn tick(&mut self, player_driver: &mut dyn Driver) -> color_eyre::Result<Option<Winner>> {
        if self.winner.is_some() {
            return Ok(self.winner);
        }

        let player_actions = player_driver.drive(&mut self.player)?;
        self.player
            .update(Action::is_accelerating(&player_actions), self.track_length);

        let ai_actions = self.ai_driver.drive(&mut self.ai)?;
        self.ai
            .update(Action::is_accelerating(&ai_actions), self.track_length);

        self.scroll = self.player.position - CAMERA_LEAD;
        self.ticks += 1;
        self.log_turn(player_actions, ai_actions);

        self.winner = if self.player.finished {
            Some(Winner::Player)
        } else if self.ai.finished {
            Some(Winner::Ai)
        } else {
            None
        };
        if let Some(winner) = self.winner {
            tracing::info!(%winner, ticks = self.ticks, "race finished");
        }

        Ok(self.winner)
    }

    /// Runs until somebody wins or `max_ticks` frames have passed.
    pub fn run(
        &mut self,
        player_driver: &mut dyn Driver,
        max_ticks: usize,
    ) -> color_eyre::Result<Option<Winner>> {
        while self.ticks < max_ticks {
            if let Some(winner) = self.tick(player_driver)? {
                return Ok(Some(winner));
            }
        }
        tracing::warn!(max_ticks, "race stopped without a winner");
        Ok(None)
    }

    fn log_turn(&mut self, player_actions: Vec<Action>, ai_actions: Vec<Action>) {
        if !self.record_logs {
            return;
        }
        let mut log = Log::default();
        log.add_info(
            self.ticks,
            player_actions,
            ai_actions,
            vec![self.player.snapshot(), self.ai.snapshot()],
        );
        self.logs.push(log);
    }

    pub fn summary(&self) -> RaceSummary {
        RaceSummary {
            winner: self.winner,
            ticks: self.ticks,
            track_length: self.track_length,
            player: self.player.snapshot(),
            ai: self.ai.snapshot(),
        }
    }

    /// Writes the recorded turns and the winner to `dir/race_<unix-secs>.json`.
    pub fn export_log(&self, dir: &Path) -> color_eyre::Result<PathBuf> {
        let json = serde_json::json!({
            "logs": self.logs,
            "winner": self.winner,
            "track_length": self.track_length,
        });

        let time_now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .wrap_err("system clock is before the unix epoch")?
            .as_secs();

        std::fs::create_dir_all(dir)
            .wrap_err_with(|| format!("failed to create log directory {}", dir.display()))?;
        let filename = dir.join(format!("race_{time_now}.json"));

        File::create(&filename)
            .and_then(|mut file| file.write_all(json.to_string().as_bytes()))
            .wrap_err_with(|| format!("failed to write {}", filename.display()))?;

        tracing::info!(path = %filename.display(), entries = self.logs.len(), "race log exported");
        Ok(filename)
    }
}

/// Track length entry on the intro screen.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IntroForm {
    pub text: String,
    pub active: bool,
    pub error: Option<String>,
}

impl IntroForm {
    pub fn click_field(&mut self) {
        self.active = !self.active;
    }

    pub fn click_outside(&mut self) {
        self.active = false;
    }

    pub fn type_char(&mut self, c: char) {
        if self.active && !c.is_control() {
            self.text.push(c);
            self.error = None;
        }
    }

    pub fn backspace(&mut self) {
        if self.active {
            self.text.pop();
            self.error = None;
        }
    }

    pub fn enter(&mut self) {
        self.active = false;
    }
}

pub enum Scene {
    Intro(IntroForm),
    Racing(Box<Race>),
    Victory { winner: Winner, race: Box<Race> },
}

impl Scene {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Intro(_) => "intro",
            Self::Racing(_) => "racing",
            Self::Victory { .. } => "victory",
        }
    }
}

/// Intro -> Racing -> Victory. Victory is terminal; only quitting leaves it.
pub struct Game {
    scene: Scene,
    config: Config,
    ai_driver: Option<Box<dyn Driver>>,
}

impl Game {
    pub fn new(config: Config, ai_driver: Box<dyn Driver>) -> Self {
        Self {
            scene: Scene::Intro(IntroForm::default()),
            config,
            ai_driver: Some(ai_driver),
        }
    }

    pub const fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn intro_mut(&mut self) -> Option<&mut IntroForm> {
        match &mut self.scene {
            Scene::Intro(form) => Some(form),
            _ => None,
        }
    }

    /// Handles the Start button. A bad track length keeps the intro screen up
    /// with the error shown in the form.
    pub fn start(&mut self) -> Result<(), ConfigError> {
        let Scene::Intro(form) = &mut self.scene else {
            return Ok(());
        };

        let track_length = match parse_track_length(&form.text) {
            Ok(track_length) => track_length,
            Err(e) => {
                tracing::warn!(input = %form.text, error = %e, "rejected track length");
                form.error = Some(e.to_string());
                return Err(e);
            }
        };

        let Some(ai_driver) = self.ai_driver.take() else {
            return Ok(());
        };
        tracing::info!(track_length = track_length.meters(), "race started");
        self.scene = Scene::Racing(Box::new(Race::new(&self.config, track_length, ai_driver)));
        Ok(())
    }

    /// One racing frame. Does nothing outside the race.
    pub fn tick(&mut self, mut input: PlayerInput) -> color_eyre::Result<()> {
        let Scene::Racing(race) = &mut self.scene else {
            return Ok(());
        };
        let Some(winner) = race.tick(&mut input)? else {
            return Ok(());
        };

        let scene = std::mem::replace(&mut self.scene, Scene::Intro(IntroForm::default()));
        let Scene::Racing(race) = scene else {
            return Ok(());
        };
        // Export failures are logged; the race still ends on the victory screen.
        if self.config.export_log {
            if let Err(e) = race.export_log(&self.config.log_dir) {
                tracing::warn!(error = %e, "failed to export race log");
            }
        }
        self.scene = Scene::Victory { winner, race };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::runtime::HeuristicDriver;

    fn ai_driver() -> Box<dyn Driver> {
        Box::new(HeuristicDriver::new(StdRng::seed_from_u64(7)))
    }

    fn race(track_length: f64) -> Race {
        Race::new(
            &Config::default(),
            TrackLength::Entered(track_length),
            ai_driver(),
        )
    }

    fn exporting_config(log_dir: PathBuf) -> Config {
        Config {
            export_log: true,
            log_dir,
            ..Config::default()
        }
    }

    fn game() -> Game {
        Game::new(Config::default(), ai_driver())
    }

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("dragster-{}-{name}", std::process::id()))
    }

    fn finish_race(game: &mut Game) {
        let mut ticks = 0;
        while game.scene().name() == "racing" {
            game.tick(PlayerInput::default()).unwrap();
            ticks += 1;
            assert!(ticks < 100_000);
        }
    }

    fn type_text(game: &mut Game, text: &str) {
        let form = game.intro_mut().unwrap();
        form.click_field();
        for c in text.chars() {
            form.type_char(c);
        }
        form.enter();
    }

    #[test]
    fn dead_heat_goes_to_the_player() {
        let mut race = race(500.0);
        race.player.position = 499.9;
        race.player.speed = 60.0;
        race.ai.position = 499.9;
        race.ai.speed = 60.0;

        let mut input = PlayerInput {
            accelerate: true,
            gear: None,
        };
        let winner = race.tick(&mut input).unwrap();
        assert!(race.player.finished && race.ai.finished);
        assert_eq!(winner, Some(Winner::Player));
    }

    #[test]
    fn ai_wins_against_an_idle_player() {
        let mut race = race(300.0);
        let winner = race.run(&mut PlayerInput::default(), 100_000).unwrap();
        assert_eq!(winner, Some(Winner::Ai));
        assert_eq!(race.player.position, 0.0);
    }

    #[test]
    fn turns_are_recorded_only_when_exporting() {
        let mut race = race(300.0);
        race.run(&mut PlayerInput::default(), 100_000).unwrap();
        assert!(race.logs().is_empty());

        let config = exporting_config(scratch_path("unused"));
        let mut race = Race::new(&config, TrackLength::Entered(300.0), ai_driver());
        race.run(&mut PlayerInput::default(), 100_000).unwrap();
        assert_eq!(race.logs().len(), race.ticks());
        assert_eq!(race.logs()[0].tick, 1);
    }

    #[test]
    fn summary_reports_the_result() {
        let mut race = race(300.0);
        race.run(&mut PlayerInput::default(), 100_000).unwrap();

        let summary = serde_json::to_value(race.summary()).unwrap();
        assert_eq!(summary["winner"], "AI");
        assert_eq!(summary["ticks"], race.ticks());
        assert_eq!(summary["track_length"], 300.0);
        assert_eq!(summary["player"]["position"], 0.0);
        assert_eq!(summary["ai"]["finished"], true);
    }

    #[test]
    fn exported_log_reads_back() {
        let dir = scratch_path("export");
        let config = exporting_config(dir.clone());
        let mut race = Race::new(&config, TrackLength::Entered(300.0), ai_driver());
        race.run(&mut PlayerInput::default(), 100_000).unwrap();

        let path = race.export_log(&dir).unwrap();
        assert!(path.starts_with(&dir));
        let raw = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["winner"], "AI");
        assert_eq!(json["track_length"], 300.0);
        let logs = json["logs"].as_array().unwrap();
        assert_eq!(logs.len(), race.ticks());
        assert_eq!(logs.last().unwrap()["tick"], race.ticks());
    }

    #[test]
    fn failed_export_still_shows_victory() {
        // A plain file where the log directory should be.
        let blocker = scratch_path("blocker");
        std::fs::write(&blocker, b"").unwrap();

        let mut game = Game::new(exporting_config(blocker.clone()), ai_driver());
        type_text(&mut game, "200");
        game.start().unwrap();
        finish_race(&mut game);
        std::fs::remove_file(&blocker).unwrap();

        let Scene::Victory { winner, race } = game.scene() else {
            panic!("expected victory scene");
        };
        assert_eq!(*winner, Winner::Ai);
        assert_eq!(race.logs().len(), race.ticks());
    }

    #[test]
    fn race_stops_when_decided() {
        let mut race = race(300.0);
        race.run(&mut PlayerInput::default(), 100_000).unwrap();
        let ticks = race.ticks();
        assert_eq!(race.tick(&mut PlayerInput::default()).unwrap(), Some(Winner::Ai));
        assert_eq!(race.ticks(), ticks);
    }

    #[test]
    fn run_gives_up_after_max_ticks() {
        let mut race = race(10_000.0);
        assert_eq!(race.run(&mut PlayerInput::default(), 10).unwrap(), None);
        assert_eq!(race.ticks(), 10);
    }

    #[test]
    fn camera_follows_the_player() {
        let mut race = race(10_000.0);
        assert_eq!(race.scroll(), -CAMERA_LEAD);
        let mut input = PlayerInput {
            accelerate: true,
            gear: None,
        };
        for _ in 0..100 {
            race.tick(&mut input).unwrap();
        }
        assert_eq!(race.scroll(), race.player().position - CAMERA_LEAD);
        assert!(race.scroll() > -CAMERA_LEAD);
    }

    #[test]
    fn empty_entry_starts_default_race() {
        let mut game = game();
        assert_eq!(game.scene().name(), "intro");
        game.start().unwrap();
        let Scene::Racing(race) = game.scene() else {
            panic!("expected racing scene");
        };
        assert_eq!(race.track_length(), 10000.0);
    }

    #[test]
    fn entered_length_is_used() {
        let mut game = game();
        type_text(&mut game, "750");
        game.start().unwrap();
        let Scene::Racing(race) = game.scene() else {
            panic!("expected racing scene");
        };
        assert_eq!(race.track_length(), 750.0);
    }

    #[test]
    fn bad_entry_stays_on_intro() {
        let mut game = game();
        type_text(&mut game, "far");
        assert_eq!(
            game.start(),
            Err(ConfigError::InvalidTrackLength("far".to_string()))
        );
        let form = game.intro_mut().unwrap();
        assert!(form.error.is_some());

        form.click_field();
        for _ in 0..3 {
            form.backspace();
        }
        form.type_char('9');
        form.type_char('0');
        assert_eq!(form.error, None);
        game.start().unwrap();
        assert_eq!(game.scene().name(), "racing");
    }

    #[test]
    fn typing_needs_an_active_field() {
        let mut form = IntroForm::default();
        form.type_char('5');
        assert_eq!(form.text, "");
        form.click_field();
        form.type_char('5');
        form.type_char('\r');
        form.click_outside();
        form.type_char('0');
        assert_eq!(form.text, "5");
        assert!(!form.active);
    }

    #[test]
    fn race_ends_on_victory_screen() {
        let mut game = game();
        type_text(&mut game, "200");
        game.start().unwrap();
        finish_race(&mut game);
        let Scene::Victory { winner, race } = game.scene() else {
            panic!("expected victory scene");
        };
        assert_eq!(*winner, Winner::Ai);
        assert_eq!(race.winner(), Some(Winner::Ai));

        // Victory is terminal.
        game.tick(PlayerInput::default()).unwrap();
        assert!(game.start().is_ok());
        assert_eq!(game.scene().name(), "victory");
    }

    #[test]
    fn ticks_before_start_do_nothing() {
        let mut game = game();
        game.tick(PlayerInput {
            accelerate: true,
            gear: Some(2),
        })
        .unwrap();
        assert_eq!(game.scene().name(), "intro");
    }

    #[test]
    fn winner_names() {
        assert_eq!(Winner::Player.to_string(), "Player");
        assert_eq!(Winner::Ai.to_string(), "AI");
        assert_eq!(serde_json::to_string(&Winner::Ai).unwrap(), "\"AI\"");
    }
}
