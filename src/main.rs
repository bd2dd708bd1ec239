#![warn(clippy::all, clippy::pedantic, clippy::cargo, clippy::nursery)]
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use color_eyre::eyre::{bail, eyre, WrapErr};
use color_eyre::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

use dragster::config::{parse_track_length, Config};
use dragster::game::{Game, Race};
use dragster::runtime::{Driver, HeuristicDriver, LuaDriver};
use dragster::tui::Tui;

const LOG_FILE: &str = "logs/dragster.log";
// Half an hour of simulated racing.
const MAX_HEADLESS_TICKS: usize = 60 * 60 * 30;

const USAGE: &str = "\
usage: dragster [options]

  --config <path>          JSON config file
  --seed <n>               seed for the AI's dice
  --ai-script <path>       Lua script driving the AI car
  --export-log             write logs/race_<time>.json when a race ends
  --headless               race without a terminal and print a JSON summary
  --track <meters>         track length for --headless (empty = 10000)
  --player-script <path>   Lua script driving the player in --headless";

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    seed: Option<u64>,
    ai_script: Option<PathBuf>,
    export_log: bool,
    headless: bool,
    track: Option<String>,
    player_script: Option<PathBuf>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Option<Self>> {
        let mut parsed = Self::default();
        while let Some(arg) = args.next() {
            let mut value = || {
                args.next()
                    .ok_or_else(|| eyre!("{} needs a value\n\n{}", arg, USAGE))
            };
            match arg.as_str() {
                "--config" => parsed.config = Some(value()?.into()),
                "--seed" => {
                    let seed = value()?;
                    parsed.seed = Some(
                        seed.parse::<u64>()
                            .wrap_err_with(|| format!("invalid seed `{seed}`"))?,
                    );
                }
                "--ai-script" => parsed.ai_script = Some(value()?.into()),
                "--export-log" => parsed.export_log = true,
                "--headless" => parsed.headless = true,
                "--track" => parsed.track = Some(value()?),
                "--player-script" => parsed.player_script = Some(value()?.into()),
                "-h" | "--help" => return Ok(None),
                other => bail!("unknown argument `{}`\n\n{}", other, USAGE),
            }
        }
        Ok(Some(parsed))
    }
}

fn init_tracing() -> Result<()> {
    std::fs::create_dir_all("logs").wrap_err("failed to create log directory")?;
    let file = File::create(LOG_FILE).wrap_err_with(|| format!("failed to create {LOG_FILE}"))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn ai_driver(script: Option<&PathBuf>, seed: u64) -> Result<Box<dyn Driver>> {
    Ok(match script {
        Some(path) => Box::new(LuaDriver::from_file(path)?),
        None => Box::new(HeuristicDriver::new(StdRng::seed_from_u64(seed))),
    })
}

fn headless(args: &Args, config: &Config, ai: Box<dyn Driver>, seed: u64) -> Result<()> {
    let track_length = parse_track_length(args.track.as_deref().unwrap_or_default())?;
    let mut player: Box<dyn Driver> = match &args.player_script {
        Some(path) => Box::new(LuaDriver::from_file(path)?),
        None => Box::new(HeuristicDriver::new(StdRng::seed_from_u64(
            seed.wrapping_add(1),
        ))),
    };

    let mut race = Race::new(config, track_length, ai);
    race.run(&mut *player, MAX_HEADLESS_TICKS)?;
    if config.export_log {
        race.export_log(&config.log_dir)?;
    }

    println!("{}", serde_json::to_string(&race.summary())?);
    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let Some(args) = Args::parse(std::env::args().skip(1))? else {
        println!("{USAGE}");
        return Ok(());
    };
    init_tracing()?;

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.export_log |= args.export_log;

    let seed = config.seed.unwrap_or_else(rand::random);
    tracing::info!(seed, headless = args.headless, "starting dragster");
    let ai = ai_driver(args.ai_script.as_ref(), seed)?;

    if args.headless {
        return headless(&args, &config, ai, seed);
    }

    let mut game = Game::new(config, ai);
    let mut tui = Tui::new().wrap_err("failed to set up the terminal")?;
    tui.run(&mut game)
}
