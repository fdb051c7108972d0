use std::path::PathBuf;

use clap::{arg, command, value_parser, ArgAction, ArgMatches, Command};

use crate::clock::DEFAULT_CLOCK_HZ;

/// Window scale factors minifb can render at
pub const SCALES: [usize; 6] = [1, 2, 4, 8, 16, 32];

/// Everything the binary needs to start a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub rom: PathBuf,
    pub clock_rate: u32,
    pub scale: usize,
    pub seed: Option<u64>,
    pub muted: bool,
}

impl Config {
    pub fn from_args() -> Self {
        Self::from_matches(&cli().get_matches())
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            // required args are always present
            rom: matches.get_one::<PathBuf>("rom").cloned().unwrap_or_default(),
            clock_rate: matches
                .get_one::<u32>("clock-rate")
                .copied()
                .unwrap_or(DEFAULT_CLOCK_HZ),
            scale: matches.get_one::<usize>("scale").copied().unwrap_or(8),
            seed: matches.get_one::<u64>("seed").copied(),
            muted: matches.get_flag("mute"),
        }
    }
}

fn cli() -> Command {
    let rom_arg = arg!([rom] "The CHIP-8 program to run")
        .required(true)
        .value_parser(value_parser!(PathBuf));

    let clock_arg = arg!(-c --"clock-rate" <HZ> "How many instructions to execute per second")
        .value_parser(value_parser!(u32).range(1..))
        .default_value("500");

    let scale_arg = arg!(-s --scale <SCALE> "Window scale factor (1, 2, 4, 8, 16 or 32)")
        .value_parser(parse_scale)
        .default_value("8");

    let seed_arg = arg!(--seed <SEED> "Seed the random number generator for reproducible runs")
        .required(false)
        .value_parser(value_parser!(u64));

    let mute_arg =
        arg!(--mute "Don't play a tone while the sound timer runs").action(ArgAction::SetTrue);

    command!()
        .arg(rom_arg)
        .arg(clock_arg)
        .arg(scale_arg)
        .arg(seed_arg)
        .arg(mute_arg)
}

fn parse_scale(value: &str) -> Result<usize, String> {
    let scale: usize = value.parse().map_err(|_| format!("`{}` is not a number", value))?;
    if SCALES.contains(&scale) {
        Ok(scale)
    } else {
        Err(format!("scale must be one of {:?}", SCALES))
    }
}
