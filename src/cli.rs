use anyhow::{Result, anyhow};
use pico_args::Arguments;
use std::{
    env,
    path::PathBuf,
    sync::{Arc, atomic::AtomicBool},
};

use crate::config::ConfigState;
use crate::stream;
use crate::trial::TrialController;

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    // Flags-based help (-h/--help)
    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("run") => {
            let input: Option<PathBuf> = pargs.opt_value_from_str("--input")?;
            let duration: Option<u64> = pargs.opt_value_from_str("--duration")?;

            let cfg = ConfigState::load_or_install_default()?;
            let mut settings = cfg.profile.trial.clone();
            if let Some(ms) = duration {
                if ms == 0 {
                    return Err(anyhow!("--duration must be positive"));
                }
                settings.trial_duration_ms = ms;
            }

            let term = Arc::new(AtomicBool::new(false));
            signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&term))?;
            signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&term))?;

            let reader = stream::open_source(input.as_deref())?;
            let mut controller = TrialController::new(settings);
            let result = stream::run_trial(reader, &mut controller, &term)?;
            print_response(&serde_json::to_value(&result)?);
            Ok(())
        }

        Some("analyze") => {
            let path: PathBuf = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: tapmetry analyze <file>"))?;

            let cfg = ConfigState::load_or_install_default()?;
            let reader = stream::open_source(Some(&path))?;
            let mut controller = TrialController::new(cfg.profile.trial.clone());
            let never = AtomicBool::new(false);
            let result = stream::run_trial(reader, &mut controller, &never)?;
            print_response(&serde_json::to_value(&result)?);
            Ok(())
        }

        Some("list") => {
            let cfg = ConfigState::load_or_install_default()?;
            for name in cfg.list_profiles() {
                if name == cfg.active_name {
                    println!("* {name}");
                } else {
                    println!("  {name}");
                }
            }
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: tapmetry use <profile_name>"))?;
            let mut cfg = ConfigState::load_or_install_default()?;
            cfg.set_active(&name)?;
            println!("active profile: {name}");
            Ok(())
        }

        Some("doctor") => {
            let cfg = ConfigState::load_or_install_default()?;
            print_response(&cfg.doctor_report());
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!(
        r#"tapmetry — finger-tapping assessment from hand-landmark streams

USAGE:
  tapmetry help [command]          Show general or command-specific help
  tapmetry run [--input <file>]    Run a timed trial over a frame stream
           [--duration <ms>]       (stdin by default); prints the result
  tapmetry analyze <file>          Replay a recorded frame stream
  tapmetry list                    List profiles; marks active with '*'
  tapmetry use <name>              Switch active profile
  tapmetry doctor                  Report config and profile state

TIPS:
  - Frame records are newline-delimited JSON from the hand tracker
  - Profiles: ~/.config/tapmetry/profiles
  - Active profile pointer: ~/.config/tapmetry/active
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "run" => println!(
            "usage: tapmetry run [--input <file>] [--duration <ms>]\nRuns one timed trial over a live frame stream (stdin by default).\nStops on the configured deadline, Ctrl-C, or end of stream."
        ),
        "analyze" => println!(
            "usage: tapmetry analyze <file>\nReplays a recorded frame stream through a full trial and prints the result."
        ),
        "list" => {
            println!("usage: tapmetry list\nLists available profiles; marks active with '*'.")
        }
        "use" => {
            println!("usage: tapmetry use <name>\nSwitches active profile to <name> and reloads.")
        }
        "doctor" => println!(
            "usage: tapmetry doctor\nShows config dir, profiles, and active trial settings."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
