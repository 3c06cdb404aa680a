use anyhow::{Result, anyhow};
use pico_args::Arguments;
use std::{env, path::PathBuf, time::Duration};

use crate::config::{self, Profile};
use crate::controller::Size;
use crate::gestures;
use crate::replay::{self, ReplayOptions};
use crate::tracker::GestureState;

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

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

        Some("init") => {
            let path = config_path(None)?;
            if config::install_default(&path)? {
                println!("ok: wrote default profile to {}", path.display());
            } else {
                println!("ok: profile already present at {}", path.display());
            }
            Ok(())
        }

        Some("check") => {
            let explicit: Option<PathBuf> = pargs.opt_free_from_str()?;
            let path = config_path(explicit)?;
            let profile = Profile::load(&path)?;
            print_json(&serde_json::json!({
                "ok": true,
                "path": path,
                "profile": profile,
            }));
            Ok(())
        }

        Some("classify") => {
            // usage: swipecard classify <dx> <dy> <vx> <vy> [--config path]
            let explicit: Option<PathBuf> = pargs.opt_value_from_str("--config")?;
            let usage = "usage: swipecard classify <dx> <dy> <vx> <vy> [--config path]";
            let mut next = || -> Result<f32> { pargs.free_from_str().map_err(|_| anyhow!(usage)) };
            let state = GestureState {
                dx: next()?,
                dy: next()?,
                vx: next()?,
                vy: next()?,
            };
            let profile = load_lenient(explicit)?;
            let dir = gestures::classify(&state, &profile.card);
            print_json(&serde_json::json!({
                "direction": dir.map_or("none", |d| d.as_str()),
                "requirement": profile.card.swipe_requirement_type,
                "threshold": profile.card.swipe_threshold,
            }));
            Ok(())
        }

        Some("replay") => {
            let explicit: Option<PathBuf> = pargs.opt_value_from_str("--config")?;
            let container: Option<Size> = pargs.opt_value_from_fn("--container", parse_size)?;
            let element: Option<Size> = pargs.opt_value_from_fn("--element", parse_size)?;
            let seed: Option<u64> = pargs.opt_value_from_str("--seed")?;
            let frame_ms: Option<u64> = pargs.opt_value_from_str("--frame-ms")?;
            let trace: PathBuf = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: swipecard replay <trace.json> [options]"))?;

            let defaults = ReplayOptions::default();
            let opts = ReplayOptions {
                container: container.unwrap_or(defaults.container),
                element: element.unwrap_or(defaults.element),
                frame: frame_ms.map_or(defaults.frame, Duration::from_millis),
                seed,
            };
            let profile = load_lenient(explicit)?;
            let steps = replay::load_trace(&trace)?;
            let report = replay::run(profile, &steps, &opts)?;

            for ev in &report.events {
                println!("{}", serde_json::to_string(ev)?);
            }
            println!(
                "{}",
                serde_json::json!({
                    "view": report.view,
                    "settled": report.settled,
                    "elapsed_ms": report.elapsed_ms,
                })
            );
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

fn config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(p) => Ok(p),
        None => config::default_config_path()
            .ok_or_else(|| anyhow!("no home directory; pass a profile path explicitly")),
    }
}

fn load_lenient(explicit: Option<PathBuf>) -> Result<Profile> {
    Ok(Profile::load_or_default(&config_path(explicit)?))
}

fn parse_size(s: &str) -> std::result::Result<Size, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let w: f32 = w.trim().parse().map_err(|e| format!("bad width '{w}': {e}"))?;
    let h: f32 = h.trim().parse().map_err(|e| format!("bad height '{h}': {e}"))?;
    if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
        return Err(format!("size must be positive, got '{s}'"));
    }
    Ok(Size::new(w, h))
}

fn print_help() {
    println!(
        r#"swipecard: swipe-card gesture controller

USAGE:
  swipecard help [command]                    Show general or command-specific help
  swipecard init                              Install the default profile
  swipecard check [path]                      Validate a profile and print it resolved
  swipecard classify <dx> <dy> <vx> <vy>      Classify one gesture state
  swipecard replay <trace.json>               Replay a pointer trace and print callbacks

OPTIONS:
  --config <path>      Profile to use (classify, replay)
  --container <WxH>    Container size for replay (default 400x800)
  --element <WxH>      Card size for replay (default 300x450)
  --seed <n>           Fix the random fly-out rotation
  --frame-ms <n>       Simulated frame length (default 16)

TIPS:
  - Default profile: ~/.config/swipecard/config.toml
  - Set RUST_LOG=debug to follow the state machine
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "init" => println!(
            "usage: swipecard init\nWrites the default profile to ~/.config/swipecard/config.toml unless one exists."
        ),
        "check" => println!(
            "usage: swipecard check [path]\nStrictly loads a profile and prints the resolved values."
        ),
        "classify" => println!(
            "usage: swipecard classify <dx> <dy> <vx> <vy> [--config path]\nPrints left, right, up, down or none. y grows downward."
        ),
        "replay" => println!(
            "usage: swipecard replay <trace.json> [--config path] [--container WxH] [--element WxH] [--seed n] [--frame-ms n]\nTrace steps: down/move/up/leave {{x,y,t}}, swipe {{dir}}, restore, hide, wait {{ms}}."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_json(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_container_sizes() {
        assert_eq!(parse_size("400x800"), Ok(Size::new(400.0, 800.0)));
        assert_eq!(parse_size("320X480"), Ok(Size::new(320.0, 480.0)));
        assert!(parse_size("400").is_err());
        assert!(parse_size("0x10").is_err());
        assert!(parse_size("axb").is_err());
    }
}
