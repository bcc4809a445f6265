use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

use crate::{
    habits::config::write_example_habits,
    installer::{install, uninstall, InstallTarget, DEFAULT_PREFIX},
    tui::{run_tracker, Exit, TrackerConfig},
    utils::{
        dir::{
            create_application_state_path, default_habits_file, default_log_file,
            ensure_parent_dir,
        },
        logging::{enable_console_logging, enable_file_logging, TRACKER_PREFIX},
        time::MAX_WINDOW_DAYS,
    },
};

#[derive(Parser, Debug)]
#[command(name = "habits", version, long_about = None)]
#[command(about = "Minimalistic habit tracker", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Option<Commands>,
    #[command(flatten)]
    tracker: TrackerArgs,
    #[arg(long, global = true, help = "Enable debug logging")]
    debug: bool,
}

#[derive(clap::Args, Debug)]
struct TrackerArgs {
    #[arg(
        short = 'f',
        long = "file",
        value_name = "FILE",
        help = "Habits file in YAML format. By default $XDG_CONFIG_HOME/microhabits/habits.yml or $HOME/.config/microhabits/habits.yml"
    )]
    habits_file: Option<PathBuf>,
    #[arg(
        short = 'l',
        long = "log",
        value_name = "FILE",
        help = "CSV file to log activity to. By default $XDG_DATA_HOME/microhabits/log.csv or $HOME/.local/share/microhabits/log.csv"
    )]
    log_file: Option<PathBuf>,
    #[arg(
        short = 'b',
        long,
        value_name = "DAYS",
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(..=i64::from(MAX_WINDOW_DAYS)),
        help = "Days before the selected date to display"
    )]
    days_back: u32,
    #[arg(
        short = 'w',
        long,
        value_name = "DAYS",
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(..=i64::from(MAX_WINDOW_DAYS)),
        help = "Days after the selected date to display"
    )]
    days_forward: u32,
}

#[derive(clap::Args, Debug)]
struct TargetArgs {
    #[arg(long, env = "PREFIX", default_value = DEFAULT_PREFIX, help = "Base installation path")]
    prefix: String,
    #[arg(
        long,
        env = "DESTDIR",
        default_value = "",
        hide_default_value = true,
        help = "Staging root prepended to the prefix"
    )]
    destdir: String,
}

impl From<TargetArgs> for InstallTarget {
    fn from(TargetArgs { prefix, destdir }: TargetArgs) -> Self {
        InstallTarget::new(destdir, prefix)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Write an example habits file")]
    Init {
        #[arg(
            short = 'f',
            long = "file",
            value_name = "FILE",
            help = "Where to write the habits file"
        )]
        habits_file: Option<PathBuf>,
    },
    #[command(about = "Copy this executable to ${DESTDIR}${PREFIX}/bin/habits")]
    Install {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(
            long,
            value_name = "FILE",
            help = "Executable to install instead of the running one"
        )]
        source: Option<PathBuf>,
    },
    #[command(about = "Remove ${DESTDIR}${PREFIX}/bin/habits")]
    Uninstall {
        #[command(flatten)]
        target: TargetArgs,
    },
}

pub async fn run_cli() -> Result<ExitCode> {
    let args = Args::parse();

    let logging_level = if args.debug {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    match args.commands {
        None => enable_file_logging(
            TRACKER_PREFIX,
            &create_application_state_path()?,
            logging_level,
        )?,
        Some(_) => enable_console_logging(logging_level)?,
    }

    match args.commands {
        None => process_tracker_command(args.tracker).await,
        Some(Commands::Init { habits_file }) => {
            let path = habits_file.map_or_else(default_habits_file, Ok)?;
            ensure_parent_dir(&path)?;
            write_example_habits(&path).await?;
            println!("Created {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Install { target, source }) => {
            let source = match source {
                Some(source) => source,
                None => std::env::current_exe().context("Couldn't locate running executable")?,
            };
            let dest = install(&source, &target.into())?;
            println!("Installed {}", dest.display());
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Uninstall { target }) => {
            let target: InstallTarget = target.into();
            if uninstall(&target)? {
                println!("Removed {}", target.binary_path().display());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn process_tracker_command(
    TrackerArgs {
        habits_file,
        log_file,
        days_back,
        days_forward,
    }: TrackerArgs,
) -> Result<ExitCode> {
    let config = TrackerConfig {
        habits_file: habits_file.map_or_else(default_habits_file, Ok)?,
        log_file: log_file.map_or_else(default_log_file, Ok)?,
        days_back,
        days_forward,
    };

    match run_tracker(config).await? {
        Exit::Saved => Ok(ExitCode::SUCCESS),
        Exit::Discarded => Ok(ExitCode::FAILURE),
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::*;
    use crate::utils::dir::ENV_MUTEX;

    #[test]
    fn command_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn tracker_is_the_default_command() {
        let args = Args::try_parse_from(["habits", "-f", "h.yml", "-b", "3"]).unwrap();
        assert!(args.commands.is_none());
        assert_eq!(args.tracker.habits_file, Some(PathBuf::from("h.yml")));
        assert_eq!(args.tracker.log_file, None);
        assert_eq!(args.tracker.days_back, 3);
        assert_eq!(args.tracker.days_forward, 1);
    }

    #[test]
    fn day_counts_are_bounded() {
        let args = Args::try_parse_from(["habits", "-b", "365", "-w", "0"]).unwrap();
        assert_eq!(args.tracker.days_back, MAX_WINDOW_DAYS);
        assert_eq!(args.tracker.days_forward, 0);

        assert!(Args::try_parse_from(["habits", "-b", "4294967295"]).is_err());
        assert!(Args::try_parse_from(["habits", "-w", "366"]).is_err());
        assert!(Args::try_parse_from(["habits", "-b", "-1"]).is_err());
    }

    #[test]
    fn install_target_comes_from_flags_or_environment() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let prior = (std::env::var("PREFIX").ok(), std::env::var("DESTDIR").ok());
        std::env::remove_var("PREFIX");
        std::env::set_var("DESTDIR", "/tmp/pkg");

        let args = Args::try_parse_from(["habits", "install"]).unwrap();
        let Some(Commands::Install { target, source }) = args.commands else {
            panic!("expected install");
        };
        assert_eq!(source, None);
        let target: InstallTarget = target.into();
        assert_eq!(target, InstallTarget::new("/tmp/pkg", "/usr/local"));

        let args = Args::try_parse_from(["habits", "uninstall", "--prefix", "/opt"]).unwrap();
        let Some(Commands::Uninstall { target }) = args.commands else {
            panic!("expected uninstall");
        };
        assert_eq!(
            InstallTarget::from(target).binary_path(),
            PathBuf::from("/tmp/pkg/opt/bin/habits")
        );

        for (key, value) in [("PREFIX", prior.0), ("DESTDIR", prior.1)] {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}
