use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

mod add_command;
mod console;
mod datetime;
mod derivation;
mod record;
mod session;
mod settings;
mod sink;
mod spreadsheet;
mod statistics;
mod text_sink;
mod viewer;

use add_command::{AddArgs, AddCommand};
use console::{ConsolePresenter, ConsoleText};
use session::Session;
use settings::{default_settings_path, Settings};
use statistics::{compute_statistics, StatisticsColumns};
use text_sink::read_last_lines;
use viewer::{open_journal_file, SystemViewer};

/// 日々のタスクをテキストとスプレッドシートに記録するためのCLIアプリケーション。
///
/// # Examples
/// ```
/// $ cargo run -- session
/// $ cargo run -- add -m "Отчёт за неделю" -k У -x 3
/// $ cargo run -- stats --days 7
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    #[clap(long = "config", help = "Path to the settings file", parse(from_os_str))]
    config: Option<PathBuf>,

    #[clap(short = 'v', long = "verbose", help = "Show debug logs")]
    verbose: bool,

    #[clap(subcommand)]
    subcommand: SubCommands,
}

/// サブコマンドを表す列挙型。
#[derive(Debug, Subcommand)]
enum SubCommands {
    /// Edit records interactively and save them
    Session,
    /// Save a single record
    Add(AddArgs),
    /// Show statistics for the most recent days
    Stats {
        #[clap(short = 'd', long = "days", help = "Number of days to show (1-30)")]
        days: Option<u32>,
    },
    /// Show the last lines of the text log
    Recent {
        #[clap(short = 'c', long = "count", help = "Number of lines to show (1-50)")]
        count: Option<u32>,
    },
    /// Open the text log or the spreadsheet with the default application
    Open {
        #[clap(arg_enum)]
        target: OpenTarget,
    },
    /// Show or change settings
    #[clap(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Clone, Copy, Debug, clap::ArgEnum)]
enum OpenTarget {
    Text,
    Sheet,
}

#[derive(Debug, Subcommand)]
enum SettingsCommand {
    /// Print the current settings
    Show,
    /// Print the settings file path
    Path,
    /// Change a single setting
    Set { key: String, value: String },
}

fn main() -> Result<()> {
    let args = Args::parse();

    setup_logger(args.verbose)?;

    let settings_path = args.config.unwrap_or_else(default_settings_path);
    let mut settings = Settings::load(&settings_path);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match args.subcommand {
        SubCommands::Session => {
            let stdin = io::stdin();
            Session::new(&settings).run(stdin.lock(), &mut out)?;
        }
        SubCommands::Add(add) => AddCommand::new(&settings).run(add, &mut out)?,
        SubCommands::Stats { days } => {
            if let Some(days) = days {
                settings.set_stats_days(days);
            }
            let path = Path::new(settings.excel_path.trim());
            let result = compute_statistics(Some(path), StatisticsColumns::default());
            ConsoleText::new(&mut out, settings.difficulty_style)
                .show_statistics(&result, settings.stats_days() as usize)?;
        }
        SubCommands::Recent { count } => {
            if let Some(count) = count {
                settings.set_recent_count(count);
            }
            let lines = read_last_lines(
                Path::new(settings.txt_path.trim()),
                settings.recent_count() as usize,
            );
            ConsoleText::new(&mut out, settings.difficulty_style).show_recent(&lines)?;
        }
        SubCommands::Open { target } => {
            let path = match target {
                OpenTarget::Text => &settings.txt_path,
                OpenTarget::Sheet => &settings.excel_path,
            };
            open_journal_file(&SystemViewer, path)?;
        }
        SubCommands::Settings(command) => match command {
            SettingsCommand::Show => {
                let raw = toml::to_string_pretty(&settings).context("Failed to serialize settings")?;
                write!(out, "{}", raw).context("Failed to write settings")?;
            }
            SettingsCommand::Path => {
                writeln!(out, "{}", settings_path.display()).context("Failed to write path")?;
            }
            SettingsCommand::Set { key, value } => {
                settings.set(&key, &value)?;
                settings.save(&settings_path)?;
            }
        },
    }

    Ok(())
}

/// ログの出力を設定する。
///
/// `verbose`が`true`の場合はDebugレベルまで出力する。
fn setup_logger(verbose: bool) -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue);
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for("umya_spreadsheet", LevelFilter::Warn)
        .chain(io::stderr())
        .apply()
        .context("Failed to initialize logger")?;

    Ok(())
}
