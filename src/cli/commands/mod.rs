pub mod outbox;
pub mod registration;

use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ArgAction, ArgMatches, ColorChoice, Command,
};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";

/// Log levels in increasing verbosity; the index is the `-v` count.
const LOG_LEVELS: [(&str, Level); 5] = [
    ("error", Level::ERROR),
    ("warn", Level::WARN),
    ("info", Level::INFO),
    ("debug", Level::DEBUG),
    ("trace", Level::TRACE),
];

/// Accept `SIGNUP_LOG_LEVEL` as a level name or as the equivalent `-v` count.
fn parse_log_level(value: &str) -> Result<u8, String> {
    let value = value.trim().to_ascii_lowercase();
    let index = LOG_LEVELS
        .iter()
        .position(|(name, _)| *name == value)
        .or_else(|| {
            value
                .parse::<usize>()
                .ok()
                .filter(|count| *count < LOG_LEVELS.len())
        });
    index
        .and_then(|index| u8::try_from(index).ok())
        .ok_or_else(|| format!("unknown log level '{value}', expected error, warn, info, debug, trace or 0-4"))
}

/// Tracing level selected by `-v` repetitions or `SIGNUP_LOG_LEVEL`.
#[must_use]
pub fn log_level(matches: &ArgMatches) -> Level {
    let count = matches.get_one::<u8>(ARG_VERBOSITY).copied().unwrap_or(0);
    let index = usize::from(count).min(LOG_LEVELS.len() - 1);
    LOG_LEVELS[index].1
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("signup")
        .about("Account registration and email confirmation")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("SIGNUP_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("dsn")
                .short('d')
                .long("dsn")
                .help("Database connection string")
                .env("SIGNUP_DSN")
                .required(true),
        );

    let command = registration::with_args(command);
    let command = outbox::with_args(command);
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Increase log output, repeat for more (-vvvv = trace)")
            .env("SIGNUP_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(ValueParser::new(parse_log_level)),
    )
}
