use std::fmt::Display;

use colored::Colorize;
use log::Level;

/// External crates only need to log warnings and errors
const ALLOWED_EXTERNAL_LEVELS: [Level; 2] = [Level::Warn, Level::Error];
const ALLOWED_LEVELS: [Level; 3] = [Level::Info, Level::Warn, Level::Error];

pub fn init_logger() {
    fern::Dispatch::new()
        .format(move |out, message, record| {
            let target = Target::from_str(record.target());
            let now = chrono::Local::now();

            out.finish(format_args!(
                "{:^5} {} {:^8} {}",
                level_to_string(&record.level()),
                now.format("%H:%M:%S").to_string().bright_black(),
                target,
                message
            ))
        })
        .filter(|meta| {
            let target = Target::from_str(meta.target());

            let is_allowed = ALLOWED_LEVELS.contains(&meta.level());
            let is_severe = ALLOWED_EXTERNAL_LEVELS.contains(&meta.level());

            target.is_local() && is_allowed || is_severe
        })
        .chain(std::io::stdout())
        .apply()
        .expect("logging is initialized")
}

enum Target {
    External(String),
    Collab,
    Impls,
    Bootstrap,
}

impl Target {
    fn from_str(str: &str) -> Self {
        let mut split = str.split("::");
        let module = split.next().unwrap_or_default();

        match module {
            "parley" => Self::Bootstrap,
            "parley_collab" => Self::Collab,
            "parley_impls" => Self::Impls,
            other => Target::External(other.to_string()),
        }
    }

    fn is_local(&self) -> bool {
        !matches!(self, Self::External(_))
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Target::External(name) => name.as_str(),
            Target::Collab => "collab",
            Target::Impls => "impls",
            Target::Bootstrap => "parley",
        };

        write!(f, "{}", name.bright_black())
    }
}

fn level_to_string(level: &Level) -> String {
    match level {
        Level::Error => "ERROR".red().to_string(),
        Level::Warn => "WARN".yellow().to_string(),
        Level::Info => "INFO".green().to_string(),
        Level::Debug => "DEBUG".blue().to_string(),
        Level::Trace => "TRACE".purple().to_string(),
    }
}
