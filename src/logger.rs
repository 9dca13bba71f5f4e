use core::fmt::Display;
use log::{Level, LevelFilter, Log};
use owo_colors::OwoColorize;
use std::io::{self, IsTerminal, Write};

struct CliLogger {
    colored: bool,
}

static LOGGER: std::sync::OnceLock<CliLogger> = std::sync::OnceLock::new();

impl CliLogger {
    fn write_with_color(
        &self,
        out: &mut impl Write,
        color: Color,
        string: impl Display,
    ) -> io::Result<()> {
        if !self.colored {
            return write!(out, "{string}");
        }
        let string: &dyn Display = match color {
            Color::Default => &string,
            Color::Gray => &string.dimmed(),
            Color::BrightRed => &string.bright_red(),
            Color::BrightYellow => &string.bright_yellow(),
            Color::BrightBlue => &string.bright_blue(),
            Color::BrightCyan => &string.bright_cyan(),
            Color::BrightMagenta => &string.bright_magenta(),
        };
        write!(out, "{string}")
    }

    fn write_record(&self, out: &mut impl Write, record: &log::Record) -> io::Result<()> {
        let level = record.level();
        self.write_with_color(
            out,
            match level {
                Level::Error => Color::BrightRed,
                Level::Warn => Color::BrightYellow,
                Level::Info => Color::BrightBlue,
                Level::Debug => Color::BrightCyan,
                Level::Trace => Color::BrightMagenta,
            },
            format_args!("{level:5} "),
        )?;
        if level >= Level::Debug {
            self.write_with_color(out, Color::Gray, format_args!("[{}] ", record.target()))?;
        }
        self.write_with_color(out, Color::Default, record.args())?;
        self.write_with_color(out, Color::Default, "\n")
    }
}

impl Log for CliLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // A failed write to stderr has nowhere to be reported.
        self.write_record(&mut io::stderr().lock(), record).ok();
    }

    fn flush(&self) {
        io::stderr().flush().ok();
    }
}

/// Installs the stderr logger. Colors are only used when stderr is a terminal.
pub fn init(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    let logger = LOGGER.get_or_init(|| CliLogger {
        colored: io::stderr().is_terminal(),
    });
    log::set_max_level(level);
    log::set_logger(logger)
}

enum Color {
    Default,
    Gray,
    BrightRed,
    BrightYellow,
    BrightBlue,
    BrightCyan,
    BrightMagenta,
}
