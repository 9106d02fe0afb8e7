use anyhow::{Context, Result};
use chrono::Local;
use nu_ansi_term::{Color, Style};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields, FormattedFields},
    prelude::*,
    registry::LookupSpan,
    EnvFilter, Layer,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Directory for the hourly rolling log files. `None` disables file logging.
    #[serde(default = "default_log_dir")]
    pub log_dir: Option<String>,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_log_dir() -> Option<String> {
    Some("logs".to_string())
}

fn default_file_prefix() -> String {
    "app".to_string()
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            file_prefix: default_file_prefix(),
            level: default_level(),
        }
    }
}

/// Flush guards for the background writers. Must be kept alive by the caller.
pub struct LoggerGuards {
    _console: WorkerGuard,
    _file: Option<WorkerGuard>,
}

/// Installs the global subscriber.
///
/// Console output goes through a single non-blocking writer thread, so lines
/// emitted by concurrent accounts are never interleaved mid-line.
pub fn setup_logger(config: &LoggerConfig) -> Result<LoggerGuards> {
    let (console_writer, console_guard) = tracing_appender::non_blocking(std::io::stdout());

    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(console_writer)
        .with_ansi(true)
        .event_format(TerminalFormatter)
        .with_filter(console_filter);

    let (file_layer, file_guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir))?;
            let file_appender = tracing_appender::rolling::hourly(dir, &config.file_prefix);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // File keeps INFO and above regardless of the console filter
            let file_filter = tracing_subscriber::filter::Targets::new()
                .with_default(Level::INFO);

            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .event_format(FileFormatter)
                .with_filter(file_filter);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to set global subscriber")?;

    Ok(LoggerGuards {
        _console: console_guard,
        _file: file_guard,
    })
}

// --- Formatters ---

struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

fn event_message(event: &Event<'_>) -> String {
    let mut visitor = MessageVisitor {
        message: String::new(),
    };
    event.record(&mut visitor);
    visitor.message
}

/// Writes `[id=001] ` for every span in scope that carries fields.
fn write_span_fields<S, N>(ctx: &FmtContext<'_, S, N>, writer: &mut Writer<'_>) -> fmt::Result
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    if let Some(scope) = ctx.event_scope() {
        for span in scope.from_root() {
            let ext = span.extensions();
            if let Some(fields) = ext.get::<FormattedFields<N>>() {
                if !fields.is_empty() {
                    write!(writer, "[{}] ", fields)?;
                }
            }
        }
    }
    Ok(())
}

pub struct TerminalFormatter;

impl<S, N> FormatEvent<S, N> for TerminalFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let level = *event.metadata().level();
        let level_style = match level {
            Level::ERROR => Style::new().fg(Color::LightRed).bold(),
            Level::WARN => Style::new().fg(Color::Yellow),
            Level::INFO => Style::new().fg(Color::LightBlue),
            _ => Style::new().dimmed(),
        };

        write!(
            writer,
            "{} {} ",
            Style::new().dimmed().paint(Local::now().format("%H:%M:%S").to_string()),
            level_style.paint(format!("{:<5}", level.as_str()))
        )?;
        write_span_fields(ctx, &mut writer)?;

        let msg = event_message(event);

        // Colorization for SUCCESS and FAILED
        let colored_msg = if msg.contains("SUCCESS") || msg.contains("Success") {
            let green_text = Style::new().fg(Color::LightGreen).bold();
            msg.replace("SUCCESS", &format!("{}", green_text.paint("SUCCESS")))
                .replace("Success", &format!("{}", green_text.paint("Success")))
        } else if msg.contains("FAILED") || msg.contains("Failed") {
            let red_text = Style::new().fg(Color::LightRed).bold();
            msg.replace("FAILED", &format!("{}", red_text.paint("FAILED")))
                .replace("Failed", &format!("{}", red_text.paint("Failed")))
        } else {
            msg
        };

        writeln!(writer, "{}", colored_msg)
    }
}

pub struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let level = event.metadata().level();

        write!(writer, "{} [{}] ", timestamp, level)?;
        write_span_fields(ctx, &mut writer)?;
        writeln!(writer, "{}", event_message(event))
    }
}
