// Tracing setup shared by all binaries: console output, optional JSON log file,
// and busy/idle timing for spans declared with `timed = true`.
use std::env;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::field::{Field, Visit};
use tracing::{Id, Subscriber, debug, span};
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Context, Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

// Keeps the non-blocking file writer alive for the lifetime of the process.
static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

const CRATE_TARGET: &str = "spimex_trades";

pub fn init_logging(bin_name: String) -> eyre::Result<()> {
    let console_log_level = env::var("CONSOLE_LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string());
    let file_log_level = env::var("FILE_LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string());
    let log_to_file = env::var("LOG_TO_FILE").map(|v| v == "true").unwrap_or(false);

    // Other crates stay at "warn"; binaries log under their own target too.
    let bin_target = bin_name.replace('-', "_");
    let console_filter = crate_filter(&console_log_level, &bin_target);
    let file_filter = crate_filter(&file_log_level, &bin_target);

    let console_layer = fmt::Layer::new().pretty().with_filter(console_filter);

    if log_to_file {
        let timestamp = chrono::Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        let log_dir = Path::new("logs");
        fs::create_dir_all(log_dir)?;
        let file_appender =
            tracing_appender::rolling::never(log_dir, format!("{bin_name}_{timestamp}.log"));
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        FILE_GUARD.set(guard).ok();

        let file_layer = fmt::Layer::new()
            .json()
            .with_writer(non_blocking)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_filter(file_filter);

        tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .with(SpanTimingLayer)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(console_layer)
            .with(SpanTimingLayer)
            .try_init()?;
    }
    Ok(())
}

fn crate_filter(level: &str, bin_target: &str) -> EnvFilter {
    EnvFilter::try_new(format!("warn,{CRATE_TARGET}={level},{bin_target}={level}"))
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,{CRATE_TARGET}=info")))
}

/// Logs how long a span was busy (entered) and idle (alive, not entered).
/// Only spans carrying a `timed = true` field are tracked.
struct SpanTimingLayer;

struct SpanTimings {
    opened: Instant,
    last_transition: Instant,
    busy: Duration,
    idle: Duration,
}

struct TimedFieldVisitor {
    timed: bool,
}

impl Visit for TimedFieldVisitor {
    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == "timed" {
            self.timed = value;
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn std::fmt::Debug) {}
}

impl<S> Layer<S> for SpanTimingLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = TimedFieldVisitor { timed: false };
        attrs.record(&mut visitor);
        if !visitor.timed {
            return;
        }
        if let Some(span) = ctx.span(id) {
            let now = Instant::now();
            span.extensions_mut().insert(SpanTimings {
                opened: now,
                last_transition: now,
                busy: Duration::ZERO,
                idle: Duration::ZERO,
            });
        }
    }

    fn on_enter(&self, id: &Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            if let Some(timings) = span.extensions_mut().get_mut::<SpanTimings>() {
                timings.idle += timings.last_transition.elapsed();
                timings.last_transition = Instant::now();
            }
        }
    }

    fn on_exit(&self, id: &Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            if let Some(timings) = span.extensions_mut().get_mut::<SpanTimings>() {
                timings.busy += timings.last_transition.elapsed();
                timings.last_transition = Instant::now();
            }
        }
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(&id) {
            let timings = span.extensions_mut().remove::<SpanTimings>();
            if let Some(timings) = timings {
                debug!(
                    span = span.name(),
                    busy_time = ?timings.busy,
                    idle_time = ?timings.idle,
                    total_time = ?timings.opened.elapsed(),
                    "span closed"
                );
            }
        }
    }
}
