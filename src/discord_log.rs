//! tracing layer that mirrors log lines into a Discord channel.
//!
//! WARN and ERROR go out as soon as they arrive. INFO lines are collected and
//! posted together, every few seconds or once enough have piled up.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use serenity::http::Http;
use serenity::model::id::ChannelId;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// Discord rejects messages longer than this.
const MAX_MESSAGE_CHARS: usize = 2000;

const FLUSH_EVERY: Duration = Duration::from_secs(5);

/// Buffered INFO lines that force an early flush.
const FLUSH_AT_LINES: usize = 50;

struct LogLine {
    urgent: bool,
    text: String,
}

/// INFO lines waiting to be posted.
#[derive(Default)]
struct Batch {
    lines: Vec<String>,
}

impl Batch {
    /// Queue a line. Returns true once the batch should be flushed.
    fn push(&mut self, line: String) -> bool {
        self.lines.push(line);
        self.lines.len() >= FLUSH_AT_LINES
    }

    /// Drain the batch into messages that each fit in one Discord post.
    fn drain(&mut self) -> Vec<String> {
        let lines = std::mem::take(&mut self.lines);
        pack_lines(lines.iter().map(|l| clamp_line(l)))
    }
}

/// Greedily join lines with newlines without crossing the message limit.
fn pack_lines(lines: impl Iterator<Item = String>) -> Vec<String> {
    let mut messages = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for line in lines {
        let line_chars = line.chars().count();
        let needed = if current.is_empty() { line_chars } else { line_chars + 1 };
        if current_chars + needed > MAX_MESSAGE_CHARS && !current.is_empty() {
            messages.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        if !current.is_empty() {
            current.push('\n');
            current_chars += 1;
        }
        current.push_str(&line);
        current_chars += line_chars;
    }
    if !current.is_empty() {
        messages.push(current);
    }
    messages
}

/// Cut a single line down to one Discord message.
fn clamp_line(text: &str) -> String {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(MAX_MESSAGE_CHARS - 3).collect();
    cut.push_str("...");
    cut
}

async fn post(http: &Arc<Http>, channel: ChannelId, text: String) {
    if let Err(e) = channel.say(http, text).await {
        eprintln!("Discord log channel {channel}: {e}");
    }
}

async fn post_batch(http: &Arc<Http>, channel: ChannelId, batch: &mut Batch) {
    for message in batch.drain() {
        post(http, channel, message).await;
    }
}

/// Forward queued lines until every sender is gone, then flush what is left.
async fn forward(http: Arc<Http>, channel: ChannelId, mut rx: mpsc::UnboundedReceiver<LogLine>) {
    let mut batch = Batch::default();
    let mut ticker = tokio::time::interval(FLUSH_EVERY);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            line = rx.recv() => match line {
                Some(LogLine { urgent: true, text }) => post(&http, channel, clamp_line(&text)).await,
                Some(LogLine { urgent: false, text }) => {
                    if batch.push(text) {
                        post_batch(&http, channel, &mut batch).await;
                    }
                }
                None => break,
            },
            _ = ticker.tick() => post_batch(&http, channel, &mut batch).await,
        }
    }
    post_batch(&http, channel, &mut batch).await;
}

/// Renders an event's fields as `message key=value ...`.
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn finish(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }

    fn push_field(&mut self, name: &str, value: &dyn std::fmt::Display) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{name}={value}");
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push_field(field.name(), &value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.push_field(field.name(), &format_args!("{value:?}"));
        }
    }
}

pub struct DiscordLogLayer {
    tx: mpsc::UnboundedSender<LogLine>,
}

impl DiscordLogLayer {
    /// Spawns the forwarding task; must be called inside a tokio runtime.
    pub fn new(http: Arc<Http>, channel_id: u64) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(forward(http, ChannelId::new(channel_id), rx));
        Self { tx }
    }
}

impl<S: Subscriber> Layer<S> for DiscordLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() > Level::INFO {
            return;
        }
        // serenity logs its own HTTP calls, including the ones made here
        if meta.target().starts_with("serenity") {
            return;
        }

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        let body = visitor.finish();

        let line = match *meta.level() {
            Level::ERROR => LogLine { urgent: true, text: format!("❌ `{}` {body}", meta.target()) },
            Level::WARN => LogLine { urgent: true, text: format!("⚠️ `{}` {body}", meta.target()) },
            _ => LogLine { urgent: false, text: body },
        };
        if self.tx.send(line).is_err() {
            eprintln!("Discord log forwarder stopped, line dropped");
        }
    }
}
