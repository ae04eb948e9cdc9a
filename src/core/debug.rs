/// Debug Countdown Module
///
/// A stateful toggle for verbose statement tracing. Tracing can be switched
/// on or off outright, switched on for the next `n` calls, or held off for
/// `n` calls and then switched on for a window. The session advances the
/// countdown once per completed batch.
///
/// Lines are grouped into blocks. A line is a self-contained block when a
/// transaction is active, the connection is persistent or the caller asks
/// for it; otherwise the caller's hint decides whether the line opens or
/// closes a block shared with neighbouring lines. Overlapping transactional
/// and per-call traffic can therefore produce blocks that open without
/// closing; sinks must tolerate that.
use chrono::Local;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Current debug state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugState {
    #[default]
    Disabled,
    Enabled,
    /// Enabled for this many more calls, including the current one.
    EnabledFor(u32),
    /// Disabled for `remaining` more calls, then enabled for `then` calls.
    DisabledFor { remaining: u32, then: u32 },
}

/// A requested debug configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSetting {
    Enabled,
    Disabled,
    /// Enable for exactly this many calls.
    For(u32),
    /// Disable for `skip` calls, then enable for `then` calls (one when unset).
    After { skip: u32, then: Option<u32> },
}

impl DebugSetting {
    /// Interprets a signed call count: positive enables for that many calls,
    /// negative disables for that many calls and then enables for `and_then`
    /// calls, zero disables.
    pub fn from_count(count: i64, and_then: Option<i64>) -> Self {
        let clamp = |n: i64| u32::try_from(n.unsigned_abs()).unwrap_or(u32::MAX);
        match count {
            0 => DebugSetting::Disabled,
            n if n > 0 => DebugSetting::For(clamp(n)),
            n => DebugSetting::After {
                skip: clamp(n),
                then: and_then.filter(|t| *t > 0).map(clamp),
            },
        }
    }
}

impl From<bool> for DebugSetting {
    fn from(on: bool) -> Self {
        if on {
            DebugSetting::Enabled
        } else {
            DebugSetting::Disabled
        }
    }
}

/// Caller hint for how a line relates to its neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockHint {
    #[default]
    None,
    Wrap,
    Open,
    Close,
}

/// Resolved position of a line within a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Standalone,
    Opens,
    Continues,
    Closes,
}

/// Connection context consulted when framing a line.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmitContext {
    pub transaction_active: bool,
    pub persistent: bool,
}

/// Decides the framing of a line.
pub fn framing(hint: BlockHint, context: EmitContext) -> Framing {
    if context.transaction_active || context.persistent || hint == BlockHint::Wrap {
        return Framing::Standalone;
    }
    match hint {
        BlockHint::Open => Framing::Opens,
        BlockHint::Close => Framing::Closes,
        _ => Framing::Continues,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugLine {
    pub timestamp: String,
    pub text: String,
    pub framing: Framing,
}

/// Destination for debug lines.
pub trait DebugSink {
    fn emit(&mut self, line: &DebugLine);
}

/// Forwards lines to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DebugSink for TracingSink {
    fn emit(&mut self, line: &DebugLine) {
        debug!(framing = ?line.framing, "{} {}", line.timestamp, line.text);
    }
}

/// Renders lines as text blocks on any writer.
#[derive(Debug)]
pub struct WriterSink<W: Write> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        WriterSink { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> DebugSink for WriterSink<W> {
    fn emit(&mut self, line: &DebugLine) {
        let log = format!("{} {}", line.timestamp, line.text);
        let rendered = match line.framing {
            Framing::Standalone => format!(">>> {}\n<<<\n\n", log),
            Framing::Opens => format!(">>> {}\n", log),
            Framing::Continues => format!("    {}\n", log),
            Framing::Closes => format!("    {}\n<<<\n\n", log),
        };
        // A debug sink never fails the statement it describes
        let _ = self.writer.write_all(rendered.as_bytes());
    }
}

/// Collects lines in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<DebugLine>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<DebugLine> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn texts(&self) -> Vec<String> {
        self.lines().into_iter().map(|l| l.text).collect()
    }
}

impl DebugSink for MemorySink {
    fn emit(&mut self, line: &DebugLine) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.clone());
        }
    }
}

/// The debug countdown state machine plus its sink.
pub struct DebugController {
    state: DebugState,
    sink: Box<dyn DebugSink>,
}

impl std::fmt::Debug for DebugController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugController").field("state", &self.state).finish()
    }
}

impl Default for DebugController {
    fn default() -> Self {
        DebugController::new(Box::new(TracingSink))
    }
}

impl DebugController {
    pub fn new(sink: Box<dyn DebugSink>) -> Self {
        DebugController {
            state: DebugState::Disabled,
            sink,
        }
    }

    pub fn set_sink(&mut self, sink: Box<dyn DebugSink>) {
        self.sink = sink;
    }

    pub fn state(&self) -> DebugState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.state, DebugState::Enabled | DebugState::EnabledFor(_))
    }

    pub fn configure(&mut self, setting: DebugSetting) {
        self.state = match setting {
            DebugSetting::Enabled => DebugState::Enabled,
            DebugSetting::Disabled | DebugSetting::For(0) => DebugState::Disabled,
            DebugSetting::For(n) => DebugState::EnabledFor(n),
            DebugSetting::After { skip: 0, then } => DebugState::EnabledFor(then.unwrap_or(1).max(1)),
            DebugSetting::After { skip, then } => DebugState::DisabledFor {
                remaining: skip,
                then: then.unwrap_or(1).max(1),
            },
        };
    }

    /// Advances the countdown after a completed batch.
    pub fn tick(&mut self) {
        self.state = match self.state {
            DebugState::EnabledFor(n) if n <= 1 => DebugState::Disabled,
            DebugState::EnabledFor(n) => DebugState::EnabledFor(n - 1),
            DebugState::DisabledFor { remaining, then } if remaining <= 1 => DebugState::EnabledFor(then),
            DebugState::DisabledFor { remaining, then } => DebugState::DisabledFor {
                remaining: remaining - 1,
                then,
            },
            other => other,
        };
    }

    /// Writes a timestamped line when debugging is enabled.
    pub fn emit(&mut self, text: &str, hint: BlockHint, context: EmitContext) {
        if !self.is_enabled() {
            return;
        }
        let line = DebugLine {
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            text: text.to_string(),
            framing: framing(hint, context),
        };
        self.sink.emit(&line);
    }
}
