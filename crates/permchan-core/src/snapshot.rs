//! Rendering the permanent channel set as a snapshot document.
//!
//! The document starts with [`SNAPSHOT_HEADER`] and holds one line per
//! permanent channel, in registry order:
//!
//! ```text
//! <permchannels channel="#help" topic="Ask here" modes="Pnt">
//! ```
//!
//! Inside each quoted field, `\` and `"` are escaped with a leading `\`.
//! The header ends by opening a compat-format config block, so the host's
//! configuration reader can include the file directly.
//!
//! # Line length
//!
//! Lines are bounded by [`LineLimit::max_bytes`] (newline included). When
//! the escaped fields would overflow it, the [`OverflowPolicy`] decides:
//! [`OverflowPolicy::Truncate`] fills the fields in order (name, topic,
//! modes) until the budget runs out and leaves the rest empty, never
//! splitting an escape pair or a UTF-8 code point;
//! [`OverflowPolicy::Skip`] drops the record. Both are logged. The quoting
//! and the closing `">` are always written in full, so no line is shorter
//! than [`LINE_OVERHEAD`].
//!
//! A truncated line always carries the full channel name. A record whose
//! name alone does not fit is dropped under either policy, since a line
//! without its name would recreate the wrong channel.

use serde::Deserialize;
use tracing::warn;

use crate::channel::Channel;
use crate::registry::ChannelRegistry;

/// Fixed comment header written at the top of every snapshot.
pub const SNAPSHOT_HEADER: &str = concat!(
    "# Permchannels DB\n",
    "# This file is autogenerated; any changes will be overwritten!\n",
    "<config format=\"compat\">\n",
);

/// Default bound on a single serialized line, in bytes.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024;

/// Text preceding each of the three quoted fields.
const FIELD_OPENERS: [&str; 3] = ["<permchannels channel=\"", "\" topic=\"", "\" modes=\""];

/// Text closing the last field and the line.
const LINE_CLOSER: &str = "\">\n";

/// Bytes of every line taken by the field openers and the closer.
pub const LINE_OVERHEAD: usize = 44;

/// What to do with a record whose line would exceed the bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Write a deterministically truncated line.
    #[default]
    Truncate,
    /// Leave the record out of the snapshot.
    Skip,
}

/// Bound and overflow policy for snapshot lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineLimit {
    /// Maximum line length in bytes, including the trailing newline.
    pub max_bytes: usize,
    /// Behaviour when a line would exceed `max_bytes`.
    pub overflow: OverflowPolicy,
}

impl Default for LineLimit {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_LINE_BYTES,
            overflow: OverflowPolicy::Truncate,
        }
    }
}

/// The persisted view of one permanent channel.
///
/// Built fresh from the live channel on every flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermanentRecord<'a> {
    /// Channel name.
    pub name: &'a str,
    /// Topic text.
    pub topic: &'a str,
    /// Canonical mode string.
    pub modes: String,
}

impl<'a> PermanentRecord<'a> {
    /// Capture the persisted fields of a channel.
    pub fn from_channel(channel: &'a Channel) -> Self {
        Self {
            name: channel.name(),
            topic: &channel.topic().text,
            modes: channel.modes().render(),
        }
    }
}

/// A rendered snapshot line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedLine {
    /// The line fit within the bound.
    Complete(String),
    /// The line was cut down to fit.
    Truncated(String),
    /// The line did not fit and was dropped.
    Skipped,
}

/// A complete snapshot document and what went into it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Full file contents, header included.
    pub contents: String,
    /// Number of record lines written.
    pub records: usize,
    /// Number of written lines that were truncated.
    pub truncated: usize,
    /// Number of records left out by [`OverflowPolicy::Skip`].
    pub skipped: usize,
}

/// Escape `\` and `"` with a leading backslash.
///
/// ```
/// use permchan_core::snapshot::escape;
///
/// assert_eq!(escape(r#"say "hi" \o/"#), r#"say \"hi\" \\o/"#);
/// ```
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut budget = usize::MAX;
    push_escaped(&mut out, value, &mut budget);
    out
}

/// Append the escaped form of `value` while it fits in `budget` bytes.
///
/// Returns `false` if `value` had to be cut short.
fn push_escaped(out: &mut String, value: &str, budget: &mut usize) -> bool {
    for ch in value.chars() {
        let needs_escape = ch == '\\' || ch == '"';
        let cost = ch.len_utf8().saturating_add(usize::from(needs_escape));
        if cost > *budget {
            return false;
        }
        *budget = budget.saturating_sub(cost);
        if needs_escape {
            out.push('\\');
        }
        out.push(ch);
    }
    true
}

/// Render one record as a snapshot line under the given limit.
///
/// Returns [`RenderedLine::Skipped`] under either policy when the escaped
/// name does not fit in `limit.max_bytes`.
pub fn render_line(record: &PermanentRecord<'_>, limit: LineLimit) -> RenderedLine {
    if limit.max_bytes < LINE_OVERHEAD {
        return RenderedLine::Skipped;
    }
    let mut budget = limit.max_bytes.saturating_sub(LINE_OVERHEAD);

    let mut name = String::with_capacity(record.name.len());
    if !push_escaped(&mut name, record.name, &mut budget) {
        return RenderedLine::Skipped;
    }

    let mut line = String::with_capacity(
        LINE_OVERHEAD
            .saturating_add(name.len())
            .saturating_add(record.topic.len())
            .saturating_add(record.modes.len()),
    );
    let [channel_opener, topic_opener, modes_opener] = FIELD_OPENERS;
    line.push_str(channel_opener);
    line.push_str(&name);
    line.push_str(topic_opener);
    let mut complete = push_escaped(&mut line, record.topic, &mut budget);
    line.push_str(modes_opener);
    if complete {
        complete = push_escaped(&mut line, &record.modes, &mut budget);
    }
    line.push_str(LINE_CLOSER);

    match (complete, limit.overflow) {
        (true, _) => RenderedLine::Complete(line),
        (false, OverflowPolicy::Truncate) => RenderedLine::Truncated(line),
        (false, OverflowPolicy::Skip) => RenderedLine::Skipped,
    }
}

/// Render every permanent channel in the registry into a snapshot.
pub fn render(registry: &dyn ChannelRegistry, limit: LineLimit) -> Snapshot {
    let mut snapshot = Snapshot {
        contents: SNAPSHOT_HEADER.to_owned(),
        ..Snapshot::default()
    };

    for channel in registry.channels().filter(|c| c.is_permanent()) {
        let record = PermanentRecord::from_channel(channel);
        match render_line(&record, limit) {
            RenderedLine::Complete(line) => {
                snapshot.contents.push_str(&line);
                snapshot.records = snapshot.records.saturating_add(1);
            }
            RenderedLine::Truncated(line) => {
                warn!(
                    channel = record.name,
                    max_line_bytes = limit.max_bytes,
                    "Permanent channel line truncated in snapshot"
                );
                snapshot.contents.push_str(&line);
                snapshot.records = snapshot.records.saturating_add(1);
                snapshot.truncated = snapshot.truncated.saturating_add(1);
            }
            RenderedLine::Skipped => {
                if limit.overflow == OverflowPolicy::Truncate {
                    warn!(
                        channel = record.name,
                        max_line_bytes = limit.max_bytes,
                        "Permanent channel left out of snapshot: name does not fit"
                    );
                } else {
                    warn!(
                        channel = record.name,
                        max_line_bytes = limit.max_bytes,
                        "Permanent channel left out of snapshot: line too long"
                    );
                }
                snapshot.skipped = snapshot.skipped.saturating_add(1);
            }
        }
    }
    snapshot
}
