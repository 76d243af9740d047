use super::Offset;

/// Edit applied to the secondary audio before remux.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    /// Insert this many milliseconds of silence at the start.
    DelayBy(u64),
    /// Drop this many milliseconds from the start.
    TrimFrom(u64),
    /// Re-encode only.
    NoOp,
}

impl EditOp {
    /// Trim start as an ffmpeg seek argument, e.g. `0.250`.
    pub fn trim_seconds_arg(ms: u64) -> String {
        format!("{}.{:03}", ms / 1000, ms % 1000)
    }
}

impl std::fmt::Display for EditOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditOp::DelayBy(ms) => write!(f, "delay by {ms} ms"),
            EditOp::TrimFrom(ms) => write!(f, "trim first {ms} ms"),
            EditOp::NoOp => write!(f, "no edit"),
        }
    }
}

/// Turn an offset into the edit that cancels it.
///
/// The magnitude is rounded once here; everything downstream uses the rounded value.
pub fn plan(offset: Offset) -> EditOp {
    let ms = offset.whole_millis();
    if ms == 0 {
        EditOp::NoOp
    } else if offset.millis() > 0.0 {
        EditOp::DelayBy(ms)
    } else {
        EditOp::TrimFrom(ms)
    }
}

/// Human-readable summary for the chosen edit.
pub fn alignment_note(offset: Offset, edit: EditOp) -> String {
    match edit {
        EditOp::DelayBy(_) => format!(
            "🔁 Secondary audio lags primary by {:.2} ms",
            offset.millis().abs()
        ),
        EditOp::TrimFrom(_) => format!(
            "🔁 Secondary audio leads primary by {:.2} ms",
            offset.millis().abs()
        ),
        EditOp::NoOp => "✅ Secondary audio is perfectly aligned".to_string(),
    }
}
