pub mod offset;
pub mod plan;

pub use offset::{cross_correlate, estimate, estimate_offset_ms};
pub use plan::{alignment_note, plan, EditOp};

/// Signed time offset of the secondary track relative to the primary, in milliseconds.
///
/// Positive means the secondary must be delayed, negative means its start must be
/// trimmed, zero means no edit.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Offset(f64);

impl Offset {
    pub const ZERO: Offset = Offset(0.0);

    pub fn from_millis(ms: f64) -> Self {
        Self(ms)
    }

    pub fn millis(&self) -> f64 {
        self.0
    }

    /// Magnitude at millisecond resolution (seconds rounded to three decimals).
    pub fn whole_millis(&self) -> u64 {
        self.0.abs().round() as u64
    }
}

impl std::fmt::Display for Offset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} ms", self.0)
    }
}
