//! Render scheduling for interactive edits.
//!
//! Rendering is synchronous on the caller's thread, so "cancellation" is
//! coalescing: a newer submit replaces a pending, not-yet-polled request.
//! The caller pumps [`RenderScheduler::poll`] from its event loop; while
//! input keeps arriving it gets at most one `Fast` render per frame
//! interval, and once input goes quiet it gets exactly one trailing `Final`
//! render to replace the last fast one.

use std::time::{Duration, Instant};

use crate::compositor::{CanvasSpec, Fidelity};
use crate::mode::ModeFlags;

/// One display refresh at 60 Hz.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);
/// How long input must stay quiet before the trailing final render.
pub const QUIET_PERIOD: Duration = Duration::from_millis(200);

/// What the caller should render next.  `seq` increases with every issued
/// render; applying surfaces only when `seq` advances makes stale overwrites
/// impossible.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduledRender {
    pub canvas: CanvasSpec,
    pub flags: ModeFlags,
    pub fidelity: Fidelity,
    pub seq: u64,
}

#[derive(Clone, Copy, Debug)]
struct PendingInput {
    canvas: CanvasSpec,
    flags: ModeFlags,
    at: Instant,
}

/// Coalescing debounce for preview renders.  Owned by the caller's event
/// loop; the engine never spins a timer of its own.
pub struct RenderScheduler {
    frame_interval: Duration,
    quiet_period: Duration,
    pending: Option<PendingInput>,
    latest: Option<PendingInput>,
    last_fast: Option<Instant>,
    needs_final: bool,
    issued: u64,
}

impl Default for RenderScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderScheduler {
    pub fn new() -> Self {
        Self::with_intervals(FRAME_INTERVAL, QUIET_PERIOD)
    }

    pub fn with_intervals(frame_interval: Duration, quiet_period: Duration) -> Self {
        Self {
            frame_interval,
            quiet_period,
            pending: None,
            latest: None,
            last_fast: None,
            needs_final: false,
            issued: 0,
        }
    }

    /// Record the newest input parameters.  Supersedes any pending request.
    pub fn submit(&mut self, canvas: CanvasSpec, flags: ModeFlags, now: Instant) {
        let input = PendingInput { canvas, flags, at: now };
        self.pending = Some(input);
        self.latest = Some(input);
        self.needs_final = true;
    }

    /// Next render to run, if any.  Call once per event-loop turn.
    pub fn poll(&mut self, now: Instant) -> Option<ScheduledRender> {
        if let Some(input) = self.pending {
            let due = match self.last_fast {
                None => true,
                Some(t) => now.duration_since(t) >= self.frame_interval,
            };
            if due {
                self.pending = None;
                self.last_fast = Some(now);
                self.issued += 1;
                return Some(ScheduledRender {
                    canvas: input.canvas,
                    flags: input.flags,
                    fidelity: Fidelity::Fast,
                    seq: self.issued,
                });
            }
            return None;
        }

        if self.needs_final
            && let Some(input) = self.latest
            && now.duration_since(input.at) >= self.quiet_period
        {
            self.needs_final = false;
            self.issued += 1;
            return Some(ScheduledRender {
                canvas: input.canvas,
                flags: input.flags,
                fidelity: Fidelity::Final,
                seq: self.issued,
            });
        }

        None
    }

    /// Whether a render (fast or trailing final) is still owed.
    pub fn is_idle(&self) -> bool {
        self.pending.is_none() && !self.needs_final
    }
}
