//! Capture sessions.
//!
//! A `Session` owns everything one recording needs: the frame source (and so
//! the camera handle), the scheduler, the pipeline and the recorder. Settings
//! are fixed at construction; changing them means building a new session.
//!
//! The loop is synchronous. Cancellation is a flag polled once per
//! iteration, never an interrupt inside image processing. The source is
//! released when the session is dropped, on every exit path.
//!
//! `CaptureWorker` runs a session on a dedicated thread. The session is built
//! inside that thread so the device handle never crosses threads, and the
//! history is handed back only after the loop has finished.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::clock::{Clock, SharedClock};
use crate::config::SessionConfig;
use crate::frame::Frame;
use crate::ingest::{self, FrameSource};
use crate::pipeline::MotionPipeline;
use crate::record::{PositionHistory, PositionRecorder};
use crate::schedule::FrameScheduler;

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// What one call to [`Session::step`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// First frame captured; nothing to diff against yet.
    Primed,
    /// A sample with this many spots was recorded.
    Recorded(usize),
    /// The source has no more frames.
    Exhausted,
}

/// Why [`Session::run`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    Stopped,
    FrameLimit,
    SourceExhausted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    pub end: SessionEnd,
    pub frames_captured: u64,
    pub samples: usize,
    pub spots: usize,
    pub lag_events: u64,
    pub worst_overrun: Duration,
    pub elapsed: Duration,
}

pub struct Session {
    source: Box<dyn FrameSource>,
    scheduler: FrameScheduler<SharedClock>,
    pipeline: MotionPipeline,
    recorder: PositionRecorder,
    previous: Option<Frame>,
    max_frames: Option<u64>,
    frames_captured: u64,
    started_at: Duration,
}

impl Session {
    /// Open the configured source and assemble a session around it.
    pub fn open(config: &SessionConfig, clock: SharedClock) -> Result<Self> {
        let source = ingest::open_source(&config.source, clock.clone())?;
        let pipeline = MotionPipeline::new(&config.settings, config.diff_mode, config.extractor);
        Ok(Self::new(
            source,
            pipeline,
            config.settings.frame_interval(),
            config.max_frames,
            clock,
        ))
    }

    pub fn new(
        source: Box<dyn FrameSource>,
        pipeline: MotionPipeline,
        interval: Duration,
        max_frames: Option<u64>,
        clock: SharedClock,
    ) -> Self {
        let recorder = PositionRecorder::new(clock.epoch_origin());
        let started_at = clock.now();
        log::info!(
            "session: source={} extractor={} diff={:?} interval={:?}",
            source.name(),
            pipeline.extractor_name(),
            pipeline.diff_mode(),
            interval
        );
        Self {
            source,
            scheduler: FrameScheduler::new(clock, interval),
            pipeline,
            recorder,
            previous: None,
            max_frames,
            frames_captured: 0,
            started_at,
        }
    }

    /// One paced iteration: wait, capture, diff against the previous frame,
    /// record.
    pub fn step(&mut self) -> Result<Step> {
        self.scheduler.wait_until_next_deadline();

        let frame = match self.source.capture() {
            Ok(frame) => frame,
            Err(err) if ingest::is_exhausted(&err) => return Ok(Step::Exhausted),
            Err(err) => return Err(err.context(format!("capture from {}", self.source.name()))),
        };
        self.frames_captured += 1;

        let Some(previous) = self.previous.take() else {
            self.previous = Some(frame);
            return Ok(Step::Primed);
        };
        let processed = self.pipeline.process(&previous, &frame);
        self.previous = Some(frame);

        let sample = processed?;
        let spots = sample.spots.len();
        log::debug!("session: t={:?} spots={}", sample.time, spots);
        self.recorder.record(sample)?;
        Ok(Step::Recorded(spots))
    }

    /// Loop until `stop` is set, the frame limit is hit or the source runs
    /// dry. Capture and processing errors end the loop and propagate.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<SessionSummary> {
        let mut last_health_log = self.now();
        let end = loop {
            if stop.load(Ordering::SeqCst) {
                break SessionEnd::Stopped;
            }
            if self.max_frames.is_some_and(|max| self.frames_captured >= max) {
                break SessionEnd::FrameLimit;
            }
            if self.step()? == Step::Exhausted {
                break SessionEnd::SourceExhausted;
            }

            if self.now().saturating_sub(last_health_log) >= HEALTH_LOG_INTERVAL {
                let stats = self.source.stats();
                let sched = self.scheduler.stats();
                log::info!(
                    "session health: frames={} samples={} lag_events={} source={}",
                    stats.frames_captured,
                    self.recorder.history().len(),
                    sched.lag_events,
                    stats.source
                );
                last_health_log = self.now();
            }
        };

        let summary = self.summary(end);
        log::info!(
            "session finished ({:?}): {} frames, {} samples, {} spots, {} lag events (worst {:?})",
            summary.end,
            summary.frames_captured,
            summary.samples,
            summary.spots,
            summary.lag_events,
            summary.worst_overrun
        );
        Ok(summary)
    }

    pub fn summary(&self, end: SessionEnd) -> SessionSummary {
        let sched = self.scheduler.stats();
        let history = self.recorder.history();
        SessionSummary {
            end,
            frames_captured: self.frames_captured,
            samples: history.len(),
            spots: history.spot_count(),
            lag_events: sched.lag_events,
            worst_overrun: sched.worst_overrun,
            elapsed: self.now().saturating_sub(self.started_at),
        }
    }

    pub fn history(&self) -> &PositionHistory {
        self.recorder.history()
    }

    /// Finish the session, releasing the source.
    pub fn into_history(self) -> PositionHistory {
        log::info!("session: releasing source {}", self.source.name());
        self.recorder.into_history()
    }

    fn now(&self) -> Duration {
        self.scheduler.clock().now()
    }
}

// ---- Worker thread ----

/// Outcome of a session run on a [`CaptureWorker`].
#[derive(Debug)]
pub struct WorkerReport {
    pub summary: SessionSummary,
    pub history: PositionHistory,
}

/// A session running on its own thread.
#[derive(Debug)]
pub struct CaptureWorker {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<Result<WorkerReport>>>,
}

impl CaptureWorker {
    /// Build the session with `factory` on a new thread and run it.
    pub fn spawn<F>(factory: F) -> Result<Self>
    where
        F: FnOnce() -> Result<Session> + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = stop.clone();
        let join = std::thread::Builder::new()
            .name("cvrace-capture".to_string())
            .spawn(move || {
                let mut session = factory().context("build capture session")?;
                let summary = session.run(&stop_thread)?;
                Ok(WorkerReport {
                    summary,
                    history: session.into_history(),
                })
            })
            .context("spawn capture thread")?;
        Ok(Self {
            stop,
            join: Some(join),
        })
    }

    /// Shared cancellation flag, e.g. for a Ctrl-C handler.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, |join| join.is_finished())
    }

    /// Ask the loop to stop and wait for the history.
    pub fn stop_and_join(self) -> Result<WorkerReport> {
        self.stop.store(true, Ordering::SeqCst);
        self.join()
    }

    /// Wait for the loop to end on its own (frame limit or exhausted source).
    pub fn join(mut self) -> Result<WorkerReport> {
        let join = self
            .join
            .take()
            .ok_or_else(|| anyhow!("capture worker already joined"))?;
        join.join()
            .map_err(|_| anyhow!("capture thread panicked"))?
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::detect::ExtractorKind;
    use crate::diff::DiffMode;
    use crate::ingest::{SourceStats, SyntheticConfig, SyntheticSource};
    use crate::settings::Settings;

    struct FailingSource {
        after: u64,
        captured: u64,
        inner: SyntheticSource,
    }

    impl FrameSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        fn capture(&mut self) -> Result<Frame> {
            if self.captured == self.after {
                return Err(anyhow!("device unplugged"));
            }
            self.captured += 1;
            self.inner.capture()
        }

        fn stats(&self) -> SourceStats {
            self.inner.stats()
        }
    }

    fn synthetic(clock: &SharedClock) -> Result<SyntheticSource> {
        SyntheticSource::new(
            120,
            60,
            SyntheticConfig {
                square_size: 10,
                speed: 5,
                ..SyntheticConfig::default()
            },
            clock.clone(),
        )
    }

    fn session(source: Box<dyn FrameSource>, clock: SharedClock, max_frames: Option<u64>) -> Session {
        let settings = Settings::default();
        let pipeline = MotionPipeline::new(&settings, DiffMode::default(), ExtractorKind::Contour);
        Session::new(source, pipeline, settings.frame_interval(), max_frames, clock)
    }

    #[test]
    fn first_step_primes_then_records() -> Result<()> {
        let clock: SharedClock = Arc::new(ManualClock::new());
        let mut session = session(Box::new(synthetic(&clock)?), clock.clone(), None);

        assert_eq!(session.step()?, Step::Primed);
        assert_eq!(session.step()?, Step::Recorded(1));
        assert_eq!(session.history().len(), 1);
        // Frames at 0 ms and 250 ms.
        assert_eq!(session.history().samples()[0].time, Duration::from_millis(125));
        Ok(())
    }

    #[test]
    fn run_honours_frame_limit_and_pacing() -> Result<()> {
        let clock: SharedClock = Arc::new(ManualClock::new());
        let mut session = session(Box::new(synthetic(&clock)?), clock.clone(), Some(9));

        let summary = session.run(&AtomicBool::new(false))?;
        assert_eq!(summary.end, SessionEnd::FrameLimit);
        assert_eq!(summary.frames_captured, 9);
        assert_eq!(summary.samples, 8);
        assert_eq!(summary.lag_events, 0);
        // Ninth frame captured at 8 * 250 ms.
        assert_eq!(clock.now(), Duration::from_secs(2));

        let times: Vec<_> = session.history().samples().iter().map(|s| s.time).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
        Ok(())
    }

    #[test]
    fn stop_flag_is_checked_before_capturing() -> Result<()> {
        let clock: SharedClock = Arc::new(ManualClock::new());
        let mut session = session(Box::new(synthetic(&clock)?), clock, None);
        let summary = session.run(&AtomicBool::new(true))?;
        assert_eq!(summary.end, SessionEnd::Stopped);
        assert_eq!(summary.frames_captured, 0);
        Ok(())
    }

    #[test]
    fn capture_failure_propagates() -> Result<()> {
        let clock: SharedClock = Arc::new(ManualClock::new());
        let source = FailingSource {
            after: 3,
            captured: 0,
            inner: synthetic(&clock)?,
        };
        let mut session = session(Box::new(source), clock, None);
        let err = session.run(&AtomicBool::new(false)).unwrap_err();
        assert!(format!("{:#}", err).contains("device unplugged"));
        assert_eq!(session.history().len(), 2);
        Ok(())
    }
}
