//! Background capture loop
//!
//! Acquires a live source once, then every [`CAPTURE_INTERVAL`] reads a frame,
//! runs the pipeline and replaces the stored result. Frame acquisition and
//! inference run on the blocking pool. Cancellation is honoured at the
//! inter-cycle sleep; an in-flight cycle always completes.

use std::sync::Arc;
use std::time::Duration;

use camera_capture::{CaptureError, FrameSource};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{ResultWriter, StressPipeline, StressResult};

/// Delay between two capture cycles
pub const CAPTURE_INTERVAL: Duration = Duration::from_secs(2);

/// Capture loop lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureState {
    /// Opening the live source
    Starting,
    /// Producing results
    Running,
    /// Source could not be opened or stopped delivering frames
    Stopped,
    /// Shut down on request
    Cancelled,
}

impl CaptureState {
    pub fn is_finished(&self) -> bool {
        matches!(self, CaptureState::Stopped | CaptureState::Cancelled)
    }
}

/// Observable capture loop status
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureStatus {
    pub state: CaptureState,
    /// Completed cycles (results written to the store)
    pub cycles: u64,
    /// Reason the loop stopped, if it stopped on its own
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Default for CaptureStatus {
    fn default() -> Self {
        Self {
            state: CaptureState::Starting,
            cycles: 0,
            last_error: None,
        }
    }
}

/// Capture loop builder
pub struct CaptureLoop {
    pipeline: Arc<StressPipeline>,
    writer: ResultWriter,
    interval: Duration,
}

impl CaptureLoop {
    /// The loop becomes the store's only writer
    pub fn new(pipeline: Arc<StressPipeline>, writer: ResultWriter) -> Self {
        Self {
            pipeline,
            writer,
            interval: CAPTURE_INTERVAL,
        }
    }

    /// Override the delay between cycles
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Spawn the loop. `open` acquires the live source on the blocking pool;
    /// the source is dropped exactly once when the loop ends, however it ends.
    pub fn start<S, F>(self, open: F) -> CaptureHandle
    where
        S: FrameSource + 'static,
        F: FnOnce() -> Result<S, CaptureError> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(CaptureStatus::default());

        let task = tokio::spawn(self.run(open, shutdown_rx, status_tx));

        CaptureHandle {
            shutdown: shutdown_tx,
            status: status_rx,
            task,
        }
    }

    async fn run<S, F>(
        self,
        open: F,
        mut shutdown: watch::Receiver<bool>,
        status: watch::Sender<CaptureStatus>,
    ) -> CaptureState
    where
        S: FrameSource + 'static,
        F: FnOnce() -> Result<S, CaptureError> + Send + 'static,
    {
        let finish = |state: CaptureState, reason: Option<String>| {
            status.send_modify(|s| {
                s.state = state;
                if reason.is_some() {
                    s.last_error = reason;
                }
            });
            info!("Capture loop finished: {:?}", state);
            state
        };

        let mut source = match tokio::task::spawn_blocking(open).await {
            Ok(Ok(source)) => source,
            Ok(Err(e)) => {
                error!("Cannot open live source: {}", e);
                return finish(CaptureState::Stopped, Some(e.to_string()));
            }
            Err(e) => {
                error!("Live source open task failed: {}", e);
                return finish(CaptureState::Stopped, Some(e.to_string()));
            }
        };

        if *shutdown.borrow() {
            return finish(CaptureState::Cancelled, None);
        }

        info!(
            "Capture loop running on {} every {:?}",
            source.describe(),
            self.interval
        );
        status.send_modify(|s| s.state = CaptureState::Running);

        loop {
            let pipeline = Arc::clone(&self.pipeline);
            let step = tokio::task::spawn_blocking(move || {
                let outcome = source
                    .read_frame()
                    .map(|frame| pipeline.infer(&frame));
                (source, outcome)
            })
            .await;

            let outcome = match step {
                Ok((returned, outcome)) => {
                    source = returned;
                    outcome
                }
                Err(e) => {
                    // The source was dropped with the failed task
                    error!("Capture cycle panicked: {}", e);
                    metrics::counter!("stress_capture_failures_total").increment(1);
                    return finish(CaptureState::Stopped, Some(e.to_string()));
                }
            };

            match outcome {
                Ok(Ok(result)) => self.record(result, &status),
                Ok(Err(e)) => warn!("Inference failed, keeping previous result: {}", e),
                Err(e) => {
                    error!("Failed to capture image: {}", e);
                    metrics::counter!("stress_capture_failures_total").increment(1);
                    drop(source);
                    return finish(CaptureState::Stopped, Some(e.to_string()));
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.changed() => {
                    debug!("Capture loop cancellation requested");
                    drop(source);
                    return finish(CaptureState::Cancelled, None);
                }
            }
        }
    }

    fn record(&self, result: StressResult, status: &watch::Sender<CaptureStatus>) {
        metrics::counter!("stress_inferences_total", "source" => "capture").increment(1);
        if !result.face_detected() {
            metrics::counter!("stress_no_face_total", "source" => "capture").increment(1);
        }
        self.writer.publish(result);
        status.send_modify(|s| s.cycles += 1);
    }
}

/// Handle to a running capture loop. Dropping it also cancels the loop.
pub struct CaptureHandle {
    shutdown: watch::Sender<bool>,
    status: watch::Receiver<CaptureStatus>,
    task: JoinHandle<CaptureState>,
}

impl CaptureHandle {
    /// Request cancellation; takes effect at the next inter-cycle sleep
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    /// Status receiver for observers such as the API
    pub fn subscribe(&self) -> watch::Receiver<CaptureStatus> {
        self.status.clone()
    }

    /// Wait for the loop to end
    pub async fn join(self) -> CaptureState {
        match self.task.await {
            Ok(state) => state,
            Err(e) => {
                error!("Capture task failed: {}", e);
                CaptureState::Stopped
            }
        }
    }

    /// Stop the loop and wait until the live source is released
    pub async fn shutdown(self) -> CaptureState {
        self.stop();
        self.join().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::{FaceDetector, FaceLocator, FaceSelection};
    use crate::{ResultStore, StressResult};
    use camera_capture::{Region, VideoFrame};
    use image::{GrayImage, Rgb, RgbImage};
    use inference_engine::{EmotionClassifier, EmotionLabel, EmotionScores, InferenceError, NormalizedFace};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Detects a face only in frames with an odd sequence number
    struct OddFrameDetector;

    impl FaceDetector for OddFrameDetector {
        fn detect(&self, gray: &GrayImage) -> Vec<Region> {
            if gray.get_pixel(0, 0)[0] % 2 == 1 {
                vec![Region::new(0, 0, 8, 8)]
            } else {
                vec![]
            }
        }
    }

    struct SadClassifier;

    impl EmotionClassifier for SadClassifier {
        fn classify(&self, _face: &NormalizedFace) -> Result<EmotionScores, InferenceError> {
            Ok(EmotionScores::new([0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0]))
        }
    }

    /// Source yielding `limit` frames (or forever), counting drops
    struct CountingSource {
        produced: u8,
        limit: Option<u8>,
        drops: Arc<AtomicUsize>,
    }

    impl FrameSource for CountingSource {
        fn read_frame(&mut self) -> Result<VideoFrame, CaptureError> {
            if self.limit.is_some_and(|limit| self.produced >= limit) {
                return Err(CaptureError::Read("camera unplugged".into()));
            }
            self.produced = self.produced.wrapping_add(1);
            let v = self.produced;
            Ok(VideoFrame::from_rgb_image(RgbImage::from_pixel(16, 16, Rgb([v, v, v]))))
        }

        fn describe(&self) -> String {
            "counting source".to_string()
        }
    }

    impl Drop for CountingSource {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn pipeline() -> Arc<StressPipeline> {
        Arc::new(StressPipeline::new(
            FaceLocator::new(Arc::new(OddFrameDetector), FaceSelection::First),
            Arc::new(SadClassifier),
        ))
    }

    fn source(limit: Option<u8>, drops: &Arc<AtomicUsize>) -> CountingSource {
        CountingSource {
            produced: 0,
            limit,
            drops: Arc::clone(drops),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_acquisition_failure() {
        let drops = Arc::new(AtomicUsize::new(0));
        let (writer, reader) = ResultStore::channel();
        let src = source(Some(3), &drops);

        let handle = CaptureLoop::new(pipeline(), writer).start(move || Ok(src));
        let status_rx = handle.subscribe();
        assert_eq!(handle.join().await, CaptureState::Stopped);

        let status = status_rx.borrow().clone();
        assert_eq!(status.state, CaptureState::Stopped);
        assert_eq!(status.cycles, 3);
        assert!(status.last_error.unwrap().contains("camera unplugged"));
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        // Third frame is odd: a face was seen, and the store keeps serving it
        let latest = reader.latest().unwrap();
        assert_eq!(latest.result.report().unwrap().emotion, EmotionLabel::Sad);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_face_overwrites_store() {
        let drops = Arc::new(AtomicUsize::new(0));
        let (writer, reader) = ResultStore::channel();
        let src = source(Some(2), &drops);

        let handle = CaptureLoop::new(pipeline(), writer).start(move || Ok(src));
        handle.join().await;

        assert_eq!(reader.latest().unwrap().result, StressResult::no_face());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_releases_source_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        let (writer, reader) = ResultStore::channel();
        let src = source(None, &drops);

        let handle = CaptureLoop::new(pipeline(), writer).start(move || Ok(src));
        let mut status_rx = handle.subscribe();
        status_rx.wait_for(|s| s.cycles >= 2).await.unwrap();

        assert_eq!(handle.shutdown().await, CaptureState::Cancelled);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert_eq!(status_rx.borrow().state, CaptureState::Cancelled);
        assert!(reader.latest().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycles_are_spaced_by_interval() {
        let drops = Arc::new(AtomicUsize::new(0));
        let (writer, _reader) = ResultStore::channel();
        let src = source(None, &drops);

        let handle = CaptureLoop::new(pipeline(), writer).start(move || Ok(src));
        let mut status_rx = handle.subscribe();

        status_rx.wait_for(|s| s.cycles >= 1).await.unwrap();
        let first = tokio::time::Instant::now();
        status_rx.wait_for(|s| s.cycles >= 2).await.unwrap();
        assert!(first.elapsed() >= CAPTURE_INTERVAL);

        handle.shutdown().await;
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_open_failure_stops_without_results() {
        let (writer, reader) = ResultStore::channel();
        let handle = CaptureLoop::new(pipeline(), writer)
            .start(|| Err::<CountingSource, _>(CaptureError::Open("/dev/video0".into())));

        assert_eq!(handle.join().await, CaptureState::Stopped);
        assert!(reader.latest().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_running_cancels() {
        let drops = Arc::new(AtomicUsize::new(0));
        let (writer, reader) = ResultStore::channel();
        let src = source(None, &drops);

        let handle = CaptureLoop::new(pipeline(), writer)
            .with_interval(Duration::from_millis(100))
            .start(move || Ok(src));
        handle.stop();

        assert_eq!(handle.join().await, CaptureState::Cancelled);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(reader.latest().is_none());
    }
}
