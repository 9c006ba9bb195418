//! Application Coordinator
//!
//! Owns the per-region sessions and drives the capture cycle scheduler.
//! Each region runs its own producer loop: capture, OCR call, synchronous
//! block pipeline, then translation dispatch. Translation tasks are
//! spawned with generation-tagged requests and their results join back
//! onto blocks through the session, never directly.

use anyhow::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::capture::{CaptureRegion, FrameSource};
use crate::config::AppConfig;
use crate::overlay::{RegionSnapshot, SnapshotPublisher};
use crate::region::RegionSession;
use crate::translate::{TranslatedBlock, TranslationProvider};
use crate::vision::OcrProvider;

/// Main application coordinator
pub struct App {
    config: AppConfig,
    ocr: Arc<dyn OcrProvider>,
    translator: Arc<dyn TranslationProvider>,
    publisher: SnapshotPublisher,
}

impl App {
    /// Create the coordinator and the snapshot feed for the rendering
    /// collaborator
    pub fn new(
        config: AppConfig,
        ocr: Arc<dyn OcrProvider>,
        translator: Arc<dyn TranslationProvider>,
    ) -> (Self, crossbeam_channel::Receiver<RegionSnapshot>) {
        let (publisher, receiver) = SnapshotPublisher::new();
        (
            Self {
                config,
                ocr,
                translator,
                publisher,
            },
            receiver,
        )
    }

    /// Publisher handle for pull-style snapshot consumers
    pub fn publisher(&self) -> SnapshotPublisher {
        self.publisher.clone()
    }

    /// Run every configured region until `cycles` capture cycles complete
    /// (forever when None). `sources` must supply one frame source per
    /// configured region, in order.
    pub async fn run(self, sources: Vec<Box<dyn FrameSource>>, cycles: Option<u64>) -> Result<()> {
        anyhow::ensure!(
            sources.len() == self.config.capture.regions.len(),
            "expected {} frame sources, got {}",
            self.config.capture.regions.len(),
            sources.len()
        );

        let mut handles = Vec::new();
        for (region, source) in self
            .config
            .capture
            .regions
            .clone()
            .into_iter()
            .zip(sources)
        {
            handles.push(tokio::spawn(run_region(
                region,
                self.config.clone(),
                Arc::clone(&self.ocr),
                Arc::clone(&self.translator),
                self.publisher.clone(),
                source,
                cycles,
            )));
        }

        for handle in handles {
            handle.await??;
        }
        Ok(())
    }
}

/// Producer loop for one region. The session behind the mutex is the only
/// writer-shared state; the pipeline itself never runs concurrently for
/// the same region because this loop is its sole driver. A slow OCR call
/// makes the interval skip ticks rather than queue overlapping cycles.
async fn run_region(
    region: CaptureRegion,
    config: AppConfig,
    ocr: Arc<dyn OcrProvider>,
    translator: Arc<dyn TranslationProvider>,
    publisher: SnapshotPublisher,
    mut source: Box<dyn FrameSource>,
    cycles: Option<u64>,
) -> Result<()> {
    let session = Arc::new(Mutex::new(RegionSession::new(region, &config)));
    info!(region_id = %session.lock().id(), "region session started");

    let (result_tx, mut result_rx) = mpsc::unbounded_channel::<TranslatedBlock>();
    let mut in_flight: JoinSet<()> = JoinSet::new();

    let mut interval = tokio::time::interval(Duration::from_millis(config.capture.interval_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut completed = 0u64;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let frame = match source.next_frame() {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!("frame capture failed: {e}");
                        continue;
                    }
                };
                let detections = match ocr.recognize(&frame).await {
                    Ok(detections) => detections,
                    Err(e) => {
                        // Non-fatal: this cycle yields nothing, the next
                        // one retries.
                        warn!(backend = ocr.name(), "ocr failed: {e}");
                        continue;
                    }
                };

                let request = {
                    let mut session = session.lock();
                    let request = session.process_frame(detections);
                    session.fill_missing_colors(&frame);
                    publisher.publish(session.snapshot());
                    request
                };

                if let Some(request) = request {
                    let translator = Arc::clone(&translator);
                    let tx = result_tx.clone();
                    in_flight.spawn(async move {
                        match translator.translate(&request).await {
                            Ok(response) => {
                                for block in response.blocks {
                                    let _ = tx.send(block);
                                }
                            }
                            Err(e) => warn!(provider = translator.name(), "translation failed: {e}"),
                        }
                    });
                }

                completed += 1;
                if let Some(limit) = cycles {
                    if completed >= limit {
                        break;
                    }
                }
            }
            Some(result) = result_rx.recv() => {
                let mut session = session.lock();
                session.apply_translation(result.id, result.generation, result.text);
                publisher.publish(session.snapshot());
            }
        }
    }

    // Let dispatched translations finish, then join their results.
    while in_flight.join_next().await.is_some() {}
    while let Ok(result) = result_rx.try_recv() {
        let mut session = session.lock();
        session.apply_translation(result.id, result.generation, result.text);
        publisher.publish(session.snapshot());
    }

    let session = session.lock();
    let stats = session.stats();
    info!(
        region_id = %session.id(),
        cycles = stats.cycles,
        applied = stats.translations_applied,
        stale = stats.stale_discarded,
        "region session finished"
    );
    Ok(())
}
