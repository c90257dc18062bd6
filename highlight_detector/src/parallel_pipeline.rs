// THEORY:
// A single detection is synchronous and self-contained: every intermediate value
// (clusters, HSV plane, masks, regions) is local to the call, and the only shared
// input is the read-only palette registry. That makes screenshots trivially
// parallel. The `DetectorPool` runs many of them at once behind an async API.
//
// Key architectural principles:
// 1.  **Dispatcher + Workers**: One dispatcher task receives `DetectionTask`s and
//     hands them round robin to a fixed set of worker tasks, each with its own
//     channel.
// 2.  **Blocking Work off the Reactor**: Clustering is CPU bound, so each worker runs
//     `HighlightDetector::process` on the blocking thread pool and awaits it.
// 3.  **Oneshot Replies**: Every task carries its own `oneshot` sender; callers await
//     exactly their own result, so batch results come back in input order.
// 4.  **No Deadlines**: The pool imposes no time limits. Callers that need one wrap
//     the returned future in `tokio::time::timeout`.

use crate::error::{DetectorError, Result};
use crate::pipeline::{DetectionOutcome, HighlightDetector};
use futures::future::join_all;
use image::RgbImage;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

pub struct DetectionTask {
    pub image: RgbImage,
    pub result_sender: oneshot::Sender<Result<DetectionOutcome>>,
}

pub struct DetectorPool {
    task_sender: mpsc::UnboundedSender<DetectionTask>,
    dispatcher: tokio::task::JoinHandle<()>,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl DetectorPool {
    /// Pool with one worker per logical CPU. Must be called inside a tokio runtime.
    pub fn new(detector: HighlightDetector) -> Self {
        Self::with_workers(detector, num_cpus::get())
    }

    pub fn with_workers(detector: HighlightDetector, worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<DetectionTask>();

        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..worker_count)
            .map(|_| mpsc::unbounded_channel::<DetectionTask>())
            .unzip();

        // Spawn dispatcher
        let dispatcher = tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                if let Err(mpsc::error::SendError(task)) = worker_senders[worker_idx].send(task) {
                    let _ = task
                        .result_sender
                        .send(Err(DetectorError::WorkerUnavailable("worker stopped")));
                }
                worker_idx = (worker_idx + 1) % worker_count;
            }
        });

        // Spawn workers
        let mut workers = Vec::with_capacity(worker_count);
        for (worker_id, mut worker_receiver) in worker_receivers.into_iter().enumerate() {
            let worker_detector = detector.clone();
            let worker = tokio::spawn(async move {
                while let Some(task) = worker_receiver.recv().await {
                    let detector = worker_detector.clone();
                    let image = task.image;
                    let result = tokio::task::spawn_blocking(move || detector.process(&image))
                        .await
                        .unwrap_or_else(|join_error| {
                            warn!(worker_id, %join_error, "detection task failed to complete");
                            Err(DetectorError::WorkerUnavailable("detection task panicked"))
                        });
                    let _ = task.result_sender.send(result);
                }
                debug!(worker_id, "detector worker stopped");
            });
            workers.push(worker);
        }

        Self {
            task_sender,
            dispatcher,
            workers,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub async fn process(&self, image: RgbImage) -> Result<DetectionOutcome> {
        let (result_sender, result_receiver) = oneshot::channel();
        self.task_sender
            .send(DetectionTask {
                image,
                result_sender,
            })
            .map_err(|_| DetectorError::WorkerUnavailable("failed to send task to detector pool"))?;

        result_receiver
            .await
            .map_err(|_| DetectorError::WorkerUnavailable("failed to receive result from worker"))?
    }

    /// Processes every image concurrently; results are in input order.
    pub async fn process_batch(&self, images: Vec<RgbImage>) -> Vec<Result<DetectionOutcome>> {
        join_all(images.into_iter().map(|image| self.process(image))).await
    }

    /// Stops accepting tasks and waits for queued work to drain.
    pub async fn shutdown(self) {
        drop(self.task_sender);
        let _ = self.dispatcher.await;
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn highlighted(band_y: u32, band_height: u32) -> RgbImage {
        RgbImage::from_fn(60, 60, |_, y| {
            if y >= band_y && y < band_y + band_height {
                Rgb([179, 215, 255])
            } else {
                Rgb([255, 255, 255])
            }
        })
    }

    #[tokio::test]
    async fn single_image_through_pool() {
        let pool = DetectorPool::with_workers(HighlightDetector::default(), 2);
        let outcome = pool.process(highlighted(10, 8)).await.unwrap();
        assert!(outcome.highlight_present);
        assert_eq!(outcome.cropped_image.unwrap().height(), 8);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn batch_results_keep_input_order() {
        let pool = DetectorPool::with_workers(HighlightDetector::default(), 3);
        let images = vec![
            highlighted(0, 4),
            RgbImage::from_pixel(10, 10, Rgb([255, 255, 255])),
            highlighted(30, 12),
            RgbImage::new(0, 0),
        ];
        let results = pool.process_batch(images).await;
        assert_eq!(results.len(), 4);
        assert_eq!(
            results[0].as_ref().unwrap().cropped_image.as_ref().unwrap().height(),
            4
        );
        assert!(!results[1].as_ref().unwrap().highlight_present);
        assert_eq!(
            results[2].as_ref().unwrap().cropped_image.as_ref().unwrap().height(),
            12
        );
        assert!(matches!(results[3], Err(DetectorError::InvalidImage { .. })));
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn zero_workers_is_bumped_to_one() {
        let pool = DetectorPool::with_workers(HighlightDetector::default(), 0);
        assert_eq!(pool.worker_count(), 1);
        pool.shutdown().await;
    }
}
