//! Sentinel visibility trigger for infinite scrolling.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::model::Listed;
use crate::paging::{IncrementalListController, PageFetcher};

/// The sentinel counts as visible only when fully inside the viewport.
pub const FULL_VISIBILITY: f32 = 1.0;

/// Visible fraction of the sentinel element reported by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    pub ratio: f32,
}

impl Intersection {
    #[must_use]
    pub const fn visible() -> Self {
        Self { ratio: FULL_VISIBILITY }
    }

    #[must_use]
    pub const fn hidden() -> Self {
        Self { ratio: 0.0 }
    }

    #[must_use]
    pub fn meets(self, threshold: f32) -> bool {
        self.ratio >= threshold
    }
}

#[async_trait]
pub trait LoadMore: Send + Sync {
    fn has_more(&self) -> bool;

    async fn load_more(&self);
}

#[async_trait]
impl<T, F> LoadMore for IncrementalListController<T, F>
where
    T: Listed + Clone + Send + 'static,
    F: PageFetcher<T> + 'static,
{
    fn has_more(&self) -> bool {
        IncrementalListController::has_more(self)
    }

    async fn load_more(&self) {
        if let Err(error) = self.load_next().await {
            warn!(error = %error, "load triggered by viewport failed");
        }
    }
}

/// Fires `load_more` each time the sentinel goes from hidden to visible.
pub struct ViewportTrigger {
    threshold: f32,
    task: Option<JoinHandle<()>>,
    stopped: Arc<AtomicBool>,
}

impl Default for ViewportTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewportTrigger {
    #[must_use]
    pub fn new() -> Self {
        Self::with_threshold(FULL_VISIBILITY)
    }

    #[must_use]
    pub fn with_threshold(threshold: f32) -> Self {
        Self {
            threshold,
            task: None,
            stopped: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Starts watching. Must be called inside a tokio runtime.
    /// A running watcher is stopped first.
    pub fn start<L>(&mut self, target: Arc<L>, mut observations: mpsc::Receiver<Intersection>)
    where
        L: LoadMore + 'static,
    {
        self.stop();

        let stopped = Arc::new(AtomicBool::new(false));
        self.stopped = stopped.clone();
        let threshold = self.threshold;

        self.task = Some(tokio::spawn(async move {
            let mut visible = false;
            while let Some(observation) = observations.recv().await {
                if stopped.load(Ordering::Acquire) {
                    break;
                }
                let now_visible = observation.meets(threshold);
                let entered = now_visible && !visible;
                visible = now_visible;

                if !entered {
                    continue;
                }
                if !target.has_more() {
                    debug!("sentinel visible but list exhausted");
                    continue;
                }
                target.load_more().await;
            }
            debug!("viewport watcher finished");
        }));
    }

    /// Detaches the watcher. Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.stopped.store(true, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
            info!("viewport watcher stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Waits for the watcher to end after its observation stream closes.
    pub async fn finished(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ViewportTrigger {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingTarget {
        loads: AtomicUsize,
        more: AtomicBool,
    }

    impl CountingTarget {
        fn new(more: bool) -> Arc<Self> {
            Arc::new(Self {
                loads: AtomicUsize::new(0),
                more: AtomicBool::new(more),
            })
        }

        fn loads(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LoadMore for CountingTarget {
        fn has_more(&self) -> bool {
            self.more.load(Ordering::SeqCst)
        }

        async fn load_more(&self) {
            self.loads.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn feed(target: Arc<CountingTarget>, observations: &[Intersection]) {
        let (tx, rx) = mpsc::channel(16);
        let mut trigger = ViewportTrigger::new();
        trigger.start(target, rx);
        for observation in observations {
            tx.send(*observation).await.unwrap();
        }
        drop(tx);
        trigger.finished().await;
    }

    #[tokio::test]
    async fn test_fires_on_entering_viewport() {
        let target = CountingTarget::new(true);
        feed(target.clone(), &[Intersection::hidden(), Intersection::visible()]).await;
        assert_eq!(target.loads(), 1);
    }

    #[tokio::test]
    async fn test_staying_visible_does_not_refire() {
        let target = CountingTarget::new(true);
        feed(
            target.clone(),
            &[Intersection::visible(), Intersection::visible(), Intersection::visible()],
        )
        .await;
        assert_eq!(target.loads(), 1);
    }

    #[tokio::test]
    async fn test_each_entry_fires() {
        let target = CountingTarget::new(true);
        feed(
            target.clone(),
            &[
                Intersection::visible(),
                Intersection::hidden(),
                Intersection::visible(),
                Intersection { ratio: 0.5 },
                Intersection::visible(),
            ],
        )
        .await;
        assert_eq!(target.loads(), 3);
    }

    #[tokio::test]
    async fn test_partial_visibility_is_not_enough() {
        let target = CountingTarget::new(true);
        feed(target.clone(), &[Intersection { ratio: 0.99 }]).await;
        assert_eq!(target.loads(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_list_never_loads() {
        let target = CountingTarget::new(false);
        feed(
            target.clone(),
            &[Intersection::visible(), Intersection::hidden(), Intersection::visible()],
        )
        .await;
        assert_eq!(target.loads(), 0);
    }

    #[tokio::test]
    async fn test_stop_detaches() {
        let target = CountingTarget::new(true);
        let (tx, rx) = mpsc::channel(16);
        let mut trigger = ViewportTrigger::new();
        trigger.start(target.clone(), rx);

        tx.send(Intersection::visible()).await.unwrap();
        for _ in 0..16 {
            if target.loads() == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(target.loads(), 1);

        trigger.stop();
        trigger.stop();
        assert!(!trigger.is_running());

        let _ = tx.send(Intersection::hidden()).await;
        let _ = tx.send(Intersection::visible()).await;
        tokio::task::yield_now().await;
        assert_eq!(target.loads(), 1);
    }
}
