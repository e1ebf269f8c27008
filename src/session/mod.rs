//! Analysis session orchestration
//!
//! One session drives one image through `Idle -> FileSelected -> Analyzing
//! -> Completed`. The analysis runs on its own tokio task so the session
//! stays responsive (state queries, reset) while it is in flight. Every
//! transition happens under the session lock, and a completion that arrives
//! after a reset is discarded by comparing generations. A reset that lands
//! while the result is being written to history cancels the session
//! update, not the write.

mod state;

pub use state::{AnalysisOutcome, Notice, Phase, SessionEvent, Severity};

use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};

use crate::analyzer::{Analyzer, Verdict};
use crate::errors::{SessionError, TruthError, TruthResult};
use crate::history::HistoryStore;
use crate::models::HistoryItem;
use crate::upload::ImageUpload;

pub const COMPLETE_TITLE: &str = "Analysis Complete";
pub const FAILED_TITLE: &str = "Analysis Failed";
pub const FAILED_DESCRIPTION: &str = "There was an error analyzing your image. Please try again.";

struct Shared<R> {
    phase: Phase,
    upload: Option<ImageUpload>,
    completed: Option<HistoryItem<R>>,
    generation: u64,
    task: Option<AbortHandle>,
}

/// Best-effort event delivery; a full or closed channel drops the event.
#[derive(Clone, Default)]
struct EventSink(Option<mpsc::Sender<SessionEvent>>);

impl EventSink {
    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.0 {
            if let Err(e) = tx.try_send(event) {
                log::debug!("Dropped session event: {}", e);
            }
        }
    }

    fn phase(&self, phase: Phase) {
        log::debug!("Session is now {}", phase);
        self.emit(SessionEvent::StateChanged(phase));
    }
}

/// Drives one image through analysis with analyzer `A`.
pub struct AnalysisSession<A: Analyzer> {
    analyzer: Arc<A>,
    history: Arc<HistoryStore<A::Output>>,
    shared: Arc<Mutex<Shared<A::Output>>>,
    events: EventSink,
}

impl<A: Analyzer> AnalysisSession<A> {
    pub fn new(analyzer: Arc<A>, history: Arc<HistoryStore<A::Output>>) -> Self {
        Self {
            analyzer,
            history,
            shared: Arc::new(Mutex::new(Shared {
                phase: Phase::Idle,
                upload: None,
                completed: None,
                generation: 0,
                task: None,
            })),
            events: EventSink::default(),
        }
    }

    /// Deliver state changes and notifications on `events`
    pub fn with_events(mut self, events: mpsc::Sender<SessionEvent>) -> Self {
        self.events = EventSink(Some(events));
        self
    }

    pub fn phase(&self) -> Phase {
        self.shared.lock().phase
    }

    /// The result of the last completed analysis, if still current
    pub fn result(&self) -> Option<A::Output> {
        self.shared.lock().completed.as_ref().map(|item| item.result.clone())
    }

    /// The last completed analysis as it was recorded in history
    pub fn completed_item(&self) -> Option<HistoryItem<A::Output>> {
        self.shared.lock().completed.clone()
    }

    pub fn upload(&self) -> Option<ImageUpload> {
        self.shared.lock().upload.clone()
    }

    pub fn analyzer(&self) -> &Arc<A> {
        &self.analyzer
    }

    pub fn history(&self) -> &Arc<HistoryStore<A::Output>> {
        &self.history
    }

    /// Attach an already validated image. Only allowed from `Idle`.
    pub fn select_file(&self, upload: ImageUpload) -> Result<(), SessionError> {
        let mut shared = self.shared.lock();
        if shared.phase != Phase::Idle {
            return Err(SessionError::InvalidTransition {
                action: "select a file",
                phase: shared.phase,
            });
        }

        log::info!("Selected {} ({} bytes)", upload.filename(), upload.size());
        shared.upload = Some(upload);
        shared.completed = None;
        shared.phase = Phase::FileSelected;
        self.events.phase(Phase::FileSelected);
        Ok(())
    }

    /// Start analyzing the selected image on a background task.
    pub fn start_analysis(&self) -> Result<AnalysisTicket<A::Output>, SessionError> {
        let mut shared = self.shared.lock();
        let upload = match (shared.phase, &shared.upload) {
            (Phase::FileSelected, Some(upload)) => upload.clone(),
            (phase, _) => {
                return Err(SessionError::InvalidTransition {
                    action: "start analysis",
                    phase,
                })
            }
        };

        let generation = shared.generation;
        shared.phase = Phase::Analyzing;
        self.events.phase(Phase::Analyzing);
        log::info!("Starting {} on {}", self.analyzer.name(), upload.filename());

        let analyzer = Arc::clone(&self.analyzer);
        let history = Arc::clone(&self.history);
        let task_shared = Arc::clone(&self.shared);
        let events = self.events.clone();

        let handle = tokio::spawn(async move {
            let outcome = analyzer.analyze(&upload).await;
            settle(&task_shared, &history, &events, generation, &upload, outcome).await
        });
        shared.task = Some(handle.abort_handle());

        Ok(AnalysisTicket {
            handle,
            shared: Arc::clone(&self.shared),
            events: self.events.clone(),
            generation,
        })
    }

    /// Return to `Idle` from any phase, cancelling an in-flight analysis.
    /// Persisted history is left alone.
    pub fn reset(&self) {
        let mut shared = self.shared.lock();
        shared.generation += 1;
        if let Some(task) = shared.task.take() {
            log::info!("Cancelling in-flight analysis");
            task.abort();
        }
        shared.upload = None;
        shared.completed = None;
        shared.phase = Phase::Idle;
        self.events.phase(Phase::Idle);
    }
}

impl<A: Analyzer> Drop for AnalysisSession<A> {
    fn drop(&mut self) {
        if let Some(task) = self.shared.lock().task.take() {
            task.abort();
        }
    }
}

/// Handle to a running analysis.
pub struct AnalysisTicket<R> {
    handle: JoinHandle<AnalysisOutcome<R>>,
    shared: Arc<Mutex<Shared<R>>>,
    events: EventSink,
    generation: u64,
}

impl<R> AnalysisTicket<R> {
    /// Wait for the analysis to settle.
    pub async fn outcome(mut self) -> AnalysisOutcome<R> {
        match (&mut self.handle).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => AnalysisOutcome::Cancelled,
            Err(e) => {
                log::error!("Analysis task panicked: {}", e);
                self.roll_back();
                AnalysisOutcome::Failed(TruthError::TaskJoin(e))
            }
        }
    }

    fn roll_back(&self) {
        let mut shared = self.shared.lock();
        if shared.generation == self.generation && shared.phase == Phase::Analyzing {
            shared.task = None;
            shared.phase = Phase::FileSelected;
            self.events.phase(Phase::FileSelected);
            self.events
                .emit(SessionEvent::Notification(Notice::error(FAILED_TITLE, FAILED_DESCRIPTION)));
        }
    }
}

/// Apply a finished analysis to the session, unless it was reset meanwhile.
///
/// The history write runs on the blocking pool without the session lock;
/// the lock is only taken to check the generation and publish the outcome.
async fn settle<R>(
    shared: &Mutex<Shared<R>>,
    history: &Arc<HistoryStore<R>>,
    events: &EventSink,
    generation: u64,
    upload: &ImageUpload,
    outcome: TruthResult<R>,
) -> AnalysisOutcome<R>
where
    R: Verdict + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    if shared.lock().generation != generation {
        log::debug!("Discarding analysis of {} after reset", upload.filename());
        return AnalysisOutcome::Cancelled;
    }

    let outcome = match outcome {
        Ok(result) => persist(history, upload, result).await,
        Err(e) => Err(e),
    };

    let mut shared = shared.lock();
    if shared.generation != generation {
        log::debug!("Discarding analysis of {} after reset", upload.filename());
        return AnalysisOutcome::Cancelled;
    }
    shared.task = None;

    match outcome {
        Ok(item) => {
            let result = item.result.clone();
            shared.completed = Some(item);
            shared.phase = Phase::Completed;
            events.phase(Phase::Completed);
            events.emit(SessionEvent::Notification(Notice::info(COMPLETE_TITLE, result.summary())));
            AnalysisOutcome::Completed(result)
        }
        Err(e) => {
            log::error!("Error analyzing {}: {}", upload.filename(), e);
            shared.phase = Phase::FileSelected;
            events.phase(Phase::FileSelected);
            events.emit(SessionEvent::Notification(Notice::error(FAILED_TITLE, FAILED_DESCRIPTION)));
            AnalysisOutcome::Failed(e)
        }
    }
}

/// Record `result` in history. Store errors are already swallowed by the
/// history store; only a crashed writer surfaces here.
async fn persist<R>(history: &Arc<HistoryStore<R>>, upload: &ImageUpload, result: R) -> TruthResult<HistoryItem<R>>
where
    R: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    let history = Arc::clone(history);
    let image_url = upload.preview_url().to_string();
    let filename = upload.filename().to_string();
    let item = tokio::task::spawn_blocking(move || history.record(&image_url, &filename, result)).await?;
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ModelError, StoreError};
    use crate::models::StegoResult;
    use crate::storage::{KeyValueStore, MemoryStore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedAnalyzer {
        result: Option<StegoResult>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FixedAnalyzer {
        fn ok(result: StegoResult, delay: Duration) -> Self {
            Self {
                result: Some(result),
                delay,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                result: None,
                delay: Duration::from_millis(10),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Analyzer for FixedAnalyzer {
        type Output = StegoResult;

        fn name(&self) -> &str {
            "fixed"
        }

        async fn analyze(&self, _upload: &ImageUpload) -> TruthResult<StegoResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match &self.result {
                Some(result) => Ok(result.clone()),
                None => Err(ModelError::Inference("model crashed".to_string()).into()),
            }
        }
    }

    fn upload() -> ImageUpload {
        ImageUpload::from_bytes("cat.png", "image/png", vec![7u8; 64]).unwrap()
    }

    fn session(analyzer: FixedAnalyzer) -> (AnalysisSession<FixedAnalyzer>, mpsc::Receiver<SessionEvent>) {
        let history = Arc::new(HistoryStore::new(Arc::new(MemoryStore::new()), "steganalysis_history", 50));
        let (tx, rx) = mpsc::channel(32);
        (AnalysisSession::new(Arc::new(analyzer), history).with_events(tx), rx)
    }

    fn drain(rx: &mut mpsc::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_analysis() {
        let (session, mut rx) = session(FixedAnalyzer::ok(StegoResult::from_scores(70, 80, 90), Duration::from_secs(3)));
        assert_eq!(session.phase(), Phase::Idle);

        session.select_file(upload()).unwrap();
        assert_eq!(session.phase(), Phase::FileSelected);

        let ticket = session.start_analysis().unwrap();
        assert_eq!(session.phase(), Phase::Analyzing);

        let result = ticket.outcome().await.result().unwrap();
        assert_eq!(result.overall_score(), 74);
        assert_eq!(session.phase(), Phase::Completed);
        assert_eq!(session.result(), Some(result));

        let history = session.history().get_all();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].filename, "cat.png");
        assert_eq!(history[0].result, result);
        assert!(history[0].image_url.starts_with("data:image/png;base64,"));

        assert_eq!(
            drain(&mut rx),
            vec![
                SessionEvent::StateChanged(Phase::FileSelected),
                SessionEvent::StateChanged(Phase::Analyzing),
                SessionEvent::StateChanged(Phase::Completed),
                SessionEvent::Notification(Notice::info(
                    COMPLETE_TITLE,
                    "Suspicious content detected in this image."
                )),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_analysis_rolls_back() {
        let (session, mut rx) = session(FixedAnalyzer::failing());
        session.select_file(upload()).unwrap();

        let outcome = session.start_analysis().unwrap().outcome().await;
        assert!(matches!(outcome, AnalysisOutcome::Failed(TruthError::Model(ModelError::Inference(_)))));
        assert_eq!(session.phase(), Phase::FileSelected);
        assert!(session.result().is_none());
        assert!(session.history().is_empty());

        let events = drain(&mut rx);
        assert_eq!(
            events.last(),
            Some(&SessionEvent::Notification(Notice::error(FAILED_TITLE, FAILED_DESCRIPTION)))
        );

        // The same file can be retried
        assert!(session.start_analysis().is_ok());
    }

    #[tokio::test]
    async fn test_invalid_transitions() {
        let (session, _rx) = session(FixedAnalyzer::ok(StegoResult::from_scores(1, 1, 50), Duration::ZERO));

        let err = session.start_analysis().err().unwrap();
        assert_eq!(
            err,
            SessionError::InvalidTransition {
                action: "start analysis",
                phase: Phase::Idle
            }
        );

        session.select_file(upload()).unwrap();
        let err = session.select_file(upload()).unwrap_err();
        assert_eq!(err.to_string(), "Cannot select a file while file selected");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_cancels_in_flight_analysis() {
        let analyzer = FixedAnalyzer::ok(StegoResult::from_scores(90, 90, 90), Duration::from_secs(3));
        let (session, mut rx) = session(analyzer);
        session.select_file(upload()).unwrap();

        let ticket = session.start_analysis().unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        session.reset();

        assert!(ticket.outcome().await.is_cancelled());
        assert_eq!(session.phase(), Phase::Idle);
        assert!(session.upload().is_none());
        assert!(session.history().is_empty());

        // No completion notification after the reset
        let events = drain(&mut rx);
        assert_eq!(events.last(), Some(&SessionEvent::StateChanged(Phase::Idle)));
        assert!(!events.iter().any(|e| matches!(e, SessionEvent::Notification(_))));
    }

    #[tokio::test]
    async fn test_reset_keeps_history() {
        let (session, _rx) = session(FixedAnalyzer::ok(StegoResult::from_scores(10, 10, 60), Duration::ZERO));
        session.select_file(upload()).unwrap();
        session.start_analysis().unwrap().outcome().await;
        assert_eq!(session.phase(), Phase::Completed);

        session.reset();
        assert_eq!(session.phase(), Phase::Idle);
        assert!(session.result().is_none());
        assert_eq!(session.history().len(), 1);

        // A fresh cycle is possible after reset
        session.select_file(upload()).unwrap();
        assert_eq!(session.phase(), Phase::FileSelected);
    }

    #[tokio::test]
    async fn test_stale_completion_is_ignored() {
        let history: Arc<HistoryStore<StegoResult>> =
            Arc::new(HistoryStore::new(Arc::new(MemoryStore::new()), "steganalysis_history", 50));
        let shared = Mutex::new(Shared {
            phase: Phase::Idle,
            upload: None,
            completed: None,
            generation: 3,
            task: None,
        });

        let outcome = settle(
            &shared,
            &history,
            &EventSink::default(),
            2,
            &upload(),
            Ok(StegoResult::from_scores(70, 80, 90)),
        )
        .await;

        assert!(outcome.is_cancelled());
        assert_eq!(shared.lock().phase, Phase::Idle);
        assert!(history.is_empty());
    }

    /// Memory store whose first write blocks until released
    struct GatedStore {
        inner: MemoryStore,
        entered: Mutex<Option<std::sync::mpsc::Sender<()>>>,
        release: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl KeyValueStore for GatedStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            if let Some(entered) = self.entered.lock().take() {
                let _ = entered.send(());
                let _ = self.release.lock().recv();
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.inner.remove(key)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_history_write_does_not_hold_session_lock() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let store = GatedStore {
            inner: MemoryStore::new(),
            entered: Mutex::new(Some(entered_tx)),
            release: Mutex::new(release_rx),
        };
        let history = Arc::new(HistoryStore::new(Arc::new(store), "steganalysis_history", 50));
        let analyzer = FixedAnalyzer::ok(StegoResult::from_scores(70, 80, 90), Duration::ZERO);
        let session = AnalysisSession::new(Arc::new(analyzer), history);

        session.select_file(upload())?;
        let ticket = session.start_analysis()?;

        // Wait until the result is being written
        tokio::task::spawn_blocking(move || entered_rx.recv()).await??;
        assert!(session.shared.try_lock().is_some());
        assert_eq!(session.phase(), Phase::Analyzing);

        release_tx.send(())?;
        assert!(ticket.outcome().await.is_completed());
        assert_eq!(session.phase(), Phase::Completed);
        assert_eq!(session.history().len(), 1);
        Ok(())
    }
}
