/// End-to-end tests: upload -> session -> analyzer -> history
mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use pixel_truth::deepfake::{ClassifierService, DeepfakeDetector, FALLBACK_MODEL_NAME};
use pixel_truth::session::{Notice, COMPLETE_TITLE};
use pixel_truth::stego::MockStegoAnalyzer;
use pixel_truth::storage::{FileStore, MemoryStore};
use pixel_truth::upload::{ImageUpload, PreviewMode};
use pixel_truth::{
    AnalysisKind, AnalysisOutcome, AnalysisSession, DeepfakeResult, HistoryItem, HistoryStore, Phase,
    SessionEvent, StegoResult,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;
use tokio::sync::mpsc;

use common::{small_png, write_jpeg, FixedStegoAnalyzer, UnreachableLoader};

#[tokio::test]
async fn test_e2e_steganalysis_of_jpeg() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let temp_dir = TempDir::new()?;
    let image = write_jpeg(temp_dir.path(), "photo.jpg", 2 * 1024 * 1024);
    let store = Arc::new(FileStore::open(temp_dir.path().join("data"))?);
    let history = Arc::new(HistoryStore::for_kind(store.clone(), AnalysisKind::Steganalysis));

    let upload = ImageUpload::load(&image, PreviewMode::FileUrl).await?;
    assert_eq!(upload.mime(), "image/jpeg");

    let (tx, mut rx) = mpsc::channel(16);
    let session = AnalysisSession::new(Arc::new(FixedStegoAnalyzer::new(70, 80)), history.clone()).with_events(tx);
    session.select_file(upload)?;

    let result = session
        .start_analysis()?
        .outcome()
        .await
        .result()
        .ok_or("analysis did not complete")?;

    assert_eq!(result.overall_score(), 74);
    assert!(result.has_hidden_data());
    assert_eq!(session.phase(), Phase::Completed);

    let items = history.get_all();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].filename, "photo.jpg");
    assert!(items[0].image_url.starts_with("file://"));

    // Stored on disk under the feature's key
    let raw = std::fs::read_to_string(store.path_for("steganalysis_history")?)?;
    let on_disk: Vec<HistoryItem<StegoResult>> = serde_json::from_str(&raw)?;
    assert_eq!(on_disk, items);
    assert!(raw.contains("\"overallScore\":74"));
    assert!(raw.contains("\"hasHiddenData\":true"));

    let mut notices = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let SessionEvent::Notification(notice) = event {
            notices.push(notice);
        }
    }
    assert_eq!(
        notices,
        vec![Notice::info(COMPLETE_TITLE, "Suspicious content detected in this image.")]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_e2e_deepfake_fallback_when_model_unreachable() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let loader = Arc::new(UnreachableLoader::default());
    let service = Arc::new(ClassifierService::new(loader.clone()));
    let detector = DeepfakeDetector::new(service).with_rng(StdRng::seed_from_u64(3));
    let history: Arc<HistoryStore<DeepfakeResult>> =
        Arc::new(HistoryStore::for_kind(Arc::new(MemoryStore::new()), AnalysisKind::Deepfake));

    let session = AnalysisSession::new(Arc::new(detector), history.clone());
    session.select_file(small_png("face.png"))?;

    let started = tokio::time::Instant::now();
    let outcome = session.start_analysis()?.outcome().await;
    assert!(started.elapsed() >= Duration::from_millis(2000));

    let result = match outcome {
        AnalysisOutcome::Completed(result) => result,
        other => panic!("expected a fallback result, got {:?}", other),
    };
    assert_eq!(result.model_name, FALLBACK_MODEL_NAME);
    assert!((70..=95).contains(&result.confidence));
    assert_eq!(result.classes.len(), 2);
    assert_eq!(loader.attempts.load(Ordering::SeqCst), 1);

    assert_eq!(session.phase(), Phase::Completed);
    assert_eq!(history.len(), 1);
    assert_eq!(history.capacity(), 20);
    Ok(())
}

#[tokio::test]
async fn test_e2e_deepfake_history_evicts_oldest() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let temp_dir = TempDir::new()?;
    let history: HistoryStore<DeepfakeResult> =
        HistoryStore::for_kind(Arc::new(FileStore::open(temp_dir.path())?), AnalysisKind::Deepfake);

    let mut recorded = Vec::new();
    for n in 0..25 {
        let result = DeepfakeResult {
            is_ai_generated: n % 2 == 0,
            confidence: 50 + n as u8,
            model_name: "DiFace Deepfake Detector".to_string(),
            classes: Vec::new(),
        };
        recorded.push(history.record("data:image/png;base64,AAAA", &format!("img-{}.png", n), result));
    }

    let items = history.get_all();
    assert_eq!(items.len(), 20);
    assert_eq!(items[0].filename, "img-24.png");
    assert_eq!(items[19].filename, "img-5.png");
    for evicted in &recorded[..5] {
        assert!(history.get_by_id(&evicted.id).is_none());
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_e2e_reset_discards_running_analysis() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let history: Arc<HistoryStore<StegoResult>> =
        Arc::new(HistoryStore::for_kind(Arc::new(MemoryStore::new()), AnalysisKind::Steganalysis));
    let analyzer = Arc::new(MockStegoAnalyzer::with_rng(StdRng::seed_from_u64(42)));
    let session = AnalysisSession::new(analyzer, history.clone());

    session.select_file(small_png("first.png"))?;
    let ticket = session.start_analysis()?;
    tokio::time::sleep(Duration::from_millis(1000)).await;
    session.reset();

    assert!(ticket.outcome().await.is_cancelled());
    assert_eq!(session.phase(), Phase::Idle);
    assert!(history.is_empty());

    // A later analysis on the same session completes normally
    session.select_file(small_png("second.png"))?;
    let result = session.start_analysis()?.outcome().await.result().ok_or("no result")?;
    assert!(result.overall_score() <= 100);
    assert_eq!(result.has_hidden_data(), result.overall_score() > 60);

    let items = history.get_all();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].filename, "second.png");
    Ok(())
}
