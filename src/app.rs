//! Command dispatch
//!
//! Wires the settings, stores, analyzers and the terminal front end
//! together for each subcommand.

use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::analyzer::Analyzer;
use crate::cli::{Args, Command, Feature, HistoryAction};
use crate::config::Settings;
use crate::deepfake::{ClassifierService, DeepfakeDetector, HubModelLoader};
use crate::errors::{TruthError, TruthResult};
use crate::exporter::{Snapshot, SnapshotExporter};
use crate::history::HistoryStore;
use crate::models::{AnalysisKind, DeepfakeResult, HistoryItem, StegoResult};
use crate::session::{AnalysisOutcome, AnalysisSession};
use crate::stego::MockStegoAnalyzer;
use crate::ui::{format_file_size, TerminalUi};
use crate::upload::{ImageUpload, PreviewMode};
use crate::watcher::HistoryWatcher;

/// Room for every event of one session; the front end drains as it goes
const EVENT_BUFFER: usize = 32;

pub async fn run(args: Args) -> TruthResult<()> {
    let settings = Settings::from_args(&args);
    let ui = TerminalUi::new(settings.quiet)?;
    let kind = args.command.kind();

    match &args.command {
        Command::Stego { image, export } => {
            let history = Arc::new(open_history::<StegoResult>(&settings, kind)?);
            let analyzer = Arc::new(MockStegoAnalyzer::new());
            analyze_image(&ui, analyzer, history, image, export.as_deref(), settings.preview).await
        }
        Command::Deepfake { image, export } => {
            let history = Arc::new(open_history::<DeepfakeResult>(&settings, kind)?);
            let loader = Arc::new(HubModelLoader::new(settings.hub.clone())?);
            let analyzer = Arc::new(DeepfakeDetector::new(Arc::new(ClassifierService::new(loader))));
            analyze_image(&ui, analyzer, history, image, export.as_deref(), settings.preview).await
        }
        Command::History { feature, action } => match feature {
            Feature::Stego => history_command::<StegoResult>(&ui, &settings, kind, action).await,
            Feature::Deepfake => history_command::<DeepfakeResult>(&ui, &settings, kind, action).await,
        },
    }
}

fn open_history<R>(settings: &Settings, kind: AnalysisKind) -> TruthResult<HistoryStore<R>>
where
    R: Serialize + DeserializeOwned + Clone,
{
    let backend = settings.open_backend()?;
    Ok(HistoryStore::new(backend, kind.storage_key(), settings.capacity_for(kind)))
}

/// Run one full session on `image`. Ctrl-C resets the session.
async fn analyze_image<A>(
    ui: &TerminalUi,
    analyzer: Arc<A>,
    history: Arc<HistoryStore<A::Output>>,
    image: &Path,
    export: Option<&Path>,
    preview: PreviewMode,
) -> TruthResult<()>
where
    A: Analyzer,
    A::Output: Snapshot,
{
    let upload = ImageUpload::load(image, preview).await?;
    ui.print_notice(&format!(
        "{} ({}, {})",
        upload.filename(),
        upload.mime(),
        format_file_size(upload.size())
    ));

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let session = AnalysisSession::new(analyzer, history).with_events(tx);
    session.select_file(upload)?;
    let ticket = session.start_analysis()?;

    let work = async move {
        let outcome = tokio::select! {
            outcome = ticket.outcome() => outcome,
            _ = tokio::signal::ctrl_c() => {
                log::warn!("Interrupted, resetting session");
                session.reset();
                AnalysisOutcome::Cancelled
            }
        };
        let item = session.completed_item();
        // Dropping the session closes the event channel and ends the UI loop
        drop(session);
        (outcome, item)
    };

    let ((outcome, item), ()) = tokio::join!(work, ui.run(rx));

    match (outcome, item) {
        (AnalysisOutcome::Completed(_), Some(item)) => {
            ui.print_item(&item);
            if let Some(base) = export {
                let path = SnapshotExporter::new().export(&item, base)?;
                ui.print_notice(&format!("Snapshot written to {}", path.display()));
            }
            Ok(())
        }
        (AnalysisOutcome::Failed(e), _) => Err(e),
        (_, _) => {
            log::warn!("Analysis cancelled");
            Ok(())
        }
    }
}

async fn history_command<R>(
    ui: &TerminalUi,
    settings: &Settings,
    kind: AnalysisKind,
    action: &HistoryAction,
) -> TruthResult<()>
where
    R: Snapshot + Serialize + DeserializeOwned + Clone,
{
    let history = open_history::<R>(settings, kind)?;

    match action {
        HistoryAction::List => {
            ui.print_history(&history.get_all(), history.capacity());
        }
        HistoryAction::Show { id } => {
            let item = find(&history, kind, id)?;
            ui.print_item(&item);
        }
        HistoryAction::Export { id, output } => {
            let item = find(&history, kind, id)?;
            let path = SnapshotExporter::new().export(&item, output)?;
            ui.print_notice(&format!("Snapshot written to {}", path.display()));
        }
        HistoryAction::Clear => {
            history.clear()?;
            ui.print_notice(&format!("{} history cleared", kind));
        }
        HistoryAction::Watch => {
            let store = settings.open_file_store()?.ok_or_else(|| {
                TruthError::external("history watch", "needs on-disk storage (drop --ephemeral)")
            })?;
            let watcher = HistoryWatcher::new(&store, history.key())?;

            ui.print_history(&history.get_all(), history.capacity());
            tokio::select! {
                res = watcher.watch(|| ui.print_history(&history.get_all(), history.capacity())) => res?,
                _ = tokio::signal::ctrl_c() => log::info!("Stopped watching"),
            }
        }
    }

    Ok(())
}

fn find<R>(history: &HistoryStore<R>, kind: AnalysisKind, id: &str) -> TruthResult<HistoryItem<R>>
where
    R: Serialize + DeserializeOwned + Clone,
{
    history.get_by_id(id).ok_or_else(|| TruthError::NotFound {
        kind,
        id: id.to_string(),
    })
}
