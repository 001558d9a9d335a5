//! Example: scripted voice session walk.
//!
//! Runs the session controller over placeholder collaborators and replays
//! a short wake / recognize / dispatch conversation, printing the state
//! snapshot after each step.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use vesper_core::{AppExecutor, AppRegistration, Lifetime, PlaceholderExecutor};
use vesper_voice::{SessionConfig, SessionServices, VoiceSession};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Voice session demo: wake, recognize, dispatch, settle.");

    let executor: Arc<dyn AppExecutor> = Arc::new(PlaceholderExecutor);
    let mut registry = HashMap::new();
    registry.insert("music".to_string(), AppRegistration::new(executor));
    let life = Arc::new(Mutex::new(Lifetime::new(registry)));
    {
        let mut guard = life.lock().await;
        guard.create_app("music").await?;
        guard.activate_app("music").await?;
    }

    let (session, join) = VoiceSession::spawn(
        life,
        SessionServices::placeholder(),
        SessionConfig::from_env(),
    );

    let script = [
        ("voice-coming", None),
        ("start-voice", None),
        ("asr-pending", None),
        ("asr-end", None),
        (
            "nlp-result",
            Some(json!({"asr": "play jazz", "nlp": {"intent": "play"}, "action": {}})),
        ),
        ("end-voice", None),
    ];

    for (name, payload) in script {
        session.dispatch(name, payload)?;
        let status = session.status().await?;
        info!(
            event = name,
            awaken = status.awaken,
            asr = ?status.asr_state,
            picking_up = status.picking_up,
            "step"
        );
    }

    info!("Muting the microphone ends the conversation.");
    session.set_muted(Some(true)).await?;
    drop(session);
    join.await?;

    Ok(())
}
