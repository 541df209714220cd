//! Event announcer.
//!
//! Subscribes to every tournament and forwards engine events to the log and
//! the metrics exporter, tagged with the channel binding each event belongs
//! in. This is the seam a chat integration plugs into.

use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tourney::{EventEnvelope, TournamentManager, lifecycle::SharedSettings};

use crate::metrics;

/// Subscriber id the announcer registers under
pub const ANNOUNCER_ID: &str = "announcer";

/// Buffered events before the engine starts dropping announcements
const ANNOUNCER_CAPACITY: usize = 1024;

/// Attach the announcer to every tournament and spawn its task
///
/// # Arguments
///
/// * `manager` - Tournament manager to subscribe to
///
/// # Returns
///
/// * `JoinHandle<()>` - Task that ends when the manager drops its senders
pub async fn spawn(manager: Arc<TournamentManager>) -> JoinHandle<()> {
    let (tx, rx) = mpsc::channel(ANNOUNCER_CAPACITY);
    manager.subscribe_all(ANNOUNCER_ID, tx).await;

    tokio::spawn(run(manager.shared_settings(), rx))
}

async fn run(settings: SharedSettings, mut rx: mpsc::Receiver<EventEnvelope>) {
    while let Some(envelope) = rx.recv().await {
        let channel = channel_for(&settings, &envelope).await;
        announce(&envelope, channel.as_deref());
    }
    tracing::info!("Announcer stopped");
}

/// Channel the event is posted to, `None` when its binding is unset
async fn channel_for(settings: &SharedSettings, envelope: &EventEnvelope) -> Option<String> {
    let settings = Arc::clone(&*settings.read().await);
    match settings.channels.require(envelope.event.binding()) {
        Ok(channel) => Some(channel.to_string()),
        Err(e) => {
            tracing::debug!(kind = envelope.event.kind(), "Not announced: {}", e);
            None
        }
    }
}

fn announce(envelope: &EventEnvelope, channel: Option<&str>) {
    metrics::engine_event(&envelope.event);
    tracing::info!(
        tournament_id = %envelope.tournament_id,
        kind = envelope.event.kind(),
        channel = channel.unwrap_or("-"),
        "{}",
        envelope.event
    );
}
