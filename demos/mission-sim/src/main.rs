//! Scripted mission console session.
//!
//! Run with: cargo run -p mission-sim
//!
//! Pumps a canned twin-agent session through the store and prints every
//! update a display layer would receive. Pass a backend base URL as the
//! first argument to also submit a demo mission and poll the huddle feed
//! against a live backend.

use std::{convert::Infallible, sync::Arc, time::Duration};

use anyhow::Context;
use mission_console_client::{ClientConfig, HuddleFeed, MissionIssuer, MissionRequest};
use mission_console_core::{AgentId, SessionStore, Transition, Update};
use mission_console_transport::spawn_pump;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SCRIPT: &[&str] = &[
    r#"{"type":"phase","state":"planning"}"#,
    r#"{"type":"status","agent":"claude","state":"active"}"#,
    r#"{"agent":"claude","message":"Sketching the module layout."}"#,
    r#"{"agent":"claude","message":"Handing the plan to codex."}"#,
    r#"{"type":"status","agent":"claude","state":"waiting"}"#,
    r#"{"type":"phase","state":"building"}"#,
    r#"{"type":"status","agent":"codex","state":"active"}"#,
    r#"{"agent":"codex","message":"Implementing the store."}"#,
    r#"{"type":"telemetry","noise":"ignored by the decoder"}"#,
    r#"{"agent":"codex","message":"Tests are green."}"#,
    r#"{"type":"state_change","state":"REVIEWING"}"#,
    r#"{"type":"status","agent":"codex","state":"waiting"}"#,
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let store = Arc::new(SessionStore::new());
    let mut updates = store.updates();

    let frames = futures::stream::iter(
        SCRIPT
            .iter()
            .map(|f| Ok::<_, Infallible>((*f).to_owned()))
            .collect::<Vec<_>>(),
    );
    let _source = spawn_pump(Arc::clone(&store), frames);

    loop {
        let update = updates.recv().await.context("update stream closed")?;
        render(&update);
        if update == Update::Connection(Transition::Disconnected) {
            break;
        }
    }

    let state = store.snapshot();
    println!("\n--- final session ---");
    println!("phase: {:?}", state.phase());
    for agent in AgentId::ALL {
        println!("[{agent}] status: {:?}", state.status(agent));
        for line in state.log(agent) {
            println!("[{agent}] #{:>3} {}", line.seq, line.message);
        }
    }

    if let Some(base_url) = std::env::args().nth(1) {
        run_against_backend(base_url).await?;
    }

    Ok(())
}

fn render(update: &Update) {
    match update {
        Update::Log { agent, line } => println!("[{agent}] {}", line.message),
        Update::Status { agent, state } => println!("[{agent}] -> {state:?}"),
        Update::Phase(phase) => println!("=== phase: {phase:?} ==="),
        Update::Connection(transition) => println!("*** {transition:?} ***"),
        Update::Reset => println!("*** session reset ***"),
    }
}

/// Exercise the command and poll clients against a real backend.
async fn run_against_backend(base_url: String) -> anyhow::Result<()> {
    let config = ClientConfig {
        base_url,
        ..ClientConfig::default()
    };

    let issuer = MissionIssuer::new(&config);
    let ack = issuer
        .start_mission(&MissionRequest::new("Summarize the repository layout"))
        .await
        .context("mission submission failed")?;
    tracing::info!(?ack, "mission accepted");

    let mut feed = HuddleFeed::spawn(&config);
    let mut content = feed.content();
    let poll_window = Duration::from_secs(config.huddle_poll_secs * 3);
    if tokio::time::timeout(poll_window, content.changed()).await.is_ok() {
        println!("--- huddle ---\n{}", *content.borrow());
    } else {
        tracing::info!("no huddle content within the poll window");
    }
    feed.stop();

    Ok(())
}
