//! Shadow Strike Server
//!
//! `shadow-strike-server [serve]` runs the WebSocket arena.
//! `shadow-strike-server demo` plays a scripted round in-process and exits.

use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use shadow_strike::{
    battle::ArenaError,
    network::{ArenaServer, Authenticator},
    Arena, LocalCoprocessor, PlayerId, Settings, VERSION,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env().context("invalid configuration")?;
    info!("Shadow Strike Server v{}", VERSION);

    let backend = Arc::new(LocalCoprocessor::new(settings.coprocessor.clone()));
    let arena = Arc::new(Arena::new(backend, settings.arena.clone()));

    match std::env::args().nth(1).as_deref() {
        None | Some("serve") => serve(settings, arena).await,
        Some("demo") => demo(&arena).await,
        Some(other) => bail!("unknown command {other:?}, expected `serve` or `demo`"),
    }
}

async fn serve(settings: Settings, arena: Arc<Arena<LocalCoprocessor>>) -> anyhow::Result<()> {
    let auth = if settings.auth.is_configured() {
        Some(Authenticator::new(&settings.auth).context("invalid auth configuration")?)
    } else {
        warn!("No token key configured; clients will not be able to authenticate");
        None
    };

    let server = Arc::new(ArenaServer::new(settings.server, arena, auth));
    let runner = Arc::clone(&server);
    let mut handle = tokio::spawn(async move { runner.run().await });

    tokio::select! {
        joined = &mut handle => {
            joined.context("server task panicked")??;
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            info!("Ctrl-C received, shutting down");
            server.shutdown();
        }
    }

    handle.await.context("server task panicked")??;
    Ok(())
}

/// Scripted round: two players fight, each opens their own result, an
/// outsider is refused.
async fn demo(arena: &Arena<LocalCoprocessor>) -> anyhow::Result<()> {
    info!("=== Starting Demo Round ===");

    let alice = PlayerId::derive("demo-alice");
    let bob = PlayerId::derive("demo-bob");
    let carol = PlayerId::derive("demo-carol");

    for (who, name) in [(alice, "Alice"), (bob, "Bob"), (carol, "Carol")] {
        let reg = arena.register_player(who, name).await?;
        info!("Registered {} as {} (tx {})", name, who.short(), reg.tx);
    }

    match arena.register_player(alice, "Alice again").await {
        Err(ArenaError::AlreadyRegistered(_)) => info!("Duplicate registration refused"),
        other => bail!("duplicate registration was not refused: {other:?}"),
    }

    let resolved = arena.battle(alice, bob).await?;
    info!(
        "Battle #{} resolved: {} vs {}",
        resolved.battle_id,
        alice.short(),
        bob.short()
    );

    let alice_outcome = arena.request_decrypt(alice, resolved.battle_id).await?;
    let bob_outcome = arena.request_decrypt(bob, resolved.battle_id).await?;
    info!("Alice sees {:?}, Bob sees {:?}", alice_outcome, bob_outcome);

    match arena.request_decrypt(carol, resolved.battle_id).await {
        Err(err @ ArenaError::EntryUnavailable { .. }) => info!("Carol refused: {}", err),
        other => bail!("outsider decryption was not refused: {other:?}"),
    }

    let alice_stats = arena.reveal_own_stats(alice).await?;
    let bob_stats = arena.reveal_own_stats(bob).await?;
    info!("Alice stats {:?} (power {})", alice_stats, alice_stats.power());
    info!("Bob stats {:?} (power {})", bob_stats, bob_stats.power());

    if alice_stats.outcome_against(&bob_stats) != alice_outcome {
        bail!("decrypted outcome disagrees with revealed stats");
    }
    info!("OUTCOME VERIFIED: encrypted result matches revealed stats");

    info!("Ledger digest: {}", hex::encode(arena.ledger_digest().await));
    Ok(())
}
