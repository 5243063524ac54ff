//! Arena
//!
//! Single entry point for every battle operation. Owns the registry, vault
//! and ledger behind one async `RwLock`:
//!
//! - registration and battles take the write lock, so mutations are
//!   serialized and each one is all-or-nothing;
//! - queries take the read lock;
//! - decryption reads the handle under the read lock, releases it, and only
//!   then awaits the oracle, so a slow round trip never blocks the arena.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info};

use crate::battle::authority::DecryptionAuthority;
use crate::battle::engine;
use crate::battle::error::{ArenaError, ErrorKind};
use crate::battle::events::{ArenaEvent, BattleResolved, PlayerRegistered, TxHandle, TxKind};
use crate::battle::ledger::{BattleId, BattleLedger, HistoryEntry};
use crate::battle::player::Player;
use crate::battle::registry::PlayerRegistry;
use crate::battle::rules::{BattleOutcome, PlainStats};
use crate::battle::vault::AttributeVault;
use crate::core::hash::Digest32;
use crate::core::identity::PlayerId;
use crate::fhe::{DecryptionOracle, FheEvaluator};

/// Arena tuning.
#[derive(Clone, Debug)]
pub struct ArenaConfig {
    /// Bound on each decryption round trip.
    pub decrypt_timeout: Duration,
    /// Buffered events per subscriber before lagging ones drop messages.
    pub event_capacity: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            decrypt_timeout: Duration::from_secs(10),
            event_capacity: 256,
        }
    }
}

/// Result of a successful registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    /// Confirmation handle.
    pub tx: TxHandle,
    /// The new player.
    pub player: Player,
}

/// Mutable arena state guarded by a single lock.
#[derive(Debug, Default)]
struct ArenaState {
    registry: PlayerRegistry,
    vault: AttributeVault,
    ledger: BattleLedger,
    sequence: u64,
}

impl ArenaState {
    fn next_tx(&mut self, kind: TxKind, origin: &PlayerId) -> TxHandle {
        self.sequence += 1;
        TxHandle::derive(self.sequence, kind, origin)
    }
}

/// Encrypted battle arena over a backend `B`.
pub struct Arena<B> {
    backend: Arc<B>,
    state: RwLock<ArenaState>,
    authority: DecryptionAuthority,
    events: broadcast::Sender<ArenaEvent>,
}

impl<B: FheEvaluator + DecryptionOracle> Arena<B> {
    /// Create an empty arena.
    pub fn new(backend: Arc<B>, config: ArenaConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            backend,
            state: RwLock::new(ArenaState::default()),
            authority: DecryptionAuthority::new(config.decrypt_timeout),
            events,
        }
    }

    /// Shared backend handle.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Subscribe to confirmations of committed mutations.
    pub fn subscribe(&self) -> broadcast::Receiver<ArenaEvent> {
        self.events.subscribe()
    }

    /// Register `who` with a freshly drawn encrypted stat triple.
    pub async fn register_player(
        &self,
        who: PlayerId,
        name: &str,
    ) -> Result<Registration, ArenaError> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let result = state
            .registry
            .register(&mut state.vault, self.backend.as_ref(), who, name, now())
            .map(|entry| entry.index);
        let index = result.inspect_err(|err| log_failure("register_player", err))?;

        let player = state.registry.player(&state.vault, &who)?;
        let tx = state.next_tx(TxKind::Register, &who);
        drop(guard);

        info!(player = %who.short(), name = %player.name, index, tx = ?tx, "Player registered");
        self.publish(ArenaEvent::PlayerRegistered(PlayerRegistered {
            tx,
            player: who,
            name: player.name.clone(),
            index,
        }));

        Ok(Registration { tx, player })
    }

    /// Resolve a battle and record it in the ledger.
    pub async fn battle(
        &self,
        challenger: PlayerId,
        opponent: PlayerId,
    ) -> Result<BattleResolved, ArenaError> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let outcomes = engine::resolve(
            &state.registry,
            &state.vault,
            self.backend.as_ref(),
            challenger,
            opponent,
        )
        .inspect_err(|err| log_failure("battle", err))?;

        let created_at = now();
        let battle_id = state
            .ledger
            .append(challenger, opponent, outcomes, created_at)
            .inspect_err(|err| log_failure("battle", err))?;
        let tx = state.next_tx(TxKind::Battle, &challenger);
        drop(guard);

        let resolved = BattleResolved {
            tx,
            battle_id,
            challenger,
            opponent,
            challenger_outcome: outcomes.challenger,
            created_at,
        };
        info!(
            battle_id,
            challenger = %challenger.short(),
            opponent = %opponent.short(),
            tx = ?tx,
            "Battle resolved"
        );
        self.publish(ArenaEvent::BattleResolved(resolved.clone()));

        Ok(resolved)
    }

    /// Public record of one player.
    pub async fn get_player(&self, who: &PlayerId) -> Result<Player, ArenaError> {
        let state = self.state.read().await;
        state.registry.player(&state.vault, who)
    }

    /// Every player in registration order.
    pub async fn get_all_players(&self) -> Result<Vec<Player>, ArenaError> {
        let state = self.state.read().await;
        state.registry.players(&state.vault)
    }

    /// Identities in registration order.
    pub async fn player_ids(&self) -> Vec<PlayerId> {
        self.state.read().await.registry.ids().to_vec()
    }

    /// Battle history of `who`; empty for unknown identities.
    pub async fn get_battle_history(&self, who: &PlayerId) -> Vec<HistoryEntry> {
        self.state.read().await.ledger.history(who).to_vec()
    }

    /// Decrypt the requester's own outcome of `battle_id`.
    pub async fn request_decrypt(
        &self,
        requester: PlayerId,
        battle_id: BattleId,
    ) -> Result<BattleOutcome, ArenaError> {
        let outcome = {
            let state = self.state.read().await;
            DecryptionAuthority::locate(&state.ledger, &requester, battle_id)
        };
        let outcome = outcome.inspect_err(|err| log_failure("request_decrypt", err))?;

        self.authority
            .open_outcome(self.backend.as_ref(), requester, battle_id, outcome)
            .await
            .inspect_err(|err| log_failure("request_decrypt", err))
    }

    /// Decrypt the requester's own attribute triple.
    pub async fn reveal_own_stats(&self, requester: PlayerId) -> Result<PlainStats, ArenaError> {
        let stats = {
            let state = self.state.read().await;
            if !state.registry.contains(&requester) {
                return Err(ArenaError::NotRegistered(requester));
            }
            state.vault.read(&requester)?
        };

        self.authority
            .open_stats(self.backend.as_ref(), requester, stats)
            .await
            .inspect_err(|err| log_failure("reveal_own_stats", err))
    }

    /// Running digest over the battle ledger.
    pub async fn ledger_digest(&self) -> Digest32 {
        self.state.read().await.ledger.digest()
    }

    /// Number of recorded battles.
    pub async fn battle_count(&self) -> usize {
        self.state.read().await.ledger.len()
    }

    /// Number of registered players.
    pub async fn player_count(&self) -> usize {
        self.state.read().await.registry.len()
    }

    fn publish(&self, event: ArenaEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }
}

fn log_failure(operation: &'static str, err: &ArenaError) {
    match err.kind() {
        ErrorKind::Integrity => error!(operation, error = %err, "Integrity failure, operation aborted"),
        _ => debug!(operation, error = %err, "Operation rejected"),
    }
}

fn now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

// =============================================================================
// TESTS
// =============================================================================
