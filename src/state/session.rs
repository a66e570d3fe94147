//! The client session engine.
//!
//! [`GameSession`] owns every piece of local state for one player and is the
//! only way to mutate it. Inbound server events, acknowledgements, user
//! actions and timer ticks each enter through one method and run to
//! completion before the next; there is no interior concurrency.
//!
//! The room mirror is the single source of phase transitions. Both
//! `game_status` and `phase_change` events are funnelled through it, so the
//! clear-on-betting effect fires once per real transition no matter how many
//! events announce it.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::chips::{compute_chip_set, ChipSet};
use super::config::EngineConfig;
use super::door::Door;
use super::error::{EngineError, Result};
use super::feed::LiveFeed;
use super::history::{BetHistoryPager, DoorFrequency, HistoryFilter, HistoryQuery, RoundHistory};
use super::identity::{IdentityStore, Participant, ProfileUpdate};
use super::ledger::{Reconciled, RejectReason, WagerHandle, WagerLedger, WagerLimits};
use super::persist::{PersistedSession, SessionStore};
use super::phase::{Phase, PhaseTransition, TransitionEffects};
use super::protocol::{InboundEvent, OutboundRequest, PhaseAction, PlacedBet, Reply, Settlement};
use super::recent::{RecentRoom, RecentRooms};
use super::room::{Member, PlayMode, RoomConfig, RoomMirror, RoomPatch, RoomSnapshot};
use super::transport::{RequestId, RequestTracker, Transport};

/// Why a request was sent, kept until its reply arrives.
#[derive(Debug, Clone, PartialEq)]
enum Purpose {
    Join { room_id: String },
    Leave,
    Place { wagers: Vec<(Door, WagerHandle)> },
    Cancel { bet_id: String },
    History { query: HistoryQuery },
    Action(PhaseAction),
    RoomsInfo,
}

#[derive(Debug, Clone)]
struct Pending {
    purpose: Purpose,
    request: OutboundRequest,
}

/// Handle returned by a successful optimistic placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWager {
    pub request: RequestId,
    pub handles: Vec<WagerHandle>,
}

/// Things the UI may want to surface transiently.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Joined { room_id: String },
    JoinFailed { room_id: String, message: String },
    PhaseChanged(PhaseTransition),
    RoomDissolved,
    WagerConfirmed { handle: WagerHandle, bet_id: String },
    WagerRejected { handle: WagerHandle, door: Door, amount: u64, reason: String },
    CancellationSucceeded { bet_id: String },
    CancellationFailed { bet_id: String, message: String },
    Settled(Settlement),
    ActionFailed { action: PhaseAction, message: String },
    ServerMessage(String),
}

/// Client-side state engine for one player.
pub struct GameSession<T: Transport, S: SessionStore> {
    config: EngineConfig,
    identity: IdentityStore,
    recent: RecentRooms,
    recent_dirty: bool,
    mirror: RoomMirror,
    ledger: WagerLedger,
    feed: LiveFeed,
    rounds: RoundHistory,
    bet_history: BetHistoryPager,
    requests: RequestTracker<Pending>,
    notifications: Vec<Notification>,
    transport: T,
    store: S,
}

impl<T: Transport, S: SessionStore> GameSession<T, S> {
    /// Restore persisted identity and recent rooms; everything else starts
    /// empty in `waiting`.
    pub fn new(transport: T, store: S, config: EngineConfig) -> Result<Self> {
        let doc = PersistedSession::read(&store)?;
        let identity = IdentityStore::restore(doc.user);
        let recent = RecentRooms::restore(doc.recent_rooms, config.recent_rooms_capacity);

        let mut session = Self {
            feed: LiveFeed::new(config.feed_capacity, config.feed_ttl()),
            bet_history: BetHistoryPager::new(config.history_page_size),
            config,
            identity,
            recent,
            recent_dirty: false,
            mirror: RoomMirror::new(),
            ledger: WagerLedger::new(),
            rounds: RoundHistory::new(),
            requests: RequestTracker::new(),
            notifications: Vec::new(),
            transport,
            store,
        };
        if session.identity.is_dirty() {
            session.persist()?;
        }
        Ok(session)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Write identity and recent rooms if either changed.
    pub fn persist(&mut self) -> Result<()> {
        if !self.identity.is_dirty() && !self.recent_dirty {
            return Ok(());
        }
        let doc = PersistedSession {
            user: self.identity.participant().clone(),
            recent_rooms: self.recent.rooms().to_vec(),
        };
        doc.write(&mut self.store)?;
        self.identity.mark_saved();
        self.recent_dirty = false;
        Ok(())
    }

    /// Persist from an event handler, where failure must not interrupt
    /// state reconciliation.
    fn persist_quietly(&mut self) {
        if let Err(err) = self.persist() {
            warn!(error = %err, "failed to persist session");
        }
    }

    pub fn update_profile(&mut self, update: ProfileUpdate) -> Result<()> {
        self.identity.update_profile(update);
        self.persist()
    }

    // ------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------

    fn send(&mut self, request: OutboundRequest, purpose: Purpose) -> Result<RequestId> {
        if !self.transport.is_connected() {
            return Err(EngineError::Disconnected);
        }
        let id = self.requests.next_id();
        self.transport.send(id, &request)?;
        self.requests.track(id, Pending { purpose, request }, Utc::now());
        Ok(id)
    }

    fn room_id_or(&self, err: impl FnOnce() -> EngineError) -> Result<String> {
        self.mirror.room_id().map(str::to_string).ok_or_else(err)
    }

    /// Join (or create, when `room_config` is given) a room.
    pub fn join_room(&mut self, room_id: &str, room_config: Option<RoomConfig>) -> Result<RequestId> {
        let room_id = room_id.trim();
        if room_id.is_empty() {
            return Err(EngineError::ActionNotAllowed {
                action: "join_room",
                reason: "room id is empty",
            });
        }
        let request = OutboundRequest::JoinRoom {
            room_id: room_id.to_string(),
            user: self.identity.to_json(),
            room_config,
        };
        self.send(
            request,
            Purpose::Join {
                room_id: room_id.to_string(),
            },
        )
    }

    /// Leave the current room. Local state is dropped even if the server
    /// cannot be told.
    pub fn leave_room(&mut self) {
        if let Some(room_id) = self.mirror.room_id().map(str::to_string) {
            let request = OutboundRequest::LeaveRoom {
                room_id: room_id.clone(),
                user_id: self.identity.id().to_string(),
            };
            if let Err(err) = self.send(request, Purpose::Leave) {
                debug!(error = %err, room_id, "leave_room not delivered");
            }
            info!(room_id, "left room");
        }
        self.reset_room_state();
    }

    /// Drop the room through the same effects as a dissolved room, then
    /// start over from a fresh `waiting` mirror.
    fn reset_room_state(&mut self) {
        self.apply_effects(TransitionEffects::room_left());
        self.mirror.reset();
        self.rounds.clear();
        self.bet_history = BetHistoryPager::new(self.config.history_page_size);
        self.requests
            .forget_where(|p| matches!(p.purpose, Purpose::History { .. }));
    }

    /// Ask for live occupancy of the remembered rooms. Answered by a
    /// `rooms_info_res` event; `None` when nothing is remembered.
    pub fn refresh_recent_rooms(&mut self) -> Result<Option<RequestId>> {
        if self.recent.is_empty() {
            return Ok(None);
        }
        let request = OutboundRequest::RoomsInfo {
            room_ids: self.recent.ids().map(str::to_string).collect(),
        };
        self.requests
            .forget_where(|p| matches!(p.purpose, Purpose::RoomsInfo));
        self.send(request, Purpose::RoomsInfo).map(Some)
    }

    fn limits(&self) -> WagerLimits {
        let config = self.mirror.config();
        WagerLimits {
            min_bet: config.min_bet,
            max_bet: config.max_bet,
            balance: self.identity.balance(),
        }
    }

    /// Place one wager optimistically.
    pub fn place_wager(&mut self, door: Door, amount: u64) -> Result<PendingWager> {
        self.place_batch(&[door], amount)
    }

    /// Place the same amount on several doors in one request.
    pub fn place_batch(&mut self, doors: &[Door], amount: u64) -> Result<PendingWager> {
        let room_id = self.room_id_or(|| EngineError::invalid_wager("not in a room"))?;
        let limits = self.limits();
        let handles =
            self.ledger
                .place_batch(doors, amount, &limits, self.mirror.phase(), Utc::now())?;

        let request = OutboundRequest::PlaceBet {
            room_id,
            user_id: self.identity.id().to_string(),
            doors: doors.to_vec(),
            amount,
        };
        let wagers = doors.iter().copied().zip(handles.iter().copied()).collect();
        match self.send(request, Purpose::Place { wagers }) {
            Ok(request) => Ok(PendingWager { request, handles }),
            Err(err) => {
                for handle in handles {
                    self.ledger.reject(handle, &RejectReason::Transport);
                }
                Err(err)
            }
        }
    }

    /// Ask the server to cancel a confirmed wager.
    pub fn request_cancellation(&mut self, bet_id: &str) -> Result<RequestId> {
        self.ledger.begin_cancellation(bet_id, self.mirror.phase())?;

        let request = match self.mirror.room_id() {
            Some(room_id) => OutboundRequest::CancelBet {
                room_id: room_id.to_string(),
                user_id: self.identity.id().to_string(),
                bet_id: bet_id.to_string(),
            },
            None => {
                self.ledger.abort_cancellation(bet_id);
                return Err(EngineError::invalid_wager("not in a room"));
            }
        };
        let purpose = Purpose::Cancel {
            bet_id: bet_id.to_string(),
        };
        self.send(request, purpose).inspect_err(|_| {
            self.ledger.abort_cancellation(bet_id);
        })
    }

    /// Host/dealer round control.
    pub fn request_phase_action(&mut self, action: PhaseAction) -> Result<RequestId> {
        let not_allowed = |reason| EngineError::ActionNotAllowed {
            action: action.as_str(),
            reason,
        };
        let room_id = self.room_id_or(|| not_allowed("not in a room"))?;
        let me = self.identity.id();
        let phase = self.mirror.phase();
        let manual = self.mirror.config().play_mode == PlayMode::Manual;

        match action {
            PhaseAction::StartGame => {
                if !self.mirror.is_host(me) {
                    return Err(not_allowed("only the host can start"));
                }
                if !matches!(phase, Phase::Waiting | Phase::Result) {
                    return Err(not_allowed("a round is already running"));
                }
            }
            PhaseAction::Shake | PhaseAction::Reveal => {
                if !self.mirror.is_dealer(me) {
                    return Err(not_allowed("only the dealer can do this"));
                }
                if !manual {
                    return Err(not_allowed("the table runs automatically"));
                }
                let expected = match action {
                    PhaseAction::Shake => Phase::Betting,
                    _ => Phase::Shaking,
                };
                if phase != expected {
                    return Err(not_allowed("wrong phase"));
                }
            }
        }

        let request = OutboundRequest::PhaseAction {
            room_id,
            user_id: me.to_string(),
            action,
        };
        self.send(request, Purpose::Action(action))
    }

    /// Start a fresh bet-history listing.
    pub fn fetch_history(
        &mut self,
        filter: HistoryFilter,
        selected_user: Option<String>,
    ) -> Result<RequestId> {
        let query = self.bet_history.restart(filter, selected_user);
        self.send_history(query)
    }

    /// Load the next page, if any and if nothing is in flight.
    pub fn fetch_more_history(&mut self) -> Result<Option<RequestId>> {
        match self.bet_history.next() {
            Some(query) => self.send_history(query).map(Some),
            None => Ok(None),
        }
    }

    fn send_history(&mut self, query: HistoryQuery) -> Result<RequestId> {
        let room_id = match self.mirror.room_id() {
            Some(id) => id.to_string(),
            None => {
                self.bet_history.fail(&query);
                return Err(EngineError::ActionNotAllowed {
                    action: "get_bet_history",
                    reason: "not in a room",
                });
            }
        };
        let request = OutboundRequest::BetHistory {
            room_id,
            user_id: self.identity.id().to_string(),
            query: query.clone(),
        };
        self.send(request, Purpose::History { query: query.clone() })
            .inspect_err(|_| self.bet_history.fail(&query))
    }

    // ------------------------------------------------------------------
    // Replies
    // ------------------------------------------------------------------

    /// Decode a raw acknowledgement payload and apply it.
    pub fn handle_reply_json(&mut self, id: RequestId, payload: serde_json::Value) -> Result<()> {
        let Some(in_flight) = self.requests.get(id) else {
            debug!(%id, "reply for unknown request ignored");
            return Ok(());
        };
        let decoded = Reply::decode(&in_flight.purpose.request, payload);
        match decoded {
            Ok(reply) => self.handle_reply(id, reply),
            Err(err) => {
                warn!(%id, error = %err, "protocol mismatch: undecodable reply");
                if let Some(in_flight) = self.requests.resolve(id) {
                    self.abandon(in_flight.purpose.purpose);
                }
                Ok(())
            }
        }
    }

    /// Undo the optimistic side of a request that will never get a usable
    /// answer.
    fn abandon(&mut self, purpose: Purpose) {
        match purpose {
            Purpose::Place { wagers } => self.reject_all(&wagers, "malformed server reply"),
            Purpose::Cancel { bet_id } => {
                self.ledger.abort_cancellation(&bet_id);
                self.notifications.push(Notification::CancellationFailed {
                    bet_id,
                    message: "malformed server reply".to_string(),
                });
            }
            Purpose::History { query } => self.bet_history.fail(&query),
            Purpose::Join { room_id } => self.notifications.push(Notification::JoinFailed {
                room_id,
                message: "malformed server reply".to_string(),
            }),
            Purpose::Action(action) => self.notifications.push(Notification::ActionFailed {
                action,
                message: "malformed server reply".to_string(),
            }),
            Purpose::Leave | Purpose::RoomsInfo => {}
        }
    }

    /// Apply the server's answer to a request.
    ///
    /// Returns `ServerRejected` when the server refused; local optimistic
    /// state has already been rolled back by then. Replies to unknown or
    /// already answered requests are ignored.
    pub fn handle_reply(&mut self, id: RequestId, reply: Reply) -> Result<()> {
        let Some(in_flight) = self.requests.resolve(id) else {
            debug!(%id, "duplicate or unknown reply ignored");
            return Ok(());
        };

        match (in_flight.purpose.purpose, reply) {
            (
                Purpose::Place { wagers },
                Reply::Wager {
                    success,
                    message,
                    placed,
                    new_balance,
                },
            ) => self.reconcile_placement(wagers, success, message, placed, new_balance),
            (
                Purpose::Cancel { bet_id },
                Reply::Cancel {
                    success,
                    message,
                    new_balance,
                },
            ) => self.reconcile_cancellation(bet_id, success, message, new_balance),
            (
                Purpose::Join { room_id },
                Reply::Join {
                    success,
                    message,
                    snapshot,
                },
            ) => self.reconcile_join(room_id, success, message, snapshot.map(|s| *s)),
            (Purpose::History { query }, Reply::History { success, data }) => {
                if success {
                    self.bet_history.receive(&query, data);
                } else {
                    self.bet_history.fail(&query);
                }
                Ok(())
            }
            (Purpose::Action(action), Reply::Ack { success, message }) => {
                if !success {
                    let message = message.unwrap_or_else(|| "action refused".to_string());
                    self.notifications
                        .push(Notification::ActionFailed { action, message: message.clone() });
                    return Err(EngineError::ServerRejected { message });
                }
                Ok(())
            }
            (Purpose::Leave | Purpose::RoomsInfo, _) => Ok(()),
            (purpose, reply) => {
                warn!(%id, ?purpose, ?reply, "protocol mismatch: reply kind does not match request");
                self.abandon(purpose);
                Ok(())
            }
        }
    }

    fn reconcile_placement(
        &mut self,
        wagers: Vec<(Door, WagerHandle)>,
        success: bool,
        message: Option<String>,
        mut placed: Vec<PlacedBet>,
        new_balance: Option<u64>,
    ) -> Result<()> {
        if let Some(balance) = new_balance {
            self.identity.set_balance(balance);
        }

        if !success {
            let message = message.unwrap_or_else(|| "wager refused".to_string());
            self.reject_all(&wagers, &message);
            self.persist_quietly();
            return Err(EngineError::ServerRejected { message });
        }

        for (door, handle) in wagers {
            match placed.iter().position(|p| p.door == door) {
                Some(index) => {
                    let bet = placed.swap_remove(index);
                    if self.ledger.confirm(handle, &bet.bet_id).is_applied() {
                        self.notifications.push(Notification::WagerConfirmed {
                            handle,
                            bet_id: bet.bet_id,
                        });
                    }
                }
                None => self.reject_all(&[(door, handle)], "door not accepted by server"),
            }
        }
        self.persist_quietly();
        Ok(())
    }

    fn reject_all(&mut self, wagers: &[(Door, WagerHandle)], message: &str) {
        let reason = RejectReason::Server(message.to_string());
        for (_, handle) in wagers {
            if let Reconciled::Applied(record) = self.ledger.reject(*handle, &reason) {
                self.notifications.push(Notification::WagerRejected {
                    handle: record.handle,
                    door: record.door,
                    amount: record.amount,
                    reason: message.to_string(),
                });
            }
        }
    }

    fn reconcile_cancellation(
        &mut self,
        bet_id: String,
        success: bool,
        message: Option<String>,
        new_balance: Option<u64>,
    ) -> Result<()> {
        if !success {
            self.ledger.abort_cancellation(&bet_id);
            let message = message.unwrap_or_else(|| "cancellation refused".to_string());
            self.notifications.push(Notification::CancellationFailed {
                bet_id,
                message: message.clone(),
            });
            return Err(EngineError::ServerRejected { message });
        }

        // May already be gone if a bet_cancelled event got here first.
        self.ledger.complete_cancellation(&bet_id);
        if let Some(balance) = new_balance {
            self.identity.set_balance(balance);
            self.persist_quietly();
        }
        self.notifications
            .push(Notification::CancellationSucceeded { bet_id });
        Ok(())
    }

    fn reconcile_join(
        &mut self,
        room_id: String,
        success: bool,
        message: Option<String>,
        snapshot: Option<RoomPatch>,
    ) -> Result<()> {
        if !success {
            let message = message.unwrap_or_else(|| "could not join room".to_string());
            info!(room_id, %message, "join refused");
            self.notifications.push(Notification::JoinFailed {
                room_id,
                message: message.clone(),
            });
            return Err(EngineError::ServerRejected { message });
        }

        self.reset_room_state();
        self.mirror.apply_patch(RoomPatch {
            room_id: Some(Some(room_id.clone())),
            ..Default::default()
        });
        if let Some(patch) = snapshot {
            self.apply_room_patch(patch);
        }
        self.remember_room();
        self.persist_quietly();
        info!(room_id, "joined room");
        self.notifications.push(Notification::Joined { room_id });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Inbound events
    // ------------------------------------------------------------------

    /// Decode and apply a raw server event. Malformed events are logged and
    /// dropped. Returns whether the event was applied.
    pub fn handle_wire(&mut self, name: &str, payload: serde_json::Value) -> bool {
        match InboundEvent::decode(name, payload) {
            Ok(event) => {
                self.handle_event(event);
                true
            }
            Err(err) => {
                warn!(event = name, error = %err, "dropping inbound event");
                false
            }
        }
    }

    /// Apply a server event. Events must be fed in arrival order.
    pub fn handle_event(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::RoomUpdate(patch) => self.apply_room_patch(*patch),
            InboundEvent::Phase(raw) => {
                let outcome = self.mirror.apply_phase(&raw);
                if let Some(transition) = outcome.transition {
                    self.apply_transition(transition);
                }
            }
            InboundEvent::Timer(seconds) => self.mirror.apply_timer(seconds),
            InboundEvent::RemoteWagerPlaced(bet) => {
                let me = self.identity.id().to_string();
                self.feed.record(bet, &me, Utc::now());
            }
            InboundEvent::WagerCancelled { bet_id } => {
                self.feed.remove_by_bet_id(&bet_id);
                if self.ledger.complete_cancellation(&bet_id).is_applied() {
                    info!(bet_id, "wager cancelled by server");
                    self.notifications
                        .push(Notification::CancellationSucceeded { bet_id });
                }
            }
            InboundEvent::Settlement(settlement) => {
                info!(
                    win = settlement.win_amount,
                    profit = settlement.net_profit,
                    "round settled"
                );
                if let Some(balance) = settlement.new_balance {
                    self.identity.set_balance(balance);
                    self.persist_quietly();
                }
                self.notifications.push(Notification::Settled(settlement));
            }
            InboundEvent::ServerMessage(message) => {
                warn!(%message, "server error message");
                self.notifications.push(Notification::ServerMessage(message));
            }
            InboundEvent::RoomsInfo(rooms) => {
                self.requests
                    .forget_where(|p| matches!(p.purpose, Purpose::RoomsInfo));
                if self.recent.refresh(rooms) {
                    self.recent_dirty = true;
                    self.persist_quietly();
                }
            }
        }
    }

    fn apply_room_patch(&mut self, mut patch: RoomPatch) {
        if let Some(Some(entries)) = patch.history.take() {
            self.rounds.extend(entries);
        }
        let outcome = self.mirror.apply_patch(patch);

        if outcome.members_changed {
            let me = self.identity.id();
            let balance = self.mirror.member(me).map(|m| m.current_balance);
            if let Some(balance) = balance {
                self.identity.set_balance(balance);
            }
            self.remember_room();
            self.persist_quietly();
        }
        if let Some(transition) = outcome.transition {
            self.apply_transition(transition);
        }
    }

    fn remember_room(&mut self) {
        let Some(room_id) = self.mirror.room_id() else {
            return;
        };
        let members = &self.mirror.snapshot().members;
        let room = RecentRoom::new(
            room_id,
            members.len(),
            members.iter().map(|m| m.avatar.clone()).collect(),
        );
        if self.recent.remember(room) {
            self.recent_dirty = true;
        }
    }

    fn apply_transition(&mut self, transition: PhaseTransition) {
        let effects = transition.effects();
        debug!(%transition, ?effects, "phase transition");

        self.notifications.push(Notification::PhaseChanged(transition));
        self.apply_effects(effects);
        if effects.drop_room {
            info!("room dissolved");
            self.notifications.push(Notification::RoomDissolved);
        }
    }

    /// The only caller of `WagerLedger::clear`.
    fn apply_effects(&mut self, effects: TransitionEffects) {
        if effects.clear_ledger {
            self.ledger.clear();
        }
        if effects.clear_feed {
            self.feed.clear();
        }
        if effects.reveal_result {
            if let Some(result) = self.mirror.snapshot().last_round_result {
                debug!(?result, "round result revealed");
            }
        }
        if effects.drop_room {
            self.mirror.drop_room();
            self.requests
                .forget_where(|p| matches!(p.purpose, Purpose::Place { .. } | Purpose::Cancel { .. }));
        }
    }

    /// Periodic housekeeping: expire feed entries and, if configured,
    /// demote wagers that never got an answer.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        self.feed.expire(now);

        let Some(timeout) = self.config.pending_timeout() else {
            return;
        };
        let expired = self.ledger.expire_pending(now, timeout);
        if expired.is_empty() {
            return;
        }
        for record in &expired {
            warn!(handle = %record.handle, door = %record.door, "wager timed out");
            self.notifications.push(Notification::WagerRejected {
                handle: record.handle,
                door: record.door,
                amount: record.amount,
                reason: RejectReason::Timeout.to_string(),
            });
        }
        let ledger = &self.ledger;
        self.requests.forget_where(|p| match &p.purpose {
            Purpose::Place { wagers } => wagers.iter().all(|(_, h)| ledger.get(*h).is_none()),
            _ => false,
        });
    }

    // ------------------------------------------------------------------
    // Derived state
    // ------------------------------------------------------------------

    pub fn phase(&self) -> Phase {
        self.mirror.phase()
    }

    pub fn room(&self) -> &RoomSnapshot {
        self.mirror.snapshot()
    }

    pub fn mirror(&self) -> &RoomMirror {
        &self.mirror
    }

    pub fn ledger(&self) -> &WagerLedger {
        &self.ledger
    }

    pub fn feed(&self) -> &LiveFeed {
        &self.feed
    }

    pub fn participant(&self) -> &Participant {
        self.identity.participant()
    }

    pub fn recent_rooms(&self) -> &RecentRooms {
        &self.recent
    }

    pub fn round_history(&self) -> &RoundHistory {
        &self.rounds
    }

    pub fn bet_history(&self) -> &BetHistoryPager {
        &self.bet_history
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Balance minus stakes the server has not debited yet.
    pub fn available_balance(&self) -> u64 {
        self.ledger.available_balance(self.identity.balance())
    }

    /// Chip suggestions for the current table and available balance.
    pub fn chip_set(&self) -> ChipSet {
        let config = self.mirror.config();
        compute_chip_set(config.min_bet, config.max_bet, self.available_balance())
    }

    pub fn can_place(&self) -> bool {
        self.mirror.room_id().is_some() && self.phase().allows_placement()
    }

    pub fn can_cancel(&self) -> bool {
        self.mirror.room_id().is_some() && self.phase().allows_cancellation()
    }

    pub fn is_host(&self) -> bool {
        self.mirror.is_host(self.identity.id())
    }

    pub fn is_dealer(&self) -> bool {
        self.mirror.is_dealer(self.identity.id())
    }

    pub fn leaderboard(&self) -> Vec<&Member> {
        self.mirror.leaderboard()
    }

    pub fn my_rank(&self) -> Option<usize> {
        self.mirror.rank_of(self.identity.id())
    }

    pub fn door_stats(&self) -> Vec<DoorFrequency> {
        self.rounds.door_frequencies(self.config.stats_window)
    }

    pub fn in_flight_requests(&self) -> usize {
        self.requests.len()
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ledger::WagerStatus;
    use crate::state::persist::MemoryStore;
    use crate::state::transport::MemoryTransport;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    type Session = GameSession<MemoryTransport, MemoryStore>;

    const ME: &str = "me-0001";

    fn store_with_me() -> MemoryStore {
        let mut store = MemoryStore::new();
        PersistedSession {
            user: Participant {
                id: Some(ME.to_string()),
                nickname: "Me".to_string(),
                balance: 100_000,
                ..Default::default()
            },
            recent_rooms: vec![],
        }
        .write(&mut store)
        .unwrap();
        store
    }

    fn session() -> Session {
        GameSession::new(MemoryTransport::new(), store_with_me(), EngineConfig::default()).unwrap()
    }

    /// A session seated in room 1234 with the given phase.
    fn seated(phase: &str) -> Session {
        let mut s = session();
        s.handle_wire(
            "room_update",
            json!({
                "roomId": "1234",
                "hostId": ME,
                "currentDealerId": ME,
                "status": phase,
                "config": {"minBet": 5000, "maxBet": 50000},
                "members": [
                    {"userId": ME, "nickname": "Me", "avatar": "🦀", "currentBalance": 100000, "initBalance": 100000},
                    {"userId": "other", "nickname": "Bo", "avatar": "🐓", "currentBalance": 100000, "initBalance": 100000}
                ]
            }),
        );
        s.drain_notifications();
        s
    }

    #[test]
    fn test_fresh_session_is_empty_waiting() {
        let s = session();
        assert_eq!(s.phase(), Phase::Waiting);
        assert!(s.ledger().is_empty());
        assert!(s.feed().is_empty());
        assert!(s.room().room_id.is_none());
        assert_eq!(s.participant().id.as_deref(), Some(ME));
    }

    #[test]
    fn test_new_device_gets_persistent_id() {
        let s: Session =
            GameSession::new(MemoryTransport::new(), MemoryStore::new(), EngineConfig::default())
                .unwrap();
        let id = s.participant().id.clone().unwrap();
        let reloaded = PersistedSession::read(s.store()).unwrap();
        assert_eq!(reloaded.user.id, Some(id));
    }

    #[test]
    fn test_place_and_confirm() {
        let mut s = seated("betting");
        let pending = s.place_wager(Door::Bau, 10_000).unwrap();
        assert_eq!(s.ledger().total_on(Door::Bau), 10_000);
        assert_eq!(s.available_balance(), 90_000);

        let (_, request) = s.transport().last_sent().unwrap();
        assert_eq!(request.event_name(), "place_bet");

        s.handle_reply_json(
            pending.request,
            json!({"success": true, "betId": "srv-1", "newBalance": 90000}),
        )
        .unwrap();

        let record = s.ledger().get(pending.handles[0]).unwrap();
        assert_eq!(record.status, WagerStatus::Confirmed);
        assert_eq!(record.bet_id, "srv-1");
        assert_eq!(s.participant().balance, 90_000);
        assert_eq!(s.available_balance(), 90_000);
    }

    #[test]
    fn test_rejection_restores_everything() {
        let mut s = seated("betting");
        let pending = s.place_wager(Door::Bau, 10_000).unwrap();

        let result = s.handle_reply(
            pending.request,
            Reply::Wager {
                success: false,
                message: Some("Không đủ số dư".into()),
                placed: vec![],
                new_balance: None,
            },
        );

        assert!(matches!(result, Err(EngineError::ServerRejected { .. })));
        assert!(s.ledger().is_empty());
        assert_eq!(s.ledger().total_on(Door::Bau), 0);
        assert_eq!(s.participant().balance, 100_000);
        assert!(s
            .drain_notifications()
            .iter()
            .any(|n| matches!(n, Notification::WagerRejected { door: Door::Bau, .. })));
    }

    #[test]
    fn test_duplicate_confirmation_is_noop() {
        let mut s = seated("betting");
        let pending = s.place_wager(Door::Ca, 5_000).unwrap();
        let reply = Reply::Wager {
            success: true,
            message: None,
            placed: vec![PlacedBet {
                door: Door::Ca,
                bet_id: "srv-7".into(),
            }],
            new_balance: Some(95_000),
        };

        s.handle_reply(pending.request, reply.clone()).unwrap();
        let once = s.ledger().records().to_vec();
        s.handle_reply(pending.request, reply).unwrap();

        assert_eq!(s.ledger().records(), once.as_slice());
        assert_eq!(s.participant().balance, 95_000);
    }

    #[test]
    fn test_partial_batch() {
        let mut s = seated("betting");
        let pending = s.place_batch(&[Door::Bau, Door::Cua, Door::Tom], 5_000).unwrap();
        assert_eq!(s.ledger().total_staked(), 15_000);

        s.handle_reply(
            pending.request,
            Reply::Wager {
                success: true,
                message: None,
                placed: vec![
                    PlacedBet {
                        door: Door::Tom,
                        bet_id: "t".into(),
                    },
                    PlacedBet {
                        door: Door::Bau,
                        bet_id: "b".into(),
                    },
                ],
                new_balance: Some(90_000),
            },
        )
        .unwrap();

        assert_eq!(s.ledger().len(), 2);
        assert_eq!(s.ledger().total_on(Door::Cua), 0);
        assert_eq!(s.ledger().total_on(Door::Bau), 5_000);
        assert_eq!(s.ledger().total_on(Door::Tom), 5_000);
        assert!(s.ledger().totals_consistent());
        assert!(s
            .ledger()
            .records()
            .iter()
            .all(|r| r.status == WagerStatus::Confirmed));
    }

    #[test]
    fn test_place_outside_betting() {
        let mut s = seated("shaking");
        let err = s.place_wager(Door::Ga, 10_000).unwrap_err();
        assert!(matches!(err, EngineError::InvalidWager { .. }));
        assert!(s.transport().sent().is_empty());
    }

    #[test]
    fn test_place_while_disconnected_rolls_back() {
        let mut s = seated("betting");
        s.transport_mut().disconnect();
        assert_eq!(s.place_wager(Door::Ga, 10_000), Err(EngineError::Disconnected));
        assert!(s.ledger().is_empty());
        assert_eq!(s.available_balance(), 100_000);
    }

    #[test]
    fn test_cancel_flow() {
        let mut s = seated("betting");
        let pending = s.place_wager(Door::Nai, 10_000).unwrap();
        s.handle_reply_json(pending.request, json!({"success": true, "betId": "srv-1"}))
            .unwrap();

        let cancel = s.request_cancellation("srv-1").unwrap();
        let (_, request) = s.transport().last_sent().unwrap();
        assert_eq!(request.event_name(), "cancel_bet");

        s.handle_reply_json(cancel, json!({"success": true})).unwrap();
        assert!(s.ledger().is_empty());
        assert_eq!(s.ledger().total_on(Door::Nai), 0);
    }

    #[test]
    fn test_cancel_refused_keeps_record() {
        let mut s = seated("betting");
        let pending = s.place_wager(Door::Nai, 10_000).unwrap();
        s.handle_reply_json(pending.request, json!({"success": true, "betId": "srv-1"}))
            .unwrap();
        let before = s.ledger().records().to_vec();

        let cancel = s.request_cancellation("srv-1").unwrap();
        let result = s.handle_reply_json(cancel, json!({"success": false, "message": "too late"}));

        assert_eq!(
            result,
            Err(EngineError::ServerRejected {
                message: "too late".into()
            })
        );
        assert_eq!(s.ledger().records(), before.as_slice());
    }

    #[test]
    fn test_cancel_outside_betting_sends_nothing() {
        let mut s = seated("betting");
        let pending = s.place_wager(Door::Nai, 10_000).unwrap();
        s.handle_reply_json(pending.request, json!({"success": true, "betId": "srv-1"}))
            .unwrap();
        s.handle_wire("game_status", json!("shaking"));
        let sent_before = s.transport().sent().len();
        let ledger_before = s.ledger().records().to_vec();

        assert_eq!(
            s.request_cancellation("srv-1"),
            Err(EngineError::CancellationWindowClosed {
                phase: Phase::Shaking
            })
        );
        assert_eq!(s.transport().sent().len(), sent_before);
        assert_eq!(s.ledger().records(), ledger_before.as_slice());
    }

    #[test]
    fn test_server_initiated_cancellation() {
        let mut s = seated("betting");
        let pending = s.place_wager(Door::Ga, 5_000).unwrap();
        s.handle_reply_json(pending.request, json!({"success": true, "betId": "srv-3"}))
            .unwrap();

        s.handle_wire("bet_cancelled", json!({"betId": "srv-3"}));
        assert!(s.ledger().is_empty());
    }

    #[test]
    fn test_new_round_clears_stale_state() {
        let mut s = seated("betting");
        for door in [Door::Bau, Door::Cua] {
            let pending = s.place_wager(door, 5_000).unwrap();
            s.handle_reply_json(
                pending.request,
                json!({"success": true, "betId": format!("srv-{door}")}),
            )
            .unwrap();
        }
        s.handle_wire(
            "new_bet",
            json!({"betId": "x", "userId": "other", "door": "ga", "amount": 5000}),
        );
        s.handle_wire("game_status", json!("shaking"));
        s.handle_wire("game_status", json!("result"));
        assert_eq!(s.ledger().len(), 2, "result keeps bets for settlement display");

        s.handle_wire("room_update", json!({"status": "waiting"}));
        assert_eq!(s.ledger().len(), 2);

        s.handle_wire("room_update", json!({"status": "betting"}));
        assert!(s.ledger().is_empty());
        assert!(s.feed().is_empty());
    }

    #[test]
    fn test_duplicate_phase_events_clear_once() {
        let mut s = seated("result");
        s.handle_wire("phase_change", json!({"phase": "betting"}));
        let pending = s.place_wager(Door::Tom, 5_000).unwrap();

        // The same transition announced again must not wipe the new wager.
        s.handle_wire("game_status", json!("betting"));
        assert!(s.ledger().get(pending.handles[0]).is_some());

        let transitions = s
            .drain_notifications()
            .into_iter()
            .filter(|n| matches!(n, Notification::PhaseChanged(_)))
            .count();
        assert_eq!(transitions, 1);
    }

    #[test]
    fn test_unknown_phase_keeps_state() {
        let mut s = seated("betting");
        s.place_wager(Door::Tom, 5_000).unwrap();
        s.handle_wire("game_status", json!("intermission"));
        assert_eq!(s.phase(), Phase::Betting);
        assert_eq!(s.ledger().len(), 1);
    }

    #[test]
    fn test_feed_ignores_own_wagers() {
        let mut s = seated("betting");
        s.handle_wire(
            "new_bet",
            json!({"betId": "1", "userId": ME, "door": "ga", "amount": 5000}),
        );
        s.handle_wire(
            "new_bet",
            json!({"betId": "2", "userId": "other", "door": "ga", "amount": 5000}),
        );
        assert_eq!(s.feed().len(), 1);

        s.handle_wire("bet_cancelled", json!({"betId": "2"}));
        assert!(s.feed().is_empty());
    }

    #[test]
    fn test_feed_capacity_through_session() {
        let mut s = seated("betting");
        for n in 0..25 {
            s.handle_wire(
                "new_bet",
                json!({"betId": format!("b{n}"), "userId": "other", "door": "ca", "amount": 5000}),
            );
        }
        assert_eq!(s.feed().len(), 20);
        assert_eq!(s.feed().events().next().unwrap().bet_id, "b5");
    }

    #[test]
    fn test_finished_drops_room() {
        let mut s = seated("betting");
        s.place_wager(Door::Ca, 5_000).unwrap();
        s.handle_wire("game_status", json!("finished"));

        assert!(s.ledger().is_empty());
        assert!(s.room().room_id.is_none());
        assert!(!s.can_place());
        assert!(s
            .drain_notifications()
            .contains(&Notification::RoomDissolved));
    }

    #[test]
    fn test_join_flow_and_recent_rooms() {
        let mut s = session();
        let id = s.join_room("4321", None).unwrap();
        let (_, request) = s.transport().last_sent().unwrap();
        assert_eq!(request.event_name(), "join_room");
        assert_eq!(request.to_json()["userData"]["id"], ME);

        s.handle_reply_json(
            id,
            json!({
                "success": true,
                "room": {
                    "status": "waiting",
                    "members": [{"userId": ME, "avatar": "🦀", "currentBalance": 100000}]
                }
            }),
        )
        .unwrap();

        assert_eq!(s.room().room_id.as_deref(), Some("4321"));
        assert_eq!(s.recent_rooms().rooms()[0].id, "4321");
        let saved = PersistedSession::read(s.store()).unwrap();
        assert_eq!(saved.recent_rooms[0].id, "4321");
        assert_eq!(saved.recent_rooms[0].avatars, vec!["🦀".to_string()]);
    }

    #[test]
    fn test_join_refused() {
        let mut s = session();
        let id = s.join_room("9999", None).unwrap();
        let result = s.handle_reply_json(id, json!({"success": false, "message": "Phòng đầy"}));
        assert!(matches!(result, Err(EngineError::ServerRejected { .. })));
        assert!(s.room().room_id.is_none());
    }

    #[test]
    fn test_disconnected_fails_fast() {
        let mut s = session();
        s.transport_mut().disconnect();
        assert_eq!(s.join_room("1", None), Err(EngineError::Disconnected));
        assert_eq!(s.in_flight_requests(), 0);
    }

    #[test]
    fn test_balance_synced_from_members() {
        let mut s = seated("result");
        s.handle_wire(
            "room_update",
            json!({"members": [
                {"userId": ME, "currentBalance": 130000, "initBalance": 100000},
                {"userId": "other", "currentBalance": 70000, "initBalance": 100000}
            ]}),
        );
        assert_eq!(s.participant().balance, 130_000);
        assert_eq!(s.my_rank(), Some(1));
    }

    #[test]
    fn test_settlement() {
        let mut s = seated("result");
        s.handle_wire(
            "game_result_individual",
            json!({"winAmount": 20000, "netProfit": 10000, "newBalance": 110000}),
        );
        assert_eq!(s.participant().balance, 110_000);
        assert!(s
            .drain_notifications()
            .iter()
            .any(|n| matches!(n, Notification::Settled(_))));
    }

    #[test]
    fn test_chip_set_tracks_available_balance() {
        let mut s = seated("betting");
        assert_eq!(s.chip_set().all_in, 50_000);
        s.place_wager(Door::Bau, 50_000).unwrap();
        s.place_wager(Door::Cua, 40_000).unwrap();
        let chips = s.chip_set();
        assert_eq!(chips.all_in, 10_000);
        assert_eq!(chips.chips, vec![5_000, 10_000]);
    }

    #[test]
    fn test_pending_timeout() {
        let mut s: Session = GameSession::new(
            MemoryTransport::new(),
            store_with_me(),
            EngineConfig::default().with_pending_timeout(Some(std::time::Duration::from_secs(10))),
        )
        .unwrap();
        s.handle_wire(
            "room_update",
            json!({"roomId": "1", "status": "betting", "config": {"minBet": 5000, "maxBet": 50000}}),
        );
        let pending = s.place_wager(Door::Ga, 5_000).unwrap();

        s.tick(Utc::now() + chrono::Duration::seconds(11));
        assert!(s.ledger().is_empty());
        assert_eq!(s.in_flight_requests(), 0);

        // A late reply changes nothing.
        s.handle_reply_json(pending.request, json!({"success": true, "betId": "late"}))
            .unwrap();
        assert!(s.ledger().is_empty());
    }

    #[test]
    fn test_phase_actions() {
        let mut s = seated("waiting");
        s.request_phase_action(PhaseAction::StartGame).unwrap();
        assert_eq!(
            s.transport().last_sent().unwrap().1.event_name(),
            "start_game"
        );

        // Auto play mode: dealer cannot shake by hand.
        s.handle_wire("game_status", json!("betting"));
        assert!(matches!(
            s.request_phase_action(PhaseAction::Shake),
            Err(EngineError::ActionNotAllowed { .. })
        ));

        s.handle_wire("room_update", json!({"config": {"playMode": "manual"}}));
        assert!(s.request_phase_action(PhaseAction::Shake).is_ok());
        assert!(s.request_phase_action(PhaseAction::Reveal).is_err());
        assert!(s.request_phase_action(PhaseAction::StartGame).is_err());
    }

    #[test]
    fn test_non_host_cannot_start() {
        let mut s = seated("waiting");
        s.handle_wire("room_update", json!({"hostId": "other"}));
        assert!(!s.is_host());
        assert!(s.request_phase_action(PhaseAction::StartGame).is_err());
    }

    #[test]
    fn test_history_paging() {
        let mut s = seated("result");
        let first = s.fetch_history(HistoryFilter::Mine, None).unwrap();
        assert_eq!(s.fetch_more_history().unwrap(), None);

        let page: Vec<serde_json::Value> = (0..10)
            .map(|n| json!({"betId": format!("h{n}"), "door": "bau", "amount": 5000, "profit": 100}))
            .collect();
        s.handle_reply_json(first, json!({"success": true, "data": page}))
            .unwrap();
        assert_eq!(s.bet_history().items().len(), 10);
        assert!(s.bet_history().has_more());

        let second = s.fetch_more_history().unwrap().unwrap();
        s.handle_reply_json(second, json!({"success": true, "data": []}))
            .unwrap();
        assert!(!s.bet_history().has_more());
        assert_eq!(s.bet_history().total_profit(), 1_000);
    }

    #[test]
    fn test_round_history_from_snapshot() {
        let mut s = seated("result");
        s.handle_wire(
            "room_update",
            json!({"history": [
                {"roundId": "r1", "result": ["bau", "bau", "ca"]},
                {"roundId": "r2", "result": ["tom", "cua", "ca"]}
            ]}),
        );
        s.handle_wire(
            "room_update",
            json!({"history": [{"roundId": "r2", "result": ["tom", "cua", "ca"]}]}),
        );
        assert_eq!(s.round_history().len(), 2);
        let ca = s
            .door_stats()
            .into_iter()
            .find(|f| f.door == Door::Ca)
            .unwrap();
        assert_eq!(ca.hits, 2);
    }

    #[test]
    fn test_leave_room_resets() {
        let mut s = seated("betting");
        s.place_wager(Door::Ca, 5_000).unwrap();
        s.leave_room();
        assert_eq!(
            s.transport().last_sent().unwrap().1.event_name(),
            "leave_room"
        );
        assert!(s.ledger().is_empty());
        assert_eq!(s.phase(), Phase::Waiting);
        assert!(s.room().room_id.is_none());
    }

    #[test]
    fn test_profile_update_persists() {
        let mut s = session();
        s.update_profile(ProfileUpdate::nickname("Lan").with_avatar("🦌"))
            .unwrap();
        let saved = PersistedSession::read(s.store()).unwrap();
        assert_eq!(saved.user.nickname, "Lan");
        assert_eq!(saved.user.avatar, "🦌");
        assert_eq!(saved.user.id.as_deref(), Some(ME));
    }

    #[test]
    fn test_room_update_with_both_key_spellings() {
        let mut s = seated("betting");
        let pending = s.place_wager(Door::Bau, 5_000).unwrap();
        s.handle_reply_json(pending.request, json!({"success": true, "betId": "srv-1"}))
            .unwrap();
        s.handle_wire(
            "new_bet",
            json!({"betId": "x", "userId": "other", "door": "ga", "amount": 5000}),
        );
        s.handle_wire("game_status", json!("shaking"));
        s.handle_wire("game_status", json!("result"));

        let applied = s.handle_wire(
            "room_update",
            json!({
                "roomId": "1234",
                "id": "1234",
                "status": "betting",
                "config": {"minBet": 5000, "maxBet": 50000},
                "roomConfig": {"minBet": 5000, "maxBet": 50000}
            }),
        );

        assert!(applied);
        assert_eq!(s.room().room_id.as_deref(), Some("1234"));
        assert_eq!(s.phase(), Phase::Betting);
        assert!(s.ledger().is_empty());
        assert!(s.feed().is_empty());
    }

    #[test]
    fn test_room_update_with_unknown_door_total() {
        let mut s = seated("betting");
        let applied = s.handle_wire(
            "room_update",
            json!({"status": "shaking", "totalBets": {"dragon": 1, "bau": 15000}}),
        );
        assert!(applied);
        assert_eq!(s.phase(), Phase::Shaking);
        assert_eq!(s.room().total_on(Door::Bau), 15_000);
    }

    #[test]
    fn test_undecodable_place_reply_rolls_back() {
        let mut s = seated("betting");
        let pending = s.place_wager(Door::Bau, 10_000).unwrap();

        let result = s.handle_reply_json(pending.request, json!({"success": true, "betId": 42}));

        assert_eq!(result, Ok(()));
        assert!(s.ledger().get(pending.handles[0]).is_none());
        assert_eq!(s.ledger().total_on(Door::Bau), 0);
        assert_eq!(s.available_balance(), 100_000);
        assert_eq!(s.in_flight_requests(), 0);
        assert!(s
            .drain_notifications()
            .iter()
            .any(|n| matches!(n, Notification::WagerRejected { door: Door::Bau, .. })));
    }

    #[test]
    fn test_undecodable_cancel_reply_keeps_wager() {
        let mut s = seated("betting");
        let pending = s.place_wager(Door::Nai, 10_000).unwrap();
        s.handle_reply_json(pending.request, json!({"success": true, "betId": "srv-1"}))
            .unwrap();
        let cancel = s.request_cancellation("srv-1").unwrap();

        s.handle_reply_json(cancel, json!({"success": "yes"})).unwrap();

        let record = s.ledger().find_by_bet_id("srv-1").unwrap();
        assert!(!record.cancelling);
        assert_eq!(s.in_flight_requests(), 0);
        assert!(s.request_cancellation("srv-1").is_ok());
    }

    #[test]
    fn test_refresh_recent_rooms() {
        let mut s = session();
        assert_eq!(s.refresh_recent_rooms(), Ok(None));

        let mut s = seated("waiting");
        s.refresh_recent_rooms().unwrap().unwrap();
        let (_, request) = s.transport().last_sent().unwrap();
        assert_eq!(request.event_name(), "get_rooms_info");
        assert_eq!(request.to_json(), json!(["1234"]));

        let applied = s.handle_wire(
            "rooms_info_res",
            json!([{"id": "1234", "players": 5, "avatars": ["🦀", "🐓", "🐟", "🦐"]}]),
        );

        assert!(applied);
        assert_eq!(s.in_flight_requests(), 0);
        let room = &s.recent_rooms().rooms()[0];
        assert_eq!(room.players, 5);
        assert_eq!(room.avatars.len(), 3);
        let saved = PersistedSession::read(s.store()).unwrap();
        assert_eq!(saved.recent_rooms[0].players, 5);
    }

    #[test]
    fn test_leave_drops_wagers_and_feed() {
        let mut s = seated("betting");
        let pending = s.place_wager(Door::Ca, 5_000).unwrap();
        s.handle_wire(
            "new_bet",
            json!({"betId": "x", "userId": "other", "door": "ga", "amount": 5000}),
        );

        s.leave_room();

        assert!(s.feed().is_empty());
        assert_eq!(s.in_flight_requests(), 1, "only the leave request remains");
        s.handle_reply_json(pending.request, json!({"success": true, "betId": "late"}))
            .unwrap();
        assert!(s.ledger().is_empty());
    }
}
