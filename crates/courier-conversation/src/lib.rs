// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation lifecycle state machine.
//!
//! Tracks per-conversation state (`active`/`inactive`/`closed`) driven by
//! message activity and two timers. Transitions are restricted to a fixed
//! adjacency table:
//!
//! ```text
//! active   -> inactive | closed
//! inactive -> active   | closed
//! closed   -> active            (reopen only)
//! ```
//!
//! Every transition appends one immutable history record in the same store
//! commit that changes the state, so no reader ever observes a state whose
//! causing transition is not yet in history.

pub mod timers;

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use courier_config::ConversationConfig;
use courier_core::types::{
    AccountId, ConversationId, ConversationRecord, ConversationState, TimerType,
    TransitionRecord, TransitionTrigger,
};
use courier_core::{ConversationStore, CourierError};

use crate::timers::TimerArm;

/// Whether the adjacency table permits `from -> to`.
pub fn allowed_transition(from: ConversationState, to: ConversationState) -> bool {
    use ConversationState::*;
    matches!(
        (from, to),
        (Active, Inactive) | (Active, Closed) | (Inactive, Active) | (Inactive, Closed)
            | (Closed, Active)
    )
}

/// Conversation lifecycle tracker over the store contract.
pub struct ConversationTracker {
    store: Arc<dyn ConversationStore>,
    config: ConversationConfig,
}

impl ConversationTracker {
    pub fn new(config: ConversationConfig, store: Arc<dyn ConversationStore>) -> Self {
        Self { store, config }
    }

    /// Loads a conversation, creating it as `active` (with both timers
    /// armed) when absent.
    pub async fn ensure(
        &self,
        id: &ConversationId,
        account_id: &AccountId,
    ) -> Result<ConversationRecord, CourierError> {
        if let Some(record) = self.store.get_conversation(id).await? {
            return Ok(record);
        }
        let record = ConversationRecord {
            id: id.clone(),
            account_id: account_id.clone(),
            state: ConversationState::Active,
            state_changed_at: Utc::now(),
            closed_at: None,
            closed_reason: None,
            history: Vec::new(),
            version: 0,
        };
        if !self.store.put_conversation(&record, None).await? {
            // Created concurrently; use the committed record.
            return self
                .store
                .get_conversation(id)
                .await?
                .ok_or_else(|| {
                    CourierError::Internal(format!("conversation vanished during create: {id}"))
                });
        }
        self.arm_timers(id, TimerArm::Both).await?;
        debug!(conversation = %id, "conversation created active");
        Ok(record)
    }

    /// Current state, or `None` for an unknown conversation.
    pub async fn state(
        &self,
        id: &ConversationId,
    ) -> Result<Option<ConversationState>, CourierError> {
        Ok(self.store.get_conversation(id).await?.map(|r| r.state))
    }

    /// Full record including transition history.
    pub async fn get(
        &self,
        id: &ConversationId,
    ) -> Result<Option<ConversationRecord>, CourierError> {
        self.store.get_conversation(id).await
    }

    /// New inbound/outbound activity on the conversation.
    ///
    /// While not closed, activity reactivates the conversation and re-arms
    /// both timers. A closed conversation ignores activity; reopening is an
    /// explicit agent action.
    pub async fn record_activity(
        &self,
        id: &ConversationId,
        account_id: &AccountId,
    ) -> Result<ConversationRecord, CourierError> {
        let record = self.ensure(id, account_id).await?;
        match record.state {
            ConversationState::Closed => {
                debug!(conversation = %id, "activity on closed conversation ignored");
                Ok(record)
            }
            ConversationState::Inactive => {
                self.transition(
                    id,
                    ConversationState::Active,
                    "message_activity",
                    TransitionTrigger::Message,
                    None,
                )
                .await
            }
            ConversationState::Active => {
                // No state change, but activity still resets both timers.
                self.arm_timers(id, TimerArm::Both).await?;
                Ok(record)
            }
        }
    }

    /// Explicit transition requested by an agent, with a caller-supplied
    /// reason. Permitted anywhere within the adjacency table.
    pub async fn manual_transition(
        &self,
        id: &ConversationId,
        to: ConversationState,
        reason: &str,
        agent_id: Option<String>,
    ) -> Result<ConversationRecord, CourierError> {
        self.transition(id, to, reason, TransitionTrigger::Agent, agent_id)
            .await
    }

    /// Applies one transition: validates the adjacency table, appends the
    /// history record, commits state and history atomically, then adjusts
    /// timers for the new state.
    ///
    /// The commit is a versioned compare-and-set. Losing the race to a
    /// concurrent commit re-reads the conversation and re-validates the
    /// transition against its new state, so no committed history record is
    /// ever overwritten.
    pub async fn transition(
        &self,
        id: &ConversationId,
        to: ConversationState,
        reason: &str,
        triggered_by: TransitionTrigger,
        agent_id: Option<String>,
    ) -> Result<ConversationRecord, CourierError> {
        let (record, from) = loop {
            let Some(mut record) = self.store.get_conversation(id).await? else {
                return Err(CourierError::Internal(format!(
                    "unknown conversation: {id}"
                )));
            };
            let from = record.state;
            if !allowed_transition(from, to) {
                return Err(CourierError::InvalidTransition { from, to });
            }

            let now = Utc::now();
            record.history.push(TransitionRecord {
                previous_state: from,
                new_state: to,
                reason: reason.to_string(),
                triggered_by,
                agent_id: agent_id.clone(),
                at: now,
            });
            record.state = to;
            record.state_changed_at = now;
            match to {
                ConversationState::Closed => {
                    record.closed_at = Some(now);
                    record.closed_reason = Some(reason.to_string());
                }
                ConversationState::Active => {
                    // Reopen clears the closed markers.
                    record.closed_at = None;
                    record.closed_reason = None;
                }
                ConversationState::Inactive => {}
            }
            let expected = record.version;
            record.version += 1;
            if self.store.put_conversation(&record, Some(expected)).await? {
                break (record, from);
            }
            debug!(conversation = %id, %to, "transition commit lost a race, retrying");
        };

        match to {
            ConversationState::Active => self.arm_timers(id, TimerArm::Both).await?,
            ConversationState::Inactive => self.arm_timers(id, TimerArm::CloseOnly).await?,
            ConversationState::Closed => self.store.cancel_timers(id).await?,
        }

        info!(
            conversation = %id,
            from = %from,
            to = %to,
            trigger = %triggered_by,
            reason,
            "conversation transition"
        );
        Ok(record)
    }

    /// One timer sweep: fires active timers past `expires_at`, each exactly
    /// once (store-level `active -> fired` compare-and-set), and applies the
    /// corresponding state transition. Returns how many transitions were
    /// applied.
    pub async fn process_expired_timers(&self) -> Result<usize, CourierError> {
        let now = Utc::now();
        let batch = self
            .store
            .expired_timers(now, self.config.timer_batch)
            .await?;
        let mut applied = 0usize;
        for timer in batch {
            if !self
                .store
                .mark_timer_fired(&timer.conversation_id, timer.timer_type)
                .await?
            {
                // Lost the race: cancelled or already fired elsewhere.
                continue;
            }
            let outcome = match timer.timer_type {
                TimerType::Inactivity => {
                    self.fire_inactivity(&timer.conversation_id).await
                }
                TimerType::Close => self.fire_close(&timer.conversation_id).await,
            };
            match outcome {
                Ok(true) => applied += 1,
                Ok(false) => {}
                Err(e) => {
                    debug!(conversation = %timer.conversation_id, error = %e,
                        "timer transition skipped");
                }
            }
        }
        Ok(applied)
    }

    /// Inactivity timer fired: only an active conversation goes inactive.
    async fn fire_inactivity(&self, id: &ConversationId) -> Result<bool, CourierError> {
        match self.state(id).await? {
            Some(ConversationState::Active) => {
                self.transition(
                    id,
                    ConversationState::Inactive,
                    "inactivity_timeout",
                    TransitionTrigger::InactivityTimer,
                    None,
                )
                .await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Close timer fired: active or inactive conversations close.
    async fn fire_close(&self, id: &ConversationId) -> Result<bool, CourierError> {
        match self.state(id).await? {
            Some(ConversationState::Active) | Some(ConversationState::Inactive) => {
                self.transition(
                    id,
                    ConversationState::Closed,
                    "auto_close_timeout",
                    TransitionTrigger::CloseTimer,
                    None,
                )
                .await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn arm_timers(&self, id: &ConversationId, arm: TimerArm) -> Result<(), CourierError> {
        timers::arm(self.store.as_ref(), id, arm, &self.config).await
    }
}
