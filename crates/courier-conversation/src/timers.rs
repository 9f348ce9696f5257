// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timer arming helpers.

use chrono::{Duration, Utc};

use courier_config::ConversationConfig;
use courier_core::types::{ConversationId, ConversationTimer, TimerStatus, TimerType};
use courier_core::{ConversationStore, CourierError};

/// Which timers a state change arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerArm {
    /// Active state: inactivity and close timers both run.
    Both,
    /// Inactive state: only the close timer keeps running.
    CloseOnly,
}

/// Replaces the conversation's timers for the given arming mode. Existing
/// timers are cancelled first so at most one active timer of each type
/// remains.
pub async fn arm(
    store: &dyn ConversationStore,
    id: &ConversationId,
    arm: TimerArm,
    config: &ConversationConfig,
) -> Result<(), CourierError> {
    store.cancel_timers(id).await?;
    let now = Utc::now();
    if arm == TimerArm::Both {
        store
            .upsert_timer(&ConversationTimer {
                conversation_id: id.clone(),
                timer_type: TimerType::Inactivity,
                status: TimerStatus::Active,
                expires_at: now + Duration::seconds(config.inactivity_secs),
            })
            .await?;
    }
    store
        .upsert_timer(&ConversationTimer {
            conversation_id: id.clone(),
            timer_type: TimerType::Close,
            status: TimerStatus::Active,
            expires_at: now + Duration::seconds(config.close_secs),
        })
        .await?;
    Ok(())
}
