// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel router: single entry point over the channel adapters.
//!
//! The router owns one adapter per [`ChannelType`], spawns one event pull
//! loop per adapter, and fans inbound events out to registered handlers.
//! Adapter failures are normalized into result shapes at this boundary and
//! never propagate to callers as raw errors.
//!
//! Lifecycle: `Uninitialized -> Initializing -> Ready -> ShuttingDown ->
//! Uninitialized`. Only `Ready` routes calls with effect; everything else
//! answers with not-found/no-op results.

pub mod handlers;

pub use handlers::{EventHandler, HandlerSet};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use courier_core::types::{
    AccountId, ChannelCapabilities, ChannelType, ConnectionResult, ConnectionStatus,
    MediaParams, SendJob, SendParams, SendResult,
};
use courier_core::{ChannelAdapter, CourierError};
use courier_queue::SendExecutor;

/// Router lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    Uninitialized,
    Initializing,
    Ready,
    ShuttingDown,
}

/// Owns the channel adapters and exposes a uniform operation set.
pub struct ChannelRouter {
    adapters: DashMap<ChannelType, Arc<dyn ChannelAdapter>>,
    handlers: Arc<HandlerSet>,
    state: Mutex<RouterState>,
    cancel: Mutex<CancellationToken>,
    pull_loops: Mutex<TaskTracker>,
}

impl Default for ChannelRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRouter {
    pub fn new() -> Self {
        Self {
            adapters: DashMap::new(),
            handlers: Arc::new(HandlerSet::default()),
            state: Mutex::new(RouterState::Uninitialized),
            cancel: Mutex::new(CancellationToken::new()),
            pull_loops: Mutex::new(TaskTracker::new()),
        }
    }

    pub fn state(&self) -> RouterState {
        *self.state.lock().expect("router state lock poisoned")
    }

    fn set_state(&self, state: RouterState) {
        *self.state.lock().expect("router state lock poisoned") = state;
    }

    /// Registers an inbound event handler. Handlers receive every event
    /// from every adapter; registration order is delivery order.
    pub fn register_handler(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.register(handler);
    }

    /// Initializes the given adapters and registers each one that starts
    /// successfully. One adapter failing to initialize is logged and does
    /// not abort the others; partial availability is acceptable.
    pub async fn initialize(&self, adapters: Vec<Arc<dyn ChannelAdapter>>) {
        self.set_state(RouterState::Initializing);
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();

        for adapter in adapters {
            let channel = adapter.channel_type();
            if let Err(e) = adapter.initialize().await {
                warn!(channel = %channel, error = %e, "adapter failed to initialize, skipping");
                continue;
            }
            tracker.spawn(pull_loop(
                Arc::clone(&adapter),
                Arc::clone(&self.handlers),
                cancel.child_token(),
            ));
            self.adapters.insert(channel, adapter);
            info!(channel = %channel, "adapter registered");
        }

        *self.cancel.lock().expect("router cancel lock poisoned") = cancel;
        *self.pull_loops.lock().expect("router tracker lock poisoned") = tracker;
        self.set_state(RouterState::Ready);
        info!(adapters = self.adapters.len(), "router ready");
    }

    /// Shuts down all adapters concurrently, stops the pull loops, and
    /// clears the registry. Individual adapter failures are logged, not
    /// aggregated into a failure of the whole operation.
    pub async fn shutdown(&self) {
        self.set_state(RouterState::ShuttingDown);
        let adapters: Vec<Arc<dyn ChannelAdapter>> = self
            .adapters
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        let results = join_all(adapters.iter().map(|adapter| adapter.shutdown())).await;
        for (adapter, result) in adapters.iter().zip(results) {
            if let Err(e) = result {
                warn!(channel = %adapter.channel_type(), error = %e, "adapter shutdown error");
            }
        }

        self.cancel
            .lock()
            .expect("router cancel lock poisoned")
            .cancel();
        let tracker = self
            .pull_loops
            .lock()
            .expect("router tracker lock poisoned")
            .clone();
        tracker.close();
        tracker.wait().await;

        self.adapters.clear();
        self.set_state(RouterState::Uninitialized);
        info!("router shut down");
    }

    fn adapter(&self, channel: ChannelType) -> Option<Arc<dyn ChannelAdapter>> {
        if self.state() != RouterState::Ready {
            return None;
        }
        self.adapters.get(&channel).map(|entry| entry.value().clone())
    }

    /// Connects an account on a channel. Adapter errors are normalized
    /// into an unsuccessful [`ConnectionResult`], never propagated.
    pub async fn connect_account(
        &self,
        account_id: &AccountId,
        channel: ChannelType,
        credentials: &serde_json::Value,
    ) -> ConnectionResult {
        let Some(adapter) = self.adapter(channel) else {
            return ConnectionResult::failure(
                CourierError::AdapterNotFound { channel }.to_string(),
            );
        };
        match adapter.connect(account_id, credentials).await {
            Ok(result) => result,
            Err(e) => {
                warn!(account = %account_id, channel = %channel, error = %e, "connect failed");
                ConnectionResult::failure(e.to_string())
            }
        }
    }

    pub async fn disconnect_account(&self, account_id: &AccountId, channel: ChannelType) {
        let Some(adapter) = self.adapter(channel) else {
            return;
        };
        if let Err(e) = adapter.disconnect(account_id).await {
            warn!(account = %account_id, channel = %channel, error = %e, "disconnect failed");
        }
    }

    /// Sends a text message on the owning channel. Adapter errors become
    /// retryable failed results since their cause is unknown.
    pub async fn send_message(&self, params: &SendParams) -> SendResult {
        let Some(adapter) = self.adapter(params.channel_type) else {
            return Self::adapter_missing(params.channel_type);
        };
        match adapter.send_message(params).await {
            Ok(result) => result,
            Err(e) => SendResult::failure(e.to_string(), true),
        }
    }

    /// Sends a media message; same normalization as [`send_message`].
    ///
    /// [`send_message`]: ChannelRouter::send_message
    pub async fn send_media(&self, params: &MediaParams) -> SendResult {
        let Some(adapter) = self.adapter(params.channel_type) else {
            return Self::adapter_missing(params.channel_type);
        };
        match adapter.send_media(params).await {
            Ok(result) => result,
            Err(e) => SendResult::failure(e.to_string(), true),
        }
    }

    pub async fn status(
        &self,
        account_id: &AccountId,
        channel: ChannelType,
    ) -> Option<ConnectionStatus> {
        match self.adapter(channel) {
            Some(adapter) => adapter.status(account_id).await,
            None => None,
        }
    }

    pub async fn is_connected(&self, account_id: &AccountId, channel: ChannelType) -> bool {
        match self.adapter(channel) {
            Some(adapter) => adapter.is_connected(account_id).await,
            None => false,
        }
    }

    pub async fn active_accounts(&self, channel: ChannelType) -> Vec<AccountId> {
        match self.adapter(channel) {
            Some(adapter) => adapter.active_accounts().await,
            None => Vec::new(),
        }
    }

    /// Active accounts across every registered adapter; the router's health
    /// snapshot.
    pub async fn all_active_accounts(&self) -> HashMap<ChannelType, Vec<AccountId>> {
        let mut all = HashMap::new();
        if self.state() != RouterState::Ready {
            return all;
        }
        let adapters: Vec<Arc<dyn ChannelAdapter>> = self
            .adapters
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for adapter in adapters {
            all.insert(adapter.channel_type(), adapter.active_accounts().await);
        }
        all
    }

    pub fn capabilities(&self, channel: ChannelType) -> Option<ChannelCapabilities> {
        self.adapter(channel).map(|adapter| adapter.capabilities())
    }

    fn adapter_missing(channel: ChannelType) -> SendResult {
        SendResult::failure(
            CourierError::AdapterNotFound { channel }.to_string(),
            false,
        )
    }
}

/// The router is the send queue's executor: a queued job dispatches to the
/// adapter owning its channel.
#[async_trait]
impl SendExecutor for ChannelRouter {
    async fn execute(&self, job: &SendJob) -> Result<SendResult, CourierError> {
        Ok(match job {
            SendJob::Message(params) => self.send_message(params).await,
            SendJob::Media(params) => self.send_media(params).await,
        })
    }
}

/// Pulls events from one adapter until it closes or the router shuts down.
async fn pull_loop(
    adapter: Arc<dyn ChannelAdapter>,
    handlers: Arc<HandlerSet>,
    cancel: CancellationToken,
) {
    let channel = adapter.channel_type();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(channel = %channel, "event loop stopped");
                return;
            }
            event = adapter.next_event() => match event {
                Ok(event) => handlers.dispatch(&event).await,
                Err(CourierError::ChannelClosed) => {
                    info!(channel = %channel, "adapter closed its event stream");
                    return;
                }
                Err(e) => {
                    warn!(channel = %channel, error = %e, "event pull error");
                }
            }
        }
    }
}
