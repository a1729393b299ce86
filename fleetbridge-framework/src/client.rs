//! Service clients with a rebindable connection.
//!
//! A [`ServiceClient`] is bound to one channel and owns a connection slot:
//! the current [`BusHandle`] plus a generation number. Rebinding swaps the
//! handle under a write lock and bumps the generation, so every holder of
//! the same `Arc<ServiceClient>` sees the new connection on its next call.
//! Calls clone the handle out of the slot before awaiting; a call already in
//! flight finishes against the handle it started with.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use fleetbridge_common::Channel;

use crate::bus::{BindingDescriptor, BusHandle};
use crate::error::Result;

#[derive(Debug)]
struct Slot<H> {
    handle: H,
    generation: u64,
}

/// Acknowledgement of a successful notify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// Generation of the connection the supply went out on.
    pub generation: u64,
}

/// Client for one channel of the bus.
#[derive(Debug)]
pub struct ServiceClient<H> {
    channel: Channel,
    key: String,
    binding: BindingDescriptor,
    slot: RwLock<Slot<H>>,
    reconnect_gate: Arc<Semaphore>,
    // Generation + 1 of the newest reported failure not yet handled; 0 when none
    failure: AtomicU64,
}

impl<H: BusHandle> ServiceClient<H> {
    /// Create a client on `channel`, publishing/subscribing on `key`.
    pub fn new(
        handle: H,
        channel: Channel,
        key: impl Into<String>,
        binding: BindingDescriptor,
    ) -> Self {
        Self {
            channel,
            key: key.into(),
            binding,
            slot: RwLock::new(Slot {
                handle,
                generation: 0,
            }),
            reconnect_gate: Arc::new(Semaphore::new(1)),
            failure: AtomicU64::new(0),
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn binding(&self) -> &BindingDescriptor {
        &self.binding
    }

    /// Number of rebinds so far.
    pub fn generation(&self) -> u64 {
        self.slot.read().generation
    }

    /// Clone of the current handle and its generation.
    pub fn current(&self) -> (H, u64) {
        let slot = self.slot.read();
        (slot.handle.clone(), slot.generation)
    }

    /// Replace the connection handle, returning the new generation.
    pub fn rebind(&self, handle: H) -> u64 {
        let mut slot = self.slot.write();
        slot.handle = handle;
        slot.generation += 1;
        slot.generation
    }

    /// Claim the right to reconnect this client.
    ///
    /// Returns `None` while another reconnect holds the permit.
    pub fn try_begin_reconnect(&self) -> Option<OwnedSemaphorePermit> {
        self.reconnect_gate.clone().try_acquire_owned().ok()
    }

    /// Record that the connection of `generation` failed.
    pub fn report_failure(&self, generation: u64) {
        self.failure.fetch_max(generation + 1, Ordering::AcqRel);
    }

    /// Generation of the newest unhandled failure.
    pub fn pending_failure(&self) -> Option<u64> {
        self.failure.load(Ordering::Acquire).checked_sub(1)
    }

    /// Take the newest unhandled failure, clearing it.
    pub fn take_failure(&self) -> Option<u64> {
        self.failure.swap(0, Ordering::AcqRel).checked_sub(1)
    }

    /// Open a supply stream on this client's key.
    pub async fn subscribe(&self) -> Result<H::Stream> {
        let (handle, _) = self.current();
        handle.subscribe(&self.key).await
    }

    /// Publish a payload on this client's key.
    pub async fn notify(&self, payload: Vec<u8>) -> Result<Ack> {
        let (handle, generation) = self.current();
        handle.notify(&self.key, payload).await?;
        Ok(Ack { generation })
    }
}
