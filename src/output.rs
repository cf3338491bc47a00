//! Single-slot output builder.
//!
//! Outbound messages are produced in two steps: `begin()` hands out a
//! mutable pending message, the caller fills in its fields, and a
//! subsequent `send()` (on the client or reply context) takes the slot,
//! encodes it and writes the frame. The slot holds at most one message;
//! beginning a second one before the first is sent is a caller bug and
//! is rejected rather than silently overwritten.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard};

use crate::envelope::Envelope;
use crate::error::{CourierError, Result};
use crate::lock;

/// Holds at most one in-progress outbound envelope.
pub struct OutputBuilder<E> {
    slot: Mutex<Option<E>>,
}

impl<E: Envelope> OutputBuilder<E> {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Start building the named message variant.
    ///
    /// # Errors
    ///
    /// Returns [`CourierError::UnknownVariant`] if the envelope does not
    /// declare the variant, and [`CourierError::AlreadyPending`] if a
    /// previous message was begun but never sent.
    pub fn begin(&self, variant: &str) -> Result<PendingMessage<'_, E>> {
        let envelope = E::empty(variant)
            .ok_or_else(|| CourierError::UnknownVariant(variant.to_string()))?;

        let mut slot = lock(&self.slot);
        if slot.is_some() {
            return Err(CourierError::AlreadyPending);
        }
        *slot = Some(envelope);

        Ok(PendingMessage { guard: slot })
    }

    /// Take the pending envelope for sending.
    ///
    /// # Errors
    ///
    /// Returns [`CourierError::NoPendingOutput`] if nothing was begun.
    pub fn take(&self) -> Result<E> {
        lock(&self.slot).take().ok_or(CourierError::NoPendingOutput)
    }

    /// Discard any pending envelope. Used when a connection goes away
    /// between `begin` and `send`.
    pub fn clear(&self) {
        lock(&self.slot).take();
    }
}

impl<E: Envelope> Default for OutputBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// A mutable borrow of the in-progress outbound envelope.
///
/// Dereferences to the envelope so callers fill in fields directly.
/// The slot stays occupied after this guard drops; `send()` empties it.
pub struct PendingMessage<'a, E> {
    guard: MutexGuard<'a, Option<E>>,
}

impl<E> Deref for PendingMessage<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        // Invariant: `begin` only returns a guard after filling the slot.
        self.guard.as_ref().unwrap()
    }
}

impl<E> DerefMut for PendingMessage<'_, E> {
    fn deref_mut(&mut self) -> &mut E {
        self.guard.as_mut().unwrap()
    }
}
