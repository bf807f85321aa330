//! Per-layer "changed" notifications.
//!
//! Each layer owns the sending half of its own channel; the compositor holds one
//! subscription per layer and reacts to what arrives. A channel holds at most one
//! notification: a newer one replaces whatever the compositor has not read yet.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

use crate::backend::Drawable;
use crate::composite::LayerKind;

/// A layer produced (or withdrew) its drawable.
#[derive(Clone)]
pub struct Changed {
    pub layer: LayerKind,
    /// Data epoch of the renderer that sent it.
    pub epoch: u64,
    /// `None` when the layer has nothing to show.
    pub drawable: Option<Drawable>,
}

/// Sending half held by a layer's renderer.
#[derive(Clone)]
pub struct Notifier {
    layer: LayerKind,
    tx: Sender<Changed>,
    /// Same channel as the subscription; used to evict the unread notification.
    pending: Receiver<Changed>,
}

impl Notifier {
    /// Queue a notification. True when it replaced one the compositor never read.
    pub fn send(&self, epoch: u64, drawable: Option<Drawable>) -> bool {
        let mut replaced = false;
        while self.pending.try_recv().is_ok() {
            replaced = true;
        }
        if self.tx.try_send(Changed { layer: self.layer, epoch, drawable }).is_err() {
            log::debug!("[composite] {:?} notification dropped", self.layer);
        }
        replaced
    }

    pub fn layer(&self) -> LayerKind {
        self.layer
    }
}

/// Receiving half; keeps only the most recent notification.
pub struct Subscription {
    layer: LayerKind,
    rx: Receiver<Changed>,
    latest: Option<Changed>,
    closed: bool,
}

impl Subscription {
    /// Consume everything pending. True when at least one notification arrived.
    pub fn drain(&mut self) -> bool {
        let mut got = false;
        loop {
            match self.rx.try_recv() {
                Ok(c) => {
                    self.latest = Some(c);
                    got = true;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        got
    }

    pub fn latest(&self) -> Option<&Changed> {
        self.latest.as_ref()
    }

    /// Drawable from the latest notification.
    pub fn drawable(&self) -> Option<&Drawable> {
        self.latest.as_ref().and_then(|c| c.drawable.as_ref())
    }

    pub fn layer(&self) -> LayerKind {
        self.layer
    }

    /// True once every notifier for this layer has been dropped.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// New notification channel for `layer`.
pub fn channel(layer: LayerKind) -> (Notifier, Subscription) {
    let (tx, rx) = bounded(1);
    (Notifier { layer, tx, pending: rx.clone() }, Subscription { layer, rx, latest: None, closed: false })
}
