use std::{
    ops::{Deref, DerefMut},
    sync::Arc,
    time::Duration,
};

use crossbeam::channel::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use prometheus::{Counter, Gauge};

#[derive(Clone)]
pub struct MigrationReceiver<T> {
    pub(crate) receiver: Receiver<T>,
    #[allow(dead_code)]
    pub(crate) name: String,
    /// channel size
    pub(crate) actual_len: Gauge,
    /// total received messages
    pub(crate) received: Counter,
    /// reference counter to know how many receiver are cloned
    pub(crate) ref_counter: Arc<()>,
}

impl<T> Drop for MigrationReceiver<T> {
    fn drop(&mut self) {
        let ref_count = Arc::strong_count(&self.ref_counter);
        if ref_count == 1 {
            // this is the last ref so we can unregister metrics
            let _ = prometheus::unregister(Box::new(self.actual_len.clone()));
            let _ = prometheus::unregister(Box::new(self.received.clone()));
        }
    }
}

impl<T> MigrationReceiver<T> {
    fn on_received(&self) {
        // use the len of the channel for actual_len instead of actual_len.dec()
        // because the sender side may be cloned
        self.actual_len.set(self.receiver.len() as f64);
        self.received.inc();
    }

    /// attempt to receive a message from the channel
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        let msg = self.receiver.try_recv()?;
        self.on_received();
        Ok(msg)
    }

    /// block until a message is received or every sender is dropped
    pub fn recv(&self) -> Result<T, RecvError> {
        let msg = self.receiver.recv()?;
        self.on_received();
        Ok(msg)
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        let msg = self.receiver.recv_timeout(timeout)?;
        self.on_received();
        Ok(msg)
    }

    /// Blocking iterator over received messages, ends when every sender is dropped
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        std::iter::from_fn(move || self.recv().ok())
    }
}

impl<T> Deref for MigrationReceiver<T> {
    type Target = Receiver<T>;

    fn deref(&self) -> &Self::Target {
        &self.receiver
    }
}

impl<T> DerefMut for MigrationReceiver<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.receiver
    }
}
