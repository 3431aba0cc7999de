//! Bounded, metered channel used between the migration worker and the
//! consumer that broadcasts batches to the destination ledger.
//!
//! A full channel blocks the producer, which is the only backpressure the
//! migration walk relies on.

use std::sync::Arc;

use receiver::MigrationReceiver;
use sender::MigrationSender;

pub mod receiver;
pub mod sender;

#[derive(Clone)]
pub struct MigrationChannel {}

impl MigrationChannel {
    /// Create a channel named `name`. `None` capacity means unbounded.
    ///
    /// Two metrics are registered: `<name>_channel_actual_size` and
    /// `<name>_channel_total_receive`. They are unregistered when the last
    /// receiver is dropped.
    #[allow(clippy::new_ret_no_self)]
    pub fn new<T>(
        name: String,
        capacity: Option<usize>,
    ) -> (MigrationSender<T>, MigrationReceiver<T>) {
        use prometheus::{Counter, Gauge};
        use tracing::error;

        let (s, r) = if let Some(capacity) = capacity {
            crossbeam::channel::bounded::<T>(capacity)
        } else {
            crossbeam::channel::unbounded::<T>()
        };

        // this can be inc() when sending msg or dec() when receive
        let actual_len = Gauge::new(
            format!("{}_channel_actual_size", name),
            "Actual length of channel",
        )
        .expect("Failed to create gauge");

        let received = Counter::new(
            format!("{}_channel_total_receive", name),
            "Total received messages",
        )
        .expect("Failed to create counter");

        // error here if metrics already registered (two runs sharing a name in one process)
        if let Err(e) = prometheus::register(Box::new(actual_len.clone())) {
            error!("Failed to register actual_len gauge for {} : {}", name, e);
        }

        if let Err(e) = prometheus::register(Box::new(received.clone())) {
            error!("Failed to register received counter for {} : {}", name, e);
        }

        let sender = MigrationSender {
            sender: s,
            name: name.clone(),
            actual_len: actual_len.clone(),
        };

        let receiver = MigrationReceiver {
            receiver: r,
            name,
            actual_len,
            received,
            ref_counter: Arc::new(()),
        };

        (sender, receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::MigrationChannel;
    use serial_test::serial;
    use std::time::Duration;

    #[test]
    #[serial]
    fn test_bounded_channel_blocks_when_full() {
        let (tx, rx) = MigrationChannel::new::<u32>("test_bounded".into(), Some(1));
        tx.send(1).unwrap();
        assert!(tx.send_timeout(2, Duration::from_millis(20)).is_err());
        assert_eq!(rx.recv().unwrap(), 1);
        tx.send(3).unwrap();
        assert_eq!(rx.recv().unwrap(), 3);
    }

    #[test]
    #[serial]
    fn test_receiver_sees_disconnect() {
        let (tx, rx) = MigrationChannel::new::<u32>("test_disconnect".into(), None);
        tx.send(7).unwrap();
        drop(tx);
        assert_eq!(rx.iter().collect::<Vec<_>>(), vec![7]);
        assert!(rx.recv().is_err());
    }
}
