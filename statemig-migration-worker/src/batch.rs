// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Groups operations into atomic batches and drops duplicate account creations.

use statemig_channel::sender::MigrationSender;
use statemig_logging::statemig_trace;
use statemig_migration_exports::{
    AccountCreationCache, Batch, MigrationError, MigrationEvent, MigrationStats,
};
use statemig_models::operation::Operation;

/// Destination of complete batches
pub trait BatchSink {
    /// Deliver one batch, blocking while the consumer lags
    fn deliver(&mut self, batch: Batch) -> Result<(), MigrationError>;
}

impl BatchSink for Vec<Batch> {
    fn deliver(&mut self, batch: Batch) -> Result<(), MigrationError> {
        self.push(batch);
        Ok(())
    }
}

/// Sink feeding the migration channel
pub struct ChannelSink {
    sender: MigrationSender<MigrationEvent>,
}

impl ChannelSink {
    pub fn new(sender: MigrationSender<MigrationEvent>) -> Self {
        ChannelSink { sender }
    }

    /// Send an event, blocking while the channel is full.
    /// Only a dropped receiver makes it fail: the stop flag never cuts a scope.
    pub fn send(&self, event: MigrationEvent) -> Result<(), MigrationError> {
        self.sender
            .send(event)
            .map_err(|_| MigrationError::ChannelClosed)
    }
}

impl BatchSink for ChannelSink {
    fn deliver(&mut self, batch: Batch) -> Result<(), MigrationError> {
        self.send(MigrationEvent::Batch(batch))
    }
}

/// Accumulates operations until a `TransactionBoundary`
pub struct BatchEmitter<S: BatchSink> {
    sink: S,
    cache: AccountCreationCache,
    pending: Batch,
    stats: MigrationStats,
}

impl<S: BatchSink> BatchEmitter<S> {
    pub fn new(sink: S, cache: AccountCreationCache) -> Self {
        BatchEmitter {
            sink,
            cache,
            pending: Vec::new(),
            stats: MigrationStats::default(),
        }
    }

    /// Queue `operation`. A boundary closes the pending batch, a creation of an
    /// already created account is dropped.
    pub fn push(&mut self, operation: Operation) -> Result<(), MigrationError> {
        match operation {
            Operation::TransactionBoundary => self.flush(),
            Operation::CreateAccount { name, .. } => {
                if self.cache.insert(name) {
                    self.stats.accounts_created += 1;
                    self.pending.push(operation);
                } else {
                    statemig_trace!("migrator.duplicate_account", { "account": name.to_string() });
                    self.stats.duplicate_accounts += 1;
                }
                Ok(())
            }
            _ => {
                self.pending.push(operation);
                Ok(())
            }
        }
    }

    pub fn push_all(&mut self, operations: impl IntoIterator<Item = Operation>) -> Result<(), MigrationError> {
        for operation in operations {
            self.push(operation)?;
        }
        Ok(())
    }

    /// Deliver the pending batch, if any
    pub fn flush(&mut self) -> Result<(), MigrationError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.pending);
        self.stats.batches += 1;
        self.sink.deliver(batch)
    }

    pub fn cache(&self) -> &AccountCreationCache {
        &self.cache
    }

    /// Flush and hand back the sink with the emission counters
    pub fn finish(mut self) -> Result<(S, MigrationStats), MigrationError> {
        self.flush()?;
        Ok((self.sink, self.stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statemig_models::name::Name;
    use statemig_models::public_key::PublicKey;
    use std::str::FromStr;

    fn create(name: &str) -> Operation {
        Operation::CreateAccount {
            creator: Name::constant("eosio"),
            name: Name::from_str(name).unwrap(),
            public_key: PublicKey::from_str("EOS6MRyAjQq8ud7hVNYcfnVPJqcVpscN5So8BhtHuGYqET5GDW5CV")
                .unwrap(),
        }
    }

    fn eject(key: &str) -> Operation {
        let n = |s: &str| Name::from_str(s).unwrap();
        Operation::EjectRow {
            account: n("a"),
            table: n("t"),
            scope: n("s"),
            key: n(key),
        }
    }

    #[test]
    fn test_boundaries_split_batches_and_empty_batches_vanish() {
        let mut emitter = BatchEmitter::new(Vec::new(), AccountCreationCache::new());
        emitter
            .push_all([
                eject("k1"),
                eject("k2"),
                Operation::TransactionBoundary,
                Operation::TransactionBoundary,
                eject("k3"),
                Operation::TransactionBoundary,
            ])
            .unwrap();
        let (batches, stats) = emitter.finish().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[1], vec![eject("k3")]);
        assert_eq!(stats.batches, 2);
        assert!(batches.iter().flatten().all(|op| !op.is_boundary()));
    }

    #[test]
    fn test_duplicate_account_creation_is_dropped() {
        let mut emitter = BatchEmitter::new(Vec::new(), AccountCreationCache::new());
        emitter
            .push_all([
                create("alice"),
                Operation::TransactionBoundary,
                create("alice"),
                Operation::TransactionBoundary,
                create("bob"),
            ])
            .unwrap();
        assert!(emitter.cache().contains(&Name::from_str("alice").unwrap()));
        let (batches, stats) = emitter.finish().unwrap();
        assert_eq!(batches, vec![vec![create("alice")], vec![create("bob")]]);
        assert_eq!(stats.accounts_created, 2);
        assert_eq!(stats.duplicate_accounts, 1);
    }

    #[test]
    fn test_prefilled_cache_suppresses_creation() {
        let mut cache = AccountCreationCache::new();
        cache.insert(Name::from_str("alice").unwrap());
        let mut emitter = BatchEmitter::new(Vec::new(), cache);
        emitter.push_all([create("alice"), Operation::TransactionBoundary]).unwrap();
        let (batches, _) = emitter.finish().unwrap();
        assert!(batches.is_empty());
    }
}
