// Copyright (c) 2022 MASSA LABS <info@massa.net>

use serde::Serialize;
use statemig_models::name::Name;
use statemig_models::operation::Operation;
use statemig_models::public_key::PublicKey;
use std::collections::HashSet;
use std::sync::Arc;

/// Operations to submit as one atomic transaction. Never empty.
pub type Batch = Vec<Operation>;

/// Item of the migration stream
#[derive(Debug, Clone, PartialEq)]
pub enum MigrationEvent {
    /// next atomic unit
    Batch(Batch),
    /// terminal signal: the walk completed or was cancelled
    Finished(MigrationStats),
    /// terminal signal: the walk hit a fatal error
    Failed(String),
}

/// Counters of one migration run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationStats {
    /// accounts created
    pub accounts_created: usize,
    /// account creations dropped because the account already existed
    pub duplicate_accounts: usize,
    /// contract accounts fully migrated
    pub contracts_migrated: usize,
    /// tables replayed
    pub tables: usize,
    /// scopes replayed
    pub scopes: usize,
    /// rows injected
    pub rows: usize,
    /// secondary index entries injected
    pub indexes: usize,
    /// placeholder brackets synthesized to pin scope payers
    pub placeholder_brackets: usize,
    /// batches emitted
    pub batches: usize,
    /// contract accounts abandoned on a structural error
    pub abandoned: Vec<Name>,
    /// the walk stopped early on request
    pub cancelled: bool,
}

/// Accounts already issued a creation during the current run
#[derive(Debug, Clone, Default)]
pub struct AccountCreationCache {
    created: HashSet<Name>,
}

impl AccountCreationCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `account` as created. Returns `false` if it already was.
    pub fn insert(&mut self, account: Name) -> bool {
        self.created.insert(account)
    }

    /// Whether `account` was already created
    pub fn contains(&self, account: &Name) -> bool {
        self.created.contains(account)
    }

    /// Number of created accounts
    pub fn len(&self) -> usize {
        self.created.len()
    }

    /// Whether no account was created yet
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
    }
}

/// The temporary contract installed on each account while its rows are injected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapContract {
    /// contract code
    pub code: Arc<[u8]>,
    /// binary schema
    pub abi: Arc<[u8]>,
}

/// State scoped to one migration run
#[derive(Debug, Clone)]
pub struct MigrationContext {
    /// account creation dedup
    pub cache: AccountCreationCache,
    /// contract replaying rows
    pub bootstrap: BootstrapContract,
    /// key controlling every created account
    pub public_key: PublicKey,
}

impl MigrationContext {
    /// Context with an empty cache
    pub fn new(bootstrap: BootstrapContract, public_key: PublicKey) -> Self {
        MigrationContext {
            cache: AccountCreationCache::new(),
            bootstrap,
            public_key,
        }
    }
}
