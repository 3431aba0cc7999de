// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! This module implements a migration manager.
//! See `statemig-migration-exports/controller_traits.rs` for functional details.

use statemig_migration_exports::MigrationManager;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{info, warn};

/// Implementation of the migration manager
/// Allows stopping the migration worker
pub struct MigrationManagerImpl {
    /// cancellation flag shared with the walk
    pub(crate) stop: Arc<AtomicBool>,
    /// migration thread join handle
    pub(crate) thread_handle: Option<JoinHandle<()>>,
}

impl MigrationManager for MigrationManagerImpl {
    fn request_stop(&self) {
        info!("migration stop requested");
        self.stop.store(true, Ordering::Relaxed);
    }

    /// stops the worker
    fn stop(&mut self) {
        info!("stopping migration worker...");
        self.request_stop();
        if let Some(join_handle) = self.thread_handle.take() {
            if let Err(err) = join_handle.join() {
                warn!("migration worker panicked: {:?}", err);
            }
        }
        info!("migration worker stopped");
    }
}
