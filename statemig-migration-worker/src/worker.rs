// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::batch::ChannelSink;
use crate::manager::MigrationManagerImpl;
use crate::migrator::AccountMigrator;
use statemig_channel::receiver::MigrationReceiver;
use statemig_channel::MigrationChannel;
use statemig_migration_exports::{
    MigrationContext, MigrationError, MigrationEvent, MigrationManager, MigratorConfig,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use tracing::{error, warn};

/// Start the migration thread.
///
/// The receiver yields `MigrationEvent::Batch` items in replay order, then one
/// terminal `Finished` or `Failed` event. A stop request still ends with
/// `Finished`, its stats flagged `cancelled`, so keep reading until then.
pub fn start_migration_worker(
    config: MigratorConfig,
    context: MigrationContext,
) -> (MigrationReceiver<MigrationEvent>, Box<dyn MigrationManager>) {
    let (sender, receiver) =
        MigrationChannel::new("migration".to_string(), Some(config.channel_capacity));
    let stop = Arc::new(AtomicBool::new(false));

    let worker_stop = stop.clone();
    let thread_handle = thread::Builder::new()
        .name("migration worker".into())
        .spawn(move || {
            let failure_sink = ChannelSink::new(sender.clone());
            let sink = ChannelSink::new(sender);
            let migrator = AccountMigrator::new(config, context, sink, worker_stop);
            match migrator.run() {
                Ok((sink, stats)) => {
                    if let Err(err) = sink.send(MigrationEvent::Finished(stats)) {
                        warn!("could not deliver the end of the migration: {}", err);
                    }
                }
                Err(MigrationError::ChannelClosed) => {
                    warn!("migration consumer went away, stopping");
                }
                Err(err) => {
                    error!("migration failed: {}", err);
                    if let Err(send_err) = failure_sink.send(MigrationEvent::Failed(err.to_string())) {
                        warn!("could not deliver the migration failure: {}", send_err);
                    }
                }
            }
        })
        .expect("could not spawn migration worker thread");

    let manager = MigrationManagerImpl {
        stop,
        thread_handle: Some(thread_handle),
    };
    (receiver, Box::new(manager))
}
