// Copyright (c) 2022 MASSA LABS <info@massa.net>

/// Migration manager used to stop the migration thread
pub trait MigrationManager: Send {
    /// Raise the cancellation flag without waiting.
    /// The walk stops after the in-flight scope and then sends `Finished`,
    /// so the receiver must keep being drained.
    fn request_stop(&self);

    /// Raise the cancellation flag and join the migration thread.
    /// Blocks until the worker exits: drain or drop the receiver first.
    ///
    /// Note that we do not take self by value to consume it
    /// because it is not allowed to move out of `Box<dyn MigrationManager>`
    fn stop(&mut self);
}
