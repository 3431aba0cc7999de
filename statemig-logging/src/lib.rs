// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Structured trace events for the migration hot paths (one per row, index
//! or payer bracket). The payload is rendered as JSON so traces stay grep-able
//! when replaying millions of rows.

/// Emit a `trace` level event tagged `statemig_trace:<event>` with a JSON payload.
///
/// ```
/// statemig_logging::statemig_trace!("migrator.row", { "table": "accounts", "key": "alice" });
/// ```
#[macro_export]
macro_rules! statemig_trace {
    ($evt:expr, $params:tt) => {
        $crate::tracing::trace!("statemig_trace:{}:{}", $evt, $crate::serde_json::json!($params));
    };
}

#[doc(hidden)]
pub use serde_json;
#[doc(hidden)]
pub use tracing;
