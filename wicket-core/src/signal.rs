// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! wicket-core - Connectivity signal contract
//!
//! A single binary event bridging the asynchronous driver world ("the
//! station got an address") and a blocked HTTP request handler waiting to
//! report success.

use core::time::Duration;

/// One-shot "network became reachable" signal.
///
/// Contract:
/// - [`reset`](Self::reset) must be called before initiating a new
///   connection attempt, so residue from an earlier attempt can never
///   satisfy a later wait.
/// - [`raise`](Self::raise) wakes at most one waiter and latches until the
///   next reset or wait.
/// - [`wait_raised`](Self::wait_raised) returns `true` if the signal was
///   (or becomes) raised within the timeout, `false` otherwise.  It must
///   never block past the timeout.
///
/// Implementations are expected to be cheap, `'static` friendly and safe
/// to raise from a different execution context than the waiter's.
#[allow(async_fn_in_trait)]
pub trait ConnectivitySignal {
    fn reset(&self);

    fn raise(&self);

    async fn wait_raised(&self, timeout: Duration) -> bool;
}
