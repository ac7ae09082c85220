//! Client Gateway: terminates the client HTTP connection, enforces auth and
//! size limits, and wires disconnect into the Request Engine.

pub mod handlers;
pub mod middleware;
pub mod router;

use crate::engine::DisconnectFlag;

/// Flags `DisconnectFlag` when dropped without being explicitly `defuse`d.
///
/// Held on the request-handling future's own stack while it waits for the
/// engine to decide a response (pre-response phase: credential selection,
/// dispatch, the 30s retry wait). If the client disconnects during that
/// phase, the connection driver drops this future before it reaches
/// `defuse()`, and the drop signals the detached engine task to stop.
/// Disconnects during body *streaming* are detected separately, since the
/// engine's `mpsc::Sender::send` starts failing once axum drops the
/// receiver side, which happens when hyper gives up on a closed socket.
pub struct DisconnectGuard {
    flag: Option<DisconnectFlag>,
}

impl DisconnectGuard {
    pub fn new(flag: DisconnectFlag) -> Self {
        Self { flag: Some(flag) }
    }

    /// Disarms the guard: its `Drop` becomes a no-op. Call once a response
    /// has been decided so a normal function return isn't misread as a
    /// client disconnect.
    pub fn defuse(mut self) {
        self.flag.take();
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if let Some(flag) = self.flag.take() {
            flag.mark();
        }
    }
}
