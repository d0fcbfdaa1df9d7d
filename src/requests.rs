//! Cross-context request queue.
//!
//! The serial console and the radio duty cycle report from outside the
//! sampling loop.  They never touch meter state directly;
//! they enqueue an [`AppCommand`] here and the main loop drains the queue
//! between ticks.
//!
//! ```text
//! ┌─────────────┐
//! │ Console     │────▶┌───────────────┐     ┌──────────────┐
//! │ Wi-Fi duty  │────▶│ REQUEST_QUEUE │────▶│  Main Loop   │
//! │ cycle       │     │  (bounded)    │     │  (consumer)  │
//! └─────────────┘     └───────────────┘     └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::app::commands::AppCommand;

/// Maximum number of pending requests.
const REQUEST_DEPTH: usize = 8;

static REQUEST_QUEUE: Channel<CriticalSectionRawMutex, AppCommand, REQUEST_DEPTH> =
    Channel::new();

/// Enqueue a request from any context.
/// Returns `false` if the queue is full (request dropped).
pub fn submit(cmd: AppCommand) -> bool {
    match REQUEST_QUEUE.try_send(cmd) {
        Ok(()) => true,
        Err(_) => {
            log::warn!("request queue full, dropping request");
            false
        }
    }
}

/// Drain all pending requests into a callback, in FIFO order.
pub fn drain_requests(mut handler: impl FnMut(AppCommand)) {
    while let Ok(cmd) = REQUEST_QUEUE.try_receive() {
        handler(cmd);
    }
}

/// Number of pending requests.
pub fn pending() -> usize {
    REQUEST_QUEUE.len()
}
