use std::fmt;
use std::sync::{Mutex, PoisonError};

type Callback = Box<dyn Fn(i32) + Send + Sync>;

/// Dispatches process signals to registered callbacks.
///
/// Hooking the actual OS signals is left to the embedding process, which
/// calls [`SignalHandler::raise`]. A handler that failed to initialize makes
/// the server refuse to run.
pub struct SignalHandler {
    initialized: bool,
    callbacks: Mutex<Vec<Callback>>,
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalHandler {
    /// A working handler.
    pub fn new() -> Self {
        Self {
            initialized: true,
            callbacks: Mutex::new(Vec::new()),
        }
    }

    /// A handler whose setup failed.
    pub fn uninitialized() -> Self {
        Self {
            initialized: false,
            callbacks: Mutex::new(Vec::new()),
        }
    }

    /// Whether setup succeeded.
    pub fn initialized(&self) -> bool {
        self.initialized
    }

    /// Register a callback. Returns `false` if the handler is not initialized.
    pub fn add_callback(&self, callback: impl Fn(i32) + Send + Sync + 'static) -> bool {
        if !self.initialized {
            return false;
        }
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(callback));
        true
    }

    /// Deliver `signal` to every callback, in registration order.
    pub fn raise(&self, signal: i32) {
        tracing::info!(signal, "signal received");
        let callbacks = self.callbacks.lock().unwrap_or_else(PoisonError::into_inner);
        for callback in callbacks.iter() {
            callback(signal);
        }
    }
}

impl fmt::Debug for SignalHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("SignalHandler")
            .field("initialized", &self.initialized)
            .field("callbacks", &count)
            .finish()
    }
}
