use super::PortRange;
use rand::Rng;
use std::collections::HashSet;
use std::net::TcpListener;

/// Number of random draws before giving up on finding a free port.
const MAX_ATTEMPTS: usize = 32;

/// Pseudo-random port picker.
///
/// There is no reservation: the probe listener is dropped before the child
/// binds, so another process can still grab the port in between. Runtimes
/// that fail to bind simply exit and drop out of the registry.
#[derive(Debug, Clone)]
pub struct PortAllocator {
    range: PortRange,
    max_attempts: usize,
}

impl PortAllocator {
    pub fn new(range: PortRange) -> Self {
        Self {
            range,
            max_attempts: MAX_ATTEMPTS,
        }
    }

    pub fn range(&self) -> PortRange {
        self.range
    }

    /// Draw a port uniformly from the range without any checks.
    pub fn draw(&self) -> u16 {
        let offset = rand::thread_rng().gen_range(0..self.range.len());
        self.range.nth(offset)
    }

    /// Draw a port that is not in `taken` and can currently be bound.
    ///
    /// Falls back to the last draw when every attempt collides, so the
    /// result is always inside the range.
    pub fn allocate(&self, taken: &HashSet<u16>) -> u16 {
        let mut port = self.draw();
        for attempt in 0..self.max_attempts {
            if !taken.contains(&port) && is_bindable(port) {
                return port;
            }
            tracing::debug!("Port {} unavailable (attempt {})", port, attempt + 1);
            port = self.draw();
        }
        tracing::warn!(
            "No free port found in {} after {} attempts, using {}",
            self.range,
            self.max_attempts,
            port
        );
        port
    }
}

fn is_bindable(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_ok()
}
