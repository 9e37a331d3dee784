//! Port selection for launched runtimes.
//!
//! Ports are drawn pseudo-randomly from a [`PortRange`] (9000-9899 by
//! default). The allocator avoids ports already recorded in the registry and
//! ports that fail a bind probe, but never leaves the range.

mod allocator;
mod range;

pub use allocator::PortAllocator;
pub use range::PortRange;
