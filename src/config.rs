//! # Library configuration.
//!
//! Provides [`Config`], the centralized settings consumed by the network
//! constructors (`TcpServer::bind_with`, `TcpStream::connect_with`) and by
//! runners created with an event bus.
//!
//! ## Sentinel values
//! - `bus_capacity` is clamped to a minimum of 1 by the bus.
//! - `read_buffer` is clamped to a minimum of 1: a zero-length read window
//!   would make every readiness event look like a peer disconnect.

/// Centralized settings for runners and network sources.
///
/// All fields are public for flexibility; prefer the clamping accessors over
/// sprinkling sentinel checks across call sites.
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the event bus broadcast ring buffer.
    ///
    /// Subscribers lagging behind by more than this many events receive
    /// `Lagged` and skip older items. Minimum 1 (enforced by the bus).
    pub bus_capacity: usize,

    /// Default read-buffer size for streams whose caller does not supply a
    /// buffer of their own.
    pub read_buffer: usize,

    /// Listen backlog for [`TcpServer`](crate::net::TcpServer).
    pub backlog: u32,
}

impl Config {
    /// Returns the bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the read-buffer size clamped to a minimum of 1.
    #[inline]
    pub fn read_buffer_clamped(&self) -> usize {
        self.read_buffer.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024` (good baseline)
    /// - `read_buffer = 4096` (one page)
    /// - `backlog = 10`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            read_buffer: 4096,
            backlog: 10,
        }
    }
}
