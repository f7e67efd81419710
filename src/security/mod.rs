//! In-memory PAE security state
//!
//! These are the objects the key-management layer owns and mutates as
//! authentication handshakes progress. The NVM codec only talks to them
//! through the accessors defined here.

pub mod frame_counter;
pub mod keys;

pub use frame_counter::{FrameCounterEntry, FrameCounters};
pub use keys::{LifetimeKey, SecurityKeys};

/// EUI-64 length in bytes
pub const EUI64_LEN: usize = 8;
/// Pairwise Master Key length in bytes
pub const PMK_LEN: usize = 32;
/// Pairwise Transient Key length in bytes
pub const PTK_LEN: usize = 48;
/// Group key length in bytes (GTK and LGTK)
pub const GTK_LEN: usize = 16;
/// Number of group key slots per lineage
pub const GTK_NUM: usize = 4;

/// Hardware identifier of the peer (EUI-64, 8 bytes)
pub type Eui64 = [u8; EUI64_LEN];
