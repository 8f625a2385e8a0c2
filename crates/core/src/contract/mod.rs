//! Contract types shared by every layer
//!
//! - `version`: commit version tokens (`0` means absent)
//! - `versioned`: value plus the version that last wrote it
//! - `timestamp`: millisecond wall-clock timestamps used on records

pub mod timestamp;
pub mod version;
pub mod versioned;

pub use timestamp::Timestamp;
pub use version::Version;
pub use versioned::Versioned;
