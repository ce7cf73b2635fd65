//! Codec implementations.

pub mod g711;

#[cfg(feature = "g722")]
pub mod g722;

pub use g711::G711Codec;

#[cfg(feature = "g722")]
pub use g722::G722Codec;
