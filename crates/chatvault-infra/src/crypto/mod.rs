//! Cryptographic operations for chatvault.
//!
//! - `codec`: AES-GCM encryption of message content at rest

pub mod codec;

pub use codec::EncryptionCodec;
