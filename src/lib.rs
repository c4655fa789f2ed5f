//! Block cipher modes of operation and a self-calibrating chosen-plaintext attack on ECB
//! encryption oracles.
//!
//! [`crypto::modes`] implements ECB, CBC and CTR over the AES-128 primitive in
//! [`crypto::aes_128`]. [`crypto::oracle`] wraps a cipher around hidden bytes, and
//! [`crypto::attack`] recovers those hidden bytes using nothing but queries.
#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

pub mod b64;
mod bytes_ext;
pub mod crypto;
pub mod error;
pub mod hex;

pub use crypto::{
    attack::{AttackConfig, Calibration, OracleAttack, Phase, Termination},
    oracle::{AffixingOracle, EncryptionOracle, OracleFn},
};
pub use error::{CalibrationError, Error, LengthError, PaddingError, Result};
