#![deny(missing_docs)]

//! `bassboost` is a crate for boosting the bass in 16-bit PCM audio.
//!
//! The heart of it is [`BiquadFilter`], a fixed-point biquad that can be retuned while audio is
//! flowing through it without clicking. [`BassBoost`] uses one of those to add a low-passed copy
//! of the signal back into every channel, following settings that other threads can change
//! through a shared [`BoostParams`]. Finally, [`Session`] runs a [`BassBoost`] over the framed
//! audio socket protocol described in the [`socket`] module, which is how a host player feeds
//! audio to its DSP plugins.

#[cfg(any(cargo_c, feature = "capi"))]
mod capi;

mod biquad;
mod boost;
pub mod config;
mod error;
mod fixed;
mod params;
mod session;
pub mod socket;

pub use biquad::{clamp16, BiquadFilter, Coefficients, Response, Taps};
pub use boost::{BassBoost, DEFAULT_SAMPLE_RATE, GAIN_TO_RESONANCE, INTERPOLATION_STEPS};
pub use config::Settings;
pub use error::{Error, Result};
pub use fixed::Q32;
pub use params::BoostParams;
pub use session::{Session, SessionStats};
