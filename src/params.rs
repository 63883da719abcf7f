//! Handing settings to the audio thread.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::Settings;

/// Settings shared between whoever edits them and the thread that processes audio.
///
/// Writers store new values with [`BoostParams::set`] (or the per-field setters) from any
/// thread. The audio thread compares [`BoostParams::generation`] against the last generation
/// it saw, once per buffer, and only when it changed does it take a [`BoostParams::snapshot`]
/// and retune its filter. The filter itself never leaves the audio thread.
///
/// The fields are updated independently, so a snapshot taken while a writer is halfway through
/// `set` can pair the new frequency with the old gain. The writer bumps the generation after
/// its last store, so the reader retunes again on its next buffer and the mix lasts at most
/// one buffer.
#[derive(Debug)]
pub struct BoostParams {
    center_frequency: AtomicU64,
    gain: AtomicU64,
    generation: AtomicU64,
}

impl Default for BoostParams {
    fn default() -> Self {
        BoostParams::new(Settings::default())
    }
}

impl BoostParams {
    /// Creates parameters holding `settings`.
    pub fn new(settings: Settings) -> BoostParams {
        BoostParams {
            center_frequency: AtomicU64::new(settings.center_frequency.to_bits()),
            gain: AtomicU64::new(settings.gain.to_bits()),
            generation: AtomicU64::new(0),
        }
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::Release);
    }

    /// Replaces both settings.
    pub fn set(&self, settings: &Settings) {
        self.center_frequency
            .store(settings.center_frequency.to_bits(), Ordering::Relaxed);
        self.gain.store(settings.gain.to_bits(), Ordering::Relaxed);
        self.bump();
    }

    /// Replaces the corner frequency.
    pub fn set_center_frequency(&self, hz: f64) {
        self.center_frequency.store(hz.to_bits(), Ordering::Relaxed);
        self.bump();
    }

    /// Replaces the gain.
    pub fn set_gain(&self, gain: f64) {
        self.gain.store(gain.to_bits(), Ordering::Relaxed);
        self.bump();
    }

    /// A counter that changes every time a setting is stored.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// The current settings.
    pub fn snapshot(&self) -> Settings {
        Settings {
            center_frequency: f64::from_bits(self.center_frequency.load(Ordering::Relaxed)),
            gain: f64::from_bits(self.gain.load(Ordering::Relaxed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    extern crate static_assertions as sa;

    sa::assert_impl_all!(BoostParams: Send, Sync);

    #[test]
    fn generation_tracks_stores() {
        let params = BoostParams::default();
        let g0 = params.generation();
        assert_eq!(params.snapshot(), Settings::default());

        params.set_gain(200.0);
        let g1 = params.generation();
        assert_ne!(g0, g1);
        assert_eq!(params.snapshot().gain, 200.0);

        params.set(&Settings {
            center_frequency: 70.0,
            gain: 10.0,
        });
        assert_ne!(params.generation(), g1);
        assert_eq!(params.snapshot().center_frequency, 70.0);

        params.set_center_frequency(90.0);
        assert_eq!(params.snapshot().center_frequency, 90.0);
        assert_eq!(params.snapshot().gain, 10.0);
    }

    #[test]
    fn visible_across_threads() {
        let params = Arc::new(BoostParams::default());
        let writer = Arc::clone(&params);
        thread::spawn(move || {
            writer.set(&Settings {
                center_frequency: 100.0,
                gain: 50.0,
            })
        })
        .join()
        .unwrap();

        assert_eq!(params.generation(), 1);
        assert_eq!(
            params.snapshot(),
            Settings {
                center_frequency: 100.0,
                gain: 50.0,
            }
        );
    }
}
