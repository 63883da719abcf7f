use std::sync::Arc;

use crate::{clamp16, BiquadFilter, BoostParams, Error, Result, Settings};

/// Retuning the filter spreads the change over this many samples.
pub const INTERPOLATION_STEPS: u32 = 10;
/// The sample rate assumed until the stream announces its own.
pub const DEFAULT_SAMPLE_RATE: f64 = 44_100.0;
/// The gain setting is divided by this to get the filter resonance.
pub const GAIN_TO_RESONANCE: f64 = 666.0;

/// A bass boost for interleaved 16-bit audio.
///
/// The channels of each frame are summed into a single low-passed signal, and that same signal
/// is added back to every channel. With stereo input this is `L + lp(L + R)` and
/// `R + lp(L + R)`: it's cheap, and it keeps the bass centered, but it also means that bass
/// which was panned to one side gets boosted on both.
///
/// A `BassBoost` follows a shared [`BoostParams`]: changes made there are picked up at the
/// start of the next buffer and faded in over [`INTERPOLATION_STEPS`] samples.
///
/// # Example
///
/// ```rust
/// # use std::sync::Arc;
/// # use bassboost::{BassBoost, BoostParams, Settings};
/// let params = Arc::new(BoostParams::new(Settings {
///     center_frequency: 80.0,
///     gain: 400.0,
/// }));
/// let mut boost = BassBoost::new(Arc::clone(&params));
///
/// let mut buf = vec![0i16; 2 * 1024];
/// boost.process_interleaved(&mut buf);
///
/// // Some other thread turns it up.
/// params.set_gain(600.0);
/// boost.process_interleaved(&mut buf);
/// ```
#[derive(Debug)]
pub struct BassBoost {
    filter: BiquadFilter,
    params: Arc<BoostParams>,
    /// The generation of `params` that `settings` came from.
    generation: u64,
    settings: Settings,
    channels: usize,
    sample_rate: f64,
}

impl BassBoost {
    /// Creates a stereo bass boost at the default sample rate.
    ///
    /// The filter starts out already tuned to the current settings. If they can't be used at
    /// the default sample rate, it starts out silent and the boost is off.
    pub fn new(params: Arc<BoostParams>) -> BassBoost {
        let mut filter = BiquadFilter::new();
        filter.reset();
        let mut boost = BassBoost {
            filter,
            generation: params.generation(),
            settings: params.snapshot(),
            params,
            channels: 2,
            sample_rate: DEFAULT_SAMPLE_RATE,
        };
        boost.retune(0);
        boost
    }

    /// The parameters this boost follows.
    pub fn params(&self) -> &Arc<BoostParams> {
        &self.params
    }

    /// The settings currently applied to the filter.
    pub fn settings(&self) -> Settings {
        self.settings
    }

    /// The number of interleaved channels per frame.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// The sample rate the filter is tuned for.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// The underlying filter.
    pub fn filter(&self) -> &BiquadFilter {
        &self.filter
    }

    /// Changes the layout of the incoming audio.
    ///
    /// A new sample rate retunes the filter, so that the corner frequency stays put.
    pub fn set_format(&mut self, channels: u8, sample_rate: i32) -> Result<()> {
        if channels == 0 || sample_rate <= 0 {
            return Err(Error::InvalidFormat {
                channels,
                sample_rate,
            });
        }
        self.channels = channels as usize;
        let sample_rate = sample_rate as f64;
        if sample_rate != self.sample_rate {
            self.sample_rate = sample_rate;
            self.retune(INTERPOLATION_STEPS);
        }
        Ok(())
    }

    fn retune(&mut self, steps: u32) {
        let s = self.settings;
        if let Err(e) = s.validated() {
            log::warn!("{}; keeping the old filter", e);
            return;
        }
        if s.center_frequency >= self.sample_rate / 2.0 {
            log::warn!(
                "corner frequency {} Hz is above Nyquist at {} Hz; keeping the old filter",
                s.center_frequency,
                self.sample_rate
            );
            return;
        }
        log::debug!(
            "tuning bass boost: {} Hz, resonance {} at {} Hz over {} samples",
            s.center_frequency,
            s.resonance(),
            self.sample_rate,
            steps
        );
        self.filter
            .set_low_pass(steps, s.center_frequency, self.sample_rate, s.resonance());
    }

    fn poll_params(&mut self) {
        let generation = self.params.generation();
        if generation != self.generation {
            self.generation = generation;
            self.settings = self.params.snapshot();
            self.retune(INTERPOLATION_STEPS);
        }
    }

    /// Boosts a buffer of interleaved samples in place.
    ///
    /// If `samples` doesn't hold a whole number of frames, the leftover samples at the end are
    /// not touched.
    pub fn process_interleaved(&mut self, samples: &mut [i16]) {
        self.poll_params();
        for frame in samples.chunks_exact_mut(self.channels) {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            let boost = self.filter.process(sum);
            for s in frame {
                *s = clamp16((*s as i32).wrapping_add(boost));
            }
        }
    }

    /// Forgets the audio history, for example because a new stream is starting.
    ///
    /// Unlike [`BiquadFilter::reset`], this leaves the filter tuned to the latest settings.
    pub fn restart(&mut self) {
        self.filter.reset();
        self.generation = self.params.generation();
        self.settings = self.params.snapshot();
        self.retune(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biquad::{Coefficients, Taps};

    extern crate static_assertions as sa;

    sa::assert_impl_all!(BassBoost: Send);

    fn boost_with(center_frequency: f64, gain: f64) -> BassBoost {
        BassBoost::new(Arc::new(BoostParams::new(Settings {
            center_frequency,
            gain,
        })))
    }

    fn stereo_sine(frames: usize) -> Vec<i16> {
        let mut buf = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            let t = i as f64 / DEFAULT_SAMPLE_RATE;
            buf.push(((t * 2.0 * std::f64::consts::PI * 40.0).sin() * 8000.0) as i16);
            buf.push(((t * 2.0 * std::f64::consts::PI * 3000.0).sin() * 4000.0) as i16);
        }
        buf
    }

    #[test]
    fn zero_gain_is_transparent() {
        let mut boost = boost_with(55.0, 0.0);
        let input = stereo_sine(4096);
        let mut buf = input.clone();
        boost.process_interleaved(&mut buf);
        assert_eq!(buf, input);
    }

    #[test]
    fn starts_tuned() {
        let boost = boost_with(80.0, 333.0);
        assert!(!boost.filter().is_interpolating());
        assert_eq!(
            boost.filter().taps(),
            Coefficients::low_pass(80.0, DEFAULT_SAMPLE_RATE, 0.5).to_taps()
        );
    }

    #[test]
    fn same_boost_on_both_channels() {
        let mut boost = boost_with(100.0, 666.0);
        let mut reference = BiquadFilter::new();
        reference.set_low_pass(0, 100.0, DEFAULT_SAMPLE_RATE, 1.0);

        let input = stereo_sine(2048);
        let mut buf = input.clone();
        boost.process_interleaved(&mut buf);

        for (inp, out) in input.chunks_exact(2).zip(buf.chunks_exact(2)) {
            let b = reference.process(inp[0] as i32 + inp[1] as i32);
            assert_eq!(out[0], clamp16(inp[0] as i32 + b));
            assert_eq!(out[1], clamp16(inp[1] as i32 + b));
        }
    }

    #[test]
    fn loud_input_saturates() {
        let mut boost = boost_with(1000.0, 666.0);
        let mut buf = vec![30_000i16; 2 * 4096];
        boost.process_interleaved(&mut buf);
        assert!(buf[buf.len() - 2..].iter().all(|&s| s == i16::MAX));

        let mut buf = vec![-30_000i16; 2 * 4096];
        boost.process_interleaved(&mut buf);
        assert!(buf[buf.len() - 2..].iter().all(|&s| s == i16::MIN));
    }

    #[test]
    fn follows_params() {
        let mut boost = boost_with(55.0, 0.0);
        boost.params().set_gain(666.0);
        // Nothing happens until the next buffer.
        assert_eq!(boost.settings().gain, 0.0);

        let mut buf = vec![0i16; 2 * 4];
        boost.process_interleaved(&mut buf);
        assert_eq!(boost.settings().gain, 666.0);
        assert!(boost.filter().is_interpolating());

        let mut buf = vec![0i16; 2 * 16];
        boost.process_interleaved(&mut buf);
        assert!(!boost.filter().is_interpolating());
        assert_eq!(
            boost.filter().taps(),
            Coefficients::low_pass(55.0, DEFAULT_SAMPLE_RATE, 1.0).to_taps()
        );
    }

    #[test]
    fn format_changes() {
        let mut boost = boost_with(60.0, 666.0);
        boost.set_format(1, 48_000).unwrap();
        assert_eq!(boost.channels(), 1);
        assert_eq!(boost.sample_rate(), 48_000.0);
        assert_eq!(boost.filter().interpolation_steps(), INTERPOLATION_STEPS);

        // Same rate again: no retune.
        let mut buf = vec![0i16; 64];
        boost.process_interleaved(&mut buf);
        boost.set_format(2, 48_000).unwrap();
        assert!(!boost.filter().is_interpolating());
        assert_eq!(
            boost.filter().taps(),
            Coefficients::low_pass(60.0, 48_000.0, 1.0).to_taps()
        );

        assert!(matches!(
            boost.set_format(0, 44_100),
            Err(Error::InvalidFormat { channels: 0, .. })
        ));
        assert!(boost.set_format(2, 0).is_err());
        assert_eq!(boost.sample_rate(), 48_000.0);
    }

    #[test]
    fn nyquist_keeps_old_filter() {
        let mut boost = boost_with(5000.0, 666.0);
        let before = boost.filter().taps();
        boost.set_format(2, 8000).unwrap();
        assert_eq!(boost.filter().taps(), before);
        assert!(!boost.filter().is_interpolating());
    }

    #[test]
    fn unusable_first_tuning_is_silent() {
        let mut boost = boost_with(30_000.0, 0.0);
        assert_eq!(boost.filter().taps(), Taps::default());
        let mut buf = [1000i16, 1000];
        boost.process_interleaved(&mut buf);
        assert_eq!(buf, [1000, 1000]);

        // A fast enough stream can use it, and fades in from nothing.
        let mut boost = boost_with(30_000.0, 666.0);
        boost.set_format(2, 96_000).unwrap();
        let mut buf = vec![1000i16; 2];
        boost.process_interleaved(&mut buf);
        assert_eq!(buf, [1000, 1000]);
        let mut buf = vec![0i16; 2 * 16];
        boost.process_interleaved(&mut buf);
        assert_eq!(
            boost.filter().taps(),
            Coefficients::low_pass(30_000.0, 96_000.0, 1.0).to_taps()
        );
    }

    #[test]
    fn invalid_params_keep_old_filter() {
        let mut boost = boost_with(100.0, 666.0);
        let before = boost.filter().taps();
        let mut buf = stereo_sine(64);

        boost.params().set_gain(-100.0);
        boost.process_interleaved(&mut buf);
        assert_eq!(boost.filter().taps(), before);
        assert!(!boost.filter().is_interpolating());

        boost.params().set_gain(666.0);
        boost.params().set_center_frequency(0.0);
        boost.process_interleaved(&mut buf);
        assert_eq!(boost.filter().taps(), before);

        boost.params().set_center_frequency(f64::NAN);
        boost.process_interleaved(&mut buf);
        assert_eq!(boost.filter().taps(), before);

        // Good values are picked up again.
        boost.params().set_center_frequency(120.0);
        boost.process_interleaved(&mut buf);
        assert_eq!(
            boost.filter().taps(),
            Coefficients::low_pass(120.0, DEFAULT_SAMPLE_RATE, 1.0).to_taps()
        );
    }

    #[test]
    fn partial_frame_untouched() {
        let mut boost = boost_with(1000.0, 666.0);
        let mut buf = vec![20_000i16; 2 * 512 + 1];
        boost.process_interleaved(&mut buf);
        assert_eq!(buf[buf.len() - 1], 20_000);
        assert_ne!(buf[buf.len() - 2], 20_000);
    }

    #[test]
    fn restart_is_not_silent() {
        let mut boost = boost_with(100.0, 666.0);
        let mut buf = stereo_sine(256);
        boost.process_interleaved(&mut buf);

        boost.params().set_center_frequency(120.0);
        boost.restart();
        assert!(!boost.filter().is_interpolating());
        assert_ne!(boost.filter().taps(), Taps::default());
        assert_eq!(
            boost.filter().taps(),
            Coefficients::low_pass(120.0, DEFAULT_SAMPLE_RATE, 1.0).to_taps()
        );

        // History is gone: a fresh boost gives the same output.
        let mut fresh = boost_with(120.0, 666.0);
        let mut a = stereo_sine(256);
        let mut b = a.clone();
        boost.process_interleaved(&mut a);
        fresh.process_interleaved(&mut b);
        assert_eq!(a, b);
    }
}
