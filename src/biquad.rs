//! A fixed-point biquad filter with click-free retuning.

use std::f64::consts::PI;

use crate::fixed::Q32;

/// Saturates a wide intermediate sum to the signed 16-bit range.
///
/// If bits 15 through 31 of `sample` are not all equal then `sample` doesn't fit in an `i16`,
/// and we return `i16::MAX` or `i16::MIN` according to its sign.
#[inline]
pub fn clamp16(sample: i32) -> i16 {
    if ((sample >> 15) ^ (sample >> 31)) != 0 {
        (0x7FFF ^ (sample >> 31)) as i16
    } else {
        sample as i16
    }
}

/// The six coefficients of a biquad design, before normalization.
///
/// With input `x` and output `y`, these describe the difference equation
/// ```text
/// a0 * y[n] = b0 * x[n] + b1 * x[n-1] + b2 * x[n-2] - a1 * y[n-1] - a2 * y[n-2].
/// ```
/// The constructors follow the formulas of Robert Bristow-Johnson's "Audio EQ Cookbook".
#[derive(Clone, Copy, Debug, PartialEq)]
#[allow(missing_docs)]
pub struct Coefficients {
    pub a0: f64,
    pub a1: f64,
    pub a2: f64,
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
}

fn debug_check_frequency(center_frequency: f64, sampling_frequency: f64) {
    debug_assert!(
        center_frequency > 0.0 && center_frequency < sampling_frequency / 2.0,
        "center frequency {} Hz must lie strictly between 0 and Nyquist ({} Hz)",
        center_frequency,
        sampling_frequency / 2.0
    );
}

impl Coefficients {
    /// The identity filter.
    pub const PASS_THROUGH: Coefficients = Coefficients {
        a0: 1.0,
        a1: 0.0,
        a2: 0.0,
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
    };

    /// A second-order low-pass filter with unity gain at DC.
    ///
    /// A `resonance` of zero is allowed and gives a filter that outputs nothing at all.
    pub fn low_pass(
        center_frequency: f64,
        sampling_frequency: f64,
        resonance: f64,
    ) -> Coefficients {
        debug_check_frequency(center_frequency, sampling_frequency);
        debug_assert!(resonance >= 0.0, "negative resonance {}", resonance);

        let w0 = 2.0 * PI * center_frequency / sampling_frequency;
        let cos = w0.cos();
        let alpha = w0.sin() / (2.0 * resonance);

        Coefficients {
            b0: (1.0 - cos) / 2.0,
            b1: 1.0 - cos,
            b2: (1.0 - cos) / 2.0,
            a0: 1.0 + alpha,
            a1: -2.0 * cos,
            a2: 1.0 - alpha,
        }
    }

    /// A second-order high-pass filter with unity gain at Nyquist.
    pub fn high_pass(
        center_frequency: f64,
        sampling_frequency: f64,
        resonance: f64,
    ) -> Coefficients {
        debug_check_frequency(center_frequency, sampling_frequency);
        debug_assert!(resonance >= 0.0, "negative resonance {}", resonance);

        let w0 = 2.0 * PI * center_frequency / sampling_frequency;
        let cos = w0.cos();
        let alpha = w0.sin() / (2.0 * resonance);

        Coefficients {
            b0: (1.0 + cos) / 2.0,
            b1: -(1.0 + cos),
            b2: (1.0 + cos) / 2.0,
            a0: 1.0 + alpha,
            a1: -2.0 * cos,
            a2: 1.0 - alpha,
        }
    }

    /// A band-pass filter with constant skirt gain, so the peak gain is `resonance`.
    pub fn band_pass(
        center_frequency: f64,
        sampling_frequency: f64,
        resonance: f64,
    ) -> Coefficients {
        debug_check_frequency(center_frequency, sampling_frequency);
        debug_assert!(resonance >= 0.0, "negative resonance {}", resonance);

        let w0 = 2.0 * PI * center_frequency / sampling_frequency;
        let sin = w0.sin();
        let alpha = sin / (2.0 * resonance);

        Coefficients {
            b0: sin / 2.0,
            b1: 0.0,
            b2: -sin / 2.0,
            a0: 1.0 + alpha,
            a1: -2.0 * w0.cos(),
            a2: 1.0 - alpha,
        }
    }

    /// A high shelf boosting (or cutting) everything above `center_frequency` by `gain_db`.
    ///
    /// `slope` is the cookbook's shelf slope `S`; 1.0 is the steepest slope without a bump.
    /// The whole response is then scaled by `overall_gain_db`.
    pub fn high_shelf(
        center_frequency: f64,
        sampling_frequency: f64,
        gain_db: f64,
        slope: f64,
        overall_gain_db: f64,
    ) -> Coefficients {
        debug_check_frequency(center_frequency, sampling_frequency);
        debug_assert!(slope > 0.0, "non-positive shelf slope {}", slope);

        let w0 = 2.0 * PI * center_frequency / sampling_frequency;
        let cos = w0.cos();
        let a = 10.0f64.powf(gain_db / 40.0);
        let alpha = w0.sin() / 2.0 * ((a + 1.0 / a) * (1.0 / slope - 1.0) + 2.0).sqrt();
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        let overall_gain = 10.0f64.powf(overall_gain_db / 20.0);
        Coefficients {
            b0: a * ((a + 1.0) + (a - 1.0) * cos + two_sqrt_a_alpha) * overall_gain,
            b1: -2.0 * a * ((a - 1.0) + (a + 1.0) * cos) * overall_gain,
            b2: a * ((a + 1.0) + (a - 1.0) * cos - two_sqrt_a_alpha) * overall_gain,
            a0: (a + 1.0) - (a - 1.0) * cos + two_sqrt_a_alpha,
            a1: 2.0 * ((a - 1.0) - (a + 1.0) * cos),
            a2: (a + 1.0) - (a - 1.0) * cos - two_sqrt_a_alpha,
        }
    }

    /// Normalizes by `a0` and converts to the taps used by [`BiquadFilter::process`].
    pub fn to_taps(&self) -> Taps {
        Taps {
            b0: Q32::from_f64(self.b0 / self.a0),
            b1: Q32::from_f64(self.b1 / self.a0),
            b2: Q32::from_f64(self.b2 / self.a0),
            a1: -Q32::from_f64(self.a1 / self.a0),
            a2: -Q32::from_f64(self.a2 / self.a0),
        }
    }
}

/// The normalized fixed-point taps of a biquad.
///
/// Unlike [`Coefficients`], the feedback taps are stored negated so that the filter only needs
/// to add:
/// ```text
/// y[n] = b0 * x[n] + b1 * x[n-1] + b2 * x[n-2] + a1 * y[n-1] + a2 * y[n-2].
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Taps {
    pub b0: Q32,
    pub b1: Q32,
    pub b2: Q32,
    pub a1: Q32,
    pub a2: Q32,
}

impl Taps {
    fn step_toward(&self, target: &Taps, steps: u32) -> Taps {
        Taps {
            b0: (target.b0 - self.b0).div_steps(steps),
            b1: (target.b1 - self.b1).div_steps(steps),
            b2: (target.b2 - self.b2).div_steps(steps),
            a1: (target.a1 - self.a1).div_steps(steps),
            a2: (target.a2 - self.a2).div_steps(steps),
        }
    }

    fn advance(&mut self, delta: &Taps) {
        self.b0 += delta.b0;
        self.b1 += delta.b1;
        self.b2 += delta.b2;
        self.a1 += delta.a1;
        self.a2 += delta.a2;
    }
}

/// A filter response, as a single value.
///
/// This is handy when the response type itself is a setting; see [`BiquadFilter::configure`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[allow(missing_docs)]
pub enum Response {
    LowPass {
        center_frequency: f64,
        resonance: f64,
    },
    HighPass {
        center_frequency: f64,
        resonance: f64,
    },
    BandPass {
        center_frequency: f64,
        resonance: f64,
    },
    HighShelf {
        center_frequency: f64,
        gain_db: f64,
        slope: f64,
        overall_gain_db: f64,
    },
}

impl Response {
    /// Designs this response for the given sampling frequency.
    pub fn coefficients(&self, sampling_frequency: f64) -> Coefficients {
        match *self {
            Response::LowPass {
                center_frequency,
                resonance,
            } => Coefficients::low_pass(center_frequency, sampling_frequency, resonance),
            Response::HighPass {
                center_frequency,
                resonance,
            } => Coefficients::high_pass(center_frequency, sampling_frequency, resonance),
            Response::BandPass {
                center_frequency,
                resonance,
            } => Coefficients::band_pass(center_frequency, sampling_frequency, resonance),
            Response::HighShelf {
                center_frequency,
                gain_db,
                slope,
                overall_gain_db,
            } => Coefficients::high_shelf(
                center_frequency,
                sampling_frequency,
                gain_db,
                slope,
                overall_gain_db,
            ),
        }
    }
}

/// A single-channel second-order IIR filter working on integer samples.
///
/// All the arithmetic is 64-bit fixed point (see [`Q32`]), so the per-sample work is five
/// multiplies, four adds and a shift. Every `set_*` method takes a number of `steps`: if it is
/// zero the new response takes effect immediately, and otherwise the taps move linearly from
/// their current values to the new ones over the next `steps` calls to [`BiquadFilter::process`].
/// Retuning a filter that is playing should use a few steps, because jumping taps are audible
/// as a click.
///
/// # Example
///
/// ```rust
/// # use bassboost::{clamp16, BiquadFilter};
/// let mut filter = BiquadFilter::new();
/// filter.set_low_pass(0, 1000.0, 44_100.0, 0.707);
///
/// // A low-pass filter lets a constant signal through.
/// let mut out = 0;
/// for _ in 0..10_000 {
///     out = filter.process(20_000);
/// }
/// assert!((out - 20_000).abs() < 100);
/// assert_eq!(clamp16(out + 20_000), i16::MAX);
/// ```
#[derive(Clone, Debug)]
pub struct BiquadFilter {
    x1: i32,
    x2: i32,
    y1: i32,
    y2: i32,
    taps: Taps,
    /// Where the taps end up when the interpolation finishes.
    target: Taps,
    /// How much the taps move on each interpolation step.
    delta: Taps,
    interpolation_steps: u32,
}

impl Default for BiquadFilter {
    fn default() -> Self {
        BiquadFilter::new()
    }
}

impl BiquadFilter {
    /// Creates a pass-through filter with empty history.
    pub fn new() -> BiquadFilter {
        let mut filter = BiquadFilter {
            x1: 0,
            x2: 0,
            y1: 0,
            y2: 0,
            taps: Taps::default(),
            target: Taps::default(),
            delta: Taps::default(),
            interpolation_steps: 0,
        };
        filter.set_coefficients(0, &Coefficients::PASS_THROUGH);
        filter
    }

    /// Switches to the response described by `coeffs`, either now or over `steps` samples.
    ///
    /// The sample history is kept either way. Calling this in the middle of an interpolation
    /// starts a new one from wherever the taps happen to be.
    pub fn set_coefficients(&mut self, steps: u32, coeffs: &Coefficients) {
        let target = coeffs.to_taps();
        self.target = target;
        if steps == 0 {
            self.taps = target;
            self.delta = Taps::default();
        } else {
            self.delta = self.taps.step_toward(&target, steps);
        }
        self.interpolation_steps = steps;
    }

    /// Switches to a low-pass response. See [`Coefficients::low_pass`].
    pub fn set_low_pass(
        &mut self,
        steps: u32,
        center_frequency: f64,
        sampling_frequency: f64,
        resonance: f64,
    ) {
        let coeffs = Coefficients::low_pass(center_frequency, sampling_frequency, resonance);
        self.set_coefficients(steps, &coeffs);
    }

    /// Switches to a high-pass response. See [`Coefficients::high_pass`].
    pub fn set_high_pass(
        &mut self,
        steps: u32,
        center_frequency: f64,
        sampling_frequency: f64,
        resonance: f64,
    ) {
        let coeffs = Coefficients::high_pass(center_frequency, sampling_frequency, resonance);
        self.set_coefficients(steps, &coeffs);
    }

    /// Switches to a band-pass response. See [`Coefficients::band_pass`].
    pub fn set_band_pass(
        &mut self,
        steps: u32,
        center_frequency: f64,
        sampling_frequency: f64,
        resonance: f64,
    ) {
        let coeffs = Coefficients::band_pass(center_frequency, sampling_frequency, resonance);
        self.set_coefficients(steps, &coeffs);
    }

    /// Switches to a high-shelf response. See [`Coefficients::high_shelf`].
    pub fn set_high_shelf(
        &mut self,
        steps: u32,
        center_frequency: f64,
        sampling_frequency: f64,
        gain_db: f64,
        slope: f64,
        overall_gain_db: f64,
    ) {
        let coeffs = Coefficients::high_shelf(
            center_frequency,
            sampling_frequency,
            gain_db,
            slope,
            overall_gain_db,
        );
        self.set_coefficients(steps, &coeffs);
    }

    /// Switches to `response`, designed for `sampling_frequency`.
    pub fn configure(&mut self, steps: u32, sampling_frequency: f64, response: &Response) {
        self.set_coefficients(steps, &response.coefficients(sampling_frequency));
    }

    /// Filters one sample.
    ///
    /// The output is not clamped; callers writing 16-bit audio should go through [`clamp16`].
    #[inline]
    pub fn process(&mut self, x0: i32) -> i32 {
        let t = &self.taps;
        let y0 = t
            .b0
            .mul_sample(x0)
            .wrapping_add(t.b1.mul_sample(self.x1))
            .wrapping_add(t.b2.mul_sample(self.x2))
            .wrapping_add(t.a1.mul_sample(self.y1))
            .wrapping_add(t.a2.mul_sample(self.y2))
            >> Q32::FRAC_BITS;
        let y0 = y0 as i32;

        self.y2 = self.y1;
        self.y1 = y0;
        self.x2 = self.x1;
        self.x1 = x0;

        if self.interpolation_steps != 0 {
            self.interpolation_steps -= 1;
            if self.interpolation_steps == 0 {
                // The per-step deltas were truncated, so land on the target exactly.
                self.taps = self.target;
            } else {
                self.taps.advance(&self.delta);
            }
        }

        y0
    }

    /// Filters every sample in `buf`, in place.
    pub fn process_buffer(&mut self, buf: &mut [i32]) {
        for x in buf {
            *x = self.process(*x);
        }
    }

    /// Clears the history *and* the taps.
    ///
    /// A reset filter outputs silence until one of the `set_*` methods is called again.
    pub fn reset(&mut self) {
        self.x1 = 0;
        self.x2 = 0;
        self.y1 = 0;
        self.y2 = 0;
        self.taps = Taps::default();
        self.target = Taps::default();
        self.delta = Taps::default();
        self.interpolation_steps = 0;
    }

    /// The taps currently in use.
    pub fn taps(&self) -> Taps {
        self.taps
    }

    /// The number of samples left before an interpolation finishes.
    pub fn interpolation_steps(&self) -> u32 {
        self.interpolation_steps
    }

    /// Is an interpolation in progress?
    pub fn is_interpolating(&self) -> bool {
        self.interpolation_steps != 0
    }
}
