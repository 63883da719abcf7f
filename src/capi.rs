use std::boxed::Box;
use std::os::raw::{c_double, c_int, c_short, c_uint};

pub struct BiquadFilter(crate::BiquadFilter);

/// Create a pass-through filter
///
/// Use `bassboost_filter_destroy` to deallocate it
#[no_mangle]
pub unsafe extern "C" fn bassboost_filter_create() -> *mut BiquadFilter {
    Box::into_raw(Box::new(BiquadFilter(crate::BiquadFilter::new())))
}

/// Deallocate and destroy a filter
///
/// Use it only on pointers returned by `bassboost_filter_create`.
#[no_mangle]
pub unsafe extern "C" fn bassboost_filter_destroy(st: *mut BiquadFilter) {
    if !st.is_null() {
        drop(Box::from_raw(st));
    }
}

/// Switch to a low-pass response, interpolating over `steps` samples
#[no_mangle]
pub unsafe extern "C" fn bassboost_filter_set_low_pass(
    st: *mut BiquadFilter,
    steps: c_uint,
    center_frequency: c_double,
    sampling_frequency: c_double,
    resonance: c_double,
) {
    let state = st.as_mut().expect("Invalid pointer");
    state
        .0
        .set_low_pass(steps, center_frequency, sampling_frequency, resonance);
}

/// Switch to a high-pass response, interpolating over `steps` samples
#[no_mangle]
pub unsafe extern "C" fn bassboost_filter_set_high_pass(
    st: *mut BiquadFilter,
    steps: c_uint,
    center_frequency: c_double,
    sampling_frequency: c_double,
    resonance: c_double,
) {
    let state = st.as_mut().expect("Invalid pointer");
    state
        .0
        .set_high_pass(steps, center_frequency, sampling_frequency, resonance);
}

/// Switch to a band-pass response, interpolating over `steps` samples
#[no_mangle]
pub unsafe extern "C" fn bassboost_filter_set_band_pass(
    st: *mut BiquadFilter,
    steps: c_uint,
    center_frequency: c_double,
    sampling_frequency: c_double,
    resonance: c_double,
) {
    let state = st.as_mut().expect("Invalid pointer");
    state
        .0
        .set_band_pass(steps, center_frequency, sampling_frequency, resonance);
}

/// Switch to a high-shelf response, interpolating over `steps` samples
#[no_mangle]
pub unsafe extern "C" fn bassboost_filter_set_high_shelf(
    st: *mut BiquadFilter,
    steps: c_uint,
    center_frequency: c_double,
    sampling_frequency: c_double,
    gain_db: c_double,
    slope: c_double,
    overall_gain_db: c_double,
) {
    let state = st.as_mut().expect("Invalid pointer");
    state.0.set_high_shelf(
        steps,
        center_frequency,
        sampling_frequency,
        gain_db,
        slope,
        overall_gain_db,
    );
}

/// Filter one sample
///
/// The result is not clamped, see `bassboost_clamp16`.
#[no_mangle]
pub unsafe extern "C" fn bassboost_filter_process(st: *mut BiquadFilter, sample: c_int) -> c_int {
    let state = st.as_mut().expect("Invalid pointer");
    state.0.process(sample)
}

/// Clear the history and the coefficients
///
/// The filter outputs silence until it is configured again.
#[no_mangle]
pub unsafe extern "C" fn bassboost_filter_reset(st: *mut BiquadFilter) {
    let state = st.as_mut().expect("Invalid pointer");
    state.0.reset();
}

/// Saturate a sample to 16 bits
#[no_mangle]
pub extern "C" fn bassboost_clamp16(sample: c_int) -> c_short {
    crate::clamp16(sample)
}
