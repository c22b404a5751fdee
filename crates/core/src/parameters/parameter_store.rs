use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::shared::constants::{
    DEFAULT_FACE_PADDING, DEFAULT_PIXEL_SCALE, FACE_PADDING_MAX, FACE_PADDING_MIN,
    PIXEL_SCALE_MAX, PIXEL_SCALE_MIN,
};

/// Closed interval with a fallback for non-finite input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParameterRange {
    pub min: f64,
    pub max: f64,
    pub default: f64,
}

impl ParameterRange {
    pub const PIXEL_SCALE: ParameterRange = ParameterRange {
        min: PIXEL_SCALE_MIN,
        max: PIXEL_SCALE_MAX,
        default: DEFAULT_PIXEL_SCALE,
    };

    pub const FACE_PADDING: ParameterRange = ParameterRange {
        min: FACE_PADDING_MIN,
        max: FACE_PADDING_MAX,
        default: DEFAULT_FACE_PADDING,
    };

    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.default;
        }
        value.clamp(self.min, self.max)
    }
}

/// The two user-tunable settings, read once per frame as a unit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Parameters {
    /// Pixelation block size in pixels.
    pub pixel_scale: f64,
    /// Fractional padding around each face box.
    pub face_padding: f64,
}

impl Parameters {
    pub fn clamped(self) -> Self {
        Self {
            pixel_scale: ParameterRange::PIXEL_SCALE.clamp(self.pixel_scale),
            face_padding: ParameterRange::FACE_PADDING.clamp(self.face_padding),
        }
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            pixel_scale: DEFAULT_PIXEL_SCALE,
            face_padding: DEFAULT_FACE_PADDING,
        }
    }
}

/// Parameter channel between the UI thread and the processing thread.
///
/// Both fields live behind one mutex so [`snapshot`](Self::snapshot) always
/// returns a pair that existed at some instant. The lock is held only for a
/// field copy; no frame work ever happens under it. Share it with `Arc`.
#[derive(Debug, Default)]
pub struct ParameterStore {
    current: Mutex<Parameters>,
}

impl ParameterStore {
    pub fn new(initial: Parameters) -> Self {
        Self {
            current: Mutex::new(initial.clamped()),
        }
    }

    /// Clamps to 20–400 and stores. Returns the value actually stored.
    pub fn set_pixel_scale(&self, value: f64) -> f64 {
        let clamped = ParameterRange::PIXEL_SCALE.clamp(value);
        self.lock().pixel_scale = clamped;
        log::debug!("pixel scale committed: {clamped}");
        clamped
    }

    /// Clamps to 0.0–1.5 and stores. Returns the value actually stored.
    pub fn set_face_padding(&self, value: f64) -> f64 {
        let clamped = ParameterRange::FACE_PADDING.clamp(value);
        self.lock().face_padding = clamped;
        log::debug!("face padding committed: {clamped}");
        clamped
    }

    pub fn snapshot(&self) -> Parameters {
        *self.lock()
    }

    // A panic while holding the guard cannot leave `Parameters` half-written
    // (both fields are plain copies), so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Parameters> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
