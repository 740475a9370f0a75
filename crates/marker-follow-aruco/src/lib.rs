//! Marker dictionaries and the detector-facing half of the tracking pipeline.
//!
//! This crate focuses on:
//! - the table of predefined dictionaries a detector can be asked for,
//! - adapting an external detector to "one tracked marker -> one pose",
//! - frame decimation to bound detection cost.
//!
//! It does **not** perform marker detection. Detectors plug in through the
//! [`MarkerDetector`] trait.

mod decimate;
mod detect;
mod dictionary;

pub use decimate::FrameDecimator;
pub use detect::{select_tracked, MarkerAdapter, MarkerDetector, MarkerObservation};
pub use dictionary::{builtin_dictionary, Dictionary, BUILTIN_DICTIONARIES, DICT_4X4_50};
