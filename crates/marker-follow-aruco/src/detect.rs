//! Detector adapter: run an external detector and keep one tracked marker.

use crate::Dictionary;
use marker_follow_core::{GrayImageView, MarkerQuad, TrackedPose};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// One marker reported by a detector.
#[derive(Clone, Debug, PartialEq)]
pub struct MarkerObservation {
    pub id: i32,
    /// Corners in image coordinates (TL, TR, BR, BL in the marker's frame).
    pub corners: MarkerQuad,
}

/// An external marker detector.
///
/// Implementations decode every marker of `dictionary` visible in `image`.
/// Order of the returned observations is the detector's own.
pub trait MarkerDetector: Send {
    fn detect(
        &mut self,
        image: &GrayImageView<'_>,
        dictionary: &Dictionary,
    ) -> Vec<MarkerObservation>;
}

impl<F> MarkerDetector for F
where
    F: FnMut(&GrayImageView<'_>, &Dictionary) -> Vec<MarkerObservation> + Send,
{
    fn detect(
        &mut self,
        image: &GrayImageView<'_>,
        dictionary: &Dictionary,
    ) -> Vec<MarkerObservation> {
        self(image, dictionary)
    }
}

/// First observation carrying `id`, in detector order.
pub fn select_tracked(observations: &[MarkerObservation], id: i32) -> Option<&MarkerObservation> {
    observations.iter().find(|o| o.id == id)
}

/// Wraps a detector with the active dictionary and the tracked marker id.
pub struct MarkerAdapter {
    detector: Box<dyn MarkerDetector>,
    dictionary: Dictionary,
    tracked_id: i32,
}

impl MarkerAdapter {
    pub fn new(detector: Box<dyn MarkerDetector>, dictionary: Dictionary, tracked_id: i32) -> Self {
        Self {
            detector,
            dictionary,
            tracked_id,
        }
    }

    #[inline]
    pub fn dictionary(&self) -> Dictionary {
        self.dictionary
    }

    #[inline]
    pub fn tracked_id(&self) -> i32 {
        self.tracked_id
    }

    pub fn set_dictionary(&mut self, dictionary: Dictionary) {
        self.dictionary = dictionary;
    }

    /// The id is taken as-is; ids outside the dictionary simply never match.
    pub fn set_tracked_id(&mut self, id: i32) {
        if !self.dictionary.contains_id(id) {
            log::debug!(
                "tracked id {id} is outside {} (0..{})",
                self.dictionary.name,
                self.dictionary.len
            );
        }
        self.tracked_id = id;
    }

    /// Run the detector and reduce the tracked marker, if present, to a pose.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, image), fields(width = image.width, height = image.height))
    )]
    pub fn locate(&mut self, image: &GrayImageView<'_>) -> Option<TrackedPose> {
        let observations = self.detector.detect(image, &self.dictionary);
        log::trace!(
            "detector returned {} marker(s) from {}",
            observations.len(),
            self.dictionary.name
        );
        select_tracked(&observations, self.tracked_id).map(|o| TrackedPose::from_quad(&o.corners))
    }
}
