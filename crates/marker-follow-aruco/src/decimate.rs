//! Frame decimation: bound detection cost by skipping frames.

/// Admits one frame each time the counter reaches `skip`.
///
/// With `skip = 0` (or `1`) every frame is admitted. With `skip = 3` frames
/// 3, 6, 9, ... are admitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameDecimator {
    skip: u32,
    counter: u32,
}

impl FrameDecimator {
    pub fn new(skip: u32) -> Self {
        Self { skip, counter: 0 }
    }

    /// Change the cadence; the running counter is kept.
    pub fn set_skip(&mut self, skip: u32) {
        self.skip = skip;
    }

    /// Count one frame and report whether it should be processed.
    pub fn admit(&mut self) -> bool {
        self.counter = self.counter.saturating_add(1);
        if self.skip > 0 && self.counter < self.skip {
            return false;
        }
        self.counter = 0;
        true
    }
}
