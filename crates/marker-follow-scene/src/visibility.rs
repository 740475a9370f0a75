/// What one tick should do with the target item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateAction {
    /// Hide the item and skip the transform; a pending pose stays pending.
    Hide,
    /// Show the item, then apply the pending pose.
    Apply,
    /// Nothing pending.
    Idle,
}

/// Hides the target while the marker is out of sight, when configured to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VisibilityGate {
    pub hide_when_absent: bool,
}

impl VisibilityGate {
    pub fn new(hide_when_absent: bool) -> Self {
        Self { hide_when_absent }
    }

    pub fn decide(&self, marker_visible: bool, transform_dirty: bool) -> GateAction {
        if self.hide_when_absent && !marker_visible {
            GateAction::Hide
        } else if transform_dirty {
            GateAction::Apply
        } else {
            GateAction::Idle
        }
    }
}

impl Default for VisibilityGate {
    fn default() -> Self {
        Self::new(true)
    }
}
