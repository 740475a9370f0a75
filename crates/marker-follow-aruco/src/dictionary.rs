//! Predefined marker dictionaries.
//!
//! The detector is external; this table only names the dictionary it should
//! decode against and bounds the id space.

/// A fixed ArUco/AprilTag-style dictionary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dictionary {
    /// OpenCV-style name, e.g. `DICT_4X4_50`.
    pub name: &'static str,
    /// Marker side length (number of inner bits per side).
    pub marker_size: usize,
    /// Number of marker ids, valid ids are `0..len`.
    pub len: usize,
}

impl Dictionary {
    #[inline]
    pub fn contains_id(&self, id: i32) -> bool {
        usize::try_from(id).is_ok_and(|id| id < self.len)
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        DICT_4X4_50
    }
}

pub const DICT_4X4_50: Dictionary = Dictionary {
    name: "DICT_4X4_50",
    marker_size: 4,
    len: 50,
};

const fn dict(name: &'static str, marker_size: usize, len: usize) -> Dictionary {
    Dictionary {
        name,
        marker_size,
        len,
    }
}

/// All dictionaries a detector can be asked for.
pub const BUILTIN_DICTIONARIES: &[Dictionary] = &[
    DICT_4X4_50,
    dict("DICT_4X4_100", 4, 100),
    dict("DICT_4X4_250", 4, 250),
    dict("DICT_4X4_1000", 4, 1000),
    dict("DICT_5X5_50", 5, 50),
    dict("DICT_5X5_100", 5, 100),
    dict("DICT_5X5_250", 5, 250),
    dict("DICT_5X5_1000", 5, 1000),
    dict("DICT_6X6_50", 6, 50),
    dict("DICT_6X6_100", 6, 100),
    dict("DICT_6X6_250", 6, 250),
    dict("DICT_6X6_1000", 6, 1000),
    dict("DICT_7X7_50", 7, 50),
    dict("DICT_7X7_100", 7, 100),
    dict("DICT_7X7_250", 7, 250),
    dict("DICT_7X7_1000", 7, 1000),
    dict("DICT_ARUCO_ORIGINAL", 5, 1024),
    dict("DICT_APRILTAG_16h5", 4, 30),
    dict("DICT_APRILTAG_25h9", 5, 35),
    dict("DICT_APRILTAG_36h10", 6, 2320),
    dict("DICT_APRILTAG_36h11", 6, 587),
];

/// Look up a builtin dictionary by name (ASCII case-insensitive).
pub fn builtin_dictionary(name: &str) -> Option<Dictionary> {
    BUILTIN_DICTIONARIES
        .iter()
        .find(|d| d.name.eq_ignore_ascii_case(name.trim()))
        .copied()
}
