// ============================================================
// Layer 3 — Keypoint Domain Types
// ============================================================
// A cone crop is labelled with seven corner points:
//
//                 top
//                /   \
//       mid_L_top     mid_R_top
//            /           \
//     mid_L_bot           mid_R_bot
//          /               \
//     bot_L                 bot_R
//
// The left edge (top → mid_L_top → mid_L_bot → bot_L) and the
// right edge (top → mid_R_top → mid_R_bot → bot_R) are straight
// lines on the physical cone, which the cross-ratio loss uses.
//
// Reference: Rust Book §6 (Enums and Pattern Matching)

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One of the seven cone corner points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeypointName {
    #[serde(rename = "top")]
    Top,
    #[serde(rename = "mid_L_top")]
    MidLeftTop,
    #[serde(rename = "mid_R_top")]
    MidRightTop,
    #[serde(rename = "mid_L_bot")]
    MidLeftBottom,
    #[serde(rename = "mid_R_bot")]
    MidRightBottom,
    #[serde(rename = "bot_L")]
    BottomLeft,
    #[serde(rename = "bot_R")]
    BottomRight,
}

/// Canonical label order used by the dataset CSV and the network output.
pub const CONE_KEYPOINTS: [KeypointName; 7] = [
    KeypointName::Top,
    KeypointName::MidLeftTop,
    KeypointName::MidRightTop,
    KeypointName::MidLeftBottom,
    KeypointName::MidRightBottom,
    KeypointName::BottomLeft,
    KeypointName::BottomRight,
];

/// Four collinear points along the left edge, top to bottom.
pub const LEFT_EDGE: [KeypointName; 4] = [
    KeypointName::Top,
    KeypointName::MidLeftTop,
    KeypointName::MidLeftBottom,
    KeypointName::BottomLeft,
];

/// Four collinear points along the right edge, top to bottom.
pub const RIGHT_EDGE: [KeypointName; 4] = [
    KeypointName::Top,
    KeypointName::MidRightTop,
    KeypointName::MidRightBottom,
    KeypointName::BottomRight,
];

impl KeypointName {
    /// The column header / CLI spelling of this keypoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeypointName::Top            => "top",
            KeypointName::MidLeftTop     => "mid_L_top",
            KeypointName::MidRightTop    => "mid_R_top",
            KeypointName::MidLeftBottom  => "mid_L_bot",
            KeypointName::MidRightBottom => "mid_R_bot",
            KeypointName::BottomLeft     => "bot_L",
            KeypointName::BottomRight    => "bot_R",
        }
    }
}

impl fmt::Display for KeypointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown keypoint name '{0}' (expected one of top, mid_L_top, mid_R_top, mid_L_bot, mid_R_bot, bot_L, bot_R)")]
pub struct UnknownKeypoint(pub String);

impl FromStr for KeypointName {
    type Err = UnknownKeypoint;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CONE_KEYPOINTS
            .iter()
            .copied()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| UnknownKeypoint(s.to_string()))
    }
}

/// Position of `name` inside an ordered key list, if present.
pub fn index_of(keys: &[KeypointName], name: KeypointName) -> Option<usize> {
    keys.iter().position(|&k| k == name)
}

/// A keypoint location in source-image pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub name: KeypointName,
    pub x:    f32,
    pub y:    f32,
}

impl Keypoint {
    pub fn new(name: KeypointName, x: f32, y: f32) -> Self {
        Self { name, x, y }
    }

    /// Scale into [0,1] relative to the source image size.
    pub fn normalized(&self, width: u32, height: u32) -> [f32; 2] {
        [self.x / width.max(1) as f32, self.y / height.max(1) as f32]
    }
}
