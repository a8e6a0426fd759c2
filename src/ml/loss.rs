// ============================================================
// Layer 5 — Cross-Ratio Keypoint Loss
// ============================================================
// total = loc_weight · location + geo_weight · geometric
//
// Location term (chosen once, at construction):
//   l1_softargmax : mean |p̂ − p|        on soft-argmax points
//   l2_softargmax : mean (p̂ − p)²       on soft-argmax points
//   l2_heatmap    : mean (ĥ − h)²       on the heatmaps
//
// Geometric term: four collinear points keep their cross ratio
// under any perspective projection,
//
//   CR(p0, p1, p2, p3) = (|p0p2| · |p1p3|) / (|p0p3| · |p1p2|)
//
// and both edges of a cone (top → mid → mid → bottom) are such
// lines, so each predicted edge is pulled toward the cross ratio
// of a real cone:
//
//   geometric = mean_batch( ((CR_L − c)² + (CR_R − c)²) / 2 )
//
// When disabled the geometric term is a zero scalar so the
// (location, geometric, total) triple always has the same shape.

use anyhow::{bail, Result};
use burn::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

use crate::domain::keypoint::{index_of, KeypointName, LEFT_EDGE, RIGHT_EDGE};
use crate::ml::interfaces::{KeypointLoss, KeypointOutput, LossParts};

/// Cross ratio measured on real cones.
pub const CONE_CROSS_RATIO: f32 = 1.39408;

const DIST_EPS: f32 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossKind {
    #[serde(rename = "l1_softargmax")]
    L1Softargmax,
    #[serde(rename = "l2_softargmax")]
    L2Softargmax,
    #[serde(rename = "l2_heatmap")]
    L2Heatmap,
}

impl LossKind {
    pub const ALL: [LossKind; 3] = [LossKind::L1Softargmax, LossKind::L2Softargmax, LossKind::L2Heatmap];

    pub fn as_str(&self) -> &'static str {
        match self {
            LossKind::L1Softargmax => "l1_softargmax",
            LossKind::L2Softargmax => "l2_softargmax",
            LossKind::L2Heatmap    => "l2_heatmap",
        }
    }
}

impl fmt::Display for LossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown loss type '{0}' (expected l1_softargmax, l2_softargmax or l2_heatmap)")]
pub struct UnknownLossKind(pub String);

impl FromStr for LossKind {
    type Err = UnknownLossKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LossKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| UnknownLossKind(s.to_string()))
    }
}

/// Loss weights and switches, persisted with the training config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LossConfig {
    pub kind:         LossKind,
    pub include_geo:  bool,
    pub loc_weight:   f32,
    pub geo_weight:   f32,
    pub cross_ratio:  f32,
}

impl Default for LossConfig {
    fn default() -> Self {
        Self {
            kind:        LossKind::L1Softargmax,
            include_geo: true,
            loc_weight:  1.0,
            geo_weight:  0.01,
            cross_ratio: CONE_CROSS_RATIO,
        }
    }
}

pub struct CrossRatioLoss {
    cfg:   LossConfig,
    /// Channel indices of LEFT_EDGE and RIGHT_EDGE; `None` when geo is off
    edges: Option<([usize; 4], [usize; 4])>,
}

impl CrossRatioLoss {
    /// Resolve edge channels against the configured key order.
    /// Fails when the geometric term is on but an edge point is missing.
    pub fn new(cfg: LossConfig, keys: &[KeypointName]) -> Result<Self> {
        let edges = if cfg.include_geo {
            let lookup = |edge: [KeypointName; 4]| -> Result<[usize; 4]> {
                let mut idx = [0usize; 4];
                for (slot, name) in idx.iter_mut().zip(edge) {
                    *slot = match index_of(keys, name) {
                        Some(i) => i,
                        None => bail!("cross-ratio loss needs keypoint '{name}' in the key list"),
                    };
                }
                Ok(idx)
            };
            Some((lookup(LEFT_EDGE)?, lookup(RIGHT_EDGE)?))
        } else {
            None
        };
        Ok(Self { cfg, edges })
    }

    fn location<B: Backend>(
        &self,
        output:          &KeypointOutput<B>,
        target_heatmaps: Tensor<B, 4>,
        target_points:   Tensor<B, 3>,
    ) -> Tensor<B, 1> {
        match self.cfg.kind {
            LossKind::L1Softargmax => (output.points.clone() - target_points).abs().mean(),
            LossKind::L2Softargmax => (output.points.clone() - target_points).powf_scalar(2.0).mean(),
            LossKind::L2Heatmap    => (output.heatmaps.clone() - target_heatmaps).powf_scalar(2.0).mean(),
        }
    }
}

impl KeypointLoss for CrossRatioLoss {
    fn compute<B: Backend>(
        &self,
        output:          &KeypointOutput<B>,
        target_heatmaps: Tensor<B, 4>,
        target_points:   Tensor<B, 3>,
    ) -> LossParts<B> {
        let location = self.location(output, target_heatmaps, target_points);

        let geometric = match self.edges {
            Some((left, right)) => {
                let c  = self.cfg.cross_ratio;
                let cl = (cross_ratio(&output.points, left).sub_scalar(c)).powf_scalar(2.0);
                let cr = (cross_ratio(&output.points, right).sub_scalar(c)).powf_scalar(2.0);
                ((cl + cr) / 2.0).mean()
            }
            None => Tensor::zeros([1], &location.device()),
        };

        let total = location.clone().mul_scalar(self.cfg.loc_weight)
            + geometric.clone().mul_scalar(self.cfg.geo_weight);

        LossParts { location, geometric, total }
    }
}

/// Per-sample cross ratio of four keypoint channels: `[N, K, 2]` → `[N]`.
pub fn cross_ratio<B: Backend>(points: &Tensor<B, 3>, idx: [usize; 4]) -> Tensor<B, 1> {
    let [n, _, _] = points.dims();
    let p = |i: usize| points.clone().slice([0..n, i..i + 1, 0..2]).reshape([n, 2]);
    let dist = |a: Tensor<B, 2>, b: Tensor<B, 2>| {
        (a - b).powf_scalar(2.0).sum_dim(1).add_scalar(DIST_EPS).sqrt().reshape([n])
    };

    let (p0, p1, p2, p3) = (p(idx[0]), p(idx[1]), p(idx[2]), p(idx[3]));
    let numerator   = dist(p0.clone(), p2.clone()) * dist(p1.clone(), p3.clone());
    let denominator = dist(p0, p3) * dist(p1, p2);
    numerator / denominator
}
