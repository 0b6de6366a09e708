//! # Road graph access
//!
//! The resolver only needs a handful of read-only queries about the road network,
//! which are expressed by the [`RoadGraph`] trait.
//! [`InMemoryRoadGraph`] is a simple implementation backed by a list of roads
//! and the joints (coinciding points) between them.

use crate::RoadCategory;
use std::collections::HashMap;
use thiserror::Error;

/// A directed segment between two consecutive points of a road feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Segment {
    pub feature_id: u32,
    pub segment_idx: u32,
    /// Whether the segment is traversed in the digitization direction of the road.
    pub forward: bool,
}

impl Segment {
    #[inline]
    pub const fn new(feature_id: u32, segment_idx: u32, forward: bool) -> Self {
        Self {
            feature_id,
            segment_idx,
            forward,
        }
    }
}

/// Geometry kind of a raw feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GeometryType {
    Point,
    #[default]
    Line,
    Area,
}

/// A raw feature, as enumerated by the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoadFeature {
    pub feature_id: u32,
    /// Is the feature usable by cars?
    pub car_road: bool,
    pub geometry: GeometryType,
}

impl RoadFeature {
    /// Only car-usable linear features can carry maxspeeds.
    #[inline]
    pub const fn is_car_line(&self) -> bool {
        self.car_road && matches!(self.geometry, GeometryType::Line)
    }
}

/// Read-only queries about the road network.
///
/// Implementations must be safe to query from several threads at once.
pub trait RoadGraph: Sync {
    /// The highway category of a road, if known.
    fn category(&self, feature_id: u32) -> Option<RoadCategory>;

    /// The length of a road, in meters.
    fn road_length_m(&self, feature_id: u32) -> f64;

    /// Whether a road lies inside a populated area.
    fn is_in_city(&self, feature_id: u32) -> bool;

    /// Gets the segments adjacent to `segment`.
    ///
    /// With `is_outgoing`, these are the segments which can be entered after leaving `segment`.
    /// Otherwise, they are the segments from which `segment` can be entered.
    fn edges(&self, segment: Segment, is_outgoing: bool) -> Vec<Segment>;

    /// The number of points in the road's polyline.
    fn points_count(&self, feature_id: u32) -> u32;

    /// Gets the segment at the other end of the same road, keeping the direction.
    ///
    /// Roads are assumed to connect to others only at their first or last point.
    fn opposite_end(&self, segment: Segment) -> Segment {
        let segment_idx = if segment.segment_idx > 0 {
            0
        } else {
            self.points_count(segment.feature_id).saturating_sub(2)
        };
        Segment::new(segment.feature_id, segment_idx, segment.forward)
    }
}

/// Describes a single road of an [`InMemoryRoadGraph`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoadDescription {
    pub feature_id: u32,
    pub category: Option<RoadCategory>,
    pub length_m: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub in_city: bool,
    pub points_count: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub one_way: bool,
    #[cfg_attr(feature = "serde", serde(default = "default_car_road"))]
    pub car_road: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub geometry: GeometryType,
}

#[cfg(feature = "serde")]
const fn default_car_road() -> bool {
    true
}

/// A serializable description of a road network.
///
/// Each joint lists `(feature_id, point_idx)` pairs which are the same physical point.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoadGraphDescription {
    pub roads: Vec<RoadDescription>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub joints: Vec<Vec<(u32, u32)>>,
}

#[derive(Debug, Error, PartialEq)]
pub enum RoadGraphError {
    #[error("Feature {0} is described more than once")]
    DuplicateFeature(u32),
    #[error("Feature {feature_id} has {points_count} points; roads need at least 2")]
    TooFewPoints { feature_id: u32, points_count: u32 },
    #[error("A joint references unknown feature {0}")]
    UnknownJointFeature(u32),
    #[error("A joint references point {point_idx} of feature {feature_id}, which does not exist")]
    JointPointOutOfRange { feature_id: u32, point_idx: u32 },
}

/// A [`RoadGraph`] held entirely in memory.
#[derive(Debug, Clone)]
pub struct InMemoryRoadGraph {
    roads: Vec<RoadDescription>,
    road_index: HashMap<u32, usize>,
    joints: Vec<Vec<(u32, u32)>>,
    /// For each road point taking part in a joint, the indices of its joints.
    joints_at_point: HashMap<(u32, u32), Vec<usize>>,
}

impl TryFrom<RoadGraphDescription> for InMemoryRoadGraph {
    type Error = RoadGraphError;

    fn try_from(value: RoadGraphDescription) -> Result<Self, Self::Error> {
        InMemoryRoadGraph::new(value)
    }
}

impl InMemoryRoadGraph {
    /// Indexes a road network description.
    ///
    /// # Errors
    ///
    /// Fails if a feature is described twice, a road has fewer than two points,
    /// or a joint references a feature or point that doesn't exist.
    pub fn new(description: RoadGraphDescription) -> Result<Self, RoadGraphError> {
        let RoadGraphDescription { roads, joints } = description;

        let mut road_index = HashMap::with_capacity(roads.len());
        for (index, road) in roads.iter().enumerate() {
            if road.points_count < 2 {
                return Err(RoadGraphError::TooFewPoints {
                    feature_id: road.feature_id,
                    points_count: road.points_count,
                });
            }
            if road_index.insert(road.feature_id, index).is_some() {
                return Err(RoadGraphError::DuplicateFeature(road.feature_id));
            }
        }

        let mut joints_at_point: HashMap<(u32, u32), Vec<usize>> = HashMap::new();
        for (joint_index, joint) in joints.iter().enumerate() {
            for &(feature_id, point_idx) in joint {
                let road = road_index
                    .get(&feature_id)
                    .map(|index| &roads[*index])
                    .ok_or(RoadGraphError::UnknownJointFeature(feature_id))?;
                if point_idx >= road.points_count {
                    return Err(RoadGraphError::JointPointOutOfRange {
                        feature_id,
                        point_idx,
                    });
                }
                joints_at_point
                    .entry((feature_id, point_idx))
                    .or_default()
                    .push(joint_index);
            }
        }

        Ok(Self {
            roads,
            road_index,
            joints,
            joints_at_point,
        })
    }

    fn road(&self, feature_id: u32) -> Option<&RoadDescription> {
        self.road_index
            .get(&feature_id)
            .map(|index| &self.roads[*index])
    }

    /// Iterates over all features, in the order they were described.
    pub fn features(&self) -> impl Iterator<Item = RoadFeature> + '_ {
        self.roads.iter().map(|road| RoadFeature {
            feature_id: road.feature_id,
            car_road: road.car_road,
            geometry: road.geometry,
        })
    }

    /// Appends the segments of `road` which touch `point_idx` to `out`.
    ///
    /// With `leaving`, these are the segments starting at the point; otherwise those ending there.
    fn push_segments_at(
        road: &RoadDescription,
        point_idx: u32,
        leaving: bool,
        out: &mut Vec<Segment>,
    ) {
        let last_point = road.points_count - 1;
        let (forward, backward) = if leaving {
            (
                (point_idx < last_point).then_some(point_idx),
                (point_idx > 0 && !road.one_way).then(|| point_idx - 1),
            )
        } else {
            (
                (point_idx > 0).then(|| point_idx - 1),
                (point_idx < last_point && !road.one_way).then_some(point_idx),
            )
        };

        out.extend(forward.map(|idx| Segment::new(road.feature_id, idx, true)));
        out.extend(backward.map(|idx| Segment::new(road.feature_id, idx, false)));
    }
}

impl RoadGraph for InMemoryRoadGraph {
    fn category(&self, feature_id: u32) -> Option<RoadCategory> {
        self.road(feature_id).and_then(|road| road.category)
    }

    fn road_length_m(&self, feature_id: u32) -> f64 {
        self.road(feature_id).map_or(0.0, |road| road.length_m)
    }

    fn is_in_city(&self, feature_id: u32) -> bool {
        self.road(feature_id).is_some_and(|road| road.in_city)
    }

    fn edges(&self, segment: Segment, is_outgoing: bool) -> Vec<Segment> {
        let Some(road) = self.road(segment.feature_id) else {
            return Vec::new();
        };

        // The point shared with the adjacent segments
        let junction = if segment.forward == is_outgoing {
            segment.segment_idx + 1
        } else {
            segment.segment_idx
        };

        let mut result = Vec::new();
        Self::push_segments_at(road, junction, is_outgoing, &mut result);
        // Neither the segment itself nor a U-turn onto it
        result.retain(|other| other.segment_idx != segment.segment_idx);

        for joint_index in self
            .joints_at_point
            .get(&(segment.feature_id, junction))
            .into_iter()
            .flatten()
        {
            for &(feature_id, point_idx) in &self.joints[*joint_index] {
                if (feature_id, point_idx) == (segment.feature_id, junction) {
                    continue;
                }
                if let Some(other) = self.road(feature_id) {
                    Self::push_segments_at(other, point_idx, is_outgoing, &mut result);
                }
            }
        }

        result
    }

    fn points_count(&self, feature_id: u32) -> u32 {
        self.road(feature_id).map_or(0, |road| road.points_count)
    }
}
