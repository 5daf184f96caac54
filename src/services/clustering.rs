//! Map marker clustering and distance math.
//!
//! DESIGN
//! ======
//! Greedy single pass: each unclaimed marker seeds a cluster and absorbs
//! every later unclaimed marker within the zoom-derived threshold of the
//! seed. Cluster position is the mean of its members. Distances use the
//! haversine formula on a spherical Earth.
//!
//! Clustering is switched off by default (`MARKER_CLUSTERING`); when off,
//! every marker comes back as its own single-member cluster so the response
//! shape never changes.

use serde::Serialize;

use crate::models::{Driveway, GeoPoint};

pub const EARTH_RADIUS_KM: f64 = 6371.0;
const EQUATOR_KM: f64 = 40_000.0;
pub const MAX_ZOOM: u8 = 22;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub id: String,
    pub position: GeoPoint,
    pub price_per_hour: f64,
}

impl Marker {
    /// Markers for every driveway that has a location.
    #[must_use]
    pub fn from_driveways(driveways: &[Driveway]) -> Vec<Self> {
        driveways
            .iter()
            .filter_map(|d| {
                d.location
                    .map(|position| Self { id: d.id.clone(), position, price_per_hour: d.price_per_hour })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub center: GeoPoint,
    pub count: usize,
    pub marker_ids: Vec<String>,
    /// Cheapest hourly price among members, for the cluster badge.
    pub min_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

/// Great-circle distance in kilometres.
#[must_use]
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2) + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Grouping distance for a zoom level: about an eighth of a map tile.
#[must_use]
pub fn threshold_km(zoom: u8) -> f64 {
    let zoom = i32::from(zoom.min(MAX_ZOOM));
    EQUATOR_KM / 2_f64.powi(zoom) / 8.0
}

/// Group markers for display at `zoom`. With `enabled = false` each marker
/// is returned as its own cluster.
#[must_use]
pub fn cluster_markers(markers: &[Marker], zoom: u8, enabled: bool) -> Vec<Cluster> {
    if !enabled {
        return markers.iter().map(singleton).collect();
    }

    let threshold = threshold_km(zoom);
    let mut claimed = vec![false; markers.len()];
    let mut clusters = Vec::new();

    for (i, seed) in markers.iter().enumerate() {
        if claimed[i] {
            continue;
        }
        claimed[i] = true;
        let mut members = vec![seed];
        for (j, other) in markers.iter().enumerate().skip(i + 1) {
            if !claimed[j] && haversine_km(seed.position, other.position) <= threshold {
                claimed[j] = true;
                members.push(other);
            }
        }
        clusters.push(merge(&members));
    }

    clusters
}

fn singleton(marker: &Marker) -> Cluster {
    Cluster {
        center: marker.position,
        count: 1,
        marker_ids: vec![marker.id.clone()],
        min_price: marker.price_per_hour,
    }
}

#[allow(clippy::cast_precision_loss)]
fn merge(members: &[&Marker]) -> Cluster {
    let n = members.len() as f64;
    let lat = members.iter().map(|m| m.position.lat).sum::<f64>() / n;
    let lng = members.iter().map(|m| m.position.lng).sum::<f64>() / n;
    Cluster {
        center: GeoPoint { lat, lng },
        count: members.len(),
        marker_ids: members.iter().map(|m| m.id.clone()).collect(),
        min_price: members
            .iter()
            .map(|m| m.price_per_hour)
            .fold(f64::INFINITY, f64::min),
    }
}

/// Bounding box of all points, or `None` for an empty set.
#[must_use]
pub fn bounds(points: &[GeoPoint]) -> Option<Bounds> {
    let first = points.first()?;
    let init = Bounds { south: first.lat, west: first.lng, north: first.lat, east: first.lng };
    Some(points.iter().fold(init, |b, p| Bounds {
        south: b.south.min(p.lat),
        west: b.west.min(p.lng),
        north: b.north.max(p.lat),
        east: b.east.max(p.lng),
    }))
}

/// Centre of the bounding box.
#[must_use]
pub fn center(points: &[GeoPoint]) -> Option<GeoPoint> {
    bounds(points).map(|b| GeoPoint { lat: (b.south + b.north) / 2.0, lng: (b.west + b.east) / 2.0 })
}

/// Sort driveways nearest-first from `origin`. Driveways without a location go last.
pub fn sort_by_distance(driveways: &mut [Driveway], origin: GeoPoint) {
    driveways.sort_by(|a, b| {
        let da = a.location.map_or(f64::INFINITY, |p| haversine_km(origin, p));
        let db = b.location.map_or(f64::INFINITY, |p| haversine_km(origin, p));
        da.total_cmp(&db)
    });
}

#[cfg(test)]
#[path = "clustering_test.rs"]
mod tests;
