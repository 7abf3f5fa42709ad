//! # Ranking Engine
//!
//! Turns the requester's origin and previous search into a [`RankPlan`]: an optional
//! geographic disc that filters rows, and the history dimensions that score them.
//! Stores evaluate the plan inside their query so ordering and pagination happen
//! where the rows live.
//!
//! Distances are great-circle distances on a sphere of radius [`EARTH_RADIUS_KM`].
//! Comparing the squared chord between two unit vectors against the chord of the
//! radius is equivalent to comparing haversine distances, and needs nothing but
//! arithmetic at query time.

use std::f64::consts::FRAC_PI_2;

use uuid::Uuid;

use crate::models::{GeoPoint, SearchFilter, SearchHistory};

/// Mean Earth radius used for every distance.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Number of history dimensions: animal, breed, min price, max price, radius.
pub const SCORE_DIMENSIONS: usize = 5;

/// Rounding slack on squared chords, a few millimetres on the ground.
const CHORD_SQ_EPSILON: f64 = 1e-12;

/// A [`GeoPoint`] projected onto the unit sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitVector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<GeoPoint> for UnitVector {
    fn from(point: GeoPoint) -> Self {
        let (lat, lon) = (point.latitude.to_radians(), point.longitude.to_radians());
        Self {
            x: lat.cos() * lon.cos(),
            y: lat.cos() * lon.sin(),
            z: lat.sin(),
        }
    }
}

/// Every point within `radius_km` of a center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Disc {
    pub center: UnitVector,
    /// Squared chord length of the radius on the unit sphere
    pub max_chord_sq: f64,
}

impl Disc {
    pub fn new(center: GeoPoint, radius_km: u32) -> Self {
        // past half the circumference the disc covers the whole sphere
        let half_angle = (f64::from(radius_km) / EARTH_RADIUS_KM / 2.0).min(FRAC_PI_2);
        let chord = 2.0 * half_angle.sin();
        Self {
            center: center.into(),
            max_chord_sq: chord * chord + CHORD_SQ_EPSILON,
        }
    }
}

/// One history dimension; a row scores 1 for it when the condition holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreTerm {
    Animal(Uuid),
    Breed(Uuid),
    MinPrice(i64),
    MaxPrice(i64),
    /// Rows with an unknown location are treated as inside
    Near(Disc),
}

/// How a store filters and orders one search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankPlan {
    /// Hard radius filter; rows with an unknown location pass
    pub within: Option<Disc>,
    /// History dimensions that can differ between rows
    pub score: Vec<ScoreTerm>,
}

impl RankPlan {
    /// Points every row gets from the dimensions missing in `score`.
    pub fn base_score(&self) -> i64 {
        SCORE_DIMENSIONS.saturating_sub(self.score.len()) as i64
    }

    /// False when plain `updated_at DESC, id DESC` ordering gives the same answer.
    pub fn is_personalized(&self) -> bool {
        !self.score.is_empty()
    }
}

/// Per-request inputs that personalize the ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankingContext {
    /// The requester's resolved locality
    pub origin: Option<GeoPoint>,
    /// The requester's previous meaningful search
    pub history: Option<SearchHistory>,
}

impl RankingContext {
    /// A dimension missing from the history is satisfied by every row, so it is left
    /// out of the score. Without an origin the history radius is constant too.
    /// Price bounds come from the stored history even when the current search
    /// has no price filter.
    pub fn plan(&self, filter: &SearchFilter) -> RankPlan {
        let within = filter
            .radius
            .zip(self.origin)
            .map(|(radius, origin)| Disc::new(origin, radius));

        let mut score = Vec::new();
        if let Some(history) = &self.history {
            score.extend(history.animal_id.map(ScoreTerm::Animal));
            score.extend(history.breed_id.map(ScoreTerm::Breed));
            score.extend(history.min_price.map(ScoreTerm::MinPrice));
            score.extend(history.max_price.map(ScoreTerm::MaxPrice));
            score.extend(
                history
                    .radius
                    .zip(self.origin)
                    .map(|(radius, origin)| ScoreTerm::Near(Disc::new(origin, radius))),
            );
        }

        RankPlan { within, score }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const MOSCOW: GeoPoint = GeoPoint { latitude: 55.7558, longitude: 37.6173 };
    const TVER: GeoPoint = GeoPoint { latitude: 56.8587, longitude: 35.9176 };
    const KAZAN: GeoPoint = GeoPoint { latitude: 55.7961, longitude: 49.1064 };

    fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
        let lat1 = a.latitude.to_radians();
        let lat2 = b.latitude.to_radians();
        let d_lat = lat2 - lat1;
        let d_lon = (b.longitude - a.longitude).to_radians();
        let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
    }

    /// The check a store runs for each row.
    fn inside(disc: &Disc, point: GeoPoint) -> bool {
        let p = UnitVector::from(point);
        let c = disc.center;
        (p.x - c.x).powi(2) + (p.y - c.y).powi(2) + (p.z - c.z).powi(2) <= disc.max_chord_sq
    }

    fn history() -> SearchHistory {
        SearchHistory {
            user_id: Uuid::new_v4(),
            animal_id: None,
            breed_id: None,
            min_price: None,
            max_price: None,
            radius: None,
            created_at: Utc::now(),
        }
    }

    fn filter() -> SearchFilter {
        SearchFilter { limit: 20, ..Default::default() }
    }

    #[test]
    fn test_unit_vectors_are_normalized() {
        for point in [MOSCOW, TVER, KAZAN, GeoPoint { latitude: -90.0, longitude: 180.0 }] {
            let v = UnitVector::from(point);
            assert!(((v.x * v.x + v.y * v.y + v.z * v.z) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_disc_agrees_with_haversine() {
        // Moscow-Tver is about 161 km, Moscow-Kazan about 720 km
        let tver = haversine_km(MOSCOW, TVER);
        assert!(tver > 150.0 && tver < 170.0, "got {tver}");

        for (point, km) in [(TVER, tver), (KAZAN, haversine_km(MOSCOW, KAZAN))] {
            let below = Disc::new(MOSCOW, (km - 1.0).floor() as u32);
            let above = Disc::new(MOSCOW, (km + 1.0).ceil() as u32);
            assert!(!inside(&below, point), "{km} km should be outside");
            assert!(inside(&above, point), "{km} km should be inside");
        }
        assert!(inside(&Disc::new(MOSCOW, 0), MOSCOW));
    }

    #[test]
    fn test_huge_radius_covers_the_globe() {
        let disc = Disc::new(MOSCOW, 50_000);
        let antipode = GeoPoint { latitude: -MOSCOW.latitude, longitude: MOSCOW.longitude - 180.0 };
        assert!(inside(&disc, antipode));
    }

    #[test]
    fn test_plan_without_history_or_origin_is_plain() {
        let plan = RankingContext::default().plan(&SearchFilter { radius: Some(5), ..filter() });
        assert_eq!(plan, RankPlan::default());
        assert!(!plan.is_personalized());
        assert_eq!(plan.base_score(), 5);
    }

    #[test]
    fn test_radius_filter_needs_an_origin() {
        let located = RankingContext { origin: Some(MOSCOW), history: None };
        let plan = located.plan(&SearchFilter { radius: Some(200), ..filter() });
        assert_eq!(plan.within, Some(Disc::new(MOSCOW, 200)));
        assert!(!plan.is_personalized());

        assert_eq!(located.plan(&filter()).within, None);
    }

    #[test]
    fn test_history_dimensions_become_score_terms() {
        let cat = Uuid::new_v4();
        let h = SearchHistory { animal_id: Some(cat), max_price: Some(500), radius: Some(30), ..history() };

        let with_origin = RankingContext { origin: Some(MOSCOW), history: Some(h.clone()) }.plan(&filter());
        assert_eq!(
            with_origin.score,
            vec![ScoreTerm::Animal(cat), ScoreTerm::MaxPrice(500), ScoreTerm::Near(Disc::new(MOSCOW, 30))]
        );
        assert_eq!(with_origin.base_score(), 2);
        assert!(with_origin.within.is_none());

        // no origin: the radius dimension is constant for every row
        let without_origin = RankingContext { origin: None, history: Some(h) }.plan(&filter());
        assert_eq!(without_origin.score, vec![ScoreTerm::Animal(cat), ScoreTerm::MaxPrice(500)]);
        assert_eq!(without_origin.base_score(), 3);
    }

    #[test]
    fn test_history_price_bounds_apply_without_a_price_filter() {
        let h = SearchHistory { min_price: Some(10), max_price: Some(5), ..history() };
        let plan = RankingContext { origin: None, history: Some(h) }.plan(&filter());
        assert_eq!(plan.score, vec![ScoreTerm::MinPrice(10), ScoreTerm::MaxPrice(5)]);
    }

    #[test]
    fn test_radius_only_history_without_origin_is_not_personalized() {
        let h = SearchHistory { radius: Some(10), ..history() };
        let plan = RankingContext { origin: None, history: Some(h) }.plan(&filter());
        assert!(!plan.is_personalized());
    }
}
