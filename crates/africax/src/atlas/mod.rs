//! Country polygons and point-to-country resolution.
//!
//! An [`Atlas`] holds the countries of one continent and an R-tree over their
//! bounding rectangles. Resolving a coordinate first collects the countries
//! whose rectangle intersects the point, then checks exact containment among
//! just those candidates.

pub mod source;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use geo::{BoundingRect, Contains, MultiPolygon, Point, Rect};
use rstar::{RTree, RTreeObject, AABB};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{FileStamp, Memo};
use crate::error::{Error, Result};

/// A country polygon from the reference geography.
#[derive(Debug, Clone, PartialEq)]
pub struct Country {
    /// Display name.
    pub name: String,
    /// Upper-case ISO-3 code.
    pub iso_a3: String,
    /// Boundary in (longitude, latitude) coordinates.
    pub boundary: MultiPolygon<f64>,
}

impl Country {
    /// Whether the point lies strictly inside the boundary.
    #[must_use]
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.boundary.contains(&Point::new(lon, lat))
    }

    /// Bounding rectangle of the boundary.
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        self.boundary.bounding_rect().map(Bounds::from)
    }
}

/// A longitude/latitude rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    /// Western edge.
    pub min_lon: f64,
    /// Southern edge.
    pub min_lat: f64,
    /// Eastern edge.
    pub max_lon: f64,
    /// Northern edge.
    pub max_lat: f64,
}

impl From<Rect<f64>> for Bounds {
    fn from(rect: Rect<f64>) -> Self {
        Self {
            min_lon: rect.min().x,
            min_lat: rect.min().y,
            max_lon: rect.max().x,
            max_lat: rect.max().y,
        }
    }
}

impl Bounds {
    /// Smallest rectangle covering both.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            min_lon: self.min_lon.min(other.min_lon),
            min_lat: self.min_lat.min(other.min_lat),
            max_lon: self.max_lon.max(other.max_lon),
            max_lat: self.max_lat.max(other.max_lat),
        }
    }

    /// Grow by `degrees` on every side, staying on the globe.
    #[must_use]
    pub fn padded(self, degrees: f64) -> Self {
        Self {
            min_lon: (self.min_lon - degrees).max(-180.0),
            min_lat: (self.min_lat - degrees).max(-90.0),
            max_lon: (self.max_lon + degrees).min(180.0),
            max_lat: (self.max_lat + degrees).min(90.0),
        }
    }

    /// Center as `(lat, lon)`.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    /// GeoJSON `bbox` order: west, south, east, north.
    #[must_use]
    pub fn to_bbox(&self) -> Vec<f64> {
        vec![self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }
}

/// Bounding rectangle of one country, pointing back at its slot.
#[derive(Debug, Clone)]
struct CountryEnvelope {
    slot: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for CountryEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// The loaded countries of one continent with their spatial index.
pub struct Atlas {
    countries: Vec<Country>,
    by_iso: HashMap<String, usize>,
    index: RTree<CountryEnvelope>,
}

impl fmt::Debug for Atlas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atlas")
            .field("countries", &self.countries.len())
            .finish_non_exhaustive()
    }
}

/// Atlas memo shared by the whole process, keyed by file stamp and continent.
static ATLAS_CACHE: Mutex<Memo<(FileStamp, String), Arc<Atlas>>> = Mutex::new(Memo::new());

impl Atlas {
    /// Build an atlas. Later duplicates of an ISO-3 code are dropped.
    #[must_use]
    pub fn new(countries: Vec<Country>) -> Self {
        let mut kept: Vec<Country> = Vec::with_capacity(countries.len());
        let mut by_iso = HashMap::new();
        for country in countries {
            if by_iso.contains_key(&country.iso_a3) {
                warn!(iso = %country.iso_a3, "Dropping duplicate country");
                continue;
            }
            by_iso.insert(country.iso_a3.clone(), kept.len());
            kept.push(country);
        }

        let entries: Vec<CountryEnvelope> = kept
            .iter()
            .enumerate()
            .filter_map(|(slot, country)| {
                country.boundary.bounding_rect().map(|rect| CountryEnvelope {
                    slot,
                    envelope: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect();

        Self {
            countries: kept,
            by_iso,
            index: RTree::bulk_load(entries),
        }
    }

    /// Load the countries of `continent` from a GeoJSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unparseable, or lacks the
    /// expected attributes.
    pub fn load(path: &Path, continent: &str) -> Result<Self> {
        let atlas = Self::new(source::read_countries(path, continent)?);
        info!(
            countries = atlas.len(),
            continent, "Loaded geography from {}",
            path.display()
        );
        Ok(atlas)
    }

    /// Like [`load`](Self::load), reusing the previous result while the file
    /// and continent are unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if loading fails.
    pub fn load_cached(path: &Path, continent: &str) -> Result<Arc<Self>> {
        if !path.exists() {
            return Err(Error::GeographyMissing {
                path: path.to_path_buf(),
            });
        }

        let (stamp, bytes) = FileStamp::read(path)?;
        let key = (stamp, continent.to_string());

        let mut cache = ATLAS_CACHE
            .lock()
            .map_err(|_| Error::internal("atlas cache lock poisoned"))?;
        if let Some(atlas) = cache.get(&key) {
            debug!("Serving geography from cache");
            return Ok(atlas);
        }

        let atlas = Arc::new(Self::new(source::parse_countries(path, &bytes, continent)?));
        info!(
            countries = atlas.len(),
            continent, "Loaded geography from {}",
            path.display()
        );
        cache.put(key, Arc::clone(&atlas));
        Ok(atlas)
    }

    /// The country containing the point, if any.
    ///
    /// Candidates are checked in load order, so a repeated query always gives
    /// the same answer. Points on a border or outside every polygon give
    /// `None`.
    #[must_use]
    pub fn resolve(&self, lat: f64, lon: f64) -> Option<&Country> {
        let point = Point::new(lon, lat);
        let mut candidates: Vec<usize> = self
            .index
            .locate_in_envelope_intersecting(&AABB::from_point([lon, lat]))
            .map(|entry| entry.slot)
            .collect();
        candidates.sort_unstable();

        let found = candidates
            .iter()
            .map(|&slot| &self.countries[slot])
            .find(|country| country.boundary.contains(&point));

        debug!(
            lat,
            lon,
            candidates = candidates.len(),
            iso = found.map_or("-", |c| c.iso_a3.as_str()),
            "Resolved point"
        );
        found
    }

    /// Look up a country by ISO-3 code (case-insensitive).
    #[must_use]
    pub fn get(&self, iso: &str) -> Option<&Country> {
        self.by_iso
            .get(&iso.trim().to_uppercase())
            .map(|&slot| &self.countries[slot])
    }

    /// Countries in load order.
    #[must_use]
    pub fn countries(&self) -> &[Country] {
        &self.countries
    }

    /// Number of countries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.countries.len()
    }

    /// Whether no country was loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    /// Total bounds of every country.
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        self.countries
            .iter()
            .filter_map(Country::bounds)
            .reduce(Bounds::union)
    }

    /// Center of the total bounds as `(lat, lon)`.
    #[must_use]
    pub fn center(&self) -> Option<(f64, f64)> {
        self.bounds().map(|b| b.center())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    fn square(x: f64, y: f64, size: f64) -> serde_json::Value {
        json!({
            "type": "Polygon",
            "coordinates": [[[x, y], [x + size, y], [x + size, y + size], [x, y + size], [x, y]]]
        })
    }

    fn sample_geojson() -> String {
        json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"NAME": "Ghana", "ISO_A3": "GHA", "CONTINENT": "Africa"},
                    "geometry": square(-3.0, 5.0, 7.0)
                },
                {
                    "type": "Feature",
                    "properties": {"NAME": "Togo", "ISO_A3": "TGO", "CONTINENT": "Africa"},
                    "geometry": square(1.0, 5.0, 2.0)
                },
                {
                    "type": "Feature",
                    "properties": {"NAME": "Kenya", "ISO_A3": "KEN", "CONTINENT": "Africa"},
                    "geometry": {
                        "type": "MultiPolygon",
                        "coordinates": [
                            [[[34.0, -4.0], [41.0, -4.0], [41.0, 4.0], [34.0, 4.0], [34.0, -4.0]]]
                        ]
                    }
                },
                {
                    "type": "Feature",
                    "properties": {"NAME": "France", "ISO_A3": "FRA", "CONTINENT": "Europe"},
                    "geometry": square(-5.0, 42.0, 10.0)
                }
            ]
        })
        .to_string()
    }

    fn write_sample(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("countries.geojson");
        fs::write(&path, sample_geojson()).unwrap();
        path
    }

    #[test]
    fn test_load_keeps_continent() {
        let dir = tempfile::tempdir().unwrap();
        let atlas = Atlas::load(&write_sample(dir.path()), "Africa").unwrap();

        assert_eq!(atlas.len(), 3);
        assert!(atlas.get("FRA").is_none());
        assert_eq!(atlas.get(" gha ").unwrap().name, "Ghana");
    }

    #[test]
    fn test_resolve_inside_country() {
        let dir = tempfile::tempdir().unwrap();
        let atlas = Atlas::load(&write_sample(dir.path()), "Africa").unwrap();

        let country = atlas.resolve(0.5, 37.0).unwrap();
        assert_eq!(country.name, "Kenya");
        assert_eq!(country.iso_a3, "KEN");
    }

    #[test]
    fn test_resolve_ocean_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let atlas = Atlas::load(&write_sample(dir.path()), "Africa").unwrap();

        assert!(atlas.resolve(-20.0, 10.0).is_none());
        // Inside France, which was filtered out.
        assert!(atlas.resolve(45.0, 0.0).is_none());
    }

    #[test]
    fn test_resolve_overlap_uses_load_order() {
        let dir = tempfile::tempdir().unwrap();
        let atlas = Atlas::load(&write_sample(dir.path()), "Africa").unwrap();

        // Ghana's square covers Togo's; the first loaded country wins.
        let first = atlas.resolve(6.0, 2.0).map(|c| c.iso_a3.clone());
        let second = atlas.resolve(6.0, 2.0).map(|c| c.iso_a3.clone());
        assert_eq!(first.as_deref(), Some("GHA"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_resolve_envelope_hit_without_containment() {
        let triangle = json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [10.0, 0.0], [0.0, 10.0], [0.0, 0.0]]]
        });
        let feature: geojson::Feature = serde_json::from_value(json!({
            "type": "Feature",
            "properties": {"NAME": "Tri", "ISO_A3": "TRI"},
            "geometry": triangle
        }))
        .unwrap();
        let atlas = Atlas::new(source::countries_from_features(&[feature], "Africa").unwrap());

        assert!(atlas.resolve(1.0, 1.0).is_some());
        // Inside the bounding box, outside the triangle.
        assert!(atlas.resolve(9.0, 9.0).is_none());
    }

    #[test]
    fn test_bounds_and_center() {
        let dir = tempfile::tempdir().unwrap();
        let atlas = Atlas::load(&write_sample(dir.path()), "Africa").unwrap();

        let bounds = atlas.bounds().unwrap();
        assert_eq!(
            bounds,
            Bounds {
                min_lon: -3.0,
                min_lat: -4.0,
                max_lon: 41.0,
                max_lat: 12.0
            }
        );
        assert_eq!(atlas.center(), Some((4.0, 19.0)));
        assert_eq!(bounds.padded(5.0).to_bbox(), vec![-8.0, -9.0, 46.0, 17.0]);
    }

    #[test]
    fn test_padded_stays_on_globe() {
        let b = Bounds {
            min_lon: -178.0,
            min_lat: -88.0,
            max_lon: 178.0,
            max_lat: 88.0,
        };
        assert_eq!(b.padded(5.0).to_bbox(), vec![-180.0, -90.0, 180.0, 90.0]);
    }

    #[test]
    fn test_empty_atlas() {
        let atlas = Atlas::new(Vec::new());
        assert!(atlas.is_empty());
        assert!(atlas.bounds().is_none());
        assert!(atlas.resolve(0.0, 0.0).is_none());
    }

    #[test]
    fn test_load_cached_reuses_until_changed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path());

        let a = Atlas::load_cached(&path, "Africa").unwrap();
        let b = Atlas::load_cached(&path, "Africa").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let europe = Atlas::load_cached(&path, "Europe").unwrap();
        assert_eq!(europe.len(), 1);

        let c = Atlas::load_cached(&path, "Africa").unwrap();
        assert_eq!(c.len(), 3);
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_load_cached_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Atlas::load_cached(&dir.path().join("none.geojson"), "Africa").unwrap_err();
        assert!(err.is_missing_input());
    }
}
