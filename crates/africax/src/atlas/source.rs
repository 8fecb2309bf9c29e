//! Reading country polygons from a GeoJSON `FeatureCollection`.
//!
//! Natural Earth exports spell their attributes differently between
//! releases and tools, so each attribute is looked up under a list of
//! accepted names. The first name present on any feature wins.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use geo::{Geometry, MultiPolygon};
use geojson::{Feature, GeoJson, JsonObject};
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use super::Country;
use crate::error::{Error, Result};

/// Accepted names of the continent attribute.
pub const CONTINENT_KEYS: &[&str] = &["CONTINENT", "continent", "REGION_UN", "region_un"];

/// Accepted names of the country name attribute.
pub const NAME_KEYS: &[&str] = &["NAME", "ADMIN", "name"];

/// Accepted names of the ISO-3 attribute.
pub const ISO_KEYS: &[&str] = &["ISO_A3", "ADM0_A3", "iso_a3"];

/// Read the countries of one continent from a GeoJSON file.
///
/// # Errors
///
/// Returns an error if the file is missing, is not a GeoJSON
/// `FeatureCollection`, or lacks a name or ISO-3 attribute.
pub fn read_countries(path: &Path, continent: &str) -> Result<Vec<Country>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::GeographyMissing {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(e.into()),
    };
    parse_countries(path, &bytes, continent)
}

/// Parse the countries of one continent from GeoJSON bytes read from `path`.
///
/// # Errors
///
/// Returns an error if the bytes are not a GeoJSON `FeatureCollection` or the
/// features lack a name or ISO-3 attribute.
pub fn parse_countries(path: &Path, bytes: &[u8], continent: &str) -> Result<Vec<Country>> {
    let text =
        std::str::from_utf8(bytes).map_err(|e| Error::geography_parse(path, e.to_string()))?;
    let geojson: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| Error::geography_parse(path, e.to_string()))?;

    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(Error::geography_parse(path, "expected a FeatureCollection"));
    };

    countries_from_features(&collection.features, continent)
}

/// Select and convert the features belonging to `continent`.
///
/// Features are kept in input order. Features without a usable ISO-3 code or
/// without polygon geometry are skipped, as are later duplicates of an ISO-3
/// code. When no continent attribute exists at all every feature is kept.
///
/// # Errors
///
/// Returns a schema error if no name or no ISO-3 attribute is present.
pub fn countries_from_features(features: &[Feature], continent: &str) -> Result<Vec<Country>> {
    let keys: HashSet<&str> = features
        .iter()
        .filter_map(|f| f.properties.as_ref())
        .flat_map(|p| p.keys().map(String::as_str))
        .collect();

    let (Some(name_key), Some(iso_key)) = (
        first_present(NAME_KEYS, &keys),
        first_present(ISO_KEYS, &keys),
    ) else {
        return Err(Error::GeographySchema {
            expected: format!(
                "name: {}; iso: {}",
                NAME_KEYS.join("|"),
                ISO_KEYS.join("|")
            ),
        });
    };

    let continent_key = first_present(CONTINENT_KEYS, &keys);
    if continent_key.is_none() {
        warn!(
            "No continent attribute ({}); keeping every country",
            CONTINENT_KEYS.join("|")
        );
    }

    let wanted = continent.trim().to_lowercase();
    let iso_pattern =
        Regex::new(r"^[A-Z]{3}$").map_err(|e| Error::internal(format!("iso pattern: {e}")))?;

    let mut seen = HashSet::new();
    let mut countries = Vec::new();
    for feature in features {
        let Some(props) = feature.properties.as_ref() else {
            continue;
        };

        if let Some(key) = continent_key {
            let value = property_text(props, key).map(|v| v.trim().to_lowercase());
            if value.as_deref() != Some(wanted.as_str()) {
                continue;
            }
        }

        let name = property_text(props, name_key)
            .map(|v| v.trim().to_string())
            .unwrap_or_default();

        let Some(iso_a3) = iso_code(props, iso_key, &iso_pattern) else {
            warn!(name = %name, "Skipping country without a usable ISO-3 code");
            continue;
        };

        let Some(boundary) = boundary(feature) else {
            warn!(iso = %iso_a3, "Skipping country without polygon geometry");
            continue;
        };

        if !seen.insert(iso_a3.clone()) {
            warn!(iso = %iso_a3, "Dropping duplicate country");
            continue;
        }

        countries.push(Country {
            name,
            iso_a3,
            boundary,
        });
    }

    debug!(
        kept = countries.len(),
        features = features.len(),
        continent = %wanted,
        "Selected countries"
    );
    Ok(countries)
}

fn first_present<'a>(candidates: &[&'a str], keys: &HashSet<&str>) -> Option<&'a str> {
    candidates.iter().copied().find(|c| keys.contains(c))
}

fn property_text(props: &JsonObject, key: &str) -> Option<String> {
    match props.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The preferred ISO attribute, or the first other ISO attribute of the same
/// feature holding a three-letter code.
fn iso_code(props: &JsonObject, preferred: &str, pattern: &Regex) -> Option<String> {
    std::iter::once(preferred)
        .chain(ISO_KEYS.iter().copied().filter(|k| *k != preferred))
        .filter_map(|key| property_text(props, key))
        .map(|v| v.trim().to_uppercase())
        .find(|v| pattern.is_match(v))
}

fn boundary(feature: &Feature) -> Option<MultiPolygon<f64>> {
    let geometry = feature.geometry.clone()?;
    match Geometry::<f64>::try_from(geometry) {
        Ok(Geometry::Polygon(polygon)) => Some(MultiPolygon::new(vec![polygon])),
        Ok(Geometry::MultiPolygon(multi)) => Some(multi),
        Ok(_) => None,
        Err(e) => {
            debug!(error = %e, "Unconvertible geometry");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feature(props: Value, geometry: Value) -> Feature {
        let value = json!({ "type": "Feature", "properties": props, "geometry": geometry });
        serde_json::from_value(value).unwrap()
    }

    fn square(x: f64, y: f64) -> Value {
        json!({
            "type": "Polygon",
            "coordinates": [[[x, y], [x + 1.0, y], [x + 1.0, y + 1.0], [x, y + 1.0], [x, y]]]
        })
    }

    #[test]
    fn test_filters_by_continent_case_insensitively() {
        let features = vec![
            feature(
                json!({"NAME": "Ghana", "ISO_A3": "GHA", "CONTINENT": " africa "}),
                square(0.0, 0.0),
            ),
            feature(
                json!({"NAME": "France", "ISO_A3": "FRA", "CONTINENT": "Europe"}),
                square(10.0, 10.0),
            ),
        ];
        let countries = countries_from_features(&features, "Africa").unwrap();
        assert_eq!(countries.len(), 1);
        assert_eq!(countries[0].name, "Ghana");
    }

    #[test]
    fn test_alternate_attribute_names() {
        let features = vec![feature(
            json!({"name": " Kenya ", "iso_a3": "ken", "region_un": "Africa"}),
            square(0.0, 0.0),
        )];
        let countries = countries_from_features(&features, "Africa").unwrap();
        assert_eq!(countries[0].name, "Kenya");
        assert_eq!(countries[0].iso_a3, "KEN");
    }

    #[test]
    fn test_placeholder_iso_falls_back() {
        let features = vec![feature(
            json!({
                "NAME": "Somaliland",
                "ISO_A3": "-99",
                "ADM0_A3": "SOL",
                "CONTINENT": "Africa"
            }),
            square(0.0, 0.0),
        )];
        let countries = countries_from_features(&features, "Africa").unwrap();
        assert_eq!(countries[0].iso_a3, "SOL");
    }

    #[test]
    fn test_skips_unusable_features() {
        let features = vec![
            feature(
                json!({"NAME": "Nowhere", "ISO_A3": "-99", "CONTINENT": "Africa"}),
                square(0.0, 0.0),
            ),
            feature(
                json!({"NAME": "Dot", "ISO_A3": "DOT", "CONTINENT": "Africa"}),
                json!({"type": "Point", "coordinates": [1.0, 1.0]}),
            ),
            feature(
                json!({"NAME": "Ghana", "ISO_A3": "GHA", "CONTINENT": "Africa"}),
                square(0.0, 0.0),
            ),
            feature(
                json!({"NAME": "Ghana again", "ISO_A3": "GHA", "CONTINENT": "Africa"}),
                square(5.0, 5.0),
            ),
        ];
        let countries = countries_from_features(&features, "Africa").unwrap();
        assert_eq!(countries.len(), 1);
        assert_eq!(countries[0].name, "Ghana");
    }

    #[test]
    fn test_missing_continent_keeps_everything() {
        let features = vec![
            feature(json!({"NAME": "Ghana", "ISO_A3": "GHA"}), square(0.0, 0.0)),
            feature(json!({"NAME": "France", "ISO_A3": "FRA"}), square(10.0, 10.0)),
        ];
        assert_eq!(countries_from_features(&features, "Africa").unwrap().len(), 2);
    }

    #[test]
    fn test_missing_name_is_schema_error() {
        let features = vec![feature(
            json!({"ISO_A3": "GHA", "CONTINENT": "Africa"}),
            square(0.0, 0.0),
        )];
        let err = countries_from_features(&features, "Africa").unwrap_err();
        assert!(matches!(err, Error::GeographySchema { .. }));
        assert!(err.is_missing_input());
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_countries(&dir.path().join("none.geojson"), "Africa").unwrap_err();
        assert!(matches!(err, Error::GeographyMissing { .. }));
    }

    #[test]
    fn test_parse_rejects_non_collection() {
        let path = Path::new("single.geojson");
        let body = json!({"type": "Point", "coordinates": [0.0, 0.0]}).to_string();
        let err = parse_countries(path, body.as_bytes(), "Africa").unwrap_err();
        assert!(matches!(err, Error::GeographyParse { .. }));

        let err = parse_countries(path, b"not json", "Africa").unwrap_err();
        assert!(matches!(err, Error::GeographyParse { .. }));
    }
}
