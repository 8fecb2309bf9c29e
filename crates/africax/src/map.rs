//! Styled map layer: the countries of the atlas as a GeoJSON
//! `FeatureCollection`, colored by whether they have visits.

use std::collections::HashMap;
use std::io::Write;

use geojson::{Feature, FeatureCollection, Geometry, JsonObject};
use serde_json::{json, Value};
use tracing::debug;

use crate::atlas::{Atlas, Country};
use crate::error::Result;
use crate::visit::Visit;

/// Degrees added around the countries when limiting panning.
pub const MAX_BOUNDS_PADDING: f64 = 5.0;

/// Leaflet-style polygon style.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Style {
    /// Polygon fill.
    pub fill_color: &'static str,
    /// Outline.
    pub color: &'static str,
    /// Outline width in pixels.
    pub weight: u32,
    /// Fill opacity.
    pub fill_opacity: f64,
}

/// Style of a visited country.
pub const VISITED: Style = Style {
    fill_color: "#4CAF50",
    color: "#2E7D32",
    weight: 2,
    fill_opacity: 0.7,
};

/// Style of a country without visits.
pub const UNVISITED: Style = Style {
    fill_color: "#f2f2f2",
    color: "#555555",
    weight: 1,
    fill_opacity: 0.6,
};

/// Build the map layer for `atlas`, counting `visits` per country.
///
/// The collection carries the total bounds as `bbox`, plus `center`
/// (`[lat, lon]`) and `max_bounds` (`[[south, west], [north, east]]`, padded by
/// [`MAX_BOUNDS_PADDING`]) as foreign members.
#[must_use]
pub fn map_layer(atlas: &Atlas, visits: &[Visit]) -> FeatureCollection {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for visit in visits {
        *counts.entry(visit.iso_a3.as_str()).or_default() += 1;
    }

    let features: Vec<Feature> = atlas
        .countries()
        .iter()
        .map(|country| {
            country_feature(
                country,
                counts.get(country.iso_a3.as_str()).copied().unwrap_or(0),
            )
        })
        .collect();

    let bounds = atlas.bounds();
    let foreign_members = bounds.map(|b| {
        let padded = b.padded(MAX_BOUNDS_PADDING);
        let (lat, lon) = b.center();
        let mut members = JsonObject::new();
        members.insert("center".to_string(), json!([lat, lon]));
        members.insert(
            "max_bounds".to_string(),
            json!([
                [padded.min_lat, padded.min_lon],
                [padded.max_lat, padded.max_lon]
            ]),
        );
        members
    });

    let visited = features
        .iter()
        .filter(|f| f.property("visited") == Some(&Value::Bool(true)))
        .count();
    debug!(features = features.len(), visited, "Built map layer");

    FeatureCollection {
        bbox: bounds.map(|b| b.to_bbox()),
        features,
        foreign_members,
    }
}

fn country_feature(country: &Country, visits: usize) -> Feature {
    let style = if visits > 0 { VISITED } else { UNVISITED };

    let mut properties = JsonObject::new();
    properties.insert("name".to_string(), json!(country.name));
    properties.insert("iso_a3".to_string(), json!(country.iso_a3));
    properties.insert("visited".to_string(), json!(visits > 0));
    properties.insert("visits".to_string(), json!(visits));
    properties.insert("fillColor".to_string(), json!(style.fill_color));
    properties.insert("color".to_string(), json!(style.color));
    properties.insert("weight".to_string(), json!(style.weight));
    properties.insert("fillOpacity".to_string(), json!(style.fill_opacity));

    Feature {
        bbox: country.bounds().map(|b| b.to_bbox()),
        geometry: Some(Geometry::new(geojson::Value::from(&country.boundary))),
        id: Some(geojson::feature::Id::String(country.iso_a3.clone())),
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Write the layer as pretty-printed GeoJSON.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_map_layer<W: Write>(layer: &FeatureCollection, mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, layer)?;
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    fn country(name: &str, iso: &str, x: f64) -> Country {
        Country {
            name: name.to_string(),
            iso_a3: iso.to_string(),
            boundary: MultiPolygon::new(vec![polygon![
                (x: x, y: 0.0),
                (x: x + 2.0, y: 0.0),
                (x: x + 2.0, y: 2.0),
                (x: x, y: 2.0),
            ]]),
        }
    }

    fn visit(iso: &str) -> Visit {
        Visit {
            position: 0,
            id: None,
            country: String::new(),
            iso_a3: iso.to_string(),
            restaurant: "Somewhere".to_string(),
            scores: Vec::new(),
            group_rating: Some(8.0),
            visit_date: None,
            notes: String::new(),
            dishes: String::new(),
        }
    }

    #[test]
    fn test_map_layer_styles_visited() {
        let atlas = Atlas::new(vec![country("Ghana", "GHA", 0.0), country("Togo", "TGO", 2.0)]);
        let layer = map_layer(&atlas, &[visit("GHA"), visit("GHA")]);

        assert_eq!(layer.features.len(), 2);
        let ghana = &layer.features[0];
        assert_eq!(ghana.property("visited"), Some(&json!(true)));
        assert_eq!(ghana.property("visits"), Some(&json!(2)));
        assert_eq!(ghana.property("fillColor"), Some(&json!("#4CAF50")));

        let togo = &layer.features[1];
        assert_eq!(togo.property("visited"), Some(&json!(false)));
        assert_eq!(togo.property("color"), Some(&json!("#555555")));
    }

    #[test]
    fn test_map_layer_bounds() {
        let atlas = Atlas::new(vec![country("Ghana", "GHA", 0.0), country("Togo", "TGO", 2.0)]);
        let layer = map_layer(&atlas, &[]);

        assert_eq!(layer.bbox, Some(vec![0.0, 0.0, 4.0, 2.0]));
        let members = layer.foreign_members.unwrap();
        assert_eq!(members["center"], json!([1.0, 2.0]));
        assert_eq!(members["max_bounds"], json!([[-5.0, -5.0], [7.0, 9.0]]));
    }

    #[test]
    fn test_write_map_layer_is_geojson() {
        let atlas = Atlas::new(vec![country("Ghana", "GHA", 0.0)]);
        let mut out = Vec::new();
        write_map_layer(&map_layer(&atlas, &[]), &mut out).unwrap();

        let parsed: geojson::GeoJson = String::from_utf8(out).unwrap().parse().unwrap();
        assert!(matches!(parsed, geojson::GeoJson::FeatureCollection(_)));
    }
}
