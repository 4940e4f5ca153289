use crate::error::{ProcessingError, Result};
use crate::models::Region;
use crate::utils::constants::DEFAULT_REGION_ID_FIELD;
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<serde_json::Map<String, Value>>,
    #[serde(default)]
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

type Ring = Vec<Vec<f64>>;

/// Reads region polygons from a GeoJSON feature collection in plain
/// lat/lon degrees.
pub struct RegionReader {
    id_field: String,
}

impl RegionReader {
    pub fn new() -> Self {
        Self {
            id_field: DEFAULT_REGION_ID_FIELD.to_string(),
        }
    }

    pub fn with_id_field(id_field: &str) -> Self {
        Self {
            id_field: id_field.to_string(),
        }
    }

    /// Read all regions from a GeoJSON file
    pub fn read_regions(&self, path: &Path) -> Result<Vec<Region>> {
        let file = File::open(path)
            .map_err(|e| ProcessingError::malformed(path, format!("cannot open: {}", e)))?;
        let collection: FeatureCollection = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| ProcessingError::malformed(path, e.to_string()))?;

        let regions = self
            .convert_collection(collection)
            .map_err(|e| ProcessingError::malformed(path, e.to_string()))?;

        info!(
            path = %path.display(),
            regions = regions.len(),
            "Loaded region polygons"
        );
        Ok(regions)
    }

    /// Parse regions from GeoJSON text
    pub fn parse_regions(&self, json: &str) -> Result<Vec<Region>> {
        let collection: FeatureCollection = serde_json::from_str(json)?;
        self.convert_collection(collection)
    }

    fn convert_collection(&self, collection: FeatureCollection) -> Result<Vec<Region>> {
        if collection.kind != "FeatureCollection" {
            return Err(ProcessingError::InvalidFormat(format!(
                "Expected a FeatureCollection, found '{}'",
                collection.kind
            )));
        }

        let mut seen = HashSet::with_capacity(collection.features.len());
        let mut regions = Vec::with_capacity(collection.features.len());

        for (index, feature) in collection.features.into_iter().enumerate() {
            let region_id = self.feature_id(&feature).ok_or_else(|| {
                ProcessingError::MissingData(format!(
                    "feature {} has no '{}' property",
                    index, self.id_field
                ))
            })?;

            if !seen.insert(region_id.clone()) {
                return Err(ProcessingError::InvalidFormat(format!(
                    "duplicate region id '{}'",
                    region_id
                )));
            }

            let geometry = match feature.geometry {
                Some(geometry) => convert_geometry(&region_id, geometry)?,
                None => {
                    debug!(region_id = %region_id, "Feature without geometry");
                    MultiPolygon::new(vec![])
                }
            };

            regions.push(Region::new(region_id, geometry));
        }

        Ok(regions)
    }

    fn feature_id(&self, feature: &Feature) -> Option<String> {
        match feature.properties.as_ref()?.get(&self.id_field)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl Default for RegionReader {
    fn default() -> Self {
        Self::new()
    }
}

fn convert_geometry(region_id: &str, geometry: Geometry) -> Result<MultiPolygon<f64>> {
    let invalid = |reason: String| ProcessingError::InvalidGeometry {
        region_id: region_id.to_string(),
        reason,
    };

    match geometry.kind.as_str() {
        "Polygon" => {
            let rings: Vec<Ring> =
                serde_json::from_value(geometry.coordinates).map_err(|e| invalid(e.to_string()))?;
            let polygon = rings_to_polygon(rings).map_err(invalid)?;
            Ok(MultiPolygon::new(polygon.into_iter().collect()))
        }
        "MultiPolygon" => {
            let polygons: Vec<Vec<Ring>> =
                serde_json::from_value(geometry.coordinates).map_err(|e| invalid(e.to_string()))?;
            let mut converted = Vec::with_capacity(polygons.len());
            for rings in polygons {
                if let Some(polygon) = rings_to_polygon(rings).map_err(invalid)? {
                    converted.push(polygon);
                }
            }
            Ok(MultiPolygon::new(converted))
        }
        other => Err(invalid(format!("unsupported geometry type '{}'", other))),
    }
}

fn rings_to_polygon(rings: Vec<Ring>) -> std::result::Result<Option<Polygon<f64>>, String> {
    let mut rings = rings.into_iter();
    let exterior = match rings.next() {
        Some(ring) => ring_to_line_string(ring)?,
        None => return Ok(None),
    };
    let interiors = rings
        .map(ring_to_line_string)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Some(Polygon::new(exterior, interiors)))
}

fn ring_to_line_string(ring: Ring) -> std::result::Result<LineString<f64>, String> {
    if ring.len() < 3 {
        return Err(format!("ring has {} positions, need at least 3", ring.len()));
    }

    ring.into_iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => Err("position needs longitude and latitude".to_string()),
        })
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(LineString::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const REGIONS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "ADM3_PCODE": "MW10101", "ADM3_EN": "Chitipa Boma" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[33.95, -10.05], [34.05, -10.05], [34.05, -9.95], [33.95, -9.95], [33.95, -10.05]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "ADM3_PCODE": 20202 },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[34.0, -11.0], [34.1, -11.0], [34.1, -10.9], [34.0, -11.0]]],
                        [[[35.0, -12.0, 100.0], [35.2, -12.0, 100.0], [35.2, -11.8, 100.0], [35.0, -12.0, 100.0]]]
                    ]
                }
            },
            {
                "type": "Feature",
                "properties": { "ADM3_PCODE": "MW30303" },
                "geometry": null
            }
        ]
    }"#;

    #[test]
    fn test_parse_regions() {
        let reader = RegionReader::new();
        let regions = reader.parse_regions(REGIONS).unwrap();

        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0].region_id, "MW10101");
        assert!((regions[0].region_area - 0.01).abs() < 1e-12);

        assert_eq!(regions[1].region_id, "20202");
        assert_eq!(regions[1].geometry.0.len(), 2);
        assert!((regions[1].region_area - (0.005 + 0.02)).abs() < 1e-12);

        assert!(regions[2].is_empty());
    }

    #[test]
    fn test_custom_id_field() {
        let reader = RegionReader::with_id_field("ADM3_EN");
        let result = reader.parse_regions(REGIONS);

        // Only the first feature carries ADM3_EN
        assert!(matches!(result, Err(ProcessingError::MissingData(_))));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let json = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {"ADM3_PCODE": "A"}, "geometry": null},
            {"type": "Feature", "properties": {"ADM3_PCODE": "A"}, "geometry": null}
        ]}"#;
        assert!(RegionReader::new().parse_regions(json).is_err());
    }

    #[test]
    fn test_unsupported_geometry() {
        let json = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {"ADM3_PCODE": "A"},
             "geometry": {"type": "Point", "coordinates": [34.0, -10.0]}}
        ]}"#;
        let result = RegionReader::new().parse_regions(json);
        assert!(matches!(
            result,
            Err(ProcessingError::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn test_read_regions_file() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(file, "{}", REGIONS)?;

        let regions = RegionReader::new().read_regions(file.path())?;
        assert_eq!(regions.len(), 3);

        let missing = RegionReader::new().read_regions(Path::new("no/such/regions.geojson"));
        assert!(matches!(
            missing,
            Err(ProcessingError::MalformedInput { .. })
        ));

        Ok(())
    }
}
