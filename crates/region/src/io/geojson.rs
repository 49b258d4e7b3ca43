use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde_json::Number;

use crate::{
    annotation::{Annotation, AnnotationSet},
    error::{RegionError, Result},
    typed_geojson::{RegionGeoJson, RegionProperties, TypedFeature, TypedFeatureCollection, TypedGeoJson},
    types::{CoordinateSpace, Dimensions, Point, Polygon},
};

/// Closed GeoJSON ring of a polygon
fn polygon_ring<S: CoordinateSpace>(polygon: &Polygon<S>) -> Vec<Vec<f64>> {
    let mut ring: Vec<Vec<f64>> = polygon.vertices().iter().map(|p| vec![p.x, p.y]).collect();
    if let Some(first) = ring.first().cloned() {
        ring.push(first);
    }
    ring
}

fn region_properties<S: CoordinateSpace>(annotation: &Annotation<S>) -> RegionProperties {
    let polygon = &annotation.bounding_polygon;
    RegionProperties {
        id: annotation.id.clone(),
        label: annotation.label.clone(),
        area: polygon.area(),
        perimeter: polygon.perimeter(),
        vertex_count: polygon.len(),
    }
}

impl<S: CoordinateSpace> AnnotationSet<S> {
    fn foreign_members(&self) -> JsonObject {
        let mut foreign_members = JsonObject::new();
        let number = |v: f64| Number::from_f64(v).map(serde_json::Value::Number).unwrap_or_default();
        foreign_members.insert("image_width".to_string(), number(self.dimensions.width));
        foreign_members.insert("image_height".to_string(), number(self.dimensions.height));
        foreign_members.insert(
            "region_count".to_string(),
            serde_json::Value::Number(Number::from(self.annotations.len())),
        );
        foreign_members
    }

    /// Export to typed GeoJSON format
    pub fn to_typed_geojson(&self) -> RegionGeoJson {
        let features = self
            .annotations
            .iter()
            .map(|annotation| {
                let geometry = Geometry::new(Value::Polygon(vec![polygon_ring(&annotation.bounding_polygon)]));
                TypedFeature::new(Some(geometry), region_properties(annotation))
            })
            .collect();

        TypedGeoJson::FeatureCollection(TypedFeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(self.foreign_members()),
        })
    }

    pub fn to_geojson(&self) -> Result<FeatureCollection> {
        let features = self
            .annotations
            .iter()
            .map(|annotation| -> Result<Feature> {
                let geometry = Geometry::new(Value::Polygon(vec![polygon_ring(&annotation.bounding_polygon)]));
                let properties = match serde_json::to_value(region_properties(annotation))? {
                    serde_json::Value::Object(map) => Some(map),
                    _ => None,
                };
                Ok(Feature {
                    bbox: None,
                    geometry: Some(geometry),
                    id: Some(geojson::feature::Id::String(annotation.id.clone())),
                    properties,
                    foreign_members: None,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(FeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(self.foreign_members()),
        })
    }

    /// Export to GeoJSON and serialize to JSON string
    pub fn to_geojson_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_geojson()?)?)
    }

    pub fn save_geojson(&self, path: &str) -> Result<()> {
        std::fs::write(path, self.to_geojson_string()?)?;
        Ok(())
    }

    pub fn from_geojson_file(path: &str) -> Result<Self> {
        Self::from_geojson_string(&std::fs::read_to_string(path)?)
    }

    /// Load annotations back from a feature collection written by [`Self::to_geojson`]
    pub fn from_geojson_string(geojson_str: &str) -> Result<Self> {
        let collection: FeatureCollection = geojson_str.parse()?;

        let foreign = collection
            .foreign_members
            .as_ref()
            .ok_or_else(|| RegionError::InvalidParameter("missing image metadata in GeoJSON".to_string()))?;
        let dimension = |key: &str| {
            foreign
                .get(key)
                .and_then(|v| v.as_f64())
                .ok_or_else(|| RegionError::InvalidParameter(format!("missing or invalid {key}")))
        };
        let dimensions = Dimensions::new(dimension("image_width")?, dimension("image_height")?).validate(S::KIND)?;

        let mut set = AnnotationSet::new(dimensions);
        for (index, feature) in collection.features.into_iter().enumerate() {
            let Some(Value::Polygon(rings)) = feature.geometry.map(|g| g.value) else {
                continue;
            };
            let Some(exterior) = rings.first() else {
                continue;
            };
            let vertices: Vec<Point<S>> = exterior
                .iter()
                .filter(|coord| coord.len() >= 2)
                .map(|coord| Point::new(coord[0], coord[1]))
                .collect();

            let properties = feature.properties.unwrap_or_default();
            let id = properties
                .get("id")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("region-{}", index + 1));
            let label = properties.get("label").and_then(|v| v.as_str()).map(str::to_string);

            set.push(Annotation::new(id, Polygon::new(vertices)?, label));
        }

        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, DisplaySpace};

    fn sample_set() -> AnnotationSet<DisplaySpace> {
        let mut set = AnnotationSet::new(Dimensions::new(640.0, 480.0));
        set.push(Annotation::new(
            "region-1",
            Polygon::from_bounding_box(&BoundingBox::new(0.0, 0.0, 10.0, 10.0)),
            Some("box".to_string()),
        ));
        set.push(Annotation::new(
            "region-2",
            Polygon::new(vec![Point::new(0.0, 0.0), Point::new(40.0, 0.0), Point::new(0.0, 30.0)]).unwrap(),
            None,
        ));
        set
    }

    #[test]
    fn test_geojson_rings_are_closed() {
        let collection = sample_set().to_geojson().unwrap();
        assert_eq!(collection.features.len(), 2);
        let Some(Value::Polygon(rings)) = collection.features[0].geometry.as_ref().map(|g| g.value.clone()) else {
            panic!("expected polygon geometry");
        };
        assert_eq!(rings[0].len(), 5);
        assert_eq!(rings[0].first(), rings[0].last());
    }

    #[test]
    fn test_typed_geojson_properties() {
        let geojson = sample_set().to_typed_geojson();
        assert_eq!(geojson.region_count(), Some(2));
        assert_eq!(geojson.image_dimensions(), Some((640.0, 480.0)));
        assert_eq!(geojson.labelled_features().len(), 1);

        let largest = geojson.largest_feature().and_then(|f| f.properties()).unwrap();
        assert_eq!(largest.id, "region-2");
        assert_eq!(largest.area, 600.0);
        assert_eq!(largest.perimeter, 120.0);
        assert_eq!(largest.vertex_count, 3);
        assert_eq!(geojson.features_by_area_range(50.0, 150.0).len(), 1);
    }

    #[test]
    fn test_geojson_string_round_trip() {
        let set = sample_set();
        let restored = AnnotationSet::<DisplaySpace>::from_geojson_string(&set.to_geojson_string().unwrap()).unwrap();
        assert_eq!(restored, set);
    }

    #[test]
    fn test_missing_metadata_is_an_error() {
        let bare = r#"{"type": "FeatureCollection", "features": []}"#;
        assert!(AnnotationSet::<DisplaySpace>::from_geojson_string(bare).is_err());
    }
}
