use std::marker::PhantomData;

use geojson::{Geometry, JsonObject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Properties for region outline features
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS, JsonSchema)]
#[ts(export)]
#[schemars(description = "Properties for region outline features")]
pub struct RegionProperties {
    #[schemars(description = "Annotation identifier, e.g. region-3")]
    pub id: String,
    #[schemars(description = "Description attached to the region, tags removed")]
    pub label: Option<String>,
    #[schemars(description = "Area of the outline in square pixels")]
    pub area: f64,
    #[schemars(description = "Perimeter of the outline in pixels")]
    pub perimeter: f64,
    #[schemars(description = "Number of outline vertices")]
    pub vertex_count: usize,
}

/// Type alias for region outline GeoJSON
pub type RegionGeoJson = TypedGeoJson<RegionProperties>;

/// A GeoJSON Feature whose properties deserialize into `P`.
#[derive(Serialize, Deserialize, Debug)]
pub struct TypedFeature<P> {
    #[serde(flatten)]
    pub feature: geojson::Feature,
    #[serde(skip)]
    _properties: PhantomData<P>,
}

impl<P> TypedFeature<P>
where
    for<'de> P: Serialize + Deserialize<'de>,
{
    pub fn new(geometry: Option<Geometry>, properties: P) -> Self {
        let feature = geojson::Feature {
            bbox: None,
            geometry,
            id: None,
            properties: serde_json::to_value(properties).ok().and_then(|v| v.as_object().cloned()),
            foreign_members: None,
        };
        Self {
            feature,
            _properties: PhantomData,
        }
    }

    /// Typed view of the feature properties, if they match `P`.
    pub fn properties(&self) -> Option<P> {
        self.feature
            .properties
            .as_ref()
            .and_then(|p| serde_json::from_value(serde_json::Value::Object(p.clone())).ok())
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TypedFeatureCollection<P> {
    pub bbox: Option<Vec<f64>>,
    pub features: Vec<TypedFeature<P>>,
    pub foreign_members: Option<JsonObject>,
}

impl<P> TypedFeatureCollection<P> {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> &[TypedFeature<P>] {
        &self.features
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub enum TypedGeoJson<P> {
    Geometry(Geometry),
    Feature(TypedFeature<P>),
    FeatureCollection(TypedFeatureCollection<P>),
}

impl<P> TypedGeoJson<P> {
    pub fn as_feature_collection(&self) -> Option<&TypedFeatureCollection<P>> {
        match self {
            TypedGeoJson::FeatureCollection(fc) => Some(fc),
            _ => None,
        }
    }

    pub fn into_feature_collection(self) -> Option<TypedFeatureCollection<P>> {
        match self {
            TypedGeoJson::FeatureCollection(fc) => Some(fc),
            _ => None,
        }
    }
}

impl RegionGeoJson {
    fn features_where<F>(&self, keep: F) -> Vec<&TypedFeature<RegionProperties>>
    where
        F: Fn(&RegionProperties) -> bool,
    {
        self.as_feature_collection()
            .map(|fc| {
                fc.features
                    .iter()
                    .filter(|feature| feature.properties().is_some_and(|props| keep(&props)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Features that carry a label
    pub fn labelled_features(&self) -> Vec<&TypedFeature<RegionProperties>> {
        self.features_where(|props| props.label.is_some())
    }

    /// Features whose area lies in `[min_area, max_area]`
    pub fn features_by_area_range(&self, min_area: f64, max_area: f64) -> Vec<&TypedFeature<RegionProperties>> {
        self.features_where(|props| props.area >= min_area && props.area <= max_area)
    }

    pub fn largest_feature(&self) -> Option<&TypedFeature<RegionProperties>> {
        self.as_feature_collection()?.features.iter().max_by(|a, b| {
            let area_a = a.properties().map(|p| p.area).unwrap_or(0.0);
            let area_b = b.properties().map(|p| p.area).unwrap_or(0.0);
            area_a.total_cmp(&area_b)
        })
    }

    /// Size of the space the outlines live in, from foreign members
    pub fn image_dimensions(&self) -> Option<(f64, f64)> {
        let foreign = self.as_feature_collection()?.foreign_members.as_ref()?;
        let width = foreign.get("image_width")?.as_f64()?;
        let height = foreign.get("image_height")?.as_f64()?;
        Some((width, height))
    }

    pub fn region_count(&self) -> Option<usize> {
        self.as_feature_collection()?
            .foreign_members
            .as_ref()?
            .get("region_count")?
            .as_u64()
            .map(|v| v as usize)
    }
}
