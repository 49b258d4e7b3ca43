//! Region annotations handed to the external annotation renderer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use ts_rs::TS;

use crate::{
    error::Result,
    types::{CoordinateSpace, Dimensions, Point, Polygon},
};

const W3C_ANNOTATION_CONTEXT: &str = "http://www.w3.org/ns/anno.jsonld";

/// A labelled region outline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(bound = "", rename_all = "camelCase")]
pub struct Annotation<S> {
    pub id: String,
    pub bounding_polygon: Polygon<S>,
    pub label: Option<String>,
}

impl<S: CoordinateSpace> Annotation<S> {
    pub fn new(id: impl Into<String>, bounding_polygon: Polygon<S>, label: Option<String>) -> Self {
        Self {
            id: id.into(),
            bounding_polygon,
            label,
        }
    }

    /// SVG selector markup: `<svg><polygon points="x,y x,y "/></svg>`.
    pub fn to_svg_selector(&self) -> String {
        let points: String = self
            .bounding_polygon
            .vertices()
            .iter()
            .map(|p| format!("{},{} ", p.x, p.y))
            .collect();
        format!("<svg><polygon points=\"{points}\"/></svg>")
    }

    /// W3C Web Annotation carrying the outline as an SVG selector.
    pub fn to_w3c_json(&self) -> Value {
        json!({
            "@context": W3C_ANNOTATION_CONTEXT,
            "type": "Annotation",
            "id": self.id,
            "body": [],
            "target": {
                "selector": {
                    "type": "SvgSelector",
                    "value": self.to_svg_selector(),
                }
            }
        })
    }

    pub fn to_payload(&self) -> AnnotationPayload {
        AnnotationPayload {
            id: self.id.clone(),
            bounding_polygon: self
                .bounding_polygon
                .vertices()
                .iter()
                .map(|p| PayloadPoint { x: p.x, y: p.y })
                .collect(),
            label: self.label.clone(),
        }
    }
}

/// Vertex of an [`AnnotationPayload`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct PayloadPoint {
    pub x: f64,
    pub y: f64,
}

/// Flat `{id, boundingPolygon, label}` record exchanged with the viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AnnotationPayload {
    pub id: String,
    pub bounding_polygon: Vec<PayloadPoint>,
    pub label: Option<String>,
}

impl AnnotationPayload {
    /// Read the payload back as an annotation of space `S`.
    pub fn into_annotation<S: CoordinateSpace>(self) -> Result<Annotation<S>> {
        let vertices = self
            .bounding_polygon
            .into_iter()
            .map(|p| Point::new(p.x, p.y))
            .collect();
        Ok(Annotation::new(self.id, Polygon::new(vertices)?, self.label))
    }
}

/// All annotations produced for one image, in one space.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(bound = "")]
pub struct AnnotationSet<S> {
    pub annotations: Vec<Annotation<S>>,
    /// Size of the space the polygons live in
    pub dimensions: Dimensions,
}

impl<S: CoordinateSpace> AnnotationSet<S> {
    pub fn new(dimensions: Dimensions) -> Self {
        Self {
            annotations: Vec::new(),
            dimensions,
        }
    }

    pub fn push(&mut self, annotation: Annotation<S>) {
        self.annotations.push(annotation);
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn payloads(&self) -> Vec<AnnotationPayload> {
        self.annotations.iter().map(Annotation::to_payload).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, DisplaySpace};

    fn triangle() -> Annotation<DisplaySpace> {
        let polygon = Polygon::new(vec![
            Point::new(10.0, 20.0),
            Point::new(30.5, 20.0),
            Point::new(10.0, 40.0),
        ])
        .unwrap();
        Annotation::new("region-1", polygon, Some("a cat".to_string()))
    }

    #[test]
    fn test_svg_selector() {
        assert_eq!(
            triangle().to_svg_selector(),
            "<svg><polygon points=\"10,20 30.5,20 10,40 \"/></svg>"
        );
    }

    #[test]
    fn test_w3c_json() {
        let value = triangle().to_w3c_json();
        assert_eq!(value["@context"], "http://www.w3.org/ns/anno.jsonld");
        assert_eq!(value["type"], "Annotation");
        assert_eq!(value["id"], "region-1");
        assert_eq!(value["body"], json!([]));
        assert_eq!(value["target"]["selector"]["type"], "SvgSelector");
        assert_eq!(
            value["target"]["selector"]["value"],
            "<svg><polygon points=\"10,20 30.5,20 10,40 \"/></svg>"
        );
    }

    #[test]
    fn test_payload_uses_camel_case() {
        let payload = triangle().to_payload();
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["boundingPolygon"][1], json!({"x": 30.5, "y": 20.0}));
        assert_eq!(value["label"], "a cat");

        let back: AnnotationPayload = serde_json::from_value(value).unwrap();
        assert_eq!(back.into_annotation::<DisplaySpace>().unwrap(), triangle());
    }

    #[test]
    fn test_payload_with_too_few_vertices_is_rejected() {
        let payload = AnnotationPayload {
            id: "region-9".to_string(),
            bounding_polygon: vec![PayloadPoint { x: 0.0, y: 0.0 }],
            label: None,
        };
        assert!(payload.into_annotation::<DisplaySpace>().is_err());
    }

    #[test]
    fn test_set_collects_payloads() {
        let mut set = AnnotationSet::<DisplaySpace>::new(Dimensions::new(100.0, 100.0));
        assert!(set.is_empty());
        set.push(triangle());
        set.push(Annotation::new(
            "region-2",
            Polygon::from_bounding_box(&BoundingBox::new(0.0, 0.0, 5.0, 5.0)),
            None,
        ));
        let payloads = set.payloads();
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[1].bounding_polygon.len(), 4);
    }
}
