/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */
/// areas of interest (fire perimeters) that are used to scope detections, and the geometry filter that
/// does the scoping

use std::path::Path;
use geo::{BoundingRect, MultiPolygon, Rect};
use geojson::{Feature, GeoJson, JsonObject, JsonValue};
use tracing::{info, warn};
use odin_common::geo::{Crs, GeoPoint, interior_contains};

use crate::{Detection, errors::Result};

/// an immutable perimeter polygon (set) in WGS84 coordinates.
/// Containment is exclusive - points on the boundary or inside holes are outside
#[derive(Debug,Clone)]
pub struct AreaOfInterest {
    pub mission_name: String,
    pub area_acres: Option<f64>,
    pub source: Option<String>,
    geometry: MultiPolygon,
    bounds: Option<Rect>,
}

impl AreaOfInterest {
    pub fn new (mission_name: impl ToString, geometry: MultiPolygon, area_acres: Option<f64>, source: Option<String>) -> Self {
        let bounds = geometry.bounding_rect();
        AreaOfInterest { mission_name: mission_name.to_string(), area_acres, source, geometry, bounds }
    }

    pub fn geometry (&self) -> &MultiPolygon { &self.geometry }

    pub fn contains (&self, p: &GeoPoint) -> bool {
        match &self.bounds {
            Some(r) => {
                let (x,y) = (p.longitude_degrees(), p.latitude_degrees());
                if x < r.min().x || x > r.max().x || y < r.min().y || y > r.max().y {
                    return false
                }
                interior_contains( &self.geometry, p)
            }
            None => false // empty geometry
        }
    }
}

/// index of the first area (in stored order) that contains the point
pub fn first_containing_area (areas: &[AreaOfInterest], p: &GeoPoint) -> Option<usize> {
    areas.iter().position(|a| a.contains(p))
}

/// keep only detections that fall within at least one of the areas, paired with the index of the first matching area.
/// Detections outside of all areas are dropped
pub fn filter_within (detections: Vec<Detection>, areas: &[AreaOfInterest]) -> Vec<(Detection,usize)> {
    let n_in = detections.len();
    let retained: Vec<(Detection,usize)> = detections.into_iter().filter_map( |d| {
        let p = GeoPoint::from_lon_lat_degrees( d.longitude, d.latitude);
        first_containing_area( areas, &p).map(|idx| (d,idx))
    }).collect();

    info!(n_in, n_retained=retained.len(), n_areas=areas.len(), "filtered detections by area");
    retained
}

/* #region GeoJSON import ***************************************************************************************/

/// parse a GeoJSON FeatureCollection (or single Feature/Geometry) of Polygon or MultiPolygon perimeters.
/// Mission name comes from a "mission" or "name" property, acreage from "area_acres" and provenance from "source".
/// A (deprecated but still common) "crs" member is honored for EPSG:4326, CRS84 and EPSG:3857
pub fn parse_areas_geojson (text: &str) -> Result<Vec<AreaOfInterest>> {
    let geojson: GeoJson = text.parse()?;

    let (features, crs) = match geojson {
        GeoJson::FeatureCollection(fc) => {
            let crs = legacy_crs( fc.foreign_members.as_ref())?;
            (fc.features, crs)
        }
        GeoJson::Feature(f) => {
            let crs = legacy_crs( f.foreign_members.as_ref())?;
            (vec![f], crs)
        }
        GeoJson::Geometry(g) => {
            (vec![ Feature { bbox: None, geometry: Some(g), id: None, properties: None, foreign_members: None } ], Crs::Wgs84)
        }
    };

    let mut areas = Vec::with_capacity(features.len());
    for (i,feature) in features.into_iter().enumerate() {
        let name = feature_name( &feature, i);
        let props = feature.properties;
        let Some(geometry) = feature.geometry else {
            warn!(area=%name, "skipping feature without geometry");
            continue
        };

        let mp = match geo::Geometry::<f64>::try_from( geometry.value)? {
            geo::Geometry::Polygon(p) => MultiPolygon::new( vec![p]),
            geo::Geometry::MultiPolygon(mp) => mp,
            _ => {
                warn!(area=%name, "skipping non-polygon feature");
                continue
            }
        };

        let area_acres = props.as_ref().and_then( |p| p.get("area_acres")).and_then( json_f64);
        let source = props.as_ref().and_then( |p| p.get("source")).and_then( |v| v.as_str()).map( |s| s.to_string());

        areas.push( AreaOfInterest::new( name, crs.reproject_multi_polygon(mp), area_acres, source));
    }

    info!(n_areas=areas.len(), ?crs, "loaded areas of interest");
    Ok(areas)
}

pub fn read_areas_file (path: impl AsRef<Path>) -> Result<Vec<AreaOfInterest>> {
    let text = std::fs::read_to_string( path.as_ref())?;
    parse_areas_geojson( &text)
}

fn legacy_crs (foreign_members: Option<&JsonObject>) -> Result<Crs> {
    let name = foreign_members
        .and_then( |m| m.get("crs"))
        .and_then( |crs| crs.get("properties"))
        .and_then( |props| props.get("name"))
        .and_then( |name| name.as_str());

    match name {
        Some(name) => Ok( Crs::from_name(name)? ),
        None => Ok( Crs::Wgs84 ) // RFC 7946 default
    }
}

fn feature_name (feature: &Feature, idx: usize) -> String {
    feature.properties.as_ref()
        .and_then( |p| p.get("mission").or_else(|| p.get("name")))
        .and_then( |v| match v {
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Number(n) => Some(n.to_string()),
            _ => None
        })
        .unwrap_or_else( || format!("area-{idx}"))
}

fn json_f64 (v: &JsonValue) -> Option<f64> {
    match v {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None
    }
}

/* #endregion GeoJSON import */
