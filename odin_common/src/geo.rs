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
#![allow(unused)]

/// this module provides support for geometries on the WGS84 ellipsoid surface
/// We use the [geo](https://docs.rs/geo/latest/geo/index.html) crate as the foundation and add value semantics
/// (validated lon/lat degrees, bounding boxes that can't be inverted) via the new type pattern, which keeps
/// the capability to use `geo` algorithms without copying.

use std::fmt;
use serde::{Serialize,Deserialize};
use thiserror::Error;
use geo::{Contains, Coord, MapCoords, MultiPolygon, Point, Rect};

pub type GeoCoord = Coord<f64>;

/// mean equatorial radius used by the spherical Web Mercator projection (EPSG:3857)
pub const WEB_MERCATOR_RADIUS: f64 = 6_378_137.0;

#[derive(Error,Debug,Clone,PartialEq)]
pub enum GeoError {
    #[error("invalid geographic coordinate {0}")]
    InvalidCoordinate(String),

    #[error("invalid bounding box {0}")]
    InvalidRect(String),

    #[error("unsupported coordinate reference system {0}")]
    UnsupportedCrs(String),
}

#[inline]
pub fn is_valid_longitude (lon: f64)->bool { lon.is_finite() && (-180.0..=180.0).contains(&lon) }

#[inline]
pub fn is_valid_latitude (lat: f64)->bool { lat.is_finite() && (-90.0..=90.0).contains(&lat) }

/* #region GeoPoint ***********************************************************************************************/

/// a wrapper for geo::Point that uses geodetic degrees stored as f64 (x = longitude, y = latitude)
#[derive(Debug,Clone,Copy,PartialEq,Serialize,Deserialize)]
#[serde(from="LonLat", into="LonLat")]
pub struct GeoPoint(Point);

impl GeoPoint {
    pub fn from_lon_lat_degrees (lon: f64, lat: f64) -> Self {
        GeoPoint( Point::new( lon, lat))
    }

    /// this rejects instead of normalizing out-of-range values since those indicate corrupted input
    pub fn try_from_lon_lat_degrees (lon: f64, lat: f64) -> Result<Self,GeoError> {
        if is_valid_longitude(lon) && is_valid_latitude(lat) {
            Ok( GeoPoint( Point::new( lon, lat)) )
        } else {
            Err( GeoError::InvalidCoordinate( format!("lon={lon}, lat={lat}")) )
        }
    }

    #[inline] pub fn longitude_degrees(&self) -> f64 { self.0.x() }
    #[inline] pub fn latitude_degrees(&self) -> f64 { self.0.y() }

    pub fn point (&self) -> &Point { &self.0 }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.0.x(), self.0.y())
    }
}

// serialized as { "lon": .., "lat": .. } but we also accept the field names used by `geo` ("x", "y")
// and the verbose names of many tabular feeds
#[derive(Serialize,Deserialize)]
struct LonLat {
    #[serde(alias="longitude", alias="x")]
    lon: f64,
    #[serde(alias="latitude", alias="y")]
    lat: f64
}

impl From<LonLat> for GeoPoint {
    fn from (ll: LonLat)->Self { GeoPoint::from_lon_lat_degrees( ll.lon, ll.lat) }
}

impl From<GeoPoint> for LonLat {
    fn from (p: GeoPoint)->Self { LonLat { lon: p.longitude_degrees(), lat: p.latitude_degrees() } }
}

/* #endregion GeoPoint */

/* #region GeoRect ***********************************************************************************************/

/// a geographic bounding box that is guaranteed to be well formed (finite, within WGS84 ranges, non-empty and
/// not crossing the antimeridian). Deserialization goes through the same validation
#[derive(Debug,Clone,Copy,PartialEq,Serialize,Deserialize)]
#[serde(try_from="Wsen", into="Wsen")]
pub struct GeoRect(Rect);

impl GeoRect {
    pub fn from_wsen (west: f64, south: f64, east: f64, north: f64) -> Result<Self,GeoError> {
        if !(is_valid_longitude(west) && is_valid_longitude(east)) {
            return Err( GeoError::InvalidRect( format!("longitudes out of range: west={west}, east={east}")))
        }
        if !(is_valid_latitude(south) && is_valid_latitude(north)) {
            return Err( GeoError::InvalidRect( format!("latitudes out of range: south={south}, north={north}")))
        }
        if west >= east {
            return Err( GeoError::InvalidRect( format!("west {west} not less than east {east}")))
        }
        if south >= north {
            return Err( GeoError::InvalidRect( format!("south {south} not less than north {north}")))
        }

        Ok( GeoRect( Rect::new( Coord{ x: west, y: south }, Coord{ x: east, y: north })) )
    }

    #[inline] pub fn west(&self)->f64 { self.0.min().x }
    #[inline] pub fn east(&self)->f64 { self.0.max().x }
    #[inline] pub fn south(&self)->f64 { self.0.min().y }
    #[inline] pub fn north(&self)->f64 { self.0.max().y }

    pub fn rect (&self)->&Rect { &self.0 }

    /// inclusive on all edges
    pub fn contains_point (&self, p: &GeoPoint)->bool {
        let x = p.longitude_degrees();
        let y = p.latitude_degrees();
        x >= self.west() && x <= self.east() && y >= self.south() && y <= self.north()
    }
}

impl fmt::Display for GeoRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[w:{},s:{},e:{},n:{}]", self.west(), self.south(), self.east(), self.north())
    }
}

#[derive(Serialize,Deserialize)]
struct Wsen { west: f64, south: f64, east: f64, north: f64 }

impl TryFrom<Wsen> for GeoRect {
    type Error = GeoError;
    fn try_from (r: Wsen)->Result<Self,GeoError> { GeoRect::from_wsen( r.west, r.south, r.east, r.north) }
}

impl From<GeoRect> for Wsen {
    fn from (r: GeoRect)->Self { Wsen { west: r.west(), south: r.south(), east: r.east(), north: r.north() } }
}

/* #endregion GeoRect */

/* #region Crs ***************************************************************************************************/

/// the coordinate reference systems we can map into geodetic WGS84 degrees without an external projection library
#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize,Deserialize)]
pub enum Crs {
    /// EPSG:4326 or OGC CRS84 - note both are used with lon,lat order in GeoJSON
    Wgs84,
    /// EPSG:3857 spherical (pseudo) Mercator in meters
    WebMercator,
}

impl Crs {
    /// parse the usual CRS name variants ("EPSG:4326", "urn:ogc:def:crs:EPSG::3857", "urn:ogc:def:crs:OGC:1.3:CRS84" ..)
    pub fn from_name (name: &str)->Result<Crs,GeoError> {
        let n = name.trim().to_ascii_uppercase();
        let code = n.rsplit(|c| c == ':' || c == '/').next().unwrap_or("");

        match code {
            "4326" | "CRS84" => Ok(Crs::Wgs84),
            "3857" | "900913" | "3785" => Ok(Crs::WebMercator),
            _ => Err( GeoError::UnsupportedCrs( name.to_string()))
        }
    }

    pub fn to_wgs84 (&self, c: GeoCoord)->GeoCoord {
        match self {
            Crs::Wgs84 => c,
            Crs::WebMercator => web_mercator_to_wgs84(c)
        }
    }

    pub fn reproject_multi_polygon (&self, mp: MultiPolygon)->MultiPolygon {
        match self {
            Crs::Wgs84 => mp,
            _ => mp.map_coords( |c| self.to_wgs84(c))
        }
    }
}

pub fn web_mercator_to_wgs84 (c: GeoCoord)->GeoCoord {
    let lon = (c.x / WEB_MERCATOR_RADIUS).to_degrees();
    let lat = (2.0 * (c.y / WEB_MERCATOR_RADIUS).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    Coord{ x: lon, y: lat }
}

pub fn wgs84_to_web_mercator (c: GeoCoord)->GeoCoord {
    let x = c.x.to_radians() * WEB_MERCATOR_RADIUS;
    let y = (std::f64::consts::FRAC_PI_4 + c.y.to_radians() / 2.0).tan().ln() * WEB_MERCATOR_RADIUS;
    Coord{ x, y }
}

/* #endregion Crs */

/// answer if point is in the interior of any of the polygons. Points on an edge or vertex (or inside a hole) are
/// not contained, which is the OGC `within` predicate
#[inline]
pub fn interior_contains (mp: &MultiPolygon, p: &GeoPoint)->bool {
    mp.contains( p.point())
}
