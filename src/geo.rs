//! Map extents and Web Mercator helpers.
//!
//! Classic map series store extents either in Web Mercator meters
//! (wkid 102100 / 3857) or, for embedded viewer URLs, in WGS84 degrees.

use serde::{Deserialize, Serialize};

/// Half the width of the Web Mercator world, in meters.
pub const WEB_MERCATOR_HALF_WORLD: f64 = 20037508.342789244;

/// Well-known id of Web Mercator as used by the hosting platform.
pub const WKID_WEB_MERCATOR: u32 = 102100;

/// Well-known id of WGS84 geographic coordinates.
pub const WKID_WGS84: u32 = 4326;

/// Spatial reference of an extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialReference {
    pub wkid: u32,
}

impl Default for SpatialReference {
    fn default() -> Self {
        Self {
            wkid: WKID_WEB_MERCATOR,
        }
    }
}

/// A rectangular map extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    #[serde(default)]
    pub spatial_reference: SpatialReference,
}

impl Extent {
    /// Create an extent in Web Mercator.
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
            spatial_reference: SpatialReference::default(),
        }
    }

    /// Create an extent in WGS84 degrees.
    pub fn wgs84(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            spatial_reference: SpatialReference { wkid: WKID_WGS84 },
            ..Self::new(xmin, ymin, xmax, ymax)
        }
    }

    /// The full Web Mercator world.
    pub fn world() -> Self {
        Self::new(
            -WEB_MERCATOR_HALF_WORLD,
            -WEB_MERCATOR_HALF_WORLD,
            WEB_MERCATOR_HALF_WORLD,
            WEB_MERCATOR_HALF_WORLD,
        )
    }

    /// Parse the `xmin,ymin,xmax,ymax` form used by viewer URLs (WGS84).
    pub fn parse_bbox(s: &str) -> Option<Self> {
        let mut parts = s.split(',').map(|p| p.trim().parse::<f64>());
        let xmin = parts.next()?.ok()?;
        let ymin = parts.next()?.ok()?;
        let xmax = parts.next()?.ok()?;
        let ymax = parts.next()?.ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::wgs84(xmin, ymin, xmax, ymax))
    }

    /// Whether the extent is in WGS84 degrees.
    pub fn is_geographic(&self) -> bool {
        self.spatial_reference.wkid == WKID_WGS84
    }

    /// Convert to Web Mercator if the extent is geographic.
    pub fn to_web_mercator(&self) -> Self {
        if !self.is_geographic() {
            return *self;
        }
        let (xmin, ymin) = wgs84_to_web_mercator(self.xmin, self.ymin);
        let (xmax, ymax) = wgs84_to_web_mercator(self.xmax, self.ymax);
        Self::new(xmin, ymin, xmax, ymax)
    }
}

/// Convert a WGS84 coordinate (degrees) to Web Mercator meters.
pub fn wgs84_to_web_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let x = lon * WEB_MERCATOR_HALF_WORLD / 180.0;
    let y = ((90.0 + lat) * std::f64::consts::PI / 360.0).tan().ln() * WEB_MERCATOR_HALF_WORLD
        / std::f64::consts::PI;
    (x, y)
}

/// Wrap x into the Web Mercator world and clamp y, for map export requests.
///
/// Extents saved by panning across the antimeridian can exceed the world
/// width; the export service rejects those.
pub fn normalize_web_mercator(extent: &Extent) -> Extent {
    let extent = extent.to_web_mercator();
    let clamp = |v: f64| v.clamp(-WEB_MERCATOR_HALF_WORLD, WEB_MERCATOR_HALF_WORLD);
    Extent {
        xmin: wrap_x(extent.xmin),
        ymin: clamp(extent.ymin),
        xmax: wrap_x(extent.xmax),
        ymax: clamp(extent.ymax),
        spatial_reference: extent.spatial_reference,
    }
}

fn wrap_x(x: f64) -> f64 {
    if !x.is_finite() || (-WEB_MERCATOR_HALF_WORLD..=WEB_MERCATOR_HALF_WORLD).contains(&x) {
        return x;
    }
    (x + WEB_MERCATOR_HALF_WORLD).rem_euclid(2.0 * WEB_MERCATOR_HALF_WORLD) - WEB_MERCATOR_HALF_WORLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_maps_to_origin() {
        let (x, y) = wgs84_to_web_mercator(0.0, 0.0);
        assert!(x.abs() < 1e-6);
        assert!(y.abs() < 1e-6);
    }

    #[test]
    fn test_antimeridian_maps_to_half_world() {
        let (x, _) = wgs84_to_web_mercator(180.0, 0.0);
        assert!((x - WEB_MERCATOR_HALF_WORLD).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_wraps_x_and_clamps_y() {
        let width = 2.0 * WEB_MERCATOR_HALF_WORLD;
        let extent = Extent::new(1000.0 + width, -3.0e7, 2000.0 + width, 3.0e7);
        let normalized = normalize_web_mercator(&extent);
        assert!((normalized.xmin - 1000.0).abs() < 1e-3);
        assert!((normalized.xmax - 2000.0).abs() < 1e-3);
        assert_eq!(normalized.ymin, -WEB_MERCATOR_HALF_WORLD);
        assert_eq!(normalized.ymax, WEB_MERCATOR_HALF_WORLD);
    }

    #[test]
    fn test_wrap_x_far_outside_world() {
        for x in [1e20, -1e20, 1e300, -1e300, f64::MAX] {
            let wrapped = wrap_x(x);
            assert!(
                (-WEB_MERCATOR_HALF_WORLD..=WEB_MERCATOR_HALF_WORLD).contains(&wrapped),
                "{x} wrapped to {wrapped}"
            );
        }
        assert_eq!(wrap_x(WEB_MERCATOR_HALF_WORLD), WEB_MERCATOR_HALF_WORLD);
        assert_eq!(wrap_x(-WEB_MERCATOR_HALF_WORLD), -WEB_MERCATOR_HALF_WORLD);
        assert!(wrap_x(f64::NAN).is_nan());
    }

    #[test]
    fn test_normalize_leaves_valid_extent_alone() {
        let extent = Extent::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(normalize_web_mercator(&extent), extent);
    }

    #[test]
    fn test_parse_bbox() {
        let extent = Extent::parse_bbox("-10.5, 20,30,40").unwrap();
        assert!(extent.is_geographic());
        assert_eq!(extent.xmin, -10.5);
        assert_eq!(extent.ymax, 40.0);
        assert!(Extent::parse_bbox("1,2,3").is_none());
        assert!(Extent::parse_bbox("1,2,3,4,5").is_none());
        assert!(Extent::parse_bbox("a,b,c,d").is_none());
    }

    #[test]
    fn test_extent_deserializes_without_spatial_reference() {
        let extent: Extent =
            serde_json::from_str(r#"{"xmin":0,"ymin":0,"xmax":10,"ymax":10}"#).unwrap();
        assert_eq!(extent.spatial_reference.wkid, WKID_WEB_MERCATOR);
    }
}
