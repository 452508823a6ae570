//! Spherical Web Mercator, as used by slippy-map tile pyramids.
//!
//! World pixel space has its origin at the north-west corner of the world,
//! `x` grows east and `y` grows south. At zoom `z` the world is
//! `TILE_SIZE * 2^z` pixels wide.

use core::f64::consts::PI;

use super::Vec2;

/// Pixel size of the single tile covering the world at zoom 0.
pub const TILE_SIZE: f64 = 256.0;

/// Latitude at which spherical Web Mercator is clipped (degrees).
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Geographic coordinate in degrees.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LonLat {
    pub lon_deg: f64,
    pub lat_deg: f64,
}

impl LonLat {
    pub fn new(lon_deg: f64, lat_deg: f64) -> Self {
        Self { lon_deg, lat_deg }
    }

    pub fn is_finite(&self) -> bool {
        self.lon_deg.is_finite() && self.lat_deg.is_finite()
    }
}

/// Width (and height) of the world in pixels at `zoom`.
pub fn world_size_px(zoom: f64) -> f64 {
    TILE_SIZE * zoom.exp2()
}

pub fn lonlat_to_world_px(p: LonLat, zoom: f64) -> Vec2 {
    let sin_lat = p
        .lat_deg
        .clamp(-MAX_LATITUDE, MAX_LATITUDE)
        .to_radians()
        .sin();
    let x = (p.lon_deg + 180.0) / 360.0;
    let y = 0.5 - ((1.0 + sin_lat) / (1.0 - sin_lat)).ln() / (4.0 * PI);
    let size = world_size_px(zoom);
    Vec2::new(x * size, y * size)
}

pub fn world_px_to_lonlat(px: Vec2, zoom: f64) -> LonLat {
    let size = world_size_px(zoom);
    let x = px.x / size - 0.5;
    let y = 0.5 - px.y / size;
    let lat = 90.0 - 360.0 * (-y * 2.0 * PI).exp().atan() / PI;
    LonLat::new(360.0 * x, lat)
}

#[cfg(test)]
mod tests {
    use super::{LonLat, MAX_LATITUDE, TILE_SIZE, lonlat_to_world_px, world_px_to_lonlat};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn null_island_is_world_center() {
        let px = lonlat_to_world_px(LonLat::new(0.0, 0.0), 0.0);
        assert_close(px.x, TILE_SIZE / 2.0, 1e-9);
        assert_close(px.y, TILE_SIZE / 2.0, 1e-9);

        let px = lonlat_to_world_px(LonLat::new(0.0, 0.0), 2.0);
        assert_close(px.x, TILE_SIZE * 2.0, 1e-9);
        assert_close(px.y, TILE_SIZE * 2.0, 1e-9);
    }

    #[test]
    fn clamps_to_mercator_limit() {
        let top = lonlat_to_world_px(LonLat::new(-180.0, MAX_LATITUDE), 0.0);
        assert_close(top.x, 0.0, 1e-9);
        assert_close(top.y, 0.0, 1e-6);

        let beyond = lonlat_to_world_px(LonLat::new(-180.0, 89.9), 0.0);
        assert_eq!(beyond, top);
    }

    #[test]
    fn round_trip_cambridge() {
        let p = LonLat::new(0.121, 52.205);
        let px = lonlat_to_world_px(p, 13.0);
        let back = world_px_to_lonlat(px, 13.0);
        assert_close(back.lon_deg, p.lon_deg, 1e-9);
        assert_close(back.lat_deg, p.lat_deg, 1e-9);
    }
}
