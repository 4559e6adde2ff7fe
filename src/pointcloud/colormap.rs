// SPDX-License-Identifier: GPL-3.0-only

//! Depth colormaps
//!
//! Depth is normalized with `clamp(depth / 6 m, 0, 1)` for every camera, so
//! the same distance gets the same color regardless of the sensor.

use serde::{Deserialize, Serialize};

use crate::constants::point_cloud::{DEPTH_COLOR_RANGE_M, NUM_COLORS};

/// Available colormaps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Colormap {
    #[default]
    Viridis,
    Magma,
    Inferno,
    Hsv,
    Terrain,
    Greyscale,
}

impl Colormap {
    pub const ALL: [Colormap; 6] = [
        Colormap::Viridis,
        Colormap::Magma,
        Colormap::Inferno,
        Colormap::Hsv,
        Colormap::Terrain,
        Colormap::Greyscale,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Colormap::Viridis => "Viridis",
            Colormap::Magma => "Magma",
            Colormap::Inferno => "Inferno",
            Colormap::Hsv => "HSV",
            Colormap::Terrain => "Terrain",
            Colormap::Greyscale => "Greyscale",
        }
    }

    /// Color at `t` in `[0, 1]`
    pub fn sample(&self, t: f32) -> [f32; 3] {
        let t = t.clamp(0.0, 1.0);
        match self {
            Colormap::Viridis => interpolate(VIRIDIS, t),
            Colormap::Magma => interpolate(MAGMA, t),
            Colormap::Inferno => interpolate(INFERNO, t),
            Colormap::Terrain => interpolate(TERRAIN, t),
            Colormap::Hsv => hsv_to_rgb(t * 360.0),
            Colormap::Greyscale => [t, t, t],
        }
    }
}

const VIRIDIS: &[[f32; 3]] = &[
    [0.267, 0.005, 0.329],
    [0.229, 0.322, 0.546],
    [0.128, 0.567, 0.551],
    [0.369, 0.789, 0.383],
    [0.993, 0.906, 0.144],
];

const MAGMA: &[[f32; 3]] = &[
    [0.001, 0.000, 0.014],
    [0.316, 0.072, 0.485],
    [0.717, 0.215, 0.475],
    [0.987, 0.535, 0.382],
    [0.987, 0.991, 0.750],
];

const INFERNO: &[[f32; 3]] = &[
    [0.001, 0.000, 0.014],
    [0.341, 0.062, 0.429],
    [0.735, 0.216, 0.330],
    [0.978, 0.557, 0.035],
    [0.988, 0.998, 0.645],
];

const TERRAIN: &[[f32; 3]] = &[
    [0.200, 0.200, 0.600],
    [0.000, 0.600, 1.000],
    [0.000, 0.800, 0.400],
    [1.000, 1.000, 0.600],
    [0.500, 0.360, 0.330],
    [1.000, 1.000, 1.000],
];

fn interpolate(stops: &[[f32; 3]], t: f32) -> [f32; 3] {
    let scaled = t * (stops.len() - 1) as f32;
    let i = (scaled.floor() as usize).min(stops.len() - 2);
    let f = scaled - i as f32;
    let (a, b) = (stops[i], stops[i + 1]);
    [
        a[0] + (b[0] - a[0]) * f,
        a[1] + (b[1] - a[1]) * f,
        a[2] + (b[2] - a[2]) * f,
    ]
}

fn hsv_to_rgb(hue: f32) -> [f32; 3] {
    let h = (hue % 360.0) / 60.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    match h as u32 {
        0 => [1.0, x, 0.0],
        1 => [x, 1.0, 0.0],
        2 => [0.0, 1.0, x],
        3 => [0.0, x, 1.0],
        4 => [x, 0.0, 1.0],
        _ => [1.0, 0.0, x],
    }
}

/// Colormap sampled at `NUM_COLORS` entries
#[derive(Debug, Clone)]
pub struct ColorTable {
    colormap: Colormap,
    colors: Vec<[f32; 3]>,
}

impl ColorTable {
    pub fn new(colormap: Colormap) -> Self {
        let colors = (0..NUM_COLORS)
            .map(|i| colormap.sample(i as f32 / (NUM_COLORS - 1) as f32))
            .collect();
        Self { colormap, colors }
    }

    pub fn colormap(&self) -> Colormap {
        self.colormap
    }

    /// Color for a depth in meters
    pub fn color_for_depth(&self, depth: f32) -> [f32; 3] {
        let z = (depth / DEPTH_COLOR_RANGE_M).clamp(0.0, 1.0);
        let index = ((NUM_COLORS as f32 * z) as usize).min(NUM_COLORS - 1);
        self.colors[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_is_clamped_to_range() {
        let table = ColorTable::new(Colormap::Greyscale);
        assert_eq!(table.color_for_depth(-1.0), [0.0; 3]);
        assert_eq!(table.color_for_depth(0.0), [0.0; 3]);
        assert_eq!(table.color_for_depth(6.0), [1.0; 3]);
        assert_eq!(table.color_for_depth(60.0), [1.0; 3]);
        let mid = table.color_for_depth(3.0)[0];
        assert!((mid - 0.5).abs() < 0.02, "mid = {}", mid);
    }

    #[test]
    fn test_endpoints_match_stops() {
        assert_eq!(Colormap::Viridis.sample(0.0), VIRIDIS[0]);
        let top = Colormap::Viridis.sample(1.0);
        for (got, want) in top.iter().zip(VIRIDIS[4]) {
            assert!((got - want).abs() < 1e-6);
        }
        assert_eq!(Colormap::Hsv.sample(0.0), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_all_maps_stay_in_unit_range() {
        for map in Colormap::ALL {
            let table = ColorTable::new(map);
            for d in [0.0, 0.7, 1.9, 3.3, 5.99, 8.0] {
                let c = table.color_for_depth(d);
                assert!(c.iter().all(|v| (0.0..=1.0).contains(v)), "{:?} at {}", map, d);
            }
        }
    }
}
