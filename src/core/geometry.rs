use serde::Serialize;

use super::types::Region;

/// Closed ring of `[lon, lat]` pairs, first point repeated at the end.
pub type Polygon = Vec<[f64; 2]>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

/// Source of real region outlines. Implementations return `None` when they
/// have nothing for a region and the caller moves on to the next source.
pub trait PolygonSource {
    fn fetch_polygon(&self, region: &Region) -> Option<Polygon>;
}

/// Rectangular placeholder cells laid out around Sydney.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub lat0: f64,
    pub lon0: f64,
    pub dlat: f64,
    pub dlon: f64,
}

impl GridLayout {
    pub fn reference() -> Self {
        Self {
            lat0: -33.98,
            lon0: 151.00,
            dlat: 0.055,
            dlon: 0.065,
        }
    }

    fn bounds(&self, region: &Region) -> (f64, f64, f64, f64) {
        let lat_min = self.lat0 + region.row as f64 * self.dlat;
        let lat_max = self.lat0 + (region.row + 1) as f64 * self.dlat;
        let lon_min = self.lon0 + region.col as f64 * self.dlon;
        let lon_max = self.lon0 + (region.col + 1) as f64 * self.dlon;
        (lat_min, lat_max, lon_min, lon_max)
    }

    pub fn polygon(&self, region: &Region) -> Polygon {
        let (lat_min, lat_max, lon_min, lon_max) = self.bounds(region);
        vec![
            [lon_min, lat_min],
            [lon_max, lat_min],
            [lon_max, lat_max],
            [lon_min, lat_max],
            [lon_min, lat_min],
        ]
    }

    pub fn center(&self, region: &Region) -> LatLon {
        let (lat_min, lat_max, lon_min, lon_max) = self.bounds(region);
        LatLon {
            lat: (lat_min + lat_max) / 2.0,
            lon: (lon_min + lon_max) / 2.0,
        }
    }

    /// Map centre used to frame the whole region set.
    pub fn centroid(&self, regions: &[Region]) -> Option<LatLon> {
        if regions.is_empty() {
            return None;
        }
        let n = regions.len() as f64;
        let (lat, lon) = regions.iter().fold((0.0, 0.0), |(lat, lon), region| {
            let c = self.center(region);
            (lat + c.lat, lon + c.lon)
        });
        Some(LatLon {
            lat: lat / n,
            lon: lon / n,
        })
    }
}

impl PolygonSource for GridLayout {
    fn fetch_polygon(&self, region: &Region) -> Option<Polygon> {
        Some(self.polygon(region))
    }
}

/// First polygon any source provides, else the grid cell.
pub fn resolve_polygon(
    sources: &[&dyn PolygonSource],
    fallback: &GridLayout,
    region: &Region,
) -> Polygon {
    sources
        .iter()
        .find_map(|source| source.fetch_polygon(region))
        .unwrap_or_else(|| fallback.polygon(region))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(row: u32, col: u32) -> Region {
        Region {
            code: format!("SA2_{:02}", row * 4 + col + 1),
            row,
            col,
        }
    }

    struct Unavailable;

    impl PolygonSource for Unavailable {
        fn fetch_polygon(&self, _region: &Region) -> Option<Polygon> {
            None
        }
    }

    struct OnlyFirst;

    impl PolygonSource for OnlyFirst {
        fn fetch_polygon(&self, region: &Region) -> Option<Polygon> {
            (region.code == "SA2_01").then(|| vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [0.0, 0.0]])
        }
    }

    #[test]
    fn grid_polygon_is_closed_rectangle() {
        let grid = GridLayout::reference();
        let poly = grid.polygon(&region(1, 2));
        assert_eq!(poly.len(), 5);
        assert_eq!(poly.first(), poly.last());
        assert!((poly[0][0] - (151.00 + 2.0 * 0.065)).abs() < 1e-12);
        assert!((poly[0][1] - (-33.98 + 0.055)).abs() < 1e-12);
    }

    #[test]
    fn grid_center_is_cell_midpoint() {
        let grid = GridLayout::reference();
        let c = grid.center(&region(0, 0));
        assert!((c.lat - (-33.98 + 0.0275)).abs() < 1e-12);
        assert!((c.lon - (151.00 + 0.0325)).abs() < 1e-12);
    }

    #[test]
    fn centroid_of_full_grid_is_grid_middle() {
        let grid = GridLayout::reference();
        let regions: Vec<_> = (0..3).flat_map(|r| (0..4).map(move |c| region(r, c))).collect();
        let c = grid.centroid(&regions).expect("non-empty");
        assert!((c.lat - (-33.98 + 1.5 * 0.055)).abs() < 1e-9);
        assert!((c.lon - (151.00 + 2.0 * 0.065)).abs() < 1e-9);
        assert!(grid.centroid(&[]).is_none());
    }

    #[test]
    fn resolve_falls_back_through_sources_to_grid() {
        let grid = GridLayout::reference();
        let sources: [&dyn PolygonSource; 2] = [&Unavailable, &OnlyFirst];

        let first = resolve_polygon(&sources, &grid, &region(0, 0));
        assert_eq!(first.len(), 4);

        let second = resolve_polygon(&sources, &grid, &region(0, 1));
        assert_eq!(second, grid.polygon(&region(0, 1)));

        assert_eq!(resolve_polygon(&[], &grid, &region(2, 3)), grid.polygon(&region(2, 3)));
    }
}
