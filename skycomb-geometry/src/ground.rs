//! The ground source external interface (spec.md §6): a DEM grid and an
//! optional DSM grid, both queried by nearest-cell lookup. The concrete
//! grid loader is out of scope (spec §1 Non-goals); callers supply any
//! implementation of this trait.

/// Bare-earth / surface-top elevation grids, queried at a world location.
pub trait GroundSource {
    /// Bare-earth elevation, meters, or `None` if the point falls outside
    /// the loaded grid (spec §4.6, recoverable `GroundLookupOutOfGrid`).
    fn elevation_dem(&self, northing_m: f64, easting_m: f64) -> Option<f64>;

    /// Surface-top (first-return) elevation, meters. Default
    /// implementation reports no DSM coverage; implementors with a real
    /// DSM grid should override this.
    fn elevation_dsm(&self, _northing_m: f64, _easting_m: f64) -> Option<f64> {
        None
    }
}

/// A trivial in-memory ground source for tests: constant DEM/DSM, or a
/// caller-supplied closure-free lookup table.
#[derive(Debug, Clone)]
pub struct ConstantGround {
    pub dem_m: Option<f64>,
    pub dsm_m: Option<f64>,
}

impl GroundSource for ConstantGround {
    fn elevation_dem(&self, _n: f64, _e: f64) -> Option<f64> {
        self.dem_m
    }

    fn elevation_dsm(&self, _n: f64, _e: f64) -> Option<f64> {
        self.dsm_m
    }
}

/// A DEM/DSM grid resolved to scattered elevation samples, queried by
/// nearest-neighbor (spec §4.6). Parsing the on-disk grid format is the
/// caller's concern (spec §1 Non-goals exclude a concrete raster loader);
/// this just holds already-resolved `(northing_m, easting_m, elevation_m)`
/// points and answers lookups against them.
#[derive(Debug, Clone, Default)]
pub struct GridGround {
    dem_points: Vec<(f64, f64, f64)>,
    dsm_points: Vec<(f64, f64, f64)>,
}

impl GridGround {
    pub fn new(dem_points: Vec<(f64, f64, f64)>, dsm_points: Vec<(f64, f64, f64)>) -> Self {
        GridGround { dem_points, dsm_points }
    }

    fn nearest(points: &[(f64, f64, f64)], n: f64, e: f64) -> Option<f64> {
        points
            .iter()
            .map(|&(pn, pe, pz)| {
                let dn = pn - n;
                let de = pe - e;
                (dn * dn + de * de, pz)
            })
            .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap())
            .map(|(_, z)| z)
    }
}

impl GroundSource for GridGround {
    fn elevation_dem(&self, n: f64, e: f64) -> Option<f64> {
        Self::nearest(&self.dem_points, n, e)
    }

    fn elevation_dsm(&self, n: f64, e: f64) -> Option<f64> {
        Self::nearest(&self.dsm_points, n, e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_ground_answers_with_the_nearest_sample() {
        let grid = GridGround::new(vec![(0.0, 0.0, 10.0), (100.0, 0.0, 20.0)], vec![]);
        assert_eq!(grid.elevation_dem(2.0, 1.0), Some(10.0));
        assert_eq!(grid.elevation_dem(98.0, 0.0), Some(20.0));
        assert_eq!(grid.elevation_dsm(0.0, 0.0), None);
    }
}
