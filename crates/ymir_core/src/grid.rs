//! # Hex Grid Geometry
//!
//! The map is an odd-q offset hex grid on a cylinder: columns wrap
//! east-west, rows stop at the poles. Odd columns sit half a row lower than
//! even ones; the neighbor tables below encode that stagger.
//!
//! Everything here is pure geometry. Ops that need per-tile state layer it
//! over these index helpers.

use ymir_adapter::MapDimensions;

/// `sqrt(3)`, the center-to-center column spacing in pixel space.
pub const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// Neighbor offsets for tiles in even columns.
const EVEN_COL: [(i32, i32); 6] = [(-1, 0), (1, 0), (0, -1), (0, 1), (-1, -1), (1, -1)];

/// Neighbor offsets for tiles in odd columns.
const ODD_COL: [(i32, i32); 6] = [(-1, 0), (1, 0), (0, -1), (0, 1), (-1, 1), (1, 1)];

/// An odd-q hex grid with cylindrical east-west wrap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HexGrid {
    /// Columns.
    pub width: u32,
    /// Rows.
    pub height: u32,
}

impl HexGrid {
    /// Builds a grid.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Builds a grid from map dimensions.
    #[must_use]
    pub const fn from_dims(dims: MapDimensions) -> Self {
        Self { width: dims.width, height: dims.height }
    }

    /// Total tile count.
    #[must_use]
    pub const fn len(self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// True for degenerate zero-area grids.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Row-major index of an in-bounds tile.
    #[must_use]
    pub fn index(self, x: i32, y: i32) -> usize {
        debug_assert!(
            x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height,
            "tile ({x}, {y}) out of bounds"
        );
        (y as usize) * (self.width as usize) + (x as usize)
    }

    /// Coordinates of a row-major index.
    #[must_use]
    pub const fn coords(self, index: usize) -> (i32, i32) {
        let w = self.width as usize;
        ((index % w) as i32, (index / w) as i32)
    }

    /// Wraps a column index around the cylinder seam.
    #[must_use]
    pub fn wrap_x(self, x: i32) -> i32 {
        x.rem_euclid(self.width as i32)
    }

    /// True when the row exists (rows do not wrap).
    #[must_use]
    pub const fn in_rows(self, y: i32) -> bool {
        y >= 0 && y < self.height as i32
    }

    /// The up-to-six hex neighbors of a tile. Columns wrap around the seam;
    /// rows past the poles are dropped.
    pub fn neighbors(self, x: i32, y: i32) -> impl Iterator<Item = (i32, i32)> {
        let table: &'static [(i32, i32); 6] =
            if x.rem_euclid(2) == 1 { &ODD_COL } else { &EVEN_COL };
        table.iter().filter_map(move |&(dx, dy)| {
            let ny = y + dy;
            self.in_rows(ny).then(|| (self.wrap_x(x + dx), ny))
        })
    }

    /// Center of a tile in pixel space. Odd columns sit half a row lower.
    #[must_use]
    pub fn pixel(self, x: i32, y: i32) -> (f64, f64) {
        let px = f64::from(x) * SQRT_3;
        let py = f64::from(y) * 1.5 + if x.rem_euclid(2) == 1 { 0.75 } else { 0.0 };
        (px, py)
    }

    /// Pixel-space circumference of the cylinder.
    #[must_use]
    pub fn pixel_width(self) -> f64 {
        f64::from(self.width) * SQRT_3
    }

    /// Squared pixel distance between two points, measured the short way
    /// around the seam.
    #[must_use]
    pub fn wrapped_distance2(self, a: (f64, f64), b: (f64, f64)) -> f64 {
        let mut dx = (a.0 - b.0).abs();
        let circumference = self.pixel_width();
        if dx > circumference * 0.5 {
            dx = circumference - dx;
        }
        let dy = a.1 - b.1;
        dx * dx + dy * dy
    }

    /// Multi-source BFS distance in hex steps. `u32::MAX` marks tiles no
    /// source reaches (or everything, when `sources` is empty).
    #[must_use]
    pub fn distance_field(self, sources: impl Iterator<Item = usize>) -> Vec<u32> {
        let mut dist = vec![u32::MAX; self.len()];
        let mut queue = std::collections::VecDeque::new();
        for source in sources {
            if dist[source] == u32::MAX {
                dist[source] = 0;
                queue.push_back(source);
            }
        }
        while let Some(index) = queue.pop_front() {
            let (x, y) = self.coords(index);
            for (nx, ny) in self.neighbors(x, y) {
                let neighbor = self.index(nx, ny);
                if dist[neighbor] == u32::MAX {
                    dist[neighbor] = dist[index] + 1;
                    queue.push_back(neighbor);
                }
            }
        }
        dist
    }

    /// Signed east-west pixel delta from `from` to `to`, the short way
    /// around the seam.
    #[must_use]
    pub fn wrapped_dx(self, from_px: f64, to_px: f64) -> f64 {
        let circumference = self.pixel_width();
        let mut dx = to_px - from_px;
        if dx > circumference * 0.5 {
            dx -= circumference;
        } else if dx < -circumference * 0.5 {
            dx += circumference;
        }
        dx
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn even_and_odd_columns_stagger_differently() {
        let grid = HexGrid::new(8, 8);
        let even: HashSet<(i32, i32)> = grid.neighbors(2, 3).collect();
        let odd: HashSet<(i32, i32)> = grid.neighbors(3, 3).collect();
        assert_eq!(
            even,
            HashSet::from([(1, 3), (3, 3), (2, 2), (2, 4), (1, 2), (3, 2)])
        );
        assert_eq!(
            odd,
            HashSet::from([(2, 3), (4, 3), (3, 2), (3, 4), (2, 4), (4, 4)])
        );
    }

    #[test]
    fn columns_wrap_around_the_seam() {
        let grid = HexGrid::new(8, 8);
        let neighbors: HashSet<(i32, i32)> = grid.neighbors(0, 3).collect();
        assert!(neighbors.contains(&(7, 3)));
        assert!(neighbors.contains(&(1, 3)));
    }

    #[test]
    fn polar_rows_are_dropped_not_clamped() {
        let grid = HexGrid::new(8, 8);
        let top: Vec<(i32, i32)> = grid.neighbors(2, 0).collect();
        assert_eq!(top.len(), 4);
        assert!(top.iter().all(|&(_, y)| y >= 0));
        let bottom: Vec<(i32, i32)> = grid.neighbors(2, 7).collect();
        assert_eq!(bottom.len(), 4);
        assert!(bottom.iter().all(|&(_, y)| y <= 7));
    }

    #[test]
    fn odd_columns_sit_half_a_row_lower() {
        let grid = HexGrid::new(8, 8);
        assert_eq!(grid.pixel(2, 1).1, 1.5);
        assert_eq!(grid.pixel(3, 1).1, 2.25);
    }

    #[test]
    fn wrapped_distance_takes_the_short_way() {
        let grid = HexGrid::new(10, 10);
        let a = grid.pixel(0, 5);
        let b = grid.pixel(9, 5);
        // One column apart across the seam, not nine.
        let direct = grid.wrapped_distance2(a, b).sqrt();
        assert!((direct - SQRT_3).abs() < 1e-9);
    }

    #[test]
    fn distance_field_spreads_from_all_sources() {
        let grid = HexGrid::new(8, 8);
        let dist = grid.distance_field([grid.index(0, 0), grid.index(4, 4)].into_iter());
        assert_eq!(dist[grid.index(0, 0)], 0);
        assert_eq!(dist[grid.index(4, 4)], 0);
        assert_eq!(dist[grid.index(4, 3)], 1);
        assert!(dist.iter().all(|&d| d != u32::MAX));

        let empty = grid.distance_field(std::iter::empty());
        assert!(empty.iter().all(|&d| d == u32::MAX));
    }
}
