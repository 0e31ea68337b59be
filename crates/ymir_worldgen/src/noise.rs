//! # Cylindrical Simplex Noise
//!
//! 2D simplex noise plus a wrapper that makes the field periodic in x, so
//! terrain reads seamlessly across the east-west map seam. Values are
//! deterministic per `(seed, label)`; independent consumers never share a
//! permutation layout.

use rand::seq::SliceRandom;
use ymir_core::rng::WorldSeed;

const F2: f64 = 0.366_025_403_784_439;
const G2: f64 = 0.211_324_865_405_187;

const GRADIENTS: [[f64; 2]; 8] = [
    [1.0, 0.0],
    [-1.0, 0.0],
    [0.0, 1.0],
    [0.0, -1.0],
    [1.0, 1.0],
    [-1.0, 1.0],
    [1.0, -1.0],
    [-1.0, -1.0],
];

/// Seeded 2D simplex noise, values in `[-1, 1]`.
pub struct SimplexNoise {
    perm: [u8; 512],
}

impl SimplexNoise {
    /// Builds a generator whose permutation table is shuffled by the
    /// `(seed, label)` stream.
    #[must_use]
    pub fn new(seed: WorldSeed, label: &str) -> Self {
        let mut table: [u8; 256] = core::array::from_fn(|i| i as u8);
        table.shuffle(&mut seed.rng(label));
        let mut perm = [0_u8; 512];
        for (i, &v) in table.iter().enumerate() {
            perm[i] = v;
            perm[i + 256] = v;
        }
        Self { perm }
    }

    fn hash(&self, index: usize) -> u8 {
        self.perm[index & 511]
    }

    fn corner(&self, x: f64, y: f64, hash: u8) -> f64 {
        let t = 0.5 - x * x - y * y;
        if t < 0.0 {
            return 0.0;
        }
        let g = GRADIENTS[usize::from(hash & 7)];
        let t2 = t * t;
        t2 * t2 * (x * g[0] + y * g[1])
    }

    /// Samples the field at a point.
    #[must_use]
    pub fn at(&self, x: f64, y: f64) -> f64 {
        let skew = (x + y) * F2;
        let i = floor_i32(x + skew);
        let j = floor_i32(y + skew);
        let unskew = f64::from(i + j) * G2;
        let x0 = x - (f64::from(i) - unskew);
        let y0 = y - (f64::from(j) - unskew);
        // Which half of the skewed square the point landed in.
        let (i1, j1) = if x0 > y0 { (1, 0) } else { (0, 1) };
        let x1 = x0 - f64::from(i1) + G2;
        let y1 = y0 - f64::from(j1) + G2;
        let x2 = x0 - 1.0 + 2.0 * G2;
        let y2 = y0 - 1.0 + 2.0 * G2;
        let ii = (i & 255) as usize;
        let jj = (j & 255) as usize;
        let g0 = self.hash(ii + usize::from(self.hash(jj)));
        let g1 = self.hash(ii + i1 as usize + usize::from(self.hash(jj + j1 as usize)));
        let g2 = self.hash(ii + 1 + usize::from(self.hash(jj + 1)));
        // 70 rescales the corner sum to roughly [-1, 1].
        70.0 * (self.corner(x0, y0, g0) + self.corner(x1, y1, g1) + self.corner(x2, y2, g2))
    }

    /// Fractal sum of `octaves` layers, normalized to roughly `[-1, 1]`.
    #[must_use]
    pub fn fbm(&self, x: f64, y: f64, octaves: u32, persistence: f64, lacunarity: f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut span = 0.0;
        for _ in 0..octaves {
            total += self.at(x * frequency, y * frequency) * amplitude;
            span += amplitude;
            amplitude *= persistence;
            frequency *= lacunarity;
        }
        if span > 0.0 {
            total / span
        } else {
            0.0
        }
    }

    /// Ridged fractal in `[0, 1]`-ish, sharp along zero crossings.
    #[must_use]
    pub fn ridged(&self, x: f64, y: f64, octaves: u32, persistence: f64, lacunarity: f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut span = 0.0;
        for _ in 0..octaves {
            let ridge = 1.0 - self.at(x * frequency, y * frequency).abs();
            total += ridge * ridge * amplitude;
            span += amplitude;
            amplitude *= persistence;
            frequency *= lacunarity;
        }
        if span > 0.0 {
            total / span
        } else {
            0.0
        }
    }
}

/// East-west periodic noise field over the map cylinder.
///
/// Blends a sample with its one-period-west twin so the field meets itself
/// exactly at the seam.
pub struct CylinderNoise {
    noise: SimplexNoise,
    period: f64,
}

impl CylinderNoise {
    /// Builds a field with the given x period (sample-space units).
    #[must_use]
    pub fn new(seed: WorldSeed, label: &str, period: f64) -> Self {
        Self { noise: SimplexNoise::new(seed, label), period }
    }

    /// Seamless octaved sample.
    #[must_use]
    pub fn fbm(&self, x: f64, y: f64, octaves: u32, persistence: f64, lacunarity: f64) -> f64 {
        let x = x.rem_euclid(self.period);
        let t = x / self.period;
        let here = self.noise.fbm(x, y, octaves, persistence, lacunarity);
        let west = self.noise.fbm(x - self.period, y, octaves, persistence, lacunarity);
        here * (1.0 - t) + west * t
    }

    /// Seamless ridged sample.
    #[must_use]
    pub fn ridged(&self, x: f64, y: f64, octaves: u32, persistence: f64, lacunarity: f64) -> f64 {
        let x = x.rem_euclid(self.period);
        let t = x / self.period;
        let here = self.noise.ridged(x, y, octaves, persistence, lacunarity);
        let west = self.noise.ridged(x - self.period, y, octaves, persistence, lacunarity);
        here * (1.0 - t) + west * t
    }
}

fn floor_i32(x: f64) -> i32 {
    let xi = x as i32;
    if x < f64::from(xi) {
        xi - 1
    } else {
        xi
    }
}
