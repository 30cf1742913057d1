// eval/noise.rs — seeded value noise for heightmap synthesis
//
// Pure functions only: no caches, no shared state. Every noise node calls
// `fractal_noise` once per grid cell, so these run on every rayon worker
// at once.

/// Number of fractal octaves summed by `fractal_noise`.
pub const OCTAVES: u32 = 4;

/// Seed step between consecutive octaves.
pub const OCTAVE_SEED_STEP: i32 = 19;

/// Sum of octave weights (1 + 0.5 + 0.25 + 0.125).
pub const OCTAVE_WEIGHT_SUM: f64 = 1.875;

/// Smallest usable feature scale. Anything at or below zero is lifted here.
pub const MIN_SCALE: f64 = 1e-4;

/// Half-width of the continuous coordinate window a grid is mapped onto.
const COORD_SPAN: f64 = 10.0;

// ── Lattice hash ────────────────────────────────────────────────────

/// Integer-mixing lattice hash. Returns a value in `[0, 1)`.
///
/// All arithmetic wraps at 32 bits, so any (x, y, seed) triple is valid.
#[inline]
pub fn hash(x: i32, y: i32, seed: i32) -> f64 {
    let mut h = x
        .wrapping_mul(374_761_393)
        .wrapping_add(y.wrapping_mul(668_265_263))
        .wrapping_add(seed.wrapping_mul(2_147_483_647));
    h = (h ^ (h >> 13)).wrapping_mul(1_274_126_177);
    let mixed = (h ^ (h >> 16)) as u32;
    mixed as f64 / 4_294_967_296.0
}

// ── Value noise ─────────────────────────────────────────────────────

#[inline]
fn ease(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

/// Bilinear value noise over the integer lattice, eased with `3t² − 2t³`.
///
/// Continuous everywhere, zero gradient at lattice points, range `[0, 1)`.
pub fn value_noise(x: f64, y: f64, seed: i32) -> f64 {
    let xf = x.floor();
    let yf = y.floor();
    let xi = xf as i32;
    let yi = yf as i32;
    let tx = x - xf;
    let ty = y - yf;

    let tl = hash(xi, yi, seed);
    let tr = hash(xi.wrapping_add(1), yi, seed);
    let bl = hash(xi, yi.wrapping_add(1), seed);
    let br = hash(xi.wrapping_add(1), yi.wrapping_add(1), seed);

    let u = ease(tx);
    let v = ease(ty);
    let top = tl + (tr - tl) * u;
    let bottom = bl + (br - bl) * u;
    top + (bottom - top) * v
}

// ── Fractal sum ─────────────────────────────────────────────────────

/// Four octaves of `value_noise`, normalized by the fixed octave weight sum.
///
/// `scale` sets the feature size (larger = smoother); values at or below
/// zero are clamped to `MIN_SCALE`. Output lies in `[0, amplitude)` for
/// non-negative amplitudes.
pub fn fractal_noise(x: f64, y: f64, seed: i32, scale: f64, amplitude: f64) -> f64 {
    let mut freq = 1.0 / scale.max(MIN_SCALE);
    let mut amp = amplitude;
    let mut value = 0.0;
    for octave in 0..OCTAVES as i32 {
        let octave_seed = seed.wrapping_add(octave * OCTAVE_SEED_STEP);
        value += value_noise(x * freq, y * freq, octave_seed) * amp;
        freq *= 2.0;
        amp *= 0.5;
    }
    value / OCTAVE_WEIGHT_SUM
}

// ── Node seeding and cell mapping ───────────────────────────────────

/// Polynomial string hash (31-multiplier, wrapping), as in Java's
/// `String.hashCode()` for BMP text.
pub fn string_hash(s: &str) -> i32 {
    let mut hash: i32 = 0;
    for ch in s.encode_utf16() {
        hash = hash.wrapping_mul(31).wrapping_add(ch as i32);
    }
    hash
}

/// Seed used by the noise node `node_id` for an evaluation seeded with `seed`.
#[inline]
pub fn node_seed(seed: i32, node_id: &str) -> i32 {
    seed.wrapping_add(string_hash(node_id))
}

/// Map a grid index onto the centered noise coordinate window.
#[inline]
pub fn cell_coord(index: u32, extent: u32) -> f64 {
    (index as f64 / extent as f64 - 0.5) * COORD_SPAN
}
