//! Philox4x32-10 counter-based PRNG
//!
//! 10-round Feistel cipher from Salmon et al. "Parallel Random Numbers: As Easy as 1, 2, 3" (2011)

const PHILOX_M4X32_0: u32 = 0xD2511F53;
const PHILOX_M4X32_1: u32 = 0xCD9E8D57;
const PHILOX_W32_0: u32 = 0x9E3779B9;
const PHILOX_W32_1: u32 = 0xBB67AE85;

/// Philox4x32 round function
#[inline(always)]
fn philox_round(ctr: [u32; 4], key: [u32; 2]) -> [u32; 4] {
    let prod0 = (ctr[0] as u64).wrapping_mul(PHILOX_M4X32_0 as u64);
    let prod1 = (ctr[2] as u64).wrapping_mul(PHILOX_M4X32_1 as u64);

    [
        ((prod1 >> 32) as u32) ^ ctr[1] ^ key[0],
        prod1 as u32,
        ((prod0 >> 32) as u32) ^ ctr[3] ^ key[1],
        prod0 as u32,
    ]
}

/// Philox4x32-10: 10-round Feistel cipher
#[inline(always)]
pub fn philox4x32_10(ctr: [u32; 4], key: [u32; 2]) -> [u32; 4] {
    let mut c = ctr;
    let mut k = key;

    for _ in 0..10 {
        c = philox_round(c, k);
        k[0] = k[0].wrapping_add(PHILOX_W32_0);
        k[1] = k[1].wrapping_add(PHILOX_W32_1);
    }

    c
}

/// Convert u32 to uniform float in (0, 1]
///
/// Zero is excluded so that `u < keep_p` never keeps an element when `keep_p` is 0.
#[inline(always)]
pub fn u32_to_uniform(u: u32) -> f32 {
    // Top 24 bits fit an f32 mantissa exactly
    ((u >> 8) + 1) as f32 / (1u32 << 24) as f32
}

/// Four uniform draws for `subsequence` of the stream keyed by `seed` at `offset`
///
/// The subsequence selects the low counter words and the offset (in units of
/// four draws) the high words, so distinct elements never share a block and a
/// given `(seed, offset, subsequence)` always yields the same values.
#[inline]
pub fn uniform4(seed: u64, offset: u64, subsequence: u64) -> [f32; 4] {
    let key = [seed as u32, (seed >> 32) as u32];
    let block = offset / 4;
    let ctr = [
        subsequence as u32,
        (subsequence >> 32) as u32,
        block as u32,
        (block >> 32) as u32,
    ];
    philox4x32_10(ctr, key).map(u32_to_uniform)
}
