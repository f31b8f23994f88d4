//! Common test utilities
#![allow(dead_code)]

use dropnorm::dtype::{DType, Element};
use dropnorm::runtime::Runtime;
use dropnorm::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};
use dropnorm::tensor::Tensor;
#[cfg(feature = "cuda")]
use dropnorm::runtime::cuda::{CudaClient, CudaDevice, CudaRuntime};

/// Create a CPU client and device for testing
pub fn create_cpu_client() -> (CpuClient, CpuDevice) {
    let device = CpuDevice::new();
    let client = CpuRuntime::default_client(&device);
    (client, device)
}

/// Create a CUDA client and device, returning None if CUDA is unavailable
#[cfg(feature = "cuda")]
pub fn create_cuda_client() -> Option<(CudaClient, CudaDevice)> {
    if !dropnorm::runtime::cuda::is_cuda_available() {
        return None;
    }
    let device = CudaDevice::new(0);
    let client = CudaRuntime::default_client(&device);
    Some((client, device))
}

/// Deterministic pseudo-random values in [-1, 1)
pub fn values(len: usize, seed: u32) -> Vec<f32> {
    let mut state = seed.wrapping_mul(0x9E37_79B9).wrapping_add(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 8) as f32 / (1u32 << 23) as f32 - 1.0
        })
        .collect()
}

/// Host tensor holding `data` converted to `dtype`
pub fn tensor(data: &[f32], shape: &[usize], dtype: DType, device: &CpuDevice) -> Tensor<CpuRuntime> {
    fn typed<T: Element>(data: &[f32], shape: &[usize], device: &CpuDevice) -> Tensor<CpuRuntime> {
        let converted: Vec<T> = data.iter().map(|&v| T::from_f32(v)).collect();
        Tensor::from_slice(&converted, shape, device).unwrap()
    }
    match dtype {
        DType::F32 => typed::<f32>(data, shape, device),
        DType::F16 => typed::<half::f16>(data, shape, device),
        DType::BF16 => typed::<half::bf16>(data, shape, device),
        other => panic!("no float conversion for {other}"),
    }
}

/// Read any float tensor back as f32
pub fn read_f32(t: &Tensor<CpuRuntime>) -> Vec<f32> {
    match t.dtype() {
        DType::F32 => t.to_vec::<f32>().unwrap(),
        DType::F16 => t.to_vec::<half::f16>().unwrap().iter().map(|v| v.to_f32()).collect(),
        DType::BF16 => t.to_vec::<half::bf16>().unwrap().iter().map(|v| v.to_f32()).collect(),
        other => panic!("not a float tensor: {other}"),
    }
}

/// Round every value through `dtype`, the way storing it in a tensor would
pub fn quantize(data: &[f32], dtype: DType) -> Vec<f32> {
    match dtype {
        DType::F32 => data.to_vec(),
        DType::F16 => data.iter().map(|&v| half::f16::from_f32(v).to_f32()).collect(),
        DType::BF16 => data.iter().map(|&v| half::bf16::from_f32(v).to_f32()).collect(),
        other => panic!("not a float dtype: {other}"),
    }
}

/// Per-row normalization computed in f64
pub struct Reference {
    pub z: Vec<f32>,
    pub mu: Vec<f32>,
    pub rsigma: Vec<f32>,
}

/// Naive LayerNorm (or RMSNorm) of a row-major `[rows, cols]` matrix
pub fn reference_norm(
    x: &[f32],
    cols: usize,
    gamma: &[f32],
    beta: Option<&[f32]>,
    epsilon: f32,
    rms: bool,
) -> Reference {
    let rows = x.len() / cols;
    let mut out = Reference {
        z: Vec::with_capacity(x.len()),
        mu: Vec::with_capacity(rows),
        rsigma: Vec::with_capacity(rows),
    };
    for row in x.chunks(cols) {
        let n = cols as f64;
        let mean = row.iter().map(|&v| v as f64).sum::<f64>() / n;
        let center = if rms { 0.0 } else { mean };
        let var = row.iter().map(|&v| (v as f64 - center).powi(2)).sum::<f64>() / n;
        let rs = 1.0 / (var + epsilon as f64).sqrt();
        out.mu.push(center as f32);
        out.rsigma.push(rs as f32);
        for (c, &v) in row.iter().enumerate() {
            let b = beta.map_or(0.0, |b| b[c] as f64);
            out.z.push((gamma[c] as f64 * (v as f64 - center) * rs + b) as f32);
        }
    }
    out
}

/// Assert two f32 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f32(a: &[f32], b: &[f32], rtol: f32, atol: f32, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Tolerance for comparing a stored value of `dtype` against an f32 reference
pub fn tolerance(dtype: DType) -> (f32, f32) {
    match dtype {
        DType::F32 => (1e-4, 1e-4),
        DType::F16 => (1e-2, 1e-2),
        _ => (2e-2, 3e-2),
    }
}
