//! Allocation failures inside the fused forward pass

mod common;

use common::values;
use dropnorm::error::{Error, Result};
use dropnorm::fused::{
    FwdInputs, FwdLauncher, FwdOptions, KernelRegistry, KernelTraits, LaunchParams, LaunchPlan,
    Variant, build_registry, dropout_add_ln_fwd_with,
};
use dropnorm::generator::Generator;
use dropnorm::runtime::cpu::{CpuDevice, CpuRuntime};
use dropnorm::runtime::{DeviceProperties, Runtime, RuntimeClient};
use dropnorm::tensor::Tensor;
use std::cell::Cell;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

thread_local! {
    static ALLOCATIONS_LEFT: Cell<usize> = const { Cell::new(usize::MAX) };
}

/// Host memory with a per-thread cap on the number of allocations
#[derive(Clone, Debug, Default)]
struct Budgeted;

#[derive(Clone, Debug)]
struct BudgetedClient {
    device: CpuDevice,
    props: DeviceProperties,
}

impl RuntimeClient<Budgeted> for BudgetedClient {
    fn device(&self) -> &CpuDevice {
        &self.device
    }

    fn synchronize(&self) -> Result<()> {
        Ok(())
    }

    fn device_properties(&self) -> &DeviceProperties {
        &self.props
    }
}

impl Runtime for Budgeted {
    type Device = CpuDevice;
    type Client = BudgetedClient;

    fn name() -> &'static str {
        "budgeted"
    }

    fn allocate(size_bytes: usize, device: &CpuDevice) -> Result<u64> {
        if size_bytes > 0 {
            let left = ALLOCATIONS_LEFT.with(Cell::get);
            if left == 0 {
                return Err(Error::OutOfMemory { size: size_bytes });
            }
            ALLOCATIONS_LEFT.with(|c| c.set(left - 1));
        }
        CpuRuntime::allocate(size_bytes, device)
    }

    fn deallocate(ptr: u64, size_bytes: usize, device: &CpuDevice) {
        CpuRuntime::deallocate(ptr, size_bytes, device)
    }

    fn copy_to_device(src: &[u8], dst: u64, device: &CpuDevice) -> Result<()> {
        CpuRuntime::copy_to_device(src, dst, device)
    }

    fn copy_from_device(src: u64, dst: &mut [u8], device: &CpuDevice) -> Result<()> {
        CpuRuntime::copy_from_device(src, dst, device)
    }

    fn current_device() -> Option<CpuDevice> {
        CpuRuntime::current_device()
    }

    fn set_current_device(device: &CpuDevice) -> Result<()> {
        CpuRuntime::set_current_device(device)
    }

    fn default_device() -> CpuDevice {
        CpuDevice::new()
    }

    fn default_client(device: &CpuDevice) -> BudgetedClient {
        BudgetedClient {
            device: device.clone(),
            props: DeviceProperties {
                multiprocessor_count: 108,
                max_threads_per_multiprocessor: 2048,
                max_blocks_per_multiprocessor: 32,
                shared_memory_per_multiprocessor: 167_936,
                warp_size: 32,
            },
        }
    }
}

/// Sizes like a real variant and counts both phases, but never runs a kernel
struct Counting {
    traits: KernelTraits,
    configured: Arc<AtomicUsize>,
    launched: Arc<AtomicUsize>,
}

impl FwdLauncher<Budgeted> for Counting {
    fn traits(&self) -> KernelTraits {
        self.traits
    }

    fn configure(&self, launch: &LaunchParams<'_, Budgeted>) -> Result<LaunchPlan> {
        self.configured.fetch_add(1, Ordering::SeqCst);
        self.traits.plan(launch)
    }

    unsafe fn launch(&self, _launch: &LaunchParams<'_, Budgeted>, _plan: &LaunchPlan) -> Result<()> {
        self.launched.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Harness {
    registry: KernelRegistry<Budgeted>,
    configured: Arc<AtomicUsize>,
    launched: Arc<AtomicUsize>,
}

fn harness() -> Harness {
    let configured = Arc::new(AtomicUsize::new(0));
    let launched = Arc::new(AtomicUsize::new(0));
    let registry = build_registry(|variant: Variant| -> Arc<dyn FwdLauncher<Budgeted>> {
        Arc::new(Counting {
            traits: variant.traits,
            configured: configured.clone(),
            launched: launched.clone(),
        })
    });
    Harness {
        registry,
        configured,
        launched,
    }
}

fn f32s(shape: &[usize], seed: u32) -> Tensor<Budgeted> {
    let len = shape.iter().product();
    Tensor::from_slice(&values(len, seed), shape, &CpuDevice::new()).unwrap()
}

/// Run one dropout forward pass allowed `allocations` more device allocations
fn run_with_budget(h: &Harness, cols: usize, allocations: usize, generator: &Generator) -> Result<()> {
    let x0 = f32s(&[3, cols], 1);
    let gamma = f32s(&[cols], 2);
    let client = Budgeted::default_client(&CpuDevice::new());

    ALLOCATIONS_LEFT.with(|c| c.set(allocations));
    let result = dropout_add_ln_fwd_with(
        &h.registry,
        &client,
        FwdInputs::new(&x0, &gamma),
        &FwdOptions::default().with_dropout(0.1),
        Some(generator),
    );
    ALLOCATIONS_LEFT.with(|c| c.set(usize::MAX));
    result.map(drop)
}

#[test]
fn test_output_allocation_failure_stops_before_sizing() {
    let h = harness();
    let generator = Generator::new(9);

    let err = run_with_budget(&h, 1024, 0, &generator).unwrap_err();

    assert!(matches!(err, Error::OutOfMemory { .. }));
    assert_eq!(h.configured.load(Ordering::SeqCst), 0);
    assert_eq!(h.launched.load(Ordering::SeqCst), 0);
    assert_eq!(generator.offset(), 0);
}

#[test]
fn test_scratch_allocation_failure_leaves_generator_untouched() {
    let h = harness();
    let generator = Generator::new(9);

    // x, dmask, z, mu and rsigma fit; the cooperative barrier does not.
    let err = run_with_budget(&h, 8192, 5, &generator).unwrap_err();

    assert!(matches!(err, Error::OutOfMemory { .. }));
    assert_eq!(h.configured.load(Ordering::SeqCst), 1);
    assert_eq!(h.launched.load(Ordering::SeqCst), 0);
    assert_eq!(generator.offset(), 0);
}

#[test]
fn test_budget_large_enough_launches_once() {
    let h = harness();
    let generator = Generator::new(9);

    run_with_budget(&h, 8192, 7, &generator).unwrap();

    assert_eq!(h.configured.load(Ordering::SeqCst), 1);
    assert_eq!(h.launched.load(Ordering::SeqCst), 1);
    assert!(generator.offset() > 0);
}
