//! Integration tests for launch keys and kernel registries

use dropnorm::dtype::DType;
use dropnorm::error::Error;
use dropnorm::fused::{
    FusedKernels, HIDDEN_SIZES, KernelTypes, LaunchKey, MAX_HIDDEN_SIZE, TYPE_COMBINATIONS,
    round_hidden_size, traits_for, type_id,
};
use dropnorm::runtime::cpu::CpuRuntime;
use std::sync::Arc;

#[test]
fn test_every_supported_combination_is_reachable() {
    let registry = CpuRuntime::fwd_registry();
    for types in TYPE_COMBINATIONS {
        for hidden in (8..=MAX_HIDDEN_SIZE).step_by(8) {
            let key = LaunchKey::new(types, round_hidden_size(hidden)).unwrap();
            let launcher = registry
                .lookup(key)
                .unwrap_or_else(|e| panic!("{types} @ {hidden}: {e}"));
            assert_eq!(launcher.traits().hidden_size, round_hidden_size(hidden));
        }
    }
}

#[test]
fn test_registry_matches_variant_table() {
    let registry = CpuRuntime::fwd_registry();
    assert_eq!(registry.len(), TYPE_COMBINATIONS.len() * HIDDEN_SIZES.len());
    for types in TYPE_COMBINATIONS {
        for hidden in HIDDEN_SIZES {
            let key = LaunchKey::new(types, hidden).unwrap();
            let traits = registry.lookup(key).unwrap().traits();
            assert_eq!(traits, traits_for(hidden, types.itype));
        }
    }
}

#[test]
fn test_lookup_is_deterministic() {
    let registry = CpuRuntime::fwd_registry();
    let key = LaunchKey::new(TYPE_COMBINATIONS[2], 1024).unwrap();
    let first = registry.lookup(key).unwrap();
    for _ in 0..8 {
        assert!(Arc::ptr_eq(&first, &registry.lookup(key).unwrap()));
    }
    assert_eq!(registry.len(), TYPE_COMBINATIONS.len() * HIDDEN_SIZES.len());
}

#[test]
fn test_lookup_never_pads_on_its_own() {
    let registry = CpuRuntime::fwd_registry();
    let key = LaunchKey::new(TYPE_COMBINATIONS[0], 1000).unwrap();
    assert!(!registry.contains(key));
    match registry.lookup(key).err() {
        Some(Error::UnsupportedCombination { hidden_size, .. }) => assert_eq!(hidden_size, 1000),
        other => panic!("expected UnsupportedCombination, got {other:?}"),
    }
}

#[test]
fn test_unregistered_type_combination() {
    // f16 weights with bf16 activations were never compiled
    let types = KernelTypes::new(DType::F16, DType::BF16, DType::BF16, DType::BF16, DType::F32);
    let key = LaunchKey::new(types, 1024).unwrap();
    match CpuRuntime::fwd_registry().lookup(key).err() {
        Some(Error::UnsupportedCombination {
            wtype, itype, ctype, ..
        }) => {
            assert_eq!(wtype, DType::F16);
            assert_eq!(itype, DType::BF16);
            assert_eq!(ctype, DType::F32);
        }
        other => panic!("expected UnsupportedCombination, got {other:?}"),
    }
}

#[test]
fn test_integer_types_have_no_tag() {
    for dtype in [DType::I32, DType::I64, DType::U8] {
        assert!(matches!(type_id(dtype), Err(Error::UnsupportedDType { .. })));
    }
    let types = KernelTypes::new(DType::F32, DType::I32, DType::F32, DType::I32, DType::F32);
    assert!(LaunchKey::new(types, 256).is_err());
}

#[test]
fn test_rounding_brackets() {
    let cases = [
        (8, 256),
        (256, 256),
        (257, 512),
        (1536, 1536),
        (1544, 2048),
        (2560, 2560),
        (3072, 3072),
        (3080, 4096),
        (5000, 5120),
        (7000, 7168),
        (8192, 8192),
    ];
    for (hidden, rounded) in cases {
        assert_eq!(round_hidden_size(hidden), rounded, "hidden {hidden}");
    }
}

#[test]
fn test_rounded_sizes_are_registered_sizes() {
    for hidden in (8..=MAX_HIDDEN_SIZE).step_by(8) {
        assert!(HIDDEN_SIZES.contains(&round_hidden_size(hidden)), "hidden {hidden}");
    }
}
