//! 計算デバイスの選択
//!
//! WGPU はアダプタが見つからないと初回のテンソル操作で panic する。
//! 起動時に小さな操作を一度試し、失敗したら CPU (NdArray) に切り替える。

use std::panic::{catch_unwind, AssertUnwindSafe};

use burn::backend::Wgpu;
use burn::tensor::Tensor;
use burn_wgpu::WgpuDevice;

use crate::model::DeviceType;

/// `f` が panic せずに戻れば true
pub fn runs_without_panic<F: FnOnce()>(f: F) -> bool {
    catch_unwind(AssertUnwindSafe(f)).is_ok()
}

fn wgpu_available() -> bool {
    runs_without_panic(|| {
        let device = WgpuDevice::default();
        let _ = Tensor::<Wgpu, 1>::zeros([1], &device).into_data();
    })
}

/// 要求されたデバイスが使えなければ CPU にフォールバックする
pub fn resolve_device_type(requested: DeviceType) -> DeviceType {
    resolve_with(requested, wgpu_available)
}

fn resolve_with(requested: DeviceType, gpu_check: impl FnOnce() -> bool) -> DeviceType {
    match requested {
        DeviceType::Cpu => DeviceType::Cpu,
        DeviceType::Wgpu if gpu_check() => DeviceType::Wgpu,
        DeviceType::Wgpu => {
            tracing::warn!("GPU (WGPU) を初期化できませんでした。CPU (NdArray) で続行します（--cpu を指定するとこの確認を省略できます）");
            DeviceType::Cpu
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panicking_closure_is_reported_as_failure() {
        assert!(runs_without_panic(|| {}));
        assert!(!runs_without_panic(|| panic!("No possible adapter available")));
    }

    #[test]
    fn wgpu_falls_back_to_cpu_when_unavailable() {
        assert_eq!(resolve_with(DeviceType::Wgpu, || false), DeviceType::Cpu);
        assert_eq!(resolve_with(DeviceType::Wgpu, || true), DeviceType::Wgpu);
        assert_eq!(
            resolve_with(DeviceType::Wgpu, || runs_without_panic(|| panic!("no adapter"))),
            DeviceType::Cpu
        );
    }

    #[test]
    fn cpu_request_skips_gpu_check() {
        let resolved = resolve_with(DeviceType::Cpu, || panic!("GPU を確認してはいけない"));
        assert_eq!(resolved, DeviceType::Cpu);
    }
}
