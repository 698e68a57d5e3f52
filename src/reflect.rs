//! Reflection data returned alongside a recompiled module (`spec.md` §6):
//! the UAV counter bindings a D3D12 host needs to bind its counter buffers
//! at draw/dispatch time, which the DXBC bytecode itself never names
//! explicitly (`spec.md` §4.D).
use crate::compiler::Recompiler;

pub use crate::compiler::CounterBinding;

/// Everything a host needs after recompiling one shader that the assembled
/// SPIR-V words alone don't carry.
#[derive(Clone, Debug, Default)]
pub struct ReflectionOutput {
    pub counter_bindings: Vec<CounterBinding>,
}

impl<'a> Recompiler<'a> {
    pub fn reflection(&self) -> ReflectionOutput {
        ReflectionOutput { counter_bindings: self.counter_bindings.clone() }
    }
}
