//! Execution limits.

/// Tunable limits of a single VM instance.
///
/// Defaults are generous; embedders running untrusted-ish scripts lower them
/// via [`crate::context::Context::with_params`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VmParams {
    /// Maximum simultaneous call frames, boundary and native pseudo-frames
    /// included.
    pub max_call_depth: usize,
    /// Maximum value slots on the register stack.
    pub max_stack_slots: usize,
}

impl Default for VmParams {
    fn default() -> Self {
        Self {
            max_call_depth: 4096,
            max_stack_slots: 1 << 20,
        }
    }
}
