//! Descriptor binding aggregation across shader stages.

use std::collections::BTreeMap;

use crate::CompileError;

/// Bitflags naming the pipeline stages a binding is used in.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub struct StageMask(u32);

impl StageMask {
    /// No stages.
    pub const EMPTY: Self = Self(0);
    pub const VERTEX: Self = Self(1);
    pub const TESSELLATION_CONTROL: Self = Self(2);
    pub const TESSELLATION_EVALUATION: Self = Self(4);
    pub const FRAGMENT: Self = Self(8);
    pub const COMPUTE: Self = Self(16);

    /// Returns `true` if `self` contains all flags in `other`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no flags are set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The raw bit pattern.
    pub fn bits(self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for StageMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for StageMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// What a descriptor slot holds.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum DescriptorKind {
    /// Hole in a set's binding vector.
    Unused,
    UniformBuffer,
    StorageBuffer,
    SampledImage,
}

/// One descriptor slot within a set.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DescriptorBinding {
    pub kind: DescriptorKind,
    /// Descriptor count; always 1 for used slots (arrays not supported).
    pub count: u32,
    /// Stages in which the binding is referenced.
    pub stages: StageMask,
}

impl DescriptorBinding {
    /// The hole value used when flattening sparse slots.
    pub const UNUSED: Self = Self {
        kind: DescriptorKind::Unused,
        count: 0,
        stages: StageMask::EMPTY,
    };
}

/// The declared shape of one descriptor set, indexed densely by slot.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DescriptorSetLayout {
    pub bindings: Vec<DescriptorBinding>,
}

/// Per-set, per-slot binding state gathered during compilation.
///
/// Ordered maps keep flattening deterministic.
#[derive(Debug, Default)]
pub(crate) struct BindingTable {
    sets: BTreeMap<u32, BTreeMap<u32, DescriptorBinding>>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a use of `(set, slot)` with the given kind in the given
    /// stages. Stage masks accumulate; a kind disagreement is fatal.
    pub fn register(
        &mut self,
        set: u32,
        slot: u32,
        kind: DescriptorKind,
        stages: StageMask,
    ) -> Result<(), CompileError> {
        let entry = self
            .sets
            .entry(set)
            .or_default()
            .entry(slot)
            .or_insert(DescriptorBinding {
                kind,
                count: 1,
                stages: StageMask::EMPTY,
            });
        if entry.kind != kind {
            return Err(CompileError::DescriptorConflict {
                set,
                slot,
                existing: entry.kind,
                requested: kind,
            });
        }
        entry.stages |= stages;
        Ok(())
    }

    /// Flattens into dense per-set vectors, filling holes with
    /// [`DescriptorBinding::UNUSED`]. Empty when nothing registered.
    pub fn flatten(&self) -> Vec<DescriptorSetLayout> {
        let Some(max_set) = self.sets.keys().next_back().copied() else {
            return Vec::new();
        };
        (0..=max_set)
            .map(|set| {
                let mut layout = DescriptorSetLayout::default();
                if let Some(slots) = self.sets.get(&set) {
                    let max_slot = *slots.keys().next_back().expect("non-empty set map");
                    layout.bindings = (0..=max_slot)
                        .map(|slot| slots.get(&slot).copied().unwrap_or(DescriptorBinding::UNUSED))
                        .collect();
                }
                layout
            })
            .collect()
    }
}
