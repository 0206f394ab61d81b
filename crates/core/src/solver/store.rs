//! Multi-generation field storage
//!
//! Every simulated field keeps a small set of same-shaped buffers
//! ("generations"). Stages address them through [`Slot`] roles rather than
//! fixed buffers so results can be installed with an O(1) role swap. The store
//! tracks which buffers hold data written this session and refuses any kernel
//! whose output generation is also one of its inputs.

use crate::error::{Result, SimError};
use std::fmt;

/// Fields held by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldId {
    Density,
    Velocity,
    Temperature,
    FuelSolid,
    FuelGas,
    /// Display-only packing of solid and gas fuel
    FuelComposite,
}

/// How a field's next generation becomes current at the end of a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// Swap the `Current` and `Next` roles
    Swap,
    /// Copy `Next` into `Current`, keeping `Next` intact
    Copy,
    /// Never rotated
    Static,
}

impl FieldId {
    pub const ALL: [Self; 6] = [
        Self::Density,
        Self::Velocity,
        Self::Temperature,
        Self::FuelSolid,
        Self::FuelGas,
        Self::FuelComposite,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Density => 0,
            Self::Velocity => 1,
            Self::Temperature => 2,
            Self::FuelSolid => 3,
            Self::FuelGas => 4,
            Self::FuelComposite => 5,
        }
    }

    /// Number of buffers allocated for this field
    pub fn generations(self) -> usize {
        match self {
            Self::Density | Self::Velocity => 4,
            Self::Temperature | Self::FuelSolid | Self::FuelGas => 3,
            Self::FuelComposite => 1,
        }
    }

    /// Values stored per cell
    pub fn channels(self) -> usize {
        match self {
            Self::Velocity | Self::FuelComposite => 2,
            _ => 1,
        }
    }

    pub fn rotation(self) -> Rotation {
        match self {
            Self::Velocity => Rotation::Copy,
            Self::FuelComposite => Rotation::Static,
            _ => Rotation::Swap,
        }
    }

    /// Spare generation holding the pre-advection copy of the field
    pub fn advection_source(self) -> Slot {
        if self.generations() > 3 {
            Slot::Aux
        } else {
            Slot::Scratch
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Density => "density",
            Self::Velocity => "velocity",
            Self::Temperature => "temperature",
            Self::FuelSolid => "fuel solid",
            Self::FuelGas => "fuel gas",
            Self::FuelComposite => "fuel composite",
        }
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Role of a generation within one field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Authoritative state between ticks
    Current,
    /// Result being built during a tick
    Next,
    Scratch,
    Aux,
}

impl Slot {
    const ALL: [Self; 4] = [Self::Current, Self::Next, Self::Scratch, Self::Aux];

    fn index(self) -> usize {
        match self {
            Self::Current => 0,
            Self::Next => 1,
            Self::Scratch => 2,
            Self::Aux => 3,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Current => "current",
            Self::Next => "next",
            Self::Scratch => "scratch",
            Self::Aux => "aux",
        })
    }
}

/// Buffers of one field plus the slot-to-buffer role table
#[derive(Debug)]
pub struct Generations<B> {
    field: FieldId,
    buffers: Vec<B>,
    /// `roles[slot]` is the buffer currently playing `slot`
    roles: Vec<usize>,
    /// Written flags follow buffers, not slots
    written: Vec<bool>,
}

impl<B> Generations<B> {
    /// Wrap freshly allocated, zero-filled buffers
    ///
    /// The buffer initially playing `Current` counts as written.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::MissingGeneration`] if `buffers` does not match the
    /// field's generation count.
    pub fn new(field: FieldId, buffers: Vec<B>) -> Result<Self> {
        let count = field.generations();
        if buffers.len() != count {
            let slot = Slot::ALL[buffers.len().min(3)];
            return Err(SimError::MissingGeneration { field, slot });
        }
        let mut written = vec![false; count];
        written[0] = true;
        Ok(Self {
            field,
            buffers,
            roles: (0..count).collect(),
            written,
        })
    }

    pub fn field(&self) -> FieldId {
        self.field
    }

    fn buffer_index(&self, slot: Slot) -> Result<usize> {
        self.roles
            .get(slot.index())
            .copied()
            .ok_or(SimError::MissingGeneration {
                field: self.field,
                slot,
            })
    }

    /// Buffer index for a slot about to be read
    ///
    /// # Errors
    ///
    /// Fails if the slot does not exist or no stage has written it.
    pub fn read_index(&self, slot: Slot) -> Result<usize> {
        let index = self.buffer_index(slot)?;
        if self.written[index] {
            Ok(index)
        } else {
            Err(SimError::UnwrittenGeneration {
                field: self.field,
                slot,
            })
        }
    }

    /// Validate one kernel's inputs and output and mark the output written
    ///
    /// # Returns
    ///
    /// Buffer indices for `reads` and `write`
    ///
    /// # Errors
    ///
    /// Fails on a missing or unwritten input, or if `write` aliases an input.
    /// Nothing is marked on failure.
    pub fn plan<const N: usize>(
        &mut self,
        reads: [Slot; N],
        write: Slot,
    ) -> Result<([usize; N], usize)> {
        let target = self.buffer_index(write)?;
        let mut indices = [0; N];
        for (i, slot) in reads.into_iter().enumerate() {
            let index = self.read_index(slot)?;
            if index == target {
                return Err(SimError::AliasedGenerations {
                    field: self.field,
                    slot: write,
                });
            }
            indices[i] = index;
        }
        self.written[target] = true;
        Ok((indices, target))
    }

    /// Buffer for a slot that has been written
    ///
    /// # Errors
    ///
    /// Fails if the slot does not exist or no stage has written it.
    pub fn get(&self, slot: Slot) -> Result<&B> {
        let index = self.read_index(slot)?;
        Ok(&self.buffers[index])
    }

    /// Whole-buffer overwrite of `slot`, marking it written
    ///
    /// # Errors
    ///
    /// Fails if the slot does not exist.
    pub fn writable(&mut self, slot: Slot) -> Result<&mut B> {
        let index = self.buffer_index(slot)?;
        self.written[index] = true;
        Ok(&mut self.buffers[index])
    }

    /// Borrow validated inputs and the output of one kernel at the same time
    ///
    /// # Errors
    ///
    /// See [`Generations::plan`].
    pub fn reads_write<const N: usize>(
        &mut self,
        reads: [Slot; N],
        write: Slot,
    ) -> Result<([&B; N], &mut B)> {
        let (read_indices, target) = self.plan(reads, write)?;
        disjoint(&mut self.buffers, read_indices, target).ok_or(SimError::AliasedGenerations {
            field: self.field,
            slot: write,
        })
    }

    /// Single-input form of [`Generations::reads_write`]
    ///
    /// # Errors
    ///
    /// See [`Generations::plan`].
    pub fn read_write(&mut self, read: Slot, write: Slot) -> Result<(&B, &mut B)> {
        let ([input], output) = self.reads_write([read], write)?;
        Ok((input, output))
    }

    /// Exchange the buffers playing two roles
    ///
    /// # Errors
    ///
    /// Fails if either slot does not exist for this field.
    pub fn swap_slots(&mut self, a: Slot, b: Slot) -> Result<()> {
        let ia = self.buffer_index(a)?;
        let ib = self.buffer_index(b)?;
        self.roles[a.index()] = ib;
        self.roles[b.index()] = ia;
        Ok(())
    }

    pub fn is_written(&self, slot: Slot) -> bool {
        self.buffer_index(slot)
            .map(|index| self.written[index])
            .unwrap_or(false)
    }

    /// Buffer at a raw index, for backends that resolved it through [`Generations::plan`]
    pub fn buffer(&self, index: usize) -> &B {
        &self.buffers[index]
    }

    pub fn buffers(&self) -> &[B] {
        &self.buffers
    }
}

/// Split `items` into shared references at `reads` and a unique one at `write`
fn disjoint<'a, T, const N: usize>(
    items: &'a mut [T],
    reads: [usize; N],
    write: usize,
) -> Option<([&'a T; N], &'a mut T)> {
    if write >= items.len() || reads.iter().any(|&r| r == write || r >= items.len()) {
        return None;
    }
    let (lo, rest) = items.split_at_mut(write);
    let (target, hi) = rest.split_first_mut()?;
    let (lo, hi): (&'a [T], &'a [T]) = (lo, hi);
    Some((
        reads.map(move |r| if r < write { &lo[r] } else { &hi[r - write - 1] }),
        target,
    ))
}

/// All fields of one simulation
#[derive(Debug)]
pub struct FieldStore<B> {
    fields: Vec<Generations<B>>,
}

impl<B> FieldStore<B> {
    /// Allocate every generation of every field with `alloc(field)`
    ///
    /// # Errors
    ///
    /// Propagates allocation failures.
    pub fn allocate(mut alloc: impl FnMut(FieldId) -> Result<B>) -> Result<Self> {
        let fields = FieldId::ALL
            .into_iter()
            .map(|field| {
                let buffers = (0..field.generations())
                    .map(|_| alloc(field))
                    .collect::<Result<Vec<_>>>()?;
                Generations::new(field, buffers)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { fields })
    }

    pub fn field(&self, id: FieldId) -> &Generations<B> {
        &self.fields[id.index()]
    }

    pub fn field_mut(&mut self, id: FieldId) -> &mut Generations<B> {
        &mut self.fields[id.index()]
    }

    /// Mutable access to several distinct fields at once
    ///
    /// # Errors
    ///
    /// Returns [`SimError::AliasedGenerations`] if a field is named twice.
    pub fn many_mut<const N: usize>(
        &mut self,
        ids: [FieldId; N],
    ) -> Result<[&mut Generations<B>; N]> {
        let mut pool: Vec<Option<&mut Generations<B>>> =
            self.fields.iter_mut().map(Some).collect();
        let mut picked = Vec::with_capacity(N);
        for id in ids {
            let generations = pool[id.index()]
                .take()
                .ok_or(SimError::AliasedGenerations {
                    field: id,
                    slot: Slot::Current,
                })?;
            picked.push(generations);
        }
        picked.try_into().map_err(|_| SimError::AliasedGenerations {
            field: ids.first().copied().unwrap_or(FieldId::Density),
            slot: Slot::Current,
        })
    }
}
