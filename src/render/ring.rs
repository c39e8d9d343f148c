// SPDX-License-Identifier: GPL-3.0-only

//! Round-robin ring of per-frame uniform slots

use crate::render::CompositeUniforms;

/// One ring element: a GPU buffer plus the snapshot it last received
#[derive(Debug)]
pub struct UniformSlot<B> {
    buffer: B,
    uploaded: Option<CompositeUniforms>,
}

impl<B> UniformSlot<B> {
    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    /// Whether the GPU copy differs from `uniforms`
    pub fn needs_upload(&self, uniforms: &CompositeUniforms) -> bool {
        self.uploaded.as_ref() != Some(uniforms)
    }

    pub fn mark_uploaded(&mut self, uniforms: CompositeUniforms) {
        self.uploaded = Some(uniforms);
    }
}

/// Fixed ring of uniform slots, advanced once per submitted draw
///
/// The ring must be no larger than the number of frames the frame gate
/// admits; otherwise a slot could be rewritten while a draw reading it is
/// still executing.
#[derive(Debug)]
pub struct UniformRing<B> {
    slots: Vec<UniformSlot<B>>,
    current: usize,
}

impl<B> UniformRing<B> {
    /// Build a ring from pre-allocated buffers
    ///
    /// The first [`advance`](Self::advance) selects slot 0.
    ///
    /// # Panics
    ///
    /// Panics if `buffers` is empty.
    pub fn new(buffers: Vec<B>) -> Self {
        assert!(!buffers.is_empty(), "uniform ring needs at least one slot");
        let len = buffers.len();
        Self {
            slots: buffers
                .into_iter()
                .map(|buffer| UniformSlot {
                    buffer,
                    uploaded: None,
                })
                .collect(),
            current: len - 1,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Index of the slot used by the most recent draw
    pub fn current(&self) -> usize {
        self.current
    }

    /// Select `(current + 1) mod len` and return its index
    pub fn advance(&mut self) -> usize {
        self.current = (self.current + 1) % self.slots.len();
        self.current
    }

    pub fn slot(&self, index: usize) -> &UniformSlot<B> {
        &self.slots[index]
    }

    pub fn slot_mut(&mut self, index: usize) -> &mut UniformSlot<B> {
        &mut self.slots[index]
    }
}
