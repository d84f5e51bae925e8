use crate::constants::WORD_SIZE;

// A bank of 32 bit device registers addressed by byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile<const N: usize> {
    regs: [u32; N],
}

impl<const N: usize> Default for RegisterFile<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RegisterFile<N> {
    pub const SIZE: u64 = N as u64 * WORD_SIZE;

    pub const fn new() -> Self {
        RegisterFile { regs: [0; N] }
    }

    pub fn from_words(regs: [u32; N]) -> Self {
        RegisterFile { regs }
    }

    pub const fn offset_to_index(offset: u64) -> usize {
        (offset / WORD_SIZE) as usize
    }

    // Out of range offsets read as 0.
    pub fn get(&self, offset: u64) -> u32 {
        self.regs
            .get(Self::offset_to_index(offset))
            .copied()
            .unwrap_or(0)
    }

    pub fn set(&mut self, offset: u64, val: u32) {
        let idx = Self::offset_to_index(offset);
        assert!(idx < N, "Register offset {offset:#x} out of range");
        self.regs[idx] = val;
    }

    pub fn set_bits(&mut self, offset: u64, bits: u32) {
        let old = self.get(offset);
        self.set(offset, old | bits);
    }

    pub fn clear_bits(&mut self, offset: u64, bits: u32) {
        let old = self.get(offset);
        self.set(offset, old & !bits);
    }

    pub fn is_set(&self, offset: u64, bits: u32) -> bool {
        self.get(offset) & bits != 0
    }

    pub fn clear(&mut self) {
        self.regs = [0; N];
    }

    pub fn words(&self) -> &[u32; N] {
        &self.regs
    }
}
