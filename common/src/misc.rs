use crate::constants::WORD_SIZE;

// a * b / c without losing the high bits of the product. Saturates if the
// quotient doesn't fit.
pub fn muldiv64(a: u64, b: u64, c: u64) -> u64 {
    assert_ne!(c, 0, "muldiv64 by zero");
    let res = (a as u128) * (b as u128) / (c as u128);
    u64::try_from(res).unwrap_or(u64::MAX)
}

////////////////////////////////////////////////////////////////////////////////

pub trait IsWordAligned: Copy {
    #[allow(clippy::wrong_self_convention)]
    fn is_word_aligned(self) -> bool;
}

impl IsWordAligned for u64 {
    fn is_word_aligned(self) -> bool {
        self % WORD_SIZE == 0
    }
}
