//! ISAAC (Indirection, Shift, Accumulate, Add, and Count) keystream
//!
//! Each direction of a connection owns one generator. It supplies the word
//! that advances the header key after every packet and the bytes that are
//! XORed into payloads. Both ends seed it from the handshake, so the streams
//! stay in lockstep as long as both sides process the same packets in the
//! same order.
//!
//! Reference: http://www.burtleburtle.net/bob/rand/isaacafa.html

use std::fmt;

/// Size of the ISAAC state array (must be a power of 2)
const SIZE: usize = 256;

/// Mask for array indexing (SIZE - 1)
const MASK: usize = SIZE - 1;

/// Golden ratio constant used in initialization
const GOLDEN_RATIO: u32 = 0x9e3779b9;

/// ISAAC generator state
#[derive(Clone)]
pub struct Isaac {
    results: [u32; SIZE],
    memory: [u32; SIZE],
    aa: u32,
    bb: u32,
    cc: u32,
    /// Unread words left in `results`
    count: usize,
}

impl Isaac {
    /// Create a generator from up to 256 seed words
    pub fn new(seed: &[u32]) -> Self {
        let mut isaac = Self {
            results: [0u32; SIZE],
            memory: [0u32; SIZE],
            aa: 0,
            bb: 0,
            cc: 0,
            count: 0,
        };

        for (slot, &word) in isaac.results.iter_mut().zip(seed.iter()) {
            *slot = word;
        }

        let mut mixer = [GOLDEN_RATIO; 8];
        for _ in 0..4 {
            mix(&mut mixer);
        }

        // Two passes: the first folds the seed into memory, the second
        // diffuses memory into itself.
        let seed_words = isaac.results;
        isaac.absorb(&mut mixer, &seed_words);
        let memory_words = isaac.memory;
        isaac.absorb(&mut mixer, &memory_words);

        isaac.generate();
        isaac.count = SIZE;
        isaac
    }

    fn absorb(&mut self, mixer: &mut [u32; 8], source: &[u32; SIZE]) {
        for block in (0..SIZE).step_by(8) {
            for (lane, value) in mixer.iter_mut().enumerate() {
                *value = value.wrapping_add(source[block + lane]);
            }
            mix(mixer);
            self.memory[block..block + 8].copy_from_slice(mixer);
        }
    }

    /// Refill `results` with 256 new words
    fn generate(&mut self) {
        self.cc = self.cc.wrapping_add(1);
        self.bb = self.bb.wrapping_add(self.cc);

        for i in 0..SIZE {
            let x = self.memory[i];

            self.aa = match i & 3 {
                0 => self.aa ^ (self.aa << 13),
                1 => self.aa ^ (self.aa >> 6),
                2 => self.aa ^ (self.aa << 2),
                _ => self.aa ^ (self.aa >> 16),
            };
            self.aa = self.memory[(i + 128) & MASK].wrapping_add(self.aa);

            let y = self.memory[((x >> 2) as usize) & MASK]
                .wrapping_add(self.aa)
                .wrapping_add(self.bb);

            self.memory[i] = y;
            self.bb = self.memory[((y >> 10) as usize) & MASK].wrapping_add(x);
            self.results[i] = self.bb;
        }
    }

    /// Next word of the keystream
    #[inline]
    pub fn next_word(&mut self) -> u32 {
        if self.count == 0 {
            self.generate();
            self.count = SIZE;
        }
        self.count -= 1;
        self.results[self.count]
    }

    /// Next keystream byte (low 8 bits of the next word)
    #[inline]
    pub fn next_byte(&mut self) -> u8 {
        (self.next_word() & 0xFF) as u8
    }

    /// XOR the next `bytes.len()` keystream bytes into `bytes`
    pub fn apply_keystream(&mut self, bytes: &mut [u8]) {
        for byte in bytes {
            *byte ^= self.next_byte();
        }
    }
}

impl fmt::Debug for Isaac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Isaac")
            .field("count", &self.count)
            .field("aa", &self.aa)
            .field("bb", &self.bb)
            .field("cc", &self.cc)
            .finish()
    }
}

/// Bob Jenkins' 8-lane mix, lanes a..h
#[inline]
fn mix(s: &mut [u32; 8]) {
    s[0] ^= s[1] << 11;
    s[3] = s[3].wrapping_add(s[0]);
    s[1] = s[1].wrapping_add(s[2]);

    s[1] ^= s[2] >> 2;
    s[4] = s[4].wrapping_add(s[1]);
    s[2] = s[2].wrapping_add(s[3]);

    s[2] ^= s[3] << 8;
    s[5] = s[5].wrapping_add(s[2]);
    s[3] = s[3].wrapping_add(s[4]);

    s[3] ^= s[4] >> 16;
    s[6] = s[6].wrapping_add(s[3]);
    s[4] = s[4].wrapping_add(s[5]);

    s[4] ^= s[5] << 10;
    s[7] = s[7].wrapping_add(s[4]);
    s[5] = s[5].wrapping_add(s[6]);

    s[5] ^= s[6] >> 4;
    s[0] = s[0].wrapping_add(s[5]);
    s[6] = s[6].wrapping_add(s[7]);

    s[6] ^= s[7] << 8;
    s[1] = s[1].wrapping_add(s[6]);
    s[7] = s[7].wrapping_add(s[0]);

    s[7] ^= s[0] >> 9;
    s[2] = s[2].wrapping_add(s[7]);
    s[0] = s[0].wrapping_add(s[1]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isaac_deterministic() {
        let mut isaac1 = Isaac::new(&[1, 2, 3, 4]);
        let mut isaac2 = Isaac::new(&[1, 2, 3, 4]);

        for _ in 0..1000 {
            assert_eq!(isaac1.next_word(), isaac2.next_word());
        }
    }

    #[test]
    fn test_isaac_different_seeds() {
        let mut isaac1 = Isaac::new(&[1, 2, 3, 4]);
        let mut isaac2 = Isaac::new(&[5, 6, 7, 8]);

        let diverged = (0..100).any(|_| isaac1.next_word() != isaac2.next_word());
        assert!(diverged);
    }

    #[test]
    fn test_regenerates_on_exhaustion() {
        let mut isaac = Isaac::new(&[1, 2, 3, 4]);

        let first_block: Vec<u32> = (0..SIZE).map(|_| isaac.next_word()).collect();
        assert_eq!(isaac.count, 0);

        let second_block: Vec<u32> = (0..SIZE).map(|_| isaac.next_word()).collect();
        assert_ne!(first_block, second_block);
    }

    #[test]
    fn test_keystream_is_self_inverse() {
        let original: Vec<u8> = (0..=255).collect();
        let mut data = original.clone();

        Isaac::new(&[0xDEADBEEF, 0xCAFEBABE]).apply_keystream(&mut data);
        assert_ne!(data, original);

        Isaac::new(&[0xDEADBEEF, 0xCAFEBABE]).apply_keystream(&mut data);
        assert_eq!(data, original);
    }
}
