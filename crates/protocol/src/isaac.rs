//! ISAAC keystream used to scramble opcode bytes.
//!
//! Both ends seed a cipher from the same per-connection keys; the sender adds
//! the next keystream value to each opcode and the receiver subtracts it.
//! Payload bytes are never touched.

const SIZE: usize = 256;
const GOLDEN_RATIO: u32 = 0x9e37_79b9;

/// ISAAC pseudo-random generator (32-bit variant).
#[derive(Clone)]
pub struct IsaacRandom {
    results: [u32; SIZE],
    memory: [u32; SIZE],
    a: u32,
    b: u32,
    c: u32,
    count: usize,
}

impl std::fmt::Debug for IsaacRandom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsaacRandom").field("count", &self.count).finish_non_exhaustive()
    }
}

impl IsaacRandom {
    /// Seed a new cipher. At most 256 seed words are used.
    pub fn new(seed: &[u32]) -> Self {
        let mut isaac = Self {
            results: [0; SIZE],
            memory: [0; SIZE],
            a: 0,
            b: 0,
            c: 0,
            count: 0,
        };
        let n = seed.len().min(SIZE);
        isaac.results[..n].copy_from_slice(&seed[..n]);
        isaac.init();
        isaac
    }

    /// Next keystream value.
    pub fn next_int(&mut self) -> u32 {
        if self.count == 0 {
            self.generate();
            self.count = SIZE;
        }
        self.count -= 1;
        self.results[self.count]
    }

    fn generate(&mut self) {
        self.c = self.c.wrapping_add(1);
        self.b = self.b.wrapping_add(self.c);
        for i in 0..SIZE {
            let x = self.memory[i];
            self.a ^= match i & 3 {
                0 => self.a << 13,
                1 => self.a >> 6,
                2 => self.a << 2,
                _ => self.a >> 16,
            };
            self.a = self.memory[(i + 128) & 0xFF].wrapping_add(self.a);
            let y = self.memory[((x >> 2) & 0xFF) as usize]
                .wrapping_add(self.a)
                .wrapping_add(self.b);
            self.memory[i] = y;
            self.b = self.memory[((y >> 10) & 0xFF) as usize].wrapping_add(x);
            self.results[i] = self.b;
        }
    }

    fn init(&mut self) {
        let mut s = [GOLDEN_RATIO; 8];
        for _ in 0..4 {
            mix(&mut s);
        }
        for pass in 0..2 {
            for i in (0..SIZE).step_by(8) {
                for (j, word) in s.iter_mut().enumerate() {
                    let source = if pass == 0 { self.results[i + j] } else { self.memory[i + j] };
                    *word = word.wrapping_add(source);
                }
                mix(&mut s);
                self.memory[i..i + 8].copy_from_slice(&s);
            }
        }
        self.generate();
        self.count = SIZE;
    }
}

fn mix(s: &mut [u32; 8]) {
    let [mut a, mut b, mut c, mut d, mut e, mut f, mut g, mut h] = *s;
    a ^= b << 11;
    d = d.wrapping_add(a);
    b = b.wrapping_add(c);
    b ^= c >> 2;
    e = e.wrapping_add(b);
    c = c.wrapping_add(d);
    c ^= d << 8;
    f = f.wrapping_add(c);
    d = d.wrapping_add(e);
    d ^= e >> 16;
    g = g.wrapping_add(d);
    e = e.wrapping_add(f);
    e ^= f << 10;
    h = h.wrapping_add(e);
    f = f.wrapping_add(g);
    f ^= g >> 4;
    a = a.wrapping_add(f);
    g = g.wrapping_add(h);
    g ^= h << 8;
    b = b.wrapping_add(g);
    h = h.wrapping_add(a);
    h ^= a >> 9;
    c = c.wrapping_add(h);
    a = a.wrapping_add(b);
    *s = [a, b, c, d, e, f, g, h];
}
