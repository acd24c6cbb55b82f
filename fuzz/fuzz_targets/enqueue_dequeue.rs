#![no_main]

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};
use libfuzzer_sys::fuzz_target;

use windowed_quantiles::Histogram;

#[derive(Debug, Clone, Copy)]
pub struct Xorshift {
    seed: u64,
}

impl Xorshift {
    pub fn new(seed: u64) -> Xorshift {
        Xorshift { seed }
    }

    pub fn next_val(&mut self) -> u32 {
        // implementation inspired by
        // https://github.com/astocko/xorshift/blob/master/src/splitmix64.rs
        let z = self.seed.wrapping_add(0x9E37_79B9_7F4A_7C15_u64);
        let nxt_seed = z;
        let z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9_u64);
        let z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB_u64);
        self.seed = nxt_seed;
        u32::from((z ^ (z >> 31)) as u16)
    }
}

fuzz_target!(|data: &[u8]| {
    let mut cursor = Cursor::new(data);

    // bounded 2**10, keeps single runs fast
    let window: i64 = if let Ok(res) = cursor.read_i64::<BigEndian>() {
        res % 1024
    } else {
        return;
    };
    // slab width; histogram substitutes its default for non-positive values
    let slab: f64 = if let Ok(res) = cursor.read_f64::<BigEndian>() {
        res
    } else {
        return;
    };
    // bounded 2**14 operations
    let ops: u32 = if let Ok(res) = cursor.read_u32::<BigEndian>() {
        res % 16_384
    } else {
        return;
    };
    // unbounded
    let seed: u64 = if let Ok(res) = cursor.read_u64::<BigEndian>() {
        res
    } else {
        return;
    };

    // keep the bucket arrays sane: values reach 2**16 and the outer level
    // grows to max_value / slab entries
    let slab = if slab.is_finite() && (0.1..=1_000_000.0).contains(&slab) {
        slab
    } else {
        10.0
    };
    let hist = Histogram::new(window, slab, 1);
    hist.add_percentile_point(0.5);
    hist.add_percentile_point(0.99);

    let mut xshft = Xorshift::new(seed);
    for _ in 0..ops {
        let roll = xshft.next_val();
        if roll % 4 == 0 {
            hist.dequeue();
        } else {
            let val = f64::from(xshft.next_val());
            hist.enqueue(val, 1);
        }
    }
    hist.value_at_percentile(0.5);
    hist.value_at_percentile(0.99);
    hist.value_at_percentile(0.75);
});
