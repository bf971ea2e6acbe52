//! Encoding of 64-key chunks.
//!
//! A packed chunk keeps a presence mask and a byte string. The byte string
//! starts with a header byte:
//!
//! ```text
//! bits 0-2  value width in bytes (0-4)
//! bits 3-5  bias width in bytes (0-4)
//! bits 6-7  mode: 0 flat, 1 single value, 2 run-length
//! ```
//!
//! followed by the bias (the smallest present value) and then either one
//! `value - bias` per present key (flat), nothing (single value), or
//! `(value - bias, run length)` pairs (run-length).

use super::UNASSIGNED;
use smallvec::SmallVec;

pub(crate) const CHUNK_SIZE: usize = 64;

const MODE_FLAT: u8 = 0;
const MODE_SINGLE: u8 = 1;
const MODE_RUN_LENGTH: u8 = 2;

/// How a packed chunk stores its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Flat,
    Single,
    RunLength,
}

/// A compressed chunk of up to 64 values.
#[derive(Debug, Clone)]
pub(crate) struct PackedChunk {
    mask: u64,
    data: Box<[u8]>,
}

impl PackedChunk {
    /// Pack the present slots of `values`. Returns `None` for an empty mask.
    pub fn encode(mask: u64, values: &[u32; CHUNK_SIZE]) -> Option<Self> {
        if mask == 0 {
            return None;
        }
        let present: SmallVec<[u32; CHUNK_SIZE]> = present_offsets(mask)
            .map(|offset| values[offset])
            .collect();

        let (min, max) = present
            .iter()
            .fold((u32::MAX, 0u32), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let bias_width = bytes_needed(min);
        let width = bytes_needed(max - min);

        let mut data = Vec::with_capacity(1 + bias_width + present.len() * width);
        if width == 0 {
            data.push(header(MODE_SINGLE, 0, bias_width));
            write_uint(&mut data, min, bias_width);
            return Some(Self::from_parts(mask, data));
        }

        let mut runs: SmallVec<[(u32, u8); 8]> = SmallVec::new();
        for &value in &present {
            match runs.last_mut() {
                Some((last, len)) if *last == value => *len += 1,
                _ => runs.push((value, 1)),
            }
        }

        let flat_len = present.len() * width;
        let run_length_len = runs.len() * (width + 1);
        if run_length_len < flat_len {
            data.push(header(MODE_RUN_LENGTH, width, bias_width));
            write_uint(&mut data, min, bias_width);
            for (value, len) in runs {
                write_uint(&mut data, value - min, width);
                data.push(len);
            }
        } else {
            data.push(header(MODE_FLAT, width, bias_width));
            write_uint(&mut data, min, bias_width);
            for value in present {
                write_uint(&mut data, value - min, width);
            }
        }
        Some(Self::from_parts(mask, data))
    }

    fn from_parts(mask: u64, data: Vec<u8>) -> Self {
        Self {
            mask,
            data: data.into_boxed_slice(),
        }
    }

    pub fn mask(&self) -> u64 {
        self.mask
    }

    /// Number of present keys.
    pub fn len(&self) -> usize {
        self.mask.count_ones() as usize
    }

    /// Bytes used by the encoded values, header included.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn encoding(&self) -> Encoding {
        match self.data[0] >> 6 {
            MODE_SINGLE => Encoding::Single,
            MODE_RUN_LENGTH => Encoding::RunLength,
            _ => Encoding::Flat,
        }
    }

    fn layout(&self) -> (u8, usize, u32, usize) {
        let header = self.data[0];
        let width = (header & 0x07) as usize;
        let bias_width = ((header >> 3) & 0x07) as usize;
        let bias = read_uint(&self.data, 1, bias_width);
        (header >> 6, width, bias, 1 + bias_width)
    }

    /// Value at `offset`, decoding only what is needed.
    pub fn get(&self, offset: usize) -> Option<u32> {
        let bit = 1u64 << offset;
        if self.mask & bit == 0 {
            return None;
        }
        let index = (self.mask & (bit - 1)).count_ones() as usize;
        let (mode, width, bias, start) = self.layout();
        match mode {
            MODE_SINGLE => Some(bias),
            MODE_RUN_LENGTH => {
                let mut remaining = index;
                for run in self.data[start..].chunks_exact(width + 1) {
                    let len = run[width] as usize;
                    if remaining < len {
                        return Some(bias + read_uint(run, 0, width));
                    }
                    remaining -= len;
                }
                None
            }
            _ => Some(bias + read_uint(&self.data, start + index * width, width)),
        }
    }

    /// Expand into a full slot array; absent slots become [`UNASSIGNED`].
    pub fn decode_into(&self, out: &mut [u32; CHUNK_SIZE]) {
        out.fill(UNASSIGNED);
        let (mode, width, bias, start) = self.layout();
        let mut offsets = present_offsets(self.mask);
        match mode {
            MODE_SINGLE => {
                for offset in offsets {
                    out[offset] = bias;
                }
            }
            MODE_RUN_LENGTH => {
                for run in self.data[start..].chunks_exact(width + 1) {
                    let value = bias + read_uint(run, 0, width);
                    for offset in offsets.by_ref().take(run[width] as usize) {
                        out[offset] = value;
                    }
                }
            }
            _ => {
                for (index, offset) in offsets.enumerate() {
                    out[offset] = bias + read_uint(&self.data, start + index * width, width);
                }
            }
        }
    }

    /// Present `(offset, value)` pairs in offset order.
    pub fn entries(&self) -> impl Iterator<Item = (usize, u32)> + use<> {
        let mut values = [UNASSIGNED; CHUNK_SIZE];
        self.decode_into(&mut values);
        present_offsets(self.mask).map(move |offset| (offset, values[offset]))
    }
}

fn header(mode: u8, width: usize, bias_width: usize) -> u8 {
    (mode << 6) | ((bias_width as u8) << 3) | width as u8
}

fn present_offsets(mask: u64) -> impl Iterator<Item = usize> {
    let mut bits = mask;
    std::iter::from_fn(move || {
        if bits == 0 {
            return None;
        }
        let offset = bits.trailing_zeros() as usize;
        bits &= bits - 1;
        Some(offset)
    })
}

fn bytes_needed(value: u32) -> usize {
    match value {
        0 => 0,
        1..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    }
}

fn write_uint(out: &mut Vec<u8>, value: u32, width: usize) {
    out.extend_from_slice(&value.to_le_bytes()[..width]);
}

fn read_uint(data: &[u8], pos: usize, width: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes[..width].copy_from_slice(&data[pos..pos + width]);
    u32::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(entries: &[(usize, u32)]) -> (u64, [u32; CHUNK_SIZE]) {
        let mut mask = 0u64;
        let mut values = [UNASSIGNED; CHUNK_SIZE];
        for &(offset, value) in entries {
            mask |= 1 << offset;
            values[offset] = value;
        }
        (mask, values)
    }

    fn assert_lossless(entries: &[(usize, u32)]) -> PackedChunk {
        let (mask, values) = slots(entries);
        let chunk = PackedChunk::encode(mask, &values).unwrap();
        let mut decoded = [0u32; CHUNK_SIZE];
        chunk.decode_into(&mut decoded);
        assert_eq!(decoded, values);
        for offset in 0..CHUNK_SIZE {
            let expected = (values[offset] != UNASSIGNED).then_some(values[offset]);
            assert_eq!(chunk.get(offset), expected, "offset {offset}");
        }
        chunk
    }

    #[test]
    fn test_empty_mask() {
        let (mask, values) = slots(&[]);
        assert!(PackedChunk::encode(mask, &values).is_none());
    }

    #[test]
    fn test_single_value_chunk() {
        let entries: Vec<(usize, u32)> = (0..64).map(|o| (o, 7)).collect();
        let chunk = assert_lossless(&entries);
        assert_eq!(chunk.encoding(), Encoding::Single);
        assert_eq!(chunk.byte_len(), 2);
    }

    #[test]
    fn test_zero_value_chunk() {
        let chunk = assert_lossless(&[(3, 0), (9, 0)]);
        assert_eq!(chunk.encoding(), Encoding::Single);
        assert_eq!(chunk.byte_len(), 1);
    }

    #[test]
    fn test_two_runs_use_run_length() {
        let entries: Vec<(usize, u32)> = (0..64).map(|o| (o, if o < 40 { 3 } else { 900 })).collect();
        let chunk = assert_lossless(&entries);
        assert_eq!(chunk.encoding(), Encoding::RunLength);
        // header + bias + 2 runs of (2 value bytes + length)
        assert_eq!(chunk.byte_len(), 1 + 1 + 2 * 3);
    }

    #[test]
    fn test_varied_values_use_flat() {
        let entries: Vec<(usize, u32)> = (0..20).map(|o| (o * 3, 1000 + o as u32)).collect();
        let chunk = assert_lossless(&entries);
        assert_eq!(chunk.encoding(), Encoding::Flat);
        assert_eq!(chunk.byte_len(), 1 + 2 + 20);
    }

    #[test]
    fn test_wide_values() {
        let chunk = assert_lossless(&[(0, 0), (1, u32::MAX - 1), (63, 5)]);
        assert_eq!(chunk.len(), 3);
    }

    #[test]
    fn test_entries_in_offset_order() {
        let (mask, values) = slots(&[(40, 2), (1, 9)]);
        let chunk = PackedChunk::encode(mask, &values).unwrap();
        assert_eq!(chunk.entries().collect::<Vec<_>>(), vec![(1, 9), (40, 2)]);
    }
}
