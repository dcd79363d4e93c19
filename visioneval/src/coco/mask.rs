//! Run-length encoding of binary masks, COCO style.
//!
//! COCO serializes instance masks as column-major (Fortran-order) run
//! lengths, starting with a run of zeros, and compresses the run counts into
//! a printable string: each count becomes a little-endian sequence of 5-bit
//! groups offset by 48, with a continuation bit, and counts from the third
//! onwards are difference-coded against the count two positions back.

use crate::coco::records::RleMask;
use crate::error::{VisionEvalError, VisionEvalResult};

/// Encode a row-major binary mask of the given dimensions.
pub fn encode(mask: &[bool], height: usize, width: usize) -> VisionEvalResult<RleMask> {
    if mask.len() != height * width {
        return Err(VisionEvalError::InvalidInput {
            reason: format!(
                "mask has {} pixels, expected {}x{} = {}",
                mask.len(),
                height,
                width,
                height * width
            ),
        });
    }

    let counts = run_lengths(mask, height, width);
    Ok(RleMask {
        size: [height, width],
        counts: counts_to_string(&counts),
    })
}

/// Decode an RLE mask back into a row-major binary mask.
pub fn decode(rle: &RleMask) -> Vec<bool> {
    let [height, width] = rle.size;
    let mut mask = vec![false; height * width];

    let mut index = 0usize;
    let mut value = false;
    for run in string_to_counts(&rle.counts) {
        for _ in 0..run {
            if index >= height * width {
                break;
            }
            // Runs walk the mask in column-major order.
            let row = index % height;
            let col = index / height;
            mask[row * width + col] = value;
            index += 1;
        }
        value = !value;
    }
    mask
}

/// Column-major run lengths, first run counting zeros.
fn run_lengths(mask: &[bool], height: usize, width: usize) -> Vec<u32> {
    let mut counts = Vec::new();
    let mut current = false;
    let mut run: u32 = 0;

    for col in 0..width {
        for row in 0..height {
            let value = mask[row * width + col];
            if value == current {
                run += 1;
            } else {
                counts.push(run);
                current = value;
                run = 1;
            }
        }
    }
    counts.push(run);
    counts
}

/// Compress run counts into COCO's printable string form.
fn counts_to_string(counts: &[u32]) -> String {
    let mut out = String::new();
    for (i, &count) in counts.iter().enumerate() {
        let mut x = i64::from(count);
        if i > 2 {
            x -= i64::from(counts[i - 2]);
        }

        let mut more = true;
        while more {
            let mut c = (x & 0x1f) as u8;
            x >>= 5;
            more = if c & 0x10 != 0 { x != -1 } else { x != 0 };
            if more {
                c |= 0x20;
            }
            out.push((c + 48) as char);
        }
    }
    out
}

/// Expand COCO's printable string form back into run counts.
fn string_to_counts(encoded: &str) -> Vec<u32> {
    let bytes = encoded.as_bytes();
    let mut counts: Vec<i64> = Vec::new();

    let mut pos = 0;
    while pos < bytes.len() {
        let mut x: i64 = 0;
        let mut shift = 0u32;
        loop {
            let c = i64::from(bytes[pos]) - 48;
            x |= (c & 0x1f) << shift;
            pos += 1;
            shift += 5;
            if c & 0x20 == 0 {
                // Sign-extend the final 5-bit group.
                if c & 0x10 != 0 {
                    x |= -1i64 << shift;
                }
                break;
            }
        }
        if counts.len() > 2 {
            x += counts[counts.len() - 2];
        }
        counts.push(x);
    }

    counts.into_iter().map(|count| count.max(0) as u32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_lengths_are_column_major_and_start_with_zeros() {
        // Row-major mask:
        //   1 0
        //   1 0
        // Column-major scan: 1 1 0 0 -> first (zero) run is empty.
        let mask = [true, false, true, false];
        assert_eq!(run_lengths(&mask, 2, 2), vec![0, 2, 2]);

        // Row-major mask:
        //   0 1
        //   1 0
        // Column-major scan: 0 1 1 0.
        let mask = [false, true, true, false];
        assert_eq!(run_lengths(&mask, 2, 2), vec![1, 2, 1]);
    }

    #[test]
    fn string_codec_round_trips_counts() {
        let cases: Vec<Vec<u32>> = vec![
            vec![0, 4],
            vec![1, 2, 1],
            vec![3, 1, 5, 1, 2],
            vec![100, 200, 300, 400],
            vec![0, 1, 0, 1, 0, 1],
        ];
        for counts in cases {
            let encoded = counts_to_string(&counts);
            assert_eq!(string_to_counts(&encoded), counts, "counts {counts:?}");
        }
    }

    #[test]
    fn encode_decode_round_trips_the_mask() {
        let mask = [
            true, false, false, //
            true, true, false, //
            false, true, true, //
            false, false, true,
        ];
        let rle = encode(&mask, 4, 3).unwrap();
        assert_eq!(rle.size, [4, 3]);
        assert_eq!(decode(&rle), mask.to_vec());
    }

    #[test]
    fn all_ones_mask_has_empty_leading_run() {
        let mask = [true; 6];
        let rle = encode(&mask, 2, 3).unwrap();
        assert_eq!(decode(&rle), mask.to_vec());
    }

    #[test]
    fn encode_rejects_mismatched_dimensions() {
        let mask = [true, false];
        assert!(encode(&mask, 2, 2).is_err());
    }
}
