//! Row-parallel helpers for per-pixel stages.
//!
//! Small images are processed sequentially; larger ones are split into rows
//! and handed to rayon. Callers pass pure per-row closures, so both paths
//! produce identical output.

use rayon::prelude::*;

/// Pixel count at which stages switch to parallel execution.
pub const PARALLEL_THRESHOLD: usize = 64 * 1024;

/// Run `f(y, row)` over every row of `data`, where a row is `row_len` values.
///
/// Rows are dispatched in parallel once the grid holds at least
/// `threshold` pixels.
pub fn for_each_row_mut<T, F>(data: &mut [T], row_len: usize, pixels: usize, threshold: usize, f: F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Sync + Send,
{
    if row_len == 0 {
        return;
    }
    if pixels >= threshold {
        data.par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(y, row)| f(y, row));
    } else {
        for (y, row) in data.chunks_mut(row_len).enumerate() {
            f(y, row);
        }
    }
}

/// Run `f(y, a_row, b_row)` over matching rows of two buffers.
///
/// `a` rows are `a_len` values long and `b` rows `b_len` values long; both
/// buffers must hold the same number of rows.
pub fn for_each_row_pair_mut<A, B, F>(
    a: &mut [A],
    a_len: usize,
    b: &mut [B],
    b_len: usize,
    pixels: usize,
    threshold: usize,
    f: F,
) where
    A: Send,
    B: Send,
    F: Fn(usize, &mut [A], &mut [B]) + Sync + Send,
{
    if a_len == 0 || b_len == 0 {
        return;
    }
    if pixels >= threshold {
        a.par_chunks_mut(a_len)
            .zip(b.par_chunks_mut(b_len))
            .enumerate()
            .for_each(|(y, (ra, rb))| f(y, ra, rb));
    } else {
        for (y, (ra, rb)) in a.chunks_mut(a_len).zip(b.chunks_mut(b_len)).enumerate() {
            f(y, ra, rb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_and_parallel_agree() {
        let width = 37;
        let height = 23;
        let fill = |y: usize, row: &mut [f32]| {
            for (x, v) in row.iter_mut().enumerate() {
                *v = (x * 31 + y * 7) as f32 * 0.5;
            }
        };

        let mut seq = vec![0.0f32; width * height];
        for_each_row_mut(&mut seq, width, width * height, usize::MAX, fill);

        let mut par = vec![0.0f32; width * height];
        for_each_row_mut(&mut par, width, width * height, 0, fill);

        assert_eq!(seq, par);
    }

    #[test]
    fn test_row_pairs() {
        let mut a = vec![0u32; 3 * 4];
        let mut b = vec![0u32; 3];
        for_each_row_pair_mut(&mut a, 4, &mut b, 1, 3, 0, |y, ra, rb| {
            for v in ra.iter_mut() {
                *v = y as u32;
            }
            rb[0] = ra.len() as u32 + y as u32;
        });
        assert_eq!(a[8..12], [2, 2, 2, 2]);
        assert_eq!(b, vec![4, 5, 6]);
    }
}
