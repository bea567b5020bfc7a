//! Sparse array over `u32` indices with constant-time lookup through per-bucket bitmaps.
#![cfg(target_pointer_width = "64")]

use std::io::{Read, Write};

use anyhow::{Context, Result};

use crate::error::{BuildError, CodecError};
use crate::{broadword, Serializable};

/// Number of indices covered by one bitmap word.
pub const BUCKET_SIZE: usize = 64;

/// Sparse array over `u32` indices with constant-time lookup through per-bucket bitmaps.
///
/// The index domain is cut into buckets of [`BUCKET_SIZE`] positions. Each bucket has one
/// `u64` bitmap in which bit $`p`$ tells whether index `bucket * BUCKET_SIZE + p` is stored,
/// and one offset holding the number of elements stored in all earlier buckets.
/// Stored elements are kept densely in ascending index order, so the element of a set bit
/// lives at `offsets[bucket] + rank`, where rank counts the set bits below it.
///
/// # Memory usage
///
/// $`128 \lceil u / 64 \rceil`$ bits of index for a largest index $`u`$, plus the elements.
///
/// # Examples
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use slimidx::CompactedArray;
///
/// let a = CompactedArray::new(&[3, 70, 71], vec![30u32, 700, 710])?;
///
/// assert_eq!(a.len(), 3);
/// assert_eq!(a.get(70), Some(&700));
/// assert_eq!(a.get(4), None);
/// assert_eq!(a.bitmaps(), &[1u64 << 3, 0b11 << 6]);
/// assert_eq!(a.offsets(), &[0, 1]);
/// # Ok(())
/// # }
/// ```
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct CompactedArray<E> {
    cnt: u64,
    bitmaps: Vec<u64>,
    offsets: Vec<u64>,
    elts: Vec<E>,
}

impl<E> CompactedArray<E> {
    /// Creates a new array from strictly ascending `indices` and the `elts` paired with them.
    ///
    /// # Arguments
    ///
    ///  - `indices`: Strictly ascending indices.
    ///  - `elts`: Elements, positionally paired with `indices`.
    ///
    /// # Errors
    ///
    /// An error with kind [`BuildError`] is returned if
    ///
    ///  - `indices` and `elts` differ in length ([`BuildError::KeyValueLengthMismatch`]),
    ///  - an index repeats its predecessor ([`BuildError::DuplicateKey`]), or
    ///  - an index is smaller than its predecessor ([`BuildError::KeyOutOfOrder`]).
    pub fn new(indices: &[u32], elts: Vec<E>) -> Result<Self> {
        if indices.len() != elts.len() {
            return Err(BuildError::KeyValueLengthMismatch.into());
        }

        let mut bitmaps: Vec<u64> = vec![];
        let mut offsets = vec![];
        let mut prev: Option<u32> = None;

        for (cnt, &idx) in indices.iter().enumerate() {
            if let Some(prev) = prev {
                if idx == prev {
                    return Err(BuildError::DuplicateKey).with_context(|| format!("index: {idx}"));
                }
                if idx < prev {
                    return Err(BuildError::KeyOutOfOrder).with_context(|| format!("index: {idx}"));
                }
            }
            prev = Some(idx);

            let (bucket, pos) = Self::locate(idx);
            while bitmaps.len() <= bucket {
                // Every element of earlier buckets is already counted.
                offsets.push(cnt as u64);
                bitmaps.push(0);
            }
            bitmaps[bucket] |= 1 << pos;
        }

        Ok(Self {
            cnt: elts.len() as u64,
            bitmaps,
            offsets,
            elts,
        })
    }

    /// Creates an empty array, to be filled by deserialization.
    ///
    /// # Examples
    ///
    /// ```
    /// use slimidx::CompactedArray;
    ///
    /// let a = CompactedArray::<u32>::new_empty();
    /// assert!(a.is_empty());
    /// assert_eq!(a.get(0), None);
    /// ```
    pub const fn new_empty() -> Self {
        Self {
            cnt: 0,
            bitmaps: vec![],
            offsets: vec![],
            elts: vec![],
        }
    }

    /// Returns the element stored at `idx`, or [`None`] if nothing is stored there.
    ///
    /// # Complexity
    ///
    /// Constant
    pub fn get(&self, idx: u32) -> Option<&E> {
        let (bucket, pos) = Self::locate(idx);
        let word = *self.bitmaps.get(bucket)?;
        if word & (1 << pos) == 0 {
            return None;
        }
        let rank = *self.offsets.get(bucket)? as usize + broadword::rank_below(word, pos);
        self.elts.get(rank)
    }

    /// Checks if an element is stored at `idx`.
    pub fn contains(&self, idx: u32) -> bool {
        let (bucket, pos) = Self::locate(idx);
        self.bitmaps
            .get(bucket)
            .map_or(false, |&word| word & (1 << pos) != 0)
    }

    /// Creates an iterator enumerating `(index, element)` pairs in ascending index order.
    ///
    /// # Examples
    ///
    /// ```
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// use slimidx::CompactedArray;
    ///
    /// let a = CompactedArray::new(&[1, 100], vec!['a', 'b'])?;
    /// let mut it = a.iter();
    /// assert_eq!(it.next(), Some((1, &'a')));
    /// assert_eq!(it.next(), Some((100, &'b')));
    /// assert_eq!(it.next(), None);
    /// # Ok(())
    /// # }
    /// ```
    pub fn iter(&self) -> Iter<'_, E> {
        Iter {
            array: self,
            bucket: 0,
            word: self.bitmaps.first().copied().unwrap_or(0),
            rank: 0,
        }
    }

    /// Gets the number of stored elements.
    #[inline(always)]
    pub const fn len(&self) -> usize {
        self.cnt as usize
    }

    /// Checks if no element is stored.
    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.cnt == 0
    }

    /// Gets the per-bucket bitmaps.
    pub fn bitmaps(&self) -> &[u64] {
        &self.bitmaps
    }

    /// Gets the per-bucket offsets, i.e., the number of elements before each bucket.
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Gets the stored elements in ascending index order.
    pub fn elts(&self) -> &[E] {
        &self.elts
    }

    /// Checks that the offsets are the prefix counts of the bitmaps and that
    /// both agree with the stored elements.
    fn validate(&self) -> Result<(), CodecError> {
        let corrupted = |reason| Err(CodecError::CorruptedArray { reason });
        if self.elts.len() as u64 != self.cnt {
            return corrupted("element count differs from cnt");
        }
        if self.offsets.len() != self.bitmaps.len() {
            return corrupted("offsets and bitmaps differ in length");
        }
        let mut total = 0;
        for (&word, &offset) in self.bitmaps.iter().zip(&self.offsets) {
            if offset != total {
                return corrupted("offset is not the count of earlier buckets");
            }
            total += broadword::popcount(word) as u64;
        }
        if total != self.cnt {
            return corrupted("set bits differ from cnt");
        }
        Ok(())
    }

    #[inline(always)]
    const fn locate(idx: u32) -> (usize, usize) {
        let idx = idx as usize;
        (idx / BUCKET_SIZE, idx % BUCKET_SIZE)
    }
}

/// Iterator for enumerating stored pairs, created by [`CompactedArray::iter()`].
pub struct Iter<'a, E> {
    array: &'a CompactedArray<E>,
    bucket: usize,
    word: u64,
    rank: usize,
}

impl<'a, E> Iterator for Iter<'a, E> {
    type Item = (u32, &'a E);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(pos) = broadword::lsb(self.word) {
                self.word &= self.word - 1;
                let elt = self.array.elts.get(self.rank)?;
                self.rank += 1;
                return Some(((self.bucket * BUCKET_SIZE + pos) as u32, elt));
            }
            self.bucket += 1;
            self.word = *self.array.bitmaps.get(self.bucket)?;
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.array.len().saturating_sub(self.rank);
        (left, Some(left))
    }
}

impl<E> Serializable for CompactedArray<E>
where
    E: Serializable,
{
    fn serialize_into<W: Write>(&self, mut writer: W) -> Result<usize> {
        let mut mem = self.cnt.serialize_into(&mut writer)?;
        mem += self.bitmaps.serialize_into(&mut writer)?;
        mem += self.offsets.serialize_into(&mut writer)?;
        mem += self.elts.serialize_into(&mut writer)?;
        Ok(mem)
    }

    fn deserialize_from<R: Read>(mut reader: R) -> Result<Self> {
        let cnt = u64::deserialize_from(&mut reader)?;
        let bitmaps = Vec::<u64>::deserialize_from(&mut reader)?;
        let offsets = Vec::<u64>::deserialize_from(&mut reader)?;
        let elts = Vec::<E>::deserialize_from(&mut reader)?;
        let array = Self {
            cnt,
            bitmaps,
            offsets,
            elts,
        };
        array.validate()?;
        Ok(array)
    }

    fn size_in_bytes(&self) -> usize {
        u64::size_of().unwrap()
            + self.bitmaps.size_in_bytes()
            + self.offsets.size_in_bytes()
            + self.elts.size_in_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaChaRng;

    fn gen_random_indices(len: usize, universe: u32, seed: u64) -> Vec<u32> {
        let mut rng = ChaChaRng::seed_from_u64(seed);
        let picked: BTreeMap<u32, ()> = (0..len)
            .map(|_| (rng.gen_range(0..universe), ()))
            .collect();
        picked.into_keys().collect()
    }

    #[test]
    fn test_tiny() {
        let index = [10, 20, 30, 40, 50, 60];
        let a = CompactedArray::new(&index, index.to_vec()).unwrap();
        for &i in &index {
            assert_eq!(a.get(i), Some(&i));
        }
        assert_eq!(a.get(11), None);
        assert_eq!(a.get(64), None);
        assert_eq!(a.get(u32::MAX), None);
        assert_eq!(a.bitmaps().len(), 1);
        assert_eq!(a.offsets(), &[0]);
    }

    #[test]
    fn test_bucket_boundaries() {
        let index = [0, 63, 64, 127, 128, 300];
        let a = CompactedArray::new(&index, vec![0u8, 1, 2, 3, 4, 5]).unwrap();
        let bitmaps: [u64; 5] = [1 | 1 << 63, 1 | 1 << 63, 1, 0, 1 << 44];
        assert_eq!(a.bitmaps(), &bitmaps);
        assert_eq!(a.offsets(), &[0, 2, 4, 5, 5]);
        for (k, &i) in index.iter().enumerate() {
            assert_eq!(a.get(i), Some(&(k as u8)));
        }
        // Bucket 3 holds nothing.
        for i in 192..256 {
            assert_eq!(a.get(i), None);
            assert!(!a.contains(i));
        }
    }

    #[test]
    fn test_empty() {
        let a = CompactedArray::<u64>::new(&[], vec![]).unwrap();
        assert!(a.is_empty());
        assert_eq!(a.get(0), None);
        assert_eq!(a.iter().next(), None);
        assert_eq!(a, CompactedArray::new_empty());
    }

    #[test]
    fn test_length_mismatch() {
        let e = CompactedArray::new(&[1, 2], vec![1u32]).unwrap_err();
        assert_eq!(
            e.downcast_ref::<BuildError>(),
            Some(&BuildError::KeyValueLengthMismatch)
        );
    }

    #[test]
    fn test_out_of_order() {
        let e = CompactedArray::new(&[5, 3], vec![1u32, 2]).unwrap_err();
        assert_eq!(e.downcast_ref::<BuildError>(), Some(&BuildError::KeyOutOfOrder));
        assert_eq!(e.to_string(), "index: 3");
    }

    #[test]
    fn test_duplicate() {
        let e = CompactedArray::new(&[5, 5], vec![1u32, 2]).unwrap_err();
        assert_eq!(e.downcast_ref::<BuildError>(), Some(&BuildError::DuplicateKey));
    }

    #[test]
    fn test_random_against_map() {
        for seed in 0..20 {
            let index = gen_random_indices(1000, 50_000, seed);
            let elts: Vec<u64> = index.iter().map(|&i| u64::from(i) * 3).collect();
            let a = CompactedArray::new(&index, elts).unwrap();
            let oracle: BTreeMap<u32, u64> = index.iter().map(|&i| (i, u64::from(i) * 3)).collect();

            assert_eq!(a.len(), oracle.len());
            for i in 0..50_100 {
                assert_eq!(a.get(i), oracle.get(&i));
            }
            let pairs: Vec<(u32, u64)> = a.iter().map(|(i, &e)| (i, e)).collect();
            assert_eq!(pairs, oracle.into_iter().collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_offsets_are_prefix_popcounts() {
        let index = gen_random_indices(500, 10_000, 42);
        let a = CompactedArray::new(&index, index.clone()).unwrap();
        let mut total = 0;
        for (bucket, &word) in a.bitmaps().iter().enumerate() {
            assert_eq!(a.offsets()[bucket], total);
            total += word.count_ones() as u64;
        }
        assert_eq!(total as usize, a.len());
    }

    #[test]
    fn test_serialize() {
        let mut bytes = vec![];
        let index = gen_random_indices(300, 5_000, 7);
        let a = CompactedArray::new(&index, index.clone()).unwrap();
        let size = a.serialize_into(&mut bytes).unwrap();
        let other = CompactedArray::<u32>::deserialize_from(&bytes[..]).unwrap();
        assert_eq!(a, other);
        assert_eq!(size, bytes.len());
        assert_eq!(size, a.size_in_bytes());
    }

    fn raw_payload(cnt: u64, bitmaps: Vec<u64>, offsets: Vec<u64>, elts: Vec<u32>) -> Vec<u8> {
        let mut bytes = vec![];
        cnt.serialize_into(&mut bytes).unwrap();
        bitmaps.serialize_into(&mut bytes).unwrap();
        offsets.serialize_into(&mut bytes).unwrap();
        elts.serialize_into(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_deserialize_corrupted() {
        let cases = [
            (
                raw_payload(5, vec![0b111], vec![3], vec![]),
                "element count differs from cnt",
            ),
            (
                raw_payload(1, vec![1], vec![], vec![9]),
                "offsets and bitmaps differ in length",
            ),
            (
                raw_payload(2, vec![1, 1], vec![0, 3], vec![8, 9]),
                "offset is not the count of earlier buckets",
            ),
            (
                raw_payload(2, vec![0b111], vec![0], vec![8, 9]),
                "set bits differ from cnt",
            ),
        ];
        for (bytes, reason) in cases {
            let e = CompactedArray::<u32>::deserialize_from(&bytes[..]).unwrap_err();
            assert_eq!(
                e.downcast_ref::<CodecError>(),
                Some(&CodecError::CorruptedArray { reason })
            );
        }

        let bytes = raw_payload(2, vec![0, 0b101], vec![0, 0], vec![8, 9]);
        let a = CompactedArray::<u32>::deserialize_from(&bytes[..]).unwrap();
        assert_eq!(a.get(66), Some(&9));
    }
}
