use std::cmp::Ordering;

/// Orders the fixed-size keys stored in B+Tree pages.
pub trait KeyComparator: Send + Sync {
    /// Width in bytes of every key this comparator orders.
    fn key_size(&self) -> usize;

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

/// Keys are 4-byte little-endian `i32`s.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerComparator;

impl IntegerComparator {
    pub fn encode(key: i32) -> [u8; 4] {
        key.to_le_bytes()
    }

    pub fn decode(key: &[u8]) -> i32 {
        i32::from_le_bytes([key[0], key[1], key[2], key[3]])
    }
}

impl KeyComparator for IntegerComparator {
    fn key_size(&self) -> usize {
        4
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        if a.len() < 4 || b.len() < 4 {
            return a.len().cmp(&b.len());
        }

        Self::decode(a).cmp(&Self::decode(b))
    }
}

/// Keys are `key_size` raw bytes compared lexicographically.
#[derive(Debug, Clone, Copy)]
pub struct BytewiseComparator {
    key_size: usize,
}

impl BytewiseComparator {
    pub fn new(key_size: usize) -> Self {
        Self { key_size }
    }
}

impl KeyComparator for BytewiseComparator {
    fn key_size(&self) -> usize {
        self.key_size
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_comparator_is_signed() {
        let cmp = IntegerComparator;
        let neg = IntegerComparator::encode(-5);
        let pos = IntegerComparator::encode(3);
        assert_eq!(cmp.compare(&neg, &pos), Ordering::Less);
        assert_eq!(cmp.compare(&pos, &pos), Ordering::Equal);
        assert_eq!(IntegerComparator::decode(&neg), -5);
    }

    #[test]
    fn test_bytewise_comparator() {
        let cmp = BytewiseComparator::new(3);
        assert_eq!(cmp.key_size(), 3);
        assert_eq!(cmp.compare(b"abc", b"abd"), Ordering::Less);
        assert_eq!(cmp.compare(b"b\0\0", b"abc"), Ordering::Greater);
    }
}
