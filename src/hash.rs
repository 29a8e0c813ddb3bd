/// A 32-byte BLAKE3 hash used for content-addressing build inputs.
///
/// The pre-dex cache keys every entry by the hash of the input file's bytes,
/// so renaming or moving an unchanged library still hits the cache.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) struct Hash32([u8; 32]);

impl Hash32 {
    pub(crate) fn hash(buffer: impl AsRef<[u8]>) -> Self {
        Hash32(blake3::hash(buffer.as_ref()).into())
    }

    pub(crate) fn hash_file(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let hash = blake3::Hasher::new().update_mmap(path)?.finalize();
        Ok(Hash32(hash.into()))
    }

    pub(crate) fn to_hex(self) -> String {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        let mut acc = vec![0u8; 64];

        for (i, &byte) in self.0.iter().enumerate() {
            acc[i * 2] = HEX[(byte >> 4) as usize];
            acc[i * 2 + 1] = HEX[(byte & 0xF) as usize];
        }

        String::from_utf8(acc).unwrap()
    }
}

impl std::fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash32({})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_same_hash() {
        assert_eq!(Hash32::hash(b"classes"), Hash32::hash(b"classes"));
        assert_ne!(Hash32::hash(b"classes"), Hash32::hash(b"classes2"));
    }

    #[test]
    fn hex_is_stable() {
        let hex = Hash32::hash(b"abc").to_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hex, Hash32::hash(b"abc").to_hex());
    }
}
