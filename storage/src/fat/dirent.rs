use super::Cluster;

/// Size of a directory entry in bytes (always 32 bytes)
pub const DIR_ENTRY_SIZE: usize = 32;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
/// Directory entry attributes
pub struct Attributes(u8);

impl Attributes {
    /// Read-only attribute
    pub const READ_ONLY: u8 = 0x01;
    /// Hidden attribute
    pub const HIDDEN: u8 = 0x02;
    /// System attribute
    pub const SYSTEM: u8 = 0x04;
    /// Volume ID attribute
    pub const VOLUME_ID: u8 = 0x08;
    /// Directory attribute
    pub const DIRECTORY: u8 = 0x10;
    /// Archive attribute
    pub const ARCHIVE: u8 = 0x20;
    /// Long file name attribute
    pub const LONG_NAME: u8 = Self::READ_ONLY | Self::HIDDEN | Self::SYSTEM | Self::VOLUME_ID;

    #[must_use]
    #[inline]
    /// Creates a new attribute set
    pub const fn new(attributes: u8) -> Self {
        Self(attributes)
    }

    #[must_use]
    #[inline]
    pub const fn bits(&self) -> u8 {
        self.0
    }

    #[must_use]
    #[inline]
    /// Returns true if the entry is a volume ID
    pub const fn is_volume_id(&self) -> bool {
        self.0 & Self::VOLUME_ID != 0
    }

    #[must_use]
    #[inline]
    /// Returns true if the entry is a directory
    pub const fn is_directory(&self) -> bool {
        self.0 & Self::DIRECTORY != 0
    }

    #[must_use]
    #[inline]
    /// Returns true if the entry is a long file name
    pub const fn is_long_name(&self) -> bool {
        self.0 & Self::LONG_NAME == Self::LONG_NAME
    }
}

/// FAT16 root directory entry
///
/// Only the name, attributes, first cluster and size are meaningful here:
/// the 14 bytes in between (timestamps, FAT32 high cluster word) are written as zeros.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    /// 8.3 name, space padded
    name: [u8; 11],
    attributes: Attributes,
    first_cluster: Cluster,
    /// File size in bytes
    size: u32,
}

impl DirEntry {
    /// Deleted entry marker (first byte)
    pub const DELETED_ENTRY: u8 = 0xE5;
    /// End of directory marker (first byte)
    pub const END_OF_ENTRIES: u8 = 0x00;

    const ATTRIBUTES_OFFSET: usize = 11;
    const FIRST_CLUSTER_OFFSET: usize = 26;
    const SIZE_OFFSET: usize = 28;

    #[must_use]
    #[inline]
    /// Creates a plain file entry
    pub const fn new_file(name: [u8; 11], first_cluster: Cluster, size: u32) -> Self {
        Self {
            name,
            attributes: Attributes::new(0),
            first_cluster,
            size,
        }
    }

    #[must_use]
    #[inline]
    pub const fn name(&self) -> &[u8; 11] {
        &self.name
    }

    #[must_use]
    #[inline]
    pub const fn attributes(&self) -> Attributes {
        self.attributes
    }

    #[must_use]
    #[inline]
    pub const fn first_cluster(&self) -> Cluster {
        self.first_cluster
    }

    #[must_use]
    #[inline]
    pub const fn size(&self) -> u32 {
        self.size
    }

    #[must_use]
    #[inline]
    /// Returns true if the slot has never been used
    pub const fn is_free(&self) -> bool {
        self.name[0] == Self::END_OF_ENTRIES
    }

    #[must_use]
    #[inline]
    /// Returns true if the entry is deleted
    pub const fn is_deleted(&self) -> bool {
        self.name[0] == Self::DELETED_ENTRY
    }

    #[must_use]
    #[inline]
    /// Returns true if the entry is valid
    pub const fn is_valid(&self) -> bool {
        !self.is_free() && !self.is_deleted()
    }

    #[must_use]
    #[inline]
    /// Returns true if the entry is a file
    pub const fn is_file(&self) -> bool {
        self.is_valid()
            && !self.attributes.is_long_name()
            && !self.attributes.is_directory()
            && !self.attributes.is_volume_id()
    }

    #[must_use]
    /// Returns the name as `BASE.EXT`, without padding
    pub fn file_name(&self) -> String {
        let base = String::from_utf8_lossy(&self.name[..8]);
        let ext = String::from_utf8_lossy(&self.name[8..]);
        let (base, ext) = (base.trim_end(), ext.trim_end());
        if ext.is_empty() {
            base.to_owned()
        } else {
            format!("{base}.{ext}")
        }
    }

    #[must_use]
    pub fn encode(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut raw = [0u8; DIR_ENTRY_SIZE];
        raw[..11].copy_from_slice(&self.name);
        raw[Self::ATTRIBUTES_OFFSET] = self.attributes.bits();
        raw[Self::FIRST_CLUSTER_OFFSET..Self::SIZE_OFFSET]
            .copy_from_slice(&self.first_cluster.value().to_le_bytes());
        raw[Self::SIZE_OFFSET..].copy_from_slice(&self.size.to_le_bytes());
        raw
    }

    #[must_use]
    pub fn decode(raw: &[u8; DIR_ENTRY_SIZE]) -> Self {
        let mut name = [0u8; 11];
        name.copy_from_slice(&raw[..11]);
        let cluster = &raw[Self::FIRST_CLUSTER_OFFSET..Self::SIZE_OFFSET];
        let size = &raw[Self::SIZE_OFFSET..];
        Self {
            name,
            attributes: Attributes::new(raw[Self::ATTRIBUTES_OFFSET]),
            first_cluster: Cluster::new(u16::from_le_bytes([cluster[0], cluster[1]])),
            size: u32::from_le_bytes([size[0], size[1], size[2], size[3]]),
        }
    }
}

/// Renders a raw 8.3 name as `BASE    .EXT`, padding included.
#[must_use]
pub fn padded_name(name: &[u8; 11]) -> String {
    format!(
        "{}.{}",
        String::from_utf8_lossy(&name[..8]),
        String::from_utf8_lossy(&name[8..])
    )
}

/// Encodes `filename` as an 11-byte, space padded 8.3 name.
///
/// Works on the UTF-8 bytes of the name: the base is cut at 8 bytes and the
/// extension at 3, and each byte of a non-ASCII character becomes one `_`.
/// Anything after a second `.` is dropped. Distinct long names may collide.
#[must_use]
pub fn encode_short_name(filename: &str) -> [u8; 11] {
    let mut parts = filename.as_bytes().split(|&b| b == b'.');
    let base = parts.next().unwrap_or_default();
    let ext = parts.next().unwrap_or_default();

    let mut name = [b' '; 11];
    for (slot, &b) in name[..8].iter_mut().zip(base) {
        *slot = short_name_byte(b);
    }
    for (slot, &b) in name[8..].iter_mut().zip(ext) {
        *slot = short_name_byte(b);
    }
    name
}

/// Maps a byte onto the 8.3 alphabet.
const fn short_name_byte(b: u8) -> u8 {
    match b {
        b'0'..=b'9' | b'A'..=b'Z' | b'_' => b,
        b'a'..=b'z' => b.to_ascii_uppercase(),
        _ => b'_',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_names() {
        assert_eq!(&encode_short_name("readme.txt"), b"README  TXT");
        assert_eq!(&encode_short_name("a.b"), b"A       B  ");
        assert_eq!(&encode_short_name("KERNEL"), b"KERNEL     ");
        assert_eq!(&encode_short_name("boot_2.bin"), b"BOOT_2  BIN");
    }

    #[test]
    fn test_short_name_truncation() {
        assert_eq!(&encode_short_name("verylongname.text"), b"VERYLONGTEX");
        assert_eq!(&encode_short_name("archive.tar.gz"), b"ARCHIVE TAR");
        assert_eq!(&encode_short_name("initramfs.img"), b"INITRAMFIMG");
        // Silent collision.
        assert_eq!(
            encode_short_name("initramfs-a.img"),
            encode_short_name("initramfs-b.img")
        );
    }

    #[test]
    fn test_short_name_filter() {
        assert_eq!(&encode_short_name("my file!.c"), b"MY_FILE_C  ");
        assert_eq!(&encode_short_name("a-b.c+"), b"A_B     C_ ");
        assert_eq!(&encode_short_name(".profile"), b"        PRO");
        assert_eq!(&encode_short_name("trailing."), b"TRAILING   ");
    }

    #[test]
    fn test_short_name_non_ascii() {
        // One `_` per UTF-8 byte, and the length limits count bytes.
        assert_eq!(&encode_short_name("héllo.txt"), b"H__LLO  TXT");
        assert_eq!(&encode_short_name("résumé.pdf"), b"R__SUM__PDF");
        assert_eq!(&encode_short_name("naïve.txt"), b"NA__VE  TXT");
        assert_eq!(&encode_short_name("notes.é"), b"NOTES   __ ");
    }

    #[test]
    fn test_dir_entry_layout() {
        let entry = DirEntry::new_file(*b"README  TXT", Cluster::new(0x1234), 0x0102_0304);
        let raw = entry.encode();

        assert_eq!(&raw[..11], b"README  TXT");
        assert_eq!(raw[11], 0);
        assert!(raw[12..26].iter().all(|&b| b == 0));
        assert_eq!(&raw[26..28], &[0x34, 0x12]);
        assert_eq!(&raw[28..32], &[0x04, 0x03, 0x02, 0x01]);

        assert_eq!(DirEntry::decode(&raw), entry);
    }

    #[test]
    fn test_dir_entry_state() {
        let mut raw = [0u8; DIR_ENTRY_SIZE];
        assert!(DirEntry::decode(&raw).is_free());

        raw[..11].copy_from_slice(b"KERNEL  ELF");
        let entry = DirEntry::decode(&raw);
        assert!(entry.is_file());
        assert_eq!(entry.file_name(), "KERNEL.ELF");
        assert_eq!(padded_name(entry.name()), "KERNEL  .ELF");

        raw[0] = DirEntry::DELETED_ENTRY;
        assert!(DirEntry::decode(&raw).is_deleted());
        assert!(!DirEntry::decode(&raw).is_file());

        raw[0] = b'K';
        raw[11] = Attributes::VOLUME_ID;
        assert!(!DirEntry::decode(&raw).is_file());
        raw[11] = Attributes::LONG_NAME;
        assert!(DirEntry::decode(&raw).attributes().is_long_name());
        assert!(!DirEntry::decode(&raw).is_file());

        raw[..11].copy_from_slice(b"NOEXT      ");
        raw[11] = Attributes::ARCHIVE;
        assert_eq!(DirEntry::decode(&raw).file_name(), "NOEXT");
    }
}
