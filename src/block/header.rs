//! Fixed-width file header and footer, per spec §6.1.
//!
//! Both structures use fixed-width, null-padded byte arrays for their string
//! fields instead of the length-prefixed `String` encoding the rest of the
//! wire format uses — the header and footer must each occupy an exact,
//! predictable number of bytes so a reader can seek straight to the footer
//! from `file_len - FILE_FOOTER_SIZE` without having parsed anything else.

use crc32fast::Hasher as Crc32;

use crate::encoding::{self, Decode, Encode, EncodingError};

use super::{CodecError, FILE_FOOTER_MAGIC, FILE_HEADER_MAGIC, FORMAT_VERSION_MAJOR};

const VERSION_FIELD_LEN: usize = 4;
const COMPRESSION_FIELD_LEN: usize = 16;
const ENCODING_FIELD_LEN: usize = 16;
const CHECKSUM_FIELD_LEN: usize = 256;
const FOOTER_RESERVED_LEN: usize = 46;
const HEADER_RESERVED_LEN: usize = 16;

/// Packs `s` into a fixed-size, zero-padded byte array. `s` must fit in `N`
/// bytes (callers only ever pass short fixed tokens like `"zstd"`).
fn pack_fixed<const N: usize>(s: &str) -> Result<[u8; N], CodecError> {
    let bytes = s.as_bytes();
    if bytes.len() > N {
        return Err(CodecError::Internal(format!(
            "fixed-width field overflow: {s:?} exceeds {N} bytes"
        )));
    }
    let mut arr = [0u8; N];
    arr[..bytes.len()].copy_from_slice(bytes);
    Ok(arr)
}

/// Unpacks a zero-padded fixed-size byte array back into a `String`,
/// trimming trailing NUL bytes.
fn unpack_fixed<const N: usize>(arr: &[u8; N]) -> Result<String, CodecError> {
    let end = arr.iter().position(|&b| b == 0).unwrap_or(N);
    String::from_utf8(arr[..end].to_vec())
        .map_err(|e| CodecError::Internal(format!("non-utf8 fixed field: {e}")))
}

/// File header, written once at the start of every segment file.
///
/// On-disk size: [`super::FILE_HEADER_SIZE`] (77) bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub version: String,
    pub creation_timestamp_ns: i64,
    pub compression: String,
    pub block_size_target: u64,
    pub encoding_format: String,
    pub checksum_enabled: bool,
}

impl FileHeader {
    pub fn new(
        compression: super::CompressionAlgo,
        block_size_target: u64,
        checksum_enabled: bool,
        creation_timestamp_ns: i64,
    ) -> Self {
        Self {
            version: format!("{FORMAT_VERSION_MAJOR}.0"),
            creation_timestamp_ns,
            compression: compression.as_str().to_string(),
            block_size_target,
            encoding_format: "json".to_string(),
            checksum_enabled,
        }
    }

    pub fn compression_algo(&self) -> Result<super::CompressionAlgo, CodecError> {
        super::CompressionAlgo::parse(&self.compression)
    }

    /// Checks the format-version major number; minor differences are
    /// accepted.
    pub fn check_version(&self) -> Result<(), CodecError> {
        let major = self
            .version
            .split('.')
            .next()
            .and_then(|s| s.parse::<u32>().ok());
        match major {
            Some(m) if m == FORMAT_VERSION_MAJOR => Ok(()),
            _ => Err(CodecError::UnsupportedVersion(self.version.clone())),
        }
    }
}

impl Encode for FileHeader {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        buf.extend_from_slice(&FILE_HEADER_MAGIC);
        let version: [u8; VERSION_FIELD_LEN] = pack_fixed(&self.version)
            .map_err(|e| EncodingError::Custom(e.to_string()))?;
        buf.extend_from_slice(&version);
        self.creation_timestamp_ns.encode_to(buf)?;
        let compression: [u8; COMPRESSION_FIELD_LEN] = pack_fixed(&self.compression)
            .map_err(|e| EncodingError::Custom(e.to_string()))?;
        buf.extend_from_slice(&compression);
        self.block_size_target.encode_to(buf)?;
        let encoding_format: [u8; ENCODING_FIELD_LEN] = pack_fixed(&self.encoding_format)
            .map_err(|e| EncodingError::Custom(e.to_string()))?;
        buf.extend_from_slice(&encoding_format);
        self.checksum_enabled.encode_to(buf)?;
        buf.extend_from_slice(&[0u8; HEADER_RESERVED_LEN]);
        Ok(())
    }
}

impl Decode for FileHeader {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut off = 0;
        let (magic, n) = <[u8; 8]>::decode_from(&buf[off..])?;
        off += n;
        if magic != FILE_HEADER_MAGIC {
            return Err(EncodingError::Custom("file header magic mismatch".into()));
        }
        let (version_raw, n) = <[u8; VERSION_FIELD_LEN]>::decode_from(&buf[off..])?;
        off += n;
        let version =
            unpack_fixed(&version_raw).map_err(|e| EncodingError::Custom(e.to_string()))?;
        let (creation_timestamp_ns, n) = i64::decode_from(&buf[off..])?;
        off += n;
        let (compression_raw, n) = <[u8; COMPRESSION_FIELD_LEN]>::decode_from(&buf[off..])?;
        off += n;
        let compression =
            unpack_fixed(&compression_raw).map_err(|e| EncodingError::Custom(e.to_string()))?;
        let (block_size_target, n) = u64::decode_from(&buf[off..])?;
        off += n;
        let (encoding_raw, n) = <[u8; ENCODING_FIELD_LEN]>::decode_from(&buf[off..])?;
        off += n;
        let encoding_format =
            unpack_fixed(&encoding_raw).map_err(|e| EncodingError::Custom(e.to_string()))?;
        let (checksum_enabled, n) = bool::decode_from(&buf[off..])?;
        off += n;
        let (_reserved, n) = <[u8; HEADER_RESERVED_LEN]>::decode_from(&buf[off..])?;
        off += n;
        Ok((
            Self {
                version,
                creation_timestamp_ns,
                compression,
                block_size_target,
                encoding_format,
                checksum_enabled,
            },
            off,
        ))
    }
}

/// File footer, written once at the very end of a segment file. Its
/// presence with a valid magic and checksum is the atomic commit point:
/// a file lacking it is invisible to readers.
///
/// On-disk size: [`super::FILE_FOOTER_SIZE`] (324) bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFooter {
    pub index_section_offset: u64,
    pub index_section_length: u64,
    pub checksum: String,
}

impl FileFooter {
    fn body_bytes(&self) -> Result<Vec<u8>, EncodingError> {
        let mut buf = Vec::new();
        self.index_section_offset.encode_to(&mut buf)?;
        self.index_section_length.encode_to(&mut buf)?;
        let checksum: [u8; CHECKSUM_FIELD_LEN] = pack_fixed(&self.checksum)
            .map_err(|e| EncodingError::Custom(e.to_string()))?;
        buf.extend_from_slice(&checksum);
        buf.extend_from_slice(&[0u8; FOOTER_RESERVED_LEN]);
        Ok(buf)
    }
}

impl Encode for FileFooter {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        buf.extend_from_slice(&self.body_bytes()?);
        buf.extend_from_slice(&FILE_FOOTER_MAGIC);
        Ok(())
    }
}

impl Decode for FileFooter {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut off = 0;
        let (index_section_offset, n) = u64::decode_from(&buf[off..])?;
        off += n;
        let (index_section_length, n) = u64::decode_from(&buf[off..])?;
        off += n;
        let (checksum_raw, n) = <[u8; CHECKSUM_FIELD_LEN]>::decode_from(&buf[off..])?;
        off += n;
        let checksum =
            unpack_fixed(&checksum_raw).map_err(|e| EncodingError::Custom(e.to_string()))?;
        let (_reserved, n) = <[u8; FOOTER_RESERVED_LEN]>::decode_from(&buf[off..])?;
        off += n;
        let (magic, n) = <[u8; 6]>::decode_from(&buf[off..])?;
        off += n;
        if magic != FILE_FOOTER_MAGIC {
            return Err(EncodingError::Custom("file footer magic mismatch".into()));
        }
        Ok((
            Self {
                index_section_offset,
                index_section_length,
                checksum,
            },
            off,
        ))
    }
}

/// Computes the checksum string stored in the footer: a hex-encoded CRC32
/// over the index section bytes.
pub fn compute_index_checksum(index_section_bytes: &[u8]) -> String {
    let mut hasher = Crc32::new();
    hasher.update(index_section_bytes);
    format!("{:08x}", hasher.finalize())
}

/// Writes the file header to `buf`.
pub fn write_file_header(header: &FileHeader) -> Result<Vec<u8>, CodecError> {
    header.check_version()?;
    let bytes = encoding::encode_to_vec(header)?;
    debug_assert_eq!(bytes.len(), super::FILE_HEADER_SIZE);
    Ok(bytes)
}

/// Reads and validates the file header from the start of `buf`.
pub fn read_file_header(buf: &[u8]) -> Result<FileHeader, CodecError> {
    if buf.len() < super::FILE_HEADER_SIZE {
        return Err(CodecError::CorruptFooter("file too small for header".into()));
    }
    let (header, _) = encoding::decode_from_slice::<FileHeader>(buf)
        .map_err(|e| CodecError::CorruptFooter(e.to_string()))?;
    header.check_version()?;
    header.compression_algo()?;
    Ok(header)
}

/// Writes the file footer to `buf`.
pub fn write_file_footer(footer: &FileFooter) -> Result<Vec<u8>, CodecError> {
    let bytes = encoding::encode_to_vec(footer)?;
    debug_assert_eq!(bytes.len(), super::FILE_FOOTER_SIZE);
    Ok(bytes)
}

/// Reads and validates the file footer occupying the last
/// [`super::FILE_FOOTER_SIZE`] bytes of `buf`.
pub fn read_file_footer(buf: &[u8]) -> Result<FileFooter, CodecError> {
    if buf.len() < super::FILE_FOOTER_SIZE {
        return Err(CodecError::CorruptFooter("file too small for footer".into()));
    }
    let start = buf.len() - super::FILE_FOOTER_SIZE;
    let (footer, _) = encoding::decode_from_slice::<FileFooter>(&buf[start..])
        .map_err(|e| CodecError::CorruptFooter(e.to_string()))?;
    Ok(footer)
}
