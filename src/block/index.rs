//! Index & Bloom Engine (C4): per-block metadata, inverted indexes,
//! per-block bloom filters, and file statistics — all serialized together
//! as the file's index section.
//!
//! A footer-driven metaindex, generalized from a single sorted key index
//! to three identity dimensions (`kind`, `namespace`, `group`) plus
//! per-block bloom filters.

use std::collections::BTreeMap;

use bloomfilter::Bloom;

use crate::encoding::{self, Decode, Encode, EncodingError};

use super::CodecError;

/// Target false-positive rate for per-block bloom filters (§4.4).
pub const BLOOM_FALSE_POSITIVE_RATE: f64 = 0.05;

/// Metadata describing one sealed, compressed block within a file.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockMetadata {
    pub ordinal: u32,
    pub offset: u64,
    pub compressed_length: u64,
    pub uncompressed_length: u64,
    pub event_count: u64,
    pub min_timestamp: i64,
    pub max_timestamp: i64,
}

impl Encode for BlockMetadata {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        self.ordinal.encode_to(buf)?;
        self.offset.encode_to(buf)?;
        self.compressed_length.encode_to(buf)?;
        self.uncompressed_length.encode_to(buf)?;
        self.event_count.encode_to(buf)?;
        self.min_timestamp.encode_to(buf)?;
        self.max_timestamp.encode_to(buf)?;
        Ok(())
    }
}

impl Decode for BlockMetadata {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut off = 0;
        let (ordinal, n) = u32::decode_from(&buf[off..])?;
        off += n;
        let (offset, n) = u64::decode_from(&buf[off..])?;
        off += n;
        let (compressed_length, n) = u64::decode_from(&buf[off..])?;
        off += n;
        let (uncompressed_length, n) = u64::decode_from(&buf[off..])?;
        off += n;
        let (event_count, n) = u64::decode_from(&buf[off..])?;
        off += n;
        let (min_timestamp, n) = i64::decode_from(&buf[off..])?;
        off += n;
        let (max_timestamp, n) = i64::decode_from(&buf[off..])?;
        off += n;
        Ok((
            Self {
                ordinal,
                offset,
                compressed_length,
                uncompressed_length,
                event_count,
                min_timestamp,
                max_timestamp,
            },
            off,
        ))
    }
}

/// One identity dimension's posting lists: `value -> sorted block ordinals`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostingList(pub BTreeMap<String, Vec<u32>>);

impl Encode for PostingList {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        let len = u32::try_from(self.0.len())
            .map_err(|_| EncodingError::Custom("posting list too large".into()))?;
        len.encode_to(buf)?;
        for (value, ordinals) in &self.0 {
            value.encode_to(buf)?;
            let count = u32::try_from(ordinals.len())
                .map_err(|_| EncodingError::Custom("posting list entry too large".into()))?;
            count.encode_to(buf)?;
            for ord in ordinals {
                ord.encode_to(buf)?;
            }
        }
        Ok(())
    }
}

impl Decode for PostingList {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut off = 0;
        let (len, n) = u32::decode_from(&buf[off..])?;
        off += n;
        let mut map = BTreeMap::new();
        for _ in 0..len {
            let (value, n) = String::decode_from(&buf[off..])?;
            off += n;
            let (count, n) = u32::decode_from(&buf[off..])?;
            off += n;
            let mut ordinals = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let (ord, n) = u32::decode_from(&buf[off..])?;
                off += n;
                ordinals.push(ord);
            }
            map.insert(value, ordinals);
        }
        Ok((Self(map), off))
    }
}

/// Inverted index over the three identity dimensions named in §4.4.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvertedIndex {
    pub kind_to_blocks: PostingList,
    pub namespace_to_blocks: PostingList,
    pub group_to_blocks: PostingList,
}

impl InvertedIndex {
    /// Builds the index with a single pass over `blocks`, given a closure
    /// that yields the distinct `(kind, namespace, group)` values observed
    /// in each block.
    pub fn build<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (u32, &'a str, &'a str, &'a str)>,
    {
        let mut index = Self::default();
        for (ordinal, kind, namespace, group) in entries {
            push_sorted_unique(&mut index.kind_to_blocks.0, kind, ordinal);
            push_sorted_unique(&mut index.namespace_to_blocks.0, namespace, ordinal);
            push_sorted_unique(&mut index.group_to_blocks.0, group, ordinal);
        }
        index
    }
}

fn push_sorted_unique(map: &mut BTreeMap<String, Vec<u32>>, key: &str, ordinal: u32) {
    let list = map.entry(key.to_string()).or_default();
    if list.last() != Some(&ordinal) {
        list.push(ordinal);
    }
}

impl Encode for InvertedIndex {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        self.kind_to_blocks.encode_to(buf)?;
        self.namespace_to_blocks.encode_to(buf)?;
        self.group_to_blocks.encode_to(buf)?;
        Ok(())
    }
}

impl Decode for InvertedIndex {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut off = 0;
        let (kind_to_blocks, n) = PostingList::decode_from(&buf[off..])?;
        off += n;
        let (namespace_to_blocks, n) = PostingList::decode_from(&buf[off..])?;
        off += n;
        let (group_to_blocks, n) = PostingList::decode_from(&buf[off..])?;
        off += n;
        Ok((
            Self {
                kind_to_blocks,
                namespace_to_blocks,
                group_to_blocks,
            },
            off,
        ))
    }
}

/// Three bloom filters for one block, one per identity dimension.
pub struct BlockBloomSet {
    pub kind: Bloom<String>,
    pub namespace: Bloom<String>,
    pub group: Bloom<String>,
}

impl BlockBloomSet {
    pub fn build(kinds: &[String], namespaces: &[String], groups: &[String]) -> Self {
        Self {
            kind: build_bloom(kinds),
            namespace: build_bloom(namespaces),
            group: build_bloom(groups),
        }
    }

    pub fn might_contain_kind(&self, v: &str) -> bool {
        self.kind.check(v)
    }

    pub fn might_contain_namespace(&self, v: &str) -> bool {
        self.namespace.check(v)
    }

    pub fn might_contain_group(&self, v: &str) -> bool {
        self.group.check(v)
    }
}

fn build_bloom(values: &[String]) -> Bloom<String> {
    let capacity = values.len().max(1);
    let mut bloom = match Bloom::new_for_fp_rate(capacity, BLOOM_FALSE_POSITIVE_RATE) {
        Ok(b) => b,
        Err(_) => Bloom::new(1024, capacity),
    };
    for v in values {
        bloom.set(v);
    }
    bloom
}

impl Encode for BlockBloomSet {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        self.kind.as_slice().to_vec().encode_to(buf)?;
        self.namespace.as_slice().to_vec().encode_to(buf)?;
        self.group.as_slice().to_vec().encode_to(buf)?;
        Ok(())
    }
}

impl Decode for BlockBloomSet {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut off = 0;
        let (kind_bytes, n) = <Vec<u8>>::decode_from(&buf[off..])?;
        off += n;
        let (namespace_bytes, n) = <Vec<u8>>::decode_from(&buf[off..])?;
        off += n;
        let (group_bytes, n) = <Vec<u8>>::decode_from(&buf[off..])?;
        off += n;
        let kind = Bloom::from_slice(&kind_bytes)
            .map_err(|e| EncodingError::Custom(format!("bloom decode: {e}")))?;
        let namespace = Bloom::from_slice(&namespace_bytes)
            .map_err(|e| EncodingError::Custom(format!("bloom decode: {e}")))?;
        let group = Bloom::from_slice(&group_bytes)
            .map_err(|e| EncodingError::Custom(format!("bloom decode: {e}")))?;
        Ok((
            Self {
                kind,
                namespace,
                group,
            },
            off,
        ))
    }
}

/// Per-block bloom filters, indexed by block ordinal.
#[derive(Default)]
pub struct BlockBlooms(pub Vec<BlockBloomSet>);

impl Encode for BlockBlooms {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        encoding::encode_vec(&self.0, buf)
    }
}

impl Decode for BlockBlooms {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let (sets, consumed) = encoding::decode_vec(buf)?;
        Ok((Self(sets), consumed))
    }
}

/// File-level aggregate statistics, recomputed at finalize time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statistics {
    pub total_blocks: u64,
    pub total_events: u64,
    pub total_uncompressed_bytes: u64,
    pub total_compressed_bytes: u64,
    pub unique_kinds: u64,
    pub unique_namespaces: u64,
    pub unique_groups: u64,
    pub timestamp_min: i64,
    pub timestamp_max: i64,
}

impl Statistics {
    pub fn compression_ratio(&self) -> f64 {
        if self.total_compressed_bytes == 0 {
            return 0.0;
        }
        self.total_uncompressed_bytes as f64 / self.total_compressed_bytes as f64
    }
}

impl Encode for Statistics {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        self.total_blocks.encode_to(buf)?;
        self.total_events.encode_to(buf)?;
        self.total_uncompressed_bytes.encode_to(buf)?;
        self.total_compressed_bytes.encode_to(buf)?;
        self.unique_kinds.encode_to(buf)?;
        self.unique_namespaces.encode_to(buf)?;
        self.unique_groups.encode_to(buf)?;
        self.timestamp_min.encode_to(buf)?;
        self.timestamp_max.encode_to(buf)?;
        Ok(())
    }
}

impl Decode for Statistics {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut off = 0;
        let (total_blocks, n) = u64::decode_from(&buf[off..])?;
        off += n;
        let (total_events, n) = u64::decode_from(&buf[off..])?;
        off += n;
        let (total_uncompressed_bytes, n) = u64::decode_from(&buf[off..])?;
        off += n;
        let (total_compressed_bytes, n) = u64::decode_from(&buf[off..])?;
        off += n;
        let (unique_kinds, n) = u64::decode_from(&buf[off..])?;
        off += n;
        let (unique_namespaces, n) = u64::decode_from(&buf[off..])?;
        off += n;
        let (unique_groups, n) = u64::decode_from(&buf[off..])?;
        off += n;
        let (timestamp_min, n) = i64::decode_from(&buf[off..])?;
        off += n;
        let (timestamp_max, n) = i64::decode_from(&buf[off..])?;
        off += n;
        Ok((
            Self {
                total_blocks,
                total_events,
                total_uncompressed_bytes,
                total_compressed_bytes,
                unique_kinds,
                unique_namespaces,
                unique_groups,
                timestamp_min,
                timestamp_max,
            },
            off,
        ))
    }
}

/// Format version of the index section blob, independent of the file
/// header's format version.
pub const INDEX_SECTION_VERSION: u32 = 1;

/// The complete index section: block metadata, inverted indexes, per-block
/// bloom filters, and file statistics, serialized as one self-describing
/// blob between the last block and the file footer.
#[derive(Default)]
pub struct IndexSection {
    pub version: u32,
    pub blocks: Vec<BlockMetadata>,
    pub inverted_index: InvertedIndex,
    pub blooms: BlockBlooms,
    pub statistics: Statistics,
}

impl Encode for IndexSection {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        self.version.encode_to(buf)?;
        encoding::encode_vec(&self.blocks, buf)?;
        self.inverted_index.encode_to(buf)?;
        self.blooms.encode_to(buf)?;
        self.statistics.encode_to(buf)?;
        Ok(())
    }
}

impl Decode for IndexSection {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut off = 0;
        let (version, n) = u32::decode_from(&buf[off..])?;
        off += n;
        let (blocks, n) = encoding::decode_vec::<BlockMetadata>(&buf[off..])?;
        off += n;
        let (inverted_index, n) = InvertedIndex::decode_from(&buf[off..])?;
        off += n;
        let (blooms, n) = BlockBlooms::decode_from(&buf[off..])?;
        off += n;
        let (statistics, n) = Statistics::decode_from(&buf[off..])?;
        off += n;
        Ok((
            Self {
                version,
                blocks,
                inverted_index,
                blooms,
                statistics,
            },
            off,
        ))
    }
}

/// Serializes the index section.
pub fn write_index_section(section: &IndexSection) -> Result<Vec<u8>, CodecError> {
    Ok(encoding::encode_to_vec(section)?)
}

/// Parses the index section from `buf`.
pub fn read_index_section(buf: &[u8]) -> Result<IndexSection, CodecError> {
    let (section, _) =
        encoding::decode_from_slice::<IndexSection>(buf).map_err(|e| CodecError::CorruptIndex(e.to_string()))?;
    Ok(section)
}

/// A filter predicate over the three identity dimensions. Each field holds
/// the values to match within that dimension (OR-within-dimension); fields
/// left empty place no constraint on that dimension.
#[derive(Debug, Clone, Default)]
pub struct DimensionFilter {
    pub kinds: Vec<String>,
    pub namespaces: Vec<String>,
    pub groups: Vec<String>,
}

impl DimensionFilter {
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty() && self.namespaces.is_empty() && self.groups.is_empty()
    }
}

/// Result of computing candidate blocks: the set of ordinals selected for
/// decompression, and the strategy that produced them (for observability).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateStrategy {
    /// No filter was specified; every block is a candidate.
    AllBlocks,
    /// Inverted-index-driven exact candidate set.
    InvertedIndex,
    /// Inverted index absent/corrupt; bloom-filter-driven possibly-larger set.
    BloomFallback,
}

/// Computes the candidate block ordinals for `filter` against `section`,
/// following §4.4's selection algorithm: empty filter → all blocks;
/// otherwise AND across dimensions, OR within a dimension via the inverted
/// index, falling back to bloom filters if the index is unusable.
pub fn candidate_blocks(section: &IndexSection, filter: &DimensionFilter) -> (Vec<u32>, CandidateStrategy) {
    let all_ordinals: Vec<u32> = section.blocks.iter().map(|b| b.ordinal).collect();

    if filter.is_empty() {
        return (all_ordinals, CandidateStrategy::AllBlocks);
    }

    if inverted_index_usable(section) {
        let mut candidates: Option<Vec<u32>> = None;
        for (values, postings) in [
            (&filter.kinds, &section.inverted_index.kind_to_blocks),
            (&filter.namespaces, &section.inverted_index.namespace_to_blocks),
            (&filter.groups, &section.inverted_index.group_to_blocks),
        ] {
            if values.is_empty() {
                continue;
            }
            let mut union = Vec::new();
            for value in values {
                if let Some(list) = postings.0.get(value) {
                    union.extend(list.iter().copied());
                }
            }
            union.sort_unstable();
            union.dedup();
            candidates = Some(match candidates {
                None => union,
                Some(existing) => intersect_sorted(&existing, &union),
            });
        }
        return (
            candidates.unwrap_or(all_ordinals),
            CandidateStrategy::InvertedIndex,
        );
    }

    if !section.blooms.0.is_empty() {
        let mut candidates = Vec::new();
        for block in &section.blocks {
            let idx = block.ordinal as usize;
            let Some(bloom_set) = section.blooms.0.get(idx) else {
                continue;
            };
            let kind_ok = filter.kinds.is_empty()
                || filter.kinds.iter().any(|v| bloom_set.might_contain_kind(v));
            let ns_ok = filter.namespaces.is_empty()
                || filter
                    .namespaces
                    .iter()
                    .any(|v| bloom_set.might_contain_namespace(v));
            let group_ok = filter.groups.is_empty()
                || filter.groups.iter().any(|v| bloom_set.might_contain_group(v));
            if kind_ok && ns_ok && group_ok {
                candidates.push(block.ordinal);
            }
        }
        return (candidates, CandidateStrategy::BloomFallback);
    }

    (all_ordinals, CandidateStrategy::AllBlocks)
}

fn inverted_index_usable(section: &IndexSection) -> bool {
    !section.inverted_index.kind_to_blocks.0.is_empty()
        || !section.inverted_index.namespace_to_blocks.0.is_empty()
        || !section.inverted_index.group_to_blocks.0.is_empty()
}

fn intersect_sorted(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}
