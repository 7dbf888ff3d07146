use crate::encoding::{decode_from_slice, encode_to_vec};
use crate::model::{Event, EventType, ResourceMetadata};

use super::header::{read_file_footer, read_file_header, FileFooter, FileHeader};
use super::index::{
    candidate_blocks, BlockMetadata, CandidateStrategy, DimensionFilter, IndexSection,
    InvertedIndex, Statistics,
};
use super::{read_block, write_block, CompressionAlgo};

fn sample_event(id: &str, kind: &str, namespace: &str) -> Event {
    Event {
        id: id.into(),
        timestamp: 1_000,
        event_type: EventType::Update,
        resource: ResourceMetadata {
            api_group: "apps".into(),
            api_version: "v1".into(),
            kind: kind.into(),
            namespace: namespace.into(),
            name: "web".into(),
            uid: format!("uid-{id}"),
        },
        data: b"{}".to_vec(),
    }
}

#[test]
fn file_header_round_trips() {
    let header = FileHeader::new(CompressionAlgo::Zstd, 256 * 1024, true, 1_735_726_500_000_000_000);
    let bytes = encode_to_vec(&header).unwrap();
    assert_eq!(bytes.len(), super::FILE_HEADER_SIZE);
    let (decoded, consumed) = decode_from_slice::<FileHeader>(&bytes).unwrap();
    assert_eq!(consumed, bytes.len());
    assert_eq!(decoded, header);

    let parsed = read_file_header(&bytes).unwrap();
    assert_eq!(parsed.compression_algo().unwrap(), CompressionAlgo::Zstd);
}

#[test]
fn file_header_rejects_unsupported_version() {
    let mut header = FileHeader::new(CompressionAlgo::Gzip, 256 * 1024, true, 1_735_726_500_000_000_000);
    header.version = "99.0".into();
    let bytes = encode_to_vec(&header).unwrap();
    let err = read_file_header(&bytes).unwrap_err();
    assert!(matches!(err, super::CodecError::UnsupportedVersion(_)));
}

#[test]
fn file_footer_round_trips() {
    let footer = FileFooter {
        index_section_offset: 77,
        index_section_length: 4096,
        checksum: "deadbeef".into(),
    };
    let bytes = encode_to_vec(&footer).unwrap();
    assert_eq!(bytes.len(), super::FILE_FOOTER_SIZE);
    let (decoded, consumed) = decode_from_slice::<FileFooter>(&bytes).unwrap();
    assert_eq!(consumed, bytes.len());
    assert_eq!(decoded, footer);

    let parsed = read_file_footer(&bytes).unwrap();
    assert_eq!(parsed, footer);
}

#[test]
fn file_footer_detects_magic_corruption() {
    let footer = FileFooter {
        index_section_offset: 0,
        index_section_length: 0,
        checksum: "abc".into(),
    };
    let mut bytes = encode_to_vec(&footer).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    assert!(read_file_footer(&bytes).is_err());
}

#[test]
fn block_round_trips() {
    let events = vec![
        sample_event("e1", "Pod", "default"),
        sample_event("e2", "Pod", "default"),
    ];
    let framed = write_block(&events, CompressionAlgo::Zstd).unwrap();
    let (decoded, consumed) = read_block(&framed, CompressionAlgo::Zstd).unwrap();
    assert_eq!(consumed, framed.len());
    assert_eq!(decoded.len(), events.len());
    assert_eq!(decoded[0].id, "e1");
    assert_eq!(decoded[1].id, "e2");
}

#[test]
fn block_gzip_round_trips() {
    let events = vec![sample_event("e1", "Node", "")];
    let framed = write_block(&events, CompressionAlgo::Gzip).unwrap();
    let (decoded, _) = read_block(&framed, CompressionAlgo::Gzip).unwrap();
    assert_eq!(decoded.len(), 1);
}

#[test]
fn block_checksum_mismatch_is_detected() {
    let events = vec![sample_event("e1", "Pod", "default")];
    let mut framed = write_block(&events, CompressionAlgo::Zstd).unwrap();
    let mid = framed.len() / 2;
    framed[mid] ^= 0xff;
    let err = read_block(&framed, CompressionAlgo::Zstd).unwrap_err();
    assert!(matches!(err, super::CodecError::CorruptBlock(_)));
}

fn sample_index_section() -> IndexSection {
    let blocks = vec![
        BlockMetadata {
            ordinal: 0,
            offset: 77,
            compressed_length: 100,
            uncompressed_length: 200,
            event_count: 2,
            min_timestamp: 1,
            max_timestamp: 2,
        },
        BlockMetadata {
            ordinal: 1,
            offset: 177,
            compressed_length: 50,
            uncompressed_length: 90,
            event_count: 1,
            min_timestamp: 3,
            max_timestamp: 3,
        },
    ];
    let inverted_index = InvertedIndex::build([
        (0u32, "Pod", "default", "core"),
        (0u32, "Pod", "kube-system", "core"),
        (1u32, "Node", "", "core"),
    ]);
    IndexSection {
        version: super::index::INDEX_SECTION_VERSION,
        blocks,
        inverted_index,
        blooms: Default::default(),
        statistics: Statistics {
            total_blocks: 2,
            total_events: 3,
            total_uncompressed_bytes: 290,
            total_compressed_bytes: 150,
            unique_kinds: 2,
            unique_namespaces: 2,
            unique_groups: 1,
            timestamp_min: 1,
            timestamp_max: 3,
        },
    }
}

#[test]
fn index_section_round_trips() {
    let section = sample_index_section();
    let bytes = super::index::write_index_section(&section).unwrap();
    let decoded = super::index::read_index_section(&bytes).unwrap();
    assert_eq!(decoded.blocks, section.blocks);
    assert_eq!(decoded.inverted_index, section.inverted_index);
    assert_eq!(decoded.statistics, section.statistics);
}

#[test]
fn candidate_blocks_empty_filter_returns_all() {
    let section = sample_index_section();
    let (ordinals, strategy) = candidate_blocks(&section, &DimensionFilter::default());
    assert_eq!(ordinals, vec![0, 1]);
    assert_eq!(strategy, CandidateStrategy::AllBlocks);
}

#[test]
fn candidate_blocks_uses_inverted_index_with_and_across_dimensions() {
    let section = sample_index_section();
    let filter = DimensionFilter {
        kinds: vec!["Pod".into()],
        namespaces: vec!["default".into()],
        groups: vec![],
    };
    let (ordinals, strategy) = candidate_blocks(&section, &filter);
    assert_eq!(ordinals, vec![0]);
    assert_eq!(strategy, CandidateStrategy::InvertedIndex);
}

#[test]
fn candidate_blocks_unions_within_one_dimension() {
    let section = sample_index_section();
    let filter = DimensionFilter {
        kinds: vec!["Pod".into(), "Node".into()],
        namespaces: vec![],
        groups: vec![],
    };
    let (mut ordinals, _) = candidate_blocks(&section, &filter);
    ordinals.sort_unstable();
    assert_eq!(ordinals, vec![0, 1]);
}

#[test]
fn candidate_blocks_falls_back_to_all_blocks_when_index_and_blooms_absent() {
    let mut section = sample_index_section();
    section.inverted_index = InvertedIndex::default();
    let filter = DimensionFilter {
        kinds: vec!["Pod".into()],
        namespaces: vec![],
        groups: vec![],
    };
    let (ordinals, strategy) = candidate_blocks(&section, &filter);
    assert_eq!(ordinals, vec![0, 1]);
    assert_eq!(strategy, CandidateStrategy::AllBlocks);
}
