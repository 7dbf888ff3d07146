//! Encode / Decode implementations for the wire format of the data model
//! types. Split into its own file for readability — the types themselves
//! live in `super` (i.e. `src/model.rs`).

use crate::encoding::{self, EncodingError};

use super::{Event, EventType, ResourceMetadata};

impl encoding::Encode for EventType {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        let tag: u8 = match self {
            EventType::Create => 0,
            EventType::Update => 1,
            EventType::Delete => 2,
        };
        tag.encode_to(buf)
    }
}

impl encoding::Decode for EventType {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let (tag, n) = u8::decode_from(buf)?;
        let value = match tag {
            0 => EventType::Create,
            1 => EventType::Update,
            2 => EventType::Delete,
            other => {
                return Err(EncodingError::InvalidTag {
                    tag: other as u32,
                    type_name: "EventType",
                });
            }
        };
        Ok((value, n))
    }
}

impl encoding::Encode for ResourceMetadata {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        self.api_group.encode_to(buf)?;
        self.api_version.encode_to(buf)?;
        self.kind.encode_to(buf)?;
        self.namespace.encode_to(buf)?;
        self.name.encode_to(buf)?;
        self.uid.encode_to(buf)?;
        Ok(())
    }
}

impl encoding::Decode for ResourceMetadata {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut off = 0;
        let (api_group, n) = String::decode_from(&buf[off..])?;
        off += n;
        let (api_version, n) = String::decode_from(&buf[off..])?;
        off += n;
        let (kind, n) = String::decode_from(&buf[off..])?;
        off += n;
        let (namespace, n) = String::decode_from(&buf[off..])?;
        off += n;
        let (name, n) = String::decode_from(&buf[off..])?;
        off += n;
        let (uid, n) = String::decode_from(&buf[off..])?;
        off += n;
        Ok((
            Self {
                api_group,
                api_version,
                kind,
                namespace,
                name,
                uid,
            },
            off,
        ))
    }
}

impl encoding::Encode for Event {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        self.id.encode_to(buf)?;
        self.timestamp.encode_to(buf)?;
        self.event_type.encode_to(buf)?;
        self.resource.encode_to(buf)?;
        self.data.encode_to(buf)?;
        Ok(())
    }
}

impl encoding::Decode for Event {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut off = 0;
        let (id, n) = String::decode_from(&buf[off..])?;
        off += n;
        let (timestamp, n) = i64::decode_from(&buf[off..])?;
        off += n;
        let (event_type, n) = EventType::decode_from(&buf[off..])?;
        off += n;
        let (resource, n) = ResourceMetadata::decode_from(&buf[off..])?;
        off += n;
        let (data, n) = <Vec<u8>>::decode_from(&buf[off..])?;
        off += n;
        Ok((
            Self {
                id,
                timestamp,
                event_type,
                resource,
                data,
            },
            off,
        ))
    }
}
