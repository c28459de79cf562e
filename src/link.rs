//! Decoder for console "create composite index" links.
//!
//! When a query needs a composite index the backend error embeds a console
//! link whose `create_composite` parameter carries the index definition as a
//! base64 payload of the tag/varint encoding in [`crate::wire`]:
//!
//! - field 1 (bytes): resource path containing `collectionGroups/<name>/`
//! - field 3 (bytes, repeated): one nested message per indexed field, where
//!   nested field 1 is the field path and nested field 2 the order code
//!
//! Field order in the payload is the index's field order and is preserved.

use crate::catalog::{CollectionGroup, Direction, IndexDefinition, IndexFieldSpec};
use crate::wire::{DecodeError, FieldReader};
use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use thiserror::Error;

const PAYLOAD_PARAM: &str = "create_composite";
const COLLECTION_GROUP_SEGMENT: &str = "collectionGroups/";

const RESOURCE_PATH_FIELD: u64 = 1;
const INDEX_FIELD_FIELD: u64 = 3;
const FIELD_PATH_FIELD: u64 = 1;
const FIELD_ORDER_FIELD: u64 = 2;

// Console links drop base64 padding; accept payloads with or without it.
const LINK_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Invalid URL: No create_composite parameter found")]
    MissingPayload,
    #[error("create_composite parameter is not valid percent-encoding")]
    InvalidPercentEncoding,
    #[error("create_composite payload is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("create_composite payload is malformed: {0}")]
    Decode(#[from] DecodeError),
    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },
    #[error("resource path '{0}' does not name a collection group")]
    MissingCollectionGroup(String),
    #[error("index payload carries no resource path")]
    MissingResourcePath,
    #[error("index field entry has no field path")]
    MissingFieldPath,
    #[error("index field '{field_path}' has unknown order code {code}")]
    UnknownOrder { field_path: String, code: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Collection group plus ordered field specs recovered from a link.
pub struct ParsedLink {
    pub collection_group: CollectionGroup,
    pub fields: Vec<IndexFieldSpec>,
}

impl ParsedLink {
    pub fn into_definition(self) -> IndexDefinition {
        IndexDefinition::new(self.collection_group, self.fields)
    }
}

/// Parse a console link into its collection group and ordered fields.
pub fn parse_link(url: &str) -> Result<ParsedLink, LinkError> {
    let encoded = extract_payload_param(url).ok_or(LinkError::MissingPayload)?;
    let base64_text = percent_decode(encoded).ok_or(LinkError::InvalidPercentEncoding)?;
    let payload = LINK_BASE64.decode(base64_text.trim())?;
    parse_payload(&payload)
}

/// Interpret an already-decoded link payload.
pub fn parse_payload(payload: &[u8]) -> Result<ParsedLink, LinkError> {
    let mut collection_group = None;
    let mut fields = Vec::new();

    for field in FieldReader::new(payload) {
        let field = field?;
        let Some(bytes) = field.as_bytes() else {
            continue;
        };
        match field.number {
            RESOURCE_PATH_FIELD => {
                let path = std::str::from_utf8(bytes).map_err(|_| LinkError::InvalidUtf8 {
                    field: "resource path",
                })?;
                let group = extract_collection_group(path)
                    .ok_or_else(|| LinkError::MissingCollectionGroup(path.to_string()))?;
                collection_group = Some(CollectionGroup(group.to_string()));
            }
            INDEX_FIELD_FIELD => fields.push(parse_field_spec(bytes)?),
            _ => {}
        }
    }

    Ok(ParsedLink {
        collection_group: collection_group.ok_or(LinkError::MissingResourcePath)?,
        fields,
    })
}

fn parse_field_spec(bytes: &[u8]) -> Result<IndexFieldSpec, LinkError> {
    let mut field_path = None;
    let mut order_code = None;

    for field in FieldReader::new(bytes) {
        let field = field?;
        match field.number {
            FIELD_PATH_FIELD => {
                if let Some(raw) = field.as_bytes() {
                    let path = std::str::from_utf8(raw).map_err(|_| LinkError::InvalidUtf8 {
                        field: "field path",
                    })?;
                    field_path = Some(path.to_string());
                }
            }
            FIELD_ORDER_FIELD => {
                if let Some(code) = field.as_varint() {
                    order_code = Some(code);
                }
            }
            _ => {}
        }
    }

    let field_path = field_path.ok_or(LinkError::MissingFieldPath)?;
    // An entry without an order code (array-contains indexes) cannot be
    // expressed as an ordered field.
    let code = order_code.unwrap_or(0);
    let order = Direction::from_order_code(code).ok_or_else(|| LinkError::UnknownOrder {
        field_path: field_path.clone(),
        code,
    })?;
    Ok(IndexFieldSpec::new(field_path, order))
}

/// `projects/p/databases/d/collectionGroups/admins/indexes/_` -> `admins`.
pub fn extract_collection_group(path: &str) -> Option<&str> {
    let start = path.find(COLLECTION_GROUP_SEGMENT)? + COLLECTION_GROUP_SEGMENT.len();
    let rest = &path[start..];
    let name = rest.split('/').next().unwrap_or_default();
    if name.is_empty() { None } else { Some(name) }
}

/// Locate the first console link carrying an index payload inside a raw
/// backend error message.
pub fn find_console_link(message: &str) -> Option<&str> {
    message
        .split_whitespace()
        .filter(|token| token.contains("https://"))
        .map(|token| {
            let start = token.find("https://").unwrap_or(0);
            token[start..].trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ')' | '"' | '\''))
        })
        .find(|candidate| candidate.contains(&format!("{PAYLOAD_PARAM}=")))
}

fn extract_payload_param(url: &str) -> Option<&str> {
    let query = url.split_once('?').map(|(_, query)| query).unwrap_or(url);
    let query = query.split('#').next().unwrap_or_default();
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == PAYLOAD_PARAM)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hi = *bytes.get(i + 1)?;
                let lo = *bytes.get(i + 2)?;
                let hi = (hi as char).to_digit(16)? as u8;
                let lo = (lo as char).to_digit(16)? as u8;
                out.push((hi << 4) | lo);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).ok()
}
