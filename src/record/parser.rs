//! XML deposit file parsing.

use std::collections::BTreeMap;
use std::path::Path;

use encoding_rs::{Encoding, UTF_8};
use roxmltree::{Document, Node, ParsingOptions};
use rust_decimal::Decimal;

use super::amount::{denomination_key, parse_amount};
use super::{DenominationCount, ParseError, Record};

const DEPOSIT_TAG: &str = "Deposit";
const MACHINE_TAG: &str = "Machine";
const ENTRY_TAG: &str = "BN";

const END_TIME_ATTR: &str = "DepositEndDateTime";
const CURRENCY_ATTR: &str = "Currency";
const SERIAL_ATTR: &str = "MachineSN";
const DENOM_ATTR: &str = "Denom";

/// How far into the file to look for an `encoding="..."` declaration.
const DECLARATION_SCAN_LIMIT: usize = 256;

/// Parses deposit documents for a single source.
#[derive(Debug, Clone)]
pub struct RecordParser {
    source_id: String,
}

impl RecordParser {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
        }
    }

    /// Read and parse a file from disk.
    pub async fn parse_file(&self, path: &Path) -> Result<Record, ParseError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| ParseError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.parse_bytes(&bytes)
    }

    /// Decode raw file bytes and parse them.
    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<Record, ParseError> {
        let text = decode_document(bytes)?;
        self.parse_str(&text)
    }

    /// Parse an already decoded document.
    ///
    /// The deposit and machine elements may sit anywhere in the tree. When
    /// either is absent its fields default to empty strings.
    pub fn parse_str(&self, content: &str) -> Result<Record, ParseError> {
        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let doc = Document::parse_with_options(content, options)?;

        let deposit = find_element(&doc, DEPOSIT_TAG);
        let machine = find_element(&doc, MACHINE_TAG);

        let mut histogram: BTreeMap<i64, u32> = BTreeMap::new();
        let mut total_amount = Decimal::ZERO;
        let mut total_count: u32 = 0;

        for entry in doc
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == ENTRY_TAG)
        {
            let mut value = parse_amount(entry.attribute(DENOM_ATTR).unwrap_or("0"));
            // An entry that would overflow the running total counts as zero
            match total_amount.checked_add(value) {
                Some(sum) => total_amount = sum,
                None => {
                    tracing::debug!(
                        "[{}] denomination {value} overflows the deposit total, counted as 0",
                        self.source_id
                    );
                    value = Decimal::ZERO;
                }
            }
            let count = histogram.entry(denomination_key(value)).or_insert(0);
            *count = count.saturating_add(1);
            total_count = total_count.saturating_add(1);
        }

        let denominations = histogram
            .into_iter()
            .map(|(denomination, count)| DenominationCount {
                denomination,
                count,
            })
            .collect();

        Ok(Record {
            source_id: self.source_id.clone(),
            serial: attr_or_empty(machine, SERIAL_ATTR),
            ended_at: attr_or_empty(deposit, END_TIME_ATTR),
            currency: attr_or_empty(deposit, CURRENCY_ATTR),
            denominations,
            total_count,
            total_amount,
        })
    }
}

fn find_element<'a, 'input>(doc: &'a Document<'input>, tag: &str) -> Option<Node<'a, 'input>> {
    doc.descendants()
        .find(|n| n.is_element() && n.tag_name().name() == tag)
}

fn attr_or_empty(node: Option<Node<'_, '_>>, name: &str) -> String {
    node.and_then(|n| n.attribute(name))
        .unwrap_or_default()
        .to_string()
}

/// Decode file bytes to text.
///
/// A byte order mark wins, then the XML declaration's `encoding` label,
/// then UTF-8. Any malformed byte sequence is an error rather than a
/// silent replacement character.
pub fn decode_document(bytes: &[u8]) -> Result<String, ParseError> {
    let (encoding, body) = match Encoding::for_bom(bytes) {
        Some((encoding, bom_len)) => (encoding, &bytes[bom_len..]),
        None => (declared_encoding(bytes)?.unwrap_or(UTF_8), bytes),
    };

    let (text, had_errors) = encoding.decode_without_bom_handling(body);
    if had_errors {
        return Err(ParseError::Encoding {
            encoding: encoding.name().to_string(),
        });
    }

    Ok(text.into_owned())
}

fn declared_encoding(bytes: &[u8]) -> Result<Option<&'static Encoding>, ParseError> {
    if !bytes.starts_with(b"<?xml") {
        return Ok(None);
    }

    let head = &bytes[..bytes.len().min(DECLARATION_SCAN_LIMIT)];
    let Some(end) = head.windows(2).position(|w| w == b"?>") else {
        return Ok(None);
    };
    let declaration = String::from_utf8_lossy(&head[..end]);

    let Some(pos) = declaration.find("encoding") else {
        return Ok(None);
    };
    let rest = declaration[pos + "encoding".len()..].trim_start();
    let Some(rest) = rest.strip_prefix('=') else {
        return Ok(None);
    };
    let rest = rest.trim_start();
    let Some(quote) = rest.chars().next().filter(|c| *c == '"' || *c == '\'') else {
        return Ok(None);
    };
    let Some(label) = rest[1..].split(quote).next() else {
        return Ok(None);
    };

    Encoding::for_label(label.trim().as_bytes())
        .map(Some)
        .ok_or_else(|| ParseError::Encoding {
            encoding: label.to_string(),
        })
}
