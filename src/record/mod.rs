//! Deposit records parsed from device XML files.
//!
//! A [`Record`] is built once per stable file, rendered into the NVR text
//! overlay message with [`Record::to_message`], and then dropped.

mod amount;
mod error;
mod parser;

pub use amount::{AMOUNT_SCALE, denomination_key, format_amount, parse_amount, round_amount};
pub use error::ParseError;
pub use parser::{RecordParser, decode_document};

use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;

/// Label appended to every per-denomination count in the overlay text.
pub const PIECES_LABEL: &str = "Ədəd";

/// Number of banknotes seen for one integer denomination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DenominationCount {
    pub denomination: i64,
    pub count: u32,
}

impl fmt::Display for DenominationCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({} {PIECES_LABEL})", self.denomination, self.count)
    }
}

/// One parsed deposit transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Identifier of the source the file came from.
    pub source_id: String,
    /// Device serial number (`MachineSN`).
    pub serial: String,
    /// Free-text end-of-deposit timestamp (`DepositEndDateTime`).
    pub ended_at: String,
    /// Currency code (`Currency`).
    pub currency: String,
    /// Histogram sorted ascending by denomination.
    pub denominations: Vec<DenominationCount>,
    /// Number of denomination entries in the document.
    pub total_count: u32,
    /// Sum of every entry's cent-rounded value.
    pub total_amount: Decimal,
}

impl Record {
    /// `5(1 Ədəd), 10(2 Ədəd)`; empty when the deposit had no entries.
    pub fn nominals_text(&self) -> String {
        self.denominations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Render the seven-line overlay message sent to the NVR.
    pub fn to_message(&self) -> String {
        [
            self.source_id.clone(),
            format!("SN:{}", self.serial),
            format!("Saat:{}", self.ended_at),
            format!("Valyuta:{}", self.currency),
            format!("Umumi_Mebleg:{}", format_amount(self.total_amount)),
            format!("Umumi_Say:{}", self.total_count),
            format!("Nominallar:{}", self.nominals_text()),
        ]
        .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample_record() -> Record {
        Record {
            source_id: "masin2".to_string(),
            serial: "PN123322".to_string(),
            ended_at: "2024-03-01 14:22:05".to_string(),
            currency: "AZN".to_string(),
            denominations: vec![
                DenominationCount {
                    denomination: 5,
                    count: 1,
                },
                DenominationCount {
                    denomination: 10,
                    count: 2,
                },
            ],
            total_count: 3,
            total_amount: Decimal::from_str("25").unwrap(),
        }
    }

    #[test]
    fn test_nominals_text() {
        assert_eq!(sample_record().nominals_text(), "5(1 Ədəd), 10(2 Ədəd)");
    }

    #[test]
    fn test_message_layout() {
        let message = sample_record().to_message();
        let lines: Vec<&str> = message.split('\n').collect();

        assert_eq!(
            lines,
            vec![
                "masin2",
                "SN:PN123322",
                "Saat:2024-03-01 14:22:05",
                "Valyuta:AZN",
                "Umumi_Mebleg:25.00",
                "Umumi_Say:3",
                "Nominallar:5(1 Ədəd), 10(2 Ədəd)",
            ]
        );
        assert!(!message.ends_with('\n'));
    }

    #[test]
    fn test_message_with_no_entries() {
        let record = Record {
            denominations: Vec::new(),
            total_count: 0,
            total_amount: Decimal::ZERO,
            ..sample_record()
        };

        let message = record.to_message();
        assert!(message.ends_with("Umumi_Mebleg:0.00\nUmumi_Say:0\nNominallar:"));
    }
}
