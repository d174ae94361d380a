//! IUD (Identificador Único do Documento) generation.
//!
//! The IUD is the fixed 45-character identifier a tax authority uses to
//! cross-reference a fiscal document. It is derived deterministically from
//! the jurisdiction, document type, issue date, issuer tax id, and the
//! series/number token, then truncated or right-padded with `'0'` to exactly
//! 45 characters. Uniqueness is enforced as a hard constraint by the store at
//! signing commit, not merely assumed here.

use chrono::NaiveDate;

use crate::document::DocumentType;

/// Exact length of every IUD.
pub const IUD_LENGTH: usize = 45;

/// Jurisdiction code prefixed to every IUD.
const COUNTRY_CODE: &str = "CV";

/// Derives the IUD for a document.
///
/// Layout: `CV` + DNRE type code (1 char) + `YYYYMMDD` issue date + 9-digit
/// zero-padded issuer tax id + series token (spaces and slashes stripped) +
/// 9-digit zero-padded sequence number, adjusted to exactly 45 characters.
#[must_use]
pub fn generate(
    document_type: DocumentType,
    issue_date: NaiveDate,
    company_tax_id: &str,
    invoice_number: &str,
) -> String {
    let date_token = issue_date.format("%Y%m%d").to_string();
    let tax_token = pad_digits(company_tax_id, 9);

    // "FT A/2025/00001" -> series token "FTA", number token "000000001"
    let compact: String = invoice_number.chars().filter(|c| *c != ' ').collect();
    let mut parts = compact.splitn(3, '/');
    let series_token = parts.next().unwrap_or_default().to_string();
    let number_token = pad_digits(parts.nth(1).unwrap_or_default(), 9);

    let mut iud = format!(
        "{COUNTRY_CODE}{}{date_token}{tax_token}{series_token}{number_token}",
        document_type.dnre_code()
    );
    iud.truncate(IUD_LENGTH);
    while iud.len() < IUD_LENGTH {
        iud.push('0');
    }
    iud
}

/// Left-pads a token with zeros to `width`, truncating overlong input.
fn pad_digits(token: &str, width: usize) -> String {
    let mut padded = format!("{token:0>width$}");
    padded.truncate(width);
    padded
}
