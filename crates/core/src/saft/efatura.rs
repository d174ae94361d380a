//! e-Fatura document rendering (DNRE `Dfe` XML).
//!
//! Renders a single signed document for the tax authority's real-time
//! platform. Submission stays in simulation mode: the operation returns the
//! XML and a receipt instead of performing network I/O; live submission is
//! out of scope.

use std::io::Write;

use morabeza_shared::config::CompanyConfig;
use morabeza_shared::error::{FiscalError, FiscalResult};
use quick_xml::events::{BytesDecl, BytesStart, BytesText, Event};
use quick_xml::Writer;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::chain::format_amount;
use crate::document::{CustomerSnapshot, FiscalDocument};
use crate::numbering;

/// Namespace of the `Dfe` root element.
const DFE_XMLNS: &str = "urn:cv:efatura:xsd:v1.0";

/// Software name reported in the document footer.
const SOFTWARE_NAME: &str = "Morabeza";

/// Receipt returned for a simulated submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReceipt {
    /// Always "simulation" until live submission exists.
    pub mode: String,
    /// Human-readable outcome.
    pub message: String,
    /// Invoice number of the submitted document.
    pub invoice_number: String,
    /// IUD of the submitted document.
    pub iud: String,
}

/// A rendered document plus its submission receipt.
#[derive(Debug, Clone)]
pub struct EfaturaSubmission {
    /// The `Dfe` XML bytes.
    pub xml: String,
    /// The simulated submission receipt.
    pub receipt: SubmissionReceipt,
}

type XmlResult = Result<(), quick_xml::Error>;

fn xml_err<E: std::fmt::Display>(e: E) -> FiscalError {
    FiscalError::Export(e.to_string())
}

/// Fiscal fields every signed document carries, extracted up front so the
/// writer does not deal in `Option`s.
struct SignedFields<'a> {
    invoice_number: &'a str,
    serie: String,
    document_number: String,
    issue_date: String,
    issue_time: String,
    iud: &'a str,
}

fn signed_fields(document: &FiscalDocument) -> FiscalResult<SignedFields<'_>> {
    if !document.is_signed {
        return Err(FiscalError::NotSigned(format!(
            "document {} must be signed before rendering an e-Fatura XML",
            document.label()
        )));
    }
    let missing = |field: &str| {
        FiscalError::Export(format!(
            "signed document {} is missing its {field}",
            document.label()
        ))
    };
    let invoice_number = document
        .invoice_number
        .as_deref()
        .ok_or_else(|| missing("invoice number"))?;
    let parts = numbering::parse_invoice_number(invoice_number)
        .ok_or_else(|| missing("parseable invoice number"))?;
    let issue_date = document.issue_date.ok_or_else(|| missing("issue date"))?;
    let signed_at = document.signed_at.ok_or_else(|| missing("signing time"))?;
    let iud = document.iud.as_deref().ok_or_else(|| missing("IUD"))?;

    Ok(SignedFields {
        invoice_number,
        serie: parts.series,
        document_number: format!("{:05}", parts.number),
        issue_date: issue_date.format("%Y-%m-%d").to_string(),
        issue_time: signed_at.format("%H:%M:%S").to_string(),
        iud,
    })
}

/// Renders a signed document as a `Dfe` XML string.
///
/// # Errors
///
/// Returns `NotSigned` for drafts and `Export` when a signed document is
/// missing fiscal fields or serialization fails.
pub fn render(config: &CompanyConfig, document: &FiscalDocument) -> FiscalResult<String> {
    let fields = signed_fields(document)?;
    let mut buf = Vec::new();
    write_dfe(&mut buf, config, document, &fields).map_err(xml_err)?;
    String::from_utf8(buf).map_err(xml_err)
}

/// Renders a signed document and returns it with a simulation-mode receipt.
///
/// No network I/O happens; the caller owns the bytes.
///
/// # Errors
///
/// Same as [`render`].
pub fn submit_simulated(
    config: &CompanyConfig,
    document: &FiscalDocument,
) -> FiscalResult<EfaturaSubmission> {
    let xml = render(config, document)?;
    let fields = signed_fields(document)?;
    Ok(EfaturaSubmission {
        xml,
        receipt: SubmissionReceipt {
            mode: "simulation".to_string(),
            message: "XML generated, not transmitted (simulation mode)".to_string(),
            invoice_number: fields.invoice_number.to_string(),
            iud: fields.iud.to_string(),
        },
    })
}

fn write_dfe<W: Write>(
    out: &mut W,
    config: &CompanyConfig,
    document: &FiscalDocument,
    fields: &SignedFields<'_>,
) -> XmlResult {
    let mut wr = Writer::new_with_indent(out, b' ', 2);

    wr.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("Dfe");
    root.push_attribute(("xmlns", DFE_XMLNS));
    root.push_attribute(("Version", "1.0"));
    root.push_attribute(("Id", fields.iud));
    root.push_attribute(("DocumentTypeCode", document.document_type.dnre_code()));
    wr.write_event(Event::Start(root))?;

    text_el(&mut wr, "IsSpecimen", "true")?;

    wr.write_event(Event::Start(BytesStart::new("Invoice")))?;

    // 1 = normal ledger
    text_el(&mut wr, "LedCode", "1")?;
    text_el(&mut wr, "Serie", &fields.serie)?;
    text_el(&mut wr, "DocumentNumber", &fields.document_number)?;
    text_el(&mut wr, "IssueDate", &fields.issue_date)?;
    text_el(&mut wr, "IssueTime", &fields.issue_time)?;
    text_el(&mut wr, "DueDate", &fields.issue_date)?;
    text_el(&mut wr, "TaxPointDate", &fields.issue_date)?;

    write_emitter(&mut wr, config)?;
    write_receiver(&mut wr, document, &config.country)?;
    write_lines(&mut wr, config, document)?;

    wr.write_event(Event::Start(BytesStart::new("Totals")))?;
    text_el(&mut wr, "TaxTotal", &format_amount(document.tax_total))?;
    text_el(&mut wr, "NetTotal", &format_amount(document.net_total))?;
    text_el(&mut wr, "GrandTotal", &format_amount(document.grand_total))?;
    wr.write_event(Event::End(BytesStart::new("Totals").to_end()))?;

    wr.write_event(Event::Start(BytesStart::new("Payments")))?;
    wr.write_event(Event::Start(BytesStart::new("Payment")))?;
    text_el(
        &mut wr,
        "PaymentMeansCode",
        document.payment_method.means_code(),
    )?;
    text_el(&mut wr, "PaymentAmount", &format_amount(document.grand_total))?;
    text_el(&mut wr, "IsPaid", "true")?;
    wr.write_event(Event::End(BytesStart::new("Payment").to_end()))?;
    wr.write_event(Event::End(BytesStart::new("Payments").to_end()))?;

    wr.write_event(Event::Start(BytesStart::new("Software")))?;
    text_el(&mut wr, "Code", &config.software_certificate_number)?;
    text_el(&mut wr, "Name", SOFTWARE_NAME)?;
    text_el(&mut wr, "Version", &config.software_version)?;
    wr.write_event(Event::End(BytesStart::new("Software").to_end()))?;

    wr.write_event(Event::End(BytesStart::new("Invoice").to_end()))?;
    wr.write_event(Event::End(BytesStart::new("Dfe").to_end()))?;
    Ok(())
}

fn write_emitter<W: Write>(wr: &mut Writer<W>, config: &CompanyConfig) -> XmlResult {
    wr.write_event(Event::Start(BytesStart::new("EmitterParty")))?;

    let mut tax_id = BytesStart::new("TaxId");
    tax_id.push_attribute(("CountryCode", config.country.as_str()));
    wr.write_event(Event::Start(tax_id))?;
    wr.write_event(Event::Text(BytesText::new(&config.tax_registration_number)))?;
    wr.write_event(Event::End(BytesStart::new("TaxId").to_end()))?;

    text_el(wr, "Name", &config.company_name)?;

    let mut detail = config.street_name.clone();
    if let Some(number) = &config.building_number {
        detail.push_str(", ");
        detail.push_str(number);
    }
    detail.push_str(", ");
    detail.push_str(&config.city);
    detail.push_str(", ");
    detail.push_str(&config.postal_code);

    let mut address = BytesStart::new("Address");
    address.push_attribute(("CountryCode", config.country.as_str()));
    wr.write_event(Event::Start(address))?;
    text_el(wr, "AddressDetail", &detail)?;
    text_el(
        wr,
        "AddressCode",
        &format!("{}{}", config.country, config.postal_code.replace('-', "")),
    )?;
    wr.write_event(Event::End(BytesStart::new("Address").to_end()))?;

    wr.write_event(Event::Start(BytesStart::new("Contacts")))?;
    text_el(wr, "Telephone", &config.telephone)?;
    if let Some(email) = &config.email {
        text_el(wr, "Email", email)?;
    }
    if let Some(website) = &config.website {
        text_el(wr, "Website", website)?;
    }
    wr.write_event(Event::End(BytesStart::new("Contacts").to_end()))?;

    wr.write_event(Event::End(BytesStart::new("EmitterParty").to_end()))?;
    Ok(())
}

fn write_receiver<W: Write>(
    wr: &mut Writer<W>,
    document: &FiscalDocument,
    country: &str,
) -> XmlResult {
    let final_consumer = CustomerSnapshot::final_consumer();
    let customer = document.customer.as_ref().unwrap_or(&final_consumer);

    wr.write_event(Event::Start(BytesStart::new("ReceiverParty")))?;

    let mut tax_id = BytesStart::new("TaxId");
    tax_id.push_attribute(("CountryCode", country));
    wr.write_event(Event::Start(tax_id))?;
    wr.write_event(Event::Text(BytesText::new(&customer.tax_id)))?;
    wr.write_event(Event::End(BytesStart::new("TaxId").to_end()))?;

    text_el(wr, "Name", &customer.name)?;

    let mut address = BytesStart::new("Address");
    address.push_attribute(("CountryCode", country));
    wr.write_event(Event::Start(address))?;
    text_el(wr, "AddressDetail", "N/A")?;
    text_el(wr, "AddressCode", &format!("{country}0000000000"))?;
    wr.write_event(Event::End(BytesStart::new("Address").to_end()))?;

    wr.write_event(Event::Start(BytesStart::new("Contacts")))?;
    text_el(wr, "Telephone", "N/A")?;
    wr.write_event(Event::End(BytesStart::new("Contacts").to_end()))?;

    wr.write_event(Event::End(BytesStart::new("ReceiverParty").to_end()))?;
    Ok(())
}

fn write_lines<W: Write>(
    wr: &mut Writer<W>,
    config: &CompanyConfig,
    document: &FiscalDocument,
) -> XmlResult {
    wr.write_event(Event::Start(BytesStart::new("Lines")))?;

    for (idx, line) in document.lines.iter().enumerate() {
        let mut start = BytesStart::new("Line");
        // N = normal line
        start.push_attribute(("LineTypeCode", "N"));
        wr.write_event(Event::Start(start))?;

        text_el(wr, "Id", &(idx + 1).to_string())?;

        let mut quantity = BytesStart::new("Quantity");
        quantity.push_attribute(("UnitCode", "UN"));
        quantity.push_attribute(("IsStandardUnitCode", "true"));
        wr.write_event(Event::Start(quantity))?;
        wr.write_event(Event::Text(BytesText::new(&line.quantity.to_string())))?;
        wr.write_event(Event::End(BytesStart::new("Quantity").to_end()))?;

        let extension = line.total();
        text_el(wr, "Price", &format_amount(line.unit_price))?;
        text_el(wr, "PriceExtension", &format_amount(extension))?;
        text_el(wr, "NetTotal", &format_amount(extension))?;

        let tax_code = line
            .tax_code
            .as_deref()
            .unwrap_or(&config.default_tax_code);
        let percentage = document
            .issue_date
            .and_then(|date| config.tax_rate_on(tax_code, date))
            .map_or(Decimal::ZERO, |rate| rate.percentage);
        let tax_total = extension * percentage / Decimal::ONE_HUNDRED;

        let mut tax = BytesStart::new("Tax");
        tax.push_attribute(("TaxTypeCode", "IVA"));
        wr.write_event(Event::Start(tax))?;
        text_el(wr, "TaxPercentage", &format_amount(percentage))?;
        text_el(wr, "TaxTotal", &format_amount(tax_total))?;
        wr.write_event(Event::End(BytesStart::new("Tax").to_end()))?;

        wr.write_event(Event::Start(BytesStart::new("Item")))?;
        text_el(wr, "Description", &line.description)?;
        text_el(wr, "EmitterIdentification", &line.product_code)?;
        wr.write_event(Event::End(BytesStart::new("Item").to_end()))?;

        wr.write_event(Event::End(BytesStart::new("Line").to_end()))?;
    }

    wr.write_event(Event::End(BytesStart::new("Lines").to_end()))?;
    Ok(())
}

fn text_el<W: Write>(wr: &mut Writer<W>, name: &str, value: &str) -> XmlResult {
    wr.write_event(Event::Start(BytesStart::new(name)))?;
    wr.write_event(Event::Text(BytesText::new(value)))?;
    wr.write_event(Event::End(BytesStart::new(name).to_end()))?;
    Ok(())
}
