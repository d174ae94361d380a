//! SAF-T CV audit file export.
//!
//! Serializes a date range of signed documents into the `AuditFile` structure
//! a tax authority consumes: company header, customer and product master
//! data, the tax-rate table, and one line-item-expanded entry per document
//! including its hash chain fields. Chain continuity is re-verified while
//! walking the set; any break is surfaced as a warning alongside the XML
//! rather than silently emitting a broken ledger.

use std::collections::BTreeMap;
use std::io::Write;

use chrono::NaiveDate;
use morabeza_shared::config::CompanyConfig;
use morabeza_shared::error::{FiscalError, FiscalResult};
use quick_xml::events::{BytesDecl, BytesStart, BytesText, Event};
use quick_xml::Writer;
use rust_decimal::Decimal;

use crate::chain::{self, format_amount};
use crate::document::{DocumentType, FiscalDocument, FINAL_CONSUMER_TAX_ID};

/// SAF-T CV audit file version emitted in the header.
const AUDIT_FILE_VERSION: &str = "1.04_01";

/// Namespace of the audit file root element.
const AUDIT_FILE_XMLNS: &str = "urn:OECD:Standard:AuditFile-CV:PT_1.04_01";

/// One signed document prepared for export.
///
/// The store assembles these under a consistent read snapshot: the document
/// itself, the invoice number of the referenced original for credit notes,
/// and the hash of the document's chain predecessor at signing time (empty
/// string for a chain opener) so the exporter can re-verify continuity.
#[derive(Debug, Clone)]
pub struct ExportEntry {
    /// The signed document.
    pub document: FiscalDocument,
    /// Invoice number of the referenced original (credit notes).
    pub referenced_number: Option<String>,
    /// Hash of the chain predecessor recorded at signing time.
    pub chain_predecessor_hash: String,
}

/// Result of an export run.
#[derive(Debug, Clone)]
pub struct SaftExport {
    /// The serialized audit file.
    pub xml: String,
    /// Data-integrity findings collected while walking the document set.
    pub warnings: Vec<String>,
}

type XmlResult = Result<(), quick_xml::Error>;

fn xml_err<E: std::fmt::Display>(e: E) -> FiscalError {
    FiscalError::Export(e.to_string())
}

/// Serializes the given signed documents into a SAF-T audit file.
///
/// Entries are ordered by `(issue_date, invoice_number)` regardless of input
/// order. Export is read-only.
///
/// # Errors
///
/// Returns `NotSigned` if any entry is still a draft, and `Export` when a
/// signed entry is missing fiscal fields or serialization fails.
pub fn export(
    config: &CompanyConfig,
    start_date: NaiveDate,
    end_date: NaiveDate,
    created_on: NaiveDate,
    mut entries: Vec<ExportEntry>,
) -> FiscalResult<SaftExport> {
    for entry in &entries {
        let doc = &entry.document;
        if !doc.is_signed {
            return Err(FiscalError::NotSigned(format!(
                "cannot export draft document {}",
                doc.label()
            )));
        }
        if doc.invoice_number.is_none() || doc.issue_date.is_none() {
            return Err(FiscalError::Export(format!(
                "signed document {} is missing its invoice number or issue date",
                doc.label()
            )));
        }
    }

    entries.sort_by(|a, b| {
        (a.document.issue_date, &a.document.invoice_number)
            .cmp(&(b.document.issue_date, &b.document.invoice_number))
    });

    let mut warnings = Vec::new();
    for entry in &entries {
        let report = chain::verify_with_predecessor(&entry.document, &entry.chain_predecessor_hash);
        warnings.extend(report.details);
    }

    let mut buf = Vec::new();
    write_audit_file(&mut buf, config, start_date, end_date, created_on, &entries, &mut warnings)
        .map_err(xml_err)?;
    let xml = String::from_utf8(buf).map_err(xml_err)?;

    Ok(SaftExport { xml, warnings })
}

#[allow(clippy::too_many_lines)]
fn write_audit_file<W: Write>(
    out: &mut W,
    config: &CompanyConfig,
    start_date: NaiveDate,
    end_date: NaiveDate,
    created_on: NaiveDate,
    entries: &[ExportEntry],
    warnings: &mut Vec<String>,
) -> XmlResult {
    let mut wr = Writer::new_with_indent(out, b' ', 2);

    wr.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("AuditFile");
    root.push_attribute(("xmlns", AUDIT_FILE_XMLNS));
    wr.write_event(Event::Start(root))?;

    write_header(&mut wr, config, start_date, end_date, created_on)?;

    wr.write_event(Event::Start(BytesStart::new("MasterFiles")))?;
    write_customers(&mut wr, entries)?;
    write_products(&mut wr, entries)?;
    write_tax_table(&mut wr, config)?;
    wr.write_event(Event::End(BytesStart::new("MasterFiles").to_end()))?;

    wr.write_event(Event::Start(BytesStart::new("SourceDocuments")))?;
    write_sales_invoices(&mut wr, config, entries, warnings)?;
    wr.write_event(Event::End(BytesStart::new("SourceDocuments").to_end()))?;

    wr.write_event(Event::End(BytesStart::new("AuditFile").to_end()))?;
    Ok(())
}

fn write_header<W: Write>(
    wr: &mut Writer<W>,
    config: &CompanyConfig,
    start_date: NaiveDate,
    end_date: NaiveDate,
    created_on: NaiveDate,
) -> XmlResult {
    wr.write_event(Event::Start(BytesStart::new("Header")))?;

    text_el(wr, "AuditFileVersion", AUDIT_FILE_VERSION)?;
    text_el(wr, "CompanyID", &config.tax_registration_number)?;
    text_el(wr, "TaxRegistrationNumber", &config.tax_registration_number)?;
    // F = Facturacao, C = Caixa
    text_el(wr, "TaxAccountingBasis", "F")?;
    text_el(wr, "CompanyName", &config.company_name)?;

    wr.write_event(Event::Start(BytesStart::new("CompanyAddress")))?;
    text_el(wr, "StreetName", &config.street_name)?;
    if let Some(number) = &config.building_number {
        text_el(wr, "Number", number)?;
    }
    text_el(wr, "City", &config.city)?;
    text_el(wr, "PostalCode", &config.postal_code)?;
    text_el(wr, "Country", &config.country)?;
    wr.write_event(Event::End(BytesStart::new("CompanyAddress").to_end()))?;

    text_el(wr, "FiscalYear", &start_date.format("%Y").to_string())?;
    text_el(wr, "StartDate", &start_date.format("%Y-%m-%d").to_string())?;
    text_el(wr, "EndDate", &end_date.format("%Y-%m-%d").to_string())?;
    text_el(wr, "CurrencyCode", &config.currency_code)?;
    text_el(wr, "DateCreated", &created_on.format("%Y-%m-%d").to_string())?;
    text_el(
        wr,
        "SoftwareCertificateNumber",
        &config.software_certificate_number,
    )?;
    text_el(
        wr,
        "ProductID",
        &format!("Morabeza/{}", config.software_version),
    )?;
    text_el(wr, "ProductCompanyTaxID", &config.tax_registration_number)?;

    wr.write_event(Event::End(BytesStart::new("Header").to_end()))?;
    Ok(())
}

fn write_customers<W: Write>(wr: &mut Writer<W>, entries: &[ExportEntry]) -> XmlResult {
    // Dedup customer snapshots by tax id; the anonymous placeholder row is
    // always present for sales without a snapshot.
    let mut customers: BTreeMap<&str, &str> = BTreeMap::new();
    for entry in entries {
        if let Some(customer) = &entry.document.customer {
            customers.entry(&customer.tax_id).or_insert(&customer.name);
        }
    }

    for (tax_id, name) in customers {
        wr.write_event(Event::Start(BytesStart::new("Customer")))?;
        text_el(wr, "CustomerID", tax_id)?;
        text_el(wr, "AccountID", &format!("CLI-{tax_id}"))?;
        text_el(wr, "CustomerTaxID", tax_id)?;
        text_el(wr, "CompanyName", name)?;
        text_el(wr, "Telephone", "N/A")?;
        text_el(wr, "SelfBillingIndicator", "0")?;
        wr.write_event(Event::End(BytesStart::new("Customer").to_end()))?;
    }

    wr.write_event(Event::Start(BytesStart::new("Customer")))?;
    text_el(wr, "CustomerID", "FINAL")?;
    text_el(wr, "AccountID", "CLI-FINAL")?;
    text_el(wr, "CustomerTaxID", FINAL_CONSUMER_TAX_ID)?;
    text_el(wr, "CompanyName", "Consumidor Final")?;
    text_el(wr, "Telephone", "N/A")?;
    text_el(wr, "SelfBillingIndicator", "0")?;
    wr.write_event(Event::End(BytesStart::new("Customer").to_end()))?;
    Ok(())
}

fn write_products<W: Write>(wr: &mut Writer<W>, entries: &[ExportEntry]) -> XmlResult {
    let mut products: BTreeMap<&str, &str> = BTreeMap::new();
    for entry in entries {
        for line in &entry.document.lines {
            products.entry(&line.product_code).or_insert(&line.description);
        }
    }

    for (code, description) in products {
        wr.write_event(Event::Start(BytesStart::new("Product")))?;
        // P = Produto, S = Servico
        text_el(wr, "ProductType", "P")?;
        text_el(wr, "ProductCode", code)?;
        text_el(wr, "ProductDescription", description)?;
        text_el(wr, "ProductNumberCode", code)?;
        wr.write_event(Event::End(BytesStart::new("Product").to_end()))?;
    }
    Ok(())
}

fn write_tax_table<W: Write>(wr: &mut Writer<W>, config: &CompanyConfig) -> XmlResult {
    wr.write_event(Event::Start(BytesStart::new("TaxTable")))?;
    for rate in &config.tax_table {
        if !rate.is_active {
            continue;
        }
        wr.write_event(Event::Start(BytesStart::new("TaxTableEntry")))?;
        text_el(wr, "TaxType", "IVA")?;
        text_el(wr, "TaxCountryRegion", &config.country)?;
        text_el(wr, "TaxCode", &rate.tax_code)?;
        text_el(wr, "Description", &rate.description)?;
        text_el(wr, "TaxPercentage", &format_amount(rate.percentage))?;
        wr.write_event(Event::End(BytesStart::new("TaxTableEntry").to_end()))?;
    }
    wr.write_event(Event::End(BytesStart::new("TaxTable").to_end()))?;
    Ok(())
}

fn write_sales_invoices<W: Write>(
    wr: &mut Writer<W>,
    config: &CompanyConfig,
    entries: &[ExportEntry],
    warnings: &mut Vec<String>,
) -> XmlResult {
    wr.write_event(Event::Start(BytesStart::new("SalesInvoices")))?;

    text_el(wr, "NumberOfEntries", &entries.len().to_string())?;

    // Credit notes accumulate into TotalCredit, all other documents into
    // TotalDebit.
    let (debit, credit) = entries.iter().fold(
        (Decimal::ZERO, Decimal::ZERO),
        |(debit, credit), entry| {
            if entry.document.document_type == DocumentType::CreditNote {
                (debit, credit + entry.document.grand_total)
            } else {
                (debit + entry.document.grand_total, credit)
            }
        },
    );
    text_el(wr, "TotalDebit", &format_amount(debit))?;
    text_el(wr, "TotalCredit", &format_amount(credit))?;

    for entry in entries {
        write_invoice(wr, config, entry, warnings)?;
    }

    wr.write_event(Event::End(BytesStart::new("SalesInvoices").to_end()))?;
    Ok(())
}

fn write_invoice<W: Write>(
    wr: &mut Writer<W>,
    config: &CompanyConfig,
    entry: &ExportEntry,
    warnings: &mut Vec<String>,
) -> XmlResult {
    let doc = &entry.document;
    let invoice_number = doc.invoice_number.as_deref().unwrap_or_default();
    let issue_date = doc
        .issue_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();

    wr.write_event(Event::Start(BytesStart::new("Invoice")))?;

    text_el(wr, "InvoiceNo", invoice_number)?;
    text_el(wr, "InvoiceType", doc.document_type.code())?;
    text_el(wr, "InvoiceDate", &issue_date)?;

    let customer_id = doc
        .customer
        .as_ref()
        .map_or("FINAL", |c| c.tax_id.as_str());
    text_el(wr, "CustomerID", customer_id)?;

    if doc.document_type == DocumentType::CreditNote {
        wr.write_event(Event::Start(BytesStart::new("References")))?;
        match &entry.referenced_number {
            Some(number) => text_el(wr, "Reference", number)?,
            None => warnings.push(format!(
                "credit note {invoice_number} has no resolvable referenced document number"
            )),
        }
        if let Some(reason) = &doc.reason_code {
            text_el(wr, "Reason", reason)?;
        }
        wr.write_event(Event::End(BytesStart::new("References").to_end()))?;
    }

    for (idx, line) in doc.lines.iter().enumerate() {
        let tax_code = line
            .tax_code
            .as_deref()
            .unwrap_or(&config.default_tax_code);
        let percentage = doc
            .issue_date
            .and_then(|date| config.tax_rate_on(tax_code, date))
            .map(|rate| rate.percentage);
        if percentage.is_none() {
            warnings.push(format!(
                "no active tax rate for code {tax_code} on document {invoice_number}"
            ));
        }

        wr.write_event(Event::Start(BytesStart::new("Line")))?;
        text_el(wr, "LineNumber", &(idx + 1).to_string())?;
        text_el(wr, "ProductCode", &line.product_code)?;
        text_el(wr, "ProductDescription", &line.description)?;
        text_el(wr, "Quantity", &line.quantity.to_string())?;
        text_el(wr, "UnitOfMeasure", "UN")?;
        text_el(wr, "UnitPrice", &format_amount(line.unit_price))?;
        text_el(wr, "TaxPointDate", &issue_date)?;
        text_el(wr, "TaxType", "IVA")?;
        text_el(wr, "TaxCountryRegion", &config.country)?;
        text_el(wr, "TaxCode", tax_code)?;
        text_el(
            wr,
            "TaxPercentage",
            &format_amount(percentage.unwrap_or(Decimal::ZERO)),
        )?;
        // Amounts are always positive in SAF-T; credit notes are
        // distinguished by type, not sign.
        text_el(wr, "CreditAmount", &format_amount(line.total().abs()))?;
        wr.write_event(Event::End(BytesStart::new("Line").to_end()))?;
    }

    wr.write_event(Event::Start(BytesStart::new("DocumentTotals")))?;
    text_el(wr, "TaxPayable", &format_amount(doc.tax_total))?;
    text_el(wr, "NetTotal", &format_amount(doc.net_total))?;
    text_el(wr, "GrossTotal", &format_amount(doc.grand_total))?;
    wr.write_event(Event::End(BytesStart::new("DocumentTotals").to_end()))?;

    if let Some(hash) = &doc.hash {
        text_el(wr, "Hash", hash)?;
        if let Some(certificate) = &doc.software_certificate_number {
            text_el(wr, "HashControl", certificate)?;
        }
    }

    wr.write_event(Event::End(BytesStart::new("Invoice").to_end()))?;
    Ok(())
}

fn text_el<W: Write>(wr: &mut Writer<W>, name: &str, value: &str) -> XmlResult {
    wr.write_event(Event::Start(BytesStart::new(name)))?;
    wr.write_event(Event::Text(BytesText::new(value)))?;
    wr.write_event(Event::End(BytesStart::new(name).to_end()))?;
    Ok(())
}
