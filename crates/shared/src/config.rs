//! Company configuration management.
//!
//! The source of truth for issuer identity, document series names, and tax
//! rates. The configuration is loaded once and injected into the services
//! that need it; there is no mutable global.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{FiscalError, FiscalResult};

/// Company (issuer) configuration.
///
/// Mirrors the reference data a tax authority expects in audit exports:
/// registration identity, address, document series, and the software
/// certificate issued to this application.
#[derive(Debug, Clone, Deserialize)]
pub struct CompanyConfig {
    /// Tax registration number (NIF), exactly 9 digits.
    pub tax_registration_number: String,
    /// Legal company name.
    pub company_name: String,
    /// Street name of the registered address.
    pub street_name: String,
    /// Building number, if any.
    #[serde(default)]
    pub building_number: Option<String>,
    /// City of the registered address.
    pub city: String,
    /// Postal code of the registered address.
    pub postal_code: String,
    /// ISO country code of the jurisdiction.
    #[serde(default = "default_country")]
    pub country: String,
    /// Contact telephone.
    #[serde(default = "default_contact")]
    pub telephone: String,
    /// Contact email, if any.
    #[serde(default)]
    pub email: Option<String>,
    /// Company website, if any.
    #[serde(default)]
    pub website: Option<String>,
    /// First month of the fiscal year (1 = January).
    #[serde(default = "default_fiscal_year_start_month")]
    pub fiscal_year_start_month: u32,
    /// Series for invoices (FT) and invoice-receipts (FR).
    #[serde(default = "default_invoice_series")]
    pub invoice_series: String,
    /// Series for credit notes (NC).
    #[serde(default = "default_credit_note_series")]
    pub credit_note_series: String,
    /// Series for sales receipts (TV).
    #[serde(default = "default_receipt_series")]
    pub receipt_series: String,
    /// Certificate number assigned to this software by the tax authority.
    pub software_certificate_number: String,
    /// Software version reported in exports.
    #[serde(default = "default_software_version")]
    pub software_version: String,
    /// ISO 4217 currency code used in exports.
    #[serde(default = "default_currency_code")]
    pub currency_code: String,
    /// Default tax code applied to lines without an explicit one.
    #[serde(default = "default_tax_code")]
    pub default_tax_code: String,
    /// Tax rates known to the system, exported in the audit tax table.
    #[serde(default = "default_tax_table")]
    pub tax_table: Vec<TaxRate>,
}

/// A tax (IVA) rate entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TaxRate {
    /// Tax code (e.g. "NOR", "ISE").
    pub tax_code: String,
    /// Human-readable description.
    pub description: String,
    /// Percentage, between 0 and 100.
    pub percentage: Decimal,
    /// First day the rate applies, if bounded.
    #[serde(default)]
    pub valid_from: Option<NaiveDate>,
    /// Last day the rate applies, if bounded.
    #[serde(default)]
    pub valid_to: Option<NaiveDate>,
    /// Whether the rate is currently usable.
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl TaxRate {
    /// Returns true if the rate is active and valid on the given date.
    #[must_use]
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        if !self.is_active {
            return false;
        }
        if let Some(from) = self.valid_from {
            if date < from {
                return false;
            }
        }
        if let Some(to) = self.valid_to {
            if date > to {
                return false;
            }
        }
        true
    }
}

fn default_country() -> String {
    "CV".to_string()
}

fn default_contact() -> String {
    "N/A".to_string()
}

fn default_fiscal_year_start_month() -> u32 {
    1
}

fn default_invoice_series() -> String {
    "FT A".to_string()
}

fn default_credit_note_series() -> String {
    "NC A".to_string()
}

fn default_receipt_series() -> String {
    "TV A".to_string()
}

fn default_software_version() -> String {
    "1.0".to_string()
}

fn default_currency_code() -> String {
    "CVE".to_string()
}

fn default_tax_code() -> String {
    "NOR".to_string()
}

fn default_tax_table() -> Vec<TaxRate> {
    vec![TaxRate {
        tax_code: "NOR".to_string(),
        description: "IVA Normal".to_string(),
        percentage: Decimal::new(1500, 2),
        valid_from: None,
        valid_to: None,
        is_active: true,
    }]
}

const fn default_true() -> bool {
    true
}

impl CompanyConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or fails validation.
    pub fn load() -> FiscalResult<Self> {
        dotenvy::dotenv().ok();
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("MORABEZA").separator("__"))
            .build()
            .map_err(|e| FiscalError::Configuration(e.to_string()))?;

        let company: Self = config
            .try_deserialize()
            .map_err(|e| FiscalError::Configuration(e.to_string()))?;
        company.validate()?;
        Ok(company)
    }

    /// Validates cross-field configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns `FiscalError::Configuration` naming the offending field.
    pub fn validate(&self) -> FiscalResult<()> {
        if self.tax_registration_number.len() != 9
            || !self.tax_registration_number.chars().all(|c| c.is_ascii_digit())
        {
            return Err(FiscalError::Configuration(
                "tax_registration_number must be exactly 9 digits".to_string(),
            ));
        }
        if !(1..=12).contains(&self.fiscal_year_start_month) {
            return Err(FiscalError::Configuration(
                "fiscal_year_start_month must be between 1 and 12".to_string(),
            ));
        }
        for rate in &self.tax_table {
            if rate.percentage < Decimal::ZERO || rate.percentage > Decimal::from(100) {
                return Err(FiscalError::Configuration(format!(
                    "tax rate {} percentage must be between 0 and 100",
                    rate.tax_code
                )));
            }
            if let (Some(from), Some(to)) = (rate.valid_from, rate.valid_to) {
                if to < from {
                    return Err(FiscalError::Configuration(format!(
                        "tax rate {} valid_to cannot precede valid_from",
                        rate.tax_code
                    )));
                }
            }
        }
        Ok(())
    }

    /// Looks up an active tax rate by code, valid on the given date.
    #[must_use]
    pub fn tax_rate_on(&self, tax_code: &str, date: NaiveDate) -> Option<&TaxRate> {
        self.tax_table
            .iter()
            .find(|r| r.tax_code == tax_code && r.is_valid_on(date))
    }
}

impl Default for CompanyConfig {
    /// Development defaults matching the demo issuer.
    fn default() -> Self {
        Self {
            tax_registration_number: "200144731".to_string(),
            company_name: "Morabeza Restaurante Lda".to_string(),
            street_name: "Avenida Amilcar Cabral".to_string(),
            building_number: Some("12".to_string()),
            city: "Praia".to_string(),
            postal_code: "7600".to_string(),
            country: default_country(),
            telephone: "+238 260 00 00".to_string(),
            email: None,
            website: None,
            fiscal_year_start_month: default_fiscal_year_start_month(),
            invoice_series: default_invoice_series(),
            credit_note_series: default_credit_note_series(),
            receipt_series: default_receipt_series(),
            software_certificate_number: "0042".to_string(),
            software_version: default_software_version(),
            currency_code: default_currency_code(),
            default_tax_code: default_tax_code(),
            tax_table: default_tax_table(),
        }
    }
}
