use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;

use super::error::NotaError;
use super::types::*;
use super::uf::Uf;

/// Builder for NF-e goods invoices.
///
/// ```
/// use chrono::{FixedOffset, TimeZone};
/// use notafiscal::core::*;
/// use rust_decimal_macros::dec;
///
/// let brt = FixedOffset::west_opt(3 * 3600).unwrap();
/// let nota = NfeBuilder::new(1, 1, brt.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).unwrap())
///     .issuer(IssuerBuilder::new("12345678000195", "Acme Comercio Ltda",
///         AddressBuilder::new("Sao Paulo", "3550308", Uf::Sp).build())
///         .build())
///     .recipient(RecipientBuilder::new(PartyId::Cpf("12345678909".into()), "Fulano",
///         AddressBuilder::new("Sao Paulo", "3550308", Uf::Sp).build())
///         .build())
///     .add_item(LineItemBuilder::new("001", "Caneta", dec!(2), "UN", dec!(3.50)).build())
///     .build();
/// ```
pub struct NfeBuilder {
    number: u64,
    series: u16,
    issue_datetime: DateTime<FixedOffset>,
    environment: Environment,
    emission_mode: EmissionMode,
    purpose: Purpose,
    operation_nature: String,
    municipality_code: Option<String>,
    issuer: Option<Issuer>,
    recipient: Option<Recipient>,
    items: Vec<LineItem>,
    transport: Option<Transport>,
    billing: Option<Billing>,
    payments: Vec<Payment>,
    additional_info: Option<String>,
}

impl NfeBuilder {
    pub fn new(number: u64, series: u16, issue_datetime: DateTime<FixedOffset>) -> Self {
        Self {
            number,
            series,
            issue_datetime,
            environment: Environment::Homologacao,
            emission_mode: EmissionMode::Normal,
            purpose: Purpose::Normal,
            operation_nature: "VENDA".to_string(),
            municipality_code: None,
            issuer: None,
            recipient: None,
            items: Vec::new(),
            transport: None,
            billing: None,
            payments: Vec::new(),
            additional_info: None,
        }
    }

    pub fn environment(mut self, env: Environment) -> Self {
        self.environment = env;
        self
    }

    pub fn emission_mode(mut self, mode: EmissionMode) -> Self {
        self.emission_mode = mode;
        self
    }

    pub fn purpose(mut self, purpose: Purpose) -> Self {
        self.purpose = purpose;
        self
    }

    pub fn operation_nature(mut self, nature: impl Into<String>) -> Self {
        self.operation_nature = nature.into();
        self
    }

    /// cMunFG override; defaults to the issuer's municipality.
    pub fn municipality_code(mut self, code: impl Into<String>) -> Self {
        self.municipality_code = Some(code.into());
        self
    }

    pub fn issuer(mut self, issuer: Issuer) -> Self {
        self.issuer = Some(issuer);
        self
    }

    pub fn recipient(mut self, recipient: Recipient) -> Self {
        self.recipient = Some(recipient);
        self
    }

    pub fn add_item(mut self, item: LineItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn transport(mut self, transport: Transport) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn billing(mut self, billing: Billing) -> Self {
        self.billing = Some(billing);
        self
    }

    pub fn add_payment(mut self, means: PaymentMeans, amount: Decimal) -> Self {
        self.payments.push(Payment { means, amount });
        self
    }

    pub fn additional_info(mut self, info: impl Into<String>) -> Self {
        self.additional_info = Some(info.into());
        self
    }

    /// Assemble the invoice, computing totals.
    ///
    /// # Errors
    /// Returns [`NotaError::Builder`] when the issuer, recipient, or at
    /// least one line item is missing, or a numeric field is out of range.
    pub fn build(self) -> Result<Nfe, NotaError> {
        let issuer = self
            .issuer
            .ok_or_else(|| NotaError::Builder("issuer is required".into()))?;
        let recipient = self
            .recipient
            .ok_or_else(|| NotaError::Builder("recipient is required".into()))?;
        if self.items.is_empty() {
            return Err(NotaError::Builder(
                "at least one line item is required".into(),
            ));
        }
        if self.number == 0 || self.number > 999_999_999 {
            return Err(NotaError::Builder(format!(
                "document number {} out of range 1..=999999999",
                self.number
            )));
        }
        if self.series > 999 {
            return Err(NotaError::Builder(format!(
                "series {} out of range 0..=999",
                self.series
            )));
        }
        let municipality_code = self
            .municipality_code
            .unwrap_or_else(|| issuer.address.municipality_code.clone());
        let mut nfe = Nfe {
            identification: Identification {
                uf: issuer.address.uf,
                series: self.series,
                number: self.number,
                issue_datetime: self.issue_datetime,
                environment: self.environment,
                emission_mode: self.emission_mode,
                purpose: self.purpose,
                operation_nature: self.operation_nature,
                municipality_code,
            },
            issuer,
            recipient,
            items: self.items,
            transport: self.transport,
            billing: self.billing,
            payments: self.payments,
            additional_info: self.additional_info,
            totals: None,
        };
        nfe.calculate_totals();
        Ok(nfe)
    }
}

/// Builder for DPS service invoices. Shares the party and line-item
/// builders with the NF-e side.
pub struct DpsBuilder {
    number: u64,
    series: u16,
    issue_datetime: DateTime<FixedOffset>,
    environment: Environment,
    issuer: Option<Issuer>,
    recipient: Option<Recipient>,
    items: Vec<LineItem>,
    additional_info: Option<String>,
}

impl DpsBuilder {
    pub fn new(number: u64, series: u16, issue_datetime: DateTime<FixedOffset>) -> Self {
        Self {
            number,
            series,
            issue_datetime,
            environment: Environment::Homologacao,
            issuer: None,
            recipient: None,
            items: Vec::new(),
            additional_info: None,
        }
    }

    pub fn environment(mut self, env: Environment) -> Self {
        self.environment = env;
        self
    }

    pub fn issuer(mut self, issuer: Issuer) -> Self {
        self.issuer = Some(issuer);
        self
    }

    pub fn recipient(mut self, recipient: Recipient) -> Self {
        self.recipient = Some(recipient);
        self
    }

    pub fn add_item(mut self, item: LineItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn additional_info(mut self, info: impl Into<String>) -> Self {
        self.additional_info = Some(info.into());
        self
    }

    /// Assemble the declaration, computing totals.
    ///
    /// # Errors
    /// Returns [`NotaError::Builder`] when the provider, taker, or at
    /// least one service item is missing, or the number is out of range.
    pub fn build(self) -> Result<Dps, NotaError> {
        let issuer = self
            .issuer
            .ok_or_else(|| NotaError::Builder("service provider is required".into()))?;
        let recipient = self
            .recipient
            .ok_or_else(|| NotaError::Builder("service taker is required".into()))?;
        if self.items.is_empty() {
            return Err(NotaError::Builder(
                "at least one service item is required".into(),
            ));
        }
        if self.number == 0 || self.number > 999_999_999_999_999 {
            return Err(NotaError::Builder(format!(
                "DPS number {} out of range",
                self.number
            )));
        }
        let mut dps = Dps {
            identification: Identification {
                uf: issuer.address.uf,
                series: self.series,
                number: self.number,
                issue_datetime: self.issue_datetime,
                environment: self.environment,
                emission_mode: EmissionMode::Normal,
                purpose: Purpose::Normal,
                operation_nature: "PRESTACAO DE SERVICO".to_string(),
                municipality_code: issuer.address.municipality_code.clone(),
            },
            issuer,
            recipient,
            items: self.items,
            additional_info: self.additional_info,
            totals: None,
        };
        dps.calculate_totals();
        Ok(dps)
    }
}

/// Builder for the issuer block.
pub struct IssuerBuilder {
    cnpj: String,
    corporate_name: String,
    trade_name: Option<String>,
    state_registration: String,
    tax_regime: TaxRegime,
    address: Address,
}

impl IssuerBuilder {
    pub fn new(cnpj: impl Into<String>, name: impl Into<String>, address: Address) -> Self {
        Self {
            cnpj: cnpj.into(),
            corporate_name: name.into(),
            trade_name: None,
            state_registration: String::new(),
            tax_regime: TaxRegime::SimplesNacional,
            address,
        }
    }

    pub fn trade_name(mut self, name: impl Into<String>) -> Self {
        self.trade_name = Some(name.into());
        self
    }

    pub fn state_registration(mut self, ie: impl Into<String>) -> Self {
        self.state_registration = ie.into();
        self
    }

    pub fn tax_regime(mut self, regime: TaxRegime) -> Self {
        self.tax_regime = regime;
        self
    }

    pub fn build(self) -> Issuer {
        Issuer {
            cnpj: self.cnpj,
            corporate_name: self.corporate_name,
            trade_name: self.trade_name,
            state_registration: self.state_registration,
            tax_regime: self.tax_regime,
            address: self.address,
        }
    }
}

/// Builder for the recipient block.
pub struct RecipientBuilder {
    id: PartyId,
    name: String,
    ie_indicator: IeIndicator,
    state_registration: Option<String>,
    address: Address,
    email: Option<String>,
}

impl RecipientBuilder {
    pub fn new(id: PartyId, name: impl Into<String>, address: Address) -> Self {
        Self {
            id,
            name: name.into(),
            ie_indicator: IeIndicator::NonTaxpayer,
            state_registration: None,
            address,
            email: None,
        }
    }

    pub fn taxpayer(mut self, state_registration: impl Into<String>) -> Self {
        self.ie_indicator = IeIndicator::Taxpayer;
        self.state_registration = Some(state_registration.into());
        self
    }

    pub fn exempt(mut self) -> Self {
        self.ie_indicator = IeIndicator::Exempt;
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn build(self) -> Recipient {
        Recipient {
            id: self.id,
            name: self.name,
            ie_indicator: self.ie_indicator,
            state_registration: self.state_registration,
            address: self.address,
            email: self.email,
        }
    }
}

/// Builder for addresses.
pub struct AddressBuilder {
    street: Option<String>,
    number: Option<String>,
    district: Option<String>,
    city: String,
    municipality_code: String,
    uf: Uf,
    postal_code: Option<String>,
    phone: Option<String>,
}

impl AddressBuilder {
    pub fn new(city: impl Into<String>, municipality_code: impl Into<String>, uf: Uf) -> Self {
        Self {
            street: None,
            number: None,
            district: None,
            city: city.into(),
            municipality_code: municipality_code.into(),
            uf,
            postal_code: None,
            phone: None,
        }
    }

    pub fn street(mut self, street: impl Into<String>) -> Self {
        self.street = Some(street.into());
        self
    }

    pub fn number(mut self, number: impl Into<String>) -> Self {
        self.number = Some(number.into());
        self
    }

    pub fn district(mut self, district: impl Into<String>) -> Self {
        self.district = Some(district.into());
        self
    }

    pub fn postal_code(mut self, cep: impl Into<String>) -> Self {
        self.postal_code = Some(cep.into());
        self
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn build(self) -> Address {
        Address {
            street: self.street,
            number: self.number,
            district: self.district,
            city: self.city,
            municipality_code: self.municipality_code,
            uf: self.uf,
            postal_code: self.postal_code,
            phone: self.phone,
        }
    }
}

/// Builder for line items.
pub struct LineItemBuilder {
    code: String,
    ean: Option<String>,
    description: String,
    classification_code: String,
    cfop: Option<String>,
    unit: String,
    quantity: Decimal,
    unit_price: Decimal,
    tax: LineTax,
}

impl LineItemBuilder {
    pub fn new(
        code: impl Into<String>,
        description: impl Into<String>,
        quantity: Decimal,
        unit: impl Into<String>,
        unit_price: Decimal,
    ) -> Self {
        Self {
            code: code.into(),
            ean: None,
            description: description.into(),
            classification_code: String::new(),
            cfop: None,
            unit: unit.into(),
            quantity,
            unit_price,
            tax: LineTax::default(),
        }
    }

    pub fn ean(mut self, ean: impl Into<String>) -> Self {
        self.ean = Some(ean.into());
        self
    }

    /// NCM classification for goods items.
    pub fn ncm(mut self, ncm: impl Into<String>) -> Self {
        self.classification_code = ncm.into();
        self
    }

    /// LC 116 service list item for service items.
    pub fn service_code(mut self, code: impl Into<String>) -> Self {
        self.classification_code = code.into();
        self
    }

    pub fn cfop(mut self, cfop: impl Into<String>) -> Self {
        self.cfop = Some(cfop.into());
        self
    }

    pub fn tax(mut self, tax: LineTax) -> Self {
        self.tax = tax;
        self
    }

    /// Shorthand: normal-regime ICMS with the given CST and rate.
    pub fn icms(mut self, cst: impl Into<String>, rate: Decimal) -> Self {
        self.tax.cst = cst.into();
        self.tax.rate = rate;
        self
    }

    /// Shorthand: Simples Nacional CSOSN code.
    pub fn csosn(mut self, csosn: impl Into<String>) -> Self {
        self.tax.csosn = csosn.into();
        self
    }

    pub fn origin(mut self, origin: u8) -> Self {
        self.tax.origin = origin;
        self
    }

    pub fn build(self) -> LineItem {
        LineItem {
            code: self.code,
            ean: self.ean,
            description: self.description,
            classification_code: self.classification_code,
            cfop: self.cfop,
            unit: self.unit,
            quantity: self.quantity,
            unit_price: self.unit_price,
            line_total: None,
            tax: self.tax,
        }
    }
}
