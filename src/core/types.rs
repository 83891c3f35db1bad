use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::uf::Uf;

/// A fiscal document ready for the emission pipeline.
///
/// One variant per document kind; the downstream XML generator, signer,
/// and transport select their behavior from the variant, not from
/// runtime inspection of the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Document {
    /// Goods invoice (NF-e, model 55).
    Nfe(Nfe),
    /// National service invoice declaration (DPS).
    Dps(Dps),
    /// Cancellation event against a previously authorized NF-e.
    Cancelamento(CancelEvent),
}

/// B: Identification block (ide) shared by both invoice kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identification {
    /// B02: cUF — issuing state.
    pub uf: Uf,
    /// B07: serie — document series (0–999).
    pub series: u16,
    /// B08: nNF — document number (1–999 999 999).
    pub number: u64,
    /// B09: dhEmi — emission instant with explicit UTC offset.
    pub issue_datetime: DateTime<FixedOffset>,
    /// B24: tpAmb — target environment.
    pub environment: Environment,
    /// B22: tpEmis — emission mode.
    pub emission_mode: EmissionMode,
    /// B25: finNFe — emission purpose.
    pub purpose: Purpose,
    /// B04: natOp — operation nature free text.
    pub operation_nature: String,
    /// B12: cMunFG — municipality where the taxable event occurs (7-digit IBGE).
    pub municipality_code: String,
}

/// B24: tpAmb — authority environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Environment {
    /// 1 — production.
    Producao,
    /// 2 — homologation (authority test environment).
    Homologacao,
}

impl Environment {
    /// tpAmb numeric code.
    pub fn code(&self) -> u8 {
        match self {
            Self::Producao => 1,
            Self::Homologacao => 2,
        }
    }

    /// Parse from the tpAmb numeric code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Producao),
            2 => Some(Self::Homologacao),
            _ => None,
        }
    }

    /// Parse from the conventional environment string
    /// ("producao" / "homologacao", accents tolerated).
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "producao" | "produção" | "1" => Some(Self::Producao),
            "homologacao" | "homologação" | "2" => Some(Self::Homologacao),
            _ => None,
        }
    }
}

/// B22: tpEmis — emission mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmissionMode {
    /// 1 — normal emission.
    Normal,
    /// 9 — offline contingency.
    ContingencyOffline,
}

impl EmissionMode {
    /// tpEmis numeric code.
    pub fn code(&self) -> u8 {
        match self {
            Self::Normal => 1,
            Self::ContingencyOffline => 9,
        }
    }
}

/// B25: finNFe — emission purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Purpose {
    /// 1 — normal document.
    Normal,
    /// 2 — complementary document.
    Complementary,
    /// 3 — adjustment document.
    Adjustment,
    /// 4 — goods return.
    Return,
}

impl Purpose {
    /// finNFe numeric code.
    pub fn code(&self) -> u8 {
        match self {
            Self::Normal => 1,
            Self::Complementary => 2,
            Self::Adjustment => 3,
            Self::Return => 4,
        }
    }
}

/// C16: CRT — issuer tax regime. Selects the ICMS group emitted for every
/// line item (CSOSN for Simples Nacional, CST otherwise).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaxRegime {
    /// 1 — Simples Nacional.
    SimplesNacional,
    /// 2 — Simples Nacional over the gross revenue ceiling.
    SimplesExcesso,
    /// 3 — normal regime.
    RegimeNormal,
}

impl TaxRegime {
    /// CRT numeric code.
    pub fn code(&self) -> u8 {
        match self {
            Self::SimplesNacional => 1,
            Self::SimplesExcesso => 2,
            Self::RegimeNormal => 3,
        }
    }

    /// Whether line items are emitted with the CSOSN simplified group.
    pub fn uses_csosn(&self) -> bool {
        matches!(self, Self::SimplesNacional)
    }
}

/// C: Issuer block (emit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issuer {
    /// C02: CNPJ — 14 digits, no punctuation.
    pub cnpj: String,
    /// C03: xNome — corporate name.
    pub corporate_name: String,
    /// C04: xFant — trade name.
    pub trade_name: Option<String>,
    /// C17: IE — state registration.
    pub state_registration: String,
    /// C16: CRT — tax regime.
    pub tax_regime: TaxRegime,
    /// C05: enderEmit.
    pub address: Address,
}

/// Identifier of the counterparty: domestic tax ID or foreign document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyId {
    /// E02: CNPJ — 14 digits.
    Cnpj(String),
    /// E03: CPF — 11 digits.
    Cpf(String),
    /// E03a: idEstrangeiro — foreign identifier, free format.
    Foreign(String),
}

impl PartyId {
    /// The bare digit/identifier string.
    pub fn value(&self) -> &str {
        match self {
            Self::Cnpj(v) | Self::Cpf(v) | Self::Foreign(v) => v,
        }
    }
}

/// E16a: indIEDest — recipient state-registration situation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IeIndicator {
    /// 1 — ICMS taxpayer.
    Taxpayer,
    /// 2 — exempt from registration.
    Exempt,
    /// 9 — non-taxpayer.
    NonTaxpayer,
}

impl IeIndicator {
    /// indIEDest numeric code.
    pub fn code(&self) -> u8 {
        match self {
            Self::Taxpayer => 1,
            Self::Exempt => 2,
            Self::NonTaxpayer => 9,
        }
    }
}

/// E: Recipient block (dest).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    /// E02/E03/E03a: identification.
    pub id: PartyId,
    /// E04: xNome.
    pub name: String,
    /// E16a: indIEDest.
    pub ie_indicator: IeIndicator,
    /// E17: IE — recipient state registration, when a taxpayer.
    pub state_registration: Option<String>,
    /// E05: enderDest.
    pub address: Address,
    /// E19: email.
    pub email: Option<String>,
}

/// C05/E05: Address block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    /// xLgr: street.
    pub street: Option<String>,
    /// nro: street number.
    pub number: Option<String>,
    /// xBairro: district.
    pub district: Option<String>,
    /// xMun: municipality name.
    pub city: String,
    /// cMun: 7-digit IBGE municipality code.
    pub municipality_code: String,
    /// UF.
    pub uf: Uf,
    /// CEP: 8-digit postal code.
    pub postal_code: Option<String>,
    /// fone: phone, digits only.
    pub phone: Option<String>,
}

/// I: Line item block (det/prod) shared by goods and service documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    /// I02: cProd — item code.
    pub code: String,
    /// I03: cEAN — GTIN barcode, "SEM GTIN" when absent.
    pub ean: Option<String>,
    /// I04: xProd — description.
    pub description: String,
    /// I05: NCM — Mercosur classification (8 digits); service items use
    /// the LC 116 service list code instead.
    pub classification_code: String,
    /// I08: CFOP — operation code (goods only).
    pub cfop: Option<String>,
    /// I09: uCom — commercial unit.
    pub unit: String,
    /// I10: qCom — quantity, 4 fraction digits on the wire.
    pub quantity: Decimal,
    /// I10a: vUnCom — unit price.
    pub unit_price: Decimal,
    /// I11: vProd — computed line total (quantity × unit price), set by
    /// `calculate_totals()`.
    pub line_total: Option<Decimal>,
    /// Line tax sub-model.
    pub tax: LineTax,
}

/// N/Q/S: per-item tax sub-model.
///
/// Which ICMS group is emitted (CSOSN vs CST) is decided by the issuer's
/// [`TaxRegime`] at XML-generation time; both codes are carried so the
/// model does not depend on the issuer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineTax {
    /// N11: orig — goods origin (0 national … 8).
    pub origin: u8,
    /// N12: CST — ICMS situation code for normal-regime issuers.
    pub cst: String,
    /// N12a: CSOSN — situation code for Simples Nacional issuers.
    pub csosn: String,
    /// ICMS (or ISS, for service items) rate, 4 fraction digits.
    pub rate: Decimal,
    /// Q06: PIS group, when applicable.
    pub pis: Option<TaxDetail>,
    /// S06: COFINS group, when applicable.
    pub cofins: Option<TaxDetail>,
}

impl Default for LineTax {
    fn default() -> Self {
        Self {
            origin: 0,
            cst: "41".into(),
            csosn: "102".into(),
            rate: Decimal::ZERO,
            pis: None,
            cofins: None,
        }
    }
}

/// Q/S: CST + rate pair for PIS/COFINS groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxDetail {
    /// CST code (e.g. "01" taxed, "07" exempt).
    pub cst: String,
    /// Rate, 4 fraction digits.
    pub rate: Decimal,
}

/// YA02: tPag — payment means codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMeans {
    /// 01 — cash.
    Cash,
    /// 02 — cheque.
    Cheque,
    /// 03 — credit card.
    CreditCard,
    /// 04 — debit card.
    DebitCard,
    /// 05 — store credit.
    StoreCredit,
    /// 15 — bank transfer (boleto).
    BankSlip,
    /// 17 — instant payment (PIX).
    Pix,
    /// 90 — no payment (e.g. adjustment documents).
    None,
    /// 99 — other.
    Other,
}

impl PaymentMeans {
    /// tPag 2-digit code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Cash => "01",
            Self::Cheque => "02",
            Self::CreditCard => "03",
            Self::DebitCard => "04",
            Self::StoreCredit => "05",
            Self::BankSlip => "15",
            Self::Pix => "17",
            Self::None => "90",
            Self::Other => "99",
        }
    }

    /// Parse from the tPag code string.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "01" => Some(Self::Cash),
            "02" => Some(Self::Cheque),
            "03" => Some(Self::CreditCard),
            "04" => Some(Self::DebitCard),
            "05" => Some(Self::StoreCredit),
            "15" => Some(Self::BankSlip),
            "17" => Some(Self::Pix),
            "90" => Some(Self::None),
            "99" => Some(Self::Other),
            _ => None,
        }
    }
}

/// YA: one payment detail entry (detPag).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// YA02: tPag.
    pub means: PaymentMeans,
    /// YA03: vPag.
    pub amount: Decimal,
}

/// X02: modFrete — freight responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FreightMode {
    /// 0 — issuer pays.
    Issuer,
    /// 1 — recipient pays.
    Recipient,
    /// 3 — third party.
    ThirdParty,
    /// 9 — no transport.
    NoTransport,
}

impl FreightMode {
    /// modFrete numeric code.
    pub fn code(&self) -> u8 {
        match self {
            Self::Issuer => 0,
            Self::Recipient => 1,
            Self::ThirdParty => 3,
            Self::NoTransport => 9,
        }
    }
}

/// X: transport block (transp).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transport {
    /// X02: modFrete.
    pub freight_mode: FreightMode,
    /// X04: carrier CNPJ.
    pub carrier_cnpj: Option<String>,
    /// X06: carrier name.
    pub carrier_name: Option<String>,
    /// X19: vehicle plate.
    pub vehicle_plate: Option<String>,
}

/// Y07–Y10: one installment (dup).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installment {
    /// Y08: nDup — installment number.
    pub number: String,
    /// Y09: dVenc — due date.
    pub due_date: chrono::NaiveDate,
    /// Y10: vDup — amount.
    pub amount: Decimal,
}

/// Y: billing block (cobr).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Billing {
    /// Y03: nFat — commercial invoice number.
    pub invoice_number: Option<String>,
    /// Y07: dup entries, in due-date order.
    pub installments: Vec<Installment>,
}

/// W: computed document totals (total/ICMSTot), set by `calculate_totals()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Totals {
    /// W05: vBC — ICMS base.
    pub icms_base: Decimal,
    /// W06: vICMS — total ICMS.
    pub icms_total: Decimal,
    /// W07: vProd — sum of line totals.
    pub products_total: Decimal,
    /// W16: vNF — document total.
    pub invoice_total: Decimal,
}

/// NF-e goods invoice (model 55).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nfe {
    /// B: identification.
    pub identification: Identification,
    /// C: issuer.
    pub issuer: Issuer,
    /// E: recipient.
    pub recipient: Recipient,
    /// H/I: line items, emitted in input order.
    pub items: Vec<LineItem>,
    /// X: optional transport.
    pub transport: Option<Transport>,
    /// Y: optional billing.
    pub billing: Option<Billing>,
    /// YA: payment details, emitted in input order.
    pub payments: Vec<Payment>,
    /// Z02: infCpl — free-text additional information.
    pub additional_info: Option<String>,
    /// W: calculated totals (set by `calculate_totals()`).
    pub totals: Option<Totals>,
}

/// National service invoice declaration (DPS, layout 1.00).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dps {
    /// Identification; `uf`/`municipality_code` locate the service.
    pub identification: Identification,
    /// Service provider (prest).
    pub issuer: Issuer,
    /// Service taker (toma).
    pub recipient: Recipient,
    /// Services rendered, emitted in input order; `classification_code`
    /// carries the LC 116 service list item.
    pub items: Vec<LineItem>,
    /// Free-text additional information.
    pub additional_info: Option<String>,
    /// Calculated totals (`icms_*` fields carry the ISS figures).
    pub totals: Option<Totals>,
}

/// Cancellation event (evento 110111) for an authorized NF-e.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelEvent {
    /// Access key of the document being cancelled.
    pub access_key: String,
    /// P07: nProt — authorization protocol of the original document.
    pub protocol_number: String,
    /// P08: xJust — justification, 15–255 characters.
    pub justification: String,
    /// HP18: nSeqEvento — event sequence, 1 for the first attempt.
    pub sequence: u8,
    /// Author CNPJ (matches the original issuer).
    pub author_cnpj: String,
    /// Event instant.
    pub issue_datetime: DateTime<FixedOffset>,
    /// Target environment.
    pub environment: Environment,
}

impl Nfe {
    /// Compute line totals and document totals by full-precision summation;
    /// values are only rounded when formatted at XML output.
    pub fn calculate_totals(&mut self) {
        let mut products = Decimal::ZERO;
        let mut icms_base = Decimal::ZERO;
        let mut icms_total = Decimal::ZERO;
        let uses_csosn = self.issuer.tax_regime.uses_csosn();
        for item in &mut self.items {
            let line = item.quantity * item.unit_price;
            item.line_total = Some(line);
            products += line;
            // Simples Nacional lines carry no ICMS of their own.
            if !uses_csosn && item.tax.cst == "00" {
                icms_base += line;
                icms_total += line * item.tax.rate / Decimal::from(100);
            }
        }
        self.totals = Some(Totals {
            icms_base,
            icms_total,
            products_total: products,
            invoice_total: products,
        });
    }
}

impl Dps {
    /// Compute line totals and service totals; `icms_*` carry ISS figures.
    pub fn calculate_totals(&mut self) {
        let mut services = Decimal::ZERO;
        let mut iss_base = Decimal::ZERO;
        let mut iss_total = Decimal::ZERO;
        for item in &mut self.items {
            let line = item.quantity * item.unit_price;
            item.line_total = Some(line);
            services += line;
            iss_base += line;
            iss_total += line * item.tax.rate / Decimal::from(100);
        }
        self.totals = Some(Totals {
            icms_base: iss_base,
            icms_total: iss_total,
            products_total: services,
            invoice_total: services,
        });
    }
}

impl Document {
    /// The environment this document targets.
    pub fn environment(&self) -> Environment {
        match self {
            Self::Nfe(nfe) => nfe.identification.environment,
            Self::Dps(dps) => dps.identification.environment,
            Self::Cancelamento(ev) => ev.environment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn environment_codes() {
        assert_eq!(Environment::Producao.code(), 1);
        assert_eq!(Environment::Homologacao.code(), 2);
        assert_eq!(Environment::parse("homologacao"), Some(Environment::Homologacao));
        assert_eq!(Environment::parse("produção"), Some(Environment::Producao));
        assert_eq!(Environment::parse("staging"), None);
    }

    #[test]
    fn payment_means_round_trip() {
        for means in [
            PaymentMeans::Cash,
            PaymentMeans::Pix,
            PaymentMeans::BankSlip,
            PaymentMeans::Other,
        ] {
            assert_eq!(PaymentMeans::from_code(means.code()), Some(means));
        }
        assert_eq!(PaymentMeans::from_code("42"), None);
    }

    #[test]
    fn tax_regime_selects_group() {
        assert!(TaxRegime::SimplesNacional.uses_csosn());
        assert!(!TaxRegime::RegimeNormal.uses_csosn());
        assert!(!TaxRegime::SimplesExcesso.uses_csosn());
    }

    #[test]
    fn totals_sum_in_full_precision() {
        let tax = LineTax {
            cst: "00".into(),
            rate: dec!(18),
            ..LineTax::default()
        };
        let mut nfe = sample_nfe(vec![
            item("001", dec!(3), dec!(0.333), tax.clone()),
            item("002", dec!(2), dec!(10.005), tax),
        ]);
        nfe.issuer.tax_regime = TaxRegime::RegimeNormal;
        nfe.calculate_totals();
        let totals = nfe.totals.unwrap();
        // 3 * 0.333 + 2 * 10.005 = 0.999 + 20.010 = 21.009, unrounded
        assert_eq!(totals.products_total, dec!(21.009));
        assert_eq!(totals.icms_base, dec!(21.009));
    }

    fn item(code: &str, qty: Decimal, price: Decimal, tax: LineTax) -> LineItem {
        LineItem {
            code: code.into(),
            ean: None,
            description: "Item".into(),
            classification_code: "73181500".into(),
            cfop: Some("5102".into()),
            unit: "UN".into(),
            quantity: qty,
            unit_price: price,
            line_total: None,
            tax,
        }
    }

    fn sample_nfe(items: Vec<LineItem>) -> Nfe {
        use chrono::TimeZone;
        let brt = chrono::FixedOffset::west_opt(3 * 3600).unwrap();
        Nfe {
            identification: Identification {
                uf: Uf::Sp,
                series: 1,
                number: 1,
                issue_datetime: brt.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).unwrap(),
                environment: Environment::Homologacao,
                emission_mode: EmissionMode::Normal,
                purpose: Purpose::Normal,
                operation_nature: "VENDA".into(),
                municipality_code: "3550308".into(),
            },
            issuer: Issuer {
                cnpj: "12345678000195".into(),
                corporate_name: "Acme Comercio Ltda".into(),
                trade_name: None,
                state_registration: "123456789012".into(),
                tax_regime: TaxRegime::SimplesNacional,
                address: Address {
                    street: Some("Rua Um".into()),
                    number: Some("100".into()),
                    district: Some("Centro".into()),
                    city: "Sao Paulo".into(),
                    municipality_code: "3550308".into(),
                    uf: Uf::Sp,
                    postal_code: Some("01001000".into()),
                    phone: None,
                },
            },
            recipient: Recipient {
                id: PartyId::Cnpj("98765432000192".into()),
                name: "Cliente SA".into(),
                ie_indicator: IeIndicator::NonTaxpayer,
                state_registration: None,
                address: Address {
                    street: Some("Rua Dois".into()),
                    number: Some("200".into()),
                    district: Some("Centro".into()),
                    city: "Campinas".into(),
                    municipality_code: "3509502".into(),
                    uf: Uf::Sp,
                    postal_code: None,
                    phone: None,
                },
                email: None,
            },
            items,
            transport: None,
            billing: None,
            payments: vec![],
            additional_info: None,
            totals: None,
        }
    }
}
