//! Pre-flight model validation.
//!
//! The authority rejects malformed documents with one error per
//! round-trip; these checks surface the complete list before any XML is
//! generated. Rule IDs reference the NF-e layout field identifiers.

use super::error::ValidationError;
use super::types::*;

/// Validate an NF-e model against the layout's structural rules.
/// Returns all violations found, never just the first.
pub fn validate_nfe(nfe: &Nfe) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    validate_issuer(&nfe.issuer, &mut errors);
    validate_recipient(&nfe.recipient, &mut errors);

    // B12: cMunFG must be a 7-digit IBGE code
    if !is_digits(&nfe.identification.municipality_code, 7) {
        errors.push(ValidationError::with_rule(
            "identification.municipality_code",
            "municipality code must be 7 digits",
            "B12",
        ));
    }

    // B04: natOp is mandatory
    if nfe.identification.operation_nature.trim().is_empty() {
        errors.push(ValidationError::with_rule(
            "identification.operation_nature",
            "operation nature must not be empty",
            "B04",
        ));
    }

    if nfe.items.is_empty() {
        errors.push(ValidationError::with_rule(
            "items",
            "document must carry at least one line item",
            "H01",
        ));
    }

    for (idx, item) in nfe.items.iter().enumerate() {
        validate_item(item, idx, true, &mut errors);
    }

    // YA03: payment amounts must cover the document total
    if !nfe.payments.is_empty() {
        let paid: rust_decimal::Decimal = nfe.payments.iter().map(|p| p.amount).sum();
        let total = nfe
            .totals
            .as_ref()
            .map(|t| t.invoice_total)
            .unwrap_or_default();
        if paid.round_dp(2) != total.round_dp(2) {
            errors.push(ValidationError::with_rule(
                "payments",
                format!("payment sum {paid} differs from document total {total}"),
                "YA03",
            ));
        }
    }

    errors
}

/// Validate a DPS model. Service items need the LC 116 listing code but
/// no CFOP.
pub fn validate_dps(dps: &Dps) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    validate_issuer(&dps.issuer, &mut errors);
    validate_recipient(&dps.recipient, &mut errors);

    if dps.items.is_empty() {
        errors.push(ValidationError::new(
            "items",
            "declaration must carry at least one service item",
        ));
    }
    for (idx, item) in dps.items.iter().enumerate() {
        validate_item(item, idx, false, &mut errors);
    }

    errors
}

/// Validate a cancellation event.
pub fn validate_cancel(event: &CancelEvent) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if event.access_key.len() != 44 || !event.access_key.bytes().all(|b| b.is_ascii_digit()) {
        errors.push(ValidationError::with_rule(
            "access_key",
            "access key must be exactly 44 digits",
            "HP15",
        ));
    }
    let just_len = event.justification.chars().count();
    if !(15..=255).contains(&just_len) {
        errors.push(ValidationError::with_rule(
            "justification",
            format!("justification must be 15-255 characters, got {just_len}"),
            "P08",
        ));
    }
    if event.protocol_number.trim().is_empty() {
        errors.push(ValidationError::with_rule(
            "protocol_number",
            "original authorization protocol is required",
            "P07",
        ));
    }
    if !is_valid_cnpj(&event.author_cnpj) {
        errors.push(ValidationError::new("author_cnpj", "invalid CNPJ"));
    }
    if event.sequence == 0 {
        errors.push(ValidationError::with_rule(
            "sequence",
            "event sequence starts at 1",
            "HP18",
        ));
    }

    errors
}

fn validate_issuer(issuer: &Issuer, errors: &mut Vec<ValidationError>) {
    // C02: issuer CNPJ
    if !is_valid_cnpj(&issuer.cnpj) {
        errors.push(ValidationError::with_rule(
            "issuer.cnpj",
            "invalid CNPJ (must be 14 digits with valid check digits)",
            "C02",
        ));
    }
    if issuer.corporate_name.trim().is_empty() {
        errors.push(ValidationError::with_rule(
            "issuer.corporate_name",
            "corporate name must not be empty",
            "C03",
        ));
    }
    if issuer.state_registration.trim().is_empty() {
        errors.push(ValidationError::with_rule(
            "issuer.state_registration",
            "state registration is required",
            "C17",
        ));
    }
    validate_address("issuer.address", &issuer.address, errors);
}

fn validate_recipient(recipient: &Recipient, errors: &mut Vec<ValidationError>) {
    match &recipient.id {
        PartyId::Cnpj(cnpj) if !is_valid_cnpj(cnpj) => {
            errors.push(ValidationError::with_rule(
                "recipient.id",
                "invalid recipient CNPJ",
                "E02",
            ));
        }
        PartyId::Cpf(cpf) if !is_valid_cpf(cpf) => {
            errors.push(ValidationError::with_rule(
                "recipient.id",
                "invalid recipient CPF",
                "E03",
            ));
        }
        PartyId::Foreign(id) if id.trim().is_empty() => {
            errors.push(ValidationError::with_rule(
                "recipient.id",
                "foreign identifier must not be empty",
                "E03a",
            ));
        }
        _ => {}
    }
    if recipient.name.trim().is_empty() {
        errors.push(ValidationError::with_rule(
            "recipient.name",
            "recipient name must not be empty",
            "E04",
        ));
    }
    // E16a/E17: taxpayers must carry a state registration
    if recipient.ie_indicator == IeIndicator::Taxpayer
        && recipient
            .state_registration
            .as_ref()
            .is_none_or(|ie| ie.trim().is_empty())
    {
        errors.push(ValidationError::with_rule(
            "recipient.state_registration",
            "ICMS taxpayer recipient requires a state registration",
            "E17",
        ));
    }
    validate_address("recipient.address", &recipient.address, errors);
}

fn validate_address(prefix: &str, address: &Address, errors: &mut Vec<ValidationError>) {
    if !is_digits(&address.municipality_code, 7) {
        errors.push(ValidationError::new(
            format!("{prefix}.municipality_code"),
            "municipality code must be 7 digits",
        ));
    }
    if address.city.trim().is_empty() {
        errors.push(ValidationError::new(
            format!("{prefix}.city"),
            "city must not be empty",
        ));
    }
    if let Some(cep) = &address.postal_code {
        if !is_digits(cep, 8) {
            errors.push(ValidationError::new(
                format!("{prefix}.postal_code"),
                "CEP must be 8 digits",
            ));
        }
    }
}

fn validate_item(item: &LineItem, idx: usize, goods: bool, errors: &mut Vec<ValidationError>) {
    let prefix = format!("items[{idx}]");
    if item.description.trim().is_empty() {
        errors.push(ValidationError::with_rule(
            format!("{prefix}.description"),
            "description must not be empty",
            "I04",
        ));
    }
    if item.quantity <= rust_decimal::Decimal::ZERO {
        errors.push(ValidationError::with_rule(
            format!("{prefix}.quantity"),
            "quantity must be positive",
            "I10",
        ));
    }
    if item.unit_price < rust_decimal::Decimal::ZERO {
        errors.push(ValidationError::with_rule(
            format!("{prefix}.unit_price"),
            "unit price must not be negative",
            "I10a",
        ));
    }
    if goods {
        if !is_digits(&item.classification_code, 8) {
            errors.push(ValidationError::with_rule(
                format!("{prefix}.classification_code"),
                "NCM must be 8 digits",
                "I05",
            ));
        }
        if item.cfop.as_ref().is_none_or(|c| !is_digits(c, 4)) {
            errors.push(ValidationError::with_rule(
                format!("{prefix}.cfop"),
                "CFOP must be 4 digits",
                "I08",
            ));
        }
    } else if item.classification_code.trim().is_empty() {
        errors.push(ValidationError::new(
            format!("{prefix}.classification_code"),
            "LC 116 service code is required",
        ));
    }
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_digit())
}

/// CNPJ check: 14 digits, not all equal, both mod-11 check digits valid.
pub fn is_valid_cnpj(cnpj: &str) -> bool {
    if !is_digits(cnpj, 14) {
        return false;
    }
    let digits: Vec<u32> = cnpj.bytes().map(|b| (b - b'0') as u32).collect();
    if digits.windows(2).all(|w| w[0] == w[1]) {
        return false;
    }
    let dv1 = cnpj_digit(&digits[..12], &[5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2]);
    let dv2 = cnpj_digit(&digits[..13], &[6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2]);
    digits[12] == dv1 && digits[13] == dv2
}

/// CPF check: 11 digits, not all equal, both mod-11 check digits valid.
pub fn is_valid_cpf(cpf: &str) -> bool {
    if !is_digits(cpf, 11) {
        return false;
    }
    let digits: Vec<u32> = cpf.bytes().map(|b| (b - b'0') as u32).collect();
    if digits.windows(2).all(|w| w[0] == w[1]) {
        return false;
    }
    let dv = |n: usize| {
        let sum: u32 = digits[..n]
            .iter()
            .enumerate()
            .map(|(i, d)| d * (n as u32 + 1 - i as u32))
            .sum();
        match (sum * 10) % 11 {
            10 => 0,
            d => d,
        }
    };
    digits[9] == dv(9) && digits[10] == dv(10)
}

fn cnpj_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    match sum % 11 {
        0 | 1 => 0,
        r => 11 - r,
    }
}
