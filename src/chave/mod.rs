//! Access key assembly and the weighted modulo-11 check digit.
//!
//! The NF-e access key is 44 digits: eight fixed-width sub-fields plus a
//! trailing check digit. The DPS identifier follows the same check-digit
//! rule over its own sub-fields. Both are assembled here so the width
//! checks and the modulo-11 arithmetic live in exactly one place.

use chrono::Datelike;
use rand::Rng;

use crate::core::{Nfe, NotaError};

/// A validated 44-digit NF-e access key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccessKey(String);

impl AccessKey {
    /// Wrap an externally supplied key, re-checking every invariant:
    /// 44 ASCII digits, and the final digit must equal the modulo-11
    /// check digit recomputed over the first 43.
    pub fn parse(value: &str) -> Result<Self, NotaError> {
        if value.len() != 44 || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(NotaError::KeyAssembly {
                field: "access_key",
                expected: 44,
                actual: value.len(),
            });
        }
        let expected = check_digit(&value[..43]);
        let actual = value.as_bytes()[43] - b'0';
        if expected != actual {
            return Err(NotaError::Validation(format!(
                "access key check digit is {actual}, expected {expected}"
            )));
        }
        Ok(Self(value.to_string()))
    }

    /// The full 44-digit string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The random cNF component (digits 36..=43).
    pub fn nonce(&self) -> &str {
        &self.0[35..43]
    }

    /// The trailing check digit.
    pub fn verifier(&self) -> u8 {
        self.0.as_bytes()[43] - b'0'
    }
}

impl std::fmt::Display for AccessKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of random digit strings, injectable so tests can pin the cNF
/// nonce and verification codes to literals.
pub trait DigitSource {
    /// Produce exactly `len` ASCII digits.
    fn digits(&mut self, len: usize) -> String;
}

/// Process-entropy digit source used in production.
#[derive(Debug, Default)]
pub struct OsDigitSource;

impl DigitSource for OsDigitSource {
    fn digits(&mut self, len: usize) -> String {
        let mut rng = rand::thread_rng();
        (0..len).map(|_| char::from(b'0' + rng.gen_range(0..10))).collect()
    }
}

/// Fixed digit source for tests. Draws consume from the front, so one
/// source can script several independent draws (nonce, then
/// verification code).
#[derive(Debug, Clone)]
pub struct FixedDigitSource(pub String);

impl DigitSource for FixedDigitSource {
    fn digits(&mut self, len: usize) -> String {
        assert!(self.0.len() >= len, "fixed digit source exhausted");
        let drawn = self.0[..len].to_string();
        self.0 = self.0[len..].to_string();
        drawn
    }
}

/// Weighted modulo-11 check digit over a digit string.
///
/// Weights cycle 2..=9 starting from the rightmost digit; a remainder of
/// 0 or 1 maps to check digit 0, otherwise `11 - remainder`. This exact
/// mapping is shared by the access key, the DPS identifier, and the
/// recipient tax-ID algorithms, and must not drift.
pub fn check_digit(digits: &str) -> u8 {
    let mut weight = 2u32;
    let mut sum = 0u32;
    for b in digits.bytes().rev() {
        sum += u32::from(b - b'0') * weight;
        weight = if weight == 9 { 2 } else { weight + 1 };
    }
    match sum % 11 {
        0 | 1 => 0,
        r => (11 - r) as u8,
    }
}

/// Assembles access keys and DPS identifiers from fixed-width sub-fields.
pub struct AccessKeyGenerator;

/// Sub-fields of an NF-e access key, pre-padding.
#[derive(Debug, Clone)]
pub struct KeyParts {
    /// cUF: 2-digit IBGE state code.
    pub uf_code: u8,
    /// AAMM of emission.
    pub year_month: String,
    /// Issuer CNPJ, 14 digits.
    pub cnpj: String,
    /// mod: document model code ("55" for NF-e).
    pub model: String,
    /// serie, 0..=999.
    pub series: u16,
    /// nNF, 1..=999 999 999.
    pub number: u64,
    /// tpEmis single digit.
    pub emission_mode: u8,
    /// cNF: 8 random digits.
    pub nonce: String,
}

impl AccessKeyGenerator {
    /// Assemble and check the 44-digit key from explicit parts.
    ///
    /// # Errors
    /// [`NotaError::KeyAssembly`] naming the first sub-field whose width
    /// is wrong, or the assembled prefix when it is not 43 digits.
    pub fn assemble(parts: &KeyParts) -> Result<AccessKey, NotaError> {
        let uf = format!("{:02}", parts.uf_code);
        require_width("cUF", &uf, 2)?;
        require_width("AAMM", &parts.year_month, 4)?;
        require_width("CNPJ", &parts.cnpj, 14)?;
        require_width("mod", &parts.model, 2)?;
        let series = format!("{:03}", parts.series);
        require_width("serie", &series, 3)?;
        let number = format!("{:09}", parts.number);
        require_width("nNF", &number, 9)?;
        let emission = format!("{}", parts.emission_mode);
        require_width("tpEmis", &emission, 1)?;
        require_width("cNF", &parts.nonce, 8)?;

        let prefix = format!(
            "{uf}{}{}{}{series}{number}{emission}{}",
            parts.year_month, parts.cnpj, parts.model, parts.nonce
        );
        if prefix.len() != 43 {
            return Err(NotaError::KeyAssembly {
                field: "access_key_prefix",
                expected: 43,
                actual: prefix.len(),
            });
        }
        let dv = check_digit(&prefix);
        Ok(AccessKey(format!("{prefix}{dv}")))
    }

    /// Generate the access key for an NF-e model, drawing the cNF nonce
    /// from `source`.
    pub fn for_nfe(nfe: &Nfe, source: &mut dyn DigitSource) -> Result<AccessKey, NotaError> {
        let issue = &nfe.identification.issue_datetime;
        let parts = KeyParts {
            uf_code: nfe.identification.uf.code(),
            year_month: format!("{:02}{:02}", issue.year() % 100, issue.month()),
            cnpj: nfe.issuer.cnpj.clone(),
            model: "55".into(),
            series: nfe.identification.series,
            number: nfe.identification.number,
            emission_mode: nfe.identification.emission_mode.code(),
            nonce: source.digits(8),
        };
        Self::assemble(&parts)
    }

    /// Generate the DPS identifier digits: cMun(7) + inscription type(1) +
    /// CNPJ(14) + serie(5) + nDPS(15) + check digit.
    pub fn for_dps(
        municipality_code: &str,
        cnpj: &str,
        series: u16,
        number: u64,
    ) -> Result<String, NotaError> {
        require_width("cMun", municipality_code, 7)?;
        require_width("CNPJ", cnpj, 14)?;
        let series = format!("{series:05}");
        require_width("serie", &series, 5)?;
        let number = format!("{number:015}");
        require_width("nDPS", &number, 15)?;

        // tpInsc 2 = CNPJ; CPF providers are out of the supported set.
        let prefix = format!("{municipality_code}2{cnpj}{series}{number}");
        let dv = check_digit(&prefix);
        Ok(format!("{prefix}{dv}"))
    }

    /// 8-digit verification code for service invoices. Drawn independently
    /// of the identifier and never part of its check-digit input.
    pub fn verification_code(source: &mut dyn DigitSource) -> String {
        source.digits(8)
    }
}

fn require_width(field: &'static str, value: &str, width: usize) -> Result<(), NotaError> {
    if value.len() != width || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NotaError::KeyAssembly {
            field,
            expected: width,
            actual: value.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts() -> KeyParts {
        KeyParts {
            uf_code: 35,
            year_month: "2601".into(),
            cnpj: "12345678000195".into(),
            model: "55".into(),
            series: 1,
            number: 1,
            emission_mode: 1,
            nonce: "12345678".into(),
        }
    }

    #[test]
    fn known_key_literal() {
        // Fixed nonce makes the whole key reproducible.
        let key = AccessKeyGenerator::assemble(&parts()).unwrap();
        assert_eq!(key.as_str(), "35260112345678000195550010000000011123456782");
        assert_eq!(key.verifier(), 2);
        assert_eq!(key.nonce(), "12345678");
    }

    #[test]
    fn check_digit_remainder_zero_and_one_map_to_zero() {
        // sum % 11 == 0 -> 0
        assert_eq!(check_digit("0"), 0);
        // "1" -> 1*2 = 2, rem 2 -> 9
        assert_eq!(check_digit("1"), 9);
        // weights cycle back to 2 after 9
        let all_ones = "1".repeat(16);
        // weights 2..9,2..9 sum = 2*(2+..+9) = 88, rem 0 -> 0
        assert_eq!(check_digit(&all_ones), 0);
    }

    #[test]
    fn parse_round_trips_generated_keys() {
        let key = AccessKeyGenerator::assemble(&parts()).unwrap();
        let reparsed = AccessKey::parse(key.as_str()).unwrap();
        assert_eq!(reparsed, key);
    }

    #[test]
    fn parse_rejects_wrong_check_digit() {
        let mut s = AccessKeyGenerator::assemble(&parts()).unwrap().0;
        let last = s.pop().unwrap();
        let wrong = if last == '0' { '1' } else { '0' };
        s.push(wrong);
        assert!(AccessKey::parse(&s).is_err());
    }

    #[test]
    fn width_mismatch_names_the_field() {
        let mut bad = parts();
        bad.cnpj = "123".into();
        match AccessKeyGenerator::assemble(&bad) {
            Err(NotaError::KeyAssembly {
                field, expected, actual,
            }) => {
                assert_eq!(field, "CNPJ");
                assert_eq!(expected, 14);
                assert_eq!(actual, 3);
            }
            other => panic!("expected KeyAssembly error, got {other:?}"),
        }
    }

    #[test]
    fn nonce_width_enforced() {
        let mut bad = parts();
        bad.nonce = "1234".into();
        assert!(matches!(
            AccessKeyGenerator::assemble(&bad),
            Err(NotaError::KeyAssembly { field: "cNF", .. })
        ));
    }

    #[test]
    fn os_source_emits_digits() {
        let mut source = OsDigitSource;
        let digits = source.digits(8);
        assert_eq!(digits.len(), 8);
        assert!(digits.bytes().all(|b| b.is_ascii_digit()));
    }

    #[test]
    fn dps_identifier_literal() {
        let id = AccessKeyGenerator::for_dps("3550308", "12345678000195", 1, 1).unwrap();
        assert_eq!(id, "3550308212345678000195000010000000000000012");
        assert_eq!(id.len(), 43);
        let (prefix, dv) = id.split_at(42);
        assert_eq!(check_digit(prefix), dv.parse::<u8>().unwrap());
    }

    #[test]
    fn fixed_source_pins_verification_code() {
        let mut source = FixedDigitSource("87654321".into());
        assert_eq!(AccessKeyGenerator::verification_code(&mut source), "87654321");
    }
}
