//! IBGE state (UF) codes and the authorizer each state submits through.

use serde::{Deserialize, Serialize};

/// Brazilian federative unit, keyed by its 2-digit IBGE code (cUF).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Uf {
    Ro,
    Ac,
    Am,
    Rr,
    Pa,
    Ap,
    To,
    Ma,
    Pi,
    Ce,
    Rn,
    Pb,
    Pe,
    Al,
    Se,
    Ba,
    Mg,
    Es,
    Rj,
    Sp,
    Pr,
    Sc,
    Rs,
    Ms,
    Mt,
    Go,
    Df,
}

/// Which SEFAZ webservice authorizes documents for a given state.
///
/// Ten states run their own authorizer; Maranhão rides the SVAN shared
/// environment; the remainder use SVRS. SVRS is also the last-resort
/// contingency provider for every state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Authorizer {
    Am,
    Ba,
    Go,
    Mg,
    Ms,
    Mt,
    Pe,
    Pr,
    Rs,
    Sp,
    Svan,
    Svrs,
}

impl Uf {
    /// 2-digit IBGE numeric code.
    pub fn code(&self) -> u8 {
        match self {
            Self::Ro => 11,
            Self::Ac => 12,
            Self::Am => 13,
            Self::Rr => 14,
            Self::Pa => 15,
            Self::Ap => 16,
            Self::To => 17,
            Self::Ma => 21,
            Self::Pi => 22,
            Self::Ce => 23,
            Self::Rn => 24,
            Self::Pb => 25,
            Self::Pe => 26,
            Self::Al => 27,
            Self::Se => 28,
            Self::Ba => 29,
            Self::Mg => 31,
            Self::Es => 32,
            Self::Rj => 33,
            Self::Sp => 35,
            Self::Pr => 41,
            Self::Sc => 42,
            Self::Rs => 43,
            Self::Ms => 50,
            Self::Mt => 51,
            Self::Go => 52,
            Self::Df => 53,
        }
    }

    /// Two-letter state abbreviation.
    pub fn sigla(&self) -> &'static str {
        match self {
            Self::Ro => "RO",
            Self::Ac => "AC",
            Self::Am => "AM",
            Self::Rr => "RR",
            Self::Pa => "PA",
            Self::Ap => "AP",
            Self::To => "TO",
            Self::Ma => "MA",
            Self::Pi => "PI",
            Self::Ce => "CE",
            Self::Rn => "RN",
            Self::Pb => "PB",
            Self::Pe => "PE",
            Self::Al => "AL",
            Self::Se => "SE",
            Self::Ba => "BA",
            Self::Mg => "MG",
            Self::Es => "ES",
            Self::Rj => "RJ",
            Self::Sp => "SP",
            Self::Pr => "PR",
            Self::Sc => "SC",
            Self::Rs => "RS",
            Self::Ms => "MS",
            Self::Mt => "MT",
            Self::Go => "GO",
            Self::Df => "DF",
        }
    }

    /// Parse from the 2-digit IBGE code.
    pub fn from_code(code: u8) -> Option<Self> {
        [
            Self::Ro,
            Self::Ac,
            Self::Am,
            Self::Rr,
            Self::Pa,
            Self::Ap,
            Self::To,
            Self::Ma,
            Self::Pi,
            Self::Ce,
            Self::Rn,
            Self::Pb,
            Self::Pe,
            Self::Al,
            Self::Se,
            Self::Ba,
            Self::Mg,
            Self::Es,
            Self::Rj,
            Self::Sp,
            Self::Pr,
            Self::Sc,
            Self::Rs,
            Self::Ms,
            Self::Mt,
            Self::Go,
            Self::Df,
        ]
        .into_iter()
        .find(|uf| uf.code() == code)
    }

    /// Parse from the two-letter abbreviation (case-insensitive).
    pub fn from_sigla(sigla: &str) -> Option<Self> {
        let upper = sigla.to_ascii_uppercase();
        [
            Self::Ro,
            Self::Ac,
            Self::Am,
            Self::Rr,
            Self::Pa,
            Self::Ap,
            Self::To,
            Self::Ma,
            Self::Pi,
            Self::Ce,
            Self::Rn,
            Self::Pb,
            Self::Pe,
            Self::Al,
            Self::Se,
            Self::Ba,
            Self::Mg,
            Self::Es,
            Self::Rj,
            Self::Sp,
            Self::Pr,
            Self::Sc,
            Self::Rs,
            Self::Ms,
            Self::Mt,
            Self::Go,
            Self::Df,
        ]
        .into_iter()
        .find(|uf| uf.sigla() == upper)
    }

    /// The authorizer this state submits NF-e documents through.
    pub fn authorizer(&self) -> Authorizer {
        match self {
            Self::Am => Authorizer::Am,
            Self::Ba => Authorizer::Ba,
            Self::Go => Authorizer::Go,
            Self::Mg => Authorizer::Mg,
            Self::Ms => Authorizer::Ms,
            Self::Mt => Authorizer::Mt,
            Self::Pe => Authorizer::Pe,
            Self::Pr => Authorizer::Pr,
            Self::Rs => Authorizer::Rs,
            Self::Sp => Authorizer::Sp,
            Self::Ma => Authorizer::Svan,
            _ => Authorizer::Svrs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_round_trip() {
        for code in 11..=53 {
            if let Some(uf) = Uf::from_code(code) {
                assert_eq!(uf.code(), code);
                assert_eq!(Uf::from_sigla(uf.sigla()), Some(uf));
            }
        }
    }

    #[test]
    fn sp_is_35() {
        assert_eq!(Uf::Sp.code(), 35);
        assert_eq!(Uf::from_code(35), Some(Uf::Sp));
        assert_eq!(Uf::from_sigla("sp"), Some(Uf::Sp));
    }

    #[test]
    fn authorizer_mapping() {
        assert_eq!(Uf::Sp.authorizer(), Authorizer::Sp);
        assert_eq!(Uf::Ma.authorizer(), Authorizer::Svan);
        assert_eq!(Uf::Rj.authorizer(), Authorizer::Svrs);
        assert_eq!(Uf::Ac.authorizer(), Authorizer::Svrs);
    }

    #[test]
    fn unknown_code_rejected() {
        assert_eq!(Uf::from_code(0), None);
        assert_eq!(Uf::from_code(99), None);
        assert_eq!(Uf::from_sigla("XX"), None);
    }
}
