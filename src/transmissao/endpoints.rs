//! Webservice endpoint resolution per authorizer and environment.
//!
//! Ten states run dedicated SEFAZ webservices; everyone else rides the
//! shared SVAN/SVRS environments. SVRS is also the last-resort fallback
//! when an authorizer has no dedicated endpoint configured here. The
//! national NFS-e gateway is a single pair of REST hosts.

use crate::core::uf::{Authorizer, Uf};
use crate::core::Environment;

const SVRS_AUTH_P: &str = "https://nfe.svrs.rs.gov.br/ws/NfeAutorizacao/NFeAutorizacao4.asmx";
const SVRS_AUTH_H: &str =
    "https://nfe-homologacao.svrs.rs.gov.br/ws/NfeAutorizacao/NFeAutorizacao4.asmx";
const SVRS_EVENT_P: &str =
    "https://nfe.svrs.rs.gov.br/ws/recepcaoevento/recepcaoevento4.asmx";
const SVRS_EVENT_H: &str =
    "https://nfe-homologacao.svrs.rs.gov.br/ws/recepcaoevento/recepcaoevento4.asmx";

/// NF-e authorization endpoint for a state and environment.
///
/// States without a dedicated entry fall through to the shared SVRS
/// provider.
pub fn authorization_url(uf: Uf, env: Environment) -> &'static str {
    use Authorizer::*;
    use Environment::*;
    match (uf.authorizer(), env) {
        (Sp, Producao) => "https://nfe.fazenda.sp.gov.br/ws/nfeautorizacao4.asmx",
        (Sp, Homologacao) => "https://homologacao.nfe.fazenda.sp.gov.br/ws/nfeautorizacao4.asmx",
        (Mg, Producao) => "https://nfe.fazenda.mg.gov.br/nfe2/services/NFeAutorizacao4",
        (Mg, Homologacao) => "https://hnfe.fazenda.mg.gov.br/nfe2/services/NFeAutorizacao4",
        (Pr, Producao) => "https://nfe.sefa.pr.gov.br/nfe/NFeAutorizacao4",
        (Pr, Homologacao) => "https://homologacao.nfe.sefa.pr.gov.br/nfe/NFeAutorizacao4",
        (Rs, Producao) => "https://nfe.sefazrs.rs.gov.br/ws/NfeAutorizacao/NFeAutorizacao4.asmx",
        (Rs, Homologacao) => {
            "https://nfe-homologacao.sefazrs.rs.gov.br/ws/NfeAutorizacao/NFeAutorizacao4.asmx"
        }
        (Ba, Producao) => "https://nfe.sefaz.ba.gov.br/webservices/NFeAutorizacao4/NFeAutorizacao4.asmx",
        (Ba, Homologacao) => {
            "https://hnfe.sefaz.ba.gov.br/webservices/NFeAutorizacao4/NFeAutorizacao4.asmx"
        }
        (Go, Producao) => "https://nfe.sefaz.go.gov.br/nfe/services/NFeAutorizacao4",
        (Go, Homologacao) => "https://homolog.sefaz.go.gov.br/nfe/services/NFeAutorizacao4",
        (Am, Producao) => "https://nfe.sefaz.am.gov.br/services2/services/NfeAutorizacao4",
        (Am, Homologacao) => "https://homnfe.sefaz.am.gov.br/services2/services/NfeAutorizacao4",
        (Mt, Producao) => "https://nfe.sefaz.mt.gov.br/nfews/v2/services/NfeAutorizacao4",
        (Mt, Homologacao) => "https://homologacao.sefaz.mt.gov.br/nfews/v2/services/NfeAutorizacao4",
        (Ms, Producao) => "https://nfe.sefaz.ms.gov.br/ws/NFeAutorizacao4",
        (Ms, Homologacao) => "https://hom.nfe.sefaz.ms.gov.br/ws/NFeAutorizacao4",
        (Pe, Producao) => "https://nfe.sefaz.pe.gov.br/nfe-service/services/NFeAutorizacao4",
        (Pe, Homologacao) => "https://nfehomolog.sefaz.pe.gov.br/nfe-service/services/NFeAutorizacao4",
        // SVAN and SVRS states share the contingency provider
        (Svan | Svrs, Producao) => SVRS_AUTH_P,
        (Svan | Svrs, Homologacao) => SVRS_AUTH_H,
    }
}

/// Event reception endpoint (cancellation and other post-issuance
/// events) for a state and environment.
pub fn event_url(uf: Uf, env: Environment) -> &'static str {
    use Authorizer::*;
    use Environment::*;
    match (uf.authorizer(), env) {
        (Sp, Producao) => "https://nfe.fazenda.sp.gov.br/ws/nferecepcaoevento4.asmx",
        (Sp, Homologacao) => {
            "https://homologacao.nfe.fazenda.sp.gov.br/ws/nferecepcaoevento4.asmx"
        }
        (Mg, Producao) => "https://nfe.fazenda.mg.gov.br/nfe2/services/NFeRecepcaoEvento4",
        (Mg, Homologacao) => "https://hnfe.fazenda.mg.gov.br/nfe2/services/NFeRecepcaoEvento4",
        (Pr, Producao) => "https://nfe.sefa.pr.gov.br/nfe/NFeRecepcaoEvento4",
        (Pr, Homologacao) => "https://homologacao.nfe.sefa.pr.gov.br/nfe/NFeRecepcaoEvento4",
        // remaining authorizers accept events through SVRS
        (_, Producao) => SVRS_EVENT_P,
        (_, Homologacao) => SVRS_EVENT_H,
    }
}

/// National NFS-e reception endpoint for an environment.
pub fn nfse_url(env: Environment) -> &'static str {
    match env {
        Environment::Producao => "https://sefin.nfse.gov.br/sefinnacional/nfse",
        Environment::Homologacao => {
            "https://sefin.producaorestrita.nfse.gov.br/sefinnacional/nfse"
        }
    }
}

/// Per-call endpoint overrides, for configuration tables and tests.
#[derive(Debug, Clone, Default)]
pub struct EndpointOverrides {
    /// Replaces [`authorization_url`] when set.
    pub authorization: Option<String>,
    /// Replaces [`event_url`] when set.
    pub event: Option<String>,
    /// Replaces [`nfse_url`] when set.
    pub nfse: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedicated_states_have_own_hosts() {
        let sp = authorization_url(Uf::Sp, Environment::Producao);
        assert!(sp.contains("fazenda.sp.gov.br"));
        let mg = authorization_url(Uf::Mg, Environment::Homologacao);
        assert!(mg.contains("fazenda.mg.gov.br"));
    }

    #[test]
    fn undedicated_states_fall_back_to_svrs() {
        for uf in [Uf::Ac, Uf::Rj, Uf::Ma, Uf::Df] {
            let url = authorization_url(uf, Environment::Producao);
            assert!(url.contains("svrs.rs.gov.br"), "{uf:?} -> {url}");
        }
    }

    #[test]
    fn homologation_and_production_differ() {
        for uf in [Uf::Sp, Uf::Ba, Uf::Rj] {
            assert_ne!(
                authorization_url(uf, Environment::Producao),
                authorization_url(uf, Environment::Homologacao)
            );
        }
        assert_ne!(
            nfse_url(Environment::Producao),
            nfse_url(Environment::Homologacao)
        );
    }

    #[test]
    fn all_endpoints_are_https() {
        for uf in [Uf::Sp, Uf::Am, Uf::Pe, Uf::To] {
            for env in [Environment::Producao, Environment::Homologacao] {
                assert!(authorization_url(uf, env).starts_with("https://"));
                assert!(event_url(uf, env).starts_with("https://"));
            }
        }
    }
}
