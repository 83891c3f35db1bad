//! Transport, fallback, and full-pipeline tests against a local mock
//! authority.
//!
//! Run with: `cargo test --features transmissao --test transmissao_tests`

#![cfg(feature = "transmissao")]

use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeZone};
use httpmock::{Method::POST, MockServer};
use notafiscal::chave::FixedDigitSource;
use notafiscal::core::*;
use notafiscal::dsig::Certificado;
use notafiscal::transmissao::{
    EndpointOverrides, Retorno, TransmitOptions, transmitir, transmitir_with_source,
};
use rust_decimal_macros::dec;
use std::path::Path;

fn certificado() -> Certificado {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/certificado-teste.pfx");
    let der = std::fs::read(path).expect("read test certificate");
    Certificado::from_pkcs12(&der, "associacao").expect("load pfx")
}

fn issue() -> DateTime<FixedOffset> {
    FixedOffset::west_opt(3 * 3600)
        .unwrap()
        .with_ymd_and_hms(2026, 1, 15, 9, 30, 0)
        .unwrap()
}

fn invoice() -> Document {
    let nota = NfeBuilder::new(1, 1, issue())
        .environment(Environment::Homologacao)
        .issuer(
            IssuerBuilder::new(
                "12345678000195",
                "Acme Comercio Ltda",
                AddressBuilder::new("Sao Paulo", "3550308", Uf::Sp)
                    .street("Rua Um")
                    .build(),
            )
            .state_registration("123456789012")
            .build(),
        )
        .recipient(
            RecipientBuilder::new(
                PartyId::Cnpj("98765432000192".into()),
                "Cliente SA",
                AddressBuilder::new("Campinas", "3509502", Uf::Sp).build(),
            )
            .build(),
        )
        .add_item(
            LineItemBuilder::new("001", "Parafuso", dec!(10), "UN", dec!(2.50))
                .ncm("73181500")
                .cfop("5102")
                .build(),
        )
        .build()
        .unwrap();
    Document::Nfe(nota)
}

fn options_pointing_at(url: &str) -> TransmitOptions {
    TransmitOptions {
        timeout: Duration::from_secs(5),
        endpoints: EndpointOverrides {
            authorization: Some(url.to_string()),
            event: Some(url.to_string()),
            nfse: Some(url.to_string()),
        },
        #[cfg(feature = "schema")]
        schema_dir: None,
    }
}

const AUTHORIZED_REPLY: &str = "<soap:Envelope xmlns:soap=\"http://www.w3.org/2003/05/soap-envelope\">\
<soap:Body><nfeResultMsg><retEnviNFe versao=\"4.00\">\
<cStat>104</cStat><xMotivo>Lote processado</xMotivo>\
<protNFe versao=\"4.00\"><infProt>\
<chNFe>35260112345678000195550010000000011123456782</chNFe>\
<nProt>135260000000001</nProt><cStat>100</cStat>\
<xMotivo>Autorizado o uso da NF-e</xMotivo></infProt></protNFe>\
</retEnviNFe></nfeResultMsg></soap:Body></soap:Envelope>";

#[tokio::test]
async fn authorized_submission_end_to_end() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/ws");
            then.status(200)
                .header("content-type", "application/soap+xml")
                .body(AUTHORIZED_REPLY);
        })
        .await;

    let cert = certificado();
    let mut source = FixedDigitSource("1234567887654321".into());
    let retorno = transmitir_with_source(
        &invoice(),
        &cert,
        &options_pointing_at(&format!("{}/ws", server.base_url())),
        &mut source,
    )
    .await
    .unwrap();

    mock.assert_async().await;
    assert!(retorno.success);
    assert!(!retorno.simulated);
    assert_eq!(retorno.status_code.as_deref(), Some("100"));
    assert_eq!(retorno.protocol_number.as_deref(), Some("135260000000001"));
    // the sent payload is preserved for the caller
    let sent = retorno.sent_payload.unwrap();
    assert!(sent.contains("<idLote>1</idLote>"));
    assert!(sent.contains("<Signature "));
}

#[tokio::test]
async fn rejection_is_not_an_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200).body(
                "<retEnviNFe><cStat>225</cStat>\
<xMotivo>Rejeicao: Falha no Schema XML da NFe</xMotivo></retEnviNFe>",
            );
        })
        .await;

    let cert = certificado();
    let retorno = transmitir(
        &invoice(),
        &cert,
        &options_pointing_at(&server.base_url()),
    )
    .await
    .unwrap();

    assert!(!retorno.success);
    assert!(!retorno.processing);
    assert_eq!(retorno.status_code.as_deref(), Some("225"));
    assert_eq!(
        retorno.reason.as_deref(),
        Some("Rejeicao: Falha no Schema XML da NFe")
    );
}

#[tokio::test]
async fn timeout_is_a_transport_error_never_simulated() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200)
                .delay(Duration::from_secs(10))
                .body("late");
        })
        .await;

    let cert = certificado();
    let mut options = options_pointing_at(&server.base_url());
    options.timeout = Duration::from_millis(300);
    let err = transmitir(&invoice(), &cert, &options).await.unwrap_err();
    match err {
        NotaError::Transport(reason) => assert!(reason.contains("timeout"), "{reason}"),
        other => panic!("expected Transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn http_error_status_is_a_transport_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(500).body("soap fault");
        })
        .await;

    let cert = certificado();
    let err = transmitir(
        &invoice(),
        &cert,
        &options_pointing_at(&server.base_url()),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, NotaError::Transport(_)));
}

#[tokio::test]
async fn unresolvable_host_yields_simulated_success() {
    let cert = certificado();
    let mut source = FixedDigitSource("1234567887654321".into());
    let retorno = transmitir_with_source(
        &invoice(),
        &cert,
        &options_pointing_at("https://endpoint-nao-publicado.invalid/ws"),
        &mut source,
    )
    .await
    .unwrap();

    assert!(retorno.success);
    assert!(retorno.simulated);
    // verification code is fresh and non-empty
    assert_eq!(retorno.verification_code.as_deref(), Some("87654321"));
    // protocol derives from the request's own identification
    assert_eq!(retorno.protocol_number.as_deref(), Some("935000000000001"));
    let key = retorno.document_key.unwrap();
    assert_eq!(key.len(), 44);
    assert!(key.starts_with("3526"));
}

#[tokio::test]
async fn cancellation_event_pipeline() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200).body(
                "<retEvento versao=\"1.00\"><infEvento><cStat>135</cStat>\
<xMotivo>Evento registrado e vinculado a NF-e</xMotivo>\
<nProt>135260000000099</nProt></infEvento></retEvento>",
            );
        })
        .await;

    let event = Document::Cancelamento(CancelEvent {
        access_key: "35260112345678000195550010000000011123456782".into(),
        protocol_number: "135260000000001".into(),
        justification: "Cancelamento solicitado pelo destinatario".into(),
        sequence: 1,
        author_cnpj: "12345678000195".into(),
        issue_datetime: issue(),
        environment: Environment::Homologacao,
    });

    let cert = certificado();
    let retorno = transmitir(&event, &cert, &options_pointing_at(&server.base_url()))
        .await
        .unwrap();
    assert!(retorno.success);
    assert_eq!(retorno.protocol_number.as_deref(), Some("135260000000099"));
}

#[tokio::test]
async fn dps_pipeline_uses_rest_body() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).body_includes("<DPS");
            then.status(200).body(
                "<retDPS><cStat>100</cStat><xMotivo>Autorizado</xMotivo>\
<codigoVerificacao>11112222</codigoVerificacao></retDPS>",
            );
        })
        .await;

    let dps = DpsBuilder::new(1, 1, issue())
        .issuer(
            IssuerBuilder::new(
                "12345678000195",
                "Acme Servicos Ltda",
                AddressBuilder::new("Sao Paulo", "3550308", Uf::Sp).build(),
            )
            .state_registration("123456789012")
            .build(),
        )
        .recipient(
            RecipientBuilder::new(
                PartyId::Cnpj("98765432000192".into()),
                "Cliente SA",
                AddressBuilder::new("Campinas", "3509502", Uf::Sp).build(),
            )
            .build(),
        )
        .add_item(
            LineItemBuilder::new("001", "Consultoria", dec!(1), "UN", dec!(1000))
                .service_code("0107")
                .build(),
        )
        .build()
        .unwrap();

    let cert = certificado();
    let retorno = transmitir(
        &Document::Dps(dps),
        &cert,
        &options_pointing_at(&server.base_url()),
    )
    .await
    .unwrap();

    mock.assert_async().await;
    assert!(retorno.success);
    assert_eq!(retorno.verification_code.as_deref(), Some("11112222"));
    assert_eq!(
        retorno.document_key.as_deref(),
        Some("3550308212345678000195000010000000000000012")
    );
}

#[tokio::test]
async fn error_folds_into_uniform_result_shape() {
    let cert = certificado();
    let mut options = options_pointing_at("http://127.0.0.1:1/ws");
    options.timeout = Duration::from_secs(2);
    // port 1 refuses connections: a genuine transport failure
    let err = transmitir(&invoice(), &cert, &options).await.unwrap_err();
    let retorno = Retorno::from_error(&err, None);
    assert!(!retorno.success);
    assert!(retorno.structured_errors.contains_key("error"));
    assert!(retorno.message.contains("transport error"));
}
