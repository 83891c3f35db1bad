//! End-to-end signing over generated documents.
//!
//! Run with: `cargo test --features dsig --test dsig_tests`

#![cfg(feature = "dsig")]

use chrono::{FixedOffset, TimeZone};
use notafiscal::chave::{AccessKeyGenerator, FixedDigitSource};
use notafiscal::core::*;
use notafiscal::dsig::{Certificado, SignaturePolicy, Signer};
use notafiscal::nfe;
use rust_decimal_macros::dec;
use std::path::Path;

fn certificado() -> Certificado {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/certificado-teste.pfx");
    let der = std::fs::read(path).expect("read test certificate");
    Certificado::from_pkcs12(&der, "associacao").expect("load pfx")
}

fn unsigned_invoice_xml() -> String {
    let brt = FixedOffset::west_opt(3 * 3600).unwrap();
    let nota = NfeBuilder::new(7, 1, brt.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).unwrap())
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
    let mut source = FixedDigitSource("12345678".into());
    let chave = AccessKeyGenerator::for_nfe(&nota, &mut source).unwrap();
    nfe::to_xml(&nota, &chave).unwrap()
}

#[test]
fn signs_generated_invoice() {
    let cert = certificado();
    let signer = Signer::new(&cert, SignaturePolicy::for_layout(nfe::LAYOUT_VERSION)).unwrap();
    let unsigned = unsigned_invoice_xml();
    let signed = signer.sign(&unsigned).unwrap();

    assert!(signed.contains("<Signature xmlns=\"http://www.w3.org/2000/09/xmldsig#\">"));
    assert!(signed.contains("http://www.w3.org/2000/09/xmldsig#enveloped-signature"));
    assert!(signed.contains("http://www.w3.org/2001/10/xml-exc-c14n#"));
    // layout 4.00 pins RSA-SHA1
    assert!(signed.contains("http://www.w3.org/2000/09/xmldsig#rsa-sha1"));
    // the reference targets the infNFe Id
    let id_start = signed.find("Id=\"").unwrap() + 4;
    let id_end = signed[id_start..].find('"').unwrap();
    let id = &signed[id_start..id_start + id_end];
    assert!(signed.contains(&format!("URI=\"#{id}\"")));
}

#[test]
fn signed_document_keeps_business_content() {
    let cert = certificado();
    let signer = Signer::new(&cert, SignaturePolicy::Sha1Rsa).unwrap();
    let unsigned = unsigned_invoice_xml();
    let signed = signer.sign(&unsigned).unwrap();
    for fragment in ["<ide>", "<emit>", "<dest>", "<total>", "<vNF>25.00</vNF>"] {
        assert!(signed.contains(fragment), "lost {fragment}");
    }
}

#[test]
fn digests_are_stable_across_runs() {
    let cert = certificado();
    let signer = Signer::new(&cert, SignaturePolicy::Sha1Rsa).unwrap();
    let unsigned = unsigned_invoice_xml();
    let a = signer.sign(&unsigned).unwrap();
    let b = signer.sign(&unsigned).unwrap();

    let digest = |xml: &str| {
        let start = xml.find("<DigestValue>").unwrap() + "<DigestValue>".len();
        let end = xml[start..].find("</DigestValue>").unwrap();
        xml[start..start + end].to_string()
    };
    assert_eq!(digest(&a), digest(&b));
    // PKCS#1 v1.5 is deterministic, so the whole signature matches too
    let sig = |xml: &str| {
        let start = xml.find("<SignatureValue>").unwrap() + "<SignatureValue>".len();
        let end = xml[start..].find("</SignatureValue>").unwrap();
        xml[start..start + end].to_string()
    };
    assert_eq!(sig(&a), sig(&b));
}

#[test]
fn certificate_error_precedes_signing() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/certificado-teste.pfx");
    let der = std::fs::read(path).unwrap();
    let err = Certificado::from_pkcs12(&der, "senha-errada").unwrap_err();
    assert!(matches!(
        err,
        NotaError::Certificate(CertificateErrorKind::BadPassphrase)
    ));
}
