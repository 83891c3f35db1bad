use base64ct::{Base64, Encoding};
use libxml::parser::Parser;
use libxml::tree::{Document, Node, c14n};
use libxml::xpath;
use rsa::Pkcs1v15Sign;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use super::certificado::Certificado;
use super::{DS_NS, ENVELOPED, EXC_C14N};
use crate::core::{NotaError, normalize_text};
use crate::xml_utils::XmlWriter;

/// Digest/signature algorithm pair, selected by the document layout
/// version in force at generation time. A construction-time decision,
/// never negotiated at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignaturePolicy {
    /// RSA-SHA1, the pair mandated by NF-e layout 4.00 and DPS 1.00.
    Sha1Rsa,
    /// RSA-SHA256, for layouts published after the SHA-1 sunset.
    Sha256Rsa,
}

impl SignaturePolicy {
    /// The policy for a document layout version.
    pub fn for_layout(version: &str) -> Self {
        match version {
            "4.00" | "1.00" => Self::Sha1Rsa,
            _ => Self::Sha256Rsa,
        }
    }

    fn digest_uri(&self) -> &'static str {
        match self {
            Self::Sha1Rsa => "http://www.w3.org/2000/09/xmldsig#sha1",
            Self::Sha256Rsa => "http://www.w3.org/2001/04/xmlenc#sha256",
        }
    }

    fn signature_uri(&self) -> &'static str {
        match self {
            Self::Sha1Rsa => "http://www.w3.org/2000/09/xmldsig#rsa-sha1",
            Self::Sha256Rsa => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
        }
    }

    fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1Rsa => Sha1::digest(data).to_vec(),
            Self::Sha256Rsa => Sha256::digest(data).to_vec(),
        }
    }

    fn padding(&self) -> Pkcs1v15Sign {
        match self {
            Self::Sha1Rsa => Pkcs1v15Sign::new::<Sha1>(),
            Self::Sha256Rsa => Pkcs1v15Sign::new::<Sha256>(),
        }
    }
}

/// Signs fiscal documents in place with an enveloped XML-DSig signature.
pub struct Signer<'a> {
    certificate: &'a Certificado,
    policy: SignaturePolicy,
}

impl<'a> Signer<'a> {
    /// Create a signer, checking certificate preconditions up front.
    ///
    /// # Errors
    /// [`NotaError::Certificate`] when the certificate is outside its
    /// validity window — before any cryptographic work.
    pub fn new(certificate: &'a Certificado, policy: SignaturePolicy) -> Result<Self, NotaError> {
        certificate.check_validity()?;
        Ok(Self {
            certificate,
            policy,
        })
    }

    /// Sign the document: locate the `Id`-bearing element, normalize leaf
    /// text, canonicalize the referenced subtree (exclusive C14N, no
    /// comments), digest, sign the SignedInfo, and embed the `Signature`
    /// element as the last child of the document root.
    pub fn sign(&self, unsigned_xml: &str) -> Result<String, NotaError> {
        let fail = |reason: String| NotaError::Signature {
            reason,
            unsigned_xml: Some(unsigned_xml.to_string()),
        };

        let mut doc = Parser::default()
            .parse_string(unsigned_xml)
            .map_err(|e| fail(format!("XML parse error: {e:?}")))?;
        let mut root = doc
            .get_root_element()
            .ok_or_else(|| fail("document has no root element".into()))?;

        normalize_leaf_text(&root);

        let reference = find_id_element(&doc)
            .map_err(|e| fail(e))?
            .ok_or_else(|| fail("reference not found: no element carries an Id attribute".into()))?;
        let reference_id = reference
            .get_attribute("Id")
            .ok_or_else(|| fail("reference element lost its Id attribute".into()))?;

        let canonical = canonicalize_node(&doc, &reference).map_err(|e| fail(e))?;
        let digest_b64 = Base64::encode_string(&self.policy.digest(canonical.as_bytes()));

        let signed_info = self
            .signed_info_xml(&reference_id, &digest_b64)
            .map_err(|e| fail(format!("SignedInfo assembly error: {e}")))?;
        let signed_info_canonical = canonicalize_fragment(&signed_info).map_err(|e| fail(e))?;

        let signed_info_digest = self.policy.digest(signed_info_canonical.as_bytes());
        let signature_bytes = self
            .certificate
            .private_key()
            .sign(self.policy.padding(), &signed_info_digest)
            .map_err(|e| fail(format!("RSA signing error: {e}")))?;
        let signature_b64 = Base64::encode_string(&signature_bytes);

        let signature_xml = self
            .signature_element_xml(&signed_info, &signature_b64)
            .map_err(|e| fail(format!("Signature assembly error: {e}")))?;

        embed_signature(&mut doc, &mut root, &signature_xml).map_err(|e| fail(e))?;
        Ok(doc.to_string())
    }

    /// SignedInfo subtree, generated directly in canonical shape (sorted
    /// attributes, explicit end tags, namespace on the subtree root).
    fn signed_info_xml(&self, reference_id: &str, digest_b64: &str) -> Result<String, NotaError> {
        let mut w = XmlWriter::fragment();
        w.start_element_with_attrs("SignedInfo", &[("xmlns", DS_NS)])?;
        w.start_element_with_attrs("CanonicalizationMethod", &[("Algorithm", EXC_C14N)])?;
        w.end_element("CanonicalizationMethod")?;
        w.start_element_with_attrs("SignatureMethod", &[("Algorithm", self.policy.signature_uri())])?;
        w.end_element("SignatureMethod")?;
        w.start_element_with_attrs("Reference", &[("URI", &format!("#{reference_id}"))])?;
        w.start_element("Transforms")?;
        w.start_element_with_attrs("Transform", &[("Algorithm", ENVELOPED)])?;
        w.end_element("Transform")?;
        w.start_element_with_attrs("Transform", &[("Algorithm", EXC_C14N)])?;
        w.end_element("Transform")?;
        w.end_element("Transforms")?;
        w.start_element_with_attrs("DigestMethod", &[("Algorithm", self.policy.digest_uri())])?;
        w.end_element("DigestMethod")?;
        w.text_element("DigestValue", digest_b64)?;
        w.end_element("Reference")?;
        w.end_element("SignedInfo")?;
        w.into_string()
    }

    fn signature_element_xml(
        &self,
        signed_info: &str,
        signature_b64: &str,
    ) -> Result<String, NotaError> {
        // SignedInfo already declares the ds namespace; strip the duplicate
        // declaration since Signature re-declares it on the outer element.
        let inner = signed_info.replacen(&format!(" xmlns=\"{DS_NS}\""), "", 1);
        let mut w = XmlWriter::fragment();
        w.start_element_with_attrs("Signature", &[("xmlns", DS_NS)])?;
        w.raw(&inner)?;
        w.text_element("SignatureValue", signature_b64)?;
        w.start_element("KeyInfo")?;
        w.start_element("X509Data")?;
        w.text_element("X509Certificate", &self.certificate.cert_base64())?;
        w.end_element("X509Data")?;
        w.end_element("KeyInfo")?;
        w.end_element("Signature")?;
        w.into_string()
    }
}

/// First element bearing an `Id` attribute, in document order.
fn find_id_element(doc: &Document) -> Result<Option<Node>, String> {
    let ctx = xpath::Context::new(doc).map_err(|e| format!("XPath context error: {e:?}"))?;
    let nodes = ctx
        .evaluate("//*[@Id]")
        .map_err(|e| format!("XPath error: {e:?}"))?
        .get_nodes_as_vec();
    Ok(nodes.into_iter().next())
}

/// Trim/collapse whitespace and substitute typographic characters in
/// every leaf text node. Runs before canonicalization; the authority's
/// canonicalizer is sensitive to this variation.
fn normalize_leaf_text(node: &Node) {
    let mut child = node.get_first_child();
    while let Some(mut current) = child {
        child = current.get_next_sibling();
        if current.is_text_node() {
            let content = current.get_content();
            let normalized = normalize_text(&content);
            if normalized != content {
                let _ = current.set_content(&normalized);
            }
        } else if current.is_element_node() {
            normalize_leaf_text(&current);
        }
    }
}

/// Exclusive C14N (no comments) of one element subtree, starting at the
/// referenced node so namespace declarations visible at the subtree root
/// are rendered the way the receiving authority computes them.
fn canonicalize_node(doc: &Document, node: &Node) -> Result<String, String> {
    doc.canonicalize(c14n_options(), Some(node.clone()))
        .map_err(|e| format!("canonicalization error: {e:?}"))
}

fn canonicalize_fragment(xml: &str) -> Result<String, String> {
    let fragment = Parser::default()
        .parse_string(xml)
        .map_err(|e| format!("canonicalization parse error: {e:?}"))?;
    fragment
        .canonicalize(c14n_options(), None)
        .map_err(|e| format!("canonicalization error: {e:?}"))
}

fn c14n_options() -> c14n::CanonicalizationOptions {
    c14n::CanonicalizationOptions {
        mode: c14n::CanonicalizationMode::ExclusiveCanonical1_0,
        inclusive_ns_prefixes: vec![],
        with_comments: false,
    }
}

/// Parse the Signature fragment and attach it as the last child of the
/// document root, after all schema-defined content.
fn embed_signature(doc: &mut Document, root: &mut Node, signature_xml: &str) -> Result<(), String> {
    let fragment = Parser::default()
        .parse_string(signature_xml)
        .map_err(|e| format!("signature fragment parse error: {e:?}"))?;
    let mut node = fragment
        .get_root_element()
        .ok_or_else(|| "signature fragment has no root".to_string())?;
    node.unlink();
    let mut imported = doc
        .import_node(&mut node)
        .map_err(|_| "failed to import signature node".to_string())?;
    root.add_child(&mut imported).map_err(|e| e.to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn certificado() -> Certificado {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures/certificado-teste.pfx");
        let der = std::fs::read(path).expect("read test certificate");
        Certificado::from_pkcs12(&der, "associacao").expect("load pfx")
    }

    const SAMPLE: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
<NFe xmlns=\"http://www.portalfiscal.inf.br/nfe\">\
<infNFe Id=\"NFe35260112345678000195550010000000011123456782\" versao=\"4.00\">\
<ide><cUF>35</cUF></ide></infNFe></NFe>";

    #[test]
    fn reference_uri_matches_id() {
        let cert = certificado();
        let signer = Signer::new(&cert, SignaturePolicy::Sha1Rsa).unwrap();
        let signed = signer.sign(SAMPLE).unwrap();
        assert!(signed.contains(
            "URI=\"#NFe35260112345678000195550010000000011123456782\""
        ));
        assert!(signed.contains("<SignatureValue>"));
        assert!(signed.contains("<X509Certificate>"));
    }

    #[test]
    fn signature_is_last_child_of_root() {
        let cert = certificado();
        let signer = Signer::new(&cert, SignaturePolicy::Sha1Rsa).unwrap();
        let signed = signer.sign(SAMPLE).unwrap();
        let sig_pos = signed.find("<Signature ").unwrap();
        let inf_end = signed.find("</infNFe>").unwrap();
        assert!(sig_pos > inf_end, "Signature must follow infNFe");
        assert!(signed.trim_end().ends_with("</NFe>"));
    }

    #[test]
    fn signing_is_idempotent_in_content() {
        let cert = certificado();
        let signer = Signer::new(&cert, SignaturePolicy::Sha1Rsa).unwrap();
        let first = signer.sign(SAMPLE).unwrap();
        let second = signer.sign(SAMPLE).unwrap();
        assert_eq!(
            digest_value(&first),
            digest_value(&second),
            "same input must produce the same reference digest"
        );
    }

    #[test]
    fn policy_changes_algorithms() {
        let cert = certificado();
        let signer = Signer::new(&cert, SignaturePolicy::Sha256Rsa).unwrap();
        let signed = signer.sign(SAMPLE).unwrap();
        assert!(signed.contains("rsa-sha256"));
        assert!(signed.contains("xmlenc#sha256"));
    }

    #[test]
    fn missing_id_is_reference_not_found() {
        let cert = certificado();
        let signer = Signer::new(&cert, SignaturePolicy::Sha1Rsa).unwrap();
        let xml = "<?xml version=\"1.0\" encoding=\"UTF-8\"?><NFe><infNFe/></NFe>";
        match signer.sign(xml) {
            Err(NotaError::Signature { reason, unsigned_xml }) => {
                assert!(reason.contains("reference not found"));
                assert_eq!(unsigned_xml.as_deref(), Some(xml));
            }
            other => panic!("expected Signature error, got {other:?}"),
        }
    }

    #[test]
    fn layout_selects_policy() {
        assert_eq!(SignaturePolicy::for_layout("4.00"), SignaturePolicy::Sha1Rsa);
        assert_eq!(SignaturePolicy::for_layout("1.00"), SignaturePolicy::Sha1Rsa);
        assert_eq!(SignaturePolicy::for_layout("5.00"), SignaturePolicy::Sha256Rsa);
    }

    fn digest_value(signed: &str) -> &str {
        let start = signed.find("<DigestValue>").unwrap() + "<DigestValue>".len();
        let end = signed[start..].find("</DigestValue>").unwrap();
        &signed[start..start + end]
    }
}
