//! Resolver for `did:web` identifiers.
//!
//! A web DID names a domain; the document lives at a well-known HTTPS path
//! on that domain. Resolution is a single GET of
//! `https://<domain>/.well-known/did.json` followed by a JSON parse.
//! The deprecated `did:https:` form is accepted as an alias.

use async_trait::async_trait;

use did_jwt::did::DIDDocument;
use did_jwt::did_resolve::DIDResolver;
use did_jwt::Error;

/// Fetches a document body over HTTPS.
///
/// Kept as a trait so tests can resolve against canned documents without a
/// server.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<String, Error>;
}

/// Default [`HttpClient`] backed by reqwest. Non-2xx statuses are errors.
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        ReqwestHttpClient {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        ReqwestHttpClient::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str) -> Result<String, Error> {
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::Http(e.to_string()))?
            .text()
            .await
            .map_err(|e| Error::Http(e.to_string()))
    }
}

/// Resolver for the `web` DID method.
pub struct WebDIDResolver {
    http: Box<dyn HttpClient>,
}

impl WebDIDResolver {
    pub fn new() -> Self {
        WebDIDResolver {
            http: Box::new(ReqwestHttpClient::new()),
        }
    }

    pub fn with_http_client(http: Box<dyn HttpClient>) -> Self {
        WebDIDResolver { http }
    }
}

impl Default for WebDIDResolver {
    fn default() -> Self {
        WebDIDResolver::new()
    }
}

/// Extracts the domain of a web DID, accepting the deprecated `https`
/// method. Any fragment is dropped.
fn parse_domain(did: &str) -> Option<&str> {
    let rest = did
        .strip_prefix("did:web:")
        .or_else(|| did.strip_prefix("did:https:"))?;
    let domain = match rest.find('#') {
        Some(index) => &rest[..index],
        None => rest,
    };
    if domain.is_empty() {
        None
    } else {
        Some(domain)
    }
}

#[async_trait]
impl DIDResolver for WebDIDResolver {
    fn method(&self) -> &str {
        "web"
    }

    fn can_resolve(&self, did: &str) -> bool {
        parse_domain(did).is_some()
    }

    async fn resolve(&self, did: &str) -> Result<DIDDocument, Error> {
        let domain = match parse_domain(did) {
            Some(domain) => domain,
            None => return Err(Error::UnsupportedDidMethod(did.to_string())),
        };
        let url = format!("https://{}/.well-known/did.json", domain);
        let body = self.http.get(&url).await?;
        if body.trim().is_empty() {
            return Err(Error::BlankDocument(did.to_string()));
        }
        let document: DIDDocument = serde_json::from_str(&body)?;
        Ok(document)
    }
}
