//! DID resolver abstraction and composite dispatch.

use async_trait::async_trait;

use crate::did::DIDDocument;
use crate::error::Error;

/// A resolver for one DID method.
///
/// Implementations are configured up front and treated as read-only;
/// concurrent `resolve` calls may share one instance.
#[async_trait]
pub trait DIDResolver: Send + Sync {
    /// The DID method this resolver handles, e.g. `ethr`.
    fn method(&self) -> &str;

    /// Whether this resolver recognizes the given DID (or DID-like string)
    /// and has the configuration needed to resolve it.
    fn can_resolve(&self, did: &str) -> bool;

    /// Resolves the DID to its current document.
    async fn resolve(&self, did: &str) -> Result<DIDDocument, Error>;
}

/// Extracts the method segment of `did:<method>:<rest>`.
pub fn did_method(did: &str) -> Option<&str> {
    let rest = did.strip_prefix("did:")?;
    let index = rest.find(':')?;
    let method = &rest[..index];
    if method.is_empty() || rest[index + 1..].is_empty() {
        None
    } else {
        Some(method)
    }
}

/// Dispatches resolution across a set of method resolvers.
///
/// A DID with a registered method goes straight to that resolver, and its
/// result or error is returned verbatim. DIDs without a recognizable method
/// (bare addresses, legacy identifiers) are offered to every registered
/// resolver that claims them, in registration order, and the first
/// successful resolution wins.
#[derive(Default)]
pub struct UniversalDIDResolver {
    resolvers: Vec<Box<dyn DIDResolver>>,
}

impl UniversalDIDResolver {
    pub fn builder() -> UniversalDIDResolverBuilder {
        UniversalDIDResolverBuilder::default()
    }

    fn find(&self, method: &str) -> Option<&dyn DIDResolver> {
        self.resolvers
            .iter()
            .find(|resolver| resolver.method() == method)
            .map(AsRef::as_ref)
    }
}

#[async_trait]
impl DIDResolver for UniversalDIDResolver {
    fn method(&self) -> &str {
        ""
    }

    fn can_resolve(&self, did: &str) -> bool {
        self.resolvers.iter().any(|resolver| resolver.can_resolve(did))
    }

    async fn resolve(&self, did: &str) -> Result<DIDDocument, Error> {
        if let Some(method) = did_method(did) {
            if let Some(resolver) = self.find(method) {
                return resolver.resolve(did).await;
            }
        }
        for resolver in &self.resolvers {
            if resolver.can_resolve(did) {
                if let Ok(document) = resolver.resolve(did).await {
                    return Ok(document);
                }
            }
        }
        Err(Error::UnresolvableDid {
            did: did.to_string(),
            count: self.resolvers.len(),
        })
    }
}

#[derive(Default)]
pub struct UniversalDIDResolverBuilder {
    resolvers: Vec<Box<dyn DIDResolver>>,
}

impl UniversalDIDResolverBuilder {
    pub fn add_resolver(mut self, resolver: Box<dyn DIDResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    pub fn build(self) -> UniversalDIDResolver {
        UniversalDIDResolver {
            resolvers: self.resolvers,
        }
    }
}
