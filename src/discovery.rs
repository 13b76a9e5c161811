//! Caller-side discovery: page through a remote catalog and accumulate what it
//! exposes.

use crate::{
    catalog::ExposureCatalog,
    descriptor::{CallableDescriptor, ClassDescriptor, FunctionDescriptor},
    net::{with_query, DiscoveryRequest, ExposurePage, Transport, TransportError, EXPOSE_QUERY},
};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    #[error("request for page {page} did not encode: {source}")]
    Encoding {
        page: u64,
        #[source]
        source: serde_json::Error,
    },

    #[error("page {page} did not decode: {source}")]
    Decoding {
        page: u64,
        #[source]
        source: serde_json::Error,
    },

    #[error("page {page} of {total_pages} carried no element")]
    MissingElement { page: u64, total_pages: u64 },
}

/// Counts from one discovery session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiscoveryStats {
    pub pages_fetched: u64,
    pub functions: usize,
    pub classes: usize,
}

/// Descriptors accumulated from one or more discovery sessions.
///
/// Sessions only append: running discovery twice against the same exposer
/// lists everything twice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Discovery {
    pub classes_to_generate: Vec<ClassDescriptor>,
    pub functions_to_generate: Vec<FunctionDescriptor>,
}

impl Discovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetches pages 1, 2, ... until past the `totalPages` of the latest
    /// response. The first undecodable page ends the session with an error;
    /// descriptors appended before it stay.
    pub async fn discover(
        &mut self,
        transport: &impl Transport,
        server: &str,
    ) -> Result<DiscoveryStats, DiscoveryError> {
        let url = with_query(server, EXPOSE_QUERY);
        let mut stats = DiscoveryStats::default();
        let mut page = 1;
        loop {
            let body = serde_json::to_vec(&DiscoveryRequest { page })
                .map_err(|source| DiscoveryError::Encoding { page, source })?;
            let reply = transport.post(&url, body).await?;
            stats.pages_fetched += 1;
            let ExposurePage {
                total_pages,
                elements,
                ..
            } = serde_json::from_slice(&reply)
                .map_err(|source| DiscoveryError::Decoding { page, source })?;
            debug!(page, total_pages, "fetched discovery page");

            if elements.is_empty() && page <= total_pages {
                return Err(DiscoveryError::MissingElement { page, total_pages });
            }
            for element in elements {
                match element {
                    CallableDescriptor::Class(class) => {
                        self.classes_to_generate.push(class);
                        stats.classes += 1;
                    }
                    CallableDescriptor::Function(function) => {
                        self.functions_to_generate.push(function);
                        stats.functions += 1;
                    }
                }
            }

            page += 1;
            if page > total_pages {
                break;
            }
        }
        info!(
            pages = stats.pages_fetched,
            functions = stats.functions,
            classes = stats.classes,
            "discovery finished"
        );
        Ok(stats)
    }

    pub fn is_empty(&self) -> bool {
        self.classes_to_generate.is_empty() && self.functions_to_generate.is_empty()
    }

    /// The accumulated descriptors as a catalog, functions first.
    pub fn into_catalog(self) -> ExposureCatalog {
        let mut catalog = ExposureCatalog::new();
        for f in self.functions_to_generate {
            catalog.push(CallableDescriptor::Function(f));
        }
        for c in self.classes_to_generate {
            catalog.push(CallableDescriptor::Class(c));
        }
        catalog
    }
}
