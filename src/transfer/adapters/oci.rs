//! Registry-backed image client built on `oci-distribution`.
//!
//! Pulled images are held in process memory keyed by reference; "tagging"
//! shares the stored layers under a second key and "removing" drops the
//! key. Only the push step talks to the destination registry.

use async_trait::async_trait;
use oci_distribution::client::{Client, ClientConfig, Config, ImageLayer};
use oci_distribution::manifest::{
    IMAGE_DOCKER_LAYER_GZIP_MEDIA_TYPE, IMAGE_DOCKER_LAYER_TAR_MEDIA_TYPE,
    IMAGE_LAYER_GZIP_MEDIA_TYPE, IMAGE_LAYER_MEDIA_TYPE, OciImageManifest,
};
use oci_distribution::secrets::RegistryAuth;
use oci_distribution::Reference;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::transfer::{
    domain::RegistryCredentials,
    ports::{ImageClient, ImageClientError, ImageClientResult, run_cancellable},
};

/// Layer media types accepted when pulling.
const ACCEPTED_LAYER_TYPES: [&str; 4] = [
    IMAGE_LAYER_MEDIA_TYPE,
    IMAGE_LAYER_GZIP_MEDIA_TYPE,
    IMAGE_DOCKER_LAYER_TAR_MEDIA_TYPE,
    IMAGE_DOCKER_LAYER_GZIP_MEDIA_TYPE,
];

struct StoredImage {
    layers: Vec<ImageLayer>,
    config: Config,
    manifest: Option<OciImageManifest>,
}

/// [`ImageClient`] that pulls anonymously and pushes with basic auth.
#[derive(Clone)]
pub struct OciImageClient {
    client: Client,
    local: Arc<RwLock<HashMap<String, Arc<StoredImage>>>>,
}

impl Default for OciImageClient {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl OciImageClient {
    /// Creates a client with the given registry transport configuration.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            client: Client::new(config),
            local: Arc::default(),
        }
    }

    fn lookup(&self, reference: &str) -> ImageClientResult<Arc<StoredImage>> {
        self.local
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(reference)
            .cloned()
            .ok_or_else(|| ImageClientError::NotFound(reference.to_owned()))
    }

    fn store(&self, reference: &str, image: Arc<StoredImage>) {
        self.local
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(reference.to_owned(), image);
    }
}

fn parse_reference(reference: &str) -> ImageClientResult<Reference> {
    reference
        .parse::<Reference>()
        .map_err(|err| ImageClientError::Rejected(format!("{reference}: {err}")))
}

#[async_trait]
impl ImageClient for OciImageClient {
    async fn pull(&self, cancel: &CancellationToken, reference: &str) -> ImageClientResult<()> {
        let parsed = parse_reference(reference)?;
        let image = run_cancellable(cancel, async {
            self.client
                .pull(
                    &parsed,
                    &RegistryAuth::Anonymous,
                    ACCEPTED_LAYER_TYPES.to_vec(),
                )
                .await
                .map_err(ImageClientError::transport)
        })
        .await?;

        debug!(
            reference,
            layers = image.layers.len(),
            digest = image.digest.as_deref().unwrap_or_default(),
            "image pulled"
        );
        self.store(
            reference,
            Arc::new(StoredImage {
                layers: image.layers,
                config: image.config,
                manifest: image.manifest,
            }),
        );
        Ok(())
    }

    async fn tag(
        &self,
        cancel: &CancellationToken,
        source: &str,
        target: &str,
    ) -> ImageClientResult<()> {
        if cancel.is_cancelled() {
            return Err(ImageClientError::Cancelled);
        }
        parse_reference(target)?;
        let image = self.lookup(source)?;
        self.store(target, image);
        Ok(())
    }

    async fn push(
        &self,
        cancel: &CancellationToken,
        reference: &str,
        credentials: &RegistryCredentials,
    ) -> ImageClientResult<()> {
        let parsed = parse_reference(reference)?;
        let image = self.lookup(reference)?;
        let auth = RegistryAuth::Basic(
            credentials.username().to_owned(),
            credentials.password().to_owned(),
        );
        let response = run_cancellable(cancel, async {
            self.client
                .push(
                    &parsed,
                    &image.layers,
                    image.config.clone(),
                    &auth,
                    image.manifest.clone(),
                )
                .await
                .map_err(ImageClientError::transport)
        })
        .await?;

        debug!(reference, manifest_url = %response.manifest_url, "image pushed");
        Ok(())
    }

    async fn remove(&self, cancel: &CancellationToken, reference: &str) -> ImageClientResult<()> {
        if cancel.is_cancelled() {
            return Err(ImageClientError::Cancelled);
        }
        self.local
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(reference)
            .map(|_| ())
            .ok_or_else(|| ImageClientError::NotFound(reference.to_owned()))
    }
}
