use std::sync::Arc;

use crate::cluster::ResourceClient;
use crate::http::HttpClient;
use crate::model::{ApplicationIdentity, ModelError, Namespace};

/// Everything one scenario reads the cluster and the application through.
///
/// Built once the application identity is known and handed by reference to
/// the poller and validator; nothing here changes for the rest of the run.
#[derive(Clone)]
pub struct Session {
    namespace: Namespace,
    identity: ApplicationIdentity,
    client: Arc<dyn ResourceClient>,
    http: Arc<dyn HttpClient>,
}

impl Session {
    pub fn new(
        identity: ApplicationIdentity,
        client: Arc<dyn ResourceClient>,
        http: Arc<dyn HttpClient>,
    ) -> Result<Self, ModelError> {
        let namespace = Namespace::new(client.namespace())?;
        Ok(Self {
            namespace,
            identity,
            client,
            http,
        })
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn identity(&self) -> &ApplicationIdentity {
        &self.identity
    }

    pub fn client(&self) -> &dyn ResourceClient {
        self.client.as_ref()
    }

    pub fn http(&self) -> &dyn HttpClient {
        self.http.as_ref()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("namespace", &self.namespace)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}
