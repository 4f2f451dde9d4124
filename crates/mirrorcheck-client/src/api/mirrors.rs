//! Target list endpoint.

use crate::MirrorClient;
use mirrorcheck_core::{CheckError, Mirror, MirrorList, Result};
use tracing::debug;

/// Target list endpoint
pub struct MirrorsApi<'a> {
    client: &'a MirrorClient,
}

impl<'a> MirrorsApi<'a> {
    pub(crate) fn new(client: &'a MirrorClient) -> Self {
        Self { client }
    }

    /// Fetch the mirrors to check
    ///
    /// `cdn_ids` marks which mirrors are fronted by a CDN.
    pub async fn list(&self, url: &str, cdn_ids: &[String]) -> Result<Vec<Mirror>> {
        let list: MirrorList = self.client.get_json(url).await?;
        if !list.error.is_empty() && list.mirrors.is_empty() {
            return Err(CheckError::Resolution(format!(
                "target list {url} reported: {}",
                list.error
            )));
        }

        let mirrors: Vec<Mirror> = list
            .mirrors
            .into_iter()
            .map(|mut m| {
                m.cdn = m.cdn || cdn_ids.iter().any(|id| *id == m.id);
                m
            })
            .collect();
        debug!(url = %url, mirrors = mirrors.len(), "fetched target list");
        Ok(mirrors)
    }

    /// Fetch one mirror by id
    pub async fn get(&self, url: &str, id: &str, cdn_ids: &[String]) -> Result<Mirror> {
        self.list(url, cdn_ids)
            .await?
            .into_iter()
            .find(|m| m.id == id)
            .ok_or_else(|| CheckError::NotFound(format!("mirror {id}")))
    }
}
