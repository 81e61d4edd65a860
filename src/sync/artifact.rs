use crate::download::DownloadArtifact;
use crate::error::Result;
use crate::jobs::JobStatusStore;
use crate::store::ContentStore;

/// Loads a prior download's transactions.
///
/// A missing artifact yields an empty set (the sync then completes with
/// nothing to send); malformed JSON fails the read, recorded at index 0.
pub async fn load_download(
    downloads: &dyn ContentStore,
    download_identifier: &str,
    jobs: &JobStatusStore,
    sync_identifier: &str,
) -> Result<DownloadArtifact> {
    if !downloads.exists(download_identifier).await? {
        log::warn!("No download found under \"{download_identifier}\".");
        jobs.add_warning(
            sync_identifier,
            0,
            format!("Could not find a download under identifier \"{download_identifier}\"."),
        )
        .await;
        return Ok(DownloadArtifact::new());
    }
    jobs.add_message(sync_identifier, 0, "Retrieved downloaded transactions.")
        .await;
    let bytes = downloads.get(download_identifier).await?;
    match serde_json::from_slice::<DownloadArtifact>(&bytes) {
        Ok(artifact) => {
            let count: usize = artifact.values().map(Vec::len).sum();
            log::debug!("Got {count} downloaded transaction(s).");
            Ok(artifact)
        }
        Err(err) => {
            log::error!("Could not read downloaded transactions: {err}");
            jobs.add_error(sync_identifier, 0, "Could not read downloaded transactions.")
                .await;
            Err(err.into())
        }
    }
}
