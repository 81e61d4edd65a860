use crate::jobs::JobStatusStore;
use crate::ledger::Posting;

/// Normalizes generated postings before sending.
///
/// Strips the fields known to cause false-positive duplicate detection on
/// the ledger side: the precise timestamp, and a category id of zero (which
/// means "no category" and must be omitted rather than sent as `0`). Never
/// drops postings; the count before equals the count after.
pub async fn filter(
    postings: Vec<Posting>,
    jobs: &JobStatusStore,
    identifier: &str,
) -> Vec<Posting> {
    let start = postings.len();
    let filtered: Vec<Posting> = postings
        .into_iter()
        .map(|mut posting| {
            posting.datetime = None;
            if posting.category_id == Some(0) {
                posting.category_id = None;
            }
            posting
        })
        .collect();
    jobs.add_message(
        identifier,
        0,
        format!(
            "Filtered down from {start} (possibly duplicate) entries to {} unique transactions.",
            filtered.len()
        ),
    )
    .await;
    filtered
}
