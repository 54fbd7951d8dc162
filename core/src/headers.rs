//! Link-id header resolution

use tracing::debug;

use crate::adapter::DqStore;
use crate::domain::{HeaderColumn, HeaderDescriptor};
use crate::error::{CoreError, Result};

/// Separator between tokens of a link id (headers and break payloads)
pub const LINK_ID_DELIMITER: &str = "~|";

/// Split a stored link-id header into its named columns
///
/// Blank tokens are skipped; every kept column remembers its position in
/// the unfiltered token list so it lines up with break payload values.
pub fn parse_header(raw: &str) -> HeaderDescriptor {
    let columns = raw
        .split(LINK_ID_DELIMITER)
        .enumerate()
        .filter_map(|(i, token)| {
            let name = token.trim();
            (!name.is_empty()).then(|| HeaderColumn {
                position: i + 1,
                name: name.to_string(),
            })
        })
        .collect();

    HeaderDescriptor { columns }
}

/// Fetch and parse the header of a dataset
pub async fn resolve_headers(store: &dyn DqStore, dataset: &str) -> Result<HeaderDescriptor> {
    let raw = store
        .fetch_header(dataset)
        .await?
        .ok_or_else(|| CoreError::DatasetNotFound(dataset.to_string()))?;

    let header = parse_header(&raw);
    if header.is_empty() {
        return Err(CoreError::NoHeaders(dataset.to_string()));
    }

    debug!("Resolved {} header columns for {}", header.columns.len(), dataset);
    Ok(header)
}
