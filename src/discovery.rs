use std::collections::HashSet;

use tracing::{debug, info};

use crate::{
    error::IngestError,
    models::{DateWindow, TmdbId},
    tmdb::CatalogProvider,
};

/// TMDB rejects discovery pages past this one, whatever `total_pages` says.
pub const MAX_DISCOVER_PAGE: u32 = 500;

/// Collects movie ids for every window, in window order, then drops repeats
/// (keeping the first occurrence) and truncates to `total_cap`.
///
/// Any failed page aborts the whole call.
pub async fn discover<P>(
    provider: &P,
    windows: &[DateWindow],
    genre_id: Option<i32>,
    per_window_cap: usize,
    total_cap: usize,
) -> Result<Vec<TmdbId>, IngestError>
where
    P: CatalogProvider + ?Sized,
{
    let mut all = Vec::new();

    for window in windows {
        let ids = discover_window(provider, window, genre_id, per_window_cap).await?;
        debug!(window = %window, collected = ids.len(), "window done");
        all.extend(ids);
    }

    let collected = all.len();
    let mut unique = dedup_preserving_order(all);
    unique.truncate(total_cap);

    info!(windows = windows.len(), collected, unique = unique.len(), "discovery finished");

    Ok(unique)
}

/// Pages through one window until `cap` ids are collected or the provider
/// runs out of pages.
async fn discover_window<P>(
    provider: &P,
    window: &DateWindow,
    genre_id: Option<i32>,
    cap: usize,
) -> Result<Vec<TmdbId>, IngestError>
where
    P: CatalogProvider + ?Sized,
{
    let mut ids = Vec::new();
    if cap == 0 {
        return Ok(ids);
    }

    let mut page = 1;
    loop {
        let resp = provider.discover_page(window, genre_id, page).await?;
        ids.extend(resp.ids);

        if ids.len() >= cap {
            ids.truncate(cap);
            break;
        }

        page += 1;
        if page > resp.total_pages.min(MAX_DISCOVER_PAGE) {
            debug!(window = %window, total_pages = resp.total_pages, collected = ids.len(), "pages exhausted");
            break;
        }
    }

    Ok(ids)
}

pub fn dedup_preserving_order(ids: Vec<TmdbId>) -> Vec<TmdbId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}
