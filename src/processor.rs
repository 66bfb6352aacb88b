use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::{
    discovery,
    error::IngestError,
    genres,
    models::{
        GenreRef, IngestRequest, IngestSummary, MovieRecord, RawCredit, RawMovieDetail, WriteMode,
    },
    store::MovieStore,
    tmdb::CatalogProvider,
    windows,
};

const MAX_CREDITED: usize = 10;

/// Drives one ingestion run, strictly one identifier at a time.
pub struct Ingestor<'a, P: ?Sized, S: ?Sized> {
    provider: &'a P,
    store: &'a S,
    image_base_url: String,
    write_mode: WriteMode,
}

impl<'a, P, S> Ingestor<'a, P, S>
where
    P: CatalogProvider + ?Sized,
    S: MovieStore + ?Sized,
{
    pub fn new(provider: &'a P, store: &'a S, image_base_url: String, write_mode: WriteMode) -> Self {
        Self { provider, store, image_base_url, write_mode }
    }

    /// Plans windows, discovers ids, then fetches and stores each movie. The
    /// first failure aborts the run; movies stored before it stay stored.
    pub async fn ingest(&self, req: &IngestRequest) -> Result<IngestSummary, IngestError> {
        let windows =
            windows::plan(req.anchor, req.recent_months, req.upcoming_months, req.past_years)?;

        info!(
            anchor = %req.anchor,
            windows = windows.len(),
            total_count = req.total_count,
            strategy = ?req.strategy,
            write_mode = ?self.write_mode,
            "starting ingestion"
        );

        let ids = discovery::discover(
            self.provider,
            &windows,
            req.strategy.genre_filter(),
            req.per_window_cap,
            req.total_count,
        )
        .await?;

        let mut summary = IngestSummary { discovered: ids.len(), ..Default::default() };

        for tmdb_id in ids {
            let existing = match self.write_mode {
                WriteMode::Upsert => {
                    self.store.find_movies_by_external_id(tmdb_id).await?.into_iter().next()
                },
                WriteMode::InsertOnly => None,
            };
            let is_update = existing.is_some();

            let detail = self.provider.movie_detail(tmdb_id).await?;
            let credits = self.provider.movie_credits(tmdb_id).await?;
            let genres = genres::resolve(&detail.genres, self.store).await?;

            let record = merge_movie(existing, &detail, &credits, genres, &self.image_base_url);
            self.store.save_movie(&record).await?;

            if is_update {
                summary.updated += 1;
            } else {
                summary.created += 1;
            }
            debug!(tmdb_id, title = %record.title, updated = is_update, "movie stored");
        }

        info!(
            discovered = summary.discovered,
            created = summary.created,
            updated = summary.updated,
            "ingestion finished"
        );

        Ok(summary)
    }
}

/// Builds the record to store from freshly fetched data. Only the storage id
/// of `existing` survives; every other field, genres included, is replaced.
///
/// The backdrop URL is derived from the poster path, as stored records have
/// always been; `backdrop_path` is fetched but not used.
pub fn merge_movie(
    existing: Option<MovieRecord>,
    detail: &RawMovieDetail,
    credits: &RawCredit,
    genres: BTreeSet<GenreRef>,
    image_base_url: &str,
) -> MovieRecord {
    let mut record = existing.unwrap_or_else(|| MovieRecord::new(detail.id));

    record.tmdb_id = detail.id;
    record.title = detail.title.clone();
    record.overview = detail.overview.clone();
    record.poster_url = image_url(image_base_url, "w500", &detail.poster_path);
    record.backdrop_url = image_url(image_base_url, "original", &detail.poster_path);
    record.release_date = detail.release_date.clone();
    record.vote_average = detail.vote_average;
    record.adult = detail.adult;
    record.actors = actors(credits);
    record.directors = directors(credits);
    record.genres = genres;

    record
}

fn image_url(base: &str, size: &str, path: &str) -> String {
    format!("{base}{size}{path}")
}

fn actors(credits: &RawCredit) -> String {
    credits
        .cast
        .iter()
        .take(MAX_CREDITED)
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

fn directors(credits: &RawCredit) -> String {
    credits
        .crew
        .iter()
        .filter(|c| c.job == "Director")
        .take(MAX_CREDITED)
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(",")
}
