use std::collections::BTreeSet;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait, sea_query::OnConflict,
};
use tracing::debug;

use crate::{
    entities::{genre, movie, movie_genre},
    error::IngestError,
    models::{GenreRef, MovieRecord, TmdbId},
};

/// Lookup-by-id and save-or-update sink for ingested movies.
#[async_trait]
pub trait MovieStore: Send + Sync {
    async fn find_genre_by_id(&self, id: i32) -> Result<Option<GenreRef>, IngestError>;

    /// All stored records for an external id, oldest row first.
    async fn find_movies_by_external_id(
        &self,
        tmdb_id: TmdbId,
    ) -> Result<Vec<MovieRecord>, IngestError>;

    /// Creates the record when `record.id` is `None`, otherwise overwrites the
    /// stored row. Genres the store does not know yet are created; the genre
    /// links are replaced, never merged. Returns the row id.
    async fn save_movie(&self, record: &MovieRecord) -> Result<i32, IngestError>;
}

#[derive(Clone)]
pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn genres_for(&self, movie_id: i32) -> Result<BTreeSet<GenreRef>, IngestError> {
        let genre_ids: Vec<i32> = movie_genre::Entity::find()
            .filter(movie_genre::Column::MovieId.eq(movie_id))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|link| link.genre_id)
            .collect();

        if genre_ids.is_empty() {
            return Ok(BTreeSet::new());
        }

        let genres = genre::Entity::find()
            .filter(genre::Column::Id.is_in(genre_ids))
            .all(&self.db)
            .await?;

        Ok(genres.into_iter().map(|g| GenreRef { id: g.id, name: g.name }).collect())
    }
}

#[async_trait]
impl MovieStore for SeaOrmStore {
    async fn find_genre_by_id(&self, id: i32) -> Result<Option<GenreRef>, IngestError> {
        let found = genre::Entity::find_by_id(id).one(&self.db).await?;
        Ok(found.map(|g| GenreRef { id: g.id, name: g.name }))
    }

    async fn find_movies_by_external_id(
        &self,
        tmdb_id: TmdbId,
    ) -> Result<Vec<MovieRecord>, IngestError> {
        let rows = movie::Entity::find()
            .filter(movie::Column::TmdbId.eq(tmdb_id))
            .order_by_asc(movie::Column::Id)
            .all(&self.db)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let genres = self.genres_for(row.id).await?;
            out.push(MovieRecord {
                id: Some(row.id),
                tmdb_id: row.tmdb_id,
                title: row.title,
                overview: row.overview,
                poster_url: row.poster_url,
                backdrop_url: row.backdrop_url,
                release_date: row.release_date,
                vote_average: row.vote_average,
                adult: row.adult,
                actors: row.actors,
                directors: row.directors,
                genres,
            });
        }
        Ok(out)
    }

    async fn save_movie(&self, record: &MovieRecord) -> Result<i32, IngestError> {
        let txn = self.db.begin().await?;

        for g in &record.genres {
            let model = genre::ActiveModel { id: Set(g.id), name: Set(g.name.clone()) };
            genre::Entity::insert(model)
                .on_conflict(OnConflict::column(genre::Column::Id).do_nothing().to_owned())
                .exec_without_returning(&txn)
                .await?;
        }

        let mut model = movie::ActiveModel {
            id: Default::default(),
            tmdb_id: Set(record.tmdb_id),
            title: Set(record.title.clone()),
            overview: Set(record.overview.clone()),
            poster_url: Set(record.poster_url.clone()),
            backdrop_url: Set(record.backdrop_url.clone()),
            release_date: Set(record.release_date.clone()),
            vote_average: Set(record.vote_average),
            adult: Set(record.adult),
            actors: Set(record.actors.clone()),
            directors: Set(record.directors.clone()),
        };

        let movie_id = match record.id {
            Some(id) => {
                model.id = Set(id);
                model.update(&txn).await?;
                movie_genre::Entity::delete_many()
                    .filter(movie_genre::Column::MovieId.eq(id))
                    .exec(&txn)
                    .await?;
                id
            },
            None => movie::Entity::insert(model).exec(&txn).await?.last_insert_id,
        };

        if !record.genres.is_empty() {
            let links = record.genres.iter().map(|g| movie_genre::ActiveModel {
                movie_id: Set(movie_id),
                genre_id: Set(g.id),
            });
            movie_genre::Entity::insert_many(links).exec_without_returning(&txn).await?;
        }

        txn.commit().await?;

        debug!(
            tmdb_id = record.tmdb_id,
            movie_id = movie_id,
            genres = record.genres.len(),
            "saved movie"
        );

        Ok(movie_id)
    }
}

#[cfg(test)]
impl SeaOrmStore {
    pub async fn in_memory() -> Result<Self, sea_orm::DbErr> {
        Ok(Self::new(crate::db::connect_in_memory().await?))
    }

    pub async fn insert_genre(&self, g: &GenreRef) -> Result<(), sea_orm::DbErr> {
        let model = genre::ActiveModel { id: Set(g.id), name: Set(g.name.clone()) };
        genre::Entity::insert(model).exec_without_returning(&self.db).await?;
        Ok(())
    }

    pub async fn genre_count(&self) -> Result<u64, sea_orm::DbErr> {
        use sea_orm::PaginatorTrait;
        genre::Entity::find().count(&self.db).await
    }

    pub async fn movie_count(&self) -> Result<u64, sea_orm::DbErr> {
        use sea_orm::PaginatorTrait;
        movie::Entity::find().count(&self.db).await
    }
}
