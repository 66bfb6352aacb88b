use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Not unique: insert-only runs may store the same movie more than once.
        manager
            .create_index(
                Index::create()
                    .name("idx_movie_tmdb_id")
                    .table(Movie::Table)
                    .col(Movie::TmdbId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movie_genre_genre_id")
                    .table(MovieGenre::Table)
                    .col(MovieGenre::GenreId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_movie_genre_genre_id").table(MovieGenre::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_movie_tmdb_id").table(Movie::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Movie {
    Table,
    TmdbId,
}

#[derive(DeriveIden)]
enum MovieGenre {
    Table,
    GenreId,
}
