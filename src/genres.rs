use std::collections::{BTreeSet, HashSet};

use tracing::debug;

use crate::{
    error::IngestError,
    models::{GenreRef, RawGenre},
    store::MovieStore,
};

/// Resolves fetched genres against the store. A stored genre wins over the
/// fetched one, so its name is kept; unknown ids pass through as candidates
/// that `save_movie` will create. Nothing is written here.
pub async fn resolve<S>(raw: &[RawGenre], store: &S) -> Result<BTreeSet<GenreRef>, IngestError>
where
    S: MovieStore + ?Sized,
{
    let mut resolved = BTreeSet::new();
    let mut seen = HashSet::with_capacity(raw.len());

    for genre in raw {
        if !seen.insert(genre.id) {
            continue;
        }
        let found = match store.find_genre_by_id(genre.id).await? {
            Some(stored) => stored,
            None => {
                debug!(genre_id = genre.id, name = %genre.name, "new genre candidate");
                GenreRef { id: genre.id, name: genre.name.clone() }
            },
        };
        resolved.insert(found);
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SeaOrmStore;

    fn raw(id: i32, name: &str) -> RawGenre {
        RawGenre { id, name: name.to_string() }
    }

    #[tokio::test]
    async fn stored_name_wins_over_fetched_name() {
        let store = SeaOrmStore::in_memory().await.unwrap();
        store.insert_genre(&GenreRef { id: 28, name: "액션".to_string() }).await.unwrap();

        let resolved = resolve(&[raw(28, "Action"), raw(12, "Adventure")], &store).await.unwrap();

        let names: Vec<_> = resolved.iter().map(|g| (g.id, g.name.as_str())).collect();
        assert_eq!(names, vec![(12, "Adventure"), (28, "액션")]);
    }

    #[tokio::test]
    async fn resolving_twice_returns_the_same_stored_reference() {
        let store = SeaOrmStore::in_memory().await.unwrap();
        store.insert_genre(&GenreRef { id: 18, name: "드라마".to_string() }).await.unwrap();

        let first = resolve(&[raw(18, "Drama")], &store).await.unwrap();
        let second = resolve(&[raw(18, "Drama")], &store).await.unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(first.iter().next().unwrap().name, "드라마");
        assert_eq!(second.iter().next().unwrap().name, "드라마");
        assert_eq!(store.genre_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_ids_collapse_to_one_entry() {
        let store = SeaOrmStore::in_memory().await.unwrap();

        let resolved = resolve(&[raw(35, "Comedy"), raw(35, "Komödie")], &store).await.unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved.iter().next().unwrap().name, "Comedy");
        assert_eq!(store.genre_count().await.unwrap(), 0);
    }
}
