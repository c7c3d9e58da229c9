/*
 * Responsibility
 * - In-process implementation of every store trait
 * - Used when DATABASE_URL is unset (development) and by the test suite
 * - Mirrors the Postgres contracts: lowercase email uniqueness, optimistic versions,
 *   token lookup by (hash, scope, expiry > now), cascading token removal
 */
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::{
    models::{Metadata, Movie, PermissionSet, Scope, Token, User},
    repos::{
        MovieQuery, MovieStore, PermissionStore, RepoError, RepoResult, TokenStore, UserStore,
    },
};

/// Codes a user can be granted; matches the seeded `permissions` table.
const KNOWN_PERMISSIONS: &[&str] = &["movie:read", "movie:create", "movie:update", "movie:delete"];

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    tokens: Vec<Token>,
    permissions: HashMap<Uuid, HashSet<String>>,
    movies: BTreeMap<i64, Movie>,
    next_movie_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn insert_user(state: &mut State, user: &mut User) -> RepoResult<()> {
    if !user.password.is_set() {
        return Err(RepoError::MissingPasswordHash);
    }

    let email = user.email.to_lowercase();
    if state.users.values().any(|u| u.email == email) {
        return Err(RepoError::DuplicateEmail);
    }

    user.id = Uuid::new_v4();
    user.created_at = Utc::now();
    user.email = email;
    user.version = 1;
    state.users.insert(user.id, user.clone());
    Ok(())
}

fn grant(state: &mut State, user_id: Uuid, codes: &[&'static str]) {
    let granted = state.permissions.entry(user_id).or_default();
    for code in codes.iter().filter(|c| KNOWN_PERMISSIONS.contains(c)) {
        granted.insert(code.to_string());
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert(&self, user: &mut User) -> RepoResult<()> {
        insert_user(&mut self.lock(), user)
    }

    async fn insert_with_permissions(
        &self,
        user: &mut User,
        codes: &[&'static str],
    ) -> RepoResult<()> {
        // One guard for both writes, so nobody observes the user without its grants
        let mut state = self.lock();
        insert_user(&mut state, user)?;
        grant(&mut state, user.id, codes);
        Ok(())
    }

    async fn get_by_email(&self, email: &str) -> RepoResult<User> {
        let email = email.to_lowercase();
        self.lock()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn update(&self, user: &mut User) -> RepoResult<()> {
        if !user.password.is_set() {
            return Err(RepoError::MissingPasswordHash);
        }

        let mut state = self.lock();
        let email = user.email.to_lowercase();
        if state
            .users
            .values()
            .any(|u| u.id != user.id && u.email == email)
        {
            return Err(RepoError::DuplicateEmail);
        }

        let stored = match state.users.get_mut(&user.id) {
            Some(stored) if stored.version == user.version => stored,
            _ => return Err(RepoError::EditConflict),
        };

        user.email = email;
        user.version += 1;
        *stored = user.clone();
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert(&self, token: &Token) -> RepoResult<()> {
        let mut state = self.lock();
        if !state.users.contains_key(&token.user_id) {
            return Err(RepoError::NotFound);
        }

        // Only what the tokens table would hold
        state.tokens.push(Token {
            plaintext: String::new(),
            ..token.clone()
        });
        Ok(())
    }

    async fn lookup(&self, hash: &[u8], scope: Scope, now: DateTime<Utc>) -> RepoResult<User> {
        let state = self.lock();
        let token = state
            .tokens
            .iter()
            .find(|t| t.scope == scope && t.expiry > now && bool::from(t.hash.ct_eq(hash)))
            .ok_or(RepoError::NotFound)?;

        state
            .users
            .get(&token.user_id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn delete_all_for_scope(&self, scope: Scope, user_id: Uuid) -> RepoResult<u64> {
        let mut state = self.lock();
        let before = state.tokens.len();
        state
            .tokens
            .retain(|t| !(t.scope == scope && t.user_id == user_id));
        Ok((before - state.tokens.len()) as u64)
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn get_all_for_user(&self, user_id: Uuid) -> RepoResult<PermissionSet> {
        let state = self.lock();
        let mut codes: Vec<String> = state
            .permissions
            .get(&user_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        codes.sort();
        Ok(PermissionSet::new(codes))
    }

    async fn add_for_user(&self, user_id: Uuid, codes: &[&'static str]) -> RepoResult<()> {
        let mut state = self.lock();
        if !state.users.contains_key(&user_id) {
            return Err(RepoError::NotFound);
        }

        grant(&mut state, user_id, codes);
        Ok(())
    }
}

fn title_matches(title: &str, needle: &str) -> bool {
    if needle.trim().is_empty() {
        return true;
    }
    let words: Vec<String> = title.split_whitespace().map(str::to_lowercase).collect();
    needle
        .split_whitespace()
        .all(|w| words.contains(&w.to_lowercase()))
}

#[async_trait]
impl MovieStore for MemoryStore {
    async fn insert(&self, movie: &mut Movie) -> RepoResult<()> {
        let mut state = self.lock();
        state.next_movie_id += 1;

        movie.id = state.next_movie_id;
        movie.created_at = Utc::now();
        movie.version = 1;
        state.movies.insert(movie.id, movie.clone());
        Ok(())
    }

    async fn get(&self, id: i64) -> RepoResult<Movie> {
        self.lock()
            .movies
            .get(&id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn list(&self, query: &MovieQuery) -> RepoResult<(Vec<Movie>, Metadata)> {
        let filters = &query.filters;
        let mut movies: Vec<Movie> = self
            .lock()
            .movies
            .values()
            .filter(|m| title_matches(&m.title, &query.title))
            .filter(|m| query.genres.iter().all(|g| m.genres.contains(g)))
            .cloned()
            .collect();

        movies.sort_by(|a, b| {
            let primary = match filters.sort_column() {
                "title" => a.title.cmp(&b.title),
                "year" => a.year.cmp(&b.year),
                "runtime" => a.runtime.cmp(&b.runtime),
                _ => a.id.cmp(&b.id),
            };
            let primary = if filters.sort_descending() {
                primary.reverse()
            } else {
                primary
            };
            primary.then(a.id.cmp(&b.id))
        });

        let total = movies.len() as i64;
        let page: Vec<Movie> = movies
            .into_iter()
            .skip(filters.offset().max(0) as usize)
            .take(filters.limit().max(0) as usize)
            .collect();

        Ok((page, Metadata::calculate(total, filters.page, filters.page_size)))
    }

    async fn update(&self, movie: &mut Movie) -> RepoResult<()> {
        let mut state = self.lock();
        let stored = match state.movies.get_mut(&movie.id) {
            Some(stored) if stored.version == movie.version => stored,
            _ => return Err(RepoError::EditConflict),
        };

        movie.version += 1;
        *stored = movie.clone();
        Ok(())
    }

    async fn delete(&self, id: i64) -> RepoResult<()> {
        self.lock()
            .movies
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::models::{Filters, Runtime};

    async fn stored_user(store: &MemoryStore, email: &str) -> User {
        let mut user = User::new("Alice", email);
        user.password.set("pa55word-long").unwrap();
        UserStore::insert(store, &mut user).await.unwrap();
        user
    }

    fn token_for(user: &User, hash: &[u8], scope: Scope, expiry: DateTime<Utc>) -> Token {
        Token {
            plaintext: "unused".into(),
            hash: hash.to_vec(),
            user_id: user.id,
            expiry,
            scope,
        }
    }

    #[tokio::test]
    async fn email_uniqueness_ignores_case() {
        let store = MemoryStore::new();
        stored_user(&store, "alice@example.com").await;

        let mut dup = User::new("Other", "ALICE@example.com");
        dup.password.set("pa55word-long").unwrap();

        assert!(matches!(
            UserStore::insert(&store, &mut dup).await,
            Err(RepoError::DuplicateEmail)
        ));
        assert!(store.get_by_email("Alice@Example.com").await.is_ok());
    }

    #[tokio::test]
    async fn stale_user_version_is_an_edit_conflict() {
        let store = MemoryStore::new();
        let user = stored_user(&store, "alice@example.com").await;

        let mut first = user.clone();
        first.activated = true;
        UserStore::update(&store, &mut first).await.unwrap();
        assert_eq!(first.version, user.version + 1);

        let mut second = user.clone();
        assert!(matches!(
            UserStore::update(&store, &mut second).await,
            Err(RepoError::EditConflict)
        ));
    }

    #[tokio::test]
    async fn token_lookup_respects_scope_and_expiry() {
        let store = MemoryStore::new();
        let user = stored_user(&store, "alice@example.com").await;
        let now = Utc::now();

        TokenStore::insert(
            &store,
            &token_for(&user, b"live", Scope::Authentication, now + Duration::hours(1)),
        )
        .await
        .unwrap();
        TokenStore::insert(
            &store,
            &token_for(&user, b"dead", Scope::Authentication, now - Duration::seconds(1)),
        )
        .await
        .unwrap();

        let found = store.lookup(b"live", Scope::Authentication, now).await.unwrap();
        assert_eq!(found.id, user.id);

        assert!(matches!(
            store.lookup(b"live", Scope::Activation, now).await,
            Err(RepoError::NotFound)
        ));
        assert!(matches!(
            store.lookup(b"dead", Scope::Authentication, now).await,
            Err(RepoError::NotFound)
        ));
    }

    #[tokio::test]
    async fn delete_all_for_scope_leaves_other_scopes() {
        let store = MemoryStore::new();
        let user = stored_user(&store, "alice@example.com").await;
        let expiry = Utc::now() + Duration::hours(1);

        for (hash, scope) in [
            (&b"a1"[..], Scope::Activation),
            (&b"a2"[..], Scope::Activation),
            (&b"t1"[..], Scope::Authentication),
        ] {
            TokenStore::insert(&store, &token_for(&user, hash, scope, expiry))
                .await
                .unwrap();
        }

        let removed = store
            .delete_all_for_scope(Scope::Activation, user.id)
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert!(
            store
                .lookup(b"t1", Scope::Authentication, Utc::now())
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn registration_grant_is_all_or_nothing() {
        let store = MemoryStore::new();
        let existing = stored_user(&store, "alice@example.com").await;

        let mut dup = User::new("Other", "alice@example.com");
        dup.password.set("pa55word-long").unwrap();
        assert!(matches!(
            store.insert_with_permissions(&mut dup, &["movie:create"]).await,
            Err(RepoError::DuplicateEmail)
        ));
        assert!(store.get_all_for_user(existing.id).await.unwrap().codes().is_empty());

        let mut fresh = User::new("Bob", "bob@example.com");
        fresh.password.set("pa55word-long").unwrap();
        store
            .insert_with_permissions(&mut fresh, &["movie:read"])
            .await
            .unwrap();

        assert_eq!(store.get_by_email("bob@example.com").await.unwrap().id, fresh.id);
        assert!(store.get_all_for_user(fresh.id).await.unwrap().includes("movie:read"));
    }

    #[tokio::test]
    async fn permissions_ignore_unknown_codes() {
        let store = MemoryStore::new();
        let user = stored_user(&store, "alice@example.com").await;

        store
            .add_for_user(user.id, &["movie:read", "movie:read", "admin:all"])
            .await
            .unwrap();

        let set = store.get_all_for_user(user.id).await.unwrap();
        assert_eq!(set.codes(), ["movie:read".to_string()]);
    }

    #[tokio::test]
    async fn movie_list_filters_sorts_and_pages() {
        let store = MemoryStore::new();
        for (title, year, genres) in [
            ("Moana", 2016, vec!["animation", "adventure"]),
            ("Black Panther", 2018, vec!["action", "adventure"]),
            ("Deadpool", 2016, vec!["action", "comedy"]),
            ("The Breakfast Club", 1986, vec!["drama"]),
        ] {
            let mut movie = Movie::new(
                title.into(),
                year,
                Runtime(100),
                genres.into_iter().map(String::from).collect(),
            );
            MovieStore::insert(&store, &mut movie).await.unwrap();
        }

        let (movies, meta) = store
            .list(&MovieQuery {
                genres: vec!["adventure".into()],
                filters: Filters {
                    sort: "-year".into(),
                    ..Filters::default()
                },
                ..MovieQuery::default()
            })
            .await
            .unwrap();
        let titles: Vec<&str> = movies.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, ["Black Panther", "Moana"]);
        assert_eq!(meta.total_records, 2);

        let (movies, _) = store
            .list(&MovieQuery {
                title: "breakfast".into(),
                ..MovieQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(movies.len(), 1);

        let (movies, meta) = store
            .list(&MovieQuery {
                filters: Filters {
                    page: 2,
                    page_size: 3,
                    sort: "id".into(),
                },
                ..MovieQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(meta.last_page, 2);
        assert_eq!(meta.current_page, 2);
    }
}
