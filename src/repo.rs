use crate::models::{Book, NewBook};
use std::error::Error;
use std::future::Future;

/// Failure of a repository operation. Only a missing record is modelled,
/// anything else the store reports is passed through untouched.
#[derive(Debug, thiserror::Error)]
pub enum RepoError<E> {
    #[error("no book found with ID: {0}")]
    NotFound(i32),

    #[error(transparent)]
    Store(E),
}

pub type RepoResult<T, E> = Result<T, RepoError<E>>;

pub trait BookRepo {
    type Error: Error + Send + Sync + 'static;

    /// All books, ordered by ID
    fn get_all(&self) -> impl Future<Output = RepoResult<Vec<Book>, Self::Error>> + Send;

    fn get_by_id(&self, id: i32) -> impl Future<Output = RepoResult<Book, Self::Error>> + Send;

    /// Books whose title or author contains `term`, ordered by ID
    fn search(
        &self,
        term: &str,
    ) -> impl Future<Output = RepoResult<Vec<Book>, Self::Error>> + Send;

    fn add(&self, new_book: NewBook) -> impl Future<Output = RepoResult<Book, Self::Error>> + Send;

    /// Overwrites every mutable field of the stored book with the same ID
    fn update(&self, book: &Book) -> impl Future<Output = RepoResult<Book, Self::Error>> + Send;

    fn delete(&self, id: i32) -> impl Future<Output = RepoResult<(), Self::Error>> + Send;
}
