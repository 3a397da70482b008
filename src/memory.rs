//! A book store held entirely in process memory.
//!
//! Clones share the same underlying map, so one instance can back every
//! request of a server.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::models::{Book, NewBook};
use crate::repo::{BookRepo, RepoError};

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("a book with ID {0} already exists")]
    DuplicateId(i32),

    #[error("no IDs left to assign after {0}")]
    IdsExhausted(i32),
}

#[derive(Debug, Default)]
struct Shelf {
    books: BTreeMap<i32, Book>,
}

impl Shelf {
    fn next_id(&self) -> Result<i32, MemoryError> {
        match self.books.keys().next_back() {
            None => Ok(1),
            Some(&last) => last.checked_add(1).ok_or(MemoryError::IdsExhausted(last)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryBookRepo {
    shelf: Arc<RwLock<Shelf>>,
}

impl InMemoryBookRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the given books already stored. Later entries win on a
    /// repeated ID.
    pub fn with_books(books: impl IntoIterator<Item = Book>) -> Self {
        let shelf = Shelf {
            books: books.into_iter().map(|book| (book.id, book)).collect(),
        };
        InMemoryBookRepo {
            shelf: Arc::new(RwLock::new(shelf)),
        }
    }
}

impl BookRepo for InMemoryBookRepo {
    type Error = MemoryError;

    async fn get_all(&self) -> Result<Vec<Book>, RepoError<MemoryError>> {
        let shelf = self.shelf.read().await;
        Ok(shelf.books.values().cloned().collect())
    }

    async fn get_by_id(&self, id: i32) -> Result<Book, RepoError<MemoryError>> {
        let shelf = self.shelf.read().await;
        shelf.books.get(&id).cloned().ok_or(RepoError::NotFound(id))
    }

    async fn search(&self, term: &str) -> Result<Vec<Book>, RepoError<MemoryError>> {
        let shelf = self.shelf.read().await;
        Ok(shelf
            .books
            .values()
            .filter(|book| book.title.contains(term) || book.author.contains(term))
            .cloned()
            .collect())
    }

    async fn add(&self, new_book: NewBook) -> Result<Book, RepoError<MemoryError>> {
        let mut shelf = self.shelf.write().await;

        let id = match new_book.id {
            Some(id) if shelf.books.contains_key(&id) => {
                return Err(RepoError::Store(MemoryError::DuplicateId(id)))
            }
            Some(id) => id,
            None => shelf.next_id().map_err(RepoError::Store)?,
        };

        let book = Book {
            id,
            title: new_book.title,
            author: new_book.author,
            price: new_book.price,
        };
        shelf.books.insert(id, book.clone());
        Ok(book)
    }

    async fn update(&self, book: &Book) -> Result<Book, RepoError<MemoryError>> {
        let mut shelf = self.shelf.write().await;

        let stored = shelf
            .books
            .get_mut(&book.id)
            .ok_or(RepoError::NotFound(book.id))?;
        stored.title = book.title.clone();
        stored.author = book.author.clone();
        stored.price = book.price.clone();

        Ok(stored.clone())
    }

    async fn delete(&self, id: i32) -> Result<(), RepoError<MemoryError>> {
        let mut shelf = self.shelf.write().await;
        shelf
            .books
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound(id))
    }
}
