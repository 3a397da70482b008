use crate::models::{Book, BookChanges, NewBook};
use crate::repo::{BookRepo, RepoError};
use crate::schema::books;
use bb8::Pool;
use diesel::expression_methods::EscapeExpressionMethods;
use diesel::{
    BoolExpressionMethods, ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper,
    TextExpressionMethods,
};
use diesel_async::pooled_connection::{AsyncDieselConnectionManager, PoolError};
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};

const RESYNC_ID_SEQUENCE: &str =
    "SELECT setval(pg_get_serial_sequence('books', 'id'), MAX(id)) FROM books";

pub type DBPool = bb8::Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

pub async fn create_db_pool(connection_string: &str, max_size: u32) -> Result<DBPool, PoolError> {
    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(connection_string);
    Pool::builder().max_size(max_size).build(config).await
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("problem getting a connection from the connection pool: {0}")]
    Pool(#[from] bb8::RunError<PoolError>),

    #[error("problem executing a statement against the DB: {0}")]
    Query(#[from] diesel::result::Error),
}

impl From<bb8::RunError<PoolError>> for RepoError<DatabaseError> {
    fn from(error: bb8::RunError<PoolError>) -> Self {
        RepoError::Store(error.into())
    }
}

impl From<diesel::result::Error> for RepoError<DatabaseError> {
    fn from(error: diesel::result::Error) -> Self {
        RepoError::Store(error.into())
    }
}

#[derive(Clone)]
pub struct DatabaseBookRepo {
    pool: DBPool,
}

impl DatabaseBookRepo {
    pub fn new(pool: DBPool) -> Self {
        DatabaseBookRepo { pool }
    }
}

/// Escape LIKE wildcards so the term is matched literally
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

impl BookRepo for DatabaseBookRepo {
    type Error = DatabaseError;

    async fn get_all(&self) -> Result<Vec<Book>, RepoError<DatabaseError>> {
        let mut conn = self.pool.get().await?;

        let books = books::table
            .select(Book::as_select())
            .order(books::id.asc())
            .load(&mut conn)
            .await?;

        Ok(books)
    }

    async fn get_by_id(&self, id: i32) -> Result<Book, RepoError<DatabaseError>> {
        let mut conn = self.pool.get().await?;

        books::table
            .find(id)
            .select(Book::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .ok_or(RepoError::NotFound(id))
    }

    async fn search(&self, term: &str) -> Result<Vec<Book>, RepoError<DatabaseError>> {
        let mut conn = self.pool.get().await?;
        let pattern = contains_pattern(term);

        let books = books::table
            .filter(
                books::title
                    .like(pattern.clone())
                    .escape('\\')
                    .or(books::author.like(pattern).escape('\\')),
            )
            .select(Book::as_select())
            .order(books::id.asc())
            .load(&mut conn)
            .await?;

        Ok(books)
    }

    async fn add(&self, new_book: NewBook) -> Result<Book, RepoError<DatabaseError>> {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;
        let explicit_id = new_book.id.is_some();

        let inserted_book = conn
            .transaction::<_, diesel::result::Error, _>(|conn| {
                async move {
                    let book = diesel::insert_into(books::table)
                        .values(new_book)
                        .returning(Book::as_returning())
                        .get_result(conn)
                        .await?;

                    // An explicit ID bypasses the serial sequence, so move it
                    // past the largest stored ID for later inserts
                    if explicit_id {
                        diesel::sql_query(RESYNC_ID_SEQUENCE).execute(conn).await?;
                    }

                    Ok(book)
                }
                .scope_boxed()
            })
            .await?;

        Ok(inserted_book)
    }

    async fn update(&self, book: &Book) -> Result<Book, RepoError<DatabaseError>> {
        let mut conn = self.pool.get().await?;

        diesel::update(books::table.find(book.id))
            .set(BookChanges::from(book))
            .returning(Book::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?
            .ok_or(RepoError::NotFound(book.id))
    }

    async fn delete(&self, id: i32) -> Result<(), RepoError<DatabaseError>> {
        let mut conn = self.pool.get().await?;

        let affected_rows = diesel::delete(books::table.find(id))
            .execute(&mut conn)
            .await?;

        if affected_rows == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::contains_pattern;

    #[test]
    fn plain_term_is_wrapped_in_wildcards() {
        assert_eq!(contains_pattern("Dickens"), "%Dickens%");
    }

    #[test]
    fn wildcards_in_term_are_escaped() {
        assert_eq!(contains_pattern("100%_a\\b"), "%100\\%\\_a\\\\b%");
    }
}
