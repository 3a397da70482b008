use std::collections::BTreeMap;

use bigdecimal::BigDecimal;

use crate::schema::books;

/// Prices are stored as `NUMERIC(18, 2)`
const PRICE_SCALE: i64 = 2;
const PRICE_LIMIT: f64 = 1e16;

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
    diesel::Queryable,
    diesel::Selectable,
)]
#[diesel(table_name = books)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    #[serde(with = "price_number")]
    pub price: BigDecimal,
}

/// A book as it arrives over the wire, before validation.
///
/// Title and author are optional here so that a missing field is reported
/// as a validation error rather than a body decoding failure.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct BookInput {
    #[serde(default)]
    pub id: Option<i32>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub price: f64,
}

/// The mutable fields of a book. Everything but the ID.
#[derive(Debug, Clone, PartialEq, Eq, diesel::AsChangeset)]
#[diesel(table_name = books)]
pub struct BookChanges {
    pub title: String,
    pub author: String,
    pub price: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Eq, diesel::Insertable)]
#[diesel(table_name = books)]
pub struct NewBook {
    /// Left as `None`, the store assigns the ID
    pub id: Option<i32>,
    pub title: String,
    pub author: String,
    pub price: BigDecimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ValidationErrors {
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    fn add(&mut self, field: &str, message: String) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message);
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.errors.keys().map(String::as_str).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

impl BookInput {
    /// Check the required fields and split off the mutable part of the book.
    pub fn validate(self) -> Result<(Option<i32>, BookChanges), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let title = required(&mut errors, "title", self.title);
        let author = required(&mut errors, "author", self.author);
        let price = price_from_number(self.price);
        if price.is_none() {
            errors.add("price", "The price field is out of range.".to_string());
        }

        match (title, author, price) {
            (Some(title), Some(author), Some(price)) => Ok((
                self.id,
                BookChanges {
                    title,
                    author,
                    price,
                },
            )),
            _ => Err(errors),
        }
    }
}

fn required(errors: &mut ValidationErrors, field: &str, value: Option<String>) -> Option<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Some(value),
        _ => {
            errors.add(field, format!("The {field} field is required."));
            None
        }
    }
}

/// Convert a wire number to a price rounded to cents, if it fits the column
fn price_from_number(value: f64) -> Option<BigDecimal> {
    if !value.is_finite() || value.abs() >= PRICE_LIMIT {
        return None;
    }
    // f64's Display is the shortest string that reads back to the same value
    value
        .to_string()
        .parse::<BigDecimal>()
        .ok()
        .map(|price| price.round(PRICE_SCALE))
}

/// Prices travel as plain JSON numbers
mod price_number {
    use bigdecimal::BigDecimal;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(price: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error> {
        let value = price
            .to_string()
            .parse::<f64>()
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_f64(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigDecimal, D::Error> {
        let value = f64::deserialize(deserializer)?;
        super::price_from_number(value)
            .ok_or_else(|| de::Error::custom(format!("price out of range: {value}")))
    }
}

impl BookChanges {
    /// Overwrite the mutable fields of `book`, leaving its ID alone.
    pub fn apply_to(self, book: &mut Book) {
        book.title = self.title;
        book.author = self.author;
        book.price = self.price;
    }

    pub fn into_new_book(self, id: Option<i32>) -> NewBook {
        NewBook {
            id,
            title: self.title,
            author: self.author,
            price: self.price,
        }
    }
}

impl From<&Book> for BookChanges {
    fn from(book: &Book) -> Self {
        BookChanges {
            title: book.title.clone(),
            author: book.author.clone(),
            price: book.price.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(value: &str) -> BigDecimal {
        value.parse().unwrap()
    }

    fn input(title: Option<&str>, author: Option<&str>) -> BookInput {
        BookInput {
            id: None,
            title: title.map(str::to_string),
            author: author.map(str::to_string),
            price: 12.5,
        }
    }

    #[test]
    fn valid_input_yields_changes() {
        let (id, changes) = input(Some("Dune"), Some("Frank Herbert"))
            .validate()
            .unwrap();

        assert_eq!(id, None);
        assert_eq!(
            changes,
            BookChanges {
                title: "Dune".to_string(),
                author: "Frank Herbert".to_string(),
                price: price("12.50"),
            }
        );
    }

    #[test]
    fn blank_and_missing_fields_are_reported() {
        let errors = input(Some("   "), None).validate().unwrap_err();

        assert_eq!(
            errors.errors.keys().collect::<Vec<_>>(),
            vec!["author", "title"]
        );
        assert_eq!(
            errors.errors["title"],
            vec!["The title field is required.".to_string()]
        );
    }

    #[test]
    fn empty_title_is_rejected() {
        let errors = input(Some(""), Some("X")).validate().unwrap_err();
        assert!(errors.errors.contains_key("title"));
        assert!(!errors.errors.contains_key("author"));
    }

    #[test]
    fn price_beyond_column_range_is_rejected() {
        let mut book_input = input(Some("Dune"), Some("Frank Herbert"));
        book_input.price = 1e17;

        let errors = book_input.validate().unwrap_err();
        assert_eq!(errors.errors.keys().collect::<Vec<_>>(), vec!["price"]);
    }

    #[test]
    fn price_is_kept_exactly_to_the_cent() {
        let mut book_input = input(Some("Dune"), Some("Frank Herbert"));
        book_input.price = 0.1 + 0.2;

        let (_, changes) = book_input.validate().unwrap();
        assert_eq!(changes.price, price("0.30"));

        book_input = input(Some("Dune"), Some("Frank Herbert"));
        book_input.price = 7.99;
        let (_, changes) = book_input.validate().unwrap();
        assert_eq!(changes.price.to_string(), "7.99");
    }

    #[test]
    fn explicit_id_is_passed_through() {
        let mut book_input = input(Some("Emma"), Some("Jane Austen"));
        book_input.id = Some(42);

        let (id, changes) = book_input.validate().unwrap();
        let new_book = changes.into_new_book(id);

        assert_eq!(new_book.id, Some(42));
        assert_eq!(new_book.title, "Emma");
    }

    #[test]
    fn apply_to_preserves_id() {
        let mut book = Book {
            id: 7,
            title: "Old".to_string(),
            author: "Someone".to_string(),
            price: price("1.00"),
        };

        BookChanges {
            title: "New".to_string(),
            author: "Someone Else".to_string(),
            price: price("2.00"),
        }
        .apply_to(&mut book);

        assert_eq!(book.id, 7);
        assert_eq!(book.title, "New");
        assert_eq!(book.author, "Someone Else");
        assert_eq!(book.price, price("2"));
    }

    #[test]
    fn price_defaults_to_zero() {
        let book_input: BookInput =
            serde_json::from_str(r#"{"title": "Ulysses", "author": "James Joyce"}"#).unwrap();
        assert_eq!(book_input.price, 0.0);
    }

    #[test]
    fn book_price_is_a_json_number() {
        let book = Book {
            id: 1,
            title: "Emma".to_string(),
            author: "Jane Austen".to_string(),
            price: price("9.95"),
        };

        let json = serde_json::to_value(&book).unwrap();
        assert_eq!(json["price"], serde_json::json!(9.95));

        let back: Book = serde_json::from_value(json).unwrap();
        assert_eq!(back, book);
    }
}
