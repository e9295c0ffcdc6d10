//! Typed records built from backend documents.
//!
//! Documents are schema-flexible JSON maps. Each record type validates its
//! required fields and defaults the optional ones, so the rest of the crate
//! never touches raw JSON.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::storage::Document;

pub const LISTS: &str = "lists";
pub const PRODUCTS: &str = "products";

pub const FIELD_USER_ID: &str = "userId";
pub const FIELD_LIST_ID: &str = "listId";
pub const FIELD_CREATED_AT: &str = "createdAt";

/// The authenticated user as reported by the auth provider.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingList {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    /// Epoch milliseconds.
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: String,
    pub list_id: String,
    pub owner_id: String,
    pub name: String,
    pub price: Decimal,
    /// Empty when not given.
    pub store: String,
    /// Empty when not given.
    pub link: String,
    pub created_at: i64,
}

/// Why a document could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidRecord {
    pub id: String,
    pub field: &'static str,
}

impl std::fmt::Display for InvalidRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "document {} is missing field {}", self.id, self.field)
    }
}

impl TryFrom<&Document> for ShoppingList {
    type Error = InvalidRecord;

    fn try_from(doc: &Document) -> Result<Self, Self::Error> {
        Ok(Self {
            id: doc.id.clone(),
            owner_id: required_str(doc, FIELD_USER_ID)?,
            name: required_str(doc, "name")?,
            created_at: timestamp(&doc.fields),
        })
    }
}

impl TryFrom<&Document> for Product {
    type Error = InvalidRecord;

    fn try_from(doc: &Document) -> Result<Self, Self::Error> {
        Ok(Self {
            id: doc.id.clone(),
            list_id: required_str(doc, FIELD_LIST_ID)?,
            owner_id: required_str(doc, FIELD_USER_ID)?,
            name: required_str(doc, "name")?,
            price: coerce_price(doc.fields.get("price")),
            store: optional_str(&doc.fields, "store"),
            link: optional_str(&doc.fields, "link"),
            created_at: timestamp(&doc.fields),
        })
    }
}

/// Convert a snapshot into records, skipping (and logging) malformed documents.
pub fn from_documents<'a, T>(docs: &'a [Document]) -> Vec<T>
where
    T: TryFrom<&'a Document, Error = InvalidRecord>,
{
    docs.iter()
        .filter_map(|doc| match T::try_from(doc) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(%err, "skipping malformed document");
                None
            }
        })
        .collect()
}

/// Current time as epoch milliseconds, the unit of `createdAt`.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Fields for a new list document.
pub fn list_fields(owner: &Identity, name: &str, created_at: i64) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(FIELD_USER_ID.into(), json!(owner.uid));
    fields.insert("name".into(), json!(name));
    fields.insert(FIELD_CREATED_AT.into(), json!(created_at));
    fields
}

/// A validated product ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub list_id: String,
    pub name: String,
    pub price: Decimal,
    pub store: String,
    pub link: String,
}

impl NewProduct {
    /// Validate raw form input. Returns `None` when the name is blank or the
    /// price is not a number in `0..=MAX_PRICE`.
    pub fn parse(list_id: &str, name: &str, price: &str, store: &str, link: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let price = parse_price(price)?;
        Some(Self {
            list_id: list_id.to_string(),
            name: name.to_string(),
            price,
            store: store.trim().to_string(),
            link: link.trim().to_string(),
        })
    }

    pub fn into_fields(self, owner: &Identity, created_at: i64) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(FIELD_LIST_ID.into(), json!(self.list_id));
        fields.insert(FIELD_USER_ID.into(), json!(owner.uid));
        fields.insert("name".into(), json!(self.name));
        // Written as a string to keep the exact decimal.
        fields.insert("price".into(), json!(self.price.to_string()));
        fields.insert("store".into(), json!(self.store));
        fields.insert("link".into(), json!(self.link));
        fields.insert(FIELD_CREATED_AT.into(), json!(created_at));
        fields
    }
}

/// Largest accepted price. Keeps sums far from `Decimal::MAX`.
pub const MAX_PRICE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Parse user input as a price in `0..=MAX_PRICE`.
pub fn parse_price(input: &str) -> Option<Decimal> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    let price = Decimal::from_str(input)
        .or_else(|_| Decimal::from_scientific(input))
        .ok()?;
    let in_range = (!price.is_sign_negative() || price.is_zero()) && price <= MAX_PRICE;
    in_range.then(|| price.normalize())
}

/// Stored prices may be numbers or numeric strings; anything else, including
/// prices above [`MAX_PRICE`], counts as 0.
pub fn coerce_price(value: Option<&Value>) -> Decimal {
    let parsed = match value {
        Some(Value::Number(n)) => parse_price(&n.to_string()),
        Some(Value::String(s)) => parse_price(s),
        _ => None,
    };
    parsed.unwrap_or(Decimal::ZERO)
}

fn required_str(doc: &Document, field: &'static str) -> Result<String, InvalidRecord> {
    doc.fields
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| InvalidRecord {
            id: doc.id.clone(),
            field,
        })
}

fn optional_str(fields: &Map<String, Value>, field: &str) -> String {
    fields
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn timestamp(fields: &Map<String, Value>) -> i64 {
    fields
        .get(FIELD_CREATED_AT)
        .and_then(Value::as_i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::FromPrimitive;

    fn doc(id: &str, fields: Value) -> Document {
        Document {
            id: id.to_string(),
            fields: fields.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn product_defaults_optional_fields() {
        let product = Product::try_from(&doc(
            "p1",
            json!({"listId": "l1", "userId": "u1", "name": "Milk", "price": 2.5, "createdAt": 10}),
        ))
        .unwrap();
        assert_eq!(product.store, "");
        assert_eq!(product.link, "");
        assert_eq!(product.price, Decimal::from_f64(2.5).unwrap());
        assert_eq!(product.created_at, 10);
    }

    #[test]
    fn product_without_list_is_rejected() {
        let err = Product::try_from(&doc("p1", json!({"userId": "u1", "name": "Milk"}))).unwrap_err();
        assert_eq!(err.field, FIELD_LIST_ID);
    }

    #[test]
    fn malformed_documents_are_skipped() {
        let docs = vec![
            doc("a", json!({"userId": "u1", "name": "Weekly", "createdAt": 1})),
            doc("b", json!({"name": "orphan"})),
        ];
        let lists: Vec<ShoppingList> = from_documents(&docs);
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].id, "a");
    }

    #[test]
    fn price_coercion() {
        assert_eq!(coerce_price(Some(&json!("19.99"))), Decimal::new(1999, 2));
        assert_eq!(coerce_price(Some(&json!(3))), Decimal::from(3));
        assert_eq!(coerce_price(Some(&json!("abc"))), Decimal::ZERO);
        assert_eq!(coerce_price(Some(&json!(null))), Decimal::ZERO);
        assert_eq!(coerce_price(Some(&json!(-4))), Decimal::ZERO);
        assert_eq!(coerce_price(None), Decimal::ZERO);
        assert_eq!(coerce_price(Some(&json!("1000000000.01"))), Decimal::ZERO);
    }

    #[test]
    fn price_limit_is_inclusive() {
        assert_eq!(parse_price("1000000000"), Some(MAX_PRICE));
        assert_eq!(parse_price("1000000000.00"), Some(MAX_PRICE));
        assert_eq!(parse_price("1e9"), Some(MAX_PRICE));
        assert_eq!(parse_price("1000000000.0000001"), None);
        assert_eq!(parse_price("79228162514264337593543950335"), None);
    }

    #[test]
    fn new_product_validation() {
        assert!(NewProduct::parse("l1", "Widget", "-1", "", "").is_none());
        assert!(NewProduct::parse("l1", "", "5", "", "").is_none());
        assert!(NewProduct::parse("l1", "   ", "5", "", "").is_none());
        assert!(NewProduct::parse("l1", "Widget", "", "", "").is_none());
        assert!(NewProduct::parse("l1", "Widget", "NaN", "", "").is_none());
        assert!(NewProduct::parse("l1", "Widget", "79228162514264337593543950335", "", "").is_none());

        let product = NewProduct::parse("l1", " Widget ", "0", " Amazon ", "").unwrap();
        assert_eq!(product.name, "Widget");
        assert_eq!(product.price, Decimal::ZERO);
        assert_eq!(product.store, "Amazon");
        assert_eq!(product.link, "");
    }

    #[test]
    fn new_product_fields_round_trip_into_product() {
        let owner = Identity {
            uid: "u1".into(),
            email: "a@b.c".into(),
        };
        let fields = NewProduct::parse("l1", "Monitor", "249.90", "LG", "https://lg.com")
            .unwrap()
            .into_fields(&owner, 42);
        let product = Product::try_from(&Document {
            id: "p1".into(),
            fields,
        })
        .unwrap();
        assert_eq!(product.price, Decimal::new(2499, 1));
        assert_eq!(product.owner_id, "u1");
        assert_eq!(product.link, "https://lg.com");
    }
}
