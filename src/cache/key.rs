//! Cache keys for remote queries. Equality is structural, so two callers
//! asking for the same query always land on the same entry.

use std::fmt;

/// Identifies one cacheable query against the remote data source.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    /// Detail record for a single product.
    Product(u64),
    /// The unfiltered product list.
    ProductList,
    /// The product list filtered to one category.
    ProductListByCategory(String),
    /// Detail record for a single user.
    User(u64),
}

/// Key class, used to pick the staleness window for an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    Product,
    ProductList,
    User,
}

impl CacheKey {
    pub fn class(&self) -> KeyClass {
        match self {
            CacheKey::Product(_) => KeyClass::Product,
            CacheKey::ProductList | CacheKey::ProductListByCategory(_) => KeyClass::ProductList,
            CacheKey::User(_) => KeyClass::User,
        }
    }

    /// Whether this key is one of the product list variants.
    pub fn is_product_list(&self) -> bool {
        self.class() == KeyClass::ProductList
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Product(id) => write!(f, "product/{id}"),
            CacheKey::ProductList => write!(f, "products"),
            CacheKey::ProductListByCategory(category) => {
                write!(f, "products?category={category}")
            }
            CacheKey::User(id) => write!(f, "user/{id}"),
        }
    }
}
