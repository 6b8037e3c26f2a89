//! Wire models for the remote inventory source.

use serde::{Deserialize, Serialize};

/// A product record as served by `GET /products`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub category: String,
    pub price: f64,
    pub stock: u32,
}

/// Product fields for create and update bodies; the server owns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub category: String,
    pub price: f64,
    pub stock: u32,
}

/// A user record as served by `GET /users/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub role: String,
}

/// User fields for update bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInput {
    pub name: String,
    pub email: String,
    pub role: String,
}
