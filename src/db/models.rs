//! # Document Models
//!
//! The shapes stored in the document store. Each model is serialized as one
//! JSON document; the `id` field doubles as the document key.
//!
//! Timestamps are RFC3339 strings, the same way the rest of the application
//! prints them.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered customer
///
/// The cart lives inside the user document, so adding to the cart is a single
/// document write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    /// Unique identifier (UUID v4)
    pub id: String,

    /// Login name, unique across users
    pub email: String,

    /// Shown in the navigation bar and on the profile page
    pub name: String,

    /// Argon2 PHC string, never rendered
    pub password_hash: String,

    /// Public URL of the uploaded avatar, if any
    #[serde(default)]
    pub avatar_url: Option<String>,

    #[serde(default)]
    pub cart: Cart,

    /// When the account was created (RFC3339 timestamp)
    pub created_at: String,
}

impl User {
    pub fn new(email: String, name: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email,
            name,
            password_hash,
            avatar_url: None,
            cart: Cart::default(),
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Cart {
    pub items: Vec<CartItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartItem {
    pub course_id: String,
    pub count: u32,
}

impl Cart {
    /// Adds one unit of a course, merging with an existing line.
    pub fn add(&mut self, course_id: &str) {
        match self.items.iter_mut().find(|item| item.course_id == course_id) {
            Some(item) => item.count += 1,
            None => self.items.push(CartItem {
                course_id: course_id.to_string(),
                count: 1,
            }),
        }
    }

    /// Removes one unit; the line disappears when its count reaches zero.
    /// Returns false when the course was not in the cart.
    pub fn remove(&mut self, course_id: &str) -> bool {
        let Some(index) = self.items.iter().position(|item| item.course_id == course_id) else {
            return false;
        };

        if self.items[index].count > 1 {
            self.items[index].count -= 1;
        } else {
            self.items.remove(index);
        }
        true
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A product offered in the shop
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Course {
    pub id: String,
    pub title: String,
    pub price: f64,
    /// Cover image URL
    pub img: String,
    /// The user who created the course; only they may edit or remove it
    pub user_id: String,
    pub created_at: String,
}

impl Course {
    pub fn new(title: String, price: f64, img: String, user_id: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            price,
            img,
            user_id,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

/// A placed order
///
/// Courses are copied into the order so later edits or removals of a course
/// don't rewrite order history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub items: Vec<OrderItem>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub course: Course,
    pub count: u32,
}

impl Order {
    pub fn new(user_id: String, items: Vec<OrderItem>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            items,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn total(&self) -> f64 {
        self.items
            .iter()
            .map(|item| item.course.price * f64::from(item.count))
            .sum()
    }
}
