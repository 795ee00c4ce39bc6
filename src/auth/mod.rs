// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Self-contained email/password authentication for the fleet API.
//!
//! ## Auth Flow
//!
//! 1. Client signs up with name, email and password
//! 2. Password is hashed with Argon2id and stored with the user record
//! 3. Login verifies the password and issues an HS256 JWT
//! 4. Subsequent requests send `Authorization: Bearer <token>`
//! 5. The `Auth` extractor verifies signature and expiry and yields the
//!    caller identity used to scope every device query
//!
//! ## Security
//!
//! - All device and log endpoints require authentication
//! - Tokens are signed with the configured `JWT_SECRET`
//! - Clock skew tolerance is 60 seconds
//! - Roles exist for future administrative surfaces; device access is
//!   decided purely by ownership

pub mod claims;
pub mod error;
pub mod extractor;
pub mod password;
pub mod roles;
pub mod tokens;

pub use claims::{AuthenticatedUser, Claims};
pub use error::AuthError;
pub use extractor::Auth;
pub use password::{hash_password, verify_password};
pub use roles::Role;
pub use tokens::TokenService;
