pub mod auth;
pub mod catalog;
pub mod entries;
pub mod error;
pub mod linking;
pub mod middleware;
pub mod oauth;
pub mod patients;
pub mod profile;
pub mod session;
