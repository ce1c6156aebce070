pub mod db;
pub mod feed;
pub mod filesystem;
pub mod middleware;
pub mod orm;
pub mod session;
pub mod url;
pub mod user;
pub mod web;
