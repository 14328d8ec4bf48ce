pub mod app_config;
pub mod cache;
pub mod client;
pub mod db;
pub mod gallery;
pub mod ip;
pub mod middleware;
pub mod orm;
pub mod rate_limit;
pub mod session;
pub mod storage;
pub mod web;
