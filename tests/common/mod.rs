#![allow(dead_code)]

pub mod database;
pub mod doubles;
pub mod fixtures;
