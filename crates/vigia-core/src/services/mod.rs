//! Service wrappers shared by Vigia binaries

mod database;

pub use database::DatabaseService;
