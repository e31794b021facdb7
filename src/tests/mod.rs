// Integration-style tests over SQLite fixtures

pub mod common;

mod cordis_repository_test;
mod gleif_resolver_test;
mod radar_service_test;
