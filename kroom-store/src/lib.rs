pub mod app_config;
pub mod database;
pub mod booking_repo;

pub use booking_repo::PgBookingStore;
pub use database::DbClient;
