pub mod errors;
pub mod db;
pub mod maintenance_mode;
