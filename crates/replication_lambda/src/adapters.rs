pub mod copier;
pub mod listing;
pub mod s3;
