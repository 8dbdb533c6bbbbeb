pub mod sqlite_recipient_repository;

pub use sqlite_recipient_repository::SqliteRecipientRepository;
