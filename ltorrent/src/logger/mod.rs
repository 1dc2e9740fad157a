pub mod logger_sender;
