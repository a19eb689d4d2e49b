pub mod decoders;
pub mod extract;
pub mod fetcher;
pub mod imap_client;
pub mod providers;
pub mod smtp;
