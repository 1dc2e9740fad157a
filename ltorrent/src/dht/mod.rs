pub mod dht_client;
