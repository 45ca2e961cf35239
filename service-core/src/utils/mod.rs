pub mod access_key;

pub use access_key::verify_access_key;
