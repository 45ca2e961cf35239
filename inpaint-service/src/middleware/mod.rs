pub mod access_key;

pub use access_key::{AccessGranted, ACCESS_KEY_HEADER};
