// External web apps the token actions link out to.
pub mod dex;

pub use dex::{collection_url, explorer_token_url, swap_url};
