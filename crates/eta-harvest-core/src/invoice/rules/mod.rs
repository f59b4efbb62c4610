//! Rule-based helpers for listing field extraction.

pub mod amounts;
pub mod dates;
pub mod keys;
pub mod link;
pub mod patterns;

pub use amounts::{format_amount, is_amount_token, normalize_amount, parse_amount, split_gross};
pub use dates::{find_time, is_date_token, parse_date, DateMatch};
pub use keys::{field_for_key, normalize_key, resolve_keyed, FIELD_SYNONYMS};
pub use link::share_link;
pub use patterns::*;
