pub mod click;
pub mod link;

pub use click::{ClickEvent, DeviceType, Fingerprint, NewClickEvent, ReferrerCategory};
pub(crate) use click::ClickEventRow;
pub use link::{is_valid_short_code, CreateLinkRequest, Link, MAX_SHORT_CODE_LEN};
