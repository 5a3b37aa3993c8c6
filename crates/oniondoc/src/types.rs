//! Various types that can show up in a descriptor document.

pub(crate) mod misc;
