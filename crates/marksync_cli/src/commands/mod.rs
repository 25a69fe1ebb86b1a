pub(crate) mod cache;
pub(crate) mod counts;
pub(crate) mod meta;
pub(crate) mod serve;
pub(crate) mod shared;
pub(crate) mod sync;
