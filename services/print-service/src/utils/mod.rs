pub mod hash;
pub mod money;
pub mod page_count;
pub mod storage;
