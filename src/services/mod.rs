pub mod detection;
pub mod extraction;
pub mod storage;
