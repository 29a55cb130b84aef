//! maintenance operations on revstore repositories

mod fsck;
mod gc;
mod seed;

pub use fsck::{fsck, CorruptPayload, FsckReport, MissingPayload};
pub use gc::{gc, GcStats};
pub use seed::{seed, SeedEntry};
