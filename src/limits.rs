//! Input bounds enforced before anything reaches the journal.

pub const MAX_PARTY_SIZE: u32 = 500;
pub const MAX_TABLES_PER_RESERVATION: usize = 64;
pub const MAX_TABLE_CAPACITY: u32 = 100;
pub const MAX_NAME_LEN: usize = 256;
pub const MAX_ADDRESS_LEN: usize = 512;
