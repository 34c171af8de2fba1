use crate::model::{DAY_MS, Ms};

pub const MAX_COMPANIES: usize = 10_000;
pub const MAX_USERS_PER_COMPANY: usize = 10_000;
pub const MAX_FLOORS_PER_COMPANY: usize = 1_000;
pub const MAX_SPACES_PER_COMPANY: usize = 5_000;
pub const MAX_LOCATIONS_PER_COMPANY: usize = 20_000;
pub const MAX_RESERVATIONS_PER_LOCATION: usize = 100_000;
pub const MAX_SCHEDULES_PER_USER: usize = 1_000;

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_EMAIL_LEN: usize = 320;
pub const MAX_CERTIFICATION_LEN: usize = 64;
pub const MAX_COORDINATE_LEN: usize = 32;
pub const MAX_COMMENT_LEN: usize = 2_000;

/// 1970-01-01.
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;
/// 3000-01-01.
pub const MAX_VALID_TIMESTAMP_MS: Ms = 32_503_680_000_000;
pub const MAX_RESERVATION_MS: Ms = DAY_MS;

/// Slots per batch booking: a full day at most.
pub const MAX_BATCH_SIZE: usize = 24;
