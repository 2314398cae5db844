// Worker constants

/// Messages requested per receive call. Poll-yield samples are normalized by
/// this same constant, so changing the batch size scales the samples with it.
pub const RECEIVE_BATCH_SIZE: usize = 10;

/// Capacity of the poll-yield sliding window
pub const STAT_WINDOW_SIZE: usize = 100;
