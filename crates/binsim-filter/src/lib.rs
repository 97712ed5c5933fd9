//! binsim-filter: pose-indexed filter store
//!
//! Parses the filter list, loads and preprocesses all referenced WAV impulse
//! responses at startup, and serves frequency-domain filters by pose key.
//! After construction the store is read-only apart from its warn-once miss
//! bookkeeping; lookups are O(1) map hits and never block.

mod error;
mod list;
mod storage;
mod wav;

pub use error::{FilterError, FilterResult};
pub use list::{parse_filter_list, Record};
pub use storage::FilterStorage;
pub use wav::{read_stereo_wav, IrData};
