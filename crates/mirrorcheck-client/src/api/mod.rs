//! API endpoint modules.

mod changes;
mod fingerprint;
mod mirrors;
mod vantage;

pub use changes::{parse_index, select_recent, ChangeFilter, ChangeReplay, ChangeSource, ChangesApi};
pub use fingerprint::{ContentRange, FingerprintApi, ProbeTarget};
pub use mirrors::MirrorsApi;
pub use vantage::{ProbeJob, VantageCache, VantageConfig, VantagePointResolver};
