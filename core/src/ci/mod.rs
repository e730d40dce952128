mod commit;
mod status;

pub use commit::{extract_commit, short_sha, CommitInfo};
pub use status::{normalize, CIState};
