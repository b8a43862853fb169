pub mod fingerprint;

pub use fingerprint::{ContentFingerprint, fingerprint_of};
